//! Debug instrumentation hooks
//!
//! Hooks are observational only. The engine calls them after a successful
//! get/set/invoke or flow activation when instrumentation is enabled in
//! [`EngineOptions`]. An engine created with instrumentation on records into
//! its own [`DebugRecorder`] unless other hooks are installed; otherwise
//! [`NoopHooks`] is used. Everything a recorder keeps is advisory and may be dropped at
//! any time.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::SystemTime;

use graphbind_sdk::{FlowState, NodeId, Value};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::defaults::DEFAULT_DEBUG_RECORDS_PER_SLOT;
use crate::options::EngineOptions;

/// Receiver of instrumentation events
pub trait DebugHooks: Send + Sync {
    /// A value was read
    fn on_get(&self, _node: NodeId, _slot: &str, _value: &Value) {}

    /// A value was written
    fn on_set(&self, _node: NodeId, _slot: &str, _value: &Value) {}

    /// A member was invoked
    fn on_invoke(&self, _node: NodeId, _slot: &str, _result: &Value) {}

    /// A flow node changed state
    fn on_flow(&self, _node: NodeId, _slot: &str, _state: FlowState) {}
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl DebugHooks for NoopHooks {}

/// What a record captured
#[derive(Debug, Clone, PartialEq)]
pub enum DebugEvent {
    /// Value read
    Get(Value),
    /// Value written
    Set(Value),
    /// Invocation result
    Invoke(Value),
    /// Flow state reached
    Flow(FlowState),
}

/// One timestamped observation
#[derive(Debug, Clone)]
pub struct DebugRecord {
    /// When it was observed
    pub at: SystemTime,
    /// What was observed
    pub event: DebugEvent,
}

/// Hooks that keep the most recent records per `(node, slot)`
pub struct DebugRecorder {
    per_slot: usize,
    records: Mutex<FxHashMap<(NodeId, String), VecDeque<DebugRecord>>>,
}

impl DebugRecorder {
    /// Recorder keeping `per_slot` records per slot
    pub fn new(per_slot: usize) -> Self {
        Self {
            per_slot: per_slot.max(1),
            records: Mutex::new(FxHashMap::default()),
        }
    }

    /// Recorder sized by [`EngineOptions::debug_records_per_slot`]
    pub fn from_options(options: &EngineOptions) -> Self {
        Self::new(options.debug_records_per_slot)
    }

    fn push(&self, node: NodeId, slot: &str, event: DebugEvent) {
        let mut records = self.records.lock();
        let queue = records.entry((node, slot.to_string())).or_default();
        if queue.len() == self.per_slot {
            queue.pop_front();
        }
        queue.push_back(DebugRecord {
            at: SystemTime::now(),
            event,
        });
    }

    /// Records of one slot, oldest first
    pub fn records(&self, node: NodeId, slot: &str) -> Vec<DebugRecord> {
        self.records
            .lock()
            .get(&(node, slot.to_string()))
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Most recent record of one slot
    pub fn latest(&self, node: NodeId, slot: &str) -> Option<DebugRecord> {
        self.records
            .lock()
            .get(&(node, slot.to_string()))
            .and_then(|q| q.back().cloned())
    }

    /// Drop everything recorded for a node
    pub fn forget_node(&self, node: NodeId) {
        self.records.lock().retain(|(n, _), _| *n != node);
    }

    /// Drop everything
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Default for DebugRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_DEBUG_RECORDS_PER_SLOT)
    }
}

impl std::fmt::Debug for DebugRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugRecorder")
            .field("per_slot", &self.per_slot)
            .field("slots", &self.records.lock().len())
            .finish()
    }
}

impl DebugHooks for DebugRecorder {
    fn on_get(&self, node: NodeId, slot: &str, value: &Value) {
        self.push(node, slot, DebugEvent::Get(value.clone()));
    }

    fn on_set(&self, node: NodeId, slot: &str, value: &Value) {
        self.push(node, slot, DebugEvent::Set(value.clone()));
    }

    fn on_invoke(&self, node: NodeId, slot: &str, result: &Value) {
        self.push(node, slot, DebugEvent::Invoke(result.clone()));
    }

    fn on_flow(&self, node: NodeId, slot: &str, state: FlowState) {
        self.push(node, slot, DebugEvent::Flow(state));
    }
}

static GLOBAL_RECORDER: Lazy<Arc<DebugRecorder>> = Lazy::new(|| Arc::new(DebugRecorder::default()));

/// Process-wide recorder, for tooling that attaches to any engine
pub fn global_recorder() -> Arc<DebugRecorder> {
    GLOBAL_RECORDER.clone()
}
