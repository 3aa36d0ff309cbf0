//! Flow activation wait handles
//!
//! A flow node that cannot finish inside its activation call hands back a
//! [`FlowHandle`]. The node's scheduler calls [`FlowHandle::finish`] once it
//! reports completion; callers awaiting it register [`FlowHandle::on_finished`]
//! callbacks. There is no cancellation: the owning graph drops in-flight
//! handles on teardown.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Lifecycle of one activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowState {
    /// Not yet activated
    Idle,
    /// Activation in progress
    Activated,
    /// Waiting for the node to report completion
    Suspended,
    /// Completed
    Finished,
}

type FinishCallback = Box<dyn FnOnce() + Send>;

struct FlowInner {
    state: FlowState,
    callbacks: Vec<FinishCallback>,
}

/// Shared wait handle for a flow activation
#[derive(Clone)]
pub struct FlowHandle(Arc<Mutex<FlowInner>>);

impl FlowHandle {
    /// Idle handle
    pub fn new() -> Self {
        FlowHandle(Arc::new(Mutex::new(FlowInner {
            state: FlowState::Idle,
            callbacks: Vec::new(),
        })))
    }

    /// Current state
    pub fn state(&self) -> FlowState {
        self.0.lock().state
    }

    /// Whether the activation completed
    pub fn is_finished(&self) -> bool {
        self.state() == FlowState::Finished
    }

    /// `Idle -> Activated`; false from any other state
    pub fn activate(&self) -> bool {
        self.transition(FlowState::Idle, FlowState::Activated)
    }

    /// `Activated -> Suspended`; false from any other state
    pub fn suspend(&self) -> bool {
        self.transition(FlowState::Activated, FlowState::Suspended)
    }

    /// `Activated | Suspended -> Finished`, running the pending callbacks.
    ///
    /// Returns false if the handle was idle or already finished.
    pub fn finish(&self) -> bool {
        let callbacks = {
            let mut inner = self.0.lock();
            match inner.state {
                FlowState::Activated | FlowState::Suspended => {
                    inner.state = FlowState::Finished;
                    std::mem::take(&mut inner.callbacks)
                }
                FlowState::Idle | FlowState::Finished => return false,
            }
        };
        for callback in callbacks {
            callback();
        }
        true
    }

    /// Run `callback` when the activation finishes (immediately if it has)
    pub fn on_finished(&self, callback: impl FnOnce() + Send + 'static) {
        let mut inner = self.0.lock();
        if inner.state == FlowState::Finished {
            drop(inner);
            callback();
        } else {
            inner.callbacks.push(Box::new(callback));
        }
    }

    fn transition(&self, from: FlowState, to: FlowState) -> bool {
        let mut inner = self.0.lock();
        if inner.state != from {
            return false;
        }
        inner.state = to;
        true
    }
}

impl Default for FlowHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FlowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlowHandle({:?})", self.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_suspend_then_finish_runs_callbacks() {
        let handle = FlowHandle::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        assert!(handle.activate());
        assert!(handle.suspend());
        handle.on_finished(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert!(handle.finish());
        assert!(handle.is_finished());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!handle.finish());
    }

    #[test]
    fn test_late_callback_runs_immediately() {
        let handle = FlowHandle::new();
        handle.activate();
        handle.finish();

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        handle.on_finished(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_idle_handle_cannot_finish() {
        let handle = FlowHandle::new();
        assert!(!handle.suspend());
        assert!(!handle.finish());
        assert_eq!(handle.state(), FlowState::Idle);
    }
}
