//! Flow activation bridge
//!
//! Flow descriptors are never read or called; they transfer control into a
//! node port through the owner's [`NodeAccessor`](graphbind_sdk::NodeAccessor).
//! A suspended activation reports to the debug hooks again when its
//! [`FlowHandle`](graphbind_sdk::FlowHandle) finishes.

use std::sync::Arc;

use graphbind_sdk::{BindError, BindResult, FlowOutcome, FlowPort, FlowState, Value};
use tracing::debug;

use crate::engine::BindContext;
use crate::reference::{MemberRef, TargetKind};

impl MemberRef {
    /// Activate the flow port this descriptor addresses
    pub fn activate_flow_node(&mut self, ctx: &BindContext<'_>) -> BindResult<FlowOutcome> {
        if !self.is_assigned() {
            return Err(BindError::Unassigned);
        }
        let port = match self.kind() {
            TargetKind::FlowNode => FlowPort::Entry,
            TargetKind::FlowInput => FlowPort::Input(self.start_segment()?),
            TargetKind::FlowInputExtended => FlowPort::Extended(self.start_segment()?),
            other => {
                return Err(BindError::unsupported(
                    "activate",
                    format!("{} '{}'", other.label(), self.dotted_path()),
                ))
            }
        };
        let node = self.node_id()?;
        let accessor = ctx
            .host
            .nodes()
            .ok_or(BindError::MissingCapability("nodes"))?;

        self.emit(ctx, |hooks, node, slot| hooks.on_flow(node, slot, FlowState::Activated));
        let outcome = accessor.activate(node, &port)?;
        debug!(
            target: "graphbind",
            node = node.0,
            port = ?port,
            finished = outcome.is_finished(),
            "flow activated"
        );

        match &outcome {
            FlowOutcome::Finished => {
                self.emit(ctx, |hooks, node, slot| hooks.on_flow(node, slot, FlowState::Finished));
            }
            FlowOutcome::Suspended(handle) => {
                self.emit(ctx, |hooks, node, slot| {
                    hooks.on_flow(node, slot, FlowState::Suspended)
                });
                if ctx.engine.options().instrument {
                    let hooks = Arc::clone(ctx.engine.hooks());
                    let slot = self.dotted_path();
                    handle.on_finished(move || hooks.on_flow(node, &slot, FlowState::Finished));
                }
            }
        }
        Ok(outcome)
    }

    /// Run the target as a flow step: flow kinds activate their port; any
    /// other kind is invoked with `args` and finishes immediately
    pub fn invoke_flow(
        &mut self,
        ctx: &BindContext<'_>,
        args: &mut [Value],
    ) -> BindResult<FlowOutcome> {
        if self.kind().is_flow() {
            return self.activate_flow_node(ctx);
        }
        self.invoke(ctx, args)?;
        Ok(FlowOutcome::Finished)
    }

    fn start_segment(&self) -> BindResult<String> {
        self.path().first().cloned().ok_or(BindError::Unassigned)
    }
}
