//! Outbound delivery of confirmations to the machines.
//!
//! The server owns no broker connection. Each confirmation is written as one JSON line on the `vms::outbound` log
//! target, tagged with its topic, where the machine gateway picks it up.
use futures::future::BoxFuture;
use log::*;
use vending_engine::events::{ConfirmationEvent, EventHandlers, EventHooks};

pub const OUTBOUND_LOG_TARGET: &str = "vms::outbound";

/// Builds the event handlers that deliver confirmations. Call [`EventHandlers::producers`] to get the producers for
/// the router, then start the handlers.
pub fn create_confirmation_handlers(buffer_size: usize) -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_confirmation(|ev| {
        let ConfirmationEvent { topic, confirmation } = ev;
        let json = match serde_json::to_string(&confirmation) {
            Ok(json) => json,
            Err(e) => {
                error!("📬️ Could not serialize confirmation for {topic}. {e}");
                return no_op();
            },
        };
        Box::pin(async move {
            info!(target: OUTBOUND_LOG_TARGET, "{topic} {json}");
        })
    });
    EventHandlers::new(buffer_size, hooks)
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
