//! Lifecycle state machine and the per-session event pump.
//!
//! One pump task per session drains that session's event channel and applies
//! transitions through the registry, preserving the order the adapter
//! emitted them. Deliveries for a destroyed or re-created id are discarded
//! by the registry's epoch check.

use tokio::sync::mpsc;
use tracing::debug;

use crate::adapter::ClientEvent;
use crate::registry::SessionRegistry;
use crate::session::SessionStatus;

/// Computes the successor status for `event`, or `None` when the event is
/// ignored in the current status.
///
/// Unlisted combinations (a duplicate `ready`, a `qr` after `ready`, any
/// event in a terminal state) are ignored rather than treated as errors:
/// they can legitimately arrive from stale adapter state.
pub fn next_status(current: SessionStatus, event: &ClientEvent) -> Option<SessionStatus> {
	use crate::session::SessionStatus::*;

	if current.is_terminal() {
		return None;
	}

	match event {
		// A refreshed QR while already awaiting a scan replaces the payload.
		ClientEvent::Qr(_) => {
			matches!(current, Initializing | AwaitingScan).then_some(AwaitingScan)
		}
		// Restored credentials authenticate straight out of `initializing`,
		// skipping the QR phase.
		ClientEvent::Authenticated => {
			matches!(current, Initializing | AwaitingScan).then_some(Authenticated)
		}
		ClientEvent::Ready => (current != Ready).then_some(Ready),
		ClientEvent::AuthFailure(_) => Some(AuthFailed),
		ClientEvent::Disconnected(_) => Some(Disconnected),
	}
}

/// Spawns the event pump for one session incarnation.
///
/// The task ends when the adapter drops its sender (teardown) or the channel
/// is otherwise closed; no handler fires for a session that no longer exists.
pub(crate) fn spawn_event_pump(
	registry: SessionRegistry,
	instance_id: String,
	epoch: u64,
	mut events: mpsc::UnboundedReceiver<ClientEvent>,
) {
	tokio::spawn(async move {
		while let Some(event) = events.recv().await {
			registry.apply_event(&instance_id, epoch, event).await;
		}
		debug!(target = "wagate", instance = %instance_id, "event channel closed");
	});
}
