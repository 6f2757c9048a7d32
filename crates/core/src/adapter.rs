//! Capability interface for the external browser-automation engine.
//!
//! The engine itself lives outside this crate. The registry only relies on
//! these three capabilities plus the event channel handed to the factory at
//! construction time, which keeps the lifecycle logic testable against
//! scripted adapters.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Lifecycle events emitted by an automation client for its one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
	/// A login QR code is available for scanning.
	Qr(String),
	/// Credentials were accepted.
	Authenticated,
	/// The client is fully synced and can send messages.
	Ready,
	/// The login attempt was rejected.
	AuthFailure(String),
	/// The remote side dropped the session.
	Disconnected(String),
}

/// Sender half used by adapters to report [`ClientEvent`]s.
///
/// Events pushed here are applied to the owning session in send order; the
/// receiver side is consumed by a single lifecycle pump per session.
pub type EventSender = mpsc::UnboundedSender<ClientEvent>;

/// One automation client bound to exactly one session.
#[async_trait]
pub trait ClientAdapter: Send + Sync {
	/// Begins the asynchronous login flow. Resolves once the flow is
	/// underway; progress is reported through the event channel.
	async fn start(&self) -> anyhow::Result<()>;

	/// Delivers one message to `recipient` (canonical transport address).
	/// Returns the transport-assigned message identifier.
	async fn send_text(&self, recipient: &str, body: &str) -> anyhow::Result<String>;

	/// Tears the client down. Must be safe to call at any lifecycle stage,
	/// including while a start or send is still in flight.
	async fn destroy(&self) -> anyhow::Result<()>;
}

/// Constructs adapters scoped to one session's auth-storage directory.
///
/// `data_dir` exists before this is called and survives session destruction,
/// so an adapter created later for the same id can resume a stored login.
pub trait AdapterFactory: Send + Sync {
	fn create(
		&self,
		instance_id: &str,
		data_dir: &Path,
		events: EventSender,
	) -> anyhow::Result<Arc<dyn ClientAdapter>>;
}
