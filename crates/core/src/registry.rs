//! Concurrency-safe registry of live messaging sessions.
//!
//! The registry is the sole mutator of session records: API calls and
//! lifecycle events all funnel through one async mutex, so two concurrent
//! creates for the same id cannot both succeed and a destroy racing a status
//! update cannot leave a dangling or duplicate record. The external engine
//! is never awaited while the lock is held.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::adapter::{AdapterFactory, ClientAdapter, ClientEvent};
use crate::error::{GatewayError, Result};
use crate::lifecycle;
use crate::phone;
use crate::session::{MessageReceipt, SessionInfo, SessionStatus};

struct SessionEntry {
	status: SessionStatus,
	qr_payload: Option<String>,
	phone_number: String,
	created_at: DateTime<Utc>,
	adapter: Arc<dyn ClientAdapter>,
	/// Incarnation marker. Async completions carry the epoch they were
	/// spawned under; a mismatch means the id was destroyed (and possibly
	/// re-created) in the meantime and the result must be discarded.
	epoch: u64,
}

impl SessionEntry {
	fn info(&self, instance_id: &str) -> SessionInfo {
		SessionInfo {
			instance_id: instance_id.to_string(),
			status: self.status,
			qr: self.qr_payload.clone(),
			phone_number: self.phone_number.clone(),
			created_at: self.created_at,
		}
	}
}

struct RegistryInner {
	sessions: Mutex<IndexMap<String, SessionEntry>>,
	factory: Arc<dyn AdapterFactory>,
	data_root: PathBuf,
	next_epoch: AtomicU64,
}

/// Registry of all live sessions, keyed by caller-supplied id.
///
/// Cheap to clone; all clones share the same state. Background tasks
/// spawned per session hold their own handles.
#[derive(Clone)]
pub struct SessionRegistry {
	inner: Arc<RegistryInner>,
}

impl SessionRegistry {
	pub fn new(factory: Arc<dyn AdapterFactory>, data_root: impl Into<PathBuf>) -> Self {
		Self {
			inner: Arc::new(RegistryInner {
				sessions: Mutex::new(IndexMap::new()),
				factory,
				data_root: data_root.into(),
				next_epoch: AtomicU64::new(1),
			}),
		}
	}

	/// Registers a new session and begins its login flow in the background.
	///
	/// Returns as soon as the record exists; authentication progress is
	/// observable through [`get`](Self::get) and [`list`](Self::list).
	pub async fn create(&self, instance_id: &str, phone_number: &str) -> Result<SessionInfo> {
		if instance_id.is_empty() || phone_number.is_empty() {
			return Err(GatewayError::InvalidArgument(
				"Instance ID and phone number are required".to_string(),
			));
		}

		let mut sessions = self.inner.sessions.lock().await;
		if sessions.contains_key(instance_id) {
			return Err(GatewayError::AlreadyExists);
		}

		// Auth storage must exist before the adapter is constructed. It is
		// left behind on destroy so a later create with the same id resumes
		// the stored login.
		let data_dir = self.inner.data_root.join(instance_id);
		std::fs::create_dir_all(&data_dir)?;

		let (event_tx, event_rx) = mpsc::unbounded_channel();
		let adapter = self
			.inner
			.factory
			.create(instance_id, &data_dir, event_tx)
			.map_err(|err| GatewayError::Init(err.to_string()))?;

		let epoch = self.inner.next_epoch.fetch_add(1, Ordering::Relaxed);
		let entry = SessionEntry {
			status: SessionStatus::Initializing,
			qr_payload: None,
			phone_number: phone_number.to_string(),
			created_at: Utc::now(),
			adapter: Arc::clone(&adapter),
			epoch,
		};
		let snapshot = entry.info(instance_id);
		sessions.insert(instance_id.to_string(), entry);
		drop(sessions);

		info!(target = "wagate", instance = instance_id, "session created");

		lifecycle::spawn_event_pump(self.clone(), instance_id.to_string(), epoch, event_rx);
		self.spawn_start(instance_id.to_string(), epoch, adapter);

		Ok(snapshot)
	}

	/// Fire-and-forget start task; a failure becomes `init_error` unless the
	/// session was destroyed or already failed in the meantime.
	fn spawn_start(&self, instance_id: String, epoch: u64, adapter: Arc<dyn ClientAdapter>) {
		let registry = self.clone();
		tokio::spawn(async move {
			if let Err(err) = adapter.start().await {
				warn!(
					target = "wagate",
					instance = %instance_id,
					error = %err,
					"session start failed"
				);
				registry.mark_init_error(&instance_id, epoch).await;
			}
		});
	}

	async fn mark_init_error(&self, instance_id: &str, epoch: u64) {
		let mut sessions = self.inner.sessions.lock().await;
		let Some(entry) = sessions.get_mut(instance_id) else {
			return;
		};
		if entry.epoch != epoch || entry.status.is_terminal() {
			return;
		}
		entry.status = SessionStatus::InitError;
		entry.qr_payload = None;
	}

	/// Applies one adapter event to the owning session.
	///
	/// Deliveries for an unknown id or a stale epoch are discarded: the
	/// session was destroyed (and possibly re-created) after the event was
	/// emitted.
	pub(crate) async fn apply_event(&self, instance_id: &str, epoch: u64, event: ClientEvent) {
		let mut sessions = self.inner.sessions.lock().await;
		let Some(entry) = sessions.get_mut(instance_id) else {
			debug!(
				target = "wagate",
				instance = instance_id,
				"event for destroyed session dropped"
			);
			return;
		};
		if entry.epoch != epoch {
			debug!(
				target = "wagate",
				instance = instance_id,
				"event from stale incarnation dropped"
			);
			return;
		}

		let Some(next) = lifecycle::next_status(entry.status, &event) else {
			debug!(
				target = "wagate",
				instance = instance_id,
				status = %entry.status,
				"lifecycle event ignored"
			);
			return;
		};

		// The QR payload is only held while awaiting a scan.
		entry.qr_payload = match &event {
			ClientEvent::Qr(payload) => Some(payload.clone()),
			_ => None,
		};
		info!(
			target = "wagate",
			instance = instance_id,
			from = %entry.status,
			to = %next,
			"session transition"
		);
		entry.status = next;
	}

	pub async fn get(&self, instance_id: &str) -> Result<SessionInfo> {
		let sessions = self.inner.sessions.lock().await;
		sessions
			.get(instance_id)
			.map(|entry| entry.info(instance_id))
			.ok_or(GatewayError::NotFound)
	}

	/// Snapshot of all sessions, in creation order.
	pub async fn list(&self) -> Vec<SessionInfo> {
		let sessions = self.inner.sessions.lock().await;
		sessions
			.iter()
			.map(|(id, entry)| entry.info(id))
			.collect()
	}

	/// Removes the session and tears its adapter down best-effort.
	///
	/// The id is reusable as soon as this returns; teardown completes on a
	/// background task. The auth directory is kept.
	pub async fn destroy(&self, instance_id: &str) -> Result<()> {
		let mut sessions = self.inner.sessions.lock().await;
		let Some(entry) = sessions.shift_remove(instance_id) else {
			return Err(GatewayError::NotFound);
		};
		drop(sessions);

		info!(target = "wagate", instance = instance_id, "session destroyed");

		let instance = instance_id.to_string();
		let adapter = entry.adapter;
		tokio::spawn(async move {
			if let Err(err) = adapter.destroy().await {
				warn!(
					target = "wagate",
					instance = %instance,
					error = %err,
					"adapter teardown failed"
				);
			}
		});
		Ok(())
	}

	/// Sends one message through a ready session.
	///
	/// Validation order: the session must exist, must be `ready`, both
	/// arguments must be non-empty, and the number must normalize to a
	/// plausible address. A failed send is reported per call and does not
	/// change the session's status.
	pub async fn send(
		&self,
		instance_id: &str,
		raw_number: &str,
		message: &str,
	) -> Result<MessageReceipt> {
		let adapter = {
			let sessions = self.inner.sessions.lock().await;
			let entry = sessions.get(instance_id).ok_or(GatewayError::NotFound)?;
			if !entry.status.can_send() {
				return Err(GatewayError::NotReady {
					status: entry.status,
				});
			}
			Arc::clone(&entry.adapter)
		};

		if raw_number.is_empty() || message.is_empty() {
			return Err(GatewayError::InvalidArgument(
				"Number and message are required".to_string(),
			));
		}
		let recipient = phone::normalize_recipient(raw_number)?;

		// Engine call happens outside the registry lock; other sessions and
		// API calls proceed while this send is in flight.
		let message_id = adapter
			.send_text(&recipient, message)
			.await
			.map_err(|source| GatewayError::SendFailed { source })?;

		Ok(MessageReceipt {
			id: message_id,
			timestamp: Utc::now(),
		})
	}

	#[cfg(test)]
	async fn epoch_of(&self, instance_id: &str) -> Option<u64> {
		let sessions = self.inner.sessions.lock().await;
		sessions.get(instance_id).map(|entry| entry.epoch)
	}
}
