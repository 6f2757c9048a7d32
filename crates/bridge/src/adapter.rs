//! [`ClientAdapter`] over one bridge child process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

use wagate_core::adapter::{AdapterFactory, ClientAdapter, ClientEvent, EventSender};

use crate::driver::{BridgePaths, locate_bridge};
use crate::proto::{BridgeCommand, BridgeEvent};
use crate::transport::{CommandWriter, spawn_event_reader};

/// Replies waiting on the bridge, keyed by command id.
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<std::result::Result<String, String>>>>>;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Factory wired into the registry; one bridge process per created session.
pub struct BridgeFactory {
	paths: BridgePaths,
}

impl BridgeFactory {
	/// Locates the bridge runtime once; every spawn reuses the same paths.
	pub fn new() -> wagate_core::Result<Self> {
		Ok(Self {
			paths: locate_bridge()?,
		})
	}

	pub fn with_paths(paths: BridgePaths) -> Self {
		Self { paths }
	}
}

impl AdapterFactory for BridgeFactory {
	fn create(
		&self,
		instance_id: &str,
		data_dir: &Path,
		events: EventSender,
	) -> Result<Arc<dyn ClientAdapter>> {
		Ok(Arc::new(BridgeAdapter::new(
			self.paths.clone(),
			instance_id,
			data_dir,
			events,
		)))
	}
}

struct ProcessHandle {
	child: Child,
	writer: CommandWriter<ChildStdin>,
}

/// Drives one bridge process for one session.
pub struct BridgeAdapter {
	paths: BridgePaths,
	instance_id: String,
	data_dir: PathBuf,
	events: EventSender,
	process: Mutex<Option<ProcessHandle>>,
	pending: PendingMap,
	next_command_id: AtomicU64,
}

impl BridgeAdapter {
	pub fn new(
		paths: BridgePaths,
		instance_id: &str,
		data_dir: &Path,
		events: EventSender,
	) -> Self {
		Self {
			paths,
			instance_id: instance_id.to_string(),
			data_dir: data_dir.to_path_buf(),
			events,
			process: Mutex::new(None),
			pending: Arc::new(Mutex::new(HashMap::new())),
			next_command_id: AtomicU64::new(1),
		}
	}
}

#[async_trait]
impl ClientAdapter for BridgeAdapter {
	async fn start(&self) -> Result<()> {
		let mut child = Command::new(&self.paths.node_exe)
			.arg(&self.paths.bridge_js)
			.arg("--instance")
			.arg(&self.instance_id)
			.arg("--session-dir")
			.arg(&self.data_dir)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::null())
			.kill_on_drop(true)
			.spawn()
			.with_context(|| {
				format!("failed to spawn bridge process for {}", self.instance_id)
			})?;

		let stdin = child.stdin.take().context("bridge stdin unavailable")?;
		let stdout = child.stdout.take().context("bridge stdout unavailable")?;

		{
			let mut process = self.process.lock().await;
			if process.is_some() {
				return Err(anyhow!("bridge already started"));
			}
			*process = Some(ProcessHandle {
				child,
				writer: CommandWriter::new(stdin),
			});
		}

		let instance = self.instance_id.clone();
		let events = self.events.clone();
		let pending = Arc::clone(&self.pending);
		let mut bridge_events = spawn_event_reader(stdout);
		tokio::spawn(async move {
			while let Some(event) = bridge_events.recv().await {
				route_event(event, &events, &pending).await;
			}
			// Stdout closed: the bridge exited or was killed. Anything still
			// waiting on a reply will never get one.
			let mut pending = pending.lock().await;
			for (_, reply) in pending.drain() {
				let _ = reply.send(Err("bridge exited".to_string()));
			}
			debug!(target = "wagate.bridge", instance = %instance, "bridge stream ended");
		});

		info!(
			target = "wagate.bridge",
			instance = %self.instance_id,
			"bridge process started"
		);
		Ok(())
	}

	async fn send_text(&self, recipient: &str, body: &str) -> Result<String> {
		let id = self.next_command_id.fetch_add(1, Ordering::Relaxed);
		let (reply_tx, reply_rx) = oneshot::channel();
		self.pending.lock().await.insert(id, reply_tx);

		let command = BridgeCommand::Send {
			id,
			to: recipient.to_string(),
			body: body.to_string(),
		};
		let write_result = {
			let mut process = self.process.lock().await;
			match process.as_mut() {
				Some(handle) => handle.writer.write(&command).await,
				None => Err(anyhow!("bridge is not running")),
			}
		};
		if let Err(err) = write_result {
			self.pending.lock().await.remove(&id);
			return Err(err);
		}

		match reply_rx.await {
			Ok(Ok(message_id)) => Ok(message_id),
			Ok(Err(message)) => Err(anyhow!(message)),
			Err(_) => Err(anyhow!("bridge dropped the send reply")),
		}
	}

	async fn destroy(&self) -> Result<()> {
		let mut process = self.process.lock().await;
		let Some(mut handle) = process.take() else {
			return Ok(());
		};

		// Ask politely first so the engine can persist its auth state.
		if handle.writer.write(&BridgeCommand::Shutdown).await.is_ok() {
			match tokio::time::timeout(SHUTDOWN_GRACE, handle.child.wait()).await {
				Ok(_) => {
					info!(
						target = "wagate.bridge",
						instance = %self.instance_id,
						"bridge shut down cleanly"
					);
					return Ok(());
				}
				Err(_) => {
					warn!(
						target = "wagate.bridge",
						instance = %self.instance_id,
						"bridge ignored shutdown, killing"
					);
				}
			}
		}

		handle
			.child
			.start_kill()
			.context("failed to kill bridge process")?;
		let _ = handle.child.wait().await;
		Ok(())
	}
}

async fn route_event(event: BridgeEvent, events: &EventSender, pending: &PendingMap) {
	match event {
		BridgeEvent::Qr { payload } => {
			// Send failures mean the session was destroyed; discard.
			let _ = events.send(ClientEvent::Qr(payload));
		}
		BridgeEvent::Authenticated => {
			let _ = events.send(ClientEvent::Authenticated);
		}
		BridgeEvent::Ready => {
			let _ = events.send(ClientEvent::Ready);
		}
		BridgeEvent::AuthFailure { message } => {
			let _ = events.send(ClientEvent::AuthFailure(message));
		}
		BridgeEvent::Disconnected { reason } => {
			let _ = events.send(ClientEvent::Disconnected(reason));
		}
		BridgeEvent::Sent { id, message_id } => {
			deliver_reply(pending, id, Ok(message_id)).await;
		}
		BridgeEvent::SendError { id, message } => {
			deliver_reply(pending, id, Err(message)).await;
		}
	}
}

async fn deliver_reply(
	pending: &PendingMap,
	id: u64,
	reply: std::result::Result<String, String>,
) {
	let Some(waiter) = pending.lock().await.remove(&id) else {
		debug!(target = "wagate.bridge", id, "reply without a waiting command");
		return;
	};
	let _ = waiter.send(reply);
}
