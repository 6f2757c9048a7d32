//! Newline-delimited JSON over the bridge's stdio.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

use crate::proto::{BridgeCommand, BridgeEvent};

/// Writer half: serializes commands, one per line.
pub struct CommandWriter<W> {
	inner: W,
}

impl<W: AsyncWrite + Unpin> CommandWriter<W> {
	pub fn new(inner: W) -> Self {
		Self { inner }
	}

	pub async fn write(&mut self, command: &BridgeCommand) -> Result<()> {
		let payload = serde_json::to_string(command).context("failed to serialize command")?;
		self.inner
			.write_all(format!("{payload}\n").as_bytes())
			.await
			.context("failed writing bridge command")?;
		self.inner
			.flush()
			.await
			.context("failed flushing bridge command")?;
		Ok(())
	}
}

/// Spawns a task draining `reader` into a channel of parsed events.
///
/// Malformed lines are logged and skipped so one bad line cannot wedge the
/// session. The channel closes when the bridge closes its stdout.
pub fn spawn_event_reader<R>(reader: R) -> mpsc::UnboundedReceiver<BridgeEvent>
where
	R: AsyncRead + Unpin + Send + 'static,
{
	let (tx, rx) = mpsc::unbounded_channel();
	tokio::spawn(async move {
		let mut lines = BufReader::new(reader).lines();
		loop {
			match lines.next_line().await {
				Ok(Some(line)) => {
					let line = line.trim();
					if line.is_empty() {
						continue;
					}
					match serde_json::from_str::<BridgeEvent>(line) {
						Ok(event) => {
							if tx.send(event).is_err() {
								break;
							}
						}
						Err(err) => {
							warn!(
								target = "wagate.bridge",
								error = %err,
								"skipping malformed bridge line"
							);
						}
					}
				}
				Ok(None) => break,
				Err(err) => {
					warn!(target = "wagate.bridge", error = %err, "bridge stream read failed");
					break;
				}
			}
		}
	});
	rx
}
