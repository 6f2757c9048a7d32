//! Wire protocol between the gateway and a bridge process.
//!
//! One JSON object per line in both directions. Send replies are correlated
//! to their command through the caller-assigned `id`.

use serde::{Deserialize, Serialize};

/// Commands written to the bridge's stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeCommand {
	/// Deliver one message to a canonical transport address.
	Send { id: u64, to: String, body: String },
	/// Persist auth state and exit cleanly.
	Shutdown,
}

/// Events read from the bridge's stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
	/// A login QR code is ready for scanning.
	Qr { payload: String },
	Authenticated,
	Ready,
	AuthFailure { message: String },
	Disconnected { reason: String },
	/// Successful reply to a [`BridgeCommand::Send`].
	Sent { id: u64, message_id: String },
	/// Failed reply to a [`BridgeCommand::Send`].
	SendError { id: u64, message: String },
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_command_wire_shape() {
		let command = BridgeCommand::Send {
			id: 7,
			to: "15551234567@c.us".to_string(),
			body: "hi".to_string(),
		};
		let encoded = serde_json::to_string(&command).unwrap();
		assert_eq!(
			encoded,
			r#"{"type":"send","id":7,"to":"15551234567@c.us","body":"hi"}"#
		);

		assert_eq!(
			serde_json::to_string(&BridgeCommand::Shutdown).unwrap(),
			r#"{"type":"shutdown"}"#
		);
	}

	#[test]
	fn test_event_wire_shape() {
		let event: BridgeEvent =
			serde_json::from_str(r#"{"type":"qr","payload":"Q1"}"#).unwrap();
		assert_eq!(
			event,
			BridgeEvent::Qr {
				payload: "Q1".to_string()
			}
		);

		let event: BridgeEvent =
			serde_json::from_str(r#"{"type":"sent","id":3,"message_id":"m-1"}"#).unwrap();
		assert_eq!(
			event,
			BridgeEvent::Sent {
				id: 3,
				message_id: "m-1".to_string()
			}
		);

		let event: BridgeEvent =
			serde_json::from_str(r#"{"type":"disconnected","reason":"logout"}"#).unwrap();
		assert_eq!(
			event,
			BridgeEvent::Disconnected {
				reason: "logout".to_string()
			}
		);
	}
}
