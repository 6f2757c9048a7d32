use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authentication/readiness state of one session.
///
/// `auth_failed`, `disconnected`, and `init_error` are terminal: the session
/// stays there until it is explicitly destroyed. There is no stored
/// "destroyed" state; destruction removes the record from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
	Initializing,
	AwaitingScan,
	Authenticated,
	Ready,
	AuthFailed,
	Disconnected,
	InitError,
}

impl SessionStatus {
	/// Terminal states absorb all further lifecycle events.
	pub fn is_terminal(self) -> bool {
		matches!(
			self,
			SessionStatus::AuthFailed | SessionStatus::Disconnected | SessionStatus::InitError
		)
	}

	/// Sending is permitted only once the client is fully synced.
	pub fn can_send(self) -> bool {
		self == SessionStatus::Ready
	}

	pub fn as_str(self) -> &'static str {
		match self {
			SessionStatus::Initializing => "initializing",
			SessionStatus::AwaitingScan => "awaiting_scan",
			SessionStatus::Authenticated => "authenticated",
			SessionStatus::Ready => "ready",
			SessionStatus::AuthFailed => "auth_failed",
			SessionStatus::Disconnected => "disconnected",
			SessionStatus::InitError => "init_error",
		}
	}
}

impl std::fmt::Display for SessionStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Point-in-time snapshot of one session, as exposed over the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
	pub instance_id: String,
	pub status: SessionStatus,
	/// Last login QR payload; present only while awaiting a scan.
	pub qr: Option<String>,
	pub phone_number: String,
	pub created_at: DateTime<Utc>,
}

/// Receipt for a successfully delivered outbound message.
#[derive(Debug, Clone, Serialize)]
pub struct MessageReceipt {
	/// Transport-assigned message identifier.
	pub id: String,
	pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_wire_names() {
		let encoded = serde_json::to_string(&SessionStatus::AwaitingScan).unwrap();
		assert_eq!(encoded, "\"awaiting_scan\"");
		let decoded: SessionStatus = serde_json::from_str("\"init_error\"").unwrap();
		assert_eq!(decoded, SessionStatus::InitError);
	}

	#[test]
	fn test_terminal_and_sendable_predicates() {
		assert!(SessionStatus::AuthFailed.is_terminal());
		assert!(SessionStatus::Disconnected.is_terminal());
		assert!(SessionStatus::InitError.is_terminal());
		assert!(!SessionStatus::Ready.is_terminal());
		assert!(!SessionStatus::AwaitingScan.is_terminal());

		assert!(SessionStatus::Ready.can_send());
		assert!(!SessionStatus::Authenticated.can_send());
		assert!(!SessionStatus::Initializing.can_send());
	}

	#[test]
	fn test_session_info_serializes_api_field_names() {
		let info = SessionInfo {
			instance_id: "a".to_string(),
			status: SessionStatus::Initializing,
			qr: None,
			phone_number: "15551234567".to_string(),
			created_at: chrono::Utc::now(),
		};
		let value = serde_json::to_value(&info).unwrap();
		assert_eq!(value["instanceId"], "a");
		assert_eq!(value["status"], "initializing");
		assert!(value["qr"].is_null());
		assert_eq!(value["phoneNumber"], "15551234567");
		assert!(value["createdAt"].is_string());
	}
}
