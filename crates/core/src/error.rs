use thiserror::Error;

use crate::session::SessionStatus;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
	#[error("instance already exists")]
	AlreadyExists,

	#[error("instance not found")]
	NotFound,

	#[error("{0}")]
	InvalidArgument(String),

	#[error("invalid phone number format")]
	InvalidPhoneFormat,

	#[error("instance is not ready (status: {status})")]
	NotReady { status: SessionStatus },

	#[error("send failed: {source}")]
	SendFailed {
		#[source]
		source: anyhow::Error,
	},

	#[error("initialization failed: {0}")]
	Init(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error("internal error: {0}")]
	Internal(String),
}
