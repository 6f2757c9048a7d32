//! HTTP surface of the gateway.
//!
//! Thin translation layer: request bodies are validated here, everything
//! else is delegated to the [`SessionRegistry`]. Every error response keeps
//! the `{"status":"error","message",...}` envelope.

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use wagate_core::{GatewayError, SessionRegistry};

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
	pub registry: SessionRegistry,
	/// Production mode hides internal error details from 500 bodies.
	pub production: bool,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/", get(health))
		.route("/instances", get(list_instances).post(create_instance))
		.route("/instances/{id}/status", get(instance_status))
		.route("/instances/{id}/send-message", post(send_message))
		.route("/instances/{id}", delete(delete_instance))
		.with_state(state)
}

async fn health() -> &'static str {
	"OK"
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CreateInstanceBody {
	instance_id: String,
	phone_number: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SendMessageBody {
	number: String,
	message: String,
}

async fn list_instances(State(state): State<AppState>) -> Response {
	let instances = state.registry.list().await;
	Json(json!({ "status": "success", "instances": instances })).into_response()
}

async fn create_instance(
	State(state): State<AppState>,
	body: Result<Json<CreateInstanceBody>, JsonRejection>,
) -> Response {
	let Ok(Json(body)) = body else {
		return error_response(StatusCode::BAD_REQUEST, "Invalid request body", None);
	};
	if body.instance_id.is_empty() || body.phone_number.is_empty() {
		return error_response(
			StatusCode::BAD_REQUEST,
			"Instance ID and phone number are required",
			None,
		);
	}

	match state
		.registry
		.create(&body.instance_id, &body.phone_number)
		.await
	{
		Ok(info) => Json(json!({
			"status": "success",
			"message": "Instance created successfully",
			"instanceId": info.instance_id,
		}))
		.into_response(),
		Err(err) => failure(&state, err),
	}
}

async fn instance_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
	match state.registry.get(&id).await {
		Ok(info) => Json(json!({ "status": "success", "data": info })).into_response(),
		Err(err) => failure(&state, err),
	}
}

async fn send_message(
	State(state): State<AppState>,
	Path(id): Path<String>,
	body: Result<Json<SendMessageBody>, JsonRejection>,
) -> Response {
	let Ok(Json(body)) = body else {
		return error_response(StatusCode::BAD_REQUEST, "Invalid request body", None);
	};

	// Unknown id wins over payload problems, but an empty number or message
	// is rejected here, before the registry is consulted, so the answer does
	// not depend on the session's current state.
	if let Err(err) = state.registry.get(&id).await {
		return failure(&state, err);
	}
	if body.number.is_empty() || body.message.is_empty() {
		return error_response(
			StatusCode::BAD_REQUEST,
			"Number and message are required",
			None,
		);
	}

	match state.registry.send(&id, &body.number, &body.message).await {
		Ok(receipt) => Json(json!({
			"status": "success",
			"message": "Message sent successfully",
			"data": receipt,
		}))
		.into_response(),
		Err(err) => failure(&state, err),
	}
}

async fn delete_instance(State(state): State<AppState>, Path(id): Path<String>) -> Response {
	match state.registry.destroy(&id).await {
		Ok(()) => Json(json!({
			"status": "success",
			"message": "Instance deleted successfully",
		}))
		.into_response(),
		Err(err) => failure(&state, err),
	}
}

/// Maps the error taxonomy onto the stable HTTP contract.
fn failure(state: &AppState, err: GatewayError) -> Response {
	match err {
		GatewayError::AlreadyExists => {
			error_response(StatusCode::BAD_REQUEST, "Instance already exists", None)
		}
		GatewayError::NotFound => {
			error_response(StatusCode::NOT_FOUND, "Instance not found", None)
		}
		GatewayError::NotReady { .. } => {
			error_response(StatusCode::BAD_REQUEST, "Instance is not ready", None)
		}
		GatewayError::InvalidArgument(message) => {
			error_response(StatusCode::BAD_REQUEST, &message, None)
		}
		GatewayError::InvalidPhoneFormat => {
			error_response(StatusCode::BAD_REQUEST, "Invalid phone number format", None)
		}
		GatewayError::SendFailed { source } => {
			error!(target = "wagate.http", error = %source, "send failed");
			error_response(
				StatusCode::INTERNAL_SERVER_ERROR,
				"Failed to send message",
				Some(detail(state, source.to_string())),
			)
		}
		GatewayError::Init(message) => {
			error!(target = "wagate.http", error = %message, "instance creation failed");
			error_response(
				StatusCode::INTERNAL_SERVER_ERROR,
				"Failed to create instance",
				Some(detail(state, message)),
			)
		}
		other => {
			error!(target = "wagate.http", error = %other, "internal error");
			error_response(
				StatusCode::INTERNAL_SERVER_ERROR,
				"Internal server error",
				Some(detail(state, other.to_string())),
			)
		}
	}
}

fn detail(state: &AppState, cause: String) -> String {
	if state.production {
		"An unexpected error occurred".to_string()
	} else {
		cause
	}
}

fn error_response(code: StatusCode, message: &str, error: Option<String>) -> Response {
	let mut body = json!({ "status": "error", "message": message });
	if let Some(error) = error {
		body["error"] = json!(error);
	}
	(code, Json(body)).into_response()
}
