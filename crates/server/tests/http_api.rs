use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use wagate_core::adapter::{AdapterFactory, ClientAdapter, ClientEvent, EventSender};
use wagate_core::SessionRegistry;
use wagate_server::http::{AppState, router};

struct StubAdapter {
	fail_send: bool,
}

#[async_trait]
impl ClientAdapter for StubAdapter {
	async fn start(&self) -> anyhow::Result<()> {
		Ok(())
	}

	async fn send_text(&self, recipient: &str, _body: &str) -> anyhow::Result<String> {
		if self.fail_send {
			anyhow::bail!("engine rejected the message");
		}
		// Embed the recipient so tests can observe normalization.
		Ok(format!("true_{recipient}_3EB0"))
	}

	async fn destroy(&self) -> anyhow::Result<()> {
		Ok(())
	}
}

#[derive(Default)]
struct StubFactory {
	fail_send: bool,
	senders: Mutex<HashMap<String, EventSender>>,
}

impl StubFactory {
	fn emit(&self, instance_id: &str, event: ClientEvent) {
		let senders = self.senders.lock().unwrap();
		senders[instance_id].send(event).expect("lifecycle pump gone");
	}
}

impl AdapterFactory for StubFactory {
	fn create(
		&self,
		instance_id: &str,
		_data_dir: &std::path::Path,
		events: EventSender,
	) -> anyhow::Result<Arc<dyn ClientAdapter>> {
		self.senders
			.lock()
			.unwrap()
			.insert(instance_id.to_string(), events);
		Ok(Arc::new(StubAdapter {
			fail_send: self.fail_send,
		}))
	}
}

struct Gateway {
	base: String,
	client: reqwest::Client,
	factory: Arc<StubFactory>,
	_data_root: tempfile::TempDir,
}

async fn spawn_gateway_with(factory: StubFactory, production: bool) -> Gateway {
	let data_root = tempfile::tempdir().expect("failed to create temp data root");
	let factory = Arc::new(factory);
	let registry = SessionRegistry::new(
		Arc::clone(&factory) as Arc<dyn AdapterFactory>,
		data_root.path(),
	);
	let app = router(AppState {
		registry,
		production,
	});

	let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
		.await
		.expect("failed to bind test listener");
	let addr: SocketAddr = listener.local_addr().expect("listener address");
	tokio::spawn(async move {
		axum::serve(listener, app.into_make_service())
			.await
			.expect("test server failed");
	});

	Gateway {
		base: format!("http://{addr}"),
		client: reqwest::Client::new(),
		factory,
		_data_root: data_root,
	}
}

async fn spawn_gateway() -> Gateway {
	spawn_gateway_with(StubFactory::default(), false).await
}

impl Gateway {
	async fn create(&self, instance_id: &str, phone_number: &str) -> (u16, Value) {
		self.post(
			"/instances",
			serde_json::json!({ "instanceId": instance_id, "phoneNumber": phone_number }),
		)
		.await
	}

	async fn post(&self, path: &str, body: Value) -> (u16, Value) {
		let response = self
			.client
			.post(format!("{}{path}", self.base))
			.json(&body)
			.send()
			.await
			.expect("request failed");
		let status = response.status().as_u16();
		(status, response.json().await.expect("invalid JSON body"))
	}

	async fn get(&self, path: &str) -> (u16, Value) {
		let response = self
			.client
			.get(format!("{}{path}", self.base))
			.send()
			.await
			.expect("request failed");
		let status = response.status().as_u16();
		(status, response.json().await.expect("invalid JSON body"))
	}

	async fn delete(&self, path: &str) -> (u16, Value) {
		let response = self
			.client
			.delete(format!("{}{path}", self.base))
			.send()
			.await
			.expect("request failed");
		let status = response.status().as_u16();
		(status, response.json().await.expect("invalid JSON body"))
	}

	async fn wait_for_status(&self, instance_id: &str, want: &str) -> Value {
		for _ in 0..200 {
			let (status, body) = self.get(&format!("/instances/{instance_id}/status")).await;
			if status == 200 && body["data"]["status"] == want {
				return body;
			}
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
		panic!("instance {instance_id} never reached status {want}");
	}
}

#[tokio::test]
async fn create_then_list_shows_initializing_instance() {
	let gw = spawn_gateway().await;

	let (status, body) = gw.create("alpha", "15551234567").await;
	assert_eq!(status, 200, "unexpected body: {body}");
	assert_eq!(body["status"], "success");
	assert_eq!(body["instanceId"], "alpha");

	let (status, body) = gw.get("/instances").await;
	assert_eq!(status, 200);
	assert_eq!(body["status"], "success");
	let instances = body["instances"].as_array().expect("instances array");
	assert_eq!(instances.len(), 1);
	assert_eq!(instances[0]["instanceId"], "alpha");
	assert_eq!(instances[0]["status"], "initializing");
	assert!(instances[0]["qr"].is_null());
	assert_eq!(instances[0]["phoneNumber"], "15551234567");
	assert!(instances[0]["createdAt"].is_string());
}

#[tokio::test]
async fn create_requires_both_fields() {
	let gw = spawn_gateway().await;

	let (status, body) = gw
		.post("/instances", serde_json::json!({ "instanceId": "alpha" }))
		.await;
	assert_eq!(status, 400);
	assert_eq!(body["status"], "error");
	assert_eq!(body["message"], "Instance ID and phone number are required");

	let (status, _) = gw
		.post("/instances", serde_json::json!({ "phoneNumber": "15551234567" }))
		.await;
	assert_eq!(status, 400);
}

#[tokio::test]
async fn duplicate_create_is_rejected() {
	let gw = spawn_gateway().await;
	gw.create("alpha", "15551234567").await;

	let (status, body) = gw.create("alpha", "15559999999").await;
	assert_eq!(status, 400);
	assert_eq!(body["status"], "error");
	assert_eq!(body["message"], "Instance already exists");
}

#[tokio::test]
async fn status_of_unknown_instance_is_404() {
	let gw = spawn_gateway().await;
	let (status, body) = gw.get("/instances/ghost/status").await;
	assert_eq!(status, 404);
	assert_eq!(body["status"], "error");
	assert_eq!(body["message"], "Instance not found");
}

#[tokio::test]
async fn qr_scan_login_and_send_round_trip() {
	let gw = spawn_gateway().await;
	gw.create("alpha", "15551234567").await;

	gw.factory.emit("alpha", ClientEvent::Qr("Q1".to_string()));
	let body = gw.wait_for_status("alpha", "awaiting_scan").await;
	assert_eq!(body["data"]["qr"], "Q1");

	gw.factory.emit("alpha", ClientEvent::Ready);
	let body = gw.wait_for_status("alpha", "ready").await;
	assert!(body["data"]["qr"].is_null());

	let (status, body) = gw
		.post(
			"/instances/alpha/send-message",
			serde_json::json!({ "number": "+1 (555) 123-4567", "message": "hi" }),
		)
		.await;
	assert_eq!(status, 200, "unexpected body: {body}");
	assert_eq!(body["status"], "success");
	assert_eq!(body["message"], "Message sent successfully");
	// The stub echoes the recipient address inside the message id.
	assert_eq!(body["data"]["id"], "true_15551234567@c.us_3EB0");
	assert!(body["data"]["timestamp"].is_string());
}

#[tokio::test]
async fn send_is_refused_until_ready() {
	let gw = spawn_gateway().await;
	gw.create("alpha", "15551234567").await;

	let (status, body) = gw
		.post(
			"/instances/alpha/send-message",
			serde_json::json!({ "number": "15551234567", "message": "hi" }),
		)
		.await;
	assert_eq!(status, 400);
	assert_eq!(body["message"], "Instance is not ready");

	// Still refused while waiting for the scan.
	gw.factory.emit("alpha", ClientEvent::Qr("Q1".to_string()));
	gw.wait_for_status("alpha", "awaiting_scan").await;
	let (status, _) = gw
		.post(
			"/instances/alpha/send-message",
			serde_json::json!({ "number": "15551234567", "message": "hi" }),
		)
		.await;
	assert_eq!(status, 400);
}

#[tokio::test]
async fn empty_message_is_invalid_in_every_state() {
	let gw = spawn_gateway().await;
	gw.create("alpha", "15551234567").await;

	// Not ready yet, but the empty message wins over the readiness check.
	let (status, body) = gw
		.post(
			"/instances/alpha/send-message",
			serde_json::json!({ "number": "15551234567", "message": "" }),
		)
		.await;
	assert_eq!(status, 400);
	assert_eq!(body["message"], "Number and message are required");

	gw.factory.emit("alpha", ClientEvent::Ready);
	gw.wait_for_status("alpha", "ready").await;
	let (status, body) = gw
		.post(
			"/instances/alpha/send-message",
			serde_json::json!({ "number": "15551234567", "message": "" }),
		)
		.await;
	assert_eq!(status, 400);
	assert_eq!(body["message"], "Number and message are required");
}

#[tokio::test]
async fn short_number_is_rejected() {
	let gw = spawn_gateway().await;
	gw.create("alpha", "15551234567").await;
	gw.factory.emit("alpha", ClientEvent::Ready);
	gw.wait_for_status("alpha", "ready").await;

	let (status, body) = gw
		.post(
			"/instances/alpha/send-message",
			serde_json::json!({ "number": "12-34", "message": "hi" }),
		)
		.await;
	assert_eq!(status, 400);
	assert_eq!(body["message"], "Invalid phone number format");
}

#[tokio::test]
async fn send_to_unknown_instance_is_404() {
	let gw = spawn_gateway().await;
	let (status, body) = gw
		.post(
			"/instances/ghost/send-message",
			serde_json::json!({ "number": "15551234567", "message": "hi" }),
		)
		.await;
	assert_eq!(status, 404);
	assert_eq!(body["message"], "Instance not found");
}

#[tokio::test]
async fn send_failure_surfaces_cause_outside_production() {
	let gw = spawn_gateway_with(
		StubFactory {
			fail_send: true,
			..StubFactory::default()
		},
		false,
	)
	.await;
	gw.create("alpha", "15551234567").await;
	gw.factory.emit("alpha", ClientEvent::Ready);
	gw.wait_for_status("alpha", "ready").await;

	let (status, body) = gw
		.post(
			"/instances/alpha/send-message",
			serde_json::json!({ "number": "15551234567", "message": "hi" }),
		)
		.await;
	assert_eq!(status, 500);
	assert_eq!(body["message"], "Failed to send message");
	assert!(
		body["error"]
			.as_str()
			.unwrap()
			.contains("engine rejected the message")
	);

	// A failed send does not change the session status.
	let (_, body) = gw.get("/instances/alpha/status").await;
	assert_eq!(body["data"]["status"], "ready");
}

#[tokio::test]
async fn send_failure_is_generic_in_production() {
	let gw = spawn_gateway_with(
		StubFactory {
			fail_send: true,
			..StubFactory::default()
		},
		true,
	)
	.await;
	gw.create("alpha", "15551234567").await;
	gw.factory.emit("alpha", ClientEvent::Ready);
	gw.wait_for_status("alpha", "ready").await;

	let (status, body) = gw
		.post(
			"/instances/alpha/send-message",
			serde_json::json!({ "number": "15551234567", "message": "hi" }),
		)
		.await;
	assert_eq!(status, 500);
	assert_eq!(body["error"], "An unexpected error occurred");
}

#[tokio::test]
async fn auth_failure_is_visible_and_terminal() {
	let gw = spawn_gateway().await;
	gw.create("alpha", "15551234567").await;

	gw.factory
		.emit("alpha", ClientEvent::AuthFailure("bad credentials".to_string()));
	gw.wait_for_status("alpha", "auth_failed").await;

	// A late ready from the engine must not resurrect the session.
	gw.factory.emit("alpha", ClientEvent::Ready);
	tokio::time::sleep(Duration::from_millis(50)).await;
	let (_, body) = gw.get("/instances/alpha/status").await;
	assert_eq!(body["data"]["status"], "auth_failed");
}

#[tokio::test]
async fn delete_unknown_instance_is_404() {
	let gw = spawn_gateway().await;
	let (status, body) = gw.delete("/instances/ghost").await;
	assert_eq!(status, 404);
	assert_eq!(body["message"], "Instance not found");
}

#[tokio::test]
async fn delete_removes_instance_and_frees_the_id() {
	let gw = spawn_gateway().await;
	gw.create("alpha", "15551234567").await;
	gw.factory.emit("alpha", ClientEvent::Qr("Q1".to_string()));
	gw.wait_for_status("alpha", "awaiting_scan").await;

	let (status, body) = gw.delete("/instances/alpha").await;
	assert_eq!(status, 200);
	assert_eq!(body["status"], "success");

	let (status, _) = gw.get("/instances/alpha/status").await;
	assert_eq!(status, 404);
	let (_, body) = gw.get("/instances").await;
	assert_eq!(body["instances"].as_array().unwrap().len(), 0);

	// Same id starts over as a fresh record.
	let (status, _) = gw.create("alpha", "15551234567").await;
	assert_eq!(status, 200);
	let (_, body) = gw.get("/instances/alpha/status").await;
	assert_eq!(body["data"]["status"], "initializing");
}

#[tokio::test]
async fn root_route_answers_ok() {
	let gw = spawn_gateway().await;
	let response = gw
		.client
		.get(format!("{}/", gw.base))
		.send()
		.await
		.expect("request failed");
	assert_eq!(response.status().as_u16(), 200);
	assert_eq!(response.text().await.unwrap(), "OK");
}
