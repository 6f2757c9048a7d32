use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use wagate_bridge::BridgeFactory;
use wagate_core::SessionRegistry;
use wagate_server::config::ServerConfig;
use wagate_server::http::{AppState, router};
use wagate_server::logging;

#[tokio::main]
async fn main() -> Result<()> {
	let config = ServerConfig::parse();
	logging::init_logging(config.verbose);

	let auth_root = config.auth_root();
	std::fs::create_dir_all(&auth_root)
		.with_context(|| format!("failed to create auth root: {}", auth_root.display()))?;

	let factory = Arc::new(BridgeFactory::new().context("bridge runtime unavailable")?);
	let registry = SessionRegistry::new(factory, &auth_root);

	let app = router(AppState {
		registry,
		production: config.is_production(),
	});

	let addr: SocketAddr = format!("{}:{}", config.host, config.port)
		.parse()
		.with_context(|| format!("invalid host/port combination: {}:{}", config.host, config.port))?;
	let listener = TcpListener::bind(addr)
		.await
		.with_context(|| format!("failed to bind {addr}"))?;

	info!(
		target = "wagate",
		%addr,
		auth_root = %auth_root.display(),
		"gateway listening"
	);

	let shutdown = shutdown_signal().context("failed to install signal handlers")?;
	axum::serve(listener, app.into_make_service())
		.with_graceful_shutdown(shutdown)
		.await
		.context("server error")
}

#[cfg(unix)]
fn shutdown_signal() -> Result<impl std::future::Future<Output = ()>> {
	use tokio::signal::unix::{SignalKind, signal};

	let mut sigterm =
		signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
	Ok(async move {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				info!(target = "wagate", "received Ctrl+C, shutting down");
			}
			_ = sigterm.recv() => {
				info!(target = "wagate", "received SIGTERM, shutting down");
			}
		}
	})
}

#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl std::future::Future<Output = ()>> {
	Ok(async {
		let _ = tokio::signal::ctrl_c().await;
		info!(target = "wagate", "received Ctrl+C, shutting down");
	})
}
