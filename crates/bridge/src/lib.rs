//! Production [`ClientAdapter`](wagate_core::ClientAdapter) implementation.
//!
//! Each session spawns one external Node.js bridge process wrapping the
//! browser-automation engine. The bridge reports lifecycle events and send
//! results as newline-delimited JSON on stdout and accepts commands on
//! stdin; this crate owns process discovery, the stdio transport, and the
//! adapter glue. The engine itself (browser, login persistence) lives
//! entirely in the bridge process.

mod adapter;
mod driver;
mod proto;
mod transport;

pub use adapter::{BridgeAdapter, BridgeFactory};
pub use driver::{BridgePaths, locate_bridge};
pub use proto::{BridgeCommand, BridgeEvent};
