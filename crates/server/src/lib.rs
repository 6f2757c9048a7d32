//! wagate HTTP server: configuration, routing, and process entry glue.

pub mod config;
pub mod http;
pub mod logging;
