use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

pub fn init_logging(verbosity: u8) {
	// 0 = info for the gateway, bridge plumbing kept to warnings
	// 1 (-v) = debug for the wagate crates
	// 2+ (-vv) = trace for everything
	let filter = match verbosity {
		0 => "info,wagate_bridge=warn",
		1 => "info,wagate_core=debug,wagate_bridge=debug,wagate_server=debug",
		_ => "trace",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
