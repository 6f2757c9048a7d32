//! Bridge process discovery.
//!
//! Locates the Node.js executable and the bridge entry script that wraps
//! the messaging engine. Explicit environment overrides win so packaged and
//! development setups can point at their own copies.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::warn;

use wagate_core::{GatewayError, Result};

const BRIDGE_SCRIPT: &str = "bridge.js";

/// Paths required to launch one bridge process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgePaths {
	/// Node.js executable.
	pub node_exe: PathBuf,
	/// Bridge entry script.
	pub bridge_js: PathBuf,
}

/// Locates the bridge runtime.
///
/// Search order:
/// 1. `WAGATE_NODE_EXE` + `WAGATE_BRIDGE_JS` (explicit pair override)
/// 2. `WAGATE_BRIDGE_DIR` containing `bridge.js` (and optionally `node`)
/// 3. `bridge.js` next to the gateway executable, with `node` from PATH
///
/// # Errors
///
/// Returns [`GatewayError::Init`] when no usable runtime is found.
pub fn locate_bridge() -> Result<BridgePaths> {
	if let Some(paths) = try_env_pair() {
		return resolve_candidate("WAGATE_NODE_EXE/WAGATE_BRIDGE_JS", paths);
	}
	if let Some(paths) = try_bridge_dir()? {
		return resolve_candidate("WAGATE_BRIDGE_DIR", paths);
	}
	if let Some(paths) = try_adjacent_script()? {
		return resolve_candidate("adjacent script", paths);
	}
	Err(GatewayError::Init(
		"bridge runtime not found; set WAGATE_BRIDGE_DIR or WAGATE_NODE_EXE/WAGATE_BRIDGE_JS"
			.to_string(),
	))
}

fn resolve_candidate(source: &str, paths: BridgePaths) -> Result<BridgePaths> {
	if node_is_usable(&paths.node_exe) {
		return Ok(paths);
	}
	warn!(
		target = "wagate.bridge",
		source,
		node = %paths.node_exe.display(),
		"candidate node is not runnable; trying PATH fallback"
	);
	let fallback = find_node_executable()?;
	if fallback != paths.node_exe && node_is_usable(&fallback) {
		return Ok(BridgePaths {
			node_exe: fallback,
			bridge_js: paths.bridge_js,
		});
	}
	Err(GatewayError::Init(format!(
		"node executable from {source} is not runnable: {}",
		paths.node_exe.display()
	)))
}

fn try_env_pair() -> Option<BridgePaths> {
	let node_exe = PathBuf::from(std::env::var("WAGATE_NODE_EXE").ok()?);
	let bridge_js = PathBuf::from(std::env::var("WAGATE_BRIDGE_JS").ok()?);
	(node_exe.exists() && bridge_js.exists()).then_some(BridgePaths { node_exe, bridge_js })
}

fn try_bridge_dir() -> Result<Option<BridgePaths>> {
	let Ok(dir) = std::env::var("WAGATE_BRIDGE_DIR") else {
		return Ok(None);
	};
	Ok(paths_in_dir(Path::new(&dir))?)
}

/// Looks for the bridge script inside `dir`; node comes from the same
/// directory when bundled there, otherwise from PATH.
fn paths_in_dir(dir: &Path) -> Result<Option<BridgePaths>> {
	let bridge_js = dir.join(BRIDGE_SCRIPT);
	if !bridge_js.exists() {
		return Ok(None);
	}
	let bundled = if cfg!(windows) {
		dir.join("node.exe")
	} else {
		dir.join("node")
	};
	let node_exe = if bundled.exists() {
		bundled
	} else {
		find_node_executable()?
	};
	Ok(Some(BridgePaths { node_exe, bridge_js }))
}

fn try_adjacent_script() -> Result<Option<BridgePaths>> {
	let Ok(exe) = std::env::current_exe() else {
		return Ok(None);
	};
	let Some(dir) = exe.parent() else {
		return Ok(None);
	};
	paths_in_dir(dir)
}

fn node_is_usable(node: &Path) -> bool {
	Command::new(node)
		.arg("--version")
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.status()
		.map(|status| status.success())
		.unwrap_or(false)
}

/// Finds `node` in PATH or common install locations.
fn find_node_executable() -> Result<PathBuf> {
	#[cfg(not(windows))]
	let which_cmd = "which";
	#[cfg(windows)]
	let which_cmd = "where";

	if let Ok(output) = Command::new(which_cmd).arg("node").output() {
		if output.status.success() {
			let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
			if let Some(first) = found.lines().next() {
				let path = PathBuf::from(first);
				if path.exists() {
					return Ok(path);
				}
			}
		}
	}

	#[cfg(not(windows))]
	let common_locations = [
		"/usr/local/bin/node",
		"/usr/bin/node",
		"/opt/homebrew/bin/node",
	];

	#[cfg(windows)]
	let common_locations = [
		"C:\\Program Files\\nodejs\\node.exe",
		"C:\\Program Files (x86)\\nodejs\\node.exe",
	];

	for location in &common_locations {
		let path = PathBuf::from(location);
		if path.exists() {
			return Ok(path);
		}
	}

	Err(GatewayError::Init(
		"Node.js executable not found; install Node.js or set WAGATE_NODE_EXE".to_string(),
	))
}
