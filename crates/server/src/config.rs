use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "wagate")]
#[command(about = "Multi-session web-messaging gateway")]
#[command(version)]
pub struct ServerConfig {
	/// Address to bind the HTTP API on.
	#[arg(long, default_value = "0.0.0.0")]
	pub host: String,

	/// Port for the HTTP API.
	#[arg(short, long, env = "PORT", default_value_t = 3000)]
	pub port: u16,

	/// Root directory for per-session auth storage.
	#[arg(long, value_name = "DIR")]
	pub data_dir: Option<PathBuf>,

	/// Deployment environment; `production` hides error details in responses.
	#[arg(long, env = "WAGATE_ENV", default_value = "development")]
	pub env: String,

	/// Increase verbosity (-v debug, -vv trace)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,
}

impl ServerConfig {
	pub fn is_production(&self) -> bool {
		self.env == "production"
	}

	/// Resolved auth-storage root: explicit flag, platform data dir, or a
	/// local dot-directory as the last resort.
	pub fn auth_root(&self) -> PathBuf {
		if let Some(dir) = &self.data_dir {
			return dir.clone();
		}
		dirs::data_local_dir()
			.map(|dir| dir.join("wagate").join("auth"))
			.unwrap_or_else(|| PathBuf::from(".wagate-auth"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = ServerConfig::parse_from(["wagate"]);
		assert_eq!(config.host, "0.0.0.0");
		assert_eq!(config.port, 3000);
		assert!(!config.is_production());
	}

	#[test]
	fn test_explicit_data_dir_wins() {
		let config =
			ServerConfig::parse_from(["wagate", "--data-dir", "/tmp/wagate-test-auth"]);
		assert_eq!(config.auth_root(), PathBuf::from("/tmp/wagate-test-auth"));
	}

	#[test]
	fn test_production_env() {
		let config = ServerConfig::parse_from(["wagate", "--env", "production"]);
		assert!(config.is_production());
	}
}
