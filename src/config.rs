//! Configuration for Mirror
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (MirrorConfig::default())
//! 2. Config file (`--config`, or ~/.config/mirror/config.toml or config.json5)
//! 3. Environment variables (MIRROR_* prefix)
//! 4. CLI flags (highest priority, applied by the caller)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::MirrorError;
use crate::validation::{
	validate_inbound_buffer, validate_poll_interval_ms, validate_timeout_secs, ValidationError,
	Validator,
};

/// Runtime settings shared by the server and the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MirrorConfig {
	/// Watcher rescan interval
	pub poll_interval_ms: u64,

	/// Inbound updates buffered between the reader and the applier
	pub inbound_buffer: usize,

	/// What the server does with a handshake while a session is running
	pub session_policy: SessionPolicy,

	/// Server listen port
	pub port: u16,

	pub connect_timeout_secs: u64,

	/// Default tracing filter when RUST_LOG is unset
	pub log_level: String,
}

impl Default for MirrorConfig {
	fn default() -> Self {
		MirrorConfig {
			poll_interval_ms: 250,
			inbound_buffer: 1024,
			session_policy: SessionPolicy::Replace,
			port: 7878,
			connect_timeout_secs: 10,
			log_level: "info".to_string(),
		}
	}
}

/// Server behavior when a second peer connects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPolicy {
	/// Stop the running session, then serve the new peer
	#[default]
	Replace,
	/// Refuse the new peer with an error message
	Reject,
}

impl FromStr for SessionPolicy {
	type Err = ValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"replace" => Ok(SessionPolicy::Replace),
			"reject" => Ok(SessionPolicy::Reject),
			other => Err(ValidationError::ConfigError(format!(
				"Unknown session policy '{}' (expected replace or reject)",
				other
			))),
		}
	}
}

impl fmt::Display for SessionPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SessionPolicy::Replace => write!(f, "replace"),
			SessionPolicy::Reject => write!(f, "reject"),
		}
	}
}

impl MirrorConfig {
	/// Defaults, then the config file, then the environment
	pub fn load(explicit: Option<&Path>) -> Result<Self, MirrorError> {
		let mut config = match explicit {
			Some(path) => MirrorConfig::from_file(path)?,
			None => match default_config_path() {
				Some(path) => MirrorConfig::from_file(&path)?,
				None => MirrorConfig::default(),
			},
		};
		config.apply_env(|key| std::env::var(key).ok())?;
		config.validate()?;
		Ok(config)
	}

	/// Read a TOML file, or JSON5 for `.json5`/`.json` files
	pub fn from_file(path: &Path) -> Result<Self, MirrorError> {
		let text = std::fs::read_to_string(path).map_err(|e| MirrorError::InvalidConfig {
			message: format!("Cannot read {}: {}", path.display(), e),
		})?;
		MirrorConfig::parse(&text, path)
	}

	fn parse(text: &str, path: &Path) -> Result<Self, MirrorError> {
		let is_json = matches!(
			path.extension().and_then(|e| e.to_str()),
			Some("json5") | Some("json")
		);
		let parsed = if is_json {
			json5::from_str(text).map_err(|e| e.to_string())
		} else {
			toml::from_str(text).map_err(|e| e.to_string())
		};
		parsed.map_err(|e| MirrorError::InvalidConfig {
			message: format!("{}: {}", path.display(), e),
		})
	}

	/// Override fields from MIRROR_* variables
	pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ValidationError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(v) = lookup("MIRROR_POLL_INTERVAL_MS") {
			self.poll_interval_ms = parse_env("MIRROR_POLL_INTERVAL_MS", &v)?;
		}
		if let Some(v) = lookup("MIRROR_PORT") {
			self.port = parse_env("MIRROR_PORT", &v)?;
		}
		if let Some(v) = lookup("MIRROR_SESSION_POLICY") {
			self.session_policy = v.parse()?;
		}
		if let Some(v) = lookup("MIRROR_LOG_LEVEL") {
			self.log_level = v;
		}
		Ok(())
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn connect_timeout(&self) -> Duration {
		Duration::from_secs(self.connect_timeout_secs)
	}
}

impl Validator for MirrorConfig {
	fn validate(&self) -> Result<(), ValidationError> {
		validate_poll_interval_ms(self.poll_interval_ms)?;
		validate_inbound_buffer(self.inbound_buffer)?;
		validate_timeout_secs(self.connect_timeout_secs)?;
		Ok(())
	}
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ValidationError> {
	value
		.trim()
		.parse()
		.map_err(|_| ValidationError::ConfigError(format!("Invalid value for {}: {}", key, value)))
}

/// First existing file among ~/.config/mirror/config.toml and config.json5
pub fn default_config_path() -> Option<PathBuf> {
	let home = std::env::var_os("HOME")?;
	let dir = PathBuf::from(home).join(".config").join("mirror");
	["config.toml", "config.json5"].iter().map(|name| dir.join(name)).find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use tempfile::TempDir;

	#[test]
	fn test_config_default() {
		let config = MirrorConfig::default();
		assert_eq!(config.poll_interval_ms, 250);
		assert_eq!(config.session_policy, SessionPolicy::Replace);
		assert_eq!(config.port, 7878);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_toml_file_overrides_defaults() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("config.toml");
		std::fs::write(&path, "pollIntervalMs = 50\nsessionPolicy = \"reject\"\n").unwrap();

		let config = MirrorConfig::from_file(&path).unwrap();
		assert_eq!(config.poll_interval_ms, 50);
		assert_eq!(config.session_policy, SessionPolicy::Reject);
		assert_eq!(config.inbound_buffer, 1024);
	}

	#[test]
	fn test_json5_file() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("config.json5");
		std::fs::write(&path, "{ port: 9000, // comment\n logLevel: 'debug' }").unwrap();

		let config = MirrorConfig::from_file(&path).unwrap();
		assert_eq!(config.port, 9000);
		assert_eq!(config.log_level, "debug");
	}

	#[test]
	fn test_bad_file_is_invalid_config() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("config.toml");
		std::fs::write(&path, "pollIntervalMs = \"soon\"").unwrap();
		assert!(matches!(
			MirrorConfig::from_file(&path),
			Err(MirrorError::InvalidConfig { .. })
		));
	}

	#[test]
	fn test_env_overrides() {
		let env: HashMap<&str, &str> = [
			("MIRROR_POLL_INTERVAL_MS", "100"),
			("MIRROR_PORT", "8000"),
			("MIRROR_SESSION_POLICY", "Reject"),
		]
		.into_iter()
		.collect();

		let mut config = MirrorConfig::default();
		config.apply_env(|key| env.get(key).map(|v| v.to_string())).unwrap();
		assert_eq!(config.poll_interval_ms, 100);
		assert_eq!(config.port, 8000);
		assert_eq!(config.session_policy, SessionPolicy::Reject);
	}

	#[test]
	fn test_env_rejects_garbage() {
		let mut config = MirrorConfig::default();
		assert!(config.apply_env(|_| Some("lots".to_string())).is_err());
	}

	#[test]
	fn test_zero_poll_interval_is_invalid() {
		let config = MirrorConfig { poll_interval_ms: 0, ..Default::default() };
		assert!(config.validate().is_err());
	}
}

// vim: ts=4
