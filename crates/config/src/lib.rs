//! Runtime configuration loaded from TOML.
//!
//! Every section and field is optional:
//!
//! ```toml
//! [retry]
//! retries = 3
//! retry_delay_ms = 1000
//! retry_rate_limited = false
//!
//! [log]
//! filter = "curator=info"
//!
//! [backend]
//! url = "https://project.example.co"
//! anon_key = "public-anon-key"
//! ```

mod error;

use std::path::{Path, PathBuf};

pub use curator_mutation::RetrySettings;
pub use error::{ConfigError, Result};
use serde::{Deserialize, Serialize};

/// Default tracing filter directive.
pub const DEFAULT_LOG_FILTER: &str = "curator=info";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	pub retry: RetrySettings,
	pub log: LogSettings,
	pub backend: BackendSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
	/// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` takes precedence.
	pub filter: String,
	/// Directory for a per-process log file.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub dir: Option<PathBuf>,
}

impl Default for LogSettings {
	fn default() -> Self {
		Self {
			filter: DEFAULT_LOG_FILTER.to_string(),
			dir: None,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendSettings {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub anon_key: Option<String>,
}

impl Config {
	/// Parses and validates configuration text.
	pub fn from_toml(text: &str) -> Result<Self> {
		Self::parse(text, None)
	}

	/// Reads, parses and validates the file at `path`.
	pub fn load(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::parse(&text, Some(path))
	}

	/// Loads `path` when given, defaults otherwise.
	pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
		match path {
			Some(path) => Self::load(path),
			None => Ok(Self::default()),
		}
	}

	fn parse(text: &str, path: Option<&Path>) -> Result<Self> {
		let config: Self = toml::from_str(text).map_err(|error| ConfigError::Parse {
			path: path.map(Path::to_path_buf),
			error,
		})?;
		config.validate()?;
		Ok(config)
	}

	/// Checks cross-field constraints.
	pub fn validate(&self) -> Result<()> {
		if self.retry.retries > 0 && self.retry.retry_delay_ms == 0 {
			return Err(ConfigError::InvalidValue {
				field: "retry.retry_delay_ms",
				reason: "must be greater than 0 when retries are enabled".into(),
			});
		}
		if let Some(url) = &self.backend.url
			&& !(url.starts_with("http://") || url.starts_with("https://"))
		{
			return Err(ConfigError::InvalidValue {
				field: "backend.url",
				reason: format!("expected an http(s) URL, got '{url}'"),
			});
		}
		if self.log.filter.trim().is_empty() {
			return Err(ConfigError::InvalidValue {
				field: "log.filter",
				reason: "must not be empty".into(),
			});
		}
		Ok(())
	}

	/// Renders the configuration as TOML.
	pub fn to_toml(&self) -> Result<String> {
		Ok(toml::to_string_pretty(self)?)
	}
}
