//! Error types for configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax or shape.
	#[error("TOML parse error{}: {error}", path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
	Parse {
		/// File being parsed, when loaded from disk.
		path: Option<PathBuf>,
		/// The underlying parse error.
		error: toml::de::Error,
	},

	/// Error rendering configuration back to TOML.
	#[error("TOML render error: {0}")]
	Render(#[from] toml::ser::Error),

	/// A field holds a value outside its accepted range.
	#[error("invalid value for '{field}': {reason}")]
	InvalidValue {
		/// Dotted field path, e.g. `retry.retry_delay_ms`.
		field: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
