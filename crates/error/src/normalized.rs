use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known error codes attached by the normalizer and the executor.
pub mod codes {
	/// Unclassified failure.
	pub const UNKNOWN: &str = "UNKNOWN_ERROR";
	/// A call succeeded but produced no data.
	pub const NO_DATA: &str = "NO_DATA";
	/// An input precondition failed.
	pub const VALIDATION: &str = "VALIDATION_ERROR";
	/// The backend rejected the operation.
	pub const REMOTE: &str = "REMOTE_ERROR";
	/// The backend throttled the caller.
	pub const RATE_LIMITED: &str = "RATE_LIMITED";
	/// Connectivity failure.
	pub const NETWORK: &str = "NETWORK_ERROR";
	/// The remote call did not complete in time.
	pub const TIMEOUT: &str = "TIMEOUT";
	/// The invocation was cancelled or superseded.
	pub const CANCELLED: &str = "CANCELLED";
}

/// Fallback message for failures that carry none.
pub(crate) const UNKNOWN_MESSAGE: &str = "Unknown error occurred";
pub(crate) const NO_DATA_MESSAGE: &str = "No data returned from query";
pub(crate) const REMOTE_MESSAGE: &str = "Database operation failed";
pub(crate) const CANCELLED_MESSAGE: &str = "Request was cancelled";

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// Caller-fixable input problem. Never retried.
	Validation,
	/// The backend rejected the operation meaningfully. Never retried.
	Remote,
	/// Transient connectivity or timeout failure. Retried up to the limit.
	Network,
	/// Unclassified. Not retried so that bugs are not masked.
	Unknown,
}

impl ErrorKind {
	/// Stable lowercase name, used in log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Validation => "validation",
			Self::Remote => "remote",
			Self::Network => "network",
			Self::Unknown => "unknown",
		}
	}

	/// Returns true for failures expected to resolve on retry.
	pub const fn is_transient(self) -> bool {
		matches!(self, Self::Network)
	}

	/// HTTP-style status a surface would report for this kind.
	pub const fn status_code(self) -> u16 {
		match self {
			Self::Validation => 400,
			Self::Network => 503,
			Self::Remote | Self::Unknown => 500,
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A classified failure.
///
/// Immutable once created; the fields are only readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct NormalizedError {
	kind: ErrorKind,
	message: String,
	code: String,
}

impl NormalizedError {
	/// Creates an error from its parts.
	pub fn new(kind: ErrorKind, message: impl Into<String>, code: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
			code: code.into(),
		}
	}

	/// Validation failure with the default code.
	pub fn validation(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Validation, message, codes::VALIDATION)
	}

	/// Remote rejection.
	pub fn remote(message: impl Into<String>, code: impl Into<String>) -> Self {
		Self::new(ErrorKind::Remote, message, code)
	}

	/// Transient connectivity failure.
	pub fn network(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Network, message, codes::NETWORK)
	}

	/// A call that succeeded without returning data.
	pub fn no_data() -> Self {
		Self::new(ErrorKind::Remote, NO_DATA_MESSAGE, codes::NO_DATA)
	}

	/// The error an aborted or superseded invocation settles with.
	pub fn cancelled() -> Self {
		Self::new(ErrorKind::Network, CANCELLED_MESSAGE, codes::CANCELLED)
	}

	/// Unclassified failure.
	pub fn unknown(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Unknown, message, codes::UNKNOWN)
	}

	/// Returns the classification.
	pub const fn kind(&self) -> ErrorKind {
		self.kind
	}

	/// Returns the user-facing message.
	pub fn message(&self) -> &str {
		&self.message
	}

	/// Returns the machine-readable code.
	pub fn code(&self) -> &str {
		&self.code
	}

	/// Returns true when the failure is expected to resolve on retry.
	///
	/// Cancellation carries the `Network` kind but is never transient.
	pub fn is_transient(&self) -> bool {
		self.kind.is_transient() && !self.is_cancelled()
	}

	/// Returns true for the cancellation error.
	pub fn is_cancelled(&self) -> bool {
		self.kind == ErrorKind::Network && self.code == codes::CANCELLED
	}

	/// Returns true for a throttled remote call.
	pub fn is_rate_limited(&self) -> bool {
		self.kind == ErrorKind::Remote && self.code == codes::RATE_LIMITED
	}
}
