use std::io;

use crate::normalized::{NO_DATA_MESSAGE, REMOTE_MESSAGE, UNKNOWN_MESSAGE};
use crate::{ErrorKind, NormalizedError, codes};

/// Raw failure shapes accepted at the boundary.
#[derive(Debug)]
pub enum Failure {
	/// Already classified; passed through unchanged.
	Normalized(NormalizedError),
	/// A plain error with no structure beyond an optional message.
	Plain(Option<String>),
	/// The call succeeded but returned no data.
	NoData,
	/// An input precondition failed.
	Validation {
		/// What was wrong with the input.
		message: String,
		/// Optional code overriding `VALIDATION_ERROR`.
		code: Option<String>,
	},
	/// The backend rejected the call.
	Remote {
		/// Backend-provided message, possibly empty.
		message: String,
		/// Backend-provided code.
		code: Option<String>,
		/// Transport status, when the backend exposed one.
		status: Option<u16>,
	},
	/// The call never reached the backend, or its response never arrived.
	Network {
		/// Transport-level description.
		message: String,
		/// True when the failure was a timeout.
		timed_out: bool,
	},
}

impl Failure {
	/// Plain error with a message.
	pub fn plain(message: impl Into<String>) -> Self {
		Self::Plain(Some(message.into()))
	}

	/// Validation failure with the default code.
	pub fn validation(message: impl Into<String>) -> Self {
		Self::Validation {
			message: message.into(),
			code: None,
		}
	}

	/// Remote rejection without a transport status.
	pub fn remote(message: impl Into<String>, code: Option<String>) -> Self {
		Self::Remote {
			message: message.into(),
			code,
			status: None,
		}
	}

	/// Connectivity failure.
	pub fn network(message: impl Into<String>) -> Self {
		Self::Network {
			message: message.into(),
			timed_out: false,
		}
	}

	/// Timeout.
	pub fn timeout(message: impl Into<String>) -> Self {
		Self::Network {
			message: message.into(),
			timed_out: true,
		}
	}

	/// Wraps any error as a plain failure carrying its display text.
	pub fn other(err: impl std::error::Error) -> Self {
		Self::plain(err.to_string())
	}
}

impl From<NormalizedError> for Failure {
	fn from(err: NormalizedError) -> Self {
		Self::Normalized(err)
	}
}

impl From<io::Error> for Failure {
	fn from(err: io::Error) -> Self {
		match err.kind() {
			io::ErrorKind::TimedOut => Self::timeout(err.to_string()),
			io::ErrorKind::ConnectionRefused
			| io::ErrorKind::ConnectionReset
			| io::ErrorKind::ConnectionAborted
			| io::ErrorKind::NotConnected
			| io::ErrorKind::BrokenPipe
			| io::ErrorKind::HostUnreachable
			| io::ErrorKind::NetworkUnreachable
			| io::ErrorKind::NetworkDown => Self::network(err.to_string()),
			_ => Self::other(err),
		}
	}
}

impl From<Failure> for NormalizedError {
	fn from(raw: Failure) -> Self {
		match raw {
			Failure::Normalized(err) => err,
			Failure::Plain(message) => {
				let message = message.filter(|m| !m.trim().is_empty()).unwrap_or_else(|| UNKNOWN_MESSAGE.to_string());
				NormalizedError::new(ErrorKind::Unknown, message, codes::UNKNOWN)
			}
			Failure::NoData => NormalizedError::new(ErrorKind::Remote, NO_DATA_MESSAGE, codes::NO_DATA),
			Failure::Validation { message, code } => {
				NormalizedError::new(ErrorKind::Validation, message, code.unwrap_or_else(|| codes::VALIDATION.to_string()))
			}
			Failure::Remote { message, code, status } => {
				let message = if message.trim().is_empty() { REMOTE_MESSAGE.to_string() } else { message };
				let code = match (code, status) {
					(Some(code), _) if !code.is_empty() => code,
					(_, Some(429)) => codes::RATE_LIMITED.to_string(),
					_ => codes::REMOTE.to_string(),
				};
				NormalizedError::new(ErrorKind::Remote, message, code)
			}
			Failure::Network { message, timed_out } => {
				let code = if timed_out { codes::TIMEOUT } else { codes::NETWORK };
				NormalizedError::new(ErrorKind::Network, message, code)
			}
		}
	}
}
