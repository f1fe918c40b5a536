use curator_error::Failure;

/// Failure reported by a backend client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
	/// The backend received the call and refused it.
	#[error("{message}")]
	Rejected {
		message: String,
		code: Option<String>,
		status: Option<u16>,
	},
	/// The call did not complete at the transport level.
	#[error("transport failure: {message}")]
	Transport { message: String, timed_out: bool },
}

impl BackendError {
	pub fn rejected(message: impl Into<String>, code: impl Into<String>) -> Self {
		Self::Rejected {
			message: message.into(),
			code: Some(code.into()),
			status: None,
		}
	}

	pub fn rate_limited() -> Self {
		Self::Rejected {
			message: "Too many requests".into(),
			code: None,
			status: Some(429),
		}
	}

	pub fn offline(message: impl Into<String>) -> Self {
		Self::Transport {
			message: message.into(),
			timed_out: false,
		}
	}

	pub fn timeout() -> Self {
		Self::Transport {
			message: "request timed out".into(),
			timed_out: true,
		}
	}
}

impl From<BackendError> for Failure {
	fn from(err: BackendError) -> Self {
		match err {
			BackendError::Rejected { message, code, status } => Failure::Remote { message, code, status },
			BackendError::Transport { message, timed_out } => Failure::Network { message, timed_out },
		}
	}
}
