use curator_error::NormalizedError;

/// Lifecycle phase of an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionStatus {
	/// Nothing has been executed yet.
	Idle,
	/// An invocation is in flight, possibly between retries.
	Running,
	/// The latest invocation resolved.
	Succeeded,
	/// The latest invocation failed terminally or was cancelled.
	Failed,
}

impl ExecutionStatus {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Running => "running",
			Self::Succeeded => "succeeded",
			Self::Failed => "failed",
		}
	}
}

/// Observable state of one executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionState {
	status: ExecutionStatus,
	error: Option<NormalizedError>,
	attempt: u32,
}

impl ExecutionState {
	pub(crate) const fn idle() -> Self {
		Self {
			status: ExecutionStatus::Idle,
			error: None,
			attempt: 0,
		}
	}

	pub(crate) const fn running(attempt: u32) -> Self {
		Self {
			status: ExecutionStatus::Running,
			error: None,
			attempt,
		}
	}

	pub(crate) const fn succeeded(attempt: u32) -> Self {
		Self {
			status: ExecutionStatus::Succeeded,
			error: None,
			attempt,
		}
	}

	pub(crate) fn failed(error: NormalizedError, attempt: u32) -> Self {
		Self {
			status: ExecutionStatus::Failed,
			error: Some(error),
			attempt,
		}
	}

	pub const fn status(&self) -> ExecutionStatus {
		self.status
	}

	/// Terminal error of a failed invocation.
	pub fn error(&self) -> Option<&NormalizedError> {
		self.error.as_ref()
	}

	/// Attempts made by the latest invocation (1-based, 0 when idle).
	pub const fn attempt(&self) -> u32 {
		self.attempt
	}

	pub fn is_loading(&self) -> bool {
		self.status == ExecutionStatus::Running
	}
}

impl Default for ExecutionState {
	fn default() -> Self {
		Self::idle()
	}
}
