use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use curator_error::NormalizedError;
use serde::{Deserialize, Serialize};

/// Retries after the first attempt when none are configured.
pub const DEFAULT_RETRIES: u32 = 3;
/// Base backoff delay in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Retry policy for one executor.
///
/// Backoff is linear: the wait after failed attempt `n` is
/// `retry_delay * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
	/// Retries after the first attempt.
	pub retries: u32,
	/// Base backoff delay in milliseconds.
	pub retry_delay_ms: u64,
	/// Also retry remote rejections tagged `RATE_LIMITED`.
	pub retry_rate_limited: bool,
}

impl Default for RetrySettings {
	fn default() -> Self {
		Self {
			retries: DEFAULT_RETRIES,
			retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
			retry_rate_limited: false,
		}
	}
}

impl RetrySettings {
	/// Base backoff delay.
	pub const fn retry_delay(&self) -> Duration {
		Duration::from_millis(self.retry_delay_ms)
	}

	/// Wait before the retry that follows failed attempt `attempt` (1-based).
	pub fn delay_for(&self, attempt: u32) -> Duration {
		self.retry_delay().saturating_mul(attempt)
	}

	/// Returns true when failed attempt `attempt` (1-based) should be retried.
	pub fn should_retry(&self, err: &NormalizedError, attempt: u32) -> bool {
		if attempt > self.retries {
			return false;
		}
		err.is_transient() || (self.retry_rate_limited && err.is_rate_limited())
	}
}

/// Hook invoked with the resolved value of a current invocation.
pub type SuccessHook<T> = Arc<dyn Fn(&T) + Send + Sync>;
/// Hook invoked with the terminal error of a current invocation.
pub type ErrorHook = Arc<dyn Fn(&NormalizedError) + Send + Sync>;

/// Executor configuration: retry policy plus optional settlement hooks.
pub struct MutationOptions<T> {
	pub(crate) retry: RetrySettings,
	pub(crate) on_success: Option<SuccessHook<T>>,
	pub(crate) on_error: Option<ErrorHook>,
}

impl<T> MutationOptions<T> {
	pub fn new() -> Self {
		Self::from(RetrySettings::default())
	}

	pub fn retries(mut self, retries: u32) -> Self {
		self.retry.retries = retries;
		self
	}

	pub fn retry_delay(mut self, delay: Duration) -> Self {
		self.retry.retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
		self
	}

	pub fn retry_rate_limited(mut self, enabled: bool) -> Self {
		self.retry.retry_rate_limited = enabled;
		self
	}

	pub fn on_success(mut self, hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
		self.on_success = Some(Arc::new(hook));
		self
	}

	pub fn on_error(mut self, hook: impl Fn(&NormalizedError) + Send + Sync + 'static) -> Self {
		self.on_error = Some(Arc::new(hook));
		self
	}

	/// Returns the retry policy.
	pub const fn retry(&self) -> &RetrySettings {
		&self.retry
	}
}

impl<T> Default for MutationOptions<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> From<RetrySettings> for MutationOptions<T> {
	fn from(retry: RetrySettings) -> Self {
		Self {
			retry,
			on_success: None,
			on_error: None,
		}
	}
}

impl<T> Clone for MutationOptions<T> {
	fn clone(&self) -> Self {
		Self {
			retry: self.retry,
			on_success: self.on_success.clone(),
			on_error: self.on_error.clone(),
		}
	}
}

impl<T> fmt::Debug for MutationOptions<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MutationOptions")
			.field("retry", &self.retry)
			.field("on_success", &self.on_success.is_some())
			.field("on_error", &self.on_error.is_some())
			.finish()
	}
}
