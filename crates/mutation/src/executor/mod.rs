use std::future::Future;
use std::sync::Arc;

use curator_error::{Failure, NormalizedError, normalize};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::options::MutationOptions;
use crate::state::ExecutionState;
use crate::token::{GenerationClock, GenerationToken};

/// Runs async operations with bounded retry and cooperative cancellation.
///
/// Each call to [`Self::execute`] starts a new generation and cancels the
/// previous one, so at most one invocation per executor is live. Settlements
/// from superseded generations never touch state or fire hooks; their
/// callers receive the cancellation error instead.
///
/// Cloning yields another handle to the same executor. Dropping an
/// in-flight `execute` future cancels its invocation.
pub struct MutationExecutor<T> {
	inner: Arc<Inner<T>>,
}

struct Inner<T> {
	name: &'static str,
	options: MutationOptions<T>,
	clock: GenerationClock,
	current: Mutex<Option<GenerationToken>>,
	state: watch::Sender<ExecutionState>,
}

impl<T> Clone for MutationExecutor<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> std::fmt::Debug for MutationExecutor<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MutationExecutor")
			.field("name", &self.inner.name)
			.field("options", &self.inner.options)
			.field("state", &*self.inner.state.borrow())
			.finish()
	}
}

impl<T> MutationExecutor<T> {
	/// Creates an idle executor. `name` labels its log events.
	pub fn new(name: &'static str, options: MutationOptions<T>) -> Self {
		let (state, _) = watch::channel(ExecutionState::default());
		Self {
			inner: Arc::new(Inner {
				name,
				options,
				clock: GenerationClock::default(),
				current: Mutex::new(None),
				state,
			}),
		}
	}

	pub fn name(&self) -> &'static str {
		self.inner.name
	}

	/// Snapshot of the current state.
	pub fn state(&self) -> ExecutionState {
		self.inner.state.borrow().clone()
	}

	/// Receiver notified on every state transition.
	pub fn subscribe(&self) -> watch::Receiver<ExecutionState> {
		self.inner.state.subscribe()
	}

	pub fn is_running(&self) -> bool {
		self.inner.state.borrow().is_loading()
	}

	/// Cancels the live invocation, if any.
	///
	/// Takes effect at the invocation's next resumption point: a pending
	/// backoff wait aborts immediately, an attempt already in flight runs to
	/// completion and its settlement is discarded.
	pub fn cancel(&self) {
		if let Some(token) = self.inner.current.lock().as_ref() {
			tracing::debug!(mutation = self.inner.name, generation = token.generation(), "mutation.cancel");
			token.cancel();
		}
	}

	/// Runs `operation`, retrying transient failures with linear backoff.
	///
	/// `operation` is called once per attempt and must be safe to repeat.
	/// Returns the resolved value, or the normalized terminal error.
	///
	/// Dropping the returned future before it completes cancels the
	/// invocation and, if it is still current, settles the state as failed
	/// with the cancellation error. No hooks fire in that case.
	pub async fn execute<F, Fut, E>(&self, mut operation: F) -> Result<T, NormalizedError>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, E>>,
		E: Into<Failure>,
	{
		let mut run = Invocation {
			inner: &self.inner,
			token: self.begin(),
			attempts: 0,
			settled: false,
		};
		let token = run.token.clone();
		let retry = self.inner.options.retry;

		loop {
			if token.is_cancelled() {
				return run.settle(Err(NormalizedError::cancelled()));
			}
			run.attempts = run.attempts.saturating_add(1);
			run.publish_running();
			tracing::debug!(mutation = self.inner.name, generation = token.generation(), attempt = run.attempts, "mutation.attempt");

			let err = match operation().await {
				Ok(value) => return run.settle(Ok(value)),
				Err(raw) => normalize(raw),
			};

			if token.is_cancelled() || !retry.should_retry(&err, run.attempts) {
				return run.settle(Err(err));
			}

			let delay = retry.delay_for(run.attempts);
			tracing::debug!(
				mutation = self.inner.name,
				generation = token.generation(),
				attempt = run.attempts,
				delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
				code = err.code(),
				"mutation.retry"
			);
			tokio::select! {
				biased;
				_ = token.cancelled() => {
					return run.settle(Err(NormalizedError::cancelled()));
				}
				_ = tokio::time::sleep(delay) => {}
			}
		}
	}

	/// Issues a new generation, superseding the previous invocation.
	fn begin(&self) -> GenerationToken {
		let token = GenerationToken::new(self.inner.clock.next());
		let mut current = self.inner.current.lock();
		if let Some(previous) = current.replace(token.clone()) {
			if !previous.is_cancelled() {
				tracing::trace!(mutation = self.inner.name, generation = previous.generation(), "mutation.superseded");
			}
			previous.cancel();
		}
		self.inner.state.send_replace(ExecutionState::running(0));
		token
	}
}

fn is_current(current: &Option<GenerationToken>, token: &GenerationToken) -> bool {
	current.as_ref().is_some_and(|live| live.generation() == token.generation())
}

/// One generation's run inside [`MutationExecutor::execute`].
///
/// Dropped without settling when the `execute` future is torn down.
struct Invocation<'a, T> {
	inner: &'a Inner<T>,
	token: GenerationToken,
	attempts: u32,
	settled: bool,
}

impl<T> Invocation<'_, T> {
	fn publish_running(&self) {
		let current = self.inner.current.lock();
		if is_current(&current, &self.token) && !self.token.is_cancelled() {
			self.inner.state.send_replace(ExecutionState::running(self.attempts));
		}
	}

	/// Applies the terminal outcome of this invocation.
	///
	/// Outcomes of superseded generations are discarded. A cancelled current
	/// generation settles as cancelled regardless of what the attempt produced.
	fn settle(&mut self, outcome: Result<T, NormalizedError>) -> Result<T, NormalizedError> {
		self.settled = true;
		let (inner, token, attempts) = (self.inner, &self.token, self.attempts);
		let outcome = {
			let current = inner.current.lock();
			if !is_current(&current, token) {
				tracing::trace!(mutation = inner.name, generation = token.generation(), "mutation.discarded");
				return Err(NormalizedError::cancelled());
			}
			let outcome = if token.is_cancelled() { Err(NormalizedError::cancelled()) } else { outcome };
			let next = match &outcome {
				Ok(_) => ExecutionState::succeeded(attempts),
				Err(err) => ExecutionState::failed(err.clone(), attempts),
			};
			inner.state.send_replace(next);
			outcome
		};

		match &outcome {
			Ok(value) => {
				tracing::debug!(mutation = inner.name, generation = token.generation(), attempts, "mutation.succeeded");
				if let Some(hook) = &inner.options.on_success {
					hook(value);
				}
			}
			Err(err) => {
				if err.is_cancelled() {
					tracing::debug!(mutation = inner.name, generation = token.generation(), attempts, "mutation.cancelled");
				} else {
					tracing::warn!(
						mutation = inner.name,
						generation = token.generation(),
						attempts,
						kind = err.kind().as_str(),
						code = err.code(),
						message = err.message(),
						"mutation.failed"
					);
				}
				if let Some(hook) = &inner.options.on_error {
					hook(err);
				}
			}
		}
		outcome
	}
}

impl<T> Drop for Invocation<'_, T> {
	fn drop(&mut self) {
		if self.settled {
			return;
		}
		self.token.cancel();
		let current = self.inner.current.lock();
		if is_current(&current, &self.token) {
			tracing::debug!(mutation = self.inner.name, generation = self.token.generation(), attempts = self.attempts, "mutation.abandoned");
			self.inner
				.state
				.send_replace(ExecutionState::failed(NormalizedError::cancelled(), self.attempts));
		}
	}
}

#[cfg(test)]
mod tests;
