use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use curator_error::{ErrorKind, Failure, NormalizedError, codes};
use pretty_assertions::assert_eq;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::*;
use crate::state::ExecutionStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
struct User {
	id: String,
}

fn counter() -> Arc<AtomicU32> {
	Arc::new(AtomicU32::new(0))
}

#[tokio::test(start_paused = true)]
async fn resolves_on_first_attempt() {
	let successes = counter();
	let seen = Arc::clone(&successes);
	let exec = MutationExecutor::new(
		"test.first",
		MutationOptions::new().on_success(move |_: &u32| {
			seen.fetch_add(1, Ordering::SeqCst);
		}),
	);
	assert_eq!(exec.state().status(), ExecutionStatus::Idle);

	let value = exec.execute(|| async { Ok::<_, Failure>(42) }).await;

	assert_eq!(value, Ok(42));
	assert_eq!(exec.state().status(), ExecutionStatus::Succeeded);
	assert_eq!(exec.state().attempt(), 1);
	assert_eq!(successes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn fetch_user_recovers_after_two_timeouts() {
	let calls = counter();
	let exec = MutationExecutor::new("test.fetch_user", MutationOptions::new().retries(3).retry_delay(Duration::from_millis(1000)));
	let start = Instant::now();

	let fetch_user = {
		let calls = Arc::clone(&calls);
		move || {
			let n = calls.fetch_add(1, Ordering::SeqCst);
			async move {
				if n < 2 {
					Err(Failure::timeout("request timed out"))
				} else {
					Ok(User { id: "u1".into() })
				}
			}
		}
	};
	let user = exec.execute(fetch_user).await;

	assert_eq!(user, Ok(User { id: "u1".into() }));
	assert_eq!(calls.load(Ordering::SeqCst), 3);
	assert!(start.elapsed() >= Duration::from_millis(3000), "elapsed {:?}", start.elapsed());
	assert_eq!(exec.state().status(), ExecutionStatus::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn persistent_network_failure_makes_retries_plus_one_attempts() {
	let calls = counter();
	let errors = counter();
	let seen = Arc::clone(&errors);
	let exec = MutationExecutor::<u32>::new(
		"test.offline",
		MutationOptions::new().on_error(move |_| {
			seen.fetch_add(1, Ordering::SeqCst);
		}),
	);

	let attempts = Arc::clone(&calls);
	let result = exec
		.execute(move || {
			attempts.fetch_add(1, Ordering::SeqCst);
			async { Err::<u32, _>(Failure::network("offline")) }
		})
		.await;

	let err = result.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Network);
	assert_eq!(calls.load(Ordering::SeqCst), 4);
	assert_eq!(errors.load(Ordering::SeqCst), 1);
	let state = exec.state();
	assert_eq!(state.status(), ExecutionStatus::Failed);
	assert_eq!(state.error(), Some(&err));
	assert_eq!(state.attempt(), 4);
}

#[tokio::test(start_paused = true)]
async fn create_user_validation_failure_is_immediate() {
	let calls = counter();
	let exec = MutationExecutor::<User>::new("test.create_user", MutationOptions::new());
	let start = Instant::now();

	let attempts = Arc::clone(&calls);
	let result = exec
		.execute(move || {
			attempts.fetch_add(1, Ordering::SeqCst);
			async { Err::<User, _>(Failure::validation("email required")) }
		})
		.await;

	let err = result.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Validation);
	assert_eq!(err.message(), "email required");
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn remote_and_unknown_failures_are_not_retried() {
	let cases: [fn() -> Failure; 2] = [|| Failure::remote("permission denied", Some("42501".into())), || Failure::Plain(None)];
	for failure in cases {
		let calls = counter();
		let exec = MutationExecutor::<()>::new("test.no_retry", MutationOptions::new());
		let attempts = Arc::clone(&calls);
		let result = exec
			.execute(move || {
				attempts.fetch_add(1, Ordering::SeqCst);
				async move { Err::<(), _>(failure()) }
			})
			.await;
		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}
}

#[tokio::test(start_paused = true)]
async fn zero_retries_means_a_single_attempt() {
	let calls = counter();
	let exec = MutationExecutor::<()>::new("test.zero", MutationOptions::new().retries(0));
	let attempts = Arc::clone(&calls);
	let result = exec
		.execute(move || {
			attempts.fetch_add(1, Ordering::SeqCst);
			async { Err::<(), _>(Failure::network("offline")) }
		})
		.await;
	assert_eq!(result.unwrap_err().code(), codes::NETWORK);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_rejections_retry_when_enabled() {
	let calls = counter();
	let exec = MutationExecutor::new("test.throttled", MutationOptions::new().retry_rate_limited(true));
	let attempts = Arc::clone(&calls);
	let result = exec
		.execute(move || {
			let n = attempts.fetch_add(1, Ordering::SeqCst);
			async move {
				if n == 0 {
					Err(Failure::Remote {
						message: "too many requests".into(),
						code: None,
						status: Some(429),
					})
				} else {
					Ok(7u32)
				}
			}
		})
		.await;
	assert_eq!(result, Ok(7));
	assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff_prevents_the_retry() {
	let calls = counter();
	let exec = MutationExecutor::<u32>::new("test.cancel_backoff", MutationOptions::new());
	let task = {
		let exec = exec.clone();
		let attempts = Arc::clone(&calls);
		tokio::spawn(async move {
			exec.execute(move || {
				attempts.fetch_add(1, Ordering::SeqCst);
				async { Err::<u32, _>(Failure::timeout("timed out")) }
			})
			.await
		})
	};

	tokio::time::sleep(Duration::from_millis(100)).await;
	assert!(exec.is_running());
	exec.cancel();

	let err = task.await.unwrap().unwrap_err();
	assert!(err.is_cancelled());
	assert_eq!(err.kind(), ErrorKind::Network);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert_eq!(exec.state().status(), ExecutionStatus::Failed);
	assert_eq!(exec.state().error(), Some(&NormalizedError::cancelled()));
}

#[tokio::test(start_paused = true)]
async fn aborted_task_settles_as_cancelled() {
	let calls = counter();
	let errors = counter();
	let seen = Arc::clone(&errors);
	let exec = MutationExecutor::<u32>::new(
		"test.abort",
		MutationOptions::new().on_error(move |_| {
			seen.fetch_add(1, Ordering::SeqCst);
		}),
	);
	let task = {
		let exec = exec.clone();
		let attempts = Arc::clone(&calls);
		tokio::spawn(async move {
			exec.execute(move || {
				attempts.fetch_add(1, Ordering::SeqCst);
				async { Err::<u32, _>(Failure::timeout("timed out")) }
			})
			.await
		})
	};

	tokio::time::sleep(Duration::from_millis(100)).await;
	assert!(exec.is_running());
	task.abort();
	assert!(task.await.unwrap_err().is_cancelled());

	let state = exec.state();
	assert_eq!(state.status(), ExecutionStatus::Failed);
	assert_eq!(state.error(), Some(&NormalizedError::cancelled()));
	assert_eq!(state.attempt(), 1);

	tokio::time::sleep(Duration::from_secs(60)).await;
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert_eq!(errors.load(Ordering::SeqCst), 0);
	assert!(!exec.is_running());
}

#[tokio::test(start_paused = true)]
async fn timed_out_caller_leaves_executor_reusable() {
	let exec = MutationExecutor::<u32>::new("test.dropped", MutationOptions::new());

	let waited = tokio::time::timeout(
		Duration::from_millis(500),
		exec.execute(|| async { Err::<u32, _>(Failure::network("offline")) }),
	)
	.await;
	assert!(waited.is_err());
	assert_eq!(exec.state().status(), ExecutionStatus::Failed);

	assert_eq!(exec.execute(|| async { Ok::<_, Failure>(7) }).await, Ok(7));
	assert_eq!(exec.state().status(), ExecutionStatus::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn cancel_discards_an_in_flight_settlement() {
	let gate = Arc::new(Notify::new());
	let successes = counter();
	let seen = Arc::clone(&successes);
	let exec = MutationExecutor::new(
		"test.cancel_in_flight",
		MutationOptions::new().on_success(move |_: &u32| {
			seen.fetch_add(1, Ordering::SeqCst);
		}),
	);
	let task = {
		let exec = exec.clone();
		let gate = Arc::clone(&gate);
		tokio::spawn(async move {
			exec.execute(move || {
				let gate = Arc::clone(&gate);
				async move {
					gate.notified().await;
					Ok::<_, Failure>(1u32)
				}
			})
			.await
		})
	};

	tokio::time::sleep(Duration::from_millis(10)).await;
	exec.cancel();
	gate.notify_one();

	let err = task.await.unwrap().unwrap_err();
	assert!(err.is_cancelled());
	assert_eq!(successes.load(Ordering::SeqCst), 0);
	assert_eq!(exec.state().status(), ExecutionStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn newer_execute_supersedes_the_previous_one() {
	let gate = Arc::new(Notify::new());
	let successes = Arc::new(parking_lot::Mutex::new(Vec::new()));
	let seen = Arc::clone(&successes);
	let exec = MutationExecutor::new(
		"test.supersede",
		MutationOptions::new().on_success(move |v: &u32| seen.lock().push(*v)),
	);

	let first = {
		let exec = exec.clone();
		let gate = Arc::clone(&gate);
		tokio::spawn(async move {
			exec.execute(move || {
				let gate = Arc::clone(&gate);
				async move {
					gate.notified().await;
					Ok::<_, Failure>(1u32)
				}
			})
			.await
		})
	};
	tokio::time::sleep(Duration::from_millis(10)).await;

	let second = exec.execute(|| async { Ok::<_, Failure>(2u32) }).await;
	assert_eq!(second, Ok(2));

	gate.notify_one();
	let stale = first.await.unwrap();
	assert!(stale.unwrap_err().is_cancelled());

	assert_eq!(exec.state().status(), ExecutionStatus::Succeeded);
	assert_eq!(*successes.lock(), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn superseded_invocation_stops_retrying() {
	let calls = counter();
	let exec = MutationExecutor::<u32>::new("test.supersede_retry", MutationOptions::new());
	let first = {
		let exec = exec.clone();
		let attempts = Arc::clone(&calls);
		tokio::spawn(async move {
			exec.execute(move || {
				attempts.fetch_add(1, Ordering::SeqCst);
				async { Err::<u32, _>(Failure::network("offline")) }
			})
			.await
		})
	};
	tokio::time::sleep(Duration::from_millis(10)).await;

	assert_eq!(exec.execute(|| async { Ok::<_, Failure>(5) }).await, Ok(5));
	assert!(first.await.unwrap().unwrap_err().is_cancelled());
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert_eq!(exec.state().status(), ExecutionStatus::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn failed_state_resets_on_next_execute() {
	let exec = MutationExecutor::<u32>::new("test.reset", MutationOptions::new());
	let _ = exec.execute(|| async { Err::<u32, _>(Failure::validation("bad input")) }).await;
	assert_eq!(exec.state().status(), ExecutionStatus::Failed);

	let mut states = exec.subscribe();
	assert_eq!(exec.execute(|| async { Ok::<_, Failure>(3) }).await, Ok(3));
	assert!(states.has_changed().unwrap());
	let latest = states.borrow_and_update().clone();
	assert_eq!(latest.status(), ExecutionStatus::Succeeded);
	assert_eq!(latest.error(), None);
}
