//! Mutation executor: one async operation at a time, retried on transient
//! failure, cancellable, with observable progress.
//!
//! * [`MutationExecutor`]: runs operations and owns the live generation
//! * [`MutationOptions`] / [`RetrySettings`]: retry policy and settlement hooks
//! * [`ExecutionState`]: `idle -> running -> succeeded | failed`
//!
//! Failures are classified by [`curator_error::normalize`] at the point they
//! are caught; the executor is the only place that decides whether to retry.

mod executor;
mod options;
mod state;
mod token;

pub use curator_error::{ErrorKind, Failure, NormalizedError};
pub use executor::MutationExecutor;
pub use options::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_MS, ErrorHook, MutationOptions, RetrySettings, SuccessHook};
pub use state::{ExecutionState, ExecutionStatus};
