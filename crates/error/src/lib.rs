//! Failure taxonomy shared by every dashboard operation.
//!
//! Raw failures arrive in several shapes: remote rejections from the
//! backend, connectivity problems, unmet input preconditions, calls that
//! succeed without returning a row, and plain errors with no structure at
//! all. They are classified exactly once, at the boundary, into a
//! [`NormalizedError`] so callers can branch on [`ErrorKind`] without
//! knowing where a failure came from.
//!
//! * [`Failure`]: the raw shapes accepted at the boundary
//! * [`normalize`]: the pure, total classification
//! * [`NormalizedError`]: the classified, immutable result

#![warn(missing_docs)]

mod failure;
mod normalized;

pub use failure::Failure;
pub use normalized::{ErrorKind, NormalizedError, codes};

/// Classifies a raw failure into the fixed taxonomy.
///
/// Never panics. A failure that already carries a kind tag is returned
/// unchanged, so normalizing twice is a no-op.
pub fn normalize(raw: impl Into<Failure>) -> NormalizedError {
	NormalizedError::from(raw.into())
}
