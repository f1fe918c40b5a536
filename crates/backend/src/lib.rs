//! Seam between dashboard operations and the backend-as-a-service.
//!
//! Operation bodies never reach for a global client. They receive a
//! [`SharedClient`] handle and talk to it through [`BackendClient`]:
//! row selects, inserts, updates and deletes, auth administration, and
//! serverless function calls. [`MemoryBackend`] implements the trait
//! in-process for tests and the demo.

mod client;
mod error;
mod memory;
mod query;

pub use client::{AuthUser, BackendClient, SharedClient};
pub use error::BackendError;
pub use memory::{MemoryBackend, Operation};
pub use query::{Query, Selection};
