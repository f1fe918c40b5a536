use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{BackendError, Query, Selection};

/// An authenticated backend identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
	pub id: String,
	pub email: String,
}

/// Client handle for the backend-as-a-service.
///
/// Rows are JSON objects keyed by an `id` column. Implementations report
/// refusals as [`BackendError::Rejected`] and connectivity problems as
/// [`BackendError::Transport`].
#[async_trait]
pub trait BackendClient: Send + Sync {
	/// Returns matching rows within the query's range and the exact count
	/// of matches before ranging.
	async fn select(&self, table: &str, query: &Query) -> Result<Selection, BackendError>;

	/// Inserts one row and returns it as stored.
	async fn insert(&self, table: &str, row: Value) -> Result<Value, BackendError>;

	/// Merges `patch` into the row with `id`. `None` when no row matched.
	async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Option<Value>, BackendError>;

	/// Deletes the row with `id`. Deleting a missing row is not an error.
	async fn delete(&self, table: &str, id: &str) -> Result<(), BackendError>;

	/// Creates a confirmed auth identity.
	async fn create_auth_user(&self, email: &str, password: &str) -> Result<AuthUser, BackendError>;

	/// Deletes an auth identity; the backend cascades to the profile row.
	async fn delete_auth_user(&self, id: &str) -> Result<(), BackendError>;

	/// Identity of the signed-in session, if any.
	async fn current_user(&self) -> Result<Option<AuthUser>, BackendError>;

	/// Invokes a serverless function with a JSON body.
	async fn invoke(&self, function: &str, body: Value) -> Result<Value, BackendError>;
}

/// Shared, injectable client handle.
pub type SharedClient = Arc<dyn BackendClient>;
