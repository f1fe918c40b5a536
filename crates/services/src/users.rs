//! Admin management of user profiles and their auth identities.

use std::sync::Arc;

use curator_backend::{Query, SharedClient};
use curator_error::{Failure, NormalizedError};
use curator_mutation::{MutationExecutor, MutationOptions, RetrySettings};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{SubscriptionTier, UserProfile, UserRole};
use crate::pagination::{PaginatedResponse, PaginationParams};
use crate::{rows, tables, validation};

const SEARCH_COLUMNS: [&str; 3] = ["email", "first_name", "last_name"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
	pub email: String,
	#[serde(skip_serializing)]
	pub password: String,
	#[serde(default)]
	pub first_name: Option<String>,
	#[serde(default)]
	pub last_name: Option<String>,
	#[serde(default)]
	pub role: UserRole,
	#[serde(default)]
	pub subscription_tier: SubscriptionTier,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub first_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub role: Option<UserRole>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub subscription_tier: Option<SubscriptionTier>,
}

/// Searches, creates, edits and deletes users.
pub struct AdminUsers {
	client: SharedClient,
	users: Mutex<Vec<UserProfile>>,
	load: MutationExecutor<PaginatedResponse<UserProfile>>,
	create: MutationExecutor<UserProfile>,
	update: MutationExecutor<UserProfile>,
	remove: MutationExecutor<()>,
}

impl AdminUsers {
	pub fn new(client: SharedClient, retry: RetrySettings) -> Self {
		Self {
			client,
			users: Mutex::new(Vec::new()),
			load: MutationExecutor::new("users.search", MutationOptions::from(retry)),
			create: MutationExecutor::new("users.create", MutationOptions::from(retry)),
			update: MutationExecutor::new("users.update", MutationOptions::from(retry)),
			remove: MutationExecutor::new("users.delete", MutationOptions::from(retry)),
		}
	}

	pub fn users(&self) -> Vec<UserProfile> {
		self.users.lock().clone()
	}

	/// Profiles whose email or names contain `term`.
	pub async fn search(&self, term: &str, params: &PaginationParams) -> Result<PaginatedResponse<UserProfile>, NormalizedError> {
		let (from, to) = params.range();
		let query = Query::new()
			.search(&SEARCH_COLUMNS, term)
			.order(params.sort_by.as_str(), params.sort_order.is_ascending())
			.range(from, to);
		let client = Arc::clone(&self.client);
		let params = params.clone();

		let page = self
			.load
			.execute(move || {
				let client = Arc::clone(&client);
				let query = query.clone();
				let params = params.clone();
				async move {
					let selection = client.select(tables::USER_PROFILES, &query).await?;
					let data: Vec<UserProfile> = rows::decode_all(selection.rows)?;
					Ok::<_, Failure>(PaginatedResponse::new(data, selection.count, &params))
				}
			})
			.await?;

		*self.users.lock() = page.data.clone();
		Ok(page)
	}

	/// Creates the auth identity, then its profile.
	///
	/// A failed profile insert deletes the new identity before the error is
	/// returned.
	pub async fn create(&self, data: NewUser) -> Result<UserProfile, NormalizedError> {
		let client = Arc::clone(&self.client);

		let profile = self
			.create
			.execute(move || {
				let client = Arc::clone(&client);
				let data = data.clone();
				async move {
					validation::credentials(&data.email, &data.password).map_err(Failure::validation)?;
					let auth = client.create_auth_user(&data.email, &data.password).await?;
					let now = rows::timestamp();
					let row = rows::encode(
						&data,
						[
							("id", Value::String(auth.id.clone())),
							("created_at", Value::String(now.clone())),
							("updated_at", Value::String(now)),
						],
					)?;
					match client.insert(tables::USER_PROFILES, row).await {
						Ok(stored) => rows::decode::<UserProfile>(stored),
						Err(err) => {
							tracing::warn!(user = %auth.id, error = %err, "users.create.rollback");
							if let Err(rollback) = client.delete_auth_user(&auth.id).await {
								tracing::error!(user = %auth.id, error = %rollback, "users.create.rollback_failed");
							}
							Err(err.into())
						}
					}
				}
			})
			.await?;

		self.users.lock().insert(0, profile.clone());
		Ok(profile)
	}

	pub async fn update(&self, id: &str, patch: UserPatch) -> Result<UserProfile, NormalizedError> {
		let client = Arc::clone(&self.client);
		let id = id.to_string();

		let profile = self
			.update
			.execute(move || {
				let client = Arc::clone(&client);
				let id = id.clone();
				let patch = patch.clone();
				async move {
					let row = rows::encode(&patch, [("updated_at", Value::String(rows::timestamp()))])?;
					let stored = client.update(tables::USER_PROFILES, &id, row).await?.ok_or(Failure::NoData)?;
					rows::decode::<UserProfile>(stored)
				}
			})
			.await?;

		if let Some(slot) = self.users.lock().iter_mut().find(|u| u.id == profile.id) {
			*slot = profile.clone();
		}
		Ok(profile)
	}

	/// Deletes the auth identity; the backend removes the profile with it.
	pub async fn delete(&self, id: &str) -> Result<(), NormalizedError> {
		let client = Arc::clone(&self.client);
		let owned = id.to_string();

		self.remove
			.execute(move || {
				let client = Arc::clone(&client);
				let id = owned.clone();
				async move { client.delete_auth_user(&id).await }
			})
			.await?;

		self.users.lock().retain(|u| u.id != id);
		Ok(())
	}
}

impl std::fmt::Debug for AdminUsers {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AdminUsers").field("cached", &self.users.lock().len()).finish()
	}
}
