//! Social posts scheduled from articles.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use curator_backend::{AuthUser, Query, SharedClient};
use curator_error::{Failure, NormalizedError};
use curator_mutation::{MutationExecutor, MutationOptions, RetrySettings};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Platform, PostStatus, ScheduledPost};
use crate::{rows, tables, validation};

/// Code carried by errors for calls that need a signed-in user.
pub const NOT_AUTHENTICATED: &str = "NOT_AUTHENTICATED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewScheduledPost {
	pub article_id: String,
	pub platform: Platform,
	pub content: String,
	pub scheduled_for: DateTime<Utc>,
}

impl NewScheduledPost {
	fn validate(&self, now: DateTime<Utc>) -> validation::Validation {
		if self.article_id.trim().is_empty() {
			return Err("Article ID is required".into());
		}
		validation::post_content(self.platform, &self.content)?;
		validation::schedule_date(self.scheduled_for, now)
	}
}

async fn signed_in(client: &SharedClient) -> Result<AuthUser, Failure> {
	client
		.current_user()
		.await?
		.ok_or_else(|| Failure::remote("User not authenticated", Some(NOT_AUTHENTICATED.to_string())))
}

/// Schedules and lists the signed-in user's posts.
pub struct PostScheduler {
	client: SharedClient,
	schedule: MutationExecutor<ScheduledPost>,
	list: MutationExecutor<Vec<ScheduledPost>>,
}

impl PostScheduler {
	pub fn new(client: SharedClient, retry: RetrySettings) -> Self {
		Self {
			client,
			schedule: MutationExecutor::new("posts.schedule", MutationOptions::from(retry)),
			list: MutationExecutor::new("posts.list", MutationOptions::from(retry)),
		}
	}

	pub async fn schedule(&self, data: NewScheduledPost) -> Result<ScheduledPost, NormalizedError> {
		let client = Arc::clone(&self.client);

		self.schedule
			.execute(move || {
				let client = Arc::clone(&client);
				let data = data.clone();
				async move {
					data.validate(Utc::now()).map_err(Failure::validation)?;
					let user = signed_in(&client).await?;
					let row = rows::encode(
						&data,
						[
							("user_id", Value::String(user.id)),
							("scheduled_for", Value::String(data.scheduled_for.to_rfc3339_opts(SecondsFormat::Millis, true))),
							("status", Value::String(PostStatus::Scheduled.as_str().to_string())),
							("created_at", Value::String(rows::timestamp())),
						],
					)?;
					let stored = client.insert(tables::SCHEDULED_POSTS, row).await?;
					rows::decode::<ScheduledPost>(stored)
				}
			})
			.await
	}

	/// The signed-in user's posts, most recently created first.
	pub async fn list(&self) -> Result<Vec<ScheduledPost>, NormalizedError> {
		let client = Arc::clone(&self.client);

		self.list
			.execute(move || {
				let client = Arc::clone(&client);
				async move {
					let user = signed_in(&client).await?;
					let query = Query::new().eq("user_id", user.id).order("created_at", false);
					let selection = client.select(tables::SCHEDULED_POSTS, &query).await?;
					rows::decode_all::<ScheduledPost>(selection.rows)
				}
			})
			.await
	}
}

impl std::fmt::Debug for PostScheduler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PostScheduler").finish_non_exhaustive()
	}
}
