//! Content niches and each user's chosen niche.

use std::sync::Arc;

use curator_backend::{Query, SharedClient};
use curator_error::{Failure, NormalizedError};
use curator_mutation::{MutationExecutor, MutationOptions, RetrySettings};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::Niche;
use crate::{rows, tables};

/// All niches plus the ids a user has selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicheSelection {
	pub niches: Vec<Niche>,
	pub selected: Vec<String>,
}

impl NicheSelection {
	pub fn is_selected(&self, niche_id: &str) -> bool {
		self.selected.iter().any(|id| id == niche_id)
	}
}

pub struct NicheDirectory {
	client: SharedClient,
	load: MutationExecutor<NicheSelection>,
	choose: MutationExecutor<String>,
}

impl NicheDirectory {
	pub fn new(client: SharedClient, retry: RetrySettings) -> Self {
		Self {
			client,
			load: MutationExecutor::new("niches.load", MutationOptions::from(retry)),
			choose: MutationExecutor::new("niches.select", MutationOptions::from(retry)),
		}
	}

	/// Niches ordered by name; `selected` is empty without a user.
	pub async fn load(&self, user_id: Option<&str>) -> Result<NicheSelection, NormalizedError> {
		let client = Arc::clone(&self.client);
		let user_id = user_id.map(str::to_owned);

		self.load
			.execute(move || {
				let client = Arc::clone(&client);
				let user_id = user_id.clone();
				async move {
					let all = client.select(tables::NICHES, &Query::new().order("name", true)).await?;
					let niches: Vec<Niche> = rows::decode_all(all.rows)?;
					let selected = match user_id {
						Some(user_id) => client
							.select(tables::USER_NICHES, &Query::new().eq("user_id", user_id))
							.await?
							.rows
							.iter()
							.filter_map(|row| row.get("niche_id").and_then(|v| v.as_str()).map(str::to_owned))
							.collect(),
						None => Vec::new(),
					};
					Ok::<_, Failure>(NicheSelection { niches, selected })
				}
			})
			.await
	}

	/// Makes `niche_id` the user's niche, replacing any earlier choice.
	/// Returns the selected niche id.
	pub async fn select(&self, user_id: &str, niche_id: &str) -> Result<String, NormalizedError> {
		let client = Arc::clone(&self.client);
		let user_id = user_id.to_string();
		let niche_id = niche_id.to_string();

		self.choose
			.execute(move || {
				let client = Arc::clone(&client);
				let user_id = user_id.clone();
				let niche_id = niche_id.clone();
				async move {
					if user_id.trim().is_empty() {
						return Err(Failure::validation("User ID is required to select a niche"));
					}
					let known = client.select(tables::NICHES, &Query::new().eq("id", niche_id.as_str())).await?;
					if known.count == 0 {
						return Err(Failure::validation(format!("Unknown niche: {niche_id}")));
					}

					let existing = client.select(tables::USER_NICHES, &Query::new().eq("user_id", user_id.as_str())).await?;
					let mut ids = existing.rows.iter().filter_map(|row| row.get("id").and_then(|v| v.as_str()));
					let updated = match ids.next() {
						Some(keep) => {
							let row = client.update(tables::USER_NICHES, keep, json!({ "niche_id": niche_id })).await?;
							for extra in ids {
								client.delete(tables::USER_NICHES, extra).await?;
							}
							row.is_some()
						}
						None => false,
					};
					// The row can vanish between the select and the update.
					if !updated {
						client
							.insert(tables::USER_NICHES, json!({ "user_id": user_id, "niche_id": niche_id }))
							.await?;
					}
					tracing::debug!(user = %user_id, niche = %niche_id, "niches.selected");
					Ok(niche_id)
				}
			})
			.await
	}
}

impl std::fmt::Debug for NicheDirectory {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("NicheDirectory").finish_non_exhaustive()
	}
}
