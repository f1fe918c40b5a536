//! Subscription plan catalog.

use std::sync::Arc;

use curator_backend::{Query, SharedClient};
use curator_error::{Failure, NormalizedError};
use curator_mutation::{MutationExecutor, MutationOptions, RetrySettings};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{BillingInterval, PlanFeature, SubscriptionPlan};
use crate::pagination::SortDirection;
use crate::{rows, tables};

/// Ordering and visibility for [`PlanCatalog::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanQuery {
	pub active_only: bool,
	pub sort_by: String,
	pub sort_order: SortDirection,
}

impl Default for PlanQuery {
	fn default() -> Self {
		Self {
			active_only: false,
			sort_by: "price".to_string(),
			sort_order: SortDirection::Asc,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDraft {
	pub name: String,
	#[serde(default)]
	pub description: String,
	pub price: f64,
	#[serde(default)]
	pub interval: BillingInterval,
	#[serde(default)]
	pub features: Vec<PlanFeature>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stripe_price_id: Option<String>,
	pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanPatch {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub price: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub interval: Option<BillingInterval>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub features: Option<Vec<PlanFeature>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stripe_price_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub active: Option<bool>,
}

fn check_name(name: &str) -> Result<(), Failure> {
	if name.trim().is_empty() {
		return Err(Failure::validation("Plan name is required"));
	}
	Ok(())
}

fn check_price(price: f64) -> Result<(), Failure> {
	if !price.is_finite() || price < 0.0 {
		return Err(Failure::validation("Plan price must be a non-negative number"));
	}
	Ok(())
}

pub struct PlanCatalog {
	client: SharedClient,
	plans: Mutex<Vec<SubscriptionPlan>>,
	load: MutationExecutor<Vec<SubscriptionPlan>>,
	create: MutationExecutor<SubscriptionPlan>,
	update: MutationExecutor<SubscriptionPlan>,
	remove: MutationExecutor<()>,
}

impl PlanCatalog {
	pub fn new(client: SharedClient, retry: RetrySettings) -> Self {
		Self {
			client,
			plans: Mutex::new(Vec::new()),
			load: MutationExecutor::new("plans.fetch", MutationOptions::from(retry)),
			create: MutationExecutor::new("plans.create", MutationOptions::from(retry)),
			update: MutationExecutor::new("plans.update", MutationOptions::from(retry)),
			remove: MutationExecutor::new("plans.delete", MutationOptions::from(retry)),
		}
	}

	pub fn plans(&self) -> Vec<SubscriptionPlan> {
		self.plans.lock().clone()
	}

	pub async fn fetch(&self, params: &PlanQuery) -> Result<Vec<SubscriptionPlan>, NormalizedError> {
		let mut query = Query::new();
		if params.active_only {
			query = query.eq("active", true);
		}
		let query = query.order(params.sort_by.as_str(), params.sort_order.is_ascending());
		let client = Arc::clone(&self.client);

		let plans = self
			.load
			.execute(move || {
				let client = Arc::clone(&client);
				let query = query.clone();
				async move {
					let selection = client.select(tables::SUBSCRIPTION_PLANS, &query).await?;
					rows::decode_all::<SubscriptionPlan>(selection.rows)
				}
			})
			.await?;

		*self.plans.lock() = plans.clone();
		Ok(plans)
	}

	pub async fn create(&self, draft: PlanDraft) -> Result<SubscriptionPlan, NormalizedError> {
		let client = Arc::clone(&self.client);

		let plan = self
			.create
			.execute(move || {
				let client = Arc::clone(&client);
				let draft = draft.clone();
				async move {
					check_name(&draft.name)?;
					check_price(draft.price)?;
					let now = rows::timestamp();
					let row = rows::encode(
						&draft,
						[("created_at", Value::String(now.clone())), ("updated_at", Value::String(now))],
					)?;
					let stored = client.insert(tables::SUBSCRIPTION_PLANS, row).await?;
					rows::decode::<SubscriptionPlan>(stored)
				}
			})
			.await?;

		self.plans.lock().push(plan.clone());
		Ok(plan)
	}

	pub async fn update(&self, id: &str, patch: PlanPatch) -> Result<SubscriptionPlan, NormalizedError> {
		let client = Arc::clone(&self.client);
		let id = id.to_string();

		let plan = self
			.update
			.execute(move || {
				let client = Arc::clone(&client);
				let id = id.clone();
				let patch = patch.clone();
				async move {
					if let Some(name) = &patch.name {
						check_name(name)?;
					}
					if let Some(price) = patch.price {
						check_price(price)?;
					}
					let row = rows::encode(&patch, [("updated_at", Value::String(rows::timestamp()))])?;
					let stored = client.update(tables::SUBSCRIPTION_PLANS, &id, row).await?.ok_or(Failure::NoData)?;
					rows::decode::<SubscriptionPlan>(stored)
				}
			})
			.await?;

		if let Some(slot) = self.plans.lock().iter_mut().find(|p| p.id == plan.id) {
			*slot = plan.clone();
		}
		Ok(plan)
	}

	pub async fn delete(&self, id: &str) -> Result<(), NormalizedError> {
		let client = Arc::clone(&self.client);
		let owned = id.to_string();

		self.remove
			.execute(move || {
				let client = Arc::clone(&client);
				let id = owned.clone();
				async move { client.delete(tables::SUBSCRIPTION_PLANS, &id).await }
			})
			.await?;

		self.plans.lock().retain(|p| p.id != id);
		Ok(())
	}
}

impl std::fmt::Debug for PlanCatalog {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PlanCatalog").field("cached", &self.plans.lock().len()).finish()
	}
}

#[cfg(test)]
mod tests {
	use curator_backend::{BackendError, MemoryBackend, Operation};
	use curator_error::{ErrorKind, codes};
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;
	use crate::testing::{backend, fast_retry};

	fn seeded() -> Arc<MemoryBackend> {
		let backend = backend();
		backend.seed(
			tables::SUBSCRIPTION_PLANS,
			[
				json!({"id": "pro", "name": "Pro", "price": 29.0, "interval": "month", "active": true,
					"features": [{"name": "Articles", "included": true, "limit": 100}]}),
				json!({"id": "free", "name": "Free", "price": 0, "interval": "month", "active": true, "features": []}),
				json!({"id": "legacy", "name": "Legacy", "price": 9.5, "interval": "year", "active": false}),
			],
		);
		backend
	}

	fn draft(name: &str, price: f64) -> PlanDraft {
		PlanDraft {
			name: name.into(),
			description: String::new(),
			price,
			interval: BillingInterval::Year,
			features: vec![PlanFeature {
				name: "Scheduling".into(),
				included: true,
				limit: None,
			}],
			stripe_price_id: Some("price_123".into()),
			active: true,
		}
	}

	#[tokio::test]
	async fn fetch_orders_by_price_ascending() {
		let backend = seeded();
		let catalog = PlanCatalog::new(backend.clone(), fast_retry());

		let plans = catalog.fetch(&PlanQuery::default()).await.unwrap();
		let ids: Vec<_> = plans.iter().map(|p| p.id.as_str()).collect();
		assert_eq!(ids, vec!["free", "legacy", "pro"]);
		assert_eq!(plans[2].features[0].limit, Some(100));
		assert!(plans[1].features.is_empty());

		let active = catalog
			.fetch(&PlanQuery {
				active_only: true,
				..PlanQuery::default()
			})
			.await
			.unwrap();
		assert_eq!(active.len(), 2);
		assert_eq!(catalog.plans().len(), 2);
	}

	#[tokio::test]
	async fn create_embeds_features() {
		let backend = seeded();
		let catalog = PlanCatalog::new(backend.clone(), fast_retry());

		let plan = catalog.create(draft("Team", 99.0)).await.unwrap();
		assert_eq!(plan.interval, BillingInterval::Year);
		assert_eq!(plan.features.len(), 1);
		let stored = backend.rows(tables::SUBSCRIPTION_PLANS).into_iter().find(|r| r["id"] == plan.id.as_str()).unwrap();
		assert_eq!(stored["features"][0]["name"], "Scheduling");
	}

	#[tokio::test]
	async fn invalid_drafts_are_rejected() {
		let backend = seeded();
		let catalog = PlanCatalog::new(backend.clone(), fast_retry());

		let err = catalog.create(draft(" ", 1.0)).await.unwrap_err();
		assert_eq!(err.message(), "Plan name is required");
		let err = catalog.create(draft("Bad", -1.0)).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Validation);
		assert_eq!(backend.calls(Operation::Insert), 0);
	}

	#[tokio::test]
	async fn update_and_delete_keep_cache_in_step() {
		let backend = seeded();
		let catalog = PlanCatalog::new(backend.clone(), fast_retry());
		catalog.fetch(&PlanQuery::default()).await.unwrap();

		let plan = catalog
			.update(
				"pro",
				PlanPatch {
					price: Some(39.0),
					..PlanPatch::default()
				},
			)
			.await
			.unwrap();
		assert_eq!(plan.price, 39.0);
		assert_eq!(plan.name, "Pro");
		assert_eq!(catalog.plans().iter().find(|p| p.id == "pro").unwrap().price, 39.0);

		let err = catalog.update("gone", PlanPatch::default()).await.unwrap_err();
		assert_eq!(err.code(), codes::NO_DATA);

		catalog.delete("legacy").await.unwrap();
		assert_eq!(catalog.plans().len(), 2);
		assert_eq!(backend.rows(tables::SUBSCRIPTION_PLANS).len(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn exhausted_retries_surface_network_error() {
		let backend = seeded();
		backend.fail_times(Operation::Select, BackendError::offline("dns failure"), 4);
		let catalog = PlanCatalog::new(backend.clone(), fast_retry());

		let err = catalog.fetch(&PlanQuery::default()).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Network);
		assert_eq!(err.code(), codes::NETWORK);
		assert_eq!(backend.calls(Operation::Select), 4);
		assert!(catalog.plans().is_empty());
	}
}
