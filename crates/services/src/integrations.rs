//! Third-party integrations, API keys and the billing webhook domain.

use std::sync::Arc;

use curator_backend::{Query, SharedClient};
use curator_error::{Failure, NormalizedError};
use curator_mutation::{MutationExecutor, MutationOptions, RetrySettings};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::billing::classify;
use crate::{rows, tables};

pub const UPDATE_WEBHOOK_DOMAIN_FUNCTION: &str = "update-webhook-domain";
pub const REFRESH_WEBHOOK_ENDPOINTS_FUNCTION: &str = "refresh-webhook-endpoints";

/// Name of the `api_keys` row whose `value` is the webhook domain.
pub const WEBHOOK_DOMAIN_KEY: &str = "stripe_webhook_domain";

pub const WEBHOOK_ERROR: &str = "WEBHOOK_ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationKind {
	Stripe,
	Social,
	Analytics,
}

impl IntegrationKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Stripe => "stripe",
			Self::Social => "social",
			Self::Analytics => "analytics",
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
	Active,
	Inactive,
	#[default]
	Pending,
}

/// Credentials and settings stored with an integration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IntegrationConfig {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub api_key: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub webhook_url: Option<String>,
	#[serde(skip_serializing_if = "Map::is_empty")]
	pub settings: Map<String, Value>,
}

fn present(value: Option<&str>) -> bool {
	value.is_some_and(|v| !v.trim().is_empty())
}

impl IntegrationConfig {
	/// Checks the fields `kind` needs before it can connect.
	pub fn validate(&self, kind: IntegrationKind) -> Result<(), Failure> {
		let missing = match kind {
			IntegrationKind::Stripe if !present(self.api_key.as_deref()) => Some("Stripe API key is required"),
			IntegrationKind::Stripe if !present(self.webhook_url.as_deref()) => Some("Stripe webhook URL is required"),
			IntegrationKind::Social if !present(self.api_key.as_deref()) => Some("Social media API key is required"),
			IntegrationKind::Analytics if !present(self.settings.get("trackingId").and_then(Value::as_str)) => {
				Some("Analytics tracking ID is required")
			}
			_ => None,
		};
		match missing {
			Some(message) => Err(Failure::validation(message)),
			None => Ok(()),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
	pub id: String,
	pub user_id: String,
	#[serde(rename = "type")]
	pub kind: IntegrationKind,
	pub name: String,
	#[serde(default)]
	pub status: IntegrationStatus,
	#[serde(default)]
	pub config: IntegrationConfig,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created_at: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrationPatch {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<IntegrationStatus>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub config: Option<IntegrationConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
	pub id: String,
	pub user_id: String,
	pub name: String,
	pub key: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_used_at: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created_at: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<String>,
}

/// Four dash-separated segments of eight random hex digits.
fn generate_key() -> String {
	let hex = Uuid::new_v4().simple().to_string();
	format!("{}-{}-{}-{}", &hex[..8], &hex[8..16], &hex[16..24], &hex[24..])
}

fn require_user(user_id: &str, action: &str) -> Result<(), Failure> {
	if user_id.trim().is_empty() {
		return Err(Failure::validation(format!("User ID is required to {action}")));
	}
	Ok(())
}

/// A user's integrations and API keys, plus the shared webhook domain.
pub struct IntegrationDesk {
	client: SharedClient,
	integrations: Mutex<Vec<Integration>>,
	keys: Mutex<Vec<ApiKey>>,
	domain: Mutex<Option<String>>,
	fetch: MutationExecutor<Vec<Integration>>,
	create: MutationExecutor<Integration>,
	update: MutationExecutor<Integration>,
	remove: MutationExecutor<()>,
	fetch_keys: MutationExecutor<Vec<ApiKey>>,
	create_key: MutationExecutor<ApiKey>,
	remove_key: MutationExecutor<()>,
	load_domain: MutationExecutor<Option<String>>,
	set_domain: MutationExecutor<String>,
	refresh: MutationExecutor<()>,
}

impl IntegrationDesk {
	pub fn new(client: SharedClient, retry: RetrySettings) -> Self {
		Self {
			client,
			integrations: Mutex::new(Vec::new()),
			keys: Mutex::new(Vec::new()),
			domain: Mutex::new(None),
			fetch: MutationExecutor::new("integrations.fetch", MutationOptions::from(retry)),
			create: MutationExecutor::new("integrations.create", MutationOptions::from(retry)),
			update: MutationExecutor::new("integrations.update", MutationOptions::from(retry)),
			remove: MutationExecutor::new("integrations.delete", MutationOptions::from(retry)),
			fetch_keys: MutationExecutor::new("api_keys.fetch", MutationOptions::from(retry)),
			create_key: MutationExecutor::new("api_keys.create", MutationOptions::from(retry)),
			remove_key: MutationExecutor::new("api_keys.delete", MutationOptions::from(retry)),
			load_domain: MutationExecutor::new("webhooks.domain", MutationOptions::from(retry)),
			set_domain: MutationExecutor::new("webhooks.update_domain", MutationOptions::from(retry)),
			refresh: MutationExecutor::new("webhooks.refresh", MutationOptions::from(retry)),
		}
	}

	pub fn integrations(&self) -> Vec<Integration> {
		self.integrations.lock().clone()
	}

	pub fn keys(&self) -> Vec<ApiKey> {
		self.keys.lock().clone()
	}

	/// Webhook domain from the last load or update.
	pub fn domain(&self) -> Option<String> {
		self.domain.lock().clone()
	}

	/// The user's integrations, newest first, optionally of one kind.
	pub async fn fetch(&self, user_id: &str, kind: Option<IntegrationKind>) -> Result<Vec<Integration>, NormalizedError> {
		let client = Arc::clone(&self.client);
		let user_id = user_id.to_string();

		let integrations = self
			.fetch
			.execute(move || {
				let client = Arc::clone(&client);
				let user_id = user_id.clone();
				async move {
					require_user(&user_id, "fetch integrations")?;
					let mut query = Query::new().eq("user_id", user_id);
					if let Some(kind) = kind {
						query = query.eq("type", kind.as_str());
					}
					let selection = client.select(tables::INTEGRATIONS, &query.order("created_at", false)).await?;
					rows::decode_all::<Integration>(selection.rows)
				}
			})
			.await?;

		*self.integrations.lock() = integrations.clone();
		Ok(integrations)
	}

	/// Stores a new pending integration after checking its config.
	pub async fn create(&self, user_id: &str, kind: IntegrationKind, name: &str, config: IntegrationConfig) -> Result<Integration, NormalizedError> {
		let client = Arc::clone(&self.client);
		let user_id = user_id.to_string();
		let name = name.trim().to_string();

		let integration = self
			.create
			.execute(move || {
				let client = Arc::clone(&client);
				let user_id = user_id.clone();
				let name = name.clone();
				let config = config.clone();
				async move {
					require_user(&user_id, "create integration")?;
					if name.is_empty() {
						return Err(Failure::validation("Integration name is required"));
					}
					config.validate(kind)?;
					let config = serde_json::to_value(&config).map_err(Failure::other)?;
					let row = json!({
						"user_id": user_id,
						"type": kind.as_str(),
						"name": name,
						"status": "pending",
						"config": config,
						"created_at": rows::timestamp(),
					});
					let stored = client.insert(tables::INTEGRATIONS, row).await?;
					rows::decode::<Integration>(stored)
				}
			})
			.await?;

		self.integrations.lock().insert(0, integration.clone());
		Ok(integration)
	}

	/// Applies `patch`. A new config is checked against the cached
	/// integration's kind, or as a social integration when it is not cached.
	pub async fn update(&self, id: &str, patch: IntegrationPatch) -> Result<Integration, NormalizedError> {
		let client = Arc::clone(&self.client);
		let kind = self
			.integrations
			.lock()
			.iter()
			.find(|i| i.id == id)
			.map_or(IntegrationKind::Social, |i| i.kind);
		let id = id.to_string();

		let integration = self
			.update
			.execute(move || {
				let client = Arc::clone(&client);
				let id = id.clone();
				let patch = patch.clone();
				async move {
					if let Some(config) = &patch.config {
						config.validate(kind)?;
					}
					if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
						return Err(Failure::validation("Integration name is required"));
					}
					let row = rows::encode(&patch, [("updated_at", Value::String(rows::timestamp()))])?;
					let stored = client.update(tables::INTEGRATIONS, &id, row).await?.ok_or(Failure::NoData)?;
					rows::decode::<Integration>(stored)
				}
			})
			.await?;

		if let Some(slot) = self.integrations.lock().iter_mut().find(|i| i.id == integration.id) {
			*slot = integration.clone();
		}
		Ok(integration)
	}

	/// Flips an integration between active and inactive.
	pub async fn set_active(&self, id: &str, active: bool) -> Result<Integration, NormalizedError> {
		let status = if active { IntegrationStatus::Active } else { IntegrationStatus::Inactive };
		self.update(
			id,
			IntegrationPatch {
				status: Some(status),
				..IntegrationPatch::default()
			},
		)
		.await
	}

	pub async fn delete(&self, id: &str) -> Result<(), NormalizedError> {
		let client = Arc::clone(&self.client);
		let owned = id.to_string();

		self.remove
			.execute(move || {
				let client = Arc::clone(&client);
				let id = owned.clone();
				async move { client.delete(tables::INTEGRATIONS, &id).await }
			})
			.await?;

		self.integrations.lock().retain(|i| i.id != id);
		Ok(())
	}

	/// The user's API keys, newest first.
	pub async fn fetch_keys(&self, user_id: &str) -> Result<Vec<ApiKey>, NormalizedError> {
		let client = Arc::clone(&self.client);
		let user_id = user_id.to_string();

		let keys = self
			.fetch_keys
			.execute(move || {
				let client = Arc::clone(&client);
				let user_id = user_id.clone();
				async move {
					require_user(&user_id, "fetch API keys")?;
					let query = Query::new().eq("user_id", user_id).order("created_at", false);
					let selection = client.select(tables::API_KEYS, &query).await?;
					rows::decode_all::<ApiKey>(selection.rows)
				}
			})
			.await?;

		*self.keys.lock() = keys.clone();
		Ok(keys)
	}

	/// Issues a new key. The key text is generated once, so retried
	/// attempts store the same value.
	pub async fn create_key(&self, user_id: &str, name: &str) -> Result<ApiKey, NormalizedError> {
		let client = Arc::clone(&self.client);
		let user_id = user_id.to_string();
		let name = name.trim().to_string();
		let key = generate_key();

		let created = self
			.create_key
			.execute(move || {
				let client = Arc::clone(&client);
				let user_id = user_id.clone();
				let name = name.clone();
				let key = key.clone();
				async move {
					require_user(&user_id, "create an API key")?;
					if name.is_empty() {
						return Err(Failure::validation("API key name is required"));
					}
					let row = json!({
						"user_id": user_id,
						"name": name,
						"key": key,
						"created_at": rows::timestamp(),
					});
					let stored = client.insert(tables::API_KEYS, row).await?;
					rows::decode::<ApiKey>(stored)
				}
			})
			.await?;

		self.keys.lock().insert(0, created.clone());
		Ok(created)
	}

	pub async fn delete_key(&self, id: &str) -> Result<(), NormalizedError> {
		let client = Arc::clone(&self.client);
		let owned = id.to_string();

		self.remove_key
			.execute(move || {
				let client = Arc::clone(&client);
				let id = owned.clone();
				async move { client.delete(tables::API_KEYS, &id).await }
			})
			.await?;

		self.keys.lock().retain(|k| k.id != id);
		Ok(())
	}

	/// Loads the configured webhook domain, `None` when unset.
	pub async fn webhook_domain(&self) -> Result<Option<String>, NormalizedError> {
		let client = Arc::clone(&self.client);

		let domain = self
			.load_domain
			.execute(move || {
				let client = Arc::clone(&client);
				async move {
					let selection = client.select(tables::API_KEYS, &Query::new().eq("name", WEBHOOK_DOMAIN_KEY)).await?;
					let domain = selection
						.rows
						.first()
						.and_then(|row| row.get("value"))
						.and_then(Value::as_str)
						.filter(|v| !v.is_empty())
						.map(str::to_owned);
					Ok::<_, Failure>(domain)
				}
			})
			.await?;

		self.domain.lock().clone_from(&domain);
		Ok(domain)
	}

	/// Points billing webhooks at `domain`.
	pub async fn update_webhook_domain(&self, domain: &str) -> Result<String, NormalizedError> {
		let client = Arc::clone(&self.client);
		let domain = domain.trim().to_string();

		let updated = self
			.set_domain
			.execute(move || {
				let client = Arc::clone(&client);
				let domain = domain.clone();
				async move {
					if domain.is_empty() || domain.contains(char::is_whitespace) {
						return Err(Failure::validation("Webhook domain must be a host name"));
					}
					client
						.invoke(UPDATE_WEBHOOK_DOMAIN_FUNCTION, json!({ "domain": domain }))
						.await
						.map_err(|err| classify(err, "Failed to update webhook domain", WEBHOOK_ERROR))?;
					Ok(domain)
				}
			})
			.await?;

		*self.domain.lock() = Some(updated.clone());
		tracing::info!(domain = %updated, "webhooks.domain_updated");
		Ok(updated)
	}

	/// Re-registers the billing webhook endpoints for the current domain.
	pub async fn refresh_webhook_endpoints(&self) -> Result<(), NormalizedError> {
		let client = Arc::clone(&self.client);

		self.refresh
			.execute(move || {
				let client = Arc::clone(&client);
				async move {
					client
						.invoke(REFRESH_WEBHOOK_ENDPOINTS_FUNCTION, json!({}))
						.await
						.map_err(|err| classify(err, "Failed to refresh webhook endpoints", WEBHOOK_ERROR))?;
					Ok::<_, Failure>(())
				}
			})
			.await
	}
}

impl std::fmt::Debug for IntegrationDesk {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("IntegrationDesk")
			.field("integrations", &self.integrations.lock().len())
			.field("keys", &self.keys.lock().len())
			.finish_non_exhaustive()
	}
}
