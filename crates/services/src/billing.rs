//! Hosted checkout and customer portal sessions via backend functions.

use std::sync::Arc;

use curator_backend::{BackendError, SharedClient};
use curator_error::{Failure, NormalizedError};
use curator_mutation::{MutationExecutor, MutationOptions, RetrySettings};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const CHECKOUT_FUNCTION: &str = "create-checkout-session";
pub const PORTAL_FUNCTION: &str = "create-portal-session";

pub const CHECKOUT_ERROR: &str = "CHECKOUT_ERROR";
pub const PORTAL_ERROR: &str = "PORTAL_ERROR";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMode {
	Payment,
	#[default]
	Subscription,
}

/// Request body of the checkout function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutParams {
	pub price_id: String,
	pub success_url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cancel_url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub customer_email: Option<String>,
	#[serde(default)]
	pub mode: CheckoutMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
	pub session_id: String,
	pub url: Option<String>,
}

/// Rejections become `code` remote errors, except throttling (HTTP 429)
/// which keeps its rate-limit code. Transport failures stay network errors.
pub(crate) fn classify(err: BackendError, context: &str, code: &str) -> Failure {
	match err {
		BackendError::Rejected {
			message,
			status: status @ Some(429),
			..
		} => Failure::Remote {
			message: format!("{context}: {message}"),
			code: None,
			status,
		},
		BackendError::Rejected { message, .. } => Failure::remote(format!("{context}: {message}"), Some(code.to_string())),
		transport @ BackendError::Transport { .. } => transport.into(),
	}
}

fn text_field(data: &Value, field: &str) -> Option<String> {
	data.get(field).and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_owned)
}

pub struct Billing {
	client: SharedClient,
	checkout: MutationExecutor<CheckoutSession>,
	portal: MutationExecutor<String>,
}

impl Billing {
	pub fn new(client: SharedClient, retry: RetrySettings) -> Self {
		Self {
			client,
			checkout: MutationExecutor::new("billing.checkout", MutationOptions::from(retry)),
			portal: MutationExecutor::new("billing.portal", MutationOptions::from(retry)),
		}
	}

	pub async fn create_checkout_session(&self, params: CheckoutParams) -> Result<CheckoutSession, NormalizedError> {
		let client = Arc::clone(&self.client);

		self.checkout
			.execute(move || {
				let client = Arc::clone(&client);
				let params = params.clone();
				async move {
					if params.price_id.trim().is_empty() {
						return Err(Failure::validation("Price ID is required"));
					}
					let body = serde_json::to_value(&params).map_err(Failure::other)?;
					let data = client
						.invoke(CHECKOUT_FUNCTION, body)
						.await
						.map_err(|err| classify(err, "Failed to create checkout session", CHECKOUT_ERROR))?;
					let session_id = text_field(&data, "id").ok_or(Failure::NoData)?;
					Ok(CheckoutSession {
						session_id,
						url: text_field(&data, "url"),
					})
				}
			})
			.await
	}

	/// Returns the portal URL for `customer_id`.
	pub async fn create_customer_portal(&self, customer_id: &str, return_url: &str) -> Result<String, NormalizedError> {
		let client = Arc::clone(&self.client);
		let body = json!({ "customerId": customer_id, "returnUrl": return_url });

		self.portal
			.execute(move || {
				let client = Arc::clone(&client);
				let body = body.clone();
				async move {
					let data = client
						.invoke(PORTAL_FUNCTION, body)
						.await
						.map_err(|err| classify(err, "Failed to create customer portal", PORTAL_ERROR))?;
					text_field(&data, "url").ok_or(Failure::NoData)
				}
			})
			.await
	}
}

impl std::fmt::Debug for Billing {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Billing").finish_non_exhaustive()
	}
}
