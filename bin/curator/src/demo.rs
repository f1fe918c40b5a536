//! In-memory walkthrough of the dashboard services.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use curator_backend::{BackendError, MemoryBackend, Operation, SharedClient};
use curator_error::{Failure, NormalizedError};
use curator_mutation::{MutationExecutor, MutationOptions, RetrySettings};
use curator_services::{
	AnalyticsDesk, ArticleDesk, ArticleFilter, IntegrationConfig, IntegrationDesk, IntegrationKind, NewArticle, NewScheduledPost, NicheDirectory,
	PlanCatalog, PlanQuery, Platform, PostScheduler, analytics, tables,
};
use serde_json::json;
use tracing::{info, warn};

fn seed(backend: &MemoryBackend) -> String {
	backend.seed(
		tables::NICHES,
		[
			json!({"id": "n-tech", "name": "Technology"}),
			json!({"id": "n-food", "name": "Food"}),
		],
	);
	backend.seed(
		tables::SUBSCRIPTION_PLANS,
		[
			json!({"id": "free", "name": "Free", "price": 0, "interval": "month", "active": true, "features": []}),
			json!({"id": "pro", "name": "Pro", "price": 29, "interval": "month", "active": true,
				"features": [{"name": "Scheduled posts", "included": true, "limit": 100}]}),
		],
	);
	let user = backend.add_user("demo@curator.dev", "demo-password");
	backend.sign_in(&user.id);
	let now = Utc::now().to_rfc3339();
	backend.seed(tables::USERS, [json!({"id": user.id, "status": "active", "created_at": now, "last_login": now})]);
	backend.seed(
		tables::USER_SESSIONS,
		[json!({"id": "s-demo", "user_email": user.email, "start_time": (Utc::now() - chrono::Duration::minutes(42)).to_rfc3339(), "status": "active"})],
	);
	user.id
}

pub async fn run(retry: RetrySettings) -> Result<(), NormalizedError> {
	let memory = Arc::new(MemoryBackend::new());
	let user_id = seed(&memory);
	let client: SharedClient = memory.clone();

	let niches = NicheDirectory::new(Arc::clone(&client), retry);
	niches.select(&user_id, "n-tech").await?;
	let selection = niches.load(Some(&user_id)).await?;
	info!(niches = selection.niches.len(), selected = ?selection.selected, "demo.niches");

	// Faults stay within the retry budget.
	let faults = retry.retries.min(2) as usize;

	let desk = ArticleDesk::new(Arc::clone(&client), ArticleFilter::for_user(&user_id), retry);
	memory.fail_times(Operation::Insert, BackendError::timeout(), faults);
	let article = desk
		.create(NewArticle {
			niche_id: "n-tech".into(),
			title: "Retrying the right failures".into(),
			content: "Only transient network errors deserve another attempt.".into(),
			status: None,
			source_url: None,
		})
		.await?;
	info!(id = %article.id, inserts = memory.calls(Operation::Insert), "demo.article.created");

	match desk
		.create(NewArticle {
			niche_id: "n-tech".into(),
			title: "Hi".into(),
			content: "Too short a title for this one.".into(),
			status: None,
			source_url: None,
		})
		.await
	{
		Ok(_) => warn!("demo.article.unexpected_success"),
		Err(err) => info!(kind = err.kind().as_str(), code = err.code(), message = err.message(), "demo.article.rejected"),
	}

	let page = desk.fetch("", None).await?;
	info!(total = page.total, has_more = page.has_more, "demo.articles");

	memory.fail_times(Operation::Select, BackendError::offline("connection reset"), faults.min(1));
	let plans = PlanCatalog::new(Arc::clone(&client), retry).fetch(&PlanQuery::default()).await?;
	for plan in &plans {
		info!(plan = %plan.name, price = plan.price, "demo.plan");
	}

	let post = PostScheduler::new(Arc::clone(&client), retry)
		.schedule(NewScheduledPost {
			article_id: article.id.clone(),
			platform: Platform::Twitter,
			content: format!("New on the blog: {}", article.title),
			scheduled_for: Utc::now() + chrono::Duration::hours(1),
		})
		.await?;
	info!(id = %post.id, platform = post.platform.as_str(), at = %post.scheduled_for, "demo.post.scheduled");

	let integrations = IntegrationDesk::new(Arc::clone(&client), retry);
	let social = IntegrationConfig {
		api_key: Some("demo-social-key".into()),
		..IntegrationConfig::default()
	};
	let integration = integrations.create(&user_id, IntegrationKind::Social, "Twitter", social).await?;
	integrations.set_active(&integration.id, true).await?;
	let key = integrations.create_key(&user_id, "demo").await?;
	info!(integration = %integration.id, api_key = %key.id, "demo.integrations");

	let summary = AnalyticsDesk::new(Arc::clone(&client), retry).refresh().await?;
	let now = Utc::now();
	for session in &summary.sessions {
		let elapsed = session.elapsed(now).map(analytics::format_elapsed);
		info!(session = %session.id, elapsed = elapsed.as_deref().unwrap_or("?"), "demo.analytics.session");
	}
	info!(active_users = summary.active_users, active_sessions = summary.active_sessions, "demo.analytics");

	if retry.retries > 0 {
		cancel_during_backoff(retry).await;
	}
	Ok(())
}

async fn cancel_during_backoff(retry: RetrySettings) {
	let unreachable: MutationExecutor<()> = MutationExecutor::new("demo.unreachable", MutationOptions::from(retry));
	let canceller = unreachable.clone();

	let (outcome, ()) = tokio::join!(
		unreachable.execute(|| async { Err::<(), _>(Failure::network("backend unreachable")) }),
		async move {
			tokio::time::sleep(Duration::from_millis(50)).await;
			canceller.cancel();
		}
	);
	match outcome {
		Err(err) if err.is_cancelled() => {
			info!(mutation = unreachable.name(), status = unreachable.state().status().as_str(), "demo.cancelled");
		}
		other => warn!(?other, "demo.cancel.unexpected"),
	}
}
