//! Admin analytics: user counts, sessions, activity and system events.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Months, Utc};
use curator_backend::{Query, SharedClient};
use curator_error::{Failure, NormalizedError};
use curator_mutation::{MutationExecutor, MutationOptions, RetrySettings};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{rows, tables};

pub const SESSION_LIMIT: usize = 50;
pub const ACTIVITY_LIMIT: usize = 20;
pub const EVENT_LIMIT: usize = 20;

/// Weeks after the signup week tracked by [`AnalyticsDesk::retention`].
pub const RETENTION_WEEKS: i64 = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
	Active,
	Idle,
	#[default]
	Ended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
	pub id: String,
	#[serde(default)]
	pub user_email: String,
	pub start_time: String,
	#[serde(default)]
	pub status: SessionStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_activity: Option<String>,
}

impl UserSession {
	/// Time since the session started, `None` when `start_time` is unparsable.
	pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
		parse_time(&self.start_time).map(|start| now - start)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserActivity {
	#[serde(default)]
	pub user_id: Option<String>,
	#[serde(default)]
	pub user_email: String,
	pub action: String,
	pub timestamp: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub details: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
	Error,
	Warning,
	#[default]
	Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
	pub id: String,
	#[serde(rename = "type", default)]
	pub level: EventLevel,
	pub timestamp: String,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub details: Option<Value>,
}

/// Dashboard snapshot assembled by [`AnalyticsDesk::refresh`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
	pub active_users: usize,
	pub new_users_today: usize,
	/// Percentage of accounts older than 30 days that logged in within them.
	pub retention_rate: f64,
	pub active_sessions: usize,
	pub sessions: Vec<UserSession>,
	pub recent_activity: Vec<UserActivity>,
	pub system_events: Vec<SystemEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityPeriod {
	Daily,
	Weekly,
	Monthly,
}

impl ActivityPeriod {
	fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
		match self {
			Self::Daily => now - Duration::days(1),
			Self::Weekly => now - Duration::days(7),
			Self::Monthly => now.checked_sub_months(Months::new(1)).unwrap_or(now - Duration::days(30)),
		}
	}
}

/// Signup cohort and the share of it active in each following week.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Retention {
	pub cohort_size: usize,
	pub retention_by_week: Vec<f64>,
}

fn parse_time(text: &str) -> Option<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(text).ok().map(|t| t.with_timezone(&Utc))
}

fn time_of(row: &Value, column: &str) -> Option<DateTime<Utc>> {
	row.get(column).and_then(Value::as_str).and_then(parse_time)
}

fn text_of<'a>(row: &'a Value, column: &str) -> Option<&'a str> {
	row.get(column).and_then(Value::as_str)
}

fn percent(part: usize, whole: usize) -> f64 {
	if whole == 0 {
		return 0.0;
	}
	part as f64 * 100.0 / whole as f64
}

/// Formats an elapsed time as `1h 5m`, `4m 2s` or `9s`.
pub fn format_elapsed(elapsed: Duration) -> String {
	let seconds = elapsed.num_seconds().max(0);
	let (hours, minutes) = (seconds / 3600, seconds / 60);
	if hours > 0 {
		format!("{hours}h {}m", minutes % 60)
	} else if minutes > 0 {
		format!("{minutes}m {}s", seconds % 60)
	} else {
		format!("{seconds}s")
	}
}

async fn summarize(client: &SharedClient, now: DateTime<Utc>) -> Result<AnalyticsSummary, Failure> {
	let active_users = client.select(tables::USERS, &Query::new().eq("status", "active")).await?.count;

	let users = client.select(tables::USERS, &Query::new()).await?.rows;
	let midnight = now.date_naive().and_hms_opt(0, 0, 0).map_or(now, |t| t.and_utc());
	let new_users_today = users.iter().filter(|u| time_of(u, "created_at").is_some_and(|t| t >= midnight)).count();

	let cutoff = now - Duration::days(30);
	let established: Vec<_> = users.iter().filter(|u| time_of(u, "created_at").is_some_and(|t| t < cutoff)).collect();
	let returning = established.iter().filter(|u| time_of(u, "last_login").is_some_and(|t| t > cutoff)).count();

	let latest = |column: &str, limit: usize| Query::new().order(column, false).range(0, limit - 1);
	let sessions = client.select(tables::USER_SESSIONS, &latest("start_time", SESSION_LIMIT)).await?;
	let sessions: Vec<UserSession> = rows::decode_all(sessions.rows)?;
	let activity = client.select(tables::USER_ACTIVITY, &latest("timestamp", ACTIVITY_LIMIT)).await?;
	let events = client.select(tables::SYSTEM_EVENTS, &latest("timestamp", EVENT_LIMIT)).await?;

	Ok(AnalyticsSummary {
		active_users,
		new_users_today,
		retention_rate: percent(returning, established.len()),
		active_sessions: sessions.iter().filter(|s| s.status == SessionStatus::Active).count(),
		sessions,
		recent_activity: rows::decode_all(activity.rows)?,
		system_events: rows::decode_all(events.rows)?,
	})
}

async fn cohort_retention(client: &SharedClient, cohort_start: DateTime<Utc>) -> Result<Retention, Failure> {
	let cohort_end = cohort_start + Duration::days(7);
	let cohort: HashSet<String> = client
		.select(tables::USERS, &Query::new())
		.await?
		.rows
		.iter()
		.filter(|u| time_of(u, "created_at").is_some_and(|t| t >= cohort_start && t < cohort_end))
		.filter_map(|u| text_of(u, "id").map(str::to_owned))
		.collect();
	let activity = client.select(tables::USER_ACTIVITY, &Query::new()).await?.rows;

	let retention_by_week = (1..=RETENTION_WEEKS)
		.map(|week| {
			let from = cohort_start + Duration::weeks(week);
			let to = from + Duration::days(7);
			let active: HashSet<&str> = activity
				.iter()
				.filter(|a| time_of(a, "timestamp").is_some_and(|t| t >= from && t < to))
				.filter_map(|a| text_of(a, "user_id"))
				.filter(|id| cohort.contains(*id))
				.collect();
			percent(active.len(), cohort.len())
		})
		.collect();

	Ok(Retention {
		cohort_size: cohort.len(),
		retention_by_week,
	})
}

pub struct AnalyticsDesk {
	client: SharedClient,
	summary: Mutex<Option<AnalyticsSummary>>,
	refresh: MutationExecutor<AnalyticsSummary>,
	active: MutationExecutor<usize>,
	activity: MutationExecutor<Vec<UserActivity>>,
	retention: MutationExecutor<Retention>,
}

impl AnalyticsDesk {
	pub fn new(client: SharedClient, retry: RetrySettings) -> Self {
		Self {
			client,
			summary: Mutex::new(None),
			refresh: MutationExecutor::new("analytics.refresh", MutationOptions::from(retry)),
			active: MutationExecutor::new("analytics.active_users", MutationOptions::from(retry)),
			activity: MutationExecutor::new("analytics.user_activity", MutationOptions::from(retry)),
			retention: MutationExecutor::new("analytics.retention", MutationOptions::from(retry)),
		}
	}

	/// Snapshot from the last successful refresh.
	pub fn summary(&self) -> Option<AnalyticsSummary> {
		self.summary.lock().clone()
	}

	/// Rebuilds the dashboard snapshot. A failed refresh keeps the
	/// previous snapshot.
	pub async fn refresh(&self) -> Result<AnalyticsSummary, NormalizedError> {
		let client = Arc::clone(&self.client);

		let summary = self
			.refresh
			.execute(move || {
				let client = Arc::clone(&client);
				async move { summarize(&client, Utc::now()).await }
			})
			.await?;

		*self.summary.lock() = Some(summary.clone());
		Ok(summary)
	}

	/// Distinct users with any activity inside `period`.
	pub async fn active_users(&self, period: ActivityPeriod) -> Result<usize, NormalizedError> {
		let client = Arc::clone(&self.client);

		self.active
			.execute(move || {
				let client = Arc::clone(&client);
				async move {
					let since = period.start(Utc::now());
					let activity = client.select(tables::USER_ACTIVITY, &Query::new()).await?.rows;
					let users: HashSet<&str> = activity
						.iter()
						.filter(|a| time_of(a, "timestamp").is_some_and(|t| t >= since))
						.filter_map(|a| text_of(a, "user_id"))
						.collect();
					Ok::<_, Failure>(users.len())
				}
			})
			.await
	}

	/// One user's activity, newest first, within the optional bounds.
	pub async fn user_activity(&self, user_id: &str, since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Result<Vec<UserActivity>, NormalizedError> {
		let client = Arc::clone(&self.client);
		let user_id = user_id.to_string();

		self.activity
			.execute(move || {
				let client = Arc::clone(&client);
				let user_id = user_id.clone();
				async move {
					let query = Query::new().eq("user_id", user_id).order("timestamp", false);
					let found = client.select(tables::USER_ACTIVITY, &query).await?.rows;
					let within = found
						.into_iter()
						.filter(|a| {
							let at = time_of(a, "timestamp");
							since.is_none_or(|s| at.is_some_and(|t| t >= s)) && until.is_none_or(|u| at.is_some_and(|t| t <= u))
						})
						.collect();
					rows::decode_all::<UserActivity>(within)
				}
			})
			.await
	}

	/// Weekly retention of users who signed up in the week from `cohort_start`.
	pub async fn retention(&self, cohort_start: DateTime<Utc>) -> Result<Retention, NormalizedError> {
		let client = Arc::clone(&self.client);

		self.retention
			.execute(move || {
				let client = Arc::clone(&client);
				async move { cohort_retention(&client, cohort_start).await }
			})
			.await
	}
}

impl std::fmt::Debug for AnalyticsDesk {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AnalyticsDesk").field("loaded", &self.summary.lock().is_some()).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use chrono::SecondsFormat;
	use curator_backend::{BackendError, MemoryBackend, Operation};
	use curator_error::ErrorKind;
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;
	use crate::testing::{backend, fast_retry};

	fn ago(days: i64) -> String {
		(Utc::now() - Duration::days(days)).to_rfc3339_opts(SecondsFormat::Millis, true)
	}

	fn seeded() -> Arc<MemoryBackend> {
		let backend = backend();
		backend.seed(
			tables::USERS,
			[
				json!({"id": "u1", "status": "active", "created_at": ago(90), "last_login": ago(2)}),
				json!({"id": "u2", "status": "active", "created_at": ago(60), "last_login": ago(45)}),
				json!({"id": "u3", "status": "suspended", "created_at": ago(40)}),
				json!({"id": "u4", "status": "active", "created_at": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)}),
			],
		);
		backend.seed(
			tables::USER_SESSIONS,
			[
				json!({"id": "s1", "user_email": "a@x.co", "start_time": ago(1), "status": "active"}),
				json!({"id": "s2", "user_email": "b@x.co", "start_time": ago(3), "status": "ended"}),
				json!({"id": "s3", "user_email": "c@x.co", "start_time": ago(0), "status": "active"}),
			],
		);
		backend.seed(
			tables::USER_ACTIVITY,
			[
				json!({"user_id": "u1", "user_email": "a@x.co", "action": "login", "timestamp": ago(0)}),
				json!({"user_id": "u1", "user_email": "a@x.co", "action": "publish", "timestamp": ago(3)}),
				json!({"user_id": "u2", "user_email": "b@x.co", "action": "login", "timestamp": ago(5)}),
				json!({"user_id": "u3", "user_email": "c@x.co", "action": "login", "timestamp": ago(20)}),
			],
		);
		backend.seed(
			tables::SYSTEM_EVENTS,
			[json!({"id": "e1", "type": "warning", "timestamp": ago(1), "message": "slow query"})],
		);
		backend
	}

	#[test]
	fn elapsed_time_uses_two_largest_units() {
		assert_eq!(format_elapsed(Duration::seconds(9)), "9s");
		assert_eq!(format_elapsed(Duration::seconds(242)), "4m 2s");
		assert_eq!(format_elapsed(Duration::minutes(65)), "1h 5m");
		assert_eq!(format_elapsed(Duration::seconds(-5)), "0s");
	}

	#[tokio::test]
	async fn refresh_builds_summary() {
		let backend = seeded();
		let desk = AnalyticsDesk::new(backend.clone(), fast_retry());
		assert_eq!(desk.summary(), None);

		let summary = desk.refresh().await.unwrap();
		assert_eq!(summary.active_users, 3);
		assert_eq!(summary.new_users_today, 1);
		assert_eq!(summary.retention_rate, 100.0 / 3.0);
		assert_eq!(summary.active_sessions, 2);
		let sessions: Vec<_> = summary.sessions.iter().map(|s| s.id.as_str()).collect();
		assert_eq!(sessions, vec!["s3", "s1", "s2"]);
		assert_eq!(summary.recent_activity[0].action, "login");
		assert_eq!(summary.recent_activity.len(), 4);
		assert_eq!(summary.system_events[0].level, EventLevel::Warning);
		assert_eq!(desk.summary(), Some(summary));
	}

	#[tokio::test]
	async fn recent_lists_are_capped() {
		let backend = backend();
		backend.seed(
			tables::USER_ACTIVITY,
			(0..30).map(|i| json!({"user_id": format!("u{i}"), "action": "view", "timestamp": ago(i)})),
		);
		let desk = AnalyticsDesk::new(backend.clone(), fast_retry());

		let summary = desk.refresh().await.unwrap();
		assert_eq!(summary.recent_activity.len(), ACTIVITY_LIMIT);
		assert_eq!(summary.recent_activity[0].user_id.as_deref(), Some("u0"));
		assert_eq!(summary.retention_rate, 0.0);
	}

	#[tokio::test(start_paused = true)]
	async fn failed_refresh_keeps_previous_summary() {
		let backend = seeded();
		let desk = AnalyticsDesk::new(backend.clone(), fast_retry());
		let first = desk.refresh().await.unwrap();

		backend.fail_times(Operation::Select, BackendError::timeout(), 4);
		let err = desk.refresh().await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Network);
		assert_eq!(desk.summary(), Some(first));
	}

	#[tokio::test]
	async fn active_users_counts_distinct_users_in_period() {
		let desk = AnalyticsDesk::new(seeded(), fast_retry());

		assert_eq!(desk.active_users(ActivityPeriod::Daily).await.unwrap(), 1);
		assert_eq!(desk.active_users(ActivityPeriod::Weekly).await.unwrap(), 2);
		assert_eq!(desk.active_users(ActivityPeriod::Monthly).await.unwrap(), 3);
	}

	#[tokio::test]
	async fn user_activity_respects_bounds() {
		let desk = AnalyticsDesk::new(seeded(), fast_retry());

		let all = desk.user_activity("u1", None, None).await.unwrap();
		let actions: Vec<_> = all.iter().map(|a| a.action.as_str()).collect();
		assert_eq!(actions, vec!["login", "publish"]);

		let older = desk.user_activity("u1", None, Some(Utc::now() - Duration::days(1))).await.unwrap();
		assert_eq!(older.len(), 1);
		assert_eq!(older[0].action, "publish");
		assert!(desk.user_activity("u1", Some(Utc::now() + Duration::days(1)), None).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn retention_tracks_cohort_week_by_week() {
		let backend = backend();
		let start = Utc::now() - Duration::weeks(10);
		let at = |offset: Duration| (start + offset).to_rfc3339_opts(SecondsFormat::Millis, true);
		backend.seed(
			tables::USERS,
			[
				json!({"id": "c1", "created_at": at(Duration::days(1))}),
				json!({"id": "c2", "created_at": at(Duration::days(2))}),
				json!({"id": "late", "created_at": at(Duration::days(9))}),
			],
		);
		backend.seed(
			tables::USER_ACTIVITY,
			[
				json!({"user_id": "c1", "action": "login", "timestamp": at(Duration::days(8))}),
				json!({"user_id": "c2", "action": "login", "timestamp": at(Duration::days(10))}),
				json!({"user_id": "c1", "action": "login", "timestamp": at(Duration::days(11))}),
				json!({"user_id": "late", "action": "login", "timestamp": at(Duration::days(15))}),
				json!({"user_id": "c2", "action": "login", "timestamp": at(Duration::days(22))}),
			],
		);
		let desk = AnalyticsDesk::new(backend.clone(), fast_retry());

		let retention = desk.retention(start).await.unwrap();
		assert_eq!(retention.cohort_size, 2);
		assert_eq!(retention.retention_by_week, vec![100.0, 0.0, 50.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

		let empty = desk.retention(Utc::now()).await.unwrap();
		assert_eq!(empty.cohort_size, 0);
		assert!(empty.retention_by_week.iter().all(|p| *p == 0.0));
	}
}
