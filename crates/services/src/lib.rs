//! Dashboard operations built on the mutation executor.
//!
//! Each desk owns an injected [`SharedClient`], one [`MutationExecutor`] per
//! kind of call, and the locally cached page it last loaded. Operation
//! bodies classify their own failures (validation, missing rows, backend
//! rejections); the executors decide what is retried.
//!
//! [`SharedClient`]: curator_backend::SharedClient
//! [`MutationExecutor`]: curator_mutation::MutationExecutor

pub mod analytics;
pub mod articles;
pub mod billing;
pub mod integrations;
pub mod models;
pub mod niches;
pub mod pagination;
pub mod plans;
pub mod posts;
mod rows;
#[cfg(test)]
mod testing;
pub mod users;
pub mod validation;

pub use analytics::{ActivityPeriod, AnalyticsDesk, AnalyticsSummary, Retention};
pub use articles::{ArticleDesk, ArticleFilter, ArticlePatch, NewArticle};
pub use billing::{Billing, CheckoutMode, CheckoutParams, CheckoutSession};
pub use integrations::{ApiKey, Integration, IntegrationConfig, IntegrationDesk, IntegrationKind, IntegrationPatch, IntegrationStatus};
pub use models::{
	Article, BillingInterval, Niche, PlanFeature, Platform, PostStatus, ScheduledPost, SubscriptionPlan, SubscriptionTier, UserProfile, UserRole,
};
pub use niches::{NicheDirectory, NicheSelection};
pub use pagination::{PaginatedResponse, PaginationParams, SortDirection};
pub use plans::{PlanCatalog, PlanDraft, PlanPatch, PlanQuery};
pub use posts::{NewScheduledPost, PostScheduler};
pub use users::{AdminUsers, NewUser, UserPatch};

/// Backend table names.
pub mod tables {
	pub const POSTS: &str = "posts";
	pub const USER_PROFILES: &str = "user_profiles";
	pub const SUBSCRIPTION_PLANS: &str = "subscription_plans";
	pub const NICHES: &str = "niches";
	pub const USER_NICHES: &str = "user_niches";
	pub const SCHEDULED_POSTS: &str = "scheduled_posts";
	pub const INTEGRATIONS: &str = "integrations";
	pub const API_KEYS: &str = "api_keys";
	/// Account status view read by analytics.
	pub const USERS: &str = "users";
	pub const USER_SESSIONS: &str = "user_sessions";
	pub const USER_ACTIVITY: &str = "user_activity";
	pub const SYSTEM_EVENTS: &str = "system_events";
}
