//! Row shapes exchanged with the backend.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
	#[default]
	User,
	Admin,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
	#[default]
	Free,
	Basic,
	Pro,
	Enterprise,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
	#[default]
	Draft,
	Scheduled,
	Published,
	Archived,
}

impl PostStatus {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Draft => "draft",
			Self::Scheduled => "scheduled",
			Self::Published => "published",
			Self::Archived => "archived",
		}
	}
}

/// Social platform a post is scheduled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
	Twitter,
	Facebook,
	Instagram,
	Linkedin,
}

impl Platform {
	/// Longest content the platform accepts, in characters.
	pub const fn max_len(self) -> usize {
		match self {
			Self::Twitter => 280,
			Self::Facebook => 63_206,
			Self::Instagram => 2_200,
			Self::Linkedin => 3_000,
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Twitter => "twitter",
			Self::Facebook => "facebook",
			Self::Instagram => "instagram",
			Self::Linkedin => "linkedin",
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
	#[default]
	Month,
	Year,
}

/// Article row, stored in the `posts` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
	pub id: String,
	pub user_id: String,
	pub niche_id: String,
	pub title: String,
	pub content: String,
	#[serde(default)]
	pub status: PostStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source_url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created_at: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
	pub id: String,
	pub email: String,
	#[serde(default)]
	pub first_name: Option<String>,
	#[serde(default)]
	pub last_name: Option<String>,
	#[serde(default)]
	pub role: UserRole,
	#[serde(default)]
	pub subscription_tier: SubscriptionTier,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created_at: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanFeature {
	pub name: String,
	#[serde(default)]
	pub included: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
	pub id: String,
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
	#[serde(default = "active_default")]
	pub active: bool,
}

fn active_default() -> bool {
	true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Niche {
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledPost {
	pub id: String,
	pub user_id: String,
	pub article_id: String,
	pub platform: Platform,
	pub content: String,
	pub scheduled_for: String,
	#[serde(default)]
	pub status: PostStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created_at: Option<String>,
}
