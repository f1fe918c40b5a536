//! Field validators. Each returns the first violation as a message.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::models::Platform;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));
static PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+?[\d\s-]{10,}$").expect("phone pattern"));
static POSTAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^[A-Z\d]{3,10}$").expect("postal pattern"));

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_TITLE_LEN: usize = 3;
pub const MIN_CONTENT_LEN: usize = 10;

pub type Validation = Result<(), String>;

pub fn is_email(value: &str) -> bool {
	EMAIL.is_match(value)
}

pub fn is_phone(value: &str) -> bool {
	PHONE.is_match(value)
}

pub fn is_postal_code(value: &str) -> bool {
	POSTAL.is_match(value)
}

pub fn credentials(email: &str, password: &str) -> Validation {
	if email.trim().is_empty() || password.is_empty() {
		return Err("Email and password are required".into());
	}
	if !is_email(email) {
		return Err("Invalid email address".into());
	}
	password_strength(password)
}

pub fn password_strength(password: &str) -> Validation {
	if password.chars().count() < MIN_PASSWORD_LEN {
		return Err(format!("Password must be at least {MIN_PASSWORD_LEN} characters long"));
	}
	Ok(())
}

pub fn article_title(title: &str) -> Validation {
	let title = title.trim();
	if title.is_empty() {
		return Err("Article title is required".into());
	}
	if title.chars().count() < MIN_TITLE_LEN {
		return Err(format!("Article title must be at least {MIN_TITLE_LEN} characters long"));
	}
	Ok(())
}

pub fn article_content(content: &str) -> Validation {
	let content = content.trim();
	if content.is_empty() {
		return Err("Article content is required".into());
	}
	if content.chars().count() < MIN_CONTENT_LEN {
		return Err(format!("Article content must be at least {MIN_CONTENT_LEN} characters long"));
	}
	Ok(())
}

pub fn article_niche(niche_id: &str) -> Validation {
	if niche_id.trim().is_empty() {
		return Err("Article niche is required".into());
	}
	Ok(())
}

pub fn post_content(platform: Platform, content: &str) -> Validation {
	if content.trim().is_empty() {
		return Err("Post content is required".into());
	}
	let max = platform.max_len();
	if content.chars().count() > max {
		return Err(format!("Content exceeds {max} characters for {}", platform.as_str()));
	}
	Ok(())
}

pub fn schedule_date(when: DateTime<Utc>, now: DateTime<Utc>) -> Validation {
	if when <= now {
		return Err("Schedule date must be in the future".into());
	}
	Ok(())
}
