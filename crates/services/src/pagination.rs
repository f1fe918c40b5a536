//! Page/limit pagination over row ranges.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
	Asc,
	#[default]
	Desc,
}

impl SortDirection {
	pub const fn is_ascending(self) -> bool {
		matches!(self, Self::Asc)
	}
}

/// 1-based page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationParams {
	pub page: usize,
	pub limit: usize,
	pub sort_by: String,
	pub sort_order: SortDirection,
}

impl Default for PaginationParams {
	fn default() -> Self {
		Self {
			page: 1,
			limit: DEFAULT_PAGE_SIZE,
			sort_by: "created_at".to_string(),
			sort_order: SortDirection::Desc,
		}
	}
}

impl PaginationParams {
	/// Inclusive row range `(from, to)` covered by this page.
	///
	/// Page 0 is treated as page 1 and a zero limit as one row.
	pub fn range(&self) -> (usize, usize) {
		let limit = self.limit.max(1);
		let from = (self.page.max(1) - 1).saturating_mul(limit);
		(from, from.saturating_add(limit - 1))
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
	pub data: Vec<T>,
	pub total: usize,
	pub page: usize,
	pub limit: usize,
	pub has_more: bool,
}

impl<T> PaginatedResponse<T> {
	/// Wraps one page of `data` given the unranged match count.
	pub fn new(data: Vec<T>, total: usize, params: &PaginationParams) -> Self {
		let (_, to) = params.range();
		Self {
			data,
			total,
			page: params.page.max(1),
			limit: params.limit.max(1),
			has_more: total > to.saturating_add(1),
		}
	}
}
