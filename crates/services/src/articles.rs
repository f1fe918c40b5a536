//! Per-user article desk over the `posts` table.

use std::sync::Arc;

use curator_backend::{Query, SharedClient};
use curator_error::{Failure, NormalizedError};
use curator_mutation::{MutationExecutor, MutationOptions, RetrySettings};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::models::{Article, PostStatus};
use crate::pagination::{PaginatedResponse, PaginationParams, SortDirection};
use crate::{rows, tables, validation};

const SEARCH_COLUMNS: [&str; 2] = ["title", "content"];

/// Rows an [`ArticleDesk`] is scoped to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
	pub user_id: Option<String>,
	pub niche_id: Option<String>,
	pub status: Option<PostStatus>,
}

impl ArticleFilter {
	pub fn for_user(user_id: impl Into<String>) -> Self {
		Self {
			user_id: Some(user_id.into()),
			..Self::default()
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArticle {
	pub niche_id: String,
	pub title: String,
	pub content: String,
	#[serde(default)]
	pub status: Option<PostStatus>,
	#[serde(default)]
	pub source_url: Option<String>,
}

impl NewArticle {
	fn validate(&self) -> validation::Validation {
		validation::article_title(&self.title)?;
		validation::article_content(&self.content)?;
		validation::article_niche(&self.niche_id)
	}
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticlePatch {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub niche_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub content: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<PostStatus>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source_url: Option<String>,
}

impl ArticlePatch {
	fn validate(&self) -> validation::Validation {
		if let Some(title) = &self.title {
			validation::article_title(title)?;
		}
		if let Some(content) = &self.content {
			validation::article_content(content)?;
		}
		if let Some(niche_id) = &self.niche_id {
			validation::article_niche(niche_id)?;
		}
		Ok(())
	}
}

/// Loads, pages and edits one user's articles.
///
/// The page last loaded is cached and kept in step with successful
/// creates, updates and deletes.
pub struct ArticleDesk {
	client: SharedClient,
	filter: ArticleFilter,
	search: Mutex<String>,
	pagination: Mutex<PaginationParams>,
	cache: Mutex<Page>,
	load: MutationExecutor<PaginatedResponse<Article>>,
	create: MutationExecutor<Article>,
	update: MutationExecutor<Article>,
	remove: MutationExecutor<()>,
}

#[derive(Default)]
struct Page {
	articles: Vec<Article>,
	total: usize,
}

impl ArticleDesk {
	pub fn new(client: SharedClient, filter: ArticleFilter, retry: RetrySettings) -> Self {
		Self {
			client,
			filter,
			search: Mutex::new(String::new()),
			pagination: Mutex::new(PaginationParams::default()),
			cache: Mutex::new(Page::default()),
			load: MutationExecutor::new("articles.fetch", MutationOptions::from(retry)),
			create: MutationExecutor::new("articles.create", MutationOptions::from(retry)),
			update: MutationExecutor::new("articles.update", MutationOptions::from(retry)),
			remove: MutationExecutor::new("articles.delete", MutationOptions::from(retry)),
		}
	}

	pub fn filter(&self) -> &ArticleFilter {
		&self.filter
	}

	/// Articles of the page last loaded, as edited since.
	pub fn articles(&self) -> Vec<Article> {
		self.cache.lock().articles.clone()
	}

	/// Match count reported by the last load.
	pub fn total(&self) -> usize {
		self.cache.lock().total
	}

	pub fn pagination(&self) -> PaginationParams {
		self.pagination.lock().clone()
	}

	/// Loads the page selected by `params` (or the current one) matching
	/// `search` in title or content.
	pub async fn fetch(&self, search: &str, params: Option<PaginationParams>) -> Result<PaginatedResponse<Article>, NormalizedError> {
		*self.search.lock() = search.to_string();
		if let Some(params) = params {
			*self.pagination.lock() = params;
		}
		self.refresh().await
	}

	/// Moves to `page` and reloads.
	pub async fn set_page(&self, page: usize) -> Result<PaginatedResponse<Article>, NormalizedError> {
		self.pagination.lock().page = page.max(1);
		self.refresh().await
	}

	/// Changes the page size, returns to the first page and reloads.
	pub async fn set_page_size(&self, limit: usize) -> Result<PaginatedResponse<Article>, NormalizedError> {
		{
			let mut params = self.pagination.lock();
			params.limit = limit.max(1);
			params.page = 1;
		}
		self.refresh().await
	}

	/// Orders by `column`, returns to the first page and reloads.
	pub async fn sort(&self, column: &str, direction: SortDirection) -> Result<PaginatedResponse<Article>, NormalizedError> {
		{
			let mut params = self.pagination.lock();
			params.sort_by = column.to_string();
			params.sort_order = direction;
			params.page = 1;
		}
		self.refresh().await
	}

	async fn refresh(&self) -> Result<PaginatedResponse<Article>, NormalizedError> {
		let params = self.pagination.lock().clone();
		let query = self.query(&self.search.lock(), &params);
		let client = Arc::clone(&self.client);

		let page = self
			.load
			.execute(move || {
				let client = Arc::clone(&client);
				let query = query.clone();
				let params = params.clone();
				async move {
					let query = query.ok_or_else(|| Failure::validation("User ID is required to fetch articles"))?;
					let selection = client.select(tables::POSTS, &query).await?;
					let data: Vec<Article> = rows::decode_all(selection.rows)?;
					Ok::<_, Failure>(PaginatedResponse::new(data, selection.count, &params))
				}
			})
			.await?;

		let mut cache = self.cache.lock();
		cache.articles = page.data.clone();
		cache.total = page.total;
		Ok(page)
	}

	/// `None` when no user is set.
	fn query(&self, search: &str, params: &PaginationParams) -> Option<Query> {
		let user_id = self.filter.user_id.as_deref()?;
		let (from, to) = params.range();
		let mut query = Query::new().eq("user_id", user_id);
		if let Some(niche_id) = &self.filter.niche_id {
			query = query.eq("niche_id", niche_id.as_str());
		}
		if let Some(status) = self.filter.status {
			query = query.eq("status", status.as_str());
		}
		Some(
			query
				.search(&SEARCH_COLUMNS, search)
				.order(params.sort_by.as_str(), params.sort_order.is_ascending())
				.range(from, to),
		)
	}

	/// Validates and stores a new article owned by the desk's user.
	pub async fn create(&self, data: NewArticle) -> Result<Article, NormalizedError> {
		let client = Arc::clone(&self.client);
		let user_id = self.filter.user_id.clone();

		let article = self
			.create
			.execute(move || {
				let client = Arc::clone(&client);
				let user_id = user_id.clone();
				let data = data.clone();
				async move {
					let user_id = user_id.ok_or_else(|| Failure::validation("User ID is required to create article"))?;
					data.validate().map_err(Failure::validation)?;
					let now = rows::timestamp();
					let row = rows::encode(
						&data,
						[
							("user_id", Value::String(user_id)),
							("status", json!(data.status.unwrap_or_default())),
							("created_at", Value::String(now.clone())),
							("updated_at", Value::String(now)),
						],
					)?;
					let stored = client.insert(tables::POSTS, row).await?;
					rows::decode::<Article>(stored)
				}
			})
			.await?;

		let mut cache = self.cache.lock();
		cache.articles.insert(0, article.clone());
		cache.total += 1;
		Ok(article)
	}

	/// Applies `patch` to article `id`, validating the fields it sets.
	pub async fn update(&self, id: &str, patch: ArticlePatch) -> Result<Article, NormalizedError> {
		let client = Arc::clone(&self.client);
		let id = id.to_string();

		let article = self
			.update
			.execute(move || {
				let client = Arc::clone(&client);
				let id = id.clone();
				let patch = patch.clone();
				async move {
					patch.validate().map_err(Failure::validation)?;
					let row = rows::encode(&patch, [("updated_at", Value::String(rows::timestamp()))])?;
					let stored = client.update(tables::POSTS, &id, row).await?.ok_or(Failure::NoData)?;
					rows::decode::<Article>(stored)
				}
			})
			.await?;

		let mut cache = self.cache.lock();
		if let Some(slot) = cache.articles.iter_mut().find(|a| a.id == article.id) {
			*slot = article.clone();
		}
		Ok(article)
	}

	pub async fn delete(&self, id: &str) -> Result<(), NormalizedError> {
		let client = Arc::clone(&self.client);
		let owned = id.to_string();

		self.remove
			.execute(move || {
				let client = Arc::clone(&client);
				let id = owned.clone();
				async move { client.delete(tables::POSTS, &id).await }
			})
			.await?;

		let mut cache = self.cache.lock();
		let before = cache.articles.len();
		cache.articles.retain(|a| a.id != id);
		if cache.articles.len() < before {
			cache.total = cache.total.saturating_sub(1);
		}
		Ok(())
	}

	/// Cancels every in-flight operation of this desk.
	pub fn cancel(&self) {
		self.load.cancel();
		self.create.cancel();
		self.update.cancel();
		self.remove.cancel();
	}
}

impl std::fmt::Debug for ArticleDesk {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ArticleDesk")
			.field("filter", &self.filter)
			.field("pagination", &*self.pagination.lock())
			.field("cached", &self.cache.lock().articles.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use curator_backend::{BackendError, MemoryBackend, Operation};
	use curator_error::{ErrorKind, codes};
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::testing::{backend, fast_retry};

	fn seeded() -> Arc<MemoryBackend> {
		let backend = backend();
		backend.seed(
			tables::POSTS,
			[
				json!({"id": "a1", "user_id": "u1", "niche_id": "n1", "title": "Rust in production", "content": "Ten years of lessons", "status": "published", "created_at": "2024-01-01T00:00:00.000Z"}),
				json!({"id": "a2", "user_id": "u1", "niche_id": "n2", "title": "Sourdough basics", "content": "Flour, water and patience", "status": "draft", "created_at": "2024-02-01T00:00:00.000Z"}),
				json!({"id": "a3", "user_id": "u1", "niche_id": "n1", "title": "Async pitfalls", "content": "Holding locks across await", "status": "draft", "created_at": "2024-03-01T00:00:00.000Z"}),
				json!({"id": "b1", "user_id": "u2", "niche_id": "n1", "title": "Not mine", "content": "Belongs to someone else", "status": "draft", "created_at": "2024-04-01T00:00:00.000Z"}),
			],
		);
		backend
	}

	fn desk(backend: &Arc<MemoryBackend>, filter: ArticleFilter) -> ArticleDesk {
		ArticleDesk::new(backend.clone(), filter, fast_retry())
	}

	fn ids(page: &PaginatedResponse<Article>) -> Vec<&str> {
		page.data.iter().map(|a| a.id.as_str()).collect()
	}

	#[tokio::test]
	async fn fetch_scopes_to_user_newest_first() {
		let backend = seeded();
		let desk = desk(&backend, ArticleFilter::for_user("u1"));

		let page = desk.fetch("", None).await.unwrap();
		assert_eq!(ids(&page), vec!["a3", "a2", "a1"]);
		assert_eq!(page.total, 3);
		assert!(!page.has_more);
		assert_eq!(desk.articles().len(), 3);
	}

	#[tokio::test]
	async fn fetch_applies_niche_status_and_search() {
		let backend = seeded();
		let filter = ArticleFilter {
			niche_id: Some("n1".into()),
			status: Some(PostStatus::Draft),
			..ArticleFilter::for_user("u1")
		};
		let page = desk(&backend, filter).fetch("", None).await.unwrap();
		assert_eq!(ids(&page), vec!["a3"]);

		let page = desk(&backend, ArticleFilter::for_user("u1")).fetch("FLOUR", None).await.unwrap();
		assert_eq!(ids(&page), vec!["a2"]);
	}

	#[tokio::test]
	async fn fetch_without_user_is_a_validation_error() {
		let backend = seeded();
		let err = desk(&backend, ArticleFilter::default()).fetch("", None).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Validation);
		assert_eq!(err.message(), "User ID is required to fetch articles");
		assert_eq!(backend.calls(Operation::Select), 0);
	}

	#[tokio::test]
	async fn paging_helpers_reload() {
		let backend = seeded();
		let desk = desk(&backend, ArticleFilter::for_user("u1"));

		let page = desk.set_page_size(2).await.unwrap();
		assert_eq!(ids(&page), vec!["a3", "a2"]);
		assert!(page.has_more);

		let page = desk.set_page(2).await.unwrap();
		assert_eq!(ids(&page), vec!["a1"]);
		assert!(!page.has_more);

		let page = desk.sort("title", SortDirection::Asc).await.unwrap();
		assert_eq!(desk.pagination().page, 1);
		assert_eq!(ids(&page), vec!["a3", "a1"]);
	}

	#[tokio::test]
	async fn far_page_is_empty() {
		let backend = seeded();
		let desk = desk(&backend, ArticleFilter::for_user("u1"));

		let page = desk.set_page(usize::MAX).await.unwrap();
		assert!(page.data.is_empty());
		assert_eq!(page.total, 3);
		assert!(!page.has_more);
	}

	#[tokio::test(start_paused = true)]
	async fn fetch_retries_transient_failures() {
		let backend = seeded();
		backend.fail_times(Operation::Select, BackendError::timeout(), 2);
		let desk = desk(&backend, ArticleFilter::for_user("u1"));

		let page = desk.fetch("", None).await.unwrap();
		assert_eq!(page.total, 3);
		assert_eq!(backend.calls(Operation::Select), 3);
	}

	#[tokio::test]
	async fn create_defaults_to_draft_and_prepends_to_cache() {
		let backend = seeded();
		let desk = desk(&backend, ArticleFilter::for_user("u1"));
		desk.fetch("", None).await.unwrap();

		let article = desk
			.create(NewArticle {
				niche_id: "n1".into(),
				title: "Fresh take".into(),
				content: "Something worth reading".into(),
				status: None,
				source_url: None,
			})
			.await
			.unwrap();

		assert_eq!(article.user_id, "u1");
		assert_eq!(article.status, PostStatus::Draft);
		assert!(article.created_at.is_some());
		assert_eq!(article.created_at, article.updated_at);
		assert_eq!(desk.articles()[0].id, article.id);
		assert_eq!(desk.total(), 4);
		assert_eq!(backend.rows(tables::POSTS).len(), 5);
	}

	#[tokio::test]
	async fn create_rejects_invalid_fields_without_calling_backend() {
		let backend = seeded();
		let desk = desk(&backend, ArticleFilter::for_user("u1"));

		let err = desk
			.create(NewArticle {
				niche_id: "n1".into(),
				title: "ok title".into(),
				content: "too short".into(),
				status: None,
				source_url: None,
			})
			.await
			.unwrap_err();
		assert_eq!(err.code(), codes::VALIDATION);
		assert_eq!(err.message(), "Article content must be at least 10 characters long");
		assert_eq!(backend.calls(Operation::Insert), 0);
	}

	#[tokio::test]
	async fn update_validates_only_supplied_fields() {
		let backend = seeded();
		let desk = desk(&backend, ArticleFilter::for_user("u1"));
		desk.fetch("", None).await.unwrap();

		let err = desk
			.update(
				"a1",
				ArticlePatch {
					title: Some("no".into()),
					..ArticlePatch::default()
				},
			)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Validation);

		let article = desk
			.update(
				"a1",
				ArticlePatch {
					status: Some(PostStatus::Archived),
					..ArticlePatch::default()
				},
			)
			.await
			.unwrap();
		assert_eq!(article.status, PostStatus::Archived);
		assert_eq!(article.title, "Rust in production");
		let cached = desk.articles().into_iter().find(|a| a.id == "a1").unwrap();
		assert_eq!(cached.status, PostStatus::Archived);
	}

	#[tokio::test]
	async fn update_of_missing_row_is_no_data() {
		let backend = seeded();
		let err = desk(&backend, ArticleFilter::for_user("u1"))
			.update("missing", ArticlePatch::default())
			.await
			.unwrap_err();
		assert_eq!(err.code(), codes::NO_DATA);
	}

	#[tokio::test(start_paused = true)]
	async fn delete_removes_from_cache_after_retry() {
		let backend = seeded();
		let desk = desk(&backend, ArticleFilter::for_user("u1"));
		desk.fetch("", None).await.unwrap();
		backend.fail_next(Operation::Delete, BackendError::offline("connection reset"));

		let started = tokio::time::Instant::now();
		desk.delete("a2").await.unwrap();
		assert!(started.elapsed() >= Duration::from_millis(10));
		assert_eq!(desk.total(), 2);
		assert!(desk.articles().iter().all(|a| a.id != "a2"));
		assert_eq!(backend.calls(Operation::Delete), 2);
	}

	#[tokio::test]
	async fn rejected_delete_is_not_retried() {
		let backend = seeded();
		backend.fail_next(Operation::Delete, BackendError::rejected("permission denied", "42501"));
		let err = desk(&backend, ArticleFilter::for_user("u1")).delete("a1").await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Remote);
		assert_eq!(err.code(), "42501");
		assert_eq!(backend.calls(Operation::Delete), 1);
	}
}
