use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::{AuthUser, BackendClient, BackendError, Query, Selection};

/// Handler backing a registered serverless function.
type FunctionHandler = Arc<dyn Fn(Value) -> Result<Value, BackendError> + Send + Sync>;

/// Backend call category, used for fault injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
	Select,
	Insert,
	Update,
	Delete,
	Auth,
	Invoke,
}

impl Operation {
	const fn as_str(self) -> &'static str {
		match self {
			Self::Select => "select",
			Self::Insert => "insert",
			Self::Update => "update",
			Self::Delete => "delete",
			Self::Auth => "auth",
			Self::Invoke => "invoke",
		}
	}
}

const PROFILES_TABLE: &str = "user_profiles";

#[derive(Default)]
struct Store {
	tables: HashMap<String, Vec<Value>>,
	users: Vec<(AuthUser, String)>,
	session: Option<String>,
	functions: HashMap<String, FunctionHandler>,
	faults: VecDeque<(Operation, BackendError)>,
	calls: HashMap<Operation, u64>,
}

impl Store {
	/// Counts the call and returns the first queued fault for `op`.
	fn enter(&mut self, op: Operation) -> Result<(), BackendError> {
		*self.calls.entry(op).or_default() += 1;
		let index = self.faults.iter().position(|(fault_op, _)| *fault_op == op);
		match index.and_then(|i| self.faults.remove(i)) {
			Some((_, err)) => {
				tracing::trace!(op = op.as_str(), error = %err, "backend.fault");
				Err(err)
			}
			None => Ok(()),
		}
	}
}

/// In-process backend over JSON rows.
///
/// Inserts assign a UUID `id` when the row has none. Faults queued with
/// [`Self::fail_next`] are returned, in order, by the next calls of the
/// matching [`Operation`].
#[derive(Default)]
pub struct MemoryBackend {
	store: Mutex<Store>,
}

impl std::fmt::Debug for MemoryBackend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let store = self.store.lock();
		f.debug_struct("MemoryBackend")
			.field("tables", &store.tables.keys().collect::<Vec<_>>())
			.field("users", &store.users.len())
			.field("pending_faults", &store.faults.len())
			.finish()
	}
}

impl MemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends rows to `table` without going through fault injection.
	pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
		self.store.lock().tables.entry(table.to_string()).or_default().extend(rows);
	}

	/// Snapshot of every row in `table`.
	pub fn rows(&self, table: &str) -> Vec<Value> {
		self.store.lock().tables.get(table).cloned().unwrap_or_default()
	}

	/// Registers an auth identity and returns it.
	pub fn add_user(&self, email: &str, password: &str) -> AuthUser {
		let user = AuthUser {
			id: uuid::Uuid::new_v4().to_string(),
			email: email.to_string(),
		};
		self.store.lock().users.push((user.clone(), password.to_string()));
		user
	}

	pub fn auth_users(&self) -> Vec<AuthUser> {
		self.store.lock().users.iter().map(|(user, _)| user.clone()).collect()
	}

	/// Makes `user_id` the signed-in identity.
	pub fn sign_in(&self, user_id: &str) {
		self.store.lock().session = Some(user_id.to_string());
	}

	pub fn sign_out(&self) {
		self.store.lock().session = None;
	}

	pub fn register_function(&self, name: &str, handler: impl Fn(Value) -> Result<Value, BackendError> + Send + Sync + 'static) {
		self.store.lock().functions.insert(name.to_string(), Arc::new(handler));
	}

	/// Queues `err` for the next call of `op`.
	pub fn fail_next(&self, op: Operation, err: BackendError) {
		self.fail_times(op, err, 1);
	}

	/// Queues `err` for the next `times` calls of `op`.
	pub fn fail_times(&self, op: Operation, err: BackendError, times: usize) {
		let mut store = self.store.lock();
		for _ in 0..times {
			store.faults.push_back((op, err.clone()));
		}
	}

	/// Number of calls made for `op`, including failed ones.
	pub fn calls(&self, op: Operation) -> u64 {
		self.store.lock().calls.get(&op).copied().unwrap_or(0)
	}
}

fn row_id(row: &Value) -> Option<&str> {
	row.get("id").and_then(Value::as_str)
}

#[async_trait]
impl BackendClient for MemoryBackend {
	async fn select(&self, table: &str, query: &Query) -> Result<Selection, BackendError> {
		let mut store = self.store.lock();
		store.enter(Operation::Select)?;
		tracing::trace!(table, "backend.select");
		let rows = store.tables.get(table).map(Vec::as_slice).unwrap_or_default();
		Ok(query.apply(rows))
	}

	async fn insert(&self, table: &str, row: Value) -> Result<Value, BackendError> {
		let mut store = self.store.lock();
		store.enter(Operation::Insert)?;
		let Value::Object(mut fields) = row else {
			return Err(BackendError::rejected("row must be a JSON object", "INVALID_ROW"));
		};
		let rows = store.tables.entry(table.to_string()).or_default();
		let given_id = fields.get("id").and_then(Value::as_str).map(str::to_owned);
		match given_id {
			Some(id) if rows.iter().any(|r| row_id(r) == Some(id.as_str())) => {
				return Err(BackendError::rejected(
					format!("duplicate key value violates unique constraint \"{table}_pkey\""),
					"23505",
				));
			}
			Some(_) => {}
			None => {
				fields.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
			}
		}
		let row = Value::Object(fields);
		rows.push(row.clone());
		tracing::trace!(table, id = row_id(&row), "backend.insert");
		Ok(row)
	}

	async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Option<Value>, BackendError> {
		let mut store = self.store.lock();
		store.enter(Operation::Update)?;
		let Value::Object(patch) = patch else {
			return Err(BackendError::rejected("patch must be a JSON object", "INVALID_ROW"));
		};
		let Some(row) = store.tables.get_mut(table).and_then(|rows| rows.iter_mut().find(|r| row_id(r) == Some(id))) else {
			return Ok(None);
		};
		if let Value::Object(fields) = row {
			for (key, value) in patch {
				if key != "id" {
					fields.insert(key, value);
				}
			}
		}
		tracing::trace!(table, id, "backend.update");
		Ok(Some(row.clone()))
	}

	async fn delete(&self, table: &str, id: &str) -> Result<(), BackendError> {
		let mut store = self.store.lock();
		store.enter(Operation::Delete)?;
		if let Some(rows) = store.tables.get_mut(table) {
			rows.retain(|r| row_id(r) != Some(id));
		}
		tracing::trace!(table, id, "backend.delete");
		Ok(())
	}

	async fn create_auth_user(&self, email: &str, password: &str) -> Result<AuthUser, BackendError> {
		let mut store = self.store.lock();
		store.enter(Operation::Auth)?;
		if store.users.iter().any(|(user, _)| user.email.eq_ignore_ascii_case(email)) {
			return Err(BackendError::Rejected {
				message: "User already registered".into(),
				code: Some("user_already_exists".into()),
				status: Some(422),
			});
		}
		let user = AuthUser {
			id: uuid::Uuid::new_v4().to_string(),
			email: email.to_string(),
		};
		store.users.push((user.clone(), password.to_string()));
		tracing::trace!(id = %user.id, "backend.auth.create_user");
		Ok(user)
	}

	async fn delete_auth_user(&self, id: &str) -> Result<(), BackendError> {
		let mut store = self.store.lock();
		store.enter(Operation::Auth)?;
		let before = store.users.len();
		store.users.retain(|(user, _)| user.id != id);
		if store.users.len() == before {
			return Err(BackendError::Rejected {
				message: "User not found".into(),
				code: Some("user_not_found".into()),
				status: Some(404),
			});
		}
		if let Some(profiles) = store.tables.get_mut(PROFILES_TABLE) {
			profiles.retain(|r| row_id(r) != Some(id));
		}
		if store.session.as_deref() == Some(id) {
			store.session = None;
		}
		tracing::trace!(id, "backend.auth.delete_user");
		Ok(())
	}

	async fn current_user(&self) -> Result<Option<AuthUser>, BackendError> {
		let mut store = self.store.lock();
		store.enter(Operation::Auth)?;
		let Some(session) = store.session.clone() else {
			return Ok(None);
		};
		Ok(store.users.iter().find(|(user, _)| user.id == session).map(|(user, _)| user.clone()))
	}

	async fn invoke(&self, function: &str, body: Value) -> Result<Value, BackendError> {
		let handler = {
			let mut store = self.store.lock();
			store.enter(Operation::Invoke)?;
			store.functions.get(function).cloned()
		};
		tracing::trace!(function, "backend.invoke");
		match handler {
			Some(handler) => handler(body),
			None => Err(BackendError::Rejected {
				message: format!("Function not found: {function}"),
				code: Some("NOT_FOUND".into()),
				status: Some(404),
			}),
		}
	}
}
