use std::cmp::Ordering;

use serde_json::Value;

/// Case-insensitive substring match OR-ed across columns.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Search {
	columns: Vec<String>,
	term: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Order {
	column: String,
	ascending: bool,
}

/// Row query: equality filters, optional search, ordering and an
/// inclusive row range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
	filters: Vec<(String, Value)>,
	search: Option<Search>,
	order: Option<Order>,
	range: Option<(usize, usize)>,
}

impl Query {
	pub fn new() -> Self {
		Self::default()
	}

	/// Keeps rows whose `column` equals `value`.
	pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
		self.filters.push((column.into(), value.into()));
		self
	}

	/// Keeps rows where any of `columns` contains `term`, ignoring case.
	/// A blank term matches everything.
	pub fn search(mut self, columns: &[&str], term: impl Into<String>) -> Self {
		let term = term.into();
		self.search = if term.trim().is_empty() {
			None
		} else {
			Some(Search {
				columns: columns.iter().map(|c| (*c).to_string()).collect(),
				term,
			})
		};
		self
	}

	pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
		self.order = Some(Order {
			column: column.into(),
			ascending,
		});
		self
	}

	/// Restricts results to rows `from..=to` of the ordered matches.
	pub fn range(mut self, from: usize, to: usize) -> Self {
		self.range = Some((from, to));
		self
	}

	/// Returns true when `row` passes the filters and search.
	pub fn matches(&self, row: &Value) -> bool {
		let filtered = self.filters.iter().all(|(column, expected)| row.get(column) == Some(expected));
		if !filtered {
			return false;
		}
		match &self.search {
			None => true,
			Some(search) => {
				let needle = search.term.to_lowercase();
				search
					.columns
					.iter()
					.filter_map(|column| row.get(column).and_then(Value::as_str))
					.any(|text| text.to_lowercase().contains(&needle))
			}
		}
	}

	/// Filters, orders and ranges `rows`.
	pub fn apply<'a>(&self, rows: impl IntoIterator<Item = &'a Value>) -> Selection {
		let mut matched: Vec<Value> = rows.into_iter().filter(|row| self.matches(row)).cloned().collect();
		let count = matched.len();

		if let Some(order) = &self.order {
			matched.sort_by(|a, b| {
				let ord = compare(a.get(&order.column), b.get(&order.column));
				if order.ascending { ord } else { ord.reverse() }
			});
		}

		let rows = match self.range {
			Some((from, to)) if from <= to => matched.into_iter().skip(from).take((to - from).saturating_add(1)).collect(),
			Some(_) => Vec::new(),
			None => matched,
		};
		Selection { rows, count }
	}
}

/// Orders JSON column values; missing and null sort last when ascending.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
	let a = a.filter(|v| !v.is_null());
	let b = b.filter(|v| !v.is_null());
	match (a, b) {
		(None, None) => Ordering::Equal,
		(None, Some(_)) => Ordering::Greater,
		(Some(_), None) => Ordering::Less,
		(Some(a), Some(b)) => match (a, b) {
			(Value::Number(x), Value::Number(y)) => {
				let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
				x.partial_cmp(&y).unwrap_or(Ordering::Equal)
			}
			(Value::String(x), Value::String(y)) => x.cmp(y),
			(Value::Bool(x), Value::Bool(y)) => x.cmp(y),
			_ => a.to_string().cmp(&b.to_string()),
		},
	}
}

/// Result of a select.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
	pub rows: Vec<Value>,
	/// Exact match count before ranging.
	pub count: usize,
}
