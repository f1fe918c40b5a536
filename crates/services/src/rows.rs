use chrono::{SecondsFormat, Utc};
use curator_error::Failure;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub(crate) fn decode<T: DeserializeOwned>(row: Value) -> Result<T, Failure> {
	serde_json::from_value(row).map_err(|err| Failure::plain(format!("malformed row: {err}")))
}

pub(crate) fn decode_all<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, Failure> {
	rows.into_iter().map(decode).collect()
}

/// Serializes `value`, then merges `extra` fields over it.
pub(crate) fn encode<T: Serialize>(value: &T, extra: impl IntoIterator<Item = (&'static str, Value)>) -> Result<Value, Failure> {
	let mut row = serde_json::to_value(value).map_err(Failure::other)?;
	if let Value::Object(fields) = &mut row {
		for (key, val) in extra {
			fields.insert(key.to_string(), val);
		}
	}
	Ok(row)
}

/// Current time as an RFC 3339 string with millisecond precision.
pub(crate) fn timestamp() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
