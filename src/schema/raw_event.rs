//! Raw event row schema and field decoding
//!
//! Rows come from spreadsheet exports where every cell is text. The `actor`,
//! `object`, `verb`, `result` and `extension` cells usually hold JSON (an
//! object or a list of objects) but plain scalars show up too, so each cell
//! is decoded leniently into a [`FieldValue`].

use crate::error::RowError;
use crate::types::ResultRecord;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Keys holding the learner id inside an actor record
pub const ACTOR_ID_KEYS: &[&str] = &["openId", "id"];
/// Keys holding the resource id inside an object record
pub const OBJECT_ID_KEYS: &[&str] = &["objectId", "id"];
/// Keys holding the verb label inside a verb record
pub const VERB_LABEL_KEYS: &[&str] = &["display"];
/// Keys holding device or class metadata inside an extension record
pub const EXTENSION_ID_KEYS: &[&str] = &["deviceId", "classId"];

/// One input row, exactly as loaded from the source file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEventRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub actor: String,
    #[serde(rename = "timeStamp", default, deserialize_with = "lenient_string")]
    pub time_stamp: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub object: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub verb: String,
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub result: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub extension: Option<String>,
}

impl RawEventRow {
    pub fn new(
        actor: impl Into<String>,
        time_stamp: impl Into<String>,
        object: impl Into<String>,
        verb: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            time_stamp: time_stamp.into(),
            object: object.into(),
            verb: verb.into(),
            result: None,
            extension: None,
        }
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }
}

/// Accept any JSON value for a text cell; non-strings keep their JSON text
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_optional_string(deserializer)?.unwrap_or_default())
}

fn lenient_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Object-shaped cell content: one record or a list of records
#[derive(Debug, Clone, PartialEq)]
pub enum RecordSet {
    Single(ResultRecord),
    Many(Vec<ResultRecord>),
}

impl RecordSet {
    /// Flatten to a list; `Single` becomes a one-element list
    pub fn into_records(self) -> Vec<ResultRecord> {
        match self {
            RecordSet::Single(record) => vec![record],
            RecordSet::Many(records) => records,
        }
    }

    pub fn first(&self) -> Option<&ResultRecord> {
        match self {
            RecordSet::Single(record) => Some(record),
            RecordSet::Many(records) => records.first(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultRecord> {
        match self {
            RecordSet::Single(record) => std::slice::from_ref(record).iter(),
            RecordSet::Many(records) => records.iter(),
        }
    }
}

/// Decoded cell content
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(String),
    Records(RecordSet),
}

impl FieldValue {
    /// The cell's identifier: the scalar itself, or the first record's value
    /// under the first of `keys` that is present
    pub fn first_id(&self, keys: &[&str]) -> Option<String> {
        match self {
            FieldValue::Scalar(s) => Some(s.clone()),
            FieldValue::Records(set) => set.first().and_then(|r| record_label(r, keys)),
        }
    }

    /// Identifier of every record, in order
    pub fn all_ids(&self, keys: &[&str]) -> Vec<String> {
        match self {
            FieldValue::Scalar(s) => vec![s.clone()],
            FieldValue::Records(set) => set.iter().filter_map(|r| record_label(r, keys)).collect(),
        }
    }

    pub fn into_records(self) -> Option<Vec<ResultRecord>> {
        match self {
            FieldValue::Scalar(_) => None,
            FieldValue::Records(set) => Some(set.into_records()),
        }
    }
}

/// Whether a cell is one of the spreadsheet spellings of "no value"
pub fn is_blank(raw: &str) -> bool {
    matches!(
        raw.trim(),
        "" | "NaN" | "nan" | "null" | "None" | "NULL"
    )
}

/// Decode one cell.
///
/// Text that starts like JSON must decode as JSON, otherwise the row is
/// malformed. Anything else is tried as a JSON scalar and then taken verbatim.
/// Blank cells decode to `None`.
pub fn decode_field(raw: &str, field: &'static str) -> Result<Option<FieldValue>, RowError> {
    let trimmed = raw.trim();
    if is_blank(trimmed) {
        return Ok(None);
    }

    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        let value: Value =
            serde_json::from_str(trimmed).map_err(|_| RowError::MalformedJson { field })?;
        return Ok(from_value(value));
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Ok(from_value(value)),
        Err(_) => Ok(Some(FieldValue::Scalar(trimmed.to_string()))),
    }
}

fn from_value(value: Value) -> Option<FieldValue> {
    match value {
        Value::Null => None,
        Value::Object(map) => Some(FieldValue::Records(RecordSet::Single(map))),
        Value::Array(items) => {
            let mut records = Vec::new();
            let mut first_scalar = None;
            for item in items {
                match item {
                    Value::Object(map) => records.push(map),
                    other if first_scalar.is_none() => first_scalar = scalar_text(&other),
                    _ => {}
                }
            }
            if !records.is_empty() {
                Some(FieldValue::Records(RecordSet::Many(records)))
            } else {
                first_scalar.map(FieldValue::Scalar)
            }
        }
        other => scalar_text(&other).map(FieldValue::Scalar),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !is_blank(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Text under the first present key.
///
/// Language maps (`{"en-US": "played"}`) resolve to `en-US`, else to their
/// first textual entry.
pub fn record_label(record: &ResultRecord, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find_map(value_label)
}

fn value_label(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map
            .get("en-US")
            .and_then(scalar_text)
            .or_else(|| map.values().find_map(scalar_text)),
        other => scalar_text(other),
    }
}

/// Boolean flag that may be encoded as `true`/`false` or their string forms
pub fn record_flag(record: &ResultRecord, key: &str) -> Option<bool> {
    match record.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// `duration` in whole seconds.
///
/// Accepts integers, floats (truncated), numeric strings and ISO-8601
/// durations such as `PT1M30S`. Negative values are ignored.
pub fn record_duration_seconds(record: &ResultRecord) -> Option<u64> {
    let seconds = match record.get("duration")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<f64>() {
                Ok(v) => v,
                Err(_) => parse_iso8601_duration(s)?,
            }
        }
        _ => return None,
    };
    if seconds.is_finite() && seconds >= 0.0 {
        Some(seconds.trunc() as u64)
    } else {
        None
    }
}

/// Parse `P[nD]T[nH][nM][nS]` into seconds
fn parse_iso8601_duration(raw: &str) -> Option<f64> {
    let rest = raw.strip_prefix('P').or_else(|| raw.strip_prefix('p'))?;
    let (date_part, time_part) = match rest.find(['T', 't']) {
        Some(idx) => (&rest[..idx], &rest[idx + 1..]),
        None => (rest, ""),
    };

    let days = sum_duration_parts(date_part, &[('D', 86_400.0)])?;
    let time = sum_duration_parts(time_part, &[('H', 3_600.0), ('M', 60.0), ('S', 1.0)])?;
    match (days, time) {
        (None, None) => None,
        (d, t) => Some(d.unwrap_or(0.0) + t.unwrap_or(0.0)),
    }
}

/// Sum `<number><unit>` pairs; `Some(None)` when the part is empty
fn sum_duration_parts(part: &str, units: &[(char, f64)]) -> Option<Option<f64>> {
    let mut total = None;
    let mut number = String::new();
    for c in part.chars() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
            continue;
        }
        let factor = units
            .iter()
            .find(|(unit, _)| unit.eq_ignore_ascii_case(&c))
            .map(|(_, factor)| *factor)?;
        let value = number.parse::<f64>().ok()?;
        total = Some(total.unwrap_or(0.0) + value * factor);
        number.clear();
    }
    if number.is_empty() {
        Some(total)
    } else {
        None
    }
}
