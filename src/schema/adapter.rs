//! Adapter for converting raw rows to canonical events
//!
//! Loads rows from JSON array / NDJSON text and decodes each one into a
//! [`CanonicalEvent`]. A row that cannot be decoded is dropped and counted;
//! it never fails the batch.

use crate::error::{FluxError, RowError};
use crate::schema::raw_event::*;
use crate::schema::timestamp::parse_timestamp;
use crate::types::CanonicalEvent;
use chrono::FixedOffset;
use tracing::warn;

/// Adapter for converting raw rows to canonical events
pub struct RawEventAdapter;

/// Rows loaded from one source text
#[derive(Debug, Clone, Default)]
pub struct LoadedRows {
    pub rows: Vec<RawEventRow>,
    /// Array elements or lines that were not row objects
    pub unreadable: usize,
}

/// Canonical events decoded from a list of rows
#[derive(Debug, Clone, Default)]
pub struct DecodedRows {
    pub events: Vec<CanonicalEvent>,
    pub dropped: usize,
}

impl RawEventAdapter {
    /// Parse a JSON string containing an array of rows.
    ///
    /// Only a document that is not a JSON array fails. Elements that do not
    /// decode as a row object are skipped and counted.
    pub fn parse_array(json: &str) -> Result<LoadedRows, FluxError> {
        let elements: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let mut loaded = LoadedRows::default();
        for (idx, element) in elements.into_iter().enumerate() {
            match serde_json::from_value::<RawEventRow>(element) {
                Ok(row) => loaded.rows.push(row),
                Err(e) => {
                    warn!(element = idx, error = %e, "skipping unreadable array element");
                    loaded.unreadable += 1;
                }
            }
        }
        Ok(loaded)
    }

    /// Parse NDJSON (newline-delimited JSON) rows.
    ///
    /// Lines that do not decode as a row object are skipped and counted.
    pub fn parse_ndjson(ndjson: &str) -> LoadedRows {
        let mut loaded = LoadedRows::default();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawEventRow>(trimmed) {
                Ok(row) => loaded.rows.push(row),
                Err(e) => {
                    warn!(line = line_num + 1, error = %e, "skipping unreadable NDJSON line");
                    loaded.unreadable += 1;
                }
            }
        }
        loaded
    }

    /// Parse either format, chosen by the first non-whitespace character
    pub fn parse_rows(text: &str) -> Result<LoadedRows, FluxError> {
        if text.trim_start().starts_with('[') {
            Self::parse_array(text)
        } else {
            Ok(Self::parse_ndjson(text))
        }
    }

    /// Decode one row.
    ///
    /// `row_index` is kept on the event as the chronological tie-breaker.
    pub fn to_canonical(
        row: &RawEventRow,
        row_index: usize,
        naive_offset: FixedOffset,
    ) -> Result<CanonicalEvent, RowError> {
        let actor_id = required_id(&row.actor, "actor", ACTOR_ID_KEYS)?;

        let object = decode_field(&row.object, "object")?
            .ok_or(RowError::MissingField { field: "object" })?;
        let object_ids = object.all_ids(OBJECT_ID_KEYS);
        let object_id = object
            .first_id(OBJECT_ID_KEYS)
            .ok_or(RowError::MissingField { field: "object" })?;

        let verb_label = required_id(&row.verb, "verb", VERB_LABEL_KEYS)?;

        let timestamp = parse_timestamp(&row.time_stamp, naive_offset)
            .ok_or_else(|| RowError::InvalidTimestamp(row.time_stamp.clone()))?;

        let result = match row.result.as_deref() {
            Some(raw) => decode_field(raw, "result")?.and_then(FieldValue::into_records),
            None => None,
        };

        // Extension metadata is optional; a bad cell loses the metadata, not the row
        let device_or_class_id = match row.extension.as_deref().map(|raw| decode_field(raw, "extension")) {
            Some(Ok(value)) => value.and_then(|v| v.first_id(EXTENSION_ID_KEYS)),
            Some(Err(e)) => {
                warn!(row = row_index, error = %e, "ignoring extension metadata");
                None
            }
            None => None,
        };

        Ok(CanonicalEvent {
            actor_id,
            timestamp,
            object_id,
            object_ids,
            verb_label,
            result,
            device_or_class_id,
            row_index,
        })
    }

    /// Decode every row, dropping the ones that fail
    pub fn to_canonical_batch(
        rows: &[RawEventRow],
        source: &str,
        naive_offset: FixedOffset,
    ) -> DecodedRows {
        let mut decoded = DecodedRows::default();
        for (idx, row) in rows.iter().enumerate() {
            match Self::to_canonical(row, idx, naive_offset) {
                Ok(event) => decoded.events.push(event),
                Err(e) => {
                    warn!(source, row = idx, error = %e, "dropping row");
                    decoded.dropped += 1;
                }
            }
        }
        decoded
    }

    /// Validate a batch of rows without keeping the decoded events
    pub fn validate_rows(rows: &[RawEventRow], naive_offset: FixedOffset) -> Vec<ValidationResult> {
        rows.iter()
            .enumerate()
            .filter_map(|(idx, row)| {
                Self::to_canonical(row, idx, naive_offset)
                    .err()
                    .map(|error| ValidationResult { index: idx, error })
            })
            .collect()
    }
}

/// A row that failed to decode
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub index: usize,
    pub error: RowError,
}

fn required_id(raw: &str, field: &'static str, keys: &[&str]) -> Result<String, RowError> {
    decode_field(raw, field)?
        .and_then(|value| value.first_id(keys))
        .ok_or(RowError::MissingField { field })
}
