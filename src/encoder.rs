//! Chart encoding
//!
//! This module renders aggregation output as the JSON the chart layer reads.
//! Durations are stored as raw seconds and converted here, never earlier.

use crate::error::FluxError;
use crate::normalizer::{DurationUnit, MetricField};
use crate::pipeline::{AggregationOutput, MetricsByYear};
use crate::types::{BatchDiagnostics, LearnerYearMetrics, OrderedProgressionEntry};
use crate::{FLUX_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Current chart payload format version
pub const CHART_FORMAT_VERSION: &str = "1.0.0";

/// Flat key/value record for one learner and year
pub type MetricsRecord = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Metrics payload: year → learner id → flat record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPayload {
    pub format_version: String,
    pub producer: ChartProducer,
    pub computed_at_utc: String,
    pub duration_unit: DurationUnit,
    pub years: BTreeMap<String, BTreeMap<String, MetricsRecord>>,
    pub diagnostics: BatchDiagnostics,
}

/// Encoder for chart-ready JSON
pub struct ChartEncoder {
    instance_id: String,
    duration_unit: DurationUnit,
}

impl Default for ChartEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            duration_unit: DurationUnit::default(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self {
            instance_id,
            duration_unit: DurationUnit::default(),
        }
    }

    pub fn with_unit(mut self, unit: DurationUnit) -> Self {
        self.duration_unit = unit;
        self
    }

    pub fn duration_unit(&self) -> DurationUnit {
        self.duration_unit
    }

    /// Encode aggregation output into a chart payload
    pub fn encode(&self, output: &AggregationOutput) -> ChartPayload {
        ChartPayload {
            format_version: CHART_FORMAT_VERSION.to_string(),
            producer: ChartProducer {
                name: PRODUCER_NAME.to_string(),
                version: FLUX_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            duration_unit: self.duration_unit,
            years: self.encode_metrics(&output.metrics),
            diagnostics: output.diagnostics.clone(),
        }
    }

    /// The year → learner → record body without the envelope
    pub fn encode_metrics(
        &self,
        metrics: &MetricsByYear,
    ) -> BTreeMap<String, BTreeMap<String, MetricsRecord>> {
        metrics
            .iter()
            .map(|(year, learners)| {
                let records = learners
                    .iter()
                    .map(|(learner, m)| (learner.clone(), self.encode_record(m)))
                    .collect();
                (year.clone(), records)
            })
            .collect()
    }

    /// Flatten one metrics record, converting durations to the configured unit
    pub fn encode_record(&self, m: &LearnerYearMetrics) -> MetricsRecord {
        let mut record = Map::new();
        record.insert("learner_id".to_string(), Value::from(m.learner_id.clone()));
        record.insert("year".to_string(), Value::from(m.year.clone()));
        record.insert(
            "class_id".to_string(),
            m.class_id.clone().map_or(Value::Null, Value::from),
        );

        for field in MetricField::ALL {
            let value = field.value(m);
            if field.is_duration() {
                let converted = value.map(|seconds| self.duration_unit.convert(seconds));
                record.insert(
                    duration_key(field, self.duration_unit),
                    converted.map_or(Value::Null, json_number),
                );
            } else {
                // Missing test results stay null, never 0
                record.insert(field.as_str().to_string(), value.map_or(Value::Null, json_number));
            }
        }
        record
    }

    /// Encode to JSON string
    pub fn encode_to_json(&self, output: &AggregationOutput, pretty: bool) -> Result<String, FluxError> {
        let payload = self.encode(output);
        let json = if pretty {
            serde_json::to_string_pretty(&payload)
        } else {
            serde_json::to_string(&payload)
        };
        json.map_err(FluxError::JsonError)
    }

    /// Progression entries as one JSON array
    pub fn progression_to_json(
        &self,
        entries: &[OrderedProgressionEntry],
        pretty: bool,
    ) -> Result<String, FluxError> {
        let json = if pretty {
            serde_json::to_string_pretty(entries)
        } else {
            serde_json::to_string(entries)
        };
        json.map_err(FluxError::JsonError)
    }

    /// Progression entries as NDJSON, one entry per line
    pub fn progression_to_ndjson(&self, entries: &[OrderedProgressionEntry]) -> Result<String, FluxError> {
        let mut out = String::new();
        for entry in entries {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }
}

/// `total_answer_time_seconds` → `total_answer_time_minutes` etc.
fn duration_key(field: MetricField, unit: DurationUnit) -> String {
    let stem = field.as_str().trim_end_matches("_seconds");
    let suffix = match unit {
        DurationUnit::Seconds => "seconds",
        DurationUnit::Minutes => "minutes",
        DurationUnit::Hours => "hours",
    };
    format!("{stem}_{suffix}")
}

/// Integral values render without a fractional part
fn json_number(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < u64::MAX as f64 {
        if v >= 0.0 {
            return Value::from(v as u64);
        }
        return Value::from(v as i64);
    }
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}
