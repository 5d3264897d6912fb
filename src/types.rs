//! Core data types
//!
//! This module defines the canonical event model and the records produced by
//! the aggregation and sequencing stages.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// One decoded element of an event's `result` payload
pub type ResultRecord = serde_json::Map<String, serde_json::Value>;

/// Coarse lifecycle classification of a verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Start,
    Mid,
    End,
}

impl LifecyclePhase {
    /// Numeric encoding used by progression charts (+1 / 0 / -1)
    pub fn as_i8(self) -> i8 {
        match self {
            LifecyclePhase::Start => 1,
            LifecyclePhase::Mid => 0,
            LifecyclePhase::End => -1,
        }
    }
}

/// Kind of course unit named by an object identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    MainUnit,
    BasicUnit,
}

impl UnitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitKind::MainUnit => "MainUnit",
            UnitKind::BasicUnit => "BasicUnit",
        }
    }
}

/// Learning activity detected inside an object identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Grammar,
    Pronunciation,
    Speaking,
    Listening,
}

impl ActivityType {
    /// Search order for keyword detection; the first match wins
    pub const ALL: [ActivityType; 4] = [
        ActivityType::Grammar,
        ActivityType::Pronunciation,
        ActivityType::Speaking,
        ActivityType::Listening,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            ActivityType::Grammar => "grammar",
            ActivityType::Pronunciation => "pronunciation",
            ActivityType::Speaking => "speaking",
            ActivityType::Listening => "listening",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|a| a.keyword() == lower)
    }
}

/// Decoded `<course>/<unit type>/<unit number>/...` object identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReference {
    /// Raw second path segment, kept verbatim
    pub unit_type: String,
    pub kind: UnitKind,
    pub unit_number: u32,
    pub activity_type: Option<ActivityType>,
}

/// A raw row after field decoding and timestamp parsing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub actor_id: String,
    pub timestamp: DateTime<Utc>,
    /// Id of the first referenced object
    pub object_id: String,
    /// Ids of every referenced object, first one included
    pub object_ids: Vec<String>,
    pub verb_label: String,
    /// Result payload normalised to a list; `None` when the row had none
    pub result: Option<Vec<ResultRecord>>,
    pub device_or_class_id: Option<String>,
    /// Position of the source row inside its log, used as sort tie-breaker
    pub row_index: usize,
}

impl CanonicalEvent {
    /// Result elements, empty when the row carried no result
    pub fn result_records(&self) -> &[ResultRecord] {
        self.result.as_deref().unwrap_or(&[])
    }

    pub fn any_object_contains(&self, needle: &str) -> bool {
        self.object_ids.iter().any(|id| id.contains(needle))
    }
}

/// Event enriched with its lifecycle phase and unit reference
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedEvent {
    pub event: CanonicalEvent,
    /// `None` when the verb matched no lifecycle prefix
    pub phase: Option<LifecyclePhase>,
    /// `None` when the object id is not a unit identifier
    pub unit: Option<UnitReference>,
}

/// Per-learner, per-year behavioural summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnerYearMetrics {
    pub learner_id: String,
    pub year: String,
    pub video_start_count: u32,
    pub audio_start_count: u32,
    pub answer_count: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    pub suspended_count: u32,
    pub launched_count: u32,
    /// Raw seconds
    pub total_answer_time_seconds: u64,
    /// Raw seconds
    pub recording_time_seconds: u64,
    /// Raw seconds
    pub video_time_seconds: u64,
    pub recorder_start_count: u32,
    pub movie_completed_count: u32,
    pub continue_count: u32,
    pub class_id: Option<String>,
    pub test_result: Option<f64>,
}

impl LearnerYearMetrics {
    pub fn new(learner_id: impl Into<String>, year: impl Into<String>) -> Self {
        Self {
            learner_id: learner_id.into(),
            year: year.into(),
            ..Default::default()
        }
    }
}

/// Progression step classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Review,
}

/// One unit visit in chronological order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedProgressionEntry {
    pub learner_id: String,
    pub year: String,
    pub unit_type: String,
    pub unit_number: u32,
    pub activity_type: Option<ActivityType>,
    pub timestamp: DateTime<Utc>,
    /// Calendar fields of `timestamp` (UTC)
    pub time: TimeBreakdown,
    pub direction: Direction,
    /// Lifecycle phase of the verb as +1 / 0 / -1
    pub lifecycle: i8,
    pub sequence_global: u32,
    pub sequence_by_activity: u32,
    /// Seconds since the previous entry of the same sequence, 0 for the first
    pub elapsed_since_previous_secs: i64,
    pub verb_label: String,
    #[serde(skip)]
    pub row_index: usize,
}

/// Calendar fields of an event time, for time-of-day charts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBreakdown {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    /// 0 = Monday
    pub weekday: u32,
}

impl From<DateTime<Utc>> for TimeBreakdown {
    fn from(ts: DateTime<Utc>) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
            day: ts.day(),
            hour: ts.hour(),
            minute: ts.minute(),
            second: ts.second(),
            weekday: ts.weekday().num_days_from_monday(),
        }
    }
}

/// Counters describing what a batch run skipped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDiagnostics {
    pub rows_seen: usize,
    pub rows_dropped: usize,
    pub invalid_verbs: usize,
    pub malformed_object_ids: usize,
    /// Learners with no entry in the result table
    pub missing_results: usize,
}
