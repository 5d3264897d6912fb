//! Metric normalization
//!
//! This module scales learner metrics into 0-1 for radar and comparison charts.
//! - Each field is divided by its maximum across the compared learners
//! - A zero maximum emits 0 instead of dividing
//! - Missing values (no test result) stay missing, never 0

use crate::types::LearnerYearMetrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric fields of [`LearnerYearMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    VideoStartCount,
    AudioStartCount,
    AnswerCount,
    CorrectAnswers,
    IncorrectAnswers,
    SuspendedCount,
    LaunchedCount,
    TotalAnswerTimeSeconds,
    RecordingTimeSeconds,
    VideoTimeSeconds,
    RecorderStartCount,
    MovieCompletedCount,
    ContinueCount,
    TestResult,
}

impl MetricField {
    pub const ALL: [MetricField; 14] = [
        MetricField::VideoStartCount,
        MetricField::AudioStartCount,
        MetricField::AnswerCount,
        MetricField::CorrectAnswers,
        MetricField::IncorrectAnswers,
        MetricField::SuspendedCount,
        MetricField::LaunchedCount,
        MetricField::TotalAnswerTimeSeconds,
        MetricField::RecordingTimeSeconds,
        MetricField::VideoTimeSeconds,
        MetricField::RecorderStartCount,
        MetricField::MovieCompletedCount,
        MetricField::ContinueCount,
        MetricField::TestResult,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricField::VideoStartCount => "video_start_count",
            MetricField::AudioStartCount => "audio_start_count",
            MetricField::AnswerCount => "answer_count",
            MetricField::CorrectAnswers => "correct_answers",
            MetricField::IncorrectAnswers => "incorrect_answers",
            MetricField::SuspendedCount => "suspended_count",
            MetricField::LaunchedCount => "launched_count",
            MetricField::TotalAnswerTimeSeconds => "total_answer_time_seconds",
            MetricField::RecordingTimeSeconds => "recording_time_seconds",
            MetricField::VideoTimeSeconds => "video_time_seconds",
            MetricField::RecorderStartCount => "recorder_start_count",
            MetricField::MovieCompletedCount => "movie_completed_count",
            MetricField::ContinueCount => "continue_count",
            MetricField::TestResult => "test_result",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == raw.trim())
    }

    /// Whether the field holds raw seconds
    pub fn is_duration(self) -> bool {
        matches!(
            self,
            MetricField::TotalAnswerTimeSeconds
                | MetricField::RecordingTimeSeconds
                | MetricField::VideoTimeSeconds
        )
    }

    /// The field's value; `None` only for a missing test result
    pub fn value(self, m: &LearnerYearMetrics) -> Option<f64> {
        let v = match self {
            MetricField::VideoStartCount => m.video_start_count as f64,
            MetricField::AudioStartCount => m.audio_start_count as f64,
            MetricField::AnswerCount => m.answer_count as f64,
            MetricField::CorrectAnswers => m.correct_answers as f64,
            MetricField::IncorrectAnswers => m.incorrect_answers as f64,
            MetricField::SuspendedCount => m.suspended_count as f64,
            MetricField::LaunchedCount => m.launched_count as f64,
            MetricField::TotalAnswerTimeSeconds => m.total_answer_time_seconds as f64,
            MetricField::RecordingTimeSeconds => m.recording_time_seconds as f64,
            MetricField::VideoTimeSeconds => m.video_time_seconds as f64,
            MetricField::RecorderStartCount => m.recorder_start_count as f64,
            MetricField::MovieCompletedCount => m.movie_completed_count as f64,
            MetricField::ContinueCount => m.continue_count as f64,
            MetricField::TestResult => return m.test_result,
        };
        Some(v)
    }
}

/// Presentation unit for duration fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    #[default]
    Seconds,
    Minutes,
    Hours,
}

impl DurationUnit {
    pub fn convert(self, seconds: f64) -> f64 {
        match self {
            DurationUnit::Seconds => seconds,
            DurationUnit::Minutes => seconds / 60.0,
            DurationUnit::Hours => seconds / 3600.0,
        }
    }
}

/// Normalized values keyed by (year, learner id), then field
pub type NormalizedTable = BTreeMap<(String, String), BTreeMap<MetricField, Option<f64>>>;

/// Max-normalizer for chart comparisons
pub struct MetricNormalizer;

impl MetricNormalizer {
    /// Normalize `fields` across the given metrics records.
    ///
    /// The maximum is taken over every record passed in, so records from
    /// several years share one scale. Filter to one year first for a per-year chart.
    pub fn normalize<'a>(
        records: impl IntoIterator<Item = &'a LearnerYearMetrics>,
        fields: &[MetricField],
    ) -> NormalizedTable {
        let records: Vec<&LearnerYearMetrics> = records.into_iter().collect();

        let maxima: Vec<Option<f64>> = fields
            .iter()
            .map(|field| {
                records
                    .iter()
                    .filter_map(|m| field.value(m))
                    .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
            })
            .collect();

        records
            .iter()
            .map(|m| {
                let row = fields
                    .iter()
                    .zip(&maxima)
                    .map(|(field, max)| (*field, scale(field.value(m), *max)))
                    .collect();
                ((m.year.clone(), m.learner_id.clone()), row)
            })
            .collect()
    }
}

fn scale(value: Option<f64>, max: Option<f64>) -> Option<f64> {
    let value = value?;
    match max {
        Some(max) if max != 0.0 => Some(value / max),
        _ => Some(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(learner: &str) -> (String, String) {
        ("2023".to_string(), learner.to_string())
    }

    fn metrics(id: &str, answers: u32, test_result: Option<f64>) -> LearnerYearMetrics {
        LearnerYearMetrics {
            answer_count: answers,
            test_result,
            ..LearnerYearMetrics::new(id, "2023")
        }
    }

    #[test]
    fn test_normalize_by_maximum() {
        let records = vec![metrics("1", 10, Some(50.0)), metrics("2", 5, Some(100.0))];
        let table = MetricNormalizer::normalize(
            &records,
            &[MetricField::AnswerCount, MetricField::TestResult],
        );

        assert_eq!(table[&key("1")][&MetricField::AnswerCount], Some(1.0));
        assert_eq!(table[&key("2")][&MetricField::AnswerCount], Some(0.5));
        assert_eq!(table[&key("1")][&MetricField::TestResult], Some(0.5));
    }

    #[test]
    fn test_zero_maximum_emits_zero() {
        let records = vec![metrics("1", 0, None), metrics("2", 0, None)];
        let table = MetricNormalizer::normalize(&records, &[MetricField::AnswerCount]);
        assert_eq!(table[&key("1")][&MetricField::AnswerCount], Some(0.0));
        assert_eq!(table[&key("2")][&MetricField::AnswerCount], Some(0.0));
    }

    #[test]
    fn test_missing_test_result_stays_missing() {
        let records = vec![metrics("1", 3, None), metrics("2", 3, Some(80.0))];
        let table = MetricNormalizer::normalize(&records, &[MetricField::TestResult]);
        assert_eq!(table[&key("1")][&MetricField::TestResult], None);
        assert_eq!(table[&key("2")][&MetricField::TestResult], Some(1.0));
    }

    #[test]
    fn test_empty_input() {
        let table = MetricNormalizer::normalize(&Vec::<LearnerYearMetrics>::new(), &MetricField::ALL);
        assert!(table.is_empty());
    }

    #[test]
    fn test_same_learner_in_two_years_is_kept_apart() {
        let records = vec![
            metrics("1", 4, None),
            LearnerYearMetrics {
                answer_count: 8,
                ..LearnerYearMetrics::new("1", "2024")
            },
        ];
        let table = MetricNormalizer::normalize(&records, &[MetricField::AnswerCount]);
        assert_eq!(table.len(), 2);
        assert_eq!(table[&key("1")][&MetricField::AnswerCount], Some(0.5));
        assert_eq!(
            table[&("2024".to_string(), "1".to_string())][&MetricField::AnswerCount],
            Some(1.0)
        );
    }

    #[test]
    fn test_duration_units() {
        assert_eq!(DurationUnit::Seconds.convert(90.0), 90.0);
        assert_eq!(DurationUnit::Minutes.convert(90.0), 1.5);
        assert_eq!(DurationUnit::Hours.convert(5400.0), 1.5);
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in MetricField::ALL {
            assert_eq!(MetricField::parse(field.as_str()), Some(field));
            let json = serde_json::to_string(&field).unwrap();
            assert_eq!(json, format!("\"{}\"", field.as_str()));
        }
    }
}
