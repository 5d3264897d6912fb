//! Pipeline orchestration
//!
//! This module provides the public API for learnflux.
//! It runs learner logs through decoding, classification, aggregation and
//! sequencing, producing the tables the chart layer reads.

use crate::aggregator::MetricAggregator;
use crate::config::FluxConfig;
use crate::context::ResultTable;
use crate::schema::{academic_year, LearnerLog, RawEventAdapter};
use crate::selection::{metrics_view, progression_view, SelectionState};
use crate::sequencing::sequence_learner;
use crate::types::{BatchDiagnostics, CanonicalEvent, ClassifiedEvent, LearnerYearMetrics, OrderedProgressionEntry};
use crate::unit::parse_unit_reference;
use crate::verb::VerbClassifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Metrics keyed by year, then learner id
pub type MetricsByYear = BTreeMap<String, BTreeMap<String, LearnerYearMetrics>>;

/// Everything one aggregation run produces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationOutput {
    pub metrics: MetricsByYear,
    /// Ordered per (year, learner), chronological within each learner
    pub progression: Vec<OrderedProgressionEntry>,
    pub diagnostics: BatchDiagnostics,
}

impl AggregationOutput {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Number of (learner, year) records
    pub fn record_count(&self) -> usize {
        self.metrics.values().map(BTreeMap::len).sum()
    }
}

/// Aggregate learner logs into per-year metrics and progression entries.
///
/// Pipeline stages:
/// 1. RawEventAdapter - Decode rows, dropping the malformed ones
/// 2. VerbClassifier / parse_unit_reference - Tag lifecycle phase and unit
/// 3. MetricAggregator - Fold each (year, learner) partition
/// 4. sequence_learner - Order and tag unit visits
///
/// Never fails: bad input only lowers counts and shows up in diagnostics.
pub fn aggregate_logs(
    logs: &[LearnerLog],
    results: &ResultTable,
    config: &FluxConfig,
) -> AggregationOutput {
    let classifier = VerbClassifier::new();
    let aggregator = MetricAggregator::new(classifier.clone());
    let naive_offset = config.naive_offset();
    let mut diagnostics = BatchDiagnostics::default();

    // Stage 1-2: decode and classify, partitioned by (year, learner)
    let mut partitions: BTreeMap<(String, String), Vec<ClassifiedEvent>> = BTreeMap::new();
    for log in logs {
        let decoded = RawEventAdapter::to_canonical_batch(&log.rows, &log.learner_id, naive_offset);
        diagnostics.rows_seen += log.rows.len() + log.unreadable_rows;
        diagnostics.rows_dropped += decoded.dropped + log.unreadable_rows;

        for event in decoded.events {
            let year = match &log.year {
                Some(year) => year.clone(),
                None => academic_year(event.timestamp, config.academic_year_start_month).to_string(),
            };
            let classified = classify(&classifier, event, &log.learner_id, &mut diagnostics);
            partitions
                .entry((year, log.learner_id.clone()))
                .or_default()
                .push(classified);
        }
    }

    // Stage 3-4: fold and sequence each partition
    let mut metrics = MetricsByYear::new();
    let mut progression = Vec::new();
    for ((year, learner_id), events) in partitions {
        let mut outcome = aggregator.fold(&learner_id, &year, events.iter().map(|e| &e.event));
        diagnostics.invalid_verbs += outcome.invalid_verbs;
        if !MetricAggregator::join_results(&mut outcome.metrics, results) {
            diagnostics.missing_results += 1;
        }

        progression.extend(sequence_learner(&learner_id, &year, &events));
        metrics
            .entry(year)
            .or_default()
            .insert(learner_id, outcome.metrics);
    }

    info!(
        logs = logs.len(),
        rows = diagnostics.rows_seen,
        dropped = diagnostics.rows_dropped,
        invalid_verbs = diagnostics.invalid_verbs,
        records = metrics.values().map(BTreeMap::len).sum::<usize>(),
        progression = progression.len(),
        "aggregation complete"
    );

    AggregationOutput {
        metrics,
        progression,
        diagnostics,
    }
}

fn classify(
    classifier: &VerbClassifier,
    event: CanonicalEvent,
    learner_id: &str,
    diagnostics: &mut BatchDiagnostics,
) -> ClassifiedEvent {
    let phase = classifier.classify(&event.verb_label);
    if phase.is_none() {
        warn!(learner = learner_id, row = event.row_index, verb = %event.verb_label, "unrecognized verb");
    }
    let unit = parse_unit_reference(&event.object_id);
    if unit.is_none() {
        diagnostics.malformed_object_ids += 1;
        warn!(learner = learner_id, row = event.row_index, object = %event.object_id, "malformed unit identifier");
    }
    ClassifiedEvent { event, phase, unit }
}

/// Processor holding configuration and the result table across queries.
///
/// Every call recomputes from its input; nothing is cached between calls.
#[derive(Debug, Clone, Default)]
pub struct LearningLogProcessor {
    config: FluxConfig,
    results: ResultTable,
}

impl LearningLogProcessor {
    /// Create a processor with an empty result table
    pub fn new(config: FluxConfig) -> Self {
        Self {
            config,
            results: ResultTable::default(),
        }
    }

    pub fn with_results(mut self, results: ResultTable) -> Self {
        self.results = results;
        self
    }

    pub fn config(&self) -> &FluxConfig {
        &self.config
    }

    pub fn results(&self) -> &ResultTable {
        &self.results
    }

    pub fn process(&self, logs: &[LearnerLog]) -> AggregationOutput {
        aggregate_logs(logs, &self.results, &self.config)
    }

    /// Progression for the current selection, renumbered over the filtered sequence
    pub fn progression_view(
        &self,
        logs: &[LearnerLog],
        selection: &SelectionState,
    ) -> Vec<OrderedProgressionEntry> {
        progression_view(&self.process(logs).progression, selection)
    }

    /// Metrics records for the current selection
    pub fn metrics_view(&self, logs: &[LearnerLog], selection: &SelectionState) -> Vec<LearnerYearMetrics> {
        let output = self.process(logs);
        metrics_view(&output.metrics, selection)
            .into_iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LearnerResult;
    use crate::schema::RawEventRow;
    use crate::types::{ActivityType, Direction, TimeBreakdown};
    use pretty_assertions::assert_eq;

    fn row(ts: &str, verb: &str, object: &str) -> RawEventRow {
        RawEventRow::new(
            r#"[{"openId": "12"}]"#,
            ts,
            format!(r#"[{{"objectId": "{object}"}}]"#),
            format!(r#"[{{"display": "{verb}"}}]"#),
        )
    }

    fn sample_log() -> LearnerLog {
        LearnerLog::new(
            "12",
            "2023",
            vec![
                row("2023-05-01T09:00:00Z", "launched", "kototomo/MainUnit/1/grammar/1"),
                row("2023-05-01T09:01:00Z", "played", "kototomo/MainUnit/1/movie/intro"),
                row("2023-05-01T09:05:00Z", "submitted", "kototomo/MainUnit/2/grammar/3")
                    .with_result(r#"{"success": true}"#),
                row("2023-05-01T09:06:00Z", "finished", "kototomo/MainUnit/2/grammar/3")
                    .with_result(r#"{"duration": 30}"#),
                row("2023-05-01T09:08:00Z", "launched", "kototomo/MainUnit/1/listening/2"),
            ],
        )
    }

    fn results() -> ResultTable {
        ResultTable::new(vec![LearnerResult {
            id: 12,
            test_result: Some(72.5),
            class_id: Some("A".to_string()),
        }])
    }

    #[test]
    fn test_aggregate_sample_log() {
        let output = aggregate_logs(&[sample_log()], &results(), &FluxConfig::default());

        let m = &output.metrics["2023"]["12"];
        assert_eq!(m.launched_count, 2);
        assert_eq!(m.video_start_count, 1);
        assert_eq!(m.answer_count, 1);
        assert_eq!(m.correct_answers, 1);
        assert_eq!(m.total_answer_time_seconds, 30);
        assert_eq!(m.test_result, Some(72.5));
        assert_eq!(m.class_id.as_deref(), Some("A"));

        let units: Vec<_> = output.progression.iter().map(|e| e.unit_number).collect();
        assert_eq!(units, vec![1, 1, 2, 2, 1]);
        assert_eq!(output.progression[4].direction, Direction::Review);
        let phases: Vec<_> = output.progression.iter().map(|e| e.lifecycle).collect();
        assert_eq!(phases, vec![1, 1, 0, 0, 1]);
        assert_eq!(output.diagnostics.rows_seen, 5);
        assert_eq!(output.diagnostics.rows_dropped, 0);
        assert_eq!(output.diagnostics.missing_results, 0);
    }

    #[test]
    fn test_progression_carries_time_breakdown() {
        let output = aggregate_logs(&[sample_log()], &results(), &FluxConfig::default());

        let last = &output.progression[4].time;
        assert_eq!((last.year, last.month, last.day), (2023, 5, 1));
        assert_eq!((last.hour, last.minute, last.second), (9, 8, 0));
        // 2023-05-01 is a Monday
        assert_eq!(last.weekday, 0);
        for entry in &output.progression {
            assert_eq!(entry.time, TimeBreakdown::from(entry.timestamp));
        }
    }

    #[test]
    fn test_empty_input_is_valid() {
        let output = aggregate_logs(&[], &ResultTable::default(), &FluxConfig::default());
        assert!(output.is_empty());
        assert!(output.progression.is_empty());
        assert_eq!(output.diagnostics, BatchDiagnostics::default());
    }

    #[test]
    fn test_malformed_verb_row_is_dropped() {
        let mut bad = row("2023-05-01T09:00:00Z", "played", "kototomo/MainUnit/1/movie/a");
        bad.verb = r#"[{"display": "played""#.to_string();
        let good = row("2023-05-01T09:01:00Z", "played", "kototomo/MainUnit/1/movie/b");
        let log = LearnerLog::new("12", "2023", vec![bad, good]);

        let output = aggregate_logs(&[log], &ResultTable::default(), &FluxConfig::default());
        assert_eq!(output.metrics["2023"]["12"].video_start_count, 1);
        assert_eq!(output.diagnostics.rows_dropped, 1);
        assert_eq!(output.diagnostics.missing_results, 1);
        assert_eq!(output.metrics["2023"]["12"].test_result, None);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let logs = vec![sample_log()];
        let config = FluxConfig::default();
        assert_eq!(
            aggregate_logs(&logs, &results(), &config),
            aggregate_logs(&logs, &results(), &config)
        );
    }

    #[test]
    fn test_logs_for_same_learner_merge() {
        let first = LearnerLog::new(
            "12",
            "2023",
            vec![row("2023-05-01T09:00:00Z", "launched", "kototomo/MainUnit/3")],
        );
        let second = LearnerLog::new(
            "12",
            "2023",
            vec![row("2023-04-20T09:00:00Z", "launched", "kototomo/MainUnit/1")],
        );

        let output = aggregate_logs(&[first, second], &ResultTable::default(), &FluxConfig::default());
        assert_eq!(output.record_count(), 1);
        assert_eq!(output.metrics["2023"]["12"].launched_count, 2);
        // Merged events are re-sorted chronologically
        let units: Vec<_> = output.progression.iter().map(|e| e.unit_number).collect();
        assert_eq!(units, vec![1, 3]);
    }

    #[test]
    fn test_year_derived_from_timestamps_without_folder() {
        let mut log = LearnerLog::new(
            "7",
            "unused",
            vec![
                row("2024-03-31T12:00:00Z", "launched", "kototomo/MainUnit/1"),
                row("2024-04-01T12:00:00Z", "launched", "kototomo/MainUnit/2"),
            ],
        );
        log.year = None;

        let output = aggregate_logs(&[log], &ResultTable::default(), &FluxConfig::default());
        let years: Vec<_> = output.metrics.keys().cloned().collect();
        assert_eq!(years, vec!["2023".to_string(), "2024".to_string()]);
    }

    #[test]
    fn test_invalid_verbs_and_object_ids_are_counted() {
        let log = LearnerLog::new(
            "12",
            "2023",
            vec![
                row("2023-05-01T09:00:00Z", "answered", "kototomo/MainUnit/1"),
                row("2023-05-01T09:01:00Z", "launched", "kototomo/MainUnit"),
            ],
        );
        let output = aggregate_logs(&[log], &ResultTable::default(), &FluxConfig::default());
        assert_eq!(output.diagnostics.invalid_verbs, 1);
        assert_eq!(output.diagnostics.malformed_object_ids, 1);
        // Neither event has both a phase and a unit
        assert!(output.progression.is_empty());
        assert_eq!(output.metrics["2023"]["12"].launched_count, 1);
    }

    #[test]
    fn test_processor_views() {
        let processor = LearningLogProcessor::new(FluxConfig::default()).with_results(results());
        let logs = vec![sample_log()];

        let selection = SelectionState::new()
            .select("12")
            .with_activity(Some(ActivityType::Grammar));
        let view = processor.progression_view(&logs, &selection);
        assert_eq!(view.len(), 3);
        assert!(view.iter().all(|e| e.direction == Direction::Forward));

        let metrics = processor.metrics_view(&logs, &SelectionState::new().select("99"));
        assert!(metrics.is_empty());
        let metrics = processor.metrics_view(&logs, &SelectionState::new());
        assert_eq!(metrics.len(), 1);
    }
}
