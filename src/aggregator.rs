//! Metric aggregation
//!
//! Folds one learner's events for one year into a [`LearnerYearMetrics`].
//! Each rule in [`METRIC_RULES`] keys on an exact verb label and runs
//! independently, so one event can feed several counters.

use crate::context::ResultTable;
use crate::schema::{record_duration_seconds, record_flag};
use crate::types::{CanonicalEvent, LearnerYearMetrics};
use crate::verb::{LiteralVerb, VerbClassifier};
use tracing::debug;

/// A rule updating the metrics for one matching event
pub type MetricRule = fn(&mut LearnerYearMetrics, &CanonicalEvent);

/// Literal verb → rule table; every matching entry is applied in order
pub const METRIC_RULES: &[(LiteralVerb, MetricRule)] = &[
    (LiteralVerb::Played, count_media_start),
    (LiteralVerb::Submitted, count_answer),
    (LiteralVerb::Suspended, count_suspended),
    (LiteralVerb::Launched, count_launched),
    (LiteralVerb::Finished, add_answer_time),
    (LiteralVerb::Completed, add_completed_time),
    (LiteralVerb::Completed, count_movie_completed),
    (LiteralVerb::Started, count_recorder_start),
    (LiteralVerb::Moved, count_continue),
];

/// Result of folding one (learner, year) partition
#[derive(Debug, Clone, PartialEq)]
pub struct FoldOutcome {
    pub metrics: LearnerYearMetrics,
    /// Events whose verb matched no lifecycle prefix
    pub invalid_verbs: usize,
}

/// Folds canonical events into per-learner metrics
#[derive(Debug, Clone, Default)]
pub struct MetricAggregator {
    classifier: VerbClassifier,
}

impl MetricAggregator {
    pub fn new(classifier: VerbClassifier) -> Self {
        Self { classifier }
    }

    /// Fold events into fresh metrics. Event order does not matter.
    pub fn fold<'a>(
        &self,
        learner_id: &str,
        year: &str,
        events: impl IntoIterator<Item = &'a CanonicalEvent>,
    ) -> FoldOutcome {
        let mut metrics = LearnerYearMetrics::new(learner_id, year);
        let mut invalid_verbs = 0;
        let mut seen = 0usize;

        for event in events {
            seen += 1;
            if self.classifier.classify(&event.verb_label).is_none() {
                invalid_verbs += 1;
            }
            apply_rules(&mut metrics, event);
        }

        debug!(
            learner = learner_id,
            year,
            events = seen,
            invalid_verbs,
            answers = metrics.answer_count,
            "folded learner metrics"
        );

        FoldOutcome {
            metrics,
            invalid_verbs,
        }
    }

    /// Copy test result and class from the result table.
    ///
    /// Returns `false` when the learner has no row; both fields stay `None`.
    pub fn join_results(metrics: &mut LearnerYearMetrics, results: &ResultTable) -> bool {
        match results.lookup(&metrics.learner_id) {
            Some(row) => {
                metrics.test_result = row.test_result;
                metrics.class_id = row.class_id.clone();
                true
            }
            None => {
                metrics.test_result = None;
                metrics.class_id = None;
                false
            }
        }
    }
}

/// Apply every rule whose verb equals the event's label
pub fn apply_rules(metrics: &mut LearnerYearMetrics, event: &CanonicalEvent) {
    let Some(verb) = LiteralVerb::from_label(&event.verb_label) else {
        return;
    };
    for (rule_verb, rule) in METRIC_RULES {
        if *rule_verb == verb {
            rule(metrics, event);
        }
    }
}

fn count_media_start(m: &mut LearnerYearMetrics, e: &CanonicalEvent) {
    if e.object_id.contains("movie") {
        m.video_start_count += 1;
    }
    if e.object_id.contains("mp3") {
        m.audio_start_count += 1;
    }
}

fn count_answer(m: &mut LearnerYearMetrics, e: &CanonicalEvent) {
    m.answer_count += 1;
    for record in e.result_records() {
        match record_flag(record, "success") {
            Some(true) => m.correct_answers += 1,
            Some(false) => m.incorrect_answers += 1,
            None => {}
        }
    }
}

fn count_suspended(m: &mut LearnerYearMetrics, _: &CanonicalEvent) {
    m.suspended_count += 1;
}

fn count_launched(m: &mut LearnerYearMetrics, _: &CanonicalEvent) {
    m.launched_count += 1;
}

fn result_seconds(e: &CanonicalEvent) -> u64 {
    e.result_records()
        .iter()
        .filter_map(record_duration_seconds)
        .fold(0u64, u64::saturating_add)
}

fn add_answer_time(m: &mut LearnerYearMetrics, e: &CanonicalEvent) {
    m.total_answer_time_seconds = m.total_answer_time_seconds.saturating_add(result_seconds(e));
}

/// Routed by the first object only, even when the result is a list
fn add_completed_time(m: &mut LearnerYearMetrics, e: &CanonicalEvent) {
    if e.object_id.contains("recorder") {
        m.recording_time_seconds = m.recording_time_seconds.saturating_add(result_seconds(e));
    } else if e.object_id.contains("movie") {
        m.video_time_seconds = m.video_time_seconds.saturating_add(result_seconds(e));
    }
}

fn count_movie_completed(m: &mut LearnerYearMetrics, e: &CanonicalEvent) {
    if e.any_object_contains("movie") {
        m.movie_completed_count += 1;
    }
}

fn count_recorder_start(m: &mut LearnerYearMetrics, e: &CanonicalEvent) {
    if e.any_object_contains("recorder") {
        m.recorder_start_count += 1;
    }
}

fn count_continue(m: &mut LearnerYearMetrics, e: &CanonicalEvent) {
    if e.result_records()
        .iter()
        .any(|r| record_flag(r, "continue") == Some(true))
    {
        m.continue_count += 1;
    }
}
