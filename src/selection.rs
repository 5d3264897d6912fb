//! Dashboard selection state
//!
//! The chart layer keeps the learners, activity and year a user picked. The
//! state is a plain value threaded through queries, so two sessions never
//! share a selection.

use crate::sequencing::resequence;
use crate::types::{ActivityType, LearnerYearMetrics, OrderedProgressionEntry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What the user is currently looking at
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    /// Selected learner ids; empty means every learner
    #[serde(default)]
    pub learners: BTreeSet<String>,
    #[serde(default)]
    pub activity: Option<ActivityType>,
    #[serde(default)]
    pub year: Option<String>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the learner if absent, remove it if present
    pub fn toggle(mut self, learner_id: impl Into<String>) -> Self {
        let learner_id = learner_id.into();
        if !self.learners.remove(&learner_id) {
            self.learners.insert(learner_id);
        }
        self
    }

    pub fn select(mut self, learner_id: impl Into<String>) -> Self {
        self.learners.insert(learner_id.into());
        self
    }

    pub fn with_activity(mut self, activity: Option<ActivityType>) -> Self {
        self.activity = activity;
        self
    }

    pub fn with_year(mut self, year: Option<String>) -> Self {
        self.year = year;
        self
    }

    /// Drop the learner selection, keeping the filters
    pub fn clear(mut self) -> Self {
        self.learners.clear();
        self
    }

    pub fn includes_learner(&self, learner_id: &str) -> bool {
        self.learners.is_empty() || self.learners.contains(learner_id)
    }

    pub fn includes_year(&self, year: &str) -> bool {
        self.year.as_deref().map_or(true, |y| y == year)
    }

    fn includes_entry(&self, entry: &OrderedProgressionEntry) -> bool {
        self.includes_learner(&entry.learner_id)
            && self.includes_year(&entry.year)
            && self.activity.map_or(true, |a| entry.activity_type == Some(a))
    }
}

/// Filter progression entries and renumber what remains.
///
/// Directions are recomputed because "previous" is relative to the filtered
/// sequence the chart will show.
pub fn progression_view(
    entries: &[OrderedProgressionEntry],
    selection: &SelectionState,
) -> Vec<OrderedProgressionEntry> {
    let mut view: Vec<OrderedProgressionEntry> = entries
        .iter()
        .filter(|e| selection.includes_entry(e))
        .cloned()
        .collect();

    // Group per (year, learner) so each sequence is renumbered on its own
    let mut keyed: BTreeMap<(String, String), Vec<OrderedProgressionEntry>> = BTreeMap::new();
    for entry in view.drain(..) {
        keyed
            .entry((entry.year.clone(), entry.learner_id.clone()))
            .or_default()
            .push(entry);
    }
    for (_, mut group) in keyed {
        resequence(&mut group);
        view.extend(group);
    }
    view
}

/// Selected learners' metrics for the selected year (or every year)
pub fn metrics_view<'a>(
    metrics: &'a BTreeMap<String, BTreeMap<String, LearnerYearMetrics>>,
    selection: &SelectionState,
) -> Vec<&'a LearnerYearMetrics> {
    metrics
        .iter()
        .filter(|(year, _)| selection.includes_year(year))
        .flat_map(|(_, learners)| learners.values())
        .filter(|m| selection.includes_learner(&m.learner_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, TimeBreakdown};
    use chrono::{Duration, TimeZone, Utc};

    fn entry(learner: &str, minute: i64, unit: u32, activity: Option<ActivityType>) -> OrderedProgressionEntry {
        let timestamp = Utc.with_ymd_and_hms(2023, 6, 1, 9, 0, 0).unwrap() + Duration::minutes(minute);
        OrderedProgressionEntry {
            learner_id: learner.to_string(),
            year: "2023".to_string(),
            unit_type: "MainUnit".to_string(),
            unit_number: unit,
            activity_type: activity,
            timestamp,
            time: TimeBreakdown::from(timestamp),
            direction: Direction::Forward,
            lifecycle: 1,
            sequence_global: 0,
            sequence_by_activity: 0,
            elapsed_since_previous_secs: 0,
            verb_label: "launched".to_string(),
            row_index: minute as usize,
        }
    }

    #[test]
    fn test_toggle_and_clear() {
        let state = SelectionState::new().toggle("1").toggle("2").toggle("1");
        assert_eq!(state.learners.iter().collect::<Vec<_>>(), vec!["2"]);
        assert!(state.includes_learner("2"));
        assert!(!state.includes_learner("1"));

        let cleared = state.clear();
        assert!(cleared.includes_learner("1"));
    }

    #[test]
    fn test_states_are_independent() {
        let base = SelectionState::new().select("1");
        let other = base.clone().select("2");
        assert_eq!(base.learners.len(), 1);
        assert_eq!(other.learners.len(), 2);
    }

    #[test]
    fn test_progression_view_filters_and_reclassifies() {
        let entries = vec![
            entry("1", 0, 3, Some(ActivityType::Grammar)),
            entry("1", 1, 1, Some(ActivityType::Listening)),
            entry("1", 2, 2, Some(ActivityType::Listening)),
            entry("2", 0, 4, Some(ActivityType::Listening)),
        ];
        let selection = SelectionState::new()
            .select("1")
            .with_activity(Some(ActivityType::Listening));

        let view = progression_view(&entries, &selection);
        assert_eq!(view.len(), 2);
        assert!(view.iter().all(|e| e.learner_id == "1"));
        assert_eq!(view[0].direction, Direction::Forward);
        assert_eq!(view[0].sequence_global, 1);
        assert_eq!(view[1].direction, Direction::Forward);
        assert_eq!(view[1].sequence_global, 2);
        assert_eq!(view[1].elapsed_since_previous_secs, 60);
    }

    #[test]
    fn test_metrics_view() {
        let mut metrics = BTreeMap::new();
        let mut y2023 = BTreeMap::new();
        y2023.insert("1".to_string(), LearnerYearMetrics::new("1", "2023"));
        y2023.insert("2".to_string(), LearnerYearMetrics::new("2", "2023"));
        metrics.insert("2023".to_string(), y2023);
        let mut y2024 = BTreeMap::new();
        y2024.insert("1".to_string(), LearnerYearMetrics::new("1", "2024"));
        metrics.insert("2024".to_string(), y2024);

        let all = metrics_view(&metrics, &SelectionState::new());
        assert_eq!(all.len(), 3);

        let selection = SelectionState::new().select("1").with_year(Some("2024".to_string()));
        let picked = metrics_view(&metrics, &selection);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].year, "2024");
    }
}
