//! Progression sequencing
//!
//! Orders a learner's unit visits chronologically, numbers them globally and
//! per activity, and tags each step as forward or review.

use crate::types::{ClassifiedEvent, Direction, OrderedProgressionEntry, TimeBreakdown};
use std::collections::HashMap;

/// Build the ordered progression for one learner and year.
///
/// Only events with both a lifecycle phase and a unit reference take part.
/// Ties on timestamp keep their input order.
pub fn sequence_learner(
    learner_id: &str,
    year: &str,
    events: &[ClassifiedEvent],
) -> Vec<OrderedProgressionEntry> {
    let mut entries: Vec<OrderedProgressionEntry> = events
        .iter()
        .filter_map(|e| {
            let phase = e.phase?;
            let unit = e.unit.as_ref()?;
            Some(OrderedProgressionEntry {
                learner_id: learner_id.to_string(),
                year: year.to_string(),
                unit_type: unit.unit_type.clone(),
                unit_number: unit.unit_number,
                activity_type: unit.activity_type,
                timestamp: e.event.timestamp,
                time: TimeBreakdown::from(e.event.timestamp),
                direction: Direction::Forward,
                lifecycle: phase.as_i8(),
                sequence_global: 0,
                sequence_by_activity: 0,
                elapsed_since_previous_secs: 0,
                verb_label: e.event.verb_label.clone(),
                row_index: e.event.row_index,
            })
        })
        .collect();

    entries.sort_by_key(|e| e.timestamp);
    resequence(&mut entries);
    entries
}

/// Recompute sequence numbers, directions and gaps over `entries` as given.
///
/// `entries` must be one learner's chronological sequence. "Previous" means
/// the previous element of this slice, so a filtered view has to be
/// resequenced rather than reuse the numbers of the full sequence.
pub fn resequence(entries: &mut [OrderedProgressionEntry]) {
    let mut per_activity: HashMap<_, u32> = HashMap::new();
    let mut previous: Option<(u32, chrono::DateTime<chrono::Utc>)> = None;

    for (idx, entry) in entries.iter_mut().enumerate() {
        entry.sequence_global = idx as u32 + 1;

        let rank = per_activity.entry(entry.activity_type).or_insert(0);
        *rank += 1;
        entry.sequence_by_activity = *rank;

        match previous {
            None => {
                entry.direction = Direction::Forward;
                entry.elapsed_since_previous_secs = 0;
            }
            Some((prev_unit, prev_ts)) => {
                entry.direction = classify_step(prev_unit, entry.unit_number);
                entry.elapsed_since_previous_secs = (entry.timestamp - prev_ts).num_seconds();
            }
        }
        previous = Some((entry.unit_number, entry.timestamp));
    }
}

/// Forward unless the unit number went down
pub fn classify_step(previous_unit: u32, unit: u32) -> Direction {
    if unit >= previous_unit {
        Direction::Forward
    } else {
        Direction::Review
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivityType, CanonicalEvent, LifecyclePhase, UnitKind, UnitReference};
    use chrono::{Duration, TimeZone, Utc};

    fn classified(minute: i64, unit_number: u32, activity: Option<ActivityType>) -> ClassifiedEvent {
        let base = Utc.with_ymd_and_hms(2023, 5, 1, 9, 0, 0).unwrap();
        ClassifiedEvent {
            event: CanonicalEvent {
                actor_id: "12".to_string(),
                timestamp: base + Duration::minutes(minute),
                object_id: format!("kototomo/MainUnit/{unit_number}"),
                object_ids: vec![format!("kototomo/MainUnit/{unit_number}")],
                verb_label: "launched".to_string(),
                result: None,
                device_or_class_id: None,
                row_index: minute as usize,
            },
            phase: Some(LifecyclePhase::Start),
            unit: Some(UnitReference {
                unit_type: "MainUnit".to_string(),
                kind: UnitKind::MainUnit,
                unit_number,
                activity_type: activity,
            }),
        }
    }

    #[test]
    fn test_direction_and_global_sequence() {
        let events: Vec<_> = [1, 2, 2, 1, 3]
            .iter()
            .enumerate()
            .map(|(i, unit)| classified(i as i64, *unit, None))
            .collect();

        let entries = sequence_learner("12", "2023", &events);
        let directions: Vec<_> = entries.iter().map(|e| e.direction).collect();
        let sequence: Vec<_> = entries.iter().map(|e| e.sequence_global).collect();

        use Direction::*;
        assert_eq!(directions, vec![Forward, Forward, Forward, Review, Forward]);
        assert_eq!(sequence, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_sorts_chronologically_and_keeps_tie_order() {
        let mut late = classified(10, 5, None);
        late.event.row_index = 0;
        let mut tie_a = classified(3, 2, None);
        tie_a.event.row_index = 1;
        let mut tie_b = classified(3, 1, None);
        tie_b.event.row_index = 2;

        let entries = sequence_learner("12", "2023", &[late, tie_a, tie_b]);
        let rows: Vec<_> = entries.iter().map(|e| e.row_index).collect();
        assert_eq!(rows, vec![1, 2, 0]);
        assert_eq!(entries[1].direction, Direction::Review);
        assert_eq!(entries[1].elapsed_since_previous_secs, 0);
        assert_eq!(entries[2].elapsed_since_previous_secs, 420);
    }

    #[test]
    fn test_sequence_by_activity() {
        let events = vec![
            classified(0, 1, Some(ActivityType::Grammar)),
            classified(1, 1, Some(ActivityType::Listening)),
            classified(2, 2, Some(ActivityType::Grammar)),
            classified(3, 2, None),
            classified(4, 3, Some(ActivityType::Grammar)),
        ];
        let entries = sequence_learner("12", "2023", &events);
        let by_activity: Vec<_> = entries.iter().map(|e| e.sequence_by_activity).collect();
        assert_eq!(by_activity, vec![1, 1, 2, 1, 3]);
    }

    #[test]
    fn test_skips_events_without_unit_or_phase() {
        let mut no_unit = classified(0, 1, None);
        no_unit.unit = None;
        let mut no_phase = classified(1, 1, None);
        no_phase.phase = None;
        let kept = classified(2, 4, None);

        let entries = sequence_learner("12", "2023", &[no_unit, no_phase, kept]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].unit_number, 4);
        assert_eq!(entries[0].sequence_global, 1);
    }

    #[test]
    fn test_filtered_view_is_reclassified() {
        let events = vec![
            classified(0, 3, Some(ActivityType::Grammar)),
            classified(1, 1, Some(ActivityType::Listening)),
            classified(2, 2, Some(ActivityType::Listening)),
        ];
        let entries = sequence_learner("12", "2023", &events);
        assert_eq!(entries[1].direction, Direction::Review);

        let mut listening: Vec<_> = entries
            .into_iter()
            .filter(|e| e.activity_type == Some(ActivityType::Listening))
            .collect();
        resequence(&mut listening);
        assert_eq!(listening[0].direction, Direction::Forward);
        assert_eq!(listening[0].sequence_global, 1);
        assert_eq!(listening[1].direction, Direction::Forward);
    }
}
