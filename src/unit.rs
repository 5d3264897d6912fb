//! Object identifier parsing
//!
//! Object ids look like `kototomo/MainUnit/1/listening/6/01-6.mp3`: a course
//! name, a unit type, a unit number and free-form activity segments.

use crate::types::{ActivityType, UnitKind, UnitReference};

/// Decode an object id into a unit reference.
///
/// Returns `None` unless there are at least three `/`-separated segments, the
/// second names a known unit type and the third is a non-negative integer.
pub fn parse_unit_reference(object_id: &str) -> Option<UnitReference> {
    let segments: Vec<&str> = object_id.split('/').collect();
    if segments.len() < 3 {
        return None;
    }

    let unit_type = segments[1];
    let kind = if unit_type.contains(UnitKind::MainUnit.as_str()) {
        UnitKind::MainUnit
    } else if unit_type.contains(UnitKind::BasicUnit.as_str()) {
        UnitKind::BasicUnit
    } else {
        return None;
    };

    let unit_number = segments[2].trim().parse::<u32>().ok()?;

    Some(UnitReference {
        unit_type: unit_type.to_string(),
        kind,
        unit_number,
        activity_type: detect_activity(object_id),
    })
}

/// First activity keyword, in keyword order, that opens a path segment.
///
/// `basic_pronunciation` belongs to the basic-unit drills and does not count
/// as the pronunciation activity.
pub fn detect_activity(object_id: &str) -> Option<ActivityType> {
    ActivityType::ALL.into_iter().find(|activity| {
        object_id
            .split('/')
            .any(|segment| segment.starts_with(activity.keyword()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_unit_without_activity() {
        let unit = parse_unit_reference("kototomo/BasicUnit/2/basic_pronunciation/2").unwrap();
        assert_eq!(unit.unit_type, "BasicUnit");
        assert_eq!(unit.kind, UnitKind::BasicUnit);
        assert_eq!(unit.unit_number, 2);
        assert_eq!(unit.activity_type, None);
    }

    #[test]
    fn test_main_unit_with_activity() {
        let unit = parse_unit_reference("kototomo/MainUnit/1/listening/6/01-6.mp3").unwrap();
        assert_eq!(unit.unit_type, "MainUnit");
        assert_eq!(unit.unit_number, 1);
        assert_eq!(unit.activity_type, Some(ActivityType::Listening));
    }

    #[test]
    fn test_no_activity_keyword() {
        let unit = parse_unit_reference("kototomo/MainUnit/3/movie/intro.mp4").unwrap();
        assert_eq!(unit.unit_number, 3);
        assert_eq!(unit.activity_type, None);
    }

    #[test]
    fn test_unit_type_kept_verbatim() {
        let unit = parse_unit_reference("kototomo/MainUnit_v2/4").unwrap();
        assert_eq!(unit.unit_type, "MainUnit_v2");
        assert_eq!(unit.kind, UnitKind::MainUnit);
    }

    #[test]
    fn test_malformed_identifiers() {
        assert_eq!(parse_unit_reference("kototomo/MainUnit"), None);
        assert_eq!(parse_unit_reference("kototomo/Lesson/1/grammar"), None);
        assert_eq!(parse_unit_reference("kototomo/MainUnit/one/grammar"), None);
        assert_eq!(parse_unit_reference("kototomo/MainUnit/-1"), None);
        assert_eq!(parse_unit_reference(""), None);
    }

    #[test]
    fn test_first_activity_keyword_wins() {
        assert_eq!(
            detect_activity("kototomo/MainUnit/1/listening/grammar_check"),
            Some(ActivityType::Grammar)
        );
        assert_eq!(
            detect_activity("kototomo/MainUnit/2/speaking_02/rec.wav"),
            Some(ActivityType::Speaking)
        );
    }
}
