//! Per-learner result context
//!
//! Test scores and class assignments live in a separate table keyed by the
//! integer learner id. They are joined onto the aggregated metrics; a learner
//! missing from the table gets `None`, never zero.

use crate::error::FluxError;
use crate::schema::parse_learner_id;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One row of the external result table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerResult {
    pub id: u64,
    #[serde(default, deserialize_with = "lenient_score")]
    pub test_result: Option<f64>,
    #[serde(default, deserialize_with = "lenient_label")]
    pub class_id: Option<String>,
}

/// Result rows indexed by learner id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    by_id: HashMap<u64, LearnerResult>,
}

impl ResultTable {
    pub fn new(results: impl IntoIterator<Item = LearnerResult>) -> Self {
        Self {
            by_id: results.into_iter().map(|r| (r.id, r)).collect(),
        }
    }

    /// Parse a JSON array of result rows
    pub fn from_json(json: &str) -> Result<Self, FluxError> {
        let rows: Vec<LearnerResult> = serde_json::from_str(json)?;
        Ok(Self::new(rows))
    }

    /// Exact match on the integer form of `learner_id`
    pub fn lookup(&self, learner_id: &str) -> Option<&LearnerResult> {
        let id = parse_learner_id(learner_id).ok()?;
        self.by_id.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Scores arrive as numbers, numeric strings or blanks
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    })
}

fn lenient_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_and_lookup() {
        let json = r#"[
            {"id": 12, "test_result": 78.5, "class_id": "A"},
            {"id": 13, "test_result": "64", "class_id": 2},
            {"id": 14, "test_result": "NaN"},
            {"id": 15}
        ]"#;
        let table = ResultTable::from_json(json).unwrap();
        assert_eq!(table.len(), 4);

        let a = table.lookup("12").unwrap();
        assert_eq!(a.test_result, Some(78.5));
        assert_eq!(a.class_id.as_deref(), Some("A"));

        let b = table.lookup("013").unwrap();
        assert_eq!(b.test_result, Some(64.0));
        assert_eq!(b.class_id.as_deref(), Some("2"));

        assert_eq!(table.lookup("14").unwrap().test_result, None);
        assert_eq!(table.lookup("15").unwrap().class_id, None);
    }

    #[test]
    fn test_missing_learner() {
        let table = ResultTable::new(vec![LearnerResult {
            id: 1,
            test_result: Some(50.0),
            class_id: None,
        }]);
        assert!(table.lookup("2").is_none());
        assert!(table.lookup("not-a-number").is_none());
        assert!(ResultTable::default().is_empty());
    }
}
