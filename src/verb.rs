//! Verb classification
//!
//! Two independent tables read the verb label:
//!
//! - [`VerbClassifier`] reduces a label to a [`LifecyclePhase`] by prefix.
//! - [`LiteralVerb`] names the exact labels individual metric rules key on.
//!
//! The tables overlap but are kept separate. A label can drive a literal
//! rule while failing the lifecycle lookup, and the other way round.

use crate::types::LifecyclePhase;

/// Prefixes that open an activity
pub const START_PREFIXES: &[&str] = &["launched", "started", "resumed", "played"];

/// Prefixes for steps inside an activity
pub const MID_PREFIXES: &[&str] = &[
    "finished",
    "moved",
    "selected",
    "opened",
    "closed",
    "submitted",
    "paused",
];

/// Prefixes that close an activity
pub const END_PREFIXES: &[&str] = &["suspended", "completed", "terminated"];

/// Prefix table mapping verb labels to lifecycle phases
#[derive(Debug, Clone)]
pub struct VerbClassifier {
    table: Vec<(&'static str, LifecyclePhase)>,
}

impl Default for VerbClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl VerbClassifier {
    /// Classifier with the standard start / mid / end prefix lists
    pub fn new() -> Self {
        let table = START_PREFIXES
            .iter()
            .map(|p| (*p, LifecyclePhase::Start))
            .chain(MID_PREFIXES.iter().map(|p| (*p, LifecyclePhase::Mid)))
            .chain(END_PREFIXES.iter().map(|p| (*p, LifecyclePhase::End)))
            .collect();
        Self { table }
    }

    /// Phase of the first prefix the label starts with, in table order.
    ///
    /// `None` marks the event invalid for lifecycle-dependent logic.
    pub fn classify(&self, label: &str) -> Option<LifecyclePhase> {
        self.table
            .iter()
            .find(|(prefix, _)| label.starts_with(prefix))
            .map(|(_, phase)| *phase)
    }

    /// Number of prefixes in the table
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Exact verb labels used by the metric rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralVerb {
    Played,
    Submitted,
    Suspended,
    Launched,
    Finished,
    Completed,
    Started,
    Moved,
}

impl LiteralVerb {
    pub const ALL: [LiteralVerb; 8] = [
        LiteralVerb::Played,
        LiteralVerb::Submitted,
        LiteralVerb::Suspended,
        LiteralVerb::Launched,
        LiteralVerb::Finished,
        LiteralVerb::Completed,
        LiteralVerb::Started,
        LiteralVerb::Moved,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LiteralVerb::Played => "played",
            LiteralVerb::Submitted => "submitted",
            LiteralVerb::Suspended => "suspended",
            LiteralVerb::Launched => "launched",
            LiteralVerb::Finished => "finished",
            LiteralVerb::Completed => "completed",
            LiteralVerb::Started => "started",
            LiteralVerb::Moved => "moved",
        }
    }

    /// Exact, case-sensitive match
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == label)
    }
}
