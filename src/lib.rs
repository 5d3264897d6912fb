//! learnflux - Learning-log aggregation engine for progress dashboards
//!
//! learnflux turns per-learner xAPI-style event logs into chart-ready tables
//! through a deterministic pipeline: row decoding → verb and unit
//! classification → per-learner metric folding → progression sequencing →
//! chart encoding.
//!
//! ## Outputs
//!
//! - **Metrics**: year → learner → [`LearnerYearMetrics`] counters and durations
//! - **Progression**: chronological unit visits tagged forward or review

pub mod aggregator;
pub mod config;
pub mod context;
pub mod encoder;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod selection;
pub mod sequencing;
pub mod types;
pub mod unit;
pub mod verb;

pub use aggregator::MetricAggregator;
pub use config::FluxConfig;
pub use context::{LearnerResult, ResultTable};
pub use encoder::ChartEncoder;
pub use error::{FluxError, RowError};
pub use normalizer::{DurationUnit, MetricField, MetricNormalizer};
pub use pipeline::{aggregate_logs, AggregationOutput, LearningLogProcessor};
pub use selection::SelectionState;
pub use types::{LearnerYearMetrics, LifecyclePhase, OrderedProgressionEntry};

// Schema exports
pub use schema::{LearnerLog, RawEventAdapter, RawEventRow};

/// learnflux version embedded in all chart payloads
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for chart payloads
pub const PRODUCER_NAME: &str = "learnflux";
