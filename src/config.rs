//! Processing configuration

use crate::error::FluxError;
use crate::normalizer::DurationUnit;
use crate::schema::offset_from_hours;
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Default first month of the academic year (April)
pub const DEFAULT_ACADEMIC_YEAR_START_MONTH: u32 = 4;

/// Settings shared by the pipeline, encoder and CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluxConfig {
    /// First month of the academic year, used when a log has no year folder
    pub academic_year_start_month: u32,
    /// Unit the encoder renders duration fields in
    pub duration_unit: DurationUnit,
    /// Offset, in hours east of UTC, assumed for timestamps without one
    pub default_timezone_offset_hours: i32,
}

impl Default for FluxConfig {
    fn default() -> Self {
        Self {
            academic_year_start_month: DEFAULT_ACADEMIC_YEAR_START_MONTH,
            duration_unit: DurationUnit::Seconds,
            default_timezone_offset_hours: 0,
        }
    }
}

impl FluxConfig {
    /// Parse and validate a JSON config document
    pub fn from_json(json: &str) -> Result<Self, FluxError> {
        let config: FluxConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FluxError> {
        if !(1..=12).contains(&self.academic_year_start_month) {
            return Err(FluxError::InvalidConfig(format!(
                "academic_year_start_month must be 1-12, got {}",
                self.academic_year_start_month
            )));
        }
        if !(-23..=23).contains(&self.default_timezone_offset_hours) {
            return Err(FluxError::InvalidConfig(format!(
                "default_timezone_offset_hours must be -23..23, got {}",
                self.default_timezone_offset_hours
            )));
        }
        Ok(())
    }

    /// Offset applied to naive timestamps
    pub fn naive_offset(&self) -> FixedOffset {
        offset_from_hours(self.default_timezone_offset_hours).unwrap_or_else(|| Utc.fix())
    }
}
