//! Input row schema
//!
//! This module defines the raw row shape produced by spreadsheet exports and
//! the adapter that decodes rows into canonical events.

mod adapter;
mod log;
mod raw_event;
mod timestamp;

pub use adapter::*;
pub use log::*;
pub use raw_event::*;
pub use timestamp::*;
