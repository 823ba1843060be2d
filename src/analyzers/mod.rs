//! Attendance aggregation and standing.
//!
//! This module fans out per-day record fetches for a month, folds the
//! records into per-student tallies, derives attendance percentages and
//! classifies them into standings.

pub mod aggregate;
pub mod analyzer;
pub mod grade;
pub mod types;
pub mod utility;
