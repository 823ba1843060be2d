use serde::Serialize;
use std::fmt;

/// Attendance standing derived from a monthly percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Standing {
    Good,
    Warning,
    Poor,
}

impl fmt::Display for Standing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Standing::Good => "good",
            Standing::Warning => "warning",
            Standing::Poor => "poor",
        };
        f.write_str(s)
    }
}

/// Converts an attendance percentage (0–100) into a [`Standing`].
///
/// | Range  | Standing |
/// |--------|----------|
/// | >= 90  | Good     |
/// | >= 75  | Warning  |
/// | < 75   | Poor     |
pub fn standing(percentage: u8) -> Standing {
    match percentage {
        p if p >= 90 => Standing::Good,
        p if p >= 75 => Standing::Warning,
        _ => Standing::Poor,
    }
}
