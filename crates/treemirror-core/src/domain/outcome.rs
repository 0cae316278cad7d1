//! Result of a single copy or delete, as shown to the user

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Elapsed time above which an outcome is reported as slow
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(500);

/// Final state of a copy or delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Completed without problems
    Ok,
    /// Completed, but part of the source vanished while it was being copied
    Partial,
    /// The source no longer existed when the copy ran
    Absent,
    /// Failed; the queue reports an error
    Error,
}

impl Outcome {
    /// Only `Error` counts as a failure for the action queue
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Outcome::Error)
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Ok => "OK",
            Outcome::Partial => "PARTIAL",
            Outcome::Absent => "ABSENT",
            Outcome::Error => "ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Returns the elapsed milliseconds if they exceed `threshold`
#[must_use]
pub fn slow_millis(elapsed: Duration, threshold: Duration) -> Option<u128> {
    (elapsed > threshold).then(|| elapsed.as_millis())
}
