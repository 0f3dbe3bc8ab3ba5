//! Suspicion levels and their combination rule.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How strongly a transaction's call tree resembles reentrancy.
///
/// Levels are totally ordered `None < Light < Hard`; findings are combined
/// with [`SuspicionType::join`], so a verdict never decreases while a trace
/// is being walked.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum SuspicionType {
    /// No contract was re-entered while active.
    #[default]
    None,
    /// A different function of an already-active contract was entered
    /// (cross-function reentrancy).
    Light,
    /// The same (contract, function) pair was entered while still active.
    Hard,
}

impl SuspicionType {
    /// Lattice join: the more severe of the two levels.
    #[must_use]
    pub fn join(self, other: Self) -> Self {
        self.max(other)
    }

    pub fn is_suspicious(self) -> bool {
        self > Self::None
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Light => "LIGHT",
            Self::Hard => "HARD",
        }
    }
}

impl fmt::Display for SuspicionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
