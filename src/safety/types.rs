//! Screening verdicts.

use crate::error::RelayError;

/// Outcome of screening one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screening {
    /// No deny pattern matched.
    Allowed,
    /// A deny pattern matched.
    Rejected {
        /// The configured pattern that matched.
        pattern: String,
        /// The text the pattern matched in the payload.
        matched: String,
        /// 1-based line of the first match.
        line: usize,
    },
}

impl Screening {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Screening::Allowed)
    }

    /// Human-readable reason for a rejection, with the next action to take.
    pub fn reason(&self) -> Option<String> {
        match self {
            Screening::Allowed => None,
            Screening::Rejected {
                pattern,
                matched,
                line,
            } => Some(format!(
                "payload line {} contains '{}' (deny pattern '{}'); \
                 remove that call and submit the task again",
                line, matched, pattern
            )),
        }
    }

    /// Convert into a `Result`, mapping rejection to `RelayError::SafetyRejected`.
    pub fn into_result(self) -> crate::error::Result<()> {
        match self {
            Screening::Allowed => Ok(()),
            Screening::Rejected { pattern, .. } => Err(RelayError::SafetyRejected { pattern }),
        }
    }
}
