//! Error types for Pagewise core.

use std::fmt;

/// A listener's refusal of a pending change.
///
/// Returned by vetoable listeners (see [`crate::VetoableSignal`]) to abort a
/// mutation before it is committed. A veto is an expected outcome, not a
/// failure: the object that asked for permission must leave its state exactly
/// as it was before the attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Veto {
    reason: String,
}

impl Veto {
    /// Create a veto with a human readable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The reason given by the vetoing listener.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for Veto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Change vetoed: {}", self.reason)
    }
}

impl std::error::Error for Veto {}
