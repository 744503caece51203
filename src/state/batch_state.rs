/// Batch state definitions for tracking orchestration progress
///
/// A batch moves through `Enumerating -> Fetching -> Draining -> Handoff ->
/// Cleanup -> Done`. A structural failure in any earlier state jumps straight to
/// `Cleanup`, which then finishes in `Failed` instead of `Done`.
use std::fmt;

/// Represents the current state of a batch in the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchState {
    // ===== Active States =====
    /// Pulling the identifier list from the identifier source
    Enumerating,

    /// Sink is open and lookups are being admitted
    Fetching,

    /// Waiting for every admitted lookup to be written
    Draining,

    /// Sink is closed and the artifact is with the uploader
    Handoff,

    /// Removing the local artifact
    Cleanup,

    // ===== Terminal States =====
    /// Batch completed and its artifact was handed off
    Done,

    /// Batch hit a structural failure
    Failed,
}

impl BatchState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if the orchestrator may move from `self` to `next`
    pub fn can_transition_to(&self, next: BatchState) -> bool {
        use BatchState::*;

        match (*self, next) {
            (Enumerating, Fetching)
            | (Fetching, Draining)
            | (Draining, Handoff)
            | (Handoff, Cleanup)
            | (Cleanup, Done) => true,
            // Structural failures skip ahead to cleanup
            (Enumerating | Fetching | Draining, Cleanup) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Returns the lowercase name used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enumerating => "enumerating",
            Self::Fetching => "fetching",
            Self::Draining => "draining",
            Self::Handoff => "handoff",
            Self::Cleanup => "cleanup",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible batch states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Enumerating,
            Self::Fetching,
            Self::Draining,
            Self::Handoff,
            Self::Cleanup,
            Self::Done,
            Self::Failed,
        ]
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
