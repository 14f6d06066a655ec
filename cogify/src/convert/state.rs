//! Lifecycle of a conversion run.

use std::fmt;

/// Phase of a conversion run.
///
/// Runs move `Planning → MosaicReady → Dispatching → Draining → Done`.
/// `Failed` can be reached from any phase that is not terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Planning,
    MosaicReady,
    Dispatching,
    Draining,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Planning, MosaicReady)
            | (MosaicReady, Dispatching)
            | (Dispatching, Draining)
            | (Draining, Done) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RunState::Planning => "planning",
            RunState::MosaicReady => "mosaic_ready",
            RunState::Dispatching => "dispatching",
            RunState::Draining => "draining",
            RunState::Done => "done",
            RunState::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            RunState::Planning,
            RunState::MosaicReady,
            RunState::Dispatching,
            RunState::Draining,
            RunState::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_failed_reachable_from_non_terminal() {
        for state in [
            RunState::Planning,
            RunState::MosaicReady,
            RunState::Dispatching,
            RunState::Draining,
        ] {
            assert!(state.can_transition_to(RunState::Failed));
        }
        assert!(!RunState::Done.can_transition_to(RunState::Failed));
        assert!(!RunState::Failed.can_transition_to(RunState::Failed));
    }

    #[test]
    fn test_no_skipping_phases() {
        assert!(!RunState::Planning.can_transition_to(RunState::Dispatching));
        assert!(!RunState::Dispatching.can_transition_to(RunState::Done));
        assert!(!RunState::Done.can_transition_to(RunState::Planning));
    }

    #[test]
    fn test_terminal() {
        assert!(RunState::Done.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Draining.is_terminal());
    }
}
