//! Repair loop states and legal transitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A state of the guided repair loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Diagnosing,
    HypothesisSelected,
    Planning,
    Generating,
    Applying,
    Verifying,
    CycleSucceeded,
    HypothesisRejected,
    HypothesisExhausted,
    CycleAborted,
    SessionSucceeded,
    SessionFailed,
    SessionCancelled,
}

impl LoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Diagnosing => "diagnosing",
            LoopState::HypothesisSelected => "hypothesis_selected",
            LoopState::Planning => "planning",
            LoopState::Generating => "generating",
            LoopState::Applying => "applying",
            LoopState::Verifying => "verifying",
            LoopState::CycleSucceeded => "cycle_succeeded",
            LoopState::HypothesisRejected => "hypothesis_rejected",
            LoopState::HypothesisExhausted => "hypothesis_exhausted",
            LoopState::CycleAborted => "cycle_aborted",
            LoopState::SessionSucceeded => "session_succeeded",
            LoopState::SessionFailed => "session_failed",
            LoopState::SessionCancelled => "session_cancelled",
        }
    }

    /// Ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoopState::SessionSucceeded | LoopState::SessionFailed | LoopState::SessionCancelled
        )
    }

    /// Ends the current cycle.
    pub fn ends_cycle(&self) -> bool {
        matches!(
            self,
            LoopState::CycleSucceeded | LoopState::HypothesisExhausted | LoopState::CycleAborted
        )
    }

    /// Whether `next` may follow `self`.
    pub fn allows(&self, next: LoopState) -> bool {
        use LoopState::*;
        match self {
            Diagnosing => matches!(next, HypothesisSelected | CycleSucceeded | CycleAborted),
            HypothesisSelected => matches!(next, Planning | CycleAborted),
            Planning => matches!(next, Generating | HypothesisRejected | CycleAborted),
            Generating => matches!(next, Applying | HypothesisRejected | CycleAborted),
            Applying => matches!(next, Verifying | HypothesisRejected | CycleAborted),
            Verifying => matches!(next, CycleSucceeded | HypothesisRejected | CycleAborted),
            HypothesisRejected => {
                matches!(next, HypothesisSelected | HypothesisExhausted | CycleAborted)
            }
            CycleSucceeded => matches!(next, SessionSucceeded),
            HypothesisExhausted | CycleAborted => {
                matches!(next, Diagnosing | SessionFailed | SessionCancelled)
            }
            SessionSucceeded | SessionFailed | SessionCancelled => false,
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check that `path` is a walk through legal transitions.
pub fn is_valid_path(path: &[LoopState]) -> bool {
    path.windows(2).all(|pair| pair[0].allows(pair[1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use LoopState::*;

    #[test]
    fn test_happy_path_is_valid() {
        let path = [
            Diagnosing,
            HypothesisSelected,
            Planning,
            Generating,
            Applying,
            Verifying,
            CycleSucceeded,
            SessionSucceeded,
        ];
        assert!(is_valid_path(&path));
        assert!(SessionSucceeded.is_terminal());
    }

    #[test]
    fn test_rejection_loops_back_to_selection() {
        assert!(HypothesisRejected.allows(HypothesisSelected));
        assert!(HypothesisExhausted.allows(Diagnosing));
        assert!(!Applying.allows(CycleSucceeded));
        assert!(!SessionFailed.allows(Diagnosing));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&HypothesisExhausted).expect("serialize");
        assert_eq!(json, "\"hypothesis_exhausted\"");
        assert_eq!(CycleAborted.to_string(), "cycle_aborted");
    }
}
