use crate::agent_state::AgentState;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// RunKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// No prior agent context is loaded.
    Fresh,
    /// The previous run completed; its conversation and tool sessions are reused.
    Continuation,
}

impl RunKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RunKind::Fresh => "fresh",
            RunKind::Continuation => "continuation",
        }
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: RunKind,
    /// The latest run never completed and is superseded by this one. Callers
    /// warn the client and stop the old run before starting the new one.
    pub supersedes: bool,
}

/// Decide how a new message for a project is run, given the project's latest
/// agent state.
///
/// | latest                   | kind         | supersedes |
/// |--------------------------|--------------|------------|
/// | none                     | fresh        | no         |
/// | `completed = true`       | continuation | no         |
/// | `completed = false`      | fresh        | yes        |
///
/// Must be evaluated inside the same transaction that marks the new run
/// active, otherwise two dispatches can both observe the old state.
pub fn classify(latest: Option<&AgentState>) -> Classification {
    match latest {
        None => Classification {
            kind: RunKind::Fresh,
            supersedes: false,
        },
        Some(state) if state.completed => Classification {
            kind: RunKind::Continuation,
            supersedes: false,
        },
        Some(_) => Classification {
            kind: RunKind::Fresh,
            supersedes: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(active: bool, completed: bool) -> AgentState {
        let mut s = AgentState::new("demo");
        s.agent_is_active = active;
        s.completed = completed;
        s
    }

    #[test]
    fn no_prior_state_is_fresh() {
        let c = classify(None);
        assert_eq!(c.kind, RunKind::Fresh);
        assert!(!c.supersedes);
    }

    #[test]
    fn completed_state_continues() {
        let c = classify(Some(&state(false, true)));
        assert_eq!(c.kind, RunKind::Continuation);
        assert!(!c.supersedes);
    }

    #[test]
    fn active_unfinished_state_is_superseded() {
        let c = classify(Some(&state(true, false)));
        assert_eq!(c.kind, RunKind::Fresh);
        assert!(c.supersedes);
    }

    #[test]
    fn failed_state_is_superseded() {
        let c = classify(Some(&state(false, false)));
        assert_eq!(c.kind, RunKind::Fresh);
        assert!(c.supersedes);
    }

    #[test]
    fn run_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RunKind::Continuation).unwrap(),
            "\"continuation\""
        );
        assert_eq!(RunKind::Fresh.to_string(), "fresh");
    }
}
