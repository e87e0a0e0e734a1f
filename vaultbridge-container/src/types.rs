//! Container session data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Running,
    Exited,
    Removed,
}

impl SessionState {
    /// `created → running → {exited | removed}`, `exited → removed`,
    /// `created → removed` on start failure; `removed` is terminal.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Created, Running) | (Running, Exited) | (Running, Removed) | (Created, Removed) | (Exited, Removed)
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContainerSession {
    pub id: String,
    pub image: String,
    pub scopes_used: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub state: SessionState,
}

impl ContainerSession {
    pub fn new(id: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image: image.into(),
            scopes_used: Vec::new(),
            created_at: Utc::now(),
            state: SessionState::Created,
        }
    }

    /// Applies a state transition, returning `false` (no-op) if it is not
    /// legal per the session state machine.
    pub fn transition(&mut self, next: SessionState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions() {
        let mut s = ContainerSession::new("c1", "busybox");
        assert!(s.transition(SessionState::Running));
        assert!(s.transition(SessionState::Exited));
        assert!(s.transition(SessionState::Removed));
    }

    #[test]
    fn created_can_go_straight_to_removed_on_start_failure() {
        let mut s = ContainerSession::new("c1", "busybox");
        assert!(s.transition(SessionState::Removed));
    }

    #[test]
    fn removed_is_terminal() {
        let mut s = ContainerSession::new("c1", "busybox");
        s.transition(SessionState::Removed);
        assert!(!s.transition(SessionState::Running));
        assert!(!s.transition(SessionState::Exited));
    }

    #[test]
    fn cannot_skip_running_to_create_a_shortcut_other_than_removed() {
        let s = SessionState::Created;
        assert!(!s.can_transition_to(SessionState::Exited));
    }
}
