//! Client progress as an explicit state machine.
//!
//! ```text
//! Idle ─▶ Discovering ─▶ Joining ─▶ Joined ─▶ CallInFlight ─▶ Done
//!   └──────────┴────────────┴──────────┴────────────┴──────▶ Failed
//! ```
//!
//! Only the arrows above are legal. Every accepted transition is appended
//! to the history, so a finished run can be checked after the fact.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    Idle,
    Discovering,
    Joining,
    Joined,
    CallInFlight,
    Done,
    Failed,
}

impl ClientState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ClientState::Done | ClientState::Failed)
    }

    fn can_advance_to(self, next: ClientState) -> bool {
        use ClientState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, Discovering)
            | (Discovering, Joining)
            | (Joining, Joined)
            | (Joined, CallInFlight)
            | (CallInFlight, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClientState::Idle => "idle",
            ClientState::Discovering => "discovering",
            ClientState::Joining => "joining",
            ClientState::Joined => "joined",
            ClientState::CallInFlight => "call-in-flight",
            ClientState::Done => "done",
            ClientState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A transition the machine refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal client state transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: ClientState,
    pub to: ClientState,
}

#[derive(Debug, Clone)]
pub struct ClientStateMachine {
    history: Vec<ClientState>,
}

impl ClientStateMachine {
    pub fn new() -> Self {
        Self {
            history: vec![ClientState::Idle],
        }
    }

    pub fn state(&self) -> ClientState {
        self.history
            .last()
            .copied()
            .unwrap_or(ClientState::Idle)
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[ClientState] {
        &self.history
    }

    pub fn advance(&mut self, next: ClientState) -> Result<(), IllegalTransition> {
        let from = self.state();
        if !from.can_advance_to(next) {
            return Err(IllegalTransition { from, to: next });
        }
        tracing::debug!(%from, to = %next, "client state");
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed` unless already terminal.
    pub fn fail(&mut self) {
        if !self.state().is_terminal() {
            self.history.push(ClientState::Failed);
        }
    }
}

impl Default for ClientStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
