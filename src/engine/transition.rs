use std::fmt;

use super::model::BoardState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Move,
    Update,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Move => "move",
            TransitionKind::Update => "update",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a committed update or move did to the issue's board placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub issue_id: String,
    pub project_id: String,
    pub old_state: BoardState,
    pub new_state: BoardState,
    pub actor_id: String,
    pub version: i32,
    pub kind: TransitionKind,
}

/// Receives committed transitions for activity logs, notifications and
/// webhooks. Called after commit; implementations must not block and their
/// failures never undo the write.
pub trait TransitionSink: Send + Sync {
    fn record_transition(&self, transition: &Transition);
}

/// Drops every transition.
pub struct NoopSink;

impl TransitionSink for NoopSink {
    fn record_transition(&self, _transition: &Transition) {}
}
