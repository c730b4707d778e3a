//! Pipeline phases and the events emitted as they run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four ordered pipeline phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Prevention,
    Detection,
    AutoFix,
    Final,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Prevention => "prevention",
            Phase::Detection => "detection",
            Phase::AutoFix => "autofix",
            Phase::Final => "final",
        }
    }

    /// Phase order of every run.
    pub fn order() -> [Phase; 4] {
        [Phase::Prevention, Phase::Detection, Phase::AutoFix, Phase::Final]
    }

    /// Zero-based position, used by progress displays.
    pub fn index(&self) -> usize {
        match self {
            Phase::Prevention => 0,
            Phase::Detection => 1,
            Phase::AutoFix => 2,
            Phase::Final => 3,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Running(Phase),
    Complete,
    Error,
    Cancelled,
}

impl Default for RunState {
    fn default() -> Self {
        Self::Pending
    }
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Complete | RunState::Error | RunState::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseEventKind {
    Started,
    Completed,
    Failed,
}

/// A phase transition, emitted when it actually happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseEvent {
    pub run_id: Uuid,
    pub phase: Phase,
    pub kind: PhaseEventKind,
    /// Unix epoch milliseconds
    pub timestamp_ms: i64,
    /// Time spent in the phase so far
    pub elapsed_ms: u64,
}

impl PhaseEvent {
    pub fn new(run_id: Uuid, phase: Phase, kind: PhaseEventKind, elapsed_ms: u64) -> Self {
        Self {
            run_id,
            phase,
            kind,
            timestamp_ms: Utc::now().timestamp_millis(),
            elapsed_ms,
        }
    }
}

/// Timing of one completed (or failed) phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTiming {
    pub phase: Phase,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub succeeded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order_matches_index() {
        for (i, phase) in Phase::order().iter().enumerate() {
            assert_eq!(phase.index(), i);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RunState::Running(Phase::Detection).is_terminal());
        assert!(RunState::Cancelled.is_terminal());
        assert!(RunState::Error.is_terminal());
    }
}
