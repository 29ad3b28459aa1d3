//! Finite State Machine for one update cycle

use serde::{Deserialize, Serialize};

/// Update cycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePhase {
    /// Cycle not started
    Pending,

    /// Waiting for the device to come online
    WaitOnline,

    /// Waiting for a running update to finish
    WaitIdle,

    /// Picking the target version
    ResolveTarget,

    /// Asking the backend to start the update
    StartUpdate,

    /// Waiting for the backend to report the outcome
    WaitCompletion,

    /// Waiting before the next attempt
    Backoff,

    /// Update confirmed
    Succeeded,

    /// No eligible target version
    NothingToDo,

    /// Retry budget exhausted or target could not be resolved
    Failed,
}

/// Update cycle event
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    /// Begin the cycle
    Begin,

    /// Device is reachable
    Online,

    /// No update is running
    Idle,

    /// A target version was chosen
    TargetResolved,

    /// Nothing to update to
    NoTarget,

    /// Target resolution failed
    ResolveFailed(String),

    /// Backend accepted the start request
    UpdateStarted,

    /// Update finished and the version was confirmed
    Completed,

    /// Attempt failed, either starting or while running
    AttemptFailed(String),

    /// Backoff elapsed
    Retry,
}

/// Update cycle FSM
///
/// Owns the retry budget: every entry into `StartUpdate` consumes one attempt.
#[derive(Debug, Clone)]
pub struct UpdateFsm {
    phase: UpdatePhase,
    error: Option<String>,
    attempts: u32,
    max_attempts: u32,
}

impl UpdateFsm {
    /// Create a new FSM; a budget of zero still allows one attempt
    pub fn new(max_attempts: u32) -> Self {
        Self {
            phase: UpdatePhase::Pending,
            error: None,
            attempts: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Get current phase
    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    /// Get error message of the last failed attempt
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Attempt budget for this cycle
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt is allowed
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Process an event and transition phase
    pub fn process(&mut self, event: UpdateEvent) -> Result<UpdatePhase, String> {
        let new_phase = match (self.phase, &event) {
            (UpdatePhase::Pending, UpdateEvent::Begin) => UpdatePhase::WaitOnline,

            (UpdatePhase::WaitOnline, UpdateEvent::Online) => UpdatePhase::WaitIdle,

            (UpdatePhase::WaitIdle, UpdateEvent::Idle) => UpdatePhase::ResolveTarget,

            // From ResolveTarget
            (UpdatePhase::ResolveTarget, UpdateEvent::TargetResolved) => {
                self.attempts += 1;
                UpdatePhase::StartUpdate
            }
            (UpdatePhase::ResolveTarget, UpdateEvent::NoTarget) => UpdatePhase::NothingToDo,
            (UpdatePhase::ResolveTarget, UpdateEvent::ResolveFailed(err)) => {
                self.error = Some(err.clone());
                UpdatePhase::Failed
            }

            // From StartUpdate
            (UpdatePhase::StartUpdate, UpdateEvent::UpdateStarted) => UpdatePhase::WaitCompletion,

            // From WaitCompletion
            (UpdatePhase::WaitCompletion, UpdateEvent::Completed) => {
                self.error = None;
                UpdatePhase::Succeeded
            }

            // Attempt failures
            (UpdatePhase::StartUpdate | UpdatePhase::WaitCompletion, UpdateEvent::AttemptFailed(err)) => {
                self.error = Some(err.clone());
                if self.can_retry() {
                    UpdatePhase::Backoff
                } else {
                    UpdatePhase::Failed
                }
            }

            // From Backoff
            (UpdatePhase::Backoff, UpdateEvent::Retry) => {
                self.attempts += 1;
                UpdatePhase::StartUpdate
            }

            // Invalid transitions
            (phase, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", phase, event));
            }
        };

        self.phase = new_phase;
        Ok(new_phase)
    }
}
