//! Restore state machine
//!
//! NOT_STARTED → DEFINITION_CREATED → VERSIONS_CREATING → {COMPLETED | PARTIALLY_COMPLETED}
//!
//! with NOT_STARTED → ABORTED when the definition cannot be created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of one definition's restore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestoreState {
    NotStarted,
    DefinitionCreated,
    /// Creating versions, `created` of `total` so far
    VersionsCreating,
    /// Every version created
    Completed,
    /// Some versions failed or were never attempted
    PartiallyCompleted,
    /// The definition step failed; nothing was created
    Aborted,
}

impl RestoreState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RestoreState::Completed | RestoreState::PartiallyCompleted | RestoreState::Aborted
        )
    }

    /// Check if transition from this state to target is valid
    pub fn can_transition_to(&self, target: RestoreState) -> bool {
        match (self, target) {
            (RestoreState::NotStarted, RestoreState::DefinitionCreated) => true,
            (RestoreState::NotStarted, RestoreState::Aborted) => true,

            (RestoreState::DefinitionCreated, RestoreState::VersionsCreating) => true,
            // Cancelled before the first version
            (RestoreState::DefinitionCreated, RestoreState::PartiallyCompleted) => true,

            (RestoreState::VersionsCreating, RestoreState::Completed) => true,
            (RestoreState::VersionsCreating, RestoreState::PartiallyCompleted) => true,

            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RestoreStateError {
    #[error("Invalid restore transition from {from:?} to {to:?}")]
    InvalidTransition { from: RestoreState, to: RestoreState },
}

/// Progress of one restore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreProgress {
    pub state: RestoreState,
    /// Versions created so far
    pub created: usize,
    /// Versions in the bundle
    pub total: usize,
    pub updated_at: DateTime<Utc>,
}

impl RestoreProgress {
    pub fn new(total: usize) -> Self {
        Self {
            state: RestoreState::NotStarted,
            created: 0,
            total,
            updated_at: Utc::now(),
        }
    }

    pub fn transition(&mut self, new_state: RestoreState) -> Result<(), RestoreStateError> {
        if !self.state.can_transition_to(new_state) {
            return Err(RestoreStateError::InvalidTransition {
                from: self.state,
                to: new_state,
            });
        }
        self.state = new_state;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn record_created(&mut self) {
        self.created += 1;
        self.updated_at = Utc::now();
    }

    /// `Completed` if every version was created, else `PartiallyCompleted`
    pub fn finish(&mut self) -> Result<(), RestoreStateError> {
        let terminal = if self.state == RestoreState::VersionsCreating && self.created == self.total {
            RestoreState::Completed
        } else {
            RestoreState::PartiallyCompleted
        };
        self.transition(terminal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut progress = RestoreProgress::new(2);
        progress.transition(RestoreState::DefinitionCreated).unwrap();
        progress.transition(RestoreState::VersionsCreating).unwrap();
        progress.record_created();
        progress.record_created();
        progress.finish().unwrap();
        assert_eq!(progress.state, RestoreState::Completed);
        assert!(progress.state.is_terminal());
    }

    #[test]
    fn test_partial() {
        let mut progress = RestoreProgress::new(3);
        progress.transition(RestoreState::DefinitionCreated).unwrap();
        progress.transition(RestoreState::VersionsCreating).unwrap();
        progress.record_created();
        progress.finish().unwrap();
        assert_eq!(progress.state, RestoreState::PartiallyCompleted);
    }

    #[test]
    fn test_cancelled_before_versions() {
        let mut progress = RestoreProgress::new(3);
        progress.transition(RestoreState::DefinitionCreated).unwrap();
        progress.finish().unwrap();
        assert_eq!(progress.state, RestoreState::PartiallyCompleted);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut progress = RestoreProgress::new(1);
        assert!(progress.transition(RestoreState::Completed).is_err());
        assert!(progress.transition(RestoreState::VersionsCreating).is_err());

        progress.transition(RestoreState::Aborted).unwrap();
        assert!(progress.transition(RestoreState::DefinitionCreated).is_err());
        assert!(progress.finish().is_err());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&RestoreState::PartiallyCompleted).unwrap();
        assert_eq!(json, "\"PARTIALLY_COMPLETED\"");
    }
}
