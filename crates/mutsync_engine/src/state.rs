//! Lifecycle state of a dispatch operation.

use std::fmt;

/// The lifecycle state of a [`MutationOperation`](crate::MutationOperation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationState {
    /// Built but not started.
    Created,
    /// Running the upload/submit/classify pipeline.
    Executing,
    /// Cancelled before it ever started.
    Cancelled,
    /// Terminal.
    Finished,
}

impl OperationState {
    /// Returns true once the operation can make no further progress.
    pub fn is_finished(&self) -> bool {
        matches!(self, OperationState::Finished)
    }

    /// Returns true while an attempt chain is running.
    pub fn is_executing(&self) -> bool {
        matches!(self, OperationState::Executing)
    }

    /// Returns true if `start` may still begin execution from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, OperationState::Created)
    }

    /// Returns true if moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: OperationState) -> bool {
        use OperationState::*;
        matches!(
            (self, next),
            (Created, Executing)
                | (Created, Cancelled)
                | (Created, Finished)
                | (Cancelled, Finished)
                | (Executing, Finished)
        )
    }

    fn as_str(&self) -> &'static str {
        match self {
            OperationState::Created => "created",
            OperationState::Executing => "executing",
            OperationState::Cancelled => "cancelled",
            OperationState::Finished => "finished",
        }
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_checks() {
        assert!(OperationState::Created.can_start());
        assert!(!OperationState::Cancelled.can_start());
        assert!(!OperationState::Executing.can_start());
        assert!(!OperationState::Finished.can_start());

        assert!(OperationState::Executing.is_executing());
        assert!(OperationState::Finished.is_finished());
        assert!(!OperationState::Cancelled.is_finished());
    }

    #[test]
    fn transitions() {
        use OperationState::*;
        assert!(Created.can_transition_to(Executing));
        assert!(Created.can_transition_to(Cancelled));
        assert!(Cancelled.can_transition_to(Finished));
        assert!(Executing.can_transition_to(Finished));

        assert!(!Cancelled.can_transition_to(Executing));
        assert!(!Finished.can_transition_to(Executing));
        assert!(!Executing.can_transition_to(Created));
        assert!(!Finished.can_transition_to(Finished));
    }

    #[test]
    fn display() {
        assert_eq!(OperationState::Executing.to_string(), "executing");
        assert_eq!(OperationState::Finished.to_string(), "finished");
    }
}
