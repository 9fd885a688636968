use db::models::assignment;
use serde::Serialize;

/// Lifecycle position of an assignment, derived from what is stored and
/// from the presence of its working directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssignmentState {
    /// No working copy on disk; git access has to be set up and connected.
    NeedsAuth,
    /// Synced but never validated.
    Cloned,
    Valid,
    Invalid,
    Active,
    Archived,
}

impl AssignmentState {
    pub fn derive(assignment: &assignment::Model, working_dir_exists: bool) -> Self {
        if assignment.archived {
            AssignmentState::Archived
        } else if assignment.active {
            AssignmentState::Active
        } else if !working_dir_exists {
            AssignmentState::NeedsAuth
        } else {
            match assignment.last_validation_ok {
                Some(true) => AssignmentState::Valid,
                Some(false) => AssignmentState::Invalid,
                None => AssignmentState::Cloned,
            }
        }
    }
}
