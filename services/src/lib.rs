//! Assignment orchestration: registration, git synchronization, validation
//! and lifecycle of teacher assignments.

pub mod access;
pub mod assignment_service;
pub mod error;
pub mod forms;
pub mod state;
pub mod sync_lock;

pub use access::{can_access, can_manage};
pub use assignment_service::{
    AssignmentDetail, AssignmentService, AssignmentSummary, ConnectOutcome, GitSetup, RefreshOutcome, RegisterOutcome,
};
pub use error::AppError;
pub use forms::AssignmentForm;
pub use state::AssignmentState;
pub use sync_lock::{SyncGuard, SyncLocks};
