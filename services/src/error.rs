use code_runner::{Rejection, RunnerError};
use git_sync::GitError;
use sea_orm::DbErr;
use thiserror::Error;

/// Errors surfaced by the assignment flows. Every variant renders a message
/// that can be shown to the teacher as is.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad input, reported against the offending form field.
    #[error("{message}")]
    Validation { field: String, message: String },

    #[error("Assignment {0} can only be managed by its owner or authorized teachers")]
    AccessDenied(String),

    #[error("Assignment {0} can only be changed by its owner")]
    OwnerOnly(String),

    #[error("Assignment {0} not found")]
    NotFound(String),

    /// The operation would break an invariant of a stored assignment.
    #[error("{0}")]
    Integrity(String),

    #[error("Assignment {0} has no git credentials yet. Generate them first")]
    MissingKeyPair(String),

    #[error("Can't mark assignment as active since it is not connected to a git repository.")]
    NotConnected(String),

    #[error("{0}")]
    Rejected(Rejection),

    #[error("Error cloning {url} - {source}")]
    Clone {
        url: String,
        #[source]
        source: GitError,
    },

    #[error("{}", pull_failure_message(.url, .source))]
    Pull {
        url: String,
        #[source]
        source: GitError,
    },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Db(#[from] DbErr),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Form field the error belongs to, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            AppError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

fn pull_failure_message(url: &str, source: &GitError) -> String {
    match source {
        GitError::NoCommitsYet => {
            format!("Error pulling from {url}. Probably you don't have any commits yet.")
        }
        _ => format!("Error pulling from {url}"),
    }
}
