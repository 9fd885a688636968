use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("Repository is unreachable: {0}")]
    RepositoryUnreachable(String),

    #[error("Repository requires authentication: {0}")]
    AuthenticationRequired(String),

    #[error("Destination {} already exists and is not empty", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Repository has no commits yet")]
    NoCommitsYet,

    #[error("Git transport error: {0}")]
    Transport(String),

    #[error("Unsupported repository url '{0}': only SSH style urls (git@host:owner/name.git) are accepted")]
    UnsupportedUrlFormat(String),

    #[error("{} is not a git working copy", .0.display())]
    MissingWorkingCopy(PathBuf),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
