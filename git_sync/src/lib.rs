//! Git synchronization for assignment repositories.
//!
//! [`GitClient`] clones and pulls teacher repositories over SSH using the
//! `git` command line, authenticating exclusively with the key-pair generated
//! for the assignment by [`key_pair::generate_key_pair`].

mod error;
pub mod git_client;
pub mod key_pair;
pub mod repo_url;

use async_trait::async_trait;
use std::path::Path;

pub use error::GitError;
pub use git_client::{CommitInfo, GitClient, GitConfig};
pub use key_pair::KeyPair;

/// Repository synchronization operations needed by the assignment flows.
#[async_trait]
pub trait GitSync: Send + Sync {
    /// Clones `remote_url` into `destination`, which must be missing or empty.
    /// Returns the head commit, or `None` when the remote has no commits yet.
    async fn clone_repository(
        &self,
        remote_url: &str,
        destination: &Path,
        private_key: Option<&[u8]>,
    ) -> Result<Option<CommitInfo>, GitError>;

    /// Fast-forwards `destination` to the remote's current head.
    async fn pull(&self, destination: &Path, private_key: &[u8]) -> Result<CommitInfo, GitError>;

    async fn last_commit_info(&self, destination: &Path) -> Result<Option<CommitInfo>, GitError>;
}
