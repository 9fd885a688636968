use regex::Regex;
use std::sync::LazyLock;

use crate::GitError;

// git@host:owner/name(.git)
static SSH_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^git@(?P<host>[^:/\s]+):(?P<owner>[^/\s]+)/(?P<name>[^/\s]+?)(?:\.git)?/?$")
        .expect("valid ssh url regex")
});

/// Only SSH style urls are accepted for assignment repositories.
pub fn is_ssh_url(url: &str) -> bool {
    url.starts_with("git@")
}

/// Splits `git@host:owner/name.git` into `(owner, name)`.
pub fn repo_owner_and_name(url: &str) -> Result<(String, String), GitError> {
    let caps = SSH_URL
        .captures(url.trim())
        .ok_or_else(|| GitError::UnsupportedUrlFormat(url.to_string()))?;
    Ok((caps["owner"].to_string(), caps["name"].to_string()))
}

fn repo_host(url: &str) -> Option<String> {
    SSH_URL.captures(url.trim()).map(|caps| caps["host"].to_string())
}

/// Page where a GitHub repository owner registers deploy keys. `None` for
/// repositories hosted elsewhere.
pub fn github_deploy_keys_url(url: &str) -> Option<String> {
    let host = repo_host(url)?;
    if !host.contains("github") {
        return None;
    }
    let (owner, name) = repo_owner_and_name(url).ok()?;
    Some(format!("https://github.com/{owner}/{name}/settings/keys"))
}
