use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Where the build command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerKind {
    /// A local `sh -c` in its own process group.
    Local,
    /// A throwaway `docker run --rm --network=none` container.
    Docker,
}

impl FromStr for RunnerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(RunnerKind::Local),
            "docker" => Ok(RunnerKind::Docker),
            other => Err(format!("unknown build runner '{other}'")),
        }
    }
}

/// Limits and command used for one build+test run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_build_command")]
    pub build_command: String,

    #[serde(default = "default_runner")]
    pub runner: RunnerKind,

    #[serde(default = "default_docker_image")]
    pub docker_image: String,
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            build_command: default_build_command(),
            runner: default_runner(),
            docker_image: default_docker_image(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    180
}

fn default_build_command() -> String {
    "mvn -B clean test".to_string()
}

fn default_runner() -> RunnerKind {
    RunnerKind::Local
}

fn default_docker_image() -> String {
    "maven:3-eclipse-temurin-17".to_string()
}
