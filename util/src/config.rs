//! Application configuration.
//!
//! `AppConfig` is loaded once from `.env` and the process environment by the
//! binary that hosts the core. Components never read the environment
//! themselves: the binary converts the loaded values into [`StoragePaths`] and
//! [`ExecutionConfig`] and hands those to constructors.

use std::env;
use std::time::Duration;

use crate::execution_config::{ExecutionConfig, RunnerKind};
use crate::paths::StoragePaths;

/// Complete configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub assignments_root: String,
    pub mavenized_root: String,
    pub build_timeout_secs: u64,
    pub build_command: String,
    pub build_runner: RunnerKind,
    pub build_docker_image: String,
    pub git_timeout_secs: u64,
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Panics if a required variable is missing or a numeric one is malformed.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "assignment-sync".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "assignment-sync.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            database_path: env::var("DATABASE_PATH").expect("DATABASE_PATH is required"),
            assignments_root: env::var("ASSIGNMENTS_ROOT").expect("ASSIGNMENTS_ROOT is required"),
            mavenized_root: env::var("MAVENIZED_ROOT").expect("MAVENIZED_ROOT is required"),
            build_timeout_secs: env::var("BUILD_TIMEOUT_SECS")
                .unwrap_or_else(|_| "180".into())
                .parse()
                .expect("BUILD_TIMEOUT_SECS must be a number of seconds"),
            build_command: env::var("BUILD_COMMAND").unwrap_or_else(|_| "mvn -B clean test".into()),
            build_runner: env::var("BUILD_RUNNER")
                .unwrap_or_else(|_| "local".into())
                .parse()
                .expect("BUILD_RUNNER must be 'local' or 'docker'"),
            build_docker_image: env::var("BUILD_DOCKER_IMAGE")
                .unwrap_or_else(|_| "maven:3-eclipse-temurin-17".into()),
            git_timeout_secs: env::var("GIT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".into())
                .parse()
                .expect("GIT_TIMEOUT_SECS must be a number of seconds"),
        }
    }

    pub fn storage_paths(&self) -> StoragePaths {
        StoragePaths::new(&self.assignments_root, &self.mavenized_root)
    }

    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            timeout_secs: self.build_timeout_secs,
            build_command: self.build_command.clone(),
            runner: self.build_runner,
            docker_image: self.build_docker_image.clone(),
        }
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }
}
