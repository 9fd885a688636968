//! Turning a synced teacher repository into a verdict: copy it into a
//! mavenized working directory, run the build in isolation, parse what the
//! build tool printed and apply the assignment's acceptance rules.

pub mod build_report;
mod error;
pub mod executor;
pub mod materialize;
pub mod validate_files;

pub use build_report::{BuildReport, UnitTestOutcome};
pub use error::RunnerError;
pub use executor::{BuildExecutor, MavenExecutor};
pub use materialize::{CopyPolicy, build_package_tree, instructions_fragment, materialize};
pub use validate_files::{Rejection, Validation, ValidationPolicy, check_assignment_files, validate};
