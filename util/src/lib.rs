pub mod config;
pub mod execution_config;
pub mod logging;
pub mod paths;
pub mod test_helpers;
