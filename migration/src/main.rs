use std::{fs, path::Path};
use tracing::info;
use util::config::AppConfig;
use util::logging::init_logging;

mod runner;

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();
    let _log_guard = init_logging(&config);
    info!("Starting {} migrations ({})", config.project_name, config.env);
    let db_path = config.database_path.clone();
    let url = format!("sqlite://{}?mode=rwc", db_path);

    match std::env::args().nth(1).as_deref() {
        Some("clean") => {
            clean(&config);
        }
        Some("fresh") => {
            clean(&config);
            create_db_dir(&db_path);
            runner::run_all_migrations(&url).await;
        }
        _ => {
            create_db_dir(&db_path);
            runner::run_all_migrations(&url).await;
        }
    }
}

fn clean(config: &AppConfig) {
    let db_path = Path::new(&config.database_path);
    if db_path.exists() {
        fs::remove_file(db_path).expect("Failed to delete DB file");
        println!("Deleted DB: {}", db_path.display());
    } else {
        println!("DB file does not exist: {}", db_path.display());
    }

    let paths = config.storage_paths();
    for (label, root) in [
        ("assignment repositories", paths.assignments_root()),
        ("mavenized projects", paths.mavenized_root()),
    ] {
        if root.exists() {
            fs::remove_dir_all(root).unwrap_or_else(|e| panic!("Failed to delete {label}: {e}"));
            println!("Deleted {}: {}", label, root.display());
        } else {
            println!("Storage for {} does not exist: {}", label, root.display());
        }
    }
}

fn create_db_dir(path: &str) {
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent).expect("Failed to create DB directory");
    }
}
