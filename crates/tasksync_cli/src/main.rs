//! Maintenance entry point for a task store file.
//!
//! Usage: `tasksync_cli <db-path> [--files DIR] [--log-dir DIR] [TASK_ID ...]`
//!
//! With task ids, releases their resources and removes their media rows,
//! then purges local tombstones and drains released references. Without
//! ids, only the purge and drain run.

use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tasksync_core::db::open_db;
use tasksync_core::{
    default_log_level, init_logging, CleanupCoordinator, EngineConfig, ExternalResources,
    LocalFileStore, TaskId,
};

/// Releases resources of deleted tasks and purges local tombstones.
#[derive(Parser, Debug)]
#[command(name = "tasksync_cli", version, about, long_about = None)]
struct Args {
    /// Task store database file
    db_path: PathBuf,

    /// Directory attachment and comment media resolve against
    /// (defaults to the database's directory)
    #[arg(long = "files", value_name = "DIR")]
    files_dir: Option<PathBuf>,

    /// Absolute directory for rolling log files; logging is off when omitted
    #[arg(long, value_name = "DIR")]
    log_dir: Option<String>,

    /// Ids of tasks whose external resources should be released
    #[arg(value_name = "TASK_ID")]
    task_ids: Vec<TaskId>,
}

fn run(args: Args) -> Result<(), String> {
    if let Some(log_dir) = &args.log_dir {
        init_logging(default_log_level(), log_dir)?;
    }

    let conn = open_db(&args.db_path).map_err(|err| err.to_string())?;
    let files_dir = args.files_dir.unwrap_or_else(|| {
        args.db_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default()
    });
    let resources = ExternalResources::files_only(Arc::new(LocalFileStore::new(files_dir)));
    let coordinator = CleanupCoordinator::try_new(&conn, resources, &EngineConfig::default())
        .map_err(|err| err.to_string())?;
    let report = coordinator
        .cleanup(&args.task_ids)
        .map_err(|err| err.to_string())?;

    info!("event=cli_cleanup module=cli status=ok");
    println!("tasks_processed={}", report.tasks_processed);
    println!("release_failures={}", report.release_failures);
    println!("purged={}", report.purged.len());
    println!("drained={}", report.drained);
    Ok(())
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Args;
    use clap::Parser;

    #[test]
    fn parses_path_flags_and_ids() {
        let parsed =
            Args::try_parse_from(["tasksync_cli", "tasks.db", "--files=media", "7", "9"]).unwrap();
        assert_eq!(parsed.db_path.to_str(), Some("tasks.db"));
        assert_eq!(parsed.files_dir.unwrap().to_str(), Some("media"));
        assert_eq!(parsed.task_ids, vec![7, 9]);
        assert!(parsed.log_dir.is_none());

        let parsed =
            Args::try_parse_from(["tasksync_cli", "--log-dir", "/var/log/tasks", "tasks.db"])
                .unwrap();
        assert_eq!(parsed.log_dir.as_deref(), Some("/var/log/tasks"));
        assert!(parsed.task_ids.is_empty());
    }

    #[test]
    fn rejects_missing_path_and_bad_ids() {
        assert!(Args::try_parse_from(["tasksync_cli"]).is_err());
        assert!(Args::try_parse_from(["tasksync_cli", "tasks.db", "seven"]).is_err());
        assert!(Args::try_parse_from(["tasksync_cli", "tasks.db", "--files"]).is_err());
    }
}
