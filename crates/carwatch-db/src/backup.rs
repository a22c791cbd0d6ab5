//! Point-in-time database backups via `pg_dump`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::{DateTime, Utc};

use crate::DbError;

/// File name for a dump taken at `at`: `dump_YYYYMMDD_HHMMSS.dump`.
#[must_use]
pub fn dump_file_name(at: DateTime<Utc>) -> String {
    format!("dump_{}.dump", at.format("%Y%m%d_%H%M%S"))
}

/// Writes a custom-format `pg_dump` of `database_url` into `dumps_dir`.
///
/// The directory is created when missing. Returns the path of the new dump.
///
/// # Errors
///
/// - [`DbError::Io`] if the directory cannot be created or `pg_dump` cannot
///   be spawned.
/// - [`DbError::Backup`] if `pg_dump` exits unsuccessfully; carries its
///   exit code and stderr.
pub async fn create_dump(database_url: &str, dumps_dir: &Path) -> Result<PathBuf, DbError> {
    tokio::fs::create_dir_all(dumps_dir).await?;
    let output_path = dumps_dir.join(dump_file_name(Utc::now()));
    tracing::info!(path = %output_path.display(), "backup: creating database dump");

    let output = tokio::process::Command::new("pg_dump")
        .arg("--format=custom")
        .arg("--file")
        .arg(&output_path)
        .arg("--dbname")
        .arg(database_url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(DbError::Backup {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    tracing::info!(path = %output_path.display(), "backup: dump created");
    Ok(output_path)
}
