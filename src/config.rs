//! Runtime configuration resolved from flags, environment and `$HOME`.

use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::logging::LogFormat;

const DATA_DIR: &str = ".sprintboard";
const DB_FILE: &str = "board.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    /// Team id or name for team-scoped commands.
    pub team: Option<String>,
    pub log_format: LogFormat,
}

/// `$HOME/.sprintboard/board.json`, or relative to the working directory
/// when `HOME` is unset.
pub fn default_db_path(home: Option<&str>) -> PathBuf {
    PathBuf::from(home.unwrap_or(".")).join(DATA_DIR).join(DB_FILE)
}

impl Config {
    /// Fill in defaults for anything the command line left out.
    pub fn resolve(db: Option<PathBuf>, team: Option<String>, log_format: LogFormat) -> Config {
        let db_path = db.unwrap_or_else(|| default_db_path(std::env::var("HOME").ok().as_deref()));
        let team = team.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        Config { db_path, team, log_format }
    }

    /// Create the database's parent directory if it does not exist yet.
    pub fn ensure_data_dir(&self) -> Result<(), StoreError> {
        let Some(dir) = self.db_path.parent().filter(|d| !d.as_os_str().is_empty()) else {
            return Ok(());
        };
        std::fs::create_dir_all(dir).map_err(|source| StoreError::Io { path: dir.to_path_buf(), source })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_lives_under_home() {
        assert_eq!(default_db_path(Some("/home/ana")), PathBuf::from("/home/ana/.sprintboard/board.json"));
        assert_eq!(default_db_path(None), PathBuf::from("./.sprintboard/board.json"));
    }

    #[test]
    fn explicit_db_wins_and_blank_team_is_dropped() {
        let cfg = Config::resolve(Some("/tmp/x.json".into()), Some("  ".into()), LogFormat::Json);
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/x.json"));
        assert_eq!(cfg.team, None);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn creates_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::resolve(Some(dir.path().join("a/b/board.json")), None, LogFormat::Text);
        cfg.ensure_data_dir().unwrap();
        assert!(dir.path().join("a/b").is_dir());
    }

    #[test]
    fn bare_file_name_needs_no_dir() {
        let cfg = Config::resolve(Some("board.json".into()), Some("Core".into()), LogFormat::Text);
        assert!(cfg.ensure_data_dir().is_ok());
        assert_eq!(cfg.team.as_deref(), Some("Core"));
    }
}
