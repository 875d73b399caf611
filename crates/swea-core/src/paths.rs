use crate::error::{Result, SweaError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const SWEA_DIR: &str = ".swea";
pub const LOGS_DIR: &str = ".swea/logs";

pub const CONFIG_FILE: &str = ".swea/config.yaml";
pub const DB_FILE: &str = ".swea/swea.db";
pub const LOG_FILE: &str = ".swea/logs/swea.log";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn swea_dir(root: &Path) -> PathBuf {
    root.join(SWEA_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn db_path(root: &Path) -> PathBuf {
    root.join(DB_FILE)
}

pub fn logs_dir(root: &Path) -> PathBuf {
    root.join(LOGS_DIR)
}

pub fn log_path(root: &Path) -> PathBuf {
    root.join(LOG_FILE)
}

// ---------------------------------------------------------------------------
// Project name validation
// ---------------------------------------------------------------------------

pub const MAX_PROJECT_NAME_LEN: usize = 128;

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[^\p{Cc}/\\]+$").unwrap())
}

/// Project names are human-readable, so spaces and unicode are fine. Leading or
/// trailing whitespace, control characters and path separators are not.
pub fn validate_project_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.trim() != name
        || name.chars().count() > MAX_PROJECT_NAME_LEN
        || !name_re().is_match(name)
    {
        return Err(SweaError::InvalidProjectName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in ["demo", "My Project", "todo-app_2", "приложение", "a"] {
            validate_project_name(name).unwrap_or_else(|_| panic!("expected valid: {name}"));
        }
    }

    #[test]
    fn invalid_names() {
        let too_long = "x".repeat(MAX_PROJECT_NAME_LEN + 1);
        for name in [
            "",
            " padded",
            "padded ",
            "a/b",
            "a\\b",
            "tab\there",
            "new\nline",
            too_long.as_str(),
        ] {
            assert!(validate_project_name(name).is_err(), "expected invalid: {name:?}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/ws");
        assert_eq!(config_path(root), PathBuf::from("/tmp/ws/.swea/config.yaml"));
        assert_eq!(db_path(root), PathBuf::from("/tmp/ws/.swea/swea.db"));
        assert_eq!(log_path(root), PathBuf::from("/tmp/ws/.swea/logs/swea.log"));
    }
}
