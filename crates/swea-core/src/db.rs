//! Shared redb handle for the project and agent-state stores.
//!
//! # Table design
//!
//! Both tables are keyed by project name and hold a single JSON document per
//! project:
//! ```text
//! projects      name -> ProjectRecord { name, created_at, messages: [...] }
//! agent_states  name -> [AgentState, ...]   (oldest first, latest = last)
//! ```
//!
//! Every mutation is a read-modify-write inside one redb write transaction.
//! redb admits a single writer at a time and readers only see committed
//! transactions, so a reader never observes a half-written record and two
//! writers for the same project cannot lose each other's updates.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, TableDefinition};

use crate::error::{Result, SweaError};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

/// Key: project name. Value: JSON-encoded `ProjectRecord`.
pub(crate) const PROJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("projects");

/// Key: project name. Value: JSON-encoded `Vec<AgentState>`.
pub(crate) const AGENT_STATES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("agent_states");

// ---------------------------------------------------------------------------
// Open
// ---------------------------------------------------------------------------

/// Open or create the database at `path`, creating both tables so later read
/// transactions never hit a missing table.
pub fn open(path: &Path) -> Result<Arc<Database>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::create(path).map_err(db_err)?;
    let wt = db.begin_write().map_err(db_err)?;
    wt.open_table(PROJECTS).map_err(db_err)?;
    wt.open_table(AGENT_STATES).map_err(db_err)?;
    wt.commit().map_err(db_err)?;
    Ok(Arc::new(db))
}

/// Map any redb error into `SweaError::Storage`.
pub(crate) fn db_err(e: impl Into<redb::Error>) -> SweaError {
    SweaError::Storage(e.into().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_creates_parent_dirs_and_is_reopenable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".swea/swea.db");
        {
            let _db = open(&path).unwrap();
        }
        assert!(path.exists());
        open(&path).unwrap();
    }
}
