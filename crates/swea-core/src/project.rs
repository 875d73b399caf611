use crate::db::{db_err, PROJECTS};
use crate::error::{Result, SweaError};
use crate::paths::validate_project_name;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub origin: Origin,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(origin: Origin, text: impl Into<String>) -> Self {
        Self {
            origin,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_from_agent(&self) -> bool {
        self.origin == Origin::Agent
    }
}

// ---------------------------------------------------------------------------
// ProjectRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ProjectRecord {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectStore
// ---------------------------------------------------------------------------

/// Named projects and their append-only message logs.
#[derive(Clone)]
pub struct ProjectStore {
    db: Arc<Database>,
}

impl ProjectStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create `name` if it does not exist. Returns `true` when a new project
    /// was created and `false` when it already existed.
    pub fn create_project(&self, name: &str) -> Result<bool> {
        validate_project_name(name)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        let created = create_in(&wt, name)?;
        wt.commit().map_err(db_err)?;
        Ok(created)
    }

    /// Remove a project and its messages. Fails with `ProjectNotFound` when absent.
    pub fn delete_project(&self, name: &str) -> Result<()> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let removed = {
            let mut table = wt.open_table(PROJECTS).map_err(db_err)?;
            let removed = table.remove(name).map_err(db_err)?.is_some();
            removed
        };
        if !removed {
            wt.abort().map_err(db_err)?;
            return Err(SweaError::ProjectNotFound(name.to_string()));
        }
        wt.commit().map_err(db_err)?;
        tracing::info!(project = %name, "project deleted");
        Ok(())
    }

    pub fn project_exists(&self, name: &str) -> Result<bool> {
        Ok(self.load(name)?.is_some())
    }

    pub fn append_user_message(&self, name: &str, text: &str) -> Result<Message> {
        self.append(name, Message::new(Origin::User, text))
    }

    pub fn append_agent_message(&self, name: &str, text: &str) -> Result<Message> {
        self.append(name, Message::new(Origin::Agent, text))
    }

    /// Messages in chronological order. `None` means the project does not
    /// exist; an existing project without messages yields `Some(vec![])`.
    pub fn list_messages(&self, name: &str) -> Result<Option<Vec<Message>>> {
        Ok(self.load(name)?.map(|p| p.messages))
    }

    /// All project names, sorted.
    pub fn list_projects(&self) -> Result<Vec<String>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(PROJECTS).map_err(db_err)?;
        let mut names = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (k, _) = entry.map_err(db_err)?;
            names.push(k.value().to_string());
        }
        // redb iterates in key order already; keep the contract explicit.
        names.sort();
        Ok(names)
    }

    fn load(&self, name: &str) -> Result<Option<ProjectRecord>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(PROJECTS).map_err(db_err)?;
        let Some(guard) = table.get(name).map_err(db_err)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(guard.value())?))
    }

    fn append(&self, name: &str, message: Message) -> Result<Message> {
        let wt = self.db.begin_write().map_err(db_err)?;
        match append_in(&wt, name, message) {
            Ok(message) => {
                wt.commit().map_err(db_err)?;
                Ok(message)
            }
            Err(e) => {
                wt.abort().map_err(db_err)?;
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction-scoped writes
// ---------------------------------------------------------------------------

/// Insert an empty record for `name` unless one exists. The caller commits.
pub(crate) fn create_in(wt: &WriteTransaction, name: &str) -> Result<bool> {
    let mut table = wt.open_table(PROJECTS).map_err(db_err)?;
    if table.get(name).map_err(db_err)?.is_some() {
        return Ok(false);
    }
    let value = serde_json::to_vec(&ProjectRecord::new(name))?;
    table.insert(name, value.as_slice()).map_err(db_err)?;
    tracing::info!(project = %name, "project created");
    Ok(true)
}

/// Append `message` to an existing project. The caller commits, or aborts on
/// `ProjectNotFound`.
pub(crate) fn append_in(wt: &WriteTransaction, name: &str, message: Message) -> Result<Message> {
    let mut table = wt.open_table(PROJECTS).map_err(db_err)?;
    let existing = table.get(name).map_err(db_err)?.map(|g| g.value().to_vec());
    let Some(bytes) = existing else {
        return Err(SweaError::ProjectNotFound(name.to_string()));
    };
    let mut record: ProjectRecord = serde_json::from_slice(&bytes)?;
    record.messages.push(message.clone());
    let value = serde_json::to_vec(&record)?;
    table.insert(name, value.as_slice()).map_err(db_err)?;
    Ok(message)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ProjectStore) {
        let dir = TempDir::new().unwrap();
        let db = crate::db::open(&dir.path().join("test.db")).unwrap();
        (dir, ProjectStore::new(db))
    }

    #[test]
    fn create_project_is_idempotent() {
        let (_dir, store) = store();
        assert!(store.create_project("demo").unwrap());
        assert!(!store.create_project("demo").unwrap());
        assert_eq!(store.list_projects().unwrap(), vec!["demo".to_string()]);
    }

    #[test]
    fn create_keeps_existing_messages() {
        let (_dir, store) = store();
        store.create_project("demo").unwrap();
        store.append_user_message("demo", "hello").unwrap();
        store.create_project("demo").unwrap();
        assert_eq!(store.list_messages("demo").unwrap().unwrap().len(), 1);
    }

    #[test]
    fn create_rejects_invalid_name() {
        let (_dir, store) = store();
        assert!(matches!(
            store.create_project("a/b"),
            Err(SweaError::InvalidProjectName(_))
        ));
    }

    #[test]
    fn append_to_missing_project_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.append_user_message("ghost", "hi"),
            Err(SweaError::ProjectNotFound(_))
        ));
        assert!(matches!(
            store.append_agent_message("ghost", "hi"),
            Err(SweaError::ProjectNotFound(_))
        ));
        // The failed append must not have created the project.
        assert!(!store.project_exists("ghost").unwrap());
    }

    #[test]
    fn missing_project_is_distinct_from_empty() {
        let (_dir, store) = store();
        assert_eq!(store.list_messages("ghost").unwrap(), None);
        store.create_project("empty").unwrap();
        assert_eq!(store.list_messages("empty").unwrap(), Some(vec![]));
    }

    #[test]
    fn messages_keep_insertion_order() {
        let (_dir, store) = store();
        store.create_project("demo").unwrap();
        for i in 0..3 {
            store.append_user_message("demo", &format!("q{i}")).unwrap();
            store.append_agent_message("demo", &format!("a{i}")).unwrap();
        }
        let messages = store.list_messages("demo").unwrap().unwrap();
        let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["q0", "a0", "q1", "a1", "q2", "a2"]);
        assert!(messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(messages[0].origin, Origin::User);
        assert!(messages[1].is_from_agent());
    }

    #[test]
    fn earlier_messages_are_never_rewritten() {
        let (_dir, store) = store();
        store.create_project("demo").unwrap();
        let first = store.append_user_message("demo", "first").unwrap();
        store.append_agent_message("demo", "second").unwrap();
        let messages = store.list_messages("demo").unwrap().unwrap();
        assert_eq!(messages[0], first);
    }

    #[test]
    fn list_projects_sorted() {
        let (_dir, store) = store();
        for name in ["zeta", "alpha", "Mid Project"] {
            store.create_project(name).unwrap();
        }
        assert_eq!(
            store.list_projects().unwrap(),
            vec!["Mid Project", "alpha", "zeta"]
        );
    }

    #[test]
    fn delete_project() {
        let (_dir, store) = store();
        store.create_project("demo").unwrap();
        store.delete_project("demo").unwrap();
        assert!(store.list_projects().unwrap().is_empty());
        assert!(matches!(
            store.delete_project("demo"),
            Err(SweaError::ProjectNotFound(_))
        ));
    }

    #[test]
    fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        {
            let store = ProjectStore::new(crate::db::open(&path).unwrap());
            store.create_project("demo").unwrap();
            store.append_user_message("demo", "persisted").unwrap();
        }
        let store = ProjectStore::new(crate::db::open(&path).unwrap());
        let messages = store.list_messages("demo").unwrap().unwrap();
        assert_eq!(messages[0].text, "persisted");
    }
}
