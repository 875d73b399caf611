use crate::classifier::{classify, Classification, RunKind};
use crate::db::{db_err, AGENT_STATES};
use crate::error::Result;
use crate::project::{self, Message, Origin};
use crate::search::SearchEngine;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Older records beyond this count are dropped on write.
pub const MAX_HISTORY: usize = 100;

// ---------------------------------------------------------------------------
// AgentState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub project_name: String,
    pub agent_is_active: bool,
    pub completed: bool,
    pub token_usage: u64,
    pub browser_session: Option<serde_json::Value>,
    pub terminal_session: Option<serde_json::Value>,
    /// Run that appended this record; `None` for records created directly.
    #[serde(default)]
    pub run_id: Option<Uuid>,
    #[serde(default)]
    pub run_kind: Option<RunKind>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub search_engine: Option<SearchEngine>,
    pub updated_at: DateTime<Utc>,
}

impl AgentState {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            agent_is_active: false,
            completed: false,
            token_usage: 0,
            browser_session: None,
            terminal_session: None,
            run_id: None,
            run_kind: None,
            model_id: None,
            search_engine: None,
            updated_at: Utc::now(),
        }
    }
}

/// Parameters of a run being started.
#[derive(Debug, Clone)]
pub struct RunStart<'a> {
    pub run_id: Uuid,
    pub model_id: &'a str,
    pub search_engine: SearchEngine,
}

// ---------------------------------------------------------------------------
// AgentStateStore
// ---------------------------------------------------------------------------

/// Per-project history of agent status records. The last record is the
/// project's latest state.
#[derive(Clone)]
pub struct AgentStateStore {
    db: Arc<Database>,
}

impl AgentStateStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Latest record, or `None` when the project never had one. Unknown
    /// projects are not an error.
    pub fn get_latest(&self, project: &str) -> Result<Option<AgentState>> {
        Ok(self.history(project)?.pop())
    }

    /// All retained records, oldest first.
    pub fn history(&self, project: &str) -> Result<Vec<AgentState>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(AGENT_STATES).map_err(db_err)?;
        let Some(guard) = table.get(project).map_err(db_err)? else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_slice(guard.value())?)
    }

    pub fn is_agent_active(&self, project: &str) -> Result<bool> {
        Ok(self
            .get_latest(project)?
            .is_some_and(|s| s.agent_is_active))
    }

    /// `true` when no state exists, so a first message may always start a run.
    pub fn is_agent_completed(&self, project: &str) -> Result<bool> {
        Ok(self.get_latest(project)?.map_or(true, |s| s.completed))
    }

    pub fn get_latest_token_usage(&self, project: &str) -> Result<u64> {
        Ok(self.get_latest(project)?.map_or(0, |s| s.token_usage))
    }

    // -----------------------------------------------------------------------
    // Point mutators
    // -----------------------------------------------------------------------

    /// Append a default record and return it.
    pub fn create(&self, project: &str) -> Result<AgentState> {
        self.write(project, |history| {
            let state = AgentState::new(project);
            history.push(state.clone());
            state
        })
    }

    pub fn update_active(&self, project: &str, active: bool) -> Result<AgentState> {
        self.update_latest(project, |s| s.agent_is_active = active)
    }

    pub fn update_completed(&self, project: &str, completed: bool) -> Result<AgentState> {
        self.update_latest(project, |s| s.completed = completed)
    }

    pub fn set_token_usage(&self, project: &str, tokens: u64) -> Result<AgentState> {
        self.update_latest(project, |s| s.token_usage = tokens)
    }

    pub fn set_browser_session(
        &self,
        project: &str,
        session: Option<serde_json::Value>,
    ) -> Result<AgentState> {
        self.update_latest(project, |s| s.browser_session = session)
    }

    pub fn set_terminal_session(
        &self,
        project: &str,
        session: Option<serde_json::Value>,
    ) -> Result<AgentState> {
        self.update_latest(project, |s| s.terminal_session = session)
    }

    /// Drop every record for `project`.
    pub fn clear(&self, project: &str) -> Result<()> {
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(AGENT_STATES).map_err(db_err)?;
            table.remove(project).map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Run lifecycle
    // -----------------------------------------------------------------------

    /// Classify the next run and mark it active in one write transaction.
    ///
    /// A continuation inherits the previous record's browser and terminal
    /// sessions; a fresh run starts without them. Token usage is cumulative
    /// per project and always carries forward.
    pub fn begin_run(
        &self,
        project: &str,
        run: &RunStart<'_>,
    ) -> Result<(Classification, AgentState)> {
        self.transact(|wt| Self::begin_in(wt, project, run))
    }

    /// Like [`begin_run`](Self::begin_run), but also creates the project if
    /// needed and appends the user's message. All of it commits together or
    /// not at all.
    pub fn begin_run_with_message(
        &self,
        project: &str,
        text: &str,
        run: &RunStart<'_>,
    ) -> Result<(Message, Classification, AgentState)> {
        self.transact(|wt| {
            project::create_in(wt, project)?;
            let message = project::append_in(wt, project, Message::new(Origin::User, text))?;
            let (classification, state) = Self::begin_in(wt, project, run)?;
            Ok((message, classification, state))
        })
    }

    /// Mark the run `run_id` finished. Only applies when that run still owns
    /// the latest record; returns the updated record, or `None` when a newer
    /// run has taken over.
    pub fn finish_run(
        &self,
        project: &str,
        run_id: Uuid,
        completed: bool,
        tokens_used: u64,
    ) -> Result<Option<AgentState>> {
        self.transact(|wt| Self::finish_in(wt, project, run_id, completed, tokens_used))
    }

    /// Finish the run and append the agent's reply in one transaction, so a
    /// finished record is never visible without its reply. `None` (and no
    /// reply written) when a newer run owns the latest record.
    pub fn finish_run_with_reply(
        &self,
        project: &str,
        run_id: Uuid,
        completed: bool,
        tokens_used: u64,
        reply: &str,
    ) -> Result<Option<(AgentState, Message)>> {
        self.transact(|wt| {
            let Some(state) = Self::finish_in(wt, project, run_id, completed, tokens_used)? else {
                return Ok(None);
            };
            let message = project::append_in(wt, project, Message::new(Origin::Agent, reply))?;
            Ok(Some((state, message)))
        })
    }

    /// Mark an active latest record as stopped without completing. Used for
    /// runs no live task stands behind, e.g. after a crash. Returns the
    /// updated record, or `None` when nothing was active.
    pub fn abandon_run(&self, project: &str) -> Result<Option<AgentState>> {
        self.write(project, |history| match history.last_mut() {
            Some(latest) if latest.agent_is_active => {
                latest.agent_is_active = false;
                latest.completed = false;
                latest.updated_at = Utc::now();
                Some(latest.clone())
            }
            _ => None,
        })
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn update_latest(
        &self,
        project: &str,
        apply: impl FnOnce(&mut AgentState),
    ) -> Result<AgentState> {
        self.write(project, |history| {
            if history.is_empty() {
                history.push(AgentState::new(project));
            }
            let last = history.len() - 1;
            let latest = &mut history[last];
            apply(latest);
            latest.updated_at = Utc::now();
            latest.clone()
        })
    }

    /// Read-modify-write of a project's history inside one write transaction.
    fn write<T>(&self, project: &str, f: impl FnOnce(&mut Vec<AgentState>) -> T) -> Result<T> {
        self.transact(|wt| Self::write_in(wt, project, f))
    }

    /// Run `f` in a write transaction: commit on `Ok`, abort on `Err`.
    fn transact<T>(&self, f: impl FnOnce(&WriteTransaction) -> Result<T>) -> Result<T> {
        let wt = self.db.begin_write().map_err(db_err)?;
        match f(&wt) {
            Ok(out) => {
                wt.commit().map_err(db_err)?;
                Ok(out)
            }
            Err(e) => {
                wt.abort().map_err(db_err)?;
                Err(e)
            }
        }
    }

    fn begin_in(
        wt: &WriteTransaction,
        project: &str,
        run: &RunStart<'_>,
    ) -> Result<(Classification, AgentState)> {
        Self::write_in(wt, project, |history| {
            let latest = history.last();
            let classification = classify(latest);
            let mut next = AgentState::new(project);
            next.agent_is_active = true;
            next.completed = false;
            next.run_id = Some(run.run_id);
            next.run_kind = Some(classification.kind);
            next.model_id = Some(run.model_id.to_string());
            next.search_engine = Some(run.search_engine);
            if let Some(prev) = latest {
                next.token_usage = prev.token_usage;
                if classification.kind == RunKind::Continuation {
                    next.browser_session = prev.browser_session.clone();
                    next.terminal_session = prev.terminal_session.clone();
                }
            }
            history.push(next.clone());
            (classification, next)
        })
    }

    fn finish_in(
        wt: &WriteTransaction,
        project: &str,
        run_id: Uuid,
        completed: bool,
        tokens_used: u64,
    ) -> Result<Option<AgentState>> {
        Self::write_in(wt, project, |history| match history.last_mut() {
            Some(latest) if latest.run_id == Some(run_id) => {
                latest.agent_is_active = false;
                latest.completed = completed;
                latest.token_usage = latest.token_usage.saturating_add(tokens_used);
                latest.updated_at = Utc::now();
                Some(latest.clone())
            }
            _ => None,
        })
    }

    fn write_in<T>(
        wt: &WriteTransaction,
        project: &str,
        f: impl FnOnce(&mut Vec<AgentState>) -> T,
    ) -> Result<T> {
        let mut table = wt.open_table(AGENT_STATES).map_err(db_err)?;
        let existing = table
            .get(project)
            .map_err(db_err)?
            .map(|g| g.value().to_vec());
        let mut history: Vec<AgentState> = match existing {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => Vec::new(),
        };
        let out = f(&mut history);
        if history.len() > MAX_HISTORY {
            history.drain(..history.len() - MAX_HISTORY);
        }
        if history.is_empty() {
            table.remove(project).map_err(db_err)?;
        } else {
            let value = serde_json::to_vec(&history)?;
            table.insert(project, value.as_slice()).map_err(db_err)?;
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, AgentStateStore) {
        let dir = TempDir::new().unwrap();
        let db = crate::db::open(&dir.path().join("test.db")).unwrap();
        (dir, AgentStateStore::new(db))
    }

    fn start(id: Uuid) -> RunStart<'static> {
        RunStart {
            run_id: id,
            model_id: "openai/gpt-4o-mini",
            search_engine: SearchEngine::Google,
        }
    }

    #[test]
    fn unknown_project_defaults() {
        let (_dir, store) = store();
        assert_eq!(store.get_latest("ghost").unwrap(), None);
        assert!(!store.is_agent_active("ghost").unwrap());
        assert!(store.is_agent_completed("ghost").unwrap());
        assert_eq!(store.get_latest_token_usage("ghost").unwrap(), 0);
        assert!(store.history("ghost").unwrap().is_empty());
    }

    #[test]
    fn create_appends_default_record() {
        let (_dir, store) = store();
        let s = store.create("demo").unwrap();
        assert!(!s.agent_is_active);
        assert!(!s.completed);
        assert_eq!(store.get_latest("demo").unwrap(), Some(s));
        assert!(!store.is_agent_completed("demo").unwrap());
    }

    #[test]
    fn mutators_target_latest_record() {
        let (_dir, store) = store();
        store.create("demo").unwrap();
        store.create("demo").unwrap();
        store.update_active("demo", true).unwrap();
        store.set_token_usage("demo", 42).unwrap();
        store
            .set_browser_session("demo", Some(serde_json::json!({"url": "https://example.com"})))
            .unwrap();
        store
            .set_terminal_session("demo", Some(serde_json::json!({"cwd": "/tmp"})))
            .unwrap();
        store.update_completed("demo", true).unwrap();

        let history = store.history("demo").unwrap();
        assert_eq!(history.len(), 2);
        assert!(!history[0].agent_is_active);
        assert_eq!(history[0].token_usage, 0);
        assert!(history[0].browser_session.is_none());
        let latest = &history[1];
        assert!(latest.agent_is_active);
        assert!(latest.completed);
        assert_eq!(latest.token_usage, 42);
        assert_eq!(latest.browser_session.as_ref().unwrap()["url"], "https://example.com");
        assert_eq!(latest.terminal_session.as_ref().unwrap()["cwd"], "/tmp");
        assert!(store.is_agent_active("demo").unwrap());
        assert_eq!(store.get_latest_token_usage("demo").unwrap(), 42);
    }

    #[test]
    fn mutator_without_record_creates_one() {
        let (_dir, store) = store();
        let s = store.set_token_usage("demo", 7).unwrap();
        assert_eq!(s.token_usage, 7);
        assert_eq!(store.history("demo").unwrap().len(), 1);
    }

    #[test]
    fn begin_run_on_empty_project_is_fresh_and_active() {
        let (_dir, store) = store();
        let id = Uuid::new_v4();
        let (c, state) = store.begin_run("demo", &start(id)).unwrap();
        assert_eq!(c.kind, RunKind::Fresh);
        assert!(!c.supersedes);
        assert!(state.agent_is_active);
        assert!(!state.completed);
        assert_eq!(state.run_id, Some(id));
        assert_eq!(state.search_engine, Some(SearchEngine::Google));
        assert_eq!(store.get_latest("demo").unwrap(), Some(state));
    }

    #[test]
    fn continuation_inherits_sessions_and_tokens() {
        let (_dir, store) = store();
        let first = Uuid::new_v4();
        store.begin_run("demo", &start(first)).unwrap();
        store
            .set_browser_session("demo", Some(serde_json::json!({"tab": 1})))
            .unwrap();
        store.finish_run("demo", first, true, 100).unwrap();

        let (c, state) = store.begin_run("demo", &start(Uuid::new_v4())).unwrap();
        assert_eq!(c.kind, RunKind::Continuation);
        assert_eq!(state.token_usage, 100);
        assert_eq!(state.browser_session, Some(serde_json::json!({"tab": 1})));
    }

    #[test]
    fn fresh_run_after_failure_drops_sessions() {
        let (_dir, store) = store();
        let first = Uuid::new_v4();
        store.begin_run("demo", &start(first)).unwrap();
        store
            .set_terminal_session("demo", Some(serde_json::json!({"pid": 9})))
            .unwrap();
        store.finish_run("demo", first, false, 10).unwrap();

        let (c, state) = store.begin_run("demo", &start(Uuid::new_v4())).unwrap();
        assert_eq!(c.kind, RunKind::Fresh);
        assert!(c.supersedes);
        assert_eq!(state.terminal_session, None);
        assert_eq!(state.token_usage, 10);
    }

    #[test]
    fn begin_run_while_active_supersedes() {
        let (_dir, store) = store();
        store.begin_run("demo", &start(Uuid::new_v4())).unwrap();
        let (c, _) = store.begin_run("demo", &start(Uuid::new_v4())).unwrap();
        assert_eq!(c.kind, RunKind::Fresh);
        assert!(c.supersedes);
    }

    #[test]
    fn finish_run_marks_inactive_and_adds_tokens() {
        let (_dir, store) = store();
        let id = Uuid::new_v4();
        store.begin_run("demo", &start(id)).unwrap();
        let done = store.finish_run("demo", id, true, 25).unwrap().unwrap();
        assert!(!done.agent_is_active);
        assert!(done.completed);
        assert_eq!(done.token_usage, 25);
    }

    #[test]
    fn finish_run_of_superseded_run_is_ignored() {
        let (_dir, store) = store();
        let old = Uuid::new_v4();
        let new = Uuid::new_v4();
        store.begin_run("demo", &start(old)).unwrap();
        store.begin_run("demo", &start(new)).unwrap();

        assert!(store.finish_run("demo", old, true, 999).unwrap().is_none());
        let latest = store.get_latest("demo").unwrap().unwrap();
        assert_eq!(latest.run_id, Some(new));
        assert!(latest.agent_is_active);
        assert_eq!(latest.token_usage, 0);
    }

    #[test]
    fn begin_run_with_message_records_both() {
        let (_dir, store) = store();
        let projects = crate::project::ProjectStore::new(store.db.clone());
        let id = Uuid::new_v4();
        let (message, c, state) = store
            .begin_run_with_message("demo", "hello", &start(id))
            .unwrap();
        assert_eq!(message.text, "hello");
        assert_eq!(c.kind, RunKind::Fresh);
        assert!(state.agent_is_active);
        assert_eq!(projects.list_messages("demo").unwrap().unwrap(), vec![message]);
    }

    #[test]
    fn finish_run_with_reply_commits_state_and_reply_together() {
        let (_dir, store) = store();
        let projects = crate::project::ProjectStore::new(store.db.clone());
        let id = Uuid::new_v4();
        store.begin_run_with_message("demo", "hello", &start(id)).unwrap();

        let (state, reply) = store
            .finish_run_with_reply("demo", id, true, 12, "hi there")
            .unwrap()
            .unwrap();
        assert!(state.completed);
        assert_eq!(state.token_usage, 12);
        assert!(reply.is_from_agent());
        let messages = projects.list_messages("demo").unwrap().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], reply);
    }

    #[test]
    fn finish_run_with_reply_for_missing_project_writes_nothing() {
        let (_dir, store) = store();
        let id = Uuid::new_v4();
        store.begin_run("ghost", &start(id)).unwrap();

        let err = store
            .finish_run_with_reply("ghost", id, true, 12, "hi")
            .unwrap_err();
        assert!(matches!(err, crate::SweaError::ProjectNotFound(_)));
        // The state change was rolled back with the failed append.
        let latest = store.get_latest("ghost").unwrap().unwrap();
        assert!(latest.agent_is_active);
        assert!(!latest.completed);
        assert_eq!(latest.token_usage, 0);
    }

    #[test]
    fn finish_run_with_reply_of_superseded_run_writes_no_reply() {
        let (_dir, store) = store();
        let projects = crate::project::ProjectStore::new(store.db.clone());
        let old = Uuid::new_v4();
        store.begin_run_with_message("demo", "one", &start(old)).unwrap();
        store
            .begin_run_with_message("demo", "two", &start(Uuid::new_v4()))
            .unwrap();

        assert!(store
            .finish_run_with_reply("demo", old, true, 5, "late")
            .unwrap()
            .is_none());
        let messages = projects.list_messages("demo").unwrap().unwrap();
        assert!(messages.iter().all(|m| !m.is_from_agent()));
    }

    #[test]
    fn abandon_run_clears_orphaned_active_record() {
        let (_dir, store) = store();
        store.begin_run("demo", &start(Uuid::new_v4())).unwrap();
        assert!(store.is_agent_active("demo").unwrap());

        let state = store.abandon_run("demo").unwrap().unwrap();
        assert!(!state.agent_is_active);
        assert!(!state.completed);
        assert!(!store.is_agent_active("demo").unwrap());
        assert!(store.abandon_run("demo").unwrap().is_none());
        assert!(store.abandon_run("ghost").unwrap().is_none());
    }

    #[test]
    fn history_is_trimmed() {
        let (_dir, store) = store();
        for _ in 0..MAX_HISTORY + 5 {
            store.create("demo").unwrap();
        }
        assert_eq!(store.history("demo").unwrap().len(), MAX_HISTORY);
    }

    #[test]
    fn clear_removes_history() {
        let (_dir, store) = store();
        store.create("demo").unwrap();
        store.clear("demo").unwrap();
        assert_eq!(store.get_latest("demo").unwrap(), None);
    }

    #[test]
    fn projects_are_independent() {
        let (_dir, store) = store();
        store.begin_run("a", &start(Uuid::new_v4())).unwrap();
        assert!(store.is_agent_active("a").unwrap());
        assert!(!store.is_agent_active("b").unwrap());
    }

    #[test]
    fn concurrent_writers_do_not_lose_updates() {
        let (_dir, store) = store();
        store.create("demo").unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        store.create("demo").unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.history("demo").unwrap().len(), 81);
    }
}
