//! Agent run dispatch and execution.
//!
//! Each project owns a slot guarded by an async mutex. `dispatch` holds that
//! lock while it records the user message, classifies the run and marks it
//! active (one redb transaction), cancels any run it supersedes and spawns the
//! new one. A finishing run re-acquires the same lock before it writes its
//! reply, so a run that has been cancelled never writes anything.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use swea_core::agent_state::{AgentState, AgentStateStore, RunStart};
use swea_core::classifier::RunKind;
use swea_core::config::Config;
use swea_core::project::{Message, Origin, ProjectStore};
use swea_core::search::SearchEngine;
use swea_core::SweaError;
use swea_llm::{ChatMessage, ChatOptions, LlmClient, LlmError};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::channel::{events, Channel, InfoKind};

/// Agent reply recorded when the provider call fails.
pub const SENTINEL_REPLY: &str = "[AI Error] Could not generate a response.";

/// Messages of project history sent with a continuation run.
pub const CONTEXT_WINDOW: usize = 40;

const SYSTEM_PROMPT: &str = "You are swea, an AI software engineer. \
Answer the user's engineering questions precisely, show code when it helps, \
and keep answers focused on the project at hand.";

const SUPERSEDE_WARNING: &str =
    "The previous agent task did not complete. Starting a new task for this message.";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub project_name: String,
    pub message: String,
    pub model_id: String,
    pub search_engine: SearchEngine,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerSettings {
    pub max_tokens: u32,
    pub inference_timeout: Duration,
}

impl RunnerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_tokens: config.inference.max_tokens,
            inference_timeout: Duration::from_secs(config.timeouts.inference_secs),
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of a run that reached its end without being cancelled.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub completed: bool,
    pub reply: Message,
    pub state: AgentState,
}

/// Handle returned by [`AgentRunner::dispatch`].
#[derive(Debug)]
pub struct RunTicket {
    pub run_id: Uuid,
    pub kind: RunKind,
    /// An unfinished earlier run was cancelled in favour of this one.
    pub superseded: bool,
    done: oneshot::Receiver<RunOutcome>,
}

impl RunTicket {
    /// Wait for the run to finish. `None` when it was cancelled by a newer
    /// dispatch or by [`AgentRunner::stop`].
    pub async fn wait(self) -> Option<RunOutcome> {
        self.done.await.ok()
    }
}

// ---------------------------------------------------------------------------
// AgentRunner
// ---------------------------------------------------------------------------

struct ActiveRun {
    run_id: Uuid,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Slot {
    active: Option<ActiveRun>,
}

struct Inner {
    projects: ProjectStore,
    states: AgentStateStore,
    channel: Channel,
    client: RwLock<Arc<dyn LlmClient>>,
    settings: RwLock<RunnerSettings>,
    slots: Mutex<HashMap<String, Arc<Mutex<Slot>>>>,
}

#[derive(Clone)]
pub struct AgentRunner {
    inner: Arc<Inner>,
}

impl AgentRunner {
    pub fn new(
        projects: ProjectStore,
        states: AgentStateStore,
        channel: Channel,
        client: Arc<dyn LlmClient>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                projects,
                states,
                channel,
                client: RwLock::new(client),
                settings: RwLock::new(settings),
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Replace the provider client. Runs already executing keep the old one.
    pub async fn set_client(&self, client: Arc<dyn LlmClient>) {
        *self.inner.client.write().await = client;
    }

    pub async fn set_settings(&self, settings: RunnerSettings) {
        *self.inner.settings.write().await = settings;
    }

    /// Record the user message and start a run for it in the background.
    ///
    /// Returns once the run is marked active and spawned. Validation and
    /// storage errors are returned here; provider errors never are, they end
    /// up in the run's reply and state.
    pub async fn dispatch(&self, req: DispatchRequest) -> anyhow::Result<RunTicket> {
        swea_core::paths::validate_project_name(&req.project_name)?;
        if req.message.trim().is_empty() {
            return Err(SweaError::Validation("message is required".to_string()).into());
        }
        if req.model_id.trim().is_empty() {
            return Err(SweaError::Validation("model is required".to_string()).into());
        }

        let project = req.project_name.clone();
        let run_id = Uuid::new_v4();
        let slot = self.slot(&project).await;
        let mut guard = slot.lock().await;

        let states = self.inner.states.clone();
        let begun = {
            let req = req.clone();
            blocking(move || {
                states.begin_run_with_message(
                    &req.project_name,
                    &req.message,
                    &RunStart {
                        run_id,
                        model_id: &req.model_id,
                        search_engine: req.search_engine,
                    },
                )
            })
            .await
        };
        let (classification, state) = match begun {
            Ok((_, classification, state)) => (classification, state),
            Err(e) => {
                if guard.active.is_none() {
                    self.inner.release_slot(&project, &slot).await;
                }
                return Err(e);
            }
        };

        if classification.supersedes {
            warn!(project = %project, run_id = %run_id, "previous run did not complete, superseding");
            self.inner
                .channel
                .emit_info(InfoKind::Warning, SUPERSEDE_WARNING);
        }

        if let Some(prev) = guard.active.take() {
            info!(project = %project, run_id = %prev.run_id, "cancelling previous run");
            prev.handle.abort();
            // Wait until the old future is dropped so its provider call is gone.
            let _ = prev.handle.await;
        }

        self.inner
            .channel
            .emit(events::AGENT_STATE, serde_json::to_value(&state)?);

        let (done_tx, done_rx) = oneshot::channel();
        let inner = self.inner.clone();
        let task_slot = slot.clone();
        let kind = classification.kind;
        let model = req.model_id.clone();
        let task_project = project.clone();
        info!(project = %project, run_id = %run_id, kind = %kind, model = %model, "starting run");
        let handle = tokio::spawn(async move {
            let reply = inner.execute(&task_project, run_id, kind, &model).await;
            inner
                .finish(&task_project, run_id, reply, &task_slot, done_tx)
                .await;
        });
        guard.active = Some(ActiveRun { run_id, handle });

        Ok(RunTicket {
            run_id,
            kind,
            superseded: classification.supersedes,
            done: done_rx,
        })
    }

    /// Cancel the project's active run. Returns `false` when nothing was running.
    ///
    /// A record still marked active with no task behind it (left by a
    /// process that died mid-run) is marked stopped as well.
    pub async fn stop(&self, project: &str) -> anyhow::Result<bool> {
        let slot = self.slot(project).await;
        let mut guard = slot.lock().await;
        let active = guard.active.take();
        let run_id = active.as_ref().map(|a| a.run_id);
        if let Some(active) = active {
            active.handle.abort();
            let _ = active.handle.await;
        }

        let states = self.inner.states.clone();
        let name = project.to_string();
        let stopped = blocking(move || match run_id {
            Some(run_id) => states.finish_run(&name, run_id, false, 0),
            None => states.abandon_run(&name),
        })
        .await;
        self.inner.release_slot(project, &slot).await;
        drop(guard);

        let state = stopped?;
        if let Some(state) = &state {
            self.inner
                .channel
                .emit(events::AGENT_STATE, serde_json::to_value(state)?);
        }
        match run_id {
            Some(run_id) => info!(project = %project, run_id = %run_id, "run stopped"),
            None if state.is_some() => {
                warn!(project = %project, "cleared active state with no running task")
            }
            None => return Ok(false),
        }
        Ok(true)
    }

    /// Whether the runner currently tracks a live task for `project`.
    pub async fn is_running(&self, project: &str) -> bool {
        let Some(slot) = self.inner.slots.lock().await.get(project).cloned() else {
            return false;
        };
        let guard = slot.lock().await;
        guard.active.is_some()
    }

    async fn slot(&self, project: &str) -> Arc<Mutex<Slot>> {
        let mut slots = self.inner.slots.lock().await;
        slots.entry(project.to_string()).or_default().clone()
    }
}

// ---------------------------------------------------------------------------
// Run execution
// ---------------------------------------------------------------------------

struct Reply {
    completed: bool,
    text: String,
    tokens_used: u64,
}

impl Inner {
    async fn execute(&self, project: &str, run_id: Uuid, kind: RunKind, model: &str) -> Reply {
        match self.call_provider(project, kind, model).await {
            Ok(response) => {
                let tokens_used = response.tokens_used();
                info!(
                    project = %project,
                    run_id = %run_id,
                    tokens = tokens_used,
                    "run completed"
                );
                Reply {
                    completed: true,
                    text: response.content,
                    tokens_used,
                }
            }
            Err(e) => {
                error!(project = %project, run_id = %run_id, error = %format!("{e:#}"), "run failed");
                self.channel
                    .emit_info(InfoKind::Error, format!("agent run failed: {e}"));
                Reply {
                    completed: false,
                    text: SENTINEL_REPLY.to_string(),
                    tokens_used: 0,
                }
            }
        }
    }

    async fn call_provider(
        &self,
        project: &str,
        kind: RunKind,
        model: &str,
    ) -> anyhow::Result<swea_llm::ChatResponse> {
        let projects = self.projects.clone();
        let name = project.to_string();
        let history = blocking(move || projects.list_messages(&name))
            .await?
            .ok_or_else(|| SweaError::ProjectNotFound(project.to_string()))?;

        let prompt = build_prompt(kind, &history);
        let client = self.client.read().await.clone();
        let settings = *self.settings.read().await;
        let options = ChatOptions {
            max_tokens: Some(settings.max_tokens),
            ..Default::default()
        };

        let response = tokio::time::timeout(
            settings.inference_timeout,
            client.chat_completion(model, &prompt, &options),
        )
        .await
        .map_err(|_| LlmError::Timeout)??;
        Ok(response)
    }

    /// Record the reply under the slot lock, unless a newer run took over.
    async fn finish(
        &self,
        project: &str,
        run_id: Uuid,
        reply: Reply,
        slot: &Arc<Mutex<Slot>>,
        done: oneshot::Sender<RunOutcome>,
    ) {
        let mut guard = slot.lock().await;
        if guard.active.as_ref().is_some_and(|a| a.run_id == run_id) {
            guard.active = None;
        }

        let states = self.states.clone();
        let name = project.to_string();
        let completed = reply.completed;
        let tokens = reply.tokens_used;
        let text = reply.text;
        let written = blocking(move || {
            states.finish_run_with_reply(&name, run_id, completed, tokens, &text)
        })
        .await;
        if guard.active.is_none() {
            self.release_slot(project, slot).await;
        }
        drop(guard);

        let (state, message) = match written {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                warn!(project = %project, run_id = %run_id, "run was superseded, reply discarded");
                return;
            }
            Err(e) => {
                error!(project = %project, run_id = %run_id, error = %format!("{e:#}"), "failed to record run result");
                self.channel
                    .emit_info(InfoKind::Error, format!("failed to record agent reply: {e}"));
                return;
            }
        };

        self.channel.emit(
            events::SERVER_MESSAGE,
            serde_json::json!({ "project_name": project, "message": message }),
        );
        if let Ok(value) = serde_json::to_value(&state) {
            self.channel.emit(events::AGENT_STATE, value);
        }
        self.channel.emit(
            events::TOKENS,
            serde_json::json!({ "project_name": project, "token_usage": state.token_usage }),
        );

        let _ = done.send(RunOutcome {
            run_id,
            completed,
            reply: message,
            state,
        });
    }

    /// Drop the project's slot when the caller's handle and the map hold the
    /// only references. Call with the slot lock held and no active run.
    async fn release_slot(&self, project: &str, slot: &Arc<Mutex<Slot>>) {
        let mut slots = self.slots.lock().await;
        let ours = slots.get(project).is_some_and(|s| Arc::ptr_eq(s, slot));
        if ours && Arc::strong_count(slot) == 2 {
            slots.remove(project);
        }
    }
}

/// Fresh runs see only the new message; continuations see recent history,
/// which already ends with the new message.
fn build_prompt(kind: RunKind, history: &[Message]) -> Vec<ChatMessage> {
    let context = match kind {
        RunKind::Fresh => &history[history.len().saturating_sub(1)..],
        RunKind::Continuation => &history[history.len().saturating_sub(CONTEXT_WINDOW)..],
    };
    std::iter::once(ChatMessage::system(SYSTEM_PROMPT))
        .chain(context.iter().map(|m| match m.origin {
            Origin::User => ChatMessage::user(m.text.clone()),
            Origin::Agent => ChatMessage::assistant(m.text.clone()),
        }))
        .collect()
}

async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> swea_core::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow::anyhow!("task join error: {e}"))?
        .map_err(Into::into)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
