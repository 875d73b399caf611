use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use swea_core::agent_state::AgentStateStore;
use swea_core::config::Config;
use swea_core::project::ProjectStore;
use swea_llm::{LlmClient, OpenRouterClient};
use tokio::sync::RwLock;

use crate::channel::Channel;
use crate::runner::{AgentRunner, RunnerSettings};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub config: Arc<RwLock<Config>>,
    pub projects: ProjectStore,
    pub states: AgentStateStore,
    pub channel: Channel,
    pub runner: AgentRunner,
}

impl AppState {
    /// Load config, open the store under `root` and build the OpenRouter client.
    pub fn new(root: PathBuf) -> anyhow::Result<Self> {
        let config = Config::load(&root)?;
        let client = provider_client(&config)?;
        Self::build(root, config, client)
    }

    /// Same as [`AppState::new`] with an explicit provider client.
    pub fn with_client(root: PathBuf, client: Arc<dyn LlmClient>) -> anyhow::Result<Self> {
        let config = Config::load(&root)?;
        Self::build(root, config, client)
    }

    fn build(root: PathBuf, config: Config, client: Arc<dyn LlmClient>) -> anyhow::Result<Self> {
        let db = swea_core::db::open(&swea_core::paths::db_path(&root))?;
        let projects = ProjectStore::new(db.clone());
        let states = AgentStateStore::new(db);
        let channel = Channel::default();
        let runner = AgentRunner::new(
            projects.clone(),
            states.clone(),
            channel.clone(),
            client,
            RunnerSettings::from_config(&config),
        );
        Ok(Self {
            root,
            config: Arc::new(RwLock::new(config)),
            projects,
            states,
            channel,
            runner,
        })
    }
}

/// OpenRouter client configured from `config`. A missing API key is allowed;
/// runs then fail with a provider error.
pub fn provider_client(config: &Config) -> anyhow::Result<Arc<dyn LlmClient>> {
    let client = OpenRouterClient::new(
        config.openrouter_api_key(),
        config.api_endpoints.openrouter.clone(),
        Duration::from_secs(config.timeouts.inference_secs),
    )?;
    if !client.has_api_key() {
        tracing::warn!(
            "no OpenRouter API key configured; set api_keys.openrouter or {}",
            swea_core::config::OPENROUTER_KEY_ENV
        );
    }
    Ok(Arc::new(client))
}
