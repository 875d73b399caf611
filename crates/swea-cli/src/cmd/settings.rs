use anyhow::{Context, Result};
use clap::Subcommand;

use crate::client::{ApiClient, DEFAULT_TIMEOUT};
use crate::output::print_json;

// ---------------------------------------------------------------------------
// Subcommand definition
// ---------------------------------------------------------------------------

#[derive(Subcommand, Debug)]
pub enum SettingsSubcommand {
    /// Show server settings (API keys masked)
    Get,
    /// Merge a JSON object into the server settings
    Set {
        /// e.g. '{"defaults": {"model": "openai/gpt-4o"}}'
        #[arg(value_name = "JSON")]
        patch: String,
    },
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn run(server: &str, subcommand: SettingsSubcommand, json: bool) -> Result<()> {
    let client = ApiClient::new(server, DEFAULT_TIMEOUT);
    match subcommand {
        SettingsSubcommand::Get => {
            let resp = client.get("/api/settings")?;
            print_json(&resp["settings"])
        }
        SettingsSubcommand::Set { patch } => {
            let patch: serde_json::Value =
                serde_json::from_str(&patch).context("settings must be valid JSON")?;
            anyhow::ensure!(patch.is_object(), "settings must be a JSON object");
            let resp = client.post("/api/settings", patch)?;
            if json {
                return print_json(&resp);
            }
            println!("{}", resp["message"].as_str().unwrap_or("Settings updated"));
            Ok(())
        }
    }
}
