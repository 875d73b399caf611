use anyhow::Result;

use crate::client::{ApiClient, DEFAULT_TIMEOUT};
use crate::output::print_json;

pub fn state(server: &str, project: &str, json: bool) -> Result<()> {
    let client = ApiClient::new(server, DEFAULT_TIMEOUT);
    let resp = client.post_project("/api/get-agent-state", project)?;
    let state = &resp["state"];
    if json {
        return print_json(state);
    }
    if state.is_null() {
        println!("No agent state recorded for '{project}'.");
        return Ok(());
    }
    let flag = |key: &str| state[key].as_bool().unwrap_or(false);
    let text = |key: &str| state[key].as_str().unwrap_or("-").to_string();
    println!("Project:        {project}");
    println!("Active:         {}", flag("agent_is_active"));
    println!("Completed:      {}", flag("completed"));
    println!("Run:            {} ({})", text("run_id"), text("run_kind"));
    println!("Model:          {}", text("model_id"));
    println!("Search engine:  {}", text("search_engine"));
    println!("Token usage:    {}", state["token_usage"]);
    println!("Updated:        {}", text("updated_at"));
    Ok(())
}

pub fn tokens(server: &str, project: &str, json: bool) -> Result<()> {
    let client = ApiClient::new(server, DEFAULT_TIMEOUT);
    let resp = client.get_query("/api/token-usage", &[("project_name", project)])?;
    if json {
        return print_json(&resp);
    }
    println!("{}", resp["token_usage"]);
    Ok(())
}

pub fn stop(server: &str, project: &str, json: bool) -> Result<()> {
    let client = ApiClient::new(server, DEFAULT_TIMEOUT);
    let resp = client.post_project("/api/stop-agent", project)?;
    if json {
        return print_json(&resp);
    }
    if resp["stopped"].as_bool().unwrap_or(false) {
        println!("Stopped the active run for '{project}'.");
    } else {
        println!("No active run for '{project}'.");
    }
    Ok(())
}
