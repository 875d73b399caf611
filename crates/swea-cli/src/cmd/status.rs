use anyhow::Result;

use crate::client::{ApiClient, DEFAULT_TIMEOUT};
use crate::output::print_json;

/// Server liveness plus the models and search engines it offers.
pub fn run(server: &str, json: bool) -> Result<()> {
    let client = ApiClient::new(server, DEFAULT_TIMEOUT);
    let status = client.get("/api/status")?;
    let data = client.get("/api/data")?;

    if json {
        return print_json(&serde_json::json!({
            "server": server,
            "status": status["status"],
            "models": data["models"],
            "default_model": data["default_model"],
            "search_engines": data["search_engines"],
            "default_search_engine": data["default_search_engine"],
        }));
    }

    println!("{server}: {}", status["status"].as_str().unwrap_or("unknown"));
    println!(
        "Projects:       {}",
        data["projects"].as_array().map_or(0, Vec::len)
    );
    println!(
        "Default model:  {}",
        data["default_model"].as_str().unwrap_or("-")
    );
    println!("Models:");
    for m in data["models"].as_array().into_iter().flatten() {
        println!("  {}", m.as_str().unwrap_or_default());
    }
    println!(
        "Search engines: {}",
        join_strings(&data["search_engines"])
    );
    Ok(())
}

fn join_strings(value: &serde_json::Value) -> String {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}
