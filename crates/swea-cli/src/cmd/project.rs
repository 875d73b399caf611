use anyhow::Result;

use crate::client::{ApiClient, DEFAULT_TIMEOUT};
use crate::output::{print_json, print_messages, print_table};

pub fn list(server: &str, json: bool) -> Result<()> {
    let client = ApiClient::new(server, DEFAULT_TIMEOUT);
    let data = client.get("/api/data")?;
    let projects: Vec<String> = data["projects"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|p| p.as_str().map(String::from))
        .collect();

    if json {
        return print_json(&projects);
    }
    if projects.is_empty() {
        println!("No projects. Create one with `swea new <name>`.");
        return Ok(());
    }
    let mut rows = Vec::with_capacity(projects.len());
    for name in &projects {
        let tokens = client.get_query("/api/token-usage", &[("project_name", name)])?;
        rows.push(vec![name.clone(), tokens["token_usage"].to_string()]);
    }
    print_table(&["PROJECT", "TOKENS"], &rows);
    Ok(())
}

pub fn create(server: &str, name: &str, json: bool) -> Result<()> {
    let client = ApiClient::new(server, DEFAULT_TIMEOUT);
    let resp = client.post_project("/api/create-project", name)?;
    if json {
        return print_json(&resp);
    }
    println!("{}", resp["message"].as_str().unwrap_or_default());
    Ok(())
}

pub fn delete(server: &str, name: &str, json: bool) -> Result<()> {
    let client = ApiClient::new(server, DEFAULT_TIMEOUT);
    let resp = client.post_project("/api/delete-project", name)?;
    if json {
        return print_json(&resp);
    }
    println!("{}", resp["message"].as_str().unwrap_or_default());
    Ok(())
}

pub fn messages(server: &str, name: &str, json: bool) -> Result<()> {
    let client = ApiClient::new(server, DEFAULT_TIMEOUT);
    let resp = client.post_project("/api/get-messages", name)?;
    if json {
        return print_json(&resp["messages"]);
    }
    print_messages(resp["messages"].as_array().map(Vec::as_slice).unwrap_or_default());
    Ok(())
}
