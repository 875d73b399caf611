use anyhow::Result;

use crate::client::{ApiClient, DEFAULT_TIMEOUT};
use crate::output::print_json;

pub fn run(server: &str, json: bool) -> Result<()> {
    let resp = ApiClient::new(server, DEFAULT_TIMEOUT).get("/api/logs")?;
    if json {
        return print_json(&resp);
    }
    print!("{}", resp["logs"].as_str().unwrap_or_default());
    Ok(())
}
