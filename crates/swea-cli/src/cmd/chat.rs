use std::io::{self, BufRead, Write};

use anyhow::Result;

use crate::client::{ApiClient, CHAT_TIMEOUT};
use crate::output::print_json;

pub struct ChatArgs<'a> {
    pub project: &'a str,
    pub model: Option<&'a str>,
    pub engine: Option<&'a str>,
}

/// Send one message, or read messages from stdin until `exit` or EOF.
pub fn run(server: &str, args: ChatArgs<'_>, message: Vec<String>, json: bool) -> Result<()> {
    let client = ApiClient::new(server, CHAT_TIMEOUT);

    if !message.is_empty() {
        return send(&client, &args, &message.join(" "), json);
    }

    println!(
        "Chatting in '{}'. Type `exit` to quit.",
        args.project
    );
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if matches!(text, "exit" | "quit") {
            break;
        }
        // A failed turn should not end the session.
        if let Err(e) = send(&client, &args, text, json) {
            eprintln!("error: {e:#}");
        }
    }
    Ok(())
}

fn send(client: &ApiClient, args: &ChatArgs<'_>, text: &str, json: bool) -> Result<()> {
    let mut body = serde_json::json!({
        "project_name": args.project,
        "message": text,
    });
    if let Some(model) = args.model {
        body["base_model"] = model.into();
    }
    if let Some(engine) = args.engine {
        body["search_engine"] = engine.into();
    }

    let resp = client.post("/api/messages", body)?;
    if json {
        return print_json(&resp);
    }
    println!("{}", reply_text(&resp));
    Ok(())
}

/// The agent's reply is the last message; if the run is still going the
/// last message is the user's own and there is nothing to show yet.
fn reply_text(resp: &serde_json::Value) -> String {
    let last = resp["messages"].as_array().and_then(|m| m.last());
    match last {
        Some(m) if m["origin"] == "agent" => m["text"].as_str().unwrap_or_default().to_string(),
        _ => "(agent is still working; check back with `swea messages`)".to_string(),
    }
}
