mod client;
mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::settings::SettingsSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "swea",
    about = "AI software engineer assistant: run the server or talk to it",
    version,
    propagate_version = true
)]
struct Cli {
    /// Workspace root holding .swea/ (default: auto-detect, else cwd)
    #[arg(long, global = true, env = "SWEA_ROOT")]
    root: Option<PathBuf>,

    /// Server base URL for client commands
    #[arg(
        long,
        global = true,
        env = "SWEA_SERVER",
        default_value = "http://localhost:1337"
    )]
    server: String,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and realtime server
    Serve {
        /// Address to bind (default: server.host from config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Check the server and list its models and search engines
    Status,

    /// List projects
    Projects,

    /// Create a project
    New { name: String },

    /// Delete a project, its messages and agent state
    Delete { name: String },

    /// Show a project's messages
    Messages { project: String },

    /// Send a message, or chat interactively when no message is given
    Chat {
        #[arg(long, short = 'p')]
        project: String,
        /// Model id (default: server's defaults.model)
        #[arg(long, short = 'm')]
        model: Option<String>,
        /// Search engine: bing, google or duckduckgo
        #[arg(long, short = 'e')]
        engine: Option<String>,
        message: Vec<String>,
    },

    /// Show the latest agent state of a project
    State { project: String },

    /// Show a project's cumulative token usage
    Tokens { project: String },

    /// Stop a project's active run
    Stop { project: String },

    /// Print the server log
    Logs,

    /// Read or update server settings
    Settings {
        #[command(subcommand)]
        subcommand: SettingsSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();
    let root = root::resolve_root(cli.root.as_deref());

    if let Commands::Serve { .. } = cli.command {
        if let Err(e) = swea_server::logging::init(&root, tracing::Level::INFO) {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(tracing::Level::WARN.into()),
            )
            .with_target(false)
            .init();
    }

    let server = cli.server.as_str();
    let json = cli.json;
    let result = match cli.command {
        Commands::Serve { host, port } => cmd::serve::run(&root, host, port),
        Commands::Status => cmd::status::run(server, json),
        Commands::Projects => cmd::project::list(server, json),
        Commands::New { name } => cmd::project::create(server, &name, json),
        Commands::Delete { name } => cmd::project::delete(server, &name, json),
        Commands::Messages { project } => cmd::project::messages(server, &project, json),
        Commands::Chat {
            project,
            model,
            engine,
            message,
        } => cmd::chat::run(
            server,
            cmd::chat::ChatArgs {
                project: &project,
                model: model.as_deref(),
                engine: engine.as_deref(),
            },
            message,
            json,
        ),
        Commands::State { project } => cmd::agent::state(server, &project, json),
        Commands::Tokens { project } => cmd::agent::tokens(server, &project, json),
        Commands::Stop { project } => cmd::agent::stop(server, &project, json),
        Commands::Logs => cmd::logs::run(server, json),
        Commands::Settings { subcommand } => cmd::settings::run(server, subcommand, json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
