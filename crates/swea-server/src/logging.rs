use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the server subscriber: terminal output plus an ANSI-free copy in
/// `.swea/logs/swea.log`, which `GET /api/logs` serves.
pub fn init(root: &Path, level: Level) -> anyhow::Result<()> {
    swea_core::io::ensure_dir(&swea_core::paths::logs_dir(root))?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(swea_core::paths::log_path(root))?;

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()?;
    Ok(())
}
