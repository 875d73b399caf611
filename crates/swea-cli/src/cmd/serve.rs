use anyhow::Result;
use std::path::Path;

pub fn run(root: &Path, host: Option<String>, port: Option<u16>) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let root_buf = root.to_path_buf();

    rt.block_on(async move {
        tokio::select! {
            res = swea_server::serve(root_buf, host, port) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
