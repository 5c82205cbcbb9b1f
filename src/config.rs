use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub inbox: PathBuf,
    pub excel_dir: PathBuf,
    pub json_dir: PathBuf,
    pub addr: SocketAddr,
}

impl Config {
    pub fn new(root: &Path, host: &str, port: u16) -> anyhow::Result<Self> {
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("invalid listen address {host}:{port}"))?;
        let processed = root.join("processed");
        Ok(Self {
            inbox: root.join("inbox"),
            excel_dir: processed.join("excel"),
            json_dir: processed.join("json"),
            addr,
        })
    }

    pub async fn ensure_directories(&self) -> anyhow::Result<()> {
        for dir in [&self.inbox, &self.excel_dir, &self.json_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }
}
