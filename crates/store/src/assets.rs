use crate::error::{Result, StoreError};
use crate::sidecar::ensure_port_info;
use async_trait::async_trait;
use buildlens_protocol::DASHBOARD_ENTRY;
use std::path::Path;

const EMBEDDED_INDEX: &str = include_str!("../assets/index.html");

/// Writes the dashboard documents next to a freshly published report.
#[async_trait]
pub trait DashboardAssets: Send + Sync {
    async fn write_assets(&self, output_dir: &Path) -> Result<()>;
}

/// Bundled single-page dashboard that follows the push channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedAssets;

#[async_trait]
impl DashboardAssets for EmbeddedAssets {
    async fn write_assets(&self, output_dir: &Path) -> Result<()> {
        let path = output_dir.join(DASHBOARD_ENTRY);
        tokio::fs::write(&path, EMBEDDED_INDEX)
            .await
            .map_err(StoreError::io(&path))?;
        ensure_port_info(output_dir).await
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoAssets;

#[async_trait]
impl DashboardAssets for NoAssets {
    async fn write_assets(&self, _output_dir: &Path) -> Result<()> {
        Ok(())
    }
}
