use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    buildlens_cli::main_entry().await
}
