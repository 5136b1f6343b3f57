use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    taborg_cli::run().await
}
