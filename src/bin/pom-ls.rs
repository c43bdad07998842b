use anyhow::Result;
use pom_reconciler::lsp::server::serve;

#[tokio::main]
async fn main() -> Result<()> {
    serve().await
}
