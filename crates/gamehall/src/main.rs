use gamehall::{GamehallServer, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::load()?;
    let server = GamehallServer::builder().config(config).build().await?;

    tracing::info!(
        addr = %server.local_addr()?,
        games = ?server.gateway().catalog().names(),
        "listening"
    );
    server.run().await?;
    Ok(())
}
