use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Use JSON logs in production (PEERLINK_LOG_JSON=1), human-readable otherwise
    let json_logs = std::env::var("PEERLINK_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env().add_directive("peerlink_server=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .init();
    }

    let config = peerlink_server::config::ServerConfig::parse();
    tracing::info!("Starting signaling relay on {}", config.listen_addr);
    if let Some(ref dir) = config.directory_file {
        tracing::info!("Directory file: {dir}");
    }
    if let Some(ref web_dir) = config.web_static_dir {
        tracing::info!("Serving web client from {web_dir}");
    }

    let server = peerlink_server::server::Server::new(config);
    server.run().await
}
