use clap::Parser;
use kvault::server::{Server, ServerConfig};
use kvault::{snapshot, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            subscriber.with_writer(std::sync::Mutex::new(file)).with_ansi(false).init();
        }
        None => subscriber.init(),
    }

    let server = Server::new(ServerConfig { bind_addr: cli.bind_addr(), max_clients: cli.max_clients });

    if let Some(path) = &cli.snapshot_path {
        let engine = server.engine();
        let mut engine = engine.lock().await;
        match snapshot::restore(&mut engine.store, path) {
            Ok(true) => tracing::info!("restored snapshot from {}", path.display()),
            Ok(false) => tracing::info!("no snapshot found at {}, starting empty", path.display()),
            Err(e) => tracing::warn!("failed to restore snapshot from {}: {e}", path.display()),
        }
    }

    server.run().await
}
