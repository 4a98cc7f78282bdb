use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tonic::transport::Server;
use tracing_subscriber::EnvFilter;

use trivia_match_engine::engine::config::{load_config, load_default_config};
use trivia_match_engine::engine::random::SeededRandom;
use trivia_match_engine::game::orchestrator::MatchServer;
use trivia_match_engine::server::proto::match_service_server::MatchServiceServer;
use trivia_match_engine::server::MatchGateway;

#[derive(Parser)]
#[command(name = "trivia-server", about = "Trivia board game match server")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "50052", env = "TRIVIA_PORT")]
    port: u16,

    /// Path to trivia.toml (default: auto-discover)
    #[arg(long, env = "TRIVIA_CONFIG")]
    config: Option<PathBuf>,

    /// Card definition JSON, overrides `cards_path` from the config
    #[arg(long, env = "TRIVIA_CARDS")]
    cards: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => load_config(path).map_err(|e| format!("Failed to load config: {}", e))?,
        None => load_default_config(),
    };
    if let Some(cards) = cli.cards {
        config.cards_path = cards;
    }
    tracing::info!(
        cards = %config.cards_path.display(),
        seed = ?config.rng_seed,
        "configuration loaded"
    );

    let rng = SeededRandom::new(config.rng_seed);
    let (actor, handle) = MatchServer::new(config, Box::new(rng));
    tokio::spawn(actor.run());

    let addr: SocketAddr = ([0, 0, 0, 0], cli.port).into();
    tracing::info!(%addr, "starting gRPC server");

    Server::builder()
        .add_service(MatchServiceServer::new(MatchGateway::new(handle)))
        .serve(addr)
        .await?;

    Ok(())
}
