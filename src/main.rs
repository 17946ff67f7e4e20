use anyhow::Result;
use dotenvy::dotenv;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

// The credential is a hard precondition: nothing touches the network without
// it, and a blank value counts as missing.
fn check_env() -> Result<()> {
    match env::var("TMDB_API_KEY") {
        Ok(key) if !key.trim().is_empty() => {
            info!("TMDB API key found");
            Ok(())
        }
        _ => anyhow::bail!("API Key is missing! Please set TMDB_API_KEY in your .env file."),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    match dotenv() {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) => warn!("No .env file loaded ({}) - relying on environment", e),
    }
    init_tracing();
    check_env()?;
    cinerec::app::run_server().await
}
