mod layers;

use std::env;
use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use crate::layers::archive::{ArchiveClient, ArchiveConfig};
use crate::layers::resolver::Resolver;
use crate::layers::server;

const DEFAULT_PORT: u16 = 8000;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let client = ArchiveClient::new(ArchiveConfig::default())?;
    let resolver = Arc::new(Resolver::new(client));

    server::serve(resolver, port).await
}
