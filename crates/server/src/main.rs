//! BarrelKV server binary: load config, open the store, serve the line
//! protocol until the process is stopped.

use anyhow::Result;
use engine::Barrel;
use server::{config::Config, service};
use std::net::TcpListener;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let config = Config::load()?;

    // RUST_LOG still wins when set; the debug flag only raises the default.
    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .init();

    info!(dir = %config.dir.display(), "booting barrelkv server");

    let barrel = Arc::new(Barrel::init(config.to_options())?);

    let listener = TcpListener::bind(&config.address)?;
    info!(address = %config.address, "listening");

    let result = service::serve(listener, Arc::clone(&barrel));

    barrel.shutdown()?;
    result
}
