use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use log::{debug, info};
use neuropath::api::{self, AppState};
use neuropath::{ModelArtifact, ModelStore, ServiceConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind (overrides NEUROPATH_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides NEUROPATH_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding `<name>/model.onnx` files (overrides NEUROPATH_MODELS_DIR)
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Download model files that are missing or fail verification before serving
    #[arg(long)]
    fetch: bool,

    /// Force a fresh download of the model files
    #[arg(short, long)]
    fresh: bool,
}

impl Args {
    fn overrides(&self) -> HashMap<&'static str, String> {
        let mut overrides = HashMap::new();
        if let Some(host) = &self.host {
            overrides.insert("NEUROPATH_HOST", host.clone());
        }
        if let Some(port) = self.port {
            overrides.insert("NEUROPATH_PORT", port.to_string());
        }
        if let Some(dir) = &self.models_dir {
            overrides.insert("NEUROPATH_MODELS_DIR", dir.display().to_string());
        }
        overrides
    }
}

async fn ensure_models_downloaded(config: &ServiceConfig, fresh: bool) -> anyhow::Result<()> {
    let store = ModelStore::new(&config.models_dir)?;
    let artifacts: [&ModelArtifact; 2] = [&config.alzheimer_model, &config.eeg_model];

    for artifact in artifacts {
        store
            .refresh(artifact, fresh)
            .await
            .with_context(|| format!("Failed to fetch model '{}'", artifact.name))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loaded first so RUST_LOG from .env reaches the logger.
    let dotenv = dotenv::dotenv();
    neuropath::init_logger();
    if let Err(e) = dotenv {
        debug!("No .env file loaded: {}", e);
    }
    let args = Args::parse();

    info!("=== Starting NeuroPath ===");

    let overrides = args.overrides();
    let config = ServiceConfig::from_lookup(|key| {
        overrides
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
    })
    .context("Invalid configuration")?;
    info!("Configuration: {:?}", config);

    if args.fetch || args.fresh {
        ensure_models_downloaded(&config, args.fresh).await?;
    }

    let start_time = Instant::now();
    info!("Loading classifiers...");
    let load_config = config.clone();
    let state = tokio::task::spawn_blocking(move || AppState::from_config(&load_config))
        .await
        .context("Classifier loading task failed")??;
    info!(
        "=== Classifiers loaded (took {:.2?}): alzheimer {}, eeg {} ===",
        start_time.elapsed(),
        state.alzheimer.status(),
        state.eeg.status()
    );

    let app = api::router(state);
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Listening on http://{}", address);

    axum::serve(listener, app).await?;
    Ok(())
}
