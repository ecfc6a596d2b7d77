mod config;
mod db;
mod parking;
mod pipeline;
mod plate;
mod recognition;
mod server;
mod types;

use config::{Config, ModelWeights};
use db::RecordStore;
use env_logger::Env;
use log::{error, info};
use pipeline::Processor;
use recognition::{HttpDetector, HttpTextRecognizer};
use server::AppState;
use std::sync::Arc;

#[macro_use]
extern crate failure;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    info!("Starting parking-plates");

    if let Err(e) = run().await {
        error!("Fatal: {}", e);
        std::process::exit(1);
    }
    info!("Exiting main");
}

async fn run() -> Result<(), failure::Error> {
    let config = Config::from_env()?;
    info!("Using {:?}", config);

    std::fs::create_dir_all(&config.annotated_dir)?;
    std::fs::create_dir_all(&config.weights_dir)?;

    let store = RecordStore::new(&config.db_path);
    store
        .initialize()
        .map_err(|e| format_err!("Unable to create plate database {:?}: {}", store.path(), e))?;

    let client = reqwest::Client::new();
    let weights = Arc::new(ModelWeights::new(&config.weights));
    let processor = Processor::new(
        Arc::new(HttpTextRecognizer::new(client.clone(), config.ocr_url.clone())),
        Arc::new(HttpDetector::new(
            client,
            config.detect_url.clone(),
            weights.clone(),
        )),
        store,
    );
    let state = Arc::new(AppState {
        processor,
        weights,
        annotated_dir: config.annotated_dir.clone(),
        weights_dir: config.weights_dir.clone(),
        upload_limit: config.upload_limit,
    });

    server::run(state, ([0, 0, 0, 0], config.port).into()).await;
    Ok(())
}
