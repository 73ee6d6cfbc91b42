// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use fmd_api_server::config::Settings;
use fmd_api_server::routes::app_router;
use fmd_api_server::store::PredictionStore;
use fmd_api_server::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env();
    info!(
        "Starting FMD prediction API (dev_stub={}, delegate={})",
        settings.dev_stub, settings.ml_url
    );

    let store = PredictionStore::open(&settings.database_path)?;
    let bind_addr = settings.bind_addr.clone();
    let state = Arc::new(AppState {
        settings,
        http: reqwest::Client::new(),
        store,
    });

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app_router(state).into_make_service()).await?;
    Ok(())
}
