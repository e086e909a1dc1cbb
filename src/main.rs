use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use slbridge::clients::HttpServiceLayerClient;
use slbridge::http::{serve, AppState};
use slbridge::{AppConfig, SessionTokenManager};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "slbridge.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience - production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let app_config = match AppConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    let sl_config = app_config.service_layer_config()?;
    let client = Arc::new(HttpServiceLayerClient::new());

    let mut manager = SessionTokenManager::new(sl_config.clone(), client)?;
    if let Some(verifier) = app_config.operator.clone() {
        manager = manager.with_operator_verifier(verifier);
    } else {
        tracing::warn!("no operator verifier configured; credential reveal is disabled");
    }

    let state = Arc::new(AppState {
        manager,
        config: sl_config,
    });

    let (tx, rx) = broadcast::channel(1);
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = tx.send(());
    });

    let addr = format!("{}:{}", app_config.http.host, app_config.http.port);
    serve(state, &addr, rx).await
}
