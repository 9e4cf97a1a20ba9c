//! ==============================================================================
//! main.rs - motion bridge entry point
//! ==============================================================================
//!
//! purpose:
//!     bridges a serial motion/distance radar to two consumers:
//!     - a local web page that polls the latest reading once per second
//!     - a telegram bot that gets a throttled "motion detected" message
//!
//! responsibilities:
//!     - load configuration and start logging
//!     - open the serial source (real uart or mock)
//!     - bind the http listener
//!     - run the ingestion loop and the request loop as two tasks sharing
//!       one TelemetryStore
//!     - stop both on ctrl-c
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────────┐
//!     │                      motion bridge (this file)                │
//!     │  ┌────────────────┐                      ┌────────────────┐  │
//!     │  │ ingestion loop │      write           │  request loop  │  │
//!     │  │  (ingest.rs)   │ ──────┐     ┌─────── │  (server.rs)   │  │
//!     │  └───────┬────────┘       ▼     │  read  └───────┬────────┘  │
//!     │          │           ┌───────────┐               │           │
//!     │          │           │   store   │ <- store.rs   │           │
//!     │          │           └───────────┘               │           │
//!     └──────────┼───────────────────────────────────────┼───────────┘
//!                │                                       │
//!       uart ────┘  alert ──> telegram bot api           └──> browser
//!
//! ==============================================================================

mod alert;
mod config;
mod domain;
mod error;
mod frame;
mod ingest;
mod page;
mod serial;
mod server;
mod store;
mod throttle;

use alert::TelegramDispatcher;
use anyhow::{Context, Result};
use ingest::IngestionLoop;
use serial::DefaultSerial;
use server::RequestLoop;
use std::time::Duration;
use store::TelemetryStore;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: logging; the filter is swapped once the config is known
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) = reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("motion bridge v{}", env!("CARGO_PKG_VERSION"));

    // step 2: configuration
    let config = config::BridgeConfig::load_or_default();
    if !from_env {
        match EnvFilter::try_new(&config.logging.level) {
            Ok(level) => {
                if let Err(e) = filter_handle.reload(level) {
                    tracing::warn!("failed to apply log level: {}", e);
                }
            }
            Err(e) => tracing::warn!("invalid log level {:?}: {}", config.logging.level, e),
        }
    }
    config.log_summary();

    // step 3: shared state
    let store = TelemetryStore::new();

    // step 4: serial source and ingestion loop
    let source = DefaultSerial::open(&config.serial)?;
    let mut ingestion = IngestionLoop::new(
        source,
        store.clone(),
        config.serial.chunk_size,
        Duration::from_millis(config.serial.poll_interval_ms),
    )
    .show_sensor_data(config.logging.show_sensor_data);

    if !config.alert.enabled {
        tracing::info!("alerts disabled in config");
    } else if !config.alert.has_credentials() {
        tracing::warn!(
            "alerts enabled but bot token or chat id missing (set {} / {}) - alerts disabled",
            config::BOT_TOKEN_ENV,
            config::CHAT_ID_ENV
        );
    } else {
        let dispatcher = TelegramDispatcher::from_config(&config.alert)?;
        ingestion = ingestion.with_alerts(dispatcher, config.alert.min_interval(), config.alert.message.clone());
    }

    // step 5: http listener and request loop
    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    let page = page::StaticPage::from_config(config.server.page_path.as_deref());
    let requests = RequestLoop::new(listener, store.clone(), page, &config.server);

    // step 6: run both loops until shutdown
    let mut ingest_task = tokio::spawn(ingestion.run());
    let mut server_task = tokio::spawn(requests.run());

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                tracing::error!("failed to listen for ctrl-c: {}", e);
            }
            tracing::info!("shutting down");
        }
        res = &mut ingest_task => tracing::error!("ingestion loop ended: {:?}", res),
        res = &mut server_task => tracing::error!("request loop ended: {:?}", res),
    }

    ingest_task.abort();
    server_task.abort();
    Ok(())
}
