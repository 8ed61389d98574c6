//! recorder-vault - accounts, sessions and content-addressed video storage
//!
//! Backend for a screen recorder: users sign up, log in for short-lived
//! access tokens backed by refresh tokens, and upload recordings that are
//! stored once per distinct content.

mod api;
mod auth;
mod config;
mod context;
mod crypto;
mod db;
mod error;
mod jobs;
mod server;
mod session;
mod video_store;

use config::{LogFormat, LoggingConfig, ServerConfig};
use context::AppContext;
use error::AppResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> AppResult<()> {
    let config = ServerConfig::from_env()?;

    init_tracing(&config.logging);

    print_banner();

    let ctx = Arc::new(AppContext::new(config).await?);

    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level)
        .unwrap_or_else(|_| EnvFilter::new("recorder_vault=info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(filter);

    match logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn print_banner() {
    println!(
        r#"
                              __                                  ____
   ________  _________  _____/ /__  _____   _   ______ ___  __/ / /_
  / ___/ _ \/ ___/ __ \/ ___/ __  / _ \/ ___/  | | / / __ `/ / / / / __/
 / /  /  __/ /__/ /_/ / /  / /_/ /  __/ /      | |/ / /_/ / /_/ / / /_
/_/   \___/\___/\____/_/   \__,_/\___/_/       |___/\__,_/\__,_/_/\__/

        Recorder backend v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
