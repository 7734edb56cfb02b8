mod bootstrap;
mod health;
mod mailer;
mod pdf;
pub mod quotations;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cotizador_core::config::{AppConfig, LoadOptions};
use tracing::{info, warn};

fn init_logging(config: &AppConfig) {
    use cotizador_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let renderer = match pdf::QuotationRenderer::new(&app.config.pdf.template_dir) {
        Ok(renderer) => Some(Arc::new(renderer)),
        Err(error) => {
            warn!(
                event_name = "system.pdf.template_dir_unavailable",
                template_dir = %app.config.pdf.template_dir,
                error = %error,
                "falling back to embedded quotation templates"
            );
            Some(Arc::new(pdf::QuotationRenderer::with_embedded_templates()))
        }
    };

    let mailer = mailer::Mailer::from_config(&app.config.smtp)?.map(Arc::new);
    if mailer.is_none() {
        info!(event_name = "system.mail.disabled", "smtp delivery disabled");
    }

    let router = quotations::router(app.db_pool.clone(), renderer, mailer)
        .merge(health::router(app.db_pool.clone()));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.server.started",
        bind_address = %address,
        "cotizador-server started"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown(grace))
        .await?;

    info!(event_name = "system.server.stopped", "cotizador-server stopped");
    Ok(())
}

async fn wait_for_shutdown(grace: Duration) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    info!(
        event_name = "system.server.stopping",
        grace_secs = grace.as_secs(),
        "shutdown signal received, draining connections"
    );
}
