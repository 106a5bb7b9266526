use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use diligence::api::create_router;
use diligence::config::Settings;
use diligence::orchestrator::Orchestrator;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "diligence", version, about = "Compliance due-diligence pipeline service")]
struct Args {
    /// Env file loaded before the process environment (defaults to ./.env)
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Address to listen on, overrides BIND_ADDR
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    let args = Args::parse();
    let settings = Settings::load(args.env_file.as_deref()).context("failed to load settings")?;
    let orchestrator =
        Orchestrator::from_settings(&settings).context("failed to initialize pipeline")?;

    tracing::info!(
        secondary_region = settings.openai_fallback.is_some(),
        document_intelligence = settings.document_intelligence.is_some(),
        "pipeline configured"
    );

    let app = create_router(Arc::new(orchestrator), &settings.api);
    let addr = args.bind.unwrap_or_else(|| settings.api.bind_addr.clone());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
