use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use emotion_recognizer::{ConfigArgs, EmotionRecognizer};
use emotion_server::{run_http_server, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve speech emotion predictions over HTTP", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "EMOTION_BIND", default_value = "0.0.0.0:5000")]
    bind: SocketAddr,
    /// Directory served under /static
    #[arg(long, default_value = "static")]
    static_dir: PathBuf,
    /// Directory uploads are staged in while they are analysed
    #[arg(long)]
    upload_dir: Option<PathBuf>,
    #[command(flatten)]
    config: ConfigArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.resolve()?;
    let recognizer = EmotionRecognizer::from_config(&config)?;

    let upload_dir = cli.upload_dir.unwrap_or_else(std::env::temp_dir);
    std::fs::create_dir_all(&upload_dir)
        .with_context(|| format!("creating upload directory {}", upload_dir.display()))?;
    info!(
        model = %config.model_path.display(),
        uploads = %upload_dir.display(),
        "recognizer loaded"
    );

    let state = AppState::new(recognizer, upload_dir, cli.static_dir);
    run_http_server(state, cli.bind, shutdown_signal()).await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
