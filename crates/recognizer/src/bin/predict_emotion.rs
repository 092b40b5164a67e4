use emotion_domain::{JsonExporter, ReportExporter};
use emotion_recognizer::cli;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // stdout is reserved for the JSON response.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let (response, format) = cli::execute(std::env::args_os());
    let bytes = JsonExporter.export(&response, format)?;
    println!("{}", String::from_utf8_lossy(&bytes));
    Ok(())
}
