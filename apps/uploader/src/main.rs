//! SICE uploader entry point.

mod app;
mod config;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let jobs = match app::parse_args(std::env::args().skip(1)) {
        Ok(jobs) => jobs,
        Err(e) => {
            eprintln!("{e}\n\n{}", app::USAGE);
            std::process::exit(2);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        files = jobs.len(),
        "starting SICE uploader"
    );

    let config = config::Config::load()?;
    config.validate()?;
    tracing::info!(api_url = %config.api_url, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config, jobs))?;

    tracing::info!("uploader finished");
    Ok(())
}
