use anyhow::Result;
use clap::Parser;
use etlpipeline::{config::EtlConfig, logging, server};
use std::sync::Arc;
use tracing::info;

/// HTTP service: each request to `/?a=<project>&b=<dataset>&c=<table>`
/// loads the next page of the source CSV into that table.
#[derive(Parser, Debug)]
#[command(name = "etlpipeline")]
struct Cli {
    /// Port to listen on (Cloud Run sets `PORT`)
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    #[command(flatten)]
    config: EtlConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.config.log_level);
    info!("Starting ETL pipeline service");

    let pipeline = Arc::new(cli.config.build_pipeline().await?);
    let routes = server::routes(pipeline);

    info!("Server starting on port {}", cli.port);
    info!("Health check: http://localhost:{}/health", cli.port);
    info!(
        "ETL endpoint: http://localhost:{}/?a=<project>&b=<dataset>&c=<table>",
        cli.port
    );

    warp::serve(routes).run(([0, 0, 0, 0], cli.port)).await;

    Ok(())
}
