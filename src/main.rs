//! Grade Predictor - Main Entry Point

use clap::Parser;
use grade_predictor::cli::{cmd_import, cmd_info, cmd_serve, cmd_train, Cli, Commands, TrainArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grade_predictor=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port, artifacts, store_dir } => {
            cmd_serve(host, port, artifacts, store_dir).await?;
        }
        Commands::Train { data, profile, output, encoding, scale, k, test_size, seed, store_dir } => {
            // Training is CPU-bound and short; run it off the async workers.
            tokio::task::spawn_blocking(move || {
                cmd_train(TrainArgs { data, profile, output, encoding, scale, k, test_size, seed, store_dir })
            })
            .await??;
        }
        Commands::Import { csv, store_dir } => {
            cmd_import(&csv, &store_dir)?;
        }
        Commands::Info { artifacts } => {
            cmd_info(&artifacts)?;
        }
    }

    Ok(())
}
