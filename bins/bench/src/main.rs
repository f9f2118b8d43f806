mod cmd;
mod config;
mod error;

use clap::Parser;
use config::{Cli, Commands, Effective};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let eff = match Effective::new(&cli.common) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = match &cli.command {
        Commands::Produce => cmd::produce::run(&eff).await,
        Commands::Consume => cmd::consume::run(&eff).await,
        Commands::Run => cmd::run::run(&eff).await,
        Commands::Status => cmd::status::run(&eff).await,
        Commands::Get { id } => cmd::record::get(&eff, id).await,
        Commands::Delete { id } => cmd::record::delete(&eff, id).await,
        Commands::Put { id, json } => cmd::record::put(&eff, id, json).await,
        Commands::Patch { id, json } => cmd::record::patch(&eff, id, json).await,
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
