// admin/main.rs - CLI for applying database bootstrap descriptors

use bootstrap::apply::apply_descriptor;
use bootstrap::descriptor::load::load_descriptor;
use bootstrap::error::BootstrapError;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use mongodb::Client;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(name = "admin")]
struct Args {
    #[clap(subcommand)]
    subcommand: Subcommands,
    #[arg(
        long,
        env = "DATABASE_URI",
        default_value = "mongodb://localhost:27017"
    )]
    database_uri: String,
}

#[derive(Debug, Subcommand)]
enum Subcommands {
    /// Apply one or more descriptors against the target database.
    #[clap(name = "apply")]
    Apply {
        #[arg(required = true)]
        descriptors: Vec<PathBuf>,
    },
    /// Parse a descriptor and report what it declares, without connecting.
    #[clap(name = "check")]
    Check { descriptor: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenv().ok();

    // Parse CLI args, using ENV vars if not provided
    let args = Args::parse();

    // Set up tracing
    let env_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::fmt()
        .with_env_filter(env_layer)
        .with_target(true)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), BootstrapError> {
    match args.subcommand {
        Subcommands::Apply { descriptors } => {
            // Create database client
            let client = Client::with_uri_str(&args.database_uri)
                .await
                .map_err(|source| BootstrapError::Connection { source })?;

            // Apply each descriptor in order; the first failure halts the run
            for path in descriptors {
                let descriptor = load_descriptor(&path)?;
                info!(
                    "Applying descriptor {} to database: {}",
                    path.display(),
                    descriptor.name
                );
                apply_descriptor(&client, &descriptor).await?;
            }
        }
        Subcommands::Check { descriptor } => {
            let descriptor = load_descriptor(&descriptor)?;

            info!("Database: {}", descriptor.name);
            match &descriptor.user {
                Some(user) => info!(
                    "User: {} with {} role grant(s)",
                    user.username,
                    user.roles.len()
                ),
                None => info!("User: none"),
            }
            for collection in &descriptor.collections {
                info!(
                    "Collection {}: {} index(es), {} seed document(s)",
                    collection.name,
                    collection.indexes.len(),
                    collection.seeds.len()
                );
            }
        }
    }

    Ok(())
}
