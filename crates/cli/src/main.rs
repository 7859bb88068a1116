use anyhow::Context;
use clap::{Parser, Subcommand};

use library_kernel::settings::Settings;

/// Operate the book catalog service
#[derive(Debug, Parser)]
#[command(name = "library", version, about)]
struct Cli {
    /// Configuration environment (overrides LIBRARY_ENV)
    #[arg(long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service
    Serve,
    /// Apply pending schema migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(env) = &cli.env {
        std::env::set_var("LIBRARY_ENV", env);
    }

    let settings = Settings::load().with_context(|| "failed to load library settings")?;
    library_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Serve => library_app::run(settings).await,
        Command::Migrate => {
            let applied = library_app::migrate(&settings).await?;
            tracing::info!(applied, "migrate finished");
            Ok(())
        }
    }
}
