//! batter CLI tool.

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "batter")]
#[command(about = "Compile build targets into engine configuration", long_about = None)]
struct Cli {
    /// Target manifest
    #[arg(long, env = "BATTER_MANIFEST", default_value = "batter.kdl")]
    manifest: String,

    /// Worker roster
    #[arg(long, env = "BATTER_WORKERS", default_value = "workers.cfg")]
    workers: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the manifest and roster and report what they derive
    Validate,
    /// Print derived engine configuration as JSON
    Render {
        /// Which list to print
        #[arg(long, value_enum, default_value = "all")]
        section: Section,
    },
    /// Walk a builder's steps without running them
    Run {
        /// Builder name
        builder: String,
        /// Build property, as name=value (repeatable)
        #[arg(long = "property", short = 'p')]
        properties: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Section {
    Pollers,
    Schedulers,
    Builders,
    All,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so rendered JSON on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate => {
            commands::validate(&cli.manifest, &cli.workers)?;
        }
        Commands::Render { section } => {
            commands::render::render(&cli.manifest, &cli.workers, section)?;
        }
        Commands::Run {
            builder,
            properties,
        } => {
            commands::run::run_dry(&cli.manifest, &cli.workers, &builder, &properties).await?;
        }
    }

    Ok(())
}
