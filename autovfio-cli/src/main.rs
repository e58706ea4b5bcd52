use anyhow::Result;
use autovfio_core::{paths, Config, OutputFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "auto-vfio")]
#[command(about = "Automate the setup of VFIO passthrough on Linux systems", long_about = None)]
struct Cli {
    /// Config file (json, yaml, yml or toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List PCI devices grouped by IOMMU group
    #[command(alias = "l")]
    List {
        /// Show devices as a tree under their group and class
        #[arg(short, long)]
        tree: bool,

        /// Output format: json, yaml, xml, toml, props, shell, csv, tsv
        #[arg(short, long)]
        output: Option<OutputFormat>,

        /// Query applied to the listing (e.g. '.[][] | .bus')
        #[arg(short = 'y', long)]
        query: Option<String>,
    },

    /// Rebind devices to vfio-pci
    #[command(alias = "r")]
    Rebind {
        /// PCI addresses (e.g. 0000:07:00.0), comma separated or repeated
        #[arg(short, long, required = true, value_delimiter = ',')]
        bus: Vec<String>,

        /// Also add the device ids to the vfio-pci modprobe options
        #[arg(short, long)]
        persist: bool,
    },

    /// Print the version
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let fallback_level = cli.log_level.clone().unwrap_or_else(|| "info".to_string());

    if let Err(e) = run(cli).await {
        // No-op when logging is already up
        autovfio_core::init_observability(&fallback_level);
        tracing::error!(error = %format!("{:#}", e), "Command failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::resolve(cli.config.as_deref())?;
    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    autovfio_core::init_observability(level);

    match cli.command {
        Commands::List { tree, output, query } => {
            commands::list(&config, tree, output, query)?;
        }
        Commands::Rebind { bus, persist } => {
            // An explicit --config is already among the re-run arguments.
            let discovered = if cli.config.is_none() { paths::config_file() } else { None };
            commands::rebind(&config, discovered.as_deref(), &bus, persist).await?;
        }
        Commands::Version => commands::version(),
    }

    Ok(())
}
