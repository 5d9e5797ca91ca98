use clap::Parser;

use notepad_sync::Settings;
use notepad_sync::cli::commands::{self, init, list, new, watch};
use notepad_sync::cli::{Cli, Commands};

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Init { force } = cli.command {
        return init::run_init(force);
    }

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        eprintln!("Using default configuration.");
        Settings::default()
    });

    notepad_sync::logging::init_with_config(&settings.logging);

    let roots = commands::resolve_roots(&cli.roots, &settings)?;

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::Config => init::run_config(&settings),
        Commands::List => list::run_list(&settings, roots).await,
        Commands::New { title, workspace } => {
            new::run_new(&settings, roots, &title, workspace).await
        }
        Commands::Watch => watch::run_watch(&settings, roots).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
