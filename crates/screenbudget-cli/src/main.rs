use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "screenbudget", version, about = "Screenbudget CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report finished exercise and manage its credit
    Exercise {
        #[command(subcommand)]
        action: commands::exercise::ExerciseAction,
    },
    /// Credit ledger views and consumption
    Ledger {
        #[command(subcommand)]
        action: commands::ledger::LedgerAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Buy-back pricing
    Price {
        #[command(subcommand)]
        action: commands::price::PriceAction,
    },
    /// Usage snapshot for display
    Status,
    /// Arm an "open anyway" grace exception for one app
    Grace {
        /// Application identifier
        app_id: String,
    },
    /// Enforcement monitor
    Monitor {
        #[command(subcommand)]
        action: commands::monitor::MonitorAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Exercise { action } => commands::exercise::run(action),
        Commands::Ledger { action } => commands::ledger::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Price { action } => commands::price::run(action),
        Commands::Status => commands::status::run(),
        Commands::Grace { app_id } => commands::grace::run(&app_id),
        Commands::Monitor { action } => commands::monitor::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
