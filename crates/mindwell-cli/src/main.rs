use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mindwell-cli", version, about = "Mindwell CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Companion chat
    Chat {
        #[command(subcommand)]
        action: commands::chat::ChatAction,
    },
    /// Guided breathing exercises
    Breathe {
        #[command(subcommand)]
        action: commands::breathe::BreatheAction,
    },
    /// Daily message quota
    Quota {
        #[command(subcommand)]
        action: commands::quota::QuotaAction,
    },
    /// Premium entitlement management
    Premium {
        #[command(subcommand)]
        action: commands::premium::PremiumAction,
    },
    /// Meditation catalog
    Meditate {
        #[command(subcommand)]
        action: commands::meditate::MeditateAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Chat { action } => commands::chat::run(action).await,
        Commands::Breathe { action } => commands::breathe::run(action).await,
        Commands::Quota { action } => commands::quota::run(action).await,
        Commands::Premium { action } => commands::premium::run(action).await,
        Commands::Meditate { action } => commands::meditate::run(action).await,
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
