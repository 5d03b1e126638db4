use std::sync::Arc;

use clap::Subcommand;
use mindwell_core::MeditationCatalog;

#[derive(Subcommand)]
pub enum MeditateAction {
    /// List all sessions as JSON
    List,
    /// Show a single session
    Show {
        /// Session ID
        id: String,
    },
    /// Record a completed practice
    Complete {
        /// User ID
        #[arg(long)]
        user: String,
        /// Session ID
        session: String,
    },
}

pub async fn run(action: MeditateAction) -> Result<(), Box<dyn std::error::Error>> {
    let services = super::connect()?;
    let catalog = MeditationCatalog::new(
        Arc::clone(&services.remote),
        Arc::clone(&services.cache),
    );

    match action {
        MeditateAction::List => {
            let sessions = catalog.all_sessions().await?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        MeditateAction::Show { id } => match catalog.session_by_id(&id).await? {
            Some(session) => println!("{}", serde_json::to_string_pretty(&session)?),
            None => {
                eprintln!("unknown session: {id}");
                std::process::exit(1);
            }
        },
        MeditateAction::Complete { user, session } => {
            catalog.record_completion(&user, &session).await?;
            println!("ok");
        }
    }
    Ok(())
}
