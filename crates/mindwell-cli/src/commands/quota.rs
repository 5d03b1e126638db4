use clap::Subcommand;
use serde_json::json;

#[derive(Subcommand)]
pub enum QuotaAction {
    /// Print quota state for a user as JSON
    Status {
        /// User ID
        #[arg(long)]
        user: String,
    },
}

pub async fn run(action: QuotaAction) -> Result<(), Box<dyn std::error::Error>> {
    let services = super::connect()?;

    match action {
        QuotaAction::Status { user } => {
            let allowed = services.usage.can_use_chat(&user).await;
            let remaining = services.usage.remaining_messages(&user).await;
            let status = json!({
                "allowed": allowed,
                "remaining": remaining,
                "unlimited": remaining.is_none(),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}
