use chrono::Utc;
use clap::Subcommand;
use mindwell_core::PurchasePayload;
use serde_json::json;

#[derive(Subcommand)]
pub enum PremiumAction {
    /// Show current entitlement status
    Status {
        /// User ID
        #[arg(long)]
        user: String,
    },
    /// List configured store products
    Products,
    /// Grant premium for a verified purchase event
    Activate {
        /// User ID
        #[arg(long)]
        user: String,
        /// Store product identifier
        #[arg(long)]
        product: String,
        /// Store transaction identifier
        #[arg(long)]
        transaction: String,
        /// Platform identifier recorded on the audit trail
        #[arg(long, default_value = "manual")]
        provider: String,
    },
    /// Clear the premium entitlement
    Deactivate {
        /// User ID
        #[arg(long)]
        user: String,
    },
}

pub async fn run(action: PremiumAction) -> Result<(), Box<dyn std::error::Error>> {
    let services = super::connect()?;

    match action {
        PremiumAction::Status { user } => {
            let premium = services.entitlements.is_premium_user(&user).await;
            println!("{}", if premium { "premium" } else { "free" });
        }
        PremiumAction::Products => {
            let products = json!({
                "monthly": services.config.products.monthly,
                "yearly": services.config.products.yearly,
            });
            println!("{}", serde_json::to_string_pretty(&products)?);
        }
        PremiumAction::Activate {
            user,
            product,
            transaction,
            provider,
        } => {
            let payload = PurchasePayload {
                product_id: product,
                transaction_id: transaction,
                transaction_date: Utc::now(),
                provider,
            };
            services
                .entitlements
                .activate_entitlement(&user, &payload)
                .await?;
            println!("premium activated");
        }
        PremiumAction::Deactivate { user } => {
            services.entitlements.deactivate_entitlement(&user).await?;
            println!("premium deactivated");
        }
    }
    Ok(())
}
