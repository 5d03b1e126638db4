use std::sync::Arc;

use clap::Subcommand;
use mindwell_core::{AnthropicClient, ChatError, ChatService, LlmClient};

use super::Services;

#[derive(Subcommand)]
pub enum ChatAction {
    /// Start a new conversation
    New {
        /// User ID
        #[arg(long)]
        user: String,
    },
    /// Send a message and print the companion's reply
    Send {
        /// User ID
        #[arg(long)]
        user: String,
        /// Conversation ID
        #[arg(long)]
        conversation: String,
        /// Message text
        message: String,
    },
    /// Print conversation history as JSON
    History {
        /// Conversation ID
        #[arg(long)]
        conversation: String,
    },
    /// Show how many free messages are left today
    Remaining {
        /// User ID
        #[arg(long)]
        user: String,
    },
}

fn chat_service(services: &Services) -> Result<ChatService, Box<dyn std::error::Error>> {
    let llm: Arc<dyn LlmClient> = Arc::new(AnthropicClient::from_config(&services.config.llm)?);
    Ok(ChatService::new(
        Arc::clone(&services.remote),
        llm,
        Arc::clone(&services.usage),
    )
    .with_history_window(services.config.chat.history_window))
}

pub async fn run(action: ChatAction) -> Result<(), Box<dyn std::error::Error>> {
    let services = super::connect()?;

    match action {
        ChatAction::New { user } => {
            let conversation = chat_service(&services)?.create_conversation(&user).await?;
            println!("{}", serde_json::to_string_pretty(&conversation)?);
        }
        ChatAction::Send {
            user,
            conversation,
            message,
        } => {
            let chat = chat_service(&services)?;
            match chat.send_message(&user, &conversation, &message).await {
                Ok(reply) => println!("{reply}"),
                Err(ChatError::LimitReached) => {
                    eprintln!("daily message limit reached -- try again tomorrow or go premium");
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }
        ChatAction::History { conversation } => {
            let history = chat_service(&services)?.history(&conversation).await?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
        ChatAction::Remaining { user } => match services.usage.remaining_messages(&user).await {
            None => println!("unlimited"),
            Some(n) => println!("{n}"),
        },
    }
    Ok(())
}
