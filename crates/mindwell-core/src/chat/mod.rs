//! AI chat companion.
//!
//! Conversations and messages persist in the remote store; sends are gated
//! by the daily usage quota and answered by the text-completion
//! collaborator. A denied quota check surfaces as
//! [`ChatError::LimitReached`], which the UI renders as a "limit reached"
//! state rather than an error.

mod llm;

pub use llm::{AnthropicClient, CompletionTurn, LlmClient};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::ChatError;
use crate::remote::RemoteError;
use crate::quota::UsageTracker;
use crate::remote::{Filter, RemoteStore};

pub const CONVERSATION_TABLE: &str = "chat_conversations";
pub const MESSAGE_TABLE: &str = "chat_messages";

const MAX_COMPLETION_TOKENS: u32 = 1000;
const COMPLETION_TEMPERATURE: f32 = 0.7;

/// How many of the most recent turns are replayed as completion context.
const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Companion persona sent as the completion system prompt.
const SYSTEM_PROMPT: &str = "\
You are Mimi, a gentle owl companion inside a mindfulness app, supporting \
people who experience the world more intensely than most.

Keep replies short and warm, and never stack more than a few ideas into one \
message. Acknowledge what the person is feeling before offering anything \
practical. When it fits, point them to a breathing exercise or a meditation \
session in the app instead of a long explanation. You may close a thought \
with a soft 'hoo' now and then, and use at most one or two emoji.

You are not a clinician and never diagnose. When someone describes \
persistent distress, gently encourage them to reach out to a professional. \
Respect the person's pace and let them lead the conversation.";

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation thread owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// One persisted message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Companion chat over the remote store and the completion collaborator.
pub struct ChatService {
    remote: Arc<dyn RemoteStore>,
    llm: Arc<dyn LlmClient>,
    usage: Arc<UsageTracker>,
    history_window: usize,
}

impl ChatService {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        llm: Arc<dyn LlmClient>,
        usage: Arc<UsageTracker>,
    ) -> Self {
        Self {
            remote,
            llm,
            usage,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Open a new conversation thread.
    pub async fn create_conversation(&self, user_id: &str) -> Result<Conversation, ChatError> {
        let value = self
            .remote
            .insert_record(
                CONVERSATION_TABLE,
                json!({
                    "id": Uuid::new_v4().to_string(),
                    "user_id": user_id,
                    "created_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;
        Ok(serde_json::from_value(value).map_err(RemoteError::from)?)
    }

    /// Full message history of a conversation, oldest first.
    pub async fn history(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, ChatError> {
        let rows = self
            .remote
            .query_records(
                MESSAGE_TABLE,
                &Filter::new().eq("conversation_id", conversation_id),
                Some("created_at"),
            )
            .await?;
        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            messages.push(serde_json::from_value(row).map_err(RemoteError::from)?);
        }
        Ok(messages)
    }

    /// Send one user message and return the companion's reply.
    ///
    /// The quota gate runs first: a denied check returns
    /// [`ChatError::LimitReached`] without touching the conversation. On
    /// success both turns are persisted and the usage counter is bumped.
    pub async fn send_message(
        &self,
        user_id: &str,
        conversation_id: &str,
        text: &str,
    ) -> Result<String, ChatError> {
        if !self.usage.can_use_chat(user_id).await {
            return Err(ChatError::LimitReached);
        }

        self.save_message(user_id, conversation_id, Role::User, text)
            .await?;

        let history = self.history(conversation_id).await?;
        let context = completion_context(&history, self.history_window);
        let reply = self
            .llm
            .complete(
                SYSTEM_PROMPT,
                &context,
                MAX_COMPLETION_TOKENS,
                COMPLETION_TEMPERATURE,
            )
            .await?;

        self.save_message(user_id, conversation_id, Role::Assistant, &reply)
            .await?;
        self.usage.increment_usage(user_id).await;

        Ok(reply)
    }

    async fn save_message(
        &self,
        user_id: &str,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ChatMessage, ChatError> {
        let value = self
            .remote
            .insert_record(
                MESSAGE_TABLE,
                json!({
                    "user_id": user_id,
                    "conversation_id": conversation_id,
                    "role": role,
                    "content": content,
                    "created_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;
        Ok(serde_json::from_value(value).map_err(RemoteError::from)?)
    }
}

/// Trim persisted history down to the completion context window.
fn completion_context(history: &[ChatMessage], window: usize) -> Vec<CompletionTurn> {
    let start = history.len().saturating_sub(window);
    history[start..]
        .iter()
        .map(|message| CompletionTurn {
            role: message.role,
            content: message.content.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlement::{EntitlementResolver, ProductCatalog, PROFILE_TABLE};
    use crate::error::LlmError;
    use crate::quota::USAGE_TABLE;
    use crate::remote::testing::MemoryRemoteStore;
    use crate::storage::{LocalCache, MemoryCache};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedLlm {
        reply: String,
        calls: Mutex<Vec<usize>>,
    }

    impl CannedLlm {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.into(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn context_sizes(&self) -> Vec<usize> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn complete(
            &self,
            _system: &str,
            messages: &[CompletionTurn],
            _max_tokens: u32,
            _temperature: f32,
        ) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push(messages.len());
            Ok(self.reply.clone())
        }
    }

    fn service(llm: Arc<CannedLlm>) -> (Arc<MemoryRemoteStore>, ChatService) {
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.seed(PROFILE_TABLE, json!({"id": "u1", "is_premium": false}));
        let cache = Arc::new(MemoryCache::new());
        let entitlements = Arc::new(EntitlementResolver::new(
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            Arc::clone(&cache) as Arc<dyn LocalCache>,
            ProductCatalog::default(),
        ));
        let usage = Arc::new(UsageTracker::new(
            entitlements,
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            cache as Arc<dyn LocalCache>,
        ));
        let service = ChatService::new(
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            llm as Arc<dyn LlmClient>,
            usage,
        );
        (remote, service)
    }

    #[tokio::test]
    async fn send_persists_both_turns_and_counts_usage() {
        let llm = Arc::new(CannedLlm::new("hoo, I hear you"));
        let (remote, service) = service(Arc::clone(&llm));
        let conversation = service.create_conversation("u1").await.expect("conversation");

        let reply = service
            .send_message("u1", &conversation.id, "rough day")
            .await
            .expect("reply");
        assert_eq!(reply, "hoo, I hear you");

        let history = service.history(&conversation.id).await.expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "rough day");
        assert_eq!(history[1].role, Role::Assistant);

        assert_eq!(remote.records(USAGE_TABLE)[0]["day_count"], 1);
    }

    #[tokio::test]
    async fn quota_denial_blocks_before_any_write() {
        let llm = Arc::new(CannedLlm::new("never sent"));
        let (remote, service) = service(Arc::clone(&llm));
        remote.seed(
            USAGE_TABLE,
            json!({
                "user_id": "u1",
                "day_count": 5,
                "day_limit": 5,
                "last_reset": Utc::now().to_rfc3339(),
            }),
        );
        let conversation = service.create_conversation("u1").await.expect("conversation");

        let err = service
            .send_message("u1", &conversation.id, "one more?")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::LimitReached));
        assert!(service.history(&conversation.id).await.unwrap().is_empty());
        assert!(llm.context_sizes().is_empty());
    }

    #[tokio::test]
    async fn context_window_trims_old_turns() {
        let llm = Arc::new(CannedLlm::new("ok"));
        let (_remote, service) = service(Arc::clone(&llm));
        let service = service.with_history_window(4);
        let conversation = service.create_conversation("u1").await.expect("conversation");

        for i in 0..4 {
            service
                .send_message("u1", &conversation.id, &format!("message {i}"))
                .await
                .expect("reply");
        }

        // Persisted turns grow 1, 3, 5, 7 as each send adds a user and an
        // assistant message; the window caps what the model sees at 4.
        assert_eq!(llm.context_sizes(), vec![1, 3, 4, 4]);
    }

    #[test]
    fn completion_context_keeps_the_tail() {
        let history: Vec<ChatMessage> = (0..6)
            .map(|i| ChatMessage {
                id: format!("m{i}"),
                conversation_id: "c".into(),
                role: if i % 2 == 0 { Role::User } else { Role::Assistant },
                content: format!("turn {i}"),
                created_at: None,
            })
            .collect();

        let context = completion_context(&history, 4);
        assert_eq!(context.len(), 4);
        assert_eq!(context[0].content, "turn 2");
        assert_eq!(context[3].content, "turn 5");
    }
}
