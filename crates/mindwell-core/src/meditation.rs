//! Guided meditation catalog.
//!
//! Sessions are authored server-side; the device keeps a JSON shadow of the
//! list under the `meditation_sessions` cache key so browsing works
//! offline. Progress rows are upserted per user and session.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::remote::{Filter, RemoteError, RemoteStore};
use crate::storage::cache::keys;
use crate::storage::{LocalCache, LocalCacheExt};

pub const SESSION_TABLE: &str = "meditation_sessions";
pub const PROGRESS_TABLE: &str = "meditation_progress";

/// One guided meditation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeditationSession {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub duration_min: u32,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub sort_order: i64,
}

pub struct MeditationCatalog {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn LocalCache>,
}

impl MeditationCatalog {
    pub fn new(remote: Arc<dyn RemoteStore>, cache: Arc<dyn LocalCache>) -> Self {
        Self { remote, cache }
    }

    /// All sessions in display order.
    ///
    /// A successful fetch refreshes the cached list; on failure the cached
    /// list is served instead, and only an empty cache propagates the
    /// error.
    pub async fn all_sessions(&self) -> Result<Vec<MeditationSession>, RemoteError> {
        match self
            .remote
            .query_records(SESSION_TABLE, &Filter::new(), Some("sort_order"))
            .await
        {
            Ok(rows) => {
                let sessions = rows
                    .into_iter()
                    .map(serde_json::from_value)
                    .collect::<Result<Vec<MeditationSession>, _>>()?;
                self.cache.set_json(keys::MEDITATION_SESSIONS, &sessions);
                Ok(sessions)
            }
            Err(err) => {
                warn!(error = %err, "meditation catalog fell back to local cache");
                match self
                    .cache
                    .get_json::<Vec<MeditationSession>>(keys::MEDITATION_SESSIONS)
                {
                    Some(sessions) if !sessions.is_empty() => Ok(sessions),
                    _ => Err(err),
                }
            }
        }
    }

    /// A single session, from the store or the cached list.
    pub async fn session_by_id(
        &self,
        session_id: &str,
    ) -> Result<Option<MeditationSession>, RemoteError> {
        match self
            .remote
            .get_record(SESSION_TABLE, &Filter::new().eq("id", session_id))
            .await
        {
            Ok(value) => Ok(Some(serde_json::from_value(value)?)),
            Err(RemoteError::NotFound) => Ok(None),
            Err(err) => {
                warn!(session_id, error = %err, "session lookup fell back to local cache");
                let cached: Vec<MeditationSession> = self
                    .cache
                    .get_json(keys::MEDITATION_SESSIONS)
                    .unwrap_or_default();
                Ok(cached.into_iter().find(|s| s.id == session_id))
            }
        }
    }

    /// Record one completed practice (upsert of the per-user progress row).
    pub async fn record_completion(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<(), RemoteError> {
        let filter = Filter::new()
            .eq("user_id", user_id)
            .eq("session_id", session_id);
        let now = Utc::now().to_rfc3339();

        match self.remote.get_record(PROGRESS_TABLE, &filter).await {
            Ok(row) => {
                let completed = row
                    .get("completed_count")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                self.remote
                    .update_record(
                        PROGRESS_TABLE,
                        &filter,
                        json!({
                            "completed_count": completed + 1,
                            "last_practiced_at": now,
                        }),
                    )
                    .await?;
            }
            Err(RemoteError::NotFound) => {
                self.remote
                    .insert_record(
                        PROGRESS_TABLE,
                        json!({
                            "user_id": user_id,
                            "session_id": session_id,
                            "completed_count": 1,
                            "last_practiced_at": now,
                        }),
                    )
                    .await?;
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }
}
