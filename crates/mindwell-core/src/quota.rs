//! Daily chat usage quota tracking.
//!
//! Free-tier users get a fixed number of companion messages per rolling
//! 24-hour window; premium users are unbounded and never counted. The
//! remote store is the source of truth, and every successful read or write
//! is mirrored into the local cache so the check keeps working offline.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::entitlement::EntitlementResolver;
use crate::remote::{Filter, RemoteError, RemoteStore};
use crate::storage::cache::keys;
use crate::storage::LocalCache;

pub const USAGE_TABLE: &str = "chat_usage";

/// Default per-day message cap for free-tier users.
pub const DEFAULT_DAY_LIMIT: u32 = 5;

/// Width of the counting window, in hours. Counts reset lazily once this
/// much time has passed since `last_reset`.
const RESET_WINDOW_HOURS: i64 = 24;

/// One row of the `chat_usage` table: the per-user counter for the current
/// window. Created lazily on the first counted send; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub user_id: String,
    pub day_count: u32,
    pub day_limit: u32,
    pub last_reset: DateTime<Utc>,
}

impl UsageRecord {
    /// Whether the counting window has lapsed. A stale record must be reset
    /// before being consulted or incremented.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.last_reset >= Duration::hours(RESET_WINDOW_HOURS)
    }

    /// Whether another counted action fits under the cap.
    pub fn allows(&self) -> bool {
        self.day_count < self.day_limit
    }

    pub fn remaining(&self) -> u32 {
        self.day_limit.saturating_sub(self.day_count)
    }
}

/// Tracks and enforces the free-tier daily message quota.
///
/// `can_use_chat` and `increment_usage` are separate awaited calls with no
/// atomic guard between them; concurrent sessions for the same user could
/// both pass the check before either increments. A single client serializes
/// one outstanding send at a time, so this is only observable across
/// devices, and the remote store remains the arbiter.
pub struct UsageTracker {
    entitlements: Arc<EntitlementResolver>,
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn LocalCache>,
}

impl UsageTracker {
    pub fn new(
        entitlements: Arc<EntitlementResolver>,
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn LocalCache>,
    ) -> Self {
        Self {
            entitlements,
            remote,
            cache,
        }
    }

    /// Whether the user may send a companion message right now.
    ///
    /// Never errors: a remote failure degrades to a cache-only evaluation
    /// under the same reset rule. Premium users are always allowed and
    /// never consulted against the counter.
    pub async fn can_use_chat(&self, user_id: &str) -> bool {
        if self.entitlements.is_premium_user(user_id).await {
            return true;
        }
        match self.check_remote(user_id).await {
            Ok(allowed) => allowed,
            Err(err) => {
                warn!(user_id, error = %err, "usage check fell back to local cache");
                self.check_cached()
            }
        }
    }

    /// Count one sent message.
    ///
    /// No-op for premium users. The first counted send lazily creates the
    /// usage record with `day_count = 1`; `can_use_chat` never writes on an
    /// absent record, so the two call sites cannot double-count. On remote
    /// failure only the cached count is bumped, leaving reconciliation to
    /// the next successful call.
    pub async fn increment_usage(&self, user_id: &str) {
        if self.entitlements.is_premium_user(user_id).await {
            return;
        }
        if let Err(err) = self.increment_remote(user_id).await {
            warn!(user_id, error = %err, "usage increment fell back to local cache");
            let count = self.cache.get_i64(keys::CHAT_DAY_COUNT).unwrap_or(0);
            self.cache.set_i64(keys::CHAT_DAY_COUNT, count + 1);
        }
    }

    /// Messages left in the current window. `None` means unbounded
    /// (premium).
    pub async fn remaining_messages(&self, user_id: &str) -> Option<u32> {
        if self.entitlements.is_premium_user(user_id).await {
            return None;
        }
        match self.fetch(user_id).await {
            Ok(record) => {
                if record.is_stale(Utc::now()) {
                    Some(record.day_limit)
                } else {
                    Some(record.remaining())
                }
            }
            Err(RemoteError::NotFound) => Some(DEFAULT_DAY_LIMIT),
            Err(err) => {
                warn!(user_id, error = %err, "remaining-message count fell back to local cache");
                let count = self.cache.get_i64(keys::CHAT_DAY_COUNT).unwrap_or(0);
                let limit = self
                    .cache
                    .get_i64(keys::CHAT_DAY_LIMIT)
                    .unwrap_or(DEFAULT_DAY_LIMIT as i64);
                Some(limit.saturating_sub(count).max(0) as u32)
            }
        }
    }

    // ── Remote path ──────────────────────────────────────────────────

    async fn check_remote(&self, user_id: &str) -> Result<bool, RemoteError> {
        let record = match self.fetch(user_id).await {
            Ok(record) => record,
            // First use: allowed, record creation belongs to increment_usage.
            Err(RemoteError::NotFound) => return Ok(true),
            Err(err) => return Err(err),
        };

        let now = Utc::now();
        if record.is_stale(now) {
            self.reset_remote(&record, now).await?;
            return Ok(true);
        }

        self.mirror(&record);
        Ok(record.allows())
    }

    async fn increment_remote(&self, user_id: &str) -> Result<(), RemoteError> {
        let now = Utc::now();
        let mut record = match self.fetch(user_id).await {
            Ok(record) => record,
            Err(RemoteError::NotFound) => return self.initialize(user_id, now).await,
            Err(err) => return Err(err),
        };

        if record.is_stale(now) {
            record.day_count = 0;
            record.last_reset = now;
        }
        record.day_count += 1;

        self.remote
            .update_record(
                USAGE_TABLE,
                &Filter::new().eq("user_id", user_id),
                serde_json::json!({
                    "day_count": record.day_count,
                    "last_reset": record.last_reset.to_rfc3339(),
                }),
            )
            .await?;
        self.mirror(&record);
        Ok(())
    }

    async fn fetch(&self, user_id: &str) -> Result<UsageRecord, RemoteError> {
        let value = self
            .remote
            .get_record(USAGE_TABLE, &Filter::new().eq("user_id", user_id))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn initialize(&self, user_id: &str, now: DateTime<Utc>) -> Result<(), RemoteError> {
        let record = UsageRecord {
            user_id: user_id.to_string(),
            day_count: 1,
            day_limit: DEFAULT_DAY_LIMIT,
            last_reset: now,
        };
        let fields = serde_json::to_value(&record)?;
        self.remote.insert_record(USAGE_TABLE, fields).await?;
        self.mirror(&record);
        Ok(())
    }

    async fn reset_remote(&self, record: &UsageRecord, now: DateTime<Utc>) -> Result<(), RemoteError> {
        self.remote
            .update_record(
                USAGE_TABLE,
                &Filter::new().eq("user_id", &record.user_id),
                serde_json::json!({
                    "day_count": 0,
                    "last_reset": now.to_rfc3339(),
                }),
            )
            .await?;
        let reset = UsageRecord {
            day_count: 0,
            last_reset: now,
            ..record.clone()
        };
        self.mirror(&reset);
        Ok(())
    }

    fn mirror(&self, record: &UsageRecord) {
        self.cache.set_i64(keys::CHAT_DAY_COUNT, record.day_count as i64);
        self.cache.set_i64(keys::CHAT_DAY_LIMIT, record.day_limit as i64);
        self.cache
            .set_string(keys::CHAT_LAST_RESET, &record.last_reset.to_rfc3339());
    }

    // ── Cache fallback ───────────────────────────────────────────────

    fn check_cached(&self) -> bool {
        let day_count = self.cache.get_i64(keys::CHAT_DAY_COUNT).unwrap_or(0);
        let day_limit = self
            .cache
            .get_i64(keys::CHAT_DAY_LIMIT)
            .unwrap_or(DEFAULT_DAY_LIMIT as i64);
        let last_reset = self
            .cache
            .get_string(keys::CHAT_LAST_RESET)
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc));

        // No window recorded yet: first use.
        let Some(last_reset) = last_reset else {
            return true;
        };

        let now = Utc::now();
        if now - last_reset >= Duration::hours(RESET_WINDOW_HOURS) {
            self.cache.set_i64(keys::CHAT_DAY_COUNT, 0);
            self.cache.set_string(keys::CHAT_LAST_RESET, &now.to_rfc3339());
            return true;
        }
        day_count < day_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlement::{ProductCatalog, PROFILE_TABLE};
    use crate::remote::testing::MemoryRemoteStore;
    use crate::storage::MemoryCache;
    use proptest::prelude::*;
    use serde_json::json;

    fn make_tracker() -> (Arc<MemoryRemoteStore>, Arc<MemoryCache>, UsageTracker) {
        let remote = Arc::new(MemoryRemoteStore::new());
        let cache = Arc::new(MemoryCache::new());
        let entitlements = Arc::new(EntitlementResolver::new(
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            Arc::clone(&cache) as Arc<dyn LocalCache>,
            ProductCatalog::new(vec!["com.mindwell.app.monthly".into()], vec![]),
        ));
        let tracker = UsageTracker::new(
            entitlements,
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            Arc::clone(&cache) as Arc<dyn LocalCache>,
        );
        (remote, cache, tracker)
    }

    fn seed_usage(remote: &MemoryRemoteStore, user_id: &str, count: u32, limit: u32, reset: DateTime<Utc>) {
        remote.seed(
            USAGE_TABLE,
            json!({
                "user_id": user_id,
                "day_count": count,
                "day_limit": limit,
                "last_reset": reset.to_rfc3339(),
            }),
        );
    }

    #[tokio::test]
    async fn below_cap_is_allowed_at_cap_is_denied() {
        let (remote, _cache, tracker) = make_tracker();
        remote.seed(PROFILE_TABLE, json!({"id": "u1", "is_premium": false}));
        seed_usage(&remote, "u1", 4, 5, Utc::now() - Duration::minutes(30));
        assert!(tracker.can_use_chat("u1").await);

        let (remote, _cache, tracker) = make_tracker();
        remote.seed(PROFILE_TABLE, json!({"id": "u1", "is_premium": false}));
        seed_usage(&remote, "u1", 5, 5, Utc::now() - Duration::minutes(30));
        assert!(!tracker.can_use_chat("u1").await);
    }

    #[tokio::test]
    async fn first_use_is_allowed_without_creating_a_record() {
        let (remote, _cache, tracker) = make_tracker();
        remote.seed(PROFILE_TABLE, json!({"id": "u1", "is_premium": false}));

        assert!(tracker.can_use_chat("u1").await);
        assert!(remote.records(USAGE_TABLE).is_empty());
    }

    #[tokio::test]
    async fn stale_record_resets_and_allows() {
        let (remote, cache, tracker) = make_tracker();
        remote.seed(PROFILE_TABLE, json!({"id": "u1", "is_premium": false}));
        seed_usage(&remote, "u1", 5, 5, Utc::now() - Duration::hours(25));

        assert!(tracker.can_use_chat("u1").await);

        let record = &remote.records(USAGE_TABLE)[0];
        assert_eq!(record["day_count"], 0);
        assert_eq!(cache.get_i64(keys::CHAT_DAY_COUNT), Some(0));
    }

    #[tokio::test]
    async fn fresh_record_is_left_untouched() {
        let (remote, _cache, tracker) = make_tracker();
        remote.seed(PROFILE_TABLE, json!({"id": "u1", "is_premium": false}));
        let reset = Utc::now() - Duration::hours(2);
        seed_usage(&remote, "u1", 3, 5, reset);

        assert!(tracker.can_use_chat("u1").await);

        let record = &remote.records(USAGE_TABLE)[0];
        assert_eq!(record["day_count"], 3);
        assert_eq!(record["last_reset"], reset.to_rfc3339());
    }

    #[tokio::test]
    async fn premium_bypasses_quota_and_is_never_counted() {
        let (remote, _cache, tracker) = make_tracker();
        let until = Utc::now() + Duration::days(30);
        remote.seed(
            PROFILE_TABLE,
            json!({"id": "vip", "is_premium": true, "premium_until": until.to_rfc3339()}),
        );
        seed_usage(&remote, "vip", 99, 5, Utc::now());

        assert!(tracker.can_use_chat("vip").await);
        tracker.increment_usage("vip").await;
        assert_eq!(remote.records(USAGE_TABLE)[0]["day_count"], 99);
        assert_eq!(tracker.remaining_messages("vip").await, None);
    }

    #[tokio::test]
    async fn increments_are_monotonic_from_lazy_init() {
        let (remote, _cache, tracker) = make_tracker();
        remote.seed(PROFILE_TABLE, json!({"id": "u1", "is_premium": false}));

        for expected in 1..=3u32 {
            assert!(tracker.can_use_chat("u1").await);
            tracker.increment_usage("u1").await;
            let records = remote.records(USAGE_TABLE);
            assert_eq!(records.len(), 1);
            assert_eq!(records[0]["day_count"], expected);
        }
    }

    #[tokio::test]
    async fn usage_round_trips_through_the_store() {
        let (remote, _cache, tracker) = make_tracker();
        remote.seed(PROFILE_TABLE, json!({"id": "u1", "is_premium": false}));
        tracker.increment_usage("u1").await;

        let record = tracker.fetch("u1").await.expect("record");
        assert_eq!(record.day_count, 1);
        assert_eq!(record.day_limit, DEFAULT_DAY_LIMIT);
        assert!(!record.is_stale(Utc::now()));
    }

    #[tokio::test]
    async fn offline_check_uses_cache_only() {
        let (remote, cache, tracker) = make_tracker();
        remote.set_offline(true);
        cache.set_i64(keys::CHAT_DAY_COUNT, 3);
        cache.set_i64(keys::CHAT_DAY_LIMIT, 5);
        cache.set_string(
            keys::CHAT_LAST_RESET,
            &(Utc::now() - Duration::hours(2)).to_rfc3339(),
        );

        assert!(tracker.can_use_chat("u1").await);

        cache.set_i64(keys::CHAT_DAY_COUNT, 5);
        assert!(!tracker.can_use_chat("u1").await);
    }

    #[tokio::test]
    async fn offline_stale_cache_resets_locally() {
        let (remote, cache, tracker) = make_tracker();
        remote.set_offline(true);
        cache.set_i64(keys::CHAT_DAY_COUNT, 5);
        cache.set_i64(keys::CHAT_DAY_LIMIT, 5);
        cache.set_string(
            keys::CHAT_LAST_RESET,
            &(Utc::now() - Duration::hours(25)).to_rfc3339(),
        );

        assert!(tracker.can_use_chat("u1").await);
        assert_eq!(cache.get_i64(keys::CHAT_DAY_COUNT), Some(0));
    }

    #[tokio::test]
    async fn offline_increment_bumps_cache_only() {
        let (remote, cache, tracker) = make_tracker();
        remote.set_offline(true);
        cache.set_i64(keys::CHAT_DAY_COUNT, 2);

        tracker.increment_usage("u1").await;

        assert_eq!(cache.get_i64(keys::CHAT_DAY_COUNT), Some(3));
        assert!(remote.records(USAGE_TABLE).is_empty());
    }

    #[tokio::test]
    async fn remaining_counts_down_and_floors_at_zero() {
        let (remote, _cache, tracker) = make_tracker();
        remote.seed(PROFILE_TABLE, json!({"id": "u1", "is_premium": false}));
        seed_usage(&remote, "u1", 7, 5, Utc::now());

        assert_eq!(tracker.remaining_messages("u1").await, Some(0));

        let (remote, _cache, tracker) = make_tracker();
        remote.seed(PROFILE_TABLE, json!({"id": "u1", "is_premium": false}));
        assert_eq!(
            tracker.remaining_messages("u1").await,
            Some(DEFAULT_DAY_LIMIT)
        );
    }

    proptest! {
        #[test]
        fn allows_iff_below_limit(day_count in 0u32..200, day_limit in 1u32..200) {
            let record = UsageRecord {
                user_id: "u".into(),
                day_count,
                day_limit,
                last_reset: Utc::now(),
            };
            prop_assert_eq!(record.allows(), day_count < day_limit);
            prop_assert_eq!(record.remaining(), day_limit.saturating_sub(day_count));
        }

        #[test]
        fn staleness_boundary_is_24_hours(hours in 0i64..48) {
            let record = UsageRecord {
                user_id: "u".into(),
                day_count: 0,
                day_limit: 5,
                last_reset: Utc::now() - Duration::hours(hours),
            };
            prop_assert_eq!(record.is_stale(Utc::now()), hours >= 24);
        }
    }
}
