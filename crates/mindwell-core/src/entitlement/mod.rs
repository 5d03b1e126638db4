//! Premium entitlement resolution and subscription lifecycle.
//!
//! Entitlement state lives on the user profile (`is_premium` +
//! `premium_until`); each verified purchase also appends an audit row to the
//! `subscriptions` table. Expiry is detected lazily on the next read, never
//! by a background timer:
//!
//! ```text
//! FREE -> (verified purchase) -> PREMIUM -> (expiry detected | cancel) -> FREE
//! ```

mod products;
mod provider;

pub use products::{ProductCatalog, SubscriptionType};
pub use provider::{ProductInfo, PurchasePayload, PurchaseProvider, SubscriptionManager};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{CoreError, PurchaseError};
use crate::remote::{Filter, RemoteError, RemoteStore};
use crate::storage::cache::keys;
use crate::storage::LocalCache;

pub const PROFILE_TABLE: &str = "profiles";
pub const SUBSCRIPTION_TABLE: &str = "subscriptions";

/// Premium entitlement fields embedded in the user profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitlementRecord {
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub premium_until: Option<DateTime<Utc>>,
}

impl EntitlementRecord {
    /// Active right now. A record claiming premium past its expiry (or with
    /// no expiry at all) is stale and must be deactivated before being
    /// trusted.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.is_premium && self.premium_until.map(|until| until > now).unwrap_or(false)
    }
}

/// Lifecycle state recorded on the subscription audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    Expired,
}

/// One row of the append-only `subscriptions` audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub user_id: String,
    pub subscription_type: SubscriptionType,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Platform identifier ("apple", "google").
    pub provider: String,
    pub provider_subscription_id: String,
}

/// Resolves and maintains the premium entitlement for a user.
pub struct EntitlementResolver {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn LocalCache>,
    catalog: ProductCatalog,
}

impl EntitlementResolver {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn LocalCache>,
        catalog: ProductCatalog,
    ) -> Self {
        Self {
            remote,
            cache,
            catalog,
        }
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    /// Whether the user currently holds an active premium entitlement.
    ///
    /// Never errors: a remote failure degrades to the cached answer under
    /// the same expiry rule, defaulting to free.
    pub async fn is_premium_user(&self, user_id: &str) -> bool {
        match self.resolve_remote(user_id).await {
            Ok(active) => active,
            Err(RemoteError::NotFound) => false,
            Err(err) => {
                warn!(user_id, error = %err, "entitlement check fell back to local cache");
                self.resolve_cached()
            }
        }
    }

    async fn resolve_remote(&self, user_id: &str) -> Result<bool, RemoteError> {
        let value = self
            .remote
            .get_record(PROFILE_TABLE, &Filter::new().eq("id", user_id))
            .await?;
        let record: EntitlementRecord = serde_json::from_value(value)?;

        if !record.is_premium {
            return Ok(false);
        }
        if record.is_active(Utc::now()) {
            self.mirror(&record);
            return Ok(true);
        }
        // Expired while marked premium: deactivate before trusting anything.
        if let Err(err) = self.deactivate_entitlement(user_id).await {
            warn!(user_id, error = %err, "failed to deactivate expired entitlement");
        }
        Ok(false)
    }

    fn resolve_cached(&self) -> bool {
        if !self.cache.get_bool(keys::IS_PREMIUM).unwrap_or(false) {
            return false;
        }
        self.cache
            .get_string(keys::PREMIUM_UNTIL)
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|until| until.with_timezone(&Utc) > Utc::now())
            .unwrap_or(false)
    }

    /// Grant premium for a verified purchase. Fails closed: any error here
    /// means the entitlement was not granted.
    ///
    /// Expiry is computed from the activation instant, so a repeated call
    /// for the same purchase extends from "now" rather than the original
    /// purchase time; callers invoke this once per verified purchase event.
    pub async fn activate_entitlement(
        &self,
        user_id: &str,
        purchase: &PurchasePayload,
    ) -> Result<(), CoreError> {
        let subscription_type = self
            .catalog
            .classify(&purchase.product_id)
            .ok_or_else(|| PurchaseError::UnknownProduct(purchase.product_id.clone()))?;

        let now = Utc::now();
        let premium_until = subscription_type.expiry_from(now);

        self.remote
            .update_record(
                PROFILE_TABLE,
                &Filter::new().eq("id", user_id),
                json!({
                    "is_premium": true,
                    "premium_until": premium_until.to_rfc3339(),
                }),
            )
            .await?;

        let row = SubscriptionRecord {
            user_id: user_id.to_string(),
            subscription_type,
            status: SubscriptionStatus::Active,
            start_date: now,
            end_date: premium_until,
            provider: purchase.provider.clone(),
            provider_subscription_id: purchase.transaction_id.clone(),
        };
        let fields = serde_json::to_value(&row).map_err(RemoteError::from)?;
        self.remote
            .insert_record(SUBSCRIPTION_TABLE, fields)
            .await?;

        self.cache.set_bool(keys::IS_PREMIUM, true);
        self.cache
            .set_string(keys::PREMIUM_UNTIL, &premium_until.to_rfc3339());

        info!(user_id, kind = ?subscription_type, until = %premium_until, "premium entitlement activated");
        Ok(())
    }

    /// Clear premium after expiry detection or explicit cancellation.
    pub async fn deactivate_entitlement(&self, user_id: &str) -> Result<(), RemoteError> {
        self.remote
            .update_record(
                PROFILE_TABLE,
                &Filter::new().eq("id", user_id),
                json!({
                    "is_premium": false,
                    "premium_until": Value::Null,
                }),
            )
            .await?;

        // Close out the active audit row; absence is fine (legacy grants).
        match self
            .remote
            .update_record(
                SUBSCRIPTION_TABLE,
                &Filter::new().eq("user_id", user_id).eq("status", "active"),
                json!({ "status": "expired" }),
            )
            .await
        {
            Ok(_) | Err(RemoteError::NotFound) => {}
            Err(err) => return Err(err),
        }

        self.cache.delete(keys::IS_PREMIUM);
        self.cache.delete(keys::PREMIUM_UNTIL);

        info!(user_id, "premium entitlement deactivated");
        Ok(())
    }

    fn mirror(&self, record: &EntitlementRecord) {
        self.cache.set_bool(keys::IS_PREMIUM, record.is_premium);
        if let Some(until) = record.premium_until {
            self.cache.set_string(keys::PREMIUM_UNTIL, &until.to_rfc3339());
        }
    }
}
