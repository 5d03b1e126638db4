//! Platform purchase collaborator and the purchase/restore flows.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, PurchaseError};

use super::EntitlementResolver;

/// A store product as reported by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_id: String,
    /// Localized display price.
    pub price: String,
    #[serde(default)]
    pub period: Option<String>,
}

/// A completed platform purchase, pending entitlement activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchasePayload {
    pub product_id: String,
    pub transaction_id: String,
    pub transaction_date: DateTime<Utc>,
    /// Platform identifier ("apple", "google").
    pub provider: String,
}

/// Black-box platform in-app-purchase API.
///
/// Implementations wrap the store SDK of whatever platform the app ships
/// on. User cancellation is a distinct outcome (`PurchaseError::Cancelled`),
/// not a failure.
#[async_trait]
pub trait PurchaseProvider: Send + Sync {
    /// Platform identifier recorded on the subscription audit trail.
    fn name(&self) -> &str;

    async fn get_products(&self, skus: &[String]) -> Result<Vec<ProductInfo>, PurchaseError>;

    async fn purchase(&self, product_id: &str) -> Result<PurchasePayload, PurchaseError>;

    async fn restore_purchases(&self) -> Result<Vec<PurchasePayload>, PurchaseError>;
}

/// Glue between the platform store and the entitlement resolver.
pub struct SubscriptionManager {
    provider: Arc<dyn PurchaseProvider>,
    entitlements: Arc<EntitlementResolver>,
}

impl SubscriptionManager {
    pub fn new(provider: Arc<dyn PurchaseProvider>, entitlements: Arc<EntitlementResolver>) -> Self {
        Self {
            provider,
            entitlements,
        }
    }

    /// Available subscription products, as reported by the platform store.
    pub async fn products(&self) -> Result<Vec<ProductInfo>, PurchaseError> {
        self.provider
            .get_products(&self.entitlements.catalog().all_skus())
            .await
    }

    /// Run a purchase end to end.
    ///
    /// `Ok(false)` means the user cancelled. Any other failure to grant the
    /// entitlement propagates (fail closed): "purchase not completed".
    pub async fn purchase(&self, user_id: &str, product_id: &str) -> Result<bool, CoreError> {
        let payload = match self.provider.purchase(product_id).await {
            Ok(payload) => payload,
            Err(PurchaseError::Cancelled) => {
                debug!(user_id, product_id, "purchase cancelled by user");
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };
        self.entitlements
            .activate_entitlement(user_id, &payload)
            .await?;
        Ok(true)
    }

    /// Replay restored purchases through activation.
    ///
    /// Returns true iff at least one recognized product was restored and
    /// activated. Unrecognized products are skipped, not fatal.
    pub async fn restore(&self, user_id: &str) -> Result<bool, CoreError> {
        let payloads = self.provider.restore_purchases().await?;
        let mut restored = false;
        for payload in &payloads {
            match self.entitlements.activate_entitlement(user_id, payload).await {
                Ok(()) => restored = true,
                Err(CoreError::Purchase(PurchaseError::UnknownProduct(id))) => {
                    debug!(user_id, product_id = %id, "skipping unrecognized restored product");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlement::{ProductCatalog, PROFILE_TABLE};
    use crate::remote::testing::MemoryRemoteStore;
    use crate::remote::RemoteStore;
    use crate::storage::{LocalCache, MemoryCache};
    use serde_json::json;
    use std::sync::Mutex;

    enum Script {
        Grant(&'static str),
        Cancel,
        Fail,
    }

    struct ScriptedProvider {
        script: Mutex<Vec<Script>>,
        restorable: Vec<&'static str>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Script>) -> Self {
            Self {
                script: Mutex::new(script),
                restorable: Vec::new(),
            }
        }

        fn with_restorable(restorable: Vec<&'static str>) -> Self {
            Self {
                script: Mutex::new(Vec::new()),
                restorable,
            }
        }

        fn payload(product_id: &str) -> PurchasePayload {
            PurchasePayload {
                product_id: product_id.into(),
                transaction_id: format!("txn-{product_id}"),
                transaction_date: Utc::now(),
                provider: "apple".into(),
            }
        }
    }

    #[async_trait]
    impl PurchaseProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "apple"
        }

        async fn get_products(&self, skus: &[String]) -> Result<Vec<ProductInfo>, PurchaseError> {
            Ok(skus
                .iter()
                .map(|sku| ProductInfo {
                    product_id: sku.clone(),
                    price: "$4.99".into(),
                    period: None,
                })
                .collect())
        }

        async fn purchase(&self, product_id: &str) -> Result<PurchasePayload, PurchaseError> {
            match self.script.lock().unwrap().remove(0) {
                Script::Grant(id) => Ok(Self::payload(id)),
                Script::Cancel => Err(PurchaseError::Cancelled),
                Script::Fail => Err(PurchaseError::Provider(format!(
                    "store rejected {product_id}"
                ))),
            }
        }

        async fn restore_purchases(&self) -> Result<Vec<PurchasePayload>, PurchaseError> {
            Ok(self
                .restorable
                .iter()
                .map(|id| Self::payload(id))
                .collect())
        }
    }

    fn manager(provider: ScriptedProvider) -> (Arc<MemoryRemoteStore>, SubscriptionManager) {
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.seed(PROFILE_TABLE, json!({"id": "u1", "is_premium": false}));
        let cache = Arc::new(MemoryCache::new());
        let catalog = ProductCatalog::new(
            vec!["com.mindwell.app.monthly".into()],
            vec!["com.mindwell.app.yearly".into()],
        );
        let entitlements = Arc::new(EntitlementResolver::new(
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            cache as Arc<dyn LocalCache>,
            catalog,
        ));
        (remote, SubscriptionManager::new(Arc::new(provider), entitlements))
    }

    #[tokio::test]
    async fn successful_purchase_grants_entitlement() {
        let (remote, manager) = manager(ScriptedProvider::new(vec![Script::Grant(
            "com.mindwell.app.monthly",
        )]));

        let granted = manager
            .purchase("u1", "com.mindwell.app.monthly")
            .await
            .expect("purchase");
        assert!(granted);
        assert_eq!(remote.records(PROFILE_TABLE)[0]["is_premium"], true);
    }

    #[tokio::test]
    async fn cancellation_is_not_an_error_and_grants_nothing() {
        let (remote, manager) = manager(ScriptedProvider::new(vec![Script::Cancel]));

        let granted = manager
            .purchase("u1", "com.mindwell.app.monthly")
            .await
            .expect("cancel outcome");
        assert!(!granted);
        assert_eq!(remote.records(PROFILE_TABLE)[0]["is_premium"], false);
    }

    #[tokio::test]
    async fn provider_failure_fails_closed() {
        let (remote, manager) = manager(ScriptedProvider::new(vec![Script::Fail]));

        let err = manager
            .purchase("u1", "com.mindwell.app.monthly")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Purchase(PurchaseError::Provider(_))));
        assert_eq!(remote.records(PROFILE_TABLE)[0]["is_premium"], false);
    }

    #[tokio::test]
    async fn restore_activates_known_products_and_skips_unknown() {
        let (remote, manager) = manager(ScriptedProvider::with_restorable(vec![
            "some_legacy_sku",
            "com.mindwell.app.yearly",
        ]));

        let restored = manager.restore("u1").await.expect("restore");
        assert!(restored);
        assert_eq!(remote.records(PROFILE_TABLE)[0]["is_premium"], true);
    }

    #[tokio::test]
    async fn restore_with_nothing_recognized_reports_false() {
        let (remote, manager) =
            manager(ScriptedProvider::with_restorable(vec!["some_legacy_sku"]));

        let restored = manager.restore("u1").await.expect("restore");
        assert!(!restored);
        assert_eq!(remote.records(PROFILE_TABLE)[0]["is_premium"], false);
    }
}
