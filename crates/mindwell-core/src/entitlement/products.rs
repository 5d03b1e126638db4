//! Store product catalog and subscription periods.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::ProductsConfig;

/// Billing period of a subscription product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionType {
    Monthly,
    Yearly,
}

impl SubscriptionType {
    /// Entitlement expiry for a purchase activated at `from`.
    ///
    /// Calendar arithmetic, not fixed-duration seconds: Jan 31 + 1 month
    /// clamps to the last day of February.
    pub fn expiry_from(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        let months = match self {
            SubscriptionType::Monthly => Months::new(1),
            SubscriptionType::Yearly => Months::new(12),
        };
        from.checked_add_months(months).unwrap_or(from)
    }
}

/// Known store product identifiers, split by billing period.
///
/// Classification is by exact match; anything else is rejected by the
/// entitlement resolver.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    monthly: Vec<String>,
    yearly: Vec<String>,
}

impl ProductCatalog {
    pub fn new(monthly: Vec<String>, yearly: Vec<String>) -> Self {
        Self { monthly, yearly }
    }

    pub fn from_config(products: &ProductsConfig) -> Self {
        Self::new(products.monthly.clone(), products.yearly.clone())
    }

    pub fn classify(&self, product_id: &str) -> Option<SubscriptionType> {
        if self.monthly.iter().any(|sku| sku == product_id) {
            Some(SubscriptionType::Monthly)
        } else if self.yearly.iter().any(|sku| sku == product_id) {
            Some(SubscriptionType::Yearly)
        } else {
            None
        }
    }

    /// Every identifier, for a platform product-info request.
    pub fn all_skus(&self) -> Vec<String> {
        self.monthly
            .iter()
            .chain(self.yearly.iter())
            .cloned()
            .collect()
    }
}
