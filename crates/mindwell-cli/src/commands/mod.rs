pub mod breathe;
pub mod chat;
pub mod config;
pub mod meditate;
pub mod premium;
pub mod quota;

use std::sync::Arc;

use mindwell_core::entitlement::ProductCatalog;
use mindwell_core::{
    Config, EntitlementResolver, HttpRemoteStore, LocalCache, RemoteStore, SqliteCache,
    UsageTracker,
};

/// Shared service wiring for commands that talk to the backend.
pub struct Services {
    pub config: Config,
    pub remote: Arc<dyn RemoteStore>,
    pub cache: Arc<dyn LocalCache>,
    pub entitlements: Arc<EntitlementResolver>,
    pub usage: Arc<UsageTracker>,
}

pub fn connect() -> Result<Services, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let cache: Arc<dyn LocalCache> = Arc::new(SqliteCache::open()?);
    let remote: Arc<dyn RemoteStore> = Arc::new(HttpRemoteStore::from_config(&config.remote)?);
    let catalog = ProductCatalog::from_config(&config.products);
    let entitlements = Arc::new(EntitlementResolver::new(
        Arc::clone(&remote),
        Arc::clone(&cache),
        catalog,
    ));
    let usage = Arc::new(UsageTracker::new(
        Arc::clone(&entitlements),
        Arc::clone(&remote),
        Arc::clone(&cache),
    ));
    Ok(Services {
        config,
        remote,
        cache,
        entitlements,
        usage,
    })
}
