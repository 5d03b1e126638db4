//! # Mindwell Core Library
//!
//! This library provides the core business logic for the Mindwell wellness
//! companion. It implements a CLI-first philosophy where all operations are
//! available via a standalone CLI binary, with any GUI shell being a thin
//! layer over the same core library.
//!
//! ## Architecture
//!
//! - **Quota**: daily free-tier message tracking with lazy 24-hour resets,
//!   remote-first with a local cache fallback
//! - **Entitlement**: premium resolution, purchase activation and lazy
//!   expiry against the remote profile, with a subscription audit trail
//! - **Breathing**: a pure phase state machine plus a tokio driver for
//!   guided exercises
//! - **Chat**: companion conversations persisted remotely and answered by
//!   a text-completion collaborator, gated by the quota
//! - **Storage**: SQLite-backed key-value cache mirror and TOML-based
//!   configuration
//!
//! ## Key Components
//!
//! - [`UsageTracker`]: quota checks and counting
//! - [`EntitlementResolver`]: premium state machine
//! - [`PhaseSequencer`] / [`BreathingSession`]: guided breathing
//! - [`ChatService`]: companion chat
//! - [`RemoteStore`]: injected remote backend seam

pub mod breathing;
pub mod chat;
pub mod entitlement;
pub mod error;
pub mod meditation;
pub mod quota;
pub mod remote;
pub mod storage;

pub use breathing::{BreathingSession, ExerciseKind, Phase, PhaseSequencer};
pub use chat::{AnthropicClient, ChatService, CompletionTurn, LlmClient};
pub use entitlement::{
    EntitlementResolver, ProductCatalog, PurchasePayload, PurchaseProvider, SubscriptionManager,
    SubscriptionType,
};
pub use error::{ChatError, ConfigError, CoreError, LlmError, PurchaseError};
pub use meditation::{MeditationCatalog, MeditationSession};
pub use quota::{UsageRecord, UsageTracker};
pub use remote::{Filter, HttpRemoteStore, RemoteError, RemoteStore};
pub use storage::{Config, LocalCache, LocalCacheExt, MemoryCache, SqliteCache};
