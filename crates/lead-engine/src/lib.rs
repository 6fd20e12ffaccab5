//! Lead lifecycle orchestration for Homni.
//!
//! This crate drives a lead from submission to a paying company:
//!
//! - [`LeadService`] - Authenticated and anonymous lead creation
//! - [`DistributionService`] - Automatic and manual assignment, queue draining
//! - [`ScoringService`] - Quality scores and pricing, plus display helpers
//! - [`BidBoard`] / [`BidWatcher`] - Competitive bidding on a lead
//! - [`AccessService`] - Role, module and feature flag checks that fail closed
//! - [`AddressProviderRegistry`] - Region-specific address lookup
//!
//! Every service talks to storage through the [`LeadBackend`] trait;
//! [`SqliteBackend`] implements it over the `database` crate.
//!
//! # Example
//!
//! ```no_run
//! use lead_engine::{AuthContext, EngineConfig, LeadEngine};
//! use database::LeadInput;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = LeadEngine::connect(EngineConfig::from_env()?).await?;
//!
//!     let input = LeadInput {
//!         title: "Need electrician".to_string(),
//!         description: "Replace the fuse box".to_string(),
//!         category: "electrical".to_string(),
//!         ..LeadInput::default()
//!     };
//!     let created = engine.leads().create_lead(&AuthContext::user("user-1"), input).await?;
//!     println!("{:?}", created.status);
//!
//!     Ok(())
//! }
//! ```

mod access;
mod backend;
mod bidding;
mod config;
mod context;
mod creation;
mod distribution;
mod error;
mod geo;
mod notifier;
mod scoring;
mod sqlite;

pub use access::AccessService;
pub use backend::{BidEvent, BidEventKind, LeadBackend};
pub use bidding::{compute_stats, time_until_expiry, BidBoard, BidSnapshot, BidStats, BidWatcher, EXPIRED_LABEL};
pub use config::{EngineConfig, DEFAULT_BID_EXPIRY_HOURS, DEFAULT_MIN_BUDGET_CENTS};
pub use context::AuthContext;
pub use creation::{format_lead_status, LeadCreation, LeadCreationStatus, LeadService};
pub use distribution::{
    DistributionOutcome, DistributionService, FallbackQueueStats, ManualAssignmentOutcome,
    MatchCriteria,
};
pub use error::{ApiError, BackendError, ConfigError, GeoError};
pub use geo::{
    AddressProvider, AddressProviderRegistry, AddressSuggestion, KartverketProvider,
    NullAddressProvider,
};
pub use notifier::{LoggingNotifier, NoOpNotifier, Notifier, RecordingNotifier, Toast, ToastVariant};
pub use scoring::{format_price, score_color, score_grade, tier_badge_color, ScoringService};
pub use sqlite::SqliteBackend;

use std::sync::Arc;

use database::Database;

/// Error from [`LeadEngine::connect`].
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Database(#[from] database::DatabaseError),
}

/// All lead services sharing one backend, notifier and configuration.
#[derive(Clone)]
pub struct LeadEngine {
    backend: Arc<dyn LeadBackend>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl LeadEngine {
    pub fn new(backend: Arc<dyn LeadBackend>, notifier: Arc<dyn Notifier>, config: EngineConfig) -> Self {
        Self {
            backend,
            notifier,
            config,
        }
    }

    /// Open the configured SQLite database, migrate it, and log toasts.
    pub async fn connect(config: EngineConfig) -> Result<Self, StartupError> {
        let db = Database::connect_with_pool_size(&config.database_url, config.db_pool_size).await?;
        db.migrate().await?;

        Ok(Self::new(
            Arc::new(SqliteBackend::new(db).with_min_budget_cents(config.min_budget_cents)),
            Arc::new(LoggingNotifier),
            config,
        ))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn LeadBackend> {
        &self.backend
    }

    pub fn leads(&self) -> LeadService {
        LeadService::new(self.backend.clone(), self.notifier.clone())
    }

    pub fn distribution(&self) -> DistributionService {
        DistributionService::new(self.backend.clone(), self.config.min_budget_cents)
    }

    pub fn scoring(&self) -> ScoringService {
        ScoringService::new(self.backend.clone())
    }

    pub fn access(&self) -> AccessService {
        AccessService::new(self.backend.clone())
    }

    /// Address providers with the configured default region.
    pub fn address_providers(&self) -> Result<AddressProviderRegistry, GeoError> {
        AddressProviderRegistry::with_defaults(self.config.default_region.as_str())
    }

    /// Open a bid board on a lead for the caller's company.
    pub async fn bid_board(&self, auth: &AuthContext, lead_id: &str) -> Result<BidBoard, ApiError> {
        BidBoard::open(
            self.backend.clone(),
            self.notifier.clone(),
            lead_id,
            auth.company_id.clone(),
            self.config.bid_expiry_hours,
        )
        .await
    }

    /// Follow a lead's bids until the watcher is dropped.
    pub async fn watch_bids(&self, auth: &AuthContext, lead_id: &str) -> Result<BidWatcher, ApiError> {
        BidWatcher::spawn(self.backend.clone(), lead_id, auth.company_id.clone()).await
    }
}
