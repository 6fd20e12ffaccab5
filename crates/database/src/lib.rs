//! SQLite persistence layer for Homni.
//!
//! This crate provides async database operations for leads, quality scores,
//! bids, companies, roles and feature flags using SQLx with SQLite. It also
//! hosts the lead functions the client layer calls by name: distribution,
//! matching, manual assignment, queue draining, scoring and pricing.
//!
//! # Example
//!
//! ```no_run
//! use database::{Database, LeadMetadata, NewLead, Submitter, lead, distribution};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:homni.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     // Submit a lead and try to hand it to a company
//!     let new_lead = NewLead {
//!         title: "Bytte sikringsskap".to_string(),
//!         description: "Gammelt skap i enebolig".to_string(),
//!         category: "electrical".to_string(),
//!         lead_type: database::LEAD_TYPE_USER.to_string(),
//!         submitter: Submitter::User("user-1".to_string()),
//!         metadata: LeadMetadata::default(),
//!     };
//!     let created = lead::create_lead(db.pool(), &new_lead).await?;
//!     distribution::distribute_new_lead_v3(db.pool(), &created.id, 0).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod bid;
pub mod company;
pub mod distribution;
pub mod error;
pub mod feature_flag;
pub mod lead;
pub mod models;
pub mod role;
pub mod scoring;
pub mod validation;

pub use company::NewCompany;
pub use distribution::AnonymousLeadRequest;
pub use error::{DatabaseError, Result};
pub use models::{
    AssignmentMethod, AssignmentResult, BidStatus, BidUpdate, Company, CompanyMatch,
    DistributionRow, DistributionStrategy, FeatureFlag, Lead, LeadAssignment, LeadBid,
    LeadMetadata, LeadPricing, LeadQualityScore, LeadStatus, NewBid, NewLead, PreviewAccessLevel,
    QueueRunSummary, Submitter, LEAD_TYPE_USER, LEAD_TYPE_VISITOR,
};
pub use validation::{LeadInput, LeadValidation, ValidationError};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    const DEFAULT_POOL_SIZE: u32 = 10;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // File database
    /// let db = database::Database::connect("sqlite:data/homni.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing)
    /// let db = database::Database::connect("sqlite::memory:").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(url, pool_size, "Connected to database");

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
