//! Shared setup for the lead engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use database::company::{self, NewCompany};
use database::{Database, LeadInput, LeadMetadata};
use lead_engine::{EngineConfig, LeadEngine, RecordingNotifier, SqliteBackend};

pub struct Harness {
    pub db: Database,
    pub backend: Arc<SqliteBackend>,
    pub notifier: Arc<RecordingNotifier>,
    pub engine: LeadEngine,
}

pub async fn harness() -> Harness {
    let db = Database::connect_with_pool_size("sqlite::memory:", 1)
        .await
        .unwrap();
    db.migrate().await.unwrap();

    let backend = Arc::new(SqliteBackend::new(db.clone()));
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = LeadEngine::new(backend.clone(), notifier.clone(), EngineConfig::default());

    Harness {
        db,
        backend,
        notifier,
        engine,
    }
}

pub async fn add_company(db: &Database, id: &str, categories: &[&str], budget_cents: i64) {
    company::create_company(
        db.pool(),
        &NewCompany {
            id: id.to_string(),
            name: format!("{} AS", id),
            categories: categories.iter().map(|s| s.to_string()).collect(),
            service_areas: vec!["Oslo".to_string()],
            monthly_budget_cents: budget_cents,
        },
    )
    .await
    .unwrap();
}

pub fn lead_input(title: &str, category: &str) -> LeadInput {
    LeadInput {
        title: title.to_string(),
        description: "Sikringsskapet må byttes".to_string(),
        category: category.to_string(),
        email: None,
        metadata: LeadMetadata::default(),
    }
}
