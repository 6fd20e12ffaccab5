//! Lead distribution.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use database::{CompanyMatch, DistributionStrategy, QueueRunSummary};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::LeadBackend;
use crate::error::ApiError;

const MODULE: &str = "lead_distribution";

/// Result of an automatic distribution attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionOutcome {
    pub success: bool,
    pub company_id: Option<String>,
    pub cost_cents: Option<i64>,
    /// Why the lead stayed unassigned.
    pub fallback_reason: Option<String>,
}

/// Overrides for company matching; unset fields come from the lead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCriteria {
    pub category: Option<String>,
    pub location: Option<String>,
}

/// Result of a manual assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualAssignmentOutcome {
    pub success: bool,
    pub cost_cents: Option<i64>,
    /// Message from the backend when the assignment was refused.
    pub error: Option<String>,
}

/// Depth and age of the distribution backlog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackQueueStats {
    pub queue_depth: usize,
    /// Age of the oldest queued lead in whole hours.
    pub oldest_lead_age_hours: i64,
    pub by_category: BTreeMap<String, usize>,
}

/// Wraps the distribution functions of a [`LeadBackend`].
#[derive(Clone)]
pub struct DistributionService {
    backend: Arc<dyn LeadBackend>,
    min_budget_cents: i64,
}

impl DistributionService {
    pub fn new(backend: Arc<dyn LeadBackend>, min_budget_cents: i64) -> Self {
        Self {
            backend,
            min_budget_cents,
        }
    }

    /// Try to assign a lead automatically.
    ///
    /// No eligible company is a normal outcome (`success: false`).
    pub async fn distribute_lead(&self, lead_id: &str) -> Result<DistributionOutcome, ApiError> {
        let rows = self
            .backend
            .distribute_new_lead_v3(lead_id)
            .await
            .map_err(|e| ApiError::backend(MODULE, "distribute_lead", e))?;

        let outcome = match rows.into_iter().find(|row| row.success) {
            Some(row) => DistributionOutcome {
                success: true,
                company_id: row.company_id,
                cost_cents: row.assignment_cost,
                fallback_reason: None,
            },
            None => DistributionOutcome {
                fallback_reason: Some("Ingen passende leverandør funnet".to_string()),
                ..DistributionOutcome::default()
            },
        };

        debug!(lead_id, success = outcome.success, "Distribution attempted");
        Ok(outcome)
    }

    /// Ranked candidate companies for a lead.
    pub async fn find_company_matches(
        &self,
        lead_id: &str,
        criteria: &MatchCriteria,
    ) -> Result<Vec<CompanyMatch>, ApiError> {
        let lead = self
            .backend
            .get_lead(lead_id)
            .await
            .map_err(|e| ApiError::backend(MODULE, "find_company_matches", e))?;

        let category = criteria.category.as_deref().unwrap_or(&lead.category);
        let location = criteria
            .location
            .as_deref()
            .or(lead.metadata.0.location.as_deref());

        self.backend
            .find_matching_companies(category, location, self.min_budget_cents)
            .await
            .map_err(|e| ApiError::backend(MODULE, "find_company_matches", e))
    }

    /// Assign a lead to a chosen company at an explicit cost.
    ///
    /// A refusal by the backend is returned as `success: false` with its message.
    pub async fn manual_lead_assignment(
        &self,
        lead_id: &str,
        company_id: &str,
        cost_cents: Option<i64>,
    ) -> Result<ManualAssignmentOutcome, ApiError> {
        let result = self
            .backend
            .assign_lead_with_budget(lead_id, company_id, cost_cents)
            .await
            .map_err(|e| ApiError::backend(MODULE, "manual_lead_assignment", e))?;

        if result.success {
            info!(lead_id, company_id, cost_cents = ?result.cost, "Lead assigned manually");
        } else {
            info!(lead_id, company_id, error = ?result.error, "Manual assignment refused");
        }

        Ok(ManualAssignmentOutcome {
            success: result.success,
            cost_cents: result.cost,
            error: if result.success {
                None
            } else {
                Some(result.error.unwrap_or_else(|| "Tildeling feilet".to_string()))
            },
        })
    }

    /// Drain the backlog once. No retries happen here.
    pub async fn process_queued_leads(&self) -> Result<QueueRunSummary, ApiError> {
        self.backend
            .process_queued_leads()
            .await
            .map_err(|e| ApiError::backend(MODULE, "process_queued_leads", e))
    }

    /// Backlog statistics as of now.
    pub async fn fetch_fallback_queue(&self) -> Result<FallbackQueueStats, ApiError> {
        self.fetch_fallback_queue_at(Utc::now()).await
    }

    pub async fn fetch_fallback_queue_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<FallbackQueueStats, ApiError> {
        let leads = self
            .backend
            .list_unassigned_leads()
            .await
            .map_err(|e| ApiError::backend(MODULE, "fetch_fallback_queue", e))?;

        let mut stats = FallbackQueueStats {
            queue_depth: leads.len(),
            ..FallbackQueueStats::default()
        };

        if let Some(oldest) = leads.iter().map(|l| l.created_at).min() {
            stats.oldest_lead_age_hours = (now - oldest).num_hours().max(0);
        }

        for lead in &leads {
            *stats.by_category.entry(lead.category.clone()).or_default() += 1;
        }

        Ok(stats)
    }

    pub async fn get_strategy(&self) -> Result<DistributionStrategy, ApiError> {
        self.backend
            .get_distribution_strategy()
            .await
            .map_err(|e| ApiError::backend(MODULE, "get_strategy", e))
    }

    pub async fn update_strategy(&self, strategy: DistributionStrategy) -> Result<(), ApiError> {
        self.backend
            .set_distribution_strategy(strategy)
            .await
            .map_err(|e| ApiError::backend(MODULE, "update_strategy", e))?;

        info!(strategy = strategy.as_str(), "Distribution strategy updated");
        Ok(())
    }
}
