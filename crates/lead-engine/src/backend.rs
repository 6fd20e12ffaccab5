//! The backend contract the lead services are written against.

use async_trait::async_trait;
use database::{
    AnonymousLeadRequest, AssignmentResult, BidStatus, BidUpdate, CompanyMatch, DistributionRow,
    DistributionStrategy, Lead, LeadBid, LeadQualityScore, LeadStatus, NewBid, NewLead,
    QueueRunSummary,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::BackendError;

/// What happened to a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidEventKind {
    Placed,
    Updated,
    StatusChanged(BidStatus),
}

/// Change notification published after every bid write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidEvent {
    pub lead_id: String,
    pub bid_id: String,
    pub kind: BidEventKind,
}

/// Storage and remote functions used by the lead services.
///
/// Table methods read and write single rows. The remaining methods mirror
/// the named server functions (`distribute_new_lead_v3`,
/// `assign_lead_with_budget`, ...) and keep their input and output shapes.
#[async_trait]
pub trait LeadBackend: Send + Sync {
    // Lead rows.

    async fn insert_lead(&self, lead: &NewLead) -> Result<Lead, BackendError>;

    async fn get_lead(&self, lead_id: &str) -> Result<Lead, BackendError>;

    async fn update_lead_status(&self, lead_id: &str, status: LeadStatus) -> Result<(), BackendError>;

    async fn mark_confirmation_sent(&self, lead_id: &str) -> Result<(), BackendError>;

    /// Leads with no company and status `new`, oldest first.
    async fn list_unassigned_leads(&self) -> Result<Vec<Lead>, BackendError>;

    /// Stored score; `NotFound` when none has been calculated.
    async fn get_lead_score(&self, lead_id: &str) -> Result<LeadQualityScore, BackendError>;

    // Bid rows.

    async fn insert_bid(&self, bid: &NewBid) -> Result<LeadBid, BackendError>;

    async fn list_bids(&self, lead_id: &str) -> Result<Vec<LeadBid>, BackendError>;

    async fn list_company_bids(
        &self,
        lead_id: &str,
        company_id: &str,
    ) -> Result<Vec<LeadBid>, BackendError>;

    /// Close a company's active bid on a lead. Bids of other leads or
    /// companies are reported as not found.
    async fn set_bid_status(
        &self,
        bid_id: &str,
        lead_id: &str,
        company_id: &str,
        status: BidStatus,
    ) -> Result<(), BackendError>;

    async fn update_bid(
        &self,
        bid_id: &str,
        lead_id: &str,
        company_id: &str,
        update: &BidUpdate,
    ) -> Result<LeadBid, BackendError>;

    /// Bid change feed. Each call returns a fresh receiver.
    fn subscribe_bid_events(&self) -> broadcast::Receiver<BidEvent>;

    // Distribution settings.

    async fn get_distribution_strategy(&self) -> Result<DistributionStrategy, BackendError>;

    async fn set_distribution_strategy(
        &self,
        strategy: DistributionStrategy,
    ) -> Result<(), BackendError>;

    // Server functions.

    async fn distribute_new_lead_v3(&self, lead_id: &str) -> Result<Vec<DistributionRow>, BackendError>;

    /// Insert and distribute in one step; returns the new lead id.
    async fn create_anonymous_lead_and_distribute(
        &self,
        request: &AnonymousLeadRequest,
    ) -> Result<String, BackendError>;

    async fn find_matching_companies(
        &self,
        category: &str,
        location: Option<&str>,
        min_budget_cents: i64,
    ) -> Result<Vec<CompanyMatch>, BackendError>;

    async fn assign_lead_with_budget(
        &self,
        lead_id: &str,
        company_id: &str,
        cost_cents: Option<i64>,
    ) -> Result<AssignmentResult, BackendError>;

    async fn process_queued_leads(&self) -> Result<QueueRunSummary, BackendError>;

    /// Side effect only; read the result with [`get_lead_score`](Self::get_lead_score).
    async fn calculate_lead_score(&self, lead_id: &str) -> Result<(), BackendError>;

    /// Pricing as untyped JSON; callers validate the shape.
    async fn get_lead_pricing(&self, lead_id: &str) -> Result<serde_json::Value, BackendError>;

    async fn get_user_roles(&self, user_id: &str) -> Result<Vec<String>, BackendError>;

    async fn has_role(&self, user_id: &str, role: &str) -> Result<bool, BackendError>;

    async fn has_role_level(&self, user_id: &str, min_level: i64) -> Result<bool, BackendError>;

    async fn get_user_role_level(&self, user_id: &str) -> Result<i64, BackendError>;

    /// Unknown flags are disabled.
    async fn is_feature_enabled(
        &self,
        flag_name: &str,
        user_id: Option<&str>,
    ) -> Result<bool, BackendError>;

    async fn has_module_access(&self, user_id: &str, module_name: &str) -> Result<bool, BackendError>;
}
