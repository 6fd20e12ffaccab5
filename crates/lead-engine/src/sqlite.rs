//! [`LeadBackend`] over the local SQLite database.

use async_trait::async_trait;
use database::{
    bid, distribution, feature_flag, lead, role, scoring, AnonymousLeadRequest, AssignmentResult,
    BidStatus, BidUpdate, CompanyMatch, Database, DistributionRow, DistributionStrategy, Lead,
    LeadBid, LeadQualityScore, LeadStatus, NewBid, NewLead, QueueRunSummary,
};
use tokio::sync::broadcast;

use crate::backend::{BidEvent, BidEventKind, LeadBackend};
use crate::config::DEFAULT_MIN_BUDGET_CENTS;
use crate::error::BackendError;

/// Buffered bid events per subscriber before it starts lagging.
const BID_EVENT_CAPACITY: usize = 64;

/// Backend running every function in-process against SQLite.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    db: Database,
    bid_events: broadcast::Sender<BidEvent>,
    /// Least remaining budget a company needs for automatic distribution.
    min_budget_cents: i64,
}

impl SqliteBackend {
    pub fn new(db: Database) -> Self {
        let (bid_events, _) = broadcast::channel(BID_EVENT_CAPACITY);
        Self {
            db,
            bid_events,
            min_budget_cents: DEFAULT_MIN_BUDGET_CENTS,
        }
    }

    pub fn with_min_budget_cents(mut self, min_budget_cents: i64) -> Self {
        self.min_budget_cents = min_budget_cents;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Number of live bid feed subscribers.
    pub fn bid_subscriber_count(&self) -> usize {
        self.bid_events.receiver_count()
    }

    fn publish(&self, lead_id: &str, bid_id: &str, kind: BidEventKind) {
        let event = BidEvent {
            lead_id: lead_id.to_string(),
            bid_id: bid_id.to_string(),
            kind,
        };
        // No subscribers is not an error.
        if self.bid_events.send(event).is_err() {
            tracing::trace!(lead_id, bid_id, "No bid feed subscribers");
        }
    }
}

#[async_trait]
impl LeadBackend for SqliteBackend {
    async fn insert_lead(&self, new_lead: &NewLead) -> Result<Lead, BackendError> {
        Ok(lead::create_lead(self.db.pool(), new_lead).await?)
    }

    async fn get_lead(&self, lead_id: &str) -> Result<Lead, BackendError> {
        Ok(lead::get_lead(self.db.pool(), lead_id).await?)
    }

    async fn update_lead_status(&self, lead_id: &str, status: LeadStatus) -> Result<(), BackendError> {
        Ok(lead::update_status(self.db.pool(), lead_id, status).await?)
    }

    async fn mark_confirmation_sent(&self, lead_id: &str) -> Result<(), BackendError> {
        Ok(lead::mark_confirmation_sent(self.db.pool(), lead_id).await?)
    }

    async fn list_unassigned_leads(&self) -> Result<Vec<Lead>, BackendError> {
        Ok(lead::list_unassigned_leads(self.db.pool()).await?)
    }

    async fn get_lead_score(&self, lead_id: &str) -> Result<LeadQualityScore, BackendError> {
        Ok(scoring::get_score(self.db.pool(), lead_id).await?)
    }

    async fn insert_bid(&self, new_bid: &NewBid) -> Result<LeadBid, BackendError> {
        let created = bid::create_bid(self.db.pool(), new_bid).await?;
        self.publish(&created.lead_id, &created.id, BidEventKind::Placed);
        Ok(created)
    }

    async fn list_bids(&self, lead_id: &str) -> Result<Vec<LeadBid>, BackendError> {
        Ok(bid::list_bids_for_lead(self.db.pool(), lead_id).await?)
    }

    async fn list_company_bids(
        &self,
        lead_id: &str,
        company_id: &str,
    ) -> Result<Vec<LeadBid>, BackendError> {
        Ok(bid::list_company_bids(self.db.pool(), lead_id, company_id).await?)
    }

    async fn set_bid_status(
        &self,
        bid_id: &str,
        lead_id: &str,
        company_id: &str,
        status: BidStatus,
    ) -> Result<(), BackendError> {
        bid::set_bid_status(self.db.pool(), bid_id, lead_id, company_id, status).await?;
        self.publish(lead_id, bid_id, BidEventKind::StatusChanged(status));
        Ok(())
    }

    async fn update_bid(
        &self,
        bid_id: &str,
        lead_id: &str,
        company_id: &str,
        update: &BidUpdate,
    ) -> Result<LeadBid, BackendError> {
        let updated = bid::update_bid(self.db.pool(), bid_id, lead_id, company_id, update).await?;
        self.publish(&updated.lead_id, bid_id, BidEventKind::Updated);
        Ok(updated)
    }

    fn subscribe_bid_events(&self) -> broadcast::Receiver<BidEvent> {
        self.bid_events.subscribe()
    }

    async fn get_distribution_strategy(&self) -> Result<DistributionStrategy, BackendError> {
        Ok(distribution::get_strategy(self.db.pool()).await?)
    }

    async fn set_distribution_strategy(
        &self,
        strategy: DistributionStrategy,
    ) -> Result<(), BackendError> {
        Ok(distribution::set_strategy(self.db.pool(), strategy).await?)
    }

    async fn distribute_new_lead_v3(&self, lead_id: &str) -> Result<Vec<DistributionRow>, BackendError> {
        let rows =
            distribution::distribute_new_lead_v3(self.db.pool(), lead_id, self.min_budget_cents)
                .await?;
        Ok(rows)
    }

    async fn create_anonymous_lead_and_distribute(
        &self,
        request: &AnonymousLeadRequest,
    ) -> Result<String, BackendError> {
        let lead_id = distribution::create_anonymous_lead_and_distribute(
            self.db.pool(),
            request,
            self.min_budget_cents,
        )
        .await?;
        Ok(lead_id)
    }

    async fn find_matching_companies(
        &self,
        category: &str,
        location: Option<&str>,
        min_budget_cents: i64,
    ) -> Result<Vec<CompanyMatch>, BackendError> {
        Ok(
            distribution::find_matching_companies(self.db.pool(), category, location, min_budget_cents)
                .await?,
        )
    }

    async fn assign_lead_with_budget(
        &self,
        lead_id: &str,
        company_id: &str,
        cost_cents: Option<i64>,
    ) -> Result<AssignmentResult, BackendError> {
        Ok(distribution::assign_lead_with_budget(self.db.pool(), lead_id, company_id, cost_cents).await?)
    }

    async fn process_queued_leads(&self) -> Result<QueueRunSummary, BackendError> {
        Ok(distribution::process_queued_leads(self.db.pool(), self.min_budget_cents).await?)
    }

    async fn calculate_lead_score(&self, lead_id: &str) -> Result<(), BackendError> {
        scoring::calculate_lead_score(self.db.pool(), lead_id).await?;
        Ok(())
    }

    async fn get_lead_pricing(&self, lead_id: &str) -> Result<serde_json::Value, BackendError> {
        Ok(scoring::get_lead_pricing(self.db.pool(), lead_id).await?)
    }

    async fn get_user_roles(&self, user_id: &str) -> Result<Vec<String>, BackendError> {
        Ok(role::get_user_roles(self.db.pool(), user_id).await?)
    }

    async fn has_role(&self, user_id: &str, role_name: &str) -> Result<bool, BackendError> {
        Ok(role::has_role(self.db.pool(), user_id, role_name).await?)
    }

    async fn has_role_level(&self, user_id: &str, min_level: i64) -> Result<bool, BackendError> {
        Ok(role::has_role_level(self.db.pool(), user_id, min_level).await?)
    }

    async fn get_user_role_level(&self, user_id: &str) -> Result<i64, BackendError> {
        Ok(role::get_user_role_level(self.db.pool(), user_id).await?)
    }

    async fn is_feature_enabled(
        &self,
        flag_name: &str,
        user_id: Option<&str>,
    ) -> Result<bool, BackendError> {
        Ok(feature_flag::is_feature_enabled(self.db.pool(), flag_name, user_id).await?)
    }

    async fn has_module_access(&self, user_id: &str, module_name: &str) -> Result<bool, BackendError> {
        Ok(role::has_module_access(self.db.pool(), user_id, module_name).await?)
    }
}
