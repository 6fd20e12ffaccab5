//! Database models.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// Lifecycle status of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Qualified,
    Contacted,
    Negotiating,
    Converted,
    Lost,
    Paused,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 7] = [
        LeadStatus::New,
        LeadStatus::Qualified,
        LeadStatus::Contacted,
        LeadStatus::Negotiating,
        LeadStatus::Converted,
        LeadStatus::Lost,
        LeadStatus::Paused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Negotiating => "negotiating",
            LeadStatus::Converted => "converted",
            LeadStatus::Lost => "lost",
            LeadStatus::Paused => "paused",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LeadStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown lead status: {}", s))
    }
}

/// Lead type for leads submitted by a signed-in user.
pub const LEAD_TYPE_USER: &str = "user_submitted";

/// Lead type for leads submitted by an anonymous visitor.
pub const LEAD_TYPE_VISITOR: &str = "visitor_submitted";

/// Open key-value bag attached to a lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_preference: Option<String>,
    /// Anything else the submitting form attached.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A customer service request awaiting (or past) assignment to a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Lead {
    /// UUID v4.
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub status: LeadStatus,
    /// `user_submitted`, `visitor_submitted`, or an imported type.
    pub lead_type: String,
    /// Owning user when submitted with authentication.
    pub submitted_by: Option<String>,
    /// Assigned company.
    pub company_id: Option<String>,
    pub anonymous_email: Option<String>,
    pub session_id: Option<String>,
    pub metadata: Json<LeadMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the lead was assigned to `company_id`.
    pub attributed_at: Option<DateTime<Utc>>,
    pub confirmation_email_sent_at: Option<DateTime<Utc>>,
}

/// Who submitted a lead. Exactly one of the two identities is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitter {
    User(String),
    Anonymous { email: String, session_id: String },
}

/// Fields required to insert a lead.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub title: String,
    pub description: String,
    pub category: String,
    pub lead_type: String,
    pub submitter: Submitter,
    pub metadata: LeadMetadata,
}

/// Server-side quality score for a lead (one row per lead).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LeadQualityScore {
    pub lead_id: String,
    pub overall_score: i64,
    pub completeness_score: i64,
    pub urgency_score: i64,
    pub budget_indicator_score: i64,
    pub location_score: i64,
    pub category_demand_score: i64,
    pub contact_quality_score: i64,
    pub scoring_factors: Json<serde_json::Value>,
    pub calculated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// How much of a lead a company may see before buying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewAccessLevel {
    None,
    Basic,
    Contact,
    Full,
}

/// Derived, non-persisted price for a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadPricing {
    pub tier_name: String,
    pub base_price_cents: i64,
    pub preview_access_level: PreviewAccessLevel,
    pub full_price_cents: i64,
    pub score: i64,
}

/// Lifecycle status of a bid. `active` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum BidStatus {
    Active,
    Won,
    Lost,
    Withdrawn,
}

impl BidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Active => "active",
            BidStatus::Won => "won",
            BidStatus::Lost => "lost",
            BidStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BidStatus::Active)
    }
}

/// A company's offer to be assigned a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LeadBid {
    pub id: String,
    pub lead_id: String,
    pub company_id: String,
    pub bid_amount_cents: i64,
    pub max_budget_cents: i64,
    pub auto_bid: bool,
    pub message: Option<String>,
    pub bid_status: BidStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to insert a bid.
#[derive(Debug, Clone)]
pub struct NewBid {
    pub lead_id: String,
    pub company_id: String,
    pub bid_amount_cents: i64,
    pub max_budget_cents: i64,
    pub auto_bid: bool,
    pub message: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Partial update of a bid; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct BidUpdate {
    pub bid_amount_cents: Option<i64>,
    pub max_budget_cents: Option<i64>,
    pub message: Option<String>,
}

/// A service provider that receives leads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub categories: Json<Vec<String>>,
    pub service_areas: Json<Vec<String>>,
    pub monthly_budget_cents: i64,
    pub budget_spent_cents: i64,
    pub is_active: bool,
    pub last_assigned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn remaining_budget_cents(&self) -> i64 {
        (self.monthly_budget_cents - self.budget_spent_cents).max(0)
    }
}

/// A candidate company for a lead, as returned by `find_matching_companies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyMatch {
    pub company_id: String,
    pub company_name: String,
    pub match_score: i64,
    pub remaining_budget_cents: i64,
}

/// How a lead ended up with a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AssignmentMethod {
    Auto,
    Manual,
}

/// One historical assignment of a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LeadAssignment {
    pub id: i64,
    pub lead_id: String,
    pub company_id: String,
    pub cost_cents: i64,
    pub method: AssignmentMethod,
    pub assigned_at: DateTime<Utc>,
}

/// One row of `distribute_new_lead_v3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionRow {
    pub success: bool,
    pub company_id: Option<String>,
    pub assignment_cost: Option<i64>,
}

/// Result of `assign_lead_with_budget`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub success: bool,
    pub cost: Option<i64>,
    pub error: Option<String>,
}

/// Result of `process_queued_leads`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRunSummary {
    pub processed: u32,
    pub successful: u32,
    pub failed: u32,
}

/// Company selection strategy used by automatic distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DistributionStrategy {
    /// Best match score first, then most remaining budget.
    #[default]
    CategoryMatch,
    /// Least recently assigned company first.
    RoundRobin,
    /// Most remaining budget first.
    BudgetBased,
}

impl DistributionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionStrategy::CategoryMatch => "category_match",
            DistributionStrategy::RoundRobin => "round_robin",
            DistributionStrategy::BudgetBased => "budget_based",
        }
    }
}

impl FromStr for DistributionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "category_match" => Ok(DistributionStrategy::CategoryMatch),
            "round_robin" => Ok(DistributionStrategy::RoundRobin),
            "budget_based" => Ok(DistributionStrategy::BudgetBased),
            other => Err(format!("unknown distribution strategy: {}", other)),
        }
    }
}

/// A named boolean toggle, optionally role- or percentage-gated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FeatureFlag {
    pub name: String,
    pub is_enabled: bool,
    pub rollout_percentage: i64,
    pub target_roles: Json<Vec<String>>,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}
