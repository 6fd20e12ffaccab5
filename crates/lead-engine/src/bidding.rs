//! Competitive bidding on a lead.
//!
//! A [`BidBoard`] holds one company's view of a lead's bids and refreshes it
//! after every write. A [`BidWatcher`] keeps the same view current from the
//! backend's bid feed until it is dropped.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use database::validation::validate_bid_amounts;
use database::{BidStatus, BidUpdate, LeadBid, NewBid};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::LeadBackend;
use crate::error::{ApiError, BackendError};
use crate::notifier::{Notifier, Toast};

const MODULE: &str = "lead_bidding";

/// Shown instead of a countdown once a bid has expired.
pub const EXPIRED_LABEL: &str = "Utløpt";

/// Aggregates over the active bids on a lead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidStats {
    pub total_bids: usize,
    pub highest_bid: Option<i64>,
    /// Rounded to whole øre.
    pub average_bid: Option<i64>,
    /// 1-based position of the caller's bid, highest amount first.
    pub my_bid_rank: Option<usize>,
}

/// Bids on a lead as seen by one (optional) company.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BidSnapshot {
    pub bids: Vec<LeadBid>,
    pub my_bids: Vec<LeadBid>,
    pub stats: BidStats,
}

/// Statistics over the bids that are active and unexpired at `now`.
///
/// Bids rank by amount, earlier bids first on ties.
pub fn compute_stats(bids: &[LeadBid], company_id: Option<&str>, now: DateTime<Utc>) -> BidStats {
    let mut active: Vec<&LeadBid> = bids
        .iter()
        .filter(|b| b.bid_status == BidStatus::Active && b.expires_at > now)
        .collect();

    if active.is_empty() {
        return BidStats::default();
    }

    active.sort_by(|a, b| {
        b.bid_amount_cents
            .cmp(&a.bid_amount_cents)
            .then(a.created_at.cmp(&b.created_at))
    });

    let count = active.len() as i128;
    let total: i128 = active.iter().map(|b| i128::from(b.bid_amount_cents)).sum();
    let average = (total + count / 2) / count;

    BidStats {
        total_bids: active.len(),
        highest_bid: active.first().map(|b| b.bid_amount_cents),
        average_bid: i64::try_from(average).ok(),
        my_bid_rank: company_id
            .and_then(|id| active.iter().position(|b| b.company_id == id))
            .map(|index| index + 1),
    }
}

/// Remaining lifetime as `"{h}t {m}m"`, or [`EXPIRED_LABEL`].
pub fn time_until_expiry(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if expires_at <= now {
        return EXPIRED_LABEL.to_string();
    }
    let minutes = (expires_at - now).num_minutes();
    format!("{}t {}m", minutes / 60, minutes % 60)
}

async fn fetch_snapshot(
    backend: &dyn LeadBackend,
    lead_id: &str,
    company_id: Option<&str>,
) -> Result<BidSnapshot, BackendError> {
    let bids = backend.list_bids(lead_id).await?;
    let my_bids = match company_id {
        Some(company_id) => backend.list_company_bids(lead_id, company_id).await?,
        None => Vec::new(),
    };
    let stats = compute_stats(&bids, company_id, Utc::now());

    Ok(BidSnapshot {
        bids,
        my_bids,
        stats,
    })
}

/// One company's bidding session on a lead.
pub struct BidBoard {
    backend: Arc<dyn LeadBackend>,
    notifier: Arc<dyn Notifier>,
    lead_id: String,
    company_id: Option<String>,
    bid_expiry: Duration,
    snapshot: BidSnapshot,
}

impl BidBoard {
    /// Open a board and load the current bids.
    pub async fn open(
        backend: Arc<dyn LeadBackend>,
        notifier: Arc<dyn Notifier>,
        lead_id: impl Into<String>,
        company_id: Option<String>,
        bid_expiry_hours: i64,
    ) -> Result<Self, ApiError> {
        let mut board = Self {
            backend,
            notifier,
            lead_id: lead_id.into(),
            company_id,
            bid_expiry: Duration::hours(bid_expiry_hours),
            snapshot: BidSnapshot::default(),
        };
        board.refresh().await?;
        Ok(board)
    }

    pub fn lead_id(&self) -> &str {
        &self.lead_id
    }

    pub fn bids(&self) -> &[LeadBid] {
        &self.snapshot.bids
    }

    pub fn my_bids(&self) -> &[LeadBid] {
        &self.snapshot.my_bids
    }

    pub fn stats(&self) -> &BidStats {
        &self.snapshot.stats
    }

    /// Re-read both bid lists and recompute the statistics.
    pub async fn refresh(&mut self) -> Result<(), ApiError> {
        self.snapshot = fetch_snapshot(
            self.backend.as_ref(),
            &self.lead_id,
            self.company_id.as_deref(),
        )
        .await
        .map_err(|e| ApiError::backend(MODULE, "fetch_bids", e))?;
        Ok(())
    }

    /// Place a bid for this board's company.
    ///
    /// A company holds at most one active bid per lead; a second one is
    /// rejected with [`ApiError::DuplicateActiveBid`].
    pub async fn place_bid(
        &mut self,
        bid_amount_cents: i64,
        max_budget_cents: i64,
        message: Option<String>,
        auto_bid: bool,
    ) -> Result<LeadBid, ApiError> {
        let company_id = self.company_id.clone().ok_or(ApiError::NoCompany)?;

        if let Err(e) = validate_bid_amounts(bid_amount_cents, max_budget_cents) {
            self.notifier.notify(Toast::error("Ugyldig bud", e.to_string()));
            return Err(ApiError::Validation(vec![e]));
        }

        self.refresh().await?;
        let now = Utc::now();
        if self
            .snapshot
            .my_bids
            .iter()
            .any(|b| b.bid_status == BidStatus::Active && b.expires_at > now)
        {
            return Err(self.duplicate_bid(company_id));
        }

        let new_bid = NewBid {
            lead_id: self.lead_id.clone(),
            company_id: company_id.clone(),
            bid_amount_cents,
            max_budget_cents,
            auto_bid,
            message,
            expires_at: now + self.bid_expiry,
        };

        let placed = match self.backend.insert_bid(&new_bid).await {
            Ok(placed) => placed,
            Err(BackendError::Conflict { .. }) => return Err(self.duplicate_bid(company_id)),
            Err(e) => {
                self.notifier.notify(Toast::error(
                    "Kunne ikke registrere bud",
                    "Noe gikk galt. Prøv igjen senere.",
                ));
                return Err(ApiError::backend(MODULE, "place_bid", e));
            }
        };

        info!(
            lead_id = %self.lead_id,
            company_id = %company_id,
            bid_id = %placed.id,
            amount = bid_amount_cents,
            "Bid placed"
        );
        self.notifier.notify(Toast::success("Bud registrert", "Budet ditt er registrert."));
        self.refresh().await?;
        Ok(placed)
    }

    fn duplicate_bid(&self, company_id: String) -> ApiError {
        self.notifier.notify(Toast::error(
            "Du har allerede et aktivt bud",
            "Endre eller trekk tilbake budet ditt i stedet.",
        ));
        ApiError::DuplicateActiveBid {
            lead_id: self.lead_id.clone(),
            company_id,
        }
    }

    /// Withdraw one of this company's active bids on the lead.
    pub async fn withdraw_bid(&mut self, bid_id: &str) -> Result<(), ApiError> {
        let company_id = self.company_id.clone().ok_or(ApiError::NoCompany)?;

        if let Err(e) = self
            .backend
            .set_bid_status(bid_id, &self.lead_id, &company_id, BidStatus::Withdrawn)
            .await
        {
            self.notifier.notify(Toast::error(
                "Kunne ikke trekke bud",
                "Noe gikk galt. Prøv igjen senere.",
            ));
            return Err(ApiError::backend(MODULE, "withdraw_bid", e));
        }

        info!(lead_id = %self.lead_id, bid_id, "Bid withdrawn");
        self.notifier.notify(Toast::success("Bud trukket", "Budet ditt er trukket tilbake."));
        self.refresh().await
    }

    /// Change one of this company's active bids on the lead. Only the given
    /// fields are written.
    pub async fn update_bid(
        &mut self,
        bid_id: &str,
        bid_amount_cents: i64,
        max_budget_cents: Option<i64>,
        message: Option<String>,
    ) -> Result<LeadBid, ApiError> {
        let company_id = self.company_id.clone().ok_or(ApiError::NoCompany)?;

        let effective_max = max_budget_cents
            .or_else(|| {
                self.snapshot
                    .my_bids
                    .iter()
                    .find(|b| b.id == bid_id)
                    .map(|b| b.max_budget_cents)
            })
            .unwrap_or(bid_amount_cents);

        if let Err(e) = validate_bid_amounts(bid_amount_cents, effective_max) {
            self.notifier.notify(Toast::error("Ugyldig bud", e.to_string()));
            return Err(ApiError::Validation(vec![e]));
        }

        let update = BidUpdate {
            bid_amount_cents: Some(bid_amount_cents),
            max_budget_cents,
            message,
        };

        let updated = match self
            .backend
            .update_bid(bid_id, &self.lead_id, &company_id, &update)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                self.notifier.notify(Toast::error(
                    "Kunne ikke oppdatere bud",
                    "Noe gikk galt. Prøv igjen senere.",
                ));
                return Err(ApiError::backend(MODULE, "update_bid", e));
            }
        };

        debug!(lead_id = %self.lead_id, bid_id, amount = bid_amount_cents, "Bid updated");
        self.notifier.notify(Toast::success("Bud oppdatert", "Budet ditt er oppdatert."));
        self.refresh().await?;
        Ok(updated)
    }
}

/// Live view of a lead's bids, refreshed from the backend's bid feed.
///
/// The background task ends when the watcher is dropped.
pub struct BidWatcher {
    snapshot: watch::Receiver<BidSnapshot>,
    task: JoinHandle<()>,
}

impl BidWatcher {
    /// Load the current bids and start following changes.
    pub async fn spawn(
        backend: Arc<dyn LeadBackend>,
        lead_id: impl Into<String>,
        company_id: Option<String>,
    ) -> Result<Self, ApiError> {
        let lead_id = lead_id.into();
        // Subscribe first so no write between the initial read and the loop is missed.
        let mut events = backend.subscribe_bid_events();
        let initial = fetch_snapshot(backend.as_ref(), &lead_id, company_id.as_deref())
            .await
            .map_err(|e| ApiError::backend(MODULE, "watch_bids", e))?;
        let (sender, snapshot) = watch::channel(initial);

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.lead_id != lead_id => continue,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(lead_id = %lead_id, skipped, "Bid feed lagged, refetching");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }

                match fetch_snapshot(backend.as_ref(), &lead_id, company_id.as_deref()).await {
                    Ok(fresh) => {
                        if sender.send(fresh).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(module = MODULE, lead_id = %lead_id, error = %e, "Bid refetch failed"),
                }
            }
        });

        Ok(Self { snapshot, task })
    }

    /// The latest snapshot.
    pub fn current(&self) -> BidSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Wait for the next refresh. Returns `false` once the feed has ended.
    pub async fn changed(&mut self) -> bool {
        self.snapshot.changed().await.is_ok()
    }
}

impl Drop for BidWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(company: &str, amount: i64, status: BidStatus, expires_in_hours: i64) -> LeadBid {
        let now = Utc::now();
        LeadBid {
            id: format!("bid-{}-{}", company, amount),
            lead_id: "lead-1".to_string(),
            company_id: company.to_string(),
            bid_amount_cents: amount,
            max_budget_cents: amount.saturating_mul(2),
            auto_bid: false,
            message: None,
            bid_status: status,
            expires_at: now + Duration::hours(expires_in_hours),
            created_at: now,
        }
    }

    #[test]
    fn test_stats_rank_active_bids() {
        let bids = vec![
            bid("a", 30_000, BidStatus::Active, 24),
            bid("b", 50_000, BidStatus::Active, 24),
            bid("c", 40_000, BidStatus::Active, 24),
            bid("d", 90_000, BidStatus::Withdrawn, 24),
            bid("e", 80_000, BidStatus::Active, -1),
        ];

        let stats = compute_stats(&bids, Some("c"), Utc::now());
        assert_eq!(stats.total_bids, 3);
        assert_eq!(stats.highest_bid, Some(50_000));
        assert_eq!(stats.average_bid, Some(40_000));
        assert_eq!(stats.my_bid_rank, Some(2));

        assert_eq!(compute_stats(&bids, Some("d"), Utc::now()).my_bid_rank, None);
        assert_eq!(compute_stats(&bids, None, Utc::now()).my_bid_rank, None);
    }

    #[test]
    fn test_stats_average_of_huge_bids() {
        let bids = vec![
            bid("a", i64::MAX, BidStatus::Active, 24),
            bid("b", i64::MAX - 1, BidStatus::Active, 24),
        ];

        let stats = compute_stats(&bids, Some("b"), Utc::now());
        assert_eq!(stats.total_bids, 2);
        assert_eq!(stats.highest_bid, Some(i64::MAX));
        assert_eq!(stats.average_bid, Some(i64::MAX));
        assert_eq!(stats.my_bid_rank, Some(2));
    }

    #[test]
    fn test_stats_empty() {
        let stats = compute_stats(&[], Some("a"), Utc::now());
        assert_eq!(stats, BidStats::default());
    }

    #[test]
    fn test_time_until_expiry() {
        let now = Utc::now();
        assert_eq!(time_until_expiry(now + Duration::minutes(90), now), "1t 30m");
        assert_eq!(time_until_expiry(now + Duration::hours(24), now), "24t 0m");
        assert_eq!(time_until_expiry(now + Duration::seconds(59), now), "0t 0m");
        assert_eq!(time_until_expiry(now - Duration::minutes(1), now), EXPIRED_LABEL);
        assert_eq!(time_until_expiry(now, now), EXPIRED_LABEL);
    }
}
