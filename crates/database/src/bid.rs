//! Lead bid CRUD operations.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{BidStatus, BidUpdate, LeadBid, NewBid};

const BID_COLUMNS: &str = "id, lead_id, company_id, bid_amount_cents, max_budget_cents, auto_bid, \
    message, bid_status, expires_at, created_at";

/// Insert a new active bid.
///
/// A company may hold only one active bid per lead; a second one is
/// rejected with `AlreadyExists`. The company's active bids on the lead
/// that have already expired are closed as lost first.
pub async fn create_bid(pool: &SqlitePool, bid: &NewBid) -> Result<LeadBid> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let expired = sqlx::query(
        r#"
        UPDATE lead_bids
        SET bid_status = ?
        WHERE lead_id = ? AND company_id = ? AND bid_status = ? AND expires_at <= ?
        "#,
    )
    .bind(BidStatus::Lost)
    .bind(&bid.lead_id)
    .bind(&bid.company_id)
    .bind(BidStatus::Active)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    if expired.rows_affected() > 0 {
        tracing::debug!(
            lead_id = %bid.lead_id,
            company_id = %bid.company_id,
            closed = expired.rows_affected(),
            "Closed expired bids"
        );
    }

    sqlx::query(
        r#"
        INSERT INTO lead_bids (
            id, lead_id, company_id, bid_amount_cents, max_budget_cents, auto_bid,
            message, bid_status, expires_at, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&bid.lead_id)
    .bind(&bid.company_id)
    .bind(bid.bid_amount_cents)
    .bind(bid.max_budget_cents)
    .bind(bid.auto_bid)
    .bind(&bid.message)
    .bind(BidStatus::Active)
    .bind(bid.expires_at)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        DatabaseError::on_conflict(e, "ActiveBid", format!("{}/{}", bid.lead_id, bid.company_id))
    })?;

    tx.commit().await?;
    get_bid(pool, &id).await
}

/// Get a bid by ID.
pub async fn get_bid(pool: &SqlitePool, id: &str) -> Result<LeadBid> {
    sqlx::query_as::<_, LeadBid>(&format!("SELECT {} FROM lead_bids WHERE id = ?", BID_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "LeadBid",
            id: id.to_string(),
        })
}

/// All bids on a lead, highest amount first.
pub async fn list_bids_for_lead(pool: &SqlitePool, lead_id: &str) -> Result<Vec<LeadBid>> {
    let bids = sqlx::query_as::<_, LeadBid>(&format!(
        "SELECT {} FROM lead_bids WHERE lead_id = ? ORDER BY bid_amount_cents DESC, created_at",
        BID_COLUMNS
    ))
    .bind(lead_id)
    .fetch_all(pool)
    .await?;

    Ok(bids)
}

/// A company's bids on a lead, newest first.
pub async fn list_company_bids(
    pool: &SqlitePool,
    lead_id: &str,
    company_id: &str,
) -> Result<Vec<LeadBid>> {
    let bids = sqlx::query_as::<_, LeadBid>(&format!(
        "SELECT {} FROM lead_bids WHERE lead_id = ? AND company_id = ? ORDER BY created_at DESC",
        BID_COLUMNS
    ))
    .bind(lead_id)
    .bind(company_id)
    .fetch_all(pool)
    .await?;

    Ok(bids)
}

/// Move a company's active bid on a lead to a terminal status.
///
/// Terminal bids are never changed again. Targeting one, or a bid that
/// belongs to another lead or company, reports `NotFound`.
pub async fn set_bid_status(
    pool: &SqlitePool,
    id: &str,
    lead_id: &str,
    company_id: &str,
    status: BidStatus,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE lead_bids
        SET bid_status = ?
        WHERE id = ? AND lead_id = ? AND company_id = ? AND bid_status = ?
        "#,
    )
    .bind(status)
    .bind(id)
    .bind(lead_id)
    .bind(company_id)
    .bind(BidStatus::Active)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "ActiveBid",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Change the given fields of a company's active bid on a lead.
pub async fn update_bid(
    pool: &SqlitePool,
    id: &str,
    lead_id: &str,
    company_id: &str,
    update: &BidUpdate,
) -> Result<LeadBid> {
    let result = sqlx::query(
        r#"
        UPDATE lead_bids
        SET bid_amount_cents = COALESCE(?, bid_amount_cents),
            max_budget_cents = COALESCE(?, max_budget_cents),
            message = COALESCE(?, message)
        WHERE id = ? AND lead_id = ? AND company_id = ? AND bid_status = ?
        "#,
    )
    .bind(update.bid_amount_cents)
    .bind(update.max_budget_cents)
    .bind(&update.message)
    .bind(id)
    .bind(lead_id)
    .bind(company_id)
    .bind(BidStatus::Active)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "ActiveBid",
            id: id.to_string(),
        });
    }

    get_bid(pool, id).await
}
