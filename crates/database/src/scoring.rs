//! Lead quality scoring and pricing.
//!
//! `calculate_lead_score` and `get_lead_pricing` are the server-side
//! functions behind the scoring contract: a score row is derived from the
//! lead and market data and is always safe to recompute.

use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::lead::{count_companies_in_category, fetch_lead};
use crate::models::{Lead, LeadPricing, LeadQualityScore, PreviewAccessLevel};

/// How long a calculated score stays fresh.
pub const SCORE_TTL_DAYS: i64 = 7;

/// Sub-score weights in percent: completeness, urgency, budget, location,
/// category demand, contact quality.
const WEIGHTS: [i64; 6] = [20, 20, 20, 15, 15, 10];

/// Sub-scores for a lead, each 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub completeness: i64,
    pub urgency: i64,
    pub budget_indicator: i64,
    pub location: i64,
    pub category_demand: i64,
    pub contact_quality: i64,
}

impl ScoreBreakdown {
    /// Weighted overall score, rounded to the nearest integer.
    pub fn overall(&self) -> i64 {
        let parts = [
            self.completeness,
            self.urgency,
            self.budget_indicator,
            self.location,
            self.category_demand,
            self.contact_quality,
        ];
        let weighted: i64 = parts.iter().zip(WEIGHTS).map(|(s, w)| s * w).sum();
        (weighted + 50) / 100
    }
}

/// Score a lead given how many active companies serve its category.
pub fn score_lead(lead: &Lead, companies_in_category: i64) -> ScoreBreakdown {
    let metadata = &lead.metadata.0;

    let mut completeness = 0;
    completeness += match lead.title.trim().chars().count() {
        0 => 0,
        1..=9 => 10,
        _ => 20,
    };
    completeness += match lead.description.trim().chars().count() {
        0 => 0,
        1..=29 => 10,
        30..=99 => 25,
        _ => 40,
    };
    if !lead.category.trim().is_empty() {
        completeness += 12;
    }
    let filled = [
        &metadata.location,
        &metadata.urgency,
        &metadata.budget_range,
        &metadata.contact_preference,
    ]
    .iter()
    .filter(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    .count() as i64;
    completeness += filled * 7;

    let urgency = match metadata.urgency.as_deref().map(|u| u.trim().to_lowercase()) {
        None => 20,
        Some(u) => match u.as_str() {
            "urgent" | "emergency" | "asap" | "akutt" => 100,
            "high" | "høy" => 85,
            "medium" | "normal" => 60,
            "low" | "flexible" | "lav" | "fleksibel" => 30,
            "" => 20,
            _ => 40,
        },
    };

    let budget_indicator = match metadata.budget_range.as_deref() {
        None => 10,
        Some(range) => match largest_amount(range) {
            None => 30,
            Some(n) if n >= 100_000 => 100,
            Some(n) if n >= 50_000 => 80,
            Some(n) if n >= 10_000 => 60,
            Some(_) => 40,
        },
    };

    let location = match metadata.location.as_deref().map(str::trim) {
        None | Some("") => 0,
        Some(loc) if loc.chars().any(|c| c.is_ascii_digit()) => 100,
        Some(_) => 70,
    };

    let category_demand = if companies_in_category <= 0 {
        10
    } else {
        (20 + companies_in_category * 20).min(100)
    };

    let contact_quality = if lead.submitted_by.is_some() {
        100
    } else if lead.anonymous_email.is_some() {
        70
    } else {
        30
    };

    ScoreBreakdown {
        completeness: completeness.min(100),
        urgency,
        budget_indicator,
        location,
        category_demand,
        contact_quality,
    }
}

/// The largest whole number in a free-text budget such as "50 000 - 100 000 kr".
fn largest_amount(text: &str) -> Option<i64> {
    let mut best: Option<i64> = None;
    for part in text.split(['-', '–', '/', ',']) {
        let digits: String = part.chars().filter(char::is_ascii_digit).collect();
        if let Ok(n) = digits.parse::<i64>() {
            best = Some(best.map_or(n, |b| b.max(n)));
        }
    }
    best
}

/// Map a score to its price tier.
pub fn pricing_for_score(score: i64) -> LeadPricing {
    let (tier_name, base_price_cents, full_price_cents, preview_access_level) = match score {
        s if s >= 80 => ("premium", 75_000, 150_000, PreviewAccessLevel::Full),
        s if s >= 60 => ("standard", 50_000, 100_000, PreviewAccessLevel::Contact),
        s if s >= 40 => ("basic", 25_000, 50_000, PreviewAccessLevel::Basic),
        _ => ("economy", 10_000, 20_000, PreviewAccessLevel::None),
    };

    LeadPricing {
        tier_name: tier_name.to_string(),
        base_price_cents,
        preview_access_level,
        full_price_cents,
        score,
    }
}

/// Get the stored score for a lead.
///
/// Returns `NotFound` when no score has been calculated yet.
pub async fn get_score(pool: &SqlitePool, lead_id: &str) -> Result<LeadQualityScore> {
    let mut conn = pool.acquire().await?;
    fetch_score(&mut conn, lead_id).await
}

async fn fetch_score(conn: &mut SqliteConnection, lead_id: &str) -> Result<LeadQualityScore> {
    sqlx::query_as::<_, LeadQualityScore>(
        r#"
        SELECT lead_id, overall_score, completeness_score, urgency_score, budget_indicator_score,
               location_score, category_demand_score, contact_quality_score, scoring_factors,
               calculated_at, expires_at
        FROM lead_quality_scores
        WHERE lead_id = ?
        "#,
    )
    .bind(lead_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "LeadQualityScore",
        id: lead_id.to_string(),
    })
}

/// Calculate (or recalculate) and store the score for a lead.
pub async fn calculate_lead_score(pool: &SqlitePool, lead_id: &str) -> Result<LeadQualityScore> {
    let mut conn = pool.acquire().await?;
    calculate_with(&mut conn, lead_id).await
}

pub(crate) async fn calculate_with(
    conn: &mut SqliteConnection,
    lead_id: &str,
) -> Result<LeadQualityScore> {
    let lead = fetch_lead(conn, lead_id).await?;
    let companies = count_companies_in_category(conn, &lead.category).await?;
    let breakdown = score_lead(&lead, companies);
    let overall = breakdown.overall();
    let now = Utc::now();

    let factors = json!({
        "companies_in_category": companies,
        "urgency": lead.metadata.0.urgency,
        "budget_range": lead.metadata.0.budget_range,
        "has_location": lead.metadata.0.location.is_some(),
        "authenticated": lead.submitted_by.is_some(),
        "weights": WEIGHTS,
    });

    sqlx::query(
        r#"
        INSERT INTO lead_quality_scores (
            lead_id, overall_score, completeness_score, urgency_score, budget_indicator_score,
            location_score, category_demand_score, contact_quality_score, scoring_factors,
            calculated_at, expires_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(lead_id) DO UPDATE SET
            overall_score = excluded.overall_score,
            completeness_score = excluded.completeness_score,
            urgency_score = excluded.urgency_score,
            budget_indicator_score = excluded.budget_indicator_score,
            location_score = excluded.location_score,
            category_demand_score = excluded.category_demand_score,
            contact_quality_score = excluded.contact_quality_score,
            scoring_factors = excluded.scoring_factors,
            calculated_at = excluded.calculated_at,
            expires_at = excluded.expires_at
        "#,
    )
    .bind(lead_id)
    .bind(overall)
    .bind(breakdown.completeness)
    .bind(breakdown.urgency)
    .bind(breakdown.budget_indicator)
    .bind(breakdown.location)
    .bind(breakdown.category_demand)
    .bind(breakdown.contact_quality)
    .bind(Json(factors))
    .bind(now)
    .bind(now + Duration::days(SCORE_TTL_DAYS))
    .execute(&mut *conn)
    .await?;

    tracing::debug!(lead_id, overall, "Calculated lead score");

    fetch_score(conn, lead_id).await
}

/// Current score for a lead, calculating it first when missing.
pub(crate) async fn score_or_calculate(
    conn: &mut SqliteConnection,
    lead_id: &str,
) -> Result<LeadQualityScore> {
    match fetch_score(conn, lead_id).await {
        Err(DatabaseError::NotFound { .. }) => calculate_with(conn, lead_id).await,
        other => other,
    }
}

/// Price a lead as the JSON object returned to clients.
pub async fn get_lead_pricing(pool: &SqlitePool, lead_id: &str) -> Result<serde_json::Value> {
    let mut conn = pool.acquire().await?;
    let score = score_or_calculate(&mut conn, lead_id).await?;
    let pricing = pricing_for_score(score.overall_score);

    serde_json::to_value(&pricing).map_err(|source| DatabaseError::Json {
        column: "pricing",
        source,
    })
}
