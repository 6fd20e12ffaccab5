//! Lead distribution functions.
//!
//! Matching, automatic distribution, manual assignment and queue draining.
//! Every assignment updates the lead, charges the company budget and writes
//! a `lead_assignments` row inside a single transaction.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::company::{fetch_active_in_category, fetch_company, record_spend};
use crate::error::{DatabaseError, Result};
use crate::lead::{fetch_lead, fetch_unassigned_leads, insert_lead, set_assignment};
use crate::models::{
    AssignmentMethod, AssignmentResult, Company, CompanyMatch, DistributionRow,
    DistributionStrategy, LeadAssignment, LeadMetadata, LeadStatus, NewLead, QueueRunSummary,
    Submitter, LEAD_TYPE_VISITOR,
};
use crate::scoring::{pricing_for_score, score_or_calculate};

/// Match score for serving the lead's category.
const CATEGORY_MATCH_SCORE: i64 = 70;

/// Additional match score when the company serves the lead's location.
const LOCATION_MATCH_SCORE: i64 = 30;

/// Input of `create_anonymous_lead_and_distribute`.
#[derive(Debug, Clone)]
pub struct AnonymousLeadRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    pub metadata: LeadMetadata,
    pub anonymous_email: String,
    pub session_id: String,
}

fn serves_location(company: &Company, location: Option<&str>) -> bool {
    let Some(location) = location.map(str::to_lowercase) else {
        return false;
    };
    company.service_areas.0.iter().any(|area| {
        let area = area.trim().to_lowercase();
        !area.is_empty() && (location.contains(&area) || area.contains(location.trim()))
    })
}

async fn match_companies(
    conn: &mut SqliteConnection,
    category: &str,
    location: Option<&str>,
    min_budget_cents: i64,
) -> Result<Vec<(Company, CompanyMatch)>> {
    let companies = fetch_active_in_category(conn, category).await?;

    let mut matches: Vec<(Company, CompanyMatch)> = companies
        .into_iter()
        .filter(|c| c.remaining_budget_cents() >= min_budget_cents)
        .map(|company| {
            let mut match_score = CATEGORY_MATCH_SCORE;
            if serves_location(&company, location) {
                match_score += LOCATION_MATCH_SCORE;
            }
            let candidate = CompanyMatch {
                company_id: company.id.clone(),
                company_name: company.name.clone(),
                match_score,
                remaining_budget_cents: company.remaining_budget_cents(),
            };
            (company, candidate)
        })
        .collect();

    matches.sort_by(|(_, a), (_, b)| {
        b.match_score
            .cmp(&a.match_score)
            .then(b.remaining_budget_cents.cmp(&a.remaining_budget_cents))
            .then(a.company_id.cmp(&b.company_id))
    });

    Ok(matches)
}

/// Candidate companies for a category, best match first.
///
/// Only active companies with at least `min_budget_cents` left are returned.
pub async fn find_matching_companies(
    pool: &SqlitePool,
    category: &str,
    location: Option<&str>,
    min_budget_cents: i64,
) -> Result<Vec<CompanyMatch>> {
    let mut conn = pool.acquire().await?;
    let matches = match_companies(&mut conn, category, location, min_budget_cents).await?;
    Ok(matches.into_iter().map(|(_, m)| m).collect())
}

fn pick_company(
    candidates: Vec<(Company, CompanyMatch)>,
    strategy: DistributionStrategy,
) -> Option<CompanyMatch> {
    match strategy {
        DistributionStrategy::CategoryMatch => candidates.into_iter().next().map(|(_, m)| m),
        DistributionStrategy::BudgetBased => candidates
            .into_iter()
            .max_by(|(_, a), (_, b)| {
                a.remaining_budget_cents
                    .cmp(&b.remaining_budget_cents)
                    .then(b.company_id.cmp(&a.company_id))
            })
            .map(|(_, m)| m),
        // Never-assigned companies sort first (None < Some).
        DistributionStrategy::RoundRobin => candidates
            .into_iter()
            .min_by(|(a, am), (b, bm)| {
                a.last_assigned_at
                    .cmp(&b.last_assigned_at)
                    .then(am.company_id.cmp(&bm.company_id))
            })
            .map(|(_, m)| m),
    }
}

async fn assign(
    conn: &mut SqliteConnection,
    lead_id: &str,
    company_id: &str,
    cost_cents: i64,
    method: AssignmentMethod,
) -> Result<()> {
    let now = Utc::now();
    set_assignment(conn, lead_id, company_id, now).await?;
    record_spend(conn, company_id, cost_cents, now).await?;

    sqlx::query(
        r#"
        INSERT INTO lead_assignments (lead_id, company_id, cost_cents, method, assigned_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(lead_id)
    .bind(company_id)
    .bind(cost_cents)
    .bind(method)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    tracing::info!(lead_id, company_id, cost_cents, method = ?method, "Assigned lead");
    Ok(())
}

async fn distribute_with(
    conn: &mut SqliteConnection,
    lead_id: &str,
    min_budget_cents: i64,
) -> Result<Vec<DistributionRow>> {
    let lead = fetch_lead(conn, lead_id).await?;
    if lead.company_id.is_some() || lead.status != LeadStatus::New {
        tracing::debug!(lead_id, status = %lead.status, "Lead not eligible for distribution");
        return Ok(Vec::new());
    }

    let score = score_or_calculate(conn, lead_id).await?;
    let cost = pricing_for_score(score.overall_score).base_price_cents;

    let candidates = match_companies(
        conn,
        &lead.category,
        lead.metadata.0.location.as_deref(),
        cost.max(min_budget_cents),
    )
    .await?;

    let strategy = fetch_strategy(conn).await?;
    let Some(chosen) = pick_company(candidates, strategy) else {
        tracing::debug!(lead_id, category = %lead.category, "No eligible company for lead");
        return Ok(Vec::new());
    };

    assign(conn, lead_id, &chosen.company_id, cost, AssignmentMethod::Auto).await?;

    Ok(vec![DistributionRow {
        success: true,
        company_id: Some(chosen.company_id),
        assignment_cost: Some(cost),
    }])
}

/// Automatically assign a new lead to the best eligible company.
///
/// A company is eligible when it has at least the lead's tier price and at
/// least `min_budget_cents` left; it is charged the tier price. Returns an
/// empty list when the lead is not eligible or no company matches.
pub async fn distribute_new_lead_v3(
    pool: &SqlitePool,
    lead_id: &str,
    min_budget_cents: i64,
) -> Result<Vec<DistributionRow>> {
    let mut tx = pool.begin().await?;
    let rows = distribute_with(&mut tx, lead_id, min_budget_cents).await?;
    tx.commit().await?;
    Ok(rows)
}

/// Insert an anonymous lead and attempt distribution in one transaction.
///
/// Returns the new lead id.
pub async fn create_anonymous_lead_and_distribute(
    pool: &SqlitePool,
    request: &AnonymousLeadRequest,
    min_budget_cents: i64,
) -> Result<String> {
    let new_lead = NewLead {
        title: request.title.clone(),
        description: request.description.clone(),
        category: request.category.clone(),
        lead_type: LEAD_TYPE_VISITOR.to_string(),
        submitter: Submitter::Anonymous {
            email: request.anonymous_email.clone(),
            session_id: request.session_id.clone(),
        },
        metadata: request.metadata.clone(),
    };

    let mut tx = pool.begin().await?;
    let lead = insert_lead(&mut tx, &new_lead).await?;
    let rows = distribute_with(&mut tx, &lead.id, min_budget_cents).await?;
    tx.commit().await?;

    tracing::info!(
        lead_id = %lead.id,
        distributed = rows.iter().any(|r| r.success),
        "Created anonymous lead"
    );

    Ok(lead.id)
}

/// Assign a lead to a specific company, overriding automatic distribution.
///
/// Business failures (unknown lead, inactive company, insufficient budget)
/// are reported as `success: false` with a message rather than as errors.
/// `cost_cents` defaults to the lead's tier price.
pub async fn assign_lead_with_budget(
    pool: &SqlitePool,
    lead_id: &str,
    company_id: &str,
    cost_cents: Option<i64>,
) -> Result<AssignmentResult> {
    let mut tx = pool.begin().await?;

    let failure = |message: String| AssignmentResult {
        success: false,
        cost: None,
        error: Some(message),
    };

    let lead = match fetch_lead(&mut tx, lead_id).await {
        Ok(lead) => lead,
        Err(DatabaseError::NotFound { .. }) => return Ok(failure("Lead not found".to_string())),
        Err(e) => return Err(e),
    };

    if lead.company_id.as_deref() == Some(company_id) {
        return Ok(failure("Lead is already assigned to this company".to_string()));
    }

    let company = match fetch_company(&mut tx, company_id).await {
        Ok(company) => company,
        Err(DatabaseError::NotFound { .. }) => return Ok(failure("Company not found".to_string())),
        Err(e) => return Err(e),
    };

    if !company.is_active {
        return Ok(failure("Company is not active".to_string()));
    }

    let cost = match cost_cents {
        Some(cost) if cost < 0 => return Ok(failure("Cost cannot be negative".to_string())),
        Some(cost) => cost,
        None => {
            let score = score_or_calculate(&mut tx, lead_id).await?;
            pricing_for_score(score.overall_score).base_price_cents
        }
    };

    if company.remaining_budget_cents() < cost {
        return Ok(failure(format!(
            "Insufficient budget: {} remaining, {} required",
            company.remaining_budget_cents(),
            cost
        )));
    }

    assign(&mut tx, lead_id, company_id, cost, AssignmentMethod::Manual).await?;
    tx.commit().await?;

    Ok(AssignmentResult {
        success: true,
        cost: Some(cost),
        error: None,
    })
}

/// Attempt distribution of every queued lead, oldest first.
///
/// Each lead runs in its own transaction; a failing lead is counted and
/// skipped.
pub async fn process_queued_leads(
    pool: &SqlitePool,
    min_budget_cents: i64,
) -> Result<QueueRunSummary> {
    let queued = {
        let mut conn = pool.acquire().await?;
        fetch_unassigned_leads(&mut conn).await?
    };

    let mut summary = QueueRunSummary::default();
    for lead in queued {
        summary.processed += 1;
        match distribute_new_lead_v3(pool, &lead.id, min_budget_cents).await {
            Ok(rows) if rows.iter().any(|r| r.success) => summary.successful += 1,
            Ok(_) => summary.failed += 1,
            Err(e) => {
                tracing::warn!(lead_id = %lead.id, error = %e, "Queued lead distribution failed");
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        processed = summary.processed,
        successful = summary.successful,
        failed = summary.failed,
        "Processed queued leads"
    );

    Ok(summary)
}

async fn fetch_strategy(conn: &mut SqliteConnection) -> Result<DistributionStrategy> {
    let strategy = sqlx::query_scalar::<_, DistributionStrategy>(
        "SELECT strategy FROM distribution_settings WHERE id = 1",
    )
    .fetch_optional(&mut *conn)
    .await?;

    Ok(strategy.unwrap_or_default())
}

/// The configured distribution strategy.
pub async fn get_strategy(pool: &SqlitePool) -> Result<DistributionStrategy> {
    let mut conn = pool.acquire().await?;
    fetch_strategy(&mut conn).await
}

/// Change the distribution strategy.
pub async fn set_strategy(pool: &SqlitePool, strategy: DistributionStrategy) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO distribution_settings (id, strategy, updated_at)
        VALUES (1, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            strategy = excluded.strategy,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(strategy)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Assignment history of a lead, oldest first.
pub async fn list_assignments(pool: &SqlitePool, lead_id: &str) -> Result<Vec<LeadAssignment>> {
    let rows = sqlx::query_as::<_, LeadAssignment>(
        r#"
        SELECT id, lead_id, company_id, cost_cents, method, assigned_at
        FROM lead_assignments
        WHERE lead_id = ?
        ORDER BY id
        "#,
    )
    .bind(lead_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
