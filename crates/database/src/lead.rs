//! Lead CRUD operations.
//!
//! Leads are never deleted; their lifecycle is expressed through `status`.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{Lead, LeadStatus, NewLead, Submitter};

const LEAD_COLUMNS: &str = "id, title, description, category, status, lead_type, submitted_by, \
    company_id, anonymous_email, session_id, metadata, created_at, updated_at, attributed_at, \
    confirmation_email_sent_at";

/// Insert a new lead with status `new` and return it.
pub async fn create_lead(pool: &SqlitePool, lead: &NewLead) -> Result<Lead> {
    let mut conn = pool.acquire().await?;
    insert_lead(&mut conn, lead).await
}

pub(crate) async fn insert_lead(conn: &mut SqliteConnection, lead: &NewLead) -> Result<Lead> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    let (submitted_by, anonymous_email, session_id) = match &lead.submitter {
        Submitter::User(user_id) => (Some(user_id.as_str()), None, None),
        Submitter::Anonymous { email, session_id } => {
            (None, Some(email.as_str()), Some(session_id.as_str()))
        }
    };

    sqlx::query(
        r#"
        INSERT INTO leads (
            id, title, description, category, status, lead_type, submitted_by,
            anonymous_email, session_id, metadata, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&lead.title)
    .bind(&lead.description)
    .bind(&lead.category)
    .bind(LeadStatus::New)
    .bind(&lead.lead_type)
    .bind(submitted_by)
    .bind(anonymous_email)
    .bind(session_id)
    .bind(Json(&lead.metadata))
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| DatabaseError::on_conflict(e, "Lead", id.clone()))?;

    tracing::debug!(lead_id = %id, category = %lead.category, "Inserted lead");

    fetch_lead(conn, &id).await
}

/// Get a lead by ID.
pub async fn get_lead(pool: &SqlitePool, id: &str) -> Result<Lead> {
    let mut conn = pool.acquire().await?;
    fetch_lead(&mut conn, id).await
}

pub(crate) async fn fetch_lead(conn: &mut SqliteConnection, id: &str) -> Result<Lead> {
    sqlx::query_as::<_, Lead>(&format!("SELECT {} FROM leads WHERE id = ?", LEAD_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "Lead",
            id: id.to_string(),
        })
}

/// List leads submitted by a user, newest first.
pub async fn list_leads_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Lead>> {
    let leads = sqlx::query_as::<_, Lead>(&format!(
        "SELECT {} FROM leads WHERE submitted_by = ? ORDER BY created_at DESC",
        LEAD_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(leads)
}

/// List leads assigned to a company, newest first.
pub async fn list_leads_for_company(pool: &SqlitePool, company_id: &str) -> Result<Vec<Lead>> {
    let leads = sqlx::query_as::<_, Lead>(&format!(
        "SELECT {} FROM leads WHERE company_id = ? ORDER BY created_at DESC",
        LEAD_COLUMNS
    ))
    .bind(company_id)
    .fetch_all(pool)
    .await?;

    Ok(leads)
}

/// List the distribution backlog: new leads with no company, oldest first.
pub async fn list_unassigned_leads(pool: &SqlitePool) -> Result<Vec<Lead>> {
    let mut conn = pool.acquire().await?;
    fetch_unassigned_leads(&mut conn).await
}

pub(crate) async fn fetch_unassigned_leads(conn: &mut SqliteConnection) -> Result<Vec<Lead>> {
    let leads = sqlx::query_as::<_, Lead>(&format!(
        "SELECT {} FROM leads WHERE company_id IS NULL AND status = ? ORDER BY created_at",
        LEAD_COLUMNS
    ))
    .bind(LeadStatus::New)
    .fetch_all(&mut *conn)
    .await?;

    Ok(leads)
}

/// Set the status of a lead.
pub async fn update_status(pool: &SqlitePool, id: &str, status: LeadStatus) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE leads
        SET status = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(status)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Lead",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Record that the confirmation email for a lead was sent.
pub async fn mark_confirmation_sent(pool: &SqlitePool, id: &str) -> Result<()> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        UPDATE leads
        SET confirmation_email_sent_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Lead",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Attach a lead to a company.
pub(crate) async fn set_assignment(
    conn: &mut SqliteConnection,
    id: &str,
    company_id: &str,
    at: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE leads
        SET company_id = ?, attributed_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(company_id)
    .bind(at)
    .bind(at)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Lead",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Count active companies serving a category.
pub(crate) async fn count_companies_in_category(
    conn: &mut SqliteConnection,
    category: &str,
) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM companies c
        WHERE c.is_active = 1
          AND EXISTS (SELECT 1 FROM json_each(c.categories) WHERE json_each.value = ?)
        "#,
    )
    .bind(category)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

/// Count leads grouped by status.
pub async fn count_leads_by_status(pool: &SqlitePool) -> Result<Vec<(LeadStatus, i64)>> {
    let rows = sqlx::query_as::<_, (LeadStatus, i64)>(
        r#"
        SELECT status, COUNT(*) as count
        FROM leads
        GROUP BY status
        ORDER BY count DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
