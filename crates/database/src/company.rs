//! Company CRUD operations.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::Company;

const COMPANY_COLUMNS: &str = "id, name, categories, service_areas, monthly_budget_cents, \
    budget_spent_cents, is_active, last_assigned_at, created_at";

/// Fields required to register a company.
#[derive(Debug, Clone)]
pub struct NewCompany {
    pub id: String,
    pub name: String,
    pub categories: Vec<String>,
    pub service_areas: Vec<String>,
    pub monthly_budget_cents: i64,
}

/// Create a new company.
pub async fn create_company(pool: &SqlitePool, company: &NewCompany) -> Result<Company> {
    sqlx::query(
        r#"
        INSERT INTO companies (id, name, categories, service_areas, monthly_budget_cents, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&company.id)
    .bind(&company.name)
    .bind(Json(&company.categories))
    .bind(Json(&company.service_areas))
    .bind(company.monthly_budget_cents)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::on_conflict(e, "Company", company.id.clone()))?;

    get_company(pool, &company.id).await
}

/// Get a company by ID.
pub async fn get_company(pool: &SqlitePool, id: &str) -> Result<Company> {
    let mut conn = pool.acquire().await?;
    fetch_company(&mut conn, id).await
}

pub(crate) async fn fetch_company(conn: &mut SqliteConnection, id: &str) -> Result<Company> {
    sqlx::query_as::<_, Company>(&format!(
        "SELECT {} FROM companies WHERE id = ?",
        COMPANY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Company",
        id: id.to_string(),
    })
}

/// List all companies by name.
pub async fn list_companies(pool: &SqlitePool) -> Result<Vec<Company>> {
    let companies = sqlx::query_as::<_, Company>(&format!(
        "SELECT {} FROM companies ORDER BY name",
        COMPANY_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(companies)
}

/// Active companies that list `category` among their categories.
pub(crate) async fn fetch_active_in_category(
    conn: &mut SqliteConnection,
    category: &str,
) -> Result<Vec<Company>> {
    let companies = sqlx::query_as::<_, Company>(&format!(
        r#"
        SELECT {}
        FROM companies c
        WHERE c.is_active = 1
          AND EXISTS (SELECT 1 FROM json_each(c.categories) WHERE json_each.value = ?)
        ORDER BY c.name
        "#,
        COMPANY_COLUMNS
    ))
    .bind(category)
    .fetch_all(&mut *conn)
    .await?;

    Ok(companies)
}

/// Enable or disable a company for distribution.
pub async fn set_active(pool: &SqlitePool, id: &str, is_active: bool) -> Result<()> {
    let result = sqlx::query("UPDATE companies SET is_active = ? WHERE id = ?")
        .bind(is_active)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Company",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Set the monthly budget and reset spend (start of a billing period).
pub async fn reset_budget(pool: &SqlitePool, id: &str, monthly_budget_cents: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE companies
        SET monthly_budget_cents = ?, budget_spent_cents = 0
        WHERE id = ?
        "#,
    )
    .bind(monthly_budget_cents)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Company",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Charge an assignment to a company's budget.
pub(crate) async fn record_spend(
    conn: &mut SqliteConnection,
    id: &str,
    cost_cents: i64,
    at: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE companies
        SET budget_spent_cents = budget_spent_cents + ?, last_assigned_at = ?
        WHERE id = ?
        "#,
    )
    .bind(cost_cents)
    .bind(at)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Company",
            id: id.to_string(),
        });
    }

    Ok(())
}
