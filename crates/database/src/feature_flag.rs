//! Feature flag storage and evaluation.

use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::FeatureFlag;
use crate::role::get_user_roles;

/// Create or replace a feature flag.
pub async fn upsert_flag(
    pool: &SqlitePool,
    name: &str,
    is_enabled: bool,
    rollout_percentage: i64,
    target_roles: &[String],
    description: Option<&str>,
) -> Result<()> {
    if !(0..=100).contains(&rollout_percentage) {
        return Err(DatabaseError::InvalidInput(format!(
            "rollout percentage must be 0-100, got {}",
            rollout_percentage
        )));
    }

    sqlx::query(
        r#"
        INSERT INTO feature_flags (name, is_enabled, rollout_percentage, target_roles, description, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(name) DO UPDATE SET
            is_enabled = excluded.is_enabled,
            rollout_percentage = excluded.rollout_percentage,
            target_roles = excluded.target_roles,
            description = excluded.description,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(name)
    .bind(is_enabled)
    .bind(rollout_percentage)
    .bind(Json(target_roles))
    .bind(description)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a flag by name.
pub async fn get_flag(pool: &SqlitePool, name: &str) -> Result<Option<FeatureFlag>> {
    let flag = sqlx::query_as::<_, FeatureFlag>(
        r#"
        SELECT name, is_enabled, rollout_percentage, target_roles, description, updated_at
        FROM feature_flags
        WHERE name = ?
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(flag)
}

/// List all flags by name.
pub async fn list_flags(pool: &SqlitePool) -> Result<Vec<FeatureFlag>> {
    let flags = sqlx::query_as::<_, FeatureFlag>(
        r#"
        SELECT name, is_enabled, rollout_percentage, target_roles, description, updated_at
        FROM feature_flags
        ORDER BY name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(flags)
}

/// Stable 0-99 bucket for a user within a flag's rollout.
pub fn rollout_bucket(flag_name: &str, user_id: &str) -> u8 {
    let digest = Sha256::digest(format!("{}:{}", flag_name, user_id).as_bytes());
    let value = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    (value % 100) as u8
}

/// Evaluate a flag for an optional user.
///
/// Unknown flags are disabled. Role targeting and partial rollouts need a
/// user; anonymous callers only see flags enabled for everyone.
pub async fn is_feature_enabled(
    pool: &SqlitePool,
    flag_name: &str,
    user_id: Option<&str>,
) -> Result<bool> {
    let Some(flag) = get_flag(pool, flag_name).await? else {
        return Ok(false);
    };

    if !flag.is_enabled {
        return Ok(false);
    }

    if !flag.target_roles.0.is_empty() {
        let Some(user_id) = user_id else {
            return Ok(false);
        };
        let roles = get_user_roles(pool, user_id).await?;
        if !roles.iter().any(|r| flag.target_roles.0.contains(r)) {
            return Ok(false);
        }
    }

    if flag.rollout_percentage >= 100 {
        return Ok(true);
    }

    Ok(match user_id {
        Some(user_id) => i64::from(rollout_bucket(flag_name, user_id)) < flag.rollout_percentage,
        None => false,
    })
}
