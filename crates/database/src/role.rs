//! User role and module access storage.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};

/// Known roles and their levels, lowest first.
pub const ROLE_LEVELS: [(&str, i64); 6] = [
    ("guest", 0),
    ("user", 20),
    ("company", 40),
    ("content_editor", 60),
    ("admin", 80),
    ("master_admin", 100),
];

/// Level of a role name, `None` for unknown roles.
pub fn role_level(role: &str) -> Option<i64> {
    ROLE_LEVELS
        .iter()
        .find(|(name, _)| *name == role)
        .map(|(_, level)| *level)
}

/// Grant a role to a user.
pub async fn grant_role(pool: &SqlitePool, user_id: &str, role: &str) -> Result<()> {
    if role_level(role).is_none() {
        return Err(DatabaseError::InvalidInput(format!("unknown role: {}", role)));
    }

    sqlx::query(
        r#"
        INSERT INTO user_roles (user_id, role, granted_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(role)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::on_conflict(e, "UserRole", format!("{}/{}", user_id, role)))?;

    Ok(())
}

/// Revoke a role from a user.
pub async fn revoke_role(pool: &SqlitePool, user_id: &str, role: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role = ?")
        .bind(user_id)
        .bind(role)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "UserRole",
            id: format!("{}/{}", user_id, role),
        });
    }

    Ok(())
}

/// All roles held by a user.
pub async fn get_user_roles(pool: &SqlitePool, user_id: &str) -> Result<Vec<String>> {
    let roles = sqlx::query_scalar::<_, String>(
        "SELECT role FROM user_roles WHERE user_id = ? ORDER BY role",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(roles)
}

/// Whether a user holds exactly this role.
pub async fn has_role(pool: &SqlitePool, user_id: &str, role: &str) -> Result<bool> {
    let found = sqlx::query_scalar::<_, i32>(
        "SELECT 1 FROM user_roles WHERE user_id = ? AND role = ?",
    )
    .bind(user_id)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

/// Highest role level held by a user; users without roles are at level 0.
pub async fn get_user_role_level(pool: &SqlitePool, user_id: &str) -> Result<i64> {
    let roles = get_user_roles(pool, user_id).await?;
    Ok(roles
        .iter()
        .filter_map(|r| role_level(r))
        .max()
        .unwrap_or(0))
}

/// Whether a user's highest role is at least `min_level`.
pub async fn has_role_level(pool: &SqlitePool, user_id: &str, min_level: i64) -> Result<bool> {
    Ok(get_user_role_level(pool, user_id).await? >= min_level)
}

/// Grant a user access to a module.
pub async fn grant_module_access(pool: &SqlitePool, user_id: &str, module_name: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO module_access (user_id, module_name, granted_at)
        VALUES (?, ?, ?)
        ON CONFLICT(user_id, module_name) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(module_name)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Whether a user may use a module.
pub async fn has_module_access(pool: &SqlitePool, user_id: &str, module_name: &str) -> Result<bool> {
    let found = sqlx::query_scalar::<_, i32>(
        "SELECT 1 FROM module_access WHERE user_id = ? AND module_name = ?",
    )
    .bind(user_id)
    .bind(module_name)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}
