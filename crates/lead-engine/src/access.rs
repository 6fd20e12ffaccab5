//! Role, module and feature flag checks.
//!
//! Every helper here fails closed: a backend error reads as "no access" and
//! is logged, never returned.

use std::sync::Arc;

use navigation::{Capabilities, Role};
use tracing::warn;

use crate::backend::LeadBackend;

const MODULE: &str = "access";

/// Read-only access checks against a [`LeadBackend`].
#[derive(Clone)]
pub struct AccessService {
    backend: Arc<dyn LeadBackend>,
}

impl AccessService {
    pub fn new(backend: Arc<dyn LeadBackend>) -> Self {
        Self { backend }
    }

    /// Build the capabilities a session navigates with.
    ///
    /// The role is the highest one the user holds; signed-in users without
    /// role rows are plain users. Each of `flags` is evaluated for the user
    /// and each of `modules` the user may open becomes a permission. If the
    /// roles cannot be read the session is treated as a guest.
    pub async fn resolve_capabilities(
        &self,
        user_id: Option<&str>,
        flags: &[&str],
        modules: &[&str],
    ) -> Capabilities {
        let role = match user_id {
            Some(user_id) => self.resolve_role(user_id).await,
            None => Role::Guest,
        };

        let mut caps = Capabilities::new(role);
        for flag in flags {
            if self.is_feature_enabled(flag, user_id).await {
                caps = caps.with_flag(*flag);
            }
        }

        if let Some(user_id) = user_id.filter(|_| role != Role::Guest) {
            for module in modules {
                if self.has_module_access(user_id, module).await {
                    caps = caps.with_permission(*module);
                }
            }
        }

        caps
    }

    async fn resolve_role(&self, user_id: &str) -> Role {
        match self.backend.get_user_roles(user_id).await {
            Ok(names) => names
                .iter()
                .filter_map(|name| name.parse::<Role>().ok())
                .max_by_key(Role::level)
                .unwrap_or(Role::User),
            Err(e) => {
                warn!(module = MODULE, action = "get_user_roles", user_id, error = %e, "Falling back to guest");
                Role::Guest
            }
        }
    }

    /// Whether a flag is on for the user. Unknown flags are off.
    pub async fn is_feature_enabled(&self, flag_name: &str, user_id: Option<&str>) -> bool {
        self.backend
            .is_feature_enabled(flag_name, user_id)
            .await
            .unwrap_or_else(|e| {
                warn!(module = MODULE, action = "is_feature_enabled", flag_name, error = %e, "Treating flag as disabled");
                false
            })
    }

    pub async fn has_module_access(&self, user_id: &str, module_name: &str) -> bool {
        self.backend
            .has_module_access(user_id, module_name)
            .await
            .unwrap_or_else(|e| {
                warn!(module = MODULE, action = "has_module_access", user_id, module_name, error = %e, "Denying module access");
                false
            })
    }

    pub async fn has_role(&self, user_id: &str, role: Role) -> bool {
        self.backend
            .has_role(user_id, role.as_str())
            .await
            .unwrap_or_else(|e| {
                warn!(module = MODULE, action = "has_role", user_id, role = %role, error = %e, "Denying role");
                false
            })
    }

    pub async fn has_role_level(&self, user_id: &str, min_level: i64) -> bool {
        self.backend
            .has_role_level(user_id, min_level)
            .await
            .unwrap_or_else(|e| {
                warn!(module = MODULE, action = "has_role_level", user_id, min_level, error = %e, "Denying role level");
                false
            })
    }

    /// Highest role level of the user, 0 when unknown.
    pub async fn get_user_role_level(&self, user_id: &str) -> i64 {
        self.backend
            .get_user_role_level(user_id)
            .await
            .unwrap_or_else(|e| {
                warn!(module = MODULE, action = "get_user_role_level", user_id, error = %e, "Using level 0");
                0
            })
    }
}
