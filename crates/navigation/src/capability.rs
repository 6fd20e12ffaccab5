//! Capability resolution shared by navigation, dashboards and plugins.
//!
//! Every gate in this crate goes through [`Capabilities::can_access`], a pure
//! function of the user's role, permissions and enabled feature flags.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::role::Role;

/// Permission that grants every other permission.
pub const WILDCARD_PERMISSION: &str = "*";

/// What a user is, may do, and which flags are on for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capabilities {
    pub role: Role,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default)]
    pub flags: BTreeSet<String>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::new(Role::Guest)
    }
}

impl Capabilities {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            permissions: BTreeSet::new(),
            flags: BTreeSet::new(),
        }
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    /// True when `roles` is empty or contains the user's role.
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.is_empty() || roles.contains(&self.role)
    }

    /// Master admins hold every permission.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.role == Role::MasterAdmin
            || self.permissions.contains(WILDCARD_PERMISSION)
            || self.permissions.contains(permission)
    }

    pub fn flag_enabled(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    /// Evaluate an access rule. All present conditions must hold; the role
    /// list is satisfied by any one matching role.
    pub fn can_access(&self, rule: &AccessRule) -> bool {
        self.has_any_role(&rule.roles)
            && rule
                .permission
                .as_deref()
                .map_or(true, |p| self.has_permission(p))
            && rule
                .feature_flag
                .as_deref()
                .map_or(true, |f| self.flag_enabled(f))
    }
}

/// Conditions guarding a navigation item, widget or plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub permission: Option<String>,
    #[serde(default)]
    pub feature_flag: Option<String>,
}

impl AccessRule {
    /// A rule everyone passes.
    pub fn anyone() -> Self {
        Self::default()
    }

    pub fn roles(roles: &[Role]) -> Self {
        Self {
            roles: roles.to_vec(),
            ..Self::default()
        }
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.feature_flag = Some(flag.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rule_allows_everyone() {
        assert!(Capabilities::new(Role::Guest).can_access(&AccessRule::anyone()));
    }

    #[test]
    fn test_role_list_is_or() {
        let rule = AccessRule::roles(&[Role::Admin, Role::Company]);
        assert!(Capabilities::new(Role::Company).can_access(&rule));
        assert!(Capabilities::new(Role::Admin).can_access(&rule));
        assert!(!Capabilities::new(Role::User).can_access(&rule));
    }

    #[test]
    fn test_permission_and_flag_are_and() {
        let rule = AccessRule::roles(&[Role::Company])
            .with_permission("leads.bid")
            .with_flag("lead_marketplace");

        let company = Capabilities::new(Role::Company);
        assert!(!company.can_access(&rule));
        assert!(!company.clone().with_permission("leads.bid").can_access(&rule));
        assert!(company
            .with_permission("leads.bid")
            .with_flag("lead_marketplace")
            .can_access(&rule));
    }

    #[test]
    fn test_master_admin_has_every_permission() {
        let caps = Capabilities::new(Role::MasterAdmin);
        assert!(caps.has_permission("anything.at.all"));
        assert!(Capabilities::new(Role::User)
            .with_permission(WILDCARD_PERMISSION)
            .has_permission("leads.view"));
        assert!(!Capabilities::new(Role::Admin).has_permission("leads.view"));
    }

    #[test]
    fn test_deserialize_session_capabilities() {
        let caps: Capabilities = serde_json::from_str(r#"{"role":"content_editor"}"#).unwrap();
        assert_eq!(caps, Capabilities::new(Role::ContentEditor));

        let caps: Capabilities = serde_json::from_str(
            r#"{"role":"company","permissions":["leads"],"flags":["lead_marketplace"]}"#,
        )
        .unwrap();
        assert!(caps.has_permission("leads"));
        assert!(caps.flag_enabled("lead_marketplace"));
    }
}
