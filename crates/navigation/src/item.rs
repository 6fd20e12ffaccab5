//! Navigation tree items.

use serde::{Deserialize, Serialize};

use crate::capability::AccessRule;
use crate::role::Role;

/// One entry of the navigation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationItem {
    pub id: String,
    pub href: String,
    pub title: String,
    pub icon: String,
    #[serde(default)]
    pub children: Vec<NavigationItem>,
    /// Any one of these roles grants access; empty means no role requirement.
    #[serde(default)]
    pub required_role: Vec<Role>,
    #[serde(default)]
    pub permission: Option<String>,
    #[serde(default)]
    pub feature_flag: Option<String>,
    #[serde(default)]
    pub badge: Option<String>,
    /// Position among quick actions (lower first); `None` when not a quick action.
    #[serde(default)]
    pub quick_action_priority: Option<u32>,
}

impl NavigationItem {
    pub fn new(
        id: impl Into<String>,
        href: impl Into<String>,
        title: impl Into<String>,
        icon: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
            title: title.into(),
            icon: icon.into(),
            children: Vec::new(),
            required_role: Vec::new(),
            permission: None,
            feature_flag: None,
            badge: None,
            quick_action_priority: None,
        }
    }

    pub fn roles(mut self, roles: &[Role]) -> Self {
        self.required_role = roles.to_vec();
        self
    }

    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.feature_flag = Some(flag.into());
        self
    }

    pub fn badge(mut self, badge: impl Into<String>) -> Self {
        self.badge = Some(badge.into());
        self
    }

    pub fn quick_action(mut self, priority: u32) -> Self {
        self.quick_action_priority = Some(priority);
        self
    }

    pub fn children(mut self, children: Vec<NavigationItem>) -> Self {
        self.children = children;
        self
    }

    /// The item's own gate (ancestors not included).
    pub fn access_rule(&self) -> AccessRule {
        AccessRule {
            roles: self.required_role.clone(),
            permission: self.permission.clone(),
            feature_flag: self.feature_flag.clone(),
        }
    }

    /// Depth-first iterator over this item and all descendants.
    pub fn walk(&self) -> impl Iterator<Item = &NavigationItem> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let item = stack.pop()?;
            stack.extend(item.children.iter().rev());
            Some(item)
        })
    }
}
