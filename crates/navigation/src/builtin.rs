//! Plugins shipped with the platform.

use crate::capability::AccessRule;
use crate::dashboard::{DashboardWidget, WidgetSize};
use crate::item::NavigationItem;
use crate::plugin::{
    HookName, HookOutput, HookRegistration, Plugin, PluginContext, PluginError, PluginManifest,
    PluginRegistry,
};
use crate::role::Role;

/// Session attribute holding the unread notification count.
pub const UNREAD_NOTIFICATIONS_ATTRIBUTE: &str = "unread_notifications";

/// Feature flag gating the company lead marketplace.
pub const LEAD_MARKETPLACE_FLAG: &str = "lead_marketplace";

pub(crate) fn register_builtin(registry: PluginRegistry) -> PluginRegistry {
    registry
        .register("leads", || Box::new(LeadsPlugin))
        .register("notifications", || Box::new(NotificationsPlugin::default()))
}

const LEAD_ROLES: [Role; 4] = [Role::User, Role::Company, Role::Admin, Role::MasterAdmin];

/// Lead intake, marketplace and distribution surfaces.
pub struct LeadsPlugin;

impl LeadsPlugin {
    fn navigation() -> NavigationItem {
        NavigationItem::new("leads", "/leads", "Forespørsler", "inbox")
            .roles(&LEAD_ROLES)
            .children(vec![
                NavigationItem::new("leads-new", "/leads/new", "Ny forespørsel", "plus")
                    .roles(&[Role::User])
                    .quick_action(1),
                NavigationItem::new("leads-mine", "/leads/my", "Mine forespørsler", "list")
                    .roles(&[Role::User]),
                NavigationItem::new("leads-company", "/leads/company", "Mine leads", "briefcase")
                    .roles(&[Role::Company]),
                NavigationItem::new(
                    "leads-marketplace",
                    "/leads/marketplace",
                    "Markedsplass",
                    "store",
                )
                .roles(&[Role::Company])
                .flag(LEAD_MARKETPLACE_FLAG)
                .quick_action(2),
                NavigationItem::new(
                    "leads-distribution",
                    "/leads/distribution",
                    "Distribusjon",
                    "git-branch",
                )
                .roles(&[Role::Admin, Role::MasterAdmin])
                .quick_action(3),
            ])
    }

    fn widgets() -> Vec<DashboardWidget> {
        vec![
            DashboardWidget::new("lead-stats", "Forespørsler", "LeadStats", WidgetSize::Medium, 80)
                .access(AccessRule::roles(&LEAD_ROLES)),
            DashboardWidget::new("bid-overview", "Mine bud", "BidOverview", WidgetSize::Medium, 75)
                .access(AccessRule::roles(&[Role::Company]).with_flag(LEAD_MARKETPLACE_FLAG)),
            DashboardWidget::new(
                "distribution-queue",
                "Distribusjonskø",
                "DistributionQueue",
                WidgetSize::Large,
                90,
            )
            .access(AccessRule::roles(&[Role::Admin, Role::MasterAdmin])),
        ]
    }
}

impl Plugin for LeadsPlugin {
    fn manifest(&self) -> PluginManifest {
        PluginManifest {
            id: "leads".to_string(),
            name: "Forespørsler".to_string(),
            version: "1.0.0".to_string(),
            dependencies: Vec::new(),
            access: AccessRule::roles(&LEAD_ROLES),
        }
    }

    fn hooks(&self) -> Vec<HookRegistration> {
        vec![
            HookRegistration::new(HookName::NavigationItems, 50, |_| {
                Ok(vec![HookOutput::NavItem(Self::navigation())])
            }),
            HookRegistration::new(HookName::DashboardWidgets, 50, |_| {
                Ok(Self::widgets().into_iter().map(HookOutput::Widget).collect())
            }),
        ]
    }
}

/// In-app notifications.
#[derive(Default)]
pub struct NotificationsPlugin {
    unread: u32,
}

impl Plugin for NotificationsPlugin {
    fn manifest(&self) -> PluginManifest {
        PluginManifest {
            id: "notifications".to_string(),
            name: "Varsler".to_string(),
            version: "1.0.0".to_string(),
            dependencies: Vec::new(),
            access: AccessRule::roles(&Role::AUTHENTICATED),
        }
    }

    fn initialize(&mut self, context: &PluginContext) -> Result<(), PluginError> {
        if let Some(raw) = context.attributes.get(UNREAD_NOTIFICATIONS_ATTRIBUTE) {
            self.unread = raw.parse().map_err(|_| PluginError::Initialization {
                plugin: "notifications".to_string(),
                message: format!("invalid unread count: {}", raw),
            })?;
        }
        Ok(())
    }

    fn hooks(&self) -> Vec<HookRegistration> {
        let unread = self.unread;
        vec![
            HookRegistration::new(HookName::NavigationItems, 10, move |_| {
                let mut item = NavigationItem::new("notifications", "/notifications", "Varsler", "bell")
                    .roles(&Role::AUTHENTICATED);
                if unread > 0 {
                    item = item.badge(unread.to_string());
                }
                Ok(vec![HookOutput::NavItem(item)])
            }),
            HookRegistration::new(HookName::DashboardWidgets, 10, |_| {
                Ok(vec![HookOutput::Widget(DashboardWidget::new(
                    "recent-notifications",
                    "Siste varsler",
                    "RecentNotifications",
                    WidgetSize::Small,
                    40,
                ))])
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capabilities;
    use crate::plugin::{HookArgs, PluginManager};

    fn session(context: PluginContext) -> PluginManager {
        PluginManager::for_session(PluginRegistry::builtin(), context)
    }

    #[test]
    fn test_guest_loads_no_builtin_plugins() {
        let manager = session(
            PluginContext::new(None, Capabilities::new(Role::Guest)),
        );
        assert!(manager.loaded_ids().is_empty());
    }

    #[test]
    fn test_content_editor_gets_notifications_only() {
        let manager = session(
            PluginContext::new(Some("e1".to_string()), Capabilities::new(Role::ContentEditor)),
        );
        assert_eq!(manager.loaded_ids(), vec!["notifications"]);
    }

    #[test]
    fn test_unread_badge() {
        let caps = Capabilities::new(Role::User);
        let manager = session(
            PluginContext::new(Some("u1".to_string()), caps.clone())
                .with_attribute(UNREAD_NOTIFICATIONS_ATTRIBUTE, "3"),
        );

        let outputs = manager.execute_hooks(HookName::NavigationItems, &HookArgs::new(caps, "/"));
        let badge = outputs.iter().find_map(|o| match o {
            HookOutput::NavItem(item) if item.id == "notifications" => item.badge.clone(),
            _ => None,
        });
        assert_eq!(badge.as_deref(), Some("3"));
    }

    #[test]
    fn test_bad_unread_count_skips_plugin() {
        let manager = session(
            PluginContext::new(Some("u1".to_string()), Capabilities::new(Role::User))
                .with_attribute(UNREAD_NOTIFICATIONS_ATTRIBUTE, "many"),
        );
        assert_eq!(manager.loaded_ids(), vec!["leads"]);
    }
}
