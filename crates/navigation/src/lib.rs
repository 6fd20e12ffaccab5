//! Role-aware navigation and dashboard composition.
//!
//! This crate turns a session's role, permissions and enabled feature flags
//! into what the UI shows. It provides:
//!
//! - [`Capabilities`] / [`AccessRule`] - The single access gate used everywhere
//! - [`UnifiedNavigation`] - Primary, mobile, quick action and breadcrumb views
//! - [`PluginManager`] - Session-scoped plugins contributing items and widgets
//! - [`compose_dashboard`] - Dashboard widgets visible to a session
//!
//! Nothing here performs I/O; capabilities are resolved by the caller.

mod builtin;
mod capability;
mod dashboard;
mod item;
mod menu;
mod navigation;
mod plugin;
mod role;

pub use builtin::{
    LeadsPlugin, NotificationsPlugin, LEAD_MARKETPLACE_FLAG, UNREAD_NOTIFICATIONS_ATTRIBUTE,
};
pub use capability::{AccessRule, Capabilities, WILDCARD_PERMISSION};
pub use dashboard::{compose_dashboard, default_widgets, DashboardWidget, WidgetSize};
pub use item::NavigationItem;
pub use menu::default_navigation;
pub use navigation::{
    Breadcrumb, NavigationCache, NavigationCacheKey, NavigationView, UnifiedNavigation,
    MAX_QUICK_ACTIONS, MOBILE_MAX_ITEMS, MOBILE_TITLE_MAX,
};
pub use plugin::{
    HookArgs, HookHandler, HookName, HookOutput, HookRegistration, Plugin, PluginConstructor,
    PluginContext, PluginError, PluginManager, PluginManifest, PluginRegistry,
};
pub use role::Role;

#[cfg(test)]
mod tests {
    use super::*;

    fn session(caps: &Capabilities) -> PluginManager {
        PluginManager::for_session(
            PluginRegistry::builtin(),
            PluginContext::new(Some("session-user".to_string()), caps.clone()),
        )
    }

    fn widget_ids(widgets: &[DashboardWidget]) -> Vec<&str> {
        widgets.iter().map(|w| w.id.as_str()).collect()
    }

    #[test]
    fn test_dashboard_for_user() {
        let caps = Capabilities::new(Role::User);
        let widgets = compose_dashboard(&caps, &session(&caps));

        assert_eq!(
            widget_ids(&widgets),
            vec!["welcome", "lead-stats", "profile-completion", "recent-notifications"]
        );
    }

    #[test]
    fn test_dashboard_for_admin() {
        let caps = Capabilities::new(Role::Admin);
        let widgets = compose_dashboard(&caps, &session(&caps));

        assert_eq!(
            widget_ids(&widgets),
            vec![
                "welcome",
                "system-health",
                "distribution-queue",
                "lead-stats",
                "recent-notifications"
            ]
        );
    }

    #[test]
    fn test_dashboard_flagged_widget() {
        let caps = Capabilities::new(Role::Company).with_flag(LEAD_MARKETPLACE_FLAG);
        let widgets = compose_dashboard(&caps, &session(&caps));
        assert!(widget_ids(&widgets).contains(&"bid-overview"));

        let caps = Capabilities::new(Role::Company);
        let widgets = compose_dashboard(&caps, &session(&caps));
        assert!(!widget_ids(&widgets).contains(&"bid-overview"));
    }

    #[test]
    fn test_guest_dashboard_is_empty() {
        let caps = Capabilities::default();
        assert!(compose_dashboard(&caps, &session(&caps)).is_empty());
    }

    #[test]
    fn test_disabled_plugin_contributes_nothing() {
        let caps = Capabilities::new(Role::User);
        let mut plugins = session(&caps);
        plugins.toggle_plugin("leads", false).unwrap();

        let widgets = compose_dashboard(&caps, &plugins);
        assert!(!widget_ids(&widgets).contains(&"lead-stats"));

        let view = UnifiedNavigation::with_defaults().build(&caps, &plugins, "/");
        assert!(view.primary.iter().all(|i| i.id != "leads"));
    }
}
