//! Built-in navigation tree.
//!
//! Lead and notification entries are contributed by their plugins.

use crate::item::NavigationItem;
use crate::role::Role;

/// The navigation tree every session starts from.
pub fn default_navigation() -> Vec<NavigationItem> {
    vec![
        NavigationItem::new("home", "/", "Hjem", "home"),
        NavigationItem::new("login", "/login", "Logg inn", "log-in").roles(&[Role::Guest]),
        NavigationItem::new("dashboard", "/dashboard", "Dashboard", "layout-dashboard")
            .roles(&Role::AUTHENTICATED),
        NavigationItem::new("properties", "/properties", "Mine eiendommer", "home")
            .roles(&[Role::User])
            .children(vec![
                NavigationItem::new(
                    "property-documents",
                    "/properties/documents",
                    "Dokumenter",
                    "file-text",
                )
                .roles(&[Role::User]),
            ]),
        NavigationItem::new("company", "/company", "Bedrift", "building")
            .roles(&[Role::Company])
            .children(vec![
                NavigationItem::new("company-profile", "/company/profile", "Profil", "id-card"),
                NavigationItem::new("company-budget", "/company/budget", "Budsjett", "wallet")
                    .quick_action(4),
            ]),
        NavigationItem::new("content", "/content", "Innhold", "file-edit")
            .roles(&[Role::ContentEditor, Role::Admin, Role::MasterAdmin]),
        NavigationItem::new("admin", "/admin", "Administrasjon", "shield")
            .roles(&[Role::Admin, Role::MasterAdmin])
            .children(vec![
                NavigationItem::new("admin-users", "/admin/users", "Brukere", "users"),
                NavigationItem::new("admin-companies", "/admin/companies", "Bedrifter", "building-2"),
                NavigationItem::new(
                    "admin-feature-flags",
                    "/admin/feature-flags",
                    "Funksjonsflagg",
                    "flag",
                )
                .roles(&[Role::MasterAdmin]),
                NavigationItem::new("admin-modules", "/admin/modules", "Systemmoduler", "boxes")
                    .roles(&[Role::MasterAdmin]),
            ]),
        NavigationItem::new("settings", "/settings", "Innstillinger", "settings")
            .roles(&Role::AUTHENTICATED),
    ]
}
