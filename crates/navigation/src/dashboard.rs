//! Dashboard widget composition.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::capability::{AccessRule, Capabilities};
use crate::plugin::{HookArgs, HookName, HookOutput, PluginManager};
use crate::role::Role;

/// Grid footprint of a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetSize {
    Small,
    Medium,
    Large,
    Full,
}

/// A dashboard card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardWidget {
    pub id: String,
    pub title: String,
    /// Name of the UI component that renders the widget.
    pub component: String,
    pub size: WidgetSize,
    /// Higher first.
    pub priority: i32,
    #[serde(default)]
    pub access: AccessRule,
}

impl DashboardWidget {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        component: impl Into<String>,
        size: WidgetSize,
        priority: i32,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            component: component.into(),
            size,
            priority,
            access: AccessRule::anyone(),
        }
    }

    pub fn access(mut self, access: AccessRule) -> Self {
        self.access = access;
        self
    }
}

/// Widgets available without any plugin.
pub fn default_widgets() -> Vec<DashboardWidget> {
    vec![
        DashboardWidget::new("welcome", "Velkommen", "WelcomeCard", WidgetSize::Full, 100)
            .access(AccessRule::roles(&Role::AUTHENTICATED)),
        DashboardWidget::new(
            "profile-completion",
            "Fullfør profilen",
            "ProfileCompletion",
            WidgetSize::Medium,
            60,
        )
        .access(AccessRule::roles(&[Role::User])),
        DashboardWidget::new("company-budget", "Budsjett", "CompanyBudget", WidgetSize::Medium, 70)
            .access(AccessRule::roles(&[Role::Company])),
        DashboardWidget::new("content-queue", "Innholdskø", "ContentQueue", WidgetSize::Large, 70)
            .access(AccessRule::roles(&[Role::ContentEditor])),
        DashboardWidget::new("system-health", "Systemstatus", "SystemHealth", WidgetSize::Large, 95)
            .access(AccessRule::roles(&[Role::Admin, Role::MasterAdmin])),
    ]
}

/// Widgets visible to a user: defaults plus plugin contributions, gated by
/// capabilities, highest priority first. The first widget with a given id wins.
pub fn compose_dashboard(caps: &Capabilities, plugins: &PluginManager) -> Vec<DashboardWidget> {
    let args = HookArgs::new(caps.clone(), "/dashboard");
    let contributed = plugins
        .execute_hooks(HookName::DashboardWidgets, &args)
        .into_iter()
        .filter_map(|output| match output {
            HookOutput::Widget(widget) => Some(widget),
            _ => None,
        });

    let mut seen = HashSet::new();
    let mut widgets: Vec<DashboardWidget> = default_widgets()
        .into_iter()
        .chain(contributed)
        .filter(|w| caps.can_access(&w.access))
        .filter(|w| seen.insert(w.id.clone()))
        .collect();

    widgets.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
    widgets
}
