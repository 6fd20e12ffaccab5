//! Navigation composition.
//!
//! [`UnifiedNavigation`] merges the built-in tree with plugin contributions
//! and filters it through the session's [`Capabilities`]. The resulting
//! [`NavigationView`] carries every projection the UI renders: the primary
//! tree, the mobile bar, quick actions and breadcrumbs.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capability::Capabilities;
use crate::item::NavigationItem;
use crate::menu::default_navigation;
use crate::plugin::{HookArgs, HookName, HookOutput, PluginManager};
use crate::role::Role;

/// Items shown in the mobile bar.
pub const MOBILE_MAX_ITEMS: usize = 5;

/// Longest mobile title, ellipsis included.
pub const MOBILE_TITLE_MAX: usize = 14;

pub const MAX_QUICK_ACTIONS: usize = 4;

/// Cached views kept before the cache is flushed.
const CACHE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub title: String,
    pub href: String,
    pub is_current: bool,
}

/// Everything the navigation UI needs for one `(capabilities, path)` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationView {
    pub primary: Vec<NavigationItem>,
    pub mobile: Vec<NavigationItem>,
    pub quick_actions: Vec<NavigationItem>,
    pub breadcrumbs: Vec<Breadcrumb>,
}

/// Builds navigation views from a base tree plus plugin contributions.
#[derive(Debug, Clone)]
pub struct UnifiedNavigation {
    base: Vec<NavigationItem>,
}

impl Default for UnifiedNavigation {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl UnifiedNavigation {
    pub fn new(base: Vec<NavigationItem>) -> Self {
        Self { base }
    }

    /// Navigation over [`default_navigation`].
    pub fn with_defaults() -> Self {
        Self::new(default_navigation())
    }

    /// Base tree followed by plugin items, unfiltered. Plugin items whose id
    /// is already present are dropped.
    fn compose(&self, caps: &Capabilities, plugins: &PluginManager, path: &str) -> Vec<NavigationItem> {
        let args = HookArgs::new(caps.clone(), path);
        let mut seen: HashSet<String> = self.base.iter().map(|i| i.id.clone()).collect();
        let mut items = self.base.clone();

        for output in plugins.execute_hooks(HookName::NavigationItems, &args) {
            if let HookOutput::NavItem(item) = output {
                if seen.insert(item.id.clone()) {
                    items.push(item);
                }
            }
        }
        items
    }

    /// Compose and filter the navigation for a session at `path`.
    pub fn build(&self, caps: &Capabilities, plugins: &PluginManager, path: &str) -> NavigationView {
        let composed = self.compose(caps, plugins, path);
        let primary = filter_tree(&composed, caps);

        let args = HookArgs::new(caps.clone(), path);
        let extra_actions: Vec<NavigationItem> = plugins
            .execute_hooks(HookName::QuickActions, &args)
            .into_iter()
            .filter_map(|output| match output {
                HookOutput::NavItem(item) => Some(item),
                _ => None,
            })
            .filter(|item| caps.can_access(&item.access_rule()))
            .collect();

        NavigationView {
            mobile: mobile_items(&primary),
            quick_actions: quick_actions(&primary, extra_actions),
            breadcrumbs: breadcrumbs(&primary, path),
            primary,
        }
    }

    /// Like [`build`](Self::build), served from `cache` when possible.
    pub fn build_cached(
        &self,
        cache: &NavigationCache,
        caps: &Capabilities,
        plugins: &PluginManager,
        path: &str,
    ) -> Arc<NavigationView> {
        let key = NavigationCacheKey::new(caps, path, plugins.generation());
        cache.get_or_insert_with(key, || self.build(caps, plugins, path))
    }

    /// Whether the item at `href` and every ancestor admit the session.
    ///
    /// Role lists use OR semantics. Items without requirements are open to
    /// anyone who can see their parent. Unknown hrefs are denied.
    pub fn has_access(&self, caps: &Capabilities, plugins: &PluginManager, href: &str) -> bool {
        let composed = self.compose(caps, plugins, href);
        match find_chain(&composed, href) {
            Some(chain) => chain.iter().all(|item| caps.can_access(&item.access_rule())),
            None => {
                debug!(href, "No navigation item for href");
                false
            }
        }
    }
}

fn filter_tree(items: &[NavigationItem], caps: &Capabilities) -> Vec<NavigationItem> {
    items
        .iter()
        .filter(|item| caps.can_access(&item.access_rule()))
        .map(|item| NavigationItem {
            children: filter_tree(&item.children, caps),
            ..item.clone()
        })
        .collect()
}

fn find_chain<'a>(items: &'a [NavigationItem], href: &str) -> Option<Vec<&'a NavigationItem>> {
    for item in items {
        if item.href == href {
            return Some(vec![item]);
        }
        if let Some(mut chain) = find_chain(&item.children, href) {
            chain.insert(0, item);
            return Some(chain);
        }
    }
    None
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() <= MOBILE_TITLE_MAX {
        return title.to_string();
    }
    let mut short: String = title.chars().take(MOBILE_TITLE_MAX - 1).collect();
    short.push('…');
    short
}

fn mobile_items(primary: &[NavigationItem]) -> Vec<NavigationItem> {
    primary
        .iter()
        .take(MOBILE_MAX_ITEMS)
        .map(|item| NavigationItem {
            title: truncate_title(&item.title),
            children: Vec::new(),
            ..item.clone()
        })
        .collect()
}

fn quick_actions(primary: &[NavigationItem], extra: Vec<NavigationItem>) -> Vec<NavigationItem> {
    let mut actions: Vec<NavigationItem> = primary
        .iter()
        .flat_map(|item| item.walk())
        .filter(|item| item.quick_action_priority.is_some())
        .map(|item| NavigationItem {
            children: Vec::new(),
            ..item.clone()
        })
        .chain(extra)
        .collect();

    actions.sort_by(|a, b| {
        a.quick_action_priority
            .unwrap_or(u32::MAX)
            .cmp(&b.quick_action_priority.unwrap_or(u32::MAX))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut seen = HashSet::new();
    actions.retain(|item| seen.insert(item.href.clone()));
    actions.truncate(MAX_QUICK_ACTIONS);
    actions
}

fn capitalize(segment: &str) -> String {
    let words = segment.replace(['-', '_'], " ");
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn breadcrumbs(primary: &[NavigationItem], path: &str) -> Vec<Breadcrumb> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let mut href = String::new();
    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            href.push('/');
            href.push_str(segment);
            let title = find_chain(primary, &href)
                .and_then(|chain| chain.last().map(|item| item.title.clone()))
                .unwrap_or_else(|| capitalize(segment));
            Breadcrumb {
                title,
                href: href.clone(),
                is_current: index + 1 == segments.len(),
            }
        })
        .collect()
}

/// Identity of a cached navigation view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NavigationCacheKey {
    pub role: Role,
    pub permissions: BTreeSet<String>,
    pub flags: BTreeSet<String>,
    pub path: String,
    pub generation: u64,
}

impl NavigationCacheKey {
    pub fn new(caps: &Capabilities, path: &str, generation: u64) -> Self {
        Self {
            role: caps.role,
            permissions: caps.permissions.clone(),
            flags: caps.flags.clone(),
            path: path.to_string(),
            generation,
        }
    }
}

/// Read-mostly cache of navigation views, scoped to one session.
///
/// Entries are regenerable; a miss rebuilds the view and a full cache is
/// simply flushed.
#[derive(Debug, Default)]
pub struct NavigationCache {
    entries: RwLock<HashMap<NavigationCacheKey, Arc<NavigationView>>>,
}

impl NavigationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &NavigationCacheKey) -> Option<Arc<NavigationView>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn get_or_insert_with<F>(&self, key: NavigationCacheKey, build: F) -> Arc<NavigationView>
    where
        F: FnOnce() -> NavigationView,
    {
        if let Some(view) = self.get(&key) {
            return view;
        }

        let view = Arc::new(build());
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= CACHE_CAPACITY {
            entries.clear();
        }
        entries.entry(key).or_insert(view).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
