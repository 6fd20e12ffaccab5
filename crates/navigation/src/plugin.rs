//! Session-scoped plugin manager.
//!
//! Plugins are registered up front in a [`PluginRegistry`] (id to
//! constructor) and loaded into a [`PluginManager`] owned by the session.
//! Loaded plugins contribute navigation items, quick actions and dashboard
//! widgets through hooks.
//!
//! # Example
//!
//! ```rust
//! use navigation::{Capabilities, HookArgs, HookName, PluginContext, PluginManager, PluginRegistry, Role};
//!
//! let caps = Capabilities::new(Role::User);
//! let mut manager = PluginManager::for_session(
//!     PluginRegistry::builtin(),
//!     PluginContext::new(Some("user-1".to_string()), caps.clone()),
//! );
//!
//! let items = manager.execute_hooks(HookName::NavigationItems, &HookArgs::new(caps, "/"));
//! assert!(!items.is_empty());
//!
//! manager.teardown();
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::capability::{AccessRule, Capabilities};
use crate::dashboard::DashboardWidget;
use crate::item::NavigationItem;

/// Errors from loading, unloading or running plugins.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("plugin already loaded: {0}")]
    AlreadyLoaded(String),

    #[error("plugin not loaded: {0}")]
    NotLoaded(String),

    #[error("plugin {plugin} requires {dependency}, which is not loaded")]
    MissingDependency { plugin: String, dependency: String },

    #[error("plugin {plugin} is required by {dependent}")]
    DependencyInUse { plugin: String, dependent: String },

    #[error("access to plugin {0} denied")]
    AccessDenied(String),

    #[error("plugin {plugin} failed to initialize: {message}")]
    Initialization { plugin: String, message: String },

    #[error("hook failed: {0}")]
    Hook(String),
}

/// Extension points plugins can contribute to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookName {
    NavigationItems,
    QuickActions,
    DashboardWidgets,
}

/// One contribution returned by a hook handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutput {
    NavItem(NavigationItem),
    Widget(DashboardWidget),
}

/// Arguments passed to every hook handler.
#[derive(Debug, Clone)]
pub struct HookArgs {
    pub capabilities: Capabilities,
    pub path: String,
}

impl HookArgs {
    pub fn new(capabilities: Capabilities, path: impl Into<String>) -> Self {
        Self {
            capabilities,
            path: path.into(),
        }
    }
}

/// A hook handler. Returning an empty list contributes nothing.
pub type HookHandler =
    Arc<dyn Fn(&HookArgs) -> Result<Vec<HookOutput>, PluginError> + Send + Sync>;

/// A handler bound to a hook with a priority (higher runs first).
#[derive(Clone)]
pub struct HookRegistration {
    pub hook: HookName,
    pub priority: i32,
    pub handler: HookHandler,
}

impl HookRegistration {
    pub fn new<F>(hook: HookName, priority: i32, handler: F) -> Self
    where
        F: Fn(&HookArgs) -> Result<Vec<HookOutput>, PluginError> + Send + Sync + 'static,
    {
        Self {
            hook,
            priority,
            handler: Arc::new(handler),
        }
    }
}

impl fmt::Debug for HookRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistration")
            .field("hook", &self.hook)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Static description of a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginManifest {
    pub id: String,
    pub name: String,
    pub version: String,
    /// Plugin ids that must be loaded first.
    pub dependencies: Vec<String>,
    /// Who may load the plugin.
    pub access: AccessRule,
}

/// Who the session belongs to.
#[derive(Debug, Clone, Default)]
pub struct PluginContext {
    pub user_id: Option<String>,
    pub profile_id: Option<String>,
    pub capabilities: Capabilities,
    /// Free-form session values (e.g. unread counts) for plugins to read.
    pub attributes: BTreeMap<String, String>,
}

impl PluginContext {
    pub fn new(user_id: Option<String>, capabilities: Capabilities) -> Self {
        Self {
            user_id,
            profile_id: None,
            capabilities,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// A self-contained module contributing hooks for a session.
pub trait Plugin: Send + Sync {
    fn manifest(&self) -> PluginManifest;

    /// Called once when loaded. An error leaves the plugin unloaded.
    fn initialize(&mut self, _context: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    /// Hooks to register; called after a successful `initialize`.
    fn hooks(&self) -> Vec<HookRegistration>;

    /// Called once when unloaded. Errors are logged; the plugin is removed anyway.
    fn cleanup(&mut self) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Builds a fresh plugin instance.
pub type PluginConstructor = Arc<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Startup-time table of available plugins, in load order.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    entries: Vec<(String, PluginConstructor)>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the plugins shipped in this crate.
    pub fn builtin() -> Self {
        crate::builtin::register_builtin(Self::new())
    }

    /// Register a constructor; a later registration with the same id replaces it.
    pub fn register<F>(mut self, id: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        let id = id.into();
        let constructor: PluginConstructor = Arc::new(constructor);
        match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some(entry) => entry.1 = constructor,
            None => self.entries.push((id, constructor)),
        }
        self
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    fn construct(&self, id: &str) -> Option<Box<dyn Plugin>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, constructor)| (**constructor)())
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

struct LoadedPlugin {
    manifest: PluginManifest,
    plugin: Box<dyn Plugin>,
    hooks: Vec<HookRegistration>,
    enabled: bool,
}

/// Plugins loaded for one session.
///
/// Owned by the session and passed explicitly to navigation and dashboard
/// composition. Dropping the manager tears down every loaded plugin.
pub struct PluginManager {
    registry: PluginRegistry,
    context: PluginContext,
    loaded: Vec<LoadedPlugin>,
    generation: u64,
}

impl PluginManager {
    /// An empty manager; plugins are loaded explicitly.
    pub fn new(registry: PluginRegistry, context: PluginContext) -> Self {
        Self {
            registry,
            context,
            loaded: Vec::new(),
            generation: 0,
        }
    }

    /// A manager with every registered plugin the session may use loaded.
    ///
    /// Plugins that are denied or fail to load are logged and skipped.
    pub fn for_session(registry: PluginRegistry, context: PluginContext) -> Self {
        let mut manager = Self::new(registry, context);
        let ids: Vec<String> = manager.registry.ids().map(str::to_string).collect();

        for id in ids {
            match manager.load_plugin(&id) {
                Ok(()) => {}
                Err(PluginError::AccessDenied(_)) => debug!(plugin = %id, "Plugin not available for role"),
                Err(e) => warn!(plugin = %id, error = %e, "Failed to load plugin"),
            }
        }

        info!(
            user_id = ?manager.context.user_id,
            role = %manager.context.capabilities.role,
            loaded = manager.loaded.len(),
            "Plugin session started"
        );
        manager
    }

    pub fn context(&self) -> &PluginContext {
        &self.context
    }

    /// Bumped on every load, unload and toggle.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.position(id).is_some_and(|i| self.loaded[i].enabled)
    }

    pub fn loaded_ids(&self) -> Vec<&str> {
        self.loaded.iter().map(|p| p.manifest.id.as_str()).collect()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.loaded.iter().position(|p| p.manifest.id == id)
    }

    /// Construct, check and initialize a registered plugin.
    ///
    /// Nothing is registered unless every step succeeds.
    pub fn load_plugin(&mut self, id: &str) -> Result<(), PluginError> {
        if self.is_loaded(id) {
            return Err(PluginError::AlreadyLoaded(id.to_string()));
        }

        let mut plugin = self
            .registry
            .construct(id)
            .ok_or_else(|| PluginError::UnknownPlugin(id.to_string()))?;
        let manifest = plugin.manifest();

        if !self.context.capabilities.can_access(&manifest.access) {
            return Err(PluginError::AccessDenied(id.to_string()));
        }

        if let Some(missing) = manifest.dependencies.iter().find(|d| !self.is_loaded(d)) {
            return Err(PluginError::MissingDependency {
                plugin: id.to_string(),
                dependency: missing.clone(),
            });
        }

        plugin.initialize(&self.context)?;
        let hooks = plugin.hooks();

        debug!(plugin = %id, version = %manifest.version, hooks = hooks.len(), "Loaded plugin");
        self.loaded.push(LoadedPlugin {
            manifest,
            plugin,
            hooks,
            enabled: true,
        });
        self.generation += 1;
        Ok(())
    }

    /// Remove a plugin and run its cleanup.
    pub fn unload_plugin(&mut self, id: &str) -> Result<(), PluginError> {
        let index = self
            .position(id)
            .ok_or_else(|| PluginError::NotLoaded(id.to_string()))?;

        if let Some(dependent) = self
            .loaded
            .iter()
            .find(|p| p.manifest.dependencies.iter().any(|d| d == id))
        {
            return Err(PluginError::DependencyInUse {
                plugin: id.to_string(),
                dependent: dependent.manifest.id.clone(),
            });
        }

        let mut removed = self.loaded.remove(index);
        self.generation += 1;
        if let Err(e) = removed.plugin.cleanup() {
            warn!(plugin = %id, error = %e, "Plugin cleanup failed");
        }

        debug!(plugin = %id, "Unloaded plugin");
        Ok(())
    }

    /// Enable or disable a loaded plugin's hooks without unloading it.
    pub fn toggle_plugin(&mut self, id: &str, enabled: bool) -> Result<(), PluginError> {
        let index = self
            .position(id)
            .ok_or_else(|| PluginError::NotLoaded(id.to_string()))?;

        if self.loaded[index].enabled != enabled {
            self.loaded[index].enabled = enabled;
            self.generation += 1;
        }
        Ok(())
    }

    /// Run every handler registered for `hook` across enabled plugins.
    ///
    /// Handlers run by descending priority, ties in load order. A failing or
    /// panicking handler is logged and contributes nothing.
    pub fn execute_hooks(&self, hook: HookName, args: &HookArgs) -> Vec<HookOutput> {
        let mut handlers: Vec<(i32, usize, &str, &HookHandler)> = self
            .loaded
            .iter()
            .enumerate()
            .filter(|(_, p)| p.enabled)
            .flat_map(|(order, p)| {
                p.hooks
                    .iter()
                    .filter(move |h| h.hook == hook)
                    .map(move |h| (h.priority, order, p.manifest.id.as_str(), &h.handler))
            })
            .collect();

        handlers.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut outputs = Vec::new();
        for (_, _, plugin, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| (**handler)(args))) {
                Ok(Ok(contribution)) => outputs.extend(contribution),
                Ok(Err(e)) => warn!(plugin, hook = ?hook, error = %e, "Hook failed"),
                Err(_) => warn!(plugin, hook = ?hook, "Hook panicked"),
            }
        }
        outputs
    }

    /// Unload every plugin, most recently loaded first.
    pub fn teardown(&mut self) {
        if self.loaded.is_empty() {
            return;
        }

        while let Some(mut plugin) = self.loaded.pop() {
            if let Err(e) = plugin.plugin.cleanup() {
                warn!(plugin = %plugin.manifest.id, error = %e, "Plugin cleanup failed");
            }
        }
        self.generation += 1;
        info!(user_id = ?self.context.user_id, "Plugin session ended");
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("loaded", &self.loaded_ids())
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestPlugin {
        id: &'static str,
        dependencies: Vec<String>,
        access: AccessRule,
        fail_init: bool,
        priority: i32,
        cleanups: Arc<AtomicUsize>,
    }

    impl TestPlugin {
        fn new(id: &'static str, priority: i32) -> Self {
            Self {
                id,
                dependencies: Vec::new(),
                access: AccessRule::anyone(),
                fail_init: false,
                priority,
                cleanups: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Plugin for TestPlugin {
        fn manifest(&self) -> PluginManifest {
            PluginManifest {
                id: self.id.to_string(),
                name: self.id.to_string(),
                version: "1.0.0".to_string(),
                dependencies: self.dependencies.clone(),
                access: self.access.clone(),
            }
        }

        fn initialize(&mut self, _context: &PluginContext) -> Result<(), PluginError> {
            if self.fail_init {
                return Err(PluginError::Initialization {
                    plugin: self.id.to_string(),
                    message: "boom".to_string(),
                });
            }
            Ok(())
        }

        fn hooks(&self) -> Vec<HookRegistration> {
            let id = self.id;
            vec![HookRegistration::new(
                HookName::NavigationItems,
                self.priority,
                move |_| Ok(vec![HookOutput::NavItem(NavigationItem::new(id, format!("/{}", id), id, "x"))]),
            )]
        }

        fn cleanup(&mut self) -> Result<(), PluginError> {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn ids(outputs: &[HookOutput]) -> Vec<String> {
        outputs
            .iter()
            .map(|o| match o {
                HookOutput::NavItem(item) => item.id.clone(),
                HookOutput::Widget(widget) => widget.id.clone(),
            })
            .collect()
    }

    fn context(role: Role) -> PluginContext {
        PluginContext::new(Some("user-1".to_string()), Capabilities::new(role))
    }

    fn args() -> HookArgs {
        HookArgs::new(Capabilities::new(Role::User), "/")
    }

    #[test]
    fn test_hooks_run_in_priority_order() {
        let registry = PluginRegistry::new()
            .register("low", || Box::new(TestPlugin::new("low", 1)))
            .register("high", || Box::new(TestPlugin::new("high", 10)))
            .register("mid", || Box::new(TestPlugin::new("mid", 5)));

        let manager = PluginManager::for_session(registry, context(Role::User));
        let outputs = manager.execute_hooks(HookName::NavigationItems, &args());
        assert_eq!(ids(&outputs), vec!["high", "mid", "low"]);
        assert!(manager
            .execute_hooks(HookName::DashboardWidgets, &args())
            .is_empty());
    }

    #[test]
    fn test_failing_initializer_leaves_plugin_unloaded() {
        let registry = PluginRegistry::new()
            .register("good", || Box::new(TestPlugin::new("good", 1)))
            .register("bad", || {
                let mut plugin = TestPlugin::new("bad", 1);
                plugin.fail_init = true;
                Box::new(plugin)
            });

        let mut manager = PluginManager::for_session(registry, context(Role::User));
        assert_eq!(manager.loaded_ids(), vec!["good"]);
        assert!(matches!(
            manager.load_plugin("bad"),
            Err(PluginError::Initialization { .. })
        ));
        assert_eq!(manager.loaded_ids(), vec!["good"]);
        assert_eq!(
            ids(&manager.execute_hooks(HookName::NavigationItems, &args())),
            vec!["good"]
        );
    }

    #[test]
    fn test_failing_and_panicking_hooks_contribute_nothing() {
        struct Faulty;
        impl Plugin for Faulty {
            fn manifest(&self) -> PluginManifest {
                PluginManifest {
                    id: "faulty".to_string(),
                    name: "Faulty".to_string(),
                    version: "0.1.0".to_string(),
                    dependencies: Vec::new(),
                    access: AccessRule::anyone(),
                }
            }

            fn hooks(&self) -> Vec<HookRegistration> {
                vec![
                    HookRegistration::new(HookName::NavigationItems, 100, |_| {
                        Err(PluginError::Hook("unavailable".to_string()))
                    }),
                    HookRegistration::new(HookName::NavigationItems, 50, |_| panic!("bug")),
                ]
            }
        }

        let registry = PluginRegistry::new()
            .register("faulty", || Box::new(Faulty))
            .register("ok", || Box::new(TestPlugin::new("ok", 0)));
        let manager = PluginManager::for_session(registry, context(Role::User));

        let outputs = manager.execute_hooks(HookName::NavigationItems, &args());
        assert_eq!(ids(&outputs), vec!["ok"]);
    }

    #[test]
    fn test_dependencies_and_access() {
        let registry = PluginRegistry::new()
            .register("base", || Box::new(TestPlugin::new("base", 0)))
            .register("addon", || {
                let mut plugin = TestPlugin::new("addon", 0);
                plugin.dependencies = vec!["base".to_string()];
                Box::new(plugin)
            })
            .register("admin-only", || {
                let mut plugin = TestPlugin::new("admin-only", 0);
                plugin.access = AccessRule::roles(&[Role::Admin]);
                Box::new(plugin)
            });

        let mut manager = PluginManager::new(registry, context(Role::User));
        assert!(matches!(
            manager.load_plugin("addon"),
            Err(PluginError::MissingDependency { .. })
        ));
        assert!(matches!(
            manager.load_plugin("admin-only"),
            Err(PluginError::AccessDenied(_))
        ));
        assert!(matches!(
            manager.load_plugin("missing"),
            Err(PluginError::UnknownPlugin(_))
        ));

        manager.load_plugin("base").unwrap();
        manager.load_plugin("addon").unwrap();
        assert!(matches!(
            manager.load_plugin("base"),
            Err(PluginError::AlreadyLoaded(_))
        ));
        assert!(matches!(
            manager.unload_plugin("base"),
            Err(PluginError::DependencyInUse { .. })
        ));

        manager.unload_plugin("addon").unwrap();
        manager.unload_plugin("base").unwrap();
        assert!(manager.loaded_ids().is_empty());
    }

    #[test]
    fn test_toggle_and_generation() {
        let registry = PluginRegistry::new().register("one", || Box::new(TestPlugin::new("one", 0)));
        let mut manager = PluginManager::new(registry, context(Role::User));
        manager.load_plugin("one").unwrap();
        let generation = manager.generation();

        manager.toggle_plugin("one", false).unwrap();
        assert!(!manager.is_enabled("one"));
        assert!(manager.is_loaded("one"));
        assert!(manager
            .execute_hooks(HookName::NavigationItems, &args())
            .is_empty());
        assert!(manager.generation() > generation);

        manager.toggle_plugin("one", true).unwrap();
        assert_eq!(manager.execute_hooks(HookName::NavigationItems, &args()).len(), 1);
        assert!(matches!(
            manager.toggle_plugin("two", true),
            Err(PluginError::NotLoaded(_))
        ));
    }

    #[test]
    fn test_teardown_runs_cleanup_once() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let counter = cleanups.clone();
        let registry = PluginRegistry::new().register("one", move || {
            let mut plugin = TestPlugin::new("one", 0);
            plugin.cleanups = counter.clone();
            Box::new(plugin)
        });

        let mut manager = PluginManager::for_session(registry, context(Role::User));
        manager.teardown();
        manager.teardown();
        drop(manager);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }
}
