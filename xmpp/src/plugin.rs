// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Extension plugins with declared dependencies.
//!
//! Plugins register under a unique name, are initialized once in dependency
//! order (Kahn's topological sort), and are closed in strict reverse
//! initialization order.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use quill_jid::Jid;

use crate::error::Error;
use crate::mux::Mux;
use crate::session::SessionHandle;

/// What a plugin receives at initialization.
///
/// Plugins get a capability surface onto the session (not the session
/// itself) plus a lookup for the plugins they declared as dependencies,
/// which are guaranteed to be initialized already.
#[derive(Clone)]
pub struct InitParams {
    session: SessionHandle,
    mux: Arc<Mux>,
    plugins: PluginLookup,
}

impl InitParams {
    /// The capability surface onto the owning session.
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// The multiplexer to register routes on.
    pub fn mux(&self) -> &Mux {
        &self.mux
    }

    /// The local JID, when bound.
    pub fn local_jid(&self) -> Option<&Jid> {
        self.session.local_jid()
    }

    /// The remote JID, when known.
    pub fn remote_jid(&self) -> Option<&Jid> {
        self.session.remote_jid()
    }

    /// Case-sensitive lookup of another registered plugin.
    pub fn get_plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(name)
    }
}

/// An extension unit managed by the [`PluginManager`].
#[async_trait]
pub trait Plugin: Send + Sync {
    /// The unique plugin name.
    fn name(&self) -> &'static str;

    /// The plugin version string.
    fn version(&self) -> &'static str {
        "0.1.0"
    }

    /// Names of plugins that must initialize before this one.
    fn dependencies(&self) -> &'static [&'static str] {
        &[]
    }

    /// Called once, after every dependency's `initialize` succeeded.
    async fn initialize(&self, params: &InitParams) -> Result<(), Error>;

    /// Called at teardown, in reverse initialization order.
    async fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Errors of the plugin lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    /// A plugin with this name is already registered.
    Duplicate(String),
    /// A declared dependency is not registered.
    MissingDependency {
        /// The plugin declaring the dependency.
        plugin: String,
        /// The dependency that is not registered.
        dependency: String,
    },
    /// The dependency graph has a cycle.
    Cycle,
    /// Initialize was called twice, or close before initialize.
    BadLifecycle,
}

impl std::fmt::Display for PluginError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PluginError::Duplicate(name) => {
                write!(fmt, "plugin '{}' is already registered", name)
            }
            PluginError::MissingDependency { plugin, dependency } => {
                write!(
                    fmt,
                    "plugin '{}' depends on unregistered plugin '{}'",
                    plugin, dependency
                )
            }
            PluginError::Cycle => write!(fmt, "plugin dependencies form a cycle"),
            PluginError::BadLifecycle => write!(fmt, "plugin lifecycle method out of order"),
        }
    }
}

impl std::error::Error for PluginError {}

impl From<PluginError> for Error {
    fn from(e: PluginError) -> Error {
        Error::Handler(e.to_string())
    }
}

#[derive(Default)]
struct Registry {
    plugins: Vec<Arc<dyn Plugin>>,
    by_name: HashMap<&'static str, usize>,
}

/// A shared read-only view used by `InitParams::get_plugin`.
#[derive(Clone, Default)]
pub struct PluginLookup {
    registry: Arc<RwLock<Registry>>,
}

impl PluginLookup {
    fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        let registry = self.registry.read().unwrap();
        registry
            .by_name
            .get(name)
            .map(|&index| registry.plugins[index].clone())
    }
}

/// Owns registered plugins and runs their lifecycle.
pub struct PluginManager {
    lookup: PluginLookup,
    init_order: Vec<usize>,
    initialized: bool,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    /// Creates an empty manager.
    pub fn new() -> PluginManager {
        PluginManager {
            lookup: PluginLookup::default(),
            init_order: Vec::new(),
            initialized: false,
        }
    }

    /// Registers a plugin. Names must be unique.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<(), PluginError> {
        let mut registry = self.lookup.registry.write().unwrap();
        let name = plugin.name();
        if registry.by_name.contains_key(name) {
            return Err(PluginError::Duplicate(name.to_owned()));
        }
        let index = registry.plugins.len();
        registry.plugins.push(plugin);
        registry.by_name.insert(name, index);
        Ok(())
    }

    /// Case-sensitive plugin lookup.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.lookup.get(name)
    }

    // Kahn's algorithm over the dependency DAG. Every dependency must be
    // registered; a residual non-zero in-degree means a cycle.
    fn topological_order(registry: &Registry) -> Result<Vec<usize>, PluginError> {
        let count = registry.plugins.len();
        let mut in_degree = vec![0usize; count];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];

        for (index, plugin) in registry.plugins.iter().enumerate() {
            for dependency in plugin.dependencies() {
                let &dep_index = registry.by_name.get(dependency).ok_or_else(|| {
                    PluginError::MissingDependency {
                        plugin: plugin.name().to_owned(),
                        dependency: (*dependency).to_owned(),
                    }
                })?;
                in_degree[index] += 1;
                dependents[dep_index].push(index);
            }
        }

        let mut queue: std::collections::VecDeque<usize> =
            (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(count);
        while let Some(index) = queue.pop_front() {
            order.push(index);
            for &dependent in &dependents[index] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() != count {
            return Err(PluginError::Cycle);
        }
        Ok(order)
    }

    /// Initializes every registered plugin in dependency order.
    ///
    /// Dependency validation and cycle detection happen before any plugin's
    /// `initialize` runs. The first initialization failure aborts and is
    /// returned; already-initialized plugins stay initialized and are closed
    /// by [`PluginManager::close`], which the caller is expected to run in
    /// any case.
    pub async fn initialize(
        &mut self,
        session: SessionHandle,
        mux: Arc<Mux>,
    ) -> Result<(), Error> {
        if self.initialized {
            return Err(PluginError::BadLifecycle.into());
        }

        let (order, plugins) = {
            let registry = self.lookup.registry.read().unwrap();
            let order = Self::topological_order(&registry)?;
            let plugins: Vec<Arc<dyn Plugin>> =
                order.iter().map(|&i| registry.plugins[i].clone()).collect();
            (order, plugins)
        };

        let params = InitParams {
            session,
            mux,
            plugins: self.lookup.clone(),
        };

        let mut done = Vec::with_capacity(order.len());
        for (index, plugin) in order.iter().zip(&plugins) {
            plugin.initialize(&params).await?;
            done.push(*index);
            self.init_order = done.clone();
        }
        self.initialized = true;
        Ok(())
    }

    /// Closes initialized plugins in reverse initialization order.
    ///
    /// Every close is attempted; the first error is kept and returned.
    pub async fn close(&mut self) -> Result<(), Error> {
        let plugins: Vec<Arc<dyn Plugin>> = {
            let registry = self.lookup.registry.read().unwrap();
            self.init_order
                .iter()
                .rev()
                .map(|&i| registry.plugins[i].clone())
                .collect()
        };
        let mut first_error = None;
        for plugin in plugins {
            if let Err(e) = plugin.close().await {
                first_error.get_or_insert(e);
            }
        }
        self.init_order.clear();
        self.initialized = false;
        first_error.map_or(Ok(()), Err)
    }

    /// The names of initialized plugins, in initialization order.
    pub fn initialization_order(&self) -> Vec<&'static str> {
        let registry = self.lookup.registry.read().unwrap();
        self.init_order
            .iter()
            .map(|&i| registry.plugins[i].name())
            .collect()
    }
}
