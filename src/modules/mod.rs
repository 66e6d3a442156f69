//! Command modules and the loader that installs them into the registry.

use std::sync::{Arc, Weak};

use crate::command::{CommandBuilder, CommandRegistry};
use crate::error::{Error, Result};

pub mod builtin;

pub use builtin::CoreModule;

/// Handles a module's commands may hold on to.
///
/// The handles are weak: the registry owns the descriptors, and the
/// descriptors must not keep the registry alive.
#[derive(Clone)]
pub struct ModuleContext {
    pub registry: Weak<CommandRegistry>,
    pub loader: Weak<ModuleLoader>,
    pub admins: Vec<String>,
}

/// A named set of commands, registered as one registry group.
pub trait Module: Send + Sync {
    fn name(&self) -> &str;

    fn commands(&self, ctx: &ModuleContext) -> Vec<CommandBuilder>;
}

pub struct ModuleLoader {
    registry: Arc<CommandRegistry>,
    modules: Vec<Box<dyn Module>>,
    admins: Vec<String>,
}

impl ModuleLoader {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self {
            registry,
            modules: Vec::new(),
            admins: Vec::new(),
        }
    }

    /// Loader preloaded with the built-in modules.
    pub fn with_builtins(registry: Arc<CommandRegistry>) -> Self {
        Self::new(registry).module(CoreModule)
    }

    pub fn module(mut self, module: impl Module + 'static) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    pub fn admins(mut self, admins: Vec<String>) -> Self {
        self.admins = admins;
        self
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Register every module in order; returns how many commands went in.
    pub fn load_all(self: &Arc<Self>) -> usize {
        self.modules.iter().map(|m| self.install(m.as_ref()).len()).sum()
    }

    pub fn load(self: &Arc<Self>, name: &str) -> Result<usize> {
        let module = self.find(name)?;
        Ok(self.install(module).len())
    }

    /// Re-register a module. Each descriptor is swapped in whole; commands
    /// the module stopped declaring are removed.
    pub fn reload(self: &Arc<Self>, name: &str) -> Result<usize> {
        tracing::info!("reloading module '{}'", name);
        let module = self.find(name)?;
        let names = self.install(module);
        let removed = self.registry.retain(module.name(), &names);
        if removed > 0 {
            tracing::info!("module '{}' dropped {} command(s)", name, removed);
        }
        Ok(names.len())
    }

    fn find(&self, name: &str) -> Result<&dyn Module> {
        self.modules
            .iter()
            .find(|m| m.name() == name)
            .map(|m| m.as_ref())
            .ok_or_else(|| Error::NotFound(format!("module '{}'", name)))
    }

    /// Register one module's commands; a broken command only skips itself.
    fn install(self: &Arc<Self>, module: &dyn Module) -> Vec<String> {
        let ctx = ModuleContext {
            registry: Arc::downgrade(&self.registry),
            loader: Arc::downgrade(self),
            admins: self.admins.clone(),
        };

        let mut names = Vec::new();
        for builder in module.commands(&ctx) {
            let name = builder.name().to_string();
            if self.registry.register_builder(module.name(), builder).is_ok() {
                names.push(name);
            }
        }
        tracing::debug!("module '{}' registered {:?}", module.name(), names);
        names
    }
}
