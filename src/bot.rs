//! Wiring: settings in, registry, modules and pipeline out.

use std::sync::Arc;

use crate::archive::{ArchiveStore, GitWikiArchive};
use crate::command::{CommandContext, CommandRegistry, Dispatcher, ExecutionResult};
use crate::config::Settings;
use crate::core::Pipeline;
use crate::error::Result;
use crate::identity::{FileIdentityStore, IdentityLookup};
use crate::modules::ModuleLoader;
use crate::transport::HttpTransport;

pub struct Bot {
    settings: Settings,
    registry: Arc<CommandRegistry>,
    loader: Arc<ModuleLoader>,
}

impl Bot {
    /// Build the registry and load the built-in modules.
    pub fn new(settings: Settings) -> Self {
        let registry = Arc::new(CommandRegistry::new());
        let loader = Arc::new(
            ModuleLoader::with_builtins(Arc::clone(&registry)).admins(settings.admins.clone()),
        );
        let count = loader.load_all();
        tracing::info!("loaded {} command(s) from {:?}", count, loader.module_names());

        Self {
            settings,
            registry,
            loader,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn loader(&self) -> &Arc<ModuleLoader> {
        &self.loader
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Arc::clone(&self.registry))
    }

    /// Pipeline against the configured bridge and collaborators.
    pub fn pipeline(&self) -> Result<Pipeline> {
        let transport = Arc::new(HttpTransport::from_settings(&self.settings)?);
        let mut pipeline = Pipeline::new(transport, self.dispatcher(), self.settings.prefix.clone())
            .with_poll_interval(self.settings.poll_interval());

        if let Some(config) = &self.settings.archive {
            let archive: Arc<dyn ArchiveStore> =
                Arc::new(GitWikiArchive::from_config(config, &self.settings.username)?);
            pipeline = pipeline.with_archive(archive);
        } else {
            tracing::info!("no archive configured, long output is sent inline");
        }

        if let Some(config) = &self.settings.identity {
            let identities: Arc<dyn IdentityLookup> = Arc::new(FileIdentityStore::new(&config.path));
            pipeline = pipeline.with_identities(identities);
        }

        Ok(pipeline)
    }

    /// Run one prefix invocation without a bridge message; the prefix is optional.
    pub async fn call(&self, text: &str) -> ExecutionResult {
        let invocation = text.strip_prefix(self.settings.prefix.as_str()).unwrap_or(text);
        self.dispatcher()
            .call(invocation, CommandContext::none(), None)
            .await
    }
}
