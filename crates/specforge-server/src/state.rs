//! Application state shared across handlers.

use std::sync::Arc;

use specforge_core::{
    publisher_from_config, Config, GeminiGenerator, Store, VersionAllocator, Workflow,
    WorkflowOptions,
};
use tracing::info;

/// Shared handle passed to every handler.
pub type SharedState = Arc<AppState>;

/// Everything a request needs: the orchestrator and the loaded configuration.
#[derive(Debug)]
pub struct AppState {
    /// The upload -> generate -> publish orchestrator.
    pub workflow: Workflow,
    /// Configuration the server was started with.
    pub config: Config,
}

impl AppState {
    /// Wire the production collaborators from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the generation
    /// or publish clients cannot be built.
    pub fn new(config: Config) -> anyhow::Result<SharedState> {
        let store = Store::open(&config.database.path)?;
        let generator = Arc::new(GeminiGenerator::new(&config.generation)?);
        let publisher = publisher_from_config(&config)?;

        info!(
            database = %config.database.path.display(),
            model = %config.generation.model,
            backend = publisher.backend(),
            "Application state initialized"
        );

        let workflow = Workflow::new(store, generator, publisher);
        Ok(Self::from_parts(workflow, config))
    }

    /// Wrap an already wired workflow, applying the configured policies.
    #[must_use]
    pub fn from_parts(workflow: Workflow, config: Config) -> SharedState {
        let workflow = workflow
            .with_allocator(VersionAllocator::new(config.versioning.bump))
            .with_options(WorkflowOptions {
                auto_generate: config.generation.auto_generate,
                auto_publish: config.publish.auto_publish,
            });
        Arc::new(Self { workflow, config })
    }
}
