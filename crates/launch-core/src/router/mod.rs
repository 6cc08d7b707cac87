use std::{collections::HashMap, sync::Arc};

use launch_model::ResourceType;
use tracing::{instrument, trace};

use crate::{
    collab::{Builder, ResourceLister, Runner},
    error::CoreError,
};

/// Collaborators serving one resource type.
#[derive(Clone)]
pub struct Backend {
    pub builder: Arc<dyn Builder>,
    pub runner: Arc<dyn Runner>,
    /// Label-based listing used for orphan discovery, when the backend has one.
    pub lister: Option<Arc<dyn ResourceLister>>,
}

impl Backend {
    #[inline]
    pub fn new(builder: Arc<dyn Builder>, runner: Arc<dyn Runner>) -> Self {
        Self {
            builder,
            runner,
            lister: None,
        }
    }

    #[inline]
    pub fn with_lister(mut self, lister: Arc<dyn ResourceLister>) -> Self {
        self.lister = Some(lister);
        self
    }
}

/// Maps resource types to their backend collaborators.
#[derive(Default, Clone)]
pub struct BackendRouter {
    backends: HashMap<ResourceType, Backend>,
}

impl BackendRouter {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn register(&mut self, resource: ResourceType, backend: Backend) {
        self.backends.insert(resource, backend);
    }

    #[inline]
    pub fn with(mut self, resource: ResourceType, backend: Backend) -> Self {
        self.register(resource, backend);
        self
    }

    pub fn pick(&self, resource: ResourceType) -> Option<&Backend> {
        self.backends.get(&resource)
    }

    #[instrument(level = "trace", skip(self))]
    pub fn resolve(&self, resource: ResourceType) -> Result<Backend, CoreError> {
        let backend = self
            .pick(resource)
            .ok_or(CoreError::NoBackend(resource))?;
        trace!(
            builder = backend.builder.name(),
            runner = backend.runner.name(),
            "backend resolved"
        );
        Ok(backend.clone())
    }

    pub fn resources(&self) -> impl Iterator<Item = ResourceType> + '_ {
        self.backends.keys().copied()
    }
}
