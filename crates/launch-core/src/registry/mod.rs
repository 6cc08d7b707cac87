use std::collections::HashMap;

use launch_model::ResourceType;
use tracing::{debug, instrument};

use crate::{
    error::CoreError,
    manager::{
        KubernetesManager, LocalManager, ManagedPlatformManager, Manager, ManagerContext,
        SchedulerManager,
    },
};

/// Builds a manager for one queue.
pub type ManagerCtor = fn(ManagerContext) -> Result<Box<dyn Manager>, CoreError>;

/// Resource type to manager constructor.
#[derive(Clone, Default)]
pub struct ManagerRegistry {
    ctors: HashMap<ResourceType, ManagerCtor>,
}

impl ManagerRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in manager for every known resource.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ResourceType::Kubernetes, kubernetes);
        registry.register(ResourceType::Sagemaker, managed);
        registry.register(ResourceType::Vertex, managed);
        registry.register(ResourceType::LocalProcess, local);
        registry.register(ResourceType::LocalContainer, local);
        registry.register(ResourceType::Scheduler, scheduler);
        registry
    }

    /// Register (or replace) the constructor for `resource`.
    #[inline]
    pub fn register(&mut self, resource: ResourceType, ctor: ManagerCtor) {
        self.ctors.insert(resource, ctor);
    }

    pub fn supports(&self, resource: ResourceType) -> bool {
        self.ctors.contains_key(&resource)
    }

    #[instrument(level = "debug", skip(self, ctx), fields(queue = %ctx.queue))]
    pub fn build(&self, resource: ResourceType, ctx: ManagerContext) -> Result<Box<dyn Manager>, CoreError> {
        let ctor = self.ctors.get(&resource).ok_or(CoreError::NoManager(resource))?;
        let manager = ctor(ctx)?;
        debug!(resource = %resource, driver = ?manager.driver_kind(), "manager built");
        Ok(manager)
    }
}

fn kubernetes(ctx: ManagerContext) -> Result<Box<dyn Manager>, CoreError> {
    Ok(Box::new(KubernetesManager::new(ctx)))
}

fn managed(ctx: ManagerContext) -> Result<Box<dyn Manager>, CoreError> {
    Ok(Box::new(ManagedPlatformManager::new(ctx)))
}

fn local(ctx: ManagerContext) -> Result<Box<dyn Manager>, CoreError> {
    Ok(Box::new(LocalManager::new(ctx)))
}

fn scheduler(ctx: ManagerContext) -> Result<Box<dyn Manager>, CoreError> {
    Ok(Box::new(SchedulerManager::new(ctx)))
}
