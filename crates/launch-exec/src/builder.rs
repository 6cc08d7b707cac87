use async_trait::async_trait;
use launch_core::{Builder, CoreError, LaunchProject, StatusTracker};
use launch_model::ResourceType;
use tracing::debug;

/// "Builds" jobs that run straight from source.
///
/// Local processes and nested schedulers need no image: the source
/// reference stands in for one. Any other resource without a pre-built
/// image is rejected, since this agent has no image build pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceBuilder;

#[async_trait]
impl Builder for SourceBuilder {
    fn name(&self) -> &'static str {
        "source"
    }

    async fn build_image(
        &self,
        project: &LaunchProject,
        _entrypoint: &[String],
        _tracker: &dyn StatusTracker,
    ) -> Result<String, CoreError> {
        match project.resource {
            ResourceType::LocalProcess | ResourceType::Scheduler => {
                let source = project
                    .uri
                    .as_deref()
                    .or(project.job.as_deref())
                    .unwrap_or_default();
                debug!(run = %project.run_id, source, "running from source");
                Ok(format!("source:{source}"))
            }
            resource => Err(CoreError::Build(format!(
                "{resource} jobs need a pre-built image (set docker.docker_image)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launch_core::{MemoryTracker, project::ProjectContext};
    use launch_model::Job;
    use serde_json::json;
    use std::time::UNIX_EPOCH;

    fn project(resource: ResourceType) -> LaunchProject {
        let job = Job::new("j1", 1, UNIX_EPOCH).with_run_spec(json!({"uri": "https://git/repo"}));
        let ctx = ProjectContext {
            entity: "team",
            project: "proj",
            queue: "q",
            resource,
            defaults: vec![],
        };
        LaunchProject::from_job(&job, &ctx).unwrap()
    }

    #[tokio::test]
    async fn processes_run_from_source() {
        let tracker = MemoryTracker::new("r", "q");
        let image = SourceBuilder
            .build_image(&project(ResourceType::LocalProcess), &[], &tracker)
            .await
            .unwrap();
        assert_eq!(image, "source:https://git/repo");
    }

    #[tokio::test]
    async fn containers_need_an_image() {
        let tracker = MemoryTracker::new("r", "q");
        let err = SourceBuilder
            .build_image(&project(ResourceType::LocalContainer), &[], &tracker)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Build(_)));
    }
}
