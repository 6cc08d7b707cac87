use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Compute backend a queue dispatches to.
///
/// Each queue targets exactly one resource type, read from the job set
/// metadata after the first successful sync.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    /// Container orchestrator (one job per pod/job object).
    Kubernetes,
    /// Managed ML platform training jobs.
    Sagemaker,
    /// Managed ML platform custom jobs.
    Vertex,
    /// Native process on the agent host.
    LocalProcess,
    /// Container on the agent host.
    LocalContainer,
    /// Nested scheduler (e.g. a sweep controller) run as a job.
    Scheduler,
}

impl ResourceType {
    pub const ALL: [ResourceType; 6] = [
        ResourceType::Kubernetes,
        ResourceType::Sagemaker,
        ResourceType::Vertex,
        ResourceType::LocalProcess,
        ResourceType::LocalContainer,
        ResourceType::Scheduler,
    ];

    /// Returns the wire name (`"kubernetes"`, `"local-process"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Kubernetes => "kubernetes",
            ResourceType::Sagemaker => "sagemaker",
            ResourceType::Vertex => "vertex",
            ResourceType::LocalProcess => "local-process",
            ResourceType::LocalContainer => "local-container",
            ResourceType::Scheduler => "scheduler",
        }
    }

    /// Whether runs of this type execute on the agent host itself.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ResourceType::LocalProcess | ResourceType::LocalContainer
        )
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        match norm.as_str() {
            "kubernetes" | "k8s" => Ok(ResourceType::Kubernetes),
            "sagemaker" => Ok(ResourceType::Sagemaker),
            "vertex" => Ok(ResourceType::Vertex),
            "local-process" | "local_process" => Ok(ResourceType::LocalProcess),
            "local-container" | "local_container" | "local" => Ok(ResourceType::LocalContainer),
            "scheduler" | "sweep" => Ok(ResourceType::Scheduler),
            _ => Err(ModelError::UnknownResource(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_names_and_aliases() {
        assert_eq!("kubernetes".parse::<ResourceType>().unwrap(), ResourceType::Kubernetes);
        assert_eq!(" K8S ".parse::<ResourceType>().unwrap(), ResourceType::Kubernetes);
        assert_eq!("local".parse::<ResourceType>().unwrap(), ResourceType::LocalContainer);
        assert_eq!("local_process".parse::<ResourceType>().unwrap(), ResourceType::LocalProcess);
    }

    #[test]
    fn parse_unknown_fails() {
        let err = "mainframe".parse::<ResourceType>().unwrap_err();
        assert_eq!(err, ModelError::UnknownResource("mainframe".into()));
    }

    #[test]
    fn wire_name_matches_display_and_serde() {
        for r in ResourceType::ALL {
            let json = serde_json::to_string(&r).unwrap();
            assert_eq!(json, format!("\"{}\"", r.as_str()));
            assert_eq!(r.to_string(), r.as_str());
        }
    }
}
