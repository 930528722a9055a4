//! Cluster resource contract and clients.
//!
//! Both managers talk to the cluster only through [`ResourceClient`]. The
//! in-memory client backs tests and simulation; the kube client talks to a
//! live API server.

mod kube;
mod memory;

pub use self::kube::KubeResourceClient;
pub use memory::MemoryResourceClient;

use async_trait::async_trait;

use crate::models::KubernetesResource;
use crate::Result;

/// Capability set for listing, applying and deleting namespaced resources
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// List resources of one type in a namespace. Nothing matching is an empty
    /// list, not an error.
    async fn list_resources(
        &self,
        resource_type: &str,
        namespace: &str,
    ) -> Result<Vec<KubernetesResource>>;

    /// Create or update a resource
    async fn apply_resource(&self, resource: &KubernetesResource) -> Result<()>;

    /// Delete a resource. Fails with `ResourceError::NotFound` if absent.
    async fn delete_resource(&self, resource_type: &str, name: &str, namespace: &str)
        -> Result<()>;

    /// Whether a resource exists; used for conflict detection before apply
    async fn resource_exists(&self, resource_type: &str, name: &str, namespace: &str)
        -> Result<bool>;
}

/// Whether `resource_type` names `kind`, either as the kind itself or as its
/// lowercase plural (`Deployment`, `deployment`, `deployments`,
/// `networkpolicies`, `ingresses`), ignoring case.
pub fn matches_resource_type(resource_type: &str, kind: &str) -> bool {
    let wanted = resource_type.trim().to_ascii_lowercase();
    let kind = kind.to_ascii_lowercase();
    if wanted.is_empty() {
        return false;
    }
    wanted == kind || wanted == plural(&kind)
}

fn plural(kind: &str) -> String {
    if let Some(stem) = kind.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{}ies", stem);
        }
    }
    if kind.ends_with('s') || kind.ends_with('x') || kind.ends_with("ch") {
        return format!("{}es", kind);
    }
    format!("{}s", kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_kind_and_plural() {
        assert!(matches_resource_type("Deployment", "Deployment"));
        assert!(matches_resource_type("deployments", "Deployment"));
        assert!(matches_resource_type(" CONFIGMAPS ", "ConfigMap"));
        assert!(matches_resource_type("networkpolicies", "NetworkPolicy"));
        assert!(matches_resource_type("ingresses", "Ingress"));
        assert!(matches_resource_type("gateways", "Gateway"));
        assert!(!matches_resource_type("services", "ServiceAccount"));
        assert!(!matches_resource_type("", "Secret"));
    }
}
