//! In-memory simulated cluster.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use super::{matches_resource_type, ResourceClient};
use crate::error::ResourceError;
use crate::models::KubernetesResource;
use crate::Result;

/// `(namespace, kind, name)`
type ResourceKey = (String, String, String);

/// A simulated cluster keyed by namespace, kind and name.
///
/// Lists come back sorted by kind then name. Apply calls are counted and can
/// be made to fail per resource, and list calls can be made to fail per type.
#[derive(Default)]
pub struct MemoryResourceClient {
    resources: RwLock<BTreeMap<ResourceKey, KubernetesResource>>,
    apply_calls: AtomicUsize,
    failing_applies: RwLock<HashSet<(String, String)>>,
    failing_lists: RwLock<HashSet<String>>,
}

impl MemoryResourceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cluster already holding `resources`
    pub fn with_resources(resources: impl IntoIterator<Item = KubernetesResource>) -> Self {
        let client = Self::new();
        for resource in resources {
            client.insert(resource);
        }
        client
    }

    /// Add or replace a resource without counting it as an apply
    pub fn insert(&self, resource: KubernetesResource) {
        let key = key_of(&resource);
        self.resources.write().insert(key, resource);
    }

    /// Look up a stored resource by exact kind
    pub fn get(&self, kind: &str, name: &str, namespace: &str) -> Option<KubernetesResource> {
        self.resources
            .read()
            .get(&(namespace.to_string(), kind.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of resources in the simulated cluster
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `apply_resource` calls, successful or not
    pub fn apply_count(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    /// Make every apply of `kind`/`name` fail
    pub fn fail_apply(&self, kind: &str, name: &str) {
        self.failing_applies
            .write()
            .insert((kind.to_ascii_lowercase(), name.to_string()));
    }

    /// Make every list of `resource_type` fail
    pub fn fail_list(&self, resource_type: &str) {
        self.failing_lists
            .write()
            .insert(resource_type.trim().to_ascii_lowercase());
    }

    fn find_key(&self, resource_type: &str, name: &str, namespace: &str) -> Option<ResourceKey> {
        self.resources
            .read()
            .keys()
            .find(|(ns, kind, n)| {
                ns == namespace && n == name && matches_resource_type(resource_type, kind)
            })
            .cloned()
    }
}

fn key_of(resource: &KubernetesResource) -> ResourceKey {
    (
        resource.namespace.clone(),
        resource.kind.clone(),
        resource.name.clone(),
    )
}

#[async_trait]
impl ResourceClient for MemoryResourceClient {
    async fn list_resources(
        &self,
        resource_type: &str,
        namespace: &str,
    ) -> Result<Vec<KubernetesResource>> {
        if self
            .failing_lists
            .read()
            .contains(&resource_type.trim().to_ascii_lowercase())
        {
            return Err(ResourceError::Api(format!(
                "simulated list failure for {}",
                resource_type
            ))
            .into());
        }

        let listed: Vec<KubernetesResource> = self
            .resources
            .read()
            .iter()
            .filter(|((ns, kind, _), _)| {
                ns == namespace && matches_resource_type(resource_type, kind)
            })
            .map(|(_, resource)| resource.clone())
            .collect();

        debug!(
            "Listed {} {} in namespace {}",
            listed.len(),
            resource_type,
            namespace
        );
        Ok(listed)
    }

    async fn apply_resource(&self, resource: &KubernetesResource) -> Result<()> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);

        if self
            .failing_applies
            .read()
            .contains(&(resource.kind.to_ascii_lowercase(), resource.name.clone()))
        {
            return Err(ResourceError::Api(format!(
                "simulated apply failure for {}",
                resource.display_name()
            ))
            .into());
        }

        self.insert(resource.clone());
        Ok(())
    }

    async fn delete_resource(
        &self,
        resource_type: &str,
        name: &str,
        namespace: &str,
    ) -> Result<()> {
        let key = self
            .find_key(resource_type, name, namespace)
            .ok_or_else(|| ResourceError::NotFound {
                kind: resource_type.to_string(),
                name: name.to_string(),
                namespace: namespace.to_string(),
            })?;
        self.resources.write().remove(&key);
        Ok(())
    }

    async fn resource_exists(
        &self,
        resource_type: &str,
        name: &str,
        namespace: &str,
    ) -> Result<bool> {
        Ok(self.find_key(resource_type, name, namespace).is_some())
    }
}
