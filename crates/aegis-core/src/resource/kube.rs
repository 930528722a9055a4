//! Resource client backed by a live Kubernetes API server.

use async_trait::async_trait;
use kube::api::{Api, ApiResource, DeleteParams, DynamicObject, ListParams, Patch, PatchParams};
use kube::discovery::{Discovery, Scope};
use kube::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{matches_resource_type, ResourceClient};
use crate::error::ResourceError;
use crate::models::KubernetesResource;
use crate::Result;

/// Metadata fields the API server owns; dropped from captured payloads
const SERVER_METADATA: &[&str] = &[
    "resourceVersion",
    "uid",
    "creationTimestamp",
    "managedFields",
    "generation",
    "selfLink",
];

/// Talks to the cluster through `Api<DynamicObject>`, resolving resource
/// types with API discovery on first use.
pub struct KubeResourceClient {
    client: Client,
    field_manager: String,
    resources: OnceCell<Vec<ApiResource>>,
}

impl KubeResourceClient {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
            resources: OnceCell::new(),
        }
    }

    /// Connect using the ambient kubeconfig or in-cluster service account
    pub async fn try_default(field_manager: impl Into<String>) -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self::new(client, field_manager))
    }

    /// Namespaced resources served by the cluster, core group first
    async fn discovered(&self) -> Result<&Vec<ApiResource>> {
        self.resources
            .get_or_try_init(|| async {
                let discovery = Discovery::new(self.client.clone()).run().await?;
                let mut found: Vec<ApiResource> = discovery
                    .groups()
                    .flat_map(|group| group.recommended_resources())
                    .filter(|(_, caps)| matches!(caps.scope, Scope::Namespaced))
                    .map(|(ar, _)| ar)
                    .collect();
                found.sort_by(|a, b| {
                    (!a.group.is_empty(), &a.group, &a.kind)
                        .cmp(&(!b.group.is_empty(), &b.group, &b.kind))
                });
                info!("Discovered {} namespaced resource types", found.len());
                Ok::<_, crate::Error>(found)
            })
            .await
    }

    async fn resolve(&self, resource_type: &str) -> Result<ApiResource> {
        self.resolve_version(resource_type, None).await
    }

    async fn resolve_version(
        &self,
        resource_type: &str,
        api_version: Option<&str>,
    ) -> Result<ApiResource> {
        select_resource(self.discovered().await?, resource_type, api_version)
            .cloned()
            .ok_or_else(|| ResourceError::UnknownKind(resource_type.to_string()).into())
    }

    fn api(&self, ar: &ApiResource, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, ar)
    }
}

/// Pick the discovered resource serving `resource_type`.
///
/// Kinds such as `Event` are served by more than one group; when
/// `api_version` is given the resource from that group/version wins, and the
/// first match in discovery order is the fallback.
fn select_resource<'a>(
    discovered: &'a [ApiResource],
    resource_type: &str,
    api_version: Option<&str>,
) -> Option<&'a ApiResource> {
    let candidates: Vec<&ApiResource> = discovered
        .iter()
        .filter(|ar| {
            matches_resource_type(resource_type, &ar.kind)
                || ar.plural.eq_ignore_ascii_case(resource_type.trim())
        })
        .collect();
    api_version
        .and_then(|version| candidates.iter().find(|ar| ar.api_version == version))
        .or_else(|| candidates.first())
        .copied()
}

/// Convert a listed object into a snapshot, stripping server-owned fields
fn to_resource(
    ar: &ApiResource,
    object: DynamicObject,
    namespace: &str,
) -> Result<KubernetesResource> {
    let name = object.metadata.name.clone().unwrap_or_default();
    let namespace = object
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| namespace.to_string());
    let labels: BTreeMap<String, String> = object.metadata.labels.clone().unwrap_or_default();

    let mut payload = serde_json::to_value(&object)?;
    if let Some(map) = payload.as_object_mut() {
        map.insert("apiVersion".to_string(), Value::String(ar.api_version.clone()));
        map.insert("kind".to_string(), Value::String(ar.kind.clone()));
        map.remove("status");
        if let Some(metadata) = map.get_mut("metadata").and_then(Value::as_object_mut) {
            for field in SERVER_METADATA {
                metadata.remove(*field);
            }
        }
    }

    Ok(KubernetesResource {
        api_version: ar.api_version.clone(),
        kind: ar.kind.clone(),
        name,
        namespace,
        labels,
        manifest: serde_json::to_vec(&payload)?,
    })
}

/// The object to send for server-side apply
fn apply_body(resource: &KubernetesResource) -> Result<Value> {
    let mut body = if resource.manifest.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_slice(&resource.manifest)?
    };

    let map = body.as_object_mut().ok_or_else(|| {
        ResourceError::Api(format!(
            "payload of {} is not an object",
            resource.display_name()
        ))
    })?;
    map.insert(
        "apiVersion".to_string(),
        Value::String(resource.api_version.clone()),
    );
    map.insert("kind".to_string(), Value::String(resource.kind.clone()));

    let metadata = map
        .entry("metadata")
        .or_insert_with(|| serde_json::json!({}));
    if let Some(metadata) = metadata.as_object_mut() {
        metadata.insert("name".to_string(), Value::String(resource.name.clone()));
        metadata.insert(
            "namespace".to_string(),
            Value::String(resource.namespace.clone()),
        );
        if !resource.labels.is_empty() && !metadata.contains_key("labels") {
            metadata.insert("labels".to_string(), serde_json::to_value(&resource.labels)?);
        }
        for field in SERVER_METADATA {
            metadata.remove(*field);
        }
    }

    Ok(body)
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    async fn list_resources(
        &self,
        resource_type: &str,
        namespace: &str,
    ) -> Result<Vec<KubernetesResource>> {
        let ar = self.resolve(resource_type).await?;
        let list = self
            .api(&ar, namespace)
            .list(&ListParams::default())
            .await?;

        debug!(
            "Listed {} {} in namespace {}",
            list.items.len(),
            ar.plural,
            namespace
        );
        list.items
            .into_iter()
            .map(|object| to_resource(&ar, object, namespace))
            .collect()
    }

    async fn apply_resource(&self, resource: &KubernetesResource) -> Result<()> {
        let ar = self
            .resolve_version(&resource.kind, Some(resource.api_version.as_str()))
            .await?;
        let body = apply_body(resource)?;

        self.api(&ar, &resource.namespace)
            .patch(
                &resource.name,
                &PatchParams::apply(&self.field_manager).force(),
                &Patch::Apply(&body),
            )
            .await?;

        debug!("Applied {}", resource.display_name());
        Ok(())
    }

    async fn delete_resource(
        &self,
        resource_type: &str,
        name: &str,
        namespace: &str,
    ) -> Result<()> {
        let ar = self.resolve(resource_type).await?;
        match self
            .api(&ar, namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Err(ResourceError::NotFound {
                kind: ar.kind.clone(),
                name: name.to_string(),
                namespace: namespace.to_string(),
            }
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn resource_exists(
        &self,
        resource_type: &str,
        name: &str,
        namespace: &str,
    ) -> Result<bool> {
        let ar = self.resolve(resource_type).await?;
        Ok(self.api(&ar, namespace).get_opt(name).await?.is_some())
    }
}
