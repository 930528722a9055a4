//! Test helper utilities.
//!
//! Builds managers over in-memory collaborators and provides sample
//! resources with realistic payloads.

use std::sync::Arc;

use aegis_core::backup::BackupManager;
use aegis_core::config::BackupOptions;
use aegis_core::models::{BackupJobSpec, BackupRecord, KubernetesResource, RecoveryPlanSpec};
use aegis_core::recovery::RecoveryManager;
use aegis_core::resource::MemoryResourceClient;
use aegis_core::storage::{ObjectStoreBackend, StorageBackend};
use aegis_core::store::MemoryStore;

/// Managers wired to in-memory collaborators, with handles to inspect them
pub struct Harness {
    pub cluster: Arc<MemoryResourceClient>,
    pub storage: Arc<ObjectStoreBackend>,
    pub store: Arc<MemoryStore>,
    pub backups: Arc<BackupManager>,
    pub recovery: RecoveryManager,
}

pub fn harness(resources: Vec<KubernetesResource>) -> Harness {
    let cluster = Arc::new(MemoryResourceClient::with_resources(resources));
    let storage = Arc::new(ObjectStoreBackend::memory());
    let store = Arc::new(MemoryStore::new());

    let backups = Arc::new(BackupManager::new(
        cluster.clone(),
        storage.clone(),
        store.clone(),
        &BackupOptions::default(),
    ));
    let recovery = RecoveryManager::new(cluster.clone(), backups.clone(), store.clone());

    Harness {
        cluster,
        storage,
        store,
        backups,
        recovery,
    }
}

/// A namespaced resource with a JSON payload mirroring its identity
pub fn resource(api_version: &str, kind: &str, name: &str, namespace: &str) -> KubernetesResource {
    let payload = serde_json::json!({
        "apiVersion": api_version,
        "kind": kind,
        "metadata": {"name": name, "namespace": namespace, "labels": {"app": name}},
    });
    KubernetesResource::new(api_version, kind, name, namespace)
        .with_label("app", name)
        .with_manifest(serde_json::to_vec(&payload).expect("payload serializes"))
}

pub fn deployment(name: &str, namespace: &str) -> KubernetesResource {
    resource("apps/v1", "Deployment", name, namespace)
}

pub fn service(name: &str, namespace: &str) -> KubernetesResource {
    resource("v1", "Service", name, namespace)
}

pub fn config_map(name: &str, namespace: &str) -> KubernetesResource {
    resource("v1", "ConfigMap", name, namespace)
}

/// 2 Deployments, 1 Service and 1 ConfigMap in `prod`, plus noise elsewhere
pub fn prod_cluster() -> Vec<KubernetesResource> {
    vec![
        deployment("web", "prod"),
        deployment("worker", "prod"),
        service("web", "prod"),
        config_map("settings", "prod"),
        deployment("web", "staging"),
        resource("v1", "Secret", "creds", "prod"),
    ]
}

pub fn job_spec(name: &str, namespace: &str, resource_types: &[&str]) -> BackupJobSpec {
    BackupJobSpec {
        name: name.to_string(),
        namespace: namespace.to_string(),
        resource_types: resource_types.iter().map(|t| t.to_string()).collect(),
        schedule: "@daily".to_string(),
        ..Default::default()
    }
}

pub fn plan_spec(backup_id: &str, target_namespace: &str) -> RecoveryPlanSpec {
    RecoveryPlanSpec {
        name: "restore".to_string(),
        backup_id: backup_id.to_string(),
        target_namespace: target_namespace.to_string(),
        ..Default::default()
    }
}

/// Create a job over `resource_types` in `prod` and run it once
pub async fn completed_backup(h: &Harness, resource_types: &[&str]) -> BackupRecord {
    let job = h
        .backups
        .create_job(job_spec("nightly", "prod", resource_types))
        .await
        .expect("job is valid");
    let outcome = h.backups.execute_backup(&job.id).await.expect("job exists");
    outcome.into_result().expect("backup completes")
}

/// Overwrite a stored object, for corruption tests
pub async fn overwrite(h: &Harness, key: &str, data: Vec<u8>) {
    h.storage
        .put(key, data.into())
        .await
        .expect("in-memory put succeeds");
}
