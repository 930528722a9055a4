//! Wiring of configuration, storage, state and cluster access for commands.

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use aegis_core::resource::{KubeResourceClient, MemoryResourceClient, ResourceClient};
use aegis_core::store::{JobStore, MemoryStore, PlanStore, SqliteStore};
use aegis_core::{
    create_backend, BackupManager, Config, KubernetesResource, RecoveryManager, StateBackend,
};

/// Flags shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub simulate: bool,
    pub seed: Option<PathBuf>,
}

/// Managers built from one configuration
pub struct Context {
    pub config: Config,
    pub backups: Arc<BackupManager>,
    pub recovery: Arc<RecoveryManager>,
    sqlite: Option<Arc<SqliteStore>>,
}

impl Context {
    pub async fn build(options: &GlobalOptions) -> Result<Self> {
        let config = load_config(options.config.as_deref())?;

        let storage =
            create_backend(&config.storage).context("Failed to create storage backend")?;
        debug!("Storage backend: {}", config.storage.kind());

        let sqlite = match config.state.backend {
            StateBackend::Sqlite => Some(Arc::new(
                SqliteStore::new(&config.state.db_path)
                    .await
                    .with_context(|| {
                        format!("Failed to open state database {:?}", config.state.db_path)
                    })?,
            )),
            StateBackend::Memory => None,
        };
        let (job_store, plan_store): (Arc<dyn JobStore>, Arc<dyn PlanStore>) = match &sqlite {
            Some(store) => (store.clone(), store.clone()),
            None => {
                let store = Arc::new(MemoryStore::new());
                (store.clone(), store)
            }
        };

        let resources: Arc<dyn ResourceClient> = if options.simulate {
            let seeded = match &options.seed {
                Some(path) => load_seed(path).await?,
                None => Vec::new(),
            };
            info!(
                "Simulation mode: in-memory cluster with {} resources",
                seeded.len()
            );
            Arc::new(MemoryResourceClient::with_resources(seeded))
        } else {
            Arc::new(
                KubeResourceClient::try_default(config.kubernetes.field_manager.clone())
                    .await
                    .context("Failed to connect to the cluster (use --simulate to run without one)")?,
            )
        };

        let backups = Arc::new(BackupManager::new(
            resources.clone(),
            storage,
            job_store,
            &config.backup,
        ));
        let recovery = Arc::new(RecoveryManager::new(resources, backups.clone(), plan_store));

        Ok(Self {
            config,
            backups,
            recovery,
            sqlite,
        })
    }

    /// Flush and close the state database, if one is open
    pub async fn close(self) {
        if let Some(store) = self.sqlite {
            store.close().await;
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path)?
        }
        None => Config::default(),
    };
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

async fn load_seed(path: &Path) -> Result<Vec<KubernetesResource>> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    let resources: Vec<KubernetesResource> = serde_json::from_slice(&data)
        .with_context(|| format!("Failed to parse seed file {}", path.display()))?;
    Ok(resources)
}
