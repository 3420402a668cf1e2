//! Instance registry.
//!
//! Owns one supervisor per configured instance and the working
//! directories under the panel base directory. Loading is also the
//! reattachment point: each supervisor inspects its directory's PID
//! file as it is adopted, so instances left running by a previous
//! panel process come back as detached rather than stopped.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use stoker_common::{SupervisorError, SupervisorResult};
use stoker_rcon::InstanceDirectory;
use stoker_supervisor::ProcessSupervisor;
use tracing::info;

use crate::config::{InstanceConfig, PanelConfig};

/// One registered instance.
#[derive(Debug, Clone)]
pub struct InstanceHandle {
    pub id: String,
    pub name: String,
    pub supervisor: Arc<ProcessSupervisor>,
}

pub struct InstanceManager {
    base_dir: PathBuf,
    instances: RwLock<HashMap<String, InstanceHandle>>,
}

impl InstanceManager {
    /// Build the registry from a validated config, creating the base
    /// and per-instance directories as needed.
    ///
    /// Must run inside a Tokio runtime: adopting an instance may spawn
    /// tailer tasks for processes recovered from PID files.
    pub fn load(config: &PanelConfig) -> SupervisorResult<Arc<Self>> {
        std::fs::create_dir_all(&config.panel.base_directory)?;
        let manager = Arc::new(Self {
            base_dir: config.panel.base_directory.clone(),
            instances: RwLock::new(HashMap::new()),
        });

        for instance in &config.instances {
            manager.adopt(instance)?;
        }
        info!(count = manager.len(), "instances loaded");
        Ok(manager)
    }

    /// Register one instance and reattach to any process its PID file
    /// still names.
    pub fn adopt(&self, config: &InstanceConfig) -> SupervisorResult<()> {
        if self.instances.read().contains_key(&config.id) {
            return Err(SupervisorError::configuration(format!(
                "duplicate instance id {:?}",
                config.id
            )));
        }

        let dir = self.base_dir.join(&config.id);
        std::fs::create_dir_all(&dir)?;

        let supervisor = ProcessSupervisor::new(&config.id, config.launch.clone());
        supervisor.set_working_directory(&dir)?;

        let name = if config.name.is_empty() {
            config.id.clone()
        } else {
            config.name.clone()
        };
        info!(id = %config.id, state = %supervisor.state(), "instance adopted");

        self.instances.write().insert(
            config.id.clone(),
            InstanceHandle {
                id: config.id.clone(),
                name,
                supervisor,
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<InstanceHandle> {
        self.instances.read().get(id).cloned()
    }

    /// Every handle, sorted by display name (case-insensitive), then
    /// by ID for ties.
    pub fn handles(&self) -> Vec<InstanceHandle> {
        let mut handles: Vec<_> = self.instances.read().values().cloned().collect();
        handles.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        handles
    }

    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}

impl InstanceDirectory for InstanceManager {
    fn resolve(&self, id: &str) -> Option<Arc<ProcessSupervisor>> {
        self.instances
            .read()
            .get(id)
            .map(|handle| Arc::clone(&handle.supervisor))
    }
}

impl std::fmt::Debug for InstanceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceManager")
            .field("base_dir", &self.base_dir)
            .field("instances", &self.len())
            .finish()
    }
}
