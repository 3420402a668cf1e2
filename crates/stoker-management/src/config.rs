//! Panel configuration.
//!
//! One YAML file declares the panel-wide settings and every managed
//! instance. Launch fields sit directly on the instance entry:
//!
//! ```yaml
//! panel:
//!   base_directory: /srv/stoker
//!   rcon:
//!     listen: 0.0.0.0:25575
//!     password: hunter2
//! instances:
//!   - id: survival
//!     name: Survival
//!     jar_name: paper.jar
//!     max_memory_mb: 4096
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stoker_common::{LaunchSpec, SupervisorError, SupervisorResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    pub panel: PanelOptions,
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelOptions {
    /// Directory holding one subdirectory per instance.
    #[serde(default = "default_base_directory")]
    pub base_directory: PathBuf,
    pub rcon: RconOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RconOptions {
    #[serde(default = "default_rcon_listen")]
    pub listen: String,
    pub password: String,
}

/// One instance declaration. Launch fields are flattened in, so a
/// config entry reads as one flat block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub id: String,
    /// Display name; defaults to the ID when omitted.
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub launch: LaunchSpec,
}

fn default_base_directory() -> PathBuf {
    PathBuf::from("instances")
}

fn default_rcon_listen() -> String {
    "0.0.0.0:25575".to_string()
}

impl PanelConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> SupervisorResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            SupervisorError::configuration(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the panel cannot run with: an empty RCON
    /// password, or instance IDs that are empty, duplicated, or would
    /// escape the base directory.
    pub fn validate(&self) -> SupervisorResult<()> {
        if self.panel.rcon.password.is_empty() {
            return Err(SupervisorError::configuration("rcon password must not be empty"));
        }

        let mut seen = std::collections::HashSet::new();
        for instance in &self.instances {
            if instance.id.is_empty() {
                return Err(SupervisorError::configuration("instance id must not be empty"));
            }
            if instance.id.contains(['/', '\\']) || instance.id == "." || instance.id == ".." {
                return Err(SupervisorError::configuration(format!(
                    "instance id {:?} is not a valid directory name",
                    instance.id
                )));
            }
            if !seen.insert(instance.id.as_str()) {
                return Err(SupervisorError::configuration(format!(
                    "duplicate instance id {:?}",
                    instance.id
                )));
            }
        }
        Ok(())
    }
}
