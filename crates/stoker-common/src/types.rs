//! Shared types for instance configuration.

use serde::{Deserialize, Serialize};

/// Default maximum (and initial) heap for a managed server, in MiB.
pub const DEFAULT_MAX_MEMORY_MB: u32 = 2048;

/// Default server jar name inside the instance working directory.
pub const DEFAULT_JAR_NAME: &str = "server.jar";

/// Launch specification for one managed instance.
///
/// The supervisor reads the spec once per `start()` call. The
/// collaborator store may replace it between restarts, but never while
/// a process is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Server jar, relative to the instance working directory.
    #[serde(default = "default_jar_name")]
    pub jar_name: String,

    /// Free-form start command template. When present it takes
    /// precedence over the jar launch; `${MAX_MEMORY}` and
    /// `${JAVA_ARGS}` are substituted before execution through the
    /// platform shell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_command: Option<String>,

    /// Maximum heap in MiB. Zero falls back to
    /// [`DEFAULT_MAX_MEMORY_MB`] at launch time.
    #[serde(default = "default_max_memory")]
    pub max_memory_mb: u32,

    /// Extra JVM arguments, whitespace separated.
    #[serde(default)]
    pub java_args: String,

    /// Java binary, or a JDK directory (resolved to `<dir>/bin/java`).
    /// Absent means `java` from `PATH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_path: Option<String>,
}

fn default_jar_name() -> String {
    DEFAULT_JAR_NAME.to_string()
}

fn default_max_memory() -> u32 {
    DEFAULT_MAX_MEMORY_MB
}

impl Default for LaunchSpec {
    fn default() -> Self {
        Self {
            jar_name: default_jar_name(),
            start_command: None,
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
            java_args: String::new(),
            java_path: None,
        }
    }
}

impl LaunchSpec {
    /// Launch spec that runs a shell command instead of a jar.
    pub fn from_command(command: impl Into<String>) -> Self {
        Self {
            start_command: Some(command.into()),
            ..Self::default()
        }
    }
}
