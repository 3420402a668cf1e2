//! Launch command construction.
//!
//! Two launch modes: a free-form shell template with variable
//! substitution, or the conventional jar invocation assembled from the
//! spec fields. The template wins when both are present.

use std::path::Path;

use stoker_common::{LaunchSpec, DEFAULT_MAX_MEMORY_MB};

/// Program and argument vector ready to hand to the process spawner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Build the launch command for a spec.
pub fn build_launch_command(spec: &LaunchSpec) -> LaunchCommand {
    let max_memory = if spec.max_memory_mb == 0 {
        DEFAULT_MAX_MEMORY_MB
    } else {
        spec.max_memory_mb
    };

    if let Some(template) = &spec.start_command {
        let rendered = template
            .replace("${MAX_MEMORY}", &max_memory.to_string())
            .replace("${JAVA_ARGS}", &spec.java_args);
        return shell_command(rendered);
    }

    let mut args = vec![format!("-Xmx{max_memory}M"), format!("-Xms{max_memory}M")];
    args.extend(spec.java_args.split_whitespace().map(str::to_string));
    args.push("-jar".to_string());
    args.push(spec.jar_name.clone());
    args.push("nogui".to_string());

    LaunchCommand {
        program: resolve_java(spec.java_path.as_deref()),
        args,
    }
}

/// Wrap a rendered template in the platform shell so that quoting,
/// pipes and redirections in user-supplied commands behave as in a
/// terminal.
fn shell_command(rendered: String) -> LaunchCommand {
    #[cfg(unix)]
    {
        LaunchCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), rendered],
        }
    }
    #[cfg(windows)]
    {
        LaunchCommand {
            program: "cmd".to_string(),
            args: vec!["/C".to_string(), rendered],
        }
    }
}

/// Resolve the configured java path. A directory is taken as a JDK
/// home and resolved to its `bin/java`; anything else is used as the
/// binary itself.
fn resolve_java(java_path: Option<&str>) -> String {
    match java_path {
        None => "java".to_string(),
        Some(path) => {
            let p = Path::new(path);
            if p.is_dir() {
                p.join("bin").join("java").to_string_lossy().into_owned()
            } else {
                path.to_string()
            }
        }
    }
}
