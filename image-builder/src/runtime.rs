use crate::{ImageBuilderError, ImageBuilderResult};
use std::path::Path;
use std::process::Command;
use tracing::{debug, info, warn};

/// Which container runtime is driving builds and runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRuntime {
    Podman,
    Docker,
    None,
}

impl ContainerRuntime {
    pub fn command(&self) -> Option<&'static str> {
        match self {
            ContainerRuntime::Podman => Some("podman"),
            ContainerRuntime::Docker => Some("docker"),
            ContainerRuntime::None => None,
        }
    }
}

impl std::fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.command() {
            Some(command) => write!(f, "{command}"),
            None => write!(f, "none"),
        }
    }
}

/// Probe for an available container runtime, preferring podman.
pub fn detect_runtime() -> ContainerRuntime {
    if runtime_responds("podman") {
        debug!("Detected podman");
        return ContainerRuntime::Podman;
    }
    if runtime_responds("docker") {
        debug!("Detected docker");
        return ContainerRuntime::Docker;
    }
    debug!("No container runtime detected");
    ContainerRuntime::None
}

fn runtime_responds(command: &str) -> bool {
    Command::new(command)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Build an image from a context directory that contains a Dockerfile.
pub fn build_image(
    runtime: &ContainerRuntime,
    context: &Path,
    tag: &str,
) -> ImageBuilderResult<()> {
    let dockerfile = context.join("Dockerfile");
    if !dockerfile.is_file() {
        return Err(ImageBuilderError::BuildContext {
            message: format!("missing Dockerfile at {}", dockerfile.display()),
        });
    }

    let command = runtime
        .command()
        .ok_or(ImageBuilderError::NoRuntimeAvailable)?;

    info!("Building image '{tag}' with {command}");
    let output = Command::new(command)
        .args(["build", "-t", tag])
        .arg(context)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ImageBuilderError::BuildFailed {
            reason: stderr.trim().to_string(),
        });
    }
    info!("Built image '{tag}'");
    Ok(())
}

/// Start a detached container from the image, injecting PORT and publishing
/// the same port on the host. Returns the container id.
pub fn run_image(
    runtime: &ContainerRuntime,
    tag: &str,
    port: u16,
) -> ImageBuilderResult<String> {
    let command = runtime
        .command()
        .ok_or(ImageBuilderError::NoRuntimeAvailable)?;

    info!("Starting container from '{tag}' on port {port}");
    let output = Command::new(command)
        .args([
            "run",
            "-d",
            "--rm",
            "-e",
            &format!("PORT={port}"),
            "-p",
            &format!("{port}:{port}"),
            tag,
        ])
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ImageBuilderError::RunFailed {
            reason: stderr.trim().to_string(),
        });
    }

    let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if container_id.is_empty() {
        return Err(ImageBuilderError::RunFailed {
            reason: "runtime did not report a container id".to_string(),
        });
    }
    Ok(container_id)
}

/// Force-remove a container, tolerating failures so cleanup paths never
/// mask the original error.
pub fn remove_container(runtime: &ContainerRuntime, container_id: &str) -> ImageBuilderResult<()> {
    let Some(command) = runtime.command() else {
        return Ok(());
    };

    let output = Command::new(command)
        .args(["rm", "-f", container_id])
        .output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("Failed to remove container {container_id}: {}", stderr.trim());
    }
    Ok(())
}
