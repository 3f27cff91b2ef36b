//! Deployment image tooling for menu-search.
//!
//! Renders the two-stage Dockerfile the service ships with, and drives a
//! local container runtime (podman or docker) to build and run it.

use thiserror::Error;

pub mod recipe;
pub mod runtime;

pub use recipe::ImageRecipe;
pub use runtime::{build_image, detect_runtime, remove_container, run_image, ContainerRuntime};

#[derive(Error, Debug)]
pub enum ImageBuilderError {
    #[error("Invalid recipe: {message}")]
    InvalidRecipe { message: String },

    #[error("No container runtime available (tried podman and docker)")]
    NoRuntimeAvailable,

    #[error("Build context error: {message}")]
    BuildContext { message: String },

    #[error("Image build failed: {reason}")]
    BuildFailed { reason: String },

    #[error("Container start failed: {reason}")]
    RunFailed { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ImageBuilderResult<T> = Result<T, ImageBuilderError>;
