use crate::{ImageBuilderError, ImageBuilderResult};
use serde::{Deserialize, Serialize};

/// Everything needed to render the deployment Dockerfile: a two-stage build
/// that compiles the workspace in a Rust image and ships the binary in a
/// slim runtime image.
///
/// The rendered file stages the Cargo manifests and builds the dependency
/// graph against stub sources before copying the tree, so editing source
/// files alone never re-downloads or re-compiles dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecipe {
    pub builder_image: String,
    pub runtime_image: String,
    /// Workspace member directories, each with a Cargo.toml to stage.
    pub members: Vec<String>,
    /// Member that owns the binary target.
    pub bin_member: String,
    /// Name of the binary to build and install.
    pub binary: String,
    pub port: u16,
    pub worker_threads: usize,
    /// Zero disables the per-request timeout.
    pub request_timeout_secs: u64,
    /// Default RUST_LOG baked into the image.
    pub log_filter: String,
}

impl Default for ImageRecipe {
    fn default() -> Self {
        Self {
            builder_image: "rust:1.85-slim".to_string(),
            runtime_image: "debian:bookworm-slim".to_string(),
            members: vec![
                "embedding".to_string(),
                "server".to_string(),
                "image-builder".to_string(),
            ],
            bin_member: "server".to_string(),
            binary: "menu-search".to_string(),
            port: 8080,
            worker_threads: 8,
            request_timeout_secs: 0,
            log_filter: "info".to_string(),
        }
    }
}

impl ImageRecipe {
    pub fn with_builder_image(mut self, image: impl Into<String>) -> Self {
        self.builder_image = image.into();
        self
    }

    pub fn with_runtime_image(mut self, image: impl Into<String>) -> Self {
        self.runtime_image = image.into();
        self
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    pub fn validate(&self) -> ImageBuilderResult<()> {
        let invalid = |message: String| ImageBuilderError::InvalidRecipe { message };

        if self.builder_image.is_empty() || self.runtime_image.is_empty() {
            return Err(invalid("image names cannot be empty".to_string()));
        }
        if self.members.is_empty() {
            return Err(invalid("at least one workspace member is required".to_string()));
        }
        if !self.members.contains(&self.bin_member) {
            return Err(invalid(format!(
                "bin_member '{}' is not one of the listed members",
                self.bin_member
            )));
        }
        if self.binary.is_empty() {
            return Err(invalid("binary name cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(invalid("port must be between 1 and 65535".to_string()));
        }
        if self.worker_threads == 0 {
            return Err(invalid("worker_threads must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Render the Dockerfile text. The checked-in `Dockerfile` at the
    /// repository root is this output for the default recipe; regenerate it
    /// with `menu-search image --output Dockerfile`.
    pub fn render(&self) -> String {
        let src_dirs = self
            .members
            .iter()
            .map(|m| format!("{m}/src"))
            .collect::<Vec<_>>()
            .join(" ");
        let lib_stubs = self
            .members
            .iter()
            .map(|m| format!("{m}/src/lib.rs"))
            .collect::<Vec<_>>()
            .join(" ");

        let mut out = String::new();
        out.push_str(&format!("FROM {} AS builder\n\n", self.builder_image));
        out.push_str(
            "RUN apt-get update \\\n    \
             && apt-get install -y --no-install-recommends pkg-config libssl-dev \\\n    \
             && rm -rf /var/lib/apt/lists/*\n\n",
        );
        out.push_str("WORKDIR /app\n\n");
        out.push_str("# Manifests first, so dependency layers survive source-only edits.\n");
        out.push_str("COPY Cargo.toml ./\n");
        for member in &self.members {
            out.push_str(&format!("COPY {member}/Cargo.toml {member}/Cargo.toml\n"));
        }
        out.push_str(&format!(
            "RUN mkdir -p {src_dirs} \\\n    \
             && echo 'fn main() {{}}' > {}/src/main.rs \\\n    \
             && touch {lib_stubs} \\\n    \
             && cargo build --release \\\n    \
             && rm -rf {src_dirs}\n\n",
            self.bin_member
        ));
        out.push_str("COPY . .\n");
        out.push_str(&format!(
            "RUN touch {lib_stubs} {}/src/main.rs \\\n    \
             && cargo build --release --bin {}\n\n",
            self.bin_member, self.binary
        ));

        out.push_str(&format!("FROM {}\n\n", self.runtime_image));
        out.push_str(
            "RUN apt-get update \\\n    \
             && apt-get install -y --no-install-recommends ca-certificates libssl3 \\\n    \
             && rm -rf /var/lib/apt/lists/*\n\n",
        );
        out.push_str(&format!("ENV RUST_LOG={}\n\n", self.log_filter));
        out.push_str(&format!(
            "COPY --from=builder /app/target/release/{} /usr/local/bin/{}\n\n",
            self.binary, self.binary
        ));
        out.push_str(&format!("EXPOSE {}\n\n", self.port));
        out.push_str(&format!(
            "CMD [\"/usr/local/bin/{}\", \"serve\", \"--threads\", \"{}\", \"--timeout-secs\", \"{}\"]\n",
            self.binary, self.worker_threads, self.request_timeout_secs
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_recipe_is_valid() {
        assert!(ImageRecipe::default().validate().is_ok());
    }

    #[test]
    fn test_manifest_layers_precede_source_copy() {
        let rendered = ImageRecipe::default().render();

        let root_manifest = rendered.find("COPY Cargo.toml ./").unwrap();
        let member_manifest = rendered.find("COPY embedding/Cargo.toml").unwrap();
        let dependency_build = rendered.find("cargo build --release").unwrap();
        let source_copy = rendered.find("COPY . .").unwrap();
        let final_build = rendered.find("cargo build --release --bin").unwrap();

        assert!(root_manifest < member_manifest);
        assert!(member_manifest < dependency_build);
        assert!(dependency_build < source_copy);
        assert!(source_copy < final_build);
    }

    #[test]
    fn test_runtime_stage_ships_only_the_binary() {
        let rendered = ImageRecipe::default().render();
        let runtime_stage = rendered.find("FROM debian:bookworm-slim").unwrap();
        let install = rendered
            .find("COPY --from=builder /app/target/release/menu-search /usr/local/bin/menu-search")
            .unwrap();
        assert!(runtime_stage < install);
        assert!(!rendered[runtime_stage..].contains("cargo build"));
    }

    #[test]
    fn test_cmd_runs_one_process_with_thread_pool_flags() {
        let rendered = ImageRecipe::default().render();
        assert!(rendered.contains(
            "CMD [\"/usr/local/bin/menu-search\", \"serve\", \"--threads\", \"8\", \"--timeout-secs\", \"0\"]"
        ));
    }

    #[test]
    fn test_port_and_log_filter_rendered() {
        let rendered = ImageRecipe::default().render();
        assert!(rendered.contains("EXPOSE 8080"));
        assert!(rendered.contains("ENV RUST_LOG=info"));
    }

    #[test]
    fn test_custom_fields_flow_through() {
        let rendered = ImageRecipe::default()
            .with_builder_image("rust:1.99-slim")
            .with_port(9100)
            .with_worker_threads(4)
            .with_request_timeout_secs(30)
            .with_log_filter("debug")
            .render();

        assert!(rendered.contains("FROM rust:1.99-slim AS builder"));
        assert!(rendered.contains("EXPOSE 9100"));
        assert!(rendered.contains("\"--threads\", \"4\""));
        assert!(rendered.contains("\"--timeout-secs\", \"30\""));
        assert!(rendered.contains("ENV RUST_LOG=debug"));
    }

    #[test]
    fn test_validate_rejects_degenerate_recipes() {
        let recipe = ImageRecipe::default().with_binary("");
        assert!(matches!(
            recipe.validate(),
            Err(ImageBuilderError::InvalidRecipe { .. })
        ));

        let recipe = ImageRecipe::default().with_port(0);
        assert!(recipe.validate().is_err());

        let recipe = ImageRecipe::default().with_worker_threads(0);
        assert!(recipe.validate().is_err());

        let mut recipe = ImageRecipe::default();
        recipe.bin_member = "nonexistent".to_string();
        assert!(recipe.validate().is_err());
    }

    #[test]
    fn test_recipe_serializes_as_data() {
        let recipe = ImageRecipe::default();
        let value = serde_json::to_value(&recipe).unwrap();
        assert_eq!(value["builder_image"], "rust:1.85-slim");
        assert_eq!(value["binary"], "menu-search");
        assert_eq!(value["port"], 8080);
    }

    #[test]
    fn test_checked_in_dockerfile_matches_default_recipe() {
        let checked_in = include_str!("../../Dockerfile");
        assert_eq!(
            checked_in,
            ImageRecipe::default().render(),
            "Dockerfile is stale, regenerate it with: menu-search image --output Dockerfile"
        );
    }
}
