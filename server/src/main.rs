use clap::{Parser, Subcommand};
use image_builder::{build_image, detect_runtime, ImageRecipe};
use server::config::Settings;
use server::menu::menu_source_for;
use server::migrate::Migrator;
use server::search::SearchService;
use server::web::{self, AppState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "menu-search")]
#[command(about = "Semantic menu search service with Qdrant-backed retrieval")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web server
    Serve {
        /// Listen port (overrides the PORT environment variable)
        #[arg(short, long)]
        port: Option<u16>,

        /// Worker threads for the request runtime
        #[arg(long)]
        threads: Option<usize>,

        /// Per-request timeout in seconds, 0 disables it
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Rebuild the vector collection from the configured menu source
    Migrate {
        /// Menu source type: sqlite or jsonl
        #[arg(long)]
        source: Option<String>,

        /// Target collection (defaults to the provider's collection)
        #[arg(long)]
        collection: Option<String>,

        /// How many names to embed and upload per request
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Check connectivity to the embedding provider and Qdrant
    Health,

    /// Render the deployment Dockerfile, optionally building and running it
    Image {
        /// Write the Dockerfile to this path instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Build the image with the detected container runtime
        #[arg(long)]
        build: bool,

        /// Image tag used when building
        #[arg(long, default_value = "menu-search:latest")]
        tag: String,

        /// Start the built image, publishing this port and setting PORT
        #[arg(long)]
        run_port: Option<u16>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            threads,
            timeout_secs,
        } => {
            let mut settings = Settings::load()?;
            if let Some(port) = port {
                settings.port = port;
            }
            if let Some(threads) = threads {
                settings.worker_threads = threads;
            }
            if let Some(timeout) = timeout_secs {
                settings.request_timeout_secs = timeout;
            }
            settings.validate()?;

            // One process per container; concurrency comes from the worker
            // thread pool, so the runtime is built by hand.
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(settings.worker_threads)
                .enable_all()
                .build()?;
            runtime.block_on(run_serve(settings))?;
        }
        Commands::Migrate {
            source,
            collection,
            batch_size,
        } => {
            let mut settings = Settings::load()?;
            if let Some(source) = source {
                settings.menu_source = source;
            }
            if let Some(collection) = collection {
                settings.collection_name = collection;
            }
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run_migrate(settings, batch_size))?;
        }
        Commands::Health => {
            let settings = Settings::load()?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run_health(settings))?;
        }
        Commands::Image {
            output,
            build,
            tag,
            run_port,
        } => {
            run_image_command(output, build, tag, run_port)?;
        }
    }

    Ok(())
}

async fn run_serve(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Starting menu-search on port {} with {} worker thread(s)",
        settings.port, settings.worker_threads
    );
    match settings.request_timeout() {
        Some(timeout) => info!("Per-request timeout: {timeout:?}"),
        None => info!("Per-request timeout: disabled"),
    }

    let service = SearchService::from_settings(&settings);
    let state = Arc::new(AppState {
        service,
        request_timeout: settings.request_timeout(),
    });
    web::serve(state, settings.port).await?;
    Ok(())
}

async fn run_migrate(
    settings: Settings,
    batch_size: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = menu_source_for(
        &settings.menu_source,
        &settings.menu_db_path,
        &settings.menu_file_path,
    )?;

    let mut migrator = Migrator::from_settings(&settings)?;
    if let Some(batch_size) = batch_size {
        migrator = migrator.with_batch_size(batch_size);
    }
    let report = migrator.run(source.as_ref()).await?;

    println!("Migration report:");
    println!("  source:         {}", report.source);
    println!("  collection:     {}", report.collection);
    println!("  items found:    {}", report.items_found);
    println!("  items migrated: {}", report.items_migrated);
    if let Some(size) = report.vector_size {
        println!("  vector size:    {size}");
    }
    println!(
        "  duration:       {}ms",
        (report.finished_at - report.started_at).num_milliseconds()
    );
    Ok(())
}

async fn run_health(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let mut failures = 0;

    match settings.embedding_provider() {
        Some(provider) => match provider.health_check().await {
            Ok(()) => println!(
                "✓ Embedding provider '{}' is reachable",
                provider.provider_name()
            ),
            Err(e) => {
                println!(
                    "✗ Embedding provider '{}' failed: {e}",
                    provider.provider_name()
                );
                failures += 1;
            }
        },
        None => println!("- Embedding provider is not configured"),
    }

    match settings.qdrant_client() {
        Some(client) => match client.health_check().await {
            Ok(()) => {
                println!("✓ Qdrant at {} is ready", client.url());
                match client.collection_info(&settings.collection_name).await {
                    Ok(info) => println!(
                        "✓ Collection '{}' holds {} point(s)",
                        settings.collection_name, info.points_count
                    ),
                    Err(e) => println!(
                        "- Collection '{}' is not readable yet: {e}",
                        settings.collection_name
                    ),
                }
            }
            Err(e) => {
                println!("✗ Qdrant at {} failed: {e}", client.url());
                failures += 1;
            }
        },
        None => println!("- Qdrant is not configured"),
    }

    if failures > 0 {
        return Err(format!("{failures} health check(s) failed").into());
    }
    Ok(())
}

fn run_image_command(
    output: Option<PathBuf>,
    build: bool,
    tag: String,
    run_port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let recipe = ImageRecipe::default();
    let dockerfile = recipe.render();

    match &output {
        Some(path) => {
            std::fs::write(path, &dockerfile)?;
            println!("Wrote Dockerfile to {}", path.display());
        }
        None if !build && run_port.is_none() => print!("{dockerfile}"),
        None => {}
    }

    if build || run_port.is_some() {
        let runtime = detect_runtime();
        if build {
            build_image(&runtime, Path::new("."), &tag)?;
            println!("Built image {tag}");
        }
        if let Some(port) = run_port {
            let container_id = image_builder::run_image(&runtime, &tag, port)?;
            println!("Started container {container_id} publishing port {port}");
        }
    }
    Ok(())
}
