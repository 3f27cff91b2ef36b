pub mod config;
pub mod menu;
pub mod migrate;
pub mod qdrant;
pub mod search;
pub mod web;

pub use config::{ProviderKind, Settings, SettingsError};
pub use menu::{menu_source_for, JsonlMenuSource, MenuSource, MenuSourceError, SqliteMenuSource};
pub use migrate::{MigrateError, MigrationReport, Migrator};
pub use qdrant::{
    CollectionInfo, Distance, Point, QdrantClient, QdrantConfig, QdrantError, ScoredPoint,
};
pub use search::{MenuHit, SearchLog, SearchOutcome, SearchResponse, SearchService};
pub use web::{AppState, SharedState};
