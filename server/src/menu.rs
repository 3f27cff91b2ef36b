use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum MenuSourceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed record on line {line}: {message}")]
    MalformedRecord { line: usize, message: String },

    #[error("Unsupported menu source '{requested}', expected one of: sqlite, jsonl")]
    UnsupportedSource { requested: String },
}

pub type MenuResult<T> = Result<T, MenuSourceError>;

/// A place menu item names can be read from ahead of migration. Names are
/// returned deduplicated, with blank entries dropped.
pub trait MenuSource: Send {
    fn distinct_item_names(&self) -> MenuResult<Vec<String>>;

    /// Short label for logs and the migration report.
    fn source_name(&self) -> &'static str;
}

/// Reads item names from a SQLite database with a `menu_items` table.
pub struct SqliteMenuSource {
    path: PathBuf,
}

impl SqliteMenuSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MenuSource for SqliteMenuSource {
    fn distinct_item_names(&self) -> MenuResult<Vec<String>> {
        debug!("Opening menu database at {}", self.path.display());
        let conn = rusqlite::Connection::open(&self.path)?;
        let mut stmt = conn.prepare("SELECT DISTINCT item_name FROM menu_items")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<String>, rusqlite::Error>>()?;

        Ok(names
            .into_iter()
            .filter(|name| !name.trim().is_empty())
            .collect())
    }

    fn source_name(&self) -> &'static str {
        "sqlite"
    }
}

#[derive(Debug, Deserialize)]
struct MenuRecord {
    item_name: String,
}

/// Reads item names from a JSON Lines file, one `{"item_name": ...}` object
/// per line. Duplicates keep their first position.
pub struct JsonlMenuSource {
    path: PathBuf,
}

impl JsonlMenuSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MenuSource for JsonlMenuSource {
    fn distinct_item_names(&self) -> MenuResult<Vec<String>> {
        debug!("Reading menu file at {}", self.path.display());
        let contents = std::fs::read_to_string(&self.path)?;

        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: MenuRecord = serde_json::from_str(line).map_err(|e| {
                MenuSourceError::MalformedRecord {
                    line: index + 1,
                    message: e.to_string(),
                }
            })?;
            let name = record.item_name.trim().to_string();
            if name.is_empty() {
                continue;
            }
            if seen.insert(name.clone()) {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn source_name(&self) -> &'static str {
        "jsonl"
    }
}

/// Select a menu source by its type name, as configured via `MENU_SOURCE`.
pub fn menu_source_for(
    kind: &str,
    db_path: &Path,
    file_path: &Path,
) -> MenuResult<Box<dyn MenuSource>> {
    match kind.to_ascii_lowercase().as_str() {
        "sqlite" => Ok(Box::new(SqliteMenuSource::new(db_path))),
        "jsonl" => Ok(Box::new(JsonlMenuSource::new(file_path))),
        other => Err(MenuSourceError::UnsupportedSource {
            requested: other.to_string(),
        }),
    }
}
