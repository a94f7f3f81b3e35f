//! Command-line configuration.
//!
//! Every option can also be given through an environment variable.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `FIELDGATE_BACKEND` | document | `document`, `tabular` or `graph` |
//! | `FIELDGATE_DATABASE` | :memory: | SQLite path for the tabular store |
//! | `FIELDGATE_MONGODB_URI` | | MongoDB connection string for the document store |
//! | `FIELDGATE_NEO4J_URI` | bolt://localhost:7687 | Bolt URI for the graph store |
//! | `FIELDGATE_NEO4J_USER` | neo4j | User for the graph store |
//! | `FIELDGATE_NEO4J_PASSWORD` | | Password for the graph store |
//! | `FIELDGATE_LABEL` | Employee | Node label for the graph store |
//! | `FIELDGATE_TABLE` | employees | Table name for the tabular store |
//! | `FIELDGATE_DOCUMENT_DATABASE` | company | Database name for the document store |
//! | `FIELDGATE_COLLECTION` | employees | Collection name for the document store |
//! | `FIELDGATE_INDEXED_COLUMNS` | name,salary,department | Columns indexed in the tabular store |
//! | `FIELDGATE_ALLOW_FULL_SCAN` | false | Permit unindexed predicates |
//! | `FIELDGATE_MAX_INPUT_LENGTH` | 256 | Longest accepted query value |
//! | `FIELDGATE_QUERY_TIMEOUT_MS` | 10000 | Per-call backend timeout |
//! | `FIELDGATE_SEED` | | JSON array of records to load first |
//! | `FIELDGATE_ROLE` | | Role of the caller |
//! | `FIELDGATE_LOG_LEVEL` | info | Log level |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use fieldgate::backends::BackendSelection;
use fieldgate::backends::document::DocumentStoreConfig;
#[cfg(feature = "neo4j")]
use fieldgate::backends::graph::GraphStoreConfig;
#[cfg(feature = "sqlite")]
use fieldgate::backends::tabular::TabularStoreConfig;

/// Which adapter serves the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// Flexible-schema document store.
    Document,
    /// Fixed-schema tabular store.
    Tabular,
    /// Property graph store.
    Graph,
}

impl FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "document" | "mongodb" => Ok(BackendMode::Document),
            "tabular" | "sqlite" => Ok(BackendMode::Tabular),
            "graph" | "neo4j" => Ok(BackendMode::Graph),
            other => Err(format!(
                "unknown backend '{}', expected 'document', 'tabular' or 'graph'",
                other
            )),
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Document => write!(f, "document"),
            BackendMode::Tabular => write!(f, "tabular"),
            BackendMode::Graph => write!(f, "graph"),
        }
    }
}

/// Runs one access-controlled field query and prints the visible fields.
#[derive(Debug, Clone, Parser)]
#[command(name = "fieldgate")]
#[command(about = "Field-level access-controlled record lookup")]
pub struct GatewayCliConfig {
    /// Backend to query (document, tabular, graph).
    #[arg(long, env = "FIELDGATE_BACKEND", default_value = "document")]
    pub backend: String,

    /// SQLite database path for the tabular store.
    #[arg(long, env = "FIELDGATE_DATABASE", default_value = ":memory:")]
    pub database: String,

    /// MongoDB connection string. Without it the document store runs
    /// in-process.
    #[arg(long, env = "FIELDGATE_MONGODB_URI")]
    pub mongodb_uri: Option<String>,

    /// Bolt URI for the graph store.
    #[arg(long, env = "FIELDGATE_NEO4J_URI", default_value = "bolt://localhost:7687")]
    pub neo4j_uri: String,

    /// User for the graph store.
    #[arg(long, env = "FIELDGATE_NEO4J_USER", default_value = "neo4j")]
    pub neo4j_user: String,

    /// Password for the graph store.
    #[arg(long, env = "FIELDGATE_NEO4J_PASSWORD", default_value = "", hide_env_values = true)]
    pub neo4j_password: String,

    /// Node label for the graph store.
    #[arg(long, env = "FIELDGATE_LABEL", default_value = "Employee")]
    pub label: String,

    /// Table name for the tabular store.
    #[arg(long, env = "FIELDGATE_TABLE", default_value = "employees")]
    pub table: String,

    /// Database name for the document store.
    #[arg(long, env = "FIELDGATE_DOCUMENT_DATABASE", default_value = "company")]
    pub document_database: String,

    /// Collection name for the document store.
    #[arg(long, env = "FIELDGATE_COLLECTION", default_value = "employees")]
    pub collection: String,

    /// Columns to index in the tabular store.
    #[arg(
        long = "index",
        env = "FIELDGATE_INDEXED_COLUMNS",
        value_delimiter = ',',
        default_value = "name,salary,department"
    )]
    pub indexed_columns: Vec<String>,

    /// Permit predicates on unindexed columns.
    #[arg(long, env = "FIELDGATE_ALLOW_FULL_SCAN", default_value = "false")]
    pub allow_full_scan: bool,

    /// Longest accepted query value, in characters.
    #[arg(long, env = "FIELDGATE_MAX_INPUT_LENGTH", default_value = "256")]
    pub max_input_length: usize,

    /// Per-call backend timeout in milliseconds.
    #[arg(long, env = "FIELDGATE_QUERY_TIMEOUT_MS", default_value = "10000")]
    pub query_timeout_ms: u64,

    /// JSON file holding an array of records to load before querying.
    #[arg(long, env = "FIELDGATE_SEED")]
    pub seed: Option<PathBuf>,

    /// Role of the caller.
    #[arg(long, env = "FIELDGATE_ROLE")]
    pub role: String,

    /// Field to match on.
    #[arg(long)]
    pub field: String,

    /// Value the field must equal.
    #[arg(long)]
    pub value: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "FIELDGATE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl GatewayCliConfig {
    /// Returns the parsed backend mode.
    pub fn backend_mode(&self) -> Result<BackendMode, String> {
        self.backend.parse()
    }

    /// Builds the library backend selection from the flags.
    pub fn selection(&self) -> Result<BackendSelection, String> {
        match self.backend_mode()? {
            BackendMode::Document => {
                let mut config = DocumentStoreConfig::default()
                    .with_collection(&self.document_database, &self.collection)
                    .with_query_timeout_ms(self.query_timeout_ms);
                config.mongodb_uri = self.mongodb_uri.clone();
                Ok(BackendSelection::Document(config))
            }
            #[cfg(feature = "sqlite")]
            BackendMode::Tabular => {
                let mut config = TabularStoreConfig::new(&self.database)
                    .with_table(&self.table)
                    .with_full_scan(self.allow_full_scan)
                    .with_query_timeout_ms(self.query_timeout_ms);
                for column in &self.indexed_columns {
                    config = config.with_index(column);
                }
                Ok(BackendSelection::Tabular(config))
            }
            #[cfg(not(feature = "sqlite"))]
            BackendMode::Tabular => Err(
                "the tabular backend requires the 'sqlite' feature. \
                 Build with: cargo build -p fieldgate-cli --features sqlite"
                    .to_string(),
            ),
            #[cfg(feature = "neo4j")]
            BackendMode::Graph => Ok(BackendSelection::Graph(
                GraphStoreConfig::new(&self.neo4j_uri, &self.neo4j_user, &self.neo4j_password)
                    .with_label(&self.label)
                    .with_query_timeout_ms(self.query_timeout_ms),
            )),
            #[cfg(not(feature = "neo4j"))]
            BackendMode::Graph => Err(
                "the graph backend requires the 'neo4j' feature. \
                 Build with: cargo build -p fieldgate-cli --features neo4j"
                    .to_string(),
            ),
        }
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.backend_mode() {
            errors.push(e);
        }

        if self.max_input_length == 0 {
            errors.push("Max input length cannot be 0".to_string());
        }

        if self.query_timeout_ms == 0 {
            errors.push("Query timeout cannot be 0".to_string());
        }

        if self.role.trim().is_empty() {
            errors.push("Role cannot be empty".to_string());
        }

        if self.mongodb_uri.is_some()
            && matches!(
                self.backend_mode(),
                Ok(BackendMode::Tabular | BackendMode::Graph)
            )
        {
            errors.push("--mongodb-uri only applies to the document backend".to_string());
        }

        if self.allow_full_scan
            && matches!(
                self.backend_mode(),
                Ok(BackendMode::Document | BackendMode::Graph)
            )
        {
            errors.push("--allow-full-scan only applies to the tabular backend".to_string());
        }

        if let Some(seed) = &self.seed
            && !seed.is_file()
        {
            errors.push(format!("Seed file not found: {}", seed.display()));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
