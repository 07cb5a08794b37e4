//! Configuration
//!
//! Settings are layered with figment: built-in defaults, then the TOML
//! configuration file, then `NOTESRV_`-prefixed environment variables
//! (`__` separates nested keys, e.g. `NOTESRV_DATABASE__MODE=memory`).
//!
//! ```toml
//! address = "127.0.0.1"
//! port = 8000
//! prune_interval_secs = 360
//! static_dir = "./dist"
//!
//! [database]
//! mode = "sqlite"
//! path = "notes.db"
//! pool_size = 8
//! ```
//!
//! A PostgreSQL database is selected with
//!
//! ```toml
//! [database]
//! mode = "postgresql"
//! database = "notes"
//! username = "notesrv"
//! password = "secret"
//! host = "127.0.0.1"
//! port = 5432
//! ```

use crate::notes::DEFAULT_PRUNE_INTERVAL;
use crate::storage::{MemoryStore, NoteStore, PostgresStore, SqliteStore, StoreResult};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_CONFIG_FILE: &str = "notesrv.toml";
pub const APP_CONFIG_ENV_PREFIX: &str = "NOTESRV_";
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_DATABASE_PATH: &str = "notes.db";
pub const DEFAULT_POOL_SIZE: u32 = 8;
pub const DEFAULT_POSTGRES_HOST: &str = "127.0.0.1";
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Figment(#[from] figment::Error),

    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which [`NoteStore`] backend to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DatabaseConfig {
    /// A SQLite database file
    Sqlite {
        path: PathBuf,
        #[serde(default = "default_pool_size")]
        pool_size: u32,
    },
    /// A PostgreSQL server
    Postgresql {
        database: String,
        username: String,
        /// Empty means no password
        #[serde(default)]
        password: String,
        #[serde(default = "default_postgres_host")]
        host: String,
        #[serde(default = "default_postgres_port")]
        port: u16,
        #[serde(default = "default_pool_size")]
        pool_size: u32,
    },
    /// An in-process store; notes are lost on restart
    Memory,
}

fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

fn default_postgres_host() -> String {
    DEFAULT_POSTGRES_HOST.to_string()
}

fn default_postgres_port() -> u16 {
    DEFAULT_POSTGRES_PORT
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig::Sqlite {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl DatabaseConfig {
    /// Builds the configured backend and makes sure its schema exists.
    ///
    /// The PostgreSQL backend needs a Tokio runtime and must not be opened
    /// from async code directly; call this through `spawn_blocking`.
    pub fn open_store(&self) -> StoreResult<Arc<dyn NoteStore>> {
        let store: Arc<dyn NoteStore> = match self {
            DatabaseConfig::Sqlite { path, pool_size } => {
                info!(path = %path.display(), pool_size, "Using SQLite note store");
                Arc::new(SqliteStore::open(path, *pool_size)?)
            }
            DatabaseConfig::Postgresql {
                database,
                username,
                password,
                host,
                port,
                pool_size,
            } => {
                info!(%host, port, %database, pool_size, "Using PostgreSQL note store");
                let mut options = PgConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .username(username)
                    .database(database);
                if !password.is_empty() {
                    options = options.password(password);
                }
                Arc::new(PostgresStore::connect(options, *pool_size)?)
            }
            DatabaseConfig::Memory => {
                info!("Using in-memory note store");
                Arc::new(MemoryStore::new())
            }
        };
        store.ensure_schema()?;
        Ok(store)
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub address: String,
    pub port: u16,
    pub prune_interval_secs: u64,
    /// Front-end assets served at `/`, if any
    pub static_dir: Option<PathBuf>,
    pub database: DatabaseConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            prune_interval_secs: DEFAULT_PRUNE_INTERVAL.as_secs(),
            static_dir: None,
            database: DatabaseConfig::default(),
        }
    }
}

impl AppConfig {
    /// The layered configuration sources for `config_file`.
    pub fn figment(config_file: impl AsRef<Path>) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file_exact(config_file.as_ref()))
            .merge(Env::prefixed(APP_CONFIG_ENV_PREFIX).split("__"))
    }

    pub fn load(config_file: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::figment(config_file).extract()?)
    }

    /// Writes the default configuration to `path`.
    pub fn write_default(path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(&AppConfig::default())?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs.max(1))
    }
}
