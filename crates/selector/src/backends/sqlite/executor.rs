//! SQLite statement executor.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

use crate::config::humantime_serde;
use crate::core::{Row, RowSet, StatementExecutor};
use crate::error::{ExecutionError, SchemaError, SelectorResult};
use crate::query::{Column, SqlParam, Statement};
use crate::schema::SchemaRegistry;
use crate::types::Scalar;

use super::schema;

/// Configuration for the SQLite executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqliteExecutorConfig {
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// How long to wait for a pooled connection.
    #[serde(default = "default_connection_timeout", with = "humantime_serde")]
    pub connection_timeout: Duration,

    /// SQLite busy timeout.
    #[serde(default = "default_busy_timeout", with = "humantime_serde")]
    pub busy_timeout: Duration,

    /// Enable foreign key constraints.
    #[serde(default = "default_true")]
    pub enable_foreign_keys: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_busy_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_true() -> bool {
    true
}

impl Default for SqliteExecutorConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout: default_connection_timeout(),
            busy_timeout: default_busy_timeout(),
            enable_foreign_keys: true,
        }
    }
}

impl SqliteExecutorConfig {
    /// Loads configuration from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(json).map_err(|e| SchemaError::InvalidDocument {
            message: e.to_string(),
        })
    }
}

/// Runs rendered statements on a pooled SQLite database.
pub struct SqliteExecutor {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteExecutorConfig,
    is_memory: bool,
}

impl Debug for SqliteExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteExecutor")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

impl SqliteExecutor {
    /// Creates an executor over a private in-memory database.
    pub fn in_memory() -> SelectorResult<Self> {
        Self::with_config(":memory:", SqliteExecutorConfig::default())
    }

    /// Opens or creates a file-based database.
    pub fn open<P: AsRef<Path>>(path: P) -> SelectorResult<Self> {
        Self::with_config(path, SqliteExecutorConfig::default())
    }

    /// Creates an executor with custom configuration.
    pub fn with_config<P: AsRef<Path>>(path: P, config: SqliteExecutorConfig) -> SelectorResult<Self> {
        let is_memory = path.as_ref().to_string_lossy() == ":memory:";

        let busy_timeout = config.busy_timeout;
        let enable_foreign_keys = config.enable_foreign_keys;
        let manager = if is_memory {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(path.as_ref())
        }
        .with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if enable_foreign_keys {
                conn.execute_batch("PRAGMA foreign_keys = ON")?;
            }
            Ok(())
        });

        // every in-memory connection is its own database: keep exactly one alive
        let builder = if is_memory {
            Pool::builder()
                .max_size(1)
                .min_idle(Some(1))
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            Pool::builder()
                .max_size(config.max_connections)
                .min_idle(Some(config.min_connections))
        };

        let pool = builder
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| ExecutionError::ConnectionFailed {
                message: e.to_string(),
            })?;

        tracing::debug!(is_memory, "opened sqlite executor");

        Ok(Self {
            pool,
            config,
            is_memory,
        })
    }

    /// Gets a connection from the pool, e.g. to load data.
    pub fn connection(&self) -> SelectorResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            ExecutionError::ConnectionFailed {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Creates the core tables and one table per registered field.
    pub fn install_schema(&self, registry: &SchemaRegistry) -> SelectorResult<()> {
        let conn = self.connection()?;
        schema::install(&conn, registry)
    }

    /// Checks that every registered field's table has the columns its type
    /// declares.
    pub fn verify_schema(&self, registry: &SchemaRegistry) -> SelectorResult<()> {
        let conn = self.connection()?;
        for field in registry.fields() {
            schema::verify_field_table(&conn, field)?;
        }
        Ok(())
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Returns the executor configuration.
    pub fn config(&self) -> &SqliteExecutorConfig {
        &self.config
    }
}

fn bind_params(params: &[SqlParam]) -> Vec<Box<dyn ToSql>> {
    let mut bound: Vec<Box<dyn ToSql>> = Vec::with_capacity(params.len());
    for SqlParam(value) in params {
        match value {
            Scalar::Text(s) => bound.push(Box::new(s.clone())),
            Scalar::Integer(i) => bound.push(Box::new(*i)),
            Scalar::Float(f) => bound.push(Box::new(*f)),
            Scalar::Null => bound.push(Box::new(Option::<String>::None)),
        }
    }
    bound
}

fn query_failed(statement: &Statement) -> impl Fn(rusqlite::Error) -> ExecutionError + '_ {
    move |e| ExecutionError::QueryFailed {
        message: e.to_string(),
        sql: statement.sql.clone(),
    }
}

fn decode_failed(statement: &Statement) -> impl Fn(rusqlite::Error) -> ExecutionError + '_ {
    move |e| ExecutionError::RowDecode {
        message: e.to_string(),
        sql: statement.sql.clone(),
    }
}

impl StatementExecutor for SqliteExecutor {
    fn select(&self, statement: &Statement) -> SelectorResult<RowSet> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&statement.sql).map_err(query_failed(statement))?;

        let bound = bind_params(&statement.params);
        let param_refs: Vec<&dyn ToSql> = bound.iter().map(|p| p.as_ref()).collect();
        let mut rows = stmt
            .query(param_refs.as_slice())
            .map_err(query_failed(statement))?;

        let decode = decode_failed(statement);
        let mut set = RowSet::default();
        while let Some(row) = rows.next().map_err(query_failed(statement))? {
            let mut decoded = Row::default();
            for (i, column) in statement.columns.iter().enumerate() {
                match column {
                    Column::Id => decoded.id = row.get(i).map_err(&decode)?,
                    Column::ParentId => decoded.parent_id = row.get(i).map_err(&decode)?,
                    Column::TemplatesId => decoded.templates_id = row.get(i).map_err(&decode)?,
                    Column::Score => decoded.score = row.get(i).map_err(&decode)?,
                    Column::FoundRows => {
                        let found: i64 = row.get(i).map_err(&decode)?;
                        set.found_rows = Some(u64::try_from(found).unwrap_or_default());
                    }
                    Column::Other => {}
                }
            }
            set.rows.push(decoded);
        }
        Ok(set)
    }

    fn count(&self, statement: &Statement) -> SelectorResult<u64> {
        let conn = self.connection()?;
        let bound = bind_params(&statement.params);
        let param_refs: Vec<&dyn ToSql> = bound.iter().map(|p| p.as_ref()).collect();
        let total: i64 = conn
            .query_row(&statement.sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(query_failed(statement))?;
        Ok(u64::try_from(total).unwrap_or_default())
    }
}
