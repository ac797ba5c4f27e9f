//! Database-aware rules: `exists` and `uq`
//!
//! Both take a `table` or `table;column` param, the column defaulting to
//! `id`. A lookup that fails is reported as [`RuleError::Lookup`] rather
//! than folded into the rule's verdict.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{required_param, Rule};
use crate::errors::RuleError;
use crate::field::{value_text, FieldLevel};

/// Column used when the param names only a table
pub const DEFAULT_COLUMN: &str = "id";

lazy_static! {
    static ref IDENTIFIER: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").unwrap();
}

/// Answers whether a row with a given column value exists
#[async_trait]
pub trait RecordLookup: Send + Sync {
    async fn record_exists(&self, table: &str, column: &str, value: &str) -> Result<bool>;
}

/// Target of an `exists`/`uq` rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub table: String,
    pub column: String,
}

impl TableColumn {
    /// Parse `table` or `table;column`
    pub fn parse(param: &str) -> Result<Self, RuleError> {
        let (table, column) = match param.split_once(';') {
            Some((table, column)) => (table.trim(), column.trim()),
            None => (param.trim(), DEFAULT_COLUMN),
        };

        for ident in [table, column] {
            if !IDENTIFIER.is_match(ident) {
                return Err(RuleError::Misuse(format!(
                    "'{ident}' is not a valid table or column name"
                )));
            }
        }

        Ok(Self {
            table: table.to_string(),
            column: column.to_string(),
        })
    }

    /// Double-quoted identifiers, schema-qualified where given
    fn quoted(&self) -> (String, String) {
        let quote = |ident: &str| {
            ident
                .split('.')
                .map(|part| format!("\"{part}\""))
                .collect::<Vec<_>>()
                .join(".")
        };
        (quote(&self.table), quote(&self.column))
    }
}

/// Whether the rule wants the record present or absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Exists,
    Unique,
}

/// `exists` or `uq` bound to a lookup
pub struct RecordRule {
    lookup: Arc<dyn RecordLookup>,
    presence: Presence,
}

impl RecordRule {
    /// Passes when a matching row exists
    pub fn exists(lookup: Arc<dyn RecordLookup>) -> Self {
        Self {
            lookup,
            presence: Presence::Exists,
        }
    }

    /// Passes when no matching row exists
    pub fn unique(lookup: Arc<dyn RecordLookup>) -> Self {
        Self {
            lookup,
            presence: Presence::Unique,
        }
    }

    fn name(&self) -> &'static str {
        match self.presence {
            Presence::Exists => "exists",
            Presence::Unique => "uq",
        }
    }
}

#[async_trait]
impl Rule for RecordRule {
    async fn check(&self, field: &FieldLevel<'_>) -> Result<bool, RuleError> {
        let target = TableColumn::parse(required_param(field, self.name())?)?;
        let value = field.as_text();

        let found = self
            .lookup
            .record_exists(&target.table, &target.column, &value)
            .await
            .map_err(|e| {
                error!(
                    rule = self.name(),
                    table = %target.table,
                    column = %target.column,
                    "record lookup failed: {:#}",
                    e
                );
                RuleError::Lookup(format!("{:#}", e))
            })?;

        debug!(
            rule = self.name(),
            table = %target.table,
            column = %target.column,
            found,
            "record lookup"
        );

        Ok(match self.presence {
            Presence::Exists => found,
            Presence::Unique => !found,
        })
    }
}

/// How a lookup value is compared with a column of a known type
#[derive(Debug, Clone, PartialEq, Eq)]
enum ColumnMatch {
    /// Bind the value cast to `cast` so an index on the column applies
    Typed { cast: &'static str, value: String },
    /// The value cannot be stored in the column, so no row matches
    Never,
    /// Compare the column's text form
    Text,
}

impl ColumnMatch {
    fn for_column(column_type: &str, value: &str) -> Self {
        match column_type {
            "smallint" | "integer" | "bigint" => match value.parse::<i64>() {
                Ok(n) => ColumnMatch::Typed {
                    cast: "bigint",
                    value: n.to_string(),
                },
                Err(_) => ColumnMatch::Never,
            },
            "uuid" => match Uuid::parse_str(value) {
                Ok(id) => ColumnMatch::Typed {
                    cast: "uuid",
                    value: id.hyphenated().to_string(),
                },
                Err(_) => ColumnMatch::Never,
            },
            t if t == "text" || t.starts_with("character varying") => ColumnMatch::Typed {
                cast: "text",
                value: value.to_string(),
            },
            _ => ColumnMatch::Text,
        }
    }

    /// Query text and bound value; `None` when no query is needed
    fn sql(self, table: &str, column: &str, value: &str) -> Option<(String, String)> {
        match self {
            ColumnMatch::Typed { cast, value } => Some((
                format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {column} = $1::{cast})"),
                value,
            )),
            ColumnMatch::Never => None,
            ColumnMatch::Text => Some((
                format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {column}::text = $1)"),
                value.to_string(),
            )),
        }
    }
}

/// PostgreSQL-backed lookup
pub struct PgRecordLookup {
    pool: sqlx::PgPool,
    column_types: RwLock<HashMap<(String, String), String>>,
}

impl PgRecordLookup {
    /// Connect a new pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        info!("PostgreSQL record lookup connected");
        Ok(Self::from_pool(pool))
    }

    /// Reuse a pool the host application already owns
    pub fn from_pool(pool: sqlx::PgPool) -> Self {
        Self {
            pool,
            column_types: RwLock::new(HashMap::new()),
        }
    }

    /// Declared type of a column, read from the catalog once and cached
    async fn column_type(&self, table: &str, column: &str) -> Result<String> {
        let key = (table.to_string(), column.to_string());
        if let Some(column_type) = self.column_types.read().await.get(&key) {
            return Ok(column_type.clone());
        }

        let column_type: Option<String> = sqlx::query_scalar(
            "SELECT format_type(a.atttypid, a.atttypmod) FROM pg_attribute a \
             WHERE a.attrelid = $1::regclass AND a.attname = $2 \
             AND a.attnum > 0 AND NOT a.attisdropped",
        )
        .bind(table)
        .bind(column)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to read the type of {table}.{column}"))?;

        let column_type = column_type
            .with_context(|| format!("Column {column} does not exist on {table}"))?;
        debug!(table, column, column_type = %column_type, "cached column type");

        self.column_types
            .write()
            .await
            .insert(key, column_type.clone());
        Ok(column_type)
    }
}

#[async_trait]
impl RecordLookup for PgRecordLookup {
    async fn record_exists(&self, table: &str, column: &str, value: &str) -> Result<bool> {
        let target = TableColumn::parse(&format!("{table};{column}"))
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        let (quoted_table, quoted_column) = target.quoted();

        let column_type = self.column_type(&quoted_table, &target.column).await?;
        let Some((sql, bound)) =
            ColumnMatch::for_column(&column_type, value).sql(&quoted_table, &quoted_column, value)
        else {
            return Ok(false);
        };

        let exists: bool = sqlx::query_scalar(&sql)
            .bind(bound)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to query {quoted_table}.{quoted_column}"))?;

        Ok(exists)
    }
}

/// In-memory lookup for testing and development
#[derive(Default)]
pub struct InMemoryRecordLookup {
    tables: RwLock<HashMap<String, Vec<serde_json::Map<String, Value>>>>,
}

impl InMemoryRecordLookup {
    /// Empty lookup
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row; non-object values are ignored
    pub async fn insert(&self, table: &str, row: Value) {
        if let Value::Object(row) = row {
            let mut tables = self.tables.write().await;
            tables.entry(table.to_string()).or_default().push(row);
            debug!("Seeded row into {}", table);
        }
    }

    /// Drop every seeded row
    pub async fn clear(&self) {
        self.tables.write().await.clear();
    }
}

#[async_trait]
impl RecordLookup for InMemoryRecordLookup {
    async fn record_exists(&self, table: &str, column: &str, value: &str) -> Result<bool> {
        let tables = self.tables.read().await;
        let found = tables
            .get(table)
            .map(|rows| {
                rows.iter().any(|row| {
                    row.get(column)
                        .map(|cell| !cell.is_null() && value_text(cell) == value)
                        .unwrap_or(false)
                })
            })
            .unwrap_or(false);

        Ok(found)
    }
}
