//! PostgreSQL-backed [`Store`].

use super::{Store, StoreError, StoreRow, StoreValue};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use compact_str::CompactString;
use kanau::processor::Processor;
use sqlx::{PgPool, Postgres, QueryBuilder};

#[derive(Debug, Clone)]
/// Insert one row into a table.
///
/// Re-delivered events hit the table's primary key and are ignored, so the
/// insert is idempotent. Returns whether a row was written.
pub struct InsertStoreRow {
    pub table: CompactString,
    pub row: StoreRow,
}

impl Processor<InsertStoreRow> for DatabaseProcessor {
    type Output = bool;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertStoreRow", fields(table = %insert.table))]
    async fn process(&self, insert: InsertStoreRow) -> Result<bool, StoreError> {
        let mut query_builder = build_insert(&insert.table, insert.row)?;
        let result = query_builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

fn build_insert(table: &str, row: StoreRow) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    if row.is_empty() {
        return Err(StoreError::EmptyRow);
    }
    check_identifier(table)?;
    for (column, _) in row.columns() {
        check_identifier(column)?;
    }

    let mut query_builder = QueryBuilder::new(format!("INSERT INTO {table} ("));
    let mut columns = query_builder.separated(", ");
    for (column, _) in row.columns() {
        columns.push(column.as_str());
    }
    query_builder.push(") VALUES (");

    let mut values = query_builder.separated(", ");
    for (_, value) in row {
        match value {
            StoreValue::Text(text) => values.push_bind(text),
            StoreValue::BigInt(number) => values.push_bind(number),
        };
    }
    query_builder.push(") ON CONFLICT DO NOTHING");
    Ok(query_builder)
}

/// Table and column names are spliced into SQL, so only plain lowercase
/// identifiers are accepted.
fn check_identifier(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.into()))
    }
}

/// [`Store`] writing through a shared connection pool.
pub struct PgStore {
    db: DatabaseProcessor,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            db: DatabaseProcessor { pool },
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert(&self, table: &str, row: StoreRow) -> Result<(), StoreError> {
        let written = self
            .db
            .process(InsertStoreRow {
                table: table.into(),
                row,
            })
            .await?;
        if !written {
            tracing::debug!(table, "Row already present, skipped");
        }
        Ok(())
    }
}
