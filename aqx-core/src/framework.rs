use sqlx::PgPool;

/// Executes database operations.
///
/// Each operation is a request type with a
/// [`kanau::processor::Processor`] impl for this struct, e.g.
/// [`InsertStoreRow`](crate::sinks::postgres::InsertStoreRow).
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}
