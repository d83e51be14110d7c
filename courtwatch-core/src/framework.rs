use sqlx::PgPool;

/// Executes the query structs in [`crate::entities`] against the pool.
///
/// Each query is a plain struct with a `kanau::processor::Processor` impl
/// on this type, so call sites read as `db.process(Query { .. }).await`.
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}
