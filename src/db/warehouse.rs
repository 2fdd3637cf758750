/// Warehouse Module
///
/// The connection handle the pipelines write through. Statements only run
/// inside an explicit per-file transaction.
use crate::db::statements::Param;
use crate::error::EtlError;
use sqlx::{
    postgres::{PgArguments, PgRow},
    query::Query,
    PgPool, Postgres, Row, Transaction,
};

/// Transactional statement sink backing the loaders
#[allow(async_fn_in_trait)]
pub trait Warehouse {
    /// Open the transaction for the next file
    async fn begin(&mut self) -> Result<(), EtlError>;

    /// Execute one statement, returning the affected row count
    async fn execute(&mut self, sql: &str, params: &[Param]) -> Result<u64, EtlError>;

    /// Run a select returning at most one `(text, text)` row
    async fn fetch_key_pair(&mut self, sql: &str, params: &[Param]) -> Result<Option<(String, String)>, EtlError>;

    async fn commit(&mut self) -> Result<(), EtlError>;

    async fn rollback(&mut self) -> Result<(), EtlError>;
}

/// PostgreSQL warehouse holding at most one open transaction
pub struct PgWarehouse {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgWarehouse {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, tx: None }
    }

    fn active(&mut self) -> Result<&mut Transaction<'static, Postgres>, EtlError> {
        self.tx.as_mut().ok_or(EtlError::NoActiveTransaction)
    }
}

impl Warehouse for PgWarehouse {
    async fn begin(&mut self) -> Result<(), EtlError> {
        if let Some(stale) = self.tx.take() {
            tracing::warn!("Rolling back a transaction left open by a previous file");
            stale.rollback().await?;
        }

        self.tx = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[Param]) -> Result<u64, EtlError> {
        let tx = self.active()?;

        let result = bind_params(sqlx::query(sql), params).execute(&mut **tx).await?;

        Ok(result.rows_affected())
    }

    async fn fetch_key_pair(&mut self, sql: &str, params: &[Param]) -> Result<Option<(String, String)>, EtlError> {
        let tx = self.active()?;

        let row: Option<PgRow> = bind_params(sqlx::query(sql), params).fetch_optional(&mut **tx).await?;

        match row {
            Some(row) => Ok(Some((row.try_get(0)?, row.try_get(1)?))),
            None => Ok(None),
        }
    }

    async fn commit(&mut self) -> Result<(), EtlError> {
        let tx = self.tx.take().ok_or(EtlError::NoActiveTransaction)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), EtlError> {
        // Nothing open means nothing to undo
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

/// Bind typed parameters in order; nulls keep their column type
fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [Param],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            Param::Text(value) => query.bind(value.as_deref()),
            Param::Int(value) => query.bind(*value),
            Param::Float(value) => query.bind(*value),
            Param::Timestamp(value) => query.bind(*value),
        };
    }
    query
}
