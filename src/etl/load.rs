/// Load Module
///
/// Executes resolved statement invocations against the warehouse.
use crate::db::statements::{Invocation, StatementCatalog};
use crate::db::warehouse::Warehouse;
use crate::error::EtlError;

/// Execute invocations in order, stopping at the first failure
///
/// Runs inside the caller's open transaction; committing is the caller's job.
/// Returns the number of statements executed.
pub async fn execute_invocations<W: Warehouse>(
    warehouse: &mut W,
    catalog: &StatementCatalog,
    invocations: &[Invocation],
) -> Result<usize, EtlError> {
    let mut executed = 0;

    for invocation in invocations {
        let (sql, params) = invocation.resolve(catalog)?;
        warehouse.execute(sql, &params).await?;

        tracing::debug!("Executed {}", invocation.kind);
        executed += 1;
    }

    Ok(executed)
}
