use std::future::Future;
use std::time::Duration;

use crate::error::{Result, WorkflowError};

/// Deadline applied when the caller does not configure one.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// Runs `fut` to completion or fails with `DeadlineExceeded`.
///
/// Ledger writes that committed before the deadline fired are kept.
pub(crate) async fn within<T>(
    operation: &'static str,
    deadline: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            metrics::counter!("workflow_deadline_exceeded_total", "operation" => operation)
                .increment(1);
            tracing::warn!(operation, ?deadline, "deadline exceeded");
            Err(WorkflowError::DeadlineExceeded {
                operation,
                deadline,
            })
        }
    }
}
