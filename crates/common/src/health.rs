use async_trait::async_trait;

use crate::error::AppError;
use crate::types::QueueStatus;

/// Answers whether the consumed queue is reachable.
///
/// Implementations must not create the queue or consume from it.
#[async_trait]
pub trait QueueProbe: Send + Sync {
    /// `Ok(QueueStatus::Up)` when the queue exists; an error means it is down.
    async fn is_queue_ok(&self) -> Result<QueueStatus, AppError>;
}
