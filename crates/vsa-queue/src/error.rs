//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue is full ({capacity} jobs waiting)")]
    Full { capacity: usize },

    #[error("Queue is closed")]
    Closed,
}

impl QueueError {
    /// Whether the caller may try again later.
    pub fn is_backpressure(&self) -> bool {
        matches!(self, QueueError::Full { .. })
    }
}
