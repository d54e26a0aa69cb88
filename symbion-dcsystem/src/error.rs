use thiserror::Error;

/// Failures reported by a [`Publisher`](crate::publish::Publisher) implementation.
///
/// The aggregation itself never fails; only handing values to the bus can.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publisher channel closed")]
    Closed,
    #[error("failed to encode {field}: {reason}")]
    Encode { field: String, reason: String },
    #[error("bus rejected {field}: {reason}")]
    Rejected { field: String, reason: String },
}
