//! Error types
//!
//! Two classes of failure exist. Recoverable ones ([`DisplayError`]) are
//! returned to the caller, which aborts at most the affected session.
//! Broken caller contracts go through [`contract_violation`], which logs
//! and panics: continuing would risk corrupting a shared buffer.

use thiserror::Error;

use crate::layer::LayerId;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("failed to allocate {bytes} bytes")]
    Allocation { bytes: usize },

    #[error("unknown layer {0}")]
    UnknownLayer(LayerId),

    #[error("no layer ids left")]
    LayerIdsExhausted,

    #[error("the default layer cannot be removed")]
    DefaultLayer,

    #[error("invalid display dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("client channel error: {0}")]
    Channel(String),
}

pub type Result<T, E = DisplayError> = std::result::Result<T, E>;

/// Abort the current session because a cooperating caller broke the
/// paint/resize protocol.
#[track_caller]
#[cold]
pub fn contract_violation(what: &str) -> ! {
    let location = std::panic::Location::caller();
    tracing::error!(%location, "display contract violated: {}", what);
    panic!("display contract violated: {what}");
}
