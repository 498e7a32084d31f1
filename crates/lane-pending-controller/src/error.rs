use thiserror::Error;

use crate::types::LaneHandle;

/// Error taxonomy for the lane pending controller.
///
/// Every public operation in this crate returns `Result<_, CoreError>`.
/// Variants map 1:1 onto the failure categories a caller needs to branch
/// on; anything that doesn't fit cleanly collapses into `InvalidParam`
/// with a descriptive message rather than growing the enum further.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Allocation failure. Unreachable in practice: the global allocator
    /// aborts the process rather than returning an error for `Vec`/`String`
    /// growth, so nothing in this crate can actually construct this
    /// variant today. Kept for parity with the error categories a caller
    /// coming from a C-style deep-copy contract expects to see.
    #[error("allocation failed")]
    Oom,

    #[error("lock acquisition failed")]
    LockError,

    #[error("lane handle not found: {0:?}")]
    NotFound(LaneHandle),

    #[error("pending request timed out")]
    Timeout,

    #[error("lane manager rejected the request: {0}")]
    UpstreamLane(i32),

    #[error("channel open failed: {0}")]
    ChannelOpen(String),

    #[error("lane resource registry rejected the binding")]
    Registry,

    #[error("controller is shutting down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, CoreError>;
