use thiserror::Error;

/// Errors that can occur when building or using a presence map
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PresenceError {
    /// The segment count does not evenly partition the ordinal space
    #[error(
        "invalid segment count {0}: must be a power of two between 1 and {max}",
        max = crate::MAX_SEGMENTS
    )]
    InvalidSegmentCount(u32),

    /// The map's storage has already been released
    #[error("presence map has been released")]
    Released,
}

/// A specialized Result type for presence map operations
pub type Result<T> = std::result::Result<T, PresenceError>;
