//! Error types for the wire layer.

/// Errors that can occur while encoding or decoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// A write would run past the end of the fixed-size frame.
    #[error("frame overflow: wanted {wanted} bytes at offset {at}, frame is {len} bytes")]
    Overflow {
        /// Cursor position when the write was attempted.
        at: usize,
        /// Number of bytes the write needed.
        wanted: usize,
        /// Total frame length.
        len: usize,
    },

    /// A read would run past the end of the frame.
    #[error("frame underflow: wanted {wanted} bytes at offset {at}, frame is {len} bytes")]
    Underflow {
        /// Cursor position when the read was attempted.
        at: usize,
        /// Number of bytes the read needed.
        wanted: usize,
        /// Total frame length.
        len: usize,
    },

    /// A string field contained non-ASCII data.
    ///
    /// Addresses and ports travel as ASCII strings; anything else is a
    /// malformed frame.
    #[error("string field is not ASCII")]
    NotAscii,

    /// Serializing the match-start roster to JSON failed.
    #[error("roster encode failed: {0}")]
    Roster(#[from] serde_json::Error),
}
