//! Error types for the fader controller

use thiserror::Error;

use crate::protocol::MessageType;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Fatal error: {0}")]
    Fatal(#[from] FatalError),

    #[error("Icon codec error: {0}")]
    Icon(#[from] IconCodecError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Frame decoding errors
///
/// All of these are recoverable: the offending frame is discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unknown message type: {0}")]
    UnknownMessage(u8),

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("{message} count {count} exceeds maximum {max}")]
    CountOutOfRange {
        message: &'static str,
        count: usize,
        max: usize,
    },

    #[error("Invalid acknowledge kind: {0}")]
    InvalidAckKind(u8),
}

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Link busy, frame not sent")]
    Busy,

    #[error("Transport unavailable")]
    Unavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Icon compression errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IconCodecError {
    #[error("Decompressed icon is {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Corrupt icon stream: {0}")]
    Corrupt(String),

    #[error("Compression failed: {0}")]
    Compression(String),
}

/// Unrecoverable conditions
///
/// Any of these moves the device into its terminal failure state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    #[error("Icon for session {session} failed to decode: {source}")]
    IconDecode {
        session: u32,
        #[source]
        source: IconCodecError,
    },

    #[error("Pending frame queue overflow (capacity {capacity})")]
    PendingQueueOverflow { capacity: usize },
}

/// Recoverable protocol violations
///
/// Counted and logged by the dispatch loop; the offending frame is dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("{0:?} received outside a matching transfer")]
    UnexpectedChunk(MessageType),

    #[error("Icon init rejected: {packet_count} packets for {byte_count} bytes")]
    IconInitRejected { packet_count: u32, byte_count: u32 },

    #[error("{0:?} is only ever sent by the controller")]
    DeviceOnlyMessage(MessageType),
}

/// Bulk transfer step failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error(transparent)]
    Violation(#[from] ProtocolViolation),

    #[error(transparent)]
    Fatal(#[from] FatalError),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
