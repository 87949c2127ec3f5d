//! Error types for rootmesh

use crate::types::MacAddress;
use thiserror::Error;

/// Malformed inbound frame. The frame is dropped, state is untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame truncated: need {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("unknown packet tag {0}")]
    UnknownVariant(u8),

    #[error("frame of {0} bytes exceeds the radio payload limit")]
    Oversized(usize),

    #[error("{kind} payload must be {expected} bytes, header declares {declared}")]
    PayloadLength {
        kind: &'static str,
        expected: usize,
        declared: usize,
    },
}

/// Failures reported by a transport adapter
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("peer {0} is not registered")]
    PeerNotFound(MacAddress),

    #[error("peer {0} is already registered")]
    PeerExists(MacAddress),

    #[error("peer table is full")]
    PeerTableFull,

    #[error("payload of {0} bytes exceeds the radio payload limit")]
    PayloadTooLarge(usize),

    #[error("transport is not started")]
    NotStarted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid configuration value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Fatal start-up failure. Nothing can be coordinated without these.
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
