//! Error types for the simulation core.
//!
//! Velocity problems (NaN, infinite or over-limit components) are never
//! errors: they are corrected or ignored where they occur. Everything here is
//! structural misuse reported at the offending call.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors raised by entity, universe and stepping operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Non-finite position or radius where a finite one is required
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Non-finite duration, or a collision query on an overlapping pair
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation on a dead entity, or an illegal attach/detach
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Entity or universe handle that does not resolve
    #[error("Null reference: {0}")]
    NullReference(String),
}

/// Coarse error category, for adapters that map failures to status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidGeometry,
    InvalidArgument,
    InvalidState,
    NullReference,
}

impl SimError {
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    pub fn argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Creates a null-reference error naming the missing handle.
    pub fn missing(what: impl std::fmt::Debug) -> Self {
        Self::NullReference(format!("{what:?} does not exist"))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SimError::InvalidGeometry(_) => ErrorKind::InvalidGeometry,
            SimError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SimError::InvalidState(_) => ErrorKind::InvalidState,
            SimError::NullReference(_) => ErrorKind::NullReference,
        }
    }
}
