//! Viewer-level errors
//!
//! Every failure that leaves the driver is a `ViewerError`. None of them carry
//! a raw Cryptoki code: those are logged where they are mapped and stay there.

use thiserror::Error;

use crate::mapper::Outcome;

/// Errors returned by the session driver
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ViewerError {
    #[error("{call} failed")]
    Native { call: &'static str },

    #[error("no token present")]
    NoToken,

    #[error("no open session")]
    NoSession,

    #[error("a session is already open on slot {0}")]
    SessionActive(u64),

    #[error("slot list did not grow after CKR_BUFFER_TOO_SMALL (offered {offered}, asked {asked})")]
    SlotListUnstable { offered: u64, asked: u64 },
}

impl ViewerError {
    /// The viewer outcome this error reports upward
    pub fn outcome(&self) -> Outcome {
        Outcome::Fail
    }
}

/// Result type for driver operations
pub type ViewerResult<T> = Result<T, ViewerError>;
