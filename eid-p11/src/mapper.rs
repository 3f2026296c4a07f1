//! Native result mapping
//!
//! Collapses the large Cryptoki return-code space into the two outcomes the
//! viewer acts on. Call sites pass the table that fits them; codes missing
//! from a table are failures.

use log::debug;

use crate::ck::{
    rv_name, CKR_DEVICE_REMOVED, CKR_OK, CKR_SESSION_CLOSED, CKR_SESSION_HANDLE_INVALID,
    CKR_USER_NOT_LOGGED_IN, CK_RV,
};
use crate::error::{ViewerError, ViewerResult};

/// Viewer-level result of a native call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Fail,
}

/// One row of a mapping table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RvMapping {
    pub rv: CK_RV,
    pub outcome: Outcome,
}

impl RvMapping {
    pub const fn new(rv: CK_RV, outcome: Outcome) -> Self {
        Self { rv, outcome }
    }
}

/// Only CKR_OK is success
pub const DEFAULT_MAPPINGS: &[RvMapping] = &[RvMapping::new(CKR_OK, Outcome::Ok)];

/// Closing a session whose card is already gone still counts as closed
pub const CLOSE_MAPPINGS: &[RvMapping] = &[
    RvMapping::new(CKR_OK, Outcome::Ok),
    RvMapping::new(CKR_SESSION_CLOSED, Outcome::Ok),
    RvMapping::new(CKR_SESSION_HANDLE_INVALID, Outcome::Ok),
    RvMapping::new(CKR_DEVICE_REMOVED, Outcome::Ok),
];

/// Logging out without a logged-in user is not an error
pub const LOGOUT_MAPPINGS: &[RvMapping] = &[
    RvMapping::new(CKR_OK, Outcome::Ok),
    RvMapping::new(CKR_USER_NOT_LOGGED_IN, Outcome::Ok),
];

/// Map a return code through a table
pub fn map(rv: CK_RV, table: &[RvMapping]) -> Outcome {
    table
        .iter()
        .find(|m| m.rv == rv)
        .map(|m| m.outcome)
        .unwrap_or(Outcome::Fail)
}

/// Check the result of `call` against the default table
pub fn check(call: &'static str, rv: CK_RV) -> ViewerResult<()> {
    check_with(call, rv, DEFAULT_MAPPINGS)
}

/// Check the result of `call` against `table`, logging any failure
pub fn check_with(call: &'static str, rv: CK_RV, table: &[RvMapping]) -> ViewerResult<()> {
    match map(rv, table) {
        Outcome::Ok => Ok(()),
        Outcome::Fail => {
            if table.iter().any(|m| m.rv == rv) {
                debug!("{} returned {} ({})", call, rv, rv_name(rv));
            } else {
                debug!("{} returned unmapped value {} ({})", call, rv, rv_name(rv));
            }
            Err(ViewerError::Native { call })
        }
    }
}
