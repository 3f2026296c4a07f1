//! PIN operations
//!
//! Verifying and changing the PIN both go through the provider's protected
//! authentication path: the reader's PIN pad or the provider's own dialog
//! collects the digits, so no PIN bytes ever pass through here.

use log::{debug, info};

use crate::backend::Ui;
use crate::ck::{CKR_OK, CKU_USER};
use crate::error::ViewerResult;
use crate::events::{Event, EventQueue};
use crate::mapper::{check, check_with, LOGOUT_MAPPINGS};
use crate::provider::Pkcs11;
use crate::session::SessionManager;

/// PIN operation requested by the user
///
/// Ordered: every operation at or above `Change` modifies the PIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PinOp {
    /// Verify the PIN (log in)
    Test = 0,
    /// Change the PIN
    Change = 1,
}

impl PinOp {
    pub fn is_change(self) -> bool {
        self >= PinOp::Change
    }
}

/// PIN outcome as reported to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinResult {
    Success,
    Failed,
}

/// Run a PIN operation on the live session
///
/// The UI always hears about the result. A successful operation also queues
/// `ReadReady` so the state machine can move on.
pub fn execute<P: Pkcs11>(
    sessions: &mut SessionManager<P>,
    op: PinOp,
    ui: &mut dyn Ui,
    events: &mut EventQueue,
) -> ViewerResult<()> {
    let (session, provider) = match sessions.with_session() {
        Ok(live) => live,
        Err(e) => {
            ui.pin_result(op, PinResult::Failed);
            return Err(e);
        }
    };

    let (call, rv) = if op.is_change() {
        ("C_SetPIN", provider.set_pin(session, None, None))
    } else {
        ("C_Login", provider.login(session, CKU_USER, None))
    };

    let result = if rv == CKR_OK {
        PinResult::Success
    } else {
        PinResult::Failed
    };
    info!("PIN operation {:?}: {:?}", op, result);
    ui.pin_result(op, result);

    check(call, rv)?;
    events.push(Event::ReadReady);
    Ok(())
}

/// Log out after the state machine leaves the PIN operation state
pub fn leave<P: Pkcs11>(sessions: &mut SessionManager<P>) -> ViewerResult<()> {
    let (session, provider) = sessions.with_session()?;
    check_with("C_Logout", provider.logout(session), LOGOUT_MAPPINGS)?;
    debug!("Logged out of session {}", session);
    Ok(())
}
