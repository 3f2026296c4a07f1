//! Session lifecycle
//!
//! The viewer shows one card at a time, so there is at most one open session.
//! `SessionManager` owns the provider together with that session and is the
//! only place a session handle is created or destroyed.

use log::{debug, info};

use crate::backend::{Cache, SourceKind, Ui};
use crate::ck::{CKF_SERIAL_SESSION, CK_SESSION_HANDLE, CK_SLOT_ID};
use crate::error::{ViewerError, ViewerResult};
use crate::mapper::{check, check_with, CLOSE_MAPPINGS};
use crate::provider::Pkcs11;

/// The slot/session pair currently in use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveSession {
    pub slot: CK_SLOT_ID,
    pub session: CK_SESSION_HANDLE,
}

/// Owns the provider and the single live session
pub struct SessionManager<P: Pkcs11> {
    provider: P,
    live: Option<LiveSession>,
}

impl<P: Pkcs11> SessionManager<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            live: None,
        }
    }

    /// Bring up the Cryptoki library
    ///
    /// Must be called once before anything else. Calling it twice is not
    /// guarded here; the provider answers CKR_CRYPTOKI_ALREADY_INITIALIZED.
    pub fn initialize(&mut self) -> ViewerResult<()> {
        check("C_Initialize", self.provider.initialize())?;
        info!("Cryptoki initialized");
        Ok(())
    }

    /// Open the session for a newly inserted card and announce it to the UI
    pub fn open(&mut self, slot: CK_SLOT_ID, ui: &mut dyn Ui) -> ViewerResult<()> {
        if let Some(live) = self.live {
            debug!("Refusing to open slot {}: slot {} still open", slot, live.slot);
            return Err(ViewerError::SessionActive(live.slot as u64));
        }

        let mut session: CK_SESSION_HANDLE = 0;
        check(
            "C_OpenSession",
            self.provider
                .open_session(slot, CKF_SERIAL_SESSION, &mut session),
        )?;
        self.live = Some(LiveSession { slot, session });
        info!("Opened session {} on slot {}", session, slot);

        ui.new_source(SourceKind::Card);
        Ok(())
    }

    /// Close the session of a removed card and forget everything read from it
    ///
    /// The cache is cleared whatever happens to the native close: losing the
    /// session is the only signal that the card may have been swapped.
    pub fn close(&mut self, cache: &mut dyn Cache) -> ViewerResult<()> {
        let result = match self.live.take() {
            Some(live) => {
                let rv = self.provider.close_session(live.session);
                info!("Closed session {} on slot {}", live.session, live.slot);
                check_with("C_CloseSession", rv, CLOSE_MAPPINGS)
            }
            None => {
                debug!("C_CloseSession skipped: no open session");
                Err(ViewerError::NoSession)
            }
        };
        cache.clear();
        result
    }

    /// The live session, or `NoSession`
    pub fn live(&self) -> ViewerResult<LiveSession> {
        self.live.ok_or(ViewerError::NoSession)
    }

    pub fn is_open(&self) -> bool {
        self.live.is_some()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// The live session together with the provider to run calls against it
    pub(crate) fn with_session(&mut self) -> ViewerResult<(CK_SESSION_HANDLE, &mut P)> {
        let live = self.live()?;
        Ok((live.session, &mut self.provider))
    }
}
