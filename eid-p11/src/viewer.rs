//! Entry points for the presentation state machine
//!
//! `Viewer` bundles the session manager with the UI, the cache, the decoder
//! and the event queue, and exposes one method per state-machine action. The
//! state machine drains [`Viewer::events`] after each call.

use crate::backend::{Cache, Decoder, Ui, Utf8Decoder};
use crate::ck::CK_SLOT_ID;
use crate::error::ViewerResult;
use crate::events::EventQueue;
use crate::objects::{self, ScanKind, Sinks};
use crate::pinop::{self, PinOp};
use crate::provider::Pkcs11;
use crate::session::SessionManager;
use crate::slots;

/// Card-session driver
pub struct Viewer<P: Pkcs11, U: Ui, C: Cache> {
    sessions: SessionManager<P>,
    ui: U,
    cache: C,
    decoder: Box<dyn Decoder>,
    events: EventQueue,
}

impl<P: Pkcs11, U: Ui, C: Cache> Viewer<P, U, C> {
    /// Create a driver decoding token strings as UTF-8
    pub fn new(provider: P, ui: U, cache: C) -> Self {
        Self {
            sessions: SessionManager::new(provider),
            ui,
            cache,
            decoder: Box::new(Utf8Decoder),
            events: EventQueue::new(),
        }
    }

    /// Replace the character-set decoder
    pub fn with_decoder<D: Decoder + 'static>(mut self, decoder: D) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    /// Bring up the provider; once per process
    pub fn initialize(&mut self) -> ViewerResult<()> {
        self.sessions.initialize()
    }

    /// Card inserted: open its session
    pub fn open_session(&mut self, slot: CK_SLOT_ID) -> ViewerResult<()> {
        self.sessions.open(slot, &mut self.ui)
    }

    /// Card removed: close its session and empty the cache
    pub fn close_session(&mut self) -> ViewerResult<()> {
        self.sessions.close(&mut self.cache)
    }

    /// Poll for a usable slot
    pub fn find_available_slot(&mut self, want_token: bool) -> ViewerResult<CK_SLOT_ID> {
        slots::find_first_slot(self.sessions.provider_mut(), want_token)
    }

    /// Read the identity data objects
    pub fn read_identity_objects(&mut self) -> ViewerResult<usize> {
        self.scan(ScanKind::Identity)
    }

    /// Read the certificates
    pub fn read_certificate_objects(&mut self) -> ViewerResult<usize> {
        self.scan(ScanKind::Certificates)
    }

    /// End the find operation of the last scan
    pub fn finalize_find(&mut self) -> ViewerResult<()> {
        objects::finalize_find(&mut self.sessions)
    }

    /// Verify or change the PIN
    pub fn execute_pin_operation(&mut self, op: PinOp) -> ViewerResult<()> {
        pinop::execute(&mut self.sessions, op, &mut self.ui, &mut self.events)
    }

    /// Leave the PIN operation state
    pub fn leave_pin_operation(&mut self) -> ViewerResult<()> {
        pinop::leave(&mut self.sessions)
    }

    fn scan(&mut self, kind: ScanKind) -> ViewerResult<usize> {
        let mut sinks = Sinks {
            ui: &mut self.ui,
            cache: &mut self.cache,
            decoder: self.decoder.as_ref(),
            events: &mut self.events,
        };
        objects::scan(&mut self.sessions, kind, &mut sinks)
    }

    /// Events queued for the state machine
    pub fn events(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    pub fn sessions(&self) -> &SessionManager<P> {
        &self.sessions
    }

    pub fn provider_mut(&mut self) -> &mut P {
        self.sessions.provider_mut()
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }
}
