//! Software Cryptoki provider

use std::collections::{HashMap, VecDeque};

use log::{debug, info};

use super::object::TokenObject;
use crate::ck::{
    Attribute, rv_name, CKF_SERIAL_SESSION, CKR_ATTRIBUTE_TYPE_INVALID, CKR_BUFFER_TOO_SMALL,
    CKR_CRYPTOKI_ALREADY_INITIALIZED, CKR_CRYPTOKI_NOT_INITIALIZED, CKR_DEVICE_REMOVED,
    CKR_OBJECT_HANDLE_INVALID, CKR_OK, CKR_OPERATION_ACTIVE, CKR_OPERATION_NOT_INITIALIZED,
    CKR_SESSION_HANDLE_INVALID, CKR_SESSION_PARALLEL_NOT_SUPPORTED, CKR_SLOT_ID_INVALID,
    CKR_TOKEN_NOT_PRESENT, CKR_USER_ALREADY_LOGGED_IN, CKR_USER_NOT_LOGGED_IN, CK_ATTRIBUTE_TYPE,
    CK_FLAGS, CK_OBJECT_HANDLE, CK_RV, CK_SESSION_HANDLE, CK_SLOT_ID, CK_ULONG,
    CK_UNAVAILABLE_INFORMATION, CK_USER_TYPE,
};
use crate::provider::Pkcs11;

/// Provider entry points, for call counting and fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Initialize,
    GetSlotList,
    OpenSession,
    CloseSession,
    FindObjectsInit,
    FindObjects,
    FindObjectsFinal,
    GetAttributeValue,
    Login,
    SetPin,
    Logout,
}

/// A value fetch seen by the token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRecord {
    pub kind: CK_ATTRIBUTE_TYPE,
    /// Size of the buffer the caller offered
    pub capacity: usize,
    /// Length of the value written into it
    pub len: CK_ULONG,
}

#[derive(Debug, Clone, Copy)]
struct Fault {
    call: Call,
    nth: usize,
    rv: CK_RV,
}

#[derive(Debug, Default)]
struct VirtualSlot {
    card: Option<Vec<TokenObject>>,
}

#[derive(Debug)]
struct FindScope {
    matches: Vec<CK_OBJECT_HANDLE>,
    next: usize,
}

#[derive(Debug)]
struct VirtualSession {
    slot: CK_SLOT_ID,
    removed: bool,
    find: Option<FindScope>,
}

/// In-memory Cryptoki provider
pub struct VirtualToken {
    initialized: bool,
    slots: Vec<VirtualSlot>,
    sessions: HashMap<CK_SESSION_HANDLE, VirtualSession>,
    next_session: CK_SESSION_HANDLE,
    logged_in: bool,
    pin_rv: CK_RV,
    saw_credentials: bool,
    scribble: bool,
    calls: HashMap<Call, usize>,
    faults: Vec<Fault>,
    slot_growth: VecDeque<CK_ULONG>,
    fetches: Vec<FetchRecord>,
}

impl VirtualToken {
    /// Create a token with `slot_count` empty readers
    pub fn new(slot_count: usize) -> Self {
        Self {
            initialized: false,
            slots: (0..slot_count).map(|_| VirtualSlot::default()).collect(),
            sessions: HashMap::new(),
            next_session: 1,
            logged_in: false,
            pin_rv: CKR_OK,
            saw_credentials: false,
            scribble: false,
            calls: HashMap::new(),
            faults: Vec::new(),
            slot_growth: VecDeque::new(),
            fetches: Vec::new(),
        }
    }

    // =========================================================================
    // Hardware events
    // =========================================================================

    /// Put a card holding `objects` into a reader
    pub fn insert_card(&mut self, slot: usize, objects: Vec<TokenObject>) {
        if let Some(s) = self.slots.get_mut(slot) {
            info!("Virtual card inserted in slot {} ({} objects)", slot, objects.len());
            s.card = Some(objects);
        }
    }

    /// Pull the card out of a reader; its sessions become unusable
    pub fn remove_card(&mut self, slot: usize) {
        if let Some(s) = self.slots.get_mut(slot) {
            s.card = None;
        }
        for session in self.sessions.values_mut() {
            if session.slot as usize == slot {
                session.removed = true;
                session.find = None;
            }
        }
        self.logged_in = false;
        info!("Virtual card removed from slot {}", slot);
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// Make the `nth` call (1-based) of `call` return `rv`
    pub fn fail_nth(&mut self, call: Call, nth: usize, rv: CK_RV) {
        self.faults.push(Fault { call, nth, rv });
    }

    /// Answer the next slot-list queries with CKR_BUFFER_TOO_SMALL, asking
    /// for each of `counts` in turn
    pub fn script_slot_growth<I: IntoIterator<Item = CK_ULONG>>(&mut self, counts: I) {
        self.slot_growth.extend(counts);
    }

    /// Return code for C_Login and C_SetPIN
    pub fn set_pin_outcome(&mut self, rv: CK_RV) {
        self.pin_rv = rv;
    }

    /// Fill unused buffer space with 0xFF on value fetches
    pub fn set_scribble(&mut self, scribble: bool) {
        self.scribble = scribble;
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// How often an entry point was called
    pub fn calls(&self, call: Call) -> usize {
        self.calls.get(&call).copied().unwrap_or(0)
    }

    /// Every value fetch so far
    pub fn fetches(&self) -> &[FetchRecord] {
        &self.fetches
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// Whether a PIN was ever passed to C_Login or C_SetPIN
    pub fn saw_credentials(&self) -> bool {
        self.saw_credentials
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Count the call and return a scripted or precondition failure
    fn enter(&mut self, call: Call) -> Option<CK_RV> {
        let n = {
            let count = self.calls.entry(call).or_insert(0);
            *count += 1;
            *count
        };

        if let Some(pos) = self.faults.iter().position(|f| f.call == call && f.nth == n) {
            let fault = self.faults.remove(pos);
            debug!("Injected {} for {:?} #{}", rv_name(fault.rv), call, n);
            return Some(fault.rv);
        }

        if call != Call::Initialize && !self.initialized {
            return Some(CKR_CRYPTOKI_NOT_INITIALIZED);
        }
        None
    }

    fn session_mut(&mut self, handle: CK_SESSION_HANDLE) -> Result<&mut VirtualSession, CK_RV> {
        match self.sessions.get_mut(&handle) {
            Some(session) if session.removed => Err(CKR_DEVICE_REMOVED),
            Some(session) => Ok(session),
            None => Err(CKR_SESSION_HANDLE_INVALID),
        }
    }

    fn card(&self, slot: CK_SLOT_ID) -> Result<&[TokenObject], CK_RV> {
        self.slots
            .get(slot as usize)
            .and_then(|s| s.card.as_deref())
            .ok_or(CKR_DEVICE_REMOVED)
    }

    fn object(&self, slot: CK_SLOT_ID, handle: CK_OBJECT_HANDLE) -> Result<&TokenObject, CK_RV> {
        let card = self.card(slot)?;
        (handle as usize)
            .checked_sub(1)
            .and_then(|index| card.get(index))
            .ok_or(CKR_OBJECT_HANDLE_INVALID)
    }
}

impl Pkcs11 for VirtualToken {
    fn initialize(&mut self) -> CK_RV {
        if let Some(rv) = self.enter(Call::Initialize) {
            return rv;
        }
        if self.initialized {
            return CKR_CRYPTOKI_ALREADY_INITIALIZED;
        }
        self.initialized = true;
        CKR_OK
    }

    fn get_slot_list(
        &mut self,
        token_present: bool,
        list: Option<&mut [CK_SLOT_ID]>,
        count: &mut CK_ULONG,
    ) -> CK_RV {
        if let Some(rv) = self.enter(Call::GetSlotList) {
            return rv;
        }
        if let Some(required) = self.slot_growth.pop_front() {
            *count = required;
            return CKR_BUFFER_TOO_SMALL;
        }

        let ids: Vec<CK_SLOT_ID> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !token_present || s.card.is_some())
            .map(|(i, _)| i as CK_SLOT_ID)
            .collect();

        match list {
            None => {
                *count = ids.len() as CK_ULONG;
                CKR_OK
            }
            Some(buf) => {
                let capacity = (*count as usize).min(buf.len());
                *count = ids.len() as CK_ULONG;
                if capacity < ids.len() {
                    return CKR_BUFFER_TOO_SMALL;
                }
                buf[..ids.len()].copy_from_slice(&ids);
                CKR_OK
            }
        }
    }

    fn open_session(
        &mut self,
        slot: CK_SLOT_ID,
        flags: CK_FLAGS,
        session: &mut CK_SESSION_HANDLE,
    ) -> CK_RV {
        if let Some(rv) = self.enter(Call::OpenSession) {
            return rv;
        }
        if flags & CKF_SERIAL_SESSION == 0 {
            return CKR_SESSION_PARALLEL_NOT_SUPPORTED;
        }
        match self.slots.get(slot as usize) {
            None => return CKR_SLOT_ID_INVALID,
            Some(s) if s.card.is_none() => return CKR_TOKEN_NOT_PRESENT,
            Some(_) => {}
        }

        let handle = self.next_session;
        self.next_session += 1;
        self.sessions.insert(
            handle,
            VirtualSession {
                slot,
                removed: false,
                find: None,
            },
        );
        *session = handle;
        CKR_OK
    }

    fn close_session(&mut self, session: CK_SESSION_HANDLE) -> CK_RV {
        if let Some(rv) = self.enter(Call::CloseSession) {
            return rv;
        }
        let rv = match self.sessions.remove(&session) {
            Some(s) if s.removed => CKR_DEVICE_REMOVED,
            Some(_) => CKR_OK,
            None => CKR_SESSION_HANDLE_INVALID,
        };
        if self.sessions.is_empty() {
            self.logged_in = false;
        }
        rv
    }

    fn find_objects_init(&mut self, session: CK_SESSION_HANDLE, template: &[Attribute]) -> CK_RV {
        if let Some(rv) = self.enter(Call::FindObjectsInit) {
            return rv;
        }
        let slot = match self.session_mut(session) {
            Ok(s) if s.find.is_some() => return CKR_OPERATION_ACTIVE,
            Ok(s) => s.slot,
            Err(rv) => return rv,
        };
        let matches = match self.card(slot) {
            Ok(card) => card
                .iter()
                .enumerate()
                .filter(|(_, obj)| obj.matches(template))
                .map(|(i, _)| (i + 1) as CK_OBJECT_HANDLE)
                .collect(),
            Err(rv) => return rv,
        };
        if let Ok(s) = self.session_mut(session) {
            s.find = Some(FindScope { matches, next: 0 });
        }
        CKR_OK
    }

    fn find_objects(
        &mut self,
        session: CK_SESSION_HANDLE,
        objects: &mut [CK_OBJECT_HANDLE],
        count: &mut CK_ULONG,
    ) -> CK_RV {
        if let Some(rv) = self.enter(Call::FindObjects) {
            return rv;
        }
        let scope = match self.session_mut(session) {
            Ok(s) => match s.find.as_mut() {
                Some(scope) => scope,
                None => return CKR_OPERATION_NOT_INITIALIZED,
            },
            Err(rv) => return rv,
        };

        let remaining = &scope.matches[scope.next..];
        let n = remaining.len().min(objects.len());
        objects[..n].copy_from_slice(&remaining[..n]);
        scope.next += n;
        *count = n as CK_ULONG;
        CKR_OK
    }

    fn find_objects_final(&mut self, session: CK_SESSION_HANDLE) -> CK_RV {
        if let Some(rv) = self.enter(Call::FindObjectsFinal) {
            return rv;
        }
        match self.session_mut(session) {
            Ok(s) => match s.find.take() {
                Some(_) => CKR_OK,
                None => CKR_OPERATION_NOT_INITIALIZED,
            },
            Err(rv) => rv,
        }
    }

    fn get_attribute_value(
        &mut self,
        session: CK_SESSION_HANDLE,
        object: CK_OBJECT_HANDLE,
        template: &mut [Attribute],
    ) -> CK_RV {
        if let Some(rv) = self.enter(Call::GetAttributeValue) {
            return rv;
        }
        let slot = match self.session_mut(session) {
            Ok(s) => s.slot,
            Err(rv) => return rv,
        };
        let object = match self.object(slot, object) {
            Ok(obj) => obj.clone(),
            Err(rv) => return rv,
        };

        let mut rv = CKR_OK;
        for attr in template.iter_mut() {
            let value = match object.attribute(attr.kind) {
                Some(value) => value,
                None => {
                    attr.len = CK_UNAVAILABLE_INFORMATION;
                    rv = CKR_ATTRIBUTE_TYPE_INVALID;
                    continue;
                }
            };
            match attr.value.as_mut() {
                None => attr.len = value.len() as CK_ULONG,
                Some(buf) if buf.len() < value.len() => {
                    attr.len = CK_UNAVAILABLE_INFORMATION;
                    rv = CKR_BUFFER_TOO_SMALL;
                }
                Some(buf) => {
                    buf[..value.len()].copy_from_slice(&value);
                    if self.scribble {
                        buf[value.len()..].fill(0xFF);
                    }
                    attr.len = value.len() as CK_ULONG;
                    self.fetches.push(FetchRecord {
                        kind: attr.kind,
                        capacity: buf.len(),
                        len: attr.len,
                    });
                }
            }
        }
        rv
    }

    fn login(
        &mut self,
        session: CK_SESSION_HANDLE,
        _user: CK_USER_TYPE,
        pin: Option<&[u8]>,
    ) -> CK_RV {
        if let Some(rv) = self.enter(Call::Login) {
            return rv;
        }
        if let Err(rv) = self.session_mut(session) {
            return rv;
        }
        self.saw_credentials |= pin.is_some();
        if self.logged_in {
            return CKR_USER_ALREADY_LOGGED_IN;
        }
        if self.pin_rv == CKR_OK {
            self.logged_in = true;
        }
        self.pin_rv
    }

    fn set_pin(
        &mut self,
        session: CK_SESSION_HANDLE,
        old_pin: Option<&[u8]>,
        new_pin: Option<&[u8]>,
    ) -> CK_RV {
        if let Some(rv) = self.enter(Call::SetPin) {
            return rv;
        }
        if let Err(rv) = self.session_mut(session) {
            return rv;
        }
        self.saw_credentials |= old_pin.is_some() || new_pin.is_some();
        self.pin_rv
    }

    fn logout(&mut self, session: CK_SESSION_HANDLE) -> CK_RV {
        if let Some(rv) = self.enter(Call::Logout) {
            return rv;
        }
        if let Err(rv) = self.session_mut(session) {
            return rv;
        }
        if !self.logged_in {
            return CKR_USER_NOT_LOGGED_IN;
        }
        self.logged_in = false;
        CKR_OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ck::{CKA_LABEL, CKA_OBJECT_ID, CKO_CERTIFICATE, CKO_DATA, CKR_GENERAL_ERROR};

    fn ready_token() -> (VirtualToken, CK_SESSION_HANDLE) {
        let mut token = VirtualToken::new(2);
        token.insert_card(
            1,
            vec![
                TokenObject::data("surname", b"Doe"),
                TokenObject::certificate("Root", &[0x30, 0x03, 0x02, 0x01, 0x01]),
            ],
        );
        assert_eq!(token.initialize(), CKR_OK);
        let mut session = 0;
        assert_eq!(token.open_session(1, CKF_SERIAL_SESSION, &mut session), CKR_OK);
        (token, session)
    }

    #[test]
    fn test_not_initialized() {
        let mut token = VirtualToken::new(1);
        let mut count = 0;
        assert_eq!(
            token.get_slot_list(false, None, &mut count),
            CKR_CRYPTOKI_NOT_INITIALIZED
        );
    }

    #[test]
    fn test_slot_list_size_query() {
        let (mut token, _) = ready_token();
        let mut count = 0;
        assert_eq!(token.get_slot_list(false, None, &mut count), CKR_OK);
        assert_eq!(count, 2);
        assert_eq!(token.get_slot_list(true, None, &mut count), CKR_OK);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_open_session_rules() {
        let (mut token, _) = ready_token();
        let mut session = 0;
        assert_eq!(token.open_session(0, CKF_SERIAL_SESSION, &mut session), CKR_TOKEN_NOT_PRESENT);
        assert_eq!(token.open_session(7, CKF_SERIAL_SESSION, &mut session), CKR_SLOT_ID_INVALID);
        assert_eq!(token.open_session(1, 0, &mut session), CKR_SESSION_PARALLEL_NOT_SUPPORTED);
    }

    #[test]
    fn test_find_scope() {
        let (mut token, session) = ready_token();
        let mut handles = [0; 4];
        let mut count = 0;
        assert_eq!(
            token.find_objects(session, &mut handles, &mut count),
            CKR_OPERATION_NOT_INITIALIZED
        );

        let filter = [Attribute::class(CKO_CERTIFICATE)];
        assert_eq!(token.find_objects_init(session, &filter), CKR_OK);
        assert_eq!(token.find_objects_init(session, &filter), CKR_OPERATION_ACTIVE);
        assert_eq!(token.find_objects(session, &mut handles, &mut count), CKR_OK);
        assert_eq!((count, handles[0]), (1, 2));
        assert_eq!(token.find_objects(session, &mut handles, &mut count), CKR_OK);
        assert_eq!(count, 0);
        assert_eq!(token.find_objects_final(session), CKR_OK);
        assert_eq!(token.find_objects_final(session), CKR_OPERATION_NOT_INITIALIZED);
    }

    #[test]
    fn test_attribute_sizing() {
        let (mut token, session) = ready_token();
        let mut template = [Attribute::probe(CKA_LABEL)];
        assert_eq!(token.get_attribute_value(session, 1, &mut template), CKR_OK);
        assert_eq!(template[0].len, 7);

        template[0].value = Some(vec![0; 3]);
        assert_eq!(
            token.get_attribute_value(session, 1, &mut template),
            CKR_BUFFER_TOO_SMALL
        );
        assert_eq!(template[0].len, CK_UNAVAILABLE_INFORMATION);
    }

    #[test]
    fn test_missing_attribute() {
        let (mut token, session) = ready_token();
        let mut template = [Attribute::probe(CKA_LABEL), Attribute::probe(CKA_OBJECT_ID)];
        assert_eq!(
            token.get_attribute_value(session, 2, &mut template),
            CKR_ATTRIBUTE_TYPE_INVALID
        );
        assert_eq!(template[0].len, 4);
        assert_eq!(template[1].len, CK_UNAVAILABLE_INFORMATION);
    }

    #[test]
    fn test_bad_object_handle() {
        let (mut token, session) = ready_token();
        let mut template = [Attribute::probe(CKA_LABEL)];
        assert_eq!(
            token.get_attribute_value(session, 0, &mut template),
            CKR_OBJECT_HANDLE_INVALID
        );
        assert_eq!(
            token.get_attribute_value(session, 9, &mut template),
            CKR_OBJECT_HANDLE_INVALID
        );
    }

    #[test]
    fn test_removal_invalidates_session() {
        let (mut token, session) = ready_token();
        token.remove_card(1);
        let filter = [Attribute::class(CKO_DATA)];
        assert_eq!(token.find_objects_init(session, &filter), CKR_DEVICE_REMOVED);
        assert_eq!(token.close_session(session), CKR_DEVICE_REMOVED);
        assert_eq!(token.close_session(session), CKR_SESSION_HANDLE_INVALID);
        assert_eq!(token.open_sessions(), 0);
    }

    #[test]
    fn test_login_state() {
        let (mut token, session) = ready_token();
        assert_eq!(token.logout(session), CKR_USER_NOT_LOGGED_IN);
        assert_eq!(token.login(session, 1, None), CKR_OK);
        assert_eq!(token.login(session, 1, None), CKR_USER_ALREADY_LOGGED_IN);
        assert_eq!(token.logout(session), CKR_OK);
        assert!(!token.saw_credentials());
        token.login(session, 1, Some(&b"1234"[..]));
        assert!(token.saw_credentials());
    }

    #[test]
    fn test_fault_hits_only_nth_call() {
        let (mut token, session) = ready_token();
        token.fail_nth(Call::FindObjectsFinal, 2, CKR_GENERAL_ERROR);
        assert_eq!(token.find_objects_final(session), CKR_OPERATION_NOT_INITIALIZED);
        assert_eq!(token.find_objects_final(session), CKR_GENERAL_ERROR);
        assert_eq!(token.find_objects_final(session), CKR_OPERATION_NOT_INITIALIZED);
        assert_eq!(token.calls(Call::FindObjectsFinal), 3);
    }
}
