//! Object enumeration
//!
//! Reads the identity data objects or the certificates of the card in the live
//! session. Each object is read with two C_GetAttributeValue round trips: the
//! first learns the attribute lengths, the second fills buffers of exactly
//! that size plus one terminator byte. Every object read is cached and then
//! forwarded to the UI.
//!
//! A scan leaves its find operation open; the caller closes it with
//! [`finalize_find`] when the state machine leaves the reading state.

use log::{debug, warn};

use crate::backend::{Cache, Decoder, Ui};
use crate::ck::{
    Attribute, CKA_LABEL, CKA_OBJECT_ID, CKA_VALUE, CKO_CERTIFICATE, CKO_DATA, CK_ATTRIBUTE_TYPE,
    CK_OBJECT_CLASS, CK_OBJECT_HANDLE, CK_SESSION_HANDLE, CK_ULONG,
};
use crate::error::{ViewerError, ViewerResult};
use crate::events::{Event, EventQueue};
use crate::mapper::check;
use crate::provider::Pkcs11;
use crate::session::SessionManager;

const IDENTITY_ATTRIBUTES: &[CK_ATTRIBUTE_TYPE] = &[CKA_LABEL, CKA_VALUE, CKA_OBJECT_ID];
const CERTIFICATE_ATTRIBUTES: &[CK_ATTRIBUTE_TYPE] = &[CKA_LABEL, CKA_VALUE];

/// What a scan reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    /// Identity fields (CKO_DATA), including their object identifier
    Identity,
    /// Certificates (CKO_CERTIFICATE)
    Certificates,
}

impl ScanKind {
    /// Object class the find operation filters on
    pub fn class(self) -> CK_OBJECT_CLASS {
        match self {
            ScanKind::Identity => CKO_DATA,
            ScanKind::Certificates => CKO_CERTIFICATE,
        }
    }

    /// Attributes read from every object, label and value first
    pub fn attributes(self) -> &'static [CK_ATTRIBUTE_TYPE] {
        match self {
            ScanKind::Identity => IDENTITY_ATTRIBUTES,
            ScanKind::Certificates => CERTIFICATE_ATTRIBUTES,
        }
    }
}

/// Where a scan delivers what it reads
pub struct Sinks<'a> {
    pub ui: &'a mut dyn Ui,
    pub cache: &'a mut dyn Cache,
    pub decoder: &'a dyn Decoder,
    pub events: &'a mut EventQueue,
}

/// Read the given attributes of one object
///
/// Every returned descriptor owns a buffer of probed length + 1 bytes, with a
/// zero at index `len`.
pub fn fetch_attributes<P: Pkcs11>(
    provider: &mut P,
    session: CK_SESSION_HANDLE,
    object: CK_OBJECT_HANDLE,
    kinds: &[CK_ATTRIBUTE_TYPE],
) -> ViewerResult<Vec<Attribute>> {
    let mut template: Vec<Attribute> = kinds.iter().map(|&kind| Attribute::probe(kind)).collect();
    check(
        "C_GetAttributeValue",
        provider.get_attribute_value(session, object, &mut template),
    )?;

    let probed: Vec<CK_ULONG> = template.iter().map(|attr| attr.len).collect();
    for attr in template.iter_mut() {
        if !attr.allocate() {
            warn!(
                "C_GetAttributeValue: no usable length for attribute 0x{:X} of object {}",
                attr.kind, object
            );
            return Err(ViewerError::Native {
                call: "C_GetAttributeValue",
            });
        }
    }

    check(
        "C_GetAttributeValue",
        provider.get_attribute_value(session, object, &mut template),
    )?;

    for (attr, &len) in template.iter_mut().zip(&probed) {
        if attr.len != len {
            debug!("Attribute 0x{:X}: probed {} bytes, got {}", attr.kind, len, attr.len);
        }
        attr.len = attr.len.min(len);
        attr.terminate();
    }
    Ok(template)
}

/// Run a scan over every object of `kind` on the live session
///
/// Returns the number of objects published. On failure, objects published
/// before the failing call stay in the cache and the UI.
pub fn scan<P: Pkcs11>(
    sessions: &mut SessionManager<P>,
    kind: ScanKind,
    sinks: &mut Sinks<'_>,
) -> ViewerResult<usize> {
    let (session, provider) = sessions.with_session()?;

    let filter = [Attribute::class(kind.class())];
    check("C_FindObjectsInit", provider.find_objects_init(session, &filter))?;

    let mut published = 0;
    loop {
        let mut handles: [CK_OBJECT_HANDLE; 1] = [0];
        let mut count: CK_ULONG = 0;
        check(
            "C_FindObjects",
            provider.find_objects(session, &mut handles, &mut count),
        )?;
        if count == 0 {
            break;
        }

        let attrs = fetch_attributes(provider, session, handles[0], kind.attributes())?;
        if publish(&attrs, sinks) {
            published += 1;
        }
    }

    debug!("{:?} scan done: {} objects", kind, published);
    sinks.events.push(Event::ReadReady);
    Ok(published)
}

/// Close the find operation left open by [`scan`]
pub fn finalize_find<P: Pkcs11>(sessions: &mut SessionManager<P>) -> ViewerResult<()> {
    let (session, provider) = sessions.with_session()?;
    check("C_FindObjectsFinal", provider.find_objects_final(session))
}

/// Decode one object and hand it to the cache, then to the UI
fn publish(attrs: &[Attribute], sinks: &mut Sinks<'_>) -> bool {
    let (raw_label, raw_value) = (attrs[0].bytes(), attrs[1].bytes());

    let decoded = match (sinks.decoder.decode(raw_label), sinks.decoder.decode(raw_value)) {
        (Some(label), Some(value)) => String::from_utf8(label).ok().map(|label| (label, value)),
        _ => None,
    };
    let (label, value) = match decoded {
        Some(decoded) => decoded,
        None => {
            warn!(
                "Cannot decode object labelled {}",
                String::from_utf8_lossy(raw_label)
            );
            return false;
        }
    };

    match attrs.get(2) {
        Some(objid) => debug!(
            "found data for label {} (object id {:02X?})",
            label,
            objid.bytes()
        ),
        None => debug!("found data for label {}", label),
    }

    sinks.cache.add(&label, &value);
    sinks.ui.object_data(&label, &value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{NullUi, Utf8Decoder};
    use crate::cache::MemoryCache;
    use crate::ck::{
        CKR_DEVICE_ERROR, CKR_FUNCTION_NOT_SUPPORTED, CKR_GENERAL_ERROR, CKR_OK, CK_FLAGS, CK_RV,
        CK_SLOT_ID, CK_UNAVAILABLE_INFORMATION, CK_USER_TYPE,
    };
    use crate::token::{Call, TokenObject, VirtualToken};

    fn open_card(objects: Vec<TokenObject>) -> SessionManager<VirtualToken> {
        let mut token = VirtualToken::new(1);
        token.insert_card(0, objects);
        let mut sessions = SessionManager::new(token);
        sessions.initialize().unwrap();
        sessions.open(0, &mut NullUi).unwrap();
        sessions
    }

    fn identity_card() -> Vec<TokenObject> {
        vec![
            TokenObject::data("surname", b"Doe").with_object_id(&[0x06, 0x01, 0x01]),
            TokenObject::data("firstnames", b"John Jay"),
            TokenObject::data("photo", &[0xFF, 0xD8, 0xFF, 0xE0, 0x00]),
            TokenObject::certificate("Authentication", &[0x30, 0x82, 0x01, 0x0A]),
        ]
    }

    #[test]
    fn test_scan_kind_attributes() {
        assert_eq!(ScanKind::Identity.class(), CKO_DATA);
        assert_eq!(ScanKind::Certificates.class(), CKO_CERTIFICATE);
        assert!(ScanKind::Identity.attributes().contains(&CKA_OBJECT_ID));
        assert!(!ScanKind::Certificates.attributes().contains(&CKA_OBJECT_ID));
    }

    #[test]
    fn test_fetch_sizes_and_terminates() {
        let mut sessions = open_card(identity_card());
        let session = sessions.live().unwrap().session;
        let token = sessions.provider_mut();
        token.set_scribble(true);

        let attrs = fetch_attributes(token, session, 1, IDENTITY_ATTRIBUTES).unwrap();
        assert_eq!(attrs.len(), 3);
        for attr in &attrs {
            let buf = attr.value.as_ref().unwrap();
            assert_eq!(buf.len(), attr.len as usize + 1);
            assert_eq!(buf[attr.len as usize], 0);
        }
        assert_eq!(attrs[0].bytes(), b"surname");
        assert_eq!(attrs[1].bytes(), b"Doe");
        assert_eq!(attrs[2].bytes(), &[0x06, 0x01, 0x01]);
    }

    #[test]
    fn test_buffers_offered_are_probe_plus_one() {
        let mut sessions = open_card(identity_card());
        let mut cache = MemoryCache::new();
        let mut events = EventQueue::new();
        let mut sinks = Sinks {
            ui: &mut NullUi,
            cache: &mut cache,
            decoder: &Utf8Decoder,
            events: &mut events,
        };
        scan(&mut sessions, ScanKind::Identity, &mut sinks).unwrap();

        let fetches = sessions.provider().fetches();
        assert_eq!(fetches.len(), 9);
        for fetch in fetches {
            assert_eq!(fetch.capacity, fetch.len as usize + 1);
        }
    }

    #[test]
    fn test_identity_scan_publishes_data_only() {
        let mut sessions = open_card(identity_card());
        let mut cache = MemoryCache::new();
        let mut events = EventQueue::new();
        let mut sinks = Sinks {
            ui: &mut NullUi,
            cache: &mut cache,
            decoder: &Utf8Decoder,
            events: &mut events,
        };
        assert_eq!(scan(&mut sessions, ScanKind::Identity, &mut sinks), Ok(3));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("firstnames"), Some(&b"John Jay"[..]));
        assert_eq!(cache.get("Authentication"), None);
        assert_eq!(events.drain(), vec![Event::ReadReady]);
    }

    #[test]
    fn test_certificate_scan() {
        let mut sessions = open_card(identity_card());
        let mut cache = MemoryCache::new();
        let mut events = EventQueue::new();
        let mut sinks = Sinks {
            ui: &mut NullUi,
            cache: &mut cache,
            decoder: &Utf8Decoder,
            events: &mut events,
        };
        assert_eq!(scan(&mut sessions, ScanKind::Certificates, &mut sinks), Ok(1));
        assert_eq!(cache.get("Authentication"), Some(&[0x30, 0x82, 0x01, 0x0A][..]));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_empty_card_still_signals() {
        let mut sessions = open_card(vec![]);
        let mut cache = MemoryCache::new();
        let mut events = EventQueue::new();
        let mut sinks = Sinks {
            ui: &mut NullUi,
            cache: &mut cache,
            decoder: &Utf8Decoder,
            events: &mut events,
        };
        assert_eq!(scan(&mut sessions, ScanKind::Identity, &mut sinks), Ok(0));
        assert!(cache.is_empty());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_failure_keeps_earlier_objects() {
        let mut sessions = open_card(identity_card());
        // Object 1 uses calls 1 and 2; fail the probe of object 2.
        sessions
            .provider_mut()
            .fail_nth(Call::GetAttributeValue, 3, CKR_DEVICE_ERROR);

        let mut cache = MemoryCache::new();
        let mut events = EventQueue::new();
        let mut sinks = Sinks {
            ui: &mut NullUi,
            cache: &mut cache,
            decoder: &Utf8Decoder,
            events: &mut events,
        };
        assert_eq!(
            scan(&mut sessions, ScanKind::Identity, &mut sinks),
            Err(ViewerError::Native { call: "C_GetAttributeValue" })
        );
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("surname"), Some(&b"Doe"[..]));
        assert!(events.is_empty());
    }

    #[test]
    fn test_init_failure_publishes_nothing() {
        let mut sessions = open_card(identity_card());
        sessions
            .provider_mut()
            .fail_nth(Call::FindObjectsInit, 1, CKR_GENERAL_ERROR);

        let mut cache = MemoryCache::new();
        let mut events = EventQueue::new();
        let mut sinks = Sinks {
            ui: &mut NullUi,
            cache: &mut cache,
            decoder: &Utf8Decoder,
            events: &mut events,
        };
        assert!(scan(&mut sessions, ScanKind::Identity, &mut sinks).is_err());
        assert!(cache.is_empty());
        assert_eq!(sessions.provider().calls(Call::FindObjects), 0);
    }

    struct RejectingDecoder;

    impl Decoder for RejectingDecoder {
        fn decode(&self, raw: &[u8]) -> Option<Vec<u8>> {
            std::str::from_utf8(raw).ok().map(|s| s.as_bytes().to_vec())
        }
    }

    #[test]
    fn test_undecodable_object_is_skipped() {
        let mut sessions = open_card(identity_card());
        let mut cache = MemoryCache::new();
        let mut events = EventQueue::new();
        let mut sinks = Sinks {
            ui: &mut NullUi,
            cache: &mut cache,
            decoder: &RejectingDecoder,
            events: &mut events,
        };
        // The photo is not valid UTF-8.
        assert_eq!(scan(&mut sessions, ScanKind::Identity, &mut sinks), Ok(2));
        assert_eq!(cache.get("photo"), None);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_finalize_find() {
        let mut sessions = open_card(identity_card());
        let mut cache = MemoryCache::new();
        let mut events = EventQueue::new();
        let mut sinks = Sinks {
            ui: &mut NullUi,
            cache: &mut cache,
            decoder: &Utf8Decoder,
            events: &mut events,
        };
        scan(&mut sessions, ScanKind::Identity, &mut sinks).unwrap();
        assert!(finalize_find(&mut sessions).is_ok());
        // Nothing left to finalize.
        assert!(finalize_find(&mut sessions).is_err());
    }

    #[test]
    fn test_scan_without_session() {
        let mut sessions = SessionManager::new(VirtualToken::new(1));
        let mut cache = MemoryCache::new();
        let mut events = EventQueue::new();
        let mut sinks = Sinks {
            ui: &mut NullUi,
            cache: &mut cache,
            decoder: &Utf8Decoder,
            events: &mut events,
        };
        assert_eq!(
            scan(&mut sessions, ScanKind::Identity, &mut sinks),
            Err(ViewerError::NoSession)
        );
    }

    /// Answers every length probe with CKR_OK and an unavailable length
    #[derive(Default)]
    struct UnavailableLengths {
        fetches: usize,
    }

    impl Pkcs11 for UnavailableLengths {
        fn initialize(&mut self) -> CK_RV {
            CKR_OK
        }

        fn get_slot_list(
            &mut self,
            _token_present: bool,
            _list: Option<&mut [CK_SLOT_ID]>,
            count: &mut CK_ULONG,
        ) -> CK_RV {
            *count = 0;
            CKR_OK
        }

        fn open_session(
            &mut self,
            _slot: CK_SLOT_ID,
            _flags: CK_FLAGS,
            session: &mut CK_SESSION_HANDLE,
        ) -> CK_RV {
            *session = 1;
            CKR_OK
        }

        fn close_session(&mut self, _session: CK_SESSION_HANDLE) -> CK_RV {
            CKR_OK
        }

        fn find_objects_init(
            &mut self,
            _session: CK_SESSION_HANDLE,
            _template: &[Attribute],
        ) -> CK_RV {
            CKR_OK
        }

        fn find_objects(
            &mut self,
            _session: CK_SESSION_HANDLE,
            _objects: &mut [CK_OBJECT_HANDLE],
            count: &mut CK_ULONG,
        ) -> CK_RV {
            *count = 0;
            CKR_OK
        }

        fn find_objects_final(&mut self, _session: CK_SESSION_HANDLE) -> CK_RV {
            CKR_OK
        }

        fn get_attribute_value(
            &mut self,
            _session: CK_SESSION_HANDLE,
            _object: CK_OBJECT_HANDLE,
            template: &mut [Attribute],
        ) -> CK_RV {
            for attr in template.iter_mut() {
                if attr.value.is_some() {
                    self.fetches += 1;
                }
                attr.len = CK_UNAVAILABLE_INFORMATION;
            }
            CKR_OK
        }

        fn login(
            &mut self,
            _session: CK_SESSION_HANDLE,
            _user: CK_USER_TYPE,
            _pin: Option<&[u8]>,
        ) -> CK_RV {
            CKR_FUNCTION_NOT_SUPPORTED
        }

        fn set_pin(
            &mut self,
            _session: CK_SESSION_HANDLE,
            _old_pin: Option<&[u8]>,
            _new_pin: Option<&[u8]>,
        ) -> CK_RV {
            CKR_FUNCTION_NOT_SUPPORTED
        }

        fn logout(&mut self, _session: CK_SESSION_HANDLE) -> CK_RV {
            CKR_OK
        }
    }

    #[test]
    fn test_unavailable_length_fails_without_fetch() {
        let mut provider = UnavailableLengths::default();
        assert_eq!(
            fetch_attributes(&mut provider, 1, 1, CERTIFICATE_ATTRIBUTES),
            Err(ViewerError::Native { call: "C_GetAttributeValue" })
        );
        assert_eq!(provider.fetches, 0);
    }

    /// Hands back bytes that are never valid UTF-8
    struct PrefixingDecoder;

    impl Decoder for PrefixingDecoder {
        fn decode(&self, raw: &[u8]) -> Option<Vec<u8>> {
            let mut out = vec![0xFF];
            out.extend_from_slice(raw);
            Some(out)
        }
    }

    #[test]
    fn test_non_utf8_label_is_skipped() {
        let mut sessions = open_card(identity_card());
        let mut cache = MemoryCache::new();
        let mut events = EventQueue::new();
        let mut sinks = Sinks {
            ui: &mut NullUi,
            cache: &mut cache,
            decoder: &PrefixingDecoder,
            events: &mut events,
        };
        assert_eq!(scan(&mut sessions, ScanKind::Identity, &mut sinks), Ok(0));
        assert!(cache.is_empty());
        assert_eq!(events.len(), 1);
    }
}
