//! Owned attribute descriptors

use super::{
    CKA_CLASS, CK_ATTRIBUTE_TYPE, CK_OBJECT_CLASS, CK_ULONG, CK_UNAVAILABLE_INFORMATION,
};

/// An attribute descriptor (CK_ATTRIBUTE)
///
/// Follows the Cryptoki sizing convention: a descriptor without a buffer asks
/// the provider for the value length; a descriptor with a buffer receives the
/// value, and `len` is updated to the number of bytes written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute type (CKA_*)
    pub kind: CK_ATTRIBUTE_TYPE,
    /// Value buffer, `None` while probing
    pub value: Option<Vec<u8>>,
    /// Value length as reported by the provider
    pub len: CK_ULONG,
}

impl Attribute {
    /// Create an empty descriptor for a length probe
    pub fn probe(kind: CK_ATTRIBUTE_TYPE) -> Self {
        Self {
            kind,
            value: None,
            len: 0,
        }
    }

    /// Create a CKA_CLASS filter attribute
    pub fn class(class: CK_OBJECT_CLASS) -> Self {
        let bytes = class.to_ne_bytes().to_vec();
        let len = bytes.len() as CK_ULONG;
        Self {
            kind: CKA_CLASS,
            value: Some(bytes),
            len,
        }
    }

    /// Create a descriptor carrying a value
    pub fn with_value(kind: CK_ATTRIBUTE_TYPE, value: &[u8]) -> Self {
        Self {
            kind,
            value: Some(value.to_vec()),
            len: value.len() as CK_ULONG,
        }
    }

    /// Whether the provider reported a usable length
    pub fn is_available(&self) -> bool {
        self.len != CK_UNAVAILABLE_INFORMATION
    }

    /// Allocate a buffer for the probed length plus a terminator byte
    ///
    /// Returns `false` and leaves the descriptor untouched when the probed
    /// length is unavailable or cannot be reserved.
    pub fn allocate(&mut self) -> bool {
        if !self.is_available() {
            return false;
        }
        match usize::try_from(self.len).ok().and_then(|len| len.checked_add(1)) {
            Some(size) => {
                self.value = Some(vec![0u8; size]);
                true
            }
            None => false,
        }
    }

    /// Write a terminating zero right after the value
    pub fn terminate(&mut self) {
        let len = self.len as usize;
        if let Some(buf) = self.value.as_mut() {
            if len < buf.len() {
                buf[len] = 0;
            }
        }
    }

    /// Value bytes, excluding the terminator
    pub fn bytes(&self) -> &[u8] {
        match &self.value {
            Some(buf) => &buf[..(self.len as usize).min(buf.len())],
            None => &[],
        }
    }

    /// Decode the value as a native-endian CK_ULONG (e.g. CKA_CLASS)
    pub fn as_ulong(&self) -> Option<CK_ULONG> {
        let bytes: [u8; std::mem::size_of::<CK_ULONG>()] = self.bytes().try_into().ok()?;
        Some(CK_ULONG::from_ne_bytes(bytes))
    }
}
