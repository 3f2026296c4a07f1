//! Collaborators of the session driver
//!
//! The presentation layer, the result cache and the character-set conversion
//! live outside this crate. The driver only talks to them through these traits.

use crate::pinop::{PinOp, PinResult};

/// Kind of data source announced to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A card in a reader
    Card,
}

/// UI forwarder
pub trait Ui {
    /// A new data source became available
    fn new_source(&mut self, kind: SourceKind);

    /// Data read from one on-card object
    ///
    /// Whether the value is converted, shown as text or kept binary is the
    /// UI's decision, based on the label.
    fn object_data(&mut self, label: &str, value: &[u8]);

    /// Result of a PIN operation
    fn pin_result(&mut self, op: PinOp, result: PinResult);
}

/// Result cache
pub trait Cache {
    /// Store a copy of `value` under `label`
    fn add(&mut self, label: &str, value: &[u8]);

    /// Drop every entry
    fn clear(&mut self);
}

/// Conversion from the token's character encoding to the internal one
pub trait Decoder {
    /// Decode `raw`; `None` when the bytes cannot be converted
    fn decode(&self, raw: &[u8]) -> Option<Vec<u8>>;
}

/// Tokens store UTF-8 and the viewer works in UTF-8: copy as is
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Decoder;

impl Decoder for Utf8Decoder {
    fn decode(&self, raw: &[u8]) -> Option<Vec<u8>> {
        Some(raw.to_vec())
    }
}

/// A UI that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullUi;

impl Ui for NullUi {
    fn new_source(&mut self, _kind: SourceKind) {}
    fn object_data(&mut self, _label: &str, _value: &[u8]) {}
    fn pin_result(&mut self, _op: PinOp, _result: PinResult) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_decoder_copies() {
        let raw = hex::decode("4a6f686e00ff").unwrap();
        assert_eq!(Utf8Decoder.decode(&raw), Some(raw.clone()));
    }
}
