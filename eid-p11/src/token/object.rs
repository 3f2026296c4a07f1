//! Objects stored on the software token

use crate::ck::{
    Attribute, CKA_CLASS, CKA_LABEL, CKA_OBJECT_ID, CKA_VALUE, CKO_CERTIFICATE, CKO_DATA,
    CK_ATTRIBUTE_TYPE, CK_OBJECT_CLASS,
};

/// A data object or certificate on the software token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenObject {
    pub class: CK_OBJECT_CLASS,
    pub label: Vec<u8>,
    pub value: Vec<u8>,
    /// CKA_OBJECT_ID; certificates do not have one
    pub object_id: Option<Vec<u8>>,
}

impl TokenObject {
    /// Create a data object with an empty object identifier
    pub fn data(label: &str, value: &[u8]) -> Self {
        Self {
            class: CKO_DATA,
            label: label.as_bytes().to_vec(),
            value: value.to_vec(),
            object_id: Some(Vec::new()),
        }
    }

    /// Create a certificate object
    pub fn certificate(label: &str, der: &[u8]) -> Self {
        Self {
            class: CKO_CERTIFICATE,
            label: label.as_bytes().to_vec(),
            value: der.to_vec(),
            object_id: None,
        }
    }

    /// Set the object identifier
    pub fn with_object_id(mut self, oid: &[u8]) -> Self {
        self.object_id = Some(oid.to_vec());
        self
    }

    /// Value of an attribute, if the object has it
    pub fn attribute(&self, kind: CK_ATTRIBUTE_TYPE) -> Option<Vec<u8>> {
        match kind {
            CKA_CLASS => Some(self.class.to_ne_bytes().to_vec()),
            CKA_LABEL => Some(self.label.clone()),
            CKA_VALUE => Some(self.value.clone()),
            CKA_OBJECT_ID => self.object_id.clone(),
            _ => None,
        }
    }

    /// Whether every attribute of a search template matches
    pub fn matches(&self, template: &[Attribute]) -> bool {
        template
            .iter()
            .all(|attr| self.attribute(attr.kind).as_deref() == Some(attr.bytes()))
    }
}
