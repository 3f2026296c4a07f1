//! Cryptoki (PKCS#11) vocabulary
//!
//! The C types and constants come from `cryptoki-sys`; this module re-exports
//! the ones a viewer session uses and adds the owned attribute descriptor the
//! provider seam passes around.

mod rv;
mod types;

pub use cryptoki_sys::{
    CK_ATTRIBUTE_TYPE, CK_FLAGS, CK_OBJECT_CLASS, CK_OBJECT_HANDLE, CK_RV, CK_SESSION_HANDLE,
    CK_SLOT_ID, CK_ULONG, CK_UNAVAILABLE_INFORMATION, CK_USER_TYPE,
};
pub use cryptoki_sys::{
    CKA_CERTIFICATE_TYPE, CKA_CLASS, CKA_LABEL, CKA_OBJECT_ID, CKA_VALUE, CKF_RW_SESSION,
    CKF_SERIAL_SESSION, CKO_CERTIFICATE, CKO_DATA, CKU_SO, CKU_USER,
};
pub use cryptoki_sys::{
    CKR_ARGUMENTS_BAD, CKR_ATTRIBUTE_SENSITIVE, CKR_ATTRIBUTE_TYPE_INVALID, CKR_BUFFER_TOO_SMALL,
    CKR_CANCEL, CKR_CRYPTOKI_ALREADY_INITIALIZED, CKR_CRYPTOKI_NOT_INITIALIZED, CKR_DEVICE_ERROR,
    CKR_DEVICE_MEMORY, CKR_DEVICE_REMOVED, CKR_FUNCTION_CANCELED, CKR_FUNCTION_FAILED,
    CKR_FUNCTION_NOT_SUPPORTED, CKR_GENERAL_ERROR, CKR_HOST_MEMORY, CKR_OBJECT_HANDLE_INVALID,
    CKR_OK, CKR_OPERATION_ACTIVE, CKR_OPERATION_NOT_INITIALIZED, CKR_PIN_INCORRECT,
    CKR_PIN_INVALID, CKR_PIN_LEN_RANGE, CKR_PIN_LOCKED, CKR_SESSION_CLOSED, CKR_SESSION_COUNT,
    CKR_SESSION_HANDLE_INVALID, CKR_SESSION_PARALLEL_NOT_SUPPORTED, CKR_SLOT_ID_INVALID,
    CKR_TOKEN_NOT_PRESENT, CKR_TOKEN_NOT_RECOGNIZED, CKR_USER_ALREADY_LOGGED_IN,
    CKR_USER_NOT_LOGGED_IN, CKR_USER_PIN_NOT_INITIALIZED,
};

pub use rv::rv_name;
pub use types::Attribute;
