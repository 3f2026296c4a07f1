//! Loaded Cryptoki provider
//!
//! Opens a PKCS#11 library at runtime, fetches its function list with
//! C_GetFunctionList and forwards every [`Pkcs11`] call to it.

use std::ffi::c_void;
use std::path::Path;
use std::ptr;

use cryptoki_sys::{CK_ATTRIBUTE, CK_FALSE, CK_FUNCTION_LIST, CK_TRUE};
use log::{debug, info};
use thiserror::Error;

use crate::ck::{
    rv_name, Attribute, CKR_ATTRIBUTE_TYPE_INVALID, CKR_BUFFER_TOO_SMALL,
    CKR_FUNCTION_NOT_SUPPORTED, CKR_OK, CK_FLAGS, CK_OBJECT_HANDLE, CK_RV, CK_SESSION_HANDLE,
    CK_SLOT_ID, CK_ULONG, CK_USER_TYPE,
};
use crate::provider::Pkcs11;

/// Errors loading a provider library
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot load {path}: {reason}")]
    Library { path: String, reason: String },

    #[error("C_GetFunctionList failed ({0})")]
    FunctionList(&'static str),
}

/// Call an entry point of the function list, or report it unsupported
macro_rules! call {
    ($module:expr, $func:ident ( $($arg:expr),* $(,)? )) => {
        match $module.functions.$func {
            Some(func) => unsafe { func($($arg),*) },
            None => {
                debug!("{} missing from the function list", stringify!($func));
                CKR_FUNCTION_NOT_SUPPORTED
            }
        }
    };
}

/// Build C descriptors pointing into the buffers of `template`
///
/// The returned array borrows the buffers; it must not outlive `template`.
fn to_c_template(template: &mut [Attribute]) -> Vec<CK_ATTRIBUTE> {
    template
        .iter_mut()
        .map(|attr| match attr.value.as_mut() {
            Some(buf) => CK_ATTRIBUTE {
                type_: attr.kind,
                pValue: buf.as_mut_ptr() as *mut c_void,
                ulValueLen: buf.len() as CK_ULONG,
            },
            None => CK_ATTRIBUTE {
                type_: attr.kind,
                pValue: ptr::null_mut(),
                ulValueLen: 0,
            },
        })
        .collect()
}

/// Split an optional PIN into the pointer/length pair C expects
fn pin_ptr(pin: Option<&[u8]>) -> (*mut u8, CK_ULONG) {
    match pin {
        Some(p) => (p.as_ptr() as *mut u8, p.len() as CK_ULONG),
        None => (ptr::null_mut(), 0),
    }
}

/// A PKCS#11 library opened at runtime
pub struct NativeModule {
    // Keeps the entry points in `functions` mapped.
    _library: cryptoki_sys::Pkcs11,
    functions: CK_FUNCTION_LIST,
}

impl NativeModule {
    /// Open the library at `path` and fetch its function list
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let library = unsafe { cryptoki_sys::Pkcs11::new(path) }.map_err(|e| {
            LoadError::Library {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        let mut list: *mut CK_FUNCTION_LIST = ptr::null_mut();
        let rv = unsafe { library.C_GetFunctionList(&mut list) };
        if rv != CKR_OK || list.is_null() {
            return Err(LoadError::FunctionList(rv_name(rv)));
        }
        let functions = unsafe { *list };

        info!(
            "Loaded {} (Cryptoki {}.{})",
            path.display(),
            functions.version.major,
            functions.version.minor
        );
        Ok(Self {
            _library: library,
            functions,
        })
    }
}

impl Pkcs11 for NativeModule {
    fn initialize(&mut self) -> CK_RV {
        call!(self, C_Initialize(ptr::null_mut()))
    }

    fn get_slot_list(
        &mut self,
        token_present: bool,
        list: Option<&mut [CK_SLOT_ID]>,
        count: &mut CK_ULONG,
    ) -> CK_RV {
        let flag = if token_present { CK_TRUE } else { CK_FALSE };
        let list_ptr = match list {
            Some(buf) => {
                *count = (*count).min(buf.len() as CK_ULONG);
                buf.as_mut_ptr()
            }
            None => ptr::null_mut(),
        };
        call!(self, C_GetSlotList(flag, list_ptr, count))
    }

    fn open_session(
        &mut self,
        slot: CK_SLOT_ID,
        flags: CK_FLAGS,
        session: &mut CK_SESSION_HANDLE,
    ) -> CK_RV {
        call!(self, C_OpenSession(slot, flags, ptr::null_mut(), None, session))
    }

    fn close_session(&mut self, session: CK_SESSION_HANDLE) -> CK_RV {
        call!(self, C_CloseSession(session))
    }

    fn find_objects_init(&mut self, session: CK_SESSION_HANDLE, template: &[Attribute]) -> CK_RV {
        // C_FindObjectsInit only reads the template; work on a copy so the
        // pointers can be mutable.
        let mut owned = template.to_vec();
        let mut c_template = to_c_template(&mut owned);
        call!(
            self,
            C_FindObjectsInit(
                session,
                c_template.as_mut_ptr(),
                c_template.len() as CK_ULONG,
            )
        )
    }

    fn find_objects(
        &mut self,
        session: CK_SESSION_HANDLE,
        objects: &mut [CK_OBJECT_HANDLE],
        count: &mut CK_ULONG,
    ) -> CK_RV {
        call!(
            self,
            C_FindObjects(
                session,
                objects.as_mut_ptr(),
                objects.len() as CK_ULONG,
                count,
            )
        )
    }

    fn find_objects_final(&mut self, session: CK_SESSION_HANDLE) -> CK_RV {
        call!(self, C_FindObjectsFinal(session))
    }

    fn get_attribute_value(
        &mut self,
        session: CK_SESSION_HANDLE,
        object: CK_OBJECT_HANDLE,
        template: &mut [Attribute],
    ) -> CK_RV {
        let mut c_template = to_c_template(template);
        let rv = call!(
            self,
            C_GetAttributeValue(
                session,
                object,
                c_template.as_mut_ptr(),
                c_template.len() as CK_ULONG,
            )
        );
        if rv != CKR_OK && rv != CKR_BUFFER_TOO_SMALL && rv != CKR_ATTRIBUTE_TYPE_INVALID {
            debug!("C_GetAttributeValue left the template untouched ({})", rv_name(rv));
            return rv;
        }
        for (attr, c_attr) in template.iter_mut().zip(&c_template) {
            attr.len = c_attr.ulValueLen;
        }
        rv
    }

    fn login(
        &mut self,
        session: CK_SESSION_HANDLE,
        user: CK_USER_TYPE,
        pin: Option<&[u8]>,
    ) -> CK_RV {
        let (pin, len) = pin_ptr(pin);
        call!(self, C_Login(session, user, pin, len))
    }

    fn set_pin(
        &mut self,
        session: CK_SESSION_HANDLE,
        old_pin: Option<&[u8]>,
        new_pin: Option<&[u8]>,
    ) -> CK_RV {
        let (old, old_len) = pin_ptr(old_pin);
        let (new, new_len) = pin_ptr(new_pin);
        call!(self, C_SetPIN(session, old, old_len, new, new_len))
    }

    fn logout(&mut self, session: CK_SESSION_HANDLE) -> CK_RV {
        call!(self, C_Logout(session))
    }
}
