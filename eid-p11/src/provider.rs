//! Native provider seam
//!
//! `Pkcs11` mirrors the Cryptoki entry points the viewer uses, keeping their
//! raw return codes and their caller-sized buffer conventions. The driver
//! never interprets a code itself; it hands each one to the mapper.

use crate::ck::{
    Attribute, CK_FLAGS, CK_OBJECT_HANDLE, CK_RV, CK_SESSION_HANDLE, CK_SLOT_ID, CK_ULONG,
    CK_USER_TYPE,
};

/// A Cryptoki provider
pub trait Pkcs11 {
    /// C_Initialize
    fn initialize(&mut self) -> CK_RV;

    /// C_GetSlotList
    ///
    /// `count` holds the capacity of `list` on entry. When the buffer is too
    /// small the provider stores the required count and returns
    /// `CKR_BUFFER_TOO_SMALL`; otherwise it fills `list` and stores the number
    /// of slots written.
    fn get_slot_list(
        &mut self,
        token_present: bool,
        list: Option<&mut [CK_SLOT_ID]>,
        count: &mut CK_ULONG,
    ) -> CK_RV;

    /// C_OpenSession
    fn open_session(
        &mut self,
        slot: CK_SLOT_ID,
        flags: CK_FLAGS,
        session: &mut CK_SESSION_HANDLE,
    ) -> CK_RV;

    /// C_CloseSession
    fn close_session(&mut self, session: CK_SESSION_HANDLE) -> CK_RV;

    /// C_FindObjectsInit
    fn find_objects_init(&mut self, session: CK_SESSION_HANDLE, template: &[Attribute]) -> CK_RV;

    /// C_FindObjects
    ///
    /// Writes up to `objects.len()` handles and stores how many in `count`.
    fn find_objects(
        &mut self,
        session: CK_SESSION_HANDLE,
        objects: &mut [CK_OBJECT_HANDLE],
        count: &mut CK_ULONG,
    ) -> CK_RV;

    /// C_FindObjectsFinal
    fn find_objects_final(&mut self, session: CK_SESSION_HANDLE) -> CK_RV;

    /// C_GetAttributeValue
    ///
    /// Descriptors without a buffer get their length filled in; descriptors
    /// with a buffer get the value copied and `len` set to its length.
    fn get_attribute_value(
        &mut self,
        session: CK_SESSION_HANDLE,
        object: CK_OBJECT_HANDLE,
        template: &mut [Attribute],
    ) -> CK_RV;

    /// C_Login
    fn login(
        &mut self,
        session: CK_SESSION_HANDLE,
        user: CK_USER_TYPE,
        pin: Option<&[u8]>,
    ) -> CK_RV;

    /// C_SetPIN
    fn set_pin(
        &mut self,
        session: CK_SESSION_HANDLE,
        old_pin: Option<&[u8]>,
        new_pin: Option<&[u8]>,
    ) -> CK_RV;

    /// C_Logout
    fn logout(&mut self, session: CK_SESSION_HANDLE) -> CK_RV;
}
