//! Slot discovery
//!
//! Asks the provider for its slot list with a buffer that starts at one entry
//! and grows to whatever size the provider says it needs.

use log::debug;

use crate::ck::{CKR_BUFFER_TOO_SMALL, CK_SLOT_ID, CK_ULONG};
use crate::error::{ViewerError, ViewerResult};
use crate::mapper::check;
use crate::provider::Pkcs11;

/// Find the first slot, optionally only among slots holding a token
pub fn find_first_slot<P: Pkcs11>(provider: &mut P, want_token: bool) -> ViewerResult<CK_SLOT_ID> {
    let mut count: CK_ULONG = 1;
    let mut list: Vec<CK_SLOT_ID> = vec![0; count as usize];

    let rv = loop {
        let offered = count;
        let rv = provider.get_slot_list(want_token, Some(&mut list), &mut count);
        if rv != CKR_BUFFER_TOO_SMALL {
            break rv;
        }
        if count <= offered {
            debug!(
                "C_GetSlotList asked for {} slots after being offered {}",
                count, offered
            );
            return Err(ViewerError::SlotListUnstable {
                offered: offered as u64,
                asked: count as u64,
            });
        }
        debug!("C_GetSlotList needs room for {} slots", count);
        list = vec![0; count as usize];
    };
    check("C_GetSlotList", rv)?;

    match list.get(..count as usize).and_then(|slots| slots.first()) {
        Some(&slot) => Ok(slot),
        None => {
            debug!("No slot found (want_token={})", want_token);
            Err(ViewerError::NoToken)
        }
    }
}
