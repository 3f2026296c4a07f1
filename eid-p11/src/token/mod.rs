//! Software token
//!
//! An in-memory Cryptoki provider with card slots, find operations and a
//! login state. Besides serving as a stand-in for a reader during tests it
//! can be told to fail specific calls, to answer the slot-list query with a
//! growing list, and to scribble over unused buffer space.

pub mod object;
pub mod virtual_token;

pub use object::TokenObject;
pub use virtual_token::{Call, FetchRecord, VirtualToken};
