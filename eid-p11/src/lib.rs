//! PKCS#11 card-session driver for an eID viewer
//!
//! Drives a single Cryptoki session on behalf of the viewer's state machine:
//! opens and closes the session as cards come and go, reads the identity
//! data objects and certificates off the card, and runs PIN verification or
//! PIN change through the provider's protected authentication path.
//!
//! Every native return code is mapped to a viewer [`Outcome`] before it
//! leaves the crate; raw codes only ever show up in the log.
//!
//! # Example
//! ```ignore
//! use eid_p11::{MemoryCache, NullUi, TokenObject, Viewer, VirtualToken};
//!
//! let mut token = VirtualToken::new(1);
//! token.insert_card(0, vec![TokenObject::data("surname", b"Doe")]);
//!
//! let mut viewer = Viewer::new(token, NullUi, MemoryCache::new());
//! viewer.initialize()?;
//! let slot = viewer.find_available_slot(true)?;
//! viewer.open_session(slot)?;
//! viewer.read_identity_objects()?;
//! viewer.finalize_find()?;
//! assert_eq!(viewer.cache().get("surname"), Some(&b"Doe"[..]));
//! ```

// Core modules
pub mod backend;
pub mod cache;
pub mod ck;
pub mod config;
pub mod error;
pub mod events;
pub mod mapper;
pub mod native;
pub mod objects;
pub mod pinop;
pub mod provider;
pub mod session;
pub mod slots;
pub mod token;
pub mod viewer;

pub use backend::{Cache, Decoder, NullUi, SourceKind, Ui, Utf8Decoder};
pub use cache::{CacheEntry, MemoryCache};
pub use config::{Config, ConfigError};
pub use error::{ViewerError, ViewerResult};
pub use events::{Event, EventQueue};
pub use mapper::{map, Outcome, RvMapping, DEFAULT_MAPPINGS};
pub use native::{LoadError, NativeModule};
pub use objects::ScanKind;
pub use pinop::{PinOp, PinResult};
pub use provider::Pkcs11;
pub use session::{LiveSession, SessionManager};
pub use token::{TokenObject, VirtualToken};
pub use viewer::Viewer;

