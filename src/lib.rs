//! # idleon-saver
//!
//! Legends of Idleon save editor library - Stencyl decoding, encoding, and
//! LevelDB save access.
//!
//! This library provides functionality to:
//! - Decode the game's Stencyl-serialized save blob into a value tree
//! - Re-encode a (possibly modified) tree byte-for-byte
//! - Locate and atomically replace the save record in the game's LevelDB
//! - Anonymize string payloads for shareable bug-report saves
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use idleon_saver::{SaveSession, Value};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let install = Path::new("C:/Program Files (x86)/Steam/steamapps/common/Legends of Idleon");
//! let session = SaveSession::new("leveldb", install);
//!
//! // Inspect the decoded save
//! let raw = session.read()?;
//! let save = idleon_saver::decode(&raw)?;
//! println!("cards: {:?}", save.get("Cards"));
//!
//! // Modify and write back (aborts before writing on any codec failure)
//! session.edit(|save| {
//!     if let Some(gems) = save.get_mut("GemsOwned") {
//!         *gems = Value::Int(999);
//!     }
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod ldb;
pub mod save;
pub mod stencyl;

// Re-export commonly used items
#[doc(inline)]
pub use ldb::{db_key, LdbError, SaveDb};
#[doc(inline)]
pub use save::{SaveError, SaveSession};
#[doc(inline)]
pub use stencyl::{
    decode, encode, DecodeError, EncodeError, Float, IdentityPayload, ListKind, MangledPayload,
    MapKind, RefCache, StencylDecoder, StencylEncoder, StringPayload, Value,
};
