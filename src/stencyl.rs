//! Stencyl save serialization.
//!
//! Legends of Idleon's local save is a flat ASCII stream of tagged tokens
//! (the Haxe serialization format, as emitted by the Stencyl engine):
//!
//! 1. Single-character constants: `n` null, `t`/`f` booleans, `z` zero,
//!    `k` NaN, `p`/`m` the infinities
//! 2. Literals: `i<int>`, `d<float>`, `y<len>:<percent-encoded string>`
//! 3. Back-references: `R<index>` into the per-call string cache
//! 4. Containers: `o…g` structure, `b…h`/`q…h`/`M…h` maps, `l…h` list,
//!    `a…h` array (with `u<n>` null runs)
//!
//! Every first-occurrence string literal — map keys included — is appended
//! to an ordered cache; later occurrences are emitted as `R<index>`.
//! Encoder and decoder maintain their caches in lock-step, so indices are a
//! pure function of first-occurrence order under depth-first traversal.

mod cache;
mod decoder;
mod encoder;
mod value;

pub use cache::RefCache;
pub use decoder::StencylDecoder;
pub use encoder::{IdentityPayload, MangledPayload, StencylEncoder, StringPayload};
pub use value::{Float, ListKind, MapKind, Value};

use thiserror::Error;

/// Fatal decode failures. The codec never attempts heuristic recovery from
/// malformed input; a failed decode aborts before anything is written back.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEof(usize),

    #[error("unknown tag '{tag}' at offset {offset}")]
    UnknownTag { tag: char, offset: usize },

    #[error("back-reference {index} is out of range ({cache_len} strings cached)")]
    DanglingReference { index: usize, cache_len: usize },

    #[error("malformed number literal at offset {0}")]
    InvalidNumber(usize),

    #[error("malformed string literal at offset {offset}: {reason}")]
    InvalidString { offset: usize, reason: String },

    #[error("map key at offset {offset} has non-string tag '{tag}'")]
    InvalidMapKey { tag: char, offset: usize },
}

/// Encode failures. These indicate an internal-contract violation (a value
/// no encoding rule can represent), never bad user input.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),
}

/// Decode a save token stream into a value tree.
pub fn decode(data: &str) -> Result<Value, DecodeError> {
    StencylDecoder::new(data).parse()
}

/// Encode a value tree to its save token stream.
pub fn encode(value: &Value) -> Result<String, EncodeError> {
    StencylEncoder::new().render(value)
}
