//! Token stream renderer.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::cache::RefCache;
use super::value::{is_float_byte, Float, ListKind, Value};
use super::EncodeError;

/// Escape set for string payloads.
///
/// The producer leaves alphanumerics, `_.-~` and `'!*()` literal and
/// percent-encodes everything else with uppercase hex; decoding and
/// re-encoding a string must reproduce its bytes exactly.
const STRING_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'\'')
    .remove(b'!')
    .remove(b'*')
    .remove(b'(')
    .remove(b')');

/// Supplies the literal payload emitted for a first-occurrence string.
///
/// The encoder consults its cache on the *original* string before asking the
/// strategy for a payload, so cache indices and the whole back-reference
/// structure are identical no matter which strategy is installed.
pub trait StringPayload {
    fn render(&mut self, original: &str) -> String;
}

/// Default strategy: emit the original string unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPayload;

impl StringPayload for IdentityPayload {
    fn render(&mut self, original: &str) -> String {
        original.to_owned()
    }
}

/// Anonymizing strategy: every first-occurrence string is replaced by 10-20
/// random alphanumeric characters, enough to keep the substitutes unique.
/// The RNG is caller-supplied so mangling runs are reproducible.
pub struct MangledPayload<R = StdRng> {
    rng: R,
}

impl MangledPayload<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        MangledPayload {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> MangledPayload<R> {
    pub fn new(rng: R) -> Self {
        MangledPayload { rng }
    }
}

impl<R: Rng> StringPayload for MangledPayload<R> {
    fn render(&mut self, _original: &str) -> String {
        let len = self.rng.gen_range(10..=20);
        (0..len)
            .map(|_| self.rng.sample(Alphanumeric) as char)
            .collect()
    }
}

/// Renderer for the tagged save format.
///
/// Walks the tree depth-first, map entries in insertion order and list
/// elements positionally, so an unchanged tree always renders byte-identical
/// output. Owns one [`RefCache`] for the duration of a single `render` call.
pub struct StencylEncoder<S = IdentityPayload> {
    cache: RefCache<String>,
    strategy: S,
    out: String,
}

impl StencylEncoder<IdentityPayload> {
    pub fn new() -> Self {
        Self::with_payload(IdentityPayload)
    }
}

impl Default for StencylEncoder<IdentityPayload> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StringPayload> StencylEncoder<S> {
    pub fn with_payload(strategy: S) -> Self {
        StencylEncoder {
            cache: RefCache::new(),
            strategy,
            out: String::new(),
        }
    }

    /// Render a value tree to its token stream, consuming the encoder so the
    /// cache cannot leak into a second call.
    pub fn render(mut self, value: &Value) -> Result<String, EncodeError> {
        self.encode_value(value)?;
        Ok(self.out)
    }

    fn encode_value(&mut self, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Null => self.out.push('n'),
            Value::Bool(true) => self.out.push('t'),
            Value::Bool(false) => self.out.push('f'),
            // The producer always emits zero as its own tag, never `i0`.
            Value::Int(0) => self.out.push('z'),
            Value::Int(n) => {
                self.out.push('i');
                self.out.push_str(&n.to_string());
            }
            Value::Float(f) => self.encode_float(f)?,
            Value::Str(s) => self.encode_string(s),
            Value::List(kind, items) => {
                self.out.push(kind.open_tag());
                match kind {
                    ListKind::Array => self.encode_array_items(items)?,
                    ListKind::List => {
                        for item in items {
                            self.encode_value(item)?;
                        }
                    }
                }
                self.out.push('h');
            }
            Value::Map(kind, entries) => {
                self.out.push(kind.open_tag());
                for (key, value) in entries {
                    self.encode_string(key);
                    self.encode_value(value)?;
                }
                self.out.push(kind.close_tag());
            }
        }
        Ok(())
    }

    /// Array elements, with runs of two or more nulls compressed to `u<n>`.
    fn encode_array_items(&mut self, items: &[Value]) -> Result<(), EncodeError> {
        let mut i = 0;
        while i < items.len() {
            if items[i] == Value::Null {
                let run = items[i..].iter().take_while(|v| **v == Value::Null).count();
                if run == 1 {
                    self.out.push('n');
                } else {
                    self.out.push('u');
                    self.out.push_str(&run.to_string());
                }
                i += run;
            } else {
                self.encode_value(&items[i])?;
                i += 1;
            }
        }
        Ok(())
    }

    fn encode_float(&mut self, f: &Float) -> Result<(), EncodeError> {
        match f.text() {
            "nan" => self.out.push('k'),
            "inf" => self.out.push('p'),
            "-inf" => self.out.push('m'),
            text if text.bytes().all(is_float_byte) && !text.is_empty() => {
                self.out.push('d');
                self.out.push_str(text);
            }
            text => {
                // Unreachable through the public constructors; a literal that
                // cannot be re-read would corrupt the stream.
                return Err(EncodeError::UnsupportedValue(format!(
                    "float literal {text:?} is not encodable"
                )));
            }
        }
        Ok(())
    }

    /// Cache-aware string rule, shared by map keys and string values.
    ///
    /// The cache is keyed on the original string even when a substituting
    /// strategy is installed, so repeated strings still collapse to the same
    /// back-reference index.
    fn encode_string(&mut self, s: &str) {
        let (index, is_new) = self.cache.lookup_or_insert(s);
        if is_new {
            let payload = self.strategy.render(s);
            let escaped = utf8_percent_encode(&payload, STRING_ESCAPES).to_string();
            self.out.push('y');
            self.out.push_str(&escaped.len().to_string());
            self.out.push(':');
            self.out.push_str(&escaped);
        } else {
            self.out.push('R');
            self.out.push_str(&index.to_string());
        }
    }
}
