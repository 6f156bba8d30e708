//! Token stream parser.

use percent_encoding::percent_decode;

use super::cache::RefCache;
use super::value::{is_float_byte, Float, ListKind, MapKind, Value};
use super::DecodeError;

/// Streaming parser for the tagged save format.
///
/// Reads one tag at a time and dispatches on it; string literals populate a
/// per-call [`RefCache`] in lock-step with the encoder's, so `R` indices
/// resolve to the same strings the producer cached. All failures are fatal:
/// a half-decoded save is worse than no save, so there is no recovery or
/// resynchronization on malformed input.
pub struct StencylDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    cache: RefCache<String>,
}

impl<'a> StencylDecoder<'a> {
    pub fn new(data: &'a str) -> Self {
        StencylDecoder {
            data: data.as_bytes(),
            pos: 0,
            cache: RefCache::new(),
        }
    }

    /// Parse the single top-level value.
    ///
    /// Trailing bytes after the value are ignored; real save records hold
    /// exactly one top-level structure.
    pub fn parse(mut self) -> Result<Value, DecodeError> {
        self.parse_value()
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn bump(&mut self) -> Result<u8, DecodeError> {
        let byte = self
            .peek()
            .ok_or(DecodeError::UnexpectedEof(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    /// Read a decimal integer literal (optional leading `-`).
    fn read_int(&mut self) -> Result<i64, DecodeError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        let digits = &self.data[start..self.pos];
        if digits.is_empty() || digits == b"-" {
            return Err(DecodeError::InvalidNumber(start));
        }
        // Digits are ASCII by construction.
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(DecodeError::InvalidNumber(start))
    }

    /// Read a float literal, preserving its exact source text.
    fn read_float(&mut self) -> Result<Float, DecodeError> {
        let start = self.pos;
        while self.peek().is_some_and(is_float_byte) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.data[start..self.pos])
            .ok()
            .and_then(Float::from_text)
            .ok_or(DecodeError::InvalidNumber(start))?;
        Ok(text)
    }

    /// Read a `y<len>:<bytes>` string literal body and cache it.
    fn read_string(&mut self) -> Result<String, DecodeError> {
        let len_offset = self.pos;
        let len = self.read_int()?;
        let len = usize::try_from(len).map_err(|_| DecodeError::InvalidNumber(len_offset))?;
        match self.bump()? {
            b':' => {}
            _ => {
                return Err(DecodeError::InvalidString {
                    offset: self.pos - 1,
                    reason: "expected ':' after string length".to_owned(),
                })
            }
        }
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(DecodeError::UnexpectedEof(self.data.len()))?;
        let raw = &self.data[self.pos..end];
        let offset = self.pos;
        self.pos = end;
        let decoded = percent_decode(raw)
            .decode_utf8()
            .map_err(|e| DecodeError::InvalidString {
                offset,
                reason: e.to_string(),
            })?
            .into_owned();
        self.cache.insert(decoded.clone());
        Ok(decoded)
    }

    /// Resolve an `R<index>` back-reference against the cache.
    fn read_reference(&mut self) -> Result<String, DecodeError> {
        let offset = self.pos;
        let index = self.read_int()?;
        let index = usize::try_from(index).map_err(|_| DecodeError::InvalidNumber(offset))?;
        self.cache
            .get(index)
            .cloned()
            .ok_or(DecodeError::DanglingReference {
                index,
                cache_len: self.cache.len(),
            })
    }

    fn parse_value(&mut self) -> Result<Value, DecodeError> {
        let tag = self.bump()?;
        self.parse_tagged(tag)
    }

    fn parse_tagged(&mut self, tag: u8) -> Result<Value, DecodeError> {
        match tag {
            b'n' => Ok(Value::Null),
            b't' => Ok(Value::Bool(true)),
            b'f' => Ok(Value::Bool(false)),
            b'z' => Ok(Value::Int(0)),
            b'k' => Ok(Value::Float(Float::nan())),
            b'p' => Ok(Value::Float(Float::infinity())),
            b'm' => Ok(Value::Float(Float::neg_infinity())),
            b'i' => Ok(Value::Int(self.read_int()?)),
            b'd' => Ok(Value::Float(self.read_float()?)),
            b'y' => Ok(Value::Str(self.read_string()?)),
            b'R' => Ok(Value::Str(self.read_reference()?)),
            b'o' => self.parse_map(MapKind::Struct),
            b'b' => self.parse_map(MapKind::StringMap),
            b'q' => self.parse_map(MapKind::IntMap),
            b'M' => self.parse_map(MapKind::ObjectMap),
            b'l' => self.parse_list(ListKind::List),
            b'a' => self.parse_list(ListKind::Array),
            other => Err(DecodeError::UnknownTag {
                tag: other as char,
                offset: self.pos - 1,
            }),
        }
    }

    fn parse_map(&mut self, kind: MapKind) -> Result<Value, DecodeError> {
        let close = kind.close_tag() as u8;
        let mut entries = Vec::new();
        loop {
            let offset = self.pos;
            let tag = self.bump()?;
            if tag == close {
                break;
            }
            // Keys must be strings; the encoder can emit nothing else.
            let key = match tag {
                b'y' => self.read_string()?,
                b'R' => self.read_reference()?,
                other => {
                    return Err(DecodeError::InvalidMapKey {
                        tag: other as char,
                        offset,
                    })
                }
            };
            let value = self.parse_value()?;
            entries.push((key, value));
        }
        Ok(Value::Map(kind, entries))
    }

    fn parse_list(&mut self, kind: ListKind) -> Result<Value, DecodeError> {
        let mut items = Vec::new();
        loop {
            let tag = self.bump()?;
            if tag == b'h' {
                break;
            }
            // Arrays compress runs of nulls as `u<count>`.
            if tag == b'u' && kind == ListKind::Array {
                let offset = self.pos;
                let count = self.read_int()?;
                let count =
                    usize::try_from(count).map_err(|_| DecodeError::InvalidNumber(offset))?;
                items.extend(std::iter::repeat(Value::Null).take(count));
                continue;
            }
            items.push(self.parse_tagged(tag)?);
        }
        Ok(Value::List(kind, items))
    }
}
