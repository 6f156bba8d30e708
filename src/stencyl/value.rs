//! Decoded save data model.
//!
//! `Value` is the wrapped form of a decoded save: every node remembers which
//! serialization tag produced it, so re-encoding an untouched tree emits the
//! exact bytes that were read. Downstream consumers that only care about the
//! data can use the serde `Serialize` impl, which erases the tags and yields
//! plain JSON-shaped values.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Which map tag a decoded map came from.
///
/// The engine serializes four map-like containers with different open tags
/// (`o`, `b`, `q`, `M`); all of them decode to ordered key/value entries, but
/// the tag must survive decoding so the stream can be reproduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapKind {
    /// Anonymous structure, `o` ... `g`.
    Struct,
    /// `haxe.ds.StringMap`, `b` ... `h`.
    StringMap,
    /// `haxe.ds.IntMap`, `q` ... `h`.
    IntMap,
    /// `haxe.ds.ObjectMap`, `M` ... `h`.
    ObjectMap,
}

impl MapKind {
    pub(crate) fn open_tag(self) -> char {
        match self {
            MapKind::Struct => 'o',
            MapKind::StringMap => 'b',
            MapKind::IntMap => 'q',
            MapKind::ObjectMap => 'M',
        }
    }

    pub(crate) fn close_tag(self) -> char {
        match self {
            MapKind::Struct => 'g',
            _ => 'h',
        }
    }
}

/// Which sequence tag a decoded sequence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// `haxe.ds.List`, `l` ... `h`.
    List,
    /// Array, `a` ... `h`. Runs of nulls are compressed as `u<n>`.
    Array,
}

impl ListKind {
    pub(crate) fn open_tag(self) -> char {
        match self {
            ListKind::List => 'l',
            ListKind::Array => 'a',
        }
    }
}

/// A float literal with its source text preserved.
///
/// The engine's float formatting differs from Rust's, so a decoded float
/// keeps the exact characters it was read from and re-encodes them verbatim.
/// NaN and the infinities have their own single-character tags in the stream
/// and are stored with canonical placeholder text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Float {
    text: String,
}

pub(crate) fn is_float_byte(b: u8) -> bool {
    matches!(b, b'0'..=b'9' | b'.' | b'-' | b'+' | b'e')
}

impl Float {
    /// Build a float from literal text as it appears after a `d` tag.
    ///
    /// Returns `None` if the text is empty or contains characters the format
    /// never emits for floats.
    pub fn from_text(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if !text.is_empty() && text.bytes().all(is_float_byte) {
            Some(Float { text })
        } else {
            None
        }
    }

    pub(crate) fn nan() -> Self {
        Float { text: "nan".to_owned() }
    }

    pub(crate) fn infinity() -> Self {
        Float { text: "inf".to_owned() }
    }

    pub(crate) fn neg_infinity() -> Self {
        Float { text: "-inf".to_owned() }
    }

    /// The preserved literal text (`"nan"`, `"inf"`, `"-inf"` for the
    /// non-finite tags).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Numeric value of the literal.
    pub fn value(&self) -> f64 {
        self.text.parse().unwrap_or(f64::NAN)
    }
}

impl From<f64> for Float {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            Float::nan()
        } else if v == f64::INFINITY {
            Float::infinity()
        } else if v == f64::NEG_INFINITY {
            Float::neg_infinity()
        } else {
            Float { text: format!("{v}") }
        }
    }
}

/// A decoded save value.
///
/// Maps preserve insertion order; key order determines string-cache indices,
/// so reordering entries changes the encoded bytes. Equality is deep and
/// order-sensitive for both lists and maps.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(Float),
    Str(String),
    List(ListKind, Vec<Value>),
    Map(MapKind, Vec<(String, Value)>),
}

impl Value {
    /// Look up a map entry by key. Returns `None` for non-map values.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(_, entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Mutable map entry lookup. Returns `None` for non-map values.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self {
            Value::Map(_, entries) => entries
                .iter_mut()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(f.value()),
            _ => None,
        }
    }
}

/// Serializes the unwrapped view: tags erased, floats as `f64`, maps as
/// ordered string-keyed maps. This is what export tooling consumes.
impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(f) => serializer.serialize_f64(f.value()),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(_, items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(_, entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_lookup() {
        let mut v = Value::Map(
            MapKind::Struct,
            vec![("Lv0".to_owned(), Value::Int(30))],
        );
        assert_eq!(v.get("Lv0").and_then(Value::as_int), Some(30));
        assert_eq!(v.get("missing"), None);
        *v.get_mut("Lv0").unwrap() = Value::Int(31);
        assert_eq!(v.get("Lv0").and_then(Value::as_int), Some(31));
        assert_eq!(Value::Null.get("Lv0"), None);
    }

    #[test]
    fn float_text_is_validated() {
        assert!(Float::from_text("1.0e+21").is_some());
        assert!(Float::from_text("-0.5").is_some());
        assert!(Float::from_text("").is_none());
        assert!(Float::from_text("1,5").is_none());
    }

    #[test]
    fn float_from_f64_round_trips_value() {
        let f = Float::from(2.5);
        assert_eq!(f.text(), "2.5");
        assert_eq!(f.value(), 2.5);
        assert!(Float::from(f64::NAN).value().is_nan());
    }
}
