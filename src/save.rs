//! Round-trip orchestration between the LevelDB store and the codec.
//!
//! A [`SaveSession`] ties one store to one installation's record and
//! sequences the full pass: read record → decode → hand the tree to the
//! caller → encode → write record. Any failure aborts before the write, so
//! a bad decode can never half-overwrite a save.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::ldb::{db_key, LdbError, SaveDb};
use crate::stencyl::{self, DecodeError, EncodeError, MangledPayload, StencylEncoder, Value};

/// Records are stored framed with a leading control byte.
const RECORD_FRAME: u8 = 0x01;

/// Chunk size for round-trip comparison; keeps mismatch reports readable on
/// 400k+ character saves.
const CHUNK_LEN: usize = 50;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error(transparent)]
    Ldb(#[from] LdbError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("save record is not valid UTF-8")]
    NotText,

    #[error("round-trip check failed at chunk {chunk}: {original:?} != {reencoded:?}")]
    RoundTrip {
        chunk: usize,
        original: String,
        reencoded: String,
    },
}

/// One installation's save record in one store.
///
/// The store handle itself is never held across calls; each operation opens
/// the store, does its one read or write, and releases it, keeping the
/// window in which the game client cannot take its lock as small as
/// possible.
pub struct SaveSession {
    ldb_path: PathBuf,
    key: Vec<u8>,
}

impl SaveSession {
    /// `ldb_path` is the Local Storage LevelDB directory; `install_path` is
    /// the game installation the record key is derived from (it does not
    /// need to exist on this machine).
    pub fn new(ldb_path: impl Into<PathBuf>, install_path: &Path) -> Self {
        SaveSession {
            ldb_path: ldb_path.into(),
            key: db_key(install_path),
        }
    }

    /// The derived record key.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Read the raw token stream out of the store.
    pub fn read(&self) -> Result<String, SaveError> {
        let mut db = SaveDb::open(&self.ldb_path, false)?;
        let raw = db.get(&self.key)?;
        db.close()?;
        unframe(&raw)
    }

    /// Write a token stream back to the store.
    ///
    /// Refuses to create the record: if the key is absent the store is not
    /// the one the game uses, and inventing the record would only hide that.
    pub fn write(&self, encoded: &str) -> Result<(), SaveError> {
        let mut db = SaveDb::open(&self.ldb_path, false)?;
        db.get(&self.key)?;
        let mut framed = Vec::with_capacity(encoded.len() + 1);
        framed.push(RECORD_FRAME);
        framed.extend_from_slice(encoded.trim().as_bytes());
        db.put(&self.key, &framed)?;
        db.close()?;
        Ok(())
    }

    /// Verify the codec reproduces `raw` exactly, comparing in fixed-size
    /// chunks. Run this before any write-back that started from an
    /// unmodified read; a mismatch is a codec regression, not user error.
    pub fn roundtrip_check(raw: &str) -> Result<(), SaveError> {
        let decoded = stencyl::decode(raw)?;
        verify_inversion(raw, &decoded)
    }

    /// Full editing pass: read, verify inversion, decode, let `transform`
    /// mutate the tree, encode, write back. Returns the written stream.
    pub fn edit<F>(&self, transform: F) -> Result<String, SaveError>
    where
        F: FnOnce(&mut Value),
    {
        let raw = self.read()?;
        let mut value = stencyl::decode(&raw)?;
        verify_inversion(&raw, &value)?;
        transform(&mut value);
        let encoded = stencyl::encode(&value)?;
        self.write(&encoded)?;
        Ok(encoded)
    }

    /// Re-encode the save with every string payload replaced by a seeded
    /// random substitute, preserving the reference structure. The result is
    /// returned for sharing in bug reports and never written back.
    pub fn mangle(&self, seed: u64) -> Result<String, SaveError> {
        let raw = self.read()?;
        let value = stencyl::decode(&raw)?;
        let mangled = StencylEncoder::with_payload(MangledPayload::seeded(seed)).render(&value)?;
        Ok(mangled)
    }
}

/// Strip the control-byte framing and surrounding whitespace.
fn unframe(raw: &[u8]) -> Result<String, SaveError> {
    let start = raw
        .iter()
        .position(|&b| b != RECORD_FRAME)
        .unwrap_or(raw.len());
    let end = raw
        .iter()
        .rposition(|&b| b != RECORD_FRAME)
        .map_or(start, |i| i + 1);
    let text = std::str::from_utf8(&raw[start..end]).map_err(|_| SaveError::NotText)?;
    Ok(text.trim().to_owned())
}

fn verify_inversion(raw: &str, decoded: &Value) -> Result<(), SaveError> {
    let reencoded = stencyl::encode(decoded)?;
    let original_chunks: Vec<&[u8]> = raw.as_bytes().chunks(CHUNK_LEN).collect();
    let reencoded_chunks: Vec<&[u8]> = reencoded.as_bytes().chunks(CHUNK_LEN).collect();
    let count = original_chunks.len().max(reencoded_chunks.len());
    for chunk in 0..count {
        let original = original_chunks.get(chunk).copied().unwrap_or(b"");
        let reencoded = reencoded_chunks.get(chunk).copied().unwrap_or(b"");
        if original != reencoded {
            return Err(SaveError::RoundTrip {
                chunk,
                original: String::from_utf8_lossy(original).into_owned(),
                reencoded: String::from_utf8_lossy(reencoded).into_owned(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTALL: &str = "C:/Program Files (x86)/Steam/steamapps/common/Legends of Idleon";
    const STREAM: &str = "oy5:nameey7:Player1y5:extraR0g";

    /// A record holding `{"namee": "Player1", "extra": "namee"}`.
    fn stream() -> String {
        // Built by the codec so the fixture can't drift from the format.
        let value = Value::Map(
            crate::stencyl::MapKind::Struct,
            vec![
                (
                    "namee".to_owned(),
                    Value::Str("Player1".to_owned()),
                ),
                ("extra".to_owned(), Value::Str("namee".to_owned())),
            ],
        );
        stencyl::encode(&value).unwrap()
    }

    fn seeded_session(dir: &Path) -> SaveSession {
        let session = SaveSession::new(dir, Path::new(INSTALL));
        let mut db = SaveDb::open(dir, true).unwrap();
        let mut framed = vec![RECORD_FRAME];
        framed.extend_from_slice(stream().as_bytes());
        db.put(session.key(), &framed).unwrap();
        db.close().unwrap();
        session
    }

    #[test]
    fn read_strips_framing_and_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let session = seeded_session(dir.path());
        assert_eq!(session.read().unwrap(), stream());
    }

    #[test]
    fn read_fails_when_record_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        SaveDb::open(dir.path(), true).unwrap().close().unwrap();
        let session = SaveSession::new(dir.path(), Path::new(INSTALL));
        assert!(matches!(
            session.read(),
            Err(SaveError::Ldb(LdbError::KeyNotFound(_)))
        ));
    }

    #[test]
    fn write_refuses_to_create_the_record() {
        let dir = tempfile::tempdir().unwrap();
        SaveDb::open(dir.path(), true).unwrap().close().unwrap();
        let session = SaveSession::new(dir.path(), Path::new(INSTALL));
        assert!(matches!(
            session.write("nn"),
            Err(SaveError::Ldb(LdbError::KeyNotFound(_)))
        ));
    }

    #[test]
    fn roundtrip_check_accepts_codec_output() {
        SaveSession::roundtrip_check(&stream()).unwrap();
    }

    #[test]
    fn roundtrip_check_reports_the_first_divergent_chunk() {
        // `i0` decodes fine but always re-encodes as `z`.
        let err = SaveSession::roundtrip_check("i0").unwrap_err();
        assert!(matches!(err, SaveError::RoundTrip { chunk: 0, .. }));
    }

    #[test]
    fn edit_round_trips_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let session = seeded_session(dir.path());

        let written = session
            .edit(|save| {
                *save.get_mut("namee").unwrap() = Value::Str("Renamed".to_owned());
            })
            .unwrap();

        let raw = session.read().unwrap();
        assert_eq!(raw, written);
        let value = stencyl::decode(&raw).unwrap();
        assert_eq!(value.get("namee").unwrap().as_str(), Some("Renamed"));
        assert_eq!(value.get("extra").unwrap().as_str(), Some("namee"));
    }

    #[test]
    fn mangle_preserves_shape_without_writing_back() {
        let dir = tempfile::tempdir().unwrap();
        let session = seeded_session(dir.path());

        let mangled = session.mangle(99).unwrap();
        assert_eq!(session.mangle(99).unwrap(), mangled);
        assert_ne!(mangled, stream());

        let decoded = stencyl::decode(&mangled).unwrap();
        let Value::Map(_, entries) = decoded else {
            panic!("expected map");
        };
        assert_eq!(entries.len(), 2);

        // Nothing was written back.
        assert_eq!(session.read().unwrap(), stream());
    }

    #[test]
    fn fixture_matches_expected_bytes() {
        assert_eq!(stream(), STREAM);
    }
}
