//! LevelDB save store access.
//!
//! The game keeps its save blob in one record of the Chromium Local Storage
//! LevelDB that ships with its Electron build. This adapter opens that
//! store, derives the record key from the game's installation path, and
//! reads or fully replaces the one record — nothing else in the store is
//! ever touched. The game client holds the store's lock while it runs, so
//! lock contention is surfaced immediately and never retried blind.

use std::path::{Path, PathBuf};

use rusty_leveldb::{Options, Status, StatusCode, DB};
use thiserror::Error;

/// Key prefix Local Storage uses for the game origin.
pub const KEY_PREFIX: &[u8] = b"_file://\x00\x01/";

/// Key suffix addressing the save record inside the packaged game page.
pub const KEY_SUFFIX: &[u8] = b"/resources/app.asar/distBuild/static/game/index.html:mySave";

#[derive(Debug, Error)]
pub enum LdbError {
    #[error("invalid leveldb path: {0}")]
    InvalidPath(PathBuf),

    #[error("database is locked by another process (is the game running?): {0}")]
    Locked(String),

    #[error("key not found in database: {0}")]
    KeyNotFound(String),

    #[error("leveldb error: {0}")]
    Store(String),
}

fn status_error(status: Status) -> LdbError {
    match status.code {
        StatusCode::LockError => LdbError::Locked(status.err),
        _ => LdbError::Store(status.err),
    }
}

/// Derive the store key for a game installation.
///
/// Deterministic and byte-for-byte identical to the key the game's own
/// Local Storage writes: separators are normalized to `/` and spaces become
/// `%20` (the only escaping observed in the stored keys). Paths differing
/// only by a literal `%20` versus a space therefore collide, same as in the
/// game's own derivation.
///
/// The installation path does not have to exist; it is only key material.
pub fn db_key(install_path: &Path) -> Vec<u8> {
    let path = install_path
        .to_string_lossy()
        .replace('\\', "/")
        .replace(' ', "%20");
    let mut key = Vec::with_capacity(KEY_PREFIX.len() + path.len() + KEY_SUFFIX.len());
    key.extend_from_slice(KEY_PREFIX);
    key.extend_from_slice(path.as_bytes());
    key.extend_from_slice(KEY_SUFFIX);
    key
}

/// An open handle on the game's Local Storage LevelDB.
///
/// Hold it only as long as one read or write needs; the game client expects
/// to own this store. The handle is released when the value drops, on every
/// exit path; [`SaveDb::close`] additionally surfaces shutdown errors.
pub struct SaveDb {
    db: DB,
}

impl SaveDb {
    /// Open the store at `path`.
    ///
    /// With `create_if_missing = false` the path must already be a LevelDB
    /// directory; a missing directory is reported as [`LdbError::InvalidPath`]
    /// before LevelDB ever touches it. A store locked by another process
    /// fails with [`LdbError::Locked`].
    pub fn open(path: &Path, create_if_missing: bool) -> Result<Self, LdbError> {
        if !create_if_missing && !path.is_dir() {
            return Err(LdbError::InvalidPath(path.to_path_buf()));
        }
        let mut opt = Options::default();
        opt.create_if_missing = create_if_missing;
        // Lock contention is reported as LockError across processes and as
        // AlreadyExists ("lock is held") within one; both mean the store is
        // in use, most likely by the game client.
        let db = DB::open(path, opt).map_err(|status| match status.code {
            StatusCode::LockError | StatusCode::AlreadyExists => LdbError::Locked(status.err),
            _ => LdbError::Store(status.err),
        })?;
        Ok(SaveDb { db })
    }

    /// Read a record's value, failing with [`LdbError::KeyNotFound`] if the
    /// key is absent.
    pub fn get(&mut self, key: &[u8]) -> Result<Vec<u8>, LdbError> {
        self.db
            .get(key)
            .ok_or_else(|| LdbError::KeyNotFound(String::from_utf8_lossy(key).into_owned()))
    }

    /// Fully replace the value stored under `key`, flushing to disk before
    /// returning. No other key is observed or altered.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), LdbError> {
        self.db.put(key, value).map_err(status_error)?;
        self.db.flush().map_err(status_error)
    }

    /// Close the handle, surfacing any shutdown error.
    pub fn close(mut self) -> Result<(), LdbError> {
        self.db.close().map_err(status_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod key_derivation {
        use super::*;

        #[test]
        fn matches_the_game_client() {
            let key = db_key(Path::new(
                "C:/Program Files (x86)/Steam/steamapps/common/Legends of Idleon",
            ));
            let expected: Vec<u8> = [
                &b"_file://\x00\x01/"[..],
                b"C:/Program%20Files%20(x86)/Steam/steamapps/common/Legends%20of%20Idleon",
                b"/resources/app.asar/distBuild/static/game/index.html:mySave",
            ]
            .concat();
            assert_eq!(key, expected);
        }

        #[test]
        fn deterministic() {
            let path = Path::new("D:/Games/Legends of Idleon");
            assert_eq!(db_key(path), db_key(path));
        }

        #[test]
        fn backslashes_normalize_to_forward_slashes() {
            assert_eq!(
                db_key(Path::new("C:\\Games\\Idleon")),
                db_key(Path::new("C:/Games/Idleon"))
            );
        }
    }

    mod store {
        use super::*;

        #[test]
        fn put_then_get_round_trips() {
            let dir = tempfile::tempdir().unwrap();
            let mut db = SaveDb::open(dir.path(), true).unwrap();
            db.put(b"K1", b"OLD").unwrap();
            assert_eq!(db.get(b"K1").unwrap(), b"OLD");
            db.close().unwrap();
        }

        #[test]
        fn put_does_not_touch_other_keys() {
            let dir = tempfile::tempdir().unwrap();
            let mut db = SaveDb::open(dir.path(), true).unwrap();
            db.put(b"K1", b"OLD").unwrap();
            db.put(b"K2", b"NEW").unwrap();
            assert_eq!(db.get(b"K1").unwrap(), b"OLD");
            db.close().unwrap();
        }

        #[test]
        fn put_fully_replaces_a_value() {
            let dir = tempfile::tempdir().unwrap();
            let mut db = SaveDb::open(dir.path(), true).unwrap();
            db.put(b"K1", b"a much longer original value").unwrap();
            db.put(b"K1", b"short").unwrap();
            assert_eq!(db.get(b"K1").unwrap(), b"short");
            db.close().unwrap();
        }

        #[test]
        fn values_persist_across_reopen() {
            let dir = tempfile::tempdir().unwrap();
            {
                let mut db = SaveDb::open(dir.path(), true).unwrap();
                db.put(b"K1", b"kept").unwrap();
                db.close().unwrap();
            }
            let mut db = SaveDb::open(dir.path(), false).unwrap();
            assert_eq!(db.get(b"K1").unwrap(), b"kept");
        }

        #[test]
        fn missing_key_is_reported() {
            let dir = tempfile::tempdir().unwrap();
            let mut db = SaveDb::open(dir.path(), true).unwrap();
            assert!(matches!(db.get(b"nope"), Err(LdbError::KeyNotFound(_))));
        }

        #[test]
        fn missing_directory_is_rejected() {
            let dir = tempfile::tempdir().unwrap();
            let missing = dir.path().join("not-here");
            assert!(matches!(
                SaveDb::open(&missing, false),
                Err(LdbError::InvalidPath(_))
            ));
        }

        #[test]
        fn locked_store_fails_fast() {
            let dir = tempfile::tempdir().unwrap();
            let mut held = SaveDb::open(dir.path(), true).unwrap();
            held.put(b"K1", b"v").unwrap();
            assert!(matches!(
                SaveDb::open(dir.path(), false),
                Err(LdbError::Locked(_))
            ));
            held.close().unwrap();
        }
    }
}
