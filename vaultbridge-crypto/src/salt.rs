//! Per-install salt persistence.

use std::io;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use rand_core::{OsRng, RngCore};

pub const SALT_BYTES: usize = 32;

/// Reads or creates the 32-byte salt that lives beside the database.
pub struct SaltStore {
    path: PathBuf,
}

impl SaltStore {
    /// `dbpath` is the path to the encrypted database; the salt lives at
    /// `<dbpath>.salt`.
    pub fn for_database(dbpath: impl AsRef<Path>) -> Self {
        let mut path = dbpath.as_ref().as_os_str().to_owned();
        path.push(".salt");
        Self { path: PathBuf::from(path) }
    }

    /// Load the existing salt, or generate and persist a new one if the
    /// file is missing, the wrong length, or decodes to the all-zero
    /// corruption sentinel.
    pub fn load_or_create(&self) -> io::Result<[u8; SALT_BYTES]> {
        if let Some(salt) = self.try_read()? {
            return Ok(salt);
        }
        let salt = Self::generate();
        self.write(&salt)?;
        Ok(salt)
    }

    fn try_read(&self) -> io::Result<Option<[u8; SALT_BYTES]>> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let decoded = match STANDARD.decode(data.trim()) {
            Ok(d) => d,
            Err(_) => return Ok(None),
        };
        if decoded.len() != SALT_BYTES {
            return Ok(None);
        }
        let mut salt = [0u8; SALT_BYTES];
        salt.copy_from_slice(&decoded);
        if salt == [0u8; SALT_BYTES] {
            // Corruption sentinel — treat as absent and regenerate.
            return Ok(None);
        }
        Ok(Some(salt))
    }

    fn write(&self, salt: &[u8; SALT_BYTES]) -> io::Result<()> {
        let encoded = STANDARD.encode(salt);
        std::fs::write(&self.path, encoded)?;
        set_owner_only(&self.path)?;
        Ok(())
    }

    fn generate() -> [u8; SALT_BYTES] {
        let mut salt = [0u8; SALT_BYTES];
        OsRng.fill_bytes(&mut salt);
        salt
    }
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_and_reuses_salt() {
        let dir = tempfile::tempdir().unwrap();
        let dbpath = dir.path().join("store.db");
        let store = SaltStore::for_database(&dbpath);

        let first = store.load_or_create().unwrap();
        let second = store.load_or_create().unwrap();
        assert_eq!(first, second);
        assert_ne!(first, [0u8; SALT_BYTES]);
    }

    #[test]
    fn regenerates_on_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let dbpath = dir.path().join("store.db");
        let store = SaltStore::for_database(&dbpath);

        std::fs::write(&store.path, STANDARD.encode([0u8; SALT_BYTES])).unwrap();
        let salt = store.load_or_create().unwrap();
        assert_ne!(salt, [0u8; SALT_BYTES]);
    }

    #[test]
    fn regenerates_on_wrong_length() {
        let dir = tempfile::tempdir().unwrap();
        let dbpath = dir.path().join("store.db");
        let store = SaltStore::for_database(&dbpath);

        std::fs::write(&store.path, STANDARD.encode([1u8; 8])).unwrap();
        let salt = store.load_or_create().unwrap();
        assert_eq!(salt.len(), SALT_BYTES);
    }
}
