//! Node identity kept in the credential cache directory.

use std::fs;
use std::hash::Hasher;
use std::io;
use std::path::Path;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use siphasher::sip::SipHasher13;
use tracing::debug;
use ztnc_core::NodeId;

pub const IDENTITY_FILE: &str = "identity.public";

/// Loads the node id stored in `cache_dir`, creating one on first use.
pub fn load_or_create(cache_dir: &Path) -> io::Result<NodeId> {
    let path = cache_dir.join(IDENTITY_FILE);
    match fs::read_to_string(&path) {
        Ok(text) => {
            let raw = u64::from_str_radix(text.trim(), 16).map_err(|err| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{}: {err}", path.display()),
                )
            })?;
            debug!(path = %path.display(), "loaded identity");
            Ok(NodeId::new(raw))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(cache_dir)?;
            let id = generate(cache_dir);
            fs::write(&path, format!("{id}\n"))?;
            debug!(path = %path.display(), node = %id, "created identity");
            Ok(id)
        }
        Err(err) => Err(err),
    }
}

/// Non-zero, not reserved (0xff prefix) 40-bit address.
fn generate(cache_dir: &Path) -> NodeId {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut salt = 0u64;
    loop {
        let mut hasher = SipHasher13::new();
        hasher.write(cache_dir.to_string_lossy().as_bytes());
        hasher.write_u32(process::id());
        hasher.write_u128(nanos);
        hasher.write_u64(salt);
        let id = NodeId::new(hasher.finish());
        if id.0 != 0 && id.0 >> 32 != 0xff {
            return id;
        }
        salt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let first = load_or_create(dir.path()).unwrap();
        let second = load_or_create(dir.path()).unwrap();
        assert_eq!(first, second);
        assert_ne!(first.0, 0);
    }

    #[test]
    fn test_corrupt_identity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(IDENTITY_FILE), "not hex").unwrap();
        let err = load_or_create(dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        load_or_create(&nested).unwrap();
        assert!(nested.join(IDENTITY_FILE).exists());
    }
}
