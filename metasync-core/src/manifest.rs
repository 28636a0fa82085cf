//! Manifest: the per-tree map of relative path to content fingerprint.
//!
//! Serialized as YAML with top-level keys `files` and `compressed`. Older
//! publishers wrote a bare `{path: fingerprint}` mapping; decoding accepts
//! both shapes and always normalizes to the structured one. The local copy
//! lives at `<dir>/.s3-meta-sync` and is written with the `.tmp` + rename
//! pattern.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ManifestError};
use crate::types::FileMap;

/// Name of the manifest dotfile inside every synced tree (and remote folder).
pub const META_FILE: &str = ".s3-meta-sync";

/// Name of the corruption log written next to the manifest after a failed
/// download verification.
pub const CORRUPT_LOG: &str = "s3-meta-sync-corrupted.log";

/// Structured manifest payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub files: FileMap,
    /// Whether stored file bodies (never the manifest itself) are gzipped.
    #[serde(default)]
    pub compressed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestCompat {
    Structured(ManifestStructuredCompat),
    Legacy(FileMap),
}

#[derive(Debug, Deserialize)]
struct ManifestStructuredCompat {
    files: FileMap,
    #[serde(default)]
    compressed: bool,
}

impl Manifest {
    pub fn new(files: FileMap, compressed: bool) -> Self {
        Self { files, compressed }
    }

    /// Decode either payload shape.
    ///
    /// Fails with [`ManifestError::Corrupt`] when the payload is not a
    /// mapping of either shape at all, and with
    /// [`ManifestError::BadFingerprint`] when a value is not an MD5 digest.
    pub fn decode(bytes: &[u8]) -> Result<Self, ManifestError> {
        let compat = serde_yaml::from_slice::<ManifestCompat>(bytes)
            .map_err(|source| ManifestError::Corrupt { source })?;
        let manifest = match compat {
            ManifestCompat::Structured(m) => Self {
                files: m.files,
                compressed: m.compressed,
            },
            ManifestCompat::Legacy(files) => Self {
                files,
                compressed: false,
            },
        };

        if let Some((path, fingerprint)) = manifest
            .files
            .iter()
            .find(|(_, fingerprint)| !fingerprint.is_well_formed())
        {
            return Err(ManifestError::BadFingerprint {
                path: path.clone(),
                fingerprint: fingerprint.0.clone(),
            });
        }
        Ok(manifest)
    }

    /// Encode in the structured shape; output is deterministic.
    pub fn encode(&self) -> Result<Vec<u8>, ManifestError> {
        Ok(serde_yaml::to_string(self)?.into_bytes())
    }
}

/// Path to the manifest file inside `dir`.
pub fn meta_path(dir: &Path) -> PathBuf {
    dir.join(META_FILE)
}

/// Read `<dir>/.s3-meta-sync`.
///
/// Returns `None` if the file does not exist.
pub fn read_local(dir: &Path) -> Result<Option<Manifest>, ManifestError> {
    let path = meta_path(dir);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(&path, err)),
    };
    Manifest::decode(&bytes).map(Some)
}

/// Write `<dir>/.s3-meta-sync` atomically.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn write_local(dir: &Path, manifest: &Manifest) -> Result<(), ManifestError> {
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let path = meta_path(dir);
    let bytes = manifest.encode()?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, &bytes).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Fingerprint;
    use tempfile::TempDir;

    fn sample() -> Manifest {
        let mut files = FileMap::new();
        files.insert(
            "a.txt".to_string(),
            Fingerprint::from("49f68a5c8493ec2c0bf489821c21fc3b"),
        );
        files.insert(
            "dir/b.bin".to_string(),
            Fingerprint::from("d41d8cd98f00b204e9800998ecf8427e"),
        );
        Manifest::new(files, true)
    }

    #[test]
    fn missing_local_manifest_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(read_local(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn roundtrip_write_read_local() {
        let tmp = TempDir::new().unwrap();
        let manifest = sample();
        write_local(tmp.path(), &manifest).unwrap();
        assert_eq!(read_local(tmp.path()).unwrap(), Some(manifest));
    }

    #[test]
    fn tmp_file_cleaned_up_after_write() {
        let tmp = TempDir::new().unwrap();
        write_local(tmp.path(), &sample()).unwrap();
        let tmp_path = meta_path(tmp.path()).with_extension("tmp");
        assert!(
            !tmp_path.exists(),
            "tmp file should be removed after atomic rename"
        );
    }

    #[test]
    fn write_local_creates_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("not").join("yet");
        write_local(&dir, &sample()).unwrap();
        assert!(meta_path(&dir).is_file());
    }

    #[test]
    fn encode_is_sorted_and_stable() {
        let a = sample().encode().unwrap();
        let b = sample().encode().unwrap();
        assert_eq!(a, b);

        let text = String::from_utf8(a).unwrap();
        let first = text.find("a.txt").unwrap();
        let second = text.find("dir/b.bin").unwrap();
        assert!(first < second, "paths should serialize in sorted order");
        assert!(text.contains("compressed: true"));
    }

    #[test]
    fn structured_without_compressed_defaults_to_false() {
        let decoded = Manifest::decode(b"files:\n  a.txt: 49f68a5c8493ec2c0bf489821c21fc3b\n").unwrap();
        assert!(!decoded.compressed);
        assert_eq!(decoded.files.len(), 1);
    }

    #[test]
    fn garbage_payload_is_corrupt() {
        let err = Manifest::decode(b"- just\n- a\n- list\n").unwrap_err();
        assert!(matches!(err, ManifestError::Corrupt { .. }));

        let err = Manifest::decode(b"files: [unterminated").unwrap_err();
        assert!(matches!(err, ManifestError::Corrupt { .. }));
    }

    #[test]
    fn corrupt_local_manifest_surfaces_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(meta_path(tmp.path()), "- nope\n").unwrap();
        assert!(matches!(
            read_local(tmp.path()),
            Err(ManifestError::Corrupt { .. })
        ));
    }
}
