//! Domain types shared by every metasync crate.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// MD5 hex digest of a file's raw (pre-compression) bytes.
///
/// Two files are unchanged iff their fingerprints are equal strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    /// `true` when this looks like an MD5 digest: 32 lowercase hex chars.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == 32
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Relative path (forward slashes, no leading slash) → fingerprint.
///
/// A `BTreeMap` so that iteration, and therefore serialization, is sorted.
pub type FileMap = BTreeMap<String, Fingerprint>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_requires_lowercase_hex_of_md5_length() {
        assert!(Fingerprint::from("49f68a5c8493ec2c0bf489821c21fc3b").is_well_formed());
        assert!(!Fingerprint::from("49F68A5C8493EC2C0BF489821C21FC3B").is_well_formed());
        assert!(!Fingerprint::from("49f68a5c").is_well_formed());
        assert!(!Fingerprint::from("zzf68a5c8493ec2c0bf489821c21fc3b").is_well_formed());
    }
}
