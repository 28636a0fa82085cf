//! Parsing of sync endpoints.
//!
//! - `scheme://...` is a plain URL: anonymous and read-only.
//! - `bucket:key/prefix` is an object-store folder.
//! - anything else is a local directory.

use std::fmt;
use std::path::PathBuf;

use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote(RemoteSpec),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSpec {
    Bucket { bucket: String, prefix: String },
    Url { base: String },
}

impl RemoteSpec {
    /// Key prefix under which the synced tree lives.
    pub fn prefix(&self) -> &str {
        match self {
            RemoteSpec::Bucket { prefix, .. } => prefix,
            RemoteSpec::Url { .. } => "",
        }
    }

    pub fn is_url(&self) -> bool {
        matches!(self, RemoteSpec::Url { .. })
    }
}

impl fmt::Display for RemoteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteSpec::Bucket { bucket, prefix } => write!(f, "{bucket}:{prefix}"),
            RemoteSpec::Url { base } => base.fmt(f),
        }
    }
}

impl Location {
    pub fn parse(input: &str) -> Result<Self, TransportError> {
        if input.is_empty() {
            return Err(TransportError::InvalidLocation {
                input: input.to_string(),
                reason: "empty".to_string(),
            });
        }

        if input.contains("://") {
            return Ok(Location::Remote(RemoteSpec::Url {
                base: input.to_string(),
            }));
        }

        if let Some((bucket, prefix)) = input.split_once(':') {
            // A single letter before the colon is a Windows drive, not a bucket.
            let is_bucket = bucket.len() > 1 && !bucket.contains(['/', '\\']);
            if is_bucket {
                return Ok(Location::Remote(RemoteSpec::Bucket {
                    bucket: bucket.to_string(),
                    prefix: prefix.to_string(),
                }));
            }
        }

        Ok(Location::Local(PathBuf::from(input)))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Remote(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_read_only_remotes() {
        assert_eq!(
            Location::parse("https://mirror.example.com/assets").unwrap(),
            Location::Remote(RemoteSpec::Url {
                base: "https://mirror.example.com/assets".to_string()
            })
        );
    }

    #[test]
    fn bucket_and_prefix() {
        let loc = Location::parse("my-bucket:releases/v1").unwrap();
        assert_eq!(
            loc,
            Location::Remote(RemoteSpec::Bucket {
                bucket: "my-bucket".to_string(),
                prefix: "releases/v1".to_string()
            })
        );
    }

    #[test]
    fn bucket_root_has_empty_prefix() {
        let Location::Remote(spec) = Location::parse("my-bucket:").unwrap() else {
            panic!("expected remote");
        };
        assert_eq!(spec.prefix(), "");
    }

    #[test]
    fn paths_with_colons_after_a_slash_are_local() {
        assert_eq!(
            Location::parse("./weird:name").unwrap(),
            Location::Local(PathBuf::from("./weird:name"))
        );
        assert_eq!(
            Location::parse("/tmp/a:b").unwrap(),
            Location::Local(PathBuf::from("/tmp/a:b"))
        );
    }

    #[test]
    fn drive_letters_are_local() {
        assert!(!Location::parse("C:\\data").unwrap().is_remote());
    }

    #[test]
    fn plain_directories_are_local() {
        assert_eq!(
            Location::parse("public").unwrap(),
            Location::Local(PathBuf::from("public"))
        );
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(Location::parse("").is_err());
    }
}
