//! Plain HTTP(S) mirror backend and the shared `ureq` agent setup.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TransportError;
use crate::store::{ObjectStore, PutOptions};

/// Connection settings shared by every HTTP-speaking backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    pub open_timeout: Duration,
    pub read_timeout: Duration,
    pub ssl_verify: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            open_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            ssl_verify: true,
        }
    }
}

pub(crate) fn build_agent(settings: &HttpSettings) -> Result<ureq::Agent, TransportError> {
    let mut builder = ureq::AgentBuilder::new()
        .timeout_connect(settings.open_timeout)
        .timeout_read(settings.read_timeout);

    if !settings.ssl_verify {
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| TransportError::TlsSetup(e.to_string()))?;
        builder = builder.tls_connector(Arc::new(connector));
    }

    Ok(builder.build())
}

pub(crate) fn map_ureq_error(location: &str, err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Status(404, _) => TransportError::NotFound {
            location: location.to_string(),
        },
        ureq::Error::Status(status, _) => TransportError::Status {
            location: location.to_string(),
            status,
        },
        ureq::Error::Transport(transport) => {
            let message = transport.to_string();
            if looks_like_tls(&message) {
                TransportError::Ssl {
                    location: location.to_string(),
                    message,
                }
            } else {
                TransportError::Network {
                    location: location.to_string(),
                    message,
                }
            }
        }
    }
}

pub(crate) fn looks_like_tls(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    ["tls", "ssl", "certificate", "handshake"]
        .iter()
        .any(|needle| message.contains(needle))
}

/// Read a whole response body; failures mid-body are network errors.
pub(crate) fn read_body(location: &str, response: ureq::Response) -> Result<Vec<u8>, TransportError> {
    let mut body = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut body)
        .map_err(|e| TransportError::Network {
            location: location.to_string(),
            message: e.to_string(),
        })?;
    Ok(body)
}

/// Anonymous, read-only store: `get_object(key)` is `GET <base>/<key>`.
pub struct HttpStore {
    base: String,
    agent: ureq::Agent,
}

impl HttpStore {
    pub fn new(base: &str, settings: &HttpSettings) -> Result<Self, TransportError> {
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            agent: build_agent(settings)?,
        })
    }

    fn read_only(&self) -> TransportError {
        TransportError::ReadOnly {
            location: self.base.clone(),
        }
    }
}

impl ObjectStore for HttpStore {
    fn get_object(&self, key: &str) -> Result<Vec<u8>, TransportError> {
        let url = self.describe(key);
        tracing::debug!("GET {url}");
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| map_ureq_error(&url, e))?;
        read_body(&url, response)
    }

    fn put_object(&self, _key: &str, _body: &[u8], _options: &PutOptions) -> Result<(), TransportError> {
        Err(self.read_only())
    }

    fn delete_objects(&self, _keys: &[String]) -> Result<(), TransportError> {
        Err(self.read_only())
    }

    fn list_objects(&self, _prefix: &str) -> Result<Vec<String>, TransportError> {
        Err(self.read_only())
    }

    fn describe(&self, key: &str) -> String {
        format!("{}/{}", self.base, encode_key(key))
    }
}

/// Percent-encode a key for a URL path, keeping `/` and unreserved
/// characters (`A-Z a-z 0-9 - . _ ~`).
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_appended_encoded() {
        let store = HttpStore::new("https://mirror.example/site/", &HttpSettings::default()).unwrap();
        assert_eq!(
            store.describe("docs/read me.txt"),
            "https://mirror.example/site/docs/read%20me.txt"
        );
    }

    #[test]
    fn reserved_characters_are_encoded() {
        assert_eq!(encode_key("a b/c+d.txt"), "a%20b/c%2Bd.txt");
        assert_eq!(encode_key("ü"), "%C3%BC");
    }

    #[test]
    fn writes_are_refused() {
        let store = HttpStore::new("https://mirror.example", &HttpSettings::default()).unwrap();
        assert!(matches!(
            store.put_object("a", b"x", &PutOptions::default()),
            Err(TransportError::ReadOnly { .. })
        ));
        assert!(matches!(
            store.delete_objects(&["a".to_string()]),
            Err(TransportError::ReadOnly { .. })
        ));
    }

    #[test]
    fn tls_failures_are_classified_as_ssl() {
        assert!(looks_like_tls("tls connection init failed: handshake failure"));
        assert!(looks_like_tls("invalid peer certificate: UnknownIssuer"));
        assert!(!looks_like_tls("Connection refused (os error 111)"));
    }
}
