//! S3 backend over `aws-sdk-s3`.
//!
//! The SDK is async; [`S3Store`] owns a small tokio runtime and blocks on it
//! so the [`ObjectStore`] trait stays synchronous for the worker pool.
//! With a custom endpoint, addressing is path-style
//! (`<endpoint>/<bucket>/<key>`). Without credentials requests go out
//! unsigned, which only suits public reads.

use std::future::Future;

use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials as SdkCredentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectCannedAcl, ObjectIdentifier, ServerSideEncryption};
use aws_sdk_s3::Client;
use tokio::runtime::Runtime;

use metasync_core::Credentials;

use crate::error::TransportError;
use crate::http::{looks_like_tls, HttpSettings};
use crate::store::{ObjectStore, PutOptions, MAX_DELETE_BATCH};

pub const DEFAULT_REGION: &str = "us-east-1";

/// Worker threads for the store's runtime; requests are issued by the
/// sync pool, the runtime only drives their I/O.
const RUNTIME_THREADS: usize = 2;

#[derive(Debug, Clone, Default)]
pub struct S3Config {
    pub region: Option<String>,
    /// Scheme and authority, e.g. `http://localhost:9000`.
    pub endpoint: Option<String>,
    pub credentials: Option<Credentials>,
    pub http: HttpSettings,
}

pub struct S3Store {
    bucket: String,
    client: Client,
    runtime: Runtime,
}

impl S3Store {
    pub fn new(bucket: &str, config: &S3Config) -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(RUNTIME_THREADS)
            .thread_name("metasync-s3")
            .enable_all()
            .build()
            .map_err(|e| TransportError::Runtime(e.to_string()))?;

        if !config.http.ssl_verify {
            tracing::warn!(
                "certificate verification cannot be disabled for s3://{bucket}; \
                 use an http:// endpoint for test servers"
            );
        }

        let client = runtime.block_on(client_for(config));
        Ok(Self {
            bucket: bucket.to_string(),
            client,
            runtime,
        })
    }

    /// Run one SDK call to completion. Callers are plain threads, never
    /// tasks on this runtime.
    fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }
}

async fn client_for(config: &S3Config) -> Client {
    let region = config
        .region
        .clone()
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    let timeouts = TimeoutConfig::builder()
        .connect_timeout(config.http.open_timeout)
        .read_timeout(config.http.read_timeout)
        .build();

    // Retries belong to `RetryPolicy`; the SDK makes exactly one attempt.
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region))
        .timeout_config(timeouts)
        .retry_config(RetryConfig::disabled());
    loader = match &config.credentials {
        Some(credentials) => loader.credentials_provider(SdkCredentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            credentials.session_token.clone(),
            None,
            "metasync",
        )),
        None => loader.no_credentials(),
    };
    let shared = loader.load().await;

    let mut builder = aws_sdk_s3::config::Builder::from(&shared);
    if let Some(endpoint) = &config.endpoint {
        builder = builder
            .endpoint_url(endpoint.trim_end_matches('/'))
            .force_path_style(true);
    }
    Client::from_conf(builder.build())
}

/// `true` when a service error means the key does not exist.
fn is_missing_key(status: u16, code: Option<&str>) -> bool {
    status == 404 || matches!(code, Some("NoSuchKey" | "NotFound"))
}

fn map_sdk_error<E>(location: &str, err: SdkError<E, HttpResponse>) -> TransportError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let location = location.to_string();
    if let SdkError::ServiceError(context) = &err {
        let status = context.raw().status().as_u16();
        if is_missing_key(status, context.err().code()) {
            return TransportError::NotFound { location };
        }
        return TransportError::Status { location, status };
    }

    let message = DisplayErrorContext(&err).to_string();
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            if looks_like_tls(&message) {
                TransportError::Ssl { location, message }
            } else {
                TransportError::Network { location, message }
            }
        }
        _ => TransportError::BadResponse { location, message },
    }
}

impl ObjectStore for S3Store {
    fn get_object(&self, key: &str) -> Result<Vec<u8>, TransportError> {
        let location = self.describe(key);
        tracing::debug!("GET {location}");
        self.block_on(async {
            let output = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| map_sdk_error(&location, e))?;
            let body = output
                .body
                .collect()
                .await
                .map_err(|e| TransportError::Network {
                    location: location.clone(),
                    message: e.to_string(),
                })?;
            Ok(body.into_bytes().to_vec())
        })
    }

    fn put_object(
        &self,
        key: &str,
        body: &[u8],
        options: &PutOptions,
    ) -> Result<(), TransportError> {
        let location = self.describe(key);
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body.to_vec()));
        if let Some(content_type) = &options.content_type {
            request = request.content_type(content_type);
        }
        if let Some(encoding) = &options.content_encoding {
            request = request.content_encoding(encoding);
        }
        if let Some(acl) = &options.acl {
            request = request.acl(ObjectCannedAcl::from(acl.as_str()));
        }
        if let Some(sse) = &options.server_side_encryption {
            request = request.server_side_encryption(ServerSideEncryption::from(sse.as_str()));
        }

        tracing::debug!("PUT {location} ({} bytes)", body.len());
        self.block_on(request.send())
            .map_err(|e| map_sdk_error(&location, e))?;
        Ok(())
    }

    fn delete_objects(&self, keys: &[String]) -> Result<(), TransportError> {
        if keys.is_empty() {
            return Ok(());
        }
        let location = format!("s3://{}", self.bucket);
        if keys.len() > MAX_DELETE_BATCH {
            return Err(TransportError::BadResponse {
                location,
                message: format!(
                    "refusing to send {} keys in one delete request (limit {MAX_DELETE_BATCH})",
                    keys.len()
                ),
            });
        }

        let objects = keys
            .iter()
            .map(|key| {
                ObjectIdentifier::builder()
                    .key(key)
                    .build()
                    .map_err(|e| TransportError::BadResponse {
                        location: self.describe(key),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| TransportError::BadResponse {
                location: location.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!("DELETE {} keys from {location}", keys.len());
        let output = self
            .block_on(
                self.client
                    .delete_objects()
                    .bucket(&self.bucket)
                    .delete(delete)
                    .send(),
            )
            .map_err(|e| map_sdk_error(&location, e))?;

        // Quiet mode: only failures are reported back.
        if let Some(failure) = output.errors().first() {
            return Err(TransportError::BadResponse {
                location: self.describe(failure.key().unwrap_or_default()),
                message: failure.message().unwrap_or("delete failed").to_string(),
            });
        }
        Ok(())
    }

    fn list_objects(&self, prefix: &str) -> Result<Vec<String>, TransportError> {
        let location = format!("s3://{}/{prefix}", self.bucket);
        self.block_on(async {
            let mut keys = Vec::new();
            let mut token: Option<String> = None;

            loop {
                let mut request = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(prefix);
                if let Some(token) = &token {
                    request = request.continuation_token(token);
                }
                let page = request
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(&location, e))?;

                keys.extend(
                    page.contents()
                        .iter()
                        .filter_map(|object| object.key().map(str::to_string)),
                );
                if !page.is_truncated().unwrap_or(false) {
                    break;
                }
                token = page.next_continuation_token().map(str::to_string);
                if token.is_none() {
                    break;
                }
            }

            Ok(keys)
        })
    }

    fn describe(&self, key: &str) -> String {
        format!("s3://{}/{key}", self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::operation::get_object::GetObjectError;

    fn store(endpoint: Option<&str>) -> S3Store {
        S3Store::new(
            "my-bucket",
            &S3Config {
                endpoint: endpoint.map(str::to_string),
                credentials: Some(Credentials {
                    access_key_id: "AKID".to_string(),
                    secret_access_key: "SECRET".to_string(),
                    session_token: None,
                }),
                ..S3Config::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn locations_name_bucket_and_key() {
        assert_eq!(store(None).describe("dir/a.txt"), "s3://my-bucket/dir/a.txt");
    }

    #[test]
    fn missing_keys_are_recognised_by_status_or_code() {
        assert!(is_missing_key(404, None));
        assert!(is_missing_key(400, Some("NoSuchKey")));
        assert!(!is_missing_key(403, Some("AccessDenied")));
        assert!(!is_missing_key(500, None));
    }

    #[test]
    fn timeouts_are_network_errors() {
        let err: SdkError<GetObjectError, HttpResponse> =
            SdkError::timeout_error("read timed out");
        assert!(matches!(
            map_sdk_error("s3://my-bucket/a.txt", err),
            TransportError::Network { .. }
        ));
    }

    #[test]
    fn oversized_delete_is_refused_before_sending() {
        let s = store(Some("http://127.0.0.1:9"));
        let keys: Vec<String> = (0..=MAX_DELETE_BATCH).map(|i| format!("k{i}")).collect();
        assert!(matches!(
            s.delete_objects(&keys),
            Err(TransportError::BadResponse { .. })
        ));
    }
}
