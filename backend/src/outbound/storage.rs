//! Reqwest-backed object storage for rendered audio.
//!
//! Objects live in one bucket at their variant's storage path. Reads by
//! clients go through time-limited signed URLs; the public share route
//! proxies bytes through [`AudioStorage::download`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::http_support::{client_with_timeout, join_path, status_message};
use crate::domain::ports::{AudioStorage, AudioStorageError};

const OBJECT_PREFIX: &str = "storage/v1/object";
const SIGN_PREFIX: &str = "storage/v1/object/sign";
const SIGNED_URL_ROOT: &str = "storage/v1";

/// Endpoint, bucket and credentials of the blob store.
#[derive(Clone)]
pub struct StorageConfig {
    pub api_base: Url,
    pub service_key: Zeroizing<String>,
    pub bucket: String,
    pub signed_url_ttl: Duration,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

/// [`AudioStorage`] over the storage REST API.
pub struct HttpAudioStorage {
    client: Client,
    api_base: Url,
    service_key: Zeroizing<String>,
    bucket: String,
    signed_url_ttl: Duration,
}

impl HttpAudioStorage {
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn new(config: StorageConfig) -> Result<Self, AudioStorageError> {
        let client = client_with_timeout(config.timeout)
            .map_err(|error| AudioStorageError::transport(error.to_string()))?;
        Ok(Self {
            client,
            api_base: config.api_base,
            service_key: config.service_key,
            bucket: config.bucket,
            signed_url_ttl: config.signed_url_ttl,
        })
    }

    fn url(&self, prefix: &str, path: &str) -> Result<Url, AudioStorageError> {
        join_path(&self.api_base, &format!("{prefix}/{}/{path}", self.bucket))
            .map_err(|error| AudioStorageError::transport(format!("invalid object url: {error}")))
    }

    /// Signed paths come back relative to the storage root.
    fn absolute_signed_url(&self, relative: &str) -> Result<String, AudioStorageError> {
        join_path(&self.api_base, &format!("{SIGNED_URL_ROOT}/{}", relative.trim_start_matches('/')))
            .map(String::from)
            .map_err(|error| AudioStorageError::transport(format!("invalid signed url: {error}")))
    }
}

fn map_transport_error(error: reqwest::Error) -> AudioStorageError {
    AudioStorageError::transport(error.to_string())
}

fn map_status_error(path: &str, status: StatusCode, body: &[u8]) -> AudioStorageError {
    match status {
        StatusCode::NOT_FOUND => AudioStorageError::not_found(path),
        _ if status.is_server_error() => AudioStorageError::transport(status_message(status, body)),
        _ => AudioStorageError::rejected(status.as_u16(), status_message(status, body)),
    }
}

#[async_trait]
impl AudioStorage for HttpAudioStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<(), AudioStorageError> {
        let response = self
            .client
            .post(self.url(OBJECT_PREFIX, path)?)
            .bearer_auth(self.service_key.as_str())
            .header(reqwest::header::CONTENT_TYPE, "audio/mpeg")
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.bytes().await.map_err(map_transport_error)?;
        Err(map_status_error(path, status, body.as_ref()))
    }

    async fn signed_url(&self, path: &str) -> Result<String, AudioStorageError> {
        let response = self
            .client
            .post(self.url(SIGN_PREFIX, path)?)
            .bearer_auth(self.service_key.as_str())
            .json(&SignRequest {
                expires_in: self.signed_url_ttl.as_secs(),
            })
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(path, status, body.as_ref()));
        }
        let signed: SignResponse = serde_json::from_slice(body.as_ref()).map_err(|error| {
            AudioStorageError::rejected(status.as_u16(), format!("invalid sign response: {error}"))
        })?;
        self.absolute_signed_url(&signed.signed_url)
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, AudioStorageError> {
        let response = self
            .client
            .get(self.url(OBJECT_PREFIX, path)?)
            .bearer_auth(self.service_key.as_str())
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(path, status, body.as_ref()));
        }
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn storage() -> HttpAudioStorage {
        HttpAudioStorage::new(StorageConfig {
            api_base: Url::parse("https://store.test/").expect("static url"),
            service_key: Zeroizing::new("service".to_owned()),
            bucket: "songs".to_owned(),
            signed_url_ttl: Duration::from_secs(3600),
            timeout: Duration::from_secs(1),
        })
        .expect("builds")
    }

    #[rstest]
    fn object_urls_include_the_bucket(storage: HttpAudioStorage) {
        let url = storage
            .url(OBJECT_PREFIX, "order-1/variant-2.mp3")
            .expect("valid url");
        assert_eq!(
            url.as_str(),
            "https://store.test/storage/v1/object/songs/order-1/variant-2.mp3"
        );
    }

    #[rstest]
    fn signed_paths_become_absolute(storage: HttpAudioStorage) {
        let url = storage
            .absolute_signed_url("/object/sign/songs/o/variant-1.mp3?token=abc")
            .expect("valid url");
        assert_eq!(
            url,
            "https://store.test/storage/v1/object/sign/songs/o/variant-1.mp3?token=abc"
        );
    }

    #[rstest]
    #[case(StatusCode::NOT_FOUND, "NotFound")]
    #[case(StatusCode::BAD_GATEWAY, "Transport")]
    #[case(StatusCode::FORBIDDEN, "Rejected")]
    fn maps_statuses(#[case] status: StatusCode, #[case] expected: &str) {
        let actual = match map_status_error("a/b.mp3", status, b"") {
            AudioStorageError::NotFound { .. } => "NotFound",
            AudioStorageError::Transport { .. } => "Transport",
            AudioStorageError::Rejected { .. } => "Rejected",
        };
        assert_eq!(actual, expected);
    }
}
