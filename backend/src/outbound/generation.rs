//! Reqwest-backed text-to-music provider.
//!
//! One POST per variant; the response body is the encoded audio. The
//! request timeout is the only bound on how long a generation step runs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use zeroize::Zeroizing;

use super::http_support::{client_with_timeout, join_path, status_message};
use crate::domain::ports::{AudioGenerator, AudioGeneratorError};

const COMPOSE_PATH: &str = "v1/music";
const API_KEY_HEADER: &str = "xi-api-key";

/// Endpoint and credentials of the generation provider.
#[derive(Clone)]
pub struct GenerationProviderConfig {
    pub api_base: Url,
    pub api_key: Zeroizing<String>,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ComposeRequest<'a> {
    prompt: &'a str,
    music_length_ms: u32,
}

/// [`AudioGenerator`] calling the provider's compose endpoint.
pub struct HttpAudioGenerator {
    client: Client,
    endpoint: Url,
    api_key: Zeroizing<String>,
}

impl HttpAudioGenerator {
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built or the endpoint
    /// URL is invalid.
    pub fn new(config: GenerationProviderConfig) -> Result<Self, AudioGeneratorError> {
        let client = client_with_timeout(config.timeout)
            .map_err(|error| AudioGeneratorError::transport(error.to_string()))?;
        let endpoint = join_path(&config.api_base, COMPOSE_PATH)
            .map_err(|error| AudioGeneratorError::transport(format!("invalid api base: {error}")))?;
        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key,
        })
    }
}

fn map_transport_error(error: reqwest::Error) -> AudioGeneratorError {
    if error.is_timeout() {
        AudioGeneratorError::transport(format!("timed out: {error}"))
    } else {
        AudioGeneratorError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> AudioGeneratorError {
    let message = status_message(status, body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => AudioGeneratorError::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            AudioGeneratorError::transport(message)
        }
        _ => AudioGeneratorError::rejected(status.as_u16(), message),
    }
}

#[async_trait]
impl AudioGenerator for HttpAudioGenerator {
    async fn generate(&self, prompt: &str, duration_ms: u32) -> Result<Vec<u8>, AudioGeneratorError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&ComposeRequest {
                prompt,
                music_length_ms: duration_ms,
            })
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        if body.is_empty() {
            return Err(AudioGeneratorError::empty_audio());
        }
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::rate_limited(StatusCode::TOO_MANY_REQUESTS, "RateLimited")]
    #[case::gateway_timeout(StatusCode::GATEWAY_TIMEOUT, "Transport")]
    #[case::bad_prompt(StatusCode::UNPROCESSABLE_ENTITY, "Rejected")]
    #[case::outage(StatusCode::INTERNAL_SERVER_ERROR, "Rejected")]
    fn maps_statuses(#[case] status: StatusCode, #[case] expected: &str) {
        let error = map_status_error(status, br#"{"detail":"nope"}"#);
        let actual = match error {
            AudioGeneratorError::RateLimited { .. } => "RateLimited",
            AudioGeneratorError::Transport { .. } => "Transport",
            AudioGeneratorError::Rejected { .. } => "Rejected",
            AudioGeneratorError::EmptyAudio => "EmptyAudio",
        };
        assert_eq!(actual, expected);
    }

    #[rstest]
    fn request_body_uses_provider_field_names() {
        let body = serde_json::to_value(ComposeRequest {
            prompt: "a song",
            music_length_ms: 90_000,
        })
        .expect("serialises");
        assert_eq!(body, serde_json::json!({"prompt": "a song", "music_length_ms": 90_000}));
    }

    #[rstest]
    fn endpoint_sits_below_the_api_base() {
        let generator = HttpAudioGenerator::new(GenerationProviderConfig {
            api_base: Url::parse("https://music.test").expect("static url"),
            api_key: Zeroizing::new("key".to_owned()),
            timeout: Duration::from_secs(1),
        })
        .expect("builds");
        assert_eq!(generator.endpoint.as_str(), "https://music.test/v1/music");
    }
}
