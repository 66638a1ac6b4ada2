//! Driven port for the text-to-audio generation provider.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors raised by generation provider adapters.
    pub enum AudioGeneratorError {
        /// Network failure or timeout talking to the provider.
        Transport { message: String } => "generation provider transport failed: {message}",
        /// The provider asked us to back off.
        RateLimited { message: String } => "generation provider rate limited: {message}",
        /// The provider refused or failed the request.
        Rejected { status: u16, message: String } => "generation provider rejected request ({status}): {message}",
        /// The provider answered with no audio.
        EmptyAudio => "generation provider returned no audio",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioGenerator: Send + Sync {
    /// Render `prompt` to encoded audio of roughly `duration_ms`.
    async fn generate(&self, prompt: &str, duration_ms: u32) -> Result<Vec<u8>, AudioGeneratorError>;
}

/// Generator returning a short fixed payload, for local runs without a
/// provider key.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureAudioGenerator;

/// Bytes produced by [`FixtureAudioGenerator`].
pub const FIXTURE_AUDIO: &[u8] = b"ID3\x04\x00\x00\x00\x00\x00\x00";

#[async_trait]
impl AudioGenerator for FixtureAudioGenerator {
    async fn generate(&self, _prompt: &str, _duration_ms: u32) -> Result<Vec<u8>, AudioGeneratorError> {
        Ok(FIXTURE_AUDIO.to_vec())
    }
}
