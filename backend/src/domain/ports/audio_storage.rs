//! Driven port for the blob store holding rendered audio.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors raised by blob storage adapters.
    pub enum AudioStorageError {
        Transport { message: String } => "audio storage transport failed: {message}",
        NotFound { path: String } => "audio object not found: {path}",
        Rejected { status: u16, message: String } => "audio storage rejected request ({status}): {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioStorage: Send + Sync {
    /// Write `bytes` at `path`, replacing any existing object.
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<(), AudioStorageError>;

    /// Issue a time-limited read URL for `path`.
    async fn signed_url(&self, path: &str) -> Result<String, AudioStorageError>;

    /// Read the object at `path`.
    async fn download(&self, path: &str) -> Result<Vec<u8>, AudioStorageError>;
}
