//! Driving port for unauthenticated access by share token.

use async_trait::async_trait;

use crate::domain::{Error, Genre, Occasion};

/// Public view of a shared song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedSong {
    pub recipient_name: String,
    pub author_name: String,
    pub occasion: Occasion,
    pub genre: Genre,
    pub duration_ms: Option<u32>,
    pub audio_url: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SharedSongQuery: Send + Sync {
    /// Metadata for the selected, complete variant behind `token`.
    async fn shared_song(&self, token: &str) -> Result<SharedSong, Error>;

    /// Audio bytes for the selected, complete variant behind `token`.
    async fn shared_audio(&self, token: &str) -> Result<Vec<u8>, Error>;
}
