//! Public access to a selected, complete variant by share token.
//!
//! Every miss (malformed token, unselected or incomplete variant, missing
//! brief) produces the same `not_found` so tokens cannot be probed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::error_mapping::{map_customization_error, map_order_error, map_storage_error};
use super::ports::{
    AudioStorage, CustomizationRepository, OrderRepository, SharedSong, SharedSongQuery,
};
use super::{Customization, Error, ShareToken, SongVariant};

/// Service implementing [`SharedSongQuery`].
#[derive(Clone)]
pub struct SharedSongService {
    orders: Arc<dyn OrderRepository>,
    customizations: Arc<dyn CustomizationRepository>,
    storage: Arc<dyn AudioStorage>,
}

fn song_not_found() -> Error {
    Error::not_found("song not found")
}

impl SharedSongService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        customizations: Arc<dyn CustomizationRepository>,
        storage: Arc<dyn AudioStorage>,
    ) -> Self {
        Self {
            orders,
            customizations,
            storage,
        }
    }

    async fn resolve(&self, raw: &str) -> Result<(SongVariant, Customization), Error> {
        let Some(token) = ShareToken::parse(raw) else {
            debug!("malformed share token");
            return Err(song_not_found());
        };
        let variant = self
            .orders
            .find_shared(&token)
            .await
            .map_err(map_order_error)?
            .ok_or_else(song_not_found)?;
        let customization_id = self
            .orders
            .find(variant.order_id)
            .await
            .map_err(map_order_error)?
            .and_then(|order| order.customization_id)
            .ok_or_else(song_not_found)?;
        let customization = self
            .customizations
            .find(customization_id)
            .await
            .map_err(map_customization_error)?
            .ok_or_else(song_not_found)?;
        Ok((variant, customization))
    }
}

#[async_trait]
impl SharedSongQuery for SharedSongService {
    async fn shared_song(&self, token: &str) -> Result<SharedSong, Error> {
        let (variant, customization) = self.resolve(token).await?;
        let audio_url = self
            .storage
            .signed_url(&variant.storage_path)
            .await
            .map_err(map_storage_error)?;
        Ok(SharedSong {
            recipient_name: customization.brief.recipient_name,
            author_name: customization.brief.author_name,
            occasion: customization.brief.occasion,
            genre: customization.brief.genre,
            duration_ms: variant.duration_ms,
            audio_url,
        })
    }

    async fn shared_audio(&self, token: &str) -> Result<Vec<u8>, Error> {
        let (variant, _) = self.resolve(token).await?;
        self.storage
            .download(&variant.storage_path)
            .await
            .map_err(map_storage_error)
    }
}
