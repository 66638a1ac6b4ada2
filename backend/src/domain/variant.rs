//! Candidate audio renders and their generation lifecycle.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::wire_enum::wire_enum;
use super::{OrderId, UserId, VariantId};

wire_enum! {
    /// Lifecycle of one variant: `pending → generating → complete | failed`.
    pub enum GenerationStatus / ParseGenerationStatusError ("generation status") {
        Pending => "pending",
        Generating => "generating",
        Complete => "complete",
        Failed => "failed",
    }
}

/// Precomputed blob path for a variant's audio.
///
/// # Examples
/// ```
/// use songsmith::domain::{storage_path_for, OrderId};
/// use uuid::Uuid;
///
/// let order = OrderId::from_uuid(Uuid::nil());
/// assert_eq!(
///     storage_path_for(order, 2),
///     "00000000-0000-0000-0000-000000000000/variant-2.mp3"
/// );
/// ```
#[must_use]
pub fn storage_path_for(order_id: OrderId, variant_number: u8) -> String {
    format!("{order_id}/variant-{variant_number}.mp3")
}

/// Opaque public credential for a shared song.
///
/// Tokens are 128 random bits rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareToken(String);

impl ShareToken {
    const HEX_LEN: usize = 32;

    /// Draw a fresh token from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0_u8; Self::HEX_LEN / 2];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Accept a token from an untrusted source. Anything that could not
    /// have been issued by [`ShareToken::generate`] yields `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed = raw.len() == Self::HEX_LEN
            && raw.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        well_formed.then(|| Self(raw.to_owned()))
    }

    /// Rehydrate a token read back from storage.
    #[must_use]
    pub fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    /// Borrow the token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShareToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored variant row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongVariant {
    pub id: VariantId,
    pub user_id: UserId,
    pub order_id: OrderId,
    pub variant_number: u8,
    pub generation_status: GenerationStatus,
    pub storage_path: String,
    pub duration_ms: Option<u32>,
    pub selected: bool,
    pub share_token: ShareToken,
    pub generation_started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SongVariant {
    /// Whether the variant is `generating` and was claimed before `cutoff`.
    #[must_use]
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.generation_status == GenerationStatus::Generating
            && self.generation_started_at.is_none_or(|started| started < cutoff)
    }

    /// Whether the variant is being rendered right now: `generating` and
    /// claimed at or after `cutoff`.
    #[must_use]
    pub fn is_in_flight(&self, cutoff: DateTime<Utc>) -> bool {
        self.generation_status == GenerationStatus::Generating
            && self.generation_started_at.is_some_and(|started| started >= cutoff)
    }

    /// Whether a reset may move this variant back to `pending`.
    #[must_use]
    pub fn is_resettable(&self, stale_cutoff: DateTime<Utc>) -> bool {
        self.generation_status == GenerationStatus::Failed || self.is_stale(stale_cutoff)
    }
}

/// A variant about to be inserted in `pending` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVariant {
    pub id: VariantId,
    pub user_id: UserId,
    pub order_id: OrderId,
    pub variant_number: u8,
    pub storage_path: String,
    pub share_token: ShareToken,
}

impl NewVariant {
    /// Prepare a pending variant with its storage path and share token.
    #[must_use]
    pub fn for_order(order_id: OrderId, user_id: UserId, variant_number: u8) -> Self {
        Self {
            id: VariantId::random(),
            user_id,
            order_id,
            variant_number,
            storage_path: storage_path_for(order_id, variant_number),
            share_token: ShareToken::generate(),
        }
    }

    /// Prepare variants `1..=count` for a new order.
    #[must_use]
    pub fn batch(order_id: OrderId, user_id: UserId, count: u8) -> Vec<Self> {
        (1..=count)
            .map(|n| Self::for_order(order_id, user_id, n))
            .collect()
    }
}

/// Result of one generation attempt, recorded on the claimed variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantResult {
    Complete { duration_ms: u32 },
    Failed,
}
