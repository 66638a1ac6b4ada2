//! Versioned schema for payment-session metadata.
//!
//! The payment processor only stores flat string pairs, so every domain
//! reference a webhook needs travels through this module: [`encode`] when a
//! session is created and [`decode`] when the completed event comes back.
//! Decoding validates every key; a session we cannot decode never produces
//! an order.
//!
//! [`encode`]: CheckoutMetadata::encode
//! [`decode`]: CheckoutMetadata::decode

use std::collections::BTreeMap;

use thiserror::Error;

use super::customization::FREE_TEXT_MAX_CHARS;
use super::{CustomizationId, OrderId, OrderType, TweakAmendment, UserId};

/// Current schema version written by [`CheckoutMetadata::encode`].
pub const SCHEMA_VERSION: &str = "1";

/// Metadata keys. Values are always strings.
pub mod keys {
    pub const SCHEMA_VERSION: &str = "schema_version";
    pub const ORDER_TYPE: &str = "order_type";
    pub const USER_ID: &str = "user_id";
    pub const EMAIL: &str = "email";
    pub const CUSTOMIZATION_ID: &str = "customization_id";
    pub const ORIGINAL_ORDER_ID: &str = "original_order_id";
    pub const VARIANT_NUMBER: &str = "variant_number";
    pub const TIER_ID: &str = "tier_id";
    pub const QUANTITY: &str = "quantity";
    pub const SPECIAL_MEMORIES: &str = "special_memories";
    pub const THINGS_TO_AVOID: &str = "things_to_avoid";
    pub const PRONUNCIATION: &str = "pronunciation";
}

/// Metadata attached to a checkout session, one shape per order type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutMetadata {
    Base {
        user_id: UserId,
        email: String,
        customization_id: CustomizationId,
    },
    Tweak {
        user_id: UserId,
        original_order_id: OrderId,
        amendment: TweakAmendment,
    },
    Upsell {
        user_id: UserId,
        original_order_id: OrderId,
        variant_number: u8,
    },
    Bundle {
        user_id: UserId,
        tier_id: String,
        quantity: u32,
    },
}

/// Reasons metadata read back from the processor is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutMetadataError {
    #[error("unsupported metadata schema version: {0}")]
    UnsupportedVersion(String),
    #[error("metadata key `{0}` is missing")]
    MissingKey(&'static str),
    #[error("metadata key `{key}` is invalid: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

impl CheckoutMetadata {
    /// Owning user.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        match self {
            Self::Base { user_id, .. }
            | Self::Tweak { user_id, .. }
            | Self::Upsell { user_id, .. }
            | Self::Bundle { user_id, .. } => *user_id,
        }
    }

    /// Order type the session pays for.
    #[must_use]
    pub fn order_type(&self) -> OrderType {
        match self {
            Self::Base { .. } => OrderType::Base,
            Self::Tweak { .. } => OrderType::Tweak,
            Self::Upsell { .. } => OrderType::Upsell,
            Self::Bundle { .. } => OrderType::Bundle,
        }
    }

    /// Flatten into processor metadata.
    ///
    /// # Examples
    /// ```
    /// use songsmith::domain::{CheckoutMetadata, UserId};
    ///
    /// let metadata = CheckoutMetadata::Bundle {
    ///     user_id: UserId::random(),
    ///     tier_id: "bundle-3".into(),
    ///     quantity: 3,
    /// };
    /// let pairs = metadata.encode();
    /// assert_eq!(pairs.get("order_type").map(String::as_str), Some("bundle"));
    /// assert_eq!(CheckoutMetadata::decode(&pairs), Ok(metadata));
    /// ```
    #[must_use]
    pub fn encode(&self) -> BTreeMap<String, String> {
        let mut pairs = BTreeMap::new();
        let mut put = |key: &str, value: String| {
            pairs.insert(key.to_owned(), value);
        };
        put(keys::SCHEMA_VERSION, SCHEMA_VERSION.to_owned());
        put(keys::ORDER_TYPE, self.order_type().to_string());
        put(keys::USER_ID, self.user_id().to_string());
        match self {
            Self::Base {
                email,
                customization_id,
                ..
            } => {
                put(keys::EMAIL, email.clone());
                put(keys::CUSTOMIZATION_ID, customization_id.to_string());
            }
            Self::Tweak {
                original_order_id,
                amendment,
                ..
            } => {
                put(keys::ORIGINAL_ORDER_ID, original_order_id.to_string());
                let fields = [
                    (keys::SPECIAL_MEMORIES, &amendment.special_memories),
                    (keys::THINGS_TO_AVOID, &amendment.things_to_avoid),
                    (keys::PRONUNCIATION, &amendment.pronunciation),
                ];
                for (key, value) in fields {
                    if let Some(text) = value {
                        put(key, text.clone());
                    }
                }
            }
            Self::Upsell {
                original_order_id,
                variant_number,
                ..
            } => {
                put(keys::ORIGINAL_ORDER_ID, original_order_id.to_string());
                put(keys::VARIANT_NUMBER, variant_number.to_string());
            }
            Self::Bundle {
                tier_id, quantity, ..
            } => {
                put(keys::TIER_ID, tier_id.clone());
                put(keys::QUANTITY, quantity.to_string());
            }
        }
        pairs
    }

    /// Validate and rebuild metadata read back from the processor.
    pub fn decode(pairs: &BTreeMap<String, String>) -> Result<Self, CheckoutMetadataError> {
        let reader = Reader(pairs);
        let version = reader.required(keys::SCHEMA_VERSION)?;
        if version != SCHEMA_VERSION {
            return Err(CheckoutMetadataError::UnsupportedVersion(version.to_owned()));
        }
        let order_type: OrderType = reader.parsed(keys::ORDER_TYPE)?;
        let user_id: UserId = reader.parsed(keys::USER_ID)?;

        match order_type {
            OrderType::Base => Ok(Self::Base {
                user_id,
                email: reader.required(keys::EMAIL)?.to_owned(),
                customization_id: reader.parsed(keys::CUSTOMIZATION_ID)?,
            }),
            OrderType::Tweak => {
                let amendment = TweakAmendment::new(
                    reader.optional(keys::SPECIAL_MEMORIES),
                    reader.optional(keys::THINGS_TO_AVOID),
                    reader.optional(keys::PRONUNCIATION),
                )
                .map_err(|err| CheckoutMetadataError::InvalidValue {
                    key: keys::SPECIAL_MEMORIES,
                    reason: err.to_string(),
                })?;
                Ok(Self::Tweak {
                    user_id,
                    original_order_id: reader.parsed(keys::ORIGINAL_ORDER_ID)?,
                    amendment,
                })
            }
            OrderType::Upsell => Ok(Self::Upsell {
                user_id,
                original_order_id: reader.parsed(keys::ORIGINAL_ORDER_ID)?,
                variant_number: reader.parsed(keys::VARIANT_NUMBER)?,
            }),
            OrderType::Bundle => Ok(Self::Bundle {
                user_id,
                tier_id: reader.required(keys::TIER_ID)?.to_owned(),
                quantity: reader.parsed(keys::QUANTITY)?,
            }),
        }
    }
}

struct Reader<'a>(&'a BTreeMap<String, String>);

impl Reader<'_> {
    fn required(&self, key: &'static str) -> Result<&str, CheckoutMetadataError> {
        match self.0.get(key).map(|value| value.trim()) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(CheckoutMetadataError::MissingKey(key)),
        }
    }

    fn parsed<T>(&self, key: &'static str) -> Result<T, CheckoutMetadataError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.required(key)?
            .parse()
            .map_err(|err: T::Err| CheckoutMetadataError::InvalidValue {
                key,
                reason: err.to_string(),
            })
    }

    fn optional(&self, key: &'static str) -> Option<String> {
        self.0
            .get(key)
            .map(|value| value.chars().take(FREE_TEXT_MAX_CHARS).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn base() -> CheckoutMetadata {
        CheckoutMetadata::Base {
            user_id: UserId::random(),
            email: "ada@example.com".into(),
            customization_id: CustomizationId::random(),
        }
    }

    #[rstest]
    fn tweak_fields_travel_only_when_set() {
        let metadata = CheckoutMetadata::Tweak {
            user_id: UserId::random(),
            original_order_id: OrderId::random(),
            amendment: TweakAmendment {
                things_to_avoid: Some("no saxophone".into()),
                ..TweakAmendment::default()
            },
        };
        let pairs = metadata.encode();
        assert!(!pairs.contains_key(keys::SPECIAL_MEMORIES));
        assert_eq!(CheckoutMetadata::decode(&pairs), Ok(metadata));
    }

    #[rstest]
    #[case(keys::USER_ID)]
    #[case(keys::CUSTOMIZATION_ID)]
    #[case(keys::EMAIL)]
    fn missing_keys_are_reported(base: CheckoutMetadata, #[case] key: &'static str) {
        let mut pairs = base.encode();
        pairs.remove(key);
        assert_eq!(
            CheckoutMetadata::decode(&pairs),
            Err(CheckoutMetadataError::MissingKey(key))
        );
    }

    #[rstest]
    fn malformed_identifiers_are_invalid(base: CheckoutMetadata) {
        let mut pairs = base.encode();
        pairs.insert(keys::CUSTOMIZATION_ID.into(), "c1".into());
        assert!(matches!(
            CheckoutMetadata::decode(&pairs),
            Err(CheckoutMetadataError::InvalidValue { key: keys::CUSTOMIZATION_ID, .. })
        ));
    }

    #[rstest]
    fn other_schema_versions_are_refused(base: CheckoutMetadata) {
        let mut pairs = base.encode();
        pairs.insert(keys::SCHEMA_VERSION.into(), "2".into());
        assert_eq!(
            CheckoutMetadata::decode(&pairs),
            Err(CheckoutMetadataError::UnsupportedVersion("2".into()))
        );
    }

    #[rstest]
    fn unknown_order_types_are_invalid(base: CheckoutMetadata) {
        let mut pairs = base.encode();
        pairs.insert(keys::ORDER_TYPE.into(), "gift_card".into());
        assert!(matches!(
            CheckoutMetadata::decode(&pairs),
            Err(CheckoutMetadataError::InvalidValue { key: keys::ORDER_TYPE, .. })
        ));
    }
}
