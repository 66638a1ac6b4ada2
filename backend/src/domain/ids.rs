//! UUID-backed identifiers for the workflow aggregates.
//!
//! Each aggregate gets its own newtype so an order id can never be passed
//! where a variant id is expected. Identifiers cross the payment processor
//! as strings, hence the `FromStr`/`Display` pair.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Borrow the inner UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

define_id! {
    /// Identity of a user as issued by the identity provider.
    UserId
}
define_id! {
    /// Identity of a song brief.
    CustomizationId
}
define_id! {
    /// Identity of a purchase.
    OrderId
}
define_id! {
    /// Identity of one candidate render.
    VariantId
}
define_id! {
    /// Identity of a prepaid credit pack.
    BundleId
}
define_id! {
    /// Identity of a durable failure record.
    FailedJobId
}
