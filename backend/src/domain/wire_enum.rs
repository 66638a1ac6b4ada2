//! Closed string enumerations shared by storage, HTTP and payment metadata.
//!
//! Every value is persisted and exchanged as a lowercase token, so the
//! `Display`, `FromStr` and serde forms are generated from a single table.

macro_rules! wire_enum {
    (
        $(#[$outer:meta])*
        pub enum $name:ident / $error:ident ($what:literal) {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $token:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                $variant,
            )+
        }

        #[doc = concat!("Error returned when parsing an unknown ", $what, ".")]
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $error(pub String);

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Stable wire token.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $token,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::fmt::Display for $error {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!("invalid ", $what, ": {}"), self.0)
            }
        }

        impl std::error::Error for $error {}

        impl std::str::FromStr for $name {
            type Err = $error;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($token => Ok(Self::$variant),)+
                    other => Err($error(other.to_owned())),
                }
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use wire_enum;

#[cfg(test)]
mod tests {
    wire_enum! {
        /// Colours used only by these tests.
        pub enum Colour / ParseColourError ("colour") {
            Red => "red",
            DeepBlue => "deep_blue",
        }
    }

    #[test]
    fn tokens_round_trip_through_from_str() {
        for colour in Colour::ALL {
            assert_eq!(colour.as_str().parse::<Colour>(), Ok(*colour));
        }
    }

    #[test]
    fn unknown_tokens_are_reported() {
        let err = "green".parse::<Colour>().expect_err("green is unknown");
        assert_eq!(err.to_string(), "invalid colour: green");
    }

    #[test]
    fn serde_uses_the_wire_token() {
        let json = serde_json::to_string(&Colour::DeepBlue).expect("serialise");
        assert_eq!(json, "\"deep_blue\"");
        let back: Colour = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back, Colour::DeepBlue);
    }
}
