//! `define_port_error!`: port error enums with snake_case constructors.
//!
//! Every variant becomes a `thiserror` message plus a constructor taking
//! `impl Into<T>` for each field, so adapters can write
//! `OrderRepositoryError::query(err.to_string())`.

macro_rules! define_port_error {
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        // `Self::Unit {}` is a valid expression, so one shape covers both
        // unit and struct variants.
        ::paste::paste! {
            impl $name {
                $(
                    pub fn [<$variant:snake>]($($($field: impl Into<$ty>),*)?) -> Self {
                        Self::$variant { $($($field: $field.into()),*)? }
                    }
                )*
            }
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    define_port_error! {
        pub enum ProviderError {
            Timeout => "provider timed out",
            Transport { message: String } => "transport: {message}",
            Rejected { status: u16, message: String } => "rejected ({status}): {message}",
        }
    }

    #[test]
    fn unit_variants_get_snake_case_constructors() {
        assert_eq!(ProviderError::timeout(), ProviderError::Timeout);
    }

    #[test]
    fn string_fields_accept_borrowed_text() {
        assert_eq!(ProviderError::transport("reset").to_string(), "transport: reset");
    }

    #[test]
    fn mixed_fields_keep_their_types() {
        let err = ProviderError::rejected(429_u16, "slow down");
        assert_eq!(err.to_string(), "rejected (429): slow down");
    }
}
