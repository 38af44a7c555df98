//! Helper macro for generating domain port error enums.

/// Generate a `thiserror` enum whose variants all carry a single `message`
/// field, plus a snake_case constructor per variant that accepts anything
/// displayable (so adapters can hand backend errors straight in).
macro_rules! define_port_error {
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant {
                    /// Human-readable failure detail from the adapter.
                    message: String,
                },
            )*
        }

        ::paste::paste! {
            impl $name {
                $(
                    #[doc = concat!(
                        "Build [`", stringify!($name), "::", stringify!($variant),
                        "`] from any displayable failure detail."
                    )]
                    pub fn [<$variant:snake>](message: impl ::std::fmt::Display) -> Self {
                        Self::$variant {
                            message: message.to_string(),
                        }
                    }
                )*
            }
        }
    };
}

pub(crate) use define_port_error;
