//! Macro for implementing Display and FromStr for wire-level enums
//!
//! Upstream APIs name states and route segments with fixed strings
//! (`ATIVA`, `received-delivery`, ...). This macro maps each variant to its
//! wire string in both directions.
//!
//! # Example
//!
//! ```rust
//! use zeda_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum ChargeStatus {
//!     Active,
//!     Completed,
//! }
//!
//! impl_domain_status_conversions!(ChargeStatus {
//!     Active => "ATIVA",
//!     Completed => "CONCLUIDA",
//! });
//!
//! assert_eq!(ChargeStatus::Active.to_string(), "ATIVA");
//! assert_eq!("concluida".parse::<ChargeStatus>(), Ok(ChargeStatus::Completed));
//! ```

/// Implements `Display` (wire string) and case-insensitive `FromStr`, plus an
/// `as_str` accessor, for a fieldless enum.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Wire representation of this value
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $(if s.eq_ignore_ascii_case($str) {
                    return Ok(Self::$variant);
                })+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}
