//! Macro for implementing Display and FromStr for domain enums
//!
//! Backend kinds, availability states and mutation kinds all travel as
//! lowercase strings in configuration, logs and breaker keys.
//!
//! # Example
//!
//! ```rust
//! use mdmlink_domain::impl_domain_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum ProbeOutcome {
//!     Granted,
//!     Denied,
//! }
//!
//! impl_domain_enum_conversions!(ProbeOutcome {
//!     Granted => "granted",
//!     Denied => "denied",
//! });
//!
//! assert_eq!(ProbeOutcome::Denied.to_string(), "denied");
//! assert_eq!("GRANTED".parse::<ProbeOutcome>(), Ok(ProbeOutcome::Granted));
//! ```

/// Implements Display and case-insensitive FromStr for a fieldless enum
///
/// String representations must be lowercase.
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Variant {
        Modern,
        AdvancedSearch,
    }

    impl_domain_enum_conversions!(Variant {
        Modern => "modern",
        AdvancedSearch => "advanced_search",
    });

    #[test]
    fn test_display_conversion() {
        assert_eq!(Variant::Modern.to_string(), "modern");
        assert_eq!(Variant::AdvancedSearch.to_string(), "advanced_search");
    }

    #[test]
    fn test_fromstr_is_case_insensitive() {
        assert_eq!(Variant::from_str("MODERN").unwrap(), Variant::Modern);
        assert_eq!(Variant::from_str("Advanced_Search").unwrap(), Variant::AdvancedSearch);
    }

    #[test]
    fn test_fromstr_invalid() {
        let result = Variant::from_str("classic");
        assert_eq!(result.unwrap_err(), "Invalid Variant: classic");
        assert!(Variant::from_str("").is_err());
    }
}
