//! Macro for implementing Display and FromStr for string-keyed enums
//!
//! Configuration enums are written as lowercase strings in env vars and
//! config files. This macro generates both directions of that mapping from a
//! single table.
//!
//! # Example
//!
//! ```rust
//! use authloop_domain::impl_str_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum LogFormat {
//!     Pretty,
//!     Json,
//! }
//!
//! impl_str_enum_conversions!(LogFormat {
//!     Pretty => "pretty",
//!     Json => "json",
//! });
//!
//! assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
//! ```

/// Implements Display and FromStr traits for string-keyed enums
///
/// - Display writes the lowercase key
/// - FromStr accepts any casing and trims surrounding whitespace
#[macro_export]
macro_rules! impl_str_enum_conversions {
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

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
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
    enum Transport {
        Body,
        Header,
    }

    impl_str_enum_conversions!(Transport {
        Body => "body",
        Header => "header",
    });

    #[test]
    fn test_display_conversion() {
        assert_eq!(Transport::Body.to_string(), "body");
        assert_eq!(Transport::Header.to_string(), "header");
    }

    #[test]
    fn test_fromstr_ignores_case_and_whitespace() {
        assert_eq!(Transport::from_str("HEADER").unwrap(), Transport::Header);
        assert_eq!(Transport::from_str(" Body ").unwrap(), Transport::Body);
    }

    #[test]
    fn test_fromstr_invalid() {
        let err = Transport::from_str("cookie").unwrap_err();
        assert!(err.contains("Invalid Transport"));
        assert!(err.contains("cookie"));
    }
}
