//! Macros to reduce boilerplate in the codebase

/// Macro to generate Display and FromStr implementations for enums
///
/// Parsing is ASCII case-insensitive, so `"quickbadges"` and `"quickBadges"`
/// both resolve to the variant displayed as `"quickBadges"`.
///
/// # Usage
///
/// ```rust,ignore
/// use crate::error::PantryError;
///
/// enum_display_fromstr!(
///     MyEnum,
///     PantryError::InvalidCollection,
///     {
///         Variant1 => "variant1",
///         Variant2 => "variant2",
///     }
/// );
/// ```
#[macro_export]
macro_rules! enum_display_fromstr {
    (
        $enum_name:ident,
        $error_variant:path,
        { $($variant:ident => $str:expr),+ $(,)? }
    ) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $($enum_name::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = $crate::error::PantryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($str) {
                        return Ok($enum_name::$variant);
                    }
                )+
                Err($error_variant(s.to_string()))
            }
        }
    };
}

/// Macro to generate only Display implementation for enums
///
/// # Usage
///
/// ```rust,ignore
/// enum_display!(
///     MyEnum,
///     {
///         Variant1 => "variant1",
///         Variant2 => "variant2",
///     }
/// );
/// ```
#[macro_export]
macro_rules! enum_display {
    (
        $enum_name:ident,
        { $($variant:ident => $str:expr),+ $(,)? }
    ) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $($enum_name::$variant => write!(f, $str),)+
                }
            }
        }
    };
}

#[cfg(test)]
mod test {
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum TestEnum {
        A,
        B,
        CamelCase,
    }

    enum_display_fromstr!(
        TestEnum,
        crate::error::PantryError::Other,
        { A => "a", B => "b", CamelCase => "camelCase" }
    );

    #[test]
    fn test_display() {
        assert_eq!(TestEnum::A.to_string(), "a");
        assert_eq!(TestEnum::B.to_string(), "b");
        assert_eq!(TestEnum::CamelCase.to_string(), "camelCase");
    }

    #[test]
    fn test_from_str_ignores_ascii_case() {
        assert_eq!("camelcase".parse::<TestEnum>().unwrap(), TestEnum::CamelCase);
        assert_eq!("CAMELCASE".parse::<TestEnum>().unwrap(), TestEnum::CamelCase);
        assert!("d".parse::<TestEnum>().is_err());
    }
}
