//! Database row models and the text-backed enums stored in their columns.
//!
//! Rows derive `sqlx::FromRow` and keep enumerations as `String`, the way they
//! are stored. Domain code parses them with `FromStr` when it needs to branch.

use thiserror::Error;

use crate::errors::AppError;

#[derive(Debug, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl From<UnknownVariant> for AppError {
    fn from(e: UnknownVariant) -> Self {
        AppError::Internal(anyhow::anyhow!(e))
    }
}

/// Declares a fieldless enum persisted as snake_case text.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            #[allow(dead_code)]
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::models::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::models::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use text_enum;

pub mod application;
pub mod approval;
pub mod interview;
pub mod job;
pub mod message;
pub mod notification;
pub mod offer;
pub mod onboarding;
pub mod requisition;
pub mod user;

#[cfg(test)]
mod tests {
    use super::user::Role;
    use std::str::FromStr;

    #[test]
    fn test_text_enum_round_trips_through_str_and_serde() {
        for role in Role::ALL {
            assert_eq!(Role::from_str(role.as_str()).unwrap(), *role);
            let json = serde_json::to_string(role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }

    #[test]
    fn test_unknown_text_is_rejected() {
        let err = Role::from_str("ceo").unwrap_err();
        assert_eq!(err.kind, "Role");
        assert_eq!(err.value, "ceo");
    }
}
