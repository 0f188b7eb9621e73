//! Domain primitives for the quiz platform.
//!
//! Every enum here is persisted as its `as_str` value in a plain string
//! column, so the database never sees Rust discriminants.

pub mod events;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a stored or submitted string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $value),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum!(
    /// Account role. Creators and admins may author tests.
    Role, "role" {
        Admin => "admin",
        Creator => "creator",
        User => "user",
    }
);

impl Role {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    #[must_use]
    pub const fn can_create_content(&self) -> bool {
        matches!(self, Self::Admin | Self::Creator)
    }
}

string_enum!(
    QuestionType, "question type" {
        MultipleChoice => "multiple_choice",
        TrueFalse => "true_false",
        Text => "text",
        Matching => "matching",
    }
);

string_enum!(
    /// Column of a matching question an answer belongs to.
    MatchSide, "match side" {
        Left => "left",
        Right => "right",
    }
);

string_enum!(
    AttemptStatus, "attempt status" {
        InProgress => "in_progress",
        Finished => "finished",
    }
);

string_enum!(
    TokenType, "token type" {
        Access => "access",
        Refresh => "refresh",
    }
);

string_enum!(
    AiRequestType, "AI request type" {
        GenerateQuiz => "generate_quiz",
        ExplainAnswer => "explain_answer",
    }
);

string_enum!(
    AiRequestStatus, "AI request status" {
        Pending => "pending",
        Success => "success",
        Failed => "failed",
    }
);

string_enum!(
    /// Where a test's content came from.
    TestSource, "test source" {
        Manual => "manual",
        Ai => "ai",
    }
);

/// The authenticated caller, resolved by the auth middleware from a session
/// cookie or a bearer access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
    pub role: Role,
}

impl CurrentUser {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    #[must_use]
    pub const fn can_create_content(&self) -> bool {
        self.role.can_create_content()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_and_permissions() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
        assert!(Role::Admin.can_create_content());
        assert!(Role::Creator.can_create_content());
        assert!(!Role::User.can_create_content());
        assert!(!Role::Creator.is_admin());
    }

    #[test]
    fn test_unknown_variant_is_rejected() {
        let err = "essay".parse::<QuestionType>().unwrap_err();
        assert_eq!(err.kind, "question type");
        assert_eq!(err.value, "essay");
    }

    #[test]
    fn test_serde_uses_stored_names() {
        let json = serde_json::to_string(&QuestionType::MultipleChoice).unwrap();
        assert_eq!(json, "\"multiple_choice\"");
        let side: MatchSide = serde_json::from_str("\"right\"").unwrap();
        assert_eq!(side, MatchSide::Right);
    }
}
