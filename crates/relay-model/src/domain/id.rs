use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a string-backed identifier newtype.
///
/// Identifiers are compared and hashed by their textual value and serialize transparently.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Borrow the identifier as a string slice.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` if the identifier is empty or whitespace.
            #[inline]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Returns a fresh random identifier (UUID v4, hyphenless).
fn random_id() -> String {
    Uuid::new_v4().simple().to_string()
}

string_id!(
    /// Globally unique identifier of a one-shot task.
    ///
    /// Minted by the dispatch coordinator at submission time and never reused.
    TaskId
);

impl TaskId {
    /// Generate a new random task id.
    pub fn generate() -> Self {
        Self(random_id())
    }
}

string_id!(
    /// Owning account (tenant) of tasks, workers and perpetual tasks.
    AccountId
);

string_id!(
    /// Identity of a remote worker agent.
    WorkerId
);

string_id!(
    /// Identifier of a perpetual (recurring) task.
    PerpetualTaskId
);

impl PerpetualTaskId {
    /// Generate a new random perpetual task id.
    pub fn generate() -> Self {
        Self(random_id())
    }
}

string_id!(
    /// Opaque, unguessable handle routing an async result back to its caller.
    CallbackToken
);

impl CallbackToken {
    /// Mint a new token. Tokens carry 122 random bits and are never reused.
    pub fn generate() -> Self {
        Self(random_id())
    }
}
