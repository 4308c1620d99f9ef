//! Normalized labels
//!
//! [`GroupName`] and [`MemberId`] can only be built through the normalizer, so
//! two values compare equal exactly when their normalized text matches. Both
//! order lexicographically on the normalized text, which is the order used in
//! every sorted output of this crate.
//!
//! # Example
//!
//! ```
//! use rosterwatch_core::{GroupName, MemberId};
//!
//! let group = GroupName::parse("\u{feff} Finance ").unwrap();
//! assert_eq!(group.as_str(), "Finance");
//!
//! // Blank labels are absent, never stored
//! assert!(MemberId::parse("   ").is_none());
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Borrow;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::normalize::normalize_non_empty;

/// Error returned when a label is empty after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyLabelError {
    /// The kind of label that failed to parse
    pub label_type: &'static str,
}

impl Display for EmptyLabelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} is empty after normalization", self.label_type)
    }
}

impl std::error::Error for EmptyLabelError {}

/// Macro to define a normalized label type
macro_rules! define_label {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Normalizes `raw` and wraps it, or returns `None` if nothing is left.
            #[must_use]
            pub fn parse(raw: &str) -> Option<Self> {
                normalize_non_empty(raw).map(Self)
            }

            /// Returns the normalized text.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the label and returns the normalized text.
            #[must_use]
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = EmptyLabelError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Self::parse(s).ok_or(EmptyLabelError {
                    label_type: stringify!($name),
                })
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

define_label!(
    /// Normalized key identifying a group within a roster.
    GroupName
);

define_label!(
    /// Normalized identifier of a group member.
    ///
    /// Usually the directory object id; a human-readable label is used only
    /// when no stable identifier is available.
    MemberId
);
