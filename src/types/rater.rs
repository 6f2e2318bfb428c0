//! Rater identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one annotator's version of a document set.
///
/// Opaque to the engine. Raters keep the order in which they first appear
/// in the input, which is the order used for study columns and dumps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaterId(String);

impl RaterId {
    /// Create a new rater identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RaterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RaterId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RaterId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Collect raters in order of first appearance, skipping repeats.
pub(crate) fn first_seen<'a, I>(raters: I) -> Vec<RaterId>
where
    I: IntoIterator<Item = &'a RaterId>,
{
    let mut seen: Vec<RaterId> = Vec::new();
    for rater in raters {
        if !seen.contains(rater) {
            seen.push(rater.clone());
        }
    }
    seen
}
