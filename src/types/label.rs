//! Feature labels as compared across raters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value of a compared feature on one unit.
///
/// Array features are compared as sets: elements are sorted and
/// deduplicated on construction, so `{a, b}` equals `{b, a}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    /// A single primitive value.
    Single(String),
    /// The elements of a multi-valued feature.
    Multi(Vec<String>),
}

impl Label {
    /// Create a single-valued label.
    pub fn single(value: impl Into<String>) -> Self {
        Self::Single(value.into())
    }

    /// Create a multi-valued label. Returns `None` for an empty array,
    /// which counts as an unset feature.
    pub fn multi<I, S>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values: Vec<String> = values.into_iter().map(Into::into).collect();
        values.sort();
        values.dedup();
        if values.is_empty() {
            None
        } else {
            Some(Self::Multi(values))
        }
    }

    /// Get the single value, if this is a single-valued label.
    pub fn as_single(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::Multi(_) => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(value) => f.write_str(value),
            Self::Multi(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

/// Labels of one unit, keyed by feature name.
///
/// `None` means the unit exists but the feature is unset.
pub type Labels = BTreeMap<String, Option<Label>>;

/// Render an optional label for dumps.
pub(crate) fn display_label(label: Option<&Label>) -> String {
    match label {
        Some(label) => label.to_string(),
        None => "<unset>".to_string(),
    }
}
