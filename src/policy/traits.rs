//! Study traits: the knobs that turn a diff into a study.
//!
//! Traits are an immutable value passed into the study builder. There are
//! no hidden defaults: what is not set here is not applied.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::canonical::fingerprint;

/// Configuration of how configuration sets become study items.
///
/// ## Parameters
///
/// - `exclude_incomplete`: drop sets not annotated by every rater under
///   consideration instead of coding the missing raters as missing values
/// - `tagset`: closed set of admissible labels; a label outside it is a
///   configuration error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgreementTraits {
    /// Drop incomplete positions from coding studies.
    pub exclude_incomplete: bool,
    /// Closed tagset the labels must come from.
    pub tagset: Option<BTreeSet<String>>,
}

impl Default for AgreementTraits {
    fn default() -> Self {
        Self {
            exclude_incomplete: true,
            tagset: None,
        }
    }
}

impl AgreementTraits {
    /// Traits that keep incomplete positions as missing values.
    pub fn including_incomplete() -> Self {
        Self {
            exclude_incomplete: false,
            ..Self::default()
        }
    }

    /// Restrict labels to a closed tagset.
    pub fn with_tagset<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tagset = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Whether a label is admissible under the tagset.
    pub fn admits(&self, label: &str) -> bool {
        match &self.tagset {
            Some(tags) => tags.contains(label),
            None => true,
        }
    }

    /// Deterministic hash of the trait values, recorded in study dumps.
    pub fn params_hash(&self) -> String {
        fingerprint(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_excludes_incomplete() {
        let traits = AgreementTraits::default();
        assert!(traits.exclude_incomplete);
        assert!(traits.admits("anything"));
    }

    #[test]
    fn test_tagset() {
        let traits = AgreementTraits::default().with_tagset(["PER", "LOC"]);
        assert!(traits.admits("PER"));
        assert!(!traits.admits("ORG"));
    }

    #[test]
    fn test_params_hash_changes_with_values() {
        let a = AgreementTraits::default();
        let b = AgreementTraits::including_incomplete();
        assert_ne!(a.params_hash(), b.params_hash());
        assert_eq!(a.params_hash(), AgreementTraits::default().params_hash());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let traits: AgreementTraits = serde_json::from_str("{}").unwrap();
        assert_eq!(traits, AgreementTraits::default());
    }
}
