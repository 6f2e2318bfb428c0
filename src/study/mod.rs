//! Studies: the statistical view of a diff.
//!
//! A study is built from a [`DiffResult`] restricted to one layer and one
//! feature, under a set of [`AgreementTraits`](crate::policy::AgreementTraits).
//!
//! - [`CodingStudy`]: one categorical value per rater per item
//! - [`UnitizingStudy`]: valued intervals per rater over a shared continuum
//!
//! Both report the [`SetPartition`] used for diagnostics.

pub mod coding;
pub mod unitizing;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::diff::{DiffError, DiffResult};
use crate::layer::FeatureDef;
use crate::types::{ConfigurationSet, RaterId, Tag};

pub use coding::{CodingItem, CodingStudy};
pub use unitizing::{UnitizingStudy, UnitizingUnit};

/// Error type for study construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StudyError {
    /// The feature is not compared by the diff.
    #[error("Unknown feature {layer}.{feature}")]
    UnknownFeature {
        /// Layer name.
        layer: String,
        /// Feature name.
        feature: String,
    },
    /// The feature shape cannot be expressed in this kind of study.
    #[error("Feature {layer}.{feature} is not supported by {study} studies: {reason}")]
    UnsupportedFeature {
        /// Layer name.
        layer: String,
        /// Feature name.
        feature: String,
        /// Study kind.
        study: &'static str,
        /// Why not.
        reason: String,
    },
    /// The layer kind cannot be expressed in this kind of study.
    #[error("Layer {layer} is not supported by {study} studies")]
    UnsupportedLayer {
        /// Layer name.
        layer: String,
        /// Study kind.
        study: &'static str,
    },
    /// A label is not part of the closed tagset.
    #[error("Label {label:?} of feature {feature} at {position} is outside the tagset")]
    LabelOutsideTagset {
        /// Feature name.
        feature: String,
        /// Offending label.
        label: String,
        /// Where it was found.
        position: String,
    },
    /// Reading feature values failed.
    #[error(transparent)]
    Diff(#[from] DiffError),
}

/// Common view of coding and unitizing studies.
pub trait Study: fmt::Display {
    /// Raters in column order.
    fn raters(&self) -> &[RaterId];

    /// Diagnostic partition of the configuration sets.
    fn partition(&self) -> &SetPartition;

    /// Whether the study holds no observations.
    fn is_empty(&self) -> bool;
}

/// Partition of a feature's configuration sets, as shown to users.
///
/// Lists overlap: a set can be relevant, incomplete and differing at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetPartition {
    /// Every set of the feature.
    pub all: Vec<ConfigurationSet>,
    /// Sets with fewer than two members; no rater pair can be compared.
    pub irrelevant: Vec<ConfigurationSet>,
    /// Sets tagged [`Tag::Used`].
    pub relevant: Vec<ConfigurationSet>,
    /// Sets missing at least one rater.
    pub incomplete_by_position: Vec<ConfigurationSet>,
    /// Complete sets where some rater left the feature unset.
    pub incomplete_by_label: Vec<ConfigurationSet>,
    /// Sets where members differ in the feature.
    pub with_differences: Vec<ConfigurationSet>,
    /// Sets where a rater has several differently-labelled units.
    pub plurality: Vec<ConfigurationSet>,
    /// Sets retained by the study.
    pub used: Vec<ConfigurationSet>,
}

impl SetPartition {
    fn record(&mut self, set: &ConfigurationSet, feature: &str, used: bool) {
        let mut set = set.clone();
        if used {
            set.mark_used();
        }

        if set.members().len() < 2 {
            self.irrelevant.push(set.clone());
        }
        if set.has_tag(Tag::IncompletePosition) {
            self.incomplete_by_position.push(set.clone());
        }
        if set.has_tag(Tag::Complete) && set.has_unset_label(feature) {
            self.incomplete_by_label.push(set.clone());
        }
        if set.differs_in(feature) {
            self.with_differences.push(set.clone());
        }
        if set.has_tag(Tag::Stacked) {
            self.plurality.push(set.clone());
        }
        if used {
            self.relevant.push(set.clone());
            self.used.push(set.clone());
        }
        self.all.push(set);
    }
}

/// Resolve a feature of the diff or fail with [`StudyError::UnknownFeature`].
fn resolve_feature<'a>(diff: &'a DiffResult, layer: &str, feature: &str) -> Result<&'a FeatureDef, StudyError> {
    diff.feature(layer, feature).ok_or_else(|| StudyError::UnknownFeature {
        layer: layer.to_string(),
        feature: feature.to_string(),
    })
}

/// Configuration sets of one layer carrying one feature.
fn feature_sets<'a>(
    diff: &'a DiffResult,
    layer: &'a str,
    feature: &'a str,
) -> impl Iterator<Item = &'a ConfigurationSet> + 'a {
    diff.configuration_sets()
        .iter()
        .filter(move |s| s.position().layer() == layer && s.pertains_to(feature))
}

/// Check every label of the feature's sets against the tagset.
fn check_tagset<'a, I>(
    sets: I,
    feature: &str,
    traits: &crate::policy::AgreementTraits,
) -> Result<(), StudyError>
where
    I: IntoIterator<Item = &'a ConfigurationSet>,
{
    if traits.tagset.is_none() {
        return Ok(());
    }
    for set in sets {
        for unit in set.members().iter().chain(set.stacked()) {
            if let Some(Some(label)) = unit.label(feature) {
                let values: Vec<&str> = match label {
                    crate::types::Label::Single(value) => vec![value.as_str()],
                    crate::types::Label::Multi(values) => values.iter().map(String::as_str).collect(),
                };
                if let Some(bad) = values.into_iter().find(|v| !traits.admits(v)) {
                    return Err(StudyError::LabelOutsideTagset {
                        feature: feature.to_string(),
                        label: bad.to_string(),
                        position: set.position().to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}
