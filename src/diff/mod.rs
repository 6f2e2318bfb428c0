//! Position alignment across raters.
//!
//! The aligner walks every rater's annotation graphs, asks the layer
//! discriminators for `(Position, labels)` pairs and groups them into
//! configuration sets.
//!
//! ## Ordering
//!
//! Configuration sets appear in first-sight order: inputs are walked in the
//! order given, adapters in declaration order, annotations in document
//! order. A position is appended when it is first produced by any rater;
//! later raters fill in the existing slot. The order does not depend on any
//! hash map iteration order, so the same inputs always give the same
//! [`DiffResult`].

pub mod result;

use std::collections::HashMap;

use crate::layer::DiffAdapter;
use crate::store::{AnnotationGraph, AnnotationId};
use crate::types::{rater, AnnotationUnit, ConfigurationSet, Position, RaterId};

pub use result::DiffResult;

/// Error type for diff operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DiffError {
    /// Unsupported layer / feature combination.
    #[error("Invalid configuration for layer {layer}: {reason}")]
    Configuration {
        /// Layer name.
        layer: String,
        /// What is wrong.
        reason: String,
    },
    /// A feature value does not have the declared shape.
    #[error("Feature {layer}.{feature} of annotation {annotation}: expected {expected}, found {found}")]
    FeatureTypeMismatch {
        /// Layer name.
        layer: String,
        /// Feature name.
        feature: String,
        /// Offending annotation.
        annotation: AnnotationId,
        /// Declared shape.
        expected: &'static str,
        /// Actual shape.
        found: &'static str,
    },
    /// A reference points to a missing annotation.
    #[error("Annotation {annotation} of layer {layer} has a dangling reference in feature {feature}")]
    DanglingReference {
        /// Layer name.
        layer: String,
        /// Feature holding the reference.
        feature: String,
        /// Annotation holding the reference.
        annotation: AnnotationId,
    },
}

/// Groups the annotations of several raters into configuration sets.
#[derive(Debug, Clone)]
pub struct PositionAligner {
    adapters: Vec<DiffAdapter>,
}

impl PositionAligner {
    /// Create an aligner. Fails if any adapter is misconfigured.
    pub fn new(adapters: Vec<DiffAdapter>) -> Result<Self, DiffError> {
        for adapter in &adapters {
            adapter.validate()?;
        }
        let mut layers: Vec<&str> = adapters.iter().map(|a| a.layer.as_str()).collect();
        layers.sort_unstable();
        if let Some(pair) = layers.windows(2).find(|w| w[0] == w[1]) {
            return Err(DiffError::Configuration {
                layer: pair[0].to_string(),
                reason: "layer has more than one adapter".to_string(),
            });
        }
        Ok(Self { adapters })
    }

    /// Aligner for a single layer.
    pub fn single(adapter: DiffAdapter) -> Result<Self, DiffError> {
        Self::new(vec![adapter])
    }

    /// The adapters of this aligner.
    pub fn adapters(&self) -> &[DiffAdapter] {
        &self.adapters
    }

    /// Align the given `(rater, document)` inputs.
    ///
    /// A rater may appear several times, once per document. Raters are
    /// ordered by first appearance.
    pub fn align<G>(&self, inputs: &[(RaterId, &G)]) -> Result<DiffResult, DiffError>
    where
        G: AnnotationGraph + ?Sized,
    {
        let raters = rater::first_seen(inputs.iter().map(|(r, _)| r));

        let mut sets: Vec<ConfigurationSet> = Vec::new();
        let mut index: HashMap<Position, usize> = HashMap::new();

        for (rater, graph) in inputs {
            for adapter in &self.adapters {
                for annotation in graph.select(&adapter.layer) {
                    for (position, labels) in adapter.units(*graph, annotation)? {
                        let unit = AnnotationUnit {
                            rater: rater.clone(),
                            annotation: annotation.id,
                            extent: annotation.extent(),
                            labels,
                        };
                        let slot = match index.get(&position) {
                            Some(&slot) => slot,
                            None => {
                                sets.push(ConfigurationSet::new(position.clone()));
                                index.insert(position, sets.len() - 1);
                                sets.len() - 1
                            }
                        };
                        if !sets[slot].add(unit) {
                            tracing::trace!(
                                rater = %rater,
                                annotation = %annotation.id,
                                position = %sets[slot].position(),
                                "Ignoring identical unit at occupied position"
                            );
                        }
                    }
                }
            }
        }

        for set in &mut sets {
            set.classify(&raters);
        }

        let result = DiffResult::new(raters, self.adapters.clone(), sets);
        tracing::debug!(
            raters = result.raters().len(),
            sets = result.size(),
            differing = result.differing_configuration_sets().len(),
            incomplete = result.incomplete_configuration_sets().len(),
            "Alignment finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::FeatureDef;
    use crate::store::InMemoryDocument;
    use crate::types::Tag;

    fn ne_doc(spans: &[(usize, usize, &str)]) -> InMemoryDocument {
        let mut doc = InMemoryDocument::new("doc", "John lives in Berlin now.");
        for (begin, end, value) in spans {
            doc.annotate("NamedEntity", *begin, *end).feature("value", *value).add();
        }
        doc
    }

    fn aligner() -> PositionAligner {
        PositionAligner::single(DiffAdapter::span("NamedEntity").with_feature(FeatureDef::single("value")))
            .unwrap()
    }

    #[test]
    fn test_first_sight_order() {
        let a = ne_doc(&[(14, 20, "LOC")]);
        let b = ne_doc(&[(0, 4, "PER"), (14, 20, "LOC")]);

        let diff = aligner()
            .align(&[(RaterId::from("a"), &a), (RaterId::from("b"), &b)])
            .unwrap();

        let positions: Vec<String> = diff
            .configuration_sets()
            .iter()
            .map(|s| s.position().to_string())
            .collect();
        assert_eq!(positions, vec!["NamedEntity[doc] 14-20", "NamedEntity[doc] 0-4"]);
        assert!(diff.configuration_sets()[0].has_tag(Tag::Complete));
        assert!(diff.configuration_sets()[1].has_tag(Tag::IncompletePosition));
    }

    #[test]
    fn test_self_overlap_stays_distinct() {
        let a = ne_doc(&[(0, 4, "PER"), (0, 10, "PER")]);
        let b = ne_doc(&[(0, 4, "PER")]);

        let diff = aligner()
            .align(&[(RaterId::from("a"), &a), (RaterId::from("b"), &b)])
            .unwrap();

        assert_eq!(diff.size(), 2);
        assert_eq!(diff.incomplete_configuration_sets().len(), 1);
        assert!(diff.differing_configuration_sets().is_empty());
    }

    #[test]
    fn test_label_difference() {
        let a = ne_doc(&[(0, 4, "PER")]);
        let b = ne_doc(&[(0, 4, "ORG")]);

        let diff = aligner()
            .align(&[(RaterId::from("a"), &a), (RaterId::from("b"), &b)])
            .unwrap();

        assert_eq!(diff.differing_configuration_sets().len(), 1);
    }

    #[test]
    fn test_rejects_two_adapters_for_one_layer() {
        let result = PositionAligner::new(vec![DiffAdapter::span("Span"), DiffAdapter::span("Span")]);
        assert!(matches!(result, Err(DiffError::Configuration { .. })));
    }

    #[test]
    fn test_misconfigured_adapter_fails_before_alignment() {
        let adapter = DiffAdapter::span("Span")
            .with_feature(FeatureDef::single("value"))
            .with_feature(FeatureDef::single("value"));
        assert!(PositionAligner::single(adapter).is_err());
    }
}
