//! Unitizing studies: valued intervals over a shared continuum.
//!
//! Units are read straight from the raters' graphs, not from configuration
//! sets, so overlapping and duplicate units of one rater are all kept.
//! Several documents are laid out one after the other on a single
//! continuum in first-sight order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::{check_tagset, feature_sets, resolve_feature, SetPartition, Study, StudyError};
use crate::diff::{DiffError, DiffResult};
use crate::layer::{FeatureKind, LayerKind};
use crate::policy::AgreementTraits;
use crate::store::{Annotation, AnnotationGraph, FeatureValue};
use crate::types::RaterId;

/// One interval of one rater on the continuum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitizingUnit {
    /// Index into [`UnitizingStudy::raters`].
    pub rater: usize,
    /// Offset on the continuum.
    pub begin: usize,
    /// Length, always positive.
    pub length: usize,
    /// Category value.
    pub category: String,
}

/// Intervals of all raters for one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitizingStudy {
    layer: String,
    feature: String,
    raters: Vec<RaterId>,
    continuum_length: usize,
    units: Vec<UnitizingUnit>,
    traits_hash: String,
    partition: SetPartition,
}

struct RawUnit {
    document: usize,
    rater: usize,
    begin: usize,
    end: usize,
    category: String,
}

impl UnitizingStudy {
    /// Build a unitizing study for `(layer, feature)`.
    ///
    /// `inputs` are the graphs the diff was aligned from. Graphs of raters
    /// not in `diff.raters()` are only used to lay out the continuum.
    pub fn build<G>(
        diff: &DiffResult,
        inputs: &[(RaterId, &G)],
        layer: &str,
        feature: &str,
        traits: &AgreementTraits,
    ) -> Result<Self, StudyError>
    where
        G: AnnotationGraph + ?Sized,
    {
        let def = resolve_feature(diff, layer, feature)?.clone();
        let is_span = diff
            .adapter(layer)
            .map(|a| matches!(a.kind, LayerKind::Span))
            .unwrap_or(false);
        if !is_span {
            return Err(StudyError::UnsupportedLayer {
                layer: layer.to_string(),
                study: "unitizing",
            });
        }

        let raters = diff.raters().to_vec();
        let mut documents: Vec<(String, usize)> = Vec::new();
        let mut raw = Vec::new();

        for (rater, graph) in inputs {
            let document = match documents.iter().position(|(id, _)| id == graph.document_id()) {
                Some(index) => index,
                None => {
                    documents.push((graph.document_id().to_string(), 0));
                    documents.len() - 1
                }
            };
            documents[document].1 = documents[document].1.max(graph.text_length());

            let rater = match raters.iter().position(|r| r == rater) {
                Some(index) => index,
                None => continue,
            };

            for annotation in graph.select(layer) {
                if annotation.end <= annotation.begin {
                    tracing::trace!(annotation = %annotation.id, layer, "Skipping zero-length unit");
                    continue;
                }
                documents[document].1 = documents[document].1.max(annotation.end);
                for category in categories(layer, &def.name, def.kind, annotation)? {
                    if !traits.admits(&category) {
                        return Err(StudyError::LabelOutsideTagset {
                            feature: feature.to_string(),
                            label: category,
                            position: format!("{}[{}] {}", layer, graph.document_id(), annotation.extent()),
                        });
                    }
                    raw.push(RawUnit {
                        document,
                        rater,
                        begin: annotation.begin,
                        end: annotation.end,
                        category,
                    });
                }
            }
        }

        let mut offsets = Vec::with_capacity(documents.len());
        let mut continuum_length = 0;
        for (_, length) in &documents {
            offsets.push(continuum_length);
            continuum_length += length;
        }

        let units: Vec<UnitizingUnit> = raw
            .into_iter()
            .map(|u| UnitizingUnit {
                rater: u.rater,
                begin: offsets[u.document] + u.begin,
                length: u.end - u.begin,
                category: u.category,
            })
            .collect();

        check_tagset(feature_sets(diff, layer, feature), feature, traits)?;
        let mut partition = SetPartition::default();
        for set in feature_sets(diff, layer, feature) {
            partition.record(set, feature, true);
        }

        tracing::debug!(
            layer,
            feature,
            units = units.len(),
            documents = documents.len(),
            continuum_length,
            "Unitizing study built"
        );

        Ok(Self {
            layer: layer.to_string(),
            feature: feature.to_string(),
            raters,
            continuum_length,
            units,
            traits_hash: traits.params_hash(),
            partition,
        })
    }

    /// Study over ready-made units, bypassing the graphs.
    pub fn from_units(
        layer: impl Into<String>,
        feature: impl Into<String>,
        raters: Vec<RaterId>,
        continuum_length: usize,
        units: Vec<UnitizingUnit>,
    ) -> Self {
        Self {
            layer: layer.into(),
            feature: feature.into(),
            raters,
            continuum_length,
            units,
            traits_hash: AgreementTraits::default().params_hash(),
            partition: SetPartition::default(),
        }
    }

    /// Layer of the study.
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Feature of the study.
    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// Total length of the continuum.
    pub fn continuum_length(&self) -> usize {
        self.continuum_length
    }

    /// All units, in input order.
    pub fn units(&self) -> &[UnitizingUnit] {
        &self.units
    }

    /// Number of raters.
    pub fn rater_count(&self) -> usize {
        self.raters.len()
    }

    /// Distinct categories.
    pub fn categories(&self) -> BTreeSet<&str> {
        self.units.iter().map(|u| u.category.as_str()).collect()
    }

    /// Hash of the traits the study was built with.
    pub fn traits_hash(&self) -> &str {
        &self.traits_hash
    }
}

/// Category values contributed by one annotation.
fn categories(
    layer: &str,
    feature: &str,
    kind: FeatureKind,
    annotation: &Annotation,
) -> Result<Vec<String>, DiffError> {
    let value = match annotation.feature(feature) {
        None | Some(FeatureValue::Null) => return Ok(Vec::new()),
        Some(value) => value,
    };
    let expected = match kind {
        FeatureKind::Link { .. } => return Ok(Vec::new()),
        FeatureKind::Single => "single value",
        FeatureKind::MultiValue => "string array",
    };
    match (kind, value) {
        (_, FeatureValue::String(s)) => Ok(vec![s.clone()]),
        (FeatureKind::Single, FeatureValue::Integer(i)) => Ok(vec![i.to_string()]),
        (FeatureKind::Single, FeatureValue::Boolean(b)) => Ok(vec![b.to_string()]),
        (FeatureKind::MultiValue, FeatureValue::StringArray(values)) => Ok(values.clone()),
        (_, FeatureValue::Reference(_)) | (_, FeatureValue::Links(_)) => Ok(Vec::new()),
        (_, other) => Err(DiffError::FeatureTypeMismatch {
            layer: layer.to_string(),
            feature: feature.to_string(),
            annotation: annotation.id,
            expected,
            found: other.kind(),
        }),
    }
}

impl Study for UnitizingStudy {
    fn raters(&self) -> &[RaterId] {
        &self.raters
    }

    fn partition(&self) -> &SetPartition {
        &self.partition
    }

    fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl fmt::Display for UnitizingStudy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raters: Vec<&str> = self.raters.iter().map(RaterId::as_str).collect();
        writeln!(
            f,
            "=== unitizing study {}.{}: {} units, continuum {}, raters [{}], traits {}",
            self.layer,
            self.feature,
            self.units.len(),
            self.continuum_length,
            raters.join(", "),
            self.traits_hash
        )?;
        for unit in &self.units {
            let rater = self.raters.get(unit.rater).map(RaterId::as_str).unwrap_or("?");
            writeln!(f, "{} {}+{} {}", rater, unit.begin, unit.length, unit.category)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::PositionAligner;
    use crate::layer::{DiffAdapter, FeatureDef};
    use crate::store::InMemoryDocument;

    fn adapter() -> DiffAdapter {
        DiffAdapter::span("Span")
            .with_feature(FeatureDef::single("value"))
            .with_feature(FeatureDef::multi_value("tags"))
    }

    fn build(inputs: &[(RaterId, &InMemoryDocument)], feature: &str) -> Result<UnitizingStudy, StudyError> {
        let diff = PositionAligner::single(adapter()).unwrap().align(inputs).unwrap();
        UnitizingStudy::build(&diff, inputs, "Span", feature, &AgreementTraits::default())
    }

    #[test]
    fn test_array_values_give_one_unit_each() {
        let mut a = InMemoryDocument::new("doc", "This is a test.");
        a.annotate("Span", 0, 4).feature("tags", vec!["a".to_string(), "b".to_string()]).add();

        let study = build(&[(RaterId::from("a"), &a)], "tags").unwrap();
        assert_eq!(study.units().len(), 2);
        assert_eq!(study.continuum_length(), 15);
        assert_eq!(study.categories().into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_zero_length_and_null_skipped() {
        let mut a = InMemoryDocument::new("doc", "This is a test.");
        a.annotate("Span", 3, 3).feature("value", "X").add();
        a.annotate("Span", 0, 4).add();

        let study = build(&[(RaterId::from("a"), &a)], "value").unwrap();
        assert!(study.is_empty());
    }

    #[test]
    fn test_documents_laid_out_consecutively() {
        let mut first = InMemoryDocument::new("d1", "0123456789");
        first.annotate("Span", 0, 2).feature("value", "X").add();
        let mut second = InMemoryDocument::new("d2", "01234");
        second.annotate("Span", 1, 3).feature("value", "X").add();

        let study = build(
            &[(RaterId::from("a"), &first), (RaterId::from("a"), &second)],
            "value",
        )
        .unwrap();
        assert_eq!(study.continuum_length(), 15);
        assert_eq!(study.units()[1].begin, 11);
        assert_eq!(study.units()[1].length, 2);
    }

    #[test]
    fn test_relation_layer_rejected() {
        let a = InMemoryDocument::new("doc", "text");
        let diff = PositionAligner::single(
            DiffAdapter::relation("Rel", "source", "target").with_feature(FeatureDef::single("value")),
        )
        .unwrap()
        .align(&[(RaterId::from("a"), &a)])
        .unwrap();
        let result =
            UnitizingStudy::build(&diff, &[(RaterId::from("a"), &a)], "Rel", "value", &AgreementTraits::default());
        assert!(matches!(result, Err(StudyError::UnsupportedLayer { .. })));
    }

    #[test]
    fn test_type_mismatch_reported() {
        let clean = InMemoryDocument::new("doc", "This is a test.");
        let mut bad = InMemoryDocument::new("doc", "This is a test.");
        bad.annotate("Span", 0, 4).feature("value", vec!["x".to_string()]).add();

        let diff = PositionAligner::single(adapter())
            .unwrap()
            .align(&[(RaterId::from("a"), &clean)])
            .unwrap();
        let result = UnitizingStudy::build(
            &diff,
            &[(RaterId::from("a"), &bad)],
            "Span",
            "value",
            &AgreementTraits::default(),
        );
        assert!(matches!(result, Err(StudyError::Diff(_))));
    }
}
