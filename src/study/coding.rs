//! Coding studies: one categorical value per rater per item.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::{check_tagset, feature_sets, resolve_feature, SetPartition, Study, StudyError};
use crate::diff::DiffResult;
use crate::layer::FeatureKind;
use crate::policy::AgreementTraits;
use crate::types::{Position, RaterId, Tag};

/// One coded item: the value each rater assigned at a position.
///
/// `values` is indexed like [`CodingStudy::raters`]. `None` means the rater
/// has no unit at the position; `Some("")` means the unit exists but the
/// feature is unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodingItem {
    /// Position of the underlying configuration set.
    pub position: Position,
    /// Values per rater.
    pub values: Vec<Option<String>>,
}

impl CodingItem {
    /// Number of raters that assigned a value.
    pub fn coded(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Items × raters matrix of categorical values for one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodingStudy {
    layer: String,
    feature: String,
    raters: Vec<RaterId>,
    items: Vec<CodingItem>,
    categories: BTreeSet<String>,
    traits_hash: String,
    partition: SetPartition,
}

impl CodingStudy {
    /// Build a coding study for `(layer, feature)` from a diff.
    ///
    /// Stacked sets are never used. Sets missing a rater are dropped when
    /// `traits.exclude_incomplete` is set and coded with `None` otherwise.
    pub fn build(
        diff: &DiffResult,
        layer: &str,
        feature: &str,
        traits: &AgreementTraits,
    ) -> Result<Self, StudyError> {
        let def = resolve_feature(diff, layer, feature)?;
        if def.kind == FeatureKind::MultiValue {
            return Err(StudyError::UnsupportedFeature {
                layer: layer.to_string(),
                feature: feature.to_string(),
                study: "coding",
                reason: "multi-valued features have no single category per unit".to_string(),
            });
        }

        check_tagset(feature_sets(diff, layer, feature), feature, traits)?;

        let raters = diff.raters().to_vec();
        let mut items = Vec::new();
        let mut categories = BTreeSet::new();
        let mut partition = SetPartition::default();

        for set in feature_sets(diff, layer, feature) {
            let stacked = set.has_tag(Tag::Stacked);
            let incomplete = set.has_tag(Tag::IncompletePosition);
            let used = !stacked && !(incomplete && traits.exclude_incomplete);

            if used {
                let values: Vec<Option<String>> = raters
                    .iter()
                    .map(|rater| {
                        set.member(rater).map(|unit| match unit.label(feature) {
                            Some(Some(label)) => label.to_string(),
                            _ => String::new(),
                        })
                    })
                    .collect();
                categories.extend(values.iter().flatten().cloned());
                items.push(CodingItem {
                    position: set.position().clone(),
                    values,
                });
            }
            partition.record(set, feature, used);
        }

        tracing::debug!(
            layer,
            feature,
            items = items.len(),
            sets = partition.all.len(),
            plurality = partition.plurality.len(),
            "Coding study built"
        );

        Ok(Self {
            layer: layer.to_string(),
            feature: feature.to_string(),
            raters,
            items,
            categories,
            traits_hash: traits.params_hash(),
            partition,
        })
    }

    /// Study over a ready-made item matrix, bypassing the diff.
    pub fn from_items(
        layer: impl Into<String>,
        feature: impl Into<String>,
        raters: Vec<RaterId>,
        items: Vec<CodingItem>,
    ) -> Self {
        let categories = items
            .iter()
            .flat_map(|i| i.values.iter().flatten().cloned())
            .collect();
        Self {
            layer: layer.into(),
            feature: feature.into(),
            raters,
            items,
            categories,
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

    /// Coded items.
    pub fn items(&self) -> &[CodingItem] {
        &self.items
    }

    /// Number of coded items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Number of raters.
    pub fn rater_count(&self) -> usize {
        self.raters.len()
    }

    /// Distinct categories, the unset category `""` included when present.
    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    /// Whether some rater is missing on some item.
    pub fn has_missing_values(&self) -> bool {
        self.items.iter().any(|i| i.values.iter().any(Option::is_none))
    }

    /// Hash of the traits the study was built with.
    pub fn traits_hash(&self) -> &str {
        &self.traits_hash
    }
}

impl Study for CodingStudy {
    fn raters(&self) -> &[RaterId] {
        &self.raters
    }

    fn partition(&self) -> &SetPartition {
        &self.partition
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for CodingStudy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raters: Vec<&str> = self.raters.iter().map(RaterId::as_str).collect();
        writeln!(
            f,
            "=== coding study {}.{}: {} items, raters [{}], traits {}",
            self.layer,
            self.feature,
            self.items.len(),
            raters.join(", "),
            self.traits_hash
        )?;
        for item in &self.items {
            let values: Vec<String> = item
                .values
                .iter()
                .map(|v| match v {
                    Some(v) => format!("{:?}", v),
                    None => "<missing>".to_string(),
                })
                .collect();
            writeln!(f, "{}: {}", item.position, values.join(" | "))?;
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

    fn doc(spans: &[(usize, usize, Option<&str>)]) -> InMemoryDocument {
        let mut doc = InMemoryDocument::new("doc", "This is a test.");
        for (begin, end, value) in spans {
            let builder = doc.annotate("Span", *begin, *end);
            match value {
                Some(v) => builder.feature("value", *v).add(),
                None => builder.add(),
            };
        }
        doc
    }

    fn diff(docs: &[(&str, &InMemoryDocument)]) -> DiffResult {
        let inputs: Vec<(RaterId, &InMemoryDocument)> =
            docs.iter().map(|(r, d)| (RaterId::from(*r), *d)).collect();
        PositionAligner::single(
            DiffAdapter::span("Span")
                .with_feature(FeatureDef::single("value"))
                .with_feature(FeatureDef::multi_value("tags")),
        )
        .unwrap()
        .align(&inputs)
        .unwrap()
    }

    #[test]
    fn test_incomplete_sets_excluded_by_default() {
        let a = doc(&[(0, 4, Some("X")), (5, 7, Some("Y"))]);
        let b = doc(&[(0, 4, Some("X"))]);
        let diff = diff(&[("a", &a), ("b", &b)]);

        let study = CodingStudy::build(&diff, "Span", "value", &AgreementTraits::default()).unwrap();
        assert_eq!(study.item_count(), 1);
        assert_eq!(study.partition().incomplete_by_position.len(), 1);
        assert_eq!(study.partition().used.len(), 1);
        assert!(study.partition().used[0].has_tag(Tag::Used));
    }

    #[test]
    fn test_missing_raters_coded_as_none() {
        let a = doc(&[(0, 4, Some("X")), (5, 7, Some("Y"))]);
        let b = doc(&[(0, 4, Some("X"))]);
        let diff = diff(&[("a", &a), ("b", &b)]);

        let study =
            CodingStudy::build(&diff, "Span", "value", &AgreementTraits::including_incomplete()).unwrap();
        assert_eq!(study.item_count(), 2);
        assert_eq!(study.items()[1].values, vec![Some("Y".to_string()), None]);
        assert!(study.has_missing_values());
    }

    #[test]
    fn test_unset_label_is_empty_category() {
        let a = doc(&[(0, 4, None)]);
        let b = doc(&[(0, 4, Some("X"))]);
        let diff = diff(&[("a", &a), ("b", &b)]);

        let study = CodingStudy::build(&diff, "Span", "value", &AgreementTraits::default()).unwrap();
        assert_eq!(study.items()[0].values, vec![Some(String::new()), Some("X".to_string())]);
        assert!(study.categories().contains(""));
    }

    #[test]
    fn test_stacked_sets_never_used() {
        let a = doc(&[(0, 4, Some("X")), (0, 4, Some("Y"))]);
        let b = doc(&[(0, 4, Some("X"))]);
        let diff = diff(&[("a", &a), ("b", &b)]);

        let study = CodingStudy::build(&diff, "Span", "value", &AgreementTraits::default()).unwrap();
        assert!(study.is_empty());
        assert_eq!(study.partition().plurality.len(), 1);
    }

    #[test]
    fn test_unknown_and_multi_valued_features_rejected() {
        let a = doc(&[(0, 4, Some("X"))]);
        let diff = diff(&[("a", &a)]);
        let traits = AgreementTraits::default();

        assert!(matches!(
            CodingStudy::build(&diff, "Span", "missing", &traits),
            Err(StudyError::UnknownFeature { .. })
        ));
        assert!(matches!(
            CodingStudy::build(&diff, "Span", "tags", &traits),
            Err(StudyError::UnsupportedFeature { .. })
        ));
    }

    #[test]
    fn test_tagset_violation_names_label() {
        let a = doc(&[(0, 4, Some("X"))]);
        let b = doc(&[(0, 4, Some("Z"))]);
        let diff = diff(&[("a", &a), ("b", &b)]);

        let err = CodingStudy::build(&diff, "Span", "value", &AgreementTraits::default().with_tagset(["X"]))
            .unwrap_err();
        match err {
            StudyError::LabelOutsideTagset { label, position, .. } => {
                assert_eq!(label, "Z");
                assert_eq!(position, "Span[doc] 0-4");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_dump_lists_items() {
        let a = doc(&[(0, 4, Some("X"))]);
        let b = doc(&[(0, 4, None)]);
        let diff = diff(&[("a", &a), ("b", &b)]);

        let dump = CodingStudy::build(&diff, "Span", "value", &AgreementTraits::default())
            .unwrap()
            .to_string();
        assert!(dump.contains("coding study Span.value: 1 items, raters [a, b]"));
        assert!(dump.contains("Span[doc] 0-4: \"X\" | \"\""));
    }
}
