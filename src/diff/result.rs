//! Aggregate result of one alignment run.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::fingerprint;
use crate::layer::{DiffAdapter, FeatureDef};
use crate::types::{ConfigurationSet, Position, RaterId, Tag};

/// All configuration sets of one alignment run, in first-sight order.
///
/// Immutable once built. Subsets for rater pairs are derived with
/// [`DiffResult::restrict_to`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    raters: Vec<RaterId>,
    adapters: Vec<DiffAdapter>,
    sets: Vec<ConfigurationSet>,
}

impl DiffResult {
    pub(crate) fn new(raters: Vec<RaterId>, adapters: Vec<DiffAdapter>, sets: Vec<ConfigurationSet>) -> Self {
        Self { raters, adapters, sets }
    }

    /// Raters under consideration, in order of first appearance.
    pub fn raters(&self) -> &[RaterId] {
        &self.raters
    }

    /// Adapters the result was computed with.
    pub fn adapters(&self) -> &[DiffAdapter] {
        &self.adapters
    }

    /// Look up a compared feature of a layer.
    pub fn feature(&self, layer: &str, feature: &str) -> Option<&FeatureDef> {
        self.adapter(layer).and_then(|a| a.feature(feature))
    }

    /// Look up the adapter of a layer.
    pub fn adapter(&self, layer: &str) -> Option<&DiffAdapter> {
        self.adapters.iter().find(|a| a.layer == layer)
    }

    /// All configuration sets.
    pub fn configuration_sets(&self) -> &[ConfigurationSet] {
        &self.sets
    }

    /// Number of configuration sets.
    pub fn size(&self) -> usize {
        self.sets.len()
    }

    /// Whether no position was observed.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Sets where at least two members differ in a label.
    pub fn differing_configuration_sets(&self) -> Vec<&ConfigurationSet> {
        self.with_tag(Tag::Difference)
    }

    /// Sets where at least one rater has no member.
    pub fn incomplete_configuration_sets(&self) -> Vec<&ConfigurationSet> {
        self.with_tag(Tag::IncompletePosition)
    }

    /// Sets where a rater contributed several differently-labelled units.
    pub fn plurality_configuration_sets(&self) -> Vec<&ConfigurationSet> {
        self.with_tag(Tag::Stacked)
    }

    /// Find the set at a position.
    pub fn find(&self, position: &Position) -> Option<&ConfigurationSet> {
        self.sets.iter().find(|s| s.position() == position)
    }

    fn with_tag(&self, tag: Tag) -> Vec<&ConfigurationSet> {
        self.sets.iter().filter(|s| s.has_tag(tag)).collect()
    }

    /// Restrict the result to a subset of raters.
    ///
    /// Units of other raters are removed, sets left without members are
    /// dropped and tags are recomputed against the subset, so completeness
    /// is relative to the given raters. Raters keep their original order;
    /// unknown raters are ignored.
    pub fn restrict_to(&self, raters: &[RaterId]) -> DiffResult {
        let subset: Vec<RaterId> = self
            .raters
            .iter()
            .filter(|r| raters.contains(r))
            .cloned()
            .collect();

        let sets = self
            .sets
            .iter()
            .filter_map(|set| {
                let mut set = set.clone();
                set.retain_raters(&subset);
                if set.members().is_empty() && set.stacked().is_empty() {
                    return None;
                }
                set.classify(&subset);
                Some(set)
            })
            .collect();

        DiffResult::new(subset, self.adapters.clone(), sets)
    }

    /// Human-readable dump of every set with its tags and members.
    pub fn print(&self) -> String {
        self.to_string()
    }

    /// Hex fingerprint of the canonical form of this result.
    pub fn fingerprint(&self) -> String {
        fingerprint(self)
    }
}

impl fmt::Display for DiffResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raters: Vec<&str> = self.raters.iter().map(RaterId::as_str).collect();
        writeln!(
            f,
            "=== {} configuration sets, raters [{}]",
            self.sets.len(),
            raters.join(", ")
        )?;
        for set in &self.sets {
            write!(f, "{}", set)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::diff::PositionAligner;
    use crate::layer::{DiffAdapter, FeatureDef};
    use crate::store::InMemoryDocument;
    use crate::types::{RaterId, Tag};

    fn doc(spans: &[(usize, usize, &str)]) -> InMemoryDocument {
        let mut doc = InMemoryDocument::new("doc", "This is a test.");
        for (begin, end, value) in spans {
            doc.annotate("Span", *begin, *end).feature("value", *value).add();
        }
        doc
    }

    fn three_raters() -> super::DiffResult {
        let a = doc(&[(0, 4, "X"), (5, 7, "Y")]);
        let b = doc(&[(0, 4, "X")]);
        let c = doc(&[(0, 4, "X"), (5, 7, "Y")]);
        PositionAligner::single(DiffAdapter::span("Span").with_feature(FeatureDef::single("value")))
            .unwrap()
            .align(&[
                (RaterId::from("a"), &a),
                (RaterId::from("b"), &b),
                (RaterId::from("c"), &c),
            ])
            .unwrap()
    }

    #[test]
    fn test_incompleteness_is_relative_to_raters() {
        let diff = three_raters();
        let second = &diff.configuration_sets()[1];
        assert!(second.has_tag(Tag::IncompletePosition));

        let ac = diff.restrict_to(&[RaterId::from("a"), RaterId::from("c")]);
        assert!(ac.configuration_sets()[1].has_tag(Tag::Complete));

        let ab = diff.restrict_to(&[RaterId::from("a"), RaterId::from("b")]);
        assert!(ab.configuration_sets()[1].has_tag(Tag::IncompletePosition));
    }

    #[test]
    fn test_restrict_drops_empty_sets() {
        let diff = three_raters();
        let b_only = diff.restrict_to(&[RaterId::from("b")]);
        assert_eq!(b_only.size(), 1);
        assert_eq!(b_only.raters().len(), 1);
    }

    #[test]
    fn test_print_lists_every_set() {
        let diff = three_raters();
        let dump = diff.print();
        assert!(dump.starts_with("=== 2 configuration sets, raters [a, b, c]"));
        assert!(dump.contains("Span[doc] 5-7 {INCOMPLETE_POSITION}"));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(three_raters().fingerprint(), three_raters().fingerprint());
    }
}
