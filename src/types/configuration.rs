//! Configuration sets: the unit of comparison between raters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::label::{display_label, Label, Labels};
use super::position::{Extent, Position};
use super::rater::RaterId;
use crate::store::AnnotationId;

/// One rater's annotation at one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationUnit {
    /// Rater that produced the unit.
    pub rater: RaterId,
    /// Annotation the unit was derived from (the host, for link slots).
    pub annotation: AnnotationId,
    /// Own offsets of the annotation.
    pub extent: Extent,
    /// Compared feature values.
    pub labels: Labels,
}

impl AnnotationUnit {
    /// Label of a feature. Outer `None`: the unit does not carry the
    /// feature. Inner `None`: the feature is unset.
    pub fn label(&self, feature: &str) -> Option<Option<&Label>> {
        self.labels.get(feature).map(Option::as_ref)
    }
}

/// Classification of a configuration set. Tags are not exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tag {
    /// Every rater under consideration has a member.
    Complete,
    /// At least one rater under consideration has no member.
    IncompletePosition,
    /// All raters have a member but some label is unset.
    IncompleteLabel,
    /// At least two members differ in a label.
    Difference,
    /// A rater contributed several differently-labelled units here.
    Stacked,
    /// The set was retained by a study.
    Used,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Complete => "COMPLETE",
            Self::IncompletePosition => "INCOMPLETE_POSITION",
            Self::IncompleteLabel => "INCOMPLETE_LABEL",
            Self::Difference => "DIFFERENCE",
            Self::Stacked => "STACKED",
            Self::Used => "USED",
        };
        f.write_str(name)
    }
}

/// All raters' units at one position plus their classification.
///
/// Members are kept in rater order; a rater has at most one member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationSet {
    position: Position,
    members: Vec<AnnotationUnit>,
    stacked: Vec<AnnotationUnit>,
    tags: BTreeSet<Tag>,
}

impl ConfigurationSet {
    pub(crate) fn new(position: Position) -> Self {
        Self {
            position,
            members: Vec::new(),
            stacked: Vec::new(),
            tags: BTreeSet::new(),
        }
    }

    /// Position of the set.
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Members in rater order.
    pub fn members(&self) -> &[AnnotationUnit] {
        &self.members
    }

    /// Extra units of raters that already have a member here.
    pub fn stacked(&self) -> &[AnnotationUnit] {
        &self.stacked
    }

    /// Tags of the set.
    pub fn tags(&self) -> &BTreeSet<Tag> {
        &self.tags
    }

    /// Check whether the set carries a tag.
    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    /// Member of a rater, if any.
    pub fn member(&self, rater: &RaterId) -> Option<&AnnotationUnit> {
        self.members.iter().find(|u| &u.rater == rater)
    }

    /// Whether all given raters are members.
    pub fn has_members(&self, raters: &[RaterId]) -> bool {
        raters.iter().all(|r| self.member(r).is_some())
    }

    /// Whether members carry the given feature.
    pub fn pertains_to(&self, feature: &str) -> bool {
        self.members
            .iter()
            .chain(self.stacked.iter())
            .any(|u| u.labels.contains_key(feature))
    }

    /// Whether members differ in the given feature.
    pub fn differs_in(&self, feature: &str) -> bool {
        let mut labels = self.members.iter().map(|u| u.label(feature));
        match labels.next() {
            Some(first) => labels.any(|l| l != first),
            None => false,
        }
    }

    /// Whether some member has the given feature unset.
    pub fn has_unset_label(&self, feature: &str) -> bool {
        self.members
            .iter()
            .any(|u| matches!(u.label(feature), Some(None)))
    }

    /// Add a unit. Returns `false` if the rater already had an identical unit.
    pub(crate) fn add(&mut self, unit: AnnotationUnit) -> bool {
        match self.members.iter().find(|m| m.rater == unit.rater) {
            None => {
                self.members.push(unit);
                true
            }
            Some(existing) if existing.labels == unit.labels => false,
            Some(_) => {
                let duplicate = self
                    .stacked
                    .iter()
                    .any(|s| s.rater == unit.rater && s.labels == unit.labels);
                if duplicate {
                    false
                } else {
                    self.stacked.push(unit);
                    true
                }
            }
        }
    }

    /// Keep only units of the given raters.
    pub(crate) fn retain_raters(&mut self, raters: &[RaterId]) {
        self.members.retain(|u| raters.contains(&u.rater));
        self.stacked.retain(|u| raters.contains(&u.rater));
    }

    pub(crate) fn mark_used(&mut self) {
        self.tags.insert(Tag::Used);
    }

    /// Recompute tags relative to the raters under consideration.
    pub(crate) fn classify(&mut self, raters: &[RaterId]) {
        self.tags.clear();
        let present = self.members.len();

        if present == raters.len() && present > 0 {
            self.tags.insert(Tag::Complete);
        } else if present > 0 {
            self.tags.insert(Tag::IncompletePosition);
        }

        let features: BTreeSet<&str> = self
            .members
            .iter()
            .flat_map(|u| u.labels.keys().map(String::as_str))
            .collect();

        if present >= 2 && features.iter().any(|f| self.differs_in(f)) {
            self.tags.insert(Tag::Difference);
        }

        if self.tags.contains(&Tag::Complete) && features.iter().any(|f| self.has_unset_label(f)) {
            self.tags.insert(Tag::IncompleteLabel);
        }

        if !self.stacked.is_empty() {
            self.tags.insert(Tag::Stacked);
        }
    }
}

impl fmt::Display for ConfigurationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<String> = self.tags.iter().map(Tag::to_string).collect();
        writeln!(f, "{} {{{}}}", self.position, tags.join(", "))?;
        for (unit, marker) in self
            .members
            .iter()
            .map(|u| (u, ""))
            .chain(self.stacked.iter().map(|u| (u, " (stacked)")))
        {
            let labels: Vec<String> = unit
                .labels
                .iter()
                .map(|(k, v)| format!("{}={}", k, display_label(v.as_ref())))
                .collect();
            writeln!(
                f,
                "  {}{}: #{} {} {}",
                unit.rater,
                marker,
                unit.annotation,
                unit.extent,
                labels.join(" ")
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(rater: &str, value: Option<&str>) -> AnnotationUnit {
        let mut labels = Labels::new();
        labels.insert("value".to_string(), value.map(Label::single));
        AnnotationUnit {
            rater: RaterId::from(rater),
            annotation: AnnotationId::new(1),
            extent: Extent::new(0, 4),
            labels,
        }
    }

    fn set() -> ConfigurationSet {
        ConfigurationSet::new(Position::Span {
            document: "doc".to_string(),
            layer: "NamedEntity".to_string(),
            extent: Extent::new(0, 4),
            link: None,
        })
    }

    fn raters(ids: &[&str]) -> Vec<RaterId> {
        ids.iter().map(|s| RaterId::from(*s)).collect()
    }

    #[test]
    fn test_complete_agreeing_set() {
        let mut s = set();
        s.add(unit("a", Some("PER")));
        s.add(unit("b", Some("PER")));
        s.classify(&raters(&["a", "b"]));

        assert!(s.has_tag(Tag::Complete));
        assert!(!s.has_tag(Tag::Difference));
        assert!(!s.has_tag(Tag::IncompletePosition));
    }

    #[test]
    fn test_incomplete_position() {
        let mut s = set();
        s.add(unit("a", Some("PER")));
        s.classify(&raters(&["a", "b", "c"]));

        assert!(s.has_tag(Tag::IncompletePosition));
        assert!(!s.has_tag(Tag::Complete));
        assert!(!s.has_tag(Tag::Difference));
    }

    #[test]
    fn test_incomplete_label_requires_full_members() {
        let mut s = set();
        s.add(unit("a", Some("PER")));
        s.add(unit("b", None));
        s.classify(&raters(&["a", "b"]));
        assert!(s.has_tag(Tag::IncompleteLabel));
        assert!(s.has_tag(Tag::Difference));

        s.classify(&raters(&["a", "b", "c"]));
        assert!(!s.has_tag(Tag::IncompleteLabel));
    }

    #[test]
    fn test_identical_unit_from_same_rater_is_collapsed() {
        let mut s = set();
        assert!(s.add(unit("a", Some("PER"))));
        assert!(!s.add(unit("a", Some("PER"))));
        assert_eq!(s.members().len(), 1);
        assert!(s.stacked().is_empty());
    }

    #[test]
    fn test_differently_labelled_unit_from_same_rater_is_stacked() {
        let mut s = set();
        s.add(unit("a", Some("PER")));
        s.add(unit("a", Some("LOC")));
        s.add(unit("a", Some("LOC")));
        s.classify(&raters(&["a"]));

        assert_eq!(s.stacked().len(), 1);
        assert!(s.has_tag(Tag::Stacked));
    }

    #[test]
    fn test_display_lists_members() {
        let mut s = set();
        s.add(unit("a", Some("PER")));
        s.add(unit("b", None));
        s.classify(&raters(&["a", "b"]));

        let dump = s.to_string();
        assert!(dump.starts_with("NamedEntity[doc] 0-4 {COMPLETE, INCOMPLETE_LABEL, DIFFERENCE}"));
        assert!(dump.contains("a: #1 0-4 value=PER"));
        assert!(dump.contains("b: #1 0-4 value=<unset>"));
    }
}
