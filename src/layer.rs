//! Layer discriminators.
//!
//! A [`DiffAdapter`] describes one annotation layer and the features compared
//! on it. It decides which [`Position`] an annotation occupies and which
//! labels are compared there.
//!
//! | Layer kind | Position | Labels |
//! |------------|----------|--------|
//! | Span | `(begin, end)` | every single / multi-valued feature |
//! | Span, link slot | host + role (or target) | link target (or role) |
//! | Relation | source extent + target extent | every single / multi-valued feature |
//! | Chain element | `(begin, end)` | element features |
//! | Chain arc | element extent + next extent | arc feature |

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::diff::DiffError;
use crate::store::{Annotation, AnnotationGraph, AnnotationId, FeatureValue};
use crate::types::{Extent, Label, Labels, LinkKey, Position};

/// How links of a link feature are matched across raters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkCompareBehavior {
    /// The role is part of the position; the target is compared as label.
    LinkTargetAsLabel,
    /// The target is part of the position; the role is compared as label.
    LinkRoleAsLabel,
}

impl Default for LinkCompareBehavior {
    fn default() -> Self {
        Self::LinkTargetAsLabel
    }
}

/// Shape of a compared feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureKind {
    /// One primitive value (string, integer, boolean).
    Single,
    /// A string array; compared as a set of values.
    MultiValue,
    /// Role-labelled links to other annotations.
    Link {
        /// Link matching mode.
        #[serde(default)]
        compare: LinkCompareBehavior,
    },
}

/// A compared feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureDef {
    /// Feature name.
    pub name: String,
    /// Feature shape.
    pub kind: FeatureKind,
}

impl FeatureDef {
    /// A single-valued feature.
    pub fn single(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: FeatureKind::Single }
    }

    /// A multi-valued (string array) feature.
    pub fn multi_value(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: FeatureKind::MultiValue }
    }

    /// A link feature.
    pub fn link(name: impl Into<String>, compare: LinkCompareBehavior) -> Self {
        Self { name: name.into(), kind: FeatureKind::Link { compare } }
    }

    /// Whether this is a link feature.
    pub fn is_link(&self) -> bool {
        matches!(self.kind, FeatureKind::Link { .. })
    }
}

/// The kinds of layers the engine can align.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerKind {
    /// Span annotations over the text.
    Span,
    /// Directed relations between two annotations.
    Relation {
        /// Feature referencing the source annotation.
        source_feature: String,
        /// Feature referencing the target annotation.
        target_feature: String,
    },
    /// Chains of elements linked through a `next` reference.
    Chain {
        /// Feature referencing the next element.
        next_feature: String,
        /// Feature labelling the arc to the next element.
        arc_feature: Option<String>,
    },
}

/// Discriminator for one layer and its compared features.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiffAdapter {
    /// Layer (annotation type) name.
    pub layer: String,
    /// Layer kind.
    pub kind: LayerKind,
    /// Compared features.
    #[serde(default)]
    pub features: Vec<FeatureDef>,
}

impl DiffAdapter {
    /// Adapter for a span layer.
    pub fn span(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            kind: LayerKind::Span,
            features: Vec::new(),
        }
    }

    /// Adapter for a relation layer.
    pub fn relation(
        layer: impl Into<String>,
        source_feature: impl Into<String>,
        target_feature: impl Into<String>,
    ) -> Self {
        Self {
            layer: layer.into(),
            kind: LayerKind::Relation {
                source_feature: source_feature.into(),
                target_feature: target_feature.into(),
            },
            features: Vec::new(),
        }
    }

    /// Adapter for a chain layer.
    pub fn chain(layer: impl Into<String>, next_feature: impl Into<String>, arc_feature: Option<&str>) -> Self {
        Self {
            layer: layer.into(),
            kind: LayerKind::Chain {
                next_feature: next_feature.into(),
                arc_feature: arc_feature.map(str::to_string),
            },
            features: Vec::new(),
        }
    }

    /// Add a compared feature.
    pub fn with_feature(mut self, feature: FeatureDef) -> Self {
        self.features.push(feature);
        self
    }

    /// Look up a compared feature.
    pub fn feature(&self, name: &str) -> Option<&FeatureDef> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Check the adapter for unsupported combinations.
    pub fn validate(&self) -> Result<(), DiffError> {
        if self.layer.is_empty() {
            return Err(self.config_error("layer name is empty"));
        }

        let mut names = BTreeSet::new();
        for feature in &self.features {
            if !names.insert(feature.name.as_str()) {
                return Err(self.config_error(format!("feature {} is declared twice", feature.name)));
            }
        }

        match &self.kind {
            LayerKind::Span => {}
            LayerKind::Relation { source_feature, target_feature } => {
                if source_feature == target_feature {
                    return Err(self.config_error("source and target feature must differ"));
                }
                self.reject_links("relation")?;
                for structural in [source_feature, target_feature] {
                    if names.contains(structural.as_str()) {
                        return Err(self.config_error(format!(
                            "endpoint feature {} cannot be compared as a label",
                            structural
                        )));
                    }
                }
            }
            LayerKind::Chain { next_feature, arc_feature } => {
                self.reject_links("chain")?;
                if names.contains(next_feature.as_str()) {
                    return Err(self.config_error(format!(
                        "chain feature {} cannot be compared as a label",
                        next_feature
                    )));
                }
                if let Some(arc) = arc_feature {
                    match self.feature(arc) {
                        Some(def) if def.kind == FeatureKind::Single => {}
                        Some(_) => {
                            return Err(self.config_error(format!("arc feature {} must be single-valued", arc)))
                        }
                        None => {
                            return Err(self.config_error(format!("arc feature {} is not declared", arc)))
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Compute the positions and labels contributed by one annotation.
    pub(crate) fn units<G: AnnotationGraph + ?Sized>(
        &self,
        graph: &G,
        annotation: &Annotation,
    ) -> Result<Vec<(Position, Labels)>, DiffError> {
        let document = graph.document_id().to_string();
        let extent = annotation.extent();
        let mut units = Vec::new();

        match &self.kind {
            LayerKind::Span => {
                let labels = self.primitive_labels(annotation, None)?;
                units.push((
                    Position::Span {
                        document: document.clone(),
                        layer: self.layer.clone(),
                        extent,
                        link: None,
                    },
                    labels,
                ));
                for feature in self.features.iter().filter(|f| f.is_link()) {
                    units.extend(self.link_units(graph, annotation, feature, &document)?);
                }
            }
            LayerKind::Relation { source_feature, target_feature } => {
                let source = self.endpoint(graph, annotation, source_feature)?;
                let target = self.endpoint(graph, annotation, target_feature)?;
                units.push((
                    Position::Relation {
                        document,
                        layer: self.layer.clone(),
                        source,
                        target,
                    },
                    self.primitive_labels(annotation, None)?,
                ));
            }
            LayerKind::Chain { next_feature, arc_feature } => {
                units.push((
                    Position::Span {
                        document: document.clone(),
                        layer: self.layer.clone(),
                        extent,
                        link: None,
                    },
                    self.primitive_labels(annotation, arc_feature.as_deref())?,
                ));

                let next = match annotation.feature(next_feature) {
                    None | Some(FeatureValue::Null) => None,
                    Some(FeatureValue::Reference(id)) => Some(*id),
                    Some(other) => {
                        return Err(self.mismatch(annotation, next_feature, "reference", other));
                    }
                };
                if let Some(next) = next {
                    let to = graph
                        .extent_of(next)
                        .ok_or_else(|| self.dangling(annotation, next_feature))?;
                    let mut labels = Labels::new();
                    if let Some(arc) = arc_feature {
                        labels.insert(arc.clone(), single_label(annotation.feature(arc)).map_err(
                            |found| self.mismatch_kind(annotation, arc, "single value", found),
                        )?);
                    }
                    units.push((
                        Position::ChainArc {
                            document,
                            layer: self.layer.clone(),
                            from: extent,
                            to,
                        },
                        labels,
                    ));
                }
            }
        }
        Ok(units)
    }

    fn primitive_labels(&self, annotation: &Annotation, skip: Option<&str>) -> Result<Labels, DiffError> {
        let mut labels = Labels::new();
        for feature in &self.features {
            if Some(feature.name.as_str()) == skip {
                continue;
            }
            let value = annotation.feature(&feature.name);
            let label = match feature.kind {
                FeatureKind::Single => single_label(value)
                    .map_err(|found| self.mismatch_kind(annotation, &feature.name, "single value", found))?,
                FeatureKind::MultiValue => multi_label(value)
                    .map_err(|found| self.mismatch_kind(annotation, &feature.name, "string array", found))?,
                FeatureKind::Link { .. } => continue,
            };
            labels.insert(feature.name.clone(), label);
        }
        Ok(labels)
    }

    fn link_units<G: AnnotationGraph + ?Sized>(
        &self,
        graph: &G,
        host: &Annotation,
        feature: &FeatureDef,
        document: &str,
    ) -> Result<Vec<(Position, Labels)>, DiffError> {
        let compare = match feature.kind {
            FeatureKind::Link { compare } => compare,
            _ => return Ok(Vec::new()),
        };
        let links = match host.feature(&feature.name) {
            None | Some(FeatureValue::Null) => return Ok(Vec::new()),
            Some(FeatureValue::Links(links)) => links,
            Some(other) => return Err(self.mismatch(host, &feature.name, "links", other)),
        };

        let mut seen: BTreeSet<(Option<&str>, AnnotationId)> = BTreeSet::new();
        let mut units = Vec::new();
        for link in links {
            if !seen.insert((link.role.as_deref(), link.target)) {
                tracing::trace!(
                    layer = %self.layer,
                    feature = %feature.name,
                    host = %host.id,
                    target = %link.target,
                    "Collapsing duplicate link"
                );
                continue;
            }
            let target = graph
                .extent_of(link.target)
                .ok_or_else(|| self.dangling(host, &feature.name))?;

            let (key, label) = match compare {
                LinkCompareBehavior::LinkTargetAsLabel => (
                    LinkKey {
                        feature: feature.name.clone(),
                        role: link.role.clone(),
                        target: None,
                    },
                    Some(Label::Single(target.to_string())),
                ),
                LinkCompareBehavior::LinkRoleAsLabel => (
                    LinkKey {
                        feature: feature.name.clone(),
                        role: None,
                        target: Some(target),
                    },
                    link.role.clone().map(Label::Single),
                ),
            };
            let mut labels = Labels::new();
            labels.insert(feature.name.clone(), label);
            units.push((
                Position::Span {
                    document: document.to_string(),
                    layer: self.layer.clone(),
                    extent: host.extent(),
                    link: Some(key),
                },
                labels,
            ));
        }
        Ok(units)
    }

    fn endpoint<G: AnnotationGraph + ?Sized>(
        &self,
        graph: &G,
        relation: &Annotation,
        feature: &str,
    ) -> Result<Extent, DiffError> {
        match relation.feature(feature) {
            Some(FeatureValue::Reference(id)) => graph
                .extent_of(*id)
                .ok_or_else(|| self.dangling(relation, feature)),
            None | Some(FeatureValue::Null) => Err(self.dangling(relation, feature)),
            Some(other) => Err(self.mismatch(relation, feature, "reference", other)),
        }
    }

    fn reject_links(&self, kind: &str) -> Result<(), DiffError> {
        match self.features.iter().find(|f| f.is_link()) {
            Some(link) => Err(self.config_error(format!(
                "link feature {} is not supported on {} layers",
                link.name, kind
            ))),
            None => Ok(()),
        }
    }

    fn config_error(&self, reason: impl Into<String>) -> DiffError {
        DiffError::Configuration {
            layer: self.layer.clone(),
            reason: reason.into(),
        }
    }

    fn mismatch(&self, annotation: &Annotation, feature: &str, expected: &'static str, found: &FeatureValue) -> DiffError {
        self.mismatch_kind(annotation, feature, expected, found.kind())
    }

    fn mismatch_kind(&self, annotation: &Annotation, feature: &str, expected: &'static str, found: &'static str) -> DiffError {
        DiffError::FeatureTypeMismatch {
            layer: self.layer.clone(),
            feature: feature.to_string(),
            annotation: annotation.id,
            expected,
            found,
        }
    }

    fn dangling(&self, annotation: &Annotation, feature: &str) -> DiffError {
        DiffError::DanglingReference {
            layer: self.layer.clone(),
            feature: feature.to_string(),
            annotation: annotation.id,
        }
    }
}

fn single_label(value: Option<&FeatureValue>) -> Result<Option<Label>, &'static str> {
    match value {
        None | Some(FeatureValue::Null) => Ok(None),
        Some(FeatureValue::String(s)) => Ok(Some(Label::Single(s.clone()))),
        Some(FeatureValue::Integer(i)) => Ok(Some(Label::Single(i.to_string()))),
        Some(FeatureValue::Boolean(b)) => Ok(Some(Label::Single(b.to_string()))),
        Some(other) => Err(other.kind()),
    }
}

fn multi_label(value: Option<&FeatureValue>) -> Result<Option<Label>, &'static str> {
    match value {
        None | Some(FeatureValue::Null) => Ok(None),
        Some(FeatureValue::StringArray(values)) => Ok(Label::multi(values.iter().cloned())),
        Some(FeatureValue::String(s)) => Ok(Label::multi([s.clone()])),
        Some(other) => Err(other.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryDocument, LinkValue};

    fn only<'a>(doc: &'a InMemoryDocument, layer: &str) -> &'a Annotation {
        doc.select(layer)[0]
    }

    #[test]
    fn test_span_position_and_labels() {
        let mut doc = InMemoryDocument::new("doc", "This is a test.");
        doc.annotate("NamedEntity", 0, 4).feature("value", "PER").add();
        let adapter = DiffAdapter::span("NamedEntity")
            .with_feature(FeatureDef::single("value"))
            .with_feature(FeatureDef::single("identifier"));

        let units = adapter.units(&doc, only(&doc, "NamedEntity")).unwrap();
        assert_eq!(units.len(), 1);
        let (position, labels) = &units[0];
        assert_eq!(position.to_string(), "NamedEntity[doc] 0-4");
        assert_eq!(labels["value"], Some(Label::single("PER")));
        assert_eq!(labels["identifier"], None);
    }

    #[test]
    fn test_multi_value_does_not_split_position() {
        let mut doc = InMemoryDocument::new("doc", "This is a test.");
        doc.annotate("Span", 0, 4)
            .feature("values", FeatureValue::strings(["b", "a"]))
            .add();
        let adapter = DiffAdapter::span("Span").with_feature(FeatureDef::multi_value("values"));

        let units = adapter.units(&doc, only(&doc, "Span")).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].1["values"], Label::multi(["a", "b"]));
    }

    #[test]
    fn test_duplicate_links_collapse() {
        let mut doc = InMemoryDocument::new("doc", "This is a test.");
        let filler = doc.annotate("Token", 5, 7).add();
        doc.annotate("Event", 0, 4)
            .feature(
                "args",
                vec![LinkValue::new("slot1", filler), LinkValue::new("slot1", filler)],
            )
            .add();
        let adapter = DiffAdapter::span("Event")
            .with_feature(FeatureDef::link("args", LinkCompareBehavior::LinkTargetAsLabel));

        let units = adapter.units(&doc, only(&doc, "Event")).unwrap();
        // host + one link slot
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].0.link().unwrap().role.as_deref(), Some("slot1"));
        assert_eq!(units[1].1["args"], Some(Label::single("5-7")));
    }

    #[test]
    fn test_role_as_label_keys_on_target() {
        let mut doc = InMemoryDocument::new("doc", "This is a test.");
        let filler = doc.annotate("Token", 5, 7).add();
        doc.annotate("Event", 0, 4)
            .feature("args", vec![LinkValue::new("slot2", filler)])
            .add();
        let adapter = DiffAdapter::span("Event")
            .with_feature(FeatureDef::link("args", LinkCompareBehavior::LinkRoleAsLabel));

        let units = adapter.units(&doc, only(&doc, "Event")).unwrap();
        let key = units[1].0.link().unwrap();
        assert_eq!(key.role, None);
        assert_eq!(key.target, Some(Extent::new(5, 7)));
        assert_eq!(units[1].1["args"], Some(Label::single("slot2")));
    }

    #[test]
    fn test_relation_uses_attachment_points() {
        let mut doc = InMemoryDocument::new("doc", "This is a test.");
        let gov = doc.annotate("Token", 0, 4).add();
        let dep = doc.annotate("Token", 5, 7).add();
        doc.annotate("Dependency", 5, 7)
            .feature("Governor", gov)
            .feature("Dependent", dep)
            .feature("type", "nsubj")
            .add();
        let adapter = DiffAdapter::relation("Dependency", "Governor", "Dependent")
            .with_feature(FeatureDef::single("type"));

        let units = adapter.units(&doc, only(&doc, "Dependency")).unwrap();
        assert_eq!(units[0].0.to_string(), "Dependency[doc] 0-4 -> 5-7");
    }

    #[test]
    fn test_relation_with_missing_endpoint_is_dangling() {
        let mut doc = InMemoryDocument::new("doc", "This is a test.");
        doc.annotate("Dependency", 5, 7)
            .feature("Governor", AnnotationId::new(42))
            .add();
        let adapter = DiffAdapter::relation("Dependency", "Governor", "Dependent");

        let err = adapter.units(&doc, only(&doc, "Dependency")).unwrap_err();
        assert!(matches!(err, DiffError::DanglingReference { .. }));
    }

    #[test]
    fn test_chain_emits_arc() {
        let mut doc = InMemoryDocument::new("doc", "Alice said she left.");
        let second = doc.annotate("CorefLink", 11, 14).feature("referenceType", "PRON").add();
        doc.annotate("CorefLink", 0, 5)
            .feature("referenceType", "NAM")
            .feature("next", second)
            .feature("referenceRelation", "anaphoric")
            .add();
        let adapter = DiffAdapter::chain("CorefLink", "next", Some("referenceRelation"))
            .with_feature(FeatureDef::single("referenceType"))
            .with_feature(FeatureDef::single("referenceRelation"));
        adapter.validate().unwrap();

        let units = adapter.units(&doc, only(&doc, "CorefLink")).unwrap();
        assert_eq!(units.len(), 2);
        assert!(!units[0].1.contains_key("referenceRelation"));
        assert_eq!(units[1].0.to_string(), "CorefLink[doc] 0-5 ~> 11-14");
        assert_eq!(units[1].1["referenceRelation"], Some(Label::single("anaphoric")));
    }

    #[test]
    fn test_type_mismatch() {
        let mut doc = InMemoryDocument::new("doc", "This is a test.");
        doc.annotate("Span", 0, 4)
            .feature("value", FeatureValue::strings(["a"]))
            .add();
        let adapter = DiffAdapter::span("Span").with_feature(FeatureDef::single("value"));

        let err = adapter.units(&doc, only(&doc, "Span")).unwrap_err();
        assert!(err.to_string().contains("string array"));
    }

    #[test]
    fn test_validate_rejects_unsupported_combinations() {
        let links_on_relation = DiffAdapter::relation("Rel", "source", "target")
            .with_feature(FeatureDef::link("args", LinkCompareBehavior::default()));
        assert!(matches!(links_on_relation.validate(), Err(DiffError::Configuration { .. })));

        let twice = DiffAdapter::span("Span")
            .with_feature(FeatureDef::single("value"))
            .with_feature(FeatureDef::multi_value("value"));
        assert!(twice.validate().is_err());

        let endpoint_as_label = DiffAdapter::relation("Rel", "source", "target")
            .with_feature(FeatureDef::single("source"));
        assert!(endpoint_as_label.validate().is_err());

        let undeclared_arc = DiffAdapter::chain("Chain", "next", Some("relation"));
        assert!(undeclared_arc.validate().is_err());
    }
}
