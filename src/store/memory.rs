//! In-memory annotation document.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;

use super::AnnotationGraph;
use crate::types::Extent;

/// Identifier of an annotation within one document version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(u32);

impl AnnotationId {
    /// Create a new annotation id.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw id.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One link of a link feature.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkValue {
    /// Role label of the link.
    pub role: Option<String>,
    /// Annotation the link points to.
    pub target: AnnotationId,
}

impl LinkValue {
    /// Create a link with a role.
    pub fn new(role: impl Into<String>, target: AnnotationId) -> Self {
        Self {
            role: Some(role.into()),
            target,
        }
    }

    /// Create a link without a role.
    pub fn unlabelled(target: AnnotationId) -> Self {
        Self { role: None, target }
    }
}

/// Value stored in an annotation feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FeatureValue {
    /// Explicitly unset.
    Null,
    /// A string value.
    String(String),
    /// An integer value.
    Integer(i64),
    /// A boolean value.
    Boolean(bool),
    /// A string array (multi-valued feature).
    StringArray(Vec<String>),
    /// A reference to another annotation.
    Reference(AnnotationId),
    /// A list of role-labelled links.
    Links(Vec<LinkValue>),
}

impl FeatureValue {
    /// Build a string array value.
    pub fn strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::StringArray(values.into_iter().map(Into::into).collect())
    }

    /// Short name of the value shape, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Boolean(_) => "boolean",
            Self::StringArray(_) => "string array",
            Self::Reference(_) => "reference",
            Self::Links(_) => "links",
        }
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for FeatureValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for FeatureValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Vec<String>> for FeatureValue {
    fn from(values: Vec<String>) -> Self {
        Self::StringArray(values)
    }
}

impl From<AnnotationId> for FeatureValue {
    fn from(id: AnnotationId) -> Self {
        Self::Reference(id)
    }
}

impl From<Vec<LinkValue>> for FeatureValue {
    fn from(links: Vec<LinkValue>) -> Self {
        Self::Links(links)
    }
}

/// An annotation with its features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Identifier within the document.
    pub id: AnnotationId,
    /// Layer (type) name.
    pub layer: String,
    /// Begin offset.
    pub begin: usize,
    /// End offset.
    pub end: usize,
    /// Feature values by name. Missing features read as unset.
    #[serde(default)]
    pub features: BTreeMap<String, FeatureValue>,
}

impl Annotation {
    /// Offsets of the annotation.
    pub fn extent(&self) -> Extent {
        Extent::new(self.begin, self.end)
    }

    /// Value of a feature.
    pub fn feature(&self, name: &str) -> Option<&FeatureValue> {
        self.features.get(name)
    }
}

/// In-memory annotation document.
///
/// Uses a BTreeMap keyed by id for deterministic iteration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(into = "DocumentRepr", try_from = "DocumentRepr")]
pub struct InMemoryDocument {
    id: String,
    text_length: usize,
    annotations: BTreeMap<AnnotationId, Annotation>,
    next_id: u32,
}

impl InMemoryDocument {
    /// Create a document for a text.
    pub fn new(id: impl Into<String>, text: &str) -> Self {
        Self::with_length(id, text.chars().count())
    }

    /// Create a document with a given text length.
    pub fn with_length(id: impl Into<String>, text_length: usize) -> Self {
        Self {
            id: id.into(),
            text_length,
            annotations: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Start building an annotation.
    pub fn annotate(&mut self, layer: impl Into<String>, begin: usize, end: usize) -> AnnotationBuilder<'_> {
        let id = AnnotationId(self.next_id);
        self.next_id += 1;
        AnnotationBuilder {
            annotation: Annotation {
                id,
                layer: layer.into(),
                begin,
                end,
                features: BTreeMap::new(),
            },
            doc: self,
        }
    }

    /// Set a feature on an existing annotation. Returns `false` if the
    /// annotation does not exist.
    pub fn set_feature(&mut self, id: AnnotationId, name: impl Into<String>, value: impl Into<FeatureValue>) -> bool {
        match self.annotations.get_mut(&id) {
            Some(annotation) => {
                annotation.features.insert(name.into(), value.into());
                true
            }
            None => false,
        }
    }

    /// Number of annotations across all layers.
    pub fn num_annotations(&self) -> usize {
        self.annotations.len()
    }
}

impl AnnotationGraph for InMemoryDocument {
    fn document_id(&self) -> &str {
        &self.id
    }

    fn text_length(&self) -> usize {
        self.text_length
    }

    fn select(&self, layer: &str) -> Vec<&Annotation> {
        let mut selected: Vec<&Annotation> = self
            .annotations
            .values()
            .filter(|a| a.layer == layer)
            .collect();
        selected.sort_by_key(|a| (a.begin, Reverse(a.end), a.id));
        selected
    }

    fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(&id)
    }
}

/// Builder returned by [`InMemoryDocument::annotate`].
pub struct AnnotationBuilder<'a> {
    doc: &'a mut InMemoryDocument,
    annotation: Annotation,
}

impl AnnotationBuilder<'_> {
    /// Set a feature value.
    pub fn feature(mut self, name: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.annotation.features.insert(name.into(), value.into());
        self
    }

    /// Add the annotation to the document.
    pub fn add(self) -> AnnotationId {
        let id = self.annotation.id;
        self.doc.annotations.insert(id, self.annotation);
        id
    }
}

/// Serialized form of a document: annotations as a list.
#[derive(Serialize, Deserialize)]
struct DocumentRepr {
    id: String,
    text_length: usize,
    #[serde(default)]
    annotations: Vec<Annotation>,
}

impl From<InMemoryDocument> for DocumentRepr {
    fn from(doc: InMemoryDocument) -> Self {
        Self {
            id: doc.id,
            text_length: doc.text_length,
            annotations: doc.annotations.into_values().collect(),
        }
    }
}

impl TryFrom<DocumentRepr> for InMemoryDocument {
    type Error = String;

    fn try_from(repr: DocumentRepr) -> Result<Self, Self::Error> {
        let mut doc = InMemoryDocument::with_length(repr.id, repr.text_length);
        for annotation in repr.annotations {
            let id = annotation.id;
            if doc.annotations.insert(id, annotation).is_some() {
                return Err(format!("duplicate annotation id {} in document {}", id, doc.id));
            }
            doc.next_id = doc.next_id.max(id.0 + 1);
        }
        Ok(doc)
    }
}
