//! Annotation graph access.

pub mod memory;

use crate::types::Extent;

pub use memory::{
    Annotation, AnnotationBuilder, AnnotationId, FeatureValue, InMemoryDocument, LinkValue,
};

/// Read-only view of one rater's annotation graph for one document.
///
/// Implementations must return annotations in document order: begin
/// ascending, then end descending, then id ascending. The engine never
/// mutates a graph.
pub trait AnnotationGraph {
    /// Identifier of the document, shared by all raters' versions of it.
    fn document_id(&self) -> &str;

    /// Length of the document text in characters.
    fn text_length(&self) -> usize;

    /// All annotations of a layer, in document order.
    fn select(&self, layer: &str) -> Vec<&Annotation>;

    /// Fetch an annotation by id.
    fn get(&self, id: AnnotationId) -> Option<&Annotation>;

    /// Offsets of a referenced annotation.
    fn extent_of(&self, id: AnnotationId) -> Option<Extent> {
        self.get(id).map(Annotation::extent)
    }
}
