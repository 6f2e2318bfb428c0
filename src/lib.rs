//! # annotation-agreement
//!
//! Deterministic cross-annotator diff and inter-rater agreement.
//!
//! The engine answers one question:
//!
//! > Given the same document annotated independently by several raters,
//! > where do they differ, and how much do they agree?
//!
//! ## Core Contract
//!
//! 1. Align every rater's annotations into comparable configuration sets
//! 2. Tag each set as complete, incomplete, differing or stacked
//! 3. Turn the sets of one feature into a coding or unitizing study
//! 4. Compute a coefficient, reporting insufficient data as `NaN`
//!
//! ## Architecture
//!
//! ```text
//! AnnotationGraph × raters → PositionAligner → DiffResult
//!                                 ↑                ↓
//!                            DiffAdapter     CodingStudy / UnitizingStudy
//!                                                  ↓
//!                                       AgreementMeasure → AgreementResult
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same inputs + same adapters → identical set order and tags
//! - Set order is first-sight order, never hash order
//! - `DiffResult::fingerprint` is stable across runs
//!
//! ## Example
//!
//! ```
//! use annotation_agreement::{
//!     AgreementTraits, CodingAgreementMeasure, CohenKappa, DiffAdapter, FeatureDef,
//!     InMemoryDocument, PositionAligner, RaterId,
//! };
//!
//! let mut alice = InMemoryDocument::new("doc", "John lives in Berlin.");
//! alice.annotate("NamedEntity", 0, 4).feature("value", "PER").add();
//! alice.annotate("NamedEntity", 14, 20).feature("value", "LOC").add();
//! let bob = alice.clone();
//!
//! let aligner = PositionAligner::single(
//!     DiffAdapter::span("NamedEntity").with_feature(FeatureDef::single("value")),
//! )
//! .unwrap();
//! let diff = aligner
//!     .align(&[(RaterId::from("alice"), &alice), (RaterId::from("bob"), &bob)])
//!     .unwrap();
//!
//! let measure =
//!     CodingAgreementMeasure::new(CohenKappa, "NamedEntity", "value", AgreementTraits::default());
//! assert_eq!(measure.full(&diff).unwrap().agreement(), 1.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod diff;
pub mod layer;
pub mod measure;
pub mod policy;
pub mod store;
pub mod study;
pub mod types;

// Re-exports
pub use canonical::{canonical_hash, canonical_json, dump_fingerprint, fingerprint};
pub use diff::{DiffError, DiffResult, PositionAligner};
pub use layer::{DiffAdapter, FeatureDef, FeatureKind, LayerKind, LinkCompareBehavior};
pub use measure::{
    AgreementError, AgreementState, CodingAgreementMeasure, CodingStatistic, CohenKappa, FleissKappa,
    FullAgreementResult, KrippendorffAlphaNominal, KrippendorffAlphaUnitizing, Outcome,
    PairwiseAgreementResult, StatisticError, UnitizingAgreementMeasure, UnitizingStatistic,
};
pub use policy::AgreementTraits;
pub use store::{
    Annotation, AnnotationBuilder, AnnotationGraph, AnnotationId, FeatureValue, InMemoryDocument, LinkValue,
};
pub use study::{
    CodingItem, CodingStudy, SetPartition, Study, StudyError, UnitizingStudy, UnitizingUnit,
};
pub use types::{AnnotationUnit, ConfigurationSet, Extent, Label, Labels, LinkKey, Position, RaterId, Tag};

/// Schema version of serialized diffs, studies and results.
/// Increment on breaking changes to any schema type.
pub const AGREEMENT_SCHEMA_VERSION: &str = "1.0.0";
