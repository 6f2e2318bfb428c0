//! Property tests for alignment determinism and tag invariants.

use annotation_agreement::{
    AgreementTraits, CodingAgreementMeasure, CohenKappa, DiffAdapter, DiffResult, FeatureDef, InMemoryDocument,
    KrippendorffAlphaUnitizing, PositionAligner, RaterId, Tag, UnitizingAgreementMeasure,
};
use proptest::prelude::*;

const LENGTH: usize = 40;

fn span_strategy() -> impl Strategy<Value = Vec<(usize, usize, String)>> {
    prop::collection::vec(
        (0..LENGTH, 1..8usize, prop::sample::select(vec!["X", "Y", "Z"])).prop_map(|(begin, len, value)| {
            let end = (begin + len).min(LENGTH);
            (begin, end, value.to_string())
        }),
        0..8,
    )
}

fn make_doc(spans: &[(usize, usize, String)]) -> InMemoryDocument {
    let mut doc = InMemoryDocument::with_length("doc", LENGTH);
    for (begin, end, value) in spans {
        doc.annotate("Span", *begin, *end).feature("value", value.as_str()).add();
    }
    doc
}

fn align(docs: &[InMemoryDocument]) -> DiffResult {
    let inputs: Vec<(RaterId, &InMemoryDocument)> = docs
        .iter()
        .enumerate()
        .map(|(i, d)| (RaterId::new(format!("r{}", i)), d))
        .collect();
    PositionAligner::single(DiffAdapter::span("Span").with_feature(FeatureDef::single("value")))
        .unwrap()
        .align(&inputs)
        .unwrap()
}

proptest! {
    #[test]
    fn alignment_is_idempotent(a in span_strategy(), b in span_strategy(), c in span_strategy()) {
        let docs = [make_doc(&a), make_doc(&b), make_doc(&c)];
        let first = align(&docs);
        let second = align(&docs);
        prop_assert_eq!(first.fingerprint(), second.fingerprint());
        prop_assert_eq!(first.print(), second.print());
    }

    #[test]
    fn every_set_is_complete_or_incomplete(a in span_strategy(), b in span_strategy()) {
        let diff = align(&[make_doc(&a), make_doc(&b)]);
        for set in diff.configuration_sets() {
            prop_assert!(set.has_tag(Tag::Complete) != set.has_tag(Tag::IncompletePosition));
            if set.has_tag(Tag::Difference) {
                prop_assert!(set.members().len() >= 2);
            }
            if set.has_tag(Tag::Stacked) {
                prop_assert!(!set.stacked().is_empty());
            }
            prop_assert!(set.members().len() <= diff.raters().len());
        }
    }

    #[test]
    fn restriction_matches_direct_alignment(a in span_strategy(), b in span_strategy(), c in span_strategy()) {
        let docs = [make_doc(&a), make_doc(&b), make_doc(&c)];
        let restricted = align(&docs).restrict_to(&[RaterId::from("r0"), RaterId::from("r1")]);
        let direct = align(&docs[..2]);
        prop_assert_eq!(restricted.size(), direct.size());
        for (x, y) in restricted.configuration_sets().iter().zip(direct.configuration_sets()) {
            prop_assert_eq!(x.tags(), y.tags());
        }
    }

    #[test]
    fn coefficients_stay_in_range(a in span_strategy(), b in span_strategy()) {
        let docs = [make_doc(&a), make_doc(&b)];
        let diff = align(&docs);

        let kappa = CodingAgreementMeasure::new(CohenKappa, "Span", "value", AgreementTraits::default())
            .full(&diff)
            .unwrap()
            .agreement();
        prop_assert!(kappa.is_nan() || (-1.0 - 1e-9..=1.0 + 1e-9).contains(&kappa));

        let inputs: Vec<(RaterId, &InMemoryDocument)> =
            vec![(RaterId::from("r0"), &docs[0]), (RaterId::from("r1"), &docs[1])];
        let alpha = UnitizingAgreementMeasure::new(KrippendorffAlphaUnitizing, "Span", "value", AgreementTraits::default())
            .full(&diff, &inputs)
            .unwrap()
            .agreement();
        prop_assert!(alpha.is_nan() || alpha <= 1.0 + 1e-9);
    }
}
