//! Krippendorff's alpha for unitizing.
//!
//! Per category, each rater's units are laid out with the gaps between them
//! so that the continuum is fully covered. Observed disagreement compares
//! segments across rater pairs; expected disagreement compares every unit
//! with every unit and gap of the category. The coefficient sums both over
//! categories: `α = 1 − ΣD_O / ΣD_E`.

use std::collections::BTreeSet;

use super::statistic::{Outcome, StatisticError, UnitizingStatistic};
use crate::study::UnitizingStudy;

/// Krippendorff's unitizing alpha (uα).
#[derive(Debug, Clone, Copy, Default)]
pub struct KrippendorffAlphaUnitizing;

const NAME: &str = "krippendorff_alpha_unitizing";

#[derive(Debug, Clone, Copy)]
struct Segment {
    begin: f64,
    length: f64,
    unit: bool,
}

impl UnitizingStatistic for KrippendorffAlphaUnitizing {
    fn name(&self) -> &'static str {
        NAME
    }

    fn compute(&self, study: &UnitizingStudy) -> Result<Outcome, StatisticError> {
        let raters = study.rater_count();
        if raters < 2 || study.continuum_length() == 0 {
            return Ok(Outcome::InsufficientData);
        }
        let length = study.continuum_length();
        if let Some(unit) = study
            .units()
            .iter()
            .find(|u| u.rater >= raters || u.begin + u.length > length)
        {
            return Err(StatisticError::Numerical {
                statistic: NAME,
                reason: format!(
                    "unit {}+{} of rater {} outside the study ({} raters, continuum {})",
                    unit.begin, unit.length, unit.rater, raters, length
                ),
            });
        }

        let mut observed = 0.0;
        let mut expected = 0.0;
        for category in study.categories() {
            let (d_o, d_e) = category_disagreement(study, category);
            observed += d_o;
            expected += d_e;
        }

        if observed == expected {
            return Ok(Outcome::Computed(0.0));
        }
        if expected == 0.0 {
            return Ok(Outcome::InsufficientData);
        }
        Ok(Outcome::from_value(1.0 - observed / expected))
    }
}

/// Observed and expected disagreement of one category.
fn category_disagreement(study: &UnitizingStudy, category: &str) -> (f64, f64) {
    let m = study.rater_count() as f64;
    let l = study.continuum_length() as f64;

    let segments: Vec<Vec<Segment>> = (0..study.rater_count())
        .map(|rater| {
            let units: BTreeSet<(usize, usize, usize)> = study
                .units()
                .iter()
                .enumerate()
                .filter(|(_, u)| u.rater == rater && u.category == category)
                .map(|(i, u)| (u.begin, u.length, i))
                .collect();
            layout(units.into_iter().map(|(b, len, _)| (b, len)), study.continuum_length())
        })
        .collect();

    let mut observed = 0.0;
    for (i, left) in segments.iter().enumerate() {
        for (j, right) in segments.iter().enumerate() {
            if i == j {
                continue;
            }
            for g in left {
                for h in right {
                    observed += delta_squared(g, h);
                }
            }
        }
    }
    observed /= m * (m - 1.0) * l * l;

    let units: Vec<f64> = segments
        .iter()
        .flatten()
        .filter(|s| s.unit)
        .map(|s| s.length)
        .collect();
    let gaps: Vec<f64> = segments
        .iter()
        .flatten()
        .filter(|s| !s.unit)
        .map(|s| s.length)
        .collect();
    let count = units.len() as f64;

    let mut numerator = 0.0;
    for &lg in &units {
        numerator += (count - 1.0) / 3.0 * (2.0 * lg.powi(3) - 3.0 * lg.powi(2) + lg);
        numerator += gaps
            .iter()
            .filter(|&&lh| lh >= lg)
            .map(|&lh| (lh - lg + 1.0) * lg * lg)
            .sum::<f64>();
    }
    let denominator = m * l * (m * l - 1.0) - units.iter().map(|lg| lg * (lg - 1.0)).sum::<f64>();
    let expected = if denominator > 0.0 {
        2.0 / (m * l) * numerator / denominator
    } else {
        0.0
    };

    (observed, expected)
}

/// Lay sorted `(begin, length)` units out with gaps covering `[0, length)`.
fn layout<I>(units: I, continuum: usize) -> Vec<Segment>
where
    I: IntoIterator<Item = (usize, usize)>,
{
    let mut segments = Vec::new();
    let mut last = 0;
    for (begin, length) in units {
        if begin > last {
            segments.push(Segment {
                begin: last as f64,
                length: (begin - last) as f64,
                unit: false,
            });
        }
        segments.push(Segment {
            begin: begin as f64,
            length: length as f64,
            unit: true,
        });
        last = last.max(begin + length);
    }
    if last < continuum {
        segments.push(Segment {
            begin: last as f64,
            length: (continuum - last) as f64,
            unit: false,
        });
    }
    segments
}

fn delta_squared(g: &Segment, h: &Segment) -> f64 {
    let offset = g.begin - h.begin;
    match (g.unit, h.unit) {
        (true, true) if -g.length < offset && offset < h.length => {
            offset.powi(2) + (g.begin + g.length - h.begin - h.length).powi(2)
        }
        (true, false) if h.length - g.length >= offset && offset >= 0.0 => g.length.powi(2),
        (false, true) if g.length - h.length <= offset && offset <= 0.0 => h.length.powi(2),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::study::UnitizingUnit;
    use crate::types::RaterId;

    fn study(units: &[(usize, usize, usize, &str)]) -> UnitizingStudy {
        UnitizingStudy::from_units(
            "Span",
            "value",
            vec![RaterId::from("a"), RaterId::from("b")],
            15,
            units
                .iter()
                .map(|&(rater, begin, length, category)| UnitizingUnit {
                    rater,
                    begin,
                    length,
                    category: category.to_string(),
                })
                .collect(),
        )
    }

    fn alpha(units: &[(usize, usize, usize, &str)]) -> f64 {
        KrippendorffAlphaUnitizing.compute(&study(units)).unwrap().value()
    }

    #[test]
    fn test_identical_units() {
        let value = alpha(&[(0, 0, 4, "X"), (1, 0, 4, "X"), (0, 5, 2, "Y"), (1, 5, 2, "Y")]);
        assert!((value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_value_overlap() {
        let value = alpha(&[(0, 0, 4, "a"), (1, 0, 4, "a"), (1, 0, 4, "b")]);
        assert!((value - 0.48932).abs() < 1e-4);
    }

    #[test]
    fn test_self_overlap() {
        let value = alpha(&[
            (0, 0, 4, "a"),
            (0, 0, 4, "b"),
            (0, 0, 4, "c"),
            (0, 0, 7, "a"),
            (0, 0, 7, "b"),
            (1, 0, 4, "a"),
            (1, 0, 4, "b"),
            (1, 0, 4, "c"),
        ]);
        assert!((value - 0.6794).abs() < 1e-3);
    }

    #[test]
    fn test_no_units_is_zero() {
        assert_eq!(KrippendorffAlphaUnitizing.compute(&study(&[])).unwrap(), Outcome::Computed(0.0));
    }

    #[test]
    fn test_empty_continuum_is_insufficient() {
        let empty = UnitizingStudy::from_units("Span", "value", vec![RaterId::from("a"), RaterId::from("b")], 0, vec![]);
        assert_eq!(KrippendorffAlphaUnitizing.compute(&empty).unwrap(), Outcome::InsufficientData);
    }

    #[test]
    fn test_unit_outside_continuum_is_an_error() {
        assert!(KrippendorffAlphaUnitizing.compute(&study(&[(0, 10, 10, "X")])).is_err());
    }

    #[test]
    fn test_gaps_cover_continuum() {
        let segments = layout([(2, 3), (4, 2)], 10);
        let kinds: Vec<(f64, f64, bool)> = segments.iter().map(|s| (s.begin, s.length, s.unit)).collect();
        assert_eq!(
            kinds,
            vec![(0.0, 2.0, false), (2.0, 3.0, true), (4.0, 2.0, true), (6.0, 4.0, false)]
        );
    }
}
