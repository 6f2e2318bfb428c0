//! Krippendorff's alpha, nominal distance.

use std::collections::BTreeMap;

use super::statistic::{check_item_width, CodingStatistic, Outcome, StatisticError};
use crate::study::CodingStudy;

/// Krippendorff's alpha with the nominal distance function.
///
/// Built on the coincidence matrix of pairable values: missing values are
/// skipped and items with fewer than two values contribute nothing.
/// `α = 1 − D_O / D_E`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KrippendorffAlphaNominal;

const NAME: &str = "krippendorff_alpha_nominal";

impl CodingStatistic for KrippendorffAlphaNominal {
    fn name(&self) -> &'static str {
        NAME
    }

    fn compute(&self, study: &CodingStudy) -> Result<Outcome, StatisticError> {
        let raters = study.rater_count();
        if raters < 2 {
            return Err(StatisticError::UnsupportedRaterCount { statistic: NAME, raters });
        }
        check_item_width(NAME, study)?;

        let mut coincidence: BTreeMap<(&str, &str), f64> = BTreeMap::new();
        for item in study.items() {
            let values: Vec<&str> = item.values.iter().flatten().map(String::as_str).collect();
            let m = values.len();
            if m < 2 {
                continue;
            }
            let weight = 1.0 / (m - 1) as f64;
            for (i, c) in values.iter().enumerate() {
                for (j, k) in values.iter().enumerate() {
                    if i != j {
                        *coincidence.entry((*c, *k)).or_default() += weight;
                    }
                }
            }
        }

        let n: f64 = coincidence.values().sum();
        if n <= 1.0 {
            return Ok(Outcome::InsufficientData);
        }

        let mut marginals: BTreeMap<&str, f64> = BTreeMap::new();
        let mut disagreeing = 0.0;
        for (&(c, k), &count) in &coincidence {
            *marginals.entry(c).or_default() += count;
            if c != k {
                disagreeing += count;
            }
        }

        let observed = disagreeing / n;
        let total: f64 = marginals.values().sum();
        let same: f64 = marginals.values().map(|m| m * m).sum();
        let expected = (total * total - same) / (n * (n - 1.0));

        if expected <= 0.0 {
            return Ok(Outcome::InsufficientData);
        }
        Ok(Outcome::from_value(1.0 - observed / expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::statistic::coding_fixture;

    #[test]
    fn test_reliability_data_with_missing_values() {
        let a = [Some("1"), Some("2"), Some("3"), Some("3"), Some("2"), Some("1"), Some("4"), Some("1"), Some("2"), None, None, None];
        let b = [Some("1"), Some("2"), Some("3"), Some("3"), Some("2"), Some("2"), Some("4"), Some("1"), Some("2"), Some("5"), None, Some("3")];
        let c = [None, Some("3"), Some("3"), Some("3"), Some("2"), Some("3"), Some("4"), Some("2"), Some("2"), Some("5"), Some("1"), None];
        let d = [Some("1"), Some("2"), Some("3"), Some("3"), Some("2"), Some("4"), Some("4"), Some("1"), Some("2"), Some("5"), Some("1"), None];
        let rows: Vec<Vec<Option<&str>>> = (0..12).map(|i| vec![a[i], b[i], c[i], d[i]]).collect();

        let alpha = KrippendorffAlphaNominal.compute(&coding_fixture(4, &rows)).unwrap().value();
        assert!((alpha - 0.743).abs() < 1e-3);
    }

    #[test]
    fn test_unset_value_is_a_category() {
        let study = coding_fixture(2, &[vec![Some(""), Some("X")], vec![Some("X"), Some("X")]]);
        assert!(KrippendorffAlphaNominal.compute(&study).unwrap().is_computed());
    }

    #[test]
    fn test_no_pairable_values_is_insufficient() {
        let study = coding_fixture(2, &[vec![Some("X"), None], vec![None, Some("Y")]]);
        assert_eq!(KrippendorffAlphaNominal.compute(&study).unwrap(), Outcome::InsufficientData);
    }

    #[test]
    fn test_single_category_is_insufficient() {
        let study = coding_fixture(2, &[vec![Some("X"), Some("X")], vec![Some("X"), Some("X")]]);
        assert_eq!(KrippendorffAlphaNominal.compute(&study).unwrap(), Outcome::InsufficientData);
    }
}
