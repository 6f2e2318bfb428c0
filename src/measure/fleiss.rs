//! Fleiss' kappa for two or more raters.

use std::collections::BTreeMap;

use super::statistic::{check_item_width, CodingStatistic, Outcome, StatisticError};
use crate::study::CodingStudy;

/// Fleiss' kappa (Fleiss 1971, multi-π).
///
/// Every item is rated by all raters; a missing value counts as a category
/// of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct FleissKappa;

const NAME: &str = "fleiss_kappa";

impl CodingStatistic for FleissKappa {
    fn name(&self) -> &'static str {
        NAME
    }

    fn compute(&self, study: &CodingStudy) -> Result<Outcome, StatisticError> {
        let raters = study.rater_count();
        if raters < 2 {
            return Err(StatisticError::UnsupportedRaterCount { statistic: NAME, raters });
        }
        check_item_width(NAME, study)?;
        if study.item_count() == 0 {
            return Ok(Outcome::InsufficientData);
        }

        let n = raters as f64;
        let items = study.item_count() as f64;
        let mut totals: BTreeMap<Option<&str>, usize> = BTreeMap::new();
        let mut observed = 0.0;

        for item in study.items() {
            let mut counts: BTreeMap<Option<&str>, usize> = BTreeMap::new();
            for value in &item.values {
                *counts.entry(value.as_deref()).or_default() += 1;
            }
            let squares: f64 = counts.values().map(|&c| (c * c) as f64).sum();
            observed += (squares - n) / (n * (n - 1.0));
            for (category, count) in counts {
                *totals.entry(category).or_default() += count;
            }
        }
        observed /= items;

        let expected: f64 = totals
            .values()
            .map(|&c| {
                let p = c as f64 / (items * n);
                p * p
            })
            .sum();

        if (1.0 - expected).abs() < f64::EPSILON {
            return Ok(Outcome::InsufficientData);
        }
        Ok(Outcome::from_value((observed - expected) / (1.0 - expected)))
    }
}
