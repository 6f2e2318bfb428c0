//! Cohen's kappa for two raters.

use std::collections::BTreeMap;

use super::statistic::{check_item_width, CodingStatistic, Outcome, StatisticError};
use crate::study::CodingStudy;

/// Cohen's kappa.
///
/// `κ = (A_O − A_E) / (1 − A_E)` with `A_E` from each rater's own category
/// distribution. A missing value counts as a category of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct CohenKappa;

const NAME: &str = "cohen_kappa";

impl CodingStatistic for CohenKappa {
    fn name(&self) -> &'static str {
        NAME
    }

    fn supports_rater_count(&self, raters: usize) -> bool {
        raters == 2
    }

    fn compute(&self, study: &CodingStudy) -> Result<Outcome, StatisticError> {
        if study.rater_count() != 2 {
            return Err(StatisticError::UnsupportedRaterCount {
                statistic: NAME,
                raters: study.rater_count(),
            });
        }
        check_item_width(NAME, study)?;
        if study.item_count() == 0 {
            return Ok(Outcome::InsufficientData);
        }

        let n = study.item_count() as f64;
        let mut agreeing = 0usize;
        let mut marginals: BTreeMap<Option<&str>, (usize, usize)> = BTreeMap::new();
        for item in study.items() {
            let first = item.values[0].as_deref();
            let second = item.values[1].as_deref();
            if first == second {
                agreeing += 1;
            }
            marginals.entry(first).or_default().0 += 1;
            marginals.entry(second).or_default().1 += 1;
        }

        let observed = agreeing as f64 / n;
        let expected: f64 = marginals
            .values()
            .map(|&(a, b)| (a as f64 / n) * (b as f64 / n))
            .sum();

        if (1.0 - expected).abs() < f64::EPSILON {
            return Ok(Outcome::InsufficientData);
        }
        Ok(Outcome::from_value((observed - expected) / (1.0 - expected)))
    }
}
