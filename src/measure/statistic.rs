//! Statistic traits and outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::study::{CodingStudy, UnitizingStudy};

/// Result of a statistic.
///
/// Insufficient data is an expected outcome, not an error: the coefficient
/// is undefined for the given study and reads as `NaN`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    /// A defined coefficient.
    Computed(f64),
    /// The study cannot support the coefficient.
    InsufficientData,
}

impl Outcome {
    /// Wrap a raw value; `NaN` and infinities become [`Outcome::InsufficientData`].
    pub fn from_value(value: f64) -> Self {
        if value.is_finite() {
            Outcome::Computed(value)
        } else {
            Outcome::InsufficientData
        }
    }

    /// The coefficient, `NaN` when undefined.
    pub fn value(&self) -> f64 {
        match self {
            Outcome::Computed(v) => *v,
            Outcome::InsufficientData => f64::NAN,
        }
    }

    /// Whether a coefficient was computed.
    pub fn is_computed(&self) -> bool {
        matches!(self, Outcome::Computed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Computed(v) => write!(f, "{:.4}", v),
            Outcome::InsufficientData => write!(f, "insufficient data"),
        }
    }
}

/// Unexpected statistic failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StatisticError {
    /// The statistic cannot handle this number of raters.
    #[error("{statistic} does not support {raters} raters")]
    UnsupportedRaterCount {
        /// Statistic name.
        statistic: &'static str,
        /// Rater count of the study.
        raters: usize,
    },
    /// The study is internally inconsistent.
    #[error("{statistic}: {reason}")]
    Numerical {
        /// Statistic name.
        statistic: &'static str,
        /// What went wrong.
        reason: String,
    },
}

/// A coefficient over a [`CodingStudy`].
pub trait CodingStatistic: Send + Sync {
    /// Stable name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Whether the statistic is defined for `raters` raters.
    fn supports_rater_count(&self, raters: usize) -> bool {
        raters >= 2
    }

    /// Compute the coefficient.
    fn compute(&self, study: &CodingStudy) -> Result<Outcome, StatisticError>;
}

/// A coefficient over a [`UnitizingStudy`].
pub trait UnitizingStatistic: Send + Sync {
    /// Stable name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Whether the statistic is defined for `raters` raters.
    fn supports_rater_count(&self, raters: usize) -> bool {
        raters >= 2
    }

    /// Compute the coefficient.
    fn compute(&self, study: &UnitizingStudy) -> Result<Outcome, StatisticError>;
}

/// Check that every item has one value per rater.
pub(crate) fn check_item_width(statistic: &'static str, study: &CodingStudy) -> Result<(), StatisticError> {
    let width = study.rater_count();
    match study.items().iter().find(|i| i.values.len() != width) {
        Some(item) => Err(StatisticError::Numerical {
            statistic,
            reason: format!(
                "item at {} has {} values for {} raters",
                item.position,
                item.values.len(),
                width
            ),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_is_insufficient() {
        assert_eq!(Outcome::from_value(f64::NAN), Outcome::InsufficientData);
        assert_eq!(Outcome::from_value(0.5), Outcome::Computed(0.5));
        assert!(Outcome::InsufficientData.value().is_nan());
    }

    #[test]
    fn test_outcome_serde() {
        let json = serde_json::to_string(&Outcome::Computed(0.25)).unwrap();
        assert_eq!(json, r#"{"status":"computed","value":0.25}"#);
        let back: Outcome = serde_json::from_str(r#"{"status":"insufficient_data"}"#).unwrap();
        assert_eq!(back, Outcome::InsufficientData);
    }
}

/// Coding study over a literal rater × item table, one row per item.
#[cfg(test)]
pub(crate) fn coding_fixture(raters: usize, rows: &[Vec<Option<&str>>]) -> CodingStudy {
    use crate::study::CodingItem;
    use crate::types::{Extent, Position, RaterId};

    let raters = (0..raters).map(|r| RaterId::new(format!("r{}", r))).collect();
    let items = rows
        .iter()
        .enumerate()
        .map(|(i, row)| CodingItem {
            position: Position::Span {
                document: "doc".to_string(),
                layer: "Span".to_string(),
                extent: Extent::new(i, i + 1),
                link: None,
            },
            values: row.iter().map(|v| v.map(str::to_string)).collect(),
        })
        .collect();
    CodingStudy::from_items("Span", "value", raters, items)
}
