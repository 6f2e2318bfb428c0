//! Agreement results.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::statistic::Outcome;
use crate::study::Study;
use crate::types::{ConfigurationSet, RaterId};

/// Lifecycle of one agreement computation.
///
/// `Created → StudyBuilt → Computed | InsufficientData`. The first two are
/// only reported in trace logs while a measure runs; a result always holds
/// one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementState {
    /// Measure configured, nothing built yet.
    Created,
    /// Study built from the diff.
    StudyBuilt,
    /// A coefficient was computed.
    Computed,
    /// The study could not support the coefficient.
    InsufficientData,
}

impl AgreementState {
    /// Whether a result can carry this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, AgreementState::Computed | AgreementState::InsufficientData)
    }

    pub(crate) fn of(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Computed(_) => AgreementState::Computed,
            Outcome::InsufficientData => AgreementState::InsufficientData,
        }
    }
}

/// Which sets count as relevant for a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Relevance {
    /// Full results: sets tagged `USED` by the study.
    Used,
    /// Pairwise entries: sets where both raters of the pair are members.
    BothMembers,
}

/// Agreement of all raters of a diff on one feature.
///
/// Pairwise results hold one of these per rater pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullAgreementResult<S> {
    measure: String,
    layer: String,
    feature: String,
    raters: Vec<RaterId>,
    outcome: Outcome,
    state: AgreementState,
    relevant: Vec<ConfigurationSet>,
    study: S,
}

impl<S: Study> FullAgreementResult<S> {
    pub(crate) fn new(
        measure: &str,
        layer: &str,
        feature: &str,
        outcome: Outcome,
        study: S,
        relevance: Relevance,
    ) -> Self {
        let raters = study.raters().to_vec();
        let relevant = match relevance {
            Relevance::Used => study.partition().relevant.clone(),
            Relevance::BothMembers => study
                .partition()
                .all
                .iter()
                .filter(|set| set.has_members(&raters))
                .cloned()
                .collect(),
        };
        Self {
            measure: measure.to_string(),
            layer: layer.to_string(),
            feature: feature.to_string(),
            raters,
            state: AgreementState::of(&outcome),
            outcome,
            relevant,
            study,
        }
    }

    /// The coefficient; `NaN` on insufficient data.
    pub fn agreement(&self) -> f64 {
        self.outcome.value()
    }

    /// The coefficient as an outcome.
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Final state of the computation.
    pub fn state(&self) -> AgreementState {
        self.state
    }

    /// Name of the statistic.
    pub fn measure(&self) -> &str {
        &self.measure
    }

    /// Layer of the feature.
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Compared feature.
    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// Raters of the study.
    pub fn raters(&self) -> &[RaterId] {
        &self.raters
    }

    /// The study the coefficient was computed on.
    pub fn study(&self) -> &S {
        &self.study
    }

    /// Every configuration set of the feature.
    pub fn all_sets(&self) -> &[ConfigurationSet] {
        &self.study.partition().all
    }

    /// Sets with fewer than two members.
    pub fn irrelevant_sets(&self) -> &[ConfigurationSet] {
        &self.study.partition().irrelevant
    }

    /// Sets the coefficient speaks for.
    ///
    /// For a full result these are the sets the study used; for a pairwise
    /// entry, the sets both raters of the pair annotated.
    pub fn relevant_sets(&self) -> &[ConfigurationSet] {
        &self.relevant
    }

    /// Sets missing at least one rater.
    pub fn incomplete_sets_by_position(&self) -> &[ConfigurationSet] {
        &self.study.partition().incomplete_by_position
    }

    /// Complete sets with an unset label.
    pub fn incomplete_sets_by_label(&self) -> &[ConfigurationSet] {
        &self.study.partition().incomplete_by_label
    }

    /// Sets where raters differ in the feature.
    pub fn sets_with_differences(&self) -> &[ConfigurationSet] {
        &self.study.partition().with_differences
    }

    /// Sets where a rater has several differently-labelled units.
    pub fn plurality_sets(&self) -> &[ConfigurationSet] {
        &self.study.partition().plurality
    }

    /// Sets retained by the study.
    pub fn used_sets(&self) -> &[ConfigurationSet] {
        &self.study.partition().used
    }
}

impl<S: Study> fmt::Display for FullAgreementResult<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raters: Vec<&str> = self.raters.iter().map(RaterId::as_str).collect();
        writeln!(
            f,
            "{} on {}.{} [{}]: {}",
            self.measure,
            self.layer,
            self.feature,
            raters.join(", "),
            self.outcome
        )
    }
}

/// Agreement of every unordered rater pair.
///
/// Entries are ordered by rater index: `(0, 1), (0, 2), …, (1, 2), …`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseAgreementResult<S> {
    raters: Vec<RaterId>,
    entries: Vec<FullAgreementResult<S>>,
}

impl<S: Study> PairwiseAgreementResult<S> {
    pub(crate) fn new(raters: Vec<RaterId>, entries: Vec<FullAgreementResult<S>>) -> Self {
        Self { raters, entries }
    }

    /// All raters of the matrix.
    pub fn raters(&self) -> &[RaterId] {
        &self.raters
    }

    /// Pair results in rater-index order.
    pub fn entries(&self) -> &[FullAgreementResult<S>] {
        &self.entries
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are fewer than two raters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Result for a pair, in either order.
    pub fn get(&self, a: &RaterId, b: &RaterId) -> Option<&FullAgreementResult<S>> {
        if a == b {
            return None;
        }
        self.entries
            .iter()
            .find(|e| e.raters.contains(a) && e.raters.contains(b))
    }

    /// Coefficient for a pair; `NaN` if undefined or unknown.
    pub fn agreement(&self, a: &RaterId, b: &RaterId) -> f64 {
        self.get(a, b).map(FullAgreementResult::agreement).unwrap_or(f64::NAN)
    }

    /// Symmetric rater × rater matrix. The diagonal is `1.0`.
    pub fn matrix(&self) -> Vec<Vec<f64>> {
        self.raters
            .iter()
            .map(|a| {
                self.raters
                    .iter()
                    .map(|b| if a == b { 1.0 } else { self.agreement(a, b) })
                    .collect()
            })
            .collect()
    }
}

impl<S: Study> fmt::Display for PairwiseAgreementResult<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            write!(f, "{}", entry)?;
        }
        Ok(())
    }
}
