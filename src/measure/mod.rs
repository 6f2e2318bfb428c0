//! Agreement measures.
//!
//! A measure binds a statistic to a `(layer, feature)` and a set of
//! [`AgreementTraits`]. Each invocation builds a study from a diff and
//! computes the statistic on it, either over all raters ([`full`]) or once
//! per unordered rater pair ([`pairwise`]).
//!
//! ## Failure policy
//!
//! - Insufficient data is a result, not an error: the agreement reads `NaN`.
//! - Fewer than two raters is insufficient data.
//! - A statistic that cannot handle the rater count fails before any study
//!   is built.
//! - Any other statistic failure is logged with the study dump and the diff
//!   fingerprint, then returned as [`AgreementError::Computation`].
//!
//! [`full`]: CodingAgreementMeasure::full
//! [`pairwise`]: CodingAgreementMeasure::pairwise

pub mod cohen;
pub mod fleiss;
pub mod krippendorff;
pub mod result;
pub mod statistic;
pub mod unitizing;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::canonical::dump_fingerprint;
use crate::diff::DiffResult;
use crate::policy::AgreementTraits;
use crate::store::AnnotationGraph;
use crate::study::{CodingStudy, Study, StudyError, UnitizingStudy};
use crate::types::RaterId;

pub use cohen::CohenKappa;
pub use fleiss::FleissKappa;
pub use krippendorff::KrippendorffAlphaNominal;
use result::Relevance;
pub use result::{AgreementState, FullAgreementResult, PairwiseAgreementResult};
pub use statistic::{CodingStatistic, Outcome, StatisticError, UnitizingStatistic};
pub use unitizing::KrippendorffAlphaUnitizing;

/// Error type for agreement measures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgreementError {
    /// The study could not be built.
    #[error(transparent)]
    Study(#[from] StudyError),
    /// The statistic is not defined for the rater count.
    #[error("{measure} does not support {raters} raters")]
    UnsupportedRaterCount {
        /// Statistic name.
        measure: &'static str,
        /// Rater count of the diff.
        raters: usize,
    },
    /// The statistic failed unexpectedly.
    #[error("{measure} failed: {source}")]
    Computation {
        /// Statistic name.
        measure: &'static str,
        /// Underlying failure.
        source: StatisticError,
    },
}

/// Agreement on a categorical feature via a [`CodingStudy`].
#[derive(Debug, Clone)]
pub struct CodingAgreementMeasure<S> {
    statistic: S,
    layer: String,
    feature: String,
    traits: AgreementTraits,
    threads: usize,
}

impl<S: CodingStatistic> CodingAgreementMeasure<S> {
    /// Create a measure for `(layer, feature)`.
    pub fn new(statistic: S, layer: impl Into<String>, feature: impl Into<String>, traits: AgreementTraits) -> Self {
        Self {
            statistic,
            layer: layer.into(),
            feature: feature.into(),
            traits,
            threads: 1,
        }
    }

    /// Compute rater pairs on up to `threads` worker threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// The wrapped statistic.
    pub fn statistic(&self) -> &S {
        &self.statistic
    }

    /// Traits the studies are built with.
    pub fn traits(&self) -> &AgreementTraits {
        &self.traits
    }

    /// Agreement over all raters of the diff.
    pub fn full(&self, diff: &DiffResult) -> Result<FullAgreementResult<CodingStudy>, AgreementError> {
        self.run(diff, Relevance::Used)
    }

    /// Agreement of every unordered rater pair, each on the diff restricted
    /// to that pair.
    pub fn pairwise(&self, diff: &DiffResult) -> Result<PairwiseAgreementResult<CodingStudy>, AgreementError> {
        let entries = run_pairs(self.threads, diff.raters(), |a, b| {
            self.run(&diff.restrict_to(&[a.clone(), b.clone()]), Relevance::BothMembers)
        })?;
        Ok(PairwiseAgreementResult::new(diff.raters().to_vec(), entries))
    }

    fn run(
        &self,
        diff: &DiffResult,
        relevance: Relevance,
    ) -> Result<FullAgreementResult<CodingStudy>, AgreementError> {
        let name = self.statistic.name();
        tracing::trace!(
            measure = name,
            layer = %self.layer,
            feature = %self.feature,
            state = ?AgreementState::Created,
            "Measure invoked"
        );
        check_rater_count(name, diff.raters().len(), |n| self.statistic.supports_rater_count(n))?;

        let study = CodingStudy::build(diff, &self.layer, &self.feature, &self.traits)?;
        evaluate(name, &self.layer, &self.feature, diff, study, relevance, |study| {
            self.statistic.compute(study)
        })
    }
}

/// Agreement on a feature via a [`UnitizingStudy`].
///
/// Units are read from the graphs the diff was aligned from, so every call
/// takes the same inputs the aligner was given.
#[derive(Debug, Clone)]
pub struct UnitizingAgreementMeasure<S> {
    statistic: S,
    layer: String,
    feature: String,
    traits: AgreementTraits,
    threads: usize,
}

impl<S: UnitizingStatistic> UnitizingAgreementMeasure<S> {
    /// Create a measure for `(layer, feature)`.
    pub fn new(statistic: S, layer: impl Into<String>, feature: impl Into<String>, traits: AgreementTraits) -> Self {
        Self {
            statistic,
            layer: layer.into(),
            feature: feature.into(),
            traits,
            threads: 1,
        }
    }

    /// Compute rater pairs on up to `threads` worker threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// The wrapped statistic.
    pub fn statistic(&self) -> &S {
        &self.statistic
    }

    /// Agreement over all raters of the diff.
    pub fn full<G>(
        &self,
        diff: &DiffResult,
        inputs: &[(RaterId, &G)],
    ) -> Result<FullAgreementResult<UnitizingStudy>, AgreementError>
    where
        G: AnnotationGraph + ?Sized,
    {
        self.run(diff, inputs, Relevance::Used)
    }

    /// Agreement of every unordered rater pair.
    pub fn pairwise<G>(
        &self,
        diff: &DiffResult,
        inputs: &[(RaterId, &G)],
    ) -> Result<PairwiseAgreementResult<UnitizingStudy>, AgreementError>
    where
        G: AnnotationGraph + Sync + ?Sized,
    {
        let entries = run_pairs(self.threads, diff.raters(), |a, b| {
            self.run(&diff.restrict_to(&[a.clone(), b.clone()]), inputs, Relevance::BothMembers)
        })?;
        Ok(PairwiseAgreementResult::new(diff.raters().to_vec(), entries))
    }

    fn run<G>(
        &self,
        diff: &DiffResult,
        inputs: &[(RaterId, &G)],
        relevance: Relevance,
    ) -> Result<FullAgreementResult<UnitizingStudy>, AgreementError>
    where
        G: AnnotationGraph + ?Sized,
    {
        let name = self.statistic.name();
        tracing::trace!(
            measure = name,
            layer = %self.layer,
            feature = %self.feature,
            state = ?AgreementState::Created,
            "Measure invoked"
        );
        check_rater_count(name, diff.raters().len(), |n| self.statistic.supports_rater_count(n))?;

        let study = UnitizingStudy::build(diff, inputs, &self.layer, &self.feature, &self.traits)?;
        evaluate(name, &self.layer, &self.feature, diff, study, relevance, |study| {
            self.statistic.compute(study)
        })
    }
}

fn check_rater_count<F>(measure: &'static str, raters: usize, supports: F) -> Result<(), AgreementError>
where
    F: Fn(usize) -> bool,
{
    if raters >= 2 && !supports(raters) {
        return Err(AgreementError::UnsupportedRaterCount { measure, raters });
    }
    Ok(())
}

/// Run a statistic on a built study and apply the failure policy.
fn evaluate<St, F>(
    measure: &'static str,
    layer: &str,
    feature: &str,
    diff: &DiffResult,
    study: St,
    relevance: Relevance,
    compute: F,
) -> Result<FullAgreementResult<St>, AgreementError>
where
    St: Study,
    F: FnOnce(&St) -> Result<Outcome, StatisticError>,
{
    tracing::trace!(measure, layer, feature, state = ?AgreementState::StudyBuilt, "Study built");

    let outcome = if study.raters().len() < 2 {
        Outcome::InsufficientData
    } else {
        match compute(&study) {
            Ok(outcome) => outcome,
            Err(source) => {
                let dump = study.to_string();
                tracing::error!(
                    measure,
                    layer,
                    feature,
                    error = %source,
                    diff_fingerprint = %diff.fingerprint(),
                    study_fingerprint = %dump_fingerprint(&dump),
                    study = %dump,
                    diff = %diff,
                    "Agreement computation failed"
                );
                return Err(AgreementError::Computation { measure, source });
            }
        }
    };

    let result = FullAgreementResult::new(measure, layer, feature, outcome, study, relevance);
    match outcome {
        Outcome::Computed(value) => tracing::info!(
            measure,
            layer,
            feature,
            raters = result.raters().len(),
            agreement = value,
            "Agreement computed"
        ),
        Outcome::InsufficientData => tracing::debug!(
            measure,
            layer,
            feature,
            raters = result.raters().len(),
            "Insufficient data for agreement"
        ),
    }
    Ok(result)
}

/// Run `job` for every unordered rater pair and return results in
/// rater-index order.
fn run_pairs<T, F>(threads: usize, raters: &[RaterId], job: F) -> Result<Vec<T>, AgreementError>
where
    T: Send,
    F: Fn(&RaterId, &RaterId) -> Result<T, AgreementError> + Sync,
{
    let pairs: Vec<(usize, usize)> = (0..raters.len())
        .flat_map(|i| (i + 1..raters.len()).map(move |j| (i, j)))
        .collect();

    if threads <= 1 || pairs.len() <= 1 {
        return pairs.iter().map(|&(i, j)| job(&raters[i], &raters[j])).collect();
    }

    let next = AtomicUsize::new(0);
    let sink: Mutex<Vec<(usize, Result<T, AgreementError>)>> = Mutex::new(Vec::with_capacity(pairs.len()));
    std::thread::scope(|scope| {
        for _ in 0..threads.min(pairs.len()) {
            scope.spawn(|| loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(&(i, j)) = pairs.get(index) else {
                    break;
                };
                let result = job(&raters[i], &raters[j]);
                sink.lock().push((index, result));
            });
        }
    });

    let mut results = sink.into_inner();
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}
