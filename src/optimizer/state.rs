use crate::criteria::Criterion;
use crate::dataset::{Dataset, Sample};
use crate::learning::Ensemble;
use crate::surrogate::Surrogate;

/// Current checkpoint schema.
pub(crate) const STATE_VERSION: u32 = 1;

/// Lifecycle of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Nothing evaluated yet.
    Uninitialized,
    /// Evaluating the initial design.
    InitialDesign,
    /// Adaptive iterations in progress.
    Iterating,
    /// Stopped by the convergence rule.
    Converged,
    /// Every adaptive iteration has been used.
    BudgetExhausted,
}

impl Phase {
    /// Whether the run has stopped.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Converged | Self::BudgetExhausted)
    }
}

/// A serializable snapshot of a run's mutable state.
///
/// Together with the same [`Config`](crate::Config) and
/// [`SearchSpace`](crate::SearchSpace), restoring a snapshot reproduces the
/// remaining iterations exactly.
///
/// # Schema versioning
///
/// The `version` field enables future schema evolution. The current version is `1`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptimizationState {
    /// Schema version.
    pub version: u32,
    /// Lifecycle phase.
    pub phase: Phase,
    /// Completed adaptive iterations.
    pub iteration: usize,
    /// Observed samples in arrival order, in model coordinates.
    pub samples: Vec<Sample>,
    /// Kernel hyperparameters of every ensemble member.
    pub hyperparameters: Vec<Vec<f64>>,
    /// Criterion tree with its accumulated state.
    pub criterion: Criterion,
    /// Internal state of the random stream.
    pub rng_state: u64,
    /// Consecutive iterations with near-identical outputs.
    pub counter_stuck: usize,
    /// Output of the previous evaluation.
    pub y_prev: Option<f64>,
    /// Consecutive iterations with near-identical proposals.
    pub stable_count: usize,
    /// Previous proposal, in model coordinates.
    pub last_proposal: Option<Vec<f64>>,
}

/// The live counterpart of [`OptimizationState`].
#[derive(Clone, Debug)]
pub(super) struct LoopState {
    pub(super) phase: Phase,
    pub(super) iteration: usize,
    pub(super) data: Dataset,
    /// Unfitted surrogate carrying the current hyperparameters.
    pub(super) template: Surrogate,
    pub(super) ensemble: Option<Ensemble>,
    pub(super) criterion: Criterion,
    pub(super) rng: fastrand::Rng,
    pub(super) counter_stuck: usize,
    pub(super) y_prev: Option<f64>,
    pub(super) stable_count: usize,
    pub(super) last_proposal: Option<Vec<f64>>,
}

impl LoopState {
    pub(super) fn new(dim: usize, template: Surrogate, criterion: Criterion, seed: u64) -> Self {
        Self {
            phase: Phase::Uninitialized,
            iteration: 0,
            data: Dataset::new(dim),
            template,
            ensemble: None,
            criterion,
            rng: fastrand::Rng::with_seed(seed),
            counter_stuck: 0,
            y_prev: None,
            stable_count: 0,
            last_proposal: None,
        }
    }

    pub(super) fn snapshot(&self) -> OptimizationState {
        let hyperparameters = self.ensemble.as_ref().map_or_else(
            || vec![self.template.kernel_hyperparameters()],
            Ensemble::hyperparameters,
        );
        OptimizationState {
            version: STATE_VERSION,
            phase: self.phase,
            iteration: self.iteration,
            samples: self.data.samples().to_vec(),
            hyperparameters,
            criterion: self.criterion.clone(),
            rng_state: self.rng.get_seed(),
            counter_stuck: self.counter_stuck,
            y_prev: self.y_prev,
            stable_count: self.stable_count,
            last_proposal: self.last_proposal.clone(),
        }
    }
}
