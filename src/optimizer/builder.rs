use crate::config::{Config, FailurePolicy};
use crate::error::{Error, Result};
use crate::inner::InnerOptimizer;
use crate::learning::McmcOptions;
use crate::space::SearchSpace;

use super::BayesOpt;

/// A builder for constructing [`BayesOpt`] instances with a fluent API.
///
/// Created via [`BayesOpt::builder()`]. Every setter overrides one field of
/// the underlying [`Config`]; names are resolved in [`build`](Self::build).
///
/// # Defaults
///
/// See [`Config::default`]: Matérn-5/2 ARD kernel, constant mean,
/// expected improvement, empirical Bayes MAP learning, 10 initial Latin
/// hypercube points and 190 iterations.
///
/// # Examples
///
/// ```
/// use smbo::prelude::*;
///
/// let opt = BayesOpt::builder()
///     .space(SearchSpace::continuous(&[(-5.0, 10.0), (0.0, 15.0)])?)
///     .kernel("kSum(kSEARD,kConst)")
///     .criterion("cHedge(cEI,cLCB,cPOI)")
///     .learning("mcmc")
///     .seed(42)
///     .build()?;
///
/// assert_eq!(opt.phase(), Phase::Uninitialized);
/// # Ok::<(), smbo::Error>(())
/// ```
pub struct BayesOptBuilder {
    space: Option<SearchSpace>,
    config: Config,
    inner: Option<Box<dyn InnerOptimizer>>,
}

impl BayesOptBuilder {
    pub(super) fn new() -> Self {
        Self {
            space: None,
            config: Config::default(),
            inner: None,
        }
    }

    /// Set the search space. Required.
    #[must_use]
    pub fn space(mut self, space: SearchSpace) -> Self {
        self.space = Some(space);
        self
    }

    /// Replace the whole configuration. Later setters still apply on top.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Seed of the run's random stream.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Adaptive iterations after the initial design.
    #[must_use]
    pub fn n_iterations(mut self, n: usize) -> Self {
        self.config.n_iterations = n;
        self
    }

    /// Initial design size.
    #[must_use]
    pub fn n_init_samples(mut self, n: usize) -> Self {
        self.config.n_init_samples = n;
        self
    }

    /// Inner optimizer evaluations per input dimension.
    #[must_use]
    pub fn n_inner_iterations(mut self, n: usize) -> Self {
        self.config.n_inner_iterations = n;
        self
    }

    /// Relearn hyperparameters every `n` iterations; 0 never relearns.
    #[must_use]
    pub fn n_iter_relearn(mut self, n: usize) -> Self {
        self.config.n_iter_relearn = n;
        self
    }

    /// Initial design method: `lhs`, `uniform` or `sobol`.
    #[must_use]
    pub fn init_method(mut self, name: impl Into<String>) -> Self {
        self.config.init_method = name.into();
        self
    }

    /// Kernel expression.
    #[must_use]
    pub fn kernel(mut self, expression: impl Into<String>) -> Self {
        self.config.kernel = expression.into();
        self
    }

    /// Initial kernel hyperparameters; a single value broadcasts.
    #[must_use]
    pub fn kernel_hyperparameters(mut self, theta: Vec<f64>) -> Self {
        self.config.kernel_hyperparameters = theta;
        self
    }

    /// Mean function expression.
    #[must_use]
    pub fn mean(mut self, expression: impl Into<String>) -> Self {
        self.config.mean = expression.into();
        self
    }

    /// Criterion expression.
    #[must_use]
    pub fn criterion(mut self, expression: impl Into<String>) -> Self {
        self.config.criterion = expression.into();
        self
    }

    /// Flat criterion parameter vector, in tree order.
    #[must_use]
    pub fn criterion_parameters(mut self, values: Vec<f64>) -> Self {
        self.config.criterion_parameters = values;
        self
    }

    /// Surrogate family name.
    #[must_use]
    pub fn surrogate(mut self, name: impl Into<String>) -> Self {
        self.config.surrogate = name.into();
        self
    }

    /// Hyperparameter learning mode: `fixed`, `empirical` or `mcmc`.
    #[must_use]
    pub fn learning(mut self, name: impl Into<String>) -> Self {
        self.config.learning = name.into();
        self
    }

    /// Empirical Bayes score: `ml`, `map` or `loocv`.
    #[must_use]
    pub fn score(mut self, name: impl Into<String>) -> Self {
        self.config.score = name.into();
        self
    }

    /// Slice sampler settings for `mcmc` learning.
    #[must_use]
    pub fn mcmc(mut self, options: McmcOptions) -> Self {
        self.config.mcmc = options;
        self
    }

    /// Observation noise variance.
    #[must_use]
    pub fn noise(mut self, noise: f64) -> Self {
        self.config.noise = noise;
        self
    }

    /// Probability of a uniformly random query each iteration.
    #[must_use]
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.config.epsilon = epsilon;
        self
    }

    /// Jump to a random point after `n` near-identical outputs; 0 disables.
    #[must_use]
    pub fn force_jump(mut self, n: usize) -> Self {
        self.config.force_jump = n;
        self
    }

    /// Stop after `patience` consecutive proposals moving less than `tolerance`.
    #[must_use]
    pub fn convergence(mut self, tolerance: f64, patience: usize) -> Self {
        self.config.convergence_tolerance = Some(tolerance);
        self.config.convergence_patience = patience;
        self
    }

    /// Handling of objective failures.
    #[must_use]
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Replace the default [`BoxOptimizer`](crate::inner::BoxOptimizer).
    #[must_use]
    pub fn inner_optimizer(mut self, inner: impl InnerOptimizer + 'static) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// Build the configured [`BayesOpt`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] without a search space, and any
    /// error of [`BayesOpt::new`].
    pub fn build(self) -> Result<BayesOpt> {
        let space = self
            .space
            .ok_or_else(|| Error::Configuration("a search space is required".into()))?;
        BayesOpt::with_inner(space, self.config, self.inner)
    }
}
