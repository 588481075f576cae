//! The sequential optimization loop.
//!
//! A [`BayesOpt`] moves through [`Phase::Uninitialized`] →
//! [`Phase::InitialDesign`] → [`Phase::Iterating`] → [`Phase::Converged`] or
//! [`Phase::BudgetExhausted`]. Each [`step`](BayesOpt::step):
//!
//! 1. initializes the criterion against the current ensemble,
//! 2. minimizes it (or a hedge's members) with the inner optimizer,
//! 3. evaluates the objective and appends the sample,
//! 4. refits the surrogate, relearning hyperparameters on schedule,
//! 5. rewards hedge members and advances the counters.
//!
//! A step works on a copy of the loop state and commits it only on
//! success, so a failed step (for example a [`step_with_timeout`](BayesOpt::step_with_timeout)
//! that ran out of time) leaves the run exactly as it was.
//!
//! The objective is called while the internal lock is held; it must not
//! call back into the same optimizer.

#[cfg(feature = "async")]
mod async_impl;
mod builder;
#[cfg(feature = "serde")]
mod persistence;
mod state;

use core::ops::ControlFlow;
use core::time::Duration;

use parking_lot::Mutex;

pub use builder::BayesOptBuilder;
#[cfg(feature = "serde")]
pub use persistence::Checkpoint;
pub use state::{OptimizationState, Phase};
use state::{LoopState, STATE_VERSION};

use crate::config::{Config, FailurePolicy, Penalty, broadcast};
use crate::criteria::{Context, Criterion, Setup};
use crate::dataset::Dataset;
use crate::design::{DesignMethod, initial_design};
use crate::distribution::Predictive;
use crate::error::{Diagnostic, Error, Result};
use crate::inner::{Deadline, InnerOptimizer, InnerOptions};
use crate::kernel::Kernel;
use crate::learning::{Ensemble, HyperLearner, LearningMode};
use crate::mean::MeanFunction;
use crate::objective::{Objective, evaluate_with_retries};
use crate::prior::Prior;
use crate::space::SearchSpace;
use crate::surrogate::{Score, Surrogate, SurrogateConfig, SurrogateKind};

/// Outcome of one adaptive iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct IterationReport {
    /// Zero-based index of the iteration.
    pub iteration: usize,
    /// Evaluated point in user coordinates.
    pub x: Vec<f64>,
    /// Recorded output; `None` when the failure policy skipped the point.
    pub y: Option<f64>,
    /// What produced the point: a criterion expression or `random`.
    pub source: String,
    /// Phase after the iteration.
    pub phase: Phase,
    /// Recovered errors and notable events of this iteration.
    pub diagnostics: Vec<Diagnostic>,
}

/// Mutable part of the optimizer, behind the lock.
struct Runtime {
    state: LoopState,
    inner: Box<dyn InnerOptimizer>,
    diagnostics: Vec<Diagnostic>,
}

/// A Bayesian optimizer over one [`SearchSpace`].
///
/// # Examples
///
/// ```
/// use smbo::prelude::*;
///
/// let opt = BayesOpt::builder()
///     .space(SearchSpace::continuous(&[(0.0, 1.0)])?)
///     .kernel("kSEISO")
///     .criterion("cEI")
///     .n_init_samples(5)
///     .n_iterations(10)
///     .seed(1)
///     .build()?;
/// let (x, y) = opt.run(&|x: &[f64]| Ok::<_, Error>((x[0] - 0.3).powi(2)))?;
/// assert!(y < 0.01, "best {x:?} -> {y}");
/// # Ok::<(), smbo::Error>(())
/// ```
pub struct BayesOpt {
    config: Config,
    space: SearchSpace,
    learner: HyperLearner,
    design: DesignMethod,
    prototype: Surrogate,
    criterion: Criterion,
    runtime: Mutex<Runtime>,
}

impl core::fmt::Debug for BayesOpt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BayesOpt")
            .field("space", &self.space)
            .field("kernel", &self.prototype.kernel().name())
            .field("criterion", &self.criterion.name())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl BayesOpt {
    /// Starts a [`BayesOptBuilder`].
    #[must_use]
    pub fn builder() -> BayesOptBuilder {
        BayesOptBuilder::new()
    }

    /// Builds an optimizer from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownName`] or [`Error::Parse`] for bad names and
    /// expressions, and [`Error::Configuration`] or
    /// [`Error::DimensionMismatch`] for inconsistent numeric settings.
    pub fn new(space: SearchSpace, config: Config) -> Result<Self> {
        Self::with_inner(space, config, None)
    }

    pub(crate) fn with_inner(
        space: SearchSpace,
        config: Config,
        inner: Option<Box<dyn InnerOptimizer>>,
    ) -> Result<Self> {
        space.validate()?;
        let dim = space.dim();
        if config.n_init_samples == 0 {
            return Err(Error::Configuration(
                "the initial design needs at least one point".into(),
            ));
        }
        if !(0.0..=1.0).contains(&config.epsilon) {
            return Err(Error::Configuration(format!(
                "epsilon must lie in [0, 1], got {}",
                config.epsilon
            )));
        }

        let mut kernel = Kernel::parse(&config.kernel, dim)?;
        kernel.set_hyperparameters_broadcast(&config.kernel_hyperparameters)?;
        let theta = kernel.hyperparameters();
        let stds = broadcast(&config.kernel_prior_std, theta.len());
        if stds.len() != theta.len() {
            return Err(Error::DimensionMismatch {
                expected: theta.len(),
                got: stds.len(),
            });
        }
        let priors = theta
            .iter()
            .zip(&stds)
            .map(|(&t, &s)| Prior::centred_on(t, s))
            .collect::<Result<Vec<_>>>()?;

        let mut mean = MeanFunction::parse(&config.mean, dim)?;
        if mean.hyperparameter_count() > 0 && !config.mean_coefficients.is_empty() {
            mean.set_hyperparameters_broadcast(&config.mean_coefficients)?;
        }

        let surrogate_config = SurrogateConfig {
            kind: SurrogateKind::from_name(&config.surrogate)?,
            noise: config.noise,
            signal_variance: config.sigma_s,
            alpha: config.alpha,
            beta: config.beta,
            mean_coefficient_std: config.mean_coefficient_std.clone(),
            scale_outputs: config.scale_outputs,
        };
        let prototype = Surrogate::new(surrogate_config, kernel, mean, Some(priors))?;

        let score = Score::from_name(&config.score)?;
        let mode = LearningMode::from_name(&config.learning, score, config.mcmc.clone())?;
        if mode == LearningMode::Empirical(Score::Loocv) && config.n_init_samples < 3 {
            return Err(Error::Configuration(
                "leave-one-out learning needs an initial design of at least three points".into(),
            ));
        }
        let inner_options = InnerOptions {
            method: config.inner_method,
            max_evaluations: config.n_inner_iterations.saturating_mul(dim).max(1),
            time_budget: config.inner_time_budget,
            ..InnerOptions::default()
        };
        let learner = HyperLearner::new(
            mode,
            config.log_hyperparameter_bounds,
            InnerOptions {
                max_evaluations: config.n_inner_iterations.max(1),
                ..inner_options.clone()
            },
        )?;

        let mut criterion = Criterion::parse(&config.criterion)?;
        if !config.criterion_parameters.is_empty() {
            criterion.set_parameters(&config.criterion_parameters)?;
        }
        if let Some(h) = criterion.hedge_mut() {
            h.set_eta(config.hedge_eta)?;
        }

        let design = DesignMethod::from_name(&config.init_method)?;
        design.check(&space)?;
        let inner = inner.unwrap_or_else(|| {
            Box::new(crate::inner::BoxOptimizer::new(inner_options)) as Box<dyn InnerOptimizer>
        });
        let state = LoopState::new(dim, prototype.clone(), criterion.clone(), config.seed);

        trace_info!(
            dim,
            kernel = %prototype.kernel().name(),
            criterion = %criterion.name(),
            "optimizer created"
        );
        Ok(Self {
            config,
            space,
            learner,
            design,
            prototype,
            criterion,
            runtime: Mutex::new(Runtime {
                state,
                inner,
                diagnostics: Vec::new(),
            }),
        })
    }

    // ------------------------------------------------------------------
    // Driving the loop
    // ------------------------------------------------------------------

    /// Evaluates the initial design and fits the first surrogate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the run is already initialized and
    /// [`Error::ObjectiveEvaluation`] if every design evaluation failed.
    pub fn initialize<O: Objective + ?Sized>(&self, objective: &O) -> Result<()> {
        let mut rt = self.runtime.lock();
        self.initialize_locked(&mut rt, objective)
    }

    fn initialize_locked<O: Objective + ?Sized>(
        &self,
        rt: &mut Runtime,
        objective: &O,
    ) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("initialize", n = self.config.n_init_samples).entered();

        let mut next = rt.state.clone();
        let points = self.begin_design(&mut next)?;
        let results = points
            .into_iter()
            .map(|x| {
                let outcome = self
                    .space
                    .to_user(&x)
                    .map_err(|e| e.to_string())
                    .and_then(|u| evaluate_with_retries(objective, &u));
                (x, outcome)
            })
            .collect();
        let mut diags = Vec::new();
        self.finish_design(&mut next, results, &mut diags)?;
        rt.state = next;
        Self::publish(&mut rt.diagnostics, diags);
        Ok(())
    }

    /// Moves to the design phase and returns the design in model coordinates.
    fn begin_design(&self, state: &mut LoopState) -> Result<Vec<Vec<f64>>> {
        if state.phase != Phase::Uninitialized {
            return Err(Error::InvalidState(format!(
                "cannot initialize a run in phase {:?}",
                state.phase
            )));
        }
        state.phase = Phase::InitialDesign;
        initial_design(
            &self.space,
            self.config.n_init_samples,
            self.design,
            &mut state.rng,
        )
    }

    /// Records design outcomes in design order and fits the first model.
    fn finish_design(
        &self,
        state: &mut LoopState,
        results: Vec<(Vec<f64>, core::result::Result<f64, String>)>,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<()> {
        for (x, outcome) in results {
            self.record(state, x, outcome, None, diags)?;
        }
        if state.data.is_empty() {
            return Err(Error::ObjectiveEvaluation(
                "every initial design evaluation failed".into(),
            ));
        }
        state.y_prev = state.data.last().map(|s| s.y);
        self.refresh_model(state, true, diags)?;
        state.phase = if self.config.n_iterations == 0 {
            Phase::BudgetExhausted
        } else {
            Phase::Iterating
        };
        trace_info!(samples = state.data.len(), "initial design evaluated");
        Ok(())
    }

    /// Runs one adaptive iteration, initializing first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] once the run has finished. Fatal
    /// numerical failures are propagated; the run state is left unchanged.
    pub fn step<O: Objective + ?Sized>(&self, objective: &O) -> Result<IterationReport> {
        self.step_inner(objective, None)
    }

    /// Like [`step`](Self::step), but fails with [`Error::Timeout`] if the
    /// inner optimization takes longer than `limit`. The objective is not
    /// evaluated and the run state is left unchanged in that case.
    ///
    /// # Errors
    ///
    /// See [`step`](Self::step).
    pub fn step_with_timeout<O: Objective + ?Sized>(
        &self,
        objective: &O,
        limit: Duration,
    ) -> Result<IterationReport> {
        self.step_inner(objective, Some(limit))
    }

    fn step_inner<O: Objective + ?Sized>(
        &self,
        objective: &O,
        limit: Option<Duration>,
    ) -> Result<IterationReport> {
        let mut rt = self.runtime.lock();
        if rt.state.phase == Phase::Uninitialized {
            self.initialize_locked(&mut rt, objective)?;
        }
        if rt.state.phase != Phase::Iterating {
            return Err(Error::InvalidState(format!(
                "cannot step a run in phase {:?}",
                rt.state.phase
            )));
        }
        let Runtime {
            state,
            inner,
            diagnostics,
        } = &mut *rt;

        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("step", iteration = state.iteration).entered();

        let mut next = state.clone();
        let mut diags = Vec::new();
        let iteration = next.iteration;
        let deadline = limit.map(Deadline::after);

        let (x_model, source) = if self.config.epsilon > 0.0 && next.rng.f64() < self.config.epsilon
        {
            diags.push(Diagnostic::RandomQuery { iteration });
            (self.space.random_point(&mut next.rng), "random".to_string())
        } else if self.config.force_jump > 0 && next.counter_stuck > self.config.force_jump {
            next.counter_stuck = 0;
            diags.push(Diagnostic::ForcedJump { iteration });
            (self.space.random_point(&mut next.rng), "random".to_string())
        } else {
            self.propose(&mut next, inner.as_mut(), deadline, &mut diags)?
        };

        let x_user = self.space.to_user(&x_model)?;
        let x_model = self.space.to_model(&x_user)?;
        let outcome = evaluate_with_retries(objective, &x_user);
        let y = self.record(&mut next, x_model.clone(), outcome, Some(iteration), &mut diags)?;

        if let Some(y) = y {
            match next.y_prev {
                Some(prev) if (y - prev).powi(2) < self.config.noise => next.counter_stuck += 1,
                _ => next.counter_stuck = 0,
            }
            next.y_prev = Some(y);
        }
        if let (Some(tol), Some(prev)) = (self.config.convergence_tolerance, &next.last_proposal) {
            let moved = prev
                .iter()
                .zip(&x_model)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            next.stable_count = if moved < tol { next.stable_count + 1 } else { 0 };
        }
        next.last_proposal = Some(x_model);
        next.iteration += 1;

        let relearn = self.config.n_iter_relearn > 0
            && next.iteration % self.config.n_iter_relearn == 0;
        self.refresh_model(&mut next, relearn, &mut diags)?;
        if let (Some(h), Some(model)) = (next.criterion.hedge_mut(), &next.ensemble) {
            h.reward(model, output_scale(&next.data), &mut next.rng)?;
        }

        next.phase = if next.iteration >= self.config.n_iterations {
            Phase::BudgetExhausted
        } else if self.config.convergence_tolerance.is_some()
            && next.stable_count >= self.config.convergence_patience.max(1)
        {
            Phase::Converged
        } else {
            Phase::Iterating
        };

        let report = IterationReport {
            iteration,
            x: x_user,
            y,
            source,
            phase: next.phase,
            diagnostics: diags.clone(),
        };
        trace_debug!(iteration, y = ?report.y, source = %report.source, "iteration finished");
        *state = next;
        Self::publish(diagnostics, diags);
        Ok(report)
    }

    /// Initializes if needed and steps until the run finishes or the
    /// objective asks to stop. Returns the best observation.
    ///
    /// # Errors
    ///
    /// Propagates the first error of [`initialize`](Self::initialize) or
    /// [`step`](Self::step).
    pub fn run<O: Objective + ?Sized>(&self, objective: &O) -> Result<(Vec<f64>, f64)> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("run", n_iterations = self.config.n_iterations).entered();

        if self.phase() == Phase::Uninitialized {
            self.initialize(objective)?;
        }
        while !self.phase().is_finished() {
            let report = self.step(objective)?;
            if let Some(y) = report.y {
                if let ControlFlow::Break(()) = objective.after_evaluation(&report.x, y) {
                    trace_info!(iteration = report.iteration, "stopped by the objective");
                    break;
                }
            }
        }
        self.best()
            .ok_or_else(|| Error::InvalidState("no observations recorded".into()))
    }

    // ------------------------------------------------------------------
    // Iteration internals
    // ------------------------------------------------------------------

    /// Minimizes the criterion (or every hedge member, then selects one).
    fn propose(
        &self,
        state: &mut LoopState,
        inner: &mut dyn InnerOptimizer,
        deadline: Option<Deadline>,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<(Vec<f64>, String)> {
        let LoopState {
            iteration,
            data,
            ensemble,
            criterion,
            rng,
            ..
        } = state;
        let model = ensemble
            .as_ref()
            .ok_or_else(|| Error::InvalidState("no fitted surrogate".into()))?;
        let best = data
            .best()
            .ok_or_else(|| Error::InvalidState("no observations recorded".into()))?;
        let ctx = Context {
            model,
            incumbent: best.y,
            last: data.last().map(|s| s.x.as_slice()),
        };
        let start = best.x.clone();
        criterion.init(
            &Setup {
                iteration: *iteration,
                dim: self.space.dim(),
            },
            rng,
        );

        let (x, source) = if let Some(hedge) = criterion.hedge_mut() {
            let mut proposals = Vec::with_capacity(hedge.members().len());
            for member in hedge.members() {
                proposals.push(self.minimize(
                    member, &ctx, &start, inner, rng, deadline, *iteration, diags,
                )?);
            }
            hedge.begin_portfolio();
            for p in proposals {
                hedge.record_candidate(p);
            }
            let (index, x) = hedge.select(rng)?;
            (x, hedge.members()[index].name())
        } else {
            let x = self.minimize(
                criterion, &ctx, &start, inner, rng, deadline, *iteration, diags,
            )?;
            (x, criterion.name())
        };
        criterion.update(&ctx, &x)?;
        Ok((x, source))
    }

    /// Best point of one (non-hedge) criterion, in model coordinates.
    #[allow(clippy::too_many_arguments)]
    fn minimize(
        &self,
        criterion: &Criterion,
        ctx: &Context<'_>,
        start: &[f64],
        inner: &mut dyn InnerOptimizer,
        rng: &mut fastrand::Rng,
        deadline: Option<Deadline>,
        iteration: usize,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<Vec<f64>> {
        let score = |x: &[f64]| {
            criterion
                .score(ctx, x)
                .ok()
                .filter(|v| v.is_finite())
                .unwrap_or(f64::INFINITY)
        };

        let (point, value) = if let Some(candidates) = self.space.candidates() {
            let mut best: Option<(Vec<f64>, f64)> = None;
            for (k, x) in candidates.enumerate() {
                if k % 64 == 0 {
                    if let Some(d) = &deadline {
                        d.check()?;
                    }
                }
                let v = score(&x);
                if best.as_ref().is_none_or(|(_, b)| v < *b) {
                    best = Some((x, v));
                }
            }
            best.ok_or(Error::NoFeasiblePoint)?
        } else {
            let mut objective = score;
            let result = inner.minimize(
                &mut objective,
                start,
                &self.space.model_bounds(),
                rng,
                deadline,
            )?;
            if result.stopped_on_time {
                diags.push(Diagnostic::InnerBudgetExhausted {
                    evaluations: result.evaluations,
                });
            }
            (result.point, result.value)
        };

        if value.is_finite() {
            Ok(point)
        } else {
            diags.push(Diagnostic::CriterionFallback { iteration });
            Ok(self.space.random_point(rng))
        }
    }

    /// Appends an outcome according to the failure policy.
    fn record(
        &self,
        state: &mut LoopState,
        x: Vec<f64>,
        outcome: core::result::Result<f64, String>,
        iteration: Option<usize>,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<Option<f64>> {
        let reason = match outcome {
            Ok(y) => {
                state.data.add_sample(x, y)?;
                return Ok(Some(y));
            }
            Err(reason) => reason,
        };
        let penalty = match self.config.failure_policy {
            FailurePolicy::Skip => None,
            FailurePolicy::Penalize(Penalty::Constant(v)) => Some(v),
            FailurePolicy::Penalize(Penalty::WorstObserved { margin }) => {
                match (state.data.worst(), state.data.best()) {
                    (Some(w), Some(b)) => Some(w.y + margin * (w.y - b.y).max(1.0)),
                    _ => None,
                }
            }
        };
        match penalty {
            Some(penalty) => {
                state.data.add_sample(x, penalty)?;
                diags.push(Diagnostic::ObjectivePenalized {
                    iteration,
                    penalty,
                    reason,
                });
                Ok(Some(penalty))
            }
            None => {
                diags.push(Diagnostic::ObjectiveSkipped { iteration, reason });
                Ok(None)
            }
        }
    }

    /// Refits the ensemble on the current data, relearning if asked.
    ///
    /// A learning failure falls back to the previous hyperparameters.
    fn refresh_model(
        &self,
        state: &mut LoopState,
        relearn: bool,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("refresh_model", relearn).entered();

        let learned = if relearn {
            match self.learner.learn(&state.template, &state.data, &mut state.rng) {
                Ok(e) => Some(e),
                Err(e @ (Error::Convergence(_) | Error::Numerical(_))) => {
                    diags.push(Diagnostic::HyperparameterFallback {
                        reason: e.to_string(),
                    });
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };
        let ensemble = match (learned, state.ensemble.take()) {
            (Some(e), _) => e,
            (None, Some(mut previous)) => {
                previous.refit(&state.data)?;
                previous
            }
            (None, None) => Ensemble::from_hyperparameters(
                &state.template,
                &[state.template.kernel_hyperparameters()],
                &state.data,
            )?,
        };
        if let Some((amount, attempts)) = ensemble.applied_jitter() {
            diags.push(Diagnostic::JitterApplied { amount, attempts });
        }
        if let Some(first) = ensemble.hyperparameters().first() {
            state.template.set_kernel_hyperparameters(first)?;
        }
        state.ensemble = Some(ensemble);
        Ok(())
    }

    fn publish(sink: &mut Vec<Diagnostic>, diags: Vec<Diagnostic>) {
        for d in &diags {
            trace_warn!(diagnostic = ?d, "recovered");
        }
        sink.extend(diags);
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Best observation so far, in user coordinates.
    #[must_use]
    pub fn best(&self) -> Option<(Vec<f64>, f64)> {
        let rt = self.runtime.lock();
        let best = rt.state.data.best()?;
        let x = self.space.to_user(&best.x).ok()?;
        Some((x, best.y))
    }

    /// Every observation in arrival order, in user coordinates.
    #[must_use]
    pub fn dataset(&self) -> Dataset {
        let rt = self.runtime.lock();
        let mut out = Dataset::new(self.space.dim());
        for s in rt.state.data.samples() {
            if let Ok(x) = self.space.to_user(&s.x) {
                let added = out.add_sample(x, s.y);
                debug_assert!(added.is_ok(), "user point has the space dimension");
            }
        }
        out
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.runtime.lock().state.phase
    }

    /// Completed adaptive iterations.
    #[must_use]
    pub fn iteration(&self) -> usize {
        self.runtime.lock().state.iteration
    }

    /// Every diagnostic reported so far.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.runtime.lock().diagnostics.clone()
    }

    /// Kernel hyperparameters of every ensemble member.
    #[must_use]
    pub fn hyperparameters(&self) -> Vec<Vec<f64>> {
        let rt = self.runtime.lock();
        rt.state.ensemble.as_ref().map_or_else(
            || vec![rt.state.template.kernel_hyperparameters()],
            Ensemble::hyperparameters,
        )
    }

    /// The criterion tree with its current state.
    #[must_use]
    pub fn criterion(&self) -> Criterion {
        self.runtime.lock().state.criterion.clone()
    }

    /// Posterior predictive at `x` (user coordinates).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] before initialization and
    /// [`Error::DimensionMismatch`] for a wrong-sized input.
    pub fn predict(&self, x: &[f64]) -> Result<Predictive> {
        let rt = self.runtime.lock();
        let model = rt
            .state
            .ensemble
            .as_ref()
            .ok_or_else(|| Error::InvalidState("no fitted surrogate".into()))?;
        model.predict(&self.space.to_model(x)?)
    }

    /// The configuration the optimizer was built from.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The search space.
    #[must_use]
    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    // ------------------------------------------------------------------
    // Checkpointing
    // ------------------------------------------------------------------

    /// Captures the run state.
    #[must_use]
    pub fn snapshot(&self) -> OptimizationState {
        self.runtime.lock().state.snapshot()
    }

    /// Replaces the run state with `snapshot`, refitting the ensemble.
    ///
    /// The optimizer must have been built with the same configuration and
    /// search space as the one that produced the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] for an unknown schema version or an
    /// inconsistent snapshot, [`Error::DimensionMismatch`] for samples of
    /// the wrong dimension and propagates refitting errors.
    pub fn restore(&self, snapshot: OptimizationState) -> Result<()> {
        if snapshot.version != STATE_VERSION {
            return Err(Error::InvalidState(format!(
                "unsupported checkpoint version {}",
                snapshot.version
            )));
        }
        if snapshot.criterion.name() != self.criterion.name() {
            return Err(Error::InvalidState(format!(
                "checkpoint criterion {} does not match {}",
                snapshot.criterion.name(),
                self.criterion.name()
            )));
        }
        let first = snapshot
            .hyperparameters
            .first()
            .ok_or_else(|| Error::InvalidState("checkpoint has no hyperparameters".into()))?;

        let mut state = LoopState::new(
            self.space.dim(),
            self.prototype.clone(),
            snapshot.criterion,
            snapshot.rng_state,
        );
        state.template.set_kernel_hyperparameters(first)?;
        state.data = Dataset::from_samples(self.space.dim(), snapshot.samples)?;
        state.phase = snapshot.phase;
        state.iteration = snapshot.iteration;
        state.counter_stuck = snapshot.counter_stuck;
        state.y_prev = snapshot.y_prev;
        state.stable_count = snapshot.stable_count;
        state.last_proposal = snapshot.last_proposal;
        match state.phase {
            Phase::Uninitialized => {}
            Phase::InitialDesign => {
                return Err(Error::InvalidState(
                    "cannot resume in the middle of the initial design".into(),
                ));
            }
            _ => {
                if state.data.is_empty() {
                    return Err(Error::InvalidState(
                        "checkpoint past the initial design has no samples".into(),
                    ));
                }
                state.ensemble = Some(Ensemble::from_hyperparameters(
                    &state.template,
                    &snapshot.hyperparameters,
                    &state.data,
                )?);
            }
        }
        trace_info!(
            iteration = state.iteration,
            samples = state.data.len(),
            "state restored"
        );
        self.runtime.lock().state = state;
        Ok(())
    }
}

/// Standard deviation of the observed outputs, or 1 with fewer than two.
#[allow(clippy::cast_precision_loss)]
fn output_scale(data: &Dataset) -> f64 {
    let n = data.len();
    if n < 2 {
        return 1.0;
    }
    let mean = data.outputs().sum::<f64>() / n as f64;
    let var = data.outputs().map(|y| (y - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    if var > 0.0 { var.sqrt() } else { 1.0 }
}
