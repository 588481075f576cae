//! Bound-constrained minimization of criteria and evidence scores.
//!
//! [`BoxOptimizer`] is the default [`InnerOptimizer`]: a space-filling global
//! screen followed by a local refinement of the best screened point. The
//! local stage hands the objective to [`argmin`] in sine-warped coordinates
//! that keep every trial point inside the box: L-BFGS with a Moré–Thuente
//! line search when the objective exposes a gradient, and Nelder–Mead
//! otherwise.
//!
//! The optimizer stops at whichever comes first: the evaluation budget, the
//! soft [`time_budget`](InnerOptions::time_budget) (best point so far is
//! returned), or a hard [`Deadline`] (the call fails with
//! [`Error::Timeout`]).

use core::time::Duration;
use std::cell::RefCell;
use std::time::Instant;

use argmin::core::{CostFunction, Executor, Gradient};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::LBFGS;

use crate::error::{Error, Result};
use crate::rng_util;

/// Correction pairs kept by L-BFGS.
const LBFGS_MEMORY: usize = 7;
/// Standard deviation of the simplex values at which Nelder–Mead stops.
const SIMPLEX_TOLERANCE: f64 = 1e-10;

/// A function to minimize, optionally with its gradient.
pub trait InnerObjective {
    /// Objective value at `x`. Non-finite values are treated as `+∞`.
    fn value(&mut self, x: &[f64]) -> f64;

    /// Gradient at `x`, if available.
    fn gradient(&mut self, _x: &[f64]) -> Option<Vec<f64>> {
        None
    }
}

impl<F: FnMut(&[f64]) -> f64> InnerObjective for F {
    fn value(&mut self, x: &[f64]) -> f64 {
        self(x)
    }
}

/// Which stages of [`BoxOptimizer`] run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SearchMethod {
    /// Space-filling screen only.
    Global,
    /// Local refinement from the start point only.
    Local,
    /// Screen, then refine the best screened point.
    Combined,
}

/// Budget and stage settings for [`BoxOptimizer`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InnerOptions {
    /// Which stages run.
    pub method: SearchMethod,
    /// Maximum objective evaluations per call.
    pub max_evaluations: usize,
    /// Share of the budget spent on the global screen in combined mode.
    pub global_fraction: f64,
    /// Soft wall-clock budget per call; the best point so far is returned.
    pub time_budget: Option<Duration>,
}

impl Default for InnerOptions {
    fn default() -> Self {
        Self {
            method: SearchMethod::Combined,
            max_evaluations: 500,
            global_fraction: 0.8,
            time_budget: None,
        }
    }
}

/// A hard limit around one optimizer call.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    /// A deadline `limit` from now.
    #[must_use]
    pub fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        if Instant::now() >= self.at {
            Err(Error::Timeout { limit: self.limit })
        } else {
            Ok(())
        }
    }
}

/// Outcome of one minimization.
#[derive(Clone, Debug, PartialEq)]
pub struct InnerResult {
    /// Best point found.
    pub point: Vec<f64>,
    /// Objective value at [`point`](Self::point).
    pub value: f64,
    /// Objective evaluations spent.
    pub evaluations: usize,
    /// Whether the soft time budget cut the search short.
    pub stopped_on_time: bool,
}

/// A bound-constrained minimizer.
pub trait InnerOptimizer: Send {
    /// Minimizes `objective` over the box `bounds`, starting from `start`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFeasiblePoint`] for an empty box,
    /// [`Error::DimensionMismatch`] if `start` and `bounds` disagree, and
    /// [`Error::Timeout`] when `deadline` passes.
    fn minimize(
        &mut self,
        objective: &mut dyn InnerObjective,
        start: &[f64],
        bounds: &[(f64, f64)],
        rng: &mut fastrand::Rng,
        deadline: Option<Deadline>,
    ) -> Result<InnerResult>;
}

/// Global screen plus local refinement over a box.
#[derive(Clone, Debug, Default)]
pub struct BoxOptimizer {
    options: InnerOptions,
}

impl BoxOptimizer {
    /// Creates an optimizer with the given options.
    #[must_use]
    pub fn new(options: InnerOptions) -> Self {
        Self { options }
    }

    /// The active options.
    #[must_use]
    pub fn options(&self) -> &InnerOptions {
        &self.options
    }
}

/// Tracks evaluations, the incumbent and the stopping conditions.
struct Search<'a> {
    objective: &'a mut dyn InnerObjective,
    bounds: &'a [(f64, f64)],
    budget: usize,
    evaluations: usize,
    started: Instant,
    time_budget: Option<Duration>,
    deadline: Option<Deadline>,
    stopped_on_time: bool,
    best: Vec<f64>,
    best_value: f64,
}

impl Search<'_> {
    fn exhausted(&mut self) -> Result<bool> {
        if let Some(deadline) = &self.deadline {
            deadline.check()?;
        }
        if let Some(limit) = self.time_budget {
            if self.started.elapsed() >= limit {
                self.stopped_on_time = true;
                return Ok(true);
            }
        }
        Ok(self.evaluations >= self.budget)
    }

    fn clamp(&self, x: &mut [f64]) {
        for (v, &(lo, hi)) in x.iter_mut().zip(self.bounds) {
            *v = v.clamp(lo, hi);
        }
    }

    fn eval(&mut self, x: &[f64]) -> f64 {
        self.evaluations += 1;
        let v = self.objective.value(x);
        let v = if v.is_nan() { f64::INFINITY } else { v };
        if v < self.best_value {
            self.best_value = v;
            self.best = x.to_vec();
        }
        v
    }

    fn global(&mut self, n: usize, rng: &mut fastrand::Rng) -> Result<()> {
        let dim = self.bounds.len();
        #[cfg(feature = "sobol")]
        let sobol_seed = (dim <= crate::design::SOBOL_MAX_DIM).then(|| rng.u32(..));
        for i in 0..n {
            if self.exhausted()? {
                break;
            }
            #[cfg(feature = "sobol")]
            let unit: Vec<f64> = match sobol_seed {
                Some(seed) => (0..dim)
                    .map(|d| {
                        #[allow(clippy::cast_possible_truncation)]
                        let (index, dim) = (i as u32, d as u32);
                        f64::from(sobol_burley::sample(index, dim, seed))
                    })
                    .collect(),
                None => (0..dim).map(|_| rng.f64()).collect(),
            };
            #[cfg(not(feature = "sobol"))]
            let unit: Vec<f64> = {
                let _ = i;
                (0..dim).map(|_| rng.f64()).collect()
            };
            let x: Vec<f64> = unit
                .iter()
                .zip(self.bounds)
                .map(|(u, &(lo, hi))| lo + u * (hi - lo))
                .collect();
            self.eval(&x);
        }
        Ok(())
    }

    /// Local refinement from `from`: L-BFGS with a Moré–Thuente line search
    /// when the objective has a gradient, Nelder–Mead otherwise. Both run in
    /// warped coordinates (see [`Warped`]) so every trial point is feasible.
    ///
    /// Budget exhaustion and solver failures end the refinement quietly; the
    /// incumbent is kept. Only a passed [`Deadline`] is an error.
    fn refine(&mut self, from: &[f64]) -> Result<()> {
        let max_iters = u64::try_from(self.budget).unwrap_or(u64::MAX);
        let u0 = unwarp(self.bounds, from);
        let outcome = if self.objective.gradient(from).is_some() {
            let solver = LBFGS::new(MoreThuenteLineSearch::new(), LBFGS_MEMORY);
            Executor::new(Warped::new(self), solver)
                .configure(|state| state.param(u0).max_iters(max_iters))
                .run()
                .map(|_| ())
        } else {
            let solver = NelderMead::new(initial_simplex(u0))
                .with_sd_tolerance(SIMPLEX_TOLERANCE)
                .map_err(|e| Error::Numerical(e.to_string()))?;
            Executor::new(Warped::new(self), solver)
                .configure(|state| state.max_iters(max_iters))
                .run()
                .map(|_| ())
        };
        match outcome {
            Ok(()) => Ok(()),
            Err(e) => match e.downcast_ref::<Error>() {
                Some(Error::Timeout { limit }) => Err(Error::Timeout { limit: *limit }),
                _ => {
                    trace_debug!(reason = %e, "local refinement stopped");
                    Ok(())
                }
            },
        }
    }
}

/// `x = lo + (hi − lo)(1 + sin u)/2`.
fn warp(bounds: &[(f64, f64)], u: &[f64]) -> Vec<f64> {
    u.iter()
        .zip(bounds)
        .map(|(ui, &(lo, hi))| (lo + (hi - lo) * 0.5 * (1.0 + ui.sin())).clamp(lo, hi))
        .collect()
}

/// Inverse of [`warp`] on `[-π/2, π/2]`; degenerate axes map to zero.
fn unwarp(bounds: &[(f64, f64)], x: &[f64]) -> Vec<f64> {
    x.iter()
        .zip(bounds)
        .map(|(xi, &(lo, hi))| {
            if hi > lo {
                (2.0 * (xi - lo) / (hi - lo) - 1.0).clamp(-1.0, 1.0).asin()
            } else {
                0.0
            }
        })
        .collect()
}

/// `u0` plus one vertex per axis.
fn initial_simplex(u0: Vec<f64>) -> Vec<Vec<f64>> {
    const STEP: f64 = 0.3;
    let mut simplex = Vec::with_capacity(u0.len() + 1);
    for d in 0..u0.len() {
        let mut u = u0.clone();
        u[d] += if u[d] + STEP <= core::f64::consts::FRAC_PI_2 { STEP } else { -STEP };
        simplex.push(u);
    }
    simplex.insert(0, u0);
    simplex
}

/// Marks the end of the evaluation budget inside an argmin run.
#[derive(Debug, thiserror::Error)]
#[error("inner evaluation budget spent")]
struct BudgetSpent;

/// A [`Search`] seen through argmin in unconstrained coordinates `u`, mapped
/// onto the box by [`warp`]. Every call counts against the budget.
struct Warped<'s, 'a> {
    search: RefCell<&'s mut Search<'a>>,
}

impl<'s, 'a> Warped<'s, 'a> {
    fn new(search: &'s mut Search<'a>) -> Self {
        Self {
            search: RefCell::new(search),
        }
    }

    fn admit(search: &mut Search<'_>) -> core::result::Result<(), argmin::core::Error> {
        match search.exhausted() {
            Ok(false) => Ok(()),
            Ok(true) => Err(argmin::core::Error::new(BudgetSpent)),
            Err(e) => Err(argmin::core::Error::new(e)),
        }
    }
}

impl CostFunction for Warped<'_, '_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, u: &Self::Param) -> core::result::Result<f64, argmin::core::Error> {
        let mut guard = self.search.borrow_mut();
        let search: &mut Search<'_> = &mut guard;
        Self::admit(search)?;
        let x = warp(search.bounds, u);
        Ok(search.eval(&x))
    }
}

impl Gradient for Warped<'_, '_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    /// Chain rule through [`warp`]: `∂f/∂u = ∂f/∂x · (hi − lo) cos(u)/2`.
    fn gradient(&self, u: &Self::Param) -> core::result::Result<Vec<f64>, argmin::core::Error> {
        let mut guard = self.search.borrow_mut();
        let search: &mut Search<'_> = &mut guard;
        Self::admit(search)?;
        let x = warp(search.bounds, u);
        search.evaluations += 1;
        let g = search.objective.gradient(&x).ok_or_else(|| {
            argmin::core::Error::new(Error::Numerical("gradient became unavailable".into()))
        })?;
        Ok(g.into_iter()
            .zip(u.iter().zip(search.bounds))
            .map(|(gi, (ui, &(lo, hi)))| gi * 0.5 * (hi - lo) * ui.cos())
            .collect())
    }
}

impl InnerOptimizer for BoxOptimizer {
    fn minimize(
        &mut self,
        objective: &mut dyn InnerObjective,
        start: &[f64],
        bounds: &[(f64, f64)],
        rng: &mut fastrand::Rng,
        deadline: Option<Deadline>,
    ) -> Result<InnerResult> {
        if bounds.is_empty() {
            return Err(Error::NoFeasiblePoint);
        }
        if let Some(&(low, high)) = bounds.iter().find(|(lo, hi)| !(lo <= hi)) {
            return Err(Error::InvalidBounds { low, high });
        }
        if start.len() != bounds.len() {
            return Err(Error::DimensionMismatch {
                expected: bounds.len(),
                got: start.len(),
            });
        }

        let budget = self.options.max_evaluations.max(1);
        let mut search = Search {
            objective,
            bounds,
            budget,
            evaluations: 0,
            started: Instant::now(),
            time_budget: self.options.time_budget,
            deadline,
            stopped_on_time: false,
            best: start.to_vec(),
            best_value: f64::INFINITY,
        };
        let mut start = start.to_vec();
        search.clamp(&mut start);
        search.eval(&start);

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let n_global = match self.options.method {
            SearchMethod::Global => budget,
            SearchMethod::Local => 0,
            SearchMethod::Combined => {
                (budget as f64 * self.options.global_fraction.clamp(0.0, 1.0)) as usize
            }
        };
        search.global(n_global, rng)?;

        if self.options.method != SearchMethod::Global && !search.exhausted()? {
            let from = search.best.clone();
            search.refine(&from)?;
        }

        trace_debug!(
            evaluations = search.evaluations,
            value = search.best_value,
            "inner optimization finished"
        );
        Ok(InnerResult {
            point: search.best,
            value: search.best_value,
            evaluations: search.evaluations,
            stopped_on_time: search.stopped_on_time,
        })
    }
}

/// Uniform random point in `bounds`.
pub(crate) fn random_point(bounds: &[(f64, f64)], rng: &mut fastrand::Rng) -> Vec<f64> {
    bounds
        .iter()
        .map(|&(lo, hi)| rng_util::f64_range(rng, lo, hi))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(d: usize) -> Vec<(f64, f64)> {
        vec![(0.0, 1.0); d]
    }

    #[test]
    fn finds_interior_minimum_of_quadratic() {
        let mut opt = BoxOptimizer::default();
        let mut rng = fastrand::Rng::with_seed(3);
        let mut f = |x: &[f64]| (x[0] - 0.3).powi(2) + (x[1] - 0.7).powi(2);
        let res = opt
            .minimize(&mut f, &[0.5, 0.5], &unit_box(2), &mut rng, None)
            .unwrap();
        assert!((res.point[0] - 0.3).abs() < 1e-3, "{:?}", res.point);
        assert!((res.point[1] - 0.7).abs() < 1e-3, "{:?}", res.point);
        assert!(res.evaluations <= 500);
    }

    #[test]
    fn respects_bounds_when_minimum_is_outside() {
        let mut opt = BoxOptimizer::default();
        let mut rng = fastrand::Rng::with_seed(5);
        let mut f = |x: &[f64]| x[0];
        let res = opt
            .minimize(&mut f, &[0.5], &[(0.2, 0.9)], &mut rng, None)
            .unwrap();
        assert!(res.point[0] >= 0.2 && res.point[0] < 0.2 + 1e-6);
    }

    struct WithGradient;

    impl InnerObjective for WithGradient {
        fn value(&mut self, x: &[f64]) -> f64 {
            (x[0] - 0.25).powi(2)
        }

        fn gradient(&mut self, x: &[f64]) -> Option<Vec<f64>> {
            Some(vec![2.0 * (x[0] - 0.25)])
        }
    }

    #[test]
    fn local_mode_uses_gradient() {
        let mut opt = BoxOptimizer::new(InnerOptions {
            method: SearchMethod::Local,
            max_evaluations: 100,
            ..InnerOptions::default()
        });
        let mut rng = fastrand::Rng::with_seed(1);
        let res = opt
            .minimize(&mut WithGradient, &[0.9], &unit_box(1), &mut rng, None)
            .unwrap();
        assert!((res.point[0] - 0.25).abs() < 1e-4, "{:?}", res.point);
    }

    #[test]
    fn gradient_refinement_stops_at_the_bound() {
        let mut opt = BoxOptimizer::new(InnerOptions {
            method: SearchMethod::Local,
            max_evaluations: 200,
            ..InnerOptions::default()
        });
        let mut rng = fastrand::Rng::with_seed(2);
        let res = opt
            .minimize(&mut WithGradient, &[0.9], &[(0.5, 1.0)], &mut rng, None)
            .unwrap();
        assert!((res.point[0] - 0.5).abs() < 1e-6, "{:?}", res.point);
    }

    #[test]
    fn simplex_refinement_respects_budget_and_box() {
        let mut opt = BoxOptimizer::new(InnerOptions {
            method: SearchMethod::Local,
            max_evaluations: 40,
            ..InnerOptions::default()
        });
        let mut rng = fastrand::Rng::with_seed(4);
        let mut calls = 0;
        let mut seen_outside = false;
        let mut f = |x: &[f64]| {
            calls += 1;
            seen_outside |= x.iter().any(|v| !(0.0..=1.0).contains(v));
            (x[0] - 2.0).powi(2) + (x[1] - 0.4).powi(2)
        };
        let res = opt
            .minimize(&mut f, &[0.5, 0.5], &unit_box(2), &mut rng, None)
            .unwrap();
        assert!(res.evaluations <= 40);
        assert!(calls <= 40);
        assert!(!seen_outside);
        assert!(res.point[0] > 0.9, "{:?}", res.point);
    }

    #[test]
    fn deadline_during_refinement_fails_the_call() {
        let mut opt = BoxOptimizer::new(InnerOptions {
            method: SearchMethod::Local,
            max_evaluations: 1_000_000,
            ..InnerOptions::default()
        });
        let mut rng = fastrand::Rng::with_seed(1);
        let mut f = |x: &[f64]| {
            std::thread::sleep(Duration::from_millis(5));
            (x[0] - 0.3).powi(2) + x[1].sin()
        };
        let deadline = Deadline::after(Duration::from_millis(20));
        assert!(matches!(
            opt.minimize(&mut f, &[0.5, 0.5], &unit_box(2), &mut rng, Some(deadline)),
            Err(Error::Timeout { .. })
        ));
    }

    #[test]
    fn warp_round_trips_inside_the_box() {
        let bounds = [(-2.0, 3.0), (0.5, 0.5)];
        let x = [1.25, 0.5];
        let back = warp(&bounds, &unwarp(&bounds, &x));
        assert!((back[0] - 1.25).abs() < 1e-12);
        assert_eq!(back[1], 0.5);
        for u in [-10.0, -1.0, 0.0, 2.0, 7.0] {
            let p = warp(&bounds, &[u, u]);
            assert!((-2.0..=3.0).contains(&p[0]));
            assert_eq!(p[1], 0.5);
        }
    }

    #[test]
    fn empty_box_is_rejected() {
        let mut opt = BoxOptimizer::default();
        let mut rng = fastrand::Rng::with_seed(1);
        let mut f = |_: &[f64]| 0.0;
        assert!(matches!(
            opt.minimize(&mut f, &[], &[], &mut rng, None),
            Err(Error::NoFeasiblePoint)
        ));
    }

    #[test]
    fn expired_deadline_fails_the_call() {
        let mut opt = BoxOptimizer::default();
        let mut rng = fastrand::Rng::with_seed(1);
        let mut f = |x: &[f64]| x[0];
        let deadline = Deadline::after(Duration::ZERO);
        assert!(matches!(
            opt.minimize(&mut f, &[0.5], &unit_box(1), &mut rng, Some(deadline)),
            Err(Error::Timeout { .. })
        ));
    }
}
