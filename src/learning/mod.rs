//! Kernel hyperparameter learning.
//!
//! A [`HyperLearner`] turns a surrogate template and a dataset into an
//! [`Ensemble`] of fitted surrogates:
//!
//! - [`LearningMode::Fixed`] fits the template as configured.
//! - [`LearningMode::Empirical`] minimizes [`Surrogate::evidence`] over the
//!   log-hyperparameter box with the [`BoxOptimizer`](crate::inner::BoxOptimizer).
//! - [`LearningMode::Mcmc`] slice-samples the log-hyperparameter posterior
//!   and keeps one fitted member per particle.
//!
//! Predictions from an ensemble with more than one member are an
//! equal-weight [`Predictive::Mixture`].

mod empirical;
mod slice;

use crate::dataset::Dataset;
use crate::distribution::Predictive;
use crate::error::{Error, Result};
use crate::inner::InnerOptions;
use crate::surrogate::{Score, Surrogate};

/// Settings of the slice sampler.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct McmcOptions {
    /// Sweeps discarded before the first particle is kept.
    pub burn_in: usize,
    /// Ensemble size.
    pub particles: usize,
    /// Initial slice width in log-hyperparameter units.
    pub width: f64,
}

impl Default for McmcOptions {
    fn default() -> Self {
        Self {
            burn_in: 100,
            particles: 10,
            width: 6.0,
        }
    }
}

/// How kernel hyperparameters are obtained.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LearningMode {
    /// Use the configured values.
    Fixed,
    /// Point estimate minimizing the given score.
    Empirical(Score),
    /// Posterior ensemble.
    Mcmc(McmcOptions),
}

impl LearningMode {
    /// Resolves `fixed`, `empirical` or `mcmc`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownName`] for anything else.
    pub fn from_name(name: &str, score: Score, mcmc: McmcOptions) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "empirical" | "empirical_bayes" => Ok(Self::Empirical(score)),
            "mcmc" => Ok(Self::Mcmc(mcmc)),
            _ => Err(Error::UnknownName {
                kind: "learning",
                name: name.to_string(),
            }),
        }
    }
}

/// A non-empty set of fitted surrogates sharing one dataset.
#[derive(Clone, Debug)]
pub struct Ensemble {
    members: Vec<Surrogate>,
}

impl Ensemble {
    /// Wraps already fitted members.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if `members` is empty or any member is unfitted.
    pub fn new(members: Vec<Surrogate>) -> Result<Self> {
        if members.is_empty() {
            return Err(Error::InvalidState("an ensemble needs a member".into()));
        }
        if members.iter().any(|m| !m.is_fitted()) {
            return Err(Error::InvalidState(
                "ensemble members must be fitted".into(),
            ));
        }
        Ok(Self { members })
    }

    /// Fits one clone of `template` per hyperparameter vector.
    ///
    /// # Errors
    ///
    /// Propagates fitting errors; `hyperparameters` must not be empty.
    pub fn from_hyperparameters(
        template: &Surrogate,
        hyperparameters: &[Vec<f64>],
        data: &Dataset,
    ) -> Result<Self> {
        let members = hyperparameters
            .iter()
            .map(|theta| {
                let mut m = template.clone();
                m.set_kernel_hyperparameters(theta)?;
                m.fit(data)?;
                Ok(m)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(members)
    }

    /// The fitted members.
    #[must_use]
    pub fn members(&self) -> &[Surrogate] {
        &self.members
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false`; ensembles are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Kernel hyperparameters of every member.
    #[must_use]
    pub fn hyperparameters(&self) -> Vec<Vec<f64>> {
        self.members
            .iter()
            .map(Surrogate::kernel_hyperparameters)
            .collect()
    }

    /// Largest diagonal jitter any member needed, with its attempt count.
    #[must_use]
    pub fn applied_jitter(&self) -> Option<(f64, usize)> {
        self.members
            .iter()
            .filter_map(Surrogate::applied_jitter)
            .max_by(|a, b| a.0.total_cmp(&b.0))
    }

    /// Average signal variance of the members, in output units.
    ///
    /// # Errors
    ///
    /// Propagates member errors.
    #[allow(clippy::cast_precision_loss)]
    pub fn signal_variance(&self) -> Result<f64> {
        let total = self
            .members
            .iter()
            .map(Surrogate::signal_variance)
            .sum::<Result<f64>>()?;
        Ok(total / self.members.len() as f64)
    }

    /// Pooled predictive distribution at `x`.
    ///
    /// # Errors
    ///
    /// Propagates member prediction errors.
    #[allow(clippy::cast_precision_loss)]
    pub fn predict(&self, x: &[f64]) -> Result<Predictive> {
        if let [only] = self.members.as_slice() {
            return only.predict(x);
        }
        let w = 1.0 / self.members.len() as f64;
        let parts = self
            .members
            .iter()
            .map(|m| Ok((w, m.predict(x)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Predictive::Mixture(parts))
    }

    /// Refits every member on `data`, keeping its hyperparameters.
    ///
    /// # Errors
    ///
    /// Propagates fitting errors.
    pub fn refit(&mut self, data: &Dataset) -> Result<()> {
        for m in &mut self.members {
            m.fit(data)?;
        }
        Ok(())
    }
}

/// Produces fitted ensembles according to a [`LearningMode`].
#[derive(Clone, Debug)]
pub struct HyperLearner {
    mode: LearningMode,
    log_bounds: (f64, f64),
    inner: InnerOptions,
}

impl HyperLearner {
    /// Creates a learner searching `ln θ` within `log_bounds`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] for an empty range and
    /// [`Error::Configuration`] for an MCMC setup without particles.
    pub fn new(mode: LearningMode, log_bounds: (f64, f64), inner: InnerOptions) -> Result<Self> {
        let (low, high) = log_bounds;
        if !(low < high) {
            return Err(Error::InvalidBounds { low, high });
        }
        if let LearningMode::Mcmc(opts) = &mode {
            if opts.particles == 0 || !(opts.width > 0.0) {
                return Err(Error::Configuration(
                    "MCMC needs at least one particle and a positive slice width".into(),
                ));
            }
        }
        Ok(Self {
            mode,
            log_bounds,
            inner,
        })
    }

    /// The active mode.
    #[must_use]
    pub fn mode(&self) -> &LearningMode {
        &self.mode
    }

    /// Learns hyperparameters for `template` on `data`.
    ///
    /// The template's current hyperparameters are the starting point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Convergence`] if no hyperparameter setting yields a
    /// finite score; the caller keeps its previous ensemble in that case.
    /// Fitting errors of the final members are propagated.
    pub fn learn(
        &self,
        template: &Surrogate,
        data: &Dataset,
        rng: &mut fastrand::Rng,
    ) -> Result<Ensemble> {
        match &self.mode {
            LearningMode::Fixed => {
                let mut m = template.clone();
                m.fit(data)?;
                Ensemble::new(vec![m])
            }
            LearningMode::Empirical(score) => {
                let theta = empirical::optimize(
                    template,
                    data,
                    *score,
                    self.log_bounds,
                    &self.inner,
                    rng,
                )?;
                trace_debug!(?theta, "empirical Bayes estimate");
                Ensemble::from_hyperparameters(template, &[theta], data)
            }
            LearningMode::Mcmc(opts) => {
                let particles = slice::sample(template, data, opts, self.log_bounds, rng)?;
                trace_debug!(particles = particles.len(), "slice sampling finished");
                Ensemble::from_hyperparameters(template, &particles, data)
            }
        }
    }
}

/// `ln θ` of `template`, clamped into `bounds`.
fn start_point(template: &Surrogate, (low, high): (f64, f64)) -> Vec<f64> {
    template
        .kernel_hyperparameters()
        .iter()
        .map(|t| t.ln().clamp(low, high))
        .collect()
}

/// Score of `template` refit with `exp(log_theta)`; `+∞` when fitting fails.
fn score_at(template: &Surrogate, data: &Dataset, score: Score, log_theta: &[f64]) -> f64 {
    let theta: Vec<f64> = log_theta.iter().map(|v| v.exp()).collect();
    let mut m = template.clone();
    let value = m
        .set_kernel_hyperparameters(&theta)
        .and_then(|()| m.fit(data))
        .and_then(|()| m.evidence(score));
    match value {
        Ok(v) if v.is_finite() => v,
        _ => f64::INFINITY,
    }
}
