//! Non-parametric regression surrogates.
//!
//! A [`Surrogate`] couples a [`Kernel`], a [`MeanFunction`] and per-hyperparameter
//! [`Prior`]s with one of five conditioning rules ([`SurrogateKind`]). Calling
//! [`fit`](Surrogate::fit) factorizes the noisy correlation matrix once; every
//! [`predict`](Surrogate::predict) afterwards costs two triangular solves.
//!
//! | Name | Mean coefficients | Signal variance | Predictive |
//! |------|-------------------|-----------------|------------|
//! | `sGaussianProcess` | fixed | fixed (`signal_variance`) | Gaussian |
//! | `sGaussianProcessML` | maximum likelihood | maximum likelihood | Gaussian |
//! | `sGaussianProcessNormal` | normal prior | fixed | Gaussian |
//! | `sStudentTProcessJef` | maximum likelihood | Jeffreys prior | Student-t, `n − p` dof |
//! | `sStudentTProcessNIG` | normal prior | inverse-gamma prior | Student-t, `n + 2α` dof |
//!
//! # Examples
//!
//! ```
//! use smbo::surrogate::{Surrogate, SurrogateConfig};
//! use smbo::{Dataset, Kernel, MeanFunction};
//!
//! let mut data = Dataset::new(1);
//! for x in [0.0, 0.25, 0.5, 0.75, 1.0] {
//!     data.add_sample(vec![x], (x - 0.3_f64).powi(2))?;
//! }
//! let kernel = Kernel::parse("kSEISO", 1)?;
//! let mean = MeanFunction::parse("mZero", 1)?;
//! let mut model = Surrogate::new(SurrogateConfig::default(), kernel, mean, None)?;
//! model.fit(&data)?;
//! let p = model.predict(&[0.5])?;
//! assert!((p.mean() - 0.04).abs() < 1e-2);
//! # Ok::<(), smbo::Error>(())
//! ```

mod linalg;
mod posterior;

use crate::dataset::Dataset;
use crate::distribution::Predictive;
use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::mean::MeanFunction;
use crate::prior::{Prior, ln_prior};

/// Conditioning rule of a surrogate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SurrogateKind {
    /// Gaussian process with fixed mean coefficients and signal variance.
    GaussianProcess,
    /// Gaussian process with maximum-likelihood mean and variance.
    GaussianProcessMl,
    /// Gaussian process with a normal prior on the mean coefficients.
    GaussianProcessNormal,
    /// Student-t process under a Jeffreys prior on the signal variance.
    StudentTJeffreys,
    /// Student-t process under a Normal-Inverse-Gamma prior.
    StudentTNig,
}

impl SurrogateKind {
    const ALL: [Self; 5] = [
        Self::GaussianProcess,
        Self::GaussianProcessMl,
        Self::GaussianProcessNormal,
        Self::StudentTJeffreys,
        Self::StudentTNig,
    ];

    /// Registered name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::GaussianProcess => "sGaussianProcess",
            Self::GaussianProcessMl => "sGaussianProcessML",
            Self::GaussianProcessNormal => "sGaussianProcessNormal",
            Self::StudentTJeffreys => "sStudentTProcessJef",
            Self::StudentTNig => "sStudentTProcessNIG",
        }
    }

    /// Resolves a registered name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownName`] for unregistered names.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == name.trim())
            .ok_or_else(|| Error::UnknownName {
                kind: "surrogate",
                name: name.to_string(),
            })
    }
}

/// Fit-quality score minimized by hyperparameter learning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Score {
    /// Negative log marginal likelihood.
    Ml,
    /// Negative log marginal likelihood minus the log prior of the hyperparameters.
    Map,
    /// Negative leave-one-out log predictive density.
    Loocv,
}

impl Score {
    /// Resolves `ml`, `map` or `loocv` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownName`] for anything else.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ml" | "mle" => Ok(Self::Ml),
            "map" => Ok(Self::Map),
            "loocv" => Ok(Self::Loocv),
            _ => Err(Error::UnknownName {
                kind: "score",
                name: name.to_string(),
            }),
        }
    }
}

/// Numeric settings of a surrogate, independent of its kernel and mean.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurrogateConfig {
    /// Conditioning rule.
    pub kind: SurrogateKind,
    /// Observation noise variance added to the correlation diagonal.
    pub noise: f64,
    /// Signal variance for the families where it is fixed.
    pub signal_variance: f64,
    /// Inverse-gamma shape for `sStudentTProcessNIG`.
    pub alpha: f64,
    /// Inverse-gamma scale for `sStudentTProcessNIG`.
    pub beta: f64,
    /// Prior standard deviation of each mean coefficient (one value broadcasts).
    pub mean_coefficient_std: Vec<f64>,
    /// Standardize outputs to zero mean and unit variance before conditioning.
    pub scale_outputs: bool,
}

impl Default for SurrogateConfig {
    fn default() -> Self {
        Self {
            kind: SurrogateKind::GaussianProcess,
            noise: 1e-6,
            signal_variance: 1.0,
            alpha: 1.0,
            beta: 1.0,
            mean_coefficient_std: vec![1000.0],
            scale_outputs: true,
        }
    }
}

impl SurrogateConfig {
    fn validate(&self) -> Result<()> {
        if !(self.noise >= 0.0 && self.noise.is_finite()) {
            return Err(Error::Configuration(format!(
                "noise variance must be non-negative, got {}",
                self.noise
            )));
        }
        for (name, v) in [
            ("signal variance", self.signal_variance),
            ("alpha", self.alpha),
            ("beta", self.beta),
        ] {
            if !(v > 0.0 && v.is_finite()) {
                return Err(Error::Configuration(format!(
                    "{name} must be positive, got {v}"
                )));
            }
        }
        if self.mean_coefficient_std.is_empty()
            || self
                .mean_coefficient_std
                .iter()
                .any(|s| !(*s > 0.0 && s.is_finite()))
        {
            return Err(Error::Configuration(
                "mean coefficient prior std must be a non-empty list of positive values".into(),
            ));
        }
        Ok(())
    }
}

/// A surrogate model, optionally conditioned on a dataset.
#[derive(Clone, Debug)]
pub struct Surrogate {
    config: SurrogateConfig,
    kernel: Kernel,
    mean: MeanFunction,
    priors: Vec<Prior>,
    fit: Option<posterior::Fit>,
}

impl Surrogate {
    /// Creates an unfitted surrogate.
    ///
    /// `priors` holds one entry per kernel hyperparameter; `None` means flat priors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for invalid numeric settings and
    /// [`Error::DimensionMismatch`] if `priors` has the wrong length.
    pub fn new(
        config: SurrogateConfig,
        kernel: Kernel,
        mean: MeanFunction,
        priors: Option<Vec<Prior>>,
    ) -> Result<Self> {
        config.validate()?;
        let n = kernel.hyperparameter_count();
        let priors = priors.unwrap_or_else(|| vec![Prior::Flat; n]);
        if priors.len() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                got: priors.len(),
            });
        }
        Ok(Self {
            config,
            kernel,
            mean,
            priors,
            fit: None,
        })
    }

    /// Conditions the model on `data`, replacing any previous fit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] for an empty dataset and
    /// [`Error::Numerical`] if the correlation matrix stays indefinite after
    /// the bounded jitter retry.
    pub fn fit(&mut self, data: &Dataset) -> Result<()> {
        self.fit = None;
        self.fit = Some(posterior::condition(
            &self.config,
            &self.kernel,
            &self.mean,
            data,
        )?);
        Ok(())
    }

    /// Whether [`fit`](Self::fit) has succeeded since the last change.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.fit.is_some()
    }

    fn fitted(&self) -> Result<&posterior::Fit> {
        self.fit
            .as_ref()
            .ok_or_else(|| Error::InvalidState("surrogate has not been fitted".into()))
    }

    /// Posterior predictive distribution at `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] before the first fit.
    pub fn predict(&self, x: &[f64]) -> Result<Predictive> {
        posterior::predict(self.fitted()?, &self.kernel, &self.mean, x)
    }

    /// Fit-quality score; lower is better.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] before the first fit or when LOOCV is
    /// requested with fewer than three samples.
    pub fn evidence(&self, score: Score) -> Result<f64> {
        let fit = self.fitted()?;
        match score {
            Score::Ml => Ok(fit.nll),
            Score::Map => Ok(fit.nll - self.log_prior()),
            Score::Loocv => self.leave_one_out(&fit.data),
        }
    }

    fn leave_one_out(&self, data: &Dataset) -> Result<f64> {
        if data.len() < 3 {
            return Err(Error::InvalidState(
                "leave-one-out scoring needs at least three samples".into(),
            ));
        }
        let mut total = 0.0;
        for (i, sample) in data.samples().iter().enumerate() {
            let rest = data.without(i);
            let fit = posterior::condition(&self.config, &self.kernel, &self.mean, &rest)?;
            let pred = posterior::predict(&fit, &self.kernel, &self.mean, &sample.x)?;
            total -= pred.ln_pdf(sample.y);
        }
        Ok(total)
    }

    /// Whether [`evidence_log_gradient`](Self::evidence_log_gradient) is available.
    #[must_use]
    pub fn has_evidence_gradient(&self, score: Score) -> bool {
        self.config.kind == SurrogateKind::GaussianProcess && score != Score::Loocv
    }

    /// Gradient of [`evidence`](Self::evidence) w.r.t. the log kernel hyperparameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the family or score has no analytic gradient.
    pub fn evidence_log_gradient(&self, score: Score) -> Result<Vec<f64>> {
        if !self.has_evidence_gradient(score) {
            return Err(Error::InvalidState(format!(
                "no analytic evidence gradient for {} with {score:?}",
                self.config.kind.name()
            )));
        }
        let mut grad = posterior::nll_log_gradient(self.fitted()?, &self.kernel)?;
        if score == Score::Map {
            for ((g, p), t) in grad
                .iter_mut()
                .zip(&self.priors)
                .zip(self.kernel.hyperparameters())
            {
                *g -= p.ln_density_gradient(t.ln());
            }
        }
        Ok(grad)
    }

    /// Log prior density of the current kernel hyperparameters.
    #[must_use]
    pub fn log_prior(&self) -> f64 {
        let log_theta: Vec<f64> = self
            .kernel
            .hyperparameters()
            .iter()
            .map(|t| t.ln())
            .collect();
        ln_prior(&self.priors, &log_theta)
    }

    /// Replaces the kernel hyperparameters and drops the current fit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] on a length mismatch.
    pub fn set_kernel_hyperparameters(&mut self, theta: &[f64]) -> Result<()> {
        self.kernel.set_hyperparameters(theta)?;
        self.fit = None;
        Ok(())
    }

    /// Current kernel hyperparameters.
    #[must_use]
    pub fn kernel_hyperparameters(&self) -> Vec<f64> {
        self.kernel.hyperparameters()
    }

    /// The kernel tree.
    #[must_use]
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// The mean-function tree.
    #[must_use]
    pub fn mean(&self) -> &MeanFunction {
        &self.mean
    }

    /// Numeric settings.
    #[must_use]
    pub fn config(&self) -> &SurrogateConfig {
        &self.config
    }

    /// Hyperparameter priors.
    #[must_use]
    pub fn priors(&self) -> &[Prior] {
        &self.priors
    }

    /// The dataset of the current fit.
    #[must_use]
    pub fn data(&self) -> Option<&Dataset> {
        self.fit.as_ref().map(|f| &f.data)
    }

    /// Signal variance of the fitted posterior, in output units.
    ///
    /// Fixed families report `signal_variance` rescaled by the output
    /// standardization; the others report their inferred value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] before the first fit.
    pub fn signal_variance(&self) -> Result<f64> {
        Ok(self.fitted()?.signal_variance())
    }

    /// Diagonal jitter and attempt count used by the last fit, if any.
    #[must_use]
    pub fn applied_jitter(&self) -> Option<(f64, usize)> {
        self.fit
            .as_ref()
            .and_then(|f| f.jitter)
            .map(|j| (j.amount, j.attempts))
    }
}
