//! Priors over kernel hyperparameters.
//!
//! Kernel hyperparameters are positive, so priors are expressed on their
//! natural logarithm. Learning and MCMC both work in that log space.

use crate::error::{Error, Result};
use crate::stats::HALF_LN_2PI;

/// Prior on the natural log of one hyperparameter.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Prior {
    /// Improper flat prior; contributes nothing to MAP scores.
    Flat,
    /// `ln θ ~ N(mean, std²)`.
    LogNormal {
        /// Mean of `ln θ`.
        mean: f64,
        /// Standard deviation of `ln θ`.
        std: f64,
    },
}

impl Prior {
    /// A log-normal prior centred on `theta` with log-space spread `std`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] unless `theta > 0` and `std > 0`.
    pub fn centred_on(theta: f64, std: f64) -> Result<Self> {
        if !(theta > 0.0 && theta.is_finite()) {
            return Err(Error::Configuration(format!(
                "hyperparameter prior mean must be positive, got {theta}"
            )));
        }
        if !(std > 0.0 && std.is_finite()) {
            return Err(Error::Configuration(format!(
                "hyperparameter prior std must be positive, got {std}"
            )));
        }
        Ok(Self::LogNormal {
            mean: theta.ln(),
            std,
        })
    }

    /// Log density at `log_theta`.
    #[must_use]
    pub fn ln_density(&self, log_theta: f64) -> f64 {
        match *self {
            Self::Flat => 0.0,
            Self::LogNormal { mean, std } => {
                let z = (log_theta - mean) / std;
                -0.5 * z * z - std.ln() - HALF_LN_2PI
            }
        }
    }

    /// Derivative of [`ln_density`](Self::ln_density) with respect to `log_theta`.
    #[must_use]
    pub fn ln_density_gradient(&self, log_theta: f64) -> f64 {
        match *self {
            Self::Flat => 0.0,
            Self::LogNormal { mean, std } => -(log_theta - mean) / (std * std),
        }
    }
}

/// Sum of log densities of `log_theta` under `priors`, paired by position.
pub(crate) fn ln_prior(priors: &[Prior], log_theta: &[f64]) -> f64 {
    priors
        .iter()
        .zip(log_theta)
        .map(|(p, &v)| p.ln_density(v))
        .sum()
}
