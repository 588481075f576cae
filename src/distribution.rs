//! Posterior predictive distributions and the improvement statistics
//! computed from them.

use crate::rng_util;
use crate::stats::{
    HALF_LN_2PI, norm_cdf, norm_pdf, student_t_cdf, student_t_ln_pdf, student_t_pdf,
};

/// Standard deviations below this are treated as a point mass.
const MIN_STD: f64 = 1e-12;

/// Predictive distribution of the objective at one query point.
#[derive(Clone, Debug, PartialEq)]
pub enum Predictive {
    /// `N(mean, std²)`.
    Gaussian {
        /// Predictive mean.
        mean: f64,
        /// Predictive standard deviation.
        std: f64,
    },
    /// Location-scale Student-t.
    StudentT {
        /// Location.
        mean: f64,
        /// Scale (the standard deviation is `scale·√(ν/(ν−2))` for ν > 2).
        scale: f64,
        /// Degrees of freedom ν.
        dof: f64,
    },
    /// Weighted mixture, one component per ensemble member. Weights sum to one.
    Mixture(Vec<(f64, Predictive)>),
}

impl Predictive {
    /// Predictive mean.
    #[must_use]
    pub fn mean(&self) -> f64 {
        match self {
            Self::Gaussian { mean, .. } | Self::StudentT { mean, .. } => *mean,
            Self::Mixture(parts) => parts.iter().map(|(w, p)| w * p.mean()).sum(),
        }
    }

    /// Predictive variance.
    #[must_use]
    pub fn variance(&self) -> f64 {
        match self {
            Self::Gaussian { std, .. } => std * std,
            Self::StudentT { scale, dof, .. } => {
                if *dof > 2.0 {
                    scale * scale * dof / (dof - 2.0)
                } else {
                    scale * scale
                }
            }
            Self::Mixture(parts) => {
                let mean = self.mean();
                let second: f64 = parts
                    .iter()
                    .map(|(w, p)| w * (p.variance() + p.mean() * p.mean()))
                    .sum();
                (second - mean * mean).max(0.0)
            }
        }
    }

    /// Predictive standard deviation.
    #[must_use]
    pub fn std(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Expected improvement below `incumbent`, `E[max(0, incumbent − y)^exponent]`.
    ///
    /// Always non-negative. With zero spread it reduces to
    /// `max(0, incumbent − mean)^exponent`. The exponent is only honoured by
    /// Gaussian components.
    #[must_use]
    pub fn expected_improvement(&self, incumbent: f64, exponent: u32) -> f64 {
        match *self {
            Self::Gaussian { mean, std } => gaussian_ei(incumbent - mean, std, exponent.max(1)),
            Self::StudentT { mean, scale, dof } => {
                let diff = incumbent - mean;
                if scale < MIN_STD {
                    return diff.max(0.0);
                }
                if dof <= 1.0 {
                    return gaussian_ei(diff, scale, 1);
                }
                let z = diff / scale;
                let ei = diff * student_t_cdf(z, dof)
                    + scale * (dof + z * z) / (dof - 1.0) * student_t_pdf(z, dof);
                ei.max(0.0)
            }
            Self::Mixture(ref parts) => parts
                .iter()
                .map(|(w, p)| w * p.expected_improvement(incumbent, exponent))
                .sum(),
        }
    }

    /// Probability that `y < incumbent + epsilon`.
    ///
    /// `epsilon` is a tolerance: points predicted within `epsilon` of the
    /// incumbent still count as improving.
    #[must_use]
    pub fn probability_of_improvement(&self, incumbent: f64, epsilon: f64) -> f64 {
        let target = incumbent + epsilon;
        match *self {
            Self::Gaussian { mean, std } => {
                if std < MIN_STD {
                    return if mean < target { 1.0 } else { 0.0 };
                }
                norm_cdf((target - mean) / std)
            }
            Self::StudentT { mean, scale, dof } => {
                if scale < MIN_STD {
                    return if mean < target { 1.0 } else { 0.0 };
                }
                student_t_cdf((target - mean) / scale, dof)
            }
            Self::Mixture(ref parts) => parts
                .iter()
                .map(|(w, p)| w * p.probability_of_improvement(incumbent, epsilon))
                .sum(),
        }
    }

    /// `mean − beta·std`; mixtures average the component bounds.
    #[must_use]
    pub fn lower_confidence_bound(&self, beta: f64) -> f64 {
        match self {
            Self::Mixture(parts) => parts
                .iter()
                .map(|(w, p)| w * p.lower_confidence_bound(beta))
                .sum(),
            _ => self.mean() - beta * self.std(),
        }
    }

    /// Log density at `y`.
    #[must_use]
    pub fn ln_pdf(&self, y: f64) -> f64 {
        match *self {
            Self::Gaussian { mean, std } => {
                let std = std.max(MIN_STD);
                let z = (y - mean) / std;
                -0.5 * z * z - std.ln() - HALF_LN_2PI
            }
            Self::StudentT { mean, scale, dof } => {
                let scale = scale.max(MIN_STD);
                student_t_ln_pdf((y - mean) / scale, dof) - scale.ln()
            }
            Self::Mixture(ref parts) => {
                let logs: Vec<f64> = parts
                    .iter()
                    .map(|(w, p)| w.ln() + p.ln_pdf(y))
                    .collect();
                let max = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if max == f64::NEG_INFINITY {
                    return max;
                }
                max + logs.iter().map(|l| (l - max).exp()).sum::<f64>().ln()
            }
        }
    }

    /// Draws one value.
    pub fn sample(&self, rng: &mut fastrand::Rng) -> f64 {
        match self {
            Self::Gaussian { mean, std } => mean + std * rng_util::standard_normal(rng),
            Self::StudentT { mean, scale, dof } => mean + scale * rng_util::student_t(rng, *dof),
            Self::Mixture(parts) => {
                let weights: Vec<f64> = parts.iter().map(|(w, _)| *w).collect();
                let i = rng_util::weighted_index(rng, &weights);
                parts[i].1.sample(rng)
            }
        }
    }
}

/// Generalized expected improvement `E[max(0, I)^g]` for a Gaussian
/// (Schonlau, Welch and Jones), with `diff = incumbent − mean`.
fn gaussian_ei(diff: f64, std: f64, g: u32) -> f64 {
    if std < MIN_STD {
        return diff.max(0.0).powi(i32::try_from(g).unwrap_or(i32::MAX));
    }
    let z = diff / std;
    if g == 1 {
        return (diff * norm_cdf(z) + std * norm_pdf(z)).max(0.0);
    }
    let pdf = norm_pdf(z);
    // t[k] = ∫_{-∞}^{z} u^k φ(u) du
    let mut t = Vec::with_capacity(g as usize + 1);
    t.push(norm_cdf(z));
    t.push(-pdf);
    let mut z_pow = 1.0;
    for k in 2..=g as usize {
        z_pow *= z;
        #[allow(clippy::cast_precision_loss)]
        let next = -pdf * z_pow + (k - 1) as f64 * t[k - 2];
        t.push(next);
    }
    let mut sum = 0.0;
    let mut binom = 1.0;
    for k in 0..=g {
        let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
        sum += sign * binom * z.powi(i32::try_from(g - k).unwrap_or(0)) * t[k as usize];
        binom = binom * f64::from(g - k) / f64::from(k + 1);
    }
    (std.powi(i32::try_from(g).unwrap_or(i32::MAX)) * sum).max(0.0)
}
