//! Primitive acquisition criteria.

use super::{Context, Setup};
use crate::error::{Error, Result};

/// Default `α = ln(2/δ)` with `δ = 10⁻⁶` for the mutual-information bound.
fn default_mi_alpha() -> f64 {
    (2.0 / 1e-6_f64).ln()
}

/// A primitive criterion together with its per-iteration state.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Atomic {
    /// `cEI`: negative generalized expected improvement.
    ExpectedImprovement {
        /// Improvement exponent `g ≥ 1`.
        exponent: u32,
    },
    /// `cBEI`: expected improvement over `incumbent − bias/σ²`, with `σ²` the
    /// fitted signal variance.
    BiasedExpectedImprovement {
        /// Improvement exponent.
        exponent: u32,
        /// Required margin below the incumbent.
        bias: f64,
    },
    /// `cEIa`: expected improvement whose exponent halves (rounding up) every ten iterations.
    AnnealedExpectedImprovement {
        /// Exponent at iteration zero.
        initial: u32,
        /// Exponent for the current iteration.
        current: u32,
    },
    /// `cPOI`: negative probability of landing below `incumbent + epsilon`.
    ProbabilityOfImprovement {
        /// Tolerance above the incumbent.
        epsilon: f64,
    },
    /// `cLCB`: `mean − β·std`.
    LowerConfidenceBound {
        /// Exploration coefficient.
        beta: f64,
    },
    /// `cLCBa`: LCB with the GP-UCB schedule of Srinivas et al.
    AnnealedLowerConfidenceBound {
        /// Weight of the dimension term.
        coefficient: f64,
        /// Coefficient for the current iteration.
        beta: f64,
    },
    /// `cExpReturn`: predictive mean.
    ExpectedReturn,
    /// `cAopt`: negative predictive standard deviation.
    AOptimality,
    /// `cMI`: mutual-information bound of Contal et al.
    MutualInformation {
        /// Confidence coefficient.
        alpha: f64,
        /// Accumulated variance of the chosen points.
        gamma: f64,
    },
    /// `cThompsonSampling`: one posterior draw per query point.
    ThompsonSampling {
        /// Seed of the current iteration's draws.
        seed: u64,
    },
    /// `cOptimisticSampling`: `min(mean, draw)`.
    OptimisticSampling {
        /// Seed of the current iteration's draws.
        seed: u64,
    },
    /// `cDistance`: weighted distance to the last evaluated point.
    Distance {
        /// Penalty per unit distance.
        weight: f64,
    },
}

impl Atomic {
    pub(super) const NAMES: [&'static str; 12] = [
        "cEI",
        "cBEI",
        "cEIa",
        "cPOI",
        "cLCB",
        "cLCBa",
        "cExpReturn",
        "cAopt",
        "cMI",
        "cThompsonSampling",
        "cOptimisticSampling",
        "cDistance",
    ];

    /// The criterion registered under `name`, with default parameters.
    pub(super) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "cEI" => Self::ExpectedImprovement { exponent: 1 },
            "cBEI" => Self::BiasedExpectedImprovement {
                exponent: 1,
                bias: 0.01,
            },
            "cEIa" => Self::AnnealedExpectedImprovement {
                initial: 10,
                current: 10,
            },
            "cPOI" => Self::ProbabilityOfImprovement { epsilon: 0.01 },
            "cLCB" => Self::LowerConfidenceBound { beta: 1.0 },
            "cLCBa" => Self::AnnealedLowerConfidenceBound {
                coefficient: 5.0,
                beta: 0.0,
            },
            "cExpReturn" => Self::ExpectedReturn,
            "cAopt" => Self::AOptimality,
            "cMI" => Self::MutualInformation {
                alpha: default_mi_alpha(),
                gamma: 0.0,
            },
            "cThompsonSampling" => Self::ThompsonSampling { seed: 0 },
            "cOptimisticSampling" => Self::OptimisticSampling { seed: 0 },
            "cDistance" => Self::Distance { weight: 1.0 },
            _ => return None,
        })
    }

    /// Registered name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExpectedImprovement { .. } => "cEI",
            Self::BiasedExpectedImprovement { .. } => "cBEI",
            Self::AnnealedExpectedImprovement { .. } => "cEIa",
            Self::ProbabilityOfImprovement { .. } => "cPOI",
            Self::LowerConfidenceBound { .. } => "cLCB",
            Self::AnnealedLowerConfidenceBound { .. } => "cLCBa",
            Self::ExpectedReturn => "cExpReturn",
            Self::AOptimality => "cAopt",
            Self::MutualInformation { .. } => "cMI",
            Self::ThompsonSampling { .. } => "cThompsonSampling",
            Self::OptimisticSampling { .. } => "cOptimisticSampling",
            Self::Distance { .. } => "cDistance",
        }
    }

    /// Tunable parameters in order.
    #[must_use]
    pub fn parameters(&self) -> Vec<f64> {
        match *self {
            Self::ExpectedImprovement { exponent } => vec![f64::from(exponent)],
            Self::BiasedExpectedImprovement { exponent, bias } => vec![f64::from(exponent), bias],
            Self::AnnealedExpectedImprovement { initial, .. } => vec![f64::from(initial)],
            Self::ProbabilityOfImprovement { epsilon } => vec![epsilon],
            Self::LowerConfidenceBound { beta } => vec![beta],
            Self::AnnealedLowerConfidenceBound { coefficient, .. } => vec![coefficient],
            Self::MutualInformation { alpha, .. } => vec![alpha],
            Self::Distance { weight } => vec![weight],
            Self::ExpectedReturn
            | Self::AOptimality
            | Self::ThompsonSampling { .. }
            | Self::OptimisticSampling { .. } => Vec::new(),
        }
    }

    pub(super) fn parameter_count(&self) -> usize {
        self.parameters().len()
    }

    pub(super) fn set_parameters(&mut self, values: &[f64]) -> Result<()> {
        let expected = self.parameter_count();
        if values.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                got: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::Configuration(format!(
                "{} parameters must be finite",
                self.name()
            )));
        }
        match self {
            Self::ExpectedImprovement { exponent } => *exponent = to_exponent(values[0])?,
            Self::BiasedExpectedImprovement { exponent, bias } => {
                *exponent = to_exponent(values[0])?;
                *bias = values[1];
            }
            Self::AnnealedExpectedImprovement { initial, current } => {
                *initial = to_exponent(values[0])?;
                *current = *initial;
            }
            Self::ProbabilityOfImprovement { epsilon } => *epsilon = values[0],
            Self::LowerConfidenceBound { beta } => *beta = values[0],
            Self::AnnealedLowerConfidenceBound { coefficient, .. } => *coefficient = values[0],
            Self::MutualInformation { alpha, .. } => *alpha = values[0],
            Self::Distance { weight } => *weight = values[0],
            Self::ExpectedReturn
            | Self::AOptimality
            | Self::ThompsonSampling { .. }
            | Self::OptimisticSampling { .. } => {}
        }
        Ok(())
    }

    /// Whether the score depends on the best value observed so far.
    #[must_use]
    pub fn requires_comparison(&self) -> bool {
        matches!(
            self,
            Self::ExpectedImprovement { .. }
                | Self::BiasedExpectedImprovement { .. }
                | Self::AnnealedExpectedImprovement { .. }
                | Self::ProbabilityOfImprovement { .. }
        )
    }

    pub(super) fn init(&mut self, setup: &Setup, rng: &mut fastrand::Rng) {
        match self {
            Self::AnnealedExpectedImprovement { initial, current } => {
                let mut e = (*initial).max(1);
                for _ in 0..setup.iteration / 10 {
                    if e == 1 {
                        break;
                    }
                    e = e.div_ceil(2);
                }
                *current = e;
            }
            Self::AnnealedLowerConfidenceBound { coefficient, beta } => {
                #[allow(clippy::cast_precision_loss)]
                let (t, d) = ((setup.iteration + 1) as f64, setup.dim.max(1) as f64);
                let b2 = 2.0 * (t * t).ln() * (d + 1.0) + d.ln() * d * *coefficient;
                *beta = b2.max(0.0).sqrt();
            }
            Self::ThompsonSampling { seed } | Self::OptimisticSampling { seed } => {
                *seed = rng.u64(..);
            }
            _ => {}
        }
    }

    pub(super) fn reset(&mut self) {
        match self {
            Self::MutualInformation { gamma, .. } => *gamma = 0.0,
            Self::AnnealedExpectedImprovement { initial, current } => *current = *initial,
            _ => {}
        }
    }

    pub(super) fn score(&self, ctx: &Context<'_>, x: &[f64]) -> Result<f64> {
        if let Self::Distance { weight } = self {
            let Some(last) = ctx.last else {
                return Ok(0.0);
            };
            let dist = x
                .iter()
                .zip(last)
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            return Ok(weight * dist);
        }
        let p = ctx.model.predict(x)?;
        Ok(match *self {
            Self::ExpectedImprovement { exponent } => {
                -p.expected_improvement(ctx.incumbent, exponent)
            }
            Self::BiasedExpectedImprovement { exponent, bias } => {
                let sigma2 = ctx.model.signal_variance()?;
                -p.expected_improvement(ctx.incumbent - bias / sigma2, exponent)
            }
            Self::AnnealedExpectedImprovement { current, .. } => {
                -p.expected_improvement(ctx.incumbent, current)
            }
            Self::ProbabilityOfImprovement { epsilon } => {
                -p.probability_of_improvement(ctx.incumbent, epsilon)
            }
            Self::LowerConfidenceBound { beta } | Self::AnnealedLowerConfidenceBound { beta, .. } => {
                p.lower_confidence_bound(beta)
            }
            Self::ExpectedReturn => p.mean(),
            Self::AOptimality => -p.std(),
            Self::MutualInformation { alpha, gamma } => {
                p.mean() - alpha.sqrt() * ((p.variance() + gamma).sqrt() - gamma.sqrt())
            }
            Self::ThompsonSampling { seed } => {
                p.sample(&mut fastrand::Rng::with_seed(point_seed(seed, x)))
            }
            Self::OptimisticSampling { seed } => {
                let draw = p.sample(&mut fastrand::Rng::with_seed(point_seed(seed, x)));
                p.mean().min(draw)
            }
            Self::Distance { .. } => 0.0,
        })
    }

    pub(super) fn update(&mut self, ctx: &Context<'_>, chosen: &[f64]) -> Result<()> {
        if let Self::MutualInformation { gamma, .. } = self {
            *gamma += ctx.model.predict(chosen)?.variance();
        }
        Ok(())
    }
}

fn to_exponent(v: f64) -> Result<u32> {
    if (1.0..=f64::from(u32::MAX)).contains(&v.round()) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(v.round() as u32)
    } else {
        Err(Error::Configuration(format!(
            "improvement exponent must be a positive integer, got {v}"
        )))
    }
}

/// Per-point seed so repeated queries of one point see the same draw.
fn point_seed(seed: u64, x: &[f64]) -> u64 {
    x.iter().fold(seed ^ 0xcbf2_9ce4_8422_2325, |h, v| {
        let h = (h ^ v.to_bits()).wrapping_mul(0x0000_0100_0000_01b3);
        h ^ (h >> 29)
    })
}
