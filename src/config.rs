//! Flat run configuration.
//!
//! Names (kernel, mean, criterion, surrogate, learning, score, initial
//! design) are plain strings here and are resolved when the optimizer is
//! built, so a configuration file can be edited without recompiling.

use core::time::Duration;

use crate::inner::SearchMethod;
use crate::learning::McmcOptions;

/// Value recorded when the objective fails.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Penalty {
    /// A fixed value.
    Constant(f64),
    /// The worst observed value plus `margin` times the observed range (at least 1).
    WorstObserved {
        /// Relative margin.
        margin: f64,
    },
}

/// What happens when the objective fails or returns a non-finite value.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FailurePolicy {
    /// Drop the point; the iteration still counts.
    Skip,
    /// Record a penalized value at the point.
    Penalize(Penalty),
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::Penalize(Penalty::WorstObserved { margin: 0.1 })
    }
}

/// Every tunable option of a run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Adaptive iterations after the initial design.
    pub n_iterations: usize,
    /// Initial design size.
    pub n_init_samples: usize,
    /// Inner optimizer evaluations per input dimension.
    pub n_inner_iterations: usize,
    /// Full hyperparameter learning every this many iterations; 0 learns only after the design.
    pub n_iter_relearn: usize,
    /// `lhs`, `uniform` or `sobol`.
    pub init_method: String,
    /// Surrogate family name, e.g. `sGaussianProcess`.
    pub surrogate: String,
    /// Observation noise variance.
    pub noise: f64,
    /// Signal variance of the fixed-variance families.
    pub sigma_s: f64,
    /// Inverse-gamma shape (`sStudentTProcessNIG`).
    pub alpha: f64,
    /// Inverse-gamma scale (`sStudentTProcessNIG`).
    pub beta: f64,
    /// Standardize outputs before conditioning.
    pub scale_outputs: bool,
    /// Kernel expression, e.g. `kSum(kSEISO,kConst)`.
    pub kernel: String,
    /// Initial kernel hyperparameters; one value broadcasts.
    pub kernel_hyperparameters: Vec<f64>,
    /// Std of the log-normal prior around each initial hyperparameter; one value broadcasts.
    pub kernel_prior_std: Vec<f64>,
    /// Mean expression, e.g. `mConst`.
    pub mean: String,
    /// Mean coefficients (standardized units when `scale_outputs` is set); one value broadcasts.
    pub mean_coefficients: Vec<f64>,
    /// Prior std of the mean coefficients; one value broadcasts.
    pub mean_coefficient_std: Vec<f64>,
    /// Criterion expression, e.g. `cHedge(cEI,cLCB,cPOI)`.
    pub criterion: String,
    /// Criterion parameters; empty keeps the defaults.
    pub criterion_parameters: Vec<f64>,
    /// Fixed hedge learning rate; `None` is adaptive.
    pub hedge_eta: Option<f64>,
    /// `fixed`, `empirical` or `mcmc`.
    pub learning: String,
    /// `ml`, `map` or `loocv`.
    pub score: String,
    /// Slice sampler settings.
    pub mcmc: McmcOptions,
    /// Search box of the log hyperparameters.
    pub log_hyperparameter_bounds: (f64, f64),
    /// Probability of a uniformly random query.
    pub epsilon: f64,
    /// Jump to a random point after this many near-identical outputs; 0 disables.
    pub force_jump: usize,
    /// Stop when successive proposals move less than this (max norm, model coordinates).
    pub convergence_tolerance: Option<f64>,
    /// Consecutive small moves required to stop.
    pub convergence_patience: usize,
    /// Handling of objective failures.
    pub failure_policy: FailurePolicy,
    /// Inner optimizer stages.
    pub inner_method: SearchMethod,
    /// Soft wall-clock budget per inner optimization.
    pub inner_time_budget: Option<Duration>,
    /// Seed of the run's random stream.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            n_iterations: 190,
            n_init_samples: 10,
            n_inner_iterations: 500,
            n_iter_relearn: 50,
            init_method: "lhs".into(),
            surrogate: "sGaussianProcess".into(),
            noise: 1e-6,
            sigma_s: 1.0,
            alpha: 1.0,
            beta: 1.0,
            scale_outputs: true,
            kernel: "kMaternARD5".into(),
            kernel_hyperparameters: vec![1.0],
            kernel_prior_std: vec![10.0],
            mean: "mConst".into(),
            mean_coefficients: vec![0.0],
            mean_coefficient_std: vec![1000.0],
            criterion: "cEI".into(),
            criterion_parameters: Vec::new(),
            hedge_eta: None,
            learning: "empirical".into(),
            score: "map".into(),
            mcmc: McmcOptions::default(),
            log_hyperparameter_bounds: (-6.0, 1.0),
            epsilon: 0.0,
            force_jump: 20,
            convergence_tolerance: None,
            convergence_patience: 3,
            failure_policy: FailurePolicy::default(),
            inner_method: SearchMethod::Combined,
            inner_time_budget: None,
            seed: 0,
        }
    }
}

/// Broadcasts a single value to `n` slots; other lengths pass through.
pub(crate) fn broadcast(values: &[f64], n: usize) -> Vec<f64> {
    if values.len() == 1 && n > 1 {
        vec![values[0]; n]
    } else {
        values.to_vec()
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"n_iterations": 5, "kernel": "kSEISO"}"#).unwrap();
        assert_eq!(cfg.n_iterations, 5);
        assert_eq!(cfg.kernel, "kSEISO");
        assert_eq!(cfg.n_init_samples, Config::default().n_init_samples);
    }
}
