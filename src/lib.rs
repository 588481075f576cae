#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Sequential model-based (Bayesian) optimization of expensive black-box
//! functions. A Gaussian or Student-t process surrogate is fitted to every
//! observation, and an acquisition criterion minimized over the search
//! space picks the next point to evaluate.
//!
//! # Getting Started
//!
//! ```
//! use smbo::prelude::*;
//!
//! let opt = BayesOpt::builder()
//!     .space(SearchSpace::continuous(&[(-2.0, 2.0), (-1.0, 3.0)])?)
//!     .kernel("kMaternARD5")
//!     .criterion("cEI")
//!     .n_init_samples(6)
//!     .n_iterations(10)
//!     .seed(7)
//!     .build()?;
//!
//! let (x, y) = opt.run(&|x: &[f64]| Ok::<_, Error>((x[0] - 0.5).powi(2) + (x[1] - 1.0).powi(2)))?;
//! println!("best {x:?} -> {y:.4}");
//! # Ok::<(), smbo::Error>(())
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`BayesOpt`] | Drive the loop: initial design, iterations, checkpoints. |
//! | [`SearchSpace`] | Continuous box, explicit point set or categorical grid. |
//! | [`Kernel`] / [`MeanFunction`] | Composable prior covariance and mean, built from expressions like `kSum(kSEARD,kConst)`. |
//! | [`Surrogate`](surrogate::Surrogate) | Gaussian or Student-t process posterior over the observations. |
//! | [`Criterion`](criteria::Criterion) | Acquisition function to minimize, including GP-Hedge portfolios. |
//! | [`HyperLearner`](learning::HyperLearner) | Fixed, empirical Bayes or MCMC kernel hyperparameters. |
//! | [`Objective`] | The function being minimized. |
//!
//! # Expressions
//!
//! Kernels, means and criteria are named by composition expressions:
//!
//! | Family | Atoms | Combinators |
//! |--------|-------|-------------|
//! | Kernel | `kConst`, `kLinear`, `kLinearARD`, `kSEISO`, `kSEARD`, `kMaternISO1/3/5`, `kMaternARD1/3/5`, `kPoly1`..`kPoly7`, `kRQISO`, `kHamming` | `kSum`, `kProd` |
//! | Mean | `mZero`, `mOne`, `mConst`, `mLinear`, `mLinCte` | `mSum` |
//! | Criterion | `cEI`, `cBEI`, `cEIa`, `cPOI`, `cLCB`, `cLCBa`, `cExpReturn`, `cAopt`, `cMI`, `cThompsonSampling`, `cOptimisticSampling`, `cDistance` | `cSum`, `cProd`, `cHedge`, `cHedgeRandom` |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `serde` | `Serialize`/`Deserialize` on public types, [`BayesOpt::save`]/[`BayesOpt::resume`] | on |
//! | `sobol` | Sobol initial designs and global screening | off |
//! | `async` | [`BayesOpt::initialize_parallel`] via tokio | off |
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at key optimization points | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

pub mod config;
pub mod criteria;
mod dataset;
pub mod design;
mod distribution;
mod error;
pub mod expr;
pub mod inner;
pub mod kernel;
pub mod learning;
pub mod mean;
pub mod objective;
mod optimizer;
mod prior;
mod rng_util;
mod space;
mod stats;
pub mod surrogate;

pub use config::{Config, FailurePolicy, Penalty};
pub use criteria::Criterion;
pub use dataset::{Dataset, Sample};
pub use distribution::Predictive;
pub use error::{Diagnostic, Error, Result};
pub use kernel::Kernel;
pub use mean::MeanFunction;
pub use objective::Objective;
#[cfg(feature = "serde")]
pub use optimizer::Checkpoint;
pub use optimizer::{BayesOpt, BayesOptBuilder, IterationReport, OptimizationState, Phase};
pub use prior::Prior;
pub use space::SearchSpace;

/// Convenient wildcard import for the most common types.
///
/// ```
/// use smbo::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{Config, FailurePolicy, Penalty};
    pub use crate::criteria::Criterion;
    pub use crate::dataset::{Dataset, Sample};
    pub use crate::design::DesignMethod;
    pub use crate::distribution::Predictive;
    pub use crate::error::{Diagnostic, Error, Result};
    pub use crate::inner::{BoxOptimizer, InnerOptimizer, InnerOptions, SearchMethod};
    pub use crate::kernel::Kernel;
    pub use crate::learning::{LearningMode, McmcOptions};
    pub use crate::mean::MeanFunction;
    pub use crate::objective::Objective;
    #[cfg(feature = "serde")]
    pub use crate::optimizer::Checkpoint;
    pub use crate::optimizer::{
        BayesOpt, BayesOptBuilder, IterationReport, OptimizationState, Phase,
    };
    pub use crate::space::SearchSpace;
    pub use crate::surrogate::{Score, Surrogate, SurrogateConfig, SurrogateKind};
}
