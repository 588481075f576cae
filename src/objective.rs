//! The [`Objective`] trait defines what gets optimized.
//!
//! Plain closures returning `Result<f64, E>` implement it through a blanket
//! impl:
//!
//! ```
//! use smbo::prelude::*;
//!
//! let opt = BayesOpt::builder()
//!     .space(SearchSpace::continuous(&[(-2.0, 2.0)])?)
//!     .n_init_samples(4)
//!     .n_iterations(3)
//!     .learning("fixed")
//!     .build()?;
//! opt.run(&|x: &[f64]| Ok::<_, Error>((x[0] - 1.0).powi(2)))?;
//! assert_eq!(opt.dataset().len(), 7);
//! # Ok::<(), smbo::Error>(())
//! ```
//!
//! Implement the trait on a struct to use the hooks:
//!
//! ```
//! use core::ops::ControlFlow;
//!
//! use smbo::prelude::*;
//!
//! struct Shifted {
//!     target: f64,
//! }
//!
//! impl Objective for Shifted {
//!     type Error = String;
//!
//!     fn evaluate(&self, x: &[f64]) -> core::result::Result<f64, String> {
//!         Ok((x[0] - 0.5).abs())
//!     }
//!
//!     fn after_evaluation(&self, _x: &[f64], y: f64) -> ControlFlow<()> {
//!         if y < self.target { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
//!     }
//! }
//!
//! let opt = BayesOpt::builder()
//!     .space(SearchSpace::unit(1)?)
//!     .n_init_samples(3)
//!     .n_iterations(30)
//!     .learning("fixed")
//!     .build()?;
//! opt.run(&Shifted { target: 10.0 })?;
//! assert_eq!(opt.dataset().len(), 4);
//! # Ok::<(), smbo::Error>(())
//! ```

use core::ops::ControlFlow;

/// A black-box function to minimize.
///
/// Inputs are in user coordinates: box coordinates for continuous spaces,
/// a member of the set for discrete spaces and category indices for
/// categorical spaces.
///
/// # Thread safety
///
/// [`BayesOpt::initialize_parallel`](crate::BayesOpt::initialize_parallel)
/// additionally requires `Send + Sync + 'static`.
pub trait Objective {
    /// The error type returned by [`evaluate`](Objective::evaluate).
    type Error: ToString;

    /// Evaluates the objective at `x`.
    ///
    /// # Errors
    ///
    /// Any error; the loop records it according to the configured
    /// [`FailurePolicy`](crate::config::FailurePolicy). Non-finite values
    /// are treated the same way.
    fn evaluate(&self, x: &[f64]) -> Result<f64, Self::Error>;

    /// Called after each successful adaptive evaluation.
    ///
    /// Return `ControlFlow::Break(())` to stop [`run`](crate::BayesOpt::run).
    fn after_evaluation(&self, _x: &[f64], _y: f64) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Number of times a failed evaluation is retried at the same point.
    fn max_retries(&self) -> usize {
        0
    }
}

impl<F, E> Objective for F
where
    F: Fn(&[f64]) -> Result<f64, E>,
    E: ToString,
{
    type Error = E;

    fn evaluate(&self, x: &[f64]) -> Result<f64, E> {
        self(x)
    }
}

/// Evaluates `objective` with retries; non-finite outputs count as failures.
pub(crate) fn evaluate_with_retries<O: Objective + ?Sized>(
    objective: &O,
    x: &[f64],
) -> Result<f64, String> {
    let mut attempt = 0;
    loop {
        let failure = match objective.evaluate(x) {
            Ok(y) if y.is_finite() => return Ok(y),
            Ok(y) => format!("objective returned non-finite value {y}"),
            Err(e) => e.to_string(),
        };
        if attempt >= objective.max_retries() {
            return Err(failure);
        }
        attempt += 1;
        trace_debug!(attempt, %failure, "retrying objective evaluation");
    }
}
