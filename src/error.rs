use core::time::Duration;

/// Errors surfaced by the optimization engine.
///
/// Configuration-class variants are fatal and surface immediately.
/// [`Numerical`](Error::Numerical) is only returned after the bounded jitter
/// retry has been exhausted. [`Convergence`](Error::Convergence) and
/// [`ObjectiveEvaluation`](Error::ObjectiveEvaluation) are recovered by the
/// loop and reported through [`Diagnostic`] instead of aborting a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration value is outside its valid range.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A kernel, mean, criterion, surrogate or learning name is not registered.
    #[error("unknown {kind} name '{name}'")]
    UnknownName {
        /// Which registry was queried.
        kind: &'static str,
        /// The name that failed to resolve.
        name: String,
    },

    /// A composition expression such as `kSum(kConst,kSEISO)` is malformed.
    #[error("cannot parse '{expression}' at byte {position}: {reason}")]
    Parse {
        /// The full expression text.
        expression: String,
        /// Byte offset where parsing stopped.
        position: usize,
        /// What was expected.
        reason: &'static str,
    },

    /// A vector does not have the length the receiver expects.
    #[error("dimension mismatch: expected {expected} values, got {got}")]
    DimensionMismatch {
        /// The expected length.
        expected: usize,
        /// The actual length.
        got: usize,
    },

    /// Returned when the lower bound is greater than the upper bound.
    #[error("invalid bounds: low ({low}) must be less than or equal to high ({high})")]
    InvalidBounds {
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// The input domain contains no point.
    #[error("the input domain is empty")]
    NoFeasiblePoint,

    /// A correlation matrix could not be factorized even after jitter.
    #[error("numerical failure: {0}")]
    Numerical(String),

    /// An optimizer found no usable point within its budget.
    #[error("failed to converge: {0}")]
    Convergence(String),

    /// The objective returned an error or a non-finite value.
    #[error("objective evaluation failed: {0}")]
    ObjectiveEvaluation(String),

    /// The inner optimizer exceeded a caller-supplied deadline.
    #[error("inner optimization exceeded its time limit of {limit:?}")]
    Timeout {
        /// The configured limit.
        limit: Duration,
    },

    /// The operation is not legal in the current loop phase.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Returned when a spawned async task fails (e.g. panics or is cancelled).
    #[cfg(feature = "async")]
    #[error("async task error: {0}")]
    TaskError(String),

    /// Reading or writing a checkpoint failed.
    #[cfg(feature = "serde")]
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A checkpoint could not be encoded or decoded.
    #[cfg(feature = "serde")]
    #[error("checkpoint format error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error is a configuration problem that must never be retried.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::UnknownName { .. }
                | Self::Parse { .. }
                | Self::DimensionMismatch { .. }
                | Self::InvalidBounds { .. }
                | Self::NoFeasiblePoint
        )
    }
}

/// A convenience type alias for `Result<T, Error>`.
pub type Result<T> = core::result::Result<T, Error>;

/// A recovered error or notable event, reported while the run continues.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Diagnostic {
    /// Diagonal jitter was needed to factorize a correlation matrix.
    JitterApplied {
        /// The jitter added to the diagonal.
        amount: f64,
        /// Number of factorization attempts, including the successful one.
        attempts: usize,
    },
    /// Hyperparameter learning failed; previous hyperparameters were kept.
    HyperparameterFallback {
        /// The underlying failure.
        reason: String,
    },
    /// The objective failed and a penalized value was recorded instead.
    ObjectivePenalized {
        /// Iteration at which the failure happened (`None` during the initial design).
        iteration: Option<usize>,
        /// The value stored in the dataset.
        penalty: f64,
        /// The underlying failure.
        reason: String,
    },
    /// The objective failed and the sample was dropped.
    ObjectiveSkipped {
        /// Iteration at which the failure happened (`None` during the initial design).
        iteration: Option<usize>,
        /// The underlying failure.
        reason: String,
    },
    /// The inner optimizer stopped on its soft time budget.
    InnerBudgetExhausted {
        /// Objective evaluations performed before stopping.
        evaluations: usize,
    },
    /// A random point replaced the criterion optimum after the loop got stuck.
    ForcedJump {
        /// Iteration of the jump.
        iteration: usize,
    },
    /// A random point was queried by the epsilon-greedy rule.
    RandomQuery {
        /// Iteration of the random query.
        iteration: usize,
    },
    /// The criterion was not finite anywhere the inner optimizer looked; a
    /// random point was used.
    CriterionFallback {
        /// Iteration of the fallback.
        iteration: usize,
    },
}
