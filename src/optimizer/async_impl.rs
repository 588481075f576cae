use std::sync::Arc;

use crate::error::{Error, Result};
use crate::objective::{Objective, evaluate_with_retries};

use super::{BayesOpt, Phase};

impl BayesOpt {
    /// Evaluates the initial design with up to `concurrency` evaluations in
    /// flight, then fits the first surrogate.
    ///
    /// Each evaluation runs in [`spawn_blocking`](tokio::task::spawn_blocking).
    /// Results are recorded in design order regardless of completion order,
    /// so the run is identical to a sequential [`initialize`](Self::initialize).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for `concurrency == 0`,
    /// [`Error::InvalidState`] if the run was already initialized (also when
    /// another caller initialized it while the design was being evaluated)
    /// and [`Error::TaskError`] if a spawned task panics.
    ///
    /// # Examples
    ///
    /// ```
    /// use smbo::prelude::*;
    ///
    /// # #[cfg(feature = "async")]
    /// # async fn example() -> smbo::Result<()> {
    /// let opt = BayesOpt::builder()
    ///     .space(SearchSpace::unit(2)?)
    ///     .n_init_samples(8)
    ///     .learning("fixed")
    ///     .build()?;
    ///
    /// opt.initialize_parallel(|x: &[f64]| Ok::<_, Error>(x[0] + x[1]), 4)
    ///     .await?;
    ///
    /// assert_eq!(opt.dataset().len(), 8);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn initialize_parallel<O>(&self, objective: O, concurrency: usize) -> Result<()>
    where
        O: Objective + Send + Sync + 'static,
    {
        use tokio::sync::Semaphore;
        use tokio::task::JoinSet;

        if concurrency == 0 {
            return Err(Error::Configuration(
                "concurrency must be at least 1".into(),
            ));
        }

        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "initialize_parallel",
            n = self.config.n_init_samples,
            concurrency
        )
        .entered();

        // The lock is never held across an await.
        let (mut next, points) = {
            let rt = self.runtime.lock();
            let mut next = rt.state.clone();
            let points = self.begin_design(&mut next)?;
            (next, points)
        };
        let users = points
            .iter()
            .map(|x| self.space.to_user(x))
            .collect::<Result<Vec<_>>>()?;

        let objective = Arc::new(objective);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut join_set = JoinSet::new();
        for (index, x) in users.into_iter().enumerate() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| Error::TaskError(e.to_string()))?;
            let obj = Arc::clone(&objective);
            join_set.spawn(async move {
                let outcome =
                    tokio::task::spawn_blocking(move || evaluate_with_retries(obj.as_ref(), &x))
                        .await;
                drop(permit);
                (index, outcome)
            });
        }

        let mut outcomes = vec![None; points.len()];
        while let Some(joined) = join_set.join_next().await {
            let (index, outcome) = joined.map_err(|e| Error::TaskError(e.to_string()))?;
            let outcome = outcome.map_err(|e| Error::TaskError(e.to_string()))?;
            trace_debug!(index, ok = outcome.is_ok(), "design point evaluated");
            outcomes[index] = Some(outcome);
        }
        let results = points
            .into_iter()
            .zip(outcomes)
            .map(|(x, outcome)| {
                let outcome = outcome.ok_or_else(|| {
                    Error::TaskError("a design evaluation did not report back".into())
                })?;
                Ok((x, outcome))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut diags = Vec::new();
        self.finish_design(&mut next, results, &mut diags)?;

        let mut rt = self.runtime.lock();
        if rt.state.phase != Phase::Uninitialized {
            return Err(Error::InvalidState(
                "the run was initialized concurrently".into(),
            ));
        }
        rt.state = next;
        Self::publish(&mut rt.diagnostics, diags);
        Ok(())
    }
}
