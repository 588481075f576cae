//! Point estimates of the kernel hyperparameters.

use super::{score_at, start_point};
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::inner::{BoxOptimizer, InnerObjective, InnerOptimizer, InnerOptions};
use crate::surrogate::{Score, Surrogate};

/// Evidence as a function of `ln θ`.
struct Evidence<'a> {
    template: &'a Surrogate,
    data: &'a Dataset,
    score: Score,
    analytic: bool,
}

impl InnerObjective for Evidence<'_> {
    fn value(&mut self, log_theta: &[f64]) -> f64 {
        score_at(self.template, self.data, self.score, log_theta)
    }

    fn gradient(&mut self, log_theta: &[f64]) -> Option<Vec<f64>> {
        if !self.analytic {
            return None;
        }
        let theta: Vec<f64> = log_theta.iter().map(|v| v.exp()).collect();
        let mut m = self.template.clone();
        m.set_kernel_hyperparameters(&theta).ok()?;
        m.fit(self.data).ok()?;
        m.evidence_log_gradient(self.score).ok()
    }
}

/// Minimizes `score` over `ln θ ∈ bounds` and returns `θ`.
pub(super) fn optimize(
    template: &Surrogate,
    data: &Dataset,
    score: Score,
    bounds: (f64, f64),
    inner: &InnerOptions,
    rng: &mut fastrand::Rng,
) -> Result<Vec<f64>> {
    let start = start_point(template, bounds);
    let box_bounds = vec![bounds; start.len()];
    let mut objective = Evidence {
        template,
        data,
        score,
        analytic: template.has_evidence_gradient(score),
    };
    let mut optimizer = BoxOptimizer::new(InnerOptions {
        max_evaluations: inner.max_evaluations.max(10 * start.len()),
        ..inner.clone()
    });
    let result = optimizer.minimize(&mut objective, &start, &box_bounds, rng, None)?;
    if !result.value.is_finite() {
        return Err(Error::Convergence(format!(
            "no finite {score:?} score after {} evaluations",
            result.evaluations
        )));
    }
    Ok(result.point.iter().map(|v| v.exp()).collect())
}
