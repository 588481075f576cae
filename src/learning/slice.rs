//! Coordinate-wise slice sampling of the log-hyperparameter posterior
//! (Neal, 2003), with step-out and shrinkage bounded by the search box.

use super::{McmcOptions, score_at, start_point};
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::surrogate::{Score, Surrogate};

const MAX_STEP_OUT: usize = 10;
const MAX_SHRINK: usize = 100;

/// Draws `opts.particles` hyperparameter vectors `θ` after `opts.burn_in` sweeps.
pub(super) fn sample(
    template: &Surrogate,
    data: &Dataset,
    opts: &McmcOptions,
    (low, high): (f64, f64),
    rng: &mut fastrand::Rng,
) -> Result<Vec<Vec<f64>>> {
    let log_post = |x: &[f64]| -score_at(template, data, Score::Map, x);

    let mut x = start_point(template, (low, high));
    let mut fx = log_post(&x);
    if !fx.is_finite() {
        return Err(Error::Convergence(
            "posterior is not finite at the starting hyperparameters".into(),
        ));
    }

    let mut particles = Vec::with_capacity(opts.particles);
    for sweep in 0..opts.burn_in + opts.particles {
        for i in 0..x.len() {
            let level = fx + (1.0 - rng.f64()).ln();

            let mut left = (x[i] - opts.width * rng.f64()).max(low);
            let mut right = (left + opts.width).min(high);
            let mut probe = x.clone();
            for _ in 0..MAX_STEP_OUT {
                probe[i] = left;
                if left <= low || log_post(&probe) <= level {
                    break;
                }
                left = (left - opts.width).max(low);
            }
            for _ in 0..MAX_STEP_OUT {
                probe[i] = right;
                if right >= high || log_post(&probe) <= level {
                    break;
                }
                right = (right + opts.width).min(high);
            }

            for _ in 0..MAX_SHRINK {
                probe[i] = left + rng.f64() * (right - left);
                let fp = log_post(&probe);
                if fp > level {
                    x[i] = probe[i];
                    fx = fp;
                    break;
                }
                if probe[i] < x[i] {
                    left = probe[i];
                } else {
                    right = probe[i];
                }
            }
        }
        if sweep >= opts.burn_in {
            particles.push(x.iter().map(|v| v.exp()).collect());
        }
    }
    Ok(particles)
}
