//! Closed-form conditioning for each surrogate family.
//!
//! All families share the whitened representation: with `R = K + σₙ²I = LLᵀ`
//! and feature matrix `F`, quantities are expressed through `L⁻¹k`,
//! `L⁻¹F` and the whitened residual `u = L⁻¹(y − Fw)`, so that a prediction
//! costs two triangular solves.

use nalgebra::{DMatrix, DVector};

use super::linalg::{
    Jitter, cholesky_solve, cholesky_with_jitter, half_log_det, lower_solve, lower_solve_matrix,
};
use super::{SurrogateConfig, SurrogateKind};
use crate::dataset::Dataset;
use crate::distribution::Predictive;
use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::mean::MeanFunction;
use crate::stats::{HALF_LN_2PI, ln_gamma};

/// Cached conditioning of one surrogate on one dataset.
#[derive(Clone, Debug)]
pub(crate) struct Fit {
    pub(crate) data: Dataset,
    xs: Vec<Vec<f64>>,
    shift: f64,
    scale: f64,
    /// Lower Cholesky factor of the noisy correlation matrix.
    l: DMatrix<f64>,
    /// `L⁻¹(y − Fw)`.
    residual: DVector<f64>,
    /// Mean coefficients used for prediction.
    coef: DVector<f64>,
    trend: Option<Trend>,
    /// Multiplier turning correlation-scale variances into predictive variances.
    variance_scale: f64,
    dof: Option<f64>,
    pub(crate) nll: f64,
    pub(crate) jitter: Option<Jitter>,
}

impl Fit {
    /// Signal variance in output units: the fixed or inferred scale times
    /// the output standardization.
    pub(crate) fn signal_variance(&self) -> f64 {
        self.variance_scale * self.scale * self.scale
    }
}

/// Extra terms for families that infer the mean coefficients.
#[derive(Clone, Debug)]
struct Trend {
    /// `L⁻¹F`.
    kf: DMatrix<f64>,
    /// Cholesky factor of the coefficient precision (scaled by the signal variance).
    l: DMatrix<f64>,
}

/// Output shift and scale applied before conditioning.
#[allow(clippy::cast_precision_loss)]
fn output_scaling(data: &Dataset, enabled: bool) -> (f64, f64) {
    let n = data.len();
    if !enabled || n == 0 {
        return (0.0, 1.0);
    }
    let mean = data.outputs().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, 1.0);
    }
    let var = data.outputs().map(|y| (y - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std = var.sqrt();
    if std > 1e-12 { (mean, std) } else { (mean, 1.0) }
}

/// Conditions the surrogate described by `config`, `kernel` and `mean` on `data`.
#[allow(clippy::cast_precision_loss, clippy::too_many_lines)]
pub(crate) fn condition(
    config: &SurrogateConfig,
    kernel: &Kernel,
    mean: &MeanFunction,
    data: &Dataset,
) -> Result<Fit> {
    let n = data.len();
    if n == 0 {
        return Err(Error::InvalidState(
            "cannot fit a surrogate without samples".into(),
        ));
    }
    let xs: Vec<Vec<f64>> = data.samples().iter().map(|s| s.x.clone()).collect();
    let (shift, scale) = output_scaling(data, config.scale_outputs);
    let y = DVector::from_iterator(n, data.outputs().map(|v| (v - shift) / scale));

    let mut r = kernel.correlation_matrix(&xs);
    for i in 0..n {
        r[(i, i)] += config.noise;
    }
    let (l, jitter) = cholesky_with_jitter(r)?;
    let half_ln_det = half_log_det(&l);

    let f = mean.feature_matrix(&xs);
    let p = f.ncols();
    let w0 = DVector::from_vec(mean.coefficients());
    let nf = n as f64;

    let fit = match config.kind {
        SurrogateKind::GaussianProcess => {
            let s2 = config.signal_variance;
            let residual = lower_solve(&l, &(&y - &f * &w0))?;
            let nll = 0.5 * residual.norm_squared() / s2
                + half_ln_det
                + 0.5 * nf * s2.ln()
                + nf * HALF_LN_2PI;
            Fit {
                data: data.clone(),
                xs,
                shift,
                scale,
                l,
                residual,
                coef: w0,
                trend: None,
                variance_scale: s2,
                dof: None,
                nll,
                jitter,
            }
        }
        SurrogateKind::GaussianProcessMl | SurrogateKind::StudentTJeffreys => {
            let ly = lower_solve(&l, &y)?;
            let (residual, coef, trend) = if p == 0 {
                (ly, DVector::zeros(0), None)
            } else {
                let kf = lower_solve_matrix(&l, &f)?;
                let (l2, _) = cholesky_with_jitter(kf.tr_mul(&kf))?;
                let coef = cholesky_solve(&l2, &kf.tr_mul(&ly))?;
                let residual = &ly - &kf * &coef;
                (residual, coef, Some(Trend { kf, l: l2 }))
            };
            let dof = n.saturating_sub(p).max(1) as f64;
            let sigma2 = (residual.norm_squared() / dof).max(f64::MIN_POSITIVE);
            let nll = 0.5 * nf * sigma2.ln()
                + nf * HALF_LN_2PI
                + half_ln_det
                + 0.5 * residual.norm_squared() / sigma2;
            let dof = (config.kind == SurrogateKind::StudentTJeffreys).then_some(dof);
            Fit {
                data: data.clone(),
                xs,
                shift,
                scale,
                l,
                residual,
                coef,
                trend,
                variance_scale: sigma2,
                dof,
                nll,
                jitter,
            }
        }
        SurrogateKind::GaussianProcessNormal | SurrogateKind::StudentTNig => {
            let l0 = lower_solve(&l, &(&y - &f * &w0))?;
            let (residual, coef, trend, quad, extra_half_ln_det) = if p == 0 {
                let quad = l0.norm_squared();
                (l0, w0, None, quad, 0.0)
            } else {
                let prior_var = coefficient_prior_variance(config, p)?;
                let kf = lower_solve_matrix(&l, &f)?;
                let mut d = kf.tr_mul(&kf);
                for j in 0..p {
                    d[(j, j)] += 1.0 / prior_var[j];
                }
                let (ld, _) = cholesky_with_jitter(d)?;
                let b = kf.tr_mul(&l0);
                let c = lower_solve(&ld, &b)?;
                let quad = (l0.norm_squared() - c.norm_squared()).max(0.0);
                let delta = cholesky_solve(&ld, &b)?;
                let residual = &l0 - &kf * &delta;
                let extra = 0.5 * prior_var.iter().map(|v| v.ln()).sum::<f64>() + half_log_det(&ld);
                (residual, w0 + delta, Some(Trend { kf, l: ld }), quad, extra)
            };
            let (variance_scale, dof, nll) = if config.kind == SurrogateKind::GaussianProcessNormal
            {
                let s2 = config.signal_variance;
                let nll = 0.5 * quad / s2
                    + half_ln_det
                    + extra_half_ln_det
                    + 0.5 * nf * s2.ln()
                    + nf * HALF_LN_2PI;
                (s2, None, nll)
            } else {
                let (a, b) = (config.alpha, config.beta);
                let a_n = a + 0.5 * nf;
                let b_n = b + 0.5 * quad;
                let ln_evidence = ln_gamma(a_n) - ln_gamma(a) + a * b.ln() - a_n * b_n.ln();
                let nll = -ln_evidence + nf * HALF_LN_2PI + half_ln_det + extra_half_ln_det;
                (b_n / a_n, Some(2.0 * a_n), nll)
            };
            Fit {
                data: data.clone(),
                xs,
                shift,
                scale,
                l,
                residual,
                coef,
                trend,
                variance_scale,
                dof,
                nll,
                jitter,
            }
        }
    };
    if !fit.nll.is_finite() {
        return Err(Error::Numerical(format!(
            "log marginal likelihood is not finite ({})",
            fit.nll
        )));
    }
    Ok(fit)
}

fn coefficient_prior_variance(config: &SurrogateConfig, p: usize) -> Result<Vec<f64>> {
    let std = &config.mean_coefficient_std;
    let values = match std.len() {
        1 => vec![std[0]; p],
        len if len == p => std.clone(),
        len => {
            return Err(Error::DimensionMismatch {
                expected: p,
                got: len,
            });
        }
    };
    Ok(values.into_iter().map(|s| s * s).collect())
}

/// Posterior predictive distribution at `x`.
pub(crate) fn predict(
    fit: &Fit,
    kernel: &Kernel,
    mean: &MeanFunction,
    x: &[f64],
) -> Result<Predictive> {
    let k = kernel.cross_correlation(&fit.xs, x);
    let v = lower_solve(&fit.l, &k)?;
    let phi = DVector::from_vec(mean.features(x));

    let mu = phi.dot(&fit.coef) + v.dot(&fit.residual);
    let mut var = kernel.evaluate(x, x) - v.norm_squared();
    if let Some(trend) = &fit.trend {
        let rho = lower_solve(&trend.l, &(phi - trend.kf.tr_mul(&v)))?;
        var += rho.norm_squared();
    }
    let sd = (var.max(0.0) * fit.variance_scale).sqrt() * fit.scale;
    let mu = mu * fit.scale + fit.shift;
    Ok(match fit.dof {
        Some(dof) => Predictive::StudentT {
            mean: mu,
            scale: sd,
            dof,
        },
        None => Predictive::Gaussian { mean: mu, std: sd },
    })
}

/// Gradient of the negative log marginal likelihood w.r.t. `ln θ` for the
/// fixed-variance Gaussian process.
pub(crate) fn nll_log_gradient(fit: &Fit, kernel: &Kernel) -> Result<Vec<f64>> {
    let n = fit.xs.len();
    let alpha = fit
        .l
        .tr_solve_lower_triangular(&fit.residual)
        .ok_or_else(|| Error::Numerical("singular triangular factor".into()))?;
    let linv = lower_solve_matrix(&fit.l, &DMatrix::identity(n, n))?;
    let r_inv = linv.tr_mul(&linv);
    let theta = kernel.hyperparameters();
    let mut grad = Vec::with_capacity(theta.len());
    for (j, t) in theta.iter().enumerate() {
        let dk = kernel.gradient_matrix(&fit.xs, j);
        let trace = r_inv.component_mul(&dk).sum();
        let quad = alpha.dot(&(&dk * &alpha)) / fit.variance_scale;
        grad.push(0.5 * (trace - quad) * t);
    }
    Ok(grad)
}
