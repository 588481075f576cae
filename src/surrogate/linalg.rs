//! Dense linear-algebra helpers on top of `nalgebra`.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// Factorization attempts before a matrix is declared not positive-definite.
const MAX_JITTER_ATTEMPTS: usize = 6;
/// First jitter, relative to the mean diagonal entry.
const INITIAL_RELATIVE_JITTER: f64 = 1e-10;
/// Growth of the jitter between attempts.
const JITTER_GROWTH: f64 = 100.0;

/// Jitter that was needed to factorize a matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Jitter {
    pub(crate) amount: f64,
    pub(crate) attempts: usize,
}

/// Lower Cholesky factor of `m`, adding diagonal jitter on failure.
///
/// Tries the matrix as given first, then adds `1e-10·mean(diag)` growing by a
/// factor of 100 per attempt.
pub(crate) fn cholesky_with_jitter(m: DMatrix<f64>) -> Result<(DMatrix<f64>, Option<Jitter>)> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(Error::Numerical(
            "correlation matrix has non-finite entries".into(),
        ));
    }
    if let Some(chol) = nalgebra::linalg::Cholesky::new(m.clone()) {
        return Ok((chol.l(), None));
    }
    let n = m.nrows();
    #[allow(clippy::cast_precision_loss)]
    let scale = (m.trace() / n.max(1) as f64).abs().max(f64::MIN_POSITIVE);
    let mut amount = INITIAL_RELATIVE_JITTER * scale;
    for attempt in 2..=MAX_JITTER_ATTEMPTS {
        let mut jittered = m.clone();
        for i in 0..n {
            jittered[(i, i)] += amount;
        }
        if let Some(chol) = nalgebra::linalg::Cholesky::new(jittered) {
            return Ok((
                chol.l(),
                Some(Jitter {
                    amount,
                    attempts: attempt,
                }),
            ));
        }
        amount *= JITTER_GROWTH;
    }
    Err(Error::Numerical(format!(
        "matrix of size {n} is not positive definite after {MAX_JITTER_ATTEMPTS} attempts"
    )))
}

/// Solves `L x = b` for lower-triangular `L`.
pub(crate) fn lower_solve(l: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    l.solve_lower_triangular(b)
        .ok_or_else(|| Error::Numerical("singular triangular factor".into()))
}

/// Solves `L X = B` for lower-triangular `L`.
pub(crate) fn lower_solve_matrix(l: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    l.solve_lower_triangular(b)
        .ok_or_else(|| Error::Numerical("singular triangular factor".into()))
}

/// Solves `(L Lᵀ) x = b`.
pub(crate) fn cholesky_solve(l: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    let z = lower_solve(l, b)?;
    l.tr_solve_lower_triangular(&z)
        .ok_or_else(|| Error::Numerical("singular triangular factor".into()))
}

/// `Σ ln Lᵢᵢ`, half the log-determinant of `L Lᵀ`.
pub(crate) fn half_log_det(l: &DMatrix<f64>) -> f64 {
    l.diagonal().iter().map(|d| d.ln()).sum()
}
