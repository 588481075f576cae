//! Parametric mean (trend) functions.
//!
//! A mean function is a linear model `m(x) = φ(x)·w` over a basis `φ`.
//! Surrogates either use the configured coefficients `w` as-is
//! (`sGaussianProcess`) or treat them as a prior guess and infer them from
//! data (the other families).
//!
//! | Name | Basis `φ(x)` | Free coefficients |
//! |------|--------------|-------------------|
//! | `mZero` | none | none |
//! | `mOne` | `[1]` | none (fixed at 1) |
//! | `mConst` | `[1]` | `μ` |
//! | `mLinear` | `x` | `w₁..w_d` |
//! | `mLinCte` | `[1, x]` | `μ, w₁..w_d` |
//! | `mSum(a,b)` | `φ_a ⧺ φ_b` | both children's |

use std::collections::HashMap;
use std::sync::OnceLock;

use nalgebra::DMatrix;

use crate::error::{Error, Result};
use crate::expr::Expr;

/// The atomic mean families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeanKind {
    /// Identically zero, no basis.
    Zero,
    /// Identically one.
    One,
    /// Constant with a free level.
    Const,
    /// Linear without intercept.
    Linear,
    /// Linear with intercept.
    LinearConst,
}

impl MeanKind {
    /// Registered name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Zero => "mZero",
            Self::One => "mOne",
            Self::Const => "mConst",
            Self::Linear => "mLinear",
            Self::LinearConst => "mLinCte",
        }
    }

    /// Number of free coefficients for inputs of dimension `dim`.
    #[must_use]
    pub fn arity(self, dim: usize) -> usize {
        match self {
            Self::Zero | Self::One => 0,
            Self::Const => 1,
            Self::Linear => dim,
            Self::LinearConst => dim + 1,
        }
    }

    fn feature_count(self, dim: usize) -> usize {
        match self {
            Self::Zero => 0,
            Self::One | Self::Const => 1,
            Self::Linear => dim,
            Self::LinearConst => dim + 1,
        }
    }
}

fn registry() -> &'static HashMap<&'static str, MeanKind> {
    static REGISTRY: OnceLock<HashMap<&'static str, MeanKind>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        [
            MeanKind::Zero,
            MeanKind::One,
            MeanKind::Const,
            MeanKind::Linear,
            MeanKind::LinearConst,
        ]
        .into_iter()
        .map(|k| (k.name(), k))
        .collect()
    })
}

/// A mean-function tree.
#[derive(Clone, Debug, PartialEq)]
pub enum MeanFunction {
    /// A primitive basis with its coefficients.
    Atom {
        /// Which family.
        kind: MeanKind,
        /// Input dimension.
        dim: usize,
        /// Free coefficients, `kind.arity(dim)` of them.
        params: Vec<f64>,
    },
    /// Concatenated bases of two children.
    Sum(Box<MeanFunction>, Box<MeanFunction>),
}

impl MeanFunction {
    /// An atomic mean with coefficients set to 1.
    #[must_use]
    pub fn atom(kind: MeanKind, dim: usize) -> Self {
        Self::Atom {
            kind,
            dim,
            params: vec![1.0; kind.arity(dim)],
        }
    }

    /// Parses an expression such as `mSum(mConst,mLinear)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`], [`Error::UnknownName`] or
    /// [`Error::Configuration`] for malformed expressions.
    pub fn parse(text: &str, dim: usize) -> Result<Self> {
        Self::from_expr(&Expr::parse(text)?, dim)
    }

    /// Builds a mean function from an already parsed expression.
    ///
    /// # Errors
    ///
    /// See [`parse`](Self::parse).
    pub fn from_expr(expr: &Expr, dim: usize) -> Result<Self> {
        if expr.name == "mSum" {
            let [left, right] = expr.children.as_slice() else {
                return Err(Error::Configuration(format!(
                    "mSum takes exactly two mean functions, got {}",
                    expr.children.len()
                )));
            };
            return Ok(Self::Sum(
                Box::new(Self::from_expr(left, dim)?),
                Box::new(Self::from_expr(right, dim)?),
            ));
        }
        let kind = registry()
            .get(expr.name.as_str())
            .copied()
            .ok_or_else(|| Error::UnknownName {
                kind: "mean",
                name: expr.name.clone(),
            })?;
        if !expr.is_atom() {
            return Err(Error::Configuration(format!(
                "{} is atomic and takes no arguments",
                expr.name
            )));
        }
        Ok(Self::atom(kind, dim))
    }

    /// The expression that rebuilds this tree.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Atom { kind, .. } => kind.name().to_string(),
            Self::Sum(l, r) => format!("mSum({},{})", l.name(), r.name()),
        }
    }

    /// Number of free coefficients.
    #[must_use]
    pub fn hyperparameter_count(&self) -> usize {
        match self {
            Self::Atom { params, .. } => params.len(),
            Self::Sum(l, r) => l.hyperparameter_count() + r.hyperparameter_count(),
        }
    }

    /// Free coefficients in traversal order.
    #[must_use]
    pub fn hyperparameters(&self) -> Vec<f64> {
        match self {
            Self::Atom { params, .. } => params.clone(),
            Self::Sum(l, r) => {
                let mut v = l.hyperparameters();
                v.extend(r.hyperparameters());
                v
            }
        }
    }

    /// Replaces the free coefficients.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] on a length mismatch.
    pub fn set_hyperparameters(&mut self, values: &[f64]) -> Result<()> {
        let expected = self.hyperparameter_count();
        if values.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                got: values.len(),
            });
        }
        self.distribute(values);
        Ok(())
    }

    /// Like [`set_hyperparameters`](Self::set_hyperparameters), broadcasting a single value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] for any other length mismatch.
    pub fn set_hyperparameters_broadcast(&mut self, values: &[f64]) -> Result<()> {
        let n = self.hyperparameter_count();
        if values.len() == 1 && n > 1 {
            self.distribute(&vec![values[0]; n]);
            Ok(())
        } else {
            self.set_hyperparameters(values)
        }
    }

    fn distribute(&mut self, values: &[f64]) {
        match self {
            Self::Atom { params, .. } => params.copy_from_slice(values),
            Self::Sum(l, r) => {
                let split = l.hyperparameter_count();
                l.distribute(&values[..split]);
                r.distribute(&values[split..]);
            }
        }
    }

    /// Length of the basis vector.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        match self {
            Self::Atom { kind, dim, .. } => kind.feature_count(*dim),
            Self::Sum(l, r) => l.feature_count() + r.feature_count(),
        }
    }

    /// Basis vector `φ(x)`.
    #[must_use]
    pub fn features(&self, x: &[f64]) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.feature_count());
        self.push_features(x, &mut out);
        out
    }

    fn push_features(&self, x: &[f64], out: &mut Vec<f64>) {
        match self {
            Self::Atom { kind, .. } => match kind {
                MeanKind::Zero => {}
                MeanKind::One | MeanKind::Const => out.push(1.0),
                MeanKind::Linear => out.extend_from_slice(x),
                MeanKind::LinearConst => {
                    out.push(1.0);
                    out.extend_from_slice(x);
                }
            },
            Self::Sum(l, r) => {
                l.push_features(x, out);
                r.push_features(x, out);
            }
        }
    }

    /// Coefficients paired with [`features`](Self::features); `mOne` contributes a fixed 1.
    #[must_use]
    pub fn coefficients(&self) -> Vec<f64> {
        match self {
            Self::Atom {
                kind: MeanKind::One,
                ..
            } => vec![1.0],
            Self::Atom { params, .. } => params.clone(),
            Self::Sum(l, r) => {
                let mut v = l.coefficients();
                v.extend(r.coefficients());
                v
            }
        }
    }

    /// `m(x) = φ(x)·w`.
    #[must_use]
    pub fn value(&self, x: &[f64]) -> f64 {
        self.features(x)
            .iter()
            .zip(self.coefficients())
            .map(|(f, w)| f * w)
            .sum()
    }

    /// The `n×p` feature matrix, one row per input.
    #[must_use]
    pub fn feature_matrix(&self, xs: &[Vec<f64>]) -> DMatrix<f64> {
        let p = self.feature_count();
        let mut f = DMatrix::zeros(xs.len(), p);
        for (i, x) in xs.iter().enumerate() {
            for (j, v) in self.features(x).into_iter().enumerate() {
                f[(i, j)] = v;
            }
        }
        f
    }
}
