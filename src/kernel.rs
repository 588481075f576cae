//! Covariance (kernel) functions and their composition algebra.
//!
//! A [`Kernel`] is a tree: atomic nodes carry a [`KernelKind`] plus their own
//! hyperparameters, and the two combinators ([`Kernel::Sum`],
//! [`Kernel::Prod`]) own exactly two children each. The flat hyperparameter
//! vector of a tree is the concatenation of its children's vectors in
//! left-to-right traversal order.
//!
//! | Name | Formula | Hyperparameters |
//! |------|---------|-----------------|
//! | `kConst` | `c` | `c` |
//! | `kLinear` | `x·x'` | none |
//! | `kLinearARD` | `Σ xᵢx'ᵢ/ℓᵢ²` | `ℓ₁..ℓ_d` |
//! | `kSEISO` / `kSEARD` | `exp(-r²/2)` | `ℓ` / `ℓ₁..ℓ_d` |
//! | `kMaternISO{1,3,5}` / `kMaternARD{1,3,5}` | Matérn ν = 1/2, 3/2, 5/2 in `r` | `ℓ` / `ℓ₁..ℓ_d` |
//! | `kPoly1`..`kPoly7` | `σ²(c + x·x')ᵖ` | `σ, c` |
//! | `kRQISO` | `(1 + r²/2α)^-α` | `ℓ, α` |
//! | `kHamming` | `exp(-h/ℓ)`, `h` = number of differing categories | `ℓ` |
//!
//! `r` is the distance scaled by the length scale(s).
//!
//! # Examples
//!
//! ```
//! use smbo::Kernel;
//!
//! let mut k = Kernel::parse("kSum(kConst,kMaternARD5)", 2)?;
//! assert_eq!(k.hyperparameter_count(), 3);
//! k.set_hyperparameters(&[0.5, 0.2, 0.3])?;
//! assert_eq!(k.hyperparameters(), vec![0.5, 0.2, 0.3]);
//! let v = k.evaluate(&[0.1, 0.2], &[0.1, 0.2]);
//! assert!((v - 1.5).abs() < 1e-12);
//! # Ok::<(), smbo::Error>(())
//! ```

use std::collections::HashMap;
use std::sync::OnceLock;

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};
use crate::expr::Expr;

const SQRT_3: f64 = 1.732_050_807_568_877_2;
const SQRT_5: f64 = 2.236_067_977_499_79;

/// Smoothness of a Matérn kernel (ν = 1/2, 3/2 or 5/2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Smoothness {
    /// ν = 1/2 (exponential kernel).
    Half,
    /// ν = 3/2.
    ThreeHalves,
    /// ν = 5/2.
    FiveHalves,
}

/// The atomic kernel families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KernelKind {
    /// Constant covariance.
    Const,
    /// Dot product.
    Linear,
    /// Dot product with per-dimension scaling.
    LinearArd,
    /// Squared exponential, single length scale.
    SeIso,
    /// Squared exponential, per-dimension length scales.
    SeArd,
    /// Matérn, single length scale.
    MaternIso(Smoothness),
    /// Matérn, per-dimension length scales.
    MaternArd(Smoothness),
    /// Polynomial of the given degree (1 to 7).
    Poly(u8),
    /// Rational quadratic, single length scale.
    RqIso,
    /// Exponentiated Hamming distance over category indices.
    Hamming,
}

impl KernelKind {
    /// Registered name of the atomic kind.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Const => "kConst",
            Self::Linear => "kLinear",
            Self::LinearArd => "kLinearARD",
            Self::SeIso => "kSEISO",
            Self::SeArd => "kSEARD",
            Self::MaternIso(Smoothness::Half) => "kMaternISO1",
            Self::MaternIso(Smoothness::ThreeHalves) => "kMaternISO3",
            Self::MaternIso(Smoothness::FiveHalves) => "kMaternISO5",
            Self::MaternArd(Smoothness::Half) => "kMaternARD1",
            Self::MaternArd(Smoothness::ThreeHalves) => "kMaternARD3",
            Self::MaternArd(Smoothness::FiveHalves) => "kMaternARD5",
            Self::Poly(1) => "kPoly1",
            Self::Poly(2) => "kPoly2",
            Self::Poly(3) => "kPoly3",
            Self::Poly(4) => "kPoly4",
            Self::Poly(5) => "kPoly5",
            Self::Poly(6) => "kPoly6",
            Self::Poly(_) => "kPoly7",
            Self::RqIso => "kRQISO",
            Self::Hamming => "kHamming",
        }
    }

    /// Number of hyperparameters for inputs of dimension `dim`.
    #[must_use]
    pub fn arity(self, dim: usize) -> usize {
        match self {
            Self::Linear => 0,
            Self::Const | Self::SeIso | Self::MaternIso(_) | Self::Hamming => 1,
            Self::Poly(_) | Self::RqIso => 2,
            Self::LinearArd | Self::SeArd | Self::MaternArd(_) => dim,
        }
    }
}

type Constructor = fn() -> KernelKind;

/// Name → constructor table for atomic kernels, built once per process.
fn registry() -> &'static HashMap<&'static str, Constructor> {
    static REGISTRY: OnceLock<HashMap<&'static str, Constructor>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let constructors: [Constructor; 20] = [
            || KernelKind::Const,
            || KernelKind::Linear,
            || KernelKind::LinearArd,
            || KernelKind::SeIso,
            || KernelKind::SeArd,
            || KernelKind::MaternIso(Smoothness::Half),
            || KernelKind::MaternIso(Smoothness::ThreeHalves),
            || KernelKind::MaternIso(Smoothness::FiveHalves),
            || KernelKind::MaternArd(Smoothness::Half),
            || KernelKind::MaternArd(Smoothness::ThreeHalves),
            || KernelKind::MaternArd(Smoothness::FiveHalves),
            || KernelKind::Poly(1),
            || KernelKind::Poly(2),
            || KernelKind::Poly(3),
            || KernelKind::Poly(4),
            || KernelKind::Poly(5),
            || KernelKind::Poly(6),
            || KernelKind::Poly(7),
            || KernelKind::RqIso,
            || KernelKind::Hamming,
        ];
        constructors.into_iter().map(|c| (c().name(), c)).collect()
    })
}

/// A covariance function tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Kernel {
    /// A primitive kernel with its own hyperparameters.
    Atom {
        /// Which family.
        kind: KernelKind,
        /// Input dimension.
        dim: usize,
        /// Hyperparameters, `kind.arity(dim)` of them.
        params: Vec<f64>,
    },
    /// `k₁ + k₂`.
    Sum(Box<Kernel>, Box<Kernel>),
    /// `k₁ · k₂`.
    Prod(Box<Kernel>, Box<Kernel>),
}

impl Kernel {
    /// An atomic kernel with all hyperparameters set to 1.
    #[must_use]
    pub fn atom(kind: KernelKind, dim: usize) -> Self {
        Self::Atom {
            kind,
            dim,
            params: vec![1.0; kind.arity(dim)],
        }
    }

    /// Parses an expression such as `kProd(kConst,kSEARD)` for inputs of dimension `dim`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for malformed text, [`Error::UnknownName`] for
    /// unregistered names and [`Error::Configuration`] for wrong argument counts.
    pub fn parse(text: &str, dim: usize) -> Result<Self> {
        Self::from_expr(&Expr::parse(text)?, dim)
    }

    /// Builds a kernel from an already parsed expression.
    ///
    /// # Errors
    ///
    /// See [`parse`](Self::parse).
    pub fn from_expr(expr: &Expr, dim: usize) -> Result<Self> {
        match expr.name.as_str() {
            "kSum" | "kProd" => {
                let [left, right] = expr.children.as_slice() else {
                    return Err(Error::Configuration(format!(
                        "{} takes exactly two kernels, got {}",
                        expr.name,
                        expr.children.len()
                    )));
                };
                let left = Box::new(Self::from_expr(left, dim)?);
                let right = Box::new(Self::from_expr(right, dim)?);
                Ok(if expr.name == "kSum" {
                    Self::Sum(left, right)
                } else {
                    Self::Prod(left, right)
                })
            }
            name => {
                let ctor = registry().get(name).ok_or_else(|| Error::UnknownName {
                    kind: "kernel",
                    name: name.to_string(),
                })?;
                if !expr.is_atom() {
                    return Err(Error::Configuration(format!(
                        "{name} is atomic and takes no arguments"
                    )));
                }
                Ok(Self::atom(ctor(), dim))
            }
        }
    }

    /// All registered kernel names, combinators included.
    #[must_use]
    pub fn names() -> Vec<&'static str> {
        let mut names: Vec<_> = registry().keys().copied().collect();
        names.sort_unstable();
        names.extend(["kProd", "kSum"]);
        names
    }

    /// The expression that rebuilds this tree.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Atom { kind, .. } => kind.name().to_string(),
            Self::Sum(l, r) => format!("kSum({},{})", l.name(), r.name()),
            Self::Prod(l, r) => format!("kProd({},{})", l.name(), r.name()),
        }
    }

    /// Number of hyperparameters in the whole tree.
    #[must_use]
    pub fn hyperparameter_count(&self) -> usize {
        match self {
            Self::Atom { params, .. } => params.len(),
            Self::Sum(l, r) | Self::Prod(l, r) => {
                l.hyperparameter_count() + r.hyperparameter_count()
            }
        }
    }

    /// The flat hyperparameter vector in traversal order.
    #[must_use]
    pub fn hyperparameters(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.hyperparameter_count());
        self.collect_hyperparameters(&mut out);
        out
    }

    fn collect_hyperparameters(&self, out: &mut Vec<f64>) {
        match self {
            Self::Atom { params, .. } => out.extend_from_slice(params),
            Self::Sum(l, r) | Self::Prod(l, r) => {
                l.collect_hyperparameters(out);
                r.collect_hyperparameters(out);
            }
        }
    }

    /// Replaces the flat hyperparameter vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `values.len()` differs from
    /// [`hyperparameter_count`](Self::hyperparameter_count).
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

    /// Like [`set_hyperparameters`](Self::set_hyperparameters), but a single
    /// value is broadcast to every slot.
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
            Self::Sum(l, r) | Self::Prod(l, r) => {
                let split = l.hyperparameter_count();
                l.distribute(&values[..split]);
                r.distribute(&values[split..]);
            }
        }
    }

    /// Covariance between `x1` and `x2`.
    #[must_use]
    pub fn evaluate(&self, x1: &[f64], x2: &[f64]) -> f64 {
        match self {
            Self::Atom { kind, params, .. } => eval_atom(*kind, params, x1, x2),
            Self::Sum(l, r) => l.evaluate(x1, x2) + r.evaluate(x1, x2),
            Self::Prod(l, r) => l.evaluate(x1, x2) * r.evaluate(x1, x2),
        }
    }

    /// Partial derivative of the covariance w.r.t. hyperparameter `component`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `component` is out of range.
    pub fn gradient(&self, x1: &[f64], x2: &[f64], component: usize) -> Result<f64> {
        let n = self.hyperparameter_count();
        if component >= n {
            return Err(Error::DimensionMismatch {
                expected: n,
                got: component + 1,
            });
        }
        Ok(self.gradient_unchecked(x1, x2, component))
    }

    fn gradient_unchecked(&self, x1: &[f64], x2: &[f64], component: usize) -> f64 {
        match self {
            Self::Atom { kind, params, .. } => grad_atom(*kind, params, x1, x2, component),
            Self::Sum(l, r) => {
                let split = l.hyperparameter_count();
                if component < split {
                    l.gradient_unchecked(x1, x2, component)
                } else {
                    r.gradient_unchecked(x1, x2, component - split)
                }
            }
            Self::Prod(l, r) => {
                let split = l.hyperparameter_count();
                if component < split {
                    l.gradient_unchecked(x1, x2, component) * r.evaluate(x1, x2)
                } else {
                    l.evaluate(x1, x2) * r.gradient_unchecked(x1, x2, component - split)
                }
            }
        }
    }

    /// The `n×n` correlation matrix over `xs` (no noise term).
    #[must_use]
    pub fn correlation_matrix(&self, xs: &[Vec<f64>]) -> DMatrix<f64> {
        let n = xs.len();
        let mut k = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let v = self.evaluate(&xs[i], &xs[j]);
                k[(i, j)] = v;
                k[(j, i)] = v;
            }
        }
        k
    }

    /// Element-wise derivative of [`correlation_matrix`](Self::correlation_matrix)
    /// w.r.t. hyperparameter `component`.
    pub(crate) fn gradient_matrix(&self, xs: &[Vec<f64>], component: usize) -> DMatrix<f64> {
        let n = xs.len();
        let mut g = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let v = self.gradient_unchecked(&xs[i], &xs[j], component);
                g[(i, j)] = v;
                g[(j, i)] = v;
            }
        }
        g
    }

    /// Covariances between `query` and every point in `xs`.
    #[must_use]
    pub fn cross_correlation(&self, xs: &[Vec<f64>], query: &[f64]) -> DVector<f64> {
        DVector::from_iterator(xs.len(), xs.iter().map(|x| self.evaluate(x, query)))
    }
}

// ---------------------------------------------------------------------------
// Atomic evaluation
// ---------------------------------------------------------------------------

fn sq_dist(x1: &[f64], x2: &[f64]) -> f64 {
    x1.iter().zip(x2).map(|(a, b)| (a - b) * (a - b)).sum()
}

fn sq_dist_ard(x1: &[f64], x2: &[f64], ls: &[f64]) -> f64 {
    x1.iter()
        .zip(x2)
        .zip(ls)
        .map(|((a, b), l)| {
            let d = (a - b) / l;
            d * d
        })
        .sum()
}

fn hamming(x1: &[f64], x2: &[f64]) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let h = x1.iter().zip(x2).filter(|(a, b)| (*a - *b).abs() > 0.5).count() as f64;
    h
}

/// Radial profile `k(r)` of the stationary families.
fn radial(kind: KernelKind, r: f64) -> f64 {
    match kind {
        KernelKind::SeIso | KernelKind::SeArd => (-0.5 * r * r).exp(),
        KernelKind::MaternIso(Smoothness::Half) | KernelKind::MaternArd(Smoothness::Half) => {
            (-r).exp()
        }
        KernelKind::MaternIso(Smoothness::ThreeHalves)
        | KernelKind::MaternArd(Smoothness::ThreeHalves) => {
            let s = SQRT_3 * r;
            (1.0 + s) * (-s).exp()
        }
        KernelKind::MaternIso(Smoothness::FiveHalves)
        | KernelKind::MaternArd(Smoothness::FiveHalves) => {
            let s = SQRT_5 * r;
            (1.0 + s * (1.0 + s / 3.0)) * (-s).exp()
        }
        _ => 0.0,
    }
}

/// `(dk/dr) / r` of the stationary families; finite at `r = 0` except for ν = 1/2.
fn radial_derivative_over_r(kind: KernelKind, r: f64) -> f64 {
    match kind {
        KernelKind::SeIso | KernelKind::SeArd => -(-0.5 * r * r).exp(),
        KernelKind::MaternIso(Smoothness::Half) | KernelKind::MaternArd(Smoothness::Half) => {
            if r > 0.0 { -(-r).exp() / r } else { 0.0 }
        }
        KernelKind::MaternIso(Smoothness::ThreeHalves)
        | KernelKind::MaternArd(Smoothness::ThreeHalves) => -3.0 * (-SQRT_3 * r).exp(),
        KernelKind::MaternIso(Smoothness::FiveHalves)
        | KernelKind::MaternArd(Smoothness::FiveHalves) => {
            let s = SQRT_5 * r;
            -5.0 / 3.0 * (1.0 + s) * (-s).exp()
        }
        _ => 0.0,
    }
}

fn eval_atom(kind: KernelKind, p: &[f64], x1: &[f64], x2: &[f64]) -> f64 {
    match kind {
        KernelKind::Const => p[0],
        KernelKind::Linear => x1.iter().zip(x2).map(|(a, b)| a * b).sum(),
        KernelKind::LinearArd => x1
            .iter()
            .zip(x2)
            .zip(p)
            .map(|((a, b), l)| a * b / (l * l))
            .sum(),
        KernelKind::SeIso | KernelKind::MaternIso(_) => {
            radial(kind, sq_dist(x1, x2).sqrt() / p[0])
        }
        KernelKind::SeArd | KernelKind::MaternArd(_) => radial(kind, sq_dist_ard(x1, x2, p).sqrt()),
        KernelKind::Poly(degree) => {
            let dot: f64 = x1.iter().zip(x2).map(|(a, b)| a * b).sum();
            p[0] * p[0] * (p[1] + dot).powi(i32::from(degree))
        }
        KernelKind::RqIso => {
            let r2 = sq_dist(x1, x2) / (p[0] * p[0]);
            (1.0 + r2 / (2.0 * p[1])).powf(-p[1])
        }
        KernelKind::Hamming => (-hamming(x1, x2) / p[0]).exp(),
    }
}

fn grad_atom(kind: KernelKind, p: &[f64], x1: &[f64], x2: &[f64], c: usize) -> f64 {
    match kind {
        KernelKind::Const => 1.0,
        KernelKind::Linear => 0.0,
        KernelKind::LinearArd => -2.0 * x1[c] * x2[c] / p[c].powi(3),
        KernelKind::SeIso | KernelKind::MaternIso(_) => {
            let r2 = sq_dist(x1, x2) / (p[0] * p[0]);
            radial_derivative_over_r(kind, r2.sqrt()) * (-r2 / p[0])
        }
        KernelKind::SeArd | KernelKind::MaternArd(_) => {
            let r = sq_dist_ard(x1, x2, p).sqrt();
            let dc = (x1[c] - x2[c]) / p[c];
            radial_derivative_over_r(kind, r) * (-dc * dc / p[c])
        }
        KernelKind::Poly(degree) => {
            let dot: f64 = x1.iter().zip(x2).map(|(a, b)| a * b).sum();
            let base = p[1] + dot;
            let deg = i32::from(degree);
            if c == 0 {
                2.0 * p[0] * base.powi(deg)
            } else {
                f64::from(degree) * p[0] * p[0] * base.powi(deg - 1)
            }
        }
        KernelKind::RqIso => {
            let (l, alpha) = (p[0], p[1]);
            let r2 = sq_dist(x1, x2) / (l * l);
            let b = 1.0 + r2 / (2.0 * alpha);
            if c == 0 {
                b.powf(-alpha - 1.0) * r2 / l
            } else {
                b.powf(-alpha) * (-b.ln() + r2 / (2.0 * alpha * b))
            }
        }
        KernelKind::Hamming => {
            let h = hamming(x1, x2);
            (-h / p[0]).exp() * h / (p[0] * p[0])
        }
    }
}
