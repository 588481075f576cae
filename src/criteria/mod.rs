//! Acquisition criteria.
//!
//! Every criterion is **minimized**: improvement-based criteria enter with
//! a negative sign (`cEI` scores `−EI`). A [`Criterion`] is a tree parsed from
//! an expression such as `cSum(cEI,cDistance)` or `cHedge(cEI,cLCB,cPOI)`.
//!
//! | Name | Score at `x` | Parameters (defaults) |
//! |------|--------------|-----------------------|
//! | `cEI` | `−E[max(0, y* − y)^g]` | `g` (1) |
//! | `cBEI` | `cEI` against `y* − bias` | `g` (1), `bias` (0.01) |
//! | `cEIa` | `cEI` with `g` halved every 10 iterations | initial `g` (10) |
//! | `cPOI` | `−P(y < y* − ε)` | `ε` (0.01) |
//! | `cLCB` | `μ − βσ` | `β` (1) |
//! | `cLCBa` | `μ − β_tσ`, GP-UCB schedule | dimension weight (5) |
//! | `cExpReturn` | `μ` | none |
//! | `cAopt` | `−σ` | none |
//! | `cMI` | `μ − √α(√(σ² + γ) − √γ)` | `α` (ln 2·10⁶) |
//! | `cThompsonSampling` | posterior draw | none |
//! | `cOptimisticSampling` | `min(μ, draw)` | none |
//! | `cDistance` | `w‖x − x_last‖` | `w` (1) |
//! | `cSum(..)` / `cProd(..)` | weighted sum / product of children | children's |
//! | `cHedge(..)` / `cHedgeRandom(..)` | portfolio, see [`Hedge`] | members' |
//!
//! Criteria carry explicit state (annealing exponents, Thompson seeds, the
//! mutual-information variance sum, hedge gains) so a checkpoint captures it.

mod atomic;
mod hedge;

pub use atomic::Atomic;
pub use hedge::Hedge;

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::learning::Ensemble;

/// What a criterion needs to score a point.
#[derive(Clone, Copy, Debug)]
pub struct Context<'a> {
    /// Fitted surrogate ensemble.
    pub model: &'a Ensemble,
    /// Best observed output.
    pub incumbent: f64,
    /// Last evaluated input, in model coordinates.
    pub last: Option<&'a [f64]>,
}

/// Per-iteration information passed to [`Criterion::init`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Setup {
    /// Zero-based iteration of the adaptive phase.
    pub iteration: usize,
    /// Input dimension.
    pub dim: usize,
}

/// How a combinator merges its children.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Combinator {
    /// `Σ wᵢcᵢ`.
    Sum,
    /// `Π wᵢcᵢ`.
    Product,
}

/// An acquisition-criterion tree.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Criterion {
    /// A primitive criterion.
    Atom(Atomic),
    /// Weighted combination of children.
    Combined {
        /// Sum or product.
        op: Combinator,
        /// Child criteria.
        children: Vec<Criterion>,
        /// One weight per child.
        weights: Vec<f64>,
    },
    /// Portfolio over member criteria; only valid at the root.
    Hedge(Hedge),
}

impl Criterion {
    /// Every registered name.
    #[must_use]
    pub fn names() -> Vec<&'static str> {
        let mut names = Atomic::NAMES.to_vec();
        names.extend(["cSum", "cProd", "cHedge", "cHedgeRandom"]);
        names
    }

    /// Parses a criterion expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for malformed text, [`Error::UnknownName`] for
    /// unregistered names and [`Error::Configuration`] for misplaced hedges or
    /// combinators without children.
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_expr(&Expr::parse(text)?, true)
    }

    fn from_expr(expr: &Expr, root: bool) -> Result<Self> {
        let children = || {
            expr.children
                .iter()
                .map(|c| Self::from_expr(c, false))
                .collect::<Result<Vec<_>>>()
        };
        match expr.name.as_str() {
            "cSum" | "cProd" => {
                let children = children()?;
                if children.is_empty() {
                    return Err(Error::Configuration(format!(
                        "{} needs at least one child",
                        expr.name
                    )));
                }
                let op = if expr.name == "cSum" {
                    Combinator::Sum
                } else {
                    Combinator::Product
                };
                Ok(Self::Combined {
                    op,
                    weights: vec![1.0; children.len()],
                    children,
                })
            }
            "cHedge" | "cHedgeRandom" => {
                if !root {
                    return Err(Error::Configuration(format!(
                        "{} may only appear at the root of a criterion",
                        expr.name
                    )));
                }
                Ok(Self::Hedge(Hedge::new(
                    children()?,
                    expr.name == "cHedgeRandom",
                )?))
            }
            name => {
                let atom = Atomic::from_name(name).ok_or_else(|| Error::UnknownName {
                    kind: "criterion",
                    name: name.to_string(),
                })?;
                if !expr.is_atom() {
                    return Err(Error::Configuration(format!(
                        "{name} is atomic and takes no arguments"
                    )));
                }
                Ok(Self::Atom(atom))
            }
        }
    }

    /// The expression that rebuilds this tree.
    #[must_use]
    pub fn name(&self) -> String {
        let join = |cs: &[Criterion]| cs.iter().map(Self::name).collect::<Vec<_>>().join(",");
        match self {
            Self::Atom(a) => a.name().to_string(),
            Self::Combined { op, children, .. } => {
                let head = match op {
                    Combinator::Sum => "cSum",
                    Combinator::Product => "cProd",
                };
                format!("{head}({})", join(children))
            }
            Self::Hedge(h) => format!("{}({})", h.kind_name(), join(h.members())),
        }
    }

    fn children(&self) -> &[Criterion] {
        match self {
            Self::Atom(_) => &[],
            Self::Combined { children, .. } => children,
            Self::Hedge(h) => h.members(),
        }
    }

    fn children_mut(&mut self) -> &mut [Criterion] {
        match self {
            Self::Atom(_) => &mut [],
            Self::Combined { children, .. } => children,
            Self::Hedge(h) => h.members_mut(),
        }
    }

    /// Number of tunable parameters.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        match self {
            Self::Atom(a) => a.parameter_count(),
            _ => self.children().iter().map(Self::parameter_count).sum(),
        }
    }

    /// Tunable parameters in traversal order.
    #[must_use]
    pub fn parameters(&self) -> Vec<f64> {
        match self {
            Self::Atom(a) => a.parameters(),
            _ => self.children().iter().flat_map(Self::parameters).collect(),
        }
    }

    /// Replaces the tunable parameters, split contiguously among children.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] on a length mismatch and
    /// [`Error::Configuration`] for invalid values.
    pub fn set_parameters(&mut self, values: &[f64]) -> Result<()> {
        let expected = self.parameter_count();
        if values.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                got: values.len(),
            });
        }
        if let Self::Atom(a) = self {
            return a.set_parameters(values);
        }
        let mut offset = 0;
        for child in self.children_mut() {
            let n = child.parameter_count();
            child.set_parameters(&values[offset..offset + n])?;
            offset += n;
        }
        Ok(())
    }

    /// Sets the child weights of a `cSum`/`cProd`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] on other nodes and
    /// [`Error::DimensionMismatch`] on a length mismatch.
    pub fn set_weights(&mut self, values: &[f64]) -> Result<()> {
        let Self::Combined {
            children, weights, ..
        } = self
        else {
            return Err(Error::Configuration(
                "only cSum and cProd carry weights".into(),
            ));
        };
        if values.len() != children.len() {
            return Err(Error::DimensionMismatch {
                expected: children.len(),
                got: values.len(),
            });
        }
        weights.copy_from_slice(values);
        Ok(())
    }

    /// Whether any part of the tree uses the incumbent value.
    #[must_use]
    pub fn requires_comparison(&self) -> bool {
        match self {
            Self::Atom(a) => a.requires_comparison(),
            _ => self.children().iter().any(Self::requires_comparison),
        }
    }

    /// Prepares per-iteration state after the model has been refit.
    pub fn init(&mut self, setup: &Setup, rng: &mut fastrand::Rng) {
        match self {
            Self::Atom(a) => a.init(setup, rng),
            _ => {
                for c in self.children_mut() {
                    c.init(setup, rng);
                }
            }
        }
    }

    /// Clears accumulated state, restoring a freshly parsed tree.
    pub fn reset(&mut self) {
        match self {
            Self::Atom(a) => a.reset(),
            Self::Combined { children, .. } => children.iter_mut().for_each(Self::reset),
            Self::Hedge(h) => h.reset(),
        }
    }

    /// Score at `x`; lower is more promising.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] when called on a hedge (score its
    /// members instead) and propagates prediction errors.
    pub fn score(&self, ctx: &Context<'_>, x: &[f64]) -> Result<f64> {
        match self {
            Self::Atom(a) => a.score(ctx, x),
            Self::Combined {
                op,
                children,
                weights,
            } => {
                let mut acc = match op {
                    Combinator::Sum => 0.0,
                    Combinator::Product => 1.0,
                };
                for (c, w) in children.iter().zip(weights) {
                    let v = w * c.score(ctx, x)?;
                    match op {
                        Combinator::Sum => acc += v,
                        Combinator::Product => acc *= v,
                    }
                }
                Ok(acc)
            }
            Self::Hedge(_) => Err(Error::InvalidState(
                "a hedge is scored through its members".into(),
            )),
        }
    }

    /// Informs the tree of the point chosen for evaluation.
    ///
    /// # Errors
    ///
    /// Propagates prediction errors.
    pub fn update(&mut self, ctx: &Context<'_>, chosen: &[f64]) -> Result<()> {
        match self {
            Self::Atom(a) => a.update(ctx, chosen),
            _ => {
                for c in self.children_mut() {
                    c.update(ctx, chosen)?;
                }
                Ok(())
            }
        }
    }

    /// The portfolio, if the root is a hedge.
    #[must_use]
    pub fn hedge(&self) -> Option<&Hedge> {
        match self {
            Self::Hedge(h) => Some(h),
            _ => None,
        }
    }

    pub(crate) fn hedge_mut(&mut self) -> Option<&mut Hedge> {
        match self {
            Self::Hedge(h) => Some(h),
            _ => None,
        }
    }
}

impl Default for Criterion {
    fn default() -> Self {
        Self::Atom(Atomic::ExpectedImprovement { exponent: 1 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::distribution::Predictive;
    use crate::kernel::Kernel;
    use crate::mean::MeanFunction;
    use crate::surrogate::{Surrogate, SurrogateConfig};

    fn model() -> (Ensemble, Dataset) {
        let mut data = Dataset::new(1);
        for x in [0.0, 0.3, 0.6, 1.0] {
            data.add_sample(vec![x], (x - 0.4_f64).powi(2)).unwrap();
        }
        let mut kernel = Kernel::parse("kSEISO", 1).unwrap();
        kernel.set_hyperparameters(&[0.3]).unwrap();
        let mut m = Surrogate::new(
            SurrogateConfig::default(),
            kernel,
            MeanFunction::parse("mZero", 1).unwrap(),
            None,
        )
        .unwrap();
        m.fit(&data).unwrap();
        (Ensemble::new(vec![m]).unwrap(), data)
    }

    fn ctx<'a>(model: &'a Ensemble, data: &'a Dataset) -> Context<'a> {
        Context {
            model,
            incumbent: data.best().unwrap().y,
            last: data.last().map(|s| s.x.as_slice()),
        }
    }

    #[test]
    fn every_name_parses_and_round_trips() {
        for name in Atomic::NAMES {
            let c = Criterion::parse(name).unwrap();
            assert_eq!(c.name(), name);
        }
        let text = "cHedgeRandom(cSum(cEI,cDistance),cLCB,cProd(cPOI,cExpReturn))";
        assert_eq!(Criterion::parse(text).unwrap().name(), text);
    }

    #[test]
    fn expected_improvement_is_non_positive_and_zero_at_data() {
        let (m, d) = model();
        let c = Criterion::parse("cEI").unwrap();
        let cx = ctx(&m, &d);
        for i in 0..=20 {
            let x = f64::from(i) / 20.0;
            assert!(c.score(&cx, &[x]).unwrap() <= 0.0);
        }
        assert!(c.score(&cx, &[1.0]).unwrap().abs() < 1e-6);
    }

    #[test]
    fn biased_ei_scales_the_bias_by_the_signal_variance() {
        let (m, d) = model();
        let cx = ctx(&m, &d);
        let mut c = Criterion::parse("cBEI").unwrap();
        c.set_parameters(&[1.0, 0.05]).unwrap();
        let sigma2 = m.signal_variance().unwrap();
        assert!(sigma2 > 0.0);
        let x = [0.45];
        let expected = -m
            .predict(&x)
            .unwrap()
            .expected_improvement(cx.incumbent - 0.05 / sigma2, 1);
        assert!((c.score(&cx, &x).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn probability_of_improvement_counts_the_incumbent_as_improving() {
        let (m, d) = model();
        let cx = ctx(&m, &d);
        let c = Criterion::parse("cPOI").unwrap();
        let best = d.best().unwrap().x.clone();
        assert!(c.score(&cx, &best).unwrap() < -0.5);
    }

    #[test]
    fn sum_adds_weighted_children() {
        let (m, d) = model();
        let cx = ctx(&m, &d);
        let mut c = Criterion::parse("cSum(cExpReturn,cDistance)").unwrap();
        c.set_weights(&[2.0, 0.5]).unwrap();
        let x = [0.45];
        let mean = m.predict(&x).unwrap().mean();
        let expected = 2.0 * mean + 0.5 * 0.55;
        assert!((c.score(&cx, &x).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn parameters_split_across_children() {
        let mut c = Criterion::parse("cSum(cBEI,cLCB,cAopt)").unwrap();
        assert_eq!(c.parameter_count(), 3);
        c.set_parameters(&[2.0, 0.1, 3.0]).unwrap();
        assert_eq!(c.parameters(), vec![2.0, 0.1, 3.0]);
        assert!(c.set_parameters(&[1.0]).is_err());
        assert!(Criterion::parse("cEI").unwrap().set_parameters(&[0.0]).is_err());
    }

    #[test]
    fn annealed_exponent_halves_every_ten_iterations() {
        let mut c = Criterion::parse("cEIa").unwrap();
        let mut rng = fastrand::Rng::with_seed(1);
        let expect = [(0, 10), (9, 10), (10, 5), (20, 3), (30, 2), (40, 1), (90, 1)];
        for (iteration, exponent) in expect {
            c.init(&Setup { iteration, dim: 2 }, &mut rng);
            assert!(matches!(
                c,
                Criterion::Atom(Atomic::AnnealedExpectedImprovement { current, .. }) if current == exponent
            ));
        }
    }

    #[test]
    fn annealed_lcb_beta_grows_with_iterations() {
        let mut c = Criterion::parse("cLCBa").unwrap();
        let mut rng = fastrand::Rng::with_seed(1);
        let beta = |c: &Criterion| match c {
            Criterion::Atom(Atomic::AnnealedLowerConfidenceBound { beta, .. }) => *beta,
            _ => f64::NAN,
        };
        c.init(&Setup { iteration: 1, dim: 2 }, &mut rng);
        let early = beta(&c);
        c.init(&Setup { iteration: 50, dim: 2 }, &mut rng);
        assert!(beta(&c) > early);
    }

    #[test]
    fn thompson_draws_are_stable_within_an_iteration() {
        let (m, d) = model();
        let cx = ctx(&m, &d);
        let mut c = Criterion::parse("cThompsonSampling").unwrap();
        let mut rng = fastrand::Rng::with_seed(9);
        c.init(&Setup { iteration: 0, dim: 1 }, &mut rng);
        let a = c.score(&cx, &[0.8]).unwrap();
        assert_eq!(a, c.score(&cx, &[0.8]).unwrap());
        let o = Criterion::parse("cOptimisticSampling").unwrap();
        let mean = m.predict(&[0.8]).unwrap().mean();
        assert!(o.score(&cx, &[0.8]).unwrap() <= mean);
    }

    #[test]
    fn mutual_information_accumulates_variance() {
        let (m, d) = model();
        let cx = ctx(&m, &d);
        let mut c = Criterion::parse("cMI").unwrap();
        let before = c.score(&cx, &[0.8]).unwrap();
        c.update(&cx, &[0.8]).unwrap();
        let after = c.score(&cx, &[0.8]).unwrap();
        assert!(after >= before);
        c.reset();
        assert_eq!(c.score(&cx, &[0.8]).unwrap(), before);
    }

    #[test]
    fn comparison_flag_follows_children() {
        assert!(Criterion::parse("cSum(cAopt,cEI)").unwrap().requires_comparison());
        assert!(!Criterion::parse("cMI").unwrap().requires_comparison());
        assert!(!Criterion::parse("cLCB").unwrap().requires_comparison());
    }

    #[test]
    fn misplaced_or_unknown_names_are_rejected() {
        assert!(matches!(
            Criterion::parse("cSum(cEI,cHedge(cEI,cLCB))"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            Criterion::parse("cUCB"),
            Err(Error::UnknownName { kind: "criterion", .. })
        ));
        assert!(Criterion::parse("cEI(cLCB)").is_err());
    }

    #[test]
    fn distance_is_zero_without_history() {
        let (m, _) = model();
        let cx = Context {
            model: &m,
            incumbent: 0.0,
            last: None,
        };
        let c = Criterion::parse("cDistance").unwrap();
        assert_eq!(c.score(&cx, &[0.3]).unwrap(), 0.0);
        assert!(matches!(m.predict(&[0.3]).unwrap(), Predictive::Gaussian { .. }));
    }
}
