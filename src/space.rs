//! Input domains and the mapping between user and model coordinates.
//!
//! The surrogate always works in *model coordinates*: continuous boxes
//! are rescaled to `[0,1]^d`, discrete point sets to the unit bounding box
//! of the set, and categorical inputs keep their category indices.

use crate::error::{Error, Result};

/// The domain searched by the optimizer.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SearchSpace {
    /// A box `[lowerᵢ, upperᵢ]`.
    Continuous {
        /// Lower bounds.
        lower: Vec<f64>,
        /// Upper bounds.
        upper: Vec<f64>,
    },
    /// A finite explicit set of points.
    Discrete(Vec<Vec<f64>>),
    /// One category count per dimension; points are index vectors.
    Categorical(Vec<usize>),
}

impl SearchSpace {
    /// A box from `(low, high)` pairs.
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub fn continuous(bounds: &[(f64, f64)]) -> Result<Self> {
        let space = Self::Continuous {
            lower: bounds.iter().map(|b| b.0).collect(),
            upper: bounds.iter().map(|b| b.1).collect(),
        };
        space.validate()?;
        Ok(space)
    }

    /// The unit cube `[0,1]^dim`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFeasiblePoint`] for `dim == 0`.
    pub fn unit(dim: usize) -> Result<Self> {
        Self::continuous(&vec![(0.0, 1.0); dim])
    }

    /// A finite point set.
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub fn discrete(points: Vec<Vec<f64>>) -> Result<Self> {
        let space = Self::Discrete(points);
        space.validate()?;
        Ok(space)
    }

    /// A categorical grid.
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub fn categorical(categories: Vec<usize>) -> Result<Self> {
        let space = Self::Categorical(categories);
        space.validate()?;
        Ok(space)
    }

    /// Checks the domain is non-empty and well formed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFeasiblePoint`] for empty domains,
    /// [`Error::InvalidBounds`] for inverted or non-finite bounds and
    /// [`Error::DimensionMismatch`] for ragged inputs.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Continuous { lower, upper } => {
                if lower.len() != upper.len() {
                    return Err(Error::DimensionMismatch {
                        expected: lower.len(),
                        got: upper.len(),
                    });
                }
                if lower.is_empty() {
                    return Err(Error::NoFeasiblePoint);
                }
                for (&low, &high) in lower.iter().zip(upper) {
                    if !(low <= high && low.is_finite() && high.is_finite()) {
                        return Err(Error::InvalidBounds { low, high });
                    }
                }
            }
            Self::Discrete(points) => {
                let Some(first) = points.first() else {
                    return Err(Error::NoFeasiblePoint);
                };
                if first.is_empty() {
                    return Err(Error::NoFeasiblePoint);
                }
                if let Some(p) = points.iter().find(|p| p.len() != first.len()) {
                    return Err(Error::DimensionMismatch {
                        expected: first.len(),
                        got: p.len(),
                    });
                }
                if points.iter().flatten().any(|v| !v.is_finite()) {
                    return Err(Error::Configuration(
                        "discrete points must be finite".into(),
                    ));
                }
            }
            Self::Categorical(categories) => {
                if categories.is_empty() || categories.contains(&0) {
                    return Err(Error::NoFeasiblePoint);
                }
            }
        }
        Ok(())
    }

    /// Input dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        match self {
            Self::Continuous { lower, .. } => lower.len(),
            Self::Discrete(points) => points.first().map_or(0, Vec::len),
            Self::Categorical(categories) => categories.len(),
        }
    }

    /// Whether the inner optimizer scores every point instead of searching.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        !matches!(self, Self::Continuous { .. })
    }

    /// Number of points in a finite domain, saturating at `usize::MAX`.
    #[must_use]
    pub fn size(&self) -> Option<usize> {
        match self {
            Self::Continuous { .. } => None,
            Self::Discrete(points) => Some(points.len()),
            Self::Categorical(categories) => Some(
                categories
                    .iter()
                    .try_fold(1usize, |acc, &c| acc.checked_mul(c))
                    .unwrap_or(usize::MAX),
            ),
        }
    }

    /// Per-dimension `(min, span)` of the affine map to model coordinates.
    fn affine(&self) -> Vec<(f64, f64)> {
        let span = |lo: f64, hi: f64| if hi > lo { hi - lo } else { 1.0 };
        match self {
            Self::Continuous { lower, upper } => lower
                .iter()
                .zip(upper)
                .map(|(&lo, &hi)| (lo, span(lo, hi)))
                .collect(),
            Self::Discrete(points) => (0..self.dim())
                .map(|d| {
                    let lo = points.iter().map(|p| p[d]).fold(f64::INFINITY, f64::min);
                    let hi = points.iter().map(|p| p[d]).fold(f64::NEG_INFINITY, f64::max);
                    (lo, span(lo, hi))
                })
                .collect(),
            Self::Categorical(categories) => vec![(0.0, 1.0); categories.len()],
        }
    }

    /// User coordinates to model coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] on a length mismatch.
    pub fn to_model(&self, x: &[f64]) -> Result<Vec<f64>> {
        self.check_dim(x)?;
        Ok(x.iter()
            .zip(self.affine())
            .map(|(v, (lo, span))| (v - lo) / span)
            .collect())
    }

    /// Model coordinates to user coordinates.
    ///
    /// Categorical indices are rounded and discrete points snap to the
    /// nearest member of the set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] on a length mismatch.
    pub fn to_user(&self, x: &[f64]) -> Result<Vec<f64>> {
        self.check_dim(x)?;
        let user = x
            .iter()
            .zip(self.affine())
            .map(|(v, (lo, span))| lo + v * span);
        Ok(match self {
            Self::Continuous { .. } => user.collect(),
            Self::Categorical(_) => user.map(f64::round).collect(),
            Self::Discrete(points) => {
                let target: Vec<f64> = user.collect();
                let dist = |p: &[f64]| -> f64 {
                    p.iter().zip(&target).map(|(a, b)| (a - b).powi(2)).sum()
                };
                points
                    .iter()
                    .min_by(|a, b| dist(a).total_cmp(&dist(b)))
                    .cloned()
                    .unwrap_or(target)
            }
        })
    }

    fn check_dim(&self, x: &[f64]) -> Result<()> {
        if x.len() == self.dim() {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                expected: self.dim(),
                got: x.len(),
            })
        }
    }

    /// Box searched in model coordinates.
    #[must_use]
    pub fn model_bounds(&self) -> Vec<(f64, f64)> {
        match self {
            Self::Continuous { .. } | Self::Discrete(_) => vec![(0.0, 1.0); self.dim()],
            #[allow(clippy::cast_precision_loss)]
            Self::Categorical(categories) => categories
                .iter()
                .map(|&c| (0.0, (c - 1) as f64))
                .collect(),
        }
    }

    /// Every point of a finite domain, in model coordinates.
    ///
    /// Categorical grids are enumerated lazily in lexicographic order.
    #[must_use]
    pub fn candidates(&self) -> Option<Box<dyn Iterator<Item = Vec<f64>> + '_>> {
        match self {
            Self::Continuous { .. } => None,
            Self::Discrete(points) => {
                let affine = self.affine();
                Some(Box::new(points.iter().map(move |p| {
                    p.iter()
                        .zip(&affine)
                        .map(|(v, (lo, span))| (v - lo) / span)
                        .collect()
                })))
            }
            Self::Categorical(categories) => Some(Box::new(GridIter {
                categories,
                next: Some(vec![0; categories.len()]),
            })),
        }
    }

    /// A uniformly random point, in model coordinates.
    #[allow(clippy::cast_precision_loss)]
    pub fn random_point(&self, rng: &mut fastrand::Rng) -> Vec<f64> {
        match self {
            Self::Continuous { .. } => (0..self.dim()).map(|_| rng.f64()).collect(),
            Self::Discrete(points) => {
                let p = &points[rng.usize(..points.len())];
                self.to_model(p).unwrap_or_else(|_| p.clone())
            }
            Self::Categorical(categories) => {
                categories.iter().map(|&c| rng.usize(..c) as f64).collect()
            }
        }
    }
}

/// Mixed-radix counter over a categorical grid.
struct GridIter<'a> {
    categories: &'a [usize],
    next: Option<Vec<usize>>,
}

impl Iterator for GridIter<'_> {
    type Item = Vec<f64>;

    #[allow(clippy::cast_precision_loss)]
    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let mut succ = current.clone();
        for (digit, &radix) in succ.iter_mut().zip(self.categories).rev() {
            *digit += 1;
            if *digit < radix {
                self.next = Some(succ);
                break;
            }
            *digit = 0;
        }
        Some(current.iter().map(|&v| v as f64).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuous_round_trips_through_unit_cube() {
        let s = SearchSpace::continuous(&[(-5.0, 10.0), (0.0, 15.0)]).unwrap();
        let m = s.to_model(&[2.5, 15.0]).unwrap();
        assert_eq!(m, vec![0.5, 1.0]);
        assert_eq!(s.to_user(&m).unwrap(), vec![2.5, 15.0]);
    }

    #[test]
    fn empty_and_inverted_domains_are_rejected() {
        assert!(matches!(SearchSpace::unit(0), Err(Error::NoFeasiblePoint)));
        assert!(matches!(
            SearchSpace::continuous(&[(1.0, 0.0)]),
            Err(Error::InvalidBounds { .. })
        ));
        assert!(matches!(
            SearchSpace::discrete(Vec::new()),
            Err(Error::NoFeasiblePoint)
        ));
        assert!(matches!(
            SearchSpace::categorical(vec![3, 0]),
            Err(Error::NoFeasiblePoint)
        ));
        assert!(SearchSpace::discrete(vec![vec![1.0], vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn categorical_grid_enumerates_every_combination() {
        let s = SearchSpace::categorical(vec![2, 3]).unwrap();
        let all: Vec<_> = s.candidates().unwrap().collect();
        assert_eq!(all.len(), 6);
        assert_eq!(s.size(), Some(6));
        assert_eq!(all[0], vec![0.0, 0.0]);
        assert_eq!(all[5], vec![1.0, 2.0]);
    }

    #[test]
    fn discrete_points_map_into_their_bounding_box() {
        let s = SearchSpace::discrete(vec![vec![10.0, 1.0], vec![20.0, 1.0], vec![15.0, 1.0]])
            .unwrap();
        let all: Vec<_> = s.candidates().unwrap().collect();
        assert_eq!(all, vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.5, 0.0]]);
        assert_eq!(s.to_user(&all[2]).unwrap(), vec![15.0, 1.0]);
    }

    #[test]
    fn random_points_stay_in_domain() {
        let mut rng = fastrand::Rng::with_seed(8);
        let s = SearchSpace::categorical(vec![3, 4]).unwrap();
        for _ in 0..50 {
            let p = s.random_point(&mut rng);
            assert!(p[0] < 3.0 && p[1] < 4.0);
        }
    }
}
