//! Space-filling initial designs.
//!
//! Every design returns distinct points in model coordinates (see
//! [`SearchSpace`]). Continuous domains use the selected method; finite
//! domains draw without replacement.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::space::SearchSpace;

/// How the initial design is generated on continuous domains.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DesignMethod {
    /// One point per stratum and dimension.
    #[default]
    LatinHypercube,
    /// Independent uniform draws.
    Uniform,
    /// Scrambled Sobol sequence.
    #[cfg(feature = "sobol")]
    Sobol,
}

impl DesignMethod {
    /// Resolves `lhs`, `uniform` or `sobol`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownName`] for other names and
    /// [`Error::Configuration`] for `sobol` without the `sobol` feature.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "lhs" | "latin" | "latin_hypercube" => Ok(Self::LatinHypercube),
            "uniform" | "random" => Ok(Self::Uniform),
            #[cfg(feature = "sobol")]
            "sobol" => Ok(Self::Sobol),
            #[cfg(not(feature = "sobol"))]
            "sobol" => Err(Error::Configuration(
                "Sobol designs need the `sobol` feature".into(),
            )),
            _ => Err(Error::UnknownName {
                kind: "initial design",
                name: name.to_string(),
            }),
        }
    }

    /// Checks that the method can generate points for `space`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a Sobol design on a continuous
    /// space with more dimensions than the sequence provides.
    pub fn check(self, space: &SearchSpace) -> Result<()> {
        #[cfg(feature = "sobol")]
        {
            if self == Self::Sobol
                && matches!(space, SearchSpace::Continuous { .. })
                && space.dim() > SOBOL_MAX_DIM
            {
                return Err(Error::Configuration(format!(
                    "Sobol designs support at most {SOBOL_MAX_DIM} dimensions, got {}",
                    space.dim()
                )));
            }
        }
        #[cfg(not(feature = "sobol"))]
        let _ = (self, space);
        Ok(())
    }
}

/// Dimensions available from `sobol_burley`.
#[cfg(feature = "sobol")]
#[allow(clippy::unnecessary_cast)]
pub const SOBOL_MAX_DIM: usize = sobol_burley::NUM_DIMENSIONS as usize;

/// Generates `n` distinct points of `space`.
///
/// # Errors
///
/// Returns [`Error::Configuration`] when a finite domain has fewer than `n`
/// points or the method cannot cover the dimension (see [`DesignMethod::check`]).
pub fn initial_design(
    space: &SearchSpace,
    n: usize,
    method: DesignMethod,
    rng: &mut fastrand::Rng,
) -> Result<Vec<Vec<f64>>> {
    method.check(space)?;
    if let Some(size) = space.size() {
        if size < n {
            return Err(Error::Configuration(format!(
                "initial design of {n} points exceeds a domain of {size}"
            )));
        }
    }
    Ok(match space {
        SearchSpace::Continuous { .. } => match method {
            DesignMethod::LatinHypercube => latin_hypercube(space.dim(), n, rng),
            DesignMethod::Uniform => (0..n).map(|_| space.random_point(rng)).collect(),
            #[cfg(feature = "sobol")]
            DesignMethod::Sobol => sobol(space.dim(), n, rng),
        },
        SearchSpace::Discrete(points) => {
            let mut order: Vec<usize> = (0..points.len()).collect();
            rng.shuffle(&mut order);
            order
                .into_iter()
                .take(n)
                .map(|i| space.to_model(&points[i]))
                .collect::<Result<_>>()?
        }
        SearchSpace::Categorical(_) => distinct_random(space, n, rng),
    })
}

/// `x = (π_d(i) + u) / n` with an independent permutation `π_d` per dimension.
#[allow(clippy::cast_precision_loss)]
fn latin_hypercube(dim: usize, n: usize, rng: &mut fastrand::Rng) -> Vec<Vec<f64>> {
    let perms: Vec<Vec<usize>> = (0..dim)
        .map(|_| {
            let mut p: Vec<usize> = (0..n).collect();
            rng.shuffle(&mut p);
            p
        })
        .collect();
    (0..n)
        .map(|i| {
            perms
                .iter()
                .map(|p| (p[i] as f64 + rng.f64()) / n as f64)
                .collect()
        })
        .collect()
}

#[cfg(feature = "sobol")]
fn sobol(dim: usize, n: usize, rng: &mut fastrand::Rng) -> Vec<Vec<f64>> {
    let seed = rng.u32(..);
    (0..n)
        .map(|i| {
            (0..dim)
                .map(|d| {
                    #[allow(clippy::cast_possible_truncation)]
                    let (index, dim) = (i as u32, d as u32);
                    f64::from(sobol_burley::sample(index, dim, seed))
                })
                .collect()
        })
        .collect()
}

/// Rejection-samples distinct grid points; small grids are shuffled instead.
fn distinct_random(space: &SearchSpace, n: usize, rng: &mut fastrand::Rng) -> Vec<Vec<f64>> {
    const ENUMERATE_LIMIT: usize = 4096;
    let size = space.size().unwrap_or(usize::MAX);
    if size <= ENUMERATE_LIMIT {
        let mut all: Vec<Vec<f64>> = space.candidates().into_iter().flatten().collect();
        rng.shuffle(&mut all);
        all.truncate(n);
        return all;
    }
    let mut seen = HashSet::with_capacity(n);
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let p = space.random_point(rng);
        let key: Vec<u64> = p.iter().map(|v| v.to_bits()).collect();
        if seen.insert(key) {
            out.push(p);
        }
    }
    out
}
