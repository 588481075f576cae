//! Append-only store of observed samples.

use crate::error::{Error, Result};

/// An observed `(input, output)` pair.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    /// Input vector in model space.
    pub x: Vec<f64>,
    /// Observed objective value.
    pub y: f64,
}

/// Ordered store of samples with best/worst aggregates kept up to date.
///
/// Samples are appended in arrival order and never removed. The indices of
/// the lowest and highest outputs are updated in O(1) on every append, so
/// `get_sample(min_index()).y` is never greater than any stored output.
///
/// # Examples
///
/// ```
/// use smbo::Dataset;
///
/// let mut data = Dataset::new(1);
/// data.add_sample(vec![0.2], 3.0)?;
/// data.add_sample(vec![0.8], -1.0)?;
/// assert_eq!(data.min_index(), Some(1));
/// assert_eq!(data.max_index(), Some(0));
/// # Ok::<(), smbo::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    dim: usize,
    samples: Vec<Sample>,
    min_index: Option<usize>,
    max_index: Option<usize>,
}

impl Dataset {
    /// Creates an empty dataset for inputs of dimension `dim`.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            samples: Vec::new(),
            min_index: None,
            max_index: None,
        }
    }

    /// Rebuilds a dataset from samples in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if any sample has the wrong dimension.
    pub fn from_samples(dim: usize, samples: impl IntoIterator<Item = Sample>) -> Result<Self> {
        let mut data = Self::new(dim);
        for s in samples {
            data.add_sample(s.x, s.y)?;
        }
        Ok(data)
    }

    /// Appends a sample and updates the aggregates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `x.len()` differs from the
    /// configured dimension.
    pub fn add_sample(&mut self, x: Vec<f64>, y: f64) -> Result<()> {
        if x.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                got: x.len(),
            });
        }
        let index = self.samples.len();
        match self.min_index {
            Some(i) if self.samples[i].y <= y => {}
            _ => self.min_index = Some(index),
        }
        match self.max_index {
            Some(i) if self.samples[i].y >= y => {}
            _ => self.max_index = Some(index),
        }
        self.samples.push(Sample { x, y });
        Ok(())
    }

    /// Number of stored samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample has been stored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Input dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The sample at position `i`, in arrival order.
    #[must_use]
    pub fn get_sample(&self, i: usize) -> Option<&Sample> {
        self.samples.get(i)
    }

    /// All samples in arrival order.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Index of the sample with the lowest output.
    #[must_use]
    pub fn min_index(&self) -> Option<usize> {
        self.min_index
    }

    /// Index of the sample with the highest output.
    #[must_use]
    pub fn max_index(&self) -> Option<usize> {
        self.max_index
    }

    /// The sample with the lowest output.
    #[must_use]
    pub fn best(&self) -> Option<&Sample> {
        self.min_index.map(|i| &self.samples[i])
    }

    /// The sample with the highest output.
    #[must_use]
    pub fn worst(&self) -> Option<&Sample> {
        self.max_index.map(|i| &self.samples[i])
    }

    /// The most recent sample.
    #[must_use]
    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Outputs in arrival order.
    pub fn outputs(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.y)
    }

    /// A copy without the sample at `skip`, used for leave-one-out scoring.
    pub(crate) fn without(&self, skip: usize) -> Self {
        let mut data = Self::new(self.dim);
        for (i, s) in self.samples.iter().enumerate() {
            if i != skip {
                // Dimensions were validated on insertion.
                let _ = data.add_sample(s.x.clone(), s.y);
            }
        }
        data
    }
}
