//! GP-Hedge portfolio (Hoffman, Brochu and de Freitas, 2011).
//!
//! Each iteration every member proposes its own optimum. One proposal is
//! chosen at random with probability `softmax(η·gains)`. After the
//! objective has been evaluated and the model refit, every member is
//! rewarded with the standardized negative posterior mean at its own
//! proposal (a posterior draw for `cHedgeRandom`).

use super::Criterion;
use crate::error::{Error, Result};
use crate::learning::Ensemble;

/// Upper limit of the adaptive learning rate.
const MAX_ETA: f64 = 10.0;

/// A bandit over member criteria.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hedge {
    members: Vec<Criterion>,
    gains: Vec<f64>,
    /// Fixed learning rate; `None` picks `min(10, √(2 ln K / spread))`.
    eta: Option<f64>,
    random: bool,
    candidates: Vec<Vec<f64>>,
    selected: Option<usize>,
}

impl Hedge {
    pub(super) fn new(members: Vec<Criterion>, random: bool) -> Result<Self> {
        if members.len() < 2 {
            return Err(Error::Configuration(
                "a hedge needs at least two member criteria".into(),
            ));
        }
        let n = members.len();
        Ok(Self {
            members,
            gains: vec![0.0; n],
            eta: None,
            random,
            candidates: Vec::new(),
            selected: None,
        })
    }

    /// Registered name of this portfolio kind.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        if self.random { "cHedgeRandom" } else { "cHedge" }
    }

    /// Member criteria.
    #[must_use]
    pub fn members(&self) -> &[Criterion] {
        &self.members
    }

    pub(super) fn members_mut(&mut self) -> &mut [Criterion] {
        &mut self.members
    }

    /// Cumulative gains per member.
    #[must_use]
    pub fn gains(&self) -> &[f64] {
        &self.gains
    }

    /// Index of the member whose proposal was used last.
    #[must_use]
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Uses a fixed learning rate instead of the adaptive one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] unless `eta` is positive and finite.
    pub fn set_eta(&mut self, eta: Option<f64>) -> Result<()> {
        if let Some(e) = eta {
            if !(e > 0.0 && e.is_finite()) {
                return Err(Error::Configuration(format!(
                    "hedge learning rate must be positive, got {e}"
                )));
            }
        }
        self.eta = eta;
        Ok(())
    }

    /// Current selection probabilities; they always sum to one.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn probabilities(&self) -> Vec<f64> {
        let max = self.gains.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = self.gains.iter().copied().fold(f64::INFINITY, f64::min);
        let spread = max - min;
        let eta = self.eta.unwrap_or_else(|| {
            if spread > 0.0 {
                (2.0 * (self.gains.len() as f64).ln() / spread)
                    .sqrt()
                    .min(MAX_ETA)
            } else {
                MAX_ETA
            }
        });
        let weights: Vec<f64> = self.gains.iter().map(|g| (eta * (g - max)).exp()).collect();
        let total: f64 = weights.iter().sum();
        if !(total > 0.0 && total.is_finite()) {
            return vec![1.0 / self.gains.len() as f64; self.gains.len()];
        }
        weights.into_iter().map(|w| w / total).collect()
    }

    /// Restores uniform probabilities and forgets pending proposals.
    pub fn reset(&mut self) {
        self.gains.iter_mut().for_each(|g| *g = 0.0);
        self.candidates.clear();
        self.selected = None;
        for m in &mut self.members {
            m.reset();
        }
    }

    /// Whether proposals from the last iteration still await their reward.
    #[must_use]
    pub fn has_pending_rewards(&self) -> bool {
        self.candidates.len() == self.members.len()
    }

    pub(crate) fn begin_portfolio(&mut self) {
        self.candidates.clear();
    }

    pub(crate) fn record_candidate(&mut self, point: Vec<f64>) {
        self.candidates.push(point);
    }

    /// Draws a member and returns its index and proposal.
    pub(crate) fn select(&mut self, rng: &mut fastrand::Rng) -> Result<(usize, Vec<f64>)> {
        if !self.has_pending_rewards() {
            return Err(Error::InvalidState(format!(
                "hedge has {} proposals for {} members",
                self.candidates.len(),
                self.members.len()
            )));
        }
        let probs = self.probabilities();
        let u = rng.f64();
        let mut acc = 0.0;
        let mut index = probs.len() - 1;
        for (i, p) in probs.iter().enumerate() {
            acc += p;
            if u < acc {
                index = i;
                break;
            }
        }
        self.selected = Some(index);
        trace_debug!(index, ?probs, "hedge selected member");
        Ok((index, self.candidates[index].clone()))
    }

    /// Rewards every member with the refit model's view of its proposal.
    pub(crate) fn reward(&mut self, model: &Ensemble, scale: f64, rng: &mut fastrand::Rng) -> Result<()> {
        if !self.has_pending_rewards() {
            return Ok(());
        }
        let scale = if scale > 0.0 && scale.is_finite() { scale } else { 1.0 };
        let mut rewards = Vec::with_capacity(self.candidates.len());
        for c in &self.candidates {
            let p = model.predict(c)?;
            let value = if self.random {
                p.sample(rng)
            } else {
                p.mean()
            };
            rewards.push(-value / scale);
        }
        let best = rewards.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        for (g, r) in self.gains.iter_mut().zip(&rewards) {
            *g += r - best;
        }
        self.candidates.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_distribution(weights: &[f64]) -> bool {
        (weights.iter().sum::<f64>() - 1.0).abs() < 1e-12 && weights.iter().all(|w| *w >= 0.0)
    }

    fn hedge() -> Hedge {
        let Criterion::Hedge(h) = Criterion::parse("cHedge(cEI,cLCB,cPOI)").unwrap() else {
            panic!("expected a hedge");
        };
        h
    }

    #[test]
    fn starts_uniform() {
        let h = hedge();
        let p = h.probabilities();
        assert!(is_distribution(&p));
        assert!(p.iter().all(|v| (v - 1.0 / 3.0).abs() < 1e-12));
    }

    #[test]
    fn probabilities_favour_larger_gains_and_reset_restores_uniform() {
        let mut h = hedge();
        h.gains = vec![0.0, -1.0, -3.0];
        let p = h.probabilities();
        assert!(is_distribution(&p));
        assert!(p[0] > p[1] && p[1] > p[2]);
        h.reset();
        assert!(h.probabilities().iter().all(|v| (v - 1.0 / 3.0).abs() < 1e-12));
    }

    #[test]
    fn fixed_eta_controls_sharpness() {
        let mut h = hedge();
        h.gains = vec![0.0, -1.0, -1.0];
        h.set_eta(Some(0.01)).unwrap();
        let flat = h.probabilities();
        h.set_eta(Some(5.0)).unwrap();
        let sharp = h.probabilities();
        assert!(sharp[0] > flat[0]);
        assert!(h.set_eta(Some(-1.0)).is_err());
    }

    #[test]
    fn selection_requires_every_proposal() {
        let mut h = hedge();
        let mut rng = fastrand::Rng::with_seed(4);
        h.begin_portfolio();
        h.record_candidate(vec![0.1]);
        assert!(h.select(&mut rng).is_err());
        h.record_candidate(vec![0.2]);
        h.record_candidate(vec![0.3]);
        let (i, x) = h.select(&mut rng).unwrap();
        assert_eq!(x, [[0.1], [0.2], [0.3]][i].to_vec());
        assert_eq!(h.selected(), Some(i));
    }

    #[test]
    fn hedge_needs_two_members() {
        assert!(Criterion::parse("cHedge(cEI)").is_err());
    }
}
