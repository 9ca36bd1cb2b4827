//! Exploration schedule for option selection.
use serde::{Deserialize, Serialize};

/// Exponentially decaying epsilon for epsilon-greedy option selection.
///
/// `eps(t) = eps_end + (eps_start - eps_end) * exp(-t / eps_decay)`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EpsilonSchedule {
    /// Value at `t = 0`.
    pub eps_start: f64,

    /// Asymptotic value for large `t`.
    pub eps_end: f64,

    /// Decay time constant in environment steps.
    pub eps_decay: f64,
}

impl Default for EpsilonSchedule {
    fn default() -> Self {
        Self {
            eps_start: 1.0,
            eps_end: 0.1,
            eps_decay: 20000.0,
        }
    }
}

impl EpsilonSchedule {
    /// Returns epsilon at environment step `t`.
    pub fn value(&self, t: usize) -> f64 {
        self.eps_end + (self.eps_start - self.eps_end) * (-(t as f64) / self.eps_decay).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let s = EpsilonSchedule::default();
        assert!((s.value(0) - 1.0).abs() < 1e-9);
        assert!((s.value(100_000_000) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_monotone_decay() {
        let s = EpsilonSchedule::default();
        let mut prev = s.value(0);
        for t in [100, 1_000, 10_000, 100_000] {
            let e = s.value(t);
            assert!(e < prev);
            assert!(e >= s.eps_end);
            prev = e;
        }
    }
}
