//! C7: the activation mask ("Queue" in spec terminology — renamed here to
//! avoid clashing with the event queue, C6).
//!
//! A dense per-agent counter: `mask[i]` is the number of agents in
//! `{i} ∪ neighbors(i)` currently hosting an active virus. Only agents with
//! `mask[i] > 0` need per-step evaluation when queueing is enabled (§4.7).

use crate::agent::AgentId;
use crate::error::EngineError;
use crate::queue_effect::QueueEffect;

#[derive(Debug, Clone)]
pub struct ActivationMask {
    counts: Vec<i64>,
    /// When `false`, every agent is considered active regardless of
    /// `counts` (spec invariant Q2).
    pub enabled: bool,
}

impl ActivationMask {
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            counts: vec![0; n],
            enabled: true,
        }
    }

    pub fn reset(&mut self, n: usize) {
        self.counts = vec![0; n];
    }

    #[must_use]
    pub fn is_active(&self, agent: AgentId) -> bool {
        !self.enabled || self.counts[agent] > 0
    }

    #[must_use]
    pub fn count(&self, agent: AgentId) -> i64 {
        self.counts[agent]
    }

    fn bump(&mut self, agent: AgentId, delta: i64) {
        self.counts[agent] += delta;
    }

    /// Applies a queue-effect code for `agent` attaching/detaching a virus,
    /// incrementing/decrementing `agent` and, for `Everyone`, every member
    /// of `neighbors` too.
    pub fn apply(
        &mut self,
        effect: QueueEffect,
        agent: AgentId,
        neighbors: &[AgentId],
    ) -> Result<(), EngineError> {
        let mut touched = vec![agent];
        match effect {
            QueueEffect::NoOne => {}
            QueueEffect::OnlySelf => self.bump(agent, 1),
            QueueEffect::Everyone => {
                self.bump(agent, 1);
                for &j in neighbors {
                    self.bump(j, 1);
                    touched.push(j);
                }
            }
            QueueEffect::NegOnlySelf => self.bump(agent, -1),
            QueueEffect::NegEveryone => {
                self.bump(agent, -1);
                for &j in neighbors {
                    self.bump(j, -1);
                    touched.push(j);
                }
            }
        }
        if let Some(&negative) = touched.iter().find(|&&i| self.counts[i] < 0) {
            return Err(EngineError::InvariantViolated(format!(
                "activation mask for agent {negative} went negative"
            )));
        }
        Ok(())
    }

    #[cfg(debug_assertions)]
    pub fn verify_non_negative(&self) -> Result<(), EngineError> {
        if self.counts.iter().any(|&c| c < 0) {
            return Err(EngineError::InvariantViolated(
                "activation mask has a negative entry".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_self_touches_one_agent() {
        let mut mask = ActivationMask::new(5);
        mask.apply(QueueEffect::OnlySelf, 2, &[0, 1]).unwrap();
        assert_eq!(mask.count(2), 1);
        assert_eq!(mask.count(0), 0);
        assert_eq!(mask.count(1), 0);
    }

    #[test]
    fn everyone_touches_self_and_neighbors() {
        let mut mask = ActivationMask::new(5);
        mask.apply(QueueEffect::Everyone, 2, &[0, 1]).unwrap();
        assert_eq!(mask.count(2), 1);
        assert_eq!(mask.count(0), 1);
        assert_eq!(mask.count(1), 1);
    }

    #[test]
    fn increment_then_decrement_returns_to_zero() {
        let mut mask = ActivationMask::new(5);
        mask.apply(QueueEffect::Everyone, 2, &[0, 1]).unwrap();
        mask.apply(QueueEffect::NegEveryone, 2, &[0, 1]).unwrap();
        assert_eq!(mask.count(0), 0);
        assert_eq!(mask.count(1), 0);
        assert_eq!(mask.count(2), 0);
    }

    #[test]
    fn disabled_mask_marks_everything_active() {
        let mut mask = ActivationMask::new(3);
        mask.enabled = false;
        assert!(mask.is_active(0));
        assert!(mask.is_active(1));
    }

    #[test]
    fn unmatched_decrement_is_rejected() {
        let mut mask = ActivationMask::new(3);
        assert!(mask.apply(QueueEffect::NegOnlySelf, 0, &[]).is_err());
    }

    #[test]
    fn unmatched_neighbor_decrement_is_rejected() {
        let mut mask = ActivationMask::new(3);
        mask.apply(QueueEffect::OnlySelf, 0, &[]).unwrap();
        assert!(mask.apply(QueueEffect::NegEveryone, 0, &[1]).is_err());
    }
}
