//! C3: Virus definitions and instances.
//!
//! A `VirusDef` is the parametric template registered with the `Model`; a
//! `VirusInstance` is the copy attached to one agent, addressed by the
//! agent through a definition id (`VirusDefId`) rather than a shared pointer
//! with a back-pointer to its host, per the handle-based redesign in DESIGN
//! NOTES §9. This sidesteps reference cycles and pointer invalidation when
//! the agent vector grows.

use crate::agent::{Agent, AgentId};
use crate::prob::Channel;
use crate::queue_effect::{QueueEffect, UNCHANGED_STATE};
use std::sync::Arc;

pub type VirusDefId = usize;

/// The parametric template for a virus, registered once with the `Model`
/// via `Model::add_virus`. Default parameter values follow spec §6:
/// `prob_infecting` 1.0, `prob_recovery` ≈0.1428, `prob_death` 0.0,
/// `incubation` 7.0 days.
#[derive(Clone)]
pub struct VirusDef {
    pub name: String,
    /// Genomic sequence label; feeds `virus_info.csv`'s `sequence` column.
    /// `None` until the definition acquires one via registration or
    /// mutation.
    pub sequence: Option<String>,
    pub prob_infecting: Channel<VirusInstance>,
    pub prob_recovery: Channel<VirusInstance>,
    pub prob_death: Channel<VirusInstance>,
    pub incubation_days: Channel<VirusInstance>,
    /// Called once per agent per day for agents carrying this virus;
    /// returning `true` signals the database to register a new variant and
    /// bump the holder's registered virus id.
    pub mutation: Option<Arc<dyn Fn(&Agent, &VirusInstance) -> bool + Send + Sync>>,
    /// Runs immediately after this virus clears on an agent; may return a
    /// tool definition id to attach (e.g. permanent immunity).
    pub post_recovery: Option<Arc<dyn Fn(&Agent, &VirusInstance) -> Option<usize> + Send + Sync>>,
    /// Initial-prevalence distributor, invoked once per virus during
    /// `Model::reset` (§4.9 step 1).
    pub prevalence: f64,

    pub state_on_attach: i32,
    pub state_on_clear: i32,
    pub state_on_host_removal: i32,
    pub queue_on_attach: QueueEffect,
    pub queue_on_clear: QueueEffect,
    pub queue_on_host_removal: QueueEffect,
}

impl VirusDef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequence: None,
            prob_infecting: Channel::Constant(1.0),
            prob_recovery: Channel::Constant(0.1428),
            prob_death: Channel::Constant(0.0),
            incubation_days: Channel::Constant(7.0),
            mutation: None,
            post_recovery: None,
            prevalence: 0.0,
            state_on_attach: UNCHANGED_STATE,
            state_on_clear: UNCHANGED_STATE,
            state_on_host_removal: UNCHANGED_STATE,
            queue_on_attach: QueueEffect::Everyone,
            queue_on_clear: QueueEffect::NegEveryone,
            queue_on_host_removal: QueueEffect::NegEveryone,
        }
    }

    #[must_use]
    pub fn with_prevalence(mut self, prevalence: f64) -> Self {
        self.prevalence = prevalence;
        self
    }

    #[must_use]
    pub fn with_states(mut self, on_attach: i32, on_clear: i32, on_host_removal: i32) -> Self {
        self.state_on_attach = on_attach;
        self.state_on_clear = on_clear;
        self.state_on_host_removal = on_host_removal;
        self
    }

    #[must_use]
    pub fn with_prob_infecting(mut self, channel: impl Into<Channel<VirusInstance>>) -> Self {
        self.prob_infecting = channel.into();
        self
    }

    #[must_use]
    pub fn with_prob_recovery(mut self, channel: impl Into<Channel<VirusInstance>>) -> Self {
        self.prob_recovery = channel.into();
        self
    }

    #[must_use]
    pub fn with_prob_death(mut self, channel: impl Into<Channel<VirusInstance>>) -> Self {
        self.prob_death = channel.into();
        self
    }
}

/// The copy of a `VirusDef` attached to one agent. Invariant V2: while
/// attached, `host` equals the id of the agent carrying this instance.
#[derive(Debug, Clone)]
pub struct VirusInstance {
    pub def_id: VirusDefId,
    /// DB-registered id; `-1` until the database assigns one, per
    /// invariant V1's sibling rule for virus instances (spec §3).
    pub registered_id: i32,
    pub sequence: Option<String>,
    pub date_acquired: i32,
    pub host: AgentId,
}

impl VirusInstance {
    #[must_use]
    pub fn new(def_id: VirusDefId, host: AgentId, date_acquired: i32) -> Self {
        Self {
            def_id,
            registered_id: -1,
            sequence: None,
            date_acquired,
            host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_match_spec() {
        let v = VirusDef::new("v");
        assert!(matches!(v.prob_infecting, Channel::Constant(p) if (p - 1.0).abs() < 1e-12));
        assert!(matches!(v.prob_recovery, Channel::Constant(p) if (p - 0.1428).abs() < 1e-12));
        assert!(matches!(v.prob_death, Channel::Constant(p) if p == 0.0));
        assert!(matches!(v.incubation_days, Channel::Constant(d) if d == 7.0));
    }

    #[test]
    fn unregistered_instance_has_sentinel_id() {
        let inst = VirusInstance::new(0, 3, 5);
        assert_eq!(inst.registered_id, -1);
        assert_eq!(inst.host, 3);
        assert_eq!(inst.date_acquired, 5);
    }
}
