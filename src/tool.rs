//! C3: Tool definitions and instances. Structurally analogous to
//! `virus.rs`, minus the death-triple (a tool has only attach/clear) and
//! with four multiplicative reducers instead of four probability channels.

use crate::agent::AgentId;
use crate::prob::Channel;
use crate::queue_effect::{QueueEffect, UNCHANGED_STATE};

pub type ToolDefId = usize;

/// The parametric template for a protective tool. All four reducers default
/// to `0.0` (no protection) per spec §6.
#[derive(Clone)]
pub struct ToolDef {
    pub name: String,
    pub sequence: Option<String>,
    pub reduces_susceptibility: Channel<ToolInstance>,
    pub reduces_transmission: Channel<ToolInstance>,
    pub reduces_recovery: Channel<ToolInstance>,
    pub reduces_death: Channel<ToolInstance>,
    pub prevalence: f64,

    pub state_on_attach: i32,
    pub state_on_clear: i32,
    pub queue_on_attach: QueueEffect,
    pub queue_on_clear: QueueEffect,
}

impl ToolDef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequence: None,
            reduces_susceptibility: Channel::Constant(0.0),
            reduces_transmission: Channel::Constant(0.0),
            reduces_recovery: Channel::Constant(0.0),
            reduces_death: Channel::Constant(0.0),
            prevalence: 0.0,
            state_on_attach: UNCHANGED_STATE,
            state_on_clear: UNCHANGED_STATE,
            queue_on_attach: QueueEffect::NoOne,
            queue_on_clear: QueueEffect::NoOne,
        }
    }

    #[must_use]
    pub fn with_prevalence(mut self, prevalence: f64) -> Self {
        self.prevalence = prevalence;
        self
    }

    #[must_use]
    pub fn with_reduces_susceptibility(mut self, channel: impl Into<Channel<ToolInstance>>) -> Self {
        self.reduces_susceptibility = channel.into();
        self
    }

    #[must_use]
    pub fn with_reduces_transmission(mut self, channel: impl Into<Channel<ToolInstance>>) -> Self {
        self.reduces_transmission = channel.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct ToolInstance {
    pub def_id: ToolDefId,
    pub registered_id: i32,
    pub sequence: Option<String>,
    pub date_acquired: i32,
    pub host: AgentId,
}

impl ToolInstance {
    #[must_use]
    pub fn new(def_id: ToolDefId, host: AgentId, date_acquired: i32) -> Self {
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
    fn default_reducers_are_zero() {
        let t = ToolDef::new("mask");
        assert!(matches!(t.reduces_susceptibility, Channel::Constant(v) if v == 0.0));
        assert!(matches!(t.reduces_transmission, Channel::Constant(v) if v == 0.0));
        assert!(matches!(t.reduces_recovery, Channel::Constant(v) if v == 0.0));
        assert!(matches!(t.reduces_death, Channel::Constant(v) if v == 0.0));
    }
}
