//! C6: the event queue.
//!
//! State updaters, global hooks, and distribution calls never mutate an
//! `Agent` directly — they push an `Event` here, and `Model::flush_events`
//! applies the whole current batch at one of the four explicit flush points
//! in §4.9's control flow. Per the redesign flag in DESIGN NOTES §9, an
//! `Event` carries a typed `EventKind` discriminant and payload rather than
//! a captured callable; the flush loop dispatches with a `match`.

use crate::agent::AgentId;
use crate::entity::EntityId;
use crate::queue_effect::{QueueEffect, UNCHANGED_STATE};
use crate::tool::ToolDefId;
use crate::virus::VirusDefId;

#[derive(Debug, Clone)]
pub enum EventKind {
    AddVirus { def_id: VirusDefId },
    RmVirus,
    RemoveAgentByVirus,
    AddTool { def_id: ToolDefId },
    /// Removes the tool instance at position `k` in the agent's tool list.
    RmTool { position: usize },
    AddEntity { entity: EntityId },
    RmEntity { entity: EntityId },
    ChangeState,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub agent: AgentId,
    pub kind: EventKind,
    /// `UNCHANGED_STATE` means "carry prior state / use the declared
    /// default", resolved at enqueue time against the attached object's
    /// declared default when the caller omitted an explicit value.
    pub new_state: i32,
    pub queue_effect: QueueEffect,
}

impl Event {
    #[must_use]
    pub fn new(agent: AgentId, kind: EventKind, new_state: i32, queue_effect: QueueEffect) -> Self {
        Self {
            agent,
            kind,
            new_state,
            queue_effect,
        }
    }
}

/// A model-owned growable buffer of not-yet-applied events. Flushing drains
/// exactly the events present at the moment of the flush call; anything
/// enqueued by a handler while it runs is left for the *next* explicit
/// flush, never applied within the same pass.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<Event>,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    #[must_use]
    pub fn nactions(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Takes the current batch out, leaving the queue empty for whatever is
    /// enqueued next.
    pub fn take_batch(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

#[must_use]
pub fn is_unchanged(state: i32) -> bool {
    state == UNCHANGED_STATE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_batch_empties_the_queue() {
        let mut q = EventQueue::new();
        q.push(Event::new(0, EventKind::RmVirus, UNCHANGED_STATE, QueueEffect::NoOne));
        q.push(Event::new(1, EventKind::ChangeState, 2, QueueEffect::OnlySelf));
        assert_eq!(q.nactions(), 2);
        let batch = q.take_batch();
        assert_eq!(batch.len(), 2);
        assert!(q.is_empty());
    }
}
