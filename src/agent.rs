//! C4: the Agent.
//!
//! Owns current/previous state, at most one active virus, an ordered set of
//! tools, a contact-graph neighbor list with back-indices (C2 lives inside
//! `Agent` rather than as a separate graph object, per spec §3), and entity
//! memberships with their own back-indices. Field mutation here is split in
//! two tiers:
//!
//! - low-level `pub(crate)` mutators (`push_neighbor`, `apply_set_virus`,
//!   ...) that the contact graph and the event-flush loop call directly;
//! - the public, event-enqueuing API (`Model::set_virus`, `Model::add_tool`,
//!   ...) that user code and state-update closures call, which never
//!   mutates an `Agent` in place — it only pushes an `Event`, per spec
//!   §4.4's "no in-place mutation during the updater body" rule.

use crate::entity::EntityId;
use crate::tool::ToolInstance;
use crate::virus::VirusInstance;

pub type AgentId = usize;

#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub state: u32,
    pub state_prev: u32,
    pub state_last_changed: i32,
    pub virus: Option<VirusInstance>,
    pub tools: Vec<ToolInstance>,
    pub neighbors: Vec<AgentId>,
    /// `neighbor_back_indices[k]` is this agent's position within
    /// `neighbors[k]`'s own neighbor list (invariant A1).
    pub neighbor_back_indices: Vec<usize>,
    pub entities: Vec<EntityId>,
    /// `entity_back_indices[k]` is this agent's position within
    /// `entities[k]`'s member list.
    pub entity_back_indices: Vec<usize>,
}

impl Agent {
    #[must_use]
    pub fn new(id: AgentId) -> Self {
        Self {
            id,
            state: 0,
            state_prev: 0,
            state_last_changed: -1,
            virus: None,
            tools: Vec::new(),
            neighbors: Vec::new(),
            neighbor_back_indices: Vec::new(),
            entities: Vec::new(),
            entity_back_indices: Vec::new(),
        }
    }

    /// Resets this agent to its initial, virus/tool/entity-free state with
    /// state `0`, as `Model::reset` requires. The contact graph (neighbors)
    /// is untouched — it is restored separately from the population
    /// backup.
    pub fn reset(&mut self) {
        self.state = 0;
        self.state_prev = 0;
        self.state_last_changed = -1;
        self.virus = None;
        self.tools.clear();
        self.entities.clear();
        self.entity_back_indices.clear();
    }

    #[must_use]
    pub fn has_virus(&self) -> bool {
        self.virus.is_some()
    }

    #[must_use]
    pub fn degree(&self) -> usize {
        self.neighbors.len()
    }

    /// Appends `neighbor` at `back_index` (the position this agent will
    /// occupy in `neighbor`'s own list). Returns the position assigned
    /// within this agent's neighbor list.
    pub(crate) fn push_neighbor(&mut self, neighbor: AgentId, back_index: usize) -> usize {
        self.neighbors.push(neighbor);
        self.neighbor_back_indices.push(back_index);
        self.neighbors.len() - 1
    }

    /// Swap-removes the neighbor at `pos`. Returns the removed neighbor id
    /// and, if a different neighbor was moved into `pos`, that neighbor's
    /// id plus its recorded back-index so the caller can fix up the moved
    /// neighbor's own back-index.
    pub(crate) fn swap_remove_neighbor(&mut self, pos: usize) -> (AgentId, Option<(AgentId, usize)>) {
        let removed = self.neighbors.swap_remove(pos);
        self.neighbor_back_indices.swap_remove(pos);
        if pos < self.neighbors.len() {
            let moved = self.neighbors[pos];
            let moved_back_index = self.neighbor_back_indices[pos];
            (removed, Some((moved, moved_back_index)))
        } else {
            (removed, None)
        }
    }

    pub(crate) fn push_entity(&mut self, entity: EntityId, back_index: usize) -> usize {
        self.entities.push(entity);
        self.entity_back_indices.push(back_index);
        self.entities.len() - 1
    }

    pub(crate) fn swap_remove_entity(&mut self, pos: usize) -> (EntityId, Option<(EntityId, usize)>) {
        let removed = self.entities.swap_remove(pos);
        self.entity_back_indices.swap_remove(pos);
        if pos < self.entities.len() {
            let moved = self.entities[pos];
            let moved_back_index = self.entity_back_indices[pos];
            (removed, Some((moved, moved_back_index)))
        } else {
            (removed, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbor_swap_remove_updates_back_index_target() {
        let mut a = Agent::new(0);
        a.push_neighbor(1, 0);
        a.push_neighbor(2, 0);
        a.push_neighbor(3, 0);
        let (removed, moved) = a.swap_remove_neighbor(0);
        assert_eq!(removed, 1);
        assert_eq!(moved, Some((3, 0)));
        assert_eq!(a.neighbors, vec![3, 2]);
    }

    #[test]
    fn reset_clears_virus_tools_entities_but_not_neighbors() {
        let mut a = Agent::new(0);
        a.push_neighbor(5, 0);
        a.virus = Some(VirusInstance::new(0, 0, 3));
        a.tools.push(ToolInstance::new(0, 0, 3));
        a.push_entity(2, 0);
        a.state = 4;

        a.reset();

        assert_eq!(a.state, 0);
        assert!(a.virus.is_none());
        assert!(a.tools.is_empty());
        assert!(a.entities.is_empty());
        assert_eq!(a.neighbors, vec![5]);
    }
}
