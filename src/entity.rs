//! Entity: a named group of agents, used for subpopulation/contact-matrix
//! mixing. Membership is a parallel pair of vectors — member ids on the
//! entity side, back-indices (the entity's position within each member's
//! own entity list) on the agent side — mirroring the Agent/neighbor
//! back-index scheme so that removal is O(1) and symmetric, per DESIGN
//! NOTES §9.

pub type EntityId = usize;
pub type AgentId = usize;

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    /// Member agent ids, in insertion order.
    members: Vec<AgentId>,
    /// `member_back_indices[k]` is this entity's position within
    /// `members[k]`'s own `entities` list.
    member_back_indices: Vec<usize>,
}

impl Entity {
    #[must_use]
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            members: Vec::new(),
            member_back_indices: Vec::new(),
        }
    }

    #[must_use]
    pub fn members(&self) -> &[AgentId] {
        &self.members
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Appends `agent` as a member and records `back_index` (the position
    /// this entity will occupy within the agent's own entity list).
    /// Returns the position assigned to `agent` within this entity's member
    /// list.
    pub fn push_member(&mut self, agent: AgentId, back_index: usize) -> usize {
        self.members.push(agent);
        self.member_back_indices.push(back_index);
        self.members.len() - 1
    }

    /// Removes the member at `pos` via swap-remove, returning the agent id
    /// that was removed and, if a different member was moved into `pos`,
    /// that member's id and its recorded back-index (so the caller can fix
    /// up the moved member's own back-index into this entity).
    pub fn swap_remove_member(
        &mut self,
        pos: usize,
    ) -> (AgentId, Option<(AgentId, usize)>) {
        let removed = self.members.swap_remove(pos);
        self.member_back_indices.swap_remove(pos);
        if pos < self.members.len() {
            let moved_agent = self.members[pos];
            let moved_back_index = self.member_back_indices[pos];
            (removed, Some((moved_agent, moved_back_index)))
        } else {
            (removed, None)
        }
    }

    /// Updates the back-index recorded for the member at `pos`, after a
    /// caller has moved that member elsewhere in its own `entities` list.
    pub fn set_member_back_index(&mut self, pos: usize, new_back_index: usize) {
        self.member_back_indices[pos] = new_back_index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_remove_keeps_back_indices_consistent() {
        let mut e = Entity::new(0, "school");
        e.push_member(10, 0);
        e.push_member(11, 0);
        e.push_member(12, 0);
        assert_eq!(e.members(), &[10, 11, 12]);

        let (removed, moved) = e.swap_remove_member(0);
        assert_eq!(removed, 10);
        // agent 12 was swapped into position 0
        assert_eq!(moved, Some((12, 0)));
        assert_eq!(e.members(), &[12, 11]);
    }

    #[test]
    fn removing_last_member_has_no_move() {
        let mut e = Entity::new(1, "solo");
        e.push_member(5, 0);
        let (removed, moved) = e.swap_remove_member(0);
        assert_eq!(removed, 5);
        assert_eq!(moved, None);
    }
}
