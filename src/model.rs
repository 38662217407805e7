//! C9: the Model driver.
//!
//! Owns every other component, runs the main per-day loop (§4.9), and
//! drives replicated runs. Per DESIGN NOTES §9, there is exactly one
//! concrete `Model`; what would have been subclasses (`ModelSIR`,
//! `ModelSEIR`, ...) are instead `ModelConfig` descriptors — state-update
//! closures, global hooks, a mixer, and a distribution hook — that a
//! prepackaged-model factory builds and hands to `Model::new`.

use crate::activation::ActivationMask;
use crate::agent::{Agent, AgentId};
use crate::database::Database;
use crate::entity::{Entity, EntityId};
use crate::error::EngineError;
use crate::event::{Event, EventKind, EventQueue};
use crate::graph;
use crate::mixer::{ComplementProductMixer, Mixer};
use crate::queue_effect::{QueueEffect, UNCHANGED_STATE};
use crate::rng::Rng;
use crate::tool::{ToolDef, ToolDefId, ToolInstance};
use crate::virus::{VirusDef, VirusDefId, VirusInstance};
use std::sync::Arc;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, EngineError>;

pub type StateUpdater = Arc<dyn Fn(&mut Model, AgentId) -> Result<()> + Send + Sync>;
pub type GlobalHookFn = Arc<dyn Fn(&mut Model) -> Result<()> + Send + Sync>;
pub type InitialPlacementFn = Arc<dyn Fn(&mut Model) -> Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct GlobalHook {
    pub name: &'static str,
    /// The day this hook fires, or `-1` to fire every day (§4.9).
    pub day: i32,
    pub run: GlobalHookFn,
}

/// The descriptor that replaces per-disease `Model` subclasses (DESIGN
/// NOTES §9): one state-update closure per state id, a list of global
/// hooks, a mixer, and an optional initial-placement function run once
/// during `reset`.
#[derive(Clone)]
pub struct ModelConfig {
    pub nstates: usize,
    pub updaters: Vec<Option<StateUpdater>>,
    pub hooks: Vec<GlobalHook>,
    pub mixer: Arc<dyn Mixer>,
    pub initial_placement: Option<InitialPlacementFn>,
    pub directed: bool,
    pub queueing_enabled: bool,
}

impl ModelConfig {
    #[must_use]
    pub fn new(nstates: usize) -> Self {
        Self {
            nstates,
            updaters: vec![None; nstates],
            hooks: Vec::new(),
            mixer: Arc::new(ComplementProductMixer),
            initial_placement: None,
            directed: false,
            queueing_enabled: true,
        }
    }

    pub fn set_updater(&mut self, state: u32, updater: StateUpdater) {
        self.updaters[state as usize] = Some(updater);
    }

    pub fn add_hook(&mut self, name: &'static str, day: i32, run: GlobalHookFn) {
        self.hooks.push(GlobalHook { name, day, run });
    }
}

#[derive(Clone)]
struct PopulationBackup {
    agents: Vec<Agent>,
    entities: Vec<Entity>,
}

/// A rewire policy applied once per day, after global hooks, before
/// recording (§4.9 step 2d).
#[derive(Clone, Copy, Debug)]
pub struct RewirePolicy {
    pub proportion: f64,
}

#[derive(Clone)]
pub struct Model {
    pub config: ModelConfig,
    pub agents: Vec<Agent>,
    pub entities: Vec<Entity>,
    pub virus_defs: Vec<VirusDef>,
    pub tool_defs: Vec<ToolDef>,
    pub db: Database,
    pub mask: ActivationMask,
    pub rng: Rng,
    pub today: i32,
    pub rewire_policy: Option<RewirePolicy>,
    param_table: Vec<f64>,
    event_queue: EventQueue,
    backup: Option<PopulationBackup>,
    /// Caches the DB-registered id assigned to each virus/tool *definition*
    /// the first time it is attached to any agent, so that every agent
    /// carrying the unmutated baseline shares one registered id (spec §3:
    /// "re-registered with the DB if their content differs from the defined
    /// baseline" — mutation is the only thing that earns a new id;
    /// attachment of the baseline never does).
    virus_def_registered: Vec<Option<crate::database::RegisteredId>>,
    tool_def_registered: Vec<Option<crate::database::RegisteredId>>,
}

impl Model {
    #[must_use]
    pub fn new(n_agents: usize, config: ModelConfig) -> Self {
        let nstates = config.nstates;
        Self {
            agents: (0..n_agents).map(Agent::new).collect(),
            entities: Vec::new(),
            virus_defs: Vec::new(),
            tool_defs: Vec::new(),
            db: Database::new(nstates),
            mask: ActivationMask::new(n_agents),
            rng: Rng::new(0),
            today: -1,
            rewire_policy: None,
            param_table: Vec::new(),
            event_queue: EventQueue::new(),
            backup: None,
            virus_def_registered: Vec::new(),
            tool_def_registered: Vec::new(),
            config,
        }
    }

    #[must_use]
    pub fn n_agents(&self) -> usize {
        self.agents.len()
    }

    // ---- parameter table (DESIGN NOTES §9's `Channel::Param`) ----

    pub fn set_param(&mut self, id: crate::prob::ParamId, value: f64) {
        if id >= self.param_table.len() {
            self.param_table.resize(id + 1, 0.0);
        }
        self.param_table[id] = value;
    }

    #[must_use]
    pub fn param(&self, id: crate::prob::ParamId) -> f64 {
        self.param_table.get(id).copied().unwrap_or(0.0)
    }

    // ---- setup ----

    pub fn add_virus_def(&mut self, def: VirusDef) -> VirusDefId {
        self.virus_defs.push(def);
        self.virus_def_registered.push(None);
        self.virus_defs.len() - 1
    }

    pub fn add_tool_def(&mut self, def: ToolDef) -> ToolDefId {
        self.tool_defs.push(def);
        self.tool_def_registered.push(None);
        self.tool_defs.len() - 1
    }

    pub fn add_entity_def(&mut self, name: impl Into<String>) -> EntityId {
        let id = self.entities.len();
        self.entities.push(Entity::new(id, name));
        id
    }

    /// Assigns `agent` to `entity` at population-setup time (direct
    /// mutation, not an enqueued `Event` — entity assignment during a
    /// running replicate goes through `Model::add_entity` instead).
    pub fn assign_agent_to_entity(&mut self, agent: AgentId, entity: EntityId) -> Result<()> {
        if agent >= self.agents.len() {
            return Err(EngineError::OutOfRange(format!("agent {agent} not registered")));
        }
        if entity >= self.entities.len() {
            return Err(EngineError::OutOfRange(format!("entity {entity} not registered")));
        }
        let back_index = self.agents[agent].entities.len();
        let pos = self.entities[entity].push_member(agent, back_index);
        self.agents[agent].push_entity(entity, pos);
        Ok(())
    }

    pub fn build_graph(&mut self, sources: &[AgentId], targets: &[AgentId], directed: bool) -> Result<()> {
        graph::build_from_edges(&mut self.agents, sources, targets, directed)?;
        self.config.directed = directed;
        Ok(())
    }

    fn ensure_backup(&mut self) {
        if self.backup.is_none() {
            self.backup = Some(PopulationBackup {
                agents: self.agents.clone(),
                entities: self.entities.clone(),
            });
        }
    }

    // ---- enqueue-style agent API (spec §4.4) ----

    pub fn set_virus(
        &mut self,
        agent: AgentId,
        def_id: VirusDefId,
        new_state: Option<i32>,
        queue: Option<QueueEffect>,
    ) -> Result<()> {
        let def = self
            .virus_defs
            .get(def_id)
            .ok_or_else(|| EngineError::OutOfRange(format!("virus def {def_id} not registered")))?;
        let new_state = new_state.unwrap_or(def.state_on_attach);
        let queue = queue.unwrap_or(def.queue_on_attach);
        self.event_queue.push(Event::new(
            agent,
            EventKind::AddVirus { def_id },
            new_state,
            queue,
        ));
        Ok(())
    }

    pub fn rm_virus(&mut self, agent: AgentId, new_state: Option<i32>, queue: Option<QueueEffect>) -> Result<()> {
        let (new_state, queue) = self.virus_clear_defaults(agent, new_state, queue)?;
        self.event_queue
            .push(Event::new(agent, EventKind::RmVirus, new_state, queue));
        Ok(())
    }

    pub fn rm_agent_by_virus(
        &mut self,
        agent: AgentId,
        new_state: Option<i32>,
        queue: Option<QueueEffect>,
    ) -> Result<()> {
        let def_id = self.agents[agent]
            .virus
            .as_ref()
            .ok_or_else(|| EngineError::LogicError(format!("agent {agent} carries no virus")))?
            .def_id;
        let def = &self.virus_defs[def_id];
        let new_state = new_state.unwrap_or(def.state_on_host_removal);
        let queue = queue.unwrap_or(def.queue_on_host_removal);
        self.event_queue.push(Event::new(
            agent,
            EventKind::RemoveAgentByVirus,
            new_state,
            queue,
        ));
        Ok(())
    }

    fn virus_clear_defaults(
        &self,
        agent: AgentId,
        new_state: Option<i32>,
        queue: Option<QueueEffect>,
    ) -> Result<(i32, QueueEffect)> {
        let def_id = self.agents[agent]
            .virus
            .as_ref()
            .ok_or_else(|| EngineError::LogicError(format!("agent {agent} carries no virus")))?
            .def_id;
        let def = &self.virus_defs[def_id];
        Ok((
            new_state.unwrap_or(def.state_on_clear),
            queue.unwrap_or(def.queue_on_clear),
        ))
    }

    pub fn add_tool(
        &mut self,
        agent: AgentId,
        def_id: ToolDefId,
        new_state: Option<i32>,
        queue: Option<QueueEffect>,
    ) -> Result<()> {
        let def = self
            .tool_defs
            .get(def_id)
            .ok_or_else(|| EngineError::OutOfRange(format!("tool def {def_id} not registered")))?;
        let new_state = new_state.unwrap_or(def.state_on_attach);
        let queue = queue.unwrap_or(def.queue_on_attach);
        self.event_queue
            .push(Event::new(agent, EventKind::AddTool { def_id }, new_state, queue));
        Ok(())
    }

    pub fn rm_tool(
        &mut self,
        agent: AgentId,
        position: usize,
        new_state: Option<i32>,
        queue: Option<QueueEffect>,
    ) -> Result<()> {
        let inst = self
            .agents
            .get(agent)
            .and_then(|a| a.tools.get(position))
            .ok_or_else(|| {
                EngineError::OutOfRange(format!("agent {agent} has no tool at position {position}"))
            })?;
        let def = &self.tool_defs[inst.def_id];
        let new_state = new_state.unwrap_or(def.state_on_clear);
        let queue = queue.unwrap_or(def.queue_on_clear);
        self.event_queue.push(Event::new(
            agent,
            EventKind::RmTool { position },
            new_state,
            queue,
        ));
        Ok(())
    }

    pub fn add_entity(&mut self, agent: AgentId, entity: EntityId) -> Result<()> {
        self.event_queue.push(Event::new(
            agent,
            EventKind::AddEntity { entity },
            UNCHANGED_STATE,
            QueueEffect::NoOne,
        ));
        Ok(())
    }

    pub fn rm_entity(&mut self, agent: AgentId, entity: EntityId) -> Result<()> {
        self.event_queue.push(Event::new(
            agent,
            EventKind::RmEntity { entity },
            UNCHANGED_STATE,
            QueueEffect::NoOne,
        ));
        Ok(())
    }

    pub fn change_state(&mut self, agent: AgentId, state: u32, queue: Option<QueueEffect>) -> Result<()> {
        self.event_queue.push(Event::new(
            agent,
            EventKind::ChangeState,
            state as i32,
            queue.unwrap_or(QueueEffect::NoOne),
        ));
        Ok(())
    }

    // ---- flush (§4.6) ----

    /// Applies the current batch of events in submission order. Anything a
    /// handler enqueues while this call runs is left for the next explicit
    /// flush (handlers here only mutate fields directly; they never call
    /// the enqueue-style API above).
    pub fn flush_events(&mut self) -> Result<()> {
        let _span = crate::profiling::open_span("flush_events");
        let batch = self.event_queue.take_batch();
        for event in batch {
            self.apply_event(event)?;
        }
        Ok(())
    }

    fn apply_event(&mut self, event: Event) -> Result<()> {
        if event.new_state != UNCHANGED_STATE && event.new_state as usize >= self.config.nstates {
            return Err(EngineError::InvalidState(format!(
                "state {} outside [0,{})",
                event.new_state, self.config.nstates
            )));
        }
        match event.kind {
            EventKind::AddVirus { def_id } => self.apply_add_virus(event.agent, def_id, event.new_state, event.queue_effect),
            EventKind::RmVirus => self.apply_rm_virus(event.agent, event.new_state, event.queue_effect),
            EventKind::RemoveAgentByVirus => {
                self.apply_rm_virus(event.agent, event.new_state, event.queue_effect)
            }
            EventKind::AddTool { def_id } => self.apply_add_tool(event.agent, def_id, event.new_state, event.queue_effect),
            EventKind::RmTool { position } => {
                self.apply_rm_tool(event.agent, position, event.new_state, event.queue_effect)
            }
            EventKind::AddEntity { entity } => self.apply_add_entity(event.agent, entity),
            EventKind::RmEntity { entity } => self.apply_rm_entity(event.agent, entity),
            EventKind::ChangeState => self.apply_change_state(event.agent, event.new_state),
        }
    }

    /// Moves `agent` from its current state to `new_state`, collapsing
    /// multiple same-day moves into a single edge from the start-of-day
    /// state (§4.6 step 1, §4.8).
    fn apply_change_state(&mut self, agent: AgentId, new_state: i32) -> Result<()> {
        if new_state == UNCHANGED_STATE {
            return Ok(());
        }
        let new_state = new_state as u32;
        let today = self.today;
        let old_state = self.agents[agent].state;
        if new_state == old_state {
            return Ok(());
        }

        let from_of_day = if self.agents[agent].state_last_changed == today {
            let from = self.agents[agent].state_prev;
            self.db.undo_transition(from, old_state);
            from
        } else {
            self.agents[agent].state_prev = old_state;
            old_state
        };

        self.db.note_state(old_state, -1);
        self.db.note_state(new_state, 1);
        if let Some(v) = self.agents[agent].virus.clone() {
            self.db.note_virus_state(v.registered_id, old_state, -1);
            self.db.note_virus_state(v.registered_id, new_state, 1);
        }
        for t in self.agents[agent].tools.clone() {
            self.db.note_tool_state(t.registered_id, old_state, -1);
            self.db.note_tool_state(t.registered_id, new_state, 1);
        }
        self.db.record_transition(from_of_day, new_state);

        self.agents[agent].state = new_state;
        self.agents[agent].state_last_changed = today;
        Ok(())
    }

    fn apply_add_virus(
        &mut self,
        agent: AgentId,
        def_id: VirusDefId,
        new_state: i32,
        queue_effect: QueueEffect,
    ) -> Result<()> {
        let def = self
            .virus_defs
            .get(def_id)
            .ok_or_else(|| EngineError::OutOfRange(format!("virus def {def_id} not registered")))?
            .clone();
        let today = self.today;
        let registered_id = match self.virus_def_registered[def_id] {
            Some(id) => id,
            None => {
                let id = self.db.register_virus(def.name.clone(), def.sequence.clone(), today, -1);
                self.virus_def_registered[def_id] = Some(id);
                id
            }
        };
        let mut instance = VirusInstance::new(def_id, agent, today);
        instance.registered_id = registered_id;
        instance.sequence = def.sequence.clone();
        self.agents[agent].virus = Some(instance);

        let state = self.agents[agent].state;
        self.db.note_virus_state(registered_id, state, 1);

        let neighbors = self.agents[agent].neighbors.clone();
        self.mask.apply(queue_effect, agent, &neighbors)?;

        if new_state != UNCHANGED_STATE {
            self.apply_change_state(agent, new_state)?;
        }
        Ok(())
    }

    fn apply_rm_virus(&mut self, agent: AgentId, new_state: i32, queue_effect: QueueEffect) -> Result<()> {
        let Some(instance) = self.agents[agent].virus.take() else {
            return Ok(());
        };
        let state = self.agents[agent].state;
        self.db.note_virus_state(instance.registered_id, state, -1);

        let neighbors = self.agents[agent].neighbors.clone();
        self.mask.apply(queue_effect, agent, &neighbors)?;

        if new_state != UNCHANGED_STATE {
            self.apply_change_state(agent, new_state)?;
        }

        let def = self.virus_defs[instance.def_id].clone();
        if let Some(post) = def.post_recovery.as_ref() {
            if let Some(tool_def_id) = post(&self.agents[agent], &instance) {
                self.apply_add_tool(agent, tool_def_id, UNCHANGED_STATE, QueueEffect::NoOne)?;
            }
        }
        Ok(())
    }

    fn apply_add_tool(
        &mut self,
        agent: AgentId,
        def_id: ToolDefId,
        new_state: i32,
        queue_effect: QueueEffect,
    ) -> Result<()> {
        let def = self
            .tool_defs
            .get(def_id)
            .ok_or_else(|| EngineError::OutOfRange(format!("tool def {def_id} not registered")))?
            .clone();
        let today = self.today;
        let registered_id = match self.tool_def_registered[def_id] {
            Some(id) => id,
            None => {
                let id = self.db.register_tool(def.name.clone(), def.sequence.clone(), today);
                self.tool_def_registered[def_id] = Some(id);
                id
            }
        };
        let mut instance = ToolInstance::new(def_id, agent, today);
        instance.registered_id = registered_id;
        instance.sequence = def.sequence.clone();
        self.agents[agent].tools.push(instance);

        let state = self.agents[agent].state;
        self.db.note_tool_state(registered_id, state, 1);

        let neighbors = self.agents[agent].neighbors.clone();
        self.mask.apply(queue_effect, agent, &neighbors)?;

        if new_state != UNCHANGED_STATE {
            self.apply_change_state(agent, new_state)?;
        }
        Ok(())
    }

    fn apply_rm_tool(
        &mut self,
        agent: AgentId,
        position: usize,
        new_state: i32,
        queue_effect: QueueEffect,
    ) -> Result<()> {
        if position >= self.agents[agent].tools.len() {
            return Err(EngineError::InvariantViolated(format!(
                "agent {agent} has no tool at position {position}"
            )));
        }
        let instance = self.agents[agent].tools.remove(position);
        let state = self.agents[agent].state;
        self.db.note_tool_state(instance.registered_id, state, -1);

        let neighbors = self.agents[agent].neighbors.clone();
        self.mask.apply(queue_effect, agent, &neighbors)?;

        if new_state != UNCHANGED_STATE {
            self.apply_change_state(agent, new_state)?;
        }
        Ok(())
    }

    fn apply_add_entity(&mut self, agent: AgentId, entity: EntityId) -> Result<()> {
        if entity >= self.entities.len() {
            return Err(EngineError::OutOfRange(format!("entity {entity} not registered")));
        }
        let back_index = self.agents[agent].entities.len();
        let pos = self.entities[entity].push_member(agent, back_index);
        self.agents[agent].push_entity(entity, pos);
        Ok(())
    }

    fn apply_rm_entity(&mut self, agent: AgentId, entity: EntityId) -> Result<()> {
        if entity >= self.entities.len() {
            return Err(EngineError::OutOfRange(format!("entity {entity} not registered")));
        }
        let Some(agent_slot) = self.agents[agent].entities.iter().position(|&e| e == entity) else {
            return Err(EngineError::InvariantViolated(format!(
                "agent {agent} does not hold entity {entity}"
            )));
        };
        let entity_slot = self.agents[agent].entity_back_indices[agent_slot];

        let (removed_agent, moved_in_entity) = self.entities[entity].swap_remove_member(entity_slot);
        debug_assert_eq!(removed_agent, agent);
        if let Some((moved_agent, moved_agent_entities_slot)) = moved_in_entity {
            self.agents[moved_agent].entity_back_indices[moved_agent_entities_slot] = entity_slot;
        }

        let (removed_entity, moved_in_agent) = self.agents[agent].swap_remove_entity(agent_slot);
        debug_assert_eq!(removed_entity, entity);
        if let Some((moved_entity, moved_entity_members_slot)) = moved_in_agent {
            self.entities[moved_entity].set_member_back_index(moved_entity_members_slot, agent_slot);
        }

        Ok(())
    }

    // ---- main loop (§4.9) ----

    pub fn reset(&mut self) -> Result<()> {
        self.ensure_backup();
        let backup = self.backup.clone().expect("backup was just ensured");
        self.agents = backup.agents;
        self.entities = backup.entities;
        for agent in &mut self.agents {
            agent.reset();
        }
        for entity in &mut self.entities {
            *entity = Entity::new(entity.id, entity.name.clone());
        }

        let n = self.agents.len();
        self.db.reset(n as i64);
        self.mask.reset(n);
        self.mask.enabled = self.config.queueing_enabled;
        self.event_queue.clear();
        self.today = 0;
        self.virus_def_registered.iter_mut().for_each(|id| *id = None);
        self.tool_def_registered.iter_mut().for_each(|id| *id = None);

        for def_id in 0..self.virus_defs.len() {
            self.distribute_virus(def_id)?;
            self.flush_events()?;
        }
        for def_id in 0..self.tool_defs.len() {
            self.distribute_tool(def_id)?;
            self.flush_events()?;
        }

        if let Some(placement) = self.config.initial_placement.clone() {
            placement(self)?;
            self.flush_events()?;
        }

        self.db.record(self.today);
        self.today += 1;
        Ok(())
    }

    fn distribute_virus(&mut self, def_id: VirusDefId) -> Result<()> {
        let prevalence = self.virus_defs[def_id].prevalence;
        let n = self.agents.len();
        let n_to_infect = (prevalence * n as f64).round() as usize;
        for agent in self.sample_agents(n_to_infect) {
            self.set_virus(agent, def_id, None, None)?;
        }
        Ok(())
    }

    fn distribute_tool(&mut self, def_id: ToolDefId) -> Result<()> {
        let prevalence = self.tool_defs[def_id].prevalence;
        let n = self.agents.len();
        let n_to_place = (prevalence * n as f64).round() as usize;
        for agent in self.sample_agents(n_to_place) {
            self.add_tool(agent, def_id, None, None)?;
        }
        Ok(())
    }

    /// Samples `k` distinct agent ids without replacement via partial
    /// Fisher-Yates, consuming the model's RNG in a fixed, reproducible
    /// order.
    fn sample_agents(&mut self, k: usize) -> Vec<AgentId> {
        let n = self.agents.len();
        let k = k.min(n);
        let mut pool: Vec<AgentId> = (0..n).collect();
        let mut chosen = Vec::with_capacity(k);
        for i in 0..k {
            let j = i + self.rng.index(n - i);
            pool.swap(i, j);
            chosen.push(pool[i]);
        }
        chosen
    }

    /// Runs `ndays` steps starting from a fresh `reset()`, reseeding the
    /// RNG with `seed` first.
    pub fn run(&mut self, ndays: u32, seed: u64) -> Result<()> {
        self.rng.seed(seed);
        self.reset()?;
        for _ in 0..ndays {
            self.step()?;
        }
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        {
            let _span = crate::profiling::open_span("state_update_pass");
            for agent in 0..self.agents.len() {
                if !self.mask.is_active(agent) {
                    continue;
                }
                let state = self.agents[agent].state;
                if let Some(updater) = self.config.updaters[state as usize].clone() {
                    updater(self, agent)?;
                }
            }
        }
        self.flush_events()?;

        for hook in self.config.hooks.clone() {
            if hook.day == -1 || hook.day == self.today {
                (hook.run)(self)?;
                self.flush_events()?;
            }
        }

        if let Some(policy) = self.rewire_policy {
            let directed = self.config.directed;
            graph::rewire(&mut self.agents, policy.proportion, directed, &mut self.rng)?;
        }

        self.db.record(self.today);
        #[cfg(debug_assertions)]
        self.db.verify_invariants(self.agents.len() as i64)?;
        self.today += 1;

        self.mutate_viruses()?;
        Ok(())
    }

    fn mutate_viruses(&mut self) -> Result<()> {
        for agent in 0..self.agents.len() {
            let Some(instance) = self.agents[agent].virus.clone() else {
                continue;
            };
            let Some(mutation) = self.virus_defs[instance.def_id].mutation.clone() else {
                continue;
            };
            if mutation(&self.agents[agent], &instance) {
                let today = self.today;
                let new_id = self.db.register_virus(
                    self.virus_defs[instance.def_id].name.clone(),
                    instance.sequence.clone(),
                    today,
                    instance.registered_id,
                );
                let state = self.agents[agent].state;
                self.db.note_virus_state(instance.registered_id, state, -1);
                self.db.note_virus_state(new_id, state, 1);
                if let Some(v) = self.agents[agent].virus.as_mut() {
                    v.registered_id = new_id;
                }
            }
        }
        Ok(())
    }

    /// Records a transmission event (used by infection updaters after a
    /// roulette selects a source), and, as a side effect of `set_virus`
    /// called separately by the caller, attaches the virus.
    pub fn record_transmission(
        &mut self,
        source: AgentId,
        target: AgentId,
        virus_id: crate::database::RegisteredId,
        source_exposure_date: i32,
    ) {
        self.db
            .record_transmission(self.today, source, target, virus_id, source_exposure_date);
    }

    // ---- replicated runs (§4.9) ----

    pub fn run_multiple<F>(
        &mut self,
        ndays: u32,
        nreplicates: usize,
        seed: u64,
        nthreads: usize,
        mut callback: F,
    ) -> Result<Vec<Duration>>
    where
        F: FnMut(usize, &Model),
    {
        self.ensure_backup();
        let mut master = Rng::new(seed);
        let sub_seeds: Vec<u64> = (0..nreplicates).map(|_| master.draw_subseed()).collect();

        if nthreads <= 1 {
            let mut elapsed = Vec::with_capacity(nreplicates);
            for (i, &sub_seed) in sub_seeds.iter().enumerate() {
                let start = std::time::Instant::now();
                self.run(ndays, sub_seed)?;
                elapsed.push(start.elapsed());
                callback(i, self);
            }
            Ok(elapsed)
        } else {
            self.run_multiple_parallel(ndays, &sub_seeds, nthreads, &mut callback)
        }
    }

    fn run_multiple_parallel<F>(
        &mut self,
        ndays: u32,
        sub_seeds: &[u64],
        nthreads: usize,
        callback: &mut F,
    ) -> Result<Vec<Duration>>
    where
        F: FnMut(usize, &Model),
    {
        use std::sync::mpsc;

        let pool = threadpool::ThreadPool::new(nthreads.min(num_cpus::get().max(1)));
        let (tx, rx) = mpsc::channel();

        for (i, &sub_seed) in sub_seeds.iter().enumerate() {
            let mut worker_model = self.clone();
            let tx = tx.clone();
            pool.execute(move || {
                let start = std::time::Instant::now();
                let result = worker_model.run(ndays, sub_seed);
                let elapsed = start.elapsed();
                tx.send((i, result, worker_model, elapsed))
                    .expect("result channel receiver dropped before all replicates finished");
            });
        }
        drop(tx);
        pool.join();

        let mut results: Vec<_> = rx.into_iter().collect();
        results.sort_by_key(|(i, ..)| *i);

        let mut elapsed = vec![Duration::default(); sub_seeds.len()];
        for (i, result, model, duration) in results {
            result?;
            elapsed[i] = duration;
            callback(i, &model);
        }
        Ok(elapsed)
    }

    #[cfg(debug_assertions)]
    pub fn verify_invariants(&self) -> Result<()> {
        self.db.verify_invariants(self.agents.len() as i64)?;
        self.mask.verify_non_negative()?;
        for agent in &self.agents {
            for (k, &j) in agent.neighbors.iter().enumerate() {
                let back = agent.neighbor_back_indices[k];
                if self.agents[j].neighbors.get(back) != Some(&agent.id) {
                    return Err(EngineError::InvariantViolated(format!(
                        "back-index mismatch between agents {} and {j}",
                        agent.id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virus::VirusDef;

    fn two_agent_ring() -> Model {
        let mut config = ModelConfig::new(2);
        config.queueing_enabled = false;
        let mut model = Model::new(2, config);
        model.build_graph(&[0], &[1], false).unwrap();
        model
    }

    #[test]
    fn empty_run_keeps_everyone_susceptible() {
        let mut config = ModelConfig::new(2);
        let mut model = Model::new(10, config.clone());
        config.nstates = 2;
        model.run(5, 1).unwrap();
        assert_eq!(model.db.today_total(), &[10, 0]);
        assert_eq!(model.db.sum_today_total(), 10);
        assert!(model.db.transmissions().is_empty());
    }

    #[test]
    fn set_virus_then_flush_registers_and_moves_state() {
        let mut model = two_agent_ring();
        let def = VirusDef::new("v").with_states(1, UNCHANGED_STATE, UNCHANGED_STATE);
        let def_id = model.add_virus_def(def);
        model.reset().unwrap();
        model.set_virus(0, def_id, None, None).unwrap();
        model.flush_events().unwrap();

        assert_eq!(model.agents[0].state, 1);
        assert!(model.agents[0].virus.is_some());
        assert_eq!(model.db.today_total()[1], 1);
        assert_eq!(model.db.today_total()[0], 1);
    }

    #[test]
    fn determinism_same_seed_same_history() {
        let mut config = ModelConfig::new(2);
        config.queueing_enabled = false;
        let mut a = Model::new(50, config.clone());
        a.build_graph(
            &(0..49).collect::<Vec<_>>(),
            &(1..50).collect::<Vec<_>>(),
            false,
        )
        .unwrap();
        let mut b = a.clone();

        a.run(10, 99).unwrap();
        b.run(10, 99).unwrap();

        assert_eq!(a.db.today_total(), b.db.today_total());
        assert_eq!(
            a.db.history_total().len(),
            b.db.history_total().len()
        );
    }
}
