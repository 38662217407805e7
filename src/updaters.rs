//! §2 item 2 / §4.4-§4.5: the per-agent update pipeline.
//!
//! Builds the two generic `StateUpdater` closures behind every prepackaged
//! disease model (SIR, SEIR, ... — out of scope per §1, but all of them wire
//! a `ModelConfig` to point at these two functions):
//!
//! - `default_susceptible_updater` composes, for each infectious neighbor,
//!   that neighbor's virus `prob_infecting` with the neighbor's own tools'
//!   transmission-reduction and this agent's own tools' susceptibility
//!   reduction (both mixed through `model.config.mixer`, §4.4), then runs
//!   the §4.5 roulette over the resulting per-neighbor probabilities to pick
//!   at most one source.
//! - `default_infected_updater` composes this agent's own virus's
//!   `prob_recovery`/`prob_death`, reduced by this agent's own tools, into a
//!   two-way roulette deciding "stay infected" / "recover" / "die".
//!
//! Grounded on `examples/original_source/include/epiworld/randgraph.hpp`'s
//! neighbor-sampling idiom (iterate the adjacency list in insertion order,
//! route every draw through one `Rng`) and on `roulette.rs`/`mixer.rs`
//! themselves; the teacher's own infection loop is continuous-time and
//! plan-scheduled (`ixa::Context::add_plan`), a different execution model
//! from this engine's day-stepped roulette, so it is not imitated here.

use crate::agent::AgentId;
use crate::error::EngineError;
use crate::model::{Model, Result, StateUpdater};
use crate::profiling;
use crate::roulette::roulette;
use crate::tool::ToolInstance;
use crate::virus::VirusInstance;
use std::sync::Arc;

/// Mixes the reduction a single channel contributes from every tool `owner`
/// currently carries, through `model.config.mixer` (§4.4).
fn mixed_tool_reduction(
    model: &Model,
    owner: AgentId,
    channel: impl Fn(&crate::tool::ToolDef) -> crate::prob::Channel<ToolInstance>,
) -> f64 {
    let reductions: Vec<f64> = model.agents[owner]
        .tools
        .iter()
        .map(|inst| {
            let def = &model.tool_defs[inst.def_id];
            channel(def).eval(&model.agents[owner], inst, model)
        })
        .collect();
    model.config.mixer.combine(&reductions)
}

/// Builds the default susceptible-state updater (§4.4/§4.5). Fails with
/// `LogicError` if called on an agent already carrying a virus (spec §7).
#[must_use]
pub fn default_susceptible_updater() -> StateUpdater {
    Arc::new(|model: &mut Model, agent: AgentId| -> Result<()> {
        if model.agents[agent].virus.is_some() {
            return Err(EngineError::LogicError(format!(
                "default susceptible-updater called on agent {agent}, which already carries a virus"
            )));
        }

        let neighbors = model.agents[agent].neighbors.clone();
        let mut sources: Vec<(AgentId, VirusInstance)> = Vec::new();
        let mut probs: Vec<f64> = Vec::new();

        let own_susceptibility_reduction =
            mixed_tool_reduction(model, agent, |def| def.reduces_susceptibility.clone());

        for &nb in &neighbors {
            let Some(source_virus) = model.agents[nb].virus.clone() else {
                continue;
            };
            let def = model.virus_defs[source_virus.def_id].clone();
            let p_infect = def.prob_infecting.eval(&model.agents[nb], &source_virus, model);
            let source_transmission_reduction =
                mixed_tool_reduction(model, nb, |def| def.reduces_transmission.clone());

            let p = p_infect * (1.0 - own_susceptibility_reduction) * (1.0 - source_transmission_reduction);
            sources.push((nb, source_virus));
            probs.push(p.clamp(0.0, 1.0));
        }

        if !probs.is_empty() {
            profiling::increment_named_count(profiling::FORECASTED_INFECTION_LABEL);
        }

        let Some(winner) = roulette(&probs, &mut model.rng) else {
            return Ok(());
        };
        let (source, source_virus) = sources[winner].clone();

        profiling::increment_named_count(profiling::ACCEPTED_INFECTION_LABEL);
        model.set_virus(agent, source_virus.def_id, None, None)?;
        model.record_transmission(source, agent, source_virus.registered_id, source_virus.date_acquired);
        Ok(())
    })
}

/// Builds the default infected-state updater (§4.4/§4.5). Fails with
/// `LogicError` if called on an agent carrying no virus (spec §7).
///
/// Runs a three-way roulette over `[prob_recovery, prob_death]` (each
/// reduced by this agent's own tools through the model's mixer); an
/// unselected draw means the agent stays infected another day.
#[must_use]
pub fn default_infected_updater() -> StateUpdater {
    Arc::new(|model: &mut Model, agent: AgentId| -> Result<()> {
        let Some(instance) = model.agents[agent].virus.clone() else {
            return Err(EngineError::LogicError(format!(
                "default infected-updater called on agent {agent}, which carries no virus"
            )));
        };
        let def = model.virus_defs[instance.def_id].clone();

        let recovery_reduction = mixed_tool_reduction(model, agent, |def| def.reduces_recovery.clone());
        let death_reduction = mixed_tool_reduction(model, agent, |def| def.reduces_death.clone());

        let p_recover = def.prob_recovery.eval(&model.agents[agent], &instance, model) * (1.0 - recovery_reduction);
        let p_death = def.prob_death.eval(&model.agents[agent], &instance, model) * (1.0 - death_reduction);

        match roulette(&[p_recover.clamp(0.0, 1.0), p_death.clamp(0.0, 1.0)], &mut model.rng) {
            Some(0) => model.rm_virus(agent, None, None),
            Some(1) => model.rm_agent_by_virus(agent, None, None),
            _ => Ok(()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelConfig;
    use crate::virus::VirusDef;

    fn two_agent_ring(queueing: bool) -> Model {
        let mut config = ModelConfig::new(3);
        config.queueing_enabled = queueing;
        config.set_updater(0, default_susceptible_updater());
        config.set_updater(1, default_infected_updater());
        let mut model = Model::new(2, config);
        model.build_graph(&[0], &[1], false).unwrap();
        model
    }

    #[test]
    fn susceptible_updater_rejects_agent_with_virus() {
        let mut model = two_agent_ring(false);
        let def = VirusDef::new("v").with_states(1, 2, 2);
        let def_id = model.add_virus_def(def);
        model.reset().unwrap();
        model.set_virus(0, def_id, None, None).unwrap();
        model.flush_events().unwrap();

        let updater = default_susceptible_updater();
        let result = updater(&mut model, 0);
        assert!(matches!(result, Err(EngineError::LogicError(_))));
    }

    #[test]
    fn infected_updater_rejects_agent_without_virus() {
        let mut model = two_agent_ring(false);
        model.reset().unwrap();
        let updater = default_infected_updater();
        assert!(matches!(updater(&mut model, 0), Err(EngineError::LogicError(_))));
    }

    #[test]
    fn certain_infection_always_transmits_to_lone_neighbor() {
        let mut model = two_agent_ring(false);
        let def = VirusDef::new("v")
            .with_states(1, 2, 2)
            .with_prob_infecting(1.0);
        let def_id = model.add_virus_def(def);
        model.reset().unwrap();
        model.set_virus(0, def_id, None, None).unwrap();
        model.flush_events().unwrap();

        let updater = default_susceptible_updater();
        updater(&mut model, 1).unwrap();
        model.flush_events().unwrap();

        assert!(model.agents[1].virus.is_some());
        assert_eq!(model.agents[1].state, 1);
        assert_eq!(model.db.transmissions().len(), 1);
        assert_eq!(model.db.transmissions()[0].source, 0);
        assert_eq!(model.db.transmissions()[0].target, 1);
    }

    #[test]
    fn certain_recovery_clears_virus_and_moves_state() {
        let mut model = two_agent_ring(false);
        let def = VirusDef::new("v")
            .with_states(1, 2, 2)
            .with_prob_recovery(1.0)
            .with_prob_death(0.0);
        let def_id = model.add_virus_def(def);
        model.reset().unwrap();
        model.set_virus(0, def_id, None, None).unwrap();
        model.flush_events().unwrap();

        let updater = default_infected_updater();
        updater(&mut model, 0).unwrap();
        model.flush_events().unwrap();

        assert!(model.agents[0].virus.is_none());
        assert_eq!(model.agents[0].state, 2);
    }

    #[test]
    fn zero_probability_neighbors_never_transmit() {
        let mut model = two_agent_ring(false);
        let def = VirusDef::new("v")
            .with_states(1, 2, 2)
            .with_prob_infecting(0.0);
        let def_id = model.add_virus_def(def);
        model.reset().unwrap();
        model.set_virus(0, def_id, None, None).unwrap();
        model.flush_events().unwrap();

        let updater = default_susceptible_updater();
        updater(&mut model, 1).unwrap();
        model.flush_events().unwrap();

        assert!(model.agents[1].virus.is_none());
        assert!(model.db.transmissions().is_empty());
    }
}
