//! C2: the contact graph.
//!
//! Adjacency lives inside each `Agent` (neighbors + back-indices); this
//! module holds the population-level operations that touch two agents at
//! once — edge construction at setup and degree-preserving rewiring
//! between runs.

use crate::agent::{Agent, AgentId};
use crate::error::EngineError;
use crate::rng::Rng;

/// Adds a directed edge `from -> to`. `from`'s neighbor list gains `to`;
/// `to`'s `neighbor_back_indices` is not touched by a directed edge since
/// there is no reciprocal slot to record.
fn add_directed_edge(agents: &mut [Agent], from: AgentId, to: AgentId) -> Result<(), EngineError> {
    validate_endpoint(agents, from)?;
    validate_endpoint(agents, to)?;
    let back_index = agents[to].neighbors.len();
    agents[from].push_neighbor(to, back_index);
    Ok(())
}

/// Adds an undirected edge `{a,b}`: each endpoint gains the other as a
/// neighbor, with back-indices pointing at each other's newly-created slot
/// (invariant A1).
pub fn add_undirected_edge(agents: &mut [Agent], a: AgentId, b: AgentId) -> Result<(), EngineError> {
    validate_endpoint(agents, a)?;
    validate_endpoint(agents, b)?;
    let pos_in_b = agents[b].neighbors.len();
    let pos_in_a = agents[a].neighbors.len();
    agents[a].push_neighbor(b, pos_in_b);
    agents[b].push_neighbor(a, pos_in_a);
    Ok(())
}

/// Builds the contact graph from a flat edge list, directed or undirected.
pub fn build_from_edges(
    agents: &mut [Agent],
    sources: &[AgentId],
    targets: &[AgentId],
    directed: bool,
) -> Result<(), EngineError> {
    if sources.len() != targets.len() {
        return Err(EngineError::InvalidGraph(
            "source/target length mismatch".to_string(),
        ));
    }
    for (&s, &t) in sources.iter().zip(targets.iter()) {
        if directed {
            add_directed_edge(agents, s, t)?;
        } else {
            add_undirected_edge(agents, s, t)?;
        }
    }
    Ok(())
}

fn validate_endpoint(agents: &[Agent], id: AgentId) -> Result<(), EngineError> {
    if id >= agents.len() {
        return Err(EngineError::InvalidGraph(format!(
            "edge endpoint {id} outside [0, {})",
            agents.len()
        )));
    }
    Ok(())
}

/// Degree-preserving rewire: repeatedly picks two degree-weighted endpoints
/// and swaps one randomly-chosen neighbor slot between them, fixing up the
/// reciprocal slot on the far side for the undirected case. Ported from
/// `original_source/include/epiworld/randgraph.hpp::rewire_degseq` (see
/// DESIGN.md): endpoints are resampled (bounded retries) rather than
/// retried unconditionally when the draw collides with itself.
///
/// Fails with `InvalidGraph` if every agent is isolated (no edges to
/// rewire).
pub fn rewire(
    agents: &mut [Agent],
    proportion: f64,
    directed: bool,
    rng: &mut Rng,
) -> Result<(), EngineError> {
    if !(0.0..=1.0).contains(&proportion) {
        return Err(EngineError::InvalidArgument(format!(
            "rewire proportion {proportion} outside [0,1]"
        )));
    }

    let non_isolates: Vec<AgentId> = agents
        .iter()
        .enumerate()
        .filter(|(_, a)| !a.neighbors.is_empty())
        .map(|(i, _)| i)
        .collect();

    if non_isolates.is_empty() {
        return Err(EngineError::InvalidGraph(
            "the graph is completely disconnected".to_string(),
        ));
    }

    let weights: Vec<f64> = non_isolates
        .iter()
        .map(|&i| agents[i].neighbors.len() as f64)
        .collect();
    let total_degree: f64 = weights.iter().sum();
    if total_degree == 0.0 {
        return Err(EngineError::InvalidGraph(
            "the graph is completely disconnected".to_string(),
        ));
    }
    let mut cumulative = Vec::with_capacity(weights.len());
    let mut running = 0.0;
    for w in &weights {
        running += w / total_degree;
        cumulative.push(running);
    }

    let nedges = total_degree / if directed { 1.0 } else { 2.0 };
    let nrewires = (proportion * nedges).floor() as usize;
    let n = non_isolates.len();

    const MAX_RETRIES: usize = 8;

    for _ in 0..nrewires {
        let id0 = weighted_pick(&cumulative, rng);
        let mut id1 = weighted_pick(&cumulative, rng);
        let mut retries = 0;
        while id1 == id0 && retries < MAX_RETRIES {
            id1 = weighted_pick(&cumulative, rng);
            retries += 1;
        }
        if id1 == id0 {
            id1 = (id0 + 1) % n;
        }

        let p0 = non_isolates[id0];
        let p1 = non_isolates[id1];

        let slot0 = rng.index(agents[p0].neighbors.len());
        let slot1 = rng.index(agents[p1].neighbors.len());

        swap_neighbor_slots(agents, p0, slot0, p1, slot1, directed);
    }

    Ok(())
}

fn weighted_pick(cumulative: &[f64], rng: &mut Rng) -> usize {
    let u = rng.uniform();
    cumulative
        .iter()
        .position(|&c| u <= c)
        .unwrap_or(cumulative.len() - 1)
}

/// Swaps the neighbor occupying `agents[p0].neighbors[slot0]` with the one
/// occupying `agents[p1].neighbors[slot1]`, fixing up the back-indices on
/// both the two agents involved and, for the undirected case, on the far
/// side of each swapped edge so invariant A1 keeps holding.
fn swap_neighbor_slots(
    agents: &mut [Agent],
    p0: AgentId,
    slot0: usize,
    p1: AgentId,
    slot1: usize,
    directed: bool,
) {
    let old_n0 = agents[p0].neighbors[slot0];
    let old_n1 = agents[p1].neighbors[slot1];
    // Position of p0 within old_n0's own list, and of p1 within old_n1's —
    // already known exactly via the back-index arrays, no search needed.
    let back0 = agents[p0].neighbor_back_indices[slot0];
    let back1 = agents[p1].neighbor_back_indices[slot1];

    if !directed {
        // old_n0 used to point back at p0; it now points at p1 instead
        // (and vice versa for old_n1/p0), preserving every degree exactly.
        agents[old_n0].neighbors[back0] = p1;
        agents[old_n0].neighbor_back_indices[back0] = slot1;
        agents[old_n1].neighbors[back1] = p0;
        agents[old_n1].neighbor_back_indices[back1] = slot0;
    }

    agents[p0].neighbors[slot0] = old_n1;
    agents[p1].neighbors[slot1] = old_n0;
    agents[p0].neighbor_back_indices[slot0] = back1;
    agents[p1].neighbor_back_indices[slot1] = back0;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_lattice(n: usize, k: usize) -> Vec<Agent> {
        let mut agents: Vec<Agent> = (0..n).map(Agent::new).collect();
        let mut sources = Vec::new();
        let mut targets = Vec::new();
        for i in 0..n {
            for j in 1..=k {
                let l = (i + j) % n;
                if i < l {
                    sources.push(i);
                    targets.push(l);
                }
            }
        }
        build_from_edges(&mut agents, &sources, &targets, false).unwrap();
        agents
    }

    #[test]
    fn rewire_preserves_degree_sequence() {
        let mut agents = ring_lattice(50, 4);
        let before: Vec<usize> = agents.iter().map(Agent::degree).collect();
        let mut rng = Rng::new(7);
        rewire(&mut agents, 0.5, false, &mut rng).unwrap();
        let after: Vec<usize> = agents.iter().map(Agent::degree).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn rewire_keeps_back_indices_consistent() {
        let mut agents = ring_lattice(30, 4);
        let mut rng = Rng::new(11);
        rewire(&mut agents, 0.8, false, &mut rng).unwrap();
        for i in 0..agents.len() {
            for (k, &j) in agents[i].neighbors.iter().enumerate() {
                let back = agents[i].neighbor_back_indices[k];
                assert_eq!(agents[j].neighbors[back], i);
            }
        }
    }

    #[test]
    fn disconnected_graph_fails_rewire() {
        let mut agents: Vec<Agent> = (0..5).map(Agent::new).collect();
        let mut rng = Rng::new(1);
        assert!(rewire(&mut agents, 0.5, false, &mut rng).is_err());
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let mut agents: Vec<Agent> = (0..3).map(Agent::new).collect();
        assert!(add_undirected_edge(&mut agents, 0, 5).is_err());
    }
}
