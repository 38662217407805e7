//! C8: the Database.
//!
//! Tracks today's per-state counts (overall and stratified by registered
//! virus/tool), the current day's transition matrix, per-day history of
//! all of the above, and transmission events — then derives the three
//! spec-mandated statistics (`transition_probability`, `reproductive_number`,
//! `generation_time`) from that history.
//!
//! Registered viruses/tools are addressed by a small non-negative
//! "registered id", distinct from the `VirusDefId`/`ToolDefId` that
//! addresses a definition in the `Model`'s registry: a virus definition
//! registers its baseline variant once, and acquires further registered ids
//! only when `Virus::mutation` reports a new variant.

use crate::agent::AgentId;
use indexmap::IndexMap;

pub type RegisteredId = i32;

#[derive(Debug, Clone)]
pub struct VirusRegistryEntry {
    pub name: String,
    pub sequence: Option<String>,
    pub date_first_recorded: i32,
    pub parent_virus_id: i32,
}

#[derive(Debug, Clone)]
pub struct ToolRegistryEntry {
    pub name: String,
    pub sequence: Option<String>,
    pub date_first_recorded: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct Transmission {
    pub date: i32,
    pub source: AgentId,
    pub target: AgentId,
    pub virus_id: RegisteredId,
    pub source_exposure_date: i32,
}

#[derive(Debug, Clone)]
pub struct TransitionSnapshot {
    pub date: i32,
    pub matrix: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct ReproductiveNumberRow {
    pub virus_id: RegisteredId,
    pub source: AgentId,
    pub source_exposure_date: i32,
    pub rt: i64,
}

#[derive(Debug, Clone)]
pub struct GenerationTimeRow {
    pub virus_id: RegisteredId,
    pub source: AgentId,
    pub source_exposure_date: i32,
    pub gentime: i32,
}

#[derive(Debug, Clone)]
pub struct Database {
    nstates: usize,
    today_total: Vec<i64>,
    today_virus: Vec<Vec<i64>>,
    today_tool: Vec<Vec<i64>>,
    transition_matrix: Vec<i64>,

    history_total: Vec<(i32, u32, i64)>,
    history_virus: Vec<(i32, RegisteredId, u32, i64)>,
    history_tool: Vec<(i32, RegisteredId, u32, i64)>,
    history_transition: Vec<TransitionSnapshot>,

    transmissions: Vec<Transmission>,

    virus_registry: Vec<VirusRegistryEntry>,
    tool_registry: Vec<ToolRegistryEntry>,
}

impl Database {
    #[must_use]
    pub fn new(nstates: usize) -> Self {
        Self {
            nstates,
            today_total: vec![0; nstates],
            today_virus: Vec::new(),
            today_tool: Vec::new(),
            transition_matrix: vec![0; nstates * nstates],
            history_total: Vec::new(),
            history_virus: Vec::new(),
            history_tool: Vec::new(),
            history_transition: Vec::new(),
            transmissions: Vec::new(),
            virus_registry: Vec::new(),
            tool_registry: Vec::new(),
        }
    }

    /// Index into `transition_matrix` for `(from, to)`, column-major with
    /// columns keyed by `from` and rows keyed by `to` (spec §3/§4.8).
    fn idx(&self, from: u32, to: u32) -> usize {
        to as usize * self.nstates + from as usize
    }

    /// Clears all counters and history and places every one of `n_agents`
    /// agents in state 0, as `Model::reset` requires before a fresh
    /// replicate.
    pub fn reset(&mut self, n_agents: i64) {
        self.today_total = vec![0; self.nstates];
        self.today_total[0] = n_agents;
        self.today_virus.clear();
        self.today_tool.clear();
        self.transition_matrix = vec![0; self.nstates * self.nstates];
        self.transition_matrix[self.idx(0, 0)] = n_agents;
        self.history_total.clear();
        self.history_virus.clear();
        self.history_tool.clear();
        self.history_transition.clear();
        self.transmissions.clear();
        self.virus_registry.clear();
        self.tool_registry.clear();
    }

    #[must_use]
    pub fn nstates(&self) -> usize {
        self.nstates
    }

    #[must_use]
    pub fn today_total(&self) -> &[i64] {
        &self.today_total
    }

    /// Current total population count, `Σ today_total` (invariant DB1).
    #[must_use]
    pub fn sum_today_total(&self) -> i64 {
        self.today_total.iter().sum()
    }

    #[must_use]
    pub fn today_virus(&self, virus_id: RegisteredId) -> Option<&[i64]> {
        self.today_virus.get(virus_id as usize).map(Vec::as_slice)
    }

    #[must_use]
    pub fn today_tool(&self, tool_id: RegisteredId) -> Option<&[i64]> {
        self.today_tool.get(tool_id as usize).map(Vec::as_slice)
    }

    #[must_use]
    pub fn transition_count(&self, from: u32, to: u32) -> i64 {
        self.transition_matrix[self.idx(from, to)]
    }

    #[must_use]
    pub fn virus_registry(&self) -> &[VirusRegistryEntry] {
        &self.virus_registry
    }

    #[must_use]
    pub fn tool_registry(&self) -> &[ToolRegistryEntry] {
        &self.tool_registry
    }

    #[must_use]
    pub fn history_total(&self) -> &[(i32, u32, i64)] {
        &self.history_total
    }

    #[must_use]
    pub fn history_virus(&self) -> &[(i32, RegisteredId, u32, i64)] {
        &self.history_virus
    }

    #[must_use]
    pub fn history_tool(&self) -> &[(i32, RegisteredId, u32, i64)] {
        &self.history_tool
    }

    #[must_use]
    pub fn history_transition(&self) -> &[TransitionSnapshot] {
        &self.history_transition
    }

    #[must_use]
    pub fn transmissions(&self) -> &[Transmission] {
        &self.transmissions
    }

    pub fn register_virus(
        &mut self,
        name: impl Into<String>,
        sequence: Option<String>,
        today: i32,
        parent_virus_id: i32,
    ) -> RegisteredId {
        self.virus_registry.push(VirusRegistryEntry {
            name: name.into(),
            sequence,
            date_first_recorded: today,
            parent_virus_id,
        });
        self.today_virus.push(vec![0; self.nstates]);
        (self.virus_registry.len() - 1) as RegisteredId
    }

    pub fn register_tool(
        &mut self,
        name: impl Into<String>,
        sequence: Option<String>,
        today: i32,
    ) -> RegisteredId {
        self.tool_registry.push(ToolRegistryEntry {
            name: name.into(),
            sequence,
            date_first_recorded: today,
        });
        self.today_tool.push(vec![0; self.nstates]);
        (self.tool_registry.len() - 1) as RegisteredId
    }

    /// Moves `delta` agents' occupancy out of/into `state` for the overall
    /// count. `delta` is typically `+1`/`-1`.
    pub fn note_state(&mut self, state: u32, delta: i64) {
        self.today_total[state as usize] += delta;
    }

    pub fn note_virus_state(&mut self, virus_id: RegisteredId, state: u32, delta: i64) {
        if virus_id >= 0 {
            self.today_virus[virus_id as usize][state as usize] += delta;
        }
    }

    pub fn note_tool_state(&mut self, tool_id: RegisteredId, state: u32, delta: i64) {
        if tool_id >= 0 {
            self.today_tool[tool_id as usize][state as usize] += delta;
        }
    }

    /// Records one day's net move `from -> to` in the transition matrix
    /// (§4.8). A no-op when `from == to`, per the resolved open question on
    /// diagonal moves.
    pub fn record_transition(&mut self, from: u32, to: u32) {
        if from == to {
            return;
        }
        let to_idx = self.idx(from, to);
        let diag_idx = self.idx(from, from);
        self.transition_matrix[to_idx] += 1;
        self.transition_matrix[diag_idx] -= 1;
    }

    /// Inverse of `record_transition`, used when an agent changes state a
    /// second time within the same day and the earlier move must be
    /// collapsed into the new one.
    pub fn undo_transition(&mut self, from: u32, to: u32) {
        if from == to {
            return;
        }
        let to_idx = self.idx(from, to);
        let diag_idx = self.idx(from, from);
        self.transition_matrix[to_idx] -= 1;
        self.transition_matrix[diag_idx] += 1;
    }

    pub fn record_transmission(
        &mut self,
        date: i32,
        source: AgentId,
        target: AgentId,
        virus_id: RegisteredId,
        source_exposure_date: i32,
    ) {
        self.transmissions.push(Transmission {
            date,
            source,
            target,
            virus_id,
            source_exposure_date,
        });
    }

    /// Appends today's snapshot to history and re-diagonalizes the working
    /// matrix so that, going into the next day, the diagonal reflects
    /// today's final counts and off-diagonals reset to zero (§4.8).
    pub fn record(&mut self, today: i32) {
        for (state, &count) in self.today_total.iter().enumerate() {
            self.history_total.push((today, state as u32, count));
        }
        for (virus_id, counts) in self.today_virus.iter().enumerate() {
            for (state, &count) in counts.iter().enumerate() {
                self.history_virus
                    .push((today, virus_id as RegisteredId, state as u32, count));
            }
        }
        for (tool_id, counts) in self.today_tool.iter().enumerate() {
            for (state, &count) in counts.iter().enumerate() {
                self.history_tool
                    .push((today, tool_id as RegisteredId, state as u32, count));
            }
        }
        self.history_transition.push(TransitionSnapshot {
            date: today,
            matrix: self.transition_matrix.clone(),
        });

        for s in 0..self.nstates {
            for s2 in 0..self.nstates {
                if s != s2 {
                    let i = self.idx(s as u32, s2 as u32);
                    self.transition_matrix[i] = 0;
                }
            }
            let diag = self.idx(s as u32, s as u32);
            self.transition_matrix[diag] = self.today_total[s];
        }
    }

    /// Debug-only check of DB1/DB2, compiled out in release builds (spec
    /// §7's propagation policy).
    #[cfg(debug_assertions)]
    pub fn verify_invariants(&self, expected_n: i64) -> Result<(), crate::error::EngineError> {
        use crate::error::EngineError;
        if self.sum_today_total() != expected_n {
            return Err(EngineError::InvariantViolated(format!(
                "sum law violated: total {} != expected {}",
                self.sum_today_total(),
                expected_n
            )));
        }
        for s in 0..self.nstates {
            let diag = self.transition_matrix[self.idx(s as u32, s as u32)];
            if diag != self.today_total[s] {
                return Err(EngineError::InvariantViolated(format!(
                    "diagonal law violated at state {s}: {diag} != {}",
                    self.today_total[s]
                )));
            }
        }
        if self.today_total.iter().any(|&c| c < 0) {
            return Err(EngineError::InvariantViolated(
                "negative today_total entry".to_string(),
            ));
        }
        Ok(())
    }

    /// Sums every history snapshot and normalizes row-stochastically
    /// (§4.8).
    #[must_use]
    pub fn transition_probability(&self) -> Vec<f64> {
        let mut summed = vec![0i64; self.nstates * self.nstates];
        for snap in &self.history_transition {
            for (i, &v) in snap.matrix.iter().enumerate() {
                summed[i] += v;
            }
        }
        let mut probs = vec![0.0; self.nstates * self.nstates];
        for from in 0..self.nstates {
            let row_sum: i64 = (0..self.nstates)
                .map(|to| summed[self.idx(from as u32, to as u32)])
                .sum();
            if row_sum == 0 {
                continue;
            }
            for to in 0..self.nstates {
                let i = self.idx(from as u32, to as u32);
                probs[i] = summed[i] as f64 / row_sum as f64;
            }
        }
        probs
    }

    /// §4.8: for each transmission, counts the onward transmissions it
    /// produced; agents who were infected but never transmitted appear with
    /// `rt == 0`.
    #[must_use]
    pub fn reproductive_number(&self) -> Vec<ReproductiveNumberRow> {
        let mut counts: IndexMap<(RegisteredId, AgentId, i32), i64> = IndexMap::new();
        for t in &self.transmissions {
            *counts
                .entry((t.virus_id, t.source, t.source_exposure_date))
                .or_insert(0) += 1;
            counts
                .entry((t.virus_id, t.target, t.date))
                .or_insert(0);
        }
        counts
            .into_iter()
            .map(|((virus_id, source, source_exposure_date), rt)| ReproductiveNumberRow {
                virus_id,
                source,
                source_exposure_date,
                rt,
            })
            .collect()
    }

    /// §4.8: for each transmission, the day-difference to the target's
    /// first onward transmission of the same virus, or `-1` if none.
    #[must_use]
    pub fn generation_time(&self) -> Vec<GenerationTimeRow> {
        let mut by_source: IndexMap<(RegisteredId, AgentId), Vec<i32>> = IndexMap::new();
        for t in &self.transmissions {
            by_source
                .entry((t.virus_id, t.source))
                .or_default()
                .push(t.date);
        }

        self.transmissions
            .iter()
            .map(|t| {
                let gentime = by_source
                    .get(&(t.virus_id, t.target))
                    .and_then(|dates| dates.iter().filter(|&&d| d >= t.date).min())
                    .map_or(-1, |&d| d - t.date);
                GenerationTimeRow {
                    virus_id: t.virus_id,
                    source: t.source,
                    source_exposure_date: t.source_exposure_date,
                    gentime,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_places_all_agents_in_state_zero() {
        let mut db = Database::new(3);
        db.reset(10);
        assert_eq!(db.today_total(), &[10, 0, 0]);
        assert_eq!(db.transition_count(0, 0), 10);
        assert_eq!(db.transition_count(1, 1), 0);
    }

    #[test]
    fn single_transition_updates_matrix() {
        let mut db = Database::new(3);
        db.reset(2);
        db.note_state(0, -1);
        db.note_state(1, 1);
        db.record_transition(0, 1);
        assert_eq!(db.transition_count(0, 0), 1);
        assert_eq!(db.transition_count(0, 1), 1);
        assert_eq!(db.today_total(), &[1, 1, 0]);
    }

    #[test]
    fn double_move_same_day_collapses_to_single_edge() {
        let mut db = Database::new(3);
        db.reset(1);
        // 0 -> 1
        db.note_state(0, -1);
        db.note_state(1, 1);
        db.record_transition(0, 1);
        // 1 -> 2, same day: undo (0->1) first, then record (0->2)
        db.undo_transition(0, 1);
        db.note_state(1, -1);
        db.note_state(2, 1);
        db.record_transition(0, 2);

        assert_eq!(db.transition_count(0, 1), 0);
        assert_eq!(db.transition_count(0, 2), 1);
        assert_eq!(db.transition_count(0, 0), 0);
        assert_eq!(db.today_total(), &[0, 0, 1]);
    }

    #[test]
    fn record_reestablishes_diagonal_and_clears_off_diagonal() {
        let mut db = Database::new(2);
        db.reset(4);
        db.note_state(0, -1);
        db.note_state(1, 1);
        db.record_transition(0, 1);
        db.record(0);
        assert_eq!(db.transition_count(0, 0), 3);
        assert_eq!(db.transition_count(1, 1), 1);
        assert_eq!(db.transition_count(0, 1), 0);
        assert_eq!(db.history_transition().len(), 1);
    }

    #[test]
    fn reproductive_number_includes_zero_entries() {
        let mut db = Database::new(2);
        db.reset(3);
        db.record_transmission(1, 0, 1, 0, 1);
        db.record_transmission(3, 1, 2, 0, 1);
        let rt = db.reproductive_number();
        let source0 = rt.iter().find(|r| r.source == 0).unwrap();
        assert_eq!(source0.rt, 1);
        let source1 = rt.iter().find(|r| r.source == 1).unwrap();
        assert_eq!(source1.rt, 1);
        let target2_as_source = rt.iter().find(|r| r.source == 2).unwrap();
        assert_eq!(target2_as_source.rt, 0);
    }

    #[test]
    fn generation_time_is_minus_one_without_onward_transmission() {
        let mut db = Database::new(2);
        db.reset(3);
        db.record_transmission(1, 0, 1, 0, 1);
        let gt = db.generation_time();
        assert_eq!(gt.len(), 1);
        assert_eq!(gt[0].gentime, -1);
    }

    #[test]
    fn generation_time_finds_first_onward_transmission() {
        let mut db = Database::new(2);
        db.reset(3);
        db.record_transmission(1, 0, 1, 0, 1);
        db.record_transmission(4, 1, 2, 0, 1);
        db.record_transmission(9, 1, 2, 0, 1);
        let gt = db.generation_time();
        let first = gt.iter().find(|r| r.source == 0).unwrap();
        assert_eq!(first.gentime, 3);
    }
}
