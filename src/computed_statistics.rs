//! §4.8's three derived statistics — `transition_probability`,
//! `reproductive_number`, `generation_time` — joined against the virus/tool
//! registries and exposed as the row types `reports.rs` writes to CSV.
//!
//! Registered the way the teacher's `src/profiling/computed_statistic.rs`
//! registers a boxed computer/printer pair (see `profiling::computed_statistic`):
//! a `StatisticRegistry` holds a label plus a boxed `Fn(&Database) ->
//! StatisticValue`, so a caller can add a fourth derived statistic without
//! touching `Database` itself. The three spec-mandated statistics are the
//! default registrants, installed by `StatisticRegistry::with_defaults`.

use crate::agent::AgentId;
use crate::database::{Database, GenerationTimeRow, ReproductiveNumberRow, RegisteredId};
use serde::Serialize;

/// `reproductive_number.csv`'s row shape (spec §6): `virus_id, virus_name,
/// source, source_exposure_date, rt`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReproductiveNumberReportRow {
    pub virus_id: RegisteredId,
    pub virus_name: String,
    pub source: AgentId,
    pub source_exposure_date: i32,
    pub rt: i64,
}

/// `generation_time.csv`'s row shape (spec §6): `virus_id, source,
/// source_exposure_date, gentime`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationTimeReportRow {
    pub virus_id: RegisteredId,
    pub source: AgentId,
    pub source_exposure_date: i32,
    pub gentime: i32,
}

fn virus_name(db: &Database, virus_id: RegisteredId) -> String {
    db.virus_registry()
        .get(virus_id.max(0) as usize)
        .map_or_else(|| "unknown".to_string(), |entry| entry.name.clone())
}

/// Joins `Database::reproductive_number` rows against the virus registry for
/// their `virus_name` column.
#[must_use]
pub fn reproductive_number_report(db: &Database) -> Vec<ReproductiveNumberReportRow> {
    db.reproductive_number()
        .into_iter()
        .map(|ReproductiveNumberRow { virus_id, source, source_exposure_date, rt }| {
            ReproductiveNumberReportRow {
                virus_id,
                virus_name: virus_name(db, virus_id),
                source,
                source_exposure_date,
                rt,
            }
        })
        .collect()
}

/// Thin pass-through over `Database::generation_time`; kept alongside
/// `reproductive_number_report` since both are registered the same way.
#[must_use]
pub fn generation_time_report(db: &Database) -> Vec<GenerationTimeReportRow> {
    db.generation_time()
        .into_iter()
        .map(|GenerationTimeRow { virus_id, source, source_exposure_date, gentime }| {
            GenerationTimeReportRow { virus_id, source, source_exposure_date, gentime }
        })
        .collect()
}

/// Row-stochastic transition probability matrix, flattened with the same
/// `to * nstates + from` indexing `Database` itself uses, alongside the
/// state count it was computed over so callers don't need to re-derive
/// `nstates` to interpret the flat vector.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionProbabilityReport {
    pub nstates: usize,
    pub probabilities: Vec<f64>,
}

#[must_use]
pub fn transition_probability_report(db: &Database) -> TransitionProbabilityReport {
    TransitionProbabilityReport {
        nstates: db.nstates(),
        probabilities: db.transition_probability(),
    }
}

/// A type-erased derived-statistic value, mirroring the teacher's
/// `ComputedValue` three-variant closed enum (`profiling::computed_statistic`)
/// but over this module's own row types instead of `usize`/`i64`/`f64`.
pub enum StatisticValue {
    TransitionProbability(TransitionProbabilityReport),
    ReproductiveNumber(Vec<ReproductiveNumberReportRow>),
    GenerationTime(Vec<GenerationTimeReportRow>),
}

pub type Computer = Box<dyn Fn(&Database) -> StatisticValue + Send + Sync>;

pub struct RegisteredStatistic {
    pub label: &'static str,
    computer: Computer,
}

/// Holds the set of derived statistics a `Model` run reports. `with_defaults`
/// installs the three spec-mandated statistics; additional entries (e.g. a
/// custom attack-rate calculation) can be registered without `Database`
/// knowing about them.
#[derive(Default)]
pub struct StatisticRegistry {
    entries: Vec<RegisteredStatistic>,
}

impl StatisticRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("transition_probability", |db| {
            StatisticValue::TransitionProbability(transition_probability_report(db))
        });
        registry.register("reproductive_number", |db| {
            StatisticValue::ReproductiveNumber(reproductive_number_report(db))
        });
        registry.register("generation_time", |db| {
            StatisticValue::GenerationTime(generation_time_report(db))
        });
        registry
    }

    pub fn register(
        &mut self,
        label: &'static str,
        computer: impl Fn(&Database) -> StatisticValue + Send + Sync + 'static,
    ) {
        self.entries.push(RegisteredStatistic { label, computer: Box::new(computer) });
    }

    #[must_use]
    pub fn compute_all(&self, db: &Database) -> Vec<(&'static str, StatisticValue)> {
        self.entries.iter().map(|e| (e.label, (e.computer)(db))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reproductive_number_report_joins_virus_name() {
        let mut db = Database::new(2);
        db.reset(3);
        let vid = db.register_virus("alpha", None, 0, -1);
        db.record_transmission(1, 0, 1, vid, 1);
        let rows = reproductive_number_report(&db);
        let row = rows.iter().find(|r| r.source == 0).unwrap();
        assert_eq!(row.virus_name, "alpha");
        assert_eq!(row.rt, 1);
    }

    #[test]
    fn default_registry_computes_three_statistics() {
        let mut db = Database::new(2);
        db.reset(2);
        let registry = StatisticRegistry::with_defaults();
        let results = registry.compute_all(&db);
        assert_eq!(results.len(), 3);
        assert!(results.iter().any(|(label, _)| *label == "transition_probability"));
        assert!(results.iter().any(|(label, _)| *label == "reproductive_number"));
        assert!(results.iter().any(|(label, _)| *label == "generation_time"));
    }
}
