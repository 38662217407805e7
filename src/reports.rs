//! §6 external text outputs: the whitespace-separated, one-header-row
//! files a driver writes after a run (`virus_info.csv`, `virus_hist.csv`,
//! `tool_info.csv`, `tool_hist.csv`, `total_hist.csv`, `transmission.csv`,
//! `transition.csv`, `reproductive_number.csv`, `generation_time.csv`).
//!
//! The teacher writes reports with `ixa`'s `define_report!`/
//! `ContextReportExt`, neither of which is part of this crate's scope (§1:
//! file I/O of results is an external collaborator). `Report<T>` is the
//! direct counterpart, built directly on the `csv` crate the teacher already
//! depends on: one `#[derive(Serialize)]` row struct per file, written with
//! `csv::WriterBuilder` configured with a space delimiter, since spec §6
//! calls for whitespace-separated output, not comma.

use crate::computed_statistics::{
    generation_time_report, reproductive_number_report, GenerationTimeReportRow,
    ReproductiveNumberReportRow,
};
use crate::database::Database;
use crate::error::{EngineError, Result};
use serde::Serialize;
use std::path::Path;

/// A minimal CSV report writer: one row struct, one output file, a header
/// row written automatically from the struct's field names by `csv`.
pub struct Report<T: Serialize> {
    writer: csv::Writer<std::fs::File>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Serialize> Report<T> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let writer = csv::WriterBuilder::new()
            .delimiter(b' ')
            .from_path(path.as_ref())
            .map_err(|e| EngineError::IOFailure(format!("{}: {e}", path.as_ref().display())))?;
        Ok(Self { writer, _marker: std::marker::PhantomData })
    }

    pub fn write_row(&mut self, row: &T) -> Result<()> {
        self.writer.serialize(row)?;
        Ok(())
    }

    pub fn write_rows(&mut self, rows: impl IntoIterator<Item = T>) -> Result<()> {
        for row in rows {
            self.write_row(&row)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct VirusInfoRow<'a> {
    virus_id: i32,
    virus_name: &'a str,
    sequence: String,
    date_first_recorded: i32,
    parent_virus_id: i32,
}

pub fn write_virus_info(db: &Database, path: impl AsRef<Path>) -> Result<()> {
    let mut report = Report::create(path)?;
    for (id, entry) in db.virus_registry().iter().enumerate() {
        report.write_row(&VirusInfoRow {
            virus_id: id as i32,
            virus_name: &entry.name,
            sequence: entry.sequence.clone().unwrap_or_default(),
            date_first_recorded: entry.date_first_recorded,
            parent_virus_id: entry.parent_virus_id,
        })?;
    }
    report.flush()
}

#[derive(Serialize)]
struct VirusHistRow<'a> {
    date: i32,
    virus_id: i32,
    virus_name: &'a str,
    state_label: &'a str,
    count: i64,
}

pub fn write_virus_hist(db: &Database, state_labels: &[&str], path: impl AsRef<Path>) -> Result<()> {
    let mut report = Report::create(path)?;
    for &(date, virus_id, state, count) in db.history_virus() {
        let name = db
            .virus_registry()
            .get(virus_id.max(0) as usize)
            .map_or("unknown", |e| e.name.as_str());
        report.write_row(&VirusHistRow {
            date,
            virus_id,
            virus_name: name,
            state_label: label_for(state_labels, state),
            count,
        })?;
    }
    report.flush()
}

#[derive(Serialize)]
struct ToolInfoRow<'a> {
    id: i32,
    tool_name: &'a str,
    sequence: String,
    date_first_recorded: i32,
}

pub fn write_tool_info(db: &Database, path: impl AsRef<Path>) -> Result<()> {
    let mut report = Report::create(path)?;
    for (id, entry) in db.tool_registry().iter().enumerate() {
        report.write_row(&ToolInfoRow {
            id: id as i32,
            tool_name: &entry.name,
            sequence: entry.sequence.clone().unwrap_or_default(),
            date_first_recorded: entry.date_first_recorded,
        })?;
    }
    report.flush()
}

#[derive(Serialize)]
struct ToolHistRow<'a> {
    date: i32,
    id: i32,
    state_label: &'a str,
    count: i64,
}

pub fn write_tool_hist(db: &Database, state_labels: &[&str], path: impl AsRef<Path>) -> Result<()> {
    let mut report = Report::create(path)?;
    for &(date, tool_id, state, count) in db.history_tool() {
        report.write_row(&ToolHistRow {
            date,
            id: tool_id,
            state_label: label_for(state_labels, state),
            count,
        })?;
    }
    report.flush()
}

#[derive(Serialize)]
struct TotalHistRow<'a> {
    date: i32,
    n_active_viruses: usize,
    state_label: &'a str,
    count: i64,
}

/// `n_active_viruses` for a given date is the number of distinct registered
/// viruses with a nonzero carrier count summed across states on that date.
fn active_virus_counts_by_date(db: &Database) -> std::collections::HashMap<i32, usize> {
    let mut totals: std::collections::BTreeMap<(i32, i32), i64> = std::collections::BTreeMap::new();
    for &(date, virus_id, _state, count) in db.history_virus() {
        *totals.entry((date, virus_id)).or_insert(0) += count;
    }
    let mut by_date: std::collections::HashMap<i32, usize> = std::collections::HashMap::new();
    for ((date, _virus_id), total) in totals {
        if total > 0 {
            *by_date.entry(date).or_insert(0) += 1;
        }
    }
    by_date
}

pub fn write_total_hist(db: &Database, state_labels: &[&str], path: impl AsRef<Path>) -> Result<()> {
    let active_by_date = active_virus_counts_by_date(db);
    let mut report = Report::create(path)?;
    for &(date, state, count) in db.history_total() {
        report.write_row(&TotalHistRow {
            date,
            n_active_viruses: active_by_date.get(&date).copied().unwrap_or(0),
            state_label: label_for(state_labels, state),
            count,
        })?;
    }
    report.flush()
}

#[derive(Serialize)]
struct TransmissionRow<'a> {
    date: i32,
    virus_id: i32,
    virus_name: &'a str,
    source_exposure_date: i32,
    source: usize,
    target: usize,
}

pub fn write_transmission(db: &Database, path: impl AsRef<Path>) -> Result<()> {
    let mut report = Report::create(path)?;
    for t in db.transmissions() {
        let name = db
            .virus_registry()
            .get(t.virus_id.max(0) as usize)
            .map_or("unknown", |e| e.name.as_str());
        report.write_row(&TransmissionRow {
            date: t.date,
            virus_id: t.virus_id,
            virus_name: name,
            source_exposure_date: t.source_exposure_date,
            source: t.source,
            target: t.target,
        })?;
    }
    report.flush()
}

#[derive(Serialize)]
struct TransitionRow<'a> {
    date: i32,
    from_label: &'a str,
    to_label: &'a str,
    counts: i64,
}

/// One row per `(date, from, to)` triple for every day recorded, including
/// zero-count pairs, per spec §6's "for each day d ... and each (from,to)
/// pair".
pub fn write_transition(db: &Database, state_labels: &[&str], path: impl AsRef<Path>) -> Result<()> {
    let mut report = Report::create(path)?;
    let nstates = db.nstates();
    for snapshot in db.history_transition() {
        for from in 0..nstates {
            for to in 0..nstates {
                let counts = snapshot.matrix[to * nstates + from];
                report.write_row(&TransitionRow {
                    date: snapshot.date,
                    from_label: label_for(state_labels, from as u32),
                    to_label: label_for(state_labels, to as u32),
                    counts,
                })?;
            }
        }
    }
    report.flush()
}

pub fn write_reproductive_number(db: &Database, path: impl AsRef<Path>) -> Result<()> {
    let mut report: Report<ReproductiveNumberReportRow> = Report::create(path)?;
    report.write_rows(reproductive_number_report(db))?;
    report.flush()
}

pub fn write_generation_time(db: &Database, path: impl AsRef<Path>) -> Result<()> {
    let mut report: Report<GenerationTimeReportRow> = Report::create(path)?;
    report.write_rows(generation_time_report(db))?;
    report.flush()
}

fn label_for<'a>(labels: &'a [&'a str], state: u32) -> &'a str {
    labels.get(state as usize).copied().unwrap_or("unknown")
}

/// Writes all nine §6 output files into `out_dir`, creating it if it does
/// not yet exist. `state_labels[i]` names state `i`; states beyond the
/// supplied slice print as `"unknown"` rather than failing the whole run.
pub fn write_all_reports(db: &Database, state_labels: &[&str], out_dir: impl AsRef<Path>) -> Result<()> {
    let out_dir = out_dir.as_ref();
    std::fs::create_dir_all(out_dir)?;
    write_virus_info(db, out_dir.join("virus_info.csv"))?;
    write_virus_hist(db, state_labels, out_dir.join("virus_hist.csv"))?;
    write_tool_info(db, out_dir.join("tool_info.csv"))?;
    write_tool_hist(db, state_labels, out_dir.join("tool_hist.csv"))?;
    write_total_hist(db, state_labels, out_dir.join("total_hist.csv"))?;
    write_transmission(db, out_dir.join("transmission.csv"))?;
    write_transition(db, state_labels, out_dir.join("transition.csv"))?;
    write_reproductive_number(db, out_dir.join("reproductive_number.csv"))?;
    write_generation_time(db, out_dir.join("generation_time.csv"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_db() -> Database {
        let mut db = Database::new(2);
        db.reset(3);
        let vid = db.register_virus("v", None, 0, -1);
        db.note_state(0, -1);
        db.note_state(1, 1);
        db.note_virus_state(vid, 1, 1);
        db.record_transition(0, 1);
        db.record_transmission(0, 0, 1, vid, 0);
        db.record(0);
        db
    }

    #[test]
    fn write_all_reports_creates_every_file() {
        let db = sample_db();
        let dir = tempdir().unwrap();
        write_all_reports(&db, &["S", "I"], dir.path()).unwrap();

        for name in [
            "virus_info.csv",
            "virus_hist.csv",
            "tool_info.csv",
            "tool_hist.csv",
            "total_hist.csv",
            "transmission.csv",
            "transition.csv",
            "reproductive_number.csv",
            "generation_time.csv",
        ] {
            assert!(dir.path().join(name).exists(), "missing {name}");
        }
    }

    #[test]
    fn transmission_csv_contains_virus_name_and_endpoints() {
        let db = sample_db();
        let dir = tempdir().unwrap();
        let path = dir.path().join("transmission.csv");
        write_transmission(&db, &path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains('v'));
        assert!(contents.contains('0'));
        assert!(contents.contains('1'));
    }

    #[test]
    fn transition_csv_includes_every_from_to_pair_per_day() {
        let db = sample_db();
        let dir = tempdir().unwrap();
        let path = dir.path().join("transition.csv");
        write_transition(&db, &["S", "I"], &path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        // 1 recorded day * 2 states * 2 states = 4 data rows + 1 header
        assert_eq!(contents.lines().count(), 5);
    }
}
