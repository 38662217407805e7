//! Demo driver binary.
//!
//! Loads run parameters, builds a ring-lattice population carrying one
//! generic virus wired to the default susceptible/infected updaters, runs
//! it (replicated and possibly in parallel per the loaded parameters), and
//! writes every report plus profiling data to an output directory.
//!
//! Usage: `epi-engine [parameters-file] [output-dir]`. Both arguments are
//! optional; without a parameters file, `ParametersValues::default()` is
//! used, and without an output directory, `./output` is used.

use epi_engine::model::{Model, ModelConfig, RewirePolicy};
use epi_engine::{
    default_infected_updater, default_susceptible_updater, parameters_loader, profiling, reports,
    AgentId, EngineError, ParametersValues, VirusDef,
};
use std::path::{Path, PathBuf};

/// Neighbor count on each side of the initial ring lattice. Rewiring (when
/// `rewire_proportion > 0`) randomizes the network between this starting
/// topology and an Erdos-Renyi-like graph; the lattice itself only needs to
/// be connected and degree-regular.
const DEFAULT_DEGREE: usize = 4;

/// States for the generic one-virus SIR-shaped demo.
const SUSCEPTIBLE: u32 = 0;
const INFECTED: u32 = 1;
const RECOVERED: u32 = 2;
const STATE_LABELS: [&str; 3] = ["susceptible", "infected", "recovered"];

/// Builds the `sources`/`targets` edge lists for an undirected ring lattice
/// where agent `i` connects to its `k` nearest neighbors on each side.
/// Ported from `graph.rs`'s own test fixture of the same shape.
fn ring_lattice_edges(n: usize, k: usize) -> (Vec<AgentId>, Vec<AgentId>) {
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
    (sources, targets)
}

fn build_model(params: &ParametersValues) -> Model {
    let mut config = ModelConfig::new(3);
    config.set_updater(SUSCEPTIBLE, default_susceptible_updater());
    config.set_updater(INFECTED, default_infected_updater());

    let mut model = Model::new(params.population, config);

    let degree = DEFAULT_DEGREE.min(params.population.saturating_sub(1));
    if degree > 0 {
        let (sources, targets) = ring_lattice_edges(params.population, degree);
        model
            .build_graph(&sources, &targets, false)
            .expect("ring lattice edges are always within [0, population)");
    }
    if params.rewire_proportion > 0.0 {
        model.rewire_policy = Some(RewirePolicy { proportion: params.rewire_proportion });
    }

    let avg_degree = degree.max(1) as f64;
    let prob_infecting = (params.r_0 / (avg_degree * params.infection_duration)).clamp(0.0, 1.0);
    let prob_recovery = (1.0 / params.infection_duration).clamp(0.0, 1.0);
    let prevalence = (1.0 / params.population.max(1) as f64).min(1.0);

    let virus = VirusDef::new("wild_type")
        .with_prevalence(prevalence)
        .with_states(INFECTED as i32, RECOVERED as i32, RECOVERED as i32)
        .with_prob_infecting(prob_infecting)
        .with_prob_recovery(prob_recovery)
        .with_prob_death(0.0);
    model.add_virus_def(virus);

    model
}

fn write_reports(model: &Model, out_dir: &Path) -> Result<(), EngineError> {
    reports::write_all_reports(&model.db, &STATE_LABELS, out_dir)
}

fn run(params: &ParametersValues, output_dir: &Path) -> Result<(), EngineError> {
    let mut model = build_model(params);

    if params.nreplicates <= 1 {
        model.run(params.max_time.round() as u32, params.seed)?;
        write_reports(&model, &output_dir.join("replicate_0"))?;
        log::info!(
            "ran 1 replicate over {} days, final population {}",
            params.max_time.round() as u32,
            model.db.sum_today_total()
        );
    } else {
        let elapsed = model.run_multiple(
            params.max_time.round() as u32,
            params.nreplicates,
            params.seed,
            params.nthreads,
            |i, replicate_model| {
                if let Err(e) = write_reports(replicate_model, &output_dir.join(format!("replicate_{i}"))) {
                    log::error!("failed to write reports for replicate {i}: {e}");
                }
            },
        )?;
        log::info!("ran {} replicates across {} thread(s)", elapsed.len(), params.nthreads);
    }

    Ok(())
}

fn main() -> Result<(), EngineError> {
    env_logger::init();
    profiling::init_default_computed_statistics();

    let args: Vec<String> = std::env::args().collect();
    let parameters = match args.get(1) {
        Some(path) => parameters_loader::load_parameters(path)?,
        None => ParametersValues::default(),
    };
    let output_dir = args.get(2).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("output"));

    log::info!(
        "population={} r_0={} nreplicates={} nthreads={}",
        parameters.population,
        parameters.r_0,
        parameters.nreplicates,
        parameters.nthreads
    );

    run(&parameters, &output_dir)?;

    profiling::write_profiling_data_to_file(output_dir.join("profiling.json"))?;
    profiling::print_profiling_data();
    profiling::print_computed_statistics();

    Ok(())
}
