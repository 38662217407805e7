//! Run parameters. The values here drive `main.rs`'s demo binary; the core
//! engine (`Model`) never reads this struct directly — it is the ambient
//! configuration layer that sits above the core, the counterpart of the
//! teacher's `Parameters` global property.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParametersValues {
    pub population: usize,
    pub max_time: f64,
    pub seed: u64,
    pub r_0: f64,
    pub infection_duration: f64,
    pub generation_interval: f64,
    pub report_period: f64,
    /// Proportion of edges touched by a between-step rewire call; 0 disables
    /// rewiring entirely.
    pub rewire_proportion: f64,
    pub nreplicates: usize,
    pub nthreads: usize,
}

impl Default for ParametersValues {
    fn default() -> Self {
        ParametersValues {
            population: 1000,
            max_time: 100.0,
            seed: 0,
            r_0: 2.5,
            infection_duration: 5.0,
            generation_interval: 5.0,
            report_period: 1.0,
            rewire_proportion: 0.0,
            nreplicates: 1,
            nthreads: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_are_self_consistent() {
        let params = ParametersValues::default();
        assert!(params.r_0 >= 0.0);
        assert!(params.generation_interval > 0.0);
    }
}
