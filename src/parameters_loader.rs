//! Loads a `ParametersValues` from the YAML-subset parameter file format
//! described in spec §6: one `name: numeric_value` assignment per line,
//! blank lines ignored, and `#`, `//`, or `*` as comment prefixes (the rest
//! of the line is dropped once one of those is seen, so a comment can
//! follow a value on the same line).

use crate::error::{EngineError, Result};
use crate::parameters::ParametersValues;
use std::collections::HashMap;
use std::path::Path;

fn strip_comment(line: &str) -> &str {
    let mut end = line.len();
    for prefix in ['#', '*'] {
        if let Some(idx) = line.find(prefix) {
            end = end.min(idx);
        }
    }
    if let Some(idx) = line.find("//") {
        end = end.min(idx);
    }
    &line[..end]
}

fn parse_assignments(contents: &str) -> Result<HashMap<String, f64>> {
    let mut values = HashMap::new();
    for raw_line in contents.lines() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(EngineError::InvalidArgument(format!(
                "parameter line does not match `name: value`: {raw_line:?}"
            )));
        };
        let name = name.trim();
        let value: f64 = value.trim().parse().map_err(|_| {
            EngineError::InvalidArgument(format!(
                "parameter {name} has a non-numeric value: {raw_line:?}"
            ))
        })?;
        values.insert(name.to_string(), value);
    }
    Ok(values)
}

/// Parses parameter assignments out of `contents` and builds a validated
/// `ParametersValues`, filling in defaults for any field left unset.
pub fn parse_parameters(contents: &str) -> Result<ParametersValues> {
    let values = parse_assignments(contents)?;
    let defaults = ParametersValues::default();
    let params = ParametersValues {
        population: values
            .get("population")
            .map_or(defaults.population, |v| *v as usize),
        max_time: values.get("max_time").copied().unwrap_or(defaults.max_time),
        seed: values.get("seed").map_or(defaults.seed, |v| *v as u64),
        r_0: values.get("r_0").copied().unwrap_or(defaults.r_0),
        infection_duration: values
            .get("infection_duration")
            .copied()
            .unwrap_or(defaults.infection_duration),
        generation_interval: values
            .get("generation_interval")
            .copied()
            .unwrap_or(defaults.generation_interval),
        report_period: values
            .get("report_period")
            .copied()
            .unwrap_or(defaults.report_period),
        rewire_proportion: values
            .get("rewire_proportion")
            .copied()
            .unwrap_or(defaults.rewire_proportion),
        nreplicates: values
            .get("nreplicates")
            .map_or(defaults.nreplicates, |v| *v as usize),
        nthreads: values.get("nthreads").map_or(defaults.nthreads, |v| *v as usize),
    };
    validate(&params)?;
    Ok(params)
}

/// Checks whether parameters loaded from a file are usable before the
/// engine reads them, so a bad `r_0` or generation interval is caught here
/// rather than surfacing as a downstream panic during transmission.
fn validate(parameters: &ParametersValues) -> Result<()> {
    if parameters.r_0 < 0.0 {
        return Err(EngineError::InvalidArgument("r_0 must be a non-negative number".to_string()));
    }
    if parameters.generation_interval <= 0.0 {
        return Err(EngineError::InvalidArgument(
            "generation_interval must be a positive number".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&parameters.rewire_proportion) {
        return Err(EngineError::InvalidArgument(
            "rewire_proportion must be within [0, 1]".to_string(),
        ));
    }
    Ok(())
}

pub fn load_parameters<P: AsRef<Path>>(file_path: P) -> Result<ParametersValues> {
    let contents = std::fs::read_to_string(file_path)?;
    parse_parameters(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assignments_ignoring_comments() {
        let contents = "\
            # a comment line\n\
            population: 1000\n\
            max_time: 100.0 // inline comment\n\
            seed: 7\n\
            r_0: 2.5\n\
            infection_duration: 5\n\
            generation_interval: 5\n\
            report_period: 1\n\
            * another comment style\n\
        ";
        let params = parse_parameters(contents).unwrap();
        assert_eq!(params.population, 1000);
        assert_eq!(params.max_time, 100.0);
        assert_eq!(params.seed, 7);
        assert_eq!(params.r_0, 2.5);
    }

    #[test]
    fn rejects_negative_r0() {
        let contents = "r_0: -1\ngeneration_interval: 5\n";
        assert!(parse_parameters(contents).is_err());
    }

    #[test]
    fn rejects_non_positive_generation_interval() {
        let contents = "r_0: 2.5\ngeneration_interval: 0\n";
        assert!(parse_parameters(contents).is_err());
    }

    #[test]
    fn rejects_malformed_line() {
        let contents = "this is not an assignment\n";
        assert!(parse_parameters(contents).is_err());
    }
}
