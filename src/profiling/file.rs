use std::path::Path;
#[cfg(feature = "profiling")]
use std::{
    fs::File,
    io::Write,
    time::{Duration, SystemTime},
};

#[cfg(feature = "profiling")]
use serde::Serialize;

#[cfg(feature = "profiling")]
use crate::profiling::{data::profiling_data, NAMED_COUNTS_HEADERS, NAMED_SPANS_HEADERS};

#[cfg(feature = "profiling")]
#[derive(Serialize)]
struct ProfilingData {
    date_time: SystemTime,
    named_counts_headers: Vec<String>,
    named_counts_data: Vec<(String, usize, f64)>,
    named_spans_headers: Vec<String>,
    named_spans_data: Vec<(String, usize, Duration, f64)>,
}

/// Writes all profiling data (named counts, named spans) to `file_path` as
/// pretty-printed JSON.
#[cfg(feature = "profiling")]
pub fn write_profiling_data_to_file<P: AsRef<Path>>(file_path: P) -> std::io::Result<()> {
    let container = profiling_data();
    let profiling_data = ProfilingData {
        date_time: SystemTime::now(),
        named_counts_headers: NAMED_COUNTS_HEADERS.iter().map(|s| (*s).to_string()).collect(),
        named_counts_data: container.get_named_counts_table(),
        named_spans_headers: NAMED_SPANS_HEADERS.iter().map(|s| (*s).to_string()).collect(),
        named_spans_data: container.get_named_spans_table(),
    };
    drop(container);

    let json = serde_json::to_string_pretty(&profiling_data).expect("ProfilingData serialization failed");
    let mut file = File::create(file_path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

#[cfg(not(feature = "profiling"))]
pub fn write_profiling_data_to_file<P: AsRef<Path>>(_file_path: P) -> std::io::Result<()> {
    Ok(())
}

/// Prints a table with aligned columns, first row as header, first column
/// left-aligned, remaining columns right-aligned.
#[cfg(feature = "profiling")]
fn print_formatted_table(rows: &[Vec<String>]) {
    if rows.len() < 2 {
        return;
    }
    let num_cols = rows[0].len();
    let mut col_widths = vec![0; num_cols];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            col_widths[i] = col_widths[i].max(cell.len());
        }
    }
    for (i, cell) in rows[0].iter().enumerate() {
        if i == 0 {
            print!("{:<width$} ", cell, width = col_widths[i] + 1);
        } else {
            print!("{:>width$} ", cell, width = col_widths[i] + 1);
        }
    }
    println!();
    let total_width: usize = col_widths.iter().map(|w| *w + 1).sum::<usize>() + 2;
    println!("{}", "-".repeat(total_width));
    for row in &rows[1..] {
        for (i, cell) in row.iter().enumerate() {
            if i == 0 {
                print!("{:<width$} ", cell, width = col_widths[i] + 1);
            } else {
                print!("{:>width$} ", cell, width = col_widths[i] + 1);
            }
        }
        println!();
    }
}

#[cfg(feature = "profiling")]
pub(super) fn print_counts_table(counts: &[(String, usize, f64)]) {
    let mut rows = vec![vec!["Event".to_string(), "Count".to_string(), "Rate (per sec)".to_string()]];
    for (label, count, rate) in counts {
        rows.push(vec![label.clone(), count.to_string(), format!("{rate:.2}")]);
    }
    print_formatted_table(&rows);
}

#[cfg(feature = "profiling")]
pub(super) fn print_spans_table(spans: &[(String, usize, Duration, f64)]) {
    let mut rows = vec![vec![
        "Span".to_string(),
        "Count".to_string(),
        "Duration".to_string(),
        "% runtime".to_string(),
    ]];
    for (label, count, duration, pct) in spans {
        rows.push(vec![
            label.clone(),
            count.to_string(),
            humantime::format_duration(*duration).to_string(),
            format!("{pct:.2}%"),
        ]);
    }
    print_formatted_table(&rows);
}
