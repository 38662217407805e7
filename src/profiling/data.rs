//! Process-global profiling state: named counts and named spans, guarded by
//! a mutex since replicate runs may profile concurrently (`Model::run_multiple`'s
//! `threadpool` path).

use super::Span;
#[cfg(feature = "profiling")]
use super::TOTAL_MEASURED;
#[cfg(feature = "profiling")]
use super::computed_statistic::{ComputableType, ComputedStatistic, CustomStatisticComputer, CustomStatisticPrinter};
#[cfg(feature = "profiling")]
use std::collections::HashMap;
#[cfg(feature = "profiling")]
use std::sync::{Mutex, MutexGuard, OnceLock};
#[cfg(feature = "profiling")]
use std::time::{Duration, Instant};

#[cfg(feature = "profiling")]
static PROFILING_DATA: OnceLock<Mutex<ProfilingDataContainer>> = OnceLock::new();

#[cfg(feature = "profiling")]
#[derive(Default)]
pub(super) struct ProfilingDataContainer {
    pub start_time: Option<Instant>,
    pub counts: HashMap<&'static str, usize>,
    pub spans: HashMap<&'static str, (Duration, usize)>,
    pub open_span_count: usize,
    pub coverage: Option<Instant>,
    computed_statistics: Vec<ComputedStatistic>,
}

/// Tests that panic can poison the mutex; since profiling accuracy doesn't
/// matter across test failures, the poison flag is simply cleared.
#[cfg(feature = "profiling")]
pub(super) fn profiling_data() -> MutexGuard<'static, ProfilingDataContainer> {
    PROFILING_DATA
        .get_or_init(|| Mutex::new(ProfilingDataContainer::default()))
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(feature = "profiling")]
impl ProfilingDataContainer {
    pub fn increment_named_count(&mut self, key: &'static str) {
        self.init_start_time();
        self.counts.entry(key).and_modify(|v| *v += 1).or_insert(1);
    }

    pub fn get_named_count(&self, key: &'static str) -> Option<usize> {
        self.counts.get(&key).copied()
    }

    fn init_start_time(&mut self) {
        if self.start_time.is_none() {
            self.start_time = Some(Instant::now());
        }
    }

    fn open_span(&mut self, label: &'static str) -> Span {
        self.init_start_time();
        if self.open_span_count == 0 {
            self.coverage = Some(Instant::now());
        }
        self.open_span_count += 1;
        Span::new(label)
    }

    /// Called from `Span::drop`, never directly.
    pub(super) fn close_span(&mut self, span: &Span) {
        self.open_span_count -= 1;
        if self.open_span_count == 0 {
            let coverage = self
                .coverage
                .take()
                .expect("coverage start must be set while a span is open");
            self.close_span_without_coverage(TOTAL_MEASURED, coverage.elapsed());
        }
        self.close_span_without_coverage(span.label, span.start_time.elapsed());
    }

    fn close_span_without_coverage(&mut self, label: &'static str, elapsed: Duration) {
        self.spans
            .entry(label)
            .and_modify(|(time, count)| {
                *time += elapsed;
                *count += 1;
            })
            .or_insert((elapsed, 1));
    }

    pub fn add_computed_statistic<T: ComputableType>(
        &mut self,
        label: &'static str,
        computer: CustomStatisticComputer<T>,
        printer: CustomStatisticPrinter<T>,
    ) {
        self.computed_statistics.push(ComputedStatistic {
            label,
            functions: T::new_functions(computer, printer),
        });
    }

    /// Evaluates and prints every registered computed statistic, skipping
    /// ones whose computer currently returns `None`. Each printer closure is
    /// responsible for its own formatting, including the statistic's label.
    pub fn print_computed_statistics(&self) {
        for stat in &self.computed_statistics {
            if let Some(value) = stat.functions.compute(self) {
                log::info!("{}", stat.label);
                stat.functions.print(value);
            }
        }
    }

    pub(super) fn get_named_counts_table(&self) -> Vec<(String, usize, f64)> {
        let elapsed = self.start_time.map_or(f64::EPSILON, |t| t.elapsed().as_secs_f64().max(f64::EPSILON));
        self.counts
            .iter()
            .map(|(key, count)| ((*key).to_string(), *count, *count as f64 / elapsed))
            .collect()
    }

    pub(super) fn get_named_spans_table(&self) -> Vec<(String, usize, Duration, f64)> {
        let elapsed = self.start_time.map_or(f64::EPSILON, |t| t.elapsed().as_secs_f64().max(f64::EPSILON));
        let mut rows: Vec<_> = self
            .spans
            .iter()
            .filter(|(k, _)| **k != TOTAL_MEASURED)
            .map(|(&label, &(duration, count))| {
                (label.to_string(), count, duration, duration.as_secs_f64() / elapsed * 100.0)
            })
            .collect();
        if let Some(&(duration, count)) = self.spans.get(TOTAL_MEASURED) {
            rows.push((
                TOTAL_MEASURED.to_string(),
                count,
                duration,
                duration.as_secs_f64() / elapsed * 100.0,
            ));
        }
        rows
    }
}

pub fn increment_named_count(#[allow(unused_variables)] key: &'static str) {
    #[cfg(feature = "profiling")]
    profiling_data().increment_named_count(key);
}

#[cfg(feature = "profiling")]
pub fn open_span(label: &'static str) -> Span {
    profiling_data().open_span(label)
}

#[cfg(not(feature = "profiling"))]
pub fn open_span(label: &'static str) -> Span {
    Span::new(label)
}

#[cfg(feature = "profiling")]
pub(super) fn close_span(span: &Span) {
    profiling_data().close_span(span);
}

/// Prints named counts and named spans to stdout.
pub fn print_profiling_data() {
    #[cfg(feature = "profiling")]
    {
        let (counts, spans) = {
            let container = profiling_data();
            (container.get_named_counts_table(), container.get_named_spans_table())
        };
        println!();
        super::file::print_counts_table(&counts);
        println!();
        super::file::print_spans_table(&spans);
    }
}

#[cfg(test)]
#[cfg(feature = "profiling")]
mod tests {
    use super::*;

    #[test]
    fn increment_and_read_back() {
        increment_named_count("unit test event");
        let count = profiling_data().get_named_count("unit test event");
        assert!(count.unwrap_or(0) >= 1);
    }

    #[test]
    fn span_records_duration_on_drop() {
        {
            let _span = open_span("unit test span");
            std::thread::sleep(Duration::from_millis(1));
        }
        let rows = profiling_data().get_named_spans_table();
        assert!(rows.iter().any(|(label, ..)| label == "unit test span"));
    }
}
