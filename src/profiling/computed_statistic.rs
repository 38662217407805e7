//! Type-erased computed statistics: a boxed "computer" closure evaluates a
//! statistic from the profiling container on demand, and a boxed "printer"
//! closure formats it. `ComputableType` is sealed so only `usize`/`i64`/`f64`
//! can be registered, keeping `ComputedValue` a closed three-variant enum.

#[cfg(feature = "profiling")]
use super::data::ProfilingDataContainer;
use serde::Serialize;
use std::fmt::Display;

pub type CustomStatisticComputer<T> =
    Box<dyn (Fn(&ProfilingDataContainer) -> Option<T>) + Send + Sync>;
pub type CustomStatisticPrinter<T> = Box<dyn (Fn(T)) + Send + Sync>;

#[cfg(not(feature = "profiling"))]
pub type ProfilingDataContainer = ();

pub(super) enum ComputedStatisticFunctions {
    USize {
        computer: CustomStatisticComputer<usize>,
        printer: CustomStatisticPrinter<usize>,
    },
    Int {
        computer: CustomStatisticComputer<i64>,
        printer: CustomStatisticPrinter<i64>,
    },
    Float {
        computer: CustomStatisticComputer<f64>,
        printer: CustomStatisticPrinter<f64>,
    },
}

impl ComputedStatisticFunctions {
    pub(super) fn compute(&self, container: &ProfilingDataContainer) -> Option<ComputedValue> {
        match self {
            ComputedStatisticFunctions::USize { computer, .. } => computer(container).map(ComputedValue::USize),
            ComputedStatisticFunctions::Int { computer, .. } => computer(container).map(ComputedValue::Int),
            ComputedStatisticFunctions::Float { computer, .. } => computer(container).map(ComputedValue::Float),
        }
    }

    pub(super) fn print(&self, value: ComputedValue) {
        match value {
            ComputedValue::USize(value) => {
                let ComputedStatisticFunctions::USize { printer, .. } = self else {
                    unreachable!()
                };
                (printer)(value);
            }
            ComputedValue::Int(value) => {
                let ComputedStatisticFunctions::Int { printer, .. } = self else {
                    unreachable!()
                };
                (printer)(value);
            }
            ComputedValue::Float(value) => {
                let ComputedStatisticFunctions::Float { printer, .. } = self else {
                    unreachable!()
                };
                (printer)(value);
            }
        }
    }
}

pub(super) struct ComputedStatistic {
    pub label: &'static str,
    pub functions: ComputedStatisticFunctions,
}

mod sealed {
    pub trait SealedComputableType {}
}

#[allow(private_bounds)]
pub trait ComputableType: sealed::SealedComputableType
where
    Self: Sized,
{
    #[allow(private_interfaces)]
    fn new_functions(
        computer: CustomStatisticComputer<Self>,
        printer: CustomStatisticPrinter<Self>,
    ) -> ComputedStatisticFunctions;
}

impl sealed::SealedComputableType for usize {}
impl ComputableType for usize {
    #[allow(private_interfaces)]
    fn new_functions(
        computer: CustomStatisticComputer<Self>,
        printer: CustomStatisticPrinter<Self>,
    ) -> ComputedStatisticFunctions {
        ComputedStatisticFunctions::USize { computer, printer }
    }
}
impl sealed::SealedComputableType for i64 {}
impl ComputableType for i64 {
    #[allow(private_interfaces)]
    fn new_functions(
        computer: CustomStatisticComputer<Self>,
        printer: CustomStatisticPrinter<Self>,
    ) -> ComputedStatisticFunctions {
        ComputedStatisticFunctions::Int { computer, printer }
    }
}
impl sealed::SealedComputableType for f64 {}
impl ComputableType for f64 {
    #[allow(private_interfaces)]
    fn new_functions(
        computer: CustomStatisticComputer<Self>,
        printer: CustomStatisticPrinter<Self>,
    ) -> ComputedStatisticFunctions {
        ComputedStatisticFunctions::Float { computer, printer }
    }
}

#[derive(Copy, Clone, PartialEq, Serialize, Debug)]
pub(super) enum ComputedValue {
    USize(usize),
    Int(i64),
    Float(f64),
}

impl Display for ComputedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputedValue::USize(value) => write!(f, "{value}"),
            ComputedValue::Int(value) => write!(f, "{value}"),
            ComputedValue::Float(value) => write!(f, "{value}"),
        }
    }
}

/// Registers a computed statistic under `label`. A no-op when the
/// `profiling` feature is disabled.
pub fn add_computed_statistic<T: ComputableType>(
    #[allow(unused_variables)] label: &'static str,
    #[allow(unused_variables)] computer: CustomStatisticComputer<T>,
    #[allow(unused_variables)] printer: CustomStatisticPrinter<T>,
) {
    #[cfg(feature = "profiling")]
    super::data::profiling_data().add_computed_statistic(label, computer, printer);
}
