use std::fmt;
use tabled::Tabled;

/// A wrapper around a float that limits the number of decimal places when printed.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub(crate) struct FloatWrapper {
    pub(crate) value: f64,
    pub(crate) precision: usize, // Number of decimal places to display
}

impl FloatWrapper {
    /// Creates a new `FloatWrapper` with the given value and precision.
    pub fn new(value: f64, precision: usize) -> Self {
        FloatWrapper { value, precision }
    }
}

impl Default for FloatWrapper {
    fn default() -> Self {
        Self {
            value: Default::default(),
            precision: 3,
        }
    }
}

impl fmt::Display for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

impl fmt::Debug for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

/// Table row for display Bus results.
#[derive(Debug, Tabled)]
pub(crate) struct BusResTable {
    pub(crate) bus: i64,
    pub(crate) vm_pu: FloatWrapper,
    pub(crate) va_degree: FloatWrapper,
    pub(crate) p_mw: FloatWrapper,
    pub(crate) q_mvar: FloatWrapper,
}

#[derive(Debug, Tabled)]
pub(crate) struct GenResTable {
    #[tabled(rename = "gen")]
    pub(crate) index: usize,
    pub(crate) bus: i64,
    pub(crate) p_mw: FloatWrapper,
    pub(crate) q_mvar: FloatWrapper,
    pub(crate) vm_pu: FloatWrapper,
}

#[derive(Debug, Tabled)]
pub(crate) struct ExtGridResTable {
    pub(crate) ext_grid: usize,
    pub(crate) bus: i64,
    pub(crate) p_mw: FloatWrapper,
    pub(crate) q_mvar: FloatWrapper,
}

/// Line results with limited decimal precision for output.
#[derive(Debug, Tabled)]
pub(crate) struct LineResTable {
    pub(crate) from: i64,
    pub(crate) to: i64,
    pub(crate) p_from_mw: FloatWrapper,
    pub(crate) q_from_mvar: FloatWrapper,
    pub(crate) p_to_mw: FloatWrapper,
    pub(crate) q_to_mvar: FloatWrapper,
    pub(crate) pl_mw: FloatWrapper,
    pub(crate) i_ka: FloatWrapper,
    pub(crate) loading_percent: FloatWrapper,
}

#[derive(Debug, Tabled)]
pub(crate) struct TrafoResTable {
    pub(crate) hv: i64,
    pub(crate) lv: i64,
    pub(crate) p_hv_mw: FloatWrapper,
    pub(crate) q_hv_mvar: FloatWrapper,
    pub(crate) p_lv_mw: FloatWrapper,
    pub(crate) q_lv_mvar: FloatWrapper,
    pub(crate) pl_mw: FloatWrapper,
    pub(crate) loading_percent: FloatWrapper,
}

#[derive(Debug, Tabled)]
pub(crate) struct LoadResTable {
    pub(crate) load: usize,
    pub(crate) bus: i64,
    pub(crate) p_mw: FloatWrapper,
    pub(crate) q_mvar: FloatWrapper,
}

/// Row of the per-element extrema in a transient summary.
#[derive(Debug, Tabled)]
pub(crate) struct RangeTable {
    pub(crate) element: String,
    pub(crate) min: FloatWrapper,
    pub(crate) max: FloatWrapper,
}
