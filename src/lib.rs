// Kinetics TimeSeries toolkit
// Main library entry point

pub mod core;

// Re-export main types
pub use core::constants::CompressionType;
pub use core::cycles::{
    detect_cycles, most_repeatable_cycles, stack, time_normalize, time_normalize_span, unstack, CrossingDirection,
    CycleDetection,
};
pub use core::data_table::DataTable;
pub use core::error::{ErrorKind, Result, Tier, TsError};
pub use core::event::{Event, EventList};
pub use core::format::{ChannelRecord, Sample, TimeSeriesRecord};
pub use core::interp::{FillPolicy, InterpMethod};
pub use core::plot::{PlotLine, PlotView};
pub use core::resample::DataWarning;
pub use core::store::{load_series, read_series, write_series, TimeSeriesFile};
pub use core::tabular::Table;
pub use core::timeseries::{Metadata, TimeSeries, Tolerance};
