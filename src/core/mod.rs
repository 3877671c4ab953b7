pub mod checks;
pub mod compression;
pub mod constants;
pub mod cycles;
pub mod data_table;
pub mod error;
pub mod event;
pub mod format;
pub mod interp;
pub mod plot;
pub mod query;
pub mod resample;
pub mod store;
pub mod tabular;
pub mod timeseries;
