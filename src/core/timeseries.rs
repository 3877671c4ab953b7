// TimeSeries: time vector, channels, events and metadata

use ndarray::{Array, Array1, ArrayD, Axis, Dimension};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::core::constants::{DEFAULT_TIME_UNIT, UNIT_KEY};
use crate::core::data_table::DataTable;
use crate::core::error::{Result, TsError};
use crate::core::event::EventList;
use crate::core::tabular::{self, Table};

/// Free-form key/value metadata.
pub type Metadata = BTreeMap<String, Value>;

/// Time-indexed, multi-channel recording with events.
///
/// All fields are owned, so `clone()` is a deep copy. Invariants between
/// fields are verified on demand through the `check_*` methods rather than
/// on every mutation.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    pub time: Array1<f64>,
    pub data: DataTable,
    pub time_info: Metadata,
    pub data_info: BTreeMap<String, Metadata>,
    pub events: EventList,
}

/// Tolerances used when comparing two TimeSeries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub atol: f64,
    pub rtol: f64,
}

impl Tolerance {
    pub fn exact() -> Self {
        Self { atol: 0.0, rtol: 0.0 }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            atol: 1e-8,
            rtol: 1e-5,
        }
    }
}

pub(crate) fn default_time_info() -> Metadata {
    let mut info = Metadata::new();
    info.insert(UNIT_KEY.to_string(), Value::from(DEFAULT_TIME_UNIT));
    info
}

impl TimeSeries {
    pub fn new() -> Self {
        Self {
            time: Array1::zeros(0),
            data: DataTable::new(),
            time_info: default_time_info(),
            data_info: BTreeMap::new(),
            events: EventList::new(),
        }
    }

    pub fn with_time(time: impl Into<Array1<f64>>) -> Self {
        Self {
            time: time.into(),
            ..Self::new()
        }
    }

    /// Assemble a TimeSeries from explicit fields, verifying that the
    /// result is well shaped.
    pub fn from_parts(
        time: Array1<f64>,
        data: DataTable,
        time_info: Metadata,
        data_info: BTreeMap<String, Metadata>,
        events: EventList,
    ) -> Result<Self> {
        let ts = Self {
            time,
            data,
            time_info,
            data_info,
            events,
        };
        ts.check_well_shaped()?;
        Ok(ts)
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time_unit(&self) -> Option<&str> {
        self.time_info.get(UNIT_KEY).and_then(Value::as_str)
    }

    // --- Data ---

    pub fn add_data<D: Dimension>(&mut self, key: impl Into<String>, value: Array<f64, D>) -> Result<()> {
        self.data.insert(key, value, self.time.len())
    }

    pub fn get_data(&self, key: &str) -> Result<&ArrayD<f64>> {
        self.data.get(key)
    }

    /// Remove a channel and its metadata. Absent keys are ignored.
    pub fn remove_data(&mut self, key: &str) {
        self.data.remove(key);
        self.data_info.remove(key);
    }

    /// Rename a channel together with its metadata entry.
    pub fn rename_data(&mut self, old: &str, new: &str) {
        self.data.rename(old, new);
        if let Some(info) = self.data_info.remove(old) {
            self.data_info.insert(new.to_string(), info);
        }
    }

    // --- Metadata ---

    pub fn add_data_info(&mut self, key: &str, info_key: &str, value: impl Into<Value>) {
        self.data_info
            .entry(key.to_string())
            .or_default()
            .insert(info_key.to_string(), value.into());
    }

    /// Remove one metadata entry. No-op if absent.
    pub fn remove_data_info(&mut self, key: &str, info_key: &str) {
        if let Some(info) = self.data_info.get_mut(key) {
            info.remove(info_key);
        }
    }

    pub fn data_info_value(&self, key: &str, info_key: &str) -> Result<&Value> {
        let info = self.data_info.get(key).ok_or_else(|| TsError::KeyNotFound {
            key: key.to_string(),
            available: self.data_info.len(),
            container: "the TimeSeries' data_info",
        })?;
        info.get(info_key).ok_or_else(|| TsError::KeyNotFound {
            key: info_key.to_string(),
            available: info.len(),
            container: "this channel's data_info",
        })
    }

    pub fn unit_of(&self, key: &str) -> Option<&str> {
        self.data_info
            .get(key)
            .and_then(|info| info.get(UNIT_KEY))
            .and_then(Value::as_str)
    }

    // --- Events ---

    /// Add an event and keep the list sorted and free of exact duplicates.
    pub fn add_event(&mut self, time: f64, name: impl Into<String>) {
        self.events.add(time, name);
        self.events.sort(true);
    }

    pub fn sort_events(&mut self, unique: bool) {
        self.events.sort(unique);
    }

    /// Remove the `occurrence`-th event called `name`. Returns false, with a
    /// warning, if there is no such event.
    pub fn remove_event(&mut self, name: &str, occurrence: usize) -> bool {
        let removed = self.events.remove(name, occurrence);
        if !removed {
            warn!("No occurrence {} of event '{}' to remove", occurrence, name);
        }
        removed
    }

    pub fn rename_event(&mut self, old: &str, new: &str, occurrence: Option<usize>) -> usize {
        let renamed = self.events.rename(old, new, occurrence);
        if renamed == 0 {
            warn!("No event '{}' (occurrence {:?}) to rename", old, occurrence);
        }
        renamed
    }

    pub fn count_events(&self, name: &str) -> usize {
        self.events.count(name)
    }

    /// Time of the `occurrence`-th (time-sorted) event called `name`, or
    /// `None` if it does not exist.
    pub fn event_time(&self, name: &str, occurrence: usize) -> Option<f64> {
        self.events.time_of(name, occurrence)
    }

    pub(crate) fn require_event_time(&self, name: &str, occurrence: usize) -> Result<f64> {
        self.event_time(name, occurrence)
            .ok_or_else(|| TsError::EventNotFound {
                name: name.to_string(),
                occurrence,
                count: self.events.count(name),
            })
    }

    /// Drop events that fall outside the time vector's range.
    pub fn trim_events(&mut self) {
        let min = self.time.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.time.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        self.events.trim(min, max);
    }

    // --- Time ---

    /// Translate time and every event by `delta`.
    pub fn shift(&mut self, delta: f64) {
        self.time.mapv_inplace(|t| t + delta);
        self.events.shift(delta);
    }

    /// Shift so that the given event lands on time zero.
    pub fn sync_event(&mut self, name: &str, occurrence: usize) -> Result<()> {
        let time = self.require_event_time(name, occurrence)?;
        self.shift(-time);
        Ok(())
    }

    /// Sample rate if the time step is constant (to np.isclose default
    /// tolerances), `None` otherwise.
    pub fn sample_rate(&self) -> Option<f64> {
        if self.time.len() < 2 {
            return None;
        }
        let diffs: Vec<f64> = self.time.windows(2).into_iter().map(|w| w[1] - w[0]).collect();
        let mean = diffs.iter().sum::<f64>() / diffs.len() as f64;
        let tol = Tolerance::default();
        if mean > 0.0 && diffs.iter().all(|d| (d - mean).abs() <= tol.atol + tol.rtol * mean.abs()) {
            Some(1.0 / mean)
        } else {
            None
        }
    }

    // --- Subsets ---

    /// Copy containing only the listed channels. Keys that do not exist are
    /// skipped.
    pub fn get_subset(&self, keys: &[&str]) -> TimeSeries {
        let mut out = TimeSeries {
            time: self.time.clone(),
            data: DataTable::new(),
            time_info: self.time_info.clone(),
            data_info: BTreeMap::new(),
            events: self.events.clone(),
        };
        for key in keys {
            if let Ok(value) = self.data.get(key) {
                out.data.insert_unchecked(key.to_string(), value.clone());
            }
            if let Some(info) = self.data_info.get(*key) {
                out.data_info.insert(key.to_string(), info.clone());
            }
        }
        out
    }

    /// True wherever any element of the sample is NaN.
    pub fn is_missing(&self, key: &str) -> Result<Array1<bool>> {
        let value = self.data.get(key)?;
        Ok(missing_mask(value))
    }

    // --- Tabular interchange ---

    pub fn to_table(&self) -> Result<Table> {
        tabular::encode(&self.data, self.time.as_slice().unwrap_or(&self.time.to_vec()))
    }

    pub fn from_table(table: &Table) -> Result<Self> {
        let data = tabular::decode(table)?;
        Ok(Self {
            time: Array1::from(table.index.clone()),
            data,
            ..Self::new()
        })
    }

    // --- Comparison ---

    /// Compare with another TimeSeries, returning the first difference found
    /// as a readable reason.
    pub fn compare(&self, other: &TimeSeries, tol: Tolerance) -> std::result::Result<(), String> {
        if !arrays_close(self.time.view().into_dyn(), other.time.view().into_dyn(), tol) {
            return Err("time is not equal".to_string());
        }
        for key in self.data.keys().chain(other.data.keys()) {
            let (Ok(a), Ok(b)) = (self.data.get(key), other.data.get(key)) else {
                return Err(format!("{} is missing in one of the TimeSeries", key));
            };
            if a.shape() != b.shape() {
                return Err(format!(
                    "{} does not have the same shape in both TimeSeries ({:?} vs {:?})",
                    key,
                    a.shape(),
                    b.shape()
                ));
            }
            if !arrays_close(a.view(), b.view(), tol) {
                return Err(format!("{} is not equal", key));
            }
        }
        if self.time_info != other.time_info {
            return Err("time_info is not equal".to_string());
        }
        if self.data_info != other.data_info {
            return Err("data_info is not equal".to_string());
        }
        if self.events != other.events {
            return Err("events is not equal".to_string());
        }
        Ok(())
    }

    pub fn is_equivalent(&self, other: &TimeSeries, tol: Tolerance) -> bool {
        match self.compare(other, tol) {
            Ok(()) => true,
            Err(reason) => {
                debug!("TimeSeries differ: {}", reason);
                false
            }
        }
    }
}

impl Default for TimeSeries {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for TimeSeries {
    fn eq(&self, other: &Self) -> bool {
        self.is_equivalent(other, Tolerance::exact())
    }
}

pub(crate) fn missing_mask(value: &ArrayD<f64>) -> Array1<bool> {
    value
        .axis_iter(Axis(0))
        .map(|sample| sample.iter().any(|v| v.is_nan()))
        .collect()
}

fn arrays_close(a: ndarray::ArrayViewD<'_, f64>, b: ndarray::ArrayViewD<'_, f64>, tol: Tolerance) -> bool {
    if a.shape() != b.shape() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| {
        if x.is_nan() || y.is_nan() {
            x.is_nan() && y.is_nan()
        } else {
            x == y || (x - y).abs() <= tol.atol + tol.rtol * y.abs()
        }
    })
}
