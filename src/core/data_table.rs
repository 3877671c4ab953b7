// Channel storage: name -> N-dimensional array with time on the first axis

use ndarray::{Array, ArrayD, Dimension};
use std::collections::BTreeMap;

use crate::core::error::{Result, TsError};

/// Mapping from channel name to an array of shape `(T, d1, ..., dk)`.
///
/// Every channel shares the same first-axis length; inserting anything
/// else is rejected rather than truncated or padded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    channels: BTreeMap<String, ArrayD<f64>>,
}

impl DataTable {
    pub fn new() -> Self {
        Self {
            channels: BTreeMap::new(),
        }
    }

    /// Insert a channel, checking its first axis against `time_len` (when
    /// non-zero) and against the channels already present.
    pub fn insert<D: Dimension>(
        &mut self,
        key: impl Into<String>,
        value: Array<f64, D>,
        time_len: usize,
    ) -> Result<()> {
        let key = key.into();
        validate_key(&key)?;
        let value = value.into_dyn();
        if value.ndim() == 0 {
            return Err(TsError::Type(format!(
                "channel '{}' must have at least one dimension (time), got a scalar",
                key
            )));
        }
        let got = value.shape()[0];

        if time_len > 0 && got != time_len {
            return Err(TsError::ShapeMismatch {
                key,
                expected: time_len,
                got,
                against: "time vector",
            });
        }
        if let Some(expected) = self.length_excluding(&key) {
            if got != expected {
                return Err(TsError::ShapeMismatch {
                    key,
                    expected,
                    got,
                    against: "existing channels",
                });
            }
        }

        self.channels.insert(key, value);
        Ok(())
    }

    // Insert without any check. Callers must keep the shape invariant.
    pub(crate) fn insert_unchecked(&mut self, key: String, value: ArrayD<f64>) {
        self.channels.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Result<&ArrayD<f64>> {
        self.channels.get(key).ok_or_else(|| self.not_found(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Result<&mut ArrayD<f64>> {
        let available = self.channels.len();
        self.channels
            .get_mut(key)
            .ok_or_else(|| TsError::KeyNotFound {
                key: key.to_string(),
                available,
                container: "the TimeSeries' data",
            })
    }

    /// Remove a channel. Absent keys are ignored.
    pub fn remove(&mut self, key: &str) -> Option<ArrayD<f64>> {
        self.channels.remove(key)
    }

    /// Move a channel to a new name. No-op if `old` is absent.
    pub fn rename(&mut self, old: &str, new: &str) {
        if let Some(value) = self.channels.remove(old) {
            self.channels.insert(new.to_string(), value);
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.channels.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.channels.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArrayD<f64>)> {
        self.channels.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut ArrayD<f64>)> {
        self.channels.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Shared first-axis length, if any channel is present.
    pub fn n_samples(&self) -> Option<usize> {
        self.channels.values().next().map(|v| v.shape()[0])
    }

    fn length_excluding(&self, key: &str) -> Option<usize> {
        self.channels
            .iter()
            .find(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v.shape()[0])
    }

    fn not_found(&self, key: &str) -> TsError {
        TsError::KeyNotFound {
            key: key.to_string(),
            available: self.channels.len(),
            container: "the TimeSeries' data",
        }
    }
}

// Brackets are reserved for the flattened column names of the tabular codec
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(TsError::Type("channel name must not be empty".to_string()));
    }
    if key.contains('[') || key.contains(']') {
        return Err(TsError::Type(format!(
            "channel name '{}' must not contain brackets",
            key
        )));
    }
    Ok(())
}
