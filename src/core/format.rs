// Structured record of a TimeSeries, for JSON and the .ktks container

use ndarray::{Array1, ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::constants::CompressionType;
use crate::core::data_table::DataTable;
use crate::core::error::{Result, TsError};
use crate::core::event::EventList;
use crate::core::timeseries::{Metadata, TimeSeries};

/// JSON form of one float. JSON has no NaN or infinity, so missing samples
/// are `null` and infinities are the strings `"inf"` and `"-inf"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sample {
    Value(f64),
    Infinite(Infinity),
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Infinity {
    #[serde(rename = "inf")]
    Positive,
    #[serde(rename = "-inf")]
    Negative,
}

impl From<f64> for Sample {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            Sample::Missing
        } else if v == f64::INFINITY {
            Sample::Infinite(Infinity::Positive)
        } else if v == f64::NEG_INFINITY {
            Sample::Infinite(Infinity::Negative)
        } else {
            Sample::Value(v)
        }
    }
}

impl From<Sample> for f64 {
    fn from(s: Sample) -> Self {
        match s {
            Sample::Value(v) => v,
            Sample::Infinite(Infinity::Positive) => f64::INFINITY,
            Sample::Infinite(Infinity::Negative) => f64::NEG_INFINITY,
            Sample::Missing => f64::NAN,
        }
    }
}

/// One channel: its full shape and its values in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub shape: Vec<usize>,
    pub values: Vec<Sample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    pub time: Vec<Sample>,
    #[serde(default)]
    pub time_info: Metadata,
    #[serde(default)]
    pub data_info: BTreeMap<String, Metadata>,
    #[serde(default)]
    pub data: BTreeMap<String, ChannelRecord>,
    #[serde(default)]
    pub events: EventList,
}

/// Fixed-size header of a .ktks file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileHeader {
    pub version: u8,
    pub compression: CompressionType,
    /// Seconds since the Unix epoch.
    pub created: f64,
    pub raw_length: u64,
    pub compressed_length: u64,
}

impl ChannelRecord {
    fn from_array(value: &ArrayD<f64>) -> Self {
        Self {
            shape: value.shape().to_vec(),
            values: value.iter().copied().map(Sample::from).collect(),
        }
    }

    fn into_array(self, key: &str) -> Result<ArrayD<f64>> {
        let values: Vec<f64> = self.values.into_iter().map(f64::from).collect();
        ArrayD::from_shape_vec(IxDyn(&self.shape), values).map_err(|e| {
            TsError::CorruptedData(format!(
                "channel '{}' does not match its declared shape {:?}: {}",
                key, self.shape, e
            ))
        })
    }
}

impl TimeSeries {
    pub fn to_record(&self) -> TimeSeriesRecord {
        TimeSeriesRecord {
            time: self.time.iter().copied().map(Sample::from).collect(),
            time_info: self.time_info.clone(),
            data_info: self.data_info.clone(),
            data: self
                .data
                .iter()
                .map(|(key, value)| (key.clone(), ChannelRecord::from_array(value)))
                .collect(),
            events: self.events.clone(),
        }
    }

    pub fn from_record(record: TimeSeriesRecord) -> Result<Self> {
        let time: Array1<f64> = record.time.into_iter().map(f64::from).collect();
        let n_samples = time.len();
        let mut data = DataTable::new();
        for (key, channel) in record.data {
            let value = channel.into_array(&key)?;
            data.insert(key, value, n_samples)?;
        }
        TimeSeries::from_parts(
            time,
            data,
            record.time_info,
            record.data_info,
            record.events,
        )
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let record: TimeSeriesRecord = serde_json::from_str(json)?;
        Self::from_record(record)
    }
}
