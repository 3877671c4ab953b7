// Index lookup and slicing
//
// Every slice is a fresh TimeSeries. Events are copied whole; call
// `trim_events` on the result to drop those outside the new range.

use ndarray::{Axis, Slice};
use std::ops::Range;

use crate::core::data_table::DataTable;
use crate::core::error::{Result, TsError};
use crate::core::timeseries::TimeSeries;

impl TimeSeries {
    /// Index of the sample closest to `time`. Ties go to the lower index.
    pub fn index_at(&self, time: f64) -> Result<usize> {
        self.check_sortable_query()?;
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, t) in self.time.iter().enumerate() {
            let dist = (t - time).abs();
            if dist < best_dist {
                best = i;
                best_dist = dist;
            }
        }
        Ok(best)
    }

    /// Last index whose time is before `time` (or equal, if inclusive).
    pub fn index_before(&self, time: f64, inclusive: bool) -> Result<Option<usize>> {
        self.check_sortable_query()?;
        Ok(self
            .time
            .iter()
            .rposition(|&t| if inclusive { t <= time } else { t < time }))
    }

    /// First index whose time is after `time` (or equal, if inclusive).
    pub fn index_after(&self, time: f64, inclusive: bool) -> Result<Option<usize>> {
        self.check_sortable_query()?;
        Ok(self
            .time
            .iter()
            .position(|&t| if inclusive { t >= time } else { t > time }))
    }

    // --- By index ---

    pub fn before_index(&self, index: usize, inclusive: bool) -> Result<TimeSeries> {
        self.check_index(index)?;
        let end = if inclusive { index + 1 } else { index };
        Ok(self.select_rows(0..end))
    }

    pub fn after_index(&self, index: usize, inclusive: bool) -> Result<TimeSeries> {
        self.check_index(index)?;
        let start = if inclusive { index } else { index + 1 };
        Ok(self.select_rows(start..self.time.len()))
    }

    pub fn between_indexes(&self, index1: usize, index2: usize, inclusive: bool) -> Result<TimeSeries> {
        self.check_index(index1)?;
        self.check_index(index2)?;
        let (lo, hi) = if index1 <= index2 { (index1, index2) } else { (index2, index1) };
        let range = if inclusive { lo..hi + 1 } else { (lo + 1)..hi.max(lo + 1) };
        Ok(self.select_rows(range))
    }

    /// Single-sample TimeSeries at the sample closest to `time`.
    pub fn at_time(&self, time: f64) -> Result<TimeSeries> {
        let index = self.index_at(time)?;
        Ok(self.select_rows(index..index + 1))
    }

    // --- By time ---

    pub fn before_time(&self, time: f64, inclusive: bool) -> Result<TimeSeries> {
        self.check_sortable_query()?;
        let end = self
            .time
            .iter()
            .position(|&t| if inclusive { t > time } else { t >= time })
            .unwrap_or(self.time.len());
        Ok(self.select_rows(0..end))
    }

    pub fn after_time(&self, time: f64, inclusive: bool) -> Result<TimeSeries> {
        let start = self.index_after(time, inclusive)?.unwrap_or(self.time.len());
        Ok(self.select_rows(start..self.time.len()))
    }

    /// Samples between two times; argument order does not matter.
    pub fn between_times(&self, time1: f64, time2: f64, inclusive: bool) -> Result<TimeSeries> {
        let (lo, hi) = if time1 <= time2 { (time1, time2) } else { (time2, time1) };
        let start = self.index_after(lo, inclusive)?.unwrap_or(self.time.len());
        let end = self
            .index_before(hi, inclusive)?
            .map(|i| i + 1)
            .unwrap_or(0)
            .max(start);
        Ok(self.select_rows(start..end))
    }

    // --- By event ---

    pub fn at_event(&self, name: &str, occurrence: usize) -> Result<TimeSeries> {
        let time = self.require_event_time(name, occurrence)?;
        self.at_time(time)
    }

    pub fn before_event(&self, name: &str, occurrence: usize, inclusive: bool) -> Result<TimeSeries> {
        let time = self.require_event_time(name, occurrence)?;
        self.before_time(time, inclusive)
    }

    pub fn after_event(&self, name: &str, occurrence: usize, inclusive: bool) -> Result<TimeSeries> {
        let time = self.require_event_time(name, occurrence)?;
        self.after_time(time, inclusive)
    }

    pub fn between_events(
        &self,
        name1: &str,
        name2: &str,
        occurrence1: usize,
        occurrence2: usize,
        inclusive: bool,
    ) -> Result<TimeSeries> {
        let time1 = self.require_event_time(name1, occurrence1)?;
        let time2 = self.require_event_time(name2, occurrence2)?;
        self.between_times(time1, time2, inclusive)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.time.len() {
            return Err(TsError::Argument(format!(
                "index {} is out of range for a TimeSeries of {} samples",
                index,
                self.time.len()
            )));
        }
        Ok(())
    }

    // Copy of rows `range` of time and every channel
    pub(crate) fn select_rows(&self, range: Range<usize>) -> TimeSeries {
        let slice = Slice::from(range);
        let mut data = DataTable::new();
        for (key, value) in self.data.iter() {
            data.insert_unchecked(key.clone(), value.slice_axis(Axis(0), slice).to_owned());
        }
        TimeSeries {
            time: self.time.slice_axis(Axis(0), slice).to_owned(),
            data,
            time_info: self.time_info.clone(),
            data_info: self.data_info.clone(),
            events: self.events.clone(),
        }
    }
}
