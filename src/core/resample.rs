// Resampling, gap filling and merging

use ndarray::{s, Array1, Array2, ArrayD, Axis, IxDyn};
use serde::Serialize;
use std::fmt;
use tracing::warn;

use crate::core::constants::MIN_VISIBLE_SAMPLES;
use crate::core::error::{Result, TsError};
use crate::core::interp::{FillPolicy, InterpMethod, Interpolator};
use crate::core::timeseries::TimeSeries;

/// Data-quality issue found while interpolating a channel. These never abort
/// the operation; they are logged and returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataWarning {
    /// Fewer than three visible samples; the channel could not be fitted.
    TooFewSamples { key: String, visible: usize },
    /// Missing samples were present and got interpolated over.
    InterpolatedMissing { key: String, missing: usize },
}

impl fmt::Display for DataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataWarning::TooFewSamples { key, visible } => write!(
                f,
                "'{}' has only {} visible sample(s), fewer than {} needed to interpolate",
                key, visible, MIN_VISIBLE_SAMPLES
            ),
            DataWarning::InterpolatedMissing { key, missing } => write!(
                f,
                "'{}' had {} missing sample(s) that were interpolated",
                key, missing
            ),
        }
    }
}

// Channel flattened to (T, width) with its trailing shape
struct Flat {
    rows: Array2<f64>,
    trailing: Vec<usize>,
}

fn flatten(value: &ArrayD<f64>) -> Result<Flat> {
    let n_rows = value.shape()[0];
    let trailing = value.shape()[1..].to_vec();
    let width: usize = trailing.iter().product();
    let rows = value
        .as_standard_layout()
        .into_owned()
        .into_shape((n_rows, width))
        .map_err(|e| TsError::Type(format!("cannot flatten channel: {}", e)))?;
    Ok(Flat { rows, trailing })
}

fn unflatten(rows: Array2<f64>, trailing: &[usize]) -> Result<ArrayD<f64>> {
    let mut shape = vec![rows.nrows()];
    shape.extend_from_slice(trailing);
    rows.into_shape(IxDyn(&shape))
        .map_err(|e| TsError::Type(format!("cannot restore channel shape: {}", e)))
}

fn visible_rows(rows: &Array2<f64>) -> Vec<usize> {
    rows.axis_iter(Axis(0))
        .enumerate()
        .filter(|(_, row)| !row.iter().any(|v| v.is_nan()))
        .map(|(i, _)| i)
        .collect()
}

/// Resample one channel from `time` onto `new_time`, fitting on visible
/// samples only.
pub(crate) fn resample_channel(
    key: &str,
    time: &[f64],
    value: &ArrayD<f64>,
    new_time: &[f64],
    method: InterpMethod,
    fill: FillPolicy,
) -> Result<(ArrayD<f64>, Option<DataWarning>)> {
    let flat = flatten(value)?;
    let width = flat.rows.ncols();
    let visible = visible_rows(&flat.rows);
    let mut out = Array2::<f64>::from_elem((new_time.len(), width), f64::NAN);

    if visible.len() < MIN_VISIBLE_SAMPLES {
        let warning = DataWarning::TooFewSamples {
            key: key.to_string(),
            visible: visible.len(),
        };
        warn!("{}; filled with NaN", warning);
        return Ok((unflatten(out, &flat.trailing)?, Some(warning)));
    }

    let missing = flat.rows.nrows() - visible.len();
    let warning = (missing > 0).then(|| DataWarning::InterpolatedMissing {
        key: key.to_string(),
        missing,
    });
    if let Some(w) = &warning {
        warn!("{}", w);
    }

    let x: Vec<f64> = visible.iter().map(|&i| time[i]).collect();
    for j in 0..width {
        let y: Vec<f64> = visible.iter().map(|&i| flat.rows[[i, j]]).collect();
        let interp = Interpolator::new(method, &x, &y)?;
        for (i, &t) in new_time.iter().enumerate() {
            out[[i, j]] = interp.eval(t, fill);
        }
    }
    Ok((unflatten(out, &flat.trailing)?, warning))
}

impl TimeSeries {
    /// Replace the time vector by `new_time`, interpolating every channel.
    ///
    /// Channels with fewer than three visible samples become all-NaN rather
    /// than failing the whole call.
    pub fn resample(
        &mut self,
        new_time: impl Into<Array1<f64>>,
        method: InterpMethod,
        fill: FillPolicy,
    ) -> Result<Vec<DataWarning>> {
        let new_time: Array1<f64> = new_time.into();
        if new_time.iter().any(|t| t.is_nan()) {
            return Err(TsError::Argument(
                "the new time vector must not contain NaN".to_string(),
            ));
        }
        self.check_well_typed()?;
        self.check_increasing_time()?;

        let time = self.time.to_vec();
        let target = new_time.to_vec();
        let mut warnings = Vec::new();
        for (key, value) in self.data.iter_mut() {
            let (resampled, warning) = resample_channel(key, &time, value, &target, method, fill)?;
            *value = resampled;
            warnings.extend(warning);
        }
        self.time = new_time;
        Ok(warnings)
    }

    /// Interpolate over missing samples, then put NaN back into runs of
    /// more than `max_gap` consecutive missing samples (0 fills every gap).
    pub fn fill_missing_samples(&mut self, max_gap: usize, method: InterpMethod) -> Result<Vec<DataWarning>> {
        self.check_well_typed()?;
        self.check_increasing_time()?;

        let time = self.time.to_vec();
        let mut warnings = Vec::new();
        for (key, value) in self.data.iter_mut() {
            let mut flat = flatten(value)?;
            let visible = visible_rows(&flat.rows);
            let n_rows = flat.rows.nrows();
            if visible.len() == n_rows {
                continue;
            }
            if visible.len() < MIN_VISIBLE_SAMPLES {
                let warning = DataWarning::TooFewSamples {
                    key: key.clone(),
                    visible: visible.len(),
                };
                warn!("{}; left unfilled", warning);
                warnings.push(warning);
                continue;
            }

            let mut is_visible = vec![false; n_rows];
            for &i in &visible {
                is_visible[i] = true;
            }
            let x: Vec<f64> = visible.iter().map(|&i| time[i]).collect();
            for j in 0..flat.rows.ncols() {
                let y: Vec<f64> = visible.iter().map(|&i| flat.rows[[i, j]]).collect();
                let interp = Interpolator::new(method, &x, &y)?;
                for i in (0..n_rows).filter(|&i| !is_visible[i]) {
                    flat.rows[[i, j]] = interp.eval(time[i], FillPolicy::Extrapolate);
                }
            }

            if max_gap > 0 {
                for gap in missing_runs(&is_visible) {
                    if gap.len() > max_gap {
                        flat.rows.slice_mut(s![gap, ..]).fill(f64::NAN);
                    }
                }
            }
            *value = unflatten(flat.rows, &flat.trailing)?;
        }
        Ok(warnings)
    }

    /// Absorb channels and events from `other`.
    ///
    /// `keys` selects the channels to take (empty means all). Without
    /// `resample`, both time vectors must be identical.
    pub fn merge(&mut self, other: &TimeSeries, keys: &[&str], resample: bool, overwrite: bool) -> Result<Vec<DataWarning>> {
        let same_time = self.time.len() == other.time.len()
            && self.time.iter().zip(other.time.iter()).all(|(a, b)| a == b);

        let mut warnings = Vec::new();
        let mut source = other.clone();
        if !same_time {
            if !resample {
                return Err(TsError::TimeMismatch {
                    self_len: self.time.len(),
                    other_len: other.time.len(),
                });
            }
            warnings = source.resample(self.time.clone(), InterpMethod::Linear, FillPolicy::Extrapolate)?;
        }

        let keys: Vec<String> = if keys.is_empty() {
            source.data.keys().cloned().collect()
        } else {
            keys.iter().map(|k| k.to_string()).collect()
        };

        for key in &keys {
            let value = source.data.get(key)?;
            if self.data.contains_key(key) && !overwrite {
                continue;
            }
            self.data.insert(key.clone(), value.clone(), self.time.len())?;
            match source.data_info.get(key) {
                Some(info) => {
                    self.data_info.insert(key.clone(), info.clone());
                }
                None => {
                    self.data_info.remove(key);
                }
            }
        }

        self.events.extend(source.events.iter().cloned());
        self.events.sort(true);
        Ok(warnings)
    }
}

// Index ranges of consecutive `false` entries
fn missing_runs(is_visible: &[bool]) -> Vec<std::ops::Range<usize>> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, &visible) in is_visible.iter().enumerate() {
        match (visible, start) {
            (false, None) => start = Some(i),
            (true, Some(s)) => {
                runs.push(s..i);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(s..is_visible.len());
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use ndarray::{arr1, Array1, Array3};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_resample_linear() {
        let mut ts = TimeSeries::with_time(Array1::range(0.0, 4.0, 1.0));
        ts.add_data("x", arr1(&[0.0, 2.0, 4.0, 6.0])).unwrap();
        let warnings = ts
            .resample(Array1::range(0.0, 4.0, 0.5), InterpMethod::Linear, FillPolicy::default())
            .unwrap();
        assert!(warnings.is_empty());
        let x = ts.get_data("x").unwrap();
        assert_eq!(x.shape(), &[8]);
        assert_eq!(x[[1]], 1.0);
        assert_eq!(x[[6]], 6.0);
        // 3.5 is past the last sample
        assert!(x[[7]].is_nan());
        assert_eq!(ts.time.len(), 8);
    }

    #[test]
    fn test_resample_keeps_trailing_shape() {
        let mut ts = TimeSeries::with_time(Array1::range(0.0, 5.0, 1.0));
        let points = Array3::from_shape_fn((5, 2, 4), |(t, i, j)| (t * 10 + i * 4 + j) as f64);
        ts.add_data("points", points).unwrap();
        ts.resample(vec![0.5, 1.5], InterpMethod::Linear, FillPolicy::default())
            .unwrap();
        let p = ts.get_data("points").unwrap();
        assert_eq!(p.shape(), &[2, 2, 4]);
        assert_eq!(p[[0, 1, 2]], 11.0);
        assert_eq!(p[[1, 0, 3]], 18.0);
    }

    #[test]
    fn test_resample_too_few_visible_samples() {
        let mut ts = TimeSeries::with_time(Array1::range(0.0, 5.0, 1.0));
        ts.add_data("sparse", arr1(&[f64::NAN, 1.0, f64::NAN, 2.0, f64::NAN]))
            .unwrap();
        ts.add_data("full", arr1(&[0.0, 1.0, 2.0, 3.0, 4.0])).unwrap();
        let warnings = ts
            .resample(Array1::linspace(0.0, 4.0, 9), InterpMethod::Linear, FillPolicy::default())
            .unwrap();
        assert_eq!(
            warnings,
            vec![DataWarning::TooFewSamples {
                key: "sparse".to_string(),
                visible: 2
            }]
        );
        let sparse = ts.get_data("sparse").unwrap();
        assert_eq!(sparse.len(), 9);
        assert!(sparse.iter().all(|v| v.is_nan()));
        assert_eq!(ts.get_data("full").unwrap()[[1]], 0.5);
    }

    #[test]
    fn test_resample_warns_on_interpolated_missing() {
        let mut ts = TimeSeries::with_time(Array1::range(0.0, 5.0, 1.0));
        ts.add_data("x", arr1(&[0.0, 1.0, f64::NAN, 3.0, 4.0])).unwrap();
        let warnings = ts
            .resample(Array1::range(0.0, 5.0, 1.0), InterpMethod::Linear, FillPolicy::default())
            .unwrap();
        assert_eq!(
            warnings,
            vec![DataWarning::InterpolatedMissing {
                key: "x".to_string(),
                missing: 1
            }]
        );
        assert_eq!(ts.get_data("x").unwrap()[[2]], 2.0);
    }

    #[test]
    fn test_resample_rejects_nan_target_and_unsorted_time() {
        let mut ts = TimeSeries::with_time(vec![0.0, 1.0, 2.0]);
        let err = ts
            .resample(vec![0.0, f64::NAN], InterpMethod::Linear, FillPolicy::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);

        let mut ts = TimeSeries::with_time(vec![0.0, 2.0, 1.0]);
        let err = ts
            .resample(vec![0.0, 1.0], InterpMethod::Linear, FillPolicy::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }

    #[test]
    fn test_fill_missing_samples_max_gap() {
        let mut ts = TimeSeries::with_time(Array1::range(0.0, 10.0, 1.0));
        let nan = f64::NAN;
        let values = arr1(&[0.0, nan, 2.0, 3.0, nan, nan, nan, 7.0, 8.0, nan]);
        ts.add_data("x", values.clone()).unwrap();
        let mut all = ts.clone();

        ts.fill_missing_samples(2, InterpMethod::Linear).unwrap();
        let x = ts.get_data("x").unwrap();
        assert_eq!(x[[1]], 1.0);
        assert!(x[[4]].is_nan() && x[[5]].is_nan() && x[[6]].is_nan());
        // trailing gap of one sample is extrapolated
        assert_eq!(x[[9]], 9.0);

        all.fill_missing_samples(0, InterpMethod::Linear).unwrap();
        let x = all.get_data("x").unwrap();
        assert!(x.iter().all(|v| !v.is_nan()));
        assert_eq!(x[[5]], 5.0);
    }

    #[test]
    fn test_fill_missing_leaves_sparse_channel() {
        let mut ts = TimeSeries::with_time(Array1::range(0.0, 4.0, 1.0));
        ts.add_data("x", arr1(&[f64::NAN, 1.0, f64::NAN, f64::NAN])).unwrap();
        let warnings = ts.fill_missing_samples(0, InterpMethod::Linear).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(ts.get_data("x").unwrap()[[1]], 1.0);
        assert!(ts.get_data("x").unwrap()[[0]].is_nan());
    }

    #[test]
    fn test_merge_same_time() {
        let mut a = TimeSeries::with_time(vec![0.0, 1.0, 2.0]);
        a.add_data("x", arr1(&[1.0, 1.0, 1.0])).unwrap();
        a.add_event(0.5, "e");
        let mut b = a.clone();
        b.add_data("x", arr1(&[2.0, 2.0, 2.0])).unwrap();
        b.add_data("y", arr1(&[3.0, 3.0, 3.0])).unwrap();
        b.add_data_info("y", "Unit", "N");
        b.add_event(1.5, "f");

        a.merge(&b, &[], false, false).unwrap();
        assert_eq!(a.get_data("x").unwrap()[[0]], 1.0);
        assert_eq!(a.get_data("y").unwrap()[[0]], 3.0);
        assert_eq!(a.unit_of("y"), Some("N"));
        // the shared event is deduplicated
        assert_eq!(a.events.len(), 2);

        a.merge(&b, &["x"], false, true).unwrap();
        assert_eq!(a.get_data("x").unwrap()[[0]], 2.0);

        let err = a.merge(&b, &["missing"], false, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyNotFound);
    }

    #[test]
    fn test_merge_time_mismatch_and_resample() {
        let mut a = TimeSeries::with_time(Array1::linspace(0.0, 1.0, 11));
        let mut b = TimeSeries::with_time(Array1::linspace(0.0, 1.0, 4));
        b.add_data("y", Array1::linspace(0.0, 1.0, 4).mapv(|t| 2.0 * t + 1.0))
            .unwrap();

        let err = a.merge(&b, &[], false, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimeMismatch);

        a.merge(&b, &[], true, false).unwrap();
        let y = a.get_data("y").unwrap();
        assert_eq!(y.len(), 11);
        for (t, v) in a.time.iter().zip(y.iter()) {
            assert!(close(*v, 2.0 * t + 1.0));
        }
    }

    #[test]
    fn test_missing_runs() {
        let runs = missing_runs(&[false, true, false, false, true, false]);
        assert_eq!(runs, vec![0..1, 2..4, 5..6]);
    }
}
