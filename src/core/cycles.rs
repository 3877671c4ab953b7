// Cycle detection, time-normalization and cycle stacking

use ndarray::{concatenate, Array1, ArrayD, ArrayView, Axis, IxDyn};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::core::constants::{CYCLE_END_EVENT, NORMALIZED_TIME_UNIT, UNIT_KEY};
use crate::core::error::{Result, TsError};
use crate::core::event::Event;
use crate::core::interp::{FillPolicy, InterpMethod};
use crate::core::resample::{resample_channel, DataWarning};
use crate::core::timeseries::TimeSeries;

/// Which way the signal crosses `threshold_rise` to start a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossingDirection {
    /// A cycle starts when the signal reaches `threshold_rise` from below
    /// and its second phase when it drops back to `threshold_fall`.
    #[default]
    Rising,
    /// Mirror image: start at or under `threshold_rise`, second phase at or
    /// over `threshold_fall`.
    Falling,
}

/// Parameters of the dual-threshold cycle detector.
///
/// "Rise" names the first phase of a cycle and "fall" the second one,
/// whatever the crossing direction.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleDetection {
    pub rise_event: String,
    pub fall_event: String,
    pub direction: CrossingDirection,
    /// Crossing this value (inclusive) starts the first phase.
    pub threshold_rise: f64,
    /// Crossing this value (inclusive) starts the second phase.
    pub threshold_fall: f64,
    /// Shorter rise phases are discarded together with their fall.
    pub min_rise_duration: f64,
    pub max_rise_duration: f64,
    /// Minimum time between the previous fall and the next rise.
    pub min_fall_duration: f64,
    /// Time from a fall to the next rise. The last cycle has no next rise,
    /// so it is kept only when this is infinite.
    pub max_fall_duration: f64,
    /// Bounds on the extremum reached during the first phase: the maximum
    /// for rising cycles, the minimum for falling ones.
    pub min_rise_peak: f64,
    pub max_rise_peak: f64,
    /// Bounds on the opposite extremum reached during the second phase.
    pub min_fall_peak: f64,
    pub max_fall_peak: f64,
    /// When set, an event with this name is added where each kept cycle
    /// ends, i.e. at the next rise.
    pub cycle_end_event: Option<String>,
}

impl Default for CycleDetection {
    fn default() -> Self {
        Self {
            rise_event: "push".to_string(),
            fall_event: "recovery".to_string(),
            direction: CrossingDirection::Rising,
            threshold_rise: 5.0,
            threshold_fall: 2.0,
            min_rise_duration: 0.1,
            max_rise_duration: f64::INFINITY,
            min_fall_duration: 0.2,
            max_fall_duration: f64::INFINITY,
            min_rise_peak: f64::NEG_INFINITY,
            max_rise_peak: f64::INFINITY,
            min_fall_peak: f64::NEG_INFINITY,
            max_fall_peak: f64::INFINITY,
            cycle_end_event: None,
        }
    }
}

impl CycleDetection {
    fn starts_rise(&self, v: f64) -> bool {
        match self.direction {
            CrossingDirection::Rising => v >= self.threshold_rise,
            CrossingDirection::Falling => v <= self.threshold_rise,
        }
    }

    fn starts_fall(&self, v: f64) -> bool {
        match self.direction {
            CrossingDirection::Rising => v <= self.threshold_fall,
            CrossingDirection::Falling => v >= self.threshold_fall,
        }
    }

    fn rise_peak(&self, values: &[f64]) -> f64 {
        match self.direction {
            CrossingDirection::Rising => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            CrossingDirection::Falling => values.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }

    fn fall_peak(&self, values: &[f64]) -> f64 {
        match self.direction {
            CrossingDirection::Rising => values.iter().copied().fold(f64::INFINITY, f64::min),
            CrossingDirection::Falling => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    // Waiting for a first crossing of the fall threshold, so that the first
    // detected cycle is complete
    Seeking,
    WaitingForRise,
    WaitingForFall { rise: usize, previous_event: f64 },
}

// Sample indexes of one debounced cycle
#[derive(Debug, Clone, Copy)]
struct Candidate {
    rise: usize,
    fall: usize,
}

/// Copy of `ts` with rise and fall events added on the channel `key`.
///
/// Only complete cycles are kept: a leading partial rise and a trailing
/// rise with no fall are discarded.
pub fn detect_cycles(ts: &TimeSeries, key: &str, params: &CycleDetection) -> Result<TimeSeries> {
    ts.check_increasing_time()?;
    let value = ts.get_data(key)?;
    if value.ndim() != 1 {
        return Err(TsError::Argument(format!(
            "cycle detection needs a one-dimensional channel, but '{}' has shape {:?}",
            key,
            value.shape()
        )));
    }
    let time = ts.time.to_vec();
    let values: Vec<f64> = value.iter().copied().collect();

    let mut candidates: Vec<Candidate> = Vec::new();
    let mut phase = Phase::Seeking;
    let mut last_event: Option<f64> = None;

    for (i, (&t, &v)) in time.iter().zip(&values).enumerate() {
        phase = match phase {
            Phase::Seeking if params.starts_fall(v) => {
                // Seeds the fall-duration guard; never emitted
                last_event = Some(t);
                Phase::WaitingForRise
            }
            Phase::WaitingForRise if params.starts_rise(v) => {
                let is_first = candidates.is_empty();
                let rested = last_event.map_or(true, |last| t - last >= params.min_fall_duration);
                if is_first || rested {
                    let previous_event = last_event.unwrap_or(t);
                    last_event = Some(t);
                    Phase::WaitingForFall { rise: i, previous_event }
                } else {
                    phase
                }
            }
            Phase::WaitingForFall { rise, previous_event } if params.starts_fall(v) => {
                let duration = t - time[rise];
                if duration >= params.min_rise_duration {
                    candidates.push(Candidate { rise, fall: i });
                    last_event = Some(t);
                } else {
                    debug!("Discarding a rise at {} that lasted only {}", time[rise], duration);
                    last_event = Some(previous_event);
                }
                Phase::WaitingForRise
            }
            other => other,
        };
    }

    if let Phase::WaitingForFall { rise, .. } = phase {
        debug!("Dropping the incomplete cycle that starts at {}", time[rise]);
    }

    let mut out = ts.clone();
    let last_sample = values.len().saturating_sub(1);
    for (k, cycle) in candidates.iter().enumerate() {
        let next_rise = candidates.get(k + 1).map(|c| c.rise);
        let rise_duration = time[cycle.fall] - time[cycle.rise];
        let fall_duration = next_rise.map_or(f64::INFINITY, |n| time[n] - time[cycle.fall]);
        let rise_peak = params.rise_peak(&values[cycle.rise..=cycle.fall]);
        let fall_peak = params.fall_peak(&values[cycle.fall..=next_rise.unwrap_or(last_sample)]);

        let kept = rise_duration <= params.max_rise_duration
            && fall_duration <= params.max_fall_duration
            && (params.min_rise_peak..=params.max_rise_peak).contains(&rise_peak)
            && (params.min_fall_peak..=params.max_fall_peak).contains(&fall_peak);
        if !kept {
            debug!(
                "Rejecting the cycle at {}: durations {}/{}, peaks {}/{}",
                time[cycle.rise], rise_duration, fall_duration, rise_peak, fall_peak
            );
            continue;
        }

        out.add_event(time[cycle.rise], params.rise_event.as_str());
        out.add_event(time[cycle.fall], params.fall_event.as_str());
        if let (Some(name), Some(next)) = (&params.cycle_end_event, next_rise) {
            out.add_event(time[next], name.as_str());
        }
    }
    Ok(out)
}

fn normalized_time_unit(n_points: usize) -> String {
    if n_points == 100 {
        NORMALIZED_TIME_UNIT.to_string()
    } else {
        format!("1/{}", n_points)
    }
}

/// Resample every cycle delimited by `name1`/`name2` onto `n_points`
/// samples and put the cycles end to end.
///
/// When both names are the same, consecutive occurrences delimit a cycle.
/// The output time is `0..n_points * n_cycles`; see [`time_normalize_span`].
pub fn time_normalize(
    ts: &TimeSeries,
    name1: &str,
    name2: &str,
    n_points: usize,
) -> Result<(TimeSeries, Vec<DataWarning>)> {
    time_normalize_span(ts, name1, name2, n_points, (0, n_points as i64))
}

/// Time-normalize on a window that may extend before or after each cycle.
///
/// `span` is in normalized points: `(0, n_points)` is the cycle itself,
/// `(10, 90)` keeps its middle part and `(-20, 115)` with 100 points adds
/// 20% before and 15% after. Each cycle then takes `span.1 - span.0`
/// samples, the cycle start falling on `-span.0`.
///
/// Each cycle is sampled on `span.1 - span.0 + 1` points of which the last
/// one is dropped, as it belongs to the next cycle. Output events are
/// `name1` at every cycle start, `_` at every cycle end and the other
/// events found in `[begin, end)`.
pub fn time_normalize_span(
    ts: &TimeSeries,
    name1: &str,
    name2: &str,
    n_points: usize,
    span: (i64, i64),
) -> Result<(TimeSeries, Vec<DataWarning>)> {
    if n_points == 0 {
        return Err(TsError::Argument("at least 1 point per cycle is needed".to_string()));
    }
    if span.1 <= span.0 {
        return Err(TsError::Argument(format!(
            "span ({}, {}) selects no point",
            span.0, span.1
        )));
    }
    if ts.events.len() < 2 {
        return Err(TsError::Argument(format!(
            "no cycle can be defined from {} event(s)",
            ts.events.len()
        )));
    }
    ts.check_sortable_query()?;

    let same_names = name1 == name2;
    let n_cycles = if same_names {
        ts.count_events(name1).saturating_sub(1)
    } else {
        ts.count_events(name1).min(ts.count_events(name2))
    };
    if n_cycles == 0 {
        return Err(TsError::Argument(format!(
            "no complete cycle between events '{}' ({}) and '{}' ({})",
            name1,
            ts.count_events(name1),
            name2,
            ts.count_events(name2)
        )));
    }

    let width = (span.1 - span.0) as usize;
    let n = n_points as f64;
    let lead = -span.0 as f64;

    let mut pieces: BTreeMap<String, Vec<ArrayD<f64>>> = BTreeMap::new();
    let mut events: Vec<Event> = Vec::new();
    let mut warnings = Vec::new();

    for i_cycle in 0..n_cycles {
        let end_occurrence = if same_names { i_cycle + 1 } else { i_cycle };
        let begin = ts.require_event_time(name1, i_cycle)?;
        let end = ts.require_event_time(name2, end_occurrence)?;
        if end <= begin {
            return Err(TsError::Argument(format!(
                "cycle {} ends at {} which is not after its beginning at {}",
                i_cycle, end, begin
            )));
        }

        let window_begin = begin + span.0 as f64 / n * (end - begin);
        let window_end = begin + span.1 as f64 / n * (end - begin);
        let sub = ts.between_times(window_begin, window_end, true)?;
        if sub.is_empty() {
            return Err(TsError::Argument(format!(
                "cycle {} has no sample between {} and {}",
                i_cycle, window_begin, window_end
            )));
        }

        let sub_time = sub.time.to_vec();
        let target: Vec<f64> = Array1::linspace(window_begin, window_end, width + 1)
            .iter()
            .take(width)
            .copied()
            .collect();
        for (key, value) in sub.data.iter() {
            let (resampled, warning) = resample_channel(
                key,
                &sub_time,
                value,
                &target,
                InterpMethod::Linear,
                FillPolicy::Extrapolate,
            )?;
            warnings.extend(warning);
            pieces.entry(key.clone()).or_default().push(resampled);
        }

        let offset = (i_cycle * width) as f64;
        events.push(Event::new(offset + lead, name1));
        events.push(Event::new(offset + lead + n, CYCLE_END_EVENT));
        for event in ts
            .events
            .iter()
            .filter(|e| e.time >= begin && e.time < end && e.name != name1 && e.name != name2)
        {
            let position = offset + (event.time - window_begin) / (window_end - window_begin) * width as f64;
            events.push(Event::new(position, event.name.as_str()));
        }
    }

    let mut out = TimeSeries::with_time(Array1::range(0.0, (width * n_cycles) as f64, 1.0));
    out.time_info = ts.time_info.clone();
    out.time_info
        .insert(UNIT_KEY.to_string(), Value::from(normalized_time_unit(n_points)));
    out.data_info = ts.data_info.clone();
    for (key, arrays) in pieces {
        let views: Vec<ArrayView<'_, f64, IxDyn>> = arrays.iter().map(|a| a.view()).collect();
        let joined = concatenate(Axis(0), &views)
            .map_err(|e| TsError::Type(format!("cannot join the cycles of '{}': {}", key, e)))?;
        out.add_data(key, joined)?;
    }
    out.events = events.into();
    out.sort_events(true);

    if !warnings.is_empty() {
        warn!("{} data warning(s) while time-normalizing {} cycle(s)", warnings.len(), n_cycles);
    }
    Ok((out, warnings))
}

/// Split each channel of a time-normalized TimeSeries into
/// `(n_cycles, n_points, ...)`.
pub fn stack(ts: &TimeSeries, n_points: usize) -> Result<BTreeMap<String, ArrayD<f64>>> {
    if n_points == 0 || ts.len() % n_points != 0 {
        return Err(TsError::Argument(format!(
            "a TimeSeries of {} samples cannot be split into cycles of {} points; \
             is it time-normalized?",
            ts.len(),
            n_points
        )));
    }
    let n_cycles = ts.len() / n_points;
    let mut out = BTreeMap::new();
    for (key, value) in ts.data.iter() {
        let mut shape = vec![n_cycles, n_points];
        shape.extend_from_slice(&value.shape()[1..]);
        let stacked = value
            .as_standard_layout()
            .into_owned()
            .into_shape(IxDyn(&shape))
            .map_err(|e| TsError::Type(format!("cannot stack '{}': {}", key, e)))?;
        out.insert(key.clone(), stacked);
    }
    Ok(out)
}

/// Inverse of [`stack`]: put the cycles back end to end.
pub fn unstack(data: &BTreeMap<String, ArrayD<f64>>) -> Result<TimeSeries> {
    let mut ts = TimeSeries::new();
    ts.time_info
        .insert(UNIT_KEY.to_string(), Value::from(NORMALIZED_TIME_UNIT));
    for (key, value) in data {
        if value.ndim() < 2 {
            return Err(TsError::Argument(format!(
                "'{}' must have at least (n_cycles, n_points) dimensions, got {:?}",
                key,
                value.shape()
            )));
        }
        let n_samples = value.shape()[0] * value.shape()[1];
        let mut shape = vec![n_samples];
        shape.extend_from_slice(&value.shape()[2..]);
        let flat = value
            .as_standard_layout()
            .into_owned()
            .into_shape(IxDyn(&shape))
            .map_err(|e| TsError::Type(format!("cannot unstack '{}': {}", key, e)))?;
        if ts.time.is_empty() {
            ts.time = Array1::range(0.0, n_samples as f64, 1.0);
        }
        ts.add_data(key.as_str(), flat)?;
    }
    Ok(ts)
}

/// Cycle indexes from most to least repeatable.
///
/// `data` has cycles on its first axis. The cycle farthest (RMS) from the
/// mean of the remaining ones is removed until two are left. Cycles that
/// contain NaN are left out of the result.
pub fn most_repeatable_cycles(data: &ArrayD<f64>) -> Vec<usize> {
    if data.ndim() == 0 {
        return Vec::new();
    }
    let cycles: Vec<Vec<f64>> = data
        .axis_iter(Axis(0))
        .map(|c| c.iter().copied().collect())
        .collect();
    let n_cycles = cycles.len();
    let width = cycles.first().map_or(0, Vec::len);

    let mut remaining: Vec<usize> = (0..n_cycles)
        .filter(|&i| !cycles[i].iter().any(|v| v.is_nan()))
        .collect();
    let mut removed = Vec::new();

    while remaining.len() > 2 {
        let mut mean = vec![0.0; width];
        for &i in &remaining {
            for (m, v) in mean.iter_mut().zip(&cycles[i]) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= remaining.len() as f64;
        }

        let mut worst = 0;
        let mut worst_rms = f64::NEG_INFINITY;
        for (pos, &i) in remaining.iter().enumerate() {
            let rms = cycles[i]
                .iter()
                .zip(&mean)
                .map(|(v, m)| (v - m).powi(2))
                .sum::<f64>()
                .sqrt();
            if rms > worst_rms {
                worst = pos;
                worst_rms = rms;
            }
        }
        removed.push(remaining.remove(worst));
    }

    let mut out = remaining;
    out.extend(removed.into_iter().rev());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use ndarray::{arr1, Array2, Array3};

    fn pushes() -> TimeSeries {
        // Five 1-second pushes, one every 2 seconds, starting at t = 1
        let time = Array1::from_shape_fn(1100, |i| i as f64 / 100.0);
        let force = Array1::from_shape_fn(1100, |i| {
            if i >= 100 && (i - 100) % 200 < 100 {
                20.0
            } else {
                0.0
            }
        });
        let mut ts = TimeSeries::with_time(time);
        ts.add_data("Force", force).unwrap();
        ts
    }

    #[test]
    fn test_detect_cycles_finds_complete_pushes() {
        let ts = pushes();
        let out = detect_cycles(&ts, "Force", &CycleDetection::default()).unwrap();
        assert_eq!(out.count_events("push"), 5);
        assert_eq!(out.count_events("recovery"), 5);
        assert!((out.event_time("push", 0).unwrap() - 1.0).abs() < 1e-9);
        assert!((out.event_time("recovery", 0).unwrap() - 2.0).abs() < 1e-9);
        // the input is left untouched
        assert!(ts.events.is_empty());
    }

    #[test]
    fn test_detect_cycles_drops_leading_and_trailing_partials() {
        let time = Array1::range(0.0, 8.0, 1.0);
        let mut ts = TimeSeries::with_time(time);
        // starts high (partial), one full cycle, ends high (partial)
        ts.add_data("f", arr1(&[10.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0, 10.0]))
            .unwrap();
        let params = CycleDetection {
            min_rise_duration: 0.0,
            min_fall_duration: 0.0,
            ..CycleDetection::default()
        };
        let out = detect_cycles(&ts, "f", &params).unwrap();
        let events: Vec<(f64, &str)> = out.events.iter().map(|e| (e.time, e.name.as_str())).collect();
        assert_eq!(events, vec![(3.0, "push"), (5.0, "recovery")]);
    }

    #[test]
    fn test_detect_cycles_debounces_short_pushes() {
        let time = Array1::range(0.0, 10.0, 1.0);
        let mut ts = TimeSeries::with_time(time);
        ts.add_data(
            "f",
            arr1(&[0.0, 10.0, 10.0, 10.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0]),
        )
        .unwrap();
        let params = CycleDetection {
            min_rise_duration: 2.0,
            min_fall_duration: 0.0,
            ..CycleDetection::default()
        };
        let out = detect_cycles(&ts, "f", &params).unwrap();
        // the one-sample push at t = 5 is discarded
        assert_eq!(out.events.times_of("push"), vec![1.0, 7.0]);
        assert_eq!(out.events.times_of("recovery"), vec![4.0, 9.0]);
    }

    #[test]
    fn test_detect_cycles_needs_1d_channel() {
        let mut ts = TimeSeries::with_time(vec![0.0, 1.0]);
        ts.add_data("f", Array2::<f64>::zeros((2, 3))).unwrap();
        let err = detect_cycles(&ts, "f", &CycleDetection::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
    }

    #[test]
    fn test_detect_cycles_thresholds_are_inclusive() {
        let mut ts = TimeSeries::with_time(Array1::range(0.0, 7.0, 1.0));
        ts.add_data("f", arr1(&[0.0, 5.0, 5.0, 2.0, 5.0, 5.0, 2.0])).unwrap();
        let params = CycleDetection {
            min_rise_duration: 0.0,
            min_fall_duration: 0.0,
            ..CycleDetection::default()
        };
        let out = detect_cycles(&ts, "f", &params).unwrap();
        assert_eq!(out.events.times_of("push"), vec![1.0, 4.0]);
        assert_eq!(out.events.times_of("recovery"), vec![3.0, 6.0]);
    }

    #[test]
    fn test_detect_cycles_falling_direction() {
        let mut ts = TimeSeries::with_time(Array1::range(0.0, 7.0, 1.0));
        ts.add_data("f", arr1(&[0.0, -10.0, -10.0, 0.0, -10.0, -10.0, 0.0]))
            .unwrap();
        let params = CycleDetection {
            direction: CrossingDirection::Falling,
            threshold_rise: -5.0,
            threshold_fall: -2.0,
            min_rise_duration: 0.0,
            min_fall_duration: 0.0,
            ..CycleDetection::default()
        };
        let out = detect_cycles(&ts, "f", &params).unwrap();
        assert_eq!(out.events.times_of("push"), vec![1.0, 4.0]);
        assert_eq!(out.events.times_of("recovery"), vec![3.0, 6.0]);
    }

    #[test]
    fn test_detect_cycles_max_durations() {
        let mut ts = TimeSeries::with_time(Array1::range(0.0, 10.0, 1.0));
        // rise phases of 2 and 4 seconds
        ts.add_data("f", arr1(&[0.0, 10.0, 10.0, 0.0, 10.0, 10.0, 10.0, 10.0, 0.0, 0.0]))
            .unwrap();
        let base = CycleDetection {
            min_rise_duration: 0.0,
            min_fall_duration: 0.0,
            ..CycleDetection::default()
        };

        let params = CycleDetection {
            max_rise_duration: 3.0,
            ..base.clone()
        };
        let out = detect_cycles(&ts, "f", &params).unwrap();
        assert_eq!(out.events.times_of("push"), vec![1.0]);
        assert_eq!(out.events.times_of("recovery"), vec![3.0]);

        // the last cycle has no next rise, hence an unbounded fall phase
        let params = CycleDetection {
            max_fall_duration: 2.0,
            ..base
        };
        let out = detect_cycles(&ts, "f", &params).unwrap();
        assert_eq!(out.events.times_of("push"), vec![1.0]);
    }

    #[test]
    fn test_detect_cycles_peak_heights() {
        let mut ts = TimeSeries::with_time(Array1::range(0.0, 8.0, 1.0));
        ts.add_data("f", arr1(&[0.0, 10.0, 10.0, 0.0, 20.0, 20.0, 0.0, 0.0]))
            .unwrap();
        let base = CycleDetection {
            min_rise_duration: 0.0,
            min_fall_duration: 0.0,
            ..CycleDetection::default()
        };

        let params = CycleDetection {
            min_rise_peak: 15.0,
            ..base.clone()
        };
        let out = detect_cycles(&ts, "f", &params).unwrap();
        assert_eq!(out.events.times_of("push"), vec![4.0]);

        let params = CycleDetection {
            max_rise_peak: 15.0,
            ..base.clone()
        };
        let out = detect_cycles(&ts, "f", &params).unwrap();
        assert_eq!(out.events.times_of("push"), vec![1.0]);

        // every fall phase goes down to 0
        let params = CycleDetection {
            min_fall_peak: 1.0,
            ..base
        };
        let out = detect_cycles(&ts, "f", &params).unwrap();
        assert!(out.events.is_empty());
    }

    #[test]
    fn test_detect_cycles_marks_cycle_ends() {
        let params = CycleDetection {
            cycle_end_event: Some("_".to_string()),
            ..CycleDetection::default()
        };
        let out = detect_cycles(&pushes(), "Force", &params).unwrap();
        let ends = out.events.times_of("_");
        assert_eq!(ends.len(), 4);
        for (end, next_push) in ends.iter().zip(out.events.times_of("push").iter().skip(1)) {
            assert_eq!(end, next_push);
        }
    }

    #[test]
    fn test_time_normalize_pushes() {
        let mut ts = detect_cycles(&pushes(), "Force", &CycleDetection::default()).unwrap();
        ts.add_event(1.5, "mid_push");
        let (out, warnings) = time_normalize(&ts, "push", "recovery", 100).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(out.len(), 500);
        assert_eq!(out.time[499], 499.0);
        assert_eq!(out.time_unit(), Some("%"));
        assert_eq!(out.events.times_of("push"), vec![0.0, 100.0, 200.0, 300.0, 400.0]);
        assert_eq!(out.events.times_of("_"), vec![100.0, 200.0, 300.0, 400.0, 500.0]);
        assert_eq!(out.count_events("recovery"), 0);
        let mid = out.event_time("mid_push", 0).unwrap();
        assert!((mid - 50.0).abs() < 1e-9);
        let force = out.get_data("Force").unwrap();
        assert!(force.iter().all(|v| !v.is_nan()));
        assert!((force[[50]] - 20.0).abs() < 1e-9);
    }

    fn strikes() -> TimeSeries {
        let mut ts = TimeSeries::with_time(Array1::range(0.0, 10.0, 0.5));
        ts.add_data("x", Array1::range(0.0, 10.0, 0.5)).unwrap();
        for t in [1.0, 3.0, 6.0] {
            ts.add_event(t, "strike");
        }
        ts.add_event(2.0, "toe_off");
        ts
    }

    #[test]
    fn test_time_normalize_same_event_name() {
        let (out, _) = time_normalize(&strikes(), "strike", "strike", 10).unwrap();
        assert_eq!(out.len(), 20);
        assert_eq!(out.time_unit(), Some("1/10"));
        let x = out.get_data("x").unwrap();
        assert!((x[[0]] - 1.0).abs() < 1e-9);
        // the last point of a cycle is not its end, which belongs to the next one
        assert!((x[[9]] - 2.8).abs() < 1e-9);
        assert!((x[[10]] - 3.0).abs() < 1e-9);
        assert!((x[[19]] - 5.7).abs() < 1e-9);

        assert_eq!(out.events.times_of("strike"), vec![0.0, 10.0]);
        assert_eq!(out.events.times_of("_"), vec![10.0, 20.0]);
        assert_eq!(out.events.times_of("toe_off"), vec![5.0]);
    }

    #[test]
    fn test_time_normalize_extended_span() {
        let (out, _) = time_normalize_span(&strikes(), "strike", "strike", 10, (-2, 12)).unwrap();
        assert_eq!(out.len(), 28);
        let x = out.get_data("x").unwrap();
        assert!((x[[0]] - 0.6).abs() < 1e-9);
        assert!((x[[2]] - 1.0).abs() < 1e-9);
        assert!((x[[14]] - 2.4).abs() < 1e-9);
        assert!((x[[16]] - 3.0).abs() < 1e-9);

        assert_eq!(out.events.times_of("strike"), vec![2.0, 16.0]);
        assert_eq!(out.events.times_of("_"), vec![12.0, 26.0]);
        let toe_off = out.event_time("toe_off", 0).unwrap();
        assert!((toe_off - 7.0).abs() < 1e-9);

        // middle of the cycle only
        let (out, _) = time_normalize_span(&strikes(), "strike", "strike", 10, (2, 8)).unwrap();
        assert_eq!(out.len(), 12);
        let x = out.get_data("x").unwrap();
        assert!((x[[0]] - 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_time_normalize_errors() {
        let mut ts = TimeSeries::with_time(Array1::range(0.0, 10.0, 1.0));
        ts.add_event(1.0, "a");
        let err = time_normalize(&ts, "a", "b", 100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);

        ts.add_event(2.0, "c");
        let err = time_normalize(&ts, "a", "b", 100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);

        ts.add_event(0.5, "b");
        let err = time_normalize(&ts, "a", "b", 100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);

        let err = time_normalize(&strikes(), "strike", "strike", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        let err = time_normalize_span(&strikes(), "strike", "strike", 10, (5, 5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
    }

    #[test]
    fn test_stack_and_unstack() {
        let mut ts = TimeSeries::with_time(Array1::range(0.0, 6.0, 1.0));
        ts.add_data("x", Array1::range(0.0, 6.0, 1.0)).unwrap();
        ts.add_data("p", Array2::from_shape_fn((6, 2), |(i, j)| (i * 2 + j) as f64))
            .unwrap();

        let stacked = stack(&ts, 3).unwrap();
        assert_eq!(stacked["x"].shape(), &[2, 3]);
        assert_eq!(stacked["p"].shape(), &[2, 3, 2]);
        assert_eq!(stacked["p"][[1, 0, 1]], 7.0);

        let back = unstack(&stacked).unwrap();
        assert_eq!(back.get_data("p").unwrap(), ts.get_data("p").unwrap());
        assert_eq!(back.time, ts.time);

        let err = stack(&ts, 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
    }

    #[test]
    fn test_most_repeatable_cycles() {
        let x = Array1::<f64>::range(0.0, 10.0, 0.1);
        let data = Array3::from_shape_fn((4, 1, x.len()), |(c, _, i)| match c {
            0 => x[i].sin(),
            1 => x[i].sin() + 0.14,
            2 => x[i].cos() + 0.14,
            _ => x[i].sin() + 0.15,
        });
        assert_eq!(most_repeatable_cycles(&data.into_dyn()), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_most_repeatable_cycles_skips_nan() {
        let mut data = Array2::<f64>::zeros((3, 4));
        data[[1, 2]] = f64::NAN;
        data.row_mut(2).fill(1.0);
        assert_eq!(most_repeatable_cycles(&data.into_dyn()), vec![0, 2]);
    }
}
