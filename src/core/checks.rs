// On-demand validation tiers for TimeSeries

use crate::core::error::{Result, Tier, TsError};
use crate::core::timeseries::TimeSeries;

impl TimeSeries {
    /// Time has no NaN and no duplicate values; events have numeric times.
    pub fn check_well_typed(&self) -> Result<()> {
        let n_nan = self.time.iter().filter(|t| t.is_nan()).count();
        if n_nan > 0 {
            return Err(TsError::invariant(
                Tier::WellTyped,
                format!(
                    "time must not contain NaN, but {} NaN(s) were found among its {} samples",
                    n_nan,
                    self.time.len()
                ),
            ));
        }

        let mut sorted = self.time.to_vec();
        sorted.sort_by(f64::total_cmp);
        sorted.dedup();
        if sorted.len() != self.time.len() {
            return Err(TsError::invariant(
                Tier::WellTyped,
                format!(
                    "time values must be unique, but only {} of its {} samples are unique",
                    sorted.len(),
                    self.time.len()
                ),
            ));
        }

        if let Some(i) = self.events.iter().position(|e| e.time.is_nan()) {
            return Err(TsError::invariant(
                Tier::WellTyped,
                format!("event {} ('{}') has a NaN time", i, self.events[i].name),
            ));
        }
        Ok(())
    }

    /// Every channel's first axis matches the time length.
    pub fn check_well_shaped(&self) -> Result<()> {
        for (key, value) in self.data.iter() {
            let got = value.shape()[0];
            if got != self.time.len() {
                return Err(TsError::invariant(
                    Tier::WellShaped,
                    format!(
                        "the data named '{}' has a shape of {:?} while time has {} samples",
                        key,
                        value.shape(),
                        self.time.len()
                    ),
                ));
            }
        }
        Ok(())
    }

    pub fn check_not_empty_time(&self) -> Result<()> {
        if self.time.is_empty() {
            return Err(TsError::invariant(
                Tier::NotEmptyTime,
                "the TimeSeries is empty: the length of its time vector is 0",
            ));
        }
        Ok(())
    }

    pub fn check_not_empty_data(&self) -> Result<()> {
        if self.data.is_empty() {
            return Err(TsError::invariant(
                Tier::NotEmptyData,
                "the TimeSeries is empty: it does not contain any data",
            ));
        }
        Ok(())
    }

    pub fn check_increasing_time(&self) -> Result<()> {
        let n_decreasing = self
            .time
            .windows(2)
            .into_iter()
            .filter(|w| !(w[1] >= w[0]))
            .count();
        if n_decreasing > 0 {
            return Err(TsError::invariant(
                Tier::IncreasingTime,
                format!(
                    "time decreases at {} place(s) but must be always increasing; \
                     resample the TimeSeries on a sorted copy of its time vector first",
                    n_decreasing
                ),
            ));
        }
        Ok(())
    }

    pub fn check_constant_sample_rate(&self) -> Result<()> {
        if self.sample_rate().is_none() {
            return Err(TsError::invariant(
                Tier::ConstantSampleRate,
                format!(
                    "the sample rate of these {} samples is not constant; resample the \
                     TimeSeries on an evenly spaced time vector between its first and last time",
                    self.time.len()
                ),
            ));
        }
        Ok(())
    }

    // Shared precondition of slicing and interpolation
    pub(crate) fn check_sortable_query(&self) -> Result<()> {
        self.check_not_empty_time()?;
        self.check_increasing_time()
    }
}

#[cfg(test)]
mod tests {
    use crate::core::error::{ErrorKind, Tier};
    use crate::core::timeseries::TimeSeries;
    use ndarray::{arr1, Array1};

    #[test]
    fn test_well_typed() {
        let ts = TimeSeries::with_time(vec![0.0, 1.0, 2.0]);
        assert!(ts.check_well_typed().is_ok());

        let ts = TimeSeries::with_time(vec![0.0, f64::NAN, 2.0]);
        let err = ts.check_well_typed().unwrap_err();
        assert_eq!(err.tier(), Some(Tier::WellTyped));
        assert!(err.to_string().contains("1 NaN(s)"));

        let ts = TimeSeries::with_time(vec![0.0, 1.0, 1.0]);
        let err = ts.check_well_typed().unwrap_err();
        assert!(err.to_string().contains("only 2 of its 3"));
    }

    #[test]
    fn test_well_shaped_after_time_edit() {
        let mut ts = TimeSeries::with_time(vec![0.0, 1.0, 2.0]);
        ts.add_data("x", arr1(&[1.0, 2.0, 3.0])).unwrap();
        assert!(ts.check_well_shaped().is_ok());

        ts.time = Array1::from(vec![0.0, 1.0]);
        let err = ts.check_well_shaped().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        assert_eq!(err.tier(), Some(Tier::WellShaped));
    }

    #[test]
    fn test_not_empty() {
        let ts = TimeSeries::new();
        assert_eq!(
            ts.check_not_empty_time().unwrap_err().tier(),
            Some(Tier::NotEmptyTime)
        );
        assert_eq!(
            ts.check_not_empty_data().unwrap_err().tier(),
            Some(Tier::NotEmptyData)
        );
    }

    #[test]
    fn test_increasing_time_suggests_remedy() {
        let ts = TimeSeries::with_time(vec![0.0, 2.0, 1.0]);
        let err = ts.check_increasing_time().unwrap_err();
        assert_eq!(err.tier(), Some(Tier::IncreasingTime));
        assert!(err.to_string().contains("resample"));
    }

    #[test]
    fn test_constant_sample_rate() {
        let ts = TimeSeries::with_time(Array1::linspace(0.0, 1.0, 11));
        assert!(ts.check_constant_sample_rate().is_ok());

        let ts = TimeSeries::with_time(vec![0.0, 1.0, 3.0]);
        let err = ts.check_constant_sample_rate().unwrap_err();
        assert_eq!(err.tier(), Some(Tier::ConstantSampleRate));
    }
}
