// Read-only view handed to plotting front-ends

use serde::Serialize;

use crate::core::error::Result;
use crate::core::event::Event;
use crate::core::tabular::column_names;
use crate::core::timeseries::TimeSeries;

/// One drawable line: a flattened column of a channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotLine {
    pub name: String,
    pub channel: String,
    pub unit: Option<String>,
    /// `None` where the sample is missing.
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotView {
    pub time: Vec<f64>,
    pub time_unit: Option<String>,
    pub lines: Vec<PlotLine>,
    pub events: Vec<Event>,
}

impl TimeSeries {
    /// Everything a renderer needs to draw `keys` (all channels if empty)
    /// with vertical event markers.
    pub fn plot_view(&self, keys: &[&str]) -> Result<PlotView> {
        let keys: Vec<&str> = if keys.is_empty() {
            self.data.keys().map(String::as_str).collect()
        } else {
            keys.to_vec()
        };

        let mut lines = Vec::new();
        for key in keys {
            let value = self.get_data(key)?;
            let n_rows = value.shape()[0];
            let names = column_names(key, &value.shape()[1..]);
            let width = names.len();
            let flat: Vec<f64> = value.iter().copied().collect();
            let unit = self.unit_of(key).map(str::to_string);
            for (j, name) in names.into_iter().enumerate() {
                let values = (0..n_rows)
                    .map(|i| flat[i * width + j])
                    .map(|v| (!v.is_nan()).then_some(v))
                    .collect();
                lines.push(PlotLine {
                    name,
                    channel: key.to_string(),
                    unit: unit.clone(),
                    values,
                });
            }
        }

        let mut events = self.events.clone();
        events.sort(false);

        Ok(PlotView {
            time: self.time.to_vec(),
            time_unit: self.time_unit().map(str::to_string),
            lines,
            events: events.into_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::core::error::ErrorKind;
    use crate::core::timeseries::TimeSeries;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_plot_view() {
        let mut ts = TimeSeries::with_time(vec![0.0, 1.0]);
        ts.add_data("Forces", arr2(&[[1.0, 2.0], [3.0, f64::NAN]])).unwrap();
        ts.add_data("angle", arr1(&[0.1, 0.2])).unwrap();
        ts.add_data_info("Forces", "Unit", "N");
        ts.events.add(0.8, "b");
        ts.events.add(0.2, "a");

        let view = ts.plot_view(&["Forces"]).unwrap();
        assert_eq!(view.lines.len(), 2);
        assert_eq!(view.lines[1].name, "Forces[1]");
        assert_eq!(view.lines[1].values, vec![Some(2.0), None]);
        assert_eq!(view.lines[0].unit.as_deref(), Some("N"));
        assert_eq!(view.time_unit.as_deref(), Some("s"));
        assert_eq!(view.events[0].name, "a");

        let all = ts.plot_view(&[]).unwrap();
        assert_eq!(all.lines.len(), 3);
        assert_eq!(all.lines[2].unit, None);

        let err = ts.plot_view(&["missing"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyNotFound);
    }
}
