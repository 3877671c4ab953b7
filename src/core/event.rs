// Events and the event list manager

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::Deref;

use crate::core::constants::DEFAULT_EVENT_NAME;

/// A named marker on a TimeSeries' timeline.
///
/// Events are ordered by time only; the name is used for uniqueness, never
/// as a tie-break.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time: f64,
    pub name: String,
}

impl Event {
    pub fn new(time: f64, name: impl Into<String>) -> Self {
        Self {
            time,
            name: name.into(),
        }
    }

    pub fn cmp_time(&self, other: &Event) -> Ordering {
        self.time.total_cmp(&other.time)
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new(0.0, DEFAULT_EVENT_NAME)
    }
}

/// Ordered collection of events. Not kept sorted on insertion; call
/// [`EventList::sort`] to normalize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventList {
    events: Vec<Event>,
}

impl EventList {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn add(&mut self, time: f64, name: impl Into<String>) {
        self.events.push(Event::new(time, name));
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Stable sort by time. With `unique`, an event identical (exact time
    /// and name) to the one right before it is dropped.
    pub fn sort(&mut self, unique: bool) {
        self.events.sort_by(Event::cmp_time);
        if unique {
            self.events.dedup_by(|b, a| a.time == b.time && a.name == b.name);
        }
    }

    /// Keep only events with `time_min <= time <= time_max`.
    pub fn trim(&mut self, time_min: f64, time_max: f64) {
        self.events
            .retain(|e| e.time >= time_min && e.time <= time_max);
    }

    pub fn shift(&mut self, delta: f64) {
        for event in &mut self.events {
            event.time += delta;
        }
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.iter().filter(|e| e.name == name).count()
    }

    /// Sorted times of every event called `name`.
    pub fn times_of(&self, name: &str) -> Vec<f64> {
        let mut times: Vec<f64> = self
            .events
            .iter()
            .filter(|e| e.name == name)
            .map(|e| e.time)
            .collect();
        times.sort_by(f64::total_cmp);
        times
    }

    /// Time of the `occurrence`-th (in time order) event called `name`.
    pub fn time_of(&self, name: &str, occurrence: usize) -> Option<f64> {
        self.times_of(name).get(occurrence).copied()
    }

    /// Remove every event called `name` at the time of its `occurrence`-th
    /// instance. Returns false if there is no such occurrence.
    pub fn remove(&mut self, name: &str, occurrence: usize) -> bool {
        let Some(time) = self.time_of(name, occurrence) else {
            return false;
        };
        self.events.retain(|e| !(e.name == name && e.time == time));
        true
    }

    /// Rename events called `old`; all of them, or only one occurrence.
    /// Returns how many events were renamed.
    pub fn rename(&mut self, old: &str, new: &str, occurrence: Option<usize>) -> usize {
        match occurrence {
            None => {
                let mut renamed = 0;
                for event in self.events.iter_mut().filter(|e| e.name == old) {
                    event.name = new.to_string();
                    renamed += 1;
                }
                renamed
            }
            Some(occ) => {
                let Some(time) = self.time_of(old, occ) else {
                    return 0;
                };
                match self
                    .events
                    .iter_mut()
                    .find(|e| e.name == old && e.time == time)
                {
                    Some(event) => {
                        event.name = new.to_string();
                        1
                    }
                    None => 0,
                }
            }
        }
    }

    pub fn extend<I: IntoIterator<Item = Event>>(&mut self, iter: I) {
        self.events.extend(iter);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn into_vec(self) -> Vec<Event> {
        self.events
    }
}

impl Deref for EventList {
    type Target = [Event];

    fn deref(&self) -> &[Event] {
        &self.events
    }
}

impl From<Vec<Event>> for EventList {
    fn from(events: Vec<Event>) -> Self {
        Self { events }
    }
}

impl FromIterator<Event> for EventList {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EventList {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
