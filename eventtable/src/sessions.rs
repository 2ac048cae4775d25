//! Concurrent-session tables.
//!
//! A load test logs when each session enters and leaves. Turning every
//! session into a `+1` event at its start and a `-1` event at its end makes
//! the bucket maxima the peak number of concurrent sessions per timestamp.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AggregateError, Result},
    value::Event,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub start: f64,
    pub end: f64,
}

impl Session {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start <= self.end
    }

    /// The enter and leave events of this session.
    pub fn events(&self) -> [Event; 2] {
        [Event::new(self.start, 1), Event::new(self.end, -1)]
    }
}

/// Flattens sessions into a time-ordered event table.
///
/// At equal timestamps leaving sessions sort before entering ones, so a
/// hand-over from one session to the next does not count both.
pub fn sessions_to_events(sessions: &[Session]) -> Result<Vec<Event>> {
    if let Some(index) = sessions.iter().position(|s| !s.is_valid()) {
        return Err(AggregateError::InvalidSession { index });
    }
    Ok(sessions
        .iter()
        .flat_map(Session::events)
        .sorted_by(|a, b| {
            a.time
                .total_cmp(&b.time)
                .then_with(|| a.action.cmp(&b.action))
        })
        .collect())
}

/// Floors every timestamp to a multiple of `resolution`, e.g. `1.0 / 60.0` to
/// count per second on a minute scale. A non-positive or non-finite
/// resolution leaves the events as they are.
pub fn quantize(events: &[Event], resolution: f64) -> Vec<Event> {
    if !(resolution.is_finite() && resolution > 0.0) {
        return events.to_vec();
    }
    events
        .iter()
        .map(|ev| Event {
            time: (ev.time / resolution).floor() * resolution,
            ..*ev
        })
        .collect()
}
