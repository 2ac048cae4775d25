use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

pub const FIELD_TIME: &str = "time";
pub const FIELD_ACTION: &str = "action";
pub const FIELD_START: &str = "start";
pub const FIELD_END: &str = "end";
pub const FIELD_MAX: &str = "max";

/// One row of an event table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time: f64,
    /// Change of the running total caused by this event
    pub action: i32,
}

impl Event {
    pub fn new(time: f64, action: i32) -> Self {
        Self { time, action }
    }
}

impl From<(f64, i32)> for Event {
    fn from((time, action): (f64, i32)) -> Self {
        Self::new(time, action)
    }
}

/// Largest running total observed while `time` was the current timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub time: f64,
    pub max: i64,
}

impl Serialize for Bucket {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&self.time)?;
        seq.serialize_element(&self.max)?;
        seq.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregation {
    /// Running total after each input event, in input order.
    pub cumulative: Vec<i64>,
    /// One entry per distinct timestamp, in order of first occurrence.
    pub buckets: Vec<Bucket>,
}

impl Aggregation {
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// The overall peak of the running total, if any event was aggregated.
    pub fn peak(&self) -> Option<i64> {
        self.buckets.iter().map(|b| b.max).max()
    }
}
