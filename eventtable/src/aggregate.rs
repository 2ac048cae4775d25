use strum::{Display, EnumString};

use crate::{
    error::{AggregateError, Result},
    value::{Aggregation, Bucket, Event},
};

/// Where the running maximum of a newly opened bucket starts.
///
/// The first bucket always starts at the first running total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Baseline {
    /// The first running total that falls into the bucket.
    #[default]
    First,
    /// Zero, which is what a zero-filled output buffer gives the in-place
    /// routine.
    Zero,
    /// The running total right before the bucket's first event.
    Carry,
}

/// Aggregates owned event tables without touching the input.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    baseline: Baseline,
    /// Upper bound on the number of buckets. `None` grows the output freely.
    capacity: Option<usize>,
    /// Reject decreasing or NaN timestamps instead of folding them into the
    /// current bucket.
    strict: bool,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn baseline(mut self, baseline: Baseline) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn capacity(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn exec(&self, events: &[Event]) -> Result<Aggregation> {
        let Some(first) = events.first() else {
            return Ok(Aggregation::default());
        };
        if self.strict {
            check_sorted(events.iter().map(|ev| ev.time))?;
        }
        let required = count_buckets(events.iter().map(|ev| ev.time));
        if let Some(capacity) = self.capacity {
            if required > capacity {
                return Err(AggregateError::OutputCapacityExceeded { required, capacity });
            }
        }

        let cumulative = cumulative(events);
        let mut buckets = Vec::with_capacity(required);
        let mut cur_time = first.time;
        buckets.push(Bucket {
            time: cur_time,
            max: cumulative[0],
        });
        for (i, ev) in events.iter().enumerate().skip(1) {
            let total = cumulative[i];
            if ev.time > cur_time {
                cur_time = ev.time;
                let start = match self.baseline {
                    Baseline::First => total,
                    Baseline::Zero => 0,
                    Baseline::Carry => cumulative[i - 1],
                };
                buckets.push(Bucket {
                    time: cur_time,
                    max: start,
                });
            }
            if let Some(bucket) = buckets.last_mut() {
                bucket.max = bucket.max.max(total);
            }
        }

        tracing::debug!(
            events = events.len(),
            buckets = buckets.len(),
            baseline = %self.baseline,
            "aggregated event table"
        );
        Ok(Aggregation {
            cumulative,
            buckets,
        })
    }
}

/// Running total of the actions over the whole stream.
pub fn cumulative(events: &[Event]) -> Vec<i64> {
    events
        .iter()
        .scan(0i64, |total, ev| {
            *total += i64::from(ev.action);
            Some(*total)
        })
        .collect()
}

/// Number of buckets `times` opens: a timestamp starts a new bucket only if it
/// is strictly greater than the one that opened the current bucket.
pub fn distinct_times(times: &[f64]) -> usize {
    count_buckets(times.iter().copied())
}

fn count_buckets<I: IntoIterator<Item = f64>>(times: I) -> usize {
    let mut times = times.into_iter();
    let Some(mut cur) = times.next() else {
        return 0;
    };
    let mut count = 1;
    for t in times {
        if t > cur {
            cur = t;
            count += 1;
        }
    }
    count
}

fn check_sorted<I: IntoIterator<Item = f64>>(times: I) -> Result<()> {
    let mut prev = f64::NEG_INFINITY;
    for (index, t) in times.into_iter().enumerate() {
        if t.is_nan() || t < prev {
            return Err(AggregateError::UnsortedInput { index });
        }
        prev = t;
    }
    Ok(())
}

/// Aggregates an event table in place.
///
/// `actions` is overwritten with the running totals and `buckets[b]` receives
/// the largest total seen while the `b`-th distinct timestamp was current.
/// The value already stored in `buckets[b]` for `b > 0` is the starting point
/// of that maximum, so callers normally pass a zero-filled buffer.
///
/// Empty `actions` or `buckets` is a no-op. Returns the number of buckets
/// written. `actions` must hold raw deltas: a second call on the same slice
/// accumulates the totals again.
pub fn convert_event_table(
    times: &[f64],
    actions: &mut [i32],
    buckets: &mut [i32],
) -> Result<usize> {
    convert(times, actions, buckets, None, false)
}

/// Same as [`convert_event_table`], but rejects decreasing or NaN timestamps.
pub fn convert_event_table_strict(
    times: &[f64],
    actions: &mut [i32],
    buckets: &mut [i32],
) -> Result<usize> {
    convert(times, actions, buckets, None, true)
}

/// `bucket_times`, when given, must be at least as long as `buckets` and
/// receives the timestamp that opened each written bucket.
pub(crate) fn convert(
    times: &[f64],
    actions: &mut [i32],
    buckets: &mut [i32],
    mut bucket_times: Option<&mut [f64]>,
    strict: bool,
) -> Result<usize> {
    let n = actions.len();
    let m = buckets.len();
    if n == 0 || m == 0 {
        return Ok(0);
    }
    if times.len() < n {
        return Err(AggregateError::LengthMismatch {
            times: times.len(),
            actions: n,
        });
    }
    let times = &times[..n];

    if strict {
        check_sorted(times.iter().copied())?;
    }
    let required = distinct_times(times);
    if required > m {
        return Err(AggregateError::OutputCapacityExceeded {
            required,
            capacity: m,
        });
    }
    let mut total = actions[0];
    for (index, &action) in actions.iter().enumerate().skip(1) {
        total = total
            .checked_add(action)
            .ok_or(AggregateError::CumulativeOverflow { index })?;
    }

    let mut cur_time = times[0];
    let mut b = 0;
    buckets[0] = actions[0];
    if let Some(out) = bucket_times.as_deref_mut() {
        out[0] = cur_time;
    }
    for i in 1..n {
        if times[i] > cur_time {
            cur_time = times[i];
            b += 1;
            if let Some(out) = bucket_times.as_deref_mut() {
                out[b] = cur_time;
            }
        }
        actions[i] += actions[i - 1];
        if actions[i] > buckets[b] {
            buckets[b] = actions[i];
        }
    }
    Ok(b + 1)
}
