// Copyright 2022 Zinc Labs Inc. and Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use arrow::{
    array::{Array, ArrayRef, Float64Array, Int32Array, Int64Array},
    compute::cast,
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use datafusion::{
    error::{DataFusionError, Result},
    prelude::{col, lit, SessionConfig, SessionContext},
};

use crate::{
    sessions::Session,
    value::{Aggregation, Event, FIELD_ACTION, FIELD_END, FIELD_MAX, FIELD_START, FIELD_TIME},
};

/// Creates a session context that scans every table as a single partition,
/// so rows come back in the order they are stored.
pub fn session_context() -> SessionContext {
    SessionContext::with_config(SessionConfig::new().with_target_partitions(1))
}

/// Inclusive bounds on the timestamps loaded from a table.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeWindow {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl TimeWindow {
    pub fn contains(&self, time: f64) -> bool {
        self.start.map_or(true, |start| time >= start) && self.end.map_or(true, |end| time <= end)
    }

    /// Restricts `session` to the window. A session already running at the
    /// window start is moved to begin there, so it still counts as active.
    /// Returns `None` for sessions entirely outside the window.
    pub fn clip(&self, session: &Session) -> Option<Session> {
        if self.start.map_or(false, |start| session.end < start)
            || self.end.map_or(false, |end| session.start > end)
        {
            return None;
        }
        let start = match self.start {
            Some(start) if session.start < start => start,
            _ => session.start,
        };
        Some(Session {
            start,
            end: session.end,
        })
    }
}

/// Loads the `time` and `action` columns of `table`.
///
/// With `sort` set, events are ordered by time after loading; the sort is
/// stable, so rows sharing a timestamp keep their order in the table.
#[tracing::instrument(skip(ctx))]
pub async fn load_events(
    ctx: &SessionContext,
    table: &str,
    window: TimeWindow,
    sort: bool,
) -> Result<Vec<Event>> {
    let mut df = ctx
        .table(table)
        .await?
        .select_columns(&[FIELD_TIME, FIELD_ACTION])?;
    if let Some(start) = window.start {
        df = df.filter(col(FIELD_TIME).gt_eq(lit(start)))?;
    }
    if let Some(end) = window.end {
        df = df.filter(col(FIELD_TIME).lt_eq(lit(end)))?;
    }
    let batches = df.collect().await?;
    let mut events = events_from_batches(&batches)?;
    if sort {
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
    }
    tracing::info!(events = events.len(), "loaded events");
    Ok(events)
}

/// Loads the `start` and `end` columns of `table`.
#[tracing::instrument(skip(ctx))]
pub async fn load_sessions(ctx: &SessionContext, table: &str) -> Result<Vec<Session>> {
    let batches = ctx
        .table(table)
        .await?
        .select_columns(&[FIELD_START, FIELD_END])?
        .collect()
        .await?;
    let sessions = sessions_from_batches(&batches)?;
    tracing::info!(sessions = sessions.len(), "loaded sessions");
    Ok(sessions)
}

pub fn events_from_batches(batches: &[RecordBatch]) -> Result<Vec<Event>> {
    let mut events = Vec::with_capacity(batches.iter().map(|b| b.num_rows()).sum());
    for batch in batches {
        let times = column_as(batch, FIELD_TIME, &DataType::Float64)?;
        let times = times.as_any().downcast_ref::<Float64Array>().unwrap();
        let actions = column_as(batch, FIELD_ACTION, &DataType::Int32)?;
        let actions = actions.as_any().downcast_ref::<Int32Array>().unwrap();
        events.extend(
            times
                .values()
                .iter()
                .zip(actions.values().iter())
                .map(|(&time, &action)| Event { time, action }),
        );
    }
    Ok(events)
}

pub fn sessions_from_batches(batches: &[RecordBatch]) -> Result<Vec<Session>> {
    let mut sessions = Vec::with_capacity(batches.iter().map(|b| b.num_rows()).sum());
    for batch in batches {
        let starts = column_as(batch, FIELD_START, &DataType::Float64)?;
        let starts = starts.as_any().downcast_ref::<Float64Array>().unwrap();
        let ends = column_as(batch, FIELD_END, &DataType::Float64)?;
        let ends = ends.as_any().downcast_ref::<Float64Array>().unwrap();
        sessions.extend(
            starts
                .values()
                .iter()
                .zip(ends.values().iter())
                .map(|(&start, &end)| Session { start, end }),
        );
    }
    Ok(sessions)
}

/// Returns column `name` cast to `data_type`. Values the cast cannot
/// represent become nulls, and nulls are rejected.
fn column_as(batch: &RecordBatch, name: &str, data_type: &DataType) -> Result<ArrayRef> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| DataFusionError::Execution(format!("missing column `{name}`")))?;
    let column = cast(column, data_type)?;
    if column.null_count() > 0 {
        return Err(DataFusionError::Execution(format!(
            "column `{name}` has {} null or out of range values",
            column.null_count()
        )));
    }
    Ok(column)
}

impl Aggregation {
    /// One `time`, `max` row per bucket.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let schema = Schema::new(vec![
            Field::new(FIELD_TIME, DataType::Float64, false),
            Field::new(FIELD_MAX, DataType::Int64, false),
        ]);
        let times = Float64Array::from_iter_values(self.buckets.iter().map(|b| b.time));
        let maxima = Int64Array::from_iter_values(self.buckets.iter().map(|b| b.max));
        let columns: Vec<ArrayRef> = vec![Arc::new(times), Arc::new(maxima)];
        Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Aggregator;
    use datafusion::datasource::MemTable;
    use expect_test::expect;

    fn events_batch(times: Vec<i64>, actions: Vec<i64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new(FIELD_TIME, DataType::Int64, false),
            Field::new(FIELD_ACTION, DataType::Int64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(times)),
                Arc::new(Int64Array::from(actions)),
            ],
        )
        .unwrap()
    }

    fn context(batch: RecordBatch) -> SessionContext {
        let ctx = session_context();
        let provider = MemTable::try_new(batch.schema(), vec![vec![batch]]).unwrap();
        ctx.register_table("events", Arc::new(provider)).unwrap();
        ctx
    }

    #[test]
    fn test_time_window() {
        let window = TimeWindow {
            start: Some(1.0),
            end: Some(2.0),
        };
        assert!(window.contains(1.0));
        assert!(window.contains(2.0));
        assert!(!window.contains(2.5));
        assert!(TimeWindow::default().contains(f64::MIN));
    }

    #[test]
    fn test_time_window_clip() {
        let window = TimeWindow {
            start: Some(5.0),
            end: Some(9.0),
        };
        assert_eq!(
            window.clip(&Session::new(0.0, 10.0)),
            Some(Session::new(5.0, 10.0))
        );
        assert_eq!(
            window.clip(&Session::new(6.0, 8.0)),
            Some(Session::new(6.0, 8.0))
        );
        assert_eq!(window.clip(&Session::new(0.0, 4.0)), None);
        assert_eq!(window.clip(&Session::new(9.5, 12.0)), None);
        // a NaN start is left for sessions_to_events to reject
        assert!(window.clip(&Session::new(f64::NAN, 6.0)).unwrap().start.is_nan());
        assert_eq!(
            TimeWindow::default().clip(&Session::new(1.0, 2.0)),
            Some(Session::new(1.0, 2.0))
        );
    }

    #[test]
    fn test_events_from_batches() {
        let batch = events_batch(vec![1, 1, 2], vec![2, -1, 4]);
        let events = events_from_batches(&[batch]).unwrap();
        assert_eq!(
            events,
            [Event::new(1.0, 2), Event::new(1.0, -1), Event::new(2.0, 4)]
        );
    }

    #[test]
    fn test_missing_and_out_of_range_columns() {
        let schema = Arc::new(Schema::new(vec![Field::new(
            FIELD_TIME,
            DataType::Float64,
            false,
        )]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Float64Array::from(vec![1.0]))]).unwrap();
        let err = events_from_batches(&[batch]).unwrap_err();
        assert!(err.to_string().contains("missing column `action`"));

        let batch = events_batch(vec![1], vec![i64::MAX]);
        let err = events_from_batches(&[batch]).unwrap_err();
        assert!(err.to_string().contains("column `action`"));
    }

    #[tokio::test]
    async fn test_load_events() {
        let ctx = context(events_batch(vec![3, 1, 1, 2, 3], vec![1, 2, -1, 4, 0]));

        let events = load_events(&ctx, "events", TimeWindow::default(), true)
            .await
            .unwrap();
        let agg = Aggregator::new().strict(true).exec(&events).unwrap();
        let batch = agg.to_record_batch().unwrap();
        expect![[r#"
            [
                "+------+-----+",
                "| time | max |",
                "+------+-----+",
                "| 1.0  | 2   |",
                "| 2.0  | 5   |",
                "| 3.0  | 6   |",
                "+------+-----+",
            ]
        "#]]
        .assert_debug_eq(
            &arrow::util::pretty::pretty_format_batches(&[batch])
                .unwrap()
                .to_string()
                .lines()
                .collect::<Vec<_>>(),
        );

        let window = TimeWindow {
            start: Some(2.0),
            end: None,
        };
        let events = load_events(&ctx, "events", window, false).await.unwrap();
        assert_eq!(
            events,
            [Event::new(3.0, 1), Event::new(2.0, 4), Event::new(3.0, 0)]
        );
    }

    #[tokio::test]
    async fn test_load_sessions() {
        let schema = Arc::new(Schema::new(vec![
            Field::new(FIELD_START, DataType::Float64, false),
            Field::new(FIELD_END, DataType::Float64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Float64Array::from(vec![0.0, 1.0])),
                Arc::new(Float64Array::from(vec![2.0, 3.0])),
            ],
        )
        .unwrap();
        let sessions = load_sessions(&context(batch), "events").await.unwrap();
        assert_eq!(sessions, [Session::new(0.0, 2.0), Session::new(1.0, 3.0)]);
    }
}
