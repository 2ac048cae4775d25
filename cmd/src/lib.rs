use std::{io::Write, path::Path};

use color_eyre::eyre::{eyre, Result, WrapErr};
use datafusion::prelude::{CsvReadOptions, NdJsonReadOptions, SessionContext};
use eventtable::{
    datafusion::{self as df, TimeWindow},
    sessions,
    value::Aggregation,
    Aggregator, Baseline,
};

/// The input file is registered under this table name.
pub const TABLE_NAME: &str = "events";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Input {
    /// `time,action` rows
    #[default]
    Events,
    /// `start,end` rows, one per session
    Sessions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    #[default]
    Csv,
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct Options {
    pub input: Input,
    pub sort: bool,
    pub strict: bool,
    pub baseline: Baseline,
    pub capacity: Option<usize>,
    /// Floors timestamps to multiples of this step before aggregating.
    pub resolution: Option<f64>,
    pub window: TimeWindow,
}

// Creates a session context with the file at `path` registered as `events`.
pub async fn create_context(path: impl AsRef<Path>) -> Result<SessionContext> {
    let path = path.as_ref();
    let file_path = path
        .to_str()
        .ok_or_else(|| eyre!("path is not valid UTF-8: {}", path.display()))?;
    let ctx = df::session_context();
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => {
            ctx.register_csv(TABLE_NAME, file_path, CsvReadOptions::new())
                .await
        }
        Some("json") => {
            ctx.register_json(TABLE_NAME, file_path, NdJsonReadOptions::default())
                .await
        }
        _ => {
            return Err(eyre!(
                "{}: expected a .csv or .json file",
                path.display()
            ))
        }
    }
    .wrap_err_with(|| format!("failed to register {}", path.display()))?;
    Ok(ctx)
}

pub async fn aggregate(ctx: &SessionContext, opts: &Options) -> Result<Aggregation> {
    let mut events = match opts.input {
        Input::Events => df::load_events(ctx, TABLE_NAME, opts.window, opts.sort).await?,
        Input::Sessions => {
            let sessions = df::load_sessions(ctx, TABLE_NAME)
                .await?
                .iter()
                .filter_map(|s| opts.window.clip(s))
                .collect::<Vec<_>>();
            let mut events = sessions::sessions_to_events(&sessions)?;
            // clipped sessions start inside the window; only late exits remain to drop
            events.retain(|ev| opts.window.contains(ev.time));
            events
        }
    };
    if let Some(resolution) = opts.resolution {
        events = sessions::quantize(&events, resolution);
    }

    let agg = Aggregator::new()
        .baseline(opts.baseline)
        .capacity(opts.capacity)
        .strict(opts.strict)
        .exec(&events)
        .wrap_err("failed to aggregate event table")?;
    tracing::info!(
        buckets = agg.len(),
        peak = agg.peak().unwrap_or_default(),
        "aggregated"
    );
    Ok(agg)
}

/// Writes one `time,max` line per bucket, or the whole aggregation as JSON.
pub fn write_output(agg: &Aggregation, format: Format, mut out: impl Write) -> Result<()> {
    match format {
        Format::Csv => {
            writeln!(out, "time,max")?;
            for bucket in &agg.buckets {
                writeln!(out, "{},{}", bucket.time, bucket.max)?;
            }
        }
        Format::Json => {
            serde_json::to_writer_pretty(&mut out, agg)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
