use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;
use eventtable::{datafusion::TimeWindow, Baseline};
use eventtable_cmd::{Format, Input, Options};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Running maximum of an event table, one bucket per distinct timestamp")]
struct Cli {
    #[arg(help = r#"Event table: a .csv file with a header or a newline-delimited .json file

Columns:
    time,action    one row per event (default)
    start,end      one row per session (with --sessions)"#)]
    path: PathBuf,
    /// Read sessions and count the concurrent ones
    #[arg(long)]
    sessions: bool,
    /// Order events by time before aggregating
    #[arg(long)]
    sort: bool,
    /// Reject timestamps that go backwards
    #[arg(long)]
    strict: bool,
    /// Starting value of a new bucket: first, zero or carry
    #[arg(long, default_value = "first")]
    baseline: Baseline,
    /// Fail if more buckets than this would be produced
    #[arg(long)]
    capacity: Option<usize>,
    /// Floor timestamps to multiples of this step
    #[arg(long)]
    resolution: Option<f64>,
    /// Skip events before this time
    #[arg(long)]
    start: Option<f64>,
    /// Skip events after this time
    #[arg(long)]
    end: Option<f64>,
    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let start_time = time::Instant::now();

    let opts = Options {
        input: if cli.sessions {
            Input::Sessions
        } else {
            Input::Events
        },
        sort: cli.sort,
        strict: cli.strict,
        baseline: cli.baseline,
        capacity: cli.capacity,
        resolution: cli.resolution,
        window: TimeWindow {
            start: cli.start,
            end: cli.end,
        },
    };

    let ctx = eventtable_cmd::create_context(&cli.path).await?;
    tracing::info!("prepare time: {}", start_time.elapsed());

    let agg = eventtable_cmd::aggregate(&ctx, &opts).await?;
    tracing::info!("execute time: {}", start_time.elapsed());

    eventtable_cmd::write_output(&agg, cli.format, std::io::stdout().lock())
}
