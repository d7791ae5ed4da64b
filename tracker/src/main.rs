use anyhow::Context;
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use trackcore::prelude::{PipelineConfig, DEFAULT_TOPIC};
use workflow::config::TrackerConfig;
use workflow::runner::Runner;

mod status_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Simulated location tracker with live distance reporting")]
struct Args {
    /// Load a tracker config from YAML instead of the flags below.
    /// Only --run-for-ms, --serve and --summary combine with it.
    #[arg(
        long,
        conflicts_with_all = [
            "topic",
            "publish_interval_ms",
            "poll_timeout_ms",
            "report_interval_ms",
            "start_lat",
            "start_lon",
            "seed",
            "persist",
            "port",
        ]
    )]
    config: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_TOPIC)]
    topic: String,
    #[arg(long, default_value_t = 1_000)]
    publish_interval_ms: u64,
    #[arg(long, default_value_t = 100)]
    poll_timeout_ms: u64,
    #[arg(long, default_value_t = 5_000)]
    report_interval_ms: u64,
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    start_lat: f64,
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    start_lon: f64,
    /// Seed for a reproducible random walk
    #[arg(long)]
    seed: Option<u64>,
    /// Append every ingested fix to this JSON-lines file
    #[arg(long)]
    persist: Option<PathBuf>,
    /// Stop after this many milliseconds instead of waiting for Ctrl+C
    #[arg(long)]
    run_for_ms: Option<u64>,
    /// Serve GET /status on 127.0.0.1 while running
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long, default_value_t = 9000)]
    port: u16,
    /// Append the final run summary as JSON to this file
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut tracker_config = if let Some(path) = &args.config {
        TrackerConfig::load(path)?
    } else {
        let pipeline = PipelineConfig {
            topic: args.topic.clone(),
            publish_interval_ms: args.publish_interval_ms,
            poll_timeout_ms: args.poll_timeout_ms,
            report_interval_ms: args.report_interval_ms,
            start_latitude: args.start_lat,
            start_longitude: args.start_lon,
            seed: args.seed,
            ..Default::default()
        };
        TrackerConfig::from_args(pipeline, args.persist.clone(), args.run_for_ms, args.port)
    };
    if args.run_for_ms.is_some() {
        tracker_config.run_for_ms = args.run_for_ms;
    }

    let runner = Runner::new(tracker_config);
    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;
    let summary = runtime.block_on(runner.execute(args.serve))?;

    println!(
        "Run finished -> fixes {}, distance {:.6} km, published {}, decode failures {}, persistence failures {}",
        summary.fixes,
        summary.total_km,
        summary.metrics.published,
        summary.metrics.decode_failures,
        summary.metrics.persistence_failures
    );

    if let Some(summary_path) = args.summary {
        if let Some(parent) = summary_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(&summary).context("encoding run summary")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&summary_path)
            .with_context(|| format!("opening summary file {}", summary_path.display()))?;
        file.write_all(line.as_bytes())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn config_file_rejects_overlapping_flags() {
        for flag in ["--persist=fixes.jsonl", "--port=9100", "--topic=other", "--seed=3"] {
            let err = Args::try_parse_from(["tracker", "--config", "tracker.yaml", flag])
                .err()
                .unwrap_or_else(|| panic!("{} was accepted alongside --config", flag));
            assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
        }
    }

    #[test]
    fn config_file_combines_with_run_controls() {
        let args = Args::try_parse_from([
            "tracker",
            "--config",
            "tracker.yaml",
            "--run-for-ms",
            "250",
            "--serve",
            "--summary",
            "summary.jsonl",
        ])
        .unwrap();
        assert_eq!(args.run_for_ms, Some(250));
        assert!(args.serve);
        assert_eq!(args.port, 9000);
    }
}
