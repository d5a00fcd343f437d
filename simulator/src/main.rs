use anyhow::Context;
use bridge::QueryBridge;
use chrono::Utc;
use clap::Parser;
use generator::route::build_route_candidates;
use log::info;
use potholecore::pipeline::{maps_link, DetectionPipeline};
use potholecore::storage::{promote_offline, MemoryStore, OfflineLog, PersistenceGateway};
use std::path::PathBuf;
use std::sync::Arc;
use workflow::config::RunnerConfig;
use workflow::runner::Runner;

mod bridge;
mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Pothole detection recorder and survey simulator")]
struct Args {
    /// Load the runner config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Drive a simulated survey route; the default when no other action is given
    #[arg(long, default_value_t = false)]
    simulate: bool,
    #[arg(long)]
    points: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Duplicate radius in meters
    #[arg(long)]
    radius: Option<f64>,
    /// Keep records in memory only
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Move offline-logged records into the primary store before anything else.
    /// Refused with --dry-run, whose in-memory store would drop them at exit.
    #[arg(long, default_value_t = false, conflicts_with = "dry_run")]
    promote_offline: bool,
    /// Print aggregate statistics
    #[arg(long, default_value_t = false)]
    stats: bool,
    /// Keep the HTTP query bridge alive until Ctrl+C
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    }
    .with_overrides(args.radius, args.points, args.seed);

    let gateway = if args.dry_run {
        PersistenceGateway::new(
            Box::new(MemoryStore::new()),
            OfflineLog::new(&config.core.offline_log_path),
        )
    } else {
        PersistenceGateway::from_config(&config.core)
    };

    if args.promote_offline {
        let report = promote_offline(gateway.primary(), gateway.offline_log())
            .context("promoting offline records")?;
        println!(
            "Promotion -> promoted {}, remaining {}, unparsable {}",
            report.promoted, report.remaining, report.unparsable
        );
    }

    let pipeline = Arc::new(
        DetectionPipeline::new(&config.core, gateway).context("building detection pipeline")?,
    );
    info!(
        "pipeline ready with {} known potholes",
        pipeline.known_count()?
    );

    let simulate = args.simulate || !(args.promote_offline || args.stats || args.serve);
    if simulate {
        let candidates = build_route_candidates(&config.route, Utc::now())?;
        let summary = Runner::new(pipeline.clone()).execute(candidates)?;
        println!("Simulated drive -> {}", summary.report_line());
        summary.append_to(&config.summary_log_path)?;
    }

    if args.stats {
        let stats = pipeline.statistics(Utc::now())?;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        if let Some(link) = maps_link(&pipeline.locations(None, 10)?) {
            println!("Latest potholes: {link}");
        }
    }

    if args.serve {
        println!(
            "Query bridge on http://{} (Ctrl+C to stop)",
            config.bridge_address
        );
        QueryBridge::new(pipeline, config.bridge_address).serve_until_ctrl_c()?;
    }

    Ok(())
}
