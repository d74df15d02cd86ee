use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use splitkernel::{
    GlobalSizePlan, HostDevice, HostDeviceStats, RenderTile, RequestedFeatures, SchedulerOpts,
    SplitKernelScheduler, StageBuffers, StateSchema, SyntheticPipeline, TileTask, TraceStats,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "splitkernel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render tiles on the host device with synthetic stage programs.
    Simulate(SimulateArgs),
    /// Print the state buffer layout for a lane count.
    Layout(LayoutArgs),
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    #[arg(long)]
    width: u32,

    #[arg(long)]
    height: u32,

    /// Samples per tile.
    #[arg(long)]
    samples: u32,

    #[arg(long, default_value_t = 0)]
    start_sample: u32,

    /// Tiles rendered side by side, all through one scheduler.
    #[arg(long, default_value_t = 1)]
    tiles: u32,

    /// Scheduler options JSON.
    #[arg(long)]
    opts: Option<PathBuf>,

    /// Requested features JSON.
    #[arg(long)]
    features: Option<PathBuf>,

    /// Path iterations before a lane goes inactive.
    #[arg(long, default_value_t = 4)]
    bounces: u32,

    /// Cancel each tile after this many sample batches.
    #[arg(long)]
    cancel_after_batches: Option<usize>,

    /// Print a JSON report instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Parser, Debug)]
struct LayoutArgs {
    #[arg(long)]
    lanes: u64,

    #[arg(long, default_value_t = 64)]
    max_closures: u32,

    /// Per-lane auxiliary output bytes.
    #[arg(long, default_value_t = 0)]
    aux: u64,

    /// Scheduler options JSON (element sizes and debug block).
    #[arg(long)]
    opts: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(serde::Serialize)]
struct TileReport {
    index: u32,
    x: i32,
    sample: u32,
    stats: TraceStats,
}

#[derive(serde::Serialize)]
struct SimulateReport {
    plan: Option<GlobalSizePlan>,
    avg_time_per_sample: f64,
    completed_paths: u64,
    tiles: Vec<TileReport>,
    device: HostDeviceStats,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Simulate(args) => cmd_simulate(args),
        Command::Layout(args) => cmd_layout(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn load_opts(path: Option<&PathBuf>) -> anyhow::Result<SchedulerOpts> {
    match path {
        Some(p) => Ok(SchedulerOpts::from_path(p)?),
        None => Ok(SchedulerOpts::default()),
    }
}

fn cmd_simulate(args: SimulateArgs) -> anyhow::Result<()> {
    let opts = load_opts(args.opts.as_ref())?;
    let features = match &args.features {
        Some(p) => {
            let s = std::fs::read_to_string(p)
                .with_context(|| format!("read features '{}'", p.display()))?;
            RequestedFeatures::from_json_str(&s)?
        }
        None => RequestedFeatures::default(),
    };

    let pipeline = SyntheticPipeline::new(args.bounces);
    let mut device = HostDevice::new("host");
    pipeline.install(&mut device);
    let mut scheduler = SplitKernelScheduler::builder(device)
        .opts(opts)
        .features(features)
        .build()
        .context("build scheduler")?;

    let mut tiles = Vec::with_capacity(args.tiles as usize);
    for index in 0..args.tiles {
        let x = i32::try_from(u64::from(index) * u64::from(args.width))
            .context("tile offset overflows i32")?;
        let mut tile = RenderTile::new(
            x,
            0,
            args.width,
            args.height,
            args.start_sample,
            args.samples,
        );
        let mut task = TileTask::new();
        if let Some(n) = args.cancel_after_batches {
            task = task.cancel_after_updates(n);
        }
        let stats = scheduler
            .path_trace(&mut task, &mut tile, StageBuffers::default())
            .with_context(|| format!("render tile {index}"))?;
        if !args.json {
            println!(
                "tile {index}: x={x} sample={} batches={} bursts={} cancelled={}",
                tile.sample, stats.batches, stats.bursts, stats.cancelled
            );
        }
        tiles.push(TileReport {
            index,
            x,
            sample: tile.sample,
            stats,
        });
    }

    let report = SimulateReport {
        plan: scheduler.global_size(),
        avg_time_per_sample: scheduler.avg_time_per_sample(),
        completed_paths: pipeline.completed_paths(),
        tiles,
        device: scheduler.device().stats().clone(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if let Some(plan) = report.plan {
            println!(
                "grid: global={} local={} shadow={}",
                plan.global_size, plan.local_size, plan.global_size_shadow
            );
        }
        println!(
            "paths={} avg_time_per_sample={:.6}s allocs={} enqueues={} peak_bytes={}",
            report.completed_paths,
            report.avg_time_per_sample,
            report.device.allocs,
            report.device.enqueues,
            report.device.peak_bytes
        );
    }
    Ok(())
}

fn cmd_layout(args: LayoutArgs) -> anyhow::Result<()> {
    let schema: StateSchema = load_opts(args.opts.as_ref())?.schema();
    let layout = schema
        .compute_layout(args.lanes, args.max_closures, args.aux)
        .context("compute state layout")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&layout)?);
        return Ok(());
    }

    println!(
        "lanes={} max_closures={} shader_data_size={} total_size={}",
        layout.lanes, layout.max_closures, layout.shader_data_size, layout.total_size
    );
    for e in layout.entries() {
        println!(
            "{:<18} offset={:<10} stride={:<5} count={:<8} reserved={}",
            e.field.name(),
            e.offset,
            e.stride,
            e.count,
            e.reserved
        );
    }
    Ok(())
}
