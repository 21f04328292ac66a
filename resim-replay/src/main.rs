// Copyright (c) 2026 The resim developers. All rights reserved.

//! Replay a recorded pipeline run under a different configuration.
//!
//! Reads one recorded trace group (a YAML file, or stdin when no file is
//! given), rebuilds the demand tree the real run worked through, replays
//! it against the configured queue capacities and worker counts, and
//! prints the resulting makespan.
//!
//! For example, to see what a run would have taken with four fine-bucketing
//! threads and two devices:
//! ```text
//! cargo run --bin resim-replay -- resim-replay/examples/small-run.yaml \
//!     --bucket-threads 4 --gpus 2
//! ```
//!
//! Capacity caps count items by default; `--by-size` switches to the
//! recorded byte sizes and `--infinite` removes the caps entirely, which
//! gives the lower bound the pipeline could reach with unlimited memory.

use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Result;
use clap::Parser;
use resim_engine::engine::Engine;
use resim_model::demand::build_tree;
use resim_model::pipeline::{Pipeline, ReplayConfig};
use resim_model::trace::Trace;
use resim_track::info;
use resim_track::tracker::{
    EntityManager, TextTracker, TrackConfigError, dev_null_tracker,
};
use resim_track::{Tracker, Writer};

/// Command-line arguments.
#[derive(Parser)]
#[command(about = "Replay a recorded pipeline run under a different resource configuration")]
struct Cli {
    /// Enable logging to the console.
    #[arg(long, default_value = "false")]
    stdout: bool,

    /// Level of log message to display.
    #[arg(long, default_value = "Info")]
    stdout_level: log::Level,

    /// Set a regular expression for which entities should have logging
    /// level set to `--stdout-level`. Others will have level set to
    /// `Error`.
    #[arg(long, default_value = "")]
    stdout_filter_regex: String,

    /// Account queue demand by the recorded byte sizes instead of item
    /// counts.
    #[arg(long)]
    by_size: bool,

    /// Disable all capacity caps.
    #[arg(long)]
    infinite: bool,

    /// Number of fine-bucketing worker threads.
    #[arg(long, default_value = "2", value_name = "THREADS")]
    bucket_threads: usize,

    /// Number of device instances.
    #[arg(long, default_value = "1")]
    gpus: usize,

    /// Extra item slots on the coarse queue.
    #[arg(long, default_value = "1", value_name = "SLOTS")]
    coarse_spare: u64,

    /// Minimum spare item slots on the fine queues.
    #[arg(long, default_value = "6", value_name = "SLOTS")]
    bucket_spare: u64,

    /// Extra slots on the mesh queue.
    #[arg(long, default_value = "8", value_name = "SLOTS")]
    mesher_spare: u64,

    /// Coarse queue byte cap, used with `--by-size`.
    #[arg(long, default_value = "2048", value_name = "MiB")]
    coarse_cap: u64,

    /// Fine queue byte cap, used with `--by-size`.
    #[arg(long, default_value = "512", value_name = "MiB")]
    bucket_cap: u64,

    /// Mesh queue byte cap, used with `--by-size`.
    #[arg(long, default_value = "256", value_name = "MiB")]
    mesher_cap: u64,

    /// Bind fine output to devices through a shared slot-token queue
    /// instead of one bounded queue per device.
    #[arg(long)]
    slot_queue: bool,

    /// The trace file to replay; stdin when omitted.
    trace: Option<PathBuf>,
}

impl Cli {
    fn replay_config(&self) -> ReplayConfig {
        ReplayConfig {
            by_size: self.by_size,
            infinite: self.infinite,
            bucket_threads: self.bucket_threads,
            gpus: self.gpus,
            coarse_spare: self.coarse_spare,
            bucket_spare: self.bucket_spare,
            mesher_spare: self.mesher_spare,
            coarse_cap_mib: self.coarse_cap,
            bucket_cap_mib: self.bucket_cap,
            mesher_cap_mib: self.mesher_cap,
            slot_queue: self.slot_queue,
        }
    }
}

/// Create a tracker that prints to stdout.
///
/// The user can pass a filter regular expression which will set the level
/// only for matching entities and set all other entities to only emit
/// errors.
fn setup_tracker(args: &Cli) -> Result<Tracker, TrackConfigError> {
    if !args.stdout {
        return Ok(dev_null_tracker());
    }

    let default_level = if args.stdout_filter_regex.is_empty() {
        args.stdout_level
    } else {
        log::Level::Error
    };

    let mut manager = EntityManager::new(default_level);
    if !args.stdout_filter_regex.is_empty() {
        manager.add_level_filter(&args.stdout_filter_regex, args.stdout_level)?;
    }

    let writer: Writer = Box::new(io::BufWriter::new(io::stdout()));
    Ok(Rc::new(TextTracker::new(manager, writer)))
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let tracker = setup_tracker(&args)?;

    let mut engine = Engine::new(&tracker);
    let top = engine.top().clone();

    let trace = match &args.trace {
        Some(path) => Trace::from_file(path)?,
        None => Trace::from_reader(io::stdin().lock())?,
    };
    trace.validate()?;

    let root = build_tree(&top, &trace)?;
    info!(top ; "Demand tree rebuilt: {} items", root.num_nodes());

    let pipeline = Pipeline::build(&engine, &args.replay_config())?;
    let makespan = pipeline.run(&mut engine, root)?;

    println!("{makespan}");
    Ok(())
}
