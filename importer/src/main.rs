use anyhow::Result;
use structopt::StructOpt;

use importer::checkpoint::CheckpointStore;
use importer::driver::{self, Options};
use importer::logger::Logger;
use importer::source::GeoJsonSource;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "importer",
    about = "Build a planar road topology from a line dataset"
)]
struct Flags {
    /// Line dataset to import (a GeoJSON FeatureCollection of LineStrings)
    #[structopt(long = "db")]
    db: String,

    /// Skip straight to the merge phase (all leaf checkpoints must exist)
    #[structopt(long = "merge-only")]
    merge_only: bool,

    /// Don't restore merged topologies from checkpoints; recompute them
    #[structopt(long = "no-merge-restore")]
    no_merge_restore: bool,

    /// Merge step to resume from (0 runs all steps)
    #[structopt(long = "merge-step", default_value = "0")]
    merge_step: usize,

    /// Worker pool width (default: one per CPU)
    #[structopt(long = "workers")]
    workers: Option<usize>,

    /// Checkpoint directory, shared by all workers
    #[structopt(long = "checkpoints", default_value = "checkpoints")]
    checkpoints: String,

    /// Where the root topology gets written
    #[structopt(long = "output", default_value = "topology.ser")]
    output: String,
}

fn main() {
    Logger::setup();
    // --help comes back as a parse error carrying the usage text; it exits
    // nonzero, same as a bad argument.
    let flags = match Flags::from_args_safe() {
        Ok(flags) => flags,
        Err(err) => {
            println!("{}", err.message);
            std::process::exit(1);
        }
    };
    if let Err(err) = run(&flags) {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(flags: &Flags) -> Result<()> {
    let source = GeoJsonSource::open(&flags.db)?;
    let store = CheckpointStore::new(&flags.checkpoints)?;
    let opts = Options {
        merge_only: flags.merge_only,
        merge_restore: !flags.no_merge_restore,
        first_merge_step: flags.merge_step,
        workers: flags.workers.unwrap_or_else(num_cpus::get),
        output: flags.output.clone().into(),
    };
    driver::run(&source, &store, &opts)
}
