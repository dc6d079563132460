use clap::Parser;
use log::{info, warn};
use reorder_probe::affinity::{self, Affinity};
use reorder_probe::fence::FenceStrength;
use reorder_probe::probe::{run_controller, ProbeState, Role};
use std::process;
use std::thread;

/// Empirical probe for store-buffer memory reordering.
///
/// Two worker threads each store 1 into their own cell, cross an ordering
/// barrier, and load the other worker's cell. Every round in which both
/// loads observe 0 is reported on stdout; otherwise the probe is silent.
/// Runs until killed.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Barrier strength between each worker's store and load.
    #[arg(long, value_enum, default_value_t = FenceStrength::CompilerOnly)]
    fence: FenceStrength,

    /// Whether both workers are pinned onto one core or free to roam.
    #[arg(long, value_enum, default_value_t = Affinity::Unconstrained)]
    affinity: Affinity,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let (fence, affinity) = (args.fence, args.affinity);
    info!("running with fence = {fence:?}, affinity = {affinity:?}");

    let state = ProbeState::new();
    thread::scope(|s| {
        for role in [Role::A, Role::B] {
            let state = &state;
            let spawned = thread::Builder::new()
                .name(format!("worker-{role:?}").to_lowercase())
                .spawn_scoped(s, move || {
                    if affinity == Affinity::SingleCore {
                        // Both workers land on core 0, forcing them to
                        // interleave inside a single pipeline.
                        if let Err(err) = affinity::pin_current_thread(0) {
                            warn!("could not pin worker {role:?} to core 0: {err}");
                        }
                    }
                    state.worker(role, fence);
                });
            if let Err(err) = spawned {
                // The experiment is meaningless with fewer than two
                // workers, so a failed spawn aborts the process.
                eprintln!("failed to spawn worker thread: {err}");
                process::exit(1);
            }
        }
        run_controller(&state, None);
    });
}
