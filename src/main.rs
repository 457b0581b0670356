// Weft: collision-free scheduling for time-triggered networks
// Copyright (C) 2024 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use log::{error, info};

use weft::milp::cbc::CbcBackend;
use weft::{io, patch, Config, Error, Session};

/// Compute collision-free schedules for time-triggered traffic, or integrate
/// new frames into an existing schedule on a single link.
#[derive(Debug, Parser)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute a schedule for a network and traffic description.
    Schedule {
        /// Network document with topology and traffic.
        network: PathBuf,
        /// Scheduler configuration document.
        config: PathBuf,
        /// Where to write the schedule document.
        output: PathBuf,
    },
    /// Greedily place new frames around the fixed transmissions of one link.
    Patch {
        /// Patch document.
        input: PathBuf,
        /// Where to write the patched schedule.
        output: PathBuf,
        /// Where to write the timing document.
        timing: PathBuf,
    },
    /// Place new frames on one link, then refine the placement with the
    /// solver.
    Optimize {
        /// Optimize document.
        input: PathBuf,
        /// Where to write the optimized schedule.
        output: PathBuf,
        /// Where to write the timing document.
        timing: PathBuf,
    },
}

/// Frames per solve-and-pin iteration when refining a patched link.
const OPTIMIZE_FRAMES_PER_ITERATION: usize = 1;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_timed();

    match Cli::parse().command {
        Command::Schedule {
            network,
            config,
            output,
        } => run_schedule(network, config, output),
        Command::Patch {
            input,
            output,
            timing,
        } => run_patch(input, output, timing),
        Command::Optimize {
            input,
            output,
            timing,
        } => run_optimize(input, output, timing),
    }
}

/// Ingest, prepare, solve, verify, and write the schedule.
fn run_schedule(
    network: PathBuf,
    config: PathBuf,
    output: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let (net, traffic) = io::network::read(&network)?;
    let config = io::config::read(&config)?;
    info!(
        "scheduling {} frames over {} links with {:?}",
        traffic.len(),
        net.num_links(),
        config.algorithm
    );

    let mut session = Session::new(net, traffic);
    session.prepare()?;
    let mut backend = CbcBackend::new();
    let solve_start = Instant::now();
    session.schedule(&config, &mut backend)?;
    info!(
        "schedule verified after {:.3}s (hyperperiod {} slots of {}ns)",
        solve_start.elapsed().as_secs_f64(),
        session.hyperperiod(),
        session.timeslot()
    );

    io::schedule::write(&session, &output)?;
    Ok(())
}

/// Run the greedy allocator. On infeasibility only the timing document is
/// written and the process still exits cleanly.
fn run_patch(
    input: PathBuf,
    output: PathBuf,
    timing: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut patch_input = io::patch::read(&input)?;

    let start = Instant::now();
    let result = patch::patch(&mut patch_input);
    let elapsed = start.elapsed().as_nanos();
    io::schedule::write_timing(elapsed, &timing)?;

    match result {
        Ok(()) => {
            info!("patched link {} in {elapsed}ns", patch_input.link);
            io::schedule::write_patched(&patch_input, "PatchedSchedule", &output)?;
            Ok(())
        }
        Err(e @ Error::PatchInfeasible { .. }) => {
            error!("{e}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Run the greedy allocator, then re-open the link as a MILP.
fn run_optimize(
    input: PathBuf,
    output: PathBuf,
    timing: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut patch_input = io::patch::read(&input)?;

    let greedy_start = Instant::now();
    match patch::patch(&mut patch_input) {
        Ok(()) => {}
        Err(e @ Error::PatchInfeasible { .. }) => {
            io::schedule::write_timing(greedy_start.elapsed().as_nanos(), &timing)?;
            error!("{e}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let mut backend = CbcBackend::new();
    let config = Config::incremental(OPTIMIZE_FRAMES_PER_ITERATION);
    let solve_start = Instant::now();
    let result = patch::optimize::refine(&mut patch_input, &config, &mut backend);
    let elapsed = solve_start.elapsed().as_nanos();
    io::schedule::write_timing(elapsed, &timing)?;

    match result {
        Ok(()) => {
            info!("optimized link {} in {elapsed}ns", patch_input.link);
            io::schedule::write_patched(&patch_input, "OptimizedSchedule", &output)?;
            Ok(())
        }
        Err(e @ Error::NoSchedule { .. }) => {
            error!("{e}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
