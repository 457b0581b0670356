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

//! The scheduling session: it owns all per-run state (network, traffic,
//! reservation, time model results) and drives the one-shot and incremental
//! strategies over a solver [`Backend`].

use std::time::Instant;

use log::info;

use crate::error::Error;
use crate::milp::{Backend, SolverParams, VarId};
use crate::model::{LinkId, Network, Reservation, Traffic};
use crate::time_model;

pub mod constraints;
pub mod verifier;

/// Replicas per transmission. Wireless replication is modeled structurally,
/// but current deployments fix the replica count to one.
pub(crate) const NUM_REPLICAS: usize = 1;

/// The scheduling strategy to run.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Algorithm {
    /// Solve all frames in a single solver invocation.
    OneShot,
    /// Solve a fixed number of frames per iteration, freezing their offsets
    /// before continuing with the next batch.
    Incremental,
}

/// Weights of the two slack families in the objective.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ObjectiveWeights {
    /// Weight of the per-frame distance slack.
    pub frame: f64,
    /// Weight of the per-link distance slack.
    pub link: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self { frame: 0.9, link: 0.1 }
    }
}

/// Scheduler configuration, parsed from the scheduler configuration document.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Config {
    /// The strategy to run.
    pub algorithm: Algorithm,
    /// Relative MIP gap at which the solver may stop. 0 demands optimality.
    pub mip_gap: f64,
    /// Wall-clock limit in seconds, applied per solver invocation.
    pub time_limit: Option<u64>,
    /// Frames per iteration of the incremental strategy.
    pub frames_per_iteration: usize,
    /// Objective weights.
    pub weights: ObjectiveWeights,
}

impl Config {
    /// Configuration for the one-shot strategy with default parameters.
    pub fn one_shot() -> Self {
        Self {
            algorithm: Algorithm::OneShot,
            mip_gap: 0.0,
            time_limit: None,
            frames_per_iteration: 0,
            weights: ObjectiveWeights::default(),
        }
    }

    /// Configuration for the incremental strategy with `k` frames per
    /// iteration and default parameters.
    pub fn incremental(k: usize) -> Self {
        Self {
            algorithm: Algorithm::Incremental,
            frames_per_iteration: k,
            ..Self::one_shot()
        }
    }
}

/// The state of a scheduling session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SessionState {
    /// No inputs loaded.
    Empty,
    /// Topology and traffic are loaded.
    Loaded,
    /// Time model and offset graph are built.
    Prepared,
    /// A strategy is running.
    Solving,
    /// The solver produced offsets for every frame.
    Solved,
    /// The verifier accepted the schedule. Terminal.
    Verified,
    /// Preparation, solving, or verification failed. Terminal.
    Failed,
}

/// A scheduling session. All mutable state of a run lives here; two sessions
/// never share anything.
#[derive(Debug)]
pub struct Session {
    /// The network to schedule on.
    network: Network,
    /// The frames to schedule, in priority order.
    traffic: Traffic,
    /// The materialized self-healing reservation, when the protocol is active.
    reservation: Option<Reservation>,
    /// Timeslot length in nanoseconds. 0 until prepared.
    timeslot: u64,
    /// Scheduling horizon in timeslots. 0 until prepared.
    hyperperiod: u64,
    /// Current state of the session.
    state: SessionState,
}

impl Session {
    /// Create a session over loaded inputs.
    pub fn new(network: Network, traffic: Traffic) -> Self {
        Self {
            network,
            traffic,
            reservation: None,
            timeslot: 0,
            hyperperiod: 0,
            state: SessionState::Loaded,
        }
    }

    /// Run the time model and the offset graph builder. After this, all
    /// durations are in timeslot units and every frame has its offset table.
    pub fn prepare(&mut self) -> Result<(), Error> {
        debug_assert_eq!(self.state, SessionState::Loaded);
        let tm = match time_model::normalize(&mut self.network, &mut self.traffic) {
            Ok(tm) => tm,
            Err(e) => {
                self.state = SessionState::Failed;
                return Err(e);
            }
        };
        self.timeslot = tm.timeslot();
        self.hyperperiod = tm.hyperperiod();

        for frame in self.traffic.frames_mut() {
            let table = crate::model::OffsetTable::build(
                frame.receivers(),
                frame.size(),
                frame.period(),
                &self.network,
                self.hyperperiod,
                self.timeslot,
                NUM_REPLICAS,
            )?;
            frame.set_offsets(table);
        }

        self.reservation = self.network.self_healing().copied().map(|shp| {
            Reservation::build(&shp, self.network.max_link_id(), self.hyperperiod)
        });

        self.state = SessionState::Prepared;
        Ok(())
    }

    /// Run a scheduling strategy, then verify the resulting schedule.
    pub fn schedule<B: Backend>(&mut self, config: &Config, backend: &mut B) -> Result<(), Error> {
        debug_assert_eq!(self.state, SessionState::Prepared);
        self.state = SessionState::Solving;
        if let Err(e) = self.run_strategy(config, backend) {
            self.state = SessionState::Failed;
            return Err(e);
        }
        self.state = SessionState::Solved;
        match verifier::verify(&self.network, &self.traffic, self.reservation.as_ref()) {
            Ok(()) => {
                self.state = SessionState::Verified;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    /// Emit and solve the constraint system, K frames at a time. The
    /// one-shot strategy is the degenerate case of a single batch spanning
    /// all frames, which is never pinned.
    fn run_strategy<B: Backend>(&mut self, config: &Config, backend: &mut B) -> Result<(), Error> {
        let total = self.traffic.len();
        let batch_size = match config.algorithm {
            Algorithm::OneShot => total,
            Algorithm::Incremental => config.frames_per_iteration.max(1),
        };
        let params = SolverParams {
            mip_gap: config.mip_gap,
            time_limit: config.time_limit,
        };

        if let Some(reservation) = self.reservation.as_mut() {
            constraints::emit_reservation(backend, reservation);
        }

        let mut frame_dist: Vec<VarId> = Vec::with_capacity(total);
        let mut prev_link_dist: Vec<(LinkId, VarId)> = Vec::new();
        let mut scheduled = 0;
        let mut iteration = 0;
        while scheduled < total {
            let batch_end = (scheduled + batch_size).min(total);
            info!("iteration {iteration}: scheduling frames {scheduled}..{batch_end} of {total}");

            // older link distances keep their pinning role but leave the
            // objective; this iteration gets a fresh copy per link
            for (_, var) in prev_link_dist.drain(..) {
                backend.set_objective_coefficient(var, 0.0);
            }
            let link_dist = constraints::emit_link_distances(
                backend,
                &self.network,
                self.hyperperiod,
                &config.weights,
            );

            constraints::emit_batch(
                backend,
                &self.network,
                self.traffic.frames_mut(),
                scheduled..batch_end,
                self.reservation.as_ref(),
                &link_dist,
                &mut frame_dist,
                &config.weights,
            );

            backend.update();
            info!(
                "solving the model with {} variables and {} constraints",
                backend.num_vars(),
                backend.num_constraints()
            );
            let solve_start = Instant::now();
            let outcome = backend.optimize(&params)?;
            info!(
                "solver finished after {:.3}s: {outcome:?}",
                solve_start.elapsed().as_secs_f64()
            );
            if !outcome.has_incumbent() {
                return Err(Error::NoSchedule { iteration });
            }

            constraints::read_back(backend, &mut self.traffic.frames_mut()[scheduled..batch_end])?;
            if batch_end < total {
                constraints::pin_batch(
                    backend,
                    &self.traffic.frames()[scheduled..batch_end],
                    &frame_dist[scheduled..batch_end],
                );
            }

            prev_link_dist = link_dist;
            scheduled = batch_end;
            iteration += 1;
        }
        Ok(())
    }

    /// The network of this session.
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// The traffic of this session.
    pub fn traffic(&self) -> &Traffic {
        &self.traffic
    }

    /// Mutable access to the traffic, used when re-applying parsed offsets.
    pub(crate) fn traffic_mut(&mut self) -> &mut Traffic {
        &mut self.traffic
    }

    /// The materialized reservation, when the protocol is active.
    pub fn reservation(&self) -> Option<&Reservation> {
        self.reservation.as_ref()
    }

    /// Timeslot length in nanoseconds.
    pub fn timeslot(&self) -> u64 {
        self.timeslot
    }

    /// Scheduling horizon in timeslots.
    pub fn hyperperiod(&self) -> u64 {
        self.hyperperiod
    }

    /// Current state of the session.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the verifier on the current offsets, without touching the state
    /// machine. Used by round-trip checks.
    pub fn verify(&self) -> Result<(), Error> {
        verifier::verify(&self.network, &self.traffic, self.reservation.as_ref())
    }
}
