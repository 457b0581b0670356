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

//! The optimize engine: re-opens a patched link as a bounded MILP. The fixed
//! transmissions and the reservation are pinned; the new frames vary within
//! their prescribed `[min, max]` ranges, with a frame distance slack pushing
//! each transmission away from its window edges and a link distance slack
//! spreading transmissions apart. Solving reuses the K-at-a-time
//! solve-and-pin pacing of the incremental strategy.

use std::time::Instant;

use log::info;

use crate::error::Error;
use crate::milp::{Backend, Cmp, LinExpr, SolverParams, VarId, VarKind};
use crate::patch::{verify_link, PatchFrame, PatchInput};
use crate::scheduler::Config;

/// A transmission that cannot move: its pinned variable, its start, and its
/// duration.
#[derive(Clone, Copy, Debug)]
struct PinnedCell {
    /// The pinned solver variable.
    var: VarId,
    /// Transmission start in timeslots.
    start: u64,
    /// Transmission duration in timeslots.
    dur: u64,
}

/// Refine a patched link. Expects the greedy allocator to have run already,
/// which established that the problem is feasible; the solver then improves
/// the placement of the new frames within their windows.
pub fn refine<B: Backend>(
    input: &mut PatchInput,
    config: &Config,
    backend: &mut B,
) -> Result<(), Error> {
    let params = SolverParams {
        mip_gap: config.mip_gap,
        time_limit: config.time_limit,
    };
    let batch_size = config.frames_per_iteration.max(1);
    let total = input.frames.len();

    let pinned = emit_pinned(backend, input);
    info!(
        "optimizing {} frames on link {} around {} pinned transmissions",
        total,
        input.link,
        pinned.len()
    );

    let mut frame_dist: Vec<VarId> = Vec::with_capacity(total);
    let mut prev_link_dist: Option<VarId> = None;
    let mut scheduled = 0;
    let mut iteration = 0;
    while scheduled < total {
        let batch_end = (scheduled + batch_size).min(total);

        if let Some(var) = prev_link_dist.take() {
            backend.set_objective_coefficient(var, 0.0);
        }
        let link_dist = backend.add_var(VarKind::Integer, 0, input.hyperperiod as i64);
        backend.set_objective_coefficient(link_dist, config.weights.link);

        for frame in &mut input.frames[scheduled..batch_end] {
            let dist = emit_frame(backend, frame, config.weights.frame);
            frame_dist.push(dist);
        }
        for fi in scheduled..batch_end {
            emit_disjunctions(backend, input, fi, &pinned, link_dist);
        }

        backend.update();
        let solve_start = Instant::now();
        let outcome = backend.optimize(&params)?;
        info!(
            "solver finished iteration {iteration} after {:.3}s: {outcome:?}",
            solve_start.elapsed().as_secs_f64()
        );
        if !outcome.has_incumbent() {
            return Err(Error::NoSchedule { iteration });
        }

        for frame in &mut input.frames[scheduled..batch_end] {
            read_back(backend, frame)?;
        }
        if batch_end < total {
            for fi in scheduled..batch_end {
                pin_frame(backend, &input.frames[fi]);
                backend.set_objective_coefficient(frame_dist[fi], 0.0);
            }
        }

        prev_link_dist = Some(link_dist);
        scheduled = batch_end;
        iteration += 1;
    }

    verify_link(input)
}

/// Create pinned variables for the fixed frames and the reservation.
fn emit_pinned<B: Backend>(backend: &mut B, input: &PatchInput) -> Vec<PinnedCell> {
    let mut pinned = Vec::new();
    for fixed in &input.fixed {
        for &(start, end) in fixed.instances() {
            let var = backend.add_var(VarKind::Integer, start as i64, start as i64);
            pinned.push(PinnedCell {
                var,
                start,
                dur: end - start,
            });
        }
    }
    for (start, end) in input.reservation_intervals() {
        let var = backend.add_var(VarKind::Integer, start as i64, start as i64);
        pinned.push(PinnedCell {
            var,
            start,
            dur: end - start,
        });
    }
    pinned
}

/// Create the offset variables of a new frame together with its frame
/// distance slack. The slack is bounded by the widest instance window and
/// keeps every transmission `dist` slots away from both window edges.
fn emit_frame<B: Backend>(backend: &mut B, frame: &mut PatchFrame, weight: f64) -> VarId {
    let offset = frame.offset_mut();
    let widest = (0..offset.num_instances())
        .map(|i| {
            let (min, max) = offset.range(i, 0);
            (max - min) as i64
        })
        .max()
        .unwrap_or(0);
    let dist = backend.add_var(VarKind::Integer, 0, widest);
    backend.set_objective_coefficient(dist, weight);

    for instance in 0..offset.num_instances() {
        let (min, max) = offset.range(instance, 0);
        let var = backend.add_var(VarKind::Integer, min as i64, max as i64);
        offset.set_var(instance, 0, var);
        backend.add_linear(
            LinExpr::new().term(1, var).term(-1, dist),
            Cmp::Ge,
            min as i64,
        );
        backend.add_linear(
            LinExpr::new().term(1, var).term(1, dist),
            Cmp::Le,
            max as i64,
        );
    }
    dist
}

/// Emit contention-free disjunctions between frame `fi` and every pinned
/// transmission and every earlier new frame whose possible spans intersect.
fn emit_disjunctions<B: Backend>(
    backend: &mut B,
    input: &PatchInput,
    fi: usize,
    pinned: &[PinnedCell],
    link_dist: VarId,
) {
    let frame = &input.frames[fi];
    let offset = frame.offset();
    for instance in 0..offset.num_instances() {
        let span = possible_span(frame, instance);
        let var = offset.var(instance, 0).expect("variable emitted");
        let dur = offset.transmission() as i64;

        for cell in pinned {
            if span.0 < cell.start + cell.dur && cell.start < span.1 {
                emit_pair(backend, cell.var, cell.dur as i64, var, dur, link_dist);
            }
        }
        for earlier in &input.frames[..fi] {
            for other_instance in 0..earlier.offset().num_instances() {
                let other_span = possible_span(earlier, other_instance);
                if span.0 < other_span.1 && other_span.0 < span.1 {
                    let other_var = earlier
                        .offset()
                        .var(other_instance, 0)
                        .expect("variable emitted");
                    emit_pair(
                        backend,
                        other_var,
                        earlier.offset().transmission() as i64,
                        var,
                        dur,
                        link_dist,
                    );
                }
            }
        }
    }
}

/// The span a transmission can possibly occupy: from the earliest allowed
/// start to the end of a transmission at the latest allowed start.
fn possible_span(frame: &PatchFrame, instance: usize) -> (u64, u64) {
    let (min, max) = frame.offset().range(instance, 0);
    (min, max + frame.offset().transmission())
}

/// One disjunction between an earlier and a later transmission, identical in
/// shape to the one of the full constraint model.
fn emit_pair<B: Backend>(
    backend: &mut B,
    x_earlier: VarId,
    dur_earlier: i64,
    x_frame: VarId,
    dur_frame: i64,
    dist: VarId,
) {
    let a = backend.add_var(VarKind::Binary, 0, 1);
    let b = backend.add_var(VarKind::Binary, 0, 1);
    backend.add_or(a, b);
    backend.add_indicator(
        a,
        LinExpr::new().term(1, x_frame).term(-1, x_earlier).term(-1, dist),
        Cmp::Ge,
        dur_earlier,
    );
    backend.add_indicator(
        b,
        LinExpr::new().term(1, x_earlier).term(-1, x_frame).term(-1, dist),
        Cmp::Ge,
        dur_frame,
    );
}

/// Read the solved placements of a frame back into its offset.
fn read_back<B: Backend>(backend: &B, frame: &mut PatchFrame) -> Result<(), Error> {
    let offset = frame.offset_mut();
    for instance in 0..offset.num_instances() {
        let var = offset.var(instance, 0).expect("variable emitted");
        let value = backend.value(var).ok_or_else(|| {
            Error::Backend("solver reported an incumbent without values".to_string())
        })?;
        if value < 0 {
            return Err(Error::Backend(format!(
                "solver returned negative offset {value}"
            )));
        }
        offset.set_value(instance, 0, value as u64);
    }
    Ok(())
}

/// Freeze the placements of a solved frame with equality constraints.
fn pin_frame<B: Backend>(backend: &mut B, frame: &PatchFrame) {
    let offset = frame.offset();
    for instance in 0..offset.num_instances() {
        let var = offset.var(instance, 0).expect("variable emitted");
        let value = offset.value(instance, 0).expect("read back before pinning") as i64;
        backend.add_linear(LinExpr::new().term(1, var), Cmp::Eq, value);
    }
}
