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

//! The constraint model: offset variables with their domains, path
//! dependency and end-to-end constraints, pairwise contention-free
//! disjunctions, and the objective-weighted distance slacks.
//!
//! All quantities are integers in timeslot units. For frame `F` on link `l`,
//! instance `i` and replica `r`, the offset variable ranges over
//! `[F.start + i*F.period + r*dur, F.deadline - dur + i*F.period - r*dur]`.
//! Two transmissions that share a link and whose active windows overlap are
//! separated by a disjunction: one of two binary indicators must be set, and
//! each indicator enforces one ordering with the link distance slack in
//! between.

use std::ops::Range;

use itertools::iproduct;
use log::debug;

use crate::error::Error;
use crate::milp::{Backend, Cmp, LinExpr, VarId, VarKind};
use crate::model::{Frame, LinkId, Network, Offset, Reservation};
use crate::scheduler::ObjectiveWeights;

/// Create pinned variables for every reservation cell. The reservation
/// transmits at every multiple of the protocol period, so lower and upper
/// bound coincide with the pre-filled value.
pub(crate) fn emit_reservation<B: Backend>(backend: &mut B, reservation: &mut Reservation) {
    for offset in reservation.offsets_mut() {
        for instance in 0..offset.num_instances() {
            let value = offset
                .value(instance, 0)
                .expect("reservation values are pre-filled") as i64;
            let var = backend.add_var(VarKind::Integer, value, value);
            offset.set_var(instance, 0, var);
        }
    }
}

/// Create one fresh link distance variable per link, weighted in the
/// objective. Bounded by the hyperperiod.
pub(crate) fn emit_link_distances<B: Backend>(
    backend: &mut B,
    net: &Network,
    hyperperiod: u64,
    weights: &ObjectiveWeights,
) -> Vec<(LinkId, VarId)> {
    net.links()
        .map(|link| {
            let var = backend.add_var(VarKind::Integer, 0, hyperperiod as i64);
            backend.set_objective_coefficient(var, weights.link);
            (link.id(), var)
        })
        .collect()
}

/// Emit variables and constraints for the frames in `batch`, assuming all
/// frames before the batch have already been emitted (and possibly pinned).
/// Contention-free disjunctions are generated against every earlier frame
/// and against the reservation.
#[allow(clippy::too_many_arguments)]
pub(crate) fn emit_batch<B: Backend>(
    backend: &mut B,
    net: &Network,
    frames: &mut [Frame],
    batch: Range<usize>,
    reservation: Option<&Reservation>,
    link_dist: &[(LinkId, VarId)],
    frame_dist: &mut Vec<VarId>,
    weights: &ObjectiveWeights,
) {
    let mut rows = backend.num_constraints();

    // frame distance and offset variables for the whole batch first, so that
    // disjunctions within the batch see both sides
    for frame in &mut frames[batch.clone()] {
        let dist = backend.add_var(VarKind::Integer, 0, frame.end_to_end() as i64);
        backend.set_objective_coefficient(dist, weights.frame);
        frame_dist.push(dist);
        emit_offset_vars(backend, frame);
    }
    debug!("{} variables after batch {batch:?}", backend.num_vars());

    let frames: &[Frame] = frames;
    for fi in batch.clone() {
        let frame = &frames[fi];
        let dist = frame_dist[fi];

        emit_path_dependencies(backend, net, frame, dist);
        log_rows(backend, &mut rows, "path dependencies", frame);

        emit_end_to_end(backend, frame, dist);
        log_rows(backend, &mut rows, "end-to-end bounds", frame);

        for earlier in &frames[..fi] {
            emit_frame_pair(backend, earlier, frame, link_dist);
        }
        if let Some(reservation) = reservation {
            emit_reservation_pairs(backend, reservation, frame, link_dist);
        }
        log_rows(backend, &mut rows, "contention-free disjunctions", frame);
    }
}

/// Log how many rows the previous emission step produced.
fn log_rows<B: Backend>(backend: &B, rows: &mut usize, what: &str, frame: &Frame) {
    let new_rows = backend.num_constraints();
    debug!("{} rows of {what} for frame {}", new_rows - *rows, frame.id());
    *rows = new_rows;
}

/// Create the offset variables of one frame with the domains of the
/// constraint model.
fn emit_offset_vars<B: Backend>(backend: &mut B, frame: &mut Frame) {
    let start = frame.starting() as i64;
    let deadline = frame.deadline() as i64;
    let period = frame.period() as i64;
    for offset in frame.offsets_mut().offsets_mut() {
        let dur = offset.transmission() as i64;
        for (instance, replica) in
            iproduct!(0..offset.num_instances(), 0..offset.num_replicas())
        {
            let (i, r) = (instance as i64, replica as i64);
            let lb = start + i * period + r * dur;
            let ub = deadline - dur + i * period - r * dur;
            let var = backend.add_var(VarKind::Integer, lb, ub);
            offset.set_var(instance, replica, var);
        }
    }
}

/// For each consecutive pair of links on every path, the later transmission
/// must start at least the transmission duration plus the switch delay after
/// the earlier one, with the frame distance slack in between.
fn emit_path_dependencies<B: Backend>(backend: &mut B, net: &Network, frame: &Frame, dist: VarId) {
    let switch_min = net.switch_min_time() as i64;
    let table = frame.offsets();
    for path in 0..table.num_paths() {
        let hops: Vec<&Offset> = table.path(path).collect();
        for pair in hops.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            let dur = prev.transmission() as i64;
            for instance in 0..prev.num_instances() {
                let expr = LinExpr::new()
                    .term(1, var_of(next, instance, 0))
                    .term(-1, var_of(prev, instance, 0))
                    .term(-1, dist);
                backend.add_linear(expr, Cmp::Ge, dur + switch_min);
            }
        }
    }
}

/// Per path and instance: bound the end-to-end latency (when constrained),
/// and keep the first and last transmission within the start/deadline window
/// with the frame distance slack applied.
fn emit_end_to_end<B: Backend>(backend: &mut B, frame: &Frame, dist: VarId) {
    let start = frame.starting() as i64;
    let deadline = frame.deadline() as i64;
    let period = frame.period() as i64;
    let end_to_end = frame.end_to_end() as i64;
    let table = frame.offsets();
    for path in 0..table.num_paths() {
        let hops: Vec<&Offset> = table.path(path).collect();
        let (first, last) = (hops[0], hops[hops.len() - 1]);
        let dur_first = first.transmission() as i64;
        let dur_last = last.transmission() as i64;
        for instance in 0..first.num_instances() {
            let i = instance as i64;
            if end_to_end > 0 {
                let expr = LinExpr::new()
                    .term(1, var_of(last, instance, 0))
                    .term(-1, var_of(first, instance, 0));
                backend.add_linear(expr, Cmp::Le, end_to_end - dur_first);
            }
            let expr = LinExpr::new()
                .term(1, var_of(first, instance, 0))
                .term(-1, dist);
            backend.add_linear(expr, Cmp::Ge, start + i * period);
            let expr = LinExpr::new()
                .term(1, var_of(last, instance, 0))
                .term(1, dist);
            backend.add_linear(expr, Cmp::Le, deadline - dur_last + i * period);
        }
    }
}

/// Emit the contention-free disjunctions between two frames on every link
/// they share, for every pair of instances whose active windows overlap and
/// every pair of replicas.
fn emit_frame_pair<B: Backend>(
    backend: &mut B,
    earlier: &Frame,
    frame: &Frame,
    link_dist: &[(LinkId, VarId)],
) {
    for offset in frame.offsets().offsets() {
        let Some(other) = earlier.offsets().for_link(offset.link()) else {
            continue;
        };
        let dist = dist_of(link_dist, offset.link());
        for (i_other, i) in iproduct!(0..other.num_instances(), 0..offset.num_instances()) {
            if !windows_overlap(
                window(earlier.starting(), earlier.deadline(), earlier.period(), i_other),
                window(frame.starting(), frame.deadline(), frame.period(), i),
            ) {
                continue;
            }
            for (r_other, r) in iproduct!(0..other.num_replicas(), 0..offset.num_replicas()) {
                emit_contention(
                    backend,
                    var_of(other, i_other, r_other),
                    other.transmission() as i64,
                    var_of(offset, i, r),
                    offset.transmission() as i64,
                    dist,
                );
            }
        }
    }
}

/// Emit the contention-free disjunctions between a frame and the reservation
/// on every link the frame uses.
fn emit_reservation_pairs<B: Backend>(
    backend: &mut B,
    reservation: &Reservation,
    frame: &Frame,
    link_dist: &[(LinkId, VarId)],
) {
    for offset in frame.offsets().offsets() {
        let Some(reserved) = reservation.for_link(offset.link()) else {
            continue;
        };
        let dist = dist_of(link_dist, offset.link());
        for (k, i) in iproduct!(0..reserved.num_instances(), 0..offset.num_instances()) {
            if !windows_overlap(
                window(0, reservation.period(), reservation.period(), k),
                window(frame.starting(), frame.deadline(), frame.period(), i),
            ) {
                continue;
            }
            for r in 0..offset.num_replicas() {
                emit_contention(
                    backend,
                    var_of(reserved, k, 0),
                    reservation.duration() as i64,
                    var_of(offset, i, r),
                    offset.transmission() as i64,
                    dist,
                );
            }
        }
    }
}

/// One disjunction: either the later transmission starts after the earlier
/// one finished, or vice versa, in both cases leaving the link distance
/// slack in between.
fn emit_contention<B: Backend>(
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

/// The active window of instance `i`: `[start + 1, deadline + 1) + i * period`.
fn window(start: u64, deadline: u64, period: u64, instance: usize) -> (i64, i64) {
    let shift = instance as i64 * period as i64;
    (start as i64 + 1 + shift, deadline as i64 + 1 + shift)
}

/// Whether two half-open windows intersect.
fn windows_overlap(a: (i64, i64), b: (i64, i64)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// The solver variable of an offset cell. The cell must have been emitted.
fn var_of(offset: &Offset, instance: usize, replica: usize) -> VarId {
    offset
        .var(instance, replica)
        .expect("offset variable emitted before constraints reference it")
}

/// The link distance variable of a link.
fn dist_of(link_dist: &[(LinkId, VarId)], link: LinkId) -> VarId {
    link_dist
        .iter()
        .find(|(l, _)| *l == link)
        .map(|(_, var)| *var)
        .expect("every link has a distance variable")
}

/// Read the solved offsets of the given frames back from the incumbent.
pub(crate) fn read_back<B: Backend>(backend: &B, frames: &mut [Frame]) -> Result<(), Error> {
    for frame in frames {
        for offset in frame.offsets_mut().offsets_mut() {
            for (instance, replica) in
                iproduct!(0..offset.num_instances(), 0..offset.num_replicas())
            {
                let var = offset
                    .var(instance, replica)
                    .expect("every cell has a variable after emission");
                let value = backend.value(var).ok_or_else(|| {
                    Error::Backend("solver reported an incumbent without values".to_string())
                })?;
                if value < 0 {
                    return Err(Error::Backend(format!(
                        "solver returned negative offset {value}"
                    )));
                }
                offset.set_value(instance, replica, value as u64);
            }
        }
    }
    Ok(())
}

/// Freeze the offsets of a solved batch with equality constraints and take
/// its frame distances out of the objective.
pub(crate) fn pin_batch<B: Backend>(backend: &mut B, frames: &[Frame], frame_dist: &[VarId]) {
    for frame in frames {
        for offset in frame.offsets().offsets() {
            for (instance, replica) in
                iproduct!(0..offset.num_instances(), 0..offset.num_replicas())
            {
                let var = var_of(offset, instance, replica);
                let value = offset
                    .value(instance, replica)
                    .expect("batch was read back before pinning") as i64;
                backend.add_linear(LinExpr::new().term(1, var), Cmp::Eq, value);
            }
        }
    }
    for &dist in frame_dist {
        backend.set_objective_coefficient(dist, 0.0);
    }
}
