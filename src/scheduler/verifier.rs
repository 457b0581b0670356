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

//! Deterministic validation of a solved schedule. Runs after every strategy;
//! a violation means the constraint model or the backend is buggy, so the
//! schedule must not be emitted.

use std::collections::HashMap;

use itertools::iproduct;

use crate::error::Error;
use crate::model::{Frame, LinkId, Network, Reservation, Traffic};

/// An occupied interval on a link: half-open `[start, end)` plus a label of
/// the occupying transmission for error reporting.
type Occupancy = (u64, u64, String);

/// Check every invariant of a solved schedule: offset domains, link
/// non-overlap (including the reservation), path monotonicity, and
/// end-to-end bounds.
pub fn verify(
    net: &Network,
    traffic: &Traffic,
    reservation: Option<&Reservation>,
) -> Result<(), Error> {
    let mut occupancy: HashMap<LinkId, Vec<Occupancy>> = HashMap::new();

    for frame in traffic.frames() {
        verify_domains(frame)?;
        verify_paths(net, frame)?;
        for offset in frame.offsets().offsets() {
            let entries = occupancy.entry(offset.link()).or_default();
            for (instance, replica) in
                iproduct!(0..offset.num_instances(), 0..offset.num_replicas())
            {
                let start = value_of(frame, offset.link(), instance, replica)?;
                entries.push((
                    start,
                    start + offset.transmission(),
                    format!("frame {} instance {instance} replica {replica}", frame.id()),
                ));
            }
        }
    }

    if let Some(reservation) = reservation {
        for offset in reservation.offsets() {
            let entries = occupancy.entry(offset.link()).or_default();
            for instance in 0..offset.num_instances() {
                let start = offset
                    .value(instance, 0)
                    .expect("reservation values are pre-filled");
                entries.push((
                    start,
                    start + offset.transmission(),
                    format!("reservation instance {instance}"),
                ));
            }
        }
    }

    verify_non_overlap(occupancy)
}

/// Every cell must be assigned and lie within its domain.
fn verify_domains(frame: &Frame) -> Result<(), Error> {
    let start = frame.starting() as i64;
    let deadline = frame.deadline() as i64;
    let period = frame.period() as i64;
    for offset in frame.offsets().offsets() {
        let dur = offset.transmission() as i64;
        for (instance, replica) in
            iproduct!(0..offset.num_instances(), 0..offset.num_replicas())
        {
            let value = value_of(frame, offset.link(), instance, replica)? as i64;
            let (i, r) = (instance as i64, replica as i64);
            let lb = start + i * period + r * dur;
            let ub = deadline - dur + i * period - r * dur;
            if value < lb || value > ub {
                return Err(Error::ScheduleInvalid(format!(
                    "offset {value} of frame {} on link {} instance {instance} \
                     replica {replica} outside [{lb}, {ub}]",
                    frame.id(),
                    offset.link(),
                )));
            }
        }
    }
    Ok(())
}

/// Consecutive hops must respect transmission duration plus switch delay,
/// and constrained paths their end-to-end bound.
fn verify_paths(net: &Network, frame: &Frame) -> Result<(), Error> {
    let switch_min = net.switch_min_time();
    let table = frame.offsets();
    for path in 0..table.num_paths() {
        let hops: Vec<_> = table.path(path).collect();
        let num_instances = hops[0].num_instances();
        for instance in 0..num_instances {
            for pair in hops.windows(2) {
                let (prev, next) = (pair[0], pair[1]);
                let before = value_of(frame, prev.link(), instance, 0)?;
                let after = value_of(frame, next.link(), instance, 0)?;
                if after < before + prev.transmission() + switch_min {
                    return Err(Error::ScheduleInvalid(format!(
                        "frame {} instance {instance}: transmission on {} at {after} \
                         starts before {} finished at {before} (+{switch_min} switch delay)",
                        frame.id(),
                        next.link(),
                        prev.link(),
                    )));
                }
            }
            if frame.end_to_end() > 0 {
                let (first, last) = (hops[0], hops[hops.len() - 1]);
                let start = value_of(frame, first.link(), instance, 0)?;
                let end = value_of(frame, last.link(), instance, 0)?;
                if (end - start) as i64
                    > frame.end_to_end() as i64 - first.transmission() as i64
                {
                    return Err(Error::ScheduleInvalid(format!(
                        "frame {} instance {instance}: end-to-end latency {} exceeds bound {}",
                        frame.id(),
                        end - start + first.transmission(),
                        frame.end_to_end(),
                    )));
                }
            }
        }
    }
    Ok(())
}

/// On every link, the occupied intervals must be pairwise disjoint.
fn verify_non_overlap(occupancy: HashMap<LinkId, Vec<Occupancy>>) -> Result<(), Error> {
    for (link, mut entries) in occupancy {
        entries.sort();
        for pair in entries.windows(2) {
            let ((_, end, before), (start, _, after)) = (&pair[0], &pair[1]);
            if start < end {
                return Err(Error::ScheduleInvalid(format!(
                    "{before} and {after} overlap on link {link}"
                )));
            }
        }
    }
    Ok(())
}

/// The assigned offset of a cell, or a [`Error::ScheduleInvalid`] when the
/// cell was never assigned.
fn value_of(frame: &Frame, link: LinkId, instance: usize, replica: usize) -> Result<u64, Error> {
    frame
        .offsets()
        .for_link(link)
        .and_then(|offset| offset.value(instance, replica))
        .ok_or_else(|| {
            Error::ScheduleInvalid(format!(
                "frame {} has no offset on link {link} instance {instance} replica {replica}",
                frame.id()
            ))
        })
}
