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

//! The patch engine: a greedy interval allocator that integrates new frames
//! on a single link around already-fixed transmissions and the self-healing
//! reservation. Frames are placed in input order, instances in instance
//! order, without backtracking; an instance that does not fit within its
//! `[min, max]` window is a terminal failure.

use log::{debug, info};

use crate::error::Error;
use crate::model::{FrameId, LinkId, Offset, SelfHealingProtocol};

pub mod optimize;

/// A frame whose transmissions on the patched link are already fixed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedFrame {
    /// Identifier of the frame.
    id: FrameId,
    /// Occupied half-open intervals, one per instance.
    instances: Vec<(u64, u64)>,
}

impl FixedFrame {
    /// Create a fixed frame from its occupied intervals.
    pub fn new(id: FrameId, instances: Vec<(u64, u64)>) -> Self {
        Self { id, instances }
    }

    /// Identifier of the frame.
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Occupied half-open intervals, one per instance.
    pub fn instances(&self) -> &[(u64, u64)] {
        &self.instances
    }
}

/// A new frame to integrate: a degenerate frame whose only path has length
/// one, so it owns exactly one offset with per-instance `[min, max]` ranges.
#[derive(Clone, Debug)]
pub struct PatchFrame {
    /// Identifier of the frame.
    id: FrameId,
    /// The single offset of the frame on the patched link.
    offset: Offset,
}

impl PatchFrame {
    /// Create a new frame to patch with the given transmission duration and
    /// per-instance `[min, max]` transmission ranges.
    pub fn new(id: FrameId, link: LinkId, duration: u64, windows: &[(u64, u64)]) -> Self {
        let mut offset = Offset::new(link, windows.len(), 1, duration);
        for (instance, &(min, max)) in windows.iter().enumerate() {
            offset.set_range(instance, 0, min, max);
        }
        Self { id, offset }
    }

    /// Identifier of the frame.
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// The single offset of the frame on the patched link.
    pub fn offset(&self) -> &Offset {
        &self.offset
    }

    /// Mutable access to the offset.
    pub fn offset_mut(&mut self) -> &mut Offset {
        &mut self.offset
    }
}

/// A patch (or optimize) problem: one targeted link, the transmissions that
/// are already fixed on it, and the new frames to integrate.
#[derive(Clone, Debug)]
pub struct PatchInput {
    /// The targeted link.
    pub link: LinkId,
    /// Self-healing protocol settings in timeslots, `None` when inactive.
    pub protocol: Option<SelfHealingProtocol>,
    /// Scheduling horizon in timeslots.
    pub hyperperiod: u64,
    /// Frames already scheduled on the link.
    pub fixed: Vec<FixedFrame>,
    /// New frames to integrate, in priority order.
    pub frames: Vec<PatchFrame>,
}

impl PatchInput {
    /// The occupied intervals of the self-healing reservation within the
    /// hyperperiod.
    fn reservation_intervals(&self) -> Vec<(u64, u64)> {
        match self.protocol {
            Some(shp) => (0..self.hyperperiod / shp.period())
                .map(|k| (k * shp.period(), k * shp.period() + shp.duration()))
                .collect(),
            None => Vec::new(),
        }
    }
}

/// A list of occupied half-open intervals, kept sorted by start and pairwise
/// disjoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntervalList {
    /// The intervals, sorted by start.
    intervals: Vec<(u64, u64)>,
}

impl IntervalList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an interval at its sorted position.
    pub fn insert(&mut self, start: u64, end: u64) {
        let at = self.intervals.partition_point(|&(s, _)| s < start);
        self.intervals.insert(at, (start, end));
        debug_assert!(self.is_sorted_disjoint());
    }

    /// The intervals, sorted by start.
    pub fn intervals(&self) -> &[(u64, u64)] {
        &self.intervals
    }

    /// Whether the list is sorted and pairwise disjoint.
    pub fn is_sorted_disjoint(&self) -> bool {
        self.intervals.windows(2).all(|w| w[0].1 <= w[1].0)
    }

    /// Place a transmission of `dur` slots at the earliest start in
    /// `[min, max]` that does not overlap any occupied interval, insert it,
    /// and return the chosen start. `None` when nothing fits.
    pub fn allocate(&mut self, min: u64, max: u64, dur: u64) -> Option<u64> {
        let mut candidate = min;
        for &(start, end) in &self.intervals {
            if end <= candidate {
                continue;
            }
            if start >= candidate + dur {
                break;
            }
            candidate = end;
        }
        if candidate > max {
            return None;
        }
        self.insert(candidate, candidate + dur);
        Some(candidate)
    }
}

/// Run the greedy allocator: pre-populate the occupied list with the fixed
/// frames and the reservation, then place every instance of every new frame
/// in order. The chosen transmission starts are recorded in the frames'
/// offsets.
pub fn patch(input: &mut PatchInput) -> Result<(), Error> {
    let mut occupied = IntervalList::new();
    for fixed in &input.fixed {
        for &(start, end) in fixed.instances() {
            occupied.insert(start, end);
        }
    }
    for (start, end) in input.reservation_intervals() {
        occupied.insert(start, end);
    }
    info!(
        "patching {} frames around {} occupied intervals on link {}",
        input.frames.len(),
        occupied.intervals().len(),
        input.link,
    );

    for frame in &mut input.frames {
        let dur = frame.offset().transmission();
        for instance in 0..frame.offset().num_instances() {
            let (min, max) = frame.offset().range(instance, 0);
            let start = occupied.allocate(min, max, dur).ok_or(Error::PatchInfeasible {
                frame: frame.id(),
                instance,
                min,
                max,
            })?;
            debug!("frame {} instance {instance} placed at {start}", frame.id());
            frame.offset_mut().set_value(instance, 0, start);
        }
    }

    verify_link(input)
}

/// Validate a patched (or optimized) link: every new transmission is within
/// its `[min, max]` window, and all transmissions on the link, including the
/// fixed frames and the reservation, are pairwise disjoint.
pub fn verify_link(input: &PatchInput) -> Result<(), Error> {
    let mut occupancy: Vec<(u64, u64, String)> = Vec::new();
    for fixed in &input.fixed {
        for (instance, &(start, end)) in fixed.instances().iter().enumerate() {
            occupancy.push((start, end, format!("fixed frame {} instance {instance}", fixed.id())));
        }
    }
    for (instance, (start, end)) in input.reservation_intervals().into_iter().enumerate() {
        occupancy.push((start, end, format!("reservation instance {instance}")));
    }
    for frame in &input.frames {
        let offset = frame.offset();
        for instance in 0..offset.num_instances() {
            let start = offset.value(instance, 0).ok_or_else(|| {
                Error::ScheduleInvalid(format!(
                    "frame {} instance {instance} was never placed",
                    frame.id()
                ))
            })?;
            let (min, max) = offset.range(instance, 0);
            if start < min || start > max {
                return Err(Error::ScheduleInvalid(format!(
                    "frame {} instance {instance} placed at {start} outside [{min}, {max}]",
                    frame.id()
                )));
            }
            occupancy.push((
                start,
                start + offset.transmission(),
                format!("frame {} instance {instance}", frame.id()),
            ));
        }
    }

    occupancy.sort();
    for pair in occupancy.windows(2) {
        let (_, end, before) = &pair[0];
        let (start, _, after) = &pair[1];
        if start < end {
            return Err(Error::ScheduleInvalid(format!(
                "{before} and {after} overlap on link {}",
                input.link
            )));
        }
    }
    Ok(())
}
