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

//! Traffic description: periodic multicast frames with fixed paths. The
//! order of frames in the [`Traffic`] container is the scheduling priority
//! used by the incremental and optimize strategies.

use crate::error::Error;
use crate::model::network::{LinkId, Network, NodeId};
use crate::model::offsets::OffsetTable;

/// Identifier of a frame.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FrameId(pub usize);

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "F{}", self.0)
    }
}

/// A receiver of a multicast frame, together with the fixed, ordered path of
/// links from the sender to it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Receiver {
    /// Destination node.
    node: NodeId,
    /// Ordered link ids from the sender to the destination.
    path: Vec<LinkId>,
}

impl Receiver {
    /// Destination node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Ordered link ids from the sender to the destination.
    pub fn path(&self) -> &[LinkId] {
        &self.path
    }
}

/// A periodic multicast frame. All durations are in nanoseconds when the
/// frame is created and in timeslots after the time model has renormalized
/// the traffic.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Identifier of the frame.
    id: FrameId,
    /// Node that transmits the frame.
    sender: NodeId,
    /// Payload size in bytes.
    size: u64,
    /// Transmission period.
    period: u64,
    /// Relative deadline. Always in `(starting, period]`.
    deadline: u64,
    /// Earliest transmission start within each period.
    starting: u64,
    /// End-to-end delay bound, 0 when unconstrained.
    end_to_end: u64,
    /// Receivers with their paths.
    receivers: Vec<Receiver>,
    /// Per-link transmission offsets, built by the offset graph builder.
    offsets: OffsetTable,
}

impl Frame {
    /// Create a new frame. A deadline of 0 is replaced by the period.
    /// Returns [`Error::InvalidTiming`] when the parameters can never be
    /// satisfied.
    pub fn new(
        id: FrameId,
        sender: NodeId,
        size: u64,
        period: u64,
        deadline: u64,
        starting: u64,
        end_to_end: u64,
    ) -> Result<Self, Error> {
        if period == 0 {
            return Err(Error::InvalidTiming(format!("frame {id} has period 0")));
        }
        let deadline = if deadline == 0 { period } else { deadline };
        if deadline > period {
            return Err(Error::InvalidTiming(format!(
                "frame {id}: deadline {deadline} exceeds period {period}"
            )));
        }
        if starting >= deadline {
            return Err(Error::InvalidTiming(format!(
                "frame {id}: starting time {starting} not before deadline {deadline}"
            )));
        }
        if end_to_end != 0 && end_to_end >= deadline {
            return Err(Error::InvalidTiming(format!(
                "frame {id}: end-to-end bound {end_to_end} not below deadline {deadline}"
            )));
        }
        Ok(Self {
            id,
            sender,
            size,
            period,
            deadline,
            starting,
            end_to_end,
            receivers: Vec::new(),
            offsets: OffsetTable::default(),
        })
    }

    /// Add a receiver with its path. The receiver must exist in the network,
    /// every link of the path must exist, and the first hop must originate at
    /// the sender.
    pub fn add_receiver(
        &mut self,
        net: &Network,
        node: NodeId,
        path: Vec<LinkId>,
    ) -> Result<(), Error> {
        if !net.contains_node(node) {
            return Err(Error::InvalidInput(format!(
                "receiver {node} of frame {} is not in the topology",
                self.id
            )));
        }
        let first = *path.first().ok_or_else(|| {
            Error::InvalidInput(format!("empty path for receiver {node} of frame {}", self.id))
        })?;
        for link in &path {
            if net.link(*link).is_none() {
                return Err(Error::InvalidInput(format!(
                    "path of frame {} references unknown link {link}",
                    self.id
                )));
            }
        }
        if net.next_hop(self.sender, first).is_none() {
            return Err(Error::InvalidInput(format!(
                "first hop {first} of frame {} does not originate at sender {}",
                self.id, self.sender
            )));
        }
        self.receivers.push(Receiver { node, path });
        Ok(())
    }

    /// Identifier of the frame.
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Node that transmits the frame.
    pub fn sender(&self) -> NodeId {
        self.sender
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Transmission period.
    pub fn period(&self) -> u64 {
        self.period
    }

    /// Relative deadline.
    pub fn deadline(&self) -> u64 {
        self.deadline
    }

    /// Earliest transmission start within each period.
    pub fn starting(&self) -> u64 {
        self.starting
    }

    /// End-to-end delay bound, 0 when unconstrained.
    pub fn end_to_end(&self) -> u64 {
        self.end_to_end
    }

    /// Receivers with their paths.
    pub fn receivers(&self) -> &[Receiver] {
        &self.receivers
    }

    /// Per-link transmission offsets.
    pub fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    /// Mutable access to the per-link transmission offsets.
    pub fn offsets_mut(&mut self) -> &mut OffsetTable {
        &mut self.offsets
    }

    /// Install the offset table built by the offset graph builder.
    pub(crate) fn set_offsets(&mut self, offsets: OffsetTable) {
        self.offsets = offsets;
    }

    /// Divide all durations by the chosen timeslot length.
    pub(crate) fn renormalize(&mut self, timeslot: u64) {
        self.period /= timeslot;
        self.deadline /= timeslot;
        self.starting /= timeslot;
        self.end_to_end /= timeslot;
    }
}

/// The ordered set of frames to schedule. The order determines scheduling
/// priority: earlier frames constrain later ones.
#[derive(Clone, Debug, Default)]
pub struct Traffic {
    /// All frames, in priority order.
    frames: Vec<Frame>,
}

impl Traffic {
    /// Create an empty traffic description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame. Frame ids must be unique.
    pub fn push(&mut self, frame: Frame) -> Result<(), Error> {
        if self.frames.iter().any(|f| f.id() == frame.id()) {
            return Err(Error::InvalidInput(format!(
                "duplicate frame id {}",
                frame.id()
            )));
        }
        self.frames.push(frame);
        Ok(())
    }

    /// All frames in priority order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Mutable access to all frames.
    pub fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    /// The ids of all frames, in priority order.
    pub fn ids(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.frames.iter().map(Frame::id)
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check whether there are no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_sentinel() {
        let f = Frame::new(FrameId(0), NodeId(0), 100, 1000, 0, 0, 0).unwrap();
        assert_eq!(f.deadline(), 1000);
    }

    #[test]
    fn invalid_timing() {
        assert!(matches!(
            Frame::new(FrameId(0), NodeId(0), 100, 1000, 2000, 0, 0),
            Err(Error::InvalidTiming(_))
        ));
        assert!(matches!(
            Frame::new(FrameId(0), NodeId(0), 100, 1000, 500, 500, 0),
            Err(Error::InvalidTiming(_))
        ));
        assert!(matches!(
            Frame::new(FrameId(0), NodeId(0), 100, 1000, 500, 0, 600),
            Err(Error::InvalidTiming(_))
        ));
    }

    #[test]
    fn duplicate_frame_id() {
        let mut traffic = Traffic::new();
        traffic
            .push(Frame::new(FrameId(3), NodeId(0), 100, 1000, 0, 0, 0).unwrap())
            .unwrap();
        let err = traffic
            .push(Frame::new(FrameId(3), NodeId(0), 100, 2000, 0, 0, 0).unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
