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

//! The offset graph: for every (frame, link) pair, one [`Offset`] object
//! holding the transmission start of every (instance, replica) cell. Offsets
//! live in a per-frame arena ([`OffsetTable`]); paths store arena indices, so
//! two paths of the same frame that traverse the same link share one offset.

use crate::error::Error;
use crate::milp::VarId;
use crate::model::network::{LinkId, Network, SelfHealingProtocol};
use crate::model::traffic::Receiver;

/// All transmission cells of one frame on one link. Rows are instances
/// (occurrences of the frame within the hyperperiod), columns are replicas
/// (redundant wireless transmissions, 1 in wired-only deployments).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Offset {
    /// The link this offset schedules.
    link: LinkId,
    /// Transmission duration on this link, in timeslots.
    transmission: u64,
    /// Solved transmission starts, `None` until assigned.
    slots: Vec<Vec<Option<u64>>>,
    /// Allowed `[min, max]` transmission range per cell. Only meaningful for
    /// the single-link frames of the patch and optimize engines.
    ranges: Vec<Vec<(u64, u64)>>,
    /// Solver variable handles, populated by the constraint model.
    vars: Vec<Vec<Option<VarId>>>,
}

impl Offset {
    /// Create a new offset with all cells unset.
    pub fn new(link: LinkId, num_instances: usize, num_replicas: usize, transmission: u64) -> Self {
        Self {
            link,
            transmission,
            slots: vec![vec![None; num_replicas]; num_instances],
            ranges: vec![vec![(0, 0); num_replicas]; num_instances],
            vars: vec![vec![None; num_replicas]; num_instances],
        }
    }

    /// The link this offset schedules.
    pub fn link(&self) -> LinkId {
        self.link
    }

    /// Transmission duration on this link, in timeslots.
    pub fn transmission(&self) -> u64 {
        self.transmission
    }

    /// Number of instances within the hyperperiod.
    pub fn num_instances(&self) -> usize {
        self.slots.len()
    }

    /// Number of replicas per instance.
    pub fn num_replicas(&self) -> usize {
        self.slots.first().map(Vec::len).unwrap_or(0)
    }

    /// The transmission start of a cell, `None` when not yet assigned.
    pub fn value(&self, instance: usize, replica: usize) -> Option<u64> {
        self.slots[instance][replica]
    }

    /// Assign the transmission start of a cell.
    pub fn set_value(&mut self, instance: usize, replica: usize, value: u64) {
        self.slots[instance][replica] = Some(value);
    }

    /// The allowed `[min, max]` transmission range of a cell.
    pub fn range(&self, instance: usize, replica: usize) -> (u64, u64) {
        self.ranges[instance][replica]
    }

    /// Set the allowed `[min, max]` transmission range of a cell.
    pub fn set_range(&mut self, instance: usize, replica: usize, min: u64, max: u64) {
        self.ranges[instance][replica] = (min, max);
    }

    /// The solver variable of a cell.
    pub fn var(&self, instance: usize, replica: usize) -> Option<VarId> {
        self.vars[instance][replica]
    }

    /// Attach a solver variable to a cell.
    pub fn set_var(&mut self, instance: usize, replica: usize, var: VarId) {
        self.vars[instance][replica] = Some(var);
    }
}

/// The offsets of one frame: an arena of [`Offset`] objects, a dense lookup
/// from link id to arena index, and for each receiver path the ordered list
/// of arena indices it traverses.
#[derive(Clone, Debug, Default)]
pub struct OffsetTable {
    /// Arena owning all offsets of the frame, in creation order. This is the
    /// iteration list: one entry per distinct link the frame uses.
    arena: Vec<Offset>,
    /// Sparse lookup from link id to arena index.
    by_link: Vec<Option<usize>>,
    /// For each receiver path, the arena indices along the path.
    paths: Vec<Vec<usize>>,
}

impl OffsetTable {
    /// Materialize the offsets of a frame along each of its paths. Paths that
    /// share a link share one offset object. The transmission duration on
    /// each link is the link's raw transmission time divided by the timeslot.
    pub fn build(
        receivers: &[Receiver],
        size: u64,
        period: u64,
        net: &Network,
        hyperperiod: u64,
        timeslot: u64,
        num_replicas: usize,
    ) -> Result<Self, Error> {
        let num_instances = (hyperperiod / period) as usize;
        let mut table = Self::default();
        for receiver in receivers {
            let mut path = Vec::with_capacity(receiver.path().len());
            for &link_id in receiver.path() {
                let idx = match table.index_of(link_id) {
                    Some(idx) => idx,
                    None => {
                        let link = net.link(link_id).ok_or_else(|| {
                            Error::InvalidInput(format!("unknown link {link_id}"))
                        })?;
                        let transmission = link.transmission_ns(size) / timeslot;
                        table.insert(Offset::new(
                            link_id,
                            num_instances,
                            num_replicas,
                            transmission,
                        ))
                    }
                };
                path.push(idx);
            }
            table.paths.push(path);
        }
        Ok(table)
    }

    /// Arena index of the offset for a link, if the frame uses that link.
    fn index_of(&self, link: LinkId) -> Option<usize> {
        self.by_link.get(link.0).copied().flatten()
    }

    /// Insert a new offset into the arena and return its index.
    fn insert(&mut self, offset: Offset) -> usize {
        let link = offset.link();
        let idx = self.arena.len();
        self.arena.push(offset);
        if self.by_link.len() <= link.0 {
            self.by_link.resize(link.0 + 1, None);
        }
        self.by_link[link.0] = Some(idx);
        idx
    }

    /// Iterate over all offsets of the frame, one per distinct link.
    pub fn offsets(&self) -> impl Iterator<Item = &Offset> {
        self.arena.iter()
    }

    /// Iterate mutably over all offsets of the frame.
    pub fn offsets_mut(&mut self) -> impl Iterator<Item = &mut Offset> {
        self.arena.iter_mut()
    }

    /// The offset for a link, if the frame uses that link.
    pub fn for_link(&self, link: LinkId) -> Option<&Offset> {
        self.index_of(link).map(|idx| &self.arena[idx])
    }

    /// Mutable access to the offset for a link.
    pub fn for_link_mut(&mut self, link: LinkId) -> Option<&mut Offset> {
        self.index_of(link).map(move |idx| &mut self.arena[idx])
    }

    /// Number of receiver paths.
    pub fn num_paths(&self) -> usize {
        self.paths.len()
    }

    /// The offsets along one receiver path, in path order.
    pub fn path(&self, path: usize) -> impl Iterator<Item = &Offset> {
        self.paths[path].iter().map(|&idx| &self.arena[idx])
    }
}

/// The self-healing protocol reservation, materialized as a synthetic frame
/// with one offset per link id in `[0, max_link_id]` and transmission starts
/// pre-filled at every multiple of the protocol period.
#[derive(Clone, Debug)]
pub struct Reservation {
    /// Protocol period in timeslots.
    period: u64,
    /// Reservation duration in timeslots.
    duration: u64,
    /// One offset per link id; the index into this vector is the link id.
    offsets: Vec<Offset>,
}

impl Reservation {
    /// Materialize the reservation. `shp` must already be renormalized to
    /// timeslot units.
    pub fn build(shp: &SelfHealingProtocol, max_link_id: Option<LinkId>, hyperperiod: u64) -> Self {
        let num_instances = (hyperperiod / shp.period()) as usize;
        let num_links = max_link_id.map(|l| l.0 + 1).unwrap_or(0);
        let offsets = (0..num_links)
            .map(|l| {
                let mut offset = Offset::new(LinkId(l), num_instances, 1, shp.duration());
                for k in 0..num_instances {
                    offset.set_value(k, 0, k as u64 * shp.period());
                }
                offset
            })
            .collect();
        Self {
            period: shp.period(),
            duration: shp.duration(),
            offsets,
        }
    }

    /// Protocol period in timeslots.
    pub fn period(&self) -> u64 {
        self.period
    }

    /// Reservation duration in timeslots.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Iterate over the reservation offsets of all links.
    pub fn offsets(&self) -> impl Iterator<Item = &Offset> {
        self.offsets.iter()
    }

    /// Iterate mutably over the reservation offsets of all links.
    pub fn offsets_mut(&mut self) -> impl Iterator<Item = &mut Offset> {
        self.offsets.iter_mut()
    }

    /// The reservation offset on a link.
    pub fn for_link(&self, link: LinkId) -> Option<&Offset> {
        self.offsets.get(link.0)
    }
}
