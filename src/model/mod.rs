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

//! Data model of the scheduler: the network topology, the traffic
//! description, and the offset graph connecting the two.

pub mod network;
pub mod offsets;
pub mod traffic;

pub use network::{Link, LinkId, LinkKind, Network, Node, NodeId, NodeKind, SelfHealingProtocol};
pub use offsets::{Offset, OffsetTable, Reservation};
pub use traffic::{Frame, FrameId, Receiver, Traffic};
