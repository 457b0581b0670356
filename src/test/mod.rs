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

//! End-to-end scenarios driving the full pipeline against the CBC backend.

use crate::model::{
    Frame, FrameId, Link, LinkId, LinkKind, Network, Node, NodeId, NodeKind, Traffic,
};

mod chain;
mod contention;
mod roundtrip;

/// Build a line of end systems and switches: N0 - L0 - N1 - L1 - N2 - ...
/// with `links` hops, all at the given speed in KB/s.
fn line(links: usize, speed: u64, switch_min_time: u64) -> Network {
    let mut net = Network::new(switch_min_time);
    for node in 0..=links {
        let kind = if node == 0 || node == links {
            NodeKind::EndSystem
        } else {
            NodeKind::Switch
        };
        net.add_node(Node::new(NodeId(node), kind)).unwrap();
    }
    for link in 0..links {
        net.add_connection(
            NodeId(link),
            NodeId(link + 1),
            Link::new(LinkId(link), LinkKind::Wired, speed).unwrap(),
        )
        .unwrap();
    }
    net
}

/// A frame traversing the first `hops` links of a line network.
fn line_frame(
    net: &Network,
    id: usize,
    size: u64,
    period: u64,
    end_to_end: u64,
    hops: usize,
) -> Frame {
    let mut frame = Frame::new(FrameId(id), NodeId(0), size, period, 0, 0, end_to_end).unwrap();
    frame
        .add_receiver(net, NodeId(hops), (0..hops).map(LinkId).collect())
        .unwrap();
    frame
}

/// Collect a traffic description from frames.
fn traffic(frames: impl IntoIterator<Item = Frame>) -> Traffic {
    let mut traffic = Traffic::new();
    for frame in frames {
        traffic.push(frame).unwrap();
    }
    traffic
}
