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

//! The time model reduces all input durations to a common discrete timeslot
//! and fixes the scheduling horizon. The timeslot is the GCD of every raw
//! transmission duration and the self-healing reservation duration; the
//! hyperperiod is the LCM of all frame periods. After [`normalize`] ran, the
//! whole engine operates on integer timeslot arithmetic.

use std::collections::HashSet;

use log::debug;

use crate::error::Error;
use crate::model::{LinkId, Network, Traffic};

/// Greatest common divisor. Zero acts as the identity.
fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Least common multiple.
fn lcm(a: u64, b: u64) -> u64 {
    a / gcd(a, b) * b
}

/// The result of time normalization.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TimeModel {
    /// Length of one timeslot in nanoseconds.
    timeslot: u64,
    /// Scheduling horizon in timeslots.
    hyperperiod: u64,
}

impl TimeModel {
    /// Length of one timeslot in nanoseconds.
    pub fn timeslot(&self) -> u64 {
        self.timeslot
    }

    /// Scheduling horizon in timeslots.
    pub fn hyperperiod(&self) -> u64 {
        self.hyperperiod
    }
}

/// Compute the global timeslot and hyperperiod, then renormalize every
/// duration of the network and the traffic to timeslot units. Fails with
/// [`Error::InvalidTiming`] when the timeslot resolves to zero, which happens
/// exactly when there is neither a transmission nor an active self-healing
/// protocol to derive it from.
pub fn normalize(net: &mut Network, traffic: &mut Traffic) -> Result<TimeModel, Error> {
    let mut timeslot = net.self_healing().map(|shp| shp.duration()).unwrap_or(0);

    for frame in traffic.frames() {
        // distinct links only; shared links cannot change the fold
        let links: HashSet<LinkId> = frame
            .receivers()
            .iter()
            .flat_map(|r| r.path().iter().copied())
            .collect();
        for link_id in links {
            let link = net
                .link(link_id)
                .ok_or_else(|| Error::InvalidInput(format!("unknown link {link_id}")))?;
            timeslot = gcd(timeslot, link.transmission_ns(frame.size()));
        }
    }

    if timeslot == 0 {
        return Err(Error::InvalidTiming(
            "timeslot resolves to zero: no transmissions and no active protocol".to_string(),
        ));
    }

    let hyperperiod_ns = traffic
        .frames()
        .iter()
        .map(|f| f.period())
        .fold(0, |acc, p| if acc == 0 { p } else { lcm(acc, p) });

    net.renormalize(timeslot);
    for frame in traffic.frames_mut() {
        frame.renormalize(timeslot);
    }

    let hyperperiod = hyperperiod_ns / timeslot;
    debug!("timeslot = {timeslot}ns, hyperperiod = {hyperperiod} slots");
    Ok(TimeModel {
        timeslot,
        hyperperiod,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Frame, FrameId, Link, LinkKind, Node, NodeId, NodeKind, SelfHealingProtocol,
    };

    /// Two links in a chain, both at 1000 MB/s.
    fn chain() -> Network {
        let mut net = Network::new(0);
        net.add_node(Node::new(NodeId(0), NodeKind::EndSystem)).unwrap();
        net.add_node(Node::new(NodeId(1), NodeKind::Switch)).unwrap();
        net.add_node(Node::new(NodeId(2), NodeKind::EndSystem)).unwrap();
        net.add_connection(
            NodeId(0),
            NodeId(1),
            Link::new(LinkId(0), LinkKind::Wired, 1_000_000).unwrap(),
        )
        .unwrap();
        net.add_connection(
            NodeId(1),
            NodeId(2),
            Link::new(LinkId(1), LinkKind::Wired, 1_000_000).unwrap(),
        )
        .unwrap();
        net
    }

    /// A frame with a 125 byte payload over both links.
    fn traffic(period: u64) -> Traffic {
        let net = chain();
        let mut traffic = Traffic::new();
        let mut frame = Frame::new(FrameId(0), NodeId(0), 125, period, 0, 0, 0).unwrap();
        frame
            .add_receiver(&net, NodeId(2), vec![LinkId(0), LinkId(1)])
            .unwrap();
        traffic.push(frame).unwrap();
        traffic
    }

    #[test]
    fn single_nanosecond_timeslot() {
        let mut net = chain();
        let mut traffic = traffic(1000);
        let tm = normalize(&mut net, &mut traffic).unwrap();
        assert_eq!(tm.timeslot(), 1);
        assert_eq!(tm.hyperperiod(), 1000);
        assert_eq!(traffic.frames()[0].period(), 1000);
    }

    #[test]
    fn protocol_folds_into_timeslot() {
        let mut net = chain();
        net.set_self_healing(SelfHealingProtocol::new(500, 50).unwrap());
        let mut traffic = Traffic::new();
        let mut frame = Frame::new(FrameId(0), NodeId(0), 125_000, 1000, 0, 0, 0).unwrap();
        frame
            .add_receiver(&net, NodeId(2), vec![LinkId(0)])
            .unwrap();
        traffic.push(frame).unwrap();
        // transmission takes 1000ns, protocol reserves 50ns: gcd = 50
        let tm = normalize(&mut net, &mut traffic).unwrap();
        assert_eq!(tm.timeslot(), 50);
        assert_eq!(tm.hyperperiod(), 20);
        assert_eq!(traffic.frames()[0].period(), 20);
        assert_eq!(net.self_healing().unwrap().period(), 10);
        assert_eq!(net.self_healing().unwrap().duration(), 1);
    }

    #[test]
    fn hyperperiod_is_lcm() {
        let net = chain();
        let mut net2 = chain();
        let mut traffic = Traffic::new();
        let mut f0 = Frame::new(FrameId(0), NodeId(0), 125, 1000, 0, 0, 0).unwrap();
        f0.add_receiver(&net, NodeId(2), vec![LinkId(0)]).unwrap();
        let mut f1 = Frame::new(FrameId(1), NodeId(0), 125, 1500, 0, 0, 0).unwrap();
        f1.add_receiver(&net, NodeId(2), vec![LinkId(0)]).unwrap();
        traffic.push(f0).unwrap();
        traffic.push(f1).unwrap();
        let tm = normalize(&mut net2, &mut traffic).unwrap();
        assert_eq!(tm.hyperperiod(), 3000);
    }

    #[test]
    fn no_duration_source_fails() {
        let mut net = chain();
        let mut traffic = Traffic::new();
        assert!(matches!(
            normalize(&mut net, &mut traffic),
            Err(Error::InvalidTiming(_))
        ));
    }

    #[test]
    fn deterministic() {
        let (mut net_a, mut net_b) = (chain(), chain());
        let (mut traffic_a, mut traffic_b) = (traffic(1000), traffic(1000));
        let a = normalize(&mut net_a, &mut traffic_a).unwrap();
        let b = normalize(&mut net_b, &mut traffic_b).unwrap();
        assert_eq!(a, b);
        assert_eq!(traffic_a.frames()[0].period(), traffic_b.frames()[0].period());
    }

    #[test]
    fn gcd_lcm() {
        assert_eq!(gcd(0, 50), 50);
        assert_eq!(gcd(50, 0), 50);
        assert_eq!(gcd(12, 18), 6);
        assert_eq!(lcm(1000, 1500), 3000);
    }
}
