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

//! Test frames contending for the same link.

use test_log::test;

use crate::milp::cbc::CbcBackend;
use crate::model::LinkId;
use crate::scheduler::{Config, Session, SessionState};
use crate::test::{line, line_frame, traffic};

/// Two frames of 10ns each on one shared link must not overlap.
#[test]
fn two_frames_share_a_link() {
    // 125 byte over 100 MB/s takes 10ns
    let net = line(1, 100_000, 0);
    let traffic = traffic([
        line_frame(&net, 0, 125, 1000, 0, 1),
        line_frame(&net, 1, 125, 1000, 0, 1),
    ]);

    let mut session = Session::new(net, traffic);
    session.prepare().unwrap();
    let mut backend = CbcBackend::new();
    session.schedule(&Config::one_shot(), &mut backend).unwrap();
    assert_eq!(session.state(), SessionState::Verified);

    // one slot is 10ns, so the two transmissions differ by at least one slot
    let frames = session.traffic().frames();
    let x0 = frames[0].offsets().for_link(LinkId(0)).unwrap().value(0, 0).unwrap();
    let x1 = frames[1].offsets().for_link(LinkId(0)).unwrap().value(0, 0).unwrap();
    assert!(x0 + 1 <= x1 || x1 + 1 <= x0, "overlap: {x0} and {x1}");
}

/// Periods of 1000ns and 1500ns yield a 3000ns hyperperiod with 3 and 2
/// instances; all of them must be pairwise disjoint on the shared link.
#[test]
fn lcm_hyperperiod_instances() {
    let net = line(1, 100_000, 0);
    let traffic = traffic([
        line_frame(&net, 0, 125, 1000, 0, 1),
        line_frame(&net, 1, 125, 1500, 0, 1),
    ]);

    let mut session = Session::new(net, traffic);
    session.prepare().unwrap();
    // timeslot 10ns: 300 slots, 3 and 2 instances
    assert_eq!(session.hyperperiod(), 300);
    let mut backend = CbcBackend::new();
    session.schedule(&Config::one_shot(), &mut backend).unwrap();
    assert_eq!(session.state(), SessionState::Verified);

    let frames = session.traffic().frames();
    assert_eq!(frames[0].offsets().for_link(LinkId(0)).unwrap().num_instances(), 3);
    assert_eq!(frames[1].offsets().for_link(LinkId(0)).unwrap().num_instances(), 2);
}

/// A link that is too busy for its frames is reported as unschedulable.
#[test]
fn oversubscribed_link() {
    // 12500 byte over 100 MB/s takes 1000ns: two such frames per 1000ns
    // period cannot share one link
    let net = line(1, 100_000, 0);
    let traffic = traffic([
        line_frame(&net, 0, 12_500, 1000, 0, 1),
        line_frame(&net, 1, 12_500, 1000, 0, 1),
    ]);

    let mut session = Session::new(net, traffic);
    session.prepare().unwrap();
    let mut backend = CbcBackend::new();
    let err = session.schedule(&Config::one_shot(), &mut backend).unwrap_err();
    assert!(matches!(err, crate::Error::NoSchedule { .. }));
}
