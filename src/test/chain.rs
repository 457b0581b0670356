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

//! Test a single frame over a two-link chain without a reservation.

use test_log::test;

use crate::milp::cbc::CbcBackend;
use crate::model::LinkId;
use crate::scheduler::{Config, Session, SessionState};
use crate::test::{line, line_frame, traffic};

/// One 125 byte frame per millisecond over two 1000 MB/s links: each hop
/// takes one nanosecond, the timeslot is one nanosecond, and the hyperperiod
/// is 1000 slots.
#[test]
fn one_frame_two_links() {
    let net = line(2, 1_000_000, 0);
    let traffic = traffic([line_frame(&net, 0, 125, 1000, 0, 2)]);

    let mut session = Session::new(net, traffic);
    session.prepare().unwrap();
    assert_eq!(session.timeslot(), 1);
    assert_eq!(session.hyperperiod(), 1000);

    let mut backend = CbcBackend::new();
    session.schedule(&Config::one_shot(), &mut backend).unwrap();
    assert_eq!(session.state(), SessionState::Verified);

    let frame = &session.traffic().frames()[0];
    let a = frame.offsets().for_link(LinkId(0)).unwrap().value(0, 0).unwrap();
    let b = frame.offsets().for_link(LinkId(1)).unwrap().value(0, 0).unwrap();
    // the second hop starts after the first finished, and still fits the
    // deadline
    assert!(b >= a + 1);
    assert!(b + 1 <= 1000);
}

/// The switch delay widens the gap between consecutive hops.
#[test]
fn switch_delay_respected() {
    let net = line(2, 1_000_000, 5);
    let traffic = traffic([line_frame(&net, 0, 125, 1000, 0, 2)]);

    let mut session = Session::new(net, traffic);
    session.prepare().unwrap();
    let mut backend = CbcBackend::new();
    session.schedule(&Config::one_shot(), &mut backend).unwrap();

    let frame = &session.traffic().frames()[0];
    let a = frame.offsets().for_link(LinkId(0)).unwrap().value(0, 0).unwrap();
    let b = frame.offsets().for_link(LinkId(1)).unwrap().value(0, 0).unwrap();
    assert!(b >= a + 1 + 5);
}

/// An end-to-end bound keeps the last hop close to the first.
#[test]
fn end_to_end_bound() {
    let net = line(3, 1_000_000, 0);
    let traffic = traffic([line_frame(&net, 0, 125, 1000, 10, 3)]);

    let mut session = Session::new(net, traffic);
    session.prepare().unwrap();
    let mut backend = CbcBackend::new();
    session.schedule(&Config::one_shot(), &mut backend).unwrap();
    assert_eq!(session.state(), SessionState::Verified);

    let frame = &session.traffic().frames()[0];
    let first = frame.offsets().for_link(LinkId(0)).unwrap().value(0, 0).unwrap();
    let last = frame.offsets().for_link(LinkId(2)).unwrap().value(0, 0).unwrap();
    assert!(last - first <= 10 - 1);
}

/// A frame that can never fit its own deadline is reported as unschedulable.
#[test]
fn impossible_deadline() {
    let net = line(2, 1_000_000, 999);
    // the second hop would have to start at slot 1000, past the deadline
    let traffic = traffic([line_frame(&net, 0, 125, 1000, 0, 2)]);

    let mut session = Session::new(net, traffic);
    session.prepare().unwrap();
    let mut backend = CbcBackend::new();
    let err = session.schedule(&Config::one_shot(), &mut backend).unwrap_err();
    assert!(matches!(err, crate::Error::NoSchedule { iteration: 0 }));
    assert_eq!(session.state(), SessionState::Failed);
}
