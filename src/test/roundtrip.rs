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

//! A schedule emitted by the core, re-parsed, must validate unchanged.

use test_log::test;

use crate::io;
use crate::milp::cbc::CbcBackend;
use crate::scheduler::{Config, Session, SessionState};
use crate::test::{line, line_frame, traffic};

/// Build and solve a small session.
fn solved_session() -> Session {
    let net = line(2, 100_000, 0);
    let frames = traffic([
        line_frame(&net, 0, 125, 1000, 0, 2),
        line_frame(&net, 1, 125, 1500, 0, 2),
    ]);
    let mut session = Session::new(net, frames);
    session.prepare().unwrap();
    let mut backend = CbcBackend::new();
    session.schedule(&Config::one_shot(), &mut backend).unwrap();
    session
}

/// Writing and re-reading the schedule preserves every transmission start.
#[test]
fn emitted_offsets_survive_reparsing() {
    let session = solved_session();
    let document = io::schedule::to_string(&session).unwrap();
    let parsed = io::schedule::read_offsets(&document).unwrap();

    for frame in session.traffic().frames() {
        for offset in frame.offsets().offsets() {
            let cells = &parsed[&(frame.id(), offset.link())];
            for instance in 0..offset.num_instances() {
                assert_eq!(cells[&instance], offset.value(instance, 0).unwrap());
            }
        }
    }
}

/// Re-applying the parsed offsets to a freshly prepared session passes the
/// verifier without modification.
#[test]
fn reparsed_schedule_verifies() {
    let session = solved_session();
    let document = io::schedule::to_string(&session).unwrap();
    let parsed = io::schedule::read_offsets(&document).unwrap();

    let net = line(2, 100_000, 0);
    let frames = traffic([
        line_frame(&net, 0, 125, 1000, 0, 2),
        line_frame(&net, 1, 125, 1500, 0, 2),
    ]);
    let mut fresh = Session::new(net, frames);
    fresh.prepare().unwrap();
    for frame in fresh.traffic_mut().frames_mut() {
        let id = frame.id();
        for offset in frame.offsets_mut().offsets_mut() {
            let cells = &parsed[&(id, offset.link())];
            for instance in 0..offset.num_instances() {
                offset.set_value(instance, 0, cells[&instance]);
            }
        }
    }
    fresh.verify().unwrap();
}

/// Drive the whole pipeline from XML documents to an emitted schedule.
#[test]
fn xml_to_schedule() {
    let network = r#"<Network>
        <GeneralInformation>
            <SwitchInformation><MinimumTime unit="ns">0</MinimumTime></SwitchInformation>
            <SelfHealingProtocol>
                <Period unit="ns">500</Period><Time unit="ns">10</Time>
            </SelfHealingProtocol>
        </GeneralInformation>
        <TopologyInformation>
            <Node category="EndSystem">
                <NodeID>0</NodeID>
                <Connection>
                    <NodeID>1</NodeID>
                    <Link category="Wired"><LinkID>0</LinkID><Speed unit="MBs">100</Speed></Link>
                </Connection>
            </Node>
            <Node category="EndSystem"><NodeID>1</NodeID></Node>
        </TopologyInformation>
        <TrafficDescription>
            <Frame>
                <FrameID>0</FrameID>
                <SenderID>0</SenderID>
                <Period unit="us">1</Period>
                <Size unit="Byte">125</Size>
                <Paths>
                    <Receiver><ReceiverID>1</ReceiverID><Path>0</Path></Receiver>
                </Paths>
            </Frame>
            <Frame>
                <FrameID>1</FrameID>
                <SenderID>0</SenderID>
                <Period unit="us">1</Period>
                <Paths>
                    <Receiver><ReceiverID>1</ReceiverID><Path>0</Path></Receiver>
                </Paths>
            </Frame>
        </TrafficDescription>
    </Network>"#;
    let config = r#"<Schedule>
        <Algorithm name="Incremental"><FramesIteration>1</FramesIteration></Algorithm>
    </Schedule>"#;

    let (net, frames) = io::network::parse(network).unwrap();
    let config = io::config::parse(config).unwrap();
    let mut session = Session::new(net, frames);
    session.prepare().unwrap();
    let mut backend = CbcBackend::new();
    session.schedule(&config, &mut backend).unwrap();
    assert_eq!(session.state(), SessionState::Verified);

    let document = io::schedule::to_string(&session).unwrap();
    let parsed = io::schedule::read_offsets(&document).unwrap();
    assert_eq!(parsed.len(), 2);
}
