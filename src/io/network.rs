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

//! Parser for the network document: switch information, self-healing
//! protocol settings, the topology, and the traffic description.

use std::path::Path;

use roxmltree::{Document, Node as XmlNode};

use crate::error::Error;
use crate::io::{attribute, child, children, parse_child_u64, parse_size, parse_speed, parse_time, req_child, text};
use crate::model::{
    Frame, FrameId, Link, LinkId, Network, Node, NodeId, SelfHealingProtocol, Traffic,
};

/// Read and parse a network document from a file.
pub fn read(path: impl AsRef<Path>) -> Result<(Network, Traffic), Error> {
    parse(&std::fs::read_to_string(path)?)
}

/// Parse a network document.
pub fn parse(input: &str) -> Result<(Network, Traffic), Error> {
    let doc = Document::parse(input)?;
    let root = doc.root_element();

    let general = req_child(root, "GeneralInformation")?;
    let switch_min = parse_time(req_child(
        req_child(general, "SwitchInformation")?,
        "MinimumTime",
    )?)?;
    let mut net = Network::new(switch_min);

    // absent or unreadable protocol settings mean the protocol is inactive
    if let Some(shp) = child(general, "SelfHealingProtocol") {
        if let Ok(shp) = parse_self_healing(shp) {
            net.set_self_healing(shp);
        }
    }

    let topology = req_child(root, "TopologyInformation")?;
    for node in children(topology, "Node") {
        let kind = attribute(node, "category")?.parse()?;
        let id = NodeId(parse_child_u64(node, "NodeID")? as usize);
        net.add_node(Node::new(id, kind))?;
    }
    for node in children(topology, "Node") {
        let from = NodeId(parse_child_u64(node, "NodeID")? as usize);
        for connection in children(node, "Connection") {
            let to = NodeId(parse_child_u64(connection, "NodeID")? as usize);
            let link = req_child(connection, "Link")?;
            let kind = attribute(link, "category")?.parse()?;
            let id = LinkId(parse_child_u64(link, "LinkID")? as usize);
            let speed = parse_speed(req_child(link, "Speed")?)?;
            net.add_connection(from, to, Link::new(id, kind, speed)?)?;
        }
    }

    let mut traffic = Traffic::new();
    for frame in children(req_child(root, "TrafficDescription")?, "Frame") {
        traffic.push(parse_frame(frame, &net)?)?;
    }

    Ok((net, traffic))
}

/// Parse the self-healing protocol settings.
fn parse_self_healing(node: XmlNode<'_, '_>) -> Result<SelfHealingProtocol, Error> {
    let period = parse_time(req_child(node, "Period")?)?;
    let duration = parse_time(req_child(node, "Time")?)?;
    SelfHealingProtocol::new(period, duration)
}

/// Parse one frame of the traffic description, applying the documented
/// defaults for the optional fields.
fn parse_frame(node: XmlNode<'_, '_>, net: &Network) -> Result<Frame, Error> {
    let id = FrameId(parse_child_u64(node, "FrameID")? as usize);
    let sender = NodeId(parse_child_u64(node, "SenderID")? as usize);
    let period = parse_time(req_child(node, "Period")?)?;
    let deadline = child(node, "Deadline").map(parse_time).transpose()?.unwrap_or(0);
    let size = match child(node, "Size").map(parse_size).transpose()?.unwrap_or(0) {
        0 => 1000,
        size => size,
    };
    let starting = child(node, "StartingTime")
        .map(parse_time)
        .transpose()?
        .unwrap_or(0);
    let end_to_end = child(node, "EndToEnd").map(parse_time).transpose()?.unwrap_or(0);

    let mut frame = Frame::new(id, sender, size, period, deadline, starting, end_to_end)?;
    for receiver in children(req_child(node, "Paths")?, "Receiver") {
        let receiver_id = NodeId(parse_child_u64(receiver, "ReceiverID")? as usize);
        let path = text(req_child(receiver, "Path")?)?
            .split(';')
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .map(|hop| {
                hop.parse()
                    .map(LinkId)
                    .map_err(|_| Error::InvalidInput(format!("invalid link id `{hop}` in path")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        frame.add_receiver(net, receiver_id, path)?;
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinkKind, NodeKind};

    /// A minimal document with two nodes, one link, and one frame.
    const DOC: &str = r#"<Network>
        <GeneralInformation>
            <SwitchInformation><MinimumTime unit="ns">0</MinimumTime></SwitchInformation>
        </GeneralInformation>
        <TopologyInformation>
            <Node category="EndSystem">
                <NodeID>0</NodeID>
                <Connection>
                    <NodeID>1</NodeID>
                    <Link category="Wired"><LinkID>0</LinkID><Speed unit="MBs">1000</Speed></Link>
                </Connection>
            </Node>
            <Node category="EndSystem"><NodeID>1</NodeID></Node>
        </TopologyInformation>
        <TrafficDescription>
            <Frame>
                <FrameID>0</FrameID>
                <SenderID>0</SenderID>
                <Period unit="us">1</Period>
                <Paths>
                    <Receiver><ReceiverID>1</ReceiverID><Path>0</Path></Receiver>
                </Paths>
            </Frame>
        </TrafficDescription>
    </Network>"#;

    #[test]
    fn parse_minimal_document() {
        let (net, traffic) = parse(DOC).unwrap();
        assert_eq!(net.num_nodes(), 2);
        assert_eq!(net.num_links(), 1);
        assert_eq!(net.link(LinkId(0)).unwrap().kind(), LinkKind::Wired);
        assert_eq!(net.link(LinkId(0)).unwrap().speed(), 1_000_000);
        assert!(net.self_healing().is_none());

        let frame = &traffic.frames()[0];
        assert_eq!(frame.period(), 1_000);
        // defaults: deadline = period, size 1000 byte, no offsets yet
        assert_eq!(frame.deadline(), 1_000);
        assert_eq!(frame.size(), 1000);
        assert_eq!(frame.receivers()[0].path(), &[LinkId(0)]);
    }

    #[test]
    fn protocol_parsed_when_present() {
        let doc = DOC.replace(
            "</GeneralInformation>",
            r#"<SelfHealingProtocol>
                <Period unit="us">10</Period><Time unit="ns">50</Time>
            </SelfHealingProtocol></GeneralInformation>"#,
        );
        let (net, _) = parse(&doc).unwrap();
        let shp = net.self_healing().unwrap();
        assert_eq!(shp.period(), 10_000);
        assert_eq!(shp.duration(), 50);
    }

    #[test]
    fn unreadable_protocol_is_inactive() {
        let doc = DOC.replace(
            "</GeneralInformation>",
            r#"<SelfHealingProtocol><Period unit="us">10</Period></SelfHealingProtocol>
            </GeneralInformation>"#,
        );
        let (net, _) = parse(&doc).unwrap();
        assert!(net.self_healing().is_none());
    }

    #[test]
    fn unknown_category_rejected() {
        let doc = DOC.replace(r#"category="Wired""#, r#"category="Carrier""#);
        assert!(matches!(parse(&doc), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn receiver_outside_topology_rejected() {
        let doc = DOC.replace("<ReceiverID>1</ReceiverID>", "<ReceiverID>9</ReceiverID>");
        assert!(matches!(parse(&doc), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn node_kinds() {
        assert_eq!("Switch".parse::<NodeKind>().unwrap(), NodeKind::Switch);
        assert_eq!(
            "AccessPoint".parse::<NodeKind>().unwrap(),
            NodeKind::AccessPoint
        );
        assert!("Router".parse::<NodeKind>().is_err());
    }
}
