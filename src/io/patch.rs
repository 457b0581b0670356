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

//! Parser for patch and optimize documents. Both share the same shape and
//! carry their values already quantized to timeslots: the targeted link, the
//! protocol settings and hyperperiod, the fixed transmissions, and the new
//! frames with their per-instance transmission windows. The document's
//! closed `EndingTime` convention is converted to half-open intervals on
//! ingestion.

use std::path::Path;

use roxmltree::{Document, Node as XmlNode};

use crate::error::Error;
use crate::io::{child, children, parse_child_u64, req_child};
use crate::model::{FrameId, LinkId, SelfHealingProtocol};
use crate::patch::{FixedFrame, PatchFrame, PatchInput};

/// Read and parse a patch or optimize document from a file.
pub fn read(path: impl AsRef<Path>) -> Result<PatchInput, Error> {
    parse(&std::fs::read_to_string(path)?)
}

/// Parse a patch or optimize document.
pub fn parse(input: &str) -> Result<PatchInput, Error> {
    let doc = Document::parse(input)?;
    let root = doc.root_element();

    let general = req_child(root, "GeneralInformation")?;
    let link = LinkId(parse_child_u64(general, "LinkID")? as usize);
    let period = parse_child_u64(general, "ProtocolPeriod")?;
    let duration = parse_child_u64(general, "ProtocolTime")?;
    let hyperperiod = parse_child_u64(general, "HyperPeriod")?;
    let protocol = match period {
        0 => None,
        period => Some(SelfHealingProtocol::new(period, duration)?),
    };

    let mut fixed = Vec::new();
    if let Some(fixed_traffic) = child(root, "FixedTraffic") {
        for frame in children(fixed_traffic, "Frame") {
            fixed.push(parse_fixed(frame)?);
        }
    }

    let mut frames = Vec::new();
    if let Some(traffic) = child(root, "Traffic") {
        for frame in children(traffic, "Frame") {
            frames.push(parse_new(frame, link)?);
        }
    }

    Ok(PatchInput {
        link,
        protocol,
        hyperperiod,
        fixed,
        frames,
    })
}

/// Parse a fixed frame: per instance a transmission and ending time.
fn parse_fixed(node: XmlNode<'_, '_>) -> Result<FixedFrame, Error> {
    let id = FrameId(parse_child_u64(node, "FrameID")? as usize);
    let mut instances = Vec::new();
    for instance in children(req_child(node, "Offset")?, "Instance") {
        let start = parse_child_u64(instance, "TransmissionTime")?;
        let end = parse_child_u64(instance, "EndingTime")?;
        if end < start {
            return Err(Error::InvalidInput(format!(
                "fixed frame {id}: ending time {end} before transmission time {start}"
            )));
        }
        instances.push((start, end + 1));
    }
    Ok(FixedFrame::new(id, instances))
}

/// Parse a new frame: its transmission duration in timeslots and the
/// per-instance transmission windows.
fn parse_new(node: XmlNode<'_, '_>, link: LinkId) -> Result<PatchFrame, Error> {
    let id = FrameId(parse_child_u64(node, "FrameID")? as usize);
    let offset = req_child(node, "Offset")?;
    let duration = parse_child_u64(offset, "TimeSlots")?;
    let mut windows = Vec::new();
    for instance in children(offset, "Instance") {
        let min = parse_child_u64(instance, "MinTransmission")?;
        let max = parse_child_u64(instance, "MaxTransmission")?;
        if max < min {
            return Err(Error::InvalidInput(format!(
                "frame {id}: window [{min}, {max}] is empty"
            )));
        }
        windows.push((min, max));
    }
    Ok(PatchFrame::new(id, link, duration, &windows))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A patch document with one fixed frame and one new frame.
    const DOC: &str = r#"<Patch>
        <GeneralInformation>
            <LinkID>4</LinkID>
            <ProtocolPeriod>500</ProtocolPeriod>
            <ProtocolTime>20</ProtocolTime>
            <HyperPeriod>1000</HyperPeriod>
        </GeneralInformation>
        <FixedTraffic>
            <Frame>
                <FrameID>0</FrameID>
                <Offset>
                    <Instance>
                        <TransmissionTime>100</TransmissionTime>
                        <EndingTime>149</EndingTime>
                    </Instance>
                </Offset>
            </Frame>
        </FixedTraffic>
        <Traffic>
            <Frame>
                <FrameID>1</FrameID>
                <Offset>
                    <TimeSlots>30</TimeSlots>
                    <Instance>
                        <MinTransmission>0</MinTransmission>
                        <MaxTransmission>200</MaxTransmission>
                    </Instance>
                </Offset>
            </Frame>
        </Traffic>
    </Patch>"#;

    #[test]
    fn parse_patch_document() {
        let input = parse(DOC).unwrap();
        assert_eq!(input.link, LinkId(4));
        assert_eq!(input.hyperperiod, 1000);
        let shp = input.protocol.unwrap();
        assert_eq!((shp.period(), shp.duration()), (500, 20));
        // closed EndingTime becomes a half-open interval
        assert_eq!(input.fixed[0].instances(), &[(100, 150)]);
        let frame = &input.frames[0];
        assert_eq!(frame.offset().transmission(), 30);
        assert_eq!(frame.offset().range(0, 0), (0, 200));
    }

    #[test]
    fn inactive_protocol() {
        let doc = DOC.replace(
            "<ProtocolPeriod>500</ProtocolPeriod>",
            "<ProtocolPeriod>0</ProtocolPeriod>",
        );
        let input = parse(&doc).unwrap();
        assert!(input.protocol.is_none());
    }

    #[test]
    fn empty_window_rejected() {
        let doc = DOC.replace(
            "<MaxTransmission>200</MaxTransmission>",
            "<MaxTransmission>0</MaxTransmission>",
        );
        assert!(parse(&doc).is_ok());
        let doc = DOC.replace(
            "<MinTransmission>0</MinTransmission>",
            "<MinTransmission>300</MinTransmission>",
        );
        assert!(matches!(parse(&doc), Err(Error::InvalidInput(_))));
    }
}
