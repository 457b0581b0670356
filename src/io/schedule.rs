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

//! Writers for the schedule, patched-schedule, and timing documents, plus a
//! reader for emitted schedules used by round-trip validation. Offsets are
//! half-open internally; the emitted `EndingTime` is the closed display
//! convention `TransmissionTime + duration - 1`.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::Document;

use crate::error::Error;
use crate::io::{children, parse_child_u64, req_child};
use crate::model::{FrameId, LinkId, Offset};
use crate::patch::PatchInput;
use crate::scheduler::Session;

/// The XML writer used by all emitters.
type Xml = Writer<Vec<u8>>;

/// Open an element.
fn start(w: &mut Xml, name: &str) -> Result<(), Error> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(())
}

/// Open an element carrying a `unit` attribute.
fn start_with_unit(w: &mut Xml, name: &str, unit: &str) -> Result<(), Error> {
    let mut tag = BytesStart::new(name);
    tag.push_attribute(("unit", unit));
    w.write_event(Event::Start(tag))?;
    Ok(())
}

/// Close an element.
fn end(w: &mut Xml, name: &str) -> Result<(), Error> {
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Write `<name>value</name>`.
fn value(w: &mut Xml, name: &str, value: impl Display) -> Result<(), Error> {
    start(w, name)?;
    w.write_event(Event::Text(BytesText::new(&value.to_string())))?;
    end(w, name)
}

/// Start a fresh document with the XML declaration.
fn new_document() -> Result<Xml, Error> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    Ok(w)
}

/// Finish the document and return it as a string.
fn finish(w: Xml) -> String {
    String::from_utf8(w.into_inner()).expect("the writer only emits UTF-8")
}

/// Serialize a verified schedule.
pub fn to_string(session: &Session) -> Result<String, Error> {
    let mut w = new_document()?;
    start(&mut w, "Schedule")?;

    start(&mut w, "GeneralInformation")?;
    start_with_unit(&mut w, "TimeslotSize", "ns")?;
    w.write_event(Event::Text(BytesText::new(&session.timeslot().to_string())))?;
    end(&mut w, "TimeslotSize")?;
    value(&mut w, "HyperPeriod", session.hyperperiod())?;
    value(&mut w, "NumberLinks", session.network().num_links())?;
    value(&mut w, "NumberNodes", session.network().num_nodes())?;
    value(&mut w, "NumberFrames", session.traffic().len())?;
    if let Some(shp) = session.network().self_healing() {
        start(&mut w, "SelfHealingProtocol")?;
        value(&mut w, "Period", shp.period())?;
        value(&mut w, "Time", shp.duration())?;
        end(&mut w, "SelfHealingProtocol")?;
    }
    end(&mut w, "GeneralInformation")?;

    start(&mut w, "TrafficInformation")?;
    for frame in session.traffic().frames() {
        start(&mut w, "Frame")?;
        value(&mut w, "FrameID", frame.id().0)?;
        let table = frame.offsets();
        for path in 0..table.num_paths() {
            start(&mut w, "Path")?;
            for offset in table.path(path) {
                start(&mut w, "Link")?;
                value(&mut w, "LinkID", offset.link().0)?;
                write_instances(&mut w, frame.id(), offset)?;
                end(&mut w, "Link")?;
            }
            end(&mut w, "Path")?;
        }
        end(&mut w, "Frame")?;
    }
    end(&mut w, "TrafficInformation")?;

    end(&mut w, "Schedule")?;
    Ok(finish(w))
}

/// Write the instance (and, where present, replica) cells of one offset.
fn write_instances(w: &mut Xml, frame: FrameId, offset: &Offset) -> Result<(), Error> {
    let ending = |t: u64| (t + offset.transmission()).saturating_sub(1);
    for instance in 0..offset.num_instances() {
        start(w, "Instance")?;
        value(w, "NumInstance", instance)?;
        if offset.num_replicas() > 1 {
            for replica in 0..offset.num_replicas() {
                let t = cell_value(frame, offset, instance, replica)?;
                start(w, "Replica")?;
                value(w, "NumReplica", replica)?;
                value(w, "TransmissionTime", t)?;
                value(w, "EndingTime", ending(t))?;
                end(w, "Replica")?;
            }
        } else {
            let t = cell_value(frame, offset, instance, 0)?;
            value(w, "TransmissionTime", t)?;
            value(w, "EndingTime", ending(t))?;
        }
        end(w, "Instance")?;
    }
    Ok(())
}

/// The assigned value of a cell; emitting an unassigned cell is an error.
fn cell_value(frame: FrameId, offset: &Offset, instance: usize, replica: usize) -> Result<u64, Error> {
    offset.value(instance, replica).ok_or_else(|| {
        Error::ScheduleInvalid(format!(
            "frame {frame} has no offset on link {} instance {instance}",
            offset.link()
        ))
    })
}

/// Write a verified schedule to a file.
pub fn write(session: &Session, path: impl AsRef<Path>) -> Result<(), Error> {
    std::fs::write(path, to_string(session)?)?;
    Ok(())
}

/// Serialize a patched or optimized link under the given root element.
pub fn patched_to_string(input: &PatchInput, root: &str) -> Result<String, Error> {
    let mut w = new_document()?;
    start(&mut w, root)?;

    start(&mut w, "GeneralInformation")?;
    value(&mut w, "LinkID", input.link.0)?;
    end(&mut w, "GeneralInformation")?;

    start(&mut w, "TrafficInformation")?;
    for frame in &input.frames {
        start(&mut w, "Frame")?;
        value(&mut w, "FrameID", frame.id().0)?;
        write_instances(&mut w, frame.id(), frame.offset())?;
        end(&mut w, "Frame")?;
    }
    end(&mut w, "TrafficInformation")?;

    end(&mut w, root)?;
    Ok(finish(w))
}

/// Write a patched or optimized link to a file.
pub fn write_patched(
    input: &PatchInput,
    root: &str,
    path: impl AsRef<Path>,
) -> Result<(), Error> {
    std::fs::write(path, patched_to_string(input, root)?)?;
    Ok(())
}

/// Serialize the timing document.
pub fn timing_to_string(execution_ns: u128) -> Result<String, Error> {
    let mut w = new_document()?;
    start(&mut w, "Timing")?;
    start_with_unit(&mut w, "ExecutionTime", "ns")?;
    w.write_event(Event::Text(BytesText::new(&execution_ns.to_string())))?;
    end(&mut w, "ExecutionTime")?;
    end(&mut w, "Timing")?;
    Ok(finish(w))
}

/// Write the timing document to a file.
pub fn write_timing(execution_ns: u128, path: impl AsRef<Path>) -> Result<(), Error> {
    std::fs::write(path, timing_to_string(execution_ns)?)?;
    Ok(())
}

/// Parse the transmission starts of an emitted schedule document back into a
/// map from (frame, link) to the start of every instance. Used to validate
/// that a schedule survives a round-trip unchanged.
pub fn read_offsets(
    input: &str,
) -> Result<HashMap<(FrameId, LinkId), HashMap<usize, u64>>, Error> {
    let doc = Document::parse(input)?;
    let mut offsets: HashMap<(FrameId, LinkId), HashMap<usize, u64>> = HashMap::new();
    let traffic = req_child(doc.root_element(), "TrafficInformation")?;
    for frame in children(traffic, "Frame") {
        let id = FrameId(parse_child_u64(frame, "FrameID")? as usize);
        for path in children(frame, "Path") {
            for link in children(path, "Link") {
                let link_id = LinkId(parse_child_u64(link, "LinkID")? as usize);
                let cells = offsets.entry((id, link_id)).or_default();
                for instance in children(link, "Instance") {
                    let num = parse_child_u64(instance, "NumInstance")? as usize;
                    let t = parse_child_u64(instance, "TransmissionTime")?;
                    cells.insert(num, t);
                }
            }
        }
    }
    Ok(offsets)
}
