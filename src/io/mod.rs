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

//! Reading and writing the XML documents of the scheduler. Time values carry
//! a `unit` attribute in `{ns, us, ms, s}`, sizes in `{Byte, KByte, MByte}`,
//! and speeds in `{KBs, MBs, GBs}`; everything is converted to the canonical
//! units (nanoseconds, bytes, KB/s) on ingestion.

use roxmltree::Node;

use crate::error::Error;

pub mod config;
pub mod network;
pub mod patch;
pub mod schedule;

/// The first child element with the given tag name.
pub(crate) fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

/// The first child element with the given tag name, or an error naming the
/// missing tag.
pub(crate) fn req_child<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> Result<Node<'a, 'input>, Error> {
    child(node, name).ok_or_else(|| {
        Error::InvalidInput(format!(
            "missing <{name}> below <{}>",
            node.tag_name().name()
        ))
    })
}

/// All child elements with the given tag name.
pub(crate) fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == name)
}

/// The trimmed text content of an element.
pub(crate) fn text<'a>(node: Node<'a, '_>) -> Result<&'a str, Error> {
    match node.text().map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t),
        _ => Err(Error::InvalidInput(format!(
            "<{}> has no text content",
            node.tag_name().name()
        ))),
    }
}

/// An attribute of an element, or an error naming the missing attribute.
pub(crate) fn attribute<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str, Error> {
    node.attribute(name).ok_or_else(|| {
        Error::InvalidInput(format!(
            "<{}> has no `{name}` attribute",
            node.tag_name().name()
        ))
    })
}

/// Parse the text content of an element as a natural number.
pub(crate) fn parse_u64(node: Node<'_, '_>) -> Result<u64, Error> {
    let t = text(node)?;
    t.parse().map_err(|_| {
        Error::InvalidInput(format!(
            "<{}> holds `{t}`, expected a natural number",
            node.tag_name().name()
        ))
    })
}

/// Parse the text content of a child element as a natural number.
pub(crate) fn parse_child_u64(node: Node<'_, '_>, name: &str) -> Result<u64, Error> {
    parse_u64(req_child(node, name)?)
}

/// Parse a time value with its `unit` attribute into nanoseconds.
pub(crate) fn parse_time(node: Node<'_, '_>) -> Result<u64, Error> {
    let factor = match attribute(node, "unit")? {
        "ns" => 1,
        "us" | "\u{b5}s" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        unit => {
            return Err(Error::InvalidInput(format!("unknown time unit: {unit}")));
        }
    };
    Ok(parse_u64(node)? * factor)
}

/// Parse a size value with its `unit` attribute into bytes.
pub(crate) fn parse_size(node: Node<'_, '_>) -> Result<u64, Error> {
    let factor = match attribute(node, "unit")? {
        "Byte" => 1,
        "KByte" => 1_000,
        "MByte" => 1_000_000,
        unit => {
            return Err(Error::InvalidInput(format!("unknown size unit: {unit}")));
        }
    };
    Ok(parse_u64(node)? * factor)
}

/// Parse a speed value with its `unit` attribute into KB/s.
pub(crate) fn parse_speed(node: Node<'_, '_>) -> Result<u64, Error> {
    let factor = match attribute(node, "unit")? {
        "KBs" => 1,
        "MBs" => 1_000,
        "GBs" => 1_000_000,
        unit => {
            return Err(Error::InvalidInput(format!("unknown speed unit: {unit}")));
        }
    };
    Ok(parse_u64(node)? * factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units() {
        let doc = roxmltree::Document::parse(
            r#"<R><T unit="us">5</T><S unit="KByte">2</S><V unit="GBs">1</V></R>"#,
        )
        .unwrap();
        let root = doc.root_element();
        assert_eq!(parse_time(req_child(root, "T").unwrap()).unwrap(), 5_000);
        assert_eq!(parse_size(req_child(root, "S").unwrap()).unwrap(), 2_000);
        assert_eq!(parse_speed(req_child(root, "V").unwrap()).unwrap(), 1_000_000);
    }

    #[test]
    fn unknown_unit() {
        let doc = roxmltree::Document::parse(r#"<R><T unit="weeks">5</T></R>"#).unwrap();
        let err = parse_time(req_child(doc.root_element(), "T").unwrap()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn negative_identifier() {
        let doc = roxmltree::Document::parse(r#"<R><Id>-3</Id></R>"#).unwrap();
        let err = parse_child_u64(doc.root_element(), "Id").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
