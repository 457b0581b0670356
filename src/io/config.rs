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

//! Parser for the scheduler configuration document.

use std::path::Path;

use roxmltree::Document;

use crate::error::Error;
use crate::io::{attribute, child, parse_child_u64, parse_u64, req_child, text};
use crate::scheduler::{Algorithm, Config, ObjectiveWeights};

/// Read and parse a scheduler configuration from a file.
pub fn read(path: impl AsRef<Path>) -> Result<Config, Error> {
    parse(&std::fs::read_to_string(path)?)
}

/// Parse a scheduler configuration document.
pub fn parse(input: &str) -> Result<Config, Error> {
    let doc = Document::parse(input)?;
    let algorithm = req_child(doc.root_element(), "Algorithm")?;

    let mip_gap = match child(algorithm, "MIPGAP") {
        Some(node) => {
            let t = text(node)?;
            t.parse::<f64>()
                .ok()
                .filter(|gap| *gap >= 0.0)
                .ok_or_else(|| {
                    Error::InvalidInput(format!("<MIPGAP> holds `{t}`, expected a ratio"))
                })?
        }
        None => 0.0,
    };
    let time_limit = match child(algorithm, "TimeLimit").map(parse_u64).transpose()? {
        Some(0) | None => None,
        Some(seconds) => Some(seconds),
    };

    let algorithm_kind = match attribute(algorithm, "name")? {
        "OneShot" => Algorithm::OneShot,
        "Incremental" => Algorithm::Incremental,
        name => {
            return Err(Error::InvalidInput(format!("unknown algorithm: {name}")));
        }
    };
    let frames_per_iteration = match algorithm_kind {
        Algorithm::OneShot => 0,
        Algorithm::Incremental => match parse_child_u64(algorithm, "FramesIteration")? {
            0 => {
                return Err(Error::InvalidInput(
                    "<FramesIteration> must be at least 1".to_string(),
                ));
            }
            k => k as usize,
        },
    };

    Ok(Config {
        algorithm: algorithm_kind,
        mip_gap,
        time_limit,
        frames_per_iteration,
        weights: ObjectiveWeights::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot() {
        let config = parse(
            r#"<Schedule>
                <Algorithm name="OneShot"><MIPGAP>0</MIPGAP><TimeLimit>60</TimeLimit></Algorithm>
            </Schedule>"#,
        )
        .unwrap();
        assert_eq!(config.algorithm, Algorithm::OneShot);
        assert_eq!(config.mip_gap, 0.0);
        assert_eq!(config.time_limit, Some(60));
    }

    #[test]
    fn incremental_requires_batch_size() {
        let config = parse(
            r#"<Schedule>
                <Algorithm name="Incremental"><FramesIteration>5</FramesIteration></Algorithm>
            </Schedule>"#,
        )
        .unwrap();
        assert_eq!(config.algorithm, Algorithm::Incremental);
        assert_eq!(config.frames_per_iteration, 5);
        assert_eq!(config.time_limit, None);

        let err = parse(r#"<Schedule><Algorithm name="Incremental"/></Schedule>"#).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn unknown_algorithm() {
        let err = parse(r#"<Schedule><Algorithm name="Tabu"/></Schedule>"#).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
