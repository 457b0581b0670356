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

//! Module containing all error types

use thiserror::Error;

use crate::model::FrameId;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input document, unknown enumerated value, or a reference to
    /// an entity that does not exist.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Timing parameters that can never be satisfied.
    #[error("Invalid timing: {0}")]
    InvalidTiming(String),
    /// The topology violates a structural invariant.
    #[error("Topology error: {0}")]
    Topology(String),
    /// The solver returned no incumbent within the time limit.
    #[error("No schedule exists (iteration {iteration})")]
    NoSchedule {
        /// Iteration of the incremental strategy that failed (0 for the
        /// one-shot strategy).
        iteration: usize,
    },
    /// The verifier rejected an incumbent returned by the solver. This
    /// indicates a bug in the constraint model or in the backend.
    #[error("Schedule invalid: {0}")]
    ScheduleInvalid(String),
    /// The greedy allocator could not place an instance within its window.
    #[error(
        "Cannot patch frame {frame}: instance {instance} does not fit within [{min}, {max}]"
    )]
    PatchInfeasible {
        /// Frame that could not be placed.
        frame: FrameId,
        /// Instance of that frame that did not fit.
        instance: usize,
        /// Earliest allowed transmission start.
        min: u64,
        /// Latest allowed transmission start.
        max: u64,
    },
    /// The solver library reported an error.
    #[error("Solver backend error: {0}")]
    Backend(String),
    /// XML syntax error in an input document.
    #[error("Malformed XML document: {0}")]
    Xml(#[from] roxmltree::Error),
    /// Failed to read or write a document.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to serialize an output document.
    #[error("XML writer error: {0}")]
    XmlWrite(#[from] quick_xml::Error),
}
