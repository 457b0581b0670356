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

//! # Weft: collision-free scheduling for time-triggered networks
//!
//! Weft computes collision-free transmission schedules for time-triggered
//! traffic over switched (possibly wireless-augmented) networks on which a
//! self-healing protocol periodically reserves bandwidth for repair traffic.
//! Given a topology, a set of periodic frames with fixed multicast paths,
//! and per-frame timing constraints, it assigns every transmission of every
//! frame on every traversed link to a discrete time offset within the global
//! hyperperiod, such that no two transmissions overlap, paths stay causally
//! ordered, and all deadline and end-to-end bounds hold.
//!
//! ## Structure
//! The source code of this program is structured as follows:
//! - The module [`model`] holds the immutable network and traffic data
//!   together with the offset graph ([`model::OffsetTable`]) carrying the
//!   only mutable scheduling state.
//! - The module [`time_model`] reduces all durations to a common timeslot
//!   and fixes the hyperperiod.
//! - The module [`milp`] is the narrow interface to the MILP solver, with a
//!   CBC implementation ([`milp::cbc`]) and a recording backend for tests
//!   ([`milp::recording`]).
//! - The module [`scheduler`] owns the scheduling session
//!   ([`scheduler::Session`]), the constraint model
//!   ([`scheduler::constraints`]), the one-shot and incremental strategies,
//!   and the post-solve verifier ([`scheduler::verifier`]).
//! - The module [`patch`] integrates new frames into an existing schedule on
//!   a single link with a greedy interval allocator, and [`patch::optimize`]
//!   refines the result with a bounded MILP.
//! - The module [`io`] reads and writes the XML documents.

#![deny(
    missing_docs,
    clippy::missing_docs_in_private_items,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::result_large_err)]

pub mod error;
pub mod io;
pub mod milp;
pub mod model;
pub mod patch;
pub mod scheduler;
pub mod time_model;

#[cfg(test)]
mod test;

pub use error::Error;
pub use scheduler::{Algorithm, Config, Session};
