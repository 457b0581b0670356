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

//! A backend that records every call and replays scripted solutions, used to
//! test the constraint model without a solver.

use std::collections::VecDeque;

use crate::error::Error;
use crate::milp::{Backend, Cmp, LinExpr, SolveOutcome, SolverParams, VarId, VarKind};

/// Recording backend. All emitted variables and constraints are kept in
/// public vectors for inspection; [`Backend::optimize`] pops the next
/// scripted solution, or reports [`SolveOutcome::NoIncumbent`] when the
/// script is exhausted.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    /// Created variables with kind and bounds.
    pub vars: Vec<(VarKind, i64, i64)>,
    /// Recorded linear constraints.
    pub linear: Vec<(LinExpr, Cmp, i64)>,
    /// Recorded indicator constraints.
    pub indicators: Vec<(VarId, LinExpr, Cmp, i64)>,
    /// Recorded or-constraints.
    pub ors: Vec<(VarId, VarId)>,
    /// Recorded bound rewrites.
    pub bound_updates: Vec<(VarId, i64, i64)>,
    /// Recorded objective coefficient rewrites, in call order.
    pub objective: Vec<(VarId, f64)>,
    /// Scripted solutions, one per expected [`Backend::optimize`] call. Each
    /// solution assigns a value to every variable by index.
    pub solutions: VecDeque<Vec<i64>>,
    /// The solution returned by the last optimize call.
    current: Option<Vec<i64>>,
}

impl RecordingBackend {
    /// Create an empty recording backend with no scripted solutions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a scripted solution for the next optimize call.
    pub fn script(&mut self, solution: Vec<i64>) {
        self.solutions.push_back(solution);
    }
}

impl Backend for RecordingBackend {
    fn add_var(&mut self, kind: VarKind, lb: i64, ub: i64) -> VarId {
        self.vars.push((kind, lb, ub));
        VarId(self.vars.len() - 1)
    }

    fn add_linear(&mut self, expr: LinExpr, cmp: Cmp, rhs: i64) {
        self.linear.push((expr, cmp, rhs));
    }

    fn add_indicator(&mut self, indicator: VarId, expr: LinExpr, cmp: Cmp, rhs: i64) {
        self.indicators.push((indicator, expr, cmp, rhs));
    }

    fn add_or(&mut self, a: VarId, b: VarId) {
        self.ors.push((a, b));
    }

    fn set_bounds(&mut self, var: VarId, lb: i64, ub: i64) {
        self.bound_updates.push((var, lb, ub));
    }

    fn set_objective_coefficient(&mut self, var: VarId, weight: f64) {
        self.objective.push((var, weight));
    }

    fn optimize(&mut self, _params: &SolverParams) -> Result<SolveOutcome, Error> {
        match self.solutions.pop_front() {
            Some(solution) => {
                self.current = Some(solution);
                Ok(SolveOutcome::Feasible)
            }
            None => {
                self.current = None;
                Ok(SolveOutcome::NoIncumbent)
            }
        }
    }

    fn value(&self, var: VarId) -> Option<i64> {
        self.current
            .as_ref()
            .and_then(|solution| solution.get(var.index()))
            .copied()
    }

    fn num_vars(&self) -> usize {
        self.vars.len()
    }

    fn num_constraints(&self) -> usize {
        self.linear.len() + self.indicators.len() + self.ors.len()
    }
}
