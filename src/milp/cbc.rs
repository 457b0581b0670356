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

//! CBC implementation of the solver [`Backend`]. Indicator constraints are
//! lowered to big-M rows with the M derived from the variable bounds, and an
//! or-constraint becomes `a + b >= 1`. The [`coin_cbc::Model`] persists
//! across invocations, so the incremental strategy can extend and re-solve
//! the same model.

use coin_cbc::{Col, Model, Sense};
use log::debug;

use crate::error::Error;
use crate::milp::{Backend, Cmp, LinExpr, SolveOutcome, SolverParams, VarId, VarKind};

/// Tolerance when checking the integrality of a CBC column value.
const INT_TOLERANCE: f64 = 1e-6;

/// Solver backend built on CBC.
pub struct CbcBackend {
    /// The persistent CBC model.
    model: Model,
    /// Columns by variable handle.
    cols: Vec<Col>,
    /// Shadow copy of the variable bounds, used to size big-M terms.
    bounds: Vec<(i64, i64)>,
    /// Number of rows added to the model.
    num_rows: usize,
    /// Values of the last incumbent, by variable handle.
    incumbent: Option<Vec<i64>>,
}

impl CbcBackend {
    /// Create an empty maximization model.
    pub fn new() -> Self {
        let mut model = Model::default();
        model.set_obj_sense(Sense::Maximize);
        #[cfg(any(test, feature = "hide-cbc-output"))]
        model.set_parameter("logLevel", "0");
        Self {
            model,
            cols: Vec::new(),
            bounds: Vec::new(),
            num_rows: 0,
            incumbent: None,
        }
    }

    /// Add the row `expr cmp rhs` to the model.
    fn add_row(&mut self, expr: &LinExpr, cmp: Cmp, rhs: f64) {
        let row = self.model.add_row();
        self.num_rows += 1;
        for (coeff, var) in aggregate(expr) {
            self.model.set_weight(row, self.cols[var.index()], coeff as f64);
        }
        match cmp {
            Cmp::Le => self.model.set_row_upper(row, rhs),
            Cmp::Ge => self.model.set_row_lower(row, rhs),
            Cmp::Eq => {
                self.model.set_row_lower(row, rhs);
                self.model.set_row_upper(row, rhs);
            }
        }
    }

    /// The smallest value `expr` can take under the current bounds.
    fn expr_lower(&self, expr: &LinExpr) -> i64 {
        expr.terms()
            .iter()
            .map(|(c, v)| {
                let (lb, ub) = self.bounds[v.index()];
                if *c >= 0 {
                    c * lb
                } else {
                    c * ub
                }
            })
            .sum()
    }

    /// The largest value `expr` can take under the current bounds.
    fn expr_upper(&self, expr: &LinExpr) -> i64 {
        expr.terms()
            .iter()
            .map(|(c, v)| {
                let (lb, ub) = self.bounds[v.index()];
                if *c >= 0 {
                    c * ub
                } else {
                    c * lb
                }
            })
            .sum()
    }
}

impl Default for CbcBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CbcBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CbcBackend")
            .field("cols", &self.cols.len())
            .field("rows", &self.num_rows)
            .field("incumbent", &self.incumbent.is_some())
            .finish()
    }
}

/// Merge duplicate variables of an expression into a single coefficient.
fn aggregate(expr: &LinExpr) -> Vec<(i64, VarId)> {
    let mut terms: Vec<(i64, VarId)> = Vec::with_capacity(expr.terms().len());
    for &(coeff, var) in expr.terms() {
        match terms.iter_mut().find(|(_, v)| *v == var) {
            Some((c, _)) => *c += coeff,
            None => terms.push((coeff, var)),
        }
    }
    terms
}

impl Backend for CbcBackend {
    fn add_var(&mut self, kind: VarKind, lb: i64, ub: i64) -> VarId {
        let col = self.model.add_col();
        match kind {
            VarKind::Integer => self.model.set_integer(col),
            VarKind::Binary => self.model.set_binary(col),
        }
        self.model.set_col_lower(col, lb as f64);
        self.model.set_col_upper(col, ub as f64);
        self.cols.push(col);
        self.bounds.push((lb, ub));
        VarId(self.cols.len() - 1)
    }

    fn add_linear(&mut self, expr: LinExpr, cmp: Cmp, rhs: i64) {
        self.add_row(&expr, cmp, rhs as f64);
    }

    fn add_indicator(&mut self, indicator: VarId, expr: LinExpr, cmp: Cmp, rhs: i64) {
        match cmp {
            Cmp::Ge => {
                let big_m = rhs - self.expr_lower(&expr);
                if big_m <= 0 {
                    return;
                }
                // expr >= rhs - M * (1 - indicator)
                let expr = expr.term(-big_m, indicator);
                self.add_row(&expr, Cmp::Ge, (rhs - big_m) as f64);
            }
            Cmp::Le => {
                let big_m = self.expr_upper(&expr) - rhs;
                if big_m <= 0 {
                    return;
                }
                // expr <= rhs + M * (1 - indicator)
                let expr = expr.term(big_m, indicator);
                self.add_row(&expr, Cmp::Le, (rhs + big_m) as f64);
            }
            Cmp::Eq => {
                self.add_indicator(indicator, expr.clone(), Cmp::Ge, rhs);
                self.add_indicator(indicator, expr, Cmp::Le, rhs);
            }
        }
    }

    fn add_or(&mut self, a: VarId, b: VarId) {
        self.add_row(&LinExpr::new().term(1, a).term(1, b), Cmp::Ge, 1.0);
    }

    fn set_bounds(&mut self, var: VarId, lb: i64, ub: i64) {
        self.model.set_col_lower(self.cols[var.index()], lb as f64);
        self.model.set_col_upper(self.cols[var.index()], ub as f64);
        self.bounds[var.index()] = (lb, ub);
    }

    fn set_objective_coefficient(&mut self, var: VarId, weight: f64) {
        self.model.set_obj_coeff(self.cols[var.index()], weight);
    }

    fn optimize(&mut self, params: &SolverParams) -> Result<SolveOutcome, Error> {
        if params.mip_gap > 0.0 {
            self.model.set_parameter("ratioGap", &params.mip_gap.to_string());
        }
        if let Some(limit) = params.time_limit {
            self.model.set_parameter("seconds", &limit.to_string());
        }
        debug!(
            "invoking CBC on {} columns and {} rows",
            self.cols.len(),
            self.num_rows
        );

        let solution = self.model.solve();
        let raw = solution.raw();
        if raw.is_proven_infeasible() {
            self.incumbent = None;
            return Ok(SolveOutcome::NoIncumbent);
        }

        // CBC hands back whatever point it stopped at. Accept it as an
        // incumbent only if it is integral and within the variable bounds.
        let mut values = Vec::with_capacity(self.cols.len());
        for (col, &(lb, ub)) in self.cols.iter().zip(&self.bounds) {
            let x = solution.col(*col);
            let v = x.round() as i64;
            if (x - x.round()).abs() > INT_TOLERANCE || v < lb || v > ub {
                self.incumbent = None;
                return Ok(SolveOutcome::NoIncumbent);
            }
            values.push(v);
        }
        self.incumbent = Some(values);
        Ok(if raw.is_proven_optimal() {
            SolveOutcome::Optimal
        } else {
            SolveOutcome::Feasible
        })
    }

    fn value(&self, var: VarId) -> Option<i64> {
        self.incumbent.as_ref().map(|values| values[var.index()])
    }

    fn num_vars(&self) -> usize {
        self.cols.len()
    }

    fn num_constraints(&self) -> usize {
        self.num_rows
    }
}
