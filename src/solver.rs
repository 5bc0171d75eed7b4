//! Incremental solver contract.
//!
//! The core never decides satisfiability itself. It talks to a backend
//! through [`Solver`]: assert formulas, open and close scopes, ask for a
//! verdict and read back a satisfying valuation. Backends are created by a
//! [`SolverFactory`], once per function session and once per ranking row.

use crate::error::SolverError;
use crate::expr::{Expr, Symbol, Valuation, Value};

/// Verdict of a satisfiability check.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SolveResult {
    Sat,
    Unsat,
    /// The backend gave up (timeout, incompleteness, resource limit).
    Unknown,
}

/// An incremental satisfiability session.
///
/// After [`solve`][Solver::solve] returned [`SolveResult::Sat`], the
/// [`Valuation`] methods report the witness for every symbol occurring in
/// the asserted formulas.
pub trait Solver: Valuation {
    /// Adds a formula to the current scope.
    fn assert(&mut self, formula: &Expr);

    /// Opens a scope.
    fn push(&mut self);

    /// Drops every formula asserted since the matching [`push`][Solver::push].
    fn pop(&mut self) -> Result<(), SolverError>;

    fn solve(&mut self) -> Result<SolveResult, SolverError>;

    fn assert_all<'a, I>(&mut self, formulas: I)
    where
        I: IntoIterator<Item = &'a Expr>,
        Self: Sized,
    {
        for f in formulas {
            self.assert(f);
        }
    }

    /// Witness value of a boolean symbol; `None` when unknown.
    fn bool_value(&self, symbol: &Symbol) -> Option<bool> {
        self.value(symbol).and_then(Value::as_bool)
    }

    /// Witness value of an integer symbol; `None` when unknown.
    fn int_value(&self, symbol: &Symbol) -> Option<i64> {
        self.value(symbol).and_then(Value::as_int)
    }
}

/// Creates solver sessions.
pub trait SolverFactory {
    type Solver: Solver;

    /// `refine` asks for a backend that shapes queries for
    /// overapproximation refinement.
    fn allocate(&self, refine: bool) -> Self::Solver;
}
