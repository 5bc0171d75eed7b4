//! Template domains.
//!
//! A template domain fixes the shape of an invariant (its rows) and leaves
//! the row values open. The values are found by a counterexample-guided
//! Kleene iteration ([`strategy::StrategySolver`]): the domain asks the
//! solver whether the current value is violated by some transition, and
//! strengthens the rows the counterexample points at.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::SolverError;
use crate::expr::{Expr, Symbol, Valuation};

pub mod linrank;
pub mod predabs;
pub mod strategy;
pub mod template;

pub use linrank::{RankingDomain, RankingRowValue, RankingValue};
pub use predabs::{PredicateDomain, PredicateValue};
pub use strategy::StrategySolver;
pub use template::{PrePost, RowExpr, TemplateRow};

/// Where a variable is observed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum VarKind {
    /// Function entry.
    In,
    /// Function exit.
    Out,
    /// Loop head, via the loop-back version.
    Loop,
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarKind::In => write!(f, "IN"),
            VarKind::Out => write!(f, "OUT"),
            VarKind::Loop => write!(f, "LOOP"),
        }
    }
}

/// One variable of a template, with the context it is observed in.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct VarSpec {
    /// Program object (unversioned).
    pub object: Symbol,
    /// Pre-state version.
    pub var: Symbol,
    /// Post-state version; the same as `var` for entry and exit variables.
    pub post_var: Symbol,
    pub pre_guard: Expr,
    pub post_guard: Expr,
    pub kind: VarKind,
}

/// Protocol between a template domain and the strategy solver.
///
/// A domain owns its rows and its iteration state; the value it computes is
/// a separate object so the driver can restart from bottom after a
/// refinement.
pub trait TemplateDomain {
    type Value: Clone + fmt::Debug;

    /// Number of the domain instance, used to keep the names of template
    /// parameters apart.
    fn domain_number(&self) -> usize;

    fn rows(&self) -> &[TemplateRow];

    fn new_value(&self) -> Self::Value;

    /// Sets every row to bottom and restarts the iteration state.
    fn initialize_value(&mut self, value: &mut Self::Value);

    /// What the current value lets the pre-state assume.
    fn to_pre_constraints(&self, value: &Self::Value) -> Expr;

    /// One expression per row, satisfiable iff some transition violates
    /// that row of the current value.
    fn make_not_post_constraints(&self, value: &Self::Value) -> Vec<Expr>;

    /// Strengthens `row` after the solver found a violating transition,
    /// given by `model`. Returns whether anything changed.
    fn edit_row(&mut self, model: &dyn Valuation, value: &mut Self::Value, row: usize) -> Result<bool, SolverError>;

    /// No transition violates the current value. Returns whether anything
    /// changed.
    fn handle_unsat(&mut self, value: &mut Self::Value) -> bool;

    /// The solver could not decide. Returns whether the iteration may go
    /// on.
    fn handle_unknown(&mut self, value: &mut Self::Value) -> bool;

    fn has_something_to_solve(&self) -> bool;

    fn init_value_solver_iteration(&mut self, _value: &Self::Value) {}

    fn finalize_solver_iteration(&mut self) {}

    /// The value is not good enough and a larger template might help.
    fn needs_refinement(&self, value: &Self::Value) -> bool;

    /// Enlarges the template. Returns `false` once the configured bound is
    /// reached; the level never decreases.
    fn refine(&mut self) -> bool;

    fn refinement_level(&self) -> u32;

    /// Queries of the domain's own solver sessions that came back
    /// undecided, over the lifetime of the domain. Domains without
    /// sessions of their own report 0.
    fn unknown_answers(&self) -> usize {
        0
    }

    /// The value as a formula, restricted to rows over `vars` (all rows
    /// when `vars` is empty).
    fn project_on_vars(&self, value: &Self::Value, vars: &BTreeSet<Symbol>) -> Expr;
}

/// Whether every symbol of `expr` is in `vars`; an empty `vars` admits
/// everything.
pub(crate) fn over_vars(expr: &Expr, vars: &BTreeSet<Symbol>) -> bool {
    vars.is_empty() || expr.symbols().is_subset(vars)
}
