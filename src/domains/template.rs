//! Template rows.
//!
//! A row pairs what it constrains ([`RowExpr`]) with the guards under which
//! its pre-state and post-state parts apply. Domains keep their rows in a
//! `Vec` and address them by index.

use std::fmt;

use crate::domains::VarKind;
use crate::expr::Expr;

/// Pre-state and post-state version of one variable.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PrePost {
    pub pre: Expr,
    pub post: Expr,
}

impl PrePost {
    /// Pairs a pre-state expression with its post-state counterpart.
    pub fn new(pre: impl Into<Expr>, post: impl Into<Expr>) -> Self {
        Self {
            pre: pre.into(),
            post: post.into(),
        }
    }
}

/// What a row is about. The set of row shapes is closed.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum RowExpr {
    /// A candidate predicate over pre-state symbols and the same predicate
    /// over post-state symbols.
    Predicate { pre: Expr, post: Expr },
    /// Variables a linear ranking function may range over.
    Ranking(Vec<PrePost>),
}

/// One row of a template domain: what it talks about, the guards under
/// which its pre and post parts apply, and the kind of variables involved.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct TemplateRow {
    pub expr: RowExpr,
    pub pre_guard: Expr,
    pub post_guard: Expr,
    pub kind: VarKind,
    /// Refinement level from which the row takes part.
    pub tier: u32,
}

impl TemplateRow {
    /// Predicate row at tier 0.
    pub fn predicate(pre: Expr, post: Expr, pre_guard: Expr, post_guard: Expr, kind: VarKind) -> Self {
        Self {
            expr: RowExpr::Predicate { pre, post },
            pre_guard,
            post_guard,
            kind,
            tier: 0,
        }
    }

    /// Ranking row at tier 0 over the given loop variables. Ranking rows
    /// are always LOOP rows.
    pub fn ranking(vars: Vec<PrePost>, pre_guard: Expr, post_guard: Expr) -> Self {
        Self {
            expr: RowExpr::Ranking(vars),
            pre_guard,
            post_guard,
            kind: VarKind::Loop,
            tier: 0,
        }
    }

    /// Moves the row to a later refinement level.
    pub fn with_tier(mut self, tier: u32) -> Self {
        self.tier = tier;
        self
    }

    /// Rows of this kind constrain the pre-state.
    pub fn is_assumed(&self) -> bool {
        matches!(self.kind, VarKind::In | VarKind::Loop)
    }

    /// Rows of this kind must hold in the post-state.
    pub fn is_checked(&self) -> bool {
        matches!(self.kind, VarKind::Out | VarKind::Loop)
    }
}

impl fmt::Display for TemplateRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) ", self.kind)?;
        match &self.expr {
            RowExpr::Predicate { pre, .. } => write!(f, "{} ==> {}", self.pre_guard, pre),
            RowExpr::Ranking(vars) => {
                write!(f, "{} && {} ==> rank(", self.pre_guard, self.post_guard)?;
                for (i, v) in vars.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} -> {}", v.pre, v.post)?;
                }
                write!(f, ")")
            }
        }
    }
}
