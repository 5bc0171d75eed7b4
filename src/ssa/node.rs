use std::fmt;

use crate::expr::{Expr, Symbol};
use crate::goto::Loc;

/// Stable index of a node in the SSA arena.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// `lhs = rhs`, where `lhs` is defined exactly once in the whole SSA.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Equality {
    pub lhs: Symbol,
    pub rhs: Expr,
}

impl Equality {
    pub fn new(lhs: Symbol, rhs: Expr) -> Self {
        Self { lhs, rhs }
    }

    /// `lhs == rhs` as a formula.
    pub fn to_expr(&self) -> Expr {
        Expr::var(self.lhs.clone()).equal(self.rhs.clone())
    }
}

impl fmt::Display for Equality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} == {}", self.lhs, self.rhs)
    }
}

/// A call site, kept verbatim so that a caller-side analysis can plug in
/// the callee's summary.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct FunctionApplication {
    pub function: String,
    pub args: Vec<Expr>,
    pub result: Option<Symbol>,
    /// Versions of the globals before the call.
    pub globals_in: Vec<Symbol>,
    /// Fresh versions of the globals after the call.
    pub globals_out: Vec<Symbol>,
}

impl fmt::Display for FunctionApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = &self.result {
            write!(f, "{} = ", result)?;
        }
        write!(f, "{}(", self.function)?;
        for (i, a) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", a)?;
        }
        write!(f, ")")
    }
}

/// SSA record of one location (or of one unwound copy of a location).
#[derive(Debug, Clone)]
pub struct SsaNode {
    pub location: Loc,
    pub equalities: Vec<Equality>,
    pub constraints: Vec<Expr>,
    pub assertions: Vec<Expr>,
    pub function_calls: Vec<FunctionApplication>,
    /// Formulas of the node only hold when this holds.
    pub enabling_expr: Expr,
    /// Already handed to a solver session.
    pub marked: bool,
    /// Set on back-edge sources: the node of the loop head.
    pub loophead: Option<NodeId>,
    /// On back-edge sources only: every assertion at a later location, as
    /// `guard => assertion`, in program order.
    pub assertions_after_loop: Vec<Expr>,
}

impl SsaNode {
    pub fn new(location: Loc) -> Self {
        Self {
            location,
            equalities: Vec::new(),
            constraints: Vec::new(),
            assertions: Vec::new(),
            function_calls: Vec::new(),
            enabling_expr: Expr::TRUE,
            marked: false,
            loophead: None,
            assertions_after_loop: Vec::new(),
        }
    }

    /// No formulas, assertions or calls. Hoisted assertions do not count.
    pub fn is_empty(&self) -> bool {
        self.equalities.is_empty()
            && self.constraints.is_empty()
            && self.assertions.is_empty()
            && self.function_calls.is_empty()
    }

    /// Equalities and constraints, each guarded by the enabling expression.
    pub fn formulas(&self) -> Vec<Expr> {
        self.equalities
            .iter()
            .map(Equality::to_expr)
            .chain(self.constraints.iter().cloned())
            .map(|f| self.enabling_expr.clone().implies(f))
            .collect()
    }
}

impl fmt::Display for SsaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "*** {}", self.location)?;
        if let Some(head) = self.loophead {
            write!(f, " (loop back to {})", head)?;
        }
        if !self.enabling_expr.is_true() {
            write!(f, " [enabled by {}]", self.enabling_expr)?;
        }
        writeln!(f)?;
        for e in &self.equalities {
            writeln!(f, "(E) {}", e)?;
        }
        for c in &self.constraints {
            writeln!(f, "(C) {}", c)?;
        }
        for a in &self.assertions {
            writeln!(f, "(A) {}", a)?;
        }
        for call in &self.function_calls {
            writeln!(f, "(F) {}", call)?;
        }
        for a in &self.assertions_after_loop {
            writeln!(f, "(A after loop) {}", a)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_formulas_guarded_by_enabling_expr() {
        let mut node = SsaNode::new(2);
        assert!(node.is_empty());
        node.equalities.push(Equality::new(Symbol::int("x#2"), Expr::int(1)));
        assert_eq!(node.formulas(), vec![Expr::var(Symbol::int("x#2")).equal(Expr::int(1))]);

        let enable = Expr::var(Symbol::bool("$enable#1%1"));
        node.enabling_expr = enable.clone();
        assert_eq!(
            node.formulas(),
            vec![enable.implies(Expr::var(Symbol::int("x#2")).equal(Expr::int(1)))]
        );
    }

    #[test]
    fn test_display() {
        let mut node = SsaNode::new(3);
        node.loophead = Some(NodeId::new(1));
        node.function_calls.push(FunctionApplication {
            function: "f".to_string(),
            args: vec![Expr::int(1)],
            result: Some(Symbol::int("r#3")),
            globals_in: vec![],
            globals_out: vec![],
        });
        let text = node.to_string();
        assert!(text.starts_with("*** 3 (loop back to n1)"));
        assert!(text.contains("(F) r#3 = f(1)"));
    }
}
