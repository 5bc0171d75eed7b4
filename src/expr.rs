//! Logical expressions shared by the control-flow graph, the SSA formulas,
//! the template domains and the solver contract.
//!
//! Expressions are plain trees over integer and boolean terms. The
//! constructors on [`Expr`] fold constants and flatten conjunctions, so
//! building `false => e` yields `true` rather than an implication node.

use std::collections::{BTreeSet, HashMap};
use std::fmt::{self, Display, Formatter};

/// Sort of a term.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Sort {
    Bool,
    Int,
}

impl Display for Sort {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "bool"),
            Sort::Int => write!(f, "int"),
        }
    }
}

/// A sorted identifier: a program variable, an SSA version or a
/// synthesized symbol.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Symbol {
    name: String,
    sort: Sort,
}

impl Symbol {
    pub fn new(name: impl Into<String>, sort: Sort) -> Self {
        Self { name: name.into(), sort }
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, Sort::Int)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, Sort::Bool)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sort(&self) -> Sort {
        self.sort
    }

    /// Same sort, different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self::new(name, self.sort)
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A concrete value of a term.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Value {
    Bool(bool),
    Int(i64),
}

impl Value {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(b),
            Value::Int(_) => None,
        }
    }

    pub fn as_int(self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(n),
            Value::Bool(_) => None,
        }
    }

    pub fn sort(self) -> Sort {
        match self {
            Value::Bool(_) => Sort::Bool,
            Value::Int(_) => Sort::Int,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
        }
    }
}

/// A (possibly partial) assignment of values to symbols.
pub trait Valuation {
    fn value(&self, symbol: &Symbol) -> Option<Value>;
}

impl Valuation for HashMap<Symbol, Value> {
    fn value(&self, symbol: &Symbol) -> Option<Value> {
        self.get(symbol).copied()
    }
}

/// Expression tree.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Expr {
    Var(Symbol),
    Bool(bool),
    Int(i64),
    /// Nondeterministic value; only meaningful in control-flow-graph input,
    /// the SSA builder replaces it by a fresh symbol.
    Nondet(Sort),

    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),

    Eq(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Ge(Box<Expr>, Box<Expr>),

    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    Ite(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[allow(clippy::should_implement_trait)]
impl Expr {
    pub const TRUE: Expr = Expr::Bool(true);
    pub const FALSE: Expr = Expr::Bool(false);

    pub fn var(symbol: Symbol) -> Self {
        Expr::Var(symbol)
    }

    pub fn int(n: i64) -> Self {
        Expr::Int(n)
    }

    pub fn bool(b: bool) -> Self {
        Expr::Bool(b)
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Expr::Bool(true))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Expr::Bool(false))
    }

    /// The symbol, if the expression is a single variable.
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Expr::Var(s) => Some(s),
            _ => None,
        }
    }

    pub fn add(self, other: Self) -> Self {
        match (self, other) {
            (Expr::Int(a), Expr::Int(b)) => Expr::Int(a.wrapping_add(b)),
            (e, Expr::Int(0)) | (Expr::Int(0), e) => e,
            (a, b) => Expr::Add(Box::new(a), Box::new(b)),
        }
    }

    pub fn sub(self, other: Self) -> Self {
        match (self, other) {
            (Expr::Int(a), Expr::Int(b)) => Expr::Int(a.wrapping_sub(b)),
            (e, Expr::Int(0)) => e,
            (a, b) => Expr::Sub(Box::new(a), Box::new(b)),
        }
    }

    pub fn mul(self, other: Self) -> Self {
        match (self, other) {
            (Expr::Int(a), Expr::Int(b)) => Expr::Int(a.wrapping_mul(b)),
            (_, Expr::Int(0)) | (Expr::Int(0), _) => Expr::Int(0),
            (e, Expr::Int(1)) | (Expr::Int(1), e) => e,
            (a, b) => Expr::Mul(Box::new(a), Box::new(b)),
        }
    }

    /// Arithmetic negation; folds constants.
    pub fn neg(self) -> Self {
        match self {
            Expr::Int(n) => Expr::Int(n.wrapping_neg()),
            Expr::Neg(inner) => *inner,
            e => Expr::Neg(Box::new(e)),
        }
    }

    pub fn equal(self, other: Self) -> Self {
        match (self, other) {
            (Expr::Int(a), Expr::Int(b)) => Expr::Bool(a == b),
            (Expr::Bool(a), Expr::Bool(b)) => Expr::Bool(a == b),
            (a, b) => Expr::Eq(Box::new(a), Box::new(b)),
        }
    }

    pub fn lt(self, other: Self) -> Self {
        match (self, other) {
            (Expr::Int(a), Expr::Int(b)) => Expr::Bool(a < b),
            (a, b) => Expr::Lt(Box::new(a), Box::new(b)),
        }
    }

    pub fn le(self, other: Self) -> Self {
        match (self, other) {
            (Expr::Int(a), Expr::Int(b)) => Expr::Bool(a <= b),
            (a, b) => Expr::Le(Box::new(a), Box::new(b)),
        }
    }

    pub fn gt(self, other: Self) -> Self {
        match (self, other) {
            (Expr::Int(a), Expr::Int(b)) => Expr::Bool(a > b),
            (a, b) => Expr::Gt(Box::new(a), Box::new(b)),
        }
    }

    pub fn ge(self, other: Self) -> Self {
        match (self, other) {
            (Expr::Int(a), Expr::Int(b)) => Expr::Bool(a >= b),
            (a, b) => Expr::Ge(Box::new(a), Box::new(b)),
        }
    }

    pub fn not(self) -> Self {
        match self {
            Expr::Bool(b) => Expr::Bool(!b),
            Expr::Not(inner) => *inner,
            e => Expr::Not(Box::new(e)),
        }
    }

    pub fn and(self, other: Self) -> Self {
        conjunction([self, other])
    }

    pub fn or(self, other: Self) -> Self {
        disjunction([self, other])
    }

    pub fn implies(self, other: Self) -> Self {
        match (self, other) {
            (Expr::Bool(false), _) | (_, Expr::Bool(true)) => Expr::TRUE,
            (Expr::Bool(true), e) => e,
            (e, Expr::Bool(false)) => e.not(),
            (a, b) => Expr::Implies(Box::new(a), Box::new(b)),
        }
    }

    /// If-then-else. A constant condition selects a branch.
    pub fn ite(cond: Self, then: Self, else_: Self) -> Self {
        match cond {
            Expr::Bool(true) => then,
            Expr::Bool(false) => else_,
            _ if then == else_ => then,
            c => Expr::Ite(Box::new(c), Box::new(then), Box::new(else_)),
        }
    }

    /// Sort of the expression, assuming it is well-sorted.
    pub fn sort(&self) -> Sort {
        match self {
            Expr::Var(s) => s.sort(),
            Expr::Bool(_) => Sort::Bool,
            Expr::Int(_) => Sort::Int,
            Expr::Nondet(sort) => *sort,
            Expr::Add(..) | Expr::Sub(..) | Expr::Mul(..) | Expr::Neg(_) => Sort::Int,
            Expr::Ite(_, then, _) => then.sort(),
            _ => Sort::Bool,
        }
    }

    /// Immediate subexpressions, in order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Var(_) | Expr::Bool(_) | Expr::Int(_) | Expr::Nondet(_) => vec![],
            Expr::Neg(a) | Expr::Not(a) => vec![a],
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Eq(a, b)
            | Expr::Lt(a, b)
            | Expr::Le(a, b)
            | Expr::Gt(a, b)
            | Expr::Ge(a, b)
            | Expr::Implies(a, b) => vec![a, b],
            Expr::And(es) | Expr::Or(es) => es.iter().collect(),
            Expr::Ite(c, a, b) => vec![c, a, b],
        }
    }

    /// Calls `f` on every symbol occurrence, left to right.
    pub fn visit_symbols<F>(&self, f: &mut F)
    where
        F: FnMut(&Symbol),
    {
        match self {
            Expr::Var(s) => f(s),
            _ => {
                for child in self.children() {
                    child.visit_symbols(f);
                }
            }
        }
    }

    /// Symbols occurring in the expression.
    pub fn symbols(&self) -> BTreeSet<Symbol> {
        let mut result = BTreeSet::new();
        self.visit_symbols(&mut |s| {
            result.insert(s.clone());
        });
        result
    }

    /// Whether any nondet value remains.
    pub fn contains_nondet(&self) -> bool {
        match self {
            Expr::Nondet(_) => true,
            _ => self.children().into_iter().any(Expr::contains_nondet),
        }
    }

    /// Rebuilds the expression bottom-up, giving `f` the chance to replace
    /// each leaf. Inner nodes are rebuilt structurally (no folding).
    pub fn map_leaves<F>(&self, f: &mut F) -> Expr
    where
        F: FnMut(&Expr) -> Option<Expr>,
    {
        if let Some(e) = f(self) {
            return e;
        }
        let mut m = |e: &Expr| Box::new(e.map_leaves(f));
        match self {
            Expr::Var(_) | Expr::Bool(_) | Expr::Int(_) | Expr::Nondet(_) => self.clone(),
            Expr::Add(a, b) => Expr::Add(m(a), m(b)),
            Expr::Sub(a, b) => Expr::Sub(m(a), m(b)),
            Expr::Mul(a, b) => Expr::Mul(m(a), m(b)),
            Expr::Neg(a) => Expr::Neg(m(a)),
            Expr::Eq(a, b) => Expr::Eq(m(a), m(b)),
            Expr::Lt(a, b) => Expr::Lt(m(a), m(b)),
            Expr::Le(a, b) => Expr::Le(m(a), m(b)),
            Expr::Gt(a, b) => Expr::Gt(m(a), m(b)),
            Expr::Ge(a, b) => Expr::Ge(m(a), m(b)),
            Expr::Not(a) => Expr::Not(m(a)),
            Expr::Implies(a, b) => Expr::Implies(m(a), m(b)),
            Expr::Ite(c, a, b) => Expr::Ite(m(c), m(a), m(b)),
            Expr::And(es) => Expr::And(es.iter().map(|e| *m(e)).collect()),
            Expr::Or(es) => Expr::Or(es.iter().map(|e| *m(e)).collect()),
        }
    }

    /// Replaces symbols according to `f`; symbols mapped to `None` are kept.
    pub fn rename<F>(&self, mut f: F) -> Expr
    where
        F: FnMut(&Symbol) -> Option<Symbol>,
    {
        self.map_leaves(&mut |e| match e {
            Expr::Var(s) => f(s).map(Expr::Var),
            _ => None,
        })
    }

    /// Replaces symbols by expressions according to `f`.
    pub fn substitute<F>(&self, mut f: F) -> Expr
    where
        F: FnMut(&Symbol) -> Option<Expr>,
    {
        self.map_leaves(&mut |e| match e {
            Expr::Var(s) => f(s),
            _ => None,
        })
    }

    /// Three-valued evaluation: `None` when the value depends on a symbol
    /// the valuation does not assign. Boolean connectives short-circuit, so
    /// `false && x` evaluates to `false` even if `x` is unassigned.
    pub fn eval<V>(&self, valuation: &V) -> Option<Value>
    where
        V: Valuation + ?Sized,
    {
        let int = |e: &Expr| e.eval(valuation).and_then(Value::as_int);
        let boolean = |e: &Expr| e.eval(valuation).and_then(Value::as_bool);
        match self {
            Expr::Var(s) => valuation.value(s),
            Expr::Bool(b) => Some(Value::Bool(*b)),
            Expr::Int(n) => Some(Value::Int(*n)),
            Expr::Nondet(_) => None,
            Expr::Add(a, b) => Some(Value::Int(int(a)?.wrapping_add(int(b)?))),
            Expr::Sub(a, b) => Some(Value::Int(int(a)?.wrapping_sub(int(b)?))),
            Expr::Mul(a, b) => Some(Value::Int(int(a)?.wrapping_mul(int(b)?))),
            Expr::Neg(a) => Some(Value::Int(int(a)?.wrapping_neg())),
            Expr::Eq(a, b) => Some(Value::Bool(a.eval(valuation)? == b.eval(valuation)?)),
            Expr::Lt(a, b) => Some(Value::Bool(int(a)? < int(b)?)),
            Expr::Le(a, b) => Some(Value::Bool(int(a)? <= int(b)?)),
            Expr::Gt(a, b) => Some(Value::Bool(int(a)? > int(b)?)),
            Expr::Ge(a, b) => Some(Value::Bool(int(a)? >= int(b)?)),
            Expr::Not(a) => Some(Value::Bool(!boolean(a)?)),
            Expr::And(es) => {
                let mut known = true;
                for e in es {
                    match boolean(e) {
                        Some(false) => return Some(Value::Bool(false)),
                        Some(true) => {}
                        None => known = false,
                    }
                }
                known.then_some(Value::Bool(true))
            }
            Expr::Or(es) => {
                let mut known = true;
                for e in es {
                    match boolean(e) {
                        Some(true) => return Some(Value::Bool(true)),
                        Some(false) => {}
                        None => known = false,
                    }
                }
                known.then_some(Value::Bool(false))
            }
            Expr::Implies(a, b) => match (boolean(a), boolean(b)) {
                (Some(false), _) | (_, Some(true)) => Some(Value::Bool(true)),
                (Some(true), Some(false)) => Some(Value::Bool(false)),
                _ => None,
            },
            Expr::Ite(c, a, b) => match boolean(c) {
                Some(true) => a.eval(valuation),
                Some(false) => b.eval(valuation),
                None => {
                    let (a, b) = (a.eval(valuation)?, b.eval(valuation)?);
                    (a == b).then_some(a)
                }
            },
        }
    }
}

impl From<Symbol> for Expr {
    fn from(symbol: Symbol) -> Self {
        Expr::Var(symbol)
    }
}

impl From<&Symbol> for Expr {
    fn from(symbol: &Symbol) -> Self {
        Expr::Var(symbol.clone())
    }
}

/// Flattened conjunction; `true` when empty.
pub fn conjunction<I>(exprs: I) -> Expr
where
    I: IntoIterator<Item = Expr>,
{
    let mut ops = Vec::new();
    for e in exprs {
        match e {
            Expr::Bool(true) => {}
            Expr::Bool(false) => return Expr::FALSE,
            Expr::And(inner) => ops.extend(inner),
            e => ops.push(e),
        }
    }
    match ops.len() {
        0 => Expr::TRUE,
        1 => ops.pop().unwrap_or(Expr::TRUE),
        _ => Expr::And(ops),
    }
}

/// Flattened disjunction; `false` when empty.
pub fn disjunction<I>(exprs: I) -> Expr
where
    I: IntoIterator<Item = Expr>,
{
    let mut ops = Vec::new();
    for e in exprs {
        match e {
            Expr::Bool(false) => {}
            Expr::Bool(true) => return Expr::TRUE,
            Expr::Or(inner) => ops.extend(inner),
            e => ops.push(e),
        }
    }
    match ops.len() {
        0 => Expr::FALSE,
        1 => ops.pop().unwrap_or(Expr::FALSE),
        _ => Expr::Or(ops),
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fn join(f: &mut Formatter<'_>, es: &[Expr], sep: &str) -> fmt::Result {
            write!(f, "(")?;
            for (i, e) in es.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", sep)?;
                }
                write!(f, "{}", e)?;
            }
            write!(f, ")")
        }

        match self {
            Expr::Var(s) => write!(f, "{}", s),
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Int(n) => write!(f, "{}", n),
            Expr::Nondet(sort) => write!(f, "nondet({})", sort),
            Expr::Add(a, b) => write!(f, "({} + {})", a, b),
            Expr::Sub(a, b) => write!(f, "({} - {})", a, b),
            Expr::Mul(a, b) => write!(f, "({} * {})", a, b),
            Expr::Neg(a) => write!(f, "-{}", a),
            Expr::Eq(a, b) => write!(f, "({} == {})", a, b),
            Expr::Lt(a, b) => write!(f, "({} < {})", a, b),
            Expr::Le(a, b) => write!(f, "({} <= {})", a, b),
            Expr::Gt(a, b) => write!(f, "({} > {})", a, b),
            Expr::Ge(a, b) => write!(f, "({} >= {})", a, b),
            Expr::Not(a) => write!(f, "!{}", a),
            Expr::And(es) => join(f, es, "&&"),
            Expr::Or(es) => join(f, es, "||"),
            Expr::Implies(a, b) => write!(f, "({} => {})", a, b),
            Expr::Ite(c, a, b) => write!(f, "({} ? {} : {})", c, a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn x() -> Expr {
        Expr::var(Symbol::int("x"))
    }

    #[test]
    fn test_constant_folding() {
        assert_eq!(Expr::int(2).add(Expr::int(3)), Expr::int(5));
        assert_eq!(x().mul(Expr::int(1)), x());
        assert_eq!(x().mul(Expr::int(0)), Expr::int(0));
        assert_eq!(Expr::int(1).lt(Expr::int(2)), Expr::TRUE);
        assert_eq!(Expr::TRUE.not(), Expr::FALSE);
        assert_eq!(x().ge(Expr::int(0)).not().not(), x().ge(Expr::int(0)));
    }

    #[test]
    fn test_implication_folding() {
        let p = x().ge(Expr::int(0));
        assert_eq!(Expr::FALSE.implies(p.clone()), Expr::TRUE);
        assert_eq!(Expr::TRUE.implies(p.clone()), p);
        assert_eq!(p.clone().implies(Expr::TRUE), Expr::TRUE);
    }

    #[test]
    fn test_conjunction_flattening() {
        let a = Expr::var(Symbol::bool("a"));
        let b = Expr::var(Symbol::bool("b"));
        let c = Expr::var(Symbol::bool("c"));

        assert_eq!(conjunction([]), Expr::TRUE);
        assert_eq!(conjunction([a.clone()]), a);
        assert_eq!(
            conjunction([a.clone().and(b.clone()), Expr::TRUE, c.clone()]),
            Expr::And(vec![a.clone(), b.clone(), c.clone()])
        );
        assert_eq!(conjunction([a.clone(), Expr::FALSE]), Expr::FALSE);
        assert_eq!(disjunction([]), Expr::FALSE);
        assert_eq!(disjunction([a, Expr::TRUE]), Expr::TRUE);
    }

    #[test]
    fn test_eval_partial() {
        let mut model = HashMap::new();
        model.insert(Symbol::int("x"), Value::Int(4));

        let y = Expr::var(Symbol::int("y"));
        let e = x().gt(Expr::int(10)).and(y.clone().ge(Expr::int(0)));
        // The first conjunct is false, so `y` does not matter.
        assert_eq!(e.eval(&model), Some(Value::Bool(false)));

        let e = x().lt(Expr::int(10)).and(y.ge(Expr::int(0)));
        assert_eq!(e.eval(&model), None);

        let e = x().sub(Expr::int(1)).mul(Expr::int(3));
        assert_eq!(e.eval(&model), Some(Value::Int(9)));
    }

    #[test]
    fn test_rename() {
        let e = x().add(Expr::var(Symbol::int("y")));
        let r = e.rename(|s| (s.name() == "x").then(|| s.renamed("x#1")));
        assert_eq!(r.to_string(), "(x#1 + y)");
        let names: Vec<_> = r.symbols().into_iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["x#1", "y"]);
    }
}
