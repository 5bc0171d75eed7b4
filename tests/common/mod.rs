//! A bounded enumerative solver for integration tests.
//!
//! Integers range over `[-BOUND, BOUND]`, so UNSAT means "no model within
//! the bounds". Equalities `v == rhs` whose left side is a symbol not yet
//! defined become definitions: `v` is computed from `rhs` instead of being
//! enumerated. The SSA and strategy queries are almost entirely made of
//! such definitions. The search only branches on symbols some undecided
//! constraint depends on, so inputs on paths that are not taken are never
//! enumerated.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};

use templ_rs::error::SolverError;
use templ_rs::expr::{Expr, Sort, Symbol, Valuation, Value};
use templ_rs::solver::{SolveResult, Solver, SolverFactory};

pub const BOUND: i64 = 16;

#[derive(Debug, Default)]
pub struct EnumSolver {
    formulas: Vec<Expr>,
    scopes: Vec<usize>,
    model: HashMap<Symbol, Value>,
    pub queries: usize,
}

impl EnumSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn formula_count(&self) -> usize {
        self.formulas.len()
    }
}

impl Valuation for EnumSolver {
    fn value(&self, symbol: &Symbol) -> Option<Value> {
        self.model.get(symbol).copied()
    }
}

impl Solver for EnumSolver {
    fn assert(&mut self, formula: &Expr) {
        match formula {
            Expr::And(parts) => parts.iter().for_each(|p| self.assert(p)),
            f => self.formulas.push(f.clone()),
        }
    }

    fn push(&mut self) {
        self.scopes.push(self.formulas.len());
    }

    fn pop(&mut self) -> Result<(), SolverError> {
        let mark = self.scopes.pop().ok_or(SolverError::ScopeUnderflow)?;
        self.formulas.truncate(mark);
        Ok(())
    }

    fn solve(&mut self) -> Result<SolveResult, SolverError> {
        self.queries += 1;
        self.model.clear();

        let mut defined = HashSet::new();
        let mut defs = Vec::new();
        let mut constraints = Vec::new();
        for f in &self.formulas {
            if let Expr::Eq(lhs, rhs) = f {
                if let Expr::Var(v) = lhs.as_ref() {
                    if !defined.contains(v) && !rhs.symbols().contains(v) {
                        defined.insert(v.clone());
                        defs.push((v.clone(), rhs.as_ref().clone()));
                        continue;
                    }
                }
            }
            constraints.push(f.clone());
        }

        let mut seen = BTreeSet::new();
        let mut free = Vec::new();
        for f in &self.formulas {
            for s in f.symbols() {
                if !defined.contains(&s) && seen.insert(s.clone()) {
                    free.push(s);
                }
            }
        }

        let mut valuation = HashMap::new();
        let problem = Problem {
            free: &free,
            defs: &defs,
            constraints: &constraints,
        };
        if problem.search(&mut valuation) {
            self.model = valuation;
            Ok(SolveResult::Sat)
        } else {
            Ok(SolveResult::Unsat)
        }
    }
}

struct Problem<'a> {
    free: &'a [Symbol],
    defs: &'a [(Symbol, Expr)],
    constraints: &'a [Expr],
}

impl Problem<'_> {
    fn search(&self, valuation: &mut HashMap<Symbol, Value>) -> bool {
        let derived = self.propagate(valuation);
        let mut undecided = None;
        let mut conflict = false;
        for c in self.constraints {
            match c.eval(&*valuation) {
                Some(Value::Bool(false)) => {
                    conflict = true;
                    break;
                }
                Some(_) => {}
                None => {
                    undecided.get_or_insert(c);
                }
            }
        }

        let found = match (conflict, undecided) {
            (true, _) => false,
            (false, None) => {
                self.complete(valuation);
                true
            }
            (false, Some(c)) => match self.branch_var(c, valuation) {
                Some(var) => candidates(var.sort()).into_iter().any(|value| {
                    valuation.insert(var.clone(), value);
                    let found = self.search(valuation);
                    if !found {
                        valuation.remove(&var);
                    }
                    found
                }),
                None => false,
            },
        };
        if !found {
            for s in derived {
                valuation.remove(&s);
            }
        }
        found
    }

    /// An unassigned free symbol the value of `expr` depends on, looking
    /// through definitions that cannot be computed yet and skipping
    /// subterms whose value is already known.
    fn branch_var(&self, expr: &Expr, valuation: &HashMap<Symbol, Value>) -> Option<Symbol> {
        self.unknown_leaf(expr, valuation, &mut HashSet::new())
    }

    fn unknown_leaf(&self, e: &Expr, valuation: &HashMap<Symbol, Value>, visited: &mut HashSet<Symbol>) -> Option<Symbol> {
        if e.eval(valuation).is_some() {
            return None;
        }
        match e {
            Expr::Var(s) => {
                if !visited.insert(s.clone()) {
                    return None;
                }
                match self.defs.iter().find(|(var, _)| var == s) {
                    Some((_, rhs)) => self.unknown_leaf(rhs, valuation, visited),
                    None => Some(s.clone()),
                }
            }
            Expr::Ite(c, a, b) => match c.eval(valuation) {
                Some(Value::Bool(true)) => self.unknown_leaf(a, valuation, visited),
                Some(Value::Bool(false)) => self.unknown_leaf(b, valuation, visited),
                _ => self.unknown_leaf(c, valuation, visited),
            },
            _ => e
                .children()
                .into_iter()
                .find_map(|child| self.unknown_leaf(child, valuation, visited)),
        }
    }

    /// Gives the free symbols nobody asked about their first value.
    fn complete(&self, valuation: &mut HashMap<Symbol, Value>) {
        for var in self.free {
            if !valuation.contains_key(var) {
                valuation.insert(var.clone(), candidates(var.sort())[0]);
            }
        }
        self.propagate(valuation);
    }

    /// Computes every definition whose right side is known.
    fn propagate(&self, valuation: &mut HashMap<Symbol, Value>) -> Vec<Symbol> {
        let mut derived = Vec::new();
        loop {
            let mut changed = false;
            for (var, rhs) in self.defs {
                if valuation.contains_key(var) {
                    continue;
                }
                if let Some(value) = rhs.eval(&*valuation) {
                    valuation.insert(var.clone(), value);
                    derived.push(var.clone());
                    changed = true;
                }
            }
            if !changed {
                return derived;
            }
        }
    }
}

/// Small values first: `0, 1, -1, 2, -2, ...`.
fn candidates(sort: Sort) -> Vec<Value> {
    match sort {
        Sort::Bool => vec![Value::Bool(false), Value::Bool(true)],
        Sort::Int => std::iter::once(0)
            .chain((1..=BOUND).flat_map(|n| [n, -n]))
            .map(Value::Int)
            .collect(),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EnumFactory;

impl SolverFactory for EnumFactory {
    type Solver = EnumSolver;

    fn allocate(&self, _refine: bool) -> EnumSolver {
        EnumSolver::new()
    }
}

pub fn v(name: &str) -> Expr {
    Expr::var(Symbol::int(name))
}
