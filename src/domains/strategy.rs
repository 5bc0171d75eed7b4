//! Counterexample-guided Kleene iteration.

use log::{debug, trace};

use crate::domains::TemplateDomain;
use crate::error::SolverError;
use crate::expr::{disjunction, Expr, Symbol};
use crate::naming::Name;
use crate::solver::{SolveResult, Solver};

/// Drives a template domain to a fixpoint with queries to the function's
/// solver session. The session must already hold the SSA formulas; every
/// query runs in its own scope, so the session is left as it was found.
pub struct StrategySolver<'a, S: Solver, D: TemplateDomain> {
    solver: &'a mut S,
    domain: &'a mut D,
    iterations: usize,
    unknown_answers: usize,
}

impl<'a, S: Solver, D: TemplateDomain> StrategySolver<'a, S, D> {
    /// Borrows the function's solver session and the domain for the
    /// duration of a fixpoint computation.
    pub fn new(solver: &'a mut S, domain: &'a mut D) -> Self {
        Self {
            solver,
            domain,
            iterations: 0,
            unknown_answers: 0,
        }
    }

    /// Solver queries issued so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Queries the solver could not decide.
    pub fn unknown_answers(&self) -> usize {
        self.unknown_answers
    }

    /// One Kleene step. Returns whether the value (or the domain's
    /// iteration state) changed.
    pub fn iterate(&mut self, value: &mut D::Value) -> Result<bool, SolverError> {
        self.iterations += 1;
        self.solver.push();
        let result = self.query(value);
        let popped = self.solver.pop();
        let improved = result?;
        popped?;
        Ok(improved)
    }

    fn query(&mut self, value: &mut D::Value) -> Result<bool, SolverError> {
        let pre = self.domain.to_pre_constraints(value);
        trace!("pre: {}", pre);
        self.solver.assert(&pre);

        let number = self.domain.domain_number();
        let mut literals: Vec<(usize, Symbol)> = Vec::new();
        for (row, not_post) in self.domain.make_not_post_constraints(value).into_iter().enumerate() {
            if not_post.is_false() {
                continue;
            }
            trace!("not post {}: {}", row, not_post);
            let literal = Name::StrategyCond { domain: number, row }.bool();
            self.solver.assert(&Expr::var(literal.clone()).equal(not_post));
            literals.push((row, literal));
        }

        if literals.is_empty() {
            trace!("no row can be violated");
            return Ok(self.domain.handle_unsat(value));
        }
        self.solver
            .assert(&disjunction(literals.iter().map(|(_, l)| Expr::var(l.clone()))));

        match self.solver.solve()? {
            SolveResult::Sat => {
                let mut improved = false;
                for (row, literal) in &literals {
                    if self.solver.bool_value(literal) == Some(true) {
                        trace!("row {} violated", row);
                        improved |= self.domain.edit_row(&*self.solver, value, *row)?;
                    }
                }
                Ok(improved)
            }
            SolveResult::Unsat => Ok(self.domain.handle_unsat(value)),
            SolveResult::Unknown => {
                self.unknown_answers += 1;
                Ok(self.domain.handle_unknown(value))
            }
        }
    }

    /// Iterates while the domain has work and the last step changed
    /// something.
    pub fn fixpoint(&mut self, value: &mut D::Value) -> Result<(), SolverError> {
        while self.domain.has_something_to_solve() {
            self.domain.init_value_solver_iteration(value);
            let improved = self.iterate(value);
            self.domain.finalize_solver_iteration();
            if !improved? {
                break;
            }
        }
        debug!(
            "domain {}: fixpoint after {} iterations",
            self.domain.domain_number(),
            self.iterations
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_log::test;

    use super::*;
    use crate::domains::{PredicateDomain, RankingDomain, RankingRowValue, VarKind, VarSpec};
    use crate::domains::{PrePost, TemplateRow};
    use crate::expr::{Valuation, Value};
    use crate::options::AnalysisConfig;
    use crate::solver::tests::{ScriptedFactory, ScriptedSolver};
    use crate::solver::SolverFactory;

    fn predicates() -> PredicateDomain {
        let x = Symbol::int("x");
        let spec = VarSpec {
            object: x.clone(),
            var: Symbol::int("x#lb3"),
            post_var: Symbol::int("x#2"),
            pre_guard: Expr::var(Symbol::bool("$guard#ls3")),
            post_guard: Expr::var(Symbol::bool("$guard#3")),
            kind: VarKind::Loop,
        };
        let mut d = PredicateDomain::new(0, &AnalysisConfig::default());
        let candidates = [Expr::var(x.clone()).ge(Expr::int(0)), Expr::var(x).le(Expr::int(5))];
        d.add_candidates(&candidates, &[spec], 0);
        d
    }

    #[test]
    fn test_predicate_fixpoint() {
        let mut solver = ScriptedSolver {
            verdicts: vec![SolveResult::Unsat, SolveResult::Sat, SolveResult::Sat],
            model: HashMap::from([(Symbol::bool("$tpl#0.cond1"), Value::Bool(true))]),
            ..Default::default()
        };
        let mut domain = predicates();
        let mut value = domain.new_value();
        domain.initialize_value(&mut value);

        let mut strategy = StrategySolver::new(&mut solver, &mut domain);
        strategy.fixpoint(&mut value).unwrap();
        assert_eq!(strategy.iterations(), 3);
        assert_eq!(strategy.unknown_answers(), 0);

        assert_eq!(value, vec![true, false]);
        assert_eq!(solver.calls, 3);
        assert!(solver.scopes.is_empty());
        assert!(solver.asserted.is_empty());
    }

    #[test]
    fn test_query_shape() {
        let mut solver = ScriptedSolver {
            verdicts: vec![SolveResult::Unsat],
            ..Default::default()
        };
        solver.assert(&Expr::var(Symbol::bool("ssa")));
        let mut domain = predicates();
        let mut value = domain.new_value();
        domain.initialize_value(&mut value);
        domain.init_value_solver_iteration(&value);

        // Keep the scope open to look at the query.
        solver.push();
        let mut strategy = StrategySolver::new(&mut solver, &mut domain);
        assert_eq!(strategy.query(&mut value), Ok(true));
        let asserted: Vec<String> = solver.asserted.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            asserted,
            [
                "ssa",
                "($guard#ls3 => (x#lb3 >= 0))",
                "($tpl#0.cond0 == ($guard#3 && !(x#2 >= 0)))",
                "$tpl#0.cond0",
            ]
        );
        solver.pop().unwrap();
        assert_eq!(solver.asserted.len(), 1);
    }

    #[test]
    fn test_nothing_to_violate_skips_solver() {
        let mut solver = ScriptedSolver::default();
        let mut domain = PredicateDomain::new(0, &AnalysisConfig::default());
        domain.add_row(TemplateRow::predicate(
            Expr::var(Symbol::int("x#in")).ge(Expr::int(0)),
            Expr::var(Symbol::int("x#in")).ge(Expr::int(0)),
            Expr::TRUE,
            Expr::TRUE,
            VarKind::In,
        ));
        let mut value = domain.new_value();
        domain.initialize_value(&mut value);

        StrategySolver::new(&mut solver, &mut domain).fixpoint(&mut value).unwrap();
        assert_eq!(value, vec![true]);
        assert_eq!(solver.calls, 0);
    }

    #[test]
    fn test_ranking_unknown_stops() {
        let factory = ScriptedFactory::default();
        let mut solver = factory.allocate(false);
        let mut domain = RankingDomain::new(0, factory, &AnalysisConfig::default());
        domain.add_row(TemplateRow::ranking(
            vec![PrePost::new(Symbol::int("x#lb2"), Symbol::int("x#1"))],
            Expr::var(Symbol::bool("$guard#ls2")),
            Expr::var(Symbol::bool("$guard#2")),
        ));
        let mut value = domain.new_value();
        domain.initialize_value(&mut value);

        let mut strategy = StrategySolver::new(&mut solver, &mut domain);
        strategy.fixpoint(&mut value).unwrap();
        assert_eq!(strategy.iterations(), 1);
        assert_eq!(strategy.unknown_answers(), 1);
        assert_eq!(value, vec![RankingRowValue::Bottom]);
        assert!(!domain.has_something_to_solve());
    }

    struct FailingSolver {
        depth: usize,
    }

    impl Valuation for FailingSolver {
        fn value(&self, _symbol: &Symbol) -> Option<Value> {
            None
        }
    }

    impl Solver for FailingSolver {
        fn assert(&mut self, _formula: &Expr) {}

        fn push(&mut self) {
            self.depth += 1;
        }

        fn pop(&mut self) -> Result<(), SolverError> {
            self.depth -= 1;
            Ok(())
        }

        fn solve(&mut self) -> Result<SolveResult, SolverError> {
            Err(SolverError::Backend("out of memory".to_string()))
        }
    }

    #[test]
    fn test_backend_failure_closes_scope() {
        let mut solver = FailingSolver { depth: 0 };
        let mut domain = predicates();
        let mut value = domain.new_value();
        domain.initialize_value(&mut value);

        let result = StrategySolver::new(&mut solver, &mut domain).fixpoint(&mut value);
        assert_eq!(result, Err(SolverError::Backend("out of memory".to_string())));
        assert_eq!(solver.depth, 0);
        assert_eq!(domain.candidate(), None);
    }
}
