//! Lexicographic linear ranking functions.
//!
//! One row per loop back edge. A row value is a tuple of linear functions
//! `f_0, ..., f_m` over the loop-carried variables, without constant terms.
//! It ranks a transition `pre -> post` if for some component `j` all
//! earlier components stay equal, `f_j` strictly decreases and `f_j(pre)`
//! is non-negative.
//!
//! The outer session looks for a transition the current tuple does not
//! rank. Each such counterexample becomes a constraint over the
//! coefficients, collected in an inner session private to the row; a model
//! of the inner session is the next candidate tuple. When the inner session
//! runs dry, or the domain-wide inner iteration budget is spent, the row
//! becomes unknown and the driver may refine to more components. An inner
//! session that cannot decide also leaves the row unknown, and the answer
//! is counted so the analysis reports `Unknown` rather than `Exhausted`.

use std::collections::BTreeSet;

use log::{debug, warn};

use crate::domains::{over_vars, PrePost, RowExpr, TemplateDomain, TemplateRow};
use crate::error::SolverError;
use crate::expr::{conjunction, disjunction, Expr, Symbol, Valuation, Value};
use crate::naming::Name;
use crate::options::AnalysisConfig;
use crate::solver::{SolveResult, Solver, SolverFactory};

/// Value of one ranking row.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum RankingRowValue {
    /// No transition seen yet.
    Bottom,
    /// Coefficients per component, then per variable.
    Lexicographic(Vec<Vec<i64>>),
    /// No ranking function found within the current bounds.
    Unknown,
}

/// Per row, in row order.
pub type RankingValue = Vec<RankingRowValue>;

/// Lexicographic linear ranking functions, one per back edge.
///
/// Every row owns an inner solver session, created from the factory on
/// first use, that searches coefficients excluding all counterexample
/// transitions seen so far. Refinement adds a lexicographic component
/// and drops the inner sessions.
pub struct RankingDomain<F: SolverFactory> {
    number: usize,
    rows: Vec<TemplateRow>,
    factory: F,
    inner: Vec<Option<F::Solver>>,
    inner_iterations: u32,
    max_inner_iterations: u32,
    refinement_level: u32,
    max_elements: u32,
    done: bool,
    /// Inner queries answered `Unknown`; survives refinement.
    inner_unknown: usize,
}

impl<F: SolverFactory> RankingDomain<F> {
    /// Empty domain with one component. The component and inner-iteration
    /// bounds come from `config`; at least one component is always allowed.
    pub fn new(number: usize, factory: F, config: &AnalysisConfig) -> Self {
        Self {
            number,
            rows: Vec::new(),
            factory,
            inner: Vec::new(),
            inner_iterations: 0,
            max_inner_iterations: config.max_inner_ranking_iterations,
            refinement_level: 0,
            max_elements: config.max_ranking_components.max(1),
            done: false,
            inner_unknown: 0,
        }
    }

    /// Appends a row and returns its index.
    ///
    /// Rows are expected to be [`RowExpr::Ranking`]; a predicate row is
    /// treated as ranging over no variables.
    pub fn add_row(&mut self, row: TemplateRow) -> usize {
        self.rows.push(row);
        self.inner.push(None);
        self.rows.len() - 1
    }

    /// Lexicographic components searched at the current refinement level.
    pub fn components(&self) -> usize {
        self.refinement_level as usize + 1
    }

    /// Inner queries asked since the last refinement.
    pub fn inner_iterations(&self) -> u32 {
        self.inner_iterations
    }

    fn vars(&self, row: usize) -> &[PrePost] {
        match &self.rows[row].expr {
            RowExpr::Ranking(vars) => vars,
            RowExpr::Predicate { .. } => &[],
        }
    }

    /// The components of every row over its pre-state variables; `None`
    /// for rows without a ranking function.
    pub fn ranking_functions(&self, value: &RankingValue) -> Vec<Option<Vec<Expr>>> {
        (0..self.rows.len())
            .map(|row| match &value[row] {
                RankingRowValue::Lexicographic(coeffs) => Some(
                    coeffs
                        .iter()
                        .map(|c| linear(c, self.vars(row).iter().map(|v| &v.pre)))
                        .collect(),
                ),
                _ => None,
            })
            .collect()
    }

    /// The transition of `row` is ranked by `coeffs`.
    fn lex_decrease(&self, row: usize, coeffs: &[Vec<i64>]) -> Expr {
        let vars = self.vars(row);
        let pre = |c: &[i64]| linear(c, vars.iter().map(|v| &v.pre));
        let post = |c: &[i64]| linear(c, vars.iter().map(|v| &v.post));
        disjunction((0..coeffs.len()).map(|j| {
            let equal_before = (0..j).map(|i| pre(&coeffs[i][..]).equal(post(&coeffs[i][..])));
            let decrease = pre(&coeffs[j][..]).gt(post(&coeffs[j][..]));
            let bounded = pre(&coeffs[j][..]).ge(Expr::int(0));
            conjunction(equal_before.chain([decrease, bounded]))
        }))
    }

    fn coefficient(&self, row: usize, component: usize, var: usize) -> Symbol {
        Name::Coefficient {
            domain: self.number,
            row,
            component,
            var,
        }
        .int()
    }

    /// Constraint over the coefficients of `row`: the candidate ranks the
    /// transition from `pre` to `post`.
    fn coefficient_constraint(&self, row: usize, pre: &[i64], post: &[i64]) -> Expr {
        let term = |j: usize, values: &[i64]| {
            values.iter().enumerate().fold(Expr::int(0), |acc, (k, &v)| {
                acc.add(Expr::var(self.coefficient(row, j, k)).mul(Expr::int(v)))
            })
        };
        let diff: Vec<i64> = pre.iter().zip(post).map(|(a, b)| a.wrapping_sub(*b)).collect();
        let delta = |j: usize| term(j, &diff);
        let bound = |j: usize| term(j, pre);
        disjunction((0..self.components()).map(|j| {
            let equal_before = (0..j).map(|i| delta(i).equal(Expr::int(0)));
            conjunction(equal_before.chain([delta(j).gt(Expr::int(0)), bound(j).ge(Expr::int(0))]))
        }))
    }
}

/// `sum c_k * e_k`, skipping zero coefficients.
fn linear<'e>(coeffs: &[i64], exprs: impl Iterator<Item = &'e Expr>) -> Expr {
    coeffs
        .iter()
        .zip(exprs)
        .fold(Expr::int(0), |acc, (&c, e)| acc.add(Expr::int(c).mul(e.clone())))
}

impl<F: SolverFactory> TemplateDomain for RankingDomain<F> {
    type Value = RankingValue;

    fn domain_number(&self) -> usize {
        self.number
    }

    fn rows(&self) -> &[TemplateRow] {
        &self.rows
    }

    fn new_value(&self) -> RankingValue {
        vec![RankingRowValue::Bottom; self.rows.len()]
    }

    fn initialize_value(&mut self, value: &mut RankingValue) {
        *value = self.new_value();
        self.done = false;
    }

    fn to_pre_constraints(&self, _value: &RankingValue) -> Expr {
        Expr::TRUE
    }

    fn make_not_post_constraints(&self, value: &RankingValue) -> Vec<Expr> {
        (0..self.rows.len())
            .map(|row| {
                let r = &self.rows[row];
                let transition = r.pre_guard.clone().and(r.post_guard.clone());
                match &value[row] {
                    RankingRowValue::Bottom => transition,
                    RankingRowValue::Unknown => Expr::FALSE,
                    RankingRowValue::Lexicographic(coeffs) => transition.and(self.lex_decrease(row, coeffs).not()),
                }
            })
            .collect()
    }

    fn edit_row(&mut self, model: &dyn Valuation, value: &mut RankingValue, row: usize) -> Result<bool, SolverError> {
        if self.inner_iterations >= self.max_inner_iterations {
            if value[row] == RankingRowValue::Unknown {
                return Ok(false);
            }
            warn!(
                "ranking row {} of domain {}: inner iteration budget of {} spent",
                row, self.number, self.max_inner_iterations
            );
            value[row] = RankingRowValue::Unknown;
            return Ok(true);
        }

        let read = |e: &Expr| e.eval(model).and_then(Value::as_int).unwrap_or(0);
        let pre: Vec<i64> = self.vars(row).iter().map(|v| read(&v.pre)).collect();
        let post: Vec<i64> = self.vars(row).iter().map(|v| read(&v.post)).collect();
        debug!("ranking row {}: counterexample {:?} -> {:?}", row, pre, post);

        let constraint = self.coefficient_constraint(row, &pre, &post);
        let coefficients: Vec<Vec<Symbol>> = (0..self.components())
            .map(|j| (0..pre.len()).map(|k| self.coefficient(row, j, k)).collect())
            .collect();

        let factory = &self.factory;
        let solver = self.inner[row].get_or_insert_with(|| factory.allocate(false));
        solver.assert(&constraint);
        self.inner_iterations += 1;

        match solver.solve()? {
            SolveResult::Sat => {
                let coeffs: Vec<Vec<i64>> = coefficients
                    .iter()
                    .map(|component| component.iter().map(|c| solver.int_value(c).unwrap_or(0)).collect())
                    .collect();
                debug!("ranking row {}: next candidate {:?}", row, coeffs);
                value[row] = RankingRowValue::Lexicographic(coeffs);
            }
            SolveResult::Unsat => {
                debug!("ranking row {}: no candidate with {} components", row, self.components());
                value[row] = RankingRowValue::Unknown;
            }
            SolveResult::Unknown => {
                warn!("ranking row {}: inner solver could not decide", row);
                self.inner_unknown += 1;
                value[row] = RankingRowValue::Unknown;
            }
        }
        Ok(true)
    }

    fn handle_unsat(&mut self, _value: &mut RankingValue) -> bool {
        self.done = true;
        false
    }

    fn handle_unknown(&mut self, _value: &mut RankingValue) -> bool {
        warn!("solver could not decide ranking domain {}", self.number);
        self.done = true;
        false
    }

    fn has_something_to_solve(&self) -> bool {
        !self.done
    }

    fn needs_refinement(&self, value: &RankingValue) -> bool {
        value.iter().any(|v| *v == RankingRowValue::Unknown)
    }

    fn refine(&mut self) -> bool {
        if self.refinement_level + 1 >= self.max_elements {
            return false;
        }
        self.refinement_level += 1;
        self.inner.iter_mut().for_each(|s| *s = None);
        self.inner_iterations = 0;
        debug!(
            "ranking domain {} refined to {} components",
            self.number,
            self.components()
        );
        true
    }

    fn refinement_level(&self) -> u32 {
        self.refinement_level
    }

    fn unknown_answers(&self) -> usize {
        self.inner_unknown
    }

    fn project_on_vars(&self, value: &RankingValue, vars: &BTreeSet<Symbol>) -> Expr {
        conjunction((0..self.rows.len()).filter_map(|row| {
            let RankingRowValue::Lexicographic(coeffs) = &value[row] else {
                return None;
            };
            if !self.vars(row).iter().all(|v| over_vars(&v.pre, vars)) {
                return None;
            }
            let r = &self.rows[row];
            Some(
                r.pre_guard
                    .clone()
                    .and(r.post_guard.clone())
                    .implies(self.lex_decrease(row, coeffs)),
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_log::test;

    use super::*;
    use crate::solver::tests::ScriptedFactory;

    fn row() -> TemplateRow {
        TemplateRow::ranking(
            vec![PrePost::new(Symbol::int("x#lb2"), Symbol::int("x#1"))],
            Expr::var(Symbol::bool("$guard#ls2")),
            Expr::var(Symbol::bool("$guard#2")),
        )
    }

    fn domain(factory: ScriptedFactory, config: AnalysisConfig) -> RankingDomain<ScriptedFactory> {
        let mut d = RankingDomain::new(0, factory, &config);
        d.add_row(row());
        d
    }

    fn counterexample() -> HashMap<Symbol, Value> {
        HashMap::from([
            (Symbol::int("x#lb2"), Value::Int(3)),
            (Symbol::int("x#1"), Value::Int(2)),
        ])
    }

    #[test]
    fn test_bottom_rows() {
        let mut d = domain(ScriptedFactory::default(), AnalysisConfig::default());
        let mut value = d.new_value();
        d.initialize_value(&mut value);
        assert_eq!(value, vec![RankingRowValue::Bottom]);
        assert_eq!(
            d.make_not_post_constraints(&value)[0].to_string(),
            "($guard#ls2 && $guard#2)"
        );
        assert_eq!(d.to_pre_constraints(&value), Expr::TRUE);
        assert_eq!(d.project_on_vars(&value, &BTreeSet::new()), Expr::TRUE);
        assert!(!d.needs_refinement(&value));
    }

    #[test]
    fn test_edit_row_takes_inner_model() {
        let factory = ScriptedFactory {
            verdicts: vec![SolveResult::Sat],
            model: HashMap::from([(Symbol::int("$tpl#0.c0.0.0"), Value::Int(1))]),
        };
        let mut d = domain(factory, AnalysisConfig::default());
        let mut value = d.new_value();
        d.initialize_value(&mut value);

        assert_eq!(d.edit_row(&counterexample(), &mut value, 0), Ok(true));
        assert_eq!(value[0], RankingRowValue::Lexicographic(vec![vec![1]]));
        assert_eq!(d.inner_iterations(), 1);
        let inner = d.inner[0].as_ref().unwrap();
        assert_eq!(
            inner.asserted[0].to_string(),
            "(($tpl#0.c0.0.0 > 0) && (($tpl#0.c0.0.0 * 3) >= 0))"
        );

        assert_eq!(
            d.make_not_post_constraints(&value)[0].to_string(),
            "($guard#ls2 && $guard#2 && !((x#lb2 > x#1) && (x#lb2 >= 0)))"
        );
        assert_eq!(
            d.ranking_functions(&value),
            vec![Some(vec![Expr::var(Symbol::int("x#lb2"))])]
        );
        assert!(!d.handle_unsat(&mut value));
        assert!(!d.has_something_to_solve());
    }

    #[test]
    fn test_inner_unsat_marks_unknown() {
        let factory = ScriptedFactory {
            verdicts: vec![SolveResult::Unsat],
            ..Default::default()
        };
        let mut d = domain(factory, AnalysisConfig::default());
        let mut value = d.new_value();
        d.initialize_value(&mut value);
        assert_eq!(d.edit_row(&counterexample(), &mut value, 0), Ok(true));
        assert_eq!(value[0], RankingRowValue::Unknown);
        assert_eq!(d.make_not_post_constraints(&value)[0], Expr::FALSE);
        assert!(d.needs_refinement(&value));
        assert_eq!(d.unknown_answers(), 0);
    }

    #[test]
    fn test_inner_unknown_is_counted() {
        let factory = ScriptedFactory {
            verdicts: vec![SolveResult::Unknown],
            ..Default::default()
        };
        let mut d = domain(factory, AnalysisConfig::default());
        let mut value = d.new_value();
        d.initialize_value(&mut value);
        assert_eq!(d.edit_row(&counterexample(), &mut value, 0), Ok(true));
        assert_eq!(value[0], RankingRowValue::Unknown);
        assert_eq!(d.unknown_answers(), 1);
        assert!(d.refine());
        assert_eq!(d.unknown_answers(), 1);
    }

    #[test]
    fn test_budget_exhausted() {
        let config = AnalysisConfig {
            max_inner_ranking_iterations: 0,
            max_ranking_components: 1,
            ..AnalysisConfig::default()
        };
        let mut d = domain(ScriptedFactory::default(), config);
        let mut value = d.new_value();
        d.initialize_value(&mut value);
        assert_eq!(d.edit_row(&counterexample(), &mut value, 0), Ok(true));
        assert_eq!(value[0], RankingRowValue::Unknown);
        assert!(d.inner[0].is_none());
        assert_eq!(d.edit_row(&counterexample(), &mut value, 0), Ok(false));
        assert!(!d.refine());
        assert_eq!(d.refinement_level(), 0);
    }

    #[test]
    fn test_refine_adds_component() {
        let config = AnalysisConfig {
            max_ranking_components: 2,
            ..AnalysisConfig::default()
        };
        let factory = ScriptedFactory {
            verdicts: vec![SolveResult::Unsat],
            ..Default::default()
        };
        let mut d = domain(factory, config);
        let mut value = d.new_value();
        d.initialize_value(&mut value);
        d.edit_row(&counterexample(), &mut value, 0).unwrap();

        assert!(d.refine());
        assert_eq!(d.components(), 2);
        assert_eq!(d.inner_iterations(), 0);
        assert!(d.inner[0].is_none());
        assert!(!d.refine());
        assert_eq!(d.refinement_level(), 1);

        // Two components: the second only counts where the first is level.
        let constraint = d.coefficient_constraint(0, &[3], &[2]).to_string();
        assert!(constraint.contains("($tpl#0.c0.0.0 == 0)"));
        assert!(constraint.contains("($tpl#0.c0.1.0 > 0)"));
    }
}
