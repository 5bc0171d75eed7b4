//! Predicate abstraction.
//!
//! Every row is a candidate predicate; the value says which candidates are
//! selected. Candidates are tried one at a time, in row order: the
//! candidate is assumed in the pre-state together with everything selected
//! so far, and checked in the post-state. If no transition violates it, it
//! is selected for good. A rejected candidate is retried after a round in
//! which something else got selected, since the stronger pre-state may make
//! it inductive.

use std::collections::BTreeSet;
use std::mem;

use log::{debug, warn};

use crate::domains::{over_vars, RowExpr, TemplateDomain, TemplateRow, VarKind, VarSpec};
use crate::error::SolverError;
use crate::expr::{conjunction, Expr, Symbol, Valuation};
use crate::options::AnalysisConfig;

/// Per row: selected or not.
pub type PredicateValue = Vec<bool>;

/// Predicate abstraction over candidate rows.
///
/// A value selects the rows that hold. Candidates are tried one at a
/// time from two worklists: untried rows and rows refuted in an earlier
/// round, which are retried after a round that committed something.
#[derive(Debug, Clone)]
pub struct PredicateDomain {
    number: usize,
    rows: Vec<TemplateRow>,
    refinement_level: u32,
    max_refinement: u32,
    todo_preds: BTreeSet<usize>,
    todo_notpreds: BTreeSet<usize>,
    current: Option<usize>,
    committed_this_round: bool,
}

impl PredicateDomain {
    /// Empty domain at refinement level 0.
    pub fn new(number: usize, config: &AnalysisConfig) -> Self {
        Self {
            number,
            rows: Vec::new(),
            refinement_level: 0,
            max_refinement: config.max_refinement,
            todo_preds: BTreeSet::new(),
            todo_notpreds: BTreeSet::new(),
            current: None,
            committed_this_round: false,
        }
    }

    /// Appends a row and returns its index.
    pub fn add_row(&mut self, row: TemplateRow) -> usize {
        self.rows.push(row);
        self.rows.len() - 1
    }

    /// Instantiates candidate predicates, written over program objects, for
    /// every group of specs (same kind and guards) that covers all their
    /// objects. Returns the number of rows added.
    pub fn add_candidates(&mut self, candidates: &[Expr], specs: &[VarSpec], tier: u32) -> usize {
        let mut groups: Vec<Vec<&VarSpec>> = Vec::new();
        for spec in specs {
            let group = groups.iter_mut().find(|g| {
                g[0].kind == spec.kind && g[0].pre_guard == spec.pre_guard && g[0].post_guard == spec.post_guard
            });
            match group {
                Some(g) => g.push(spec),
                None => groups.push(vec![spec]),
            }
        }

        let before = self.rows.len();
        for candidate in candidates {
            for group in &groups {
                let lookup = |s: &Symbol| group.iter().find(|spec| spec.object == *s).copied();
                if !candidate.symbols().iter().all(|s| lookup(s).is_some()) {
                    continue;
                }
                let pre = candidate.rename(|s| lookup(s).map(|spec| spec.var.clone()));
                let post = candidate.rename(|s| lookup(s).map(|spec| spec.post_var.clone()));
                let row = TemplateRow::predicate(
                    pre,
                    post,
                    group[0].pre_guard.clone(),
                    group[0].post_guard.clone(),
                    group[0].kind,
                )
                .with_tier(tier);
                self.add_row(row);
            }
        }
        self.rows.len() - before
    }

    /// Row currently under test.
    pub fn candidate(&self) -> Option<usize> {
        self.current
    }

    fn is_active(&self, row: usize) -> bool {
        self.rows[row].tier <= self.refinement_level
    }

    /// `selected => row`: the row's guarded predicate, or `true`.
    fn render(&self, row: usize, selected: bool, post: bool) -> Expr {
        let r = &self.rows[row];
        let (guard, expr) = match (&r.expr, post) {
            (RowExpr::Predicate { post, .. }, true) => (&r.post_guard, post),
            (RowExpr::Predicate { pre, .. }, false) => (&r.pre_guard, pre),
            (RowExpr::Ranking(_), _) => return Expr::TRUE,
        };
        Expr::bool(selected).implies(guard.clone().implies(expr.clone()))
    }
}

impl TemplateDomain for PredicateDomain {
    type Value = PredicateValue;

    fn domain_number(&self) -> usize {
        self.number
    }

    fn rows(&self) -> &[TemplateRow] {
        &self.rows
    }

    fn new_value(&self) -> PredicateValue {
        vec![false; self.rows.len()]
    }

    fn initialize_value(&mut self, value: &mut PredicateValue) {
        *value = self.new_value();
        self.todo_preds = (0..self.rows.len()).filter(|&r| self.is_active(r)).collect();
        self.todo_notpreds.clear();
        self.current = None;
        self.committed_this_round = false;
    }

    fn to_pre_constraints(&self, value: &PredicateValue) -> Expr {
        conjunction((0..self.rows.len()).filter(|&r| self.rows[r].is_assumed()).map(|r| {
            let selected = value[r] || self.current == Some(r);
            self.render(r, selected, false)
        }))
    }

    fn make_not_post_constraints(&self, _value: &PredicateValue) -> Vec<Expr> {
        (0..self.rows.len())
            .map(|r| match (&self.rows[r].expr, self.current == Some(r) && self.rows[r].is_checked()) {
                (RowExpr::Predicate { post, .. }, true) => self.rows[r].post_guard.clone().and(post.clone().not()),
                _ => Expr::FALSE,
            })
            .collect()
    }

    fn edit_row(&mut self, _model: &dyn Valuation, _value: &mut PredicateValue, row: usize) -> Result<bool, SolverError> {
        if self.current != Some(row) {
            return Ok(false);
        }
        debug!("predicate {} rejected: {}", row, self.rows[row]);
        self.current = None;
        self.todo_preds.remove(&row);
        self.todo_notpreds.insert(row);
        Ok(true)
    }

    fn handle_unsat(&mut self, value: &mut PredicateValue) -> bool {
        let Some(row) = self.current.take() else {
            return false;
        };
        debug!("predicate {} selected: {}", row, self.rows[row]);
        self.todo_preds.remove(&row);
        value[row] = true;
        self.committed_this_round = true;
        true
    }

    fn handle_unknown(&mut self, _value: &mut PredicateValue) -> bool {
        if let Some(row) = self.current.take() {
            warn!("solver could not decide predicate {}, dropping it", row);
            self.todo_preds.remove(&row);
        }
        true
    }

    fn has_something_to_solve(&self) -> bool {
        !self.todo_preds.is_empty()
    }

    fn init_value_solver_iteration(&mut self, _value: &PredicateValue) {
        self.current = self.todo_preds.first().copied();
    }

    fn finalize_solver_iteration(&mut self) {
        self.current = None;
        if self.todo_preds.is_empty() && self.committed_this_round {
            self.todo_preds = mem::take(&mut self.todo_notpreds);
            self.committed_this_round = false;
        }
    }

    fn needs_refinement(&self, _value: &PredicateValue) -> bool {
        self.refinement_level < self.max_refinement && self.rows.iter().any(|r| r.tier > self.refinement_level)
    }

    fn refine(&mut self) -> bool {
        if self.refinement_level >= self.max_refinement {
            return false;
        }
        self.refinement_level += 1;
        debug!("predicate domain {} refined to level {}", self.number, self.refinement_level);
        true
    }

    fn refinement_level(&self) -> u32 {
        self.refinement_level
    }

    fn project_on_vars(&self, value: &PredicateValue, vars: &BTreeSet<Symbol>) -> Expr {
        conjunction((0..self.rows.len()).filter(|&r| value[r]).filter_map(|r| {
            let row = &self.rows[r];
            let RowExpr::Predicate { pre, post } = &row.expr else {
                return None;
            };
            let observed = if row.kind == VarKind::Out { post } else { pre };
            over_vars(observed, vars).then(|| self.render(r, true, row.kind == VarKind::Out))
        }))
    }
}
