//! Template generators.
//!
//! A generator decides which variables a template talks about and under
//! which guards. The result is a list of [`VarSpec`]s, from which the
//! domains build their rows.

use std::collections::BTreeSet;

use log::trace;

use crate::domains::{VarKind, VarSpec};
use crate::expr::{Expr, Symbol};
use crate::naming::base_name;
use crate::ssa::{LocalSsa, Loop};

pub mod ranking;
pub mod summary;

pub use ranking::RankingGenerator;
pub use summary::SummaryGenerator;

/// Collected variable specs, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct TemplateGenerator {
    specs: Vec<VarSpec>,
}

impl TemplateGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn var_specs(&self) -> &[VarSpec] {
        &self.specs
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Adds entry or exit variables: the observed version is both the pre
    /// and the post symbol.
    pub fn add_vars<'s, I>(&mut self, vars: I, pre_guard: &Expr, post_guard: &Expr, kind: VarKind)
    where
        I: IntoIterator<Item = &'s Symbol>,
    {
        for var in vars {
            let spec = VarSpec {
                object: Symbol::new(base_name(var), var.sort()),
                var: var.clone(),
                post_var: var.clone(),
                pre_guard: pre_guard.clone(),
                post_guard: post_guard.clone(),
                kind,
            };
            trace!("{} {}", kind, spec.var);
            self.specs.push(spec);
        }
    }

    /// Adds a spec as is, for generators that filter the LOOP variables.
    pub fn add_spec(&mut self, spec: VarSpec) {
        self.specs.push(spec);
    }

    /// LOOP variables of every loop, in back-edge order.
    pub fn collect_variables_loop(&mut self, ssa: &LocalSsa, forward: bool) {
        for l in ssa.loops() {
            self.specs.extend(Self::loop_specs(ssa, l, forward));
        }
    }

    /// Guards of the transition from the loop head around `l` back to the
    /// head: entering with the loop-back values, leaving over the back
    /// edge.
    pub fn loop_guards(ssa: &LocalSsa, l: &Loop, forward: bool) -> (Expr, Expr) {
        let pre = Expr::var(ssa.guard_symbol(l.head)).and(Expr::var(ssa.loop_select(l.back_edge)));
        let post = ssa.edge_guard(l.back_edge, l.head);
        if forward {
            (pre, post)
        } else {
            (post, pre)
        }
    }

    /// One spec per object merged at the head of `l`: the loop-back
    /// version before, the version reaching the back edge after.
    pub fn loop_specs(ssa: &LocalSsa, l: &Loop, forward: bool) -> Vec<VarSpec> {
        let (pre_guard, post_guard) = Self::loop_guards(ssa, l, forward);
        ssa.phi_objects(l.head)
            .into_iter()
            .filter_map(|object| {
                let before = ssa.loop_back(&object, l.back_edge);
                let after = ssa.read_out(object.name(), l.back_edge)?;
                let (var, post_var) = if forward { (before, after) } else { (after, before) };
                Some(VarSpec {
                    object,
                    var,
                    post_var,
                    pre_guard: pre_guard.clone(),
                    post_guard: post_guard.clone(),
                    kind: VarKind::Loop,
                })
            })
            .collect()
    }

    /// Specs of the given kinds.
    pub fn filter(&self, kinds: &[VarKind]) -> Vec<&VarSpec> {
        self.specs.iter().filter(|s| kinds.contains(&s.kind)).collect()
    }

    /// Every pre and post symbol.
    pub fn vars(&self) -> BTreeSet<Symbol> {
        self.specs
            .iter()
            .flat_map(|s| [s.var.clone(), s.post_var.clone()])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::goto::{GotoFunction, Instruction, SymbolTable};

    fn v(name: &str) -> Expr {
        Expr::var(Symbol::int(name))
    }

    /// `y = 0; while (x > 0) { x = x - 1; y = y + 1; }`
    fn ssa() -> LocalSsa {
        let (x, y) = (Symbol::int("x"), Symbol::int("y"));
        let function = GotoFunction::new(
            vec![x.clone()],
            vec![
                Instruction::assign(y.clone(), Expr::int(0)),
                Instruction::goto_if(v("x").le(Expr::int(0)), 5),
                Instruction::assign(x, v("x").sub(Expr::int(1))),
                Instruction::assign(y, v("y").add(Expr::int(1))),
                Instruction::goto(1),
                Instruction::EndFunction,
            ],
        );
        LocalSsa::build("f", &function, &SymbolTable::new()).unwrap()
    }

    #[test]
    fn test_loop_variables() {
        let ssa = ssa();
        let mut generator = TemplateGenerator::new();
        generator.collect_variables_loop(&ssa, true);

        let specs = generator.var_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].object, Symbol::int("x"));
        assert_eq!(specs[0].var, Symbol::int("x#lb4"));
        assert_eq!(specs[0].post_var, Symbol::int("x#2"));
        assert_eq!(specs[1].post_var, Symbol::int("y#3"));
        assert_eq!(specs[0].pre_guard.to_string(), "($guard#1 && $guard#ls4)");
        assert_eq!(specs[0].post_guard.to_string(), "$guard#4");
        assert!(specs.iter().all(|s| s.kind == VarKind::Loop));
        assert_eq!(generator.vars().len(), 4);
    }

    #[test]
    fn test_backward_swaps() {
        let ssa = ssa();
        let mut generator = TemplateGenerator::new();
        generator.collect_variables_loop(&ssa, false);
        let spec = &generator.var_specs()[0];
        assert_eq!(spec.var, Symbol::int("x#2"));
        assert_eq!(spec.post_var, Symbol::int("x#lb4"));
        assert_eq!(spec.pre_guard.to_string(), "$guard#4");
    }

    #[test]
    fn test_add_vars() {
        let mut generator = TemplateGenerator::new();
        let guard = Expr::var(Symbol::bool("$guard#0"));
        let vars = [Symbol::int("x#in"), Symbol::int("$return_value#3")];
        generator.add_vars(&vars, &guard, &guard, VarKind::In);
        assert_eq!(generator.var_specs()[1].object, Symbol::int("$return_value"));
        assert_eq!(generator.filter(&[VarKind::In]).len(), 2);
        assert!(generator.filter(&[VarKind::Out, VarKind::Loop]).is_empty());
    }
}
