//! Variables for termination analysis.
//!
//! Only LOOP variables of integer sort that may change along the back edge
//! take part. A variable whose version at the back edge is still the head's
//! phi is never assigned on the way round and cannot decrease.

use log::debug;

use crate::domains::{PrePost, RankingDomain, TemplateDomain, TemplateRow, VarSpec};
use crate::expr::{Expr, Sort};
use crate::generators::TemplateGenerator;
use crate::options::AnalysisConfig;
use crate::solver::SolverFactory;
use crate::ssa::{LocalSsa, Loop};

/// Variables a ranking function may range over: integer LOOP variables
/// that actually change along the back edge.
#[derive(Debug, Clone)]
pub struct RankingGenerator {
    base: TemplateGenerator,
    /// Per back edge: the loop, its guards and the indices of its specs.
    loops: Vec<(Loop, Expr, Expr, Vec<usize>)>,
}

impl RankingGenerator {
    /// Collects the rankable variables of every loop of `ssa`. A loop
    /// without any still gets a row in [`domain`](Self::domain).
    pub fn new(ssa: &LocalSsa) -> Self {
        let mut base = TemplateGenerator::new();
        let mut loops = Vec::new();
        for l in ssa.loops() {
            let (pre_guard, post_guard) = TemplateGenerator::loop_guards(ssa, l, true);
            let mut indices = Vec::new();
            for spec in TemplateGenerator::loop_specs(ssa, l, true) {
                if spec.var.sort() != Sort::Int {
                    debug!("ranking: skipping non-numeric {}", spec.object);
                    continue;
                }
                if spec.post_var == ssa.phi_symbol(&spec.object, l.head) {
                    debug!("ranking: skipping {}, unchanged along {}", spec.object, l.back_edge);
                    continue;
                }
                indices.push(base.var_specs().len());
                base.add_spec(spec);
            }
            loops.push((*l, pre_guard, post_guard, indices));
        }
        Self { base, loops }
    }

    pub fn var_specs(&self) -> &[VarSpec] {
        self.base.var_specs()
    }

    /// Ranking domain with one row per back edge.
    pub fn domain<F: SolverFactory>(&self, number: usize, factory: F, config: &AnalysisConfig) -> RankingDomain<F> {
        let mut domain = RankingDomain::new(number, factory, config);
        for (l, pre_guard, post_guard, indices) in &self.loops {
            let vars = indices
                .iter()
                .map(|&i| {
                    let spec = &self.var_specs()[i];
                    PrePost::new(&spec.var, &spec.post_var)
                })
                .collect();
            let row = domain.add_row(TemplateRow::ranking(vars, pre_guard.clone(), post_guard.clone()));
            debug!(
                "ranking row {} for the loop {} -> {}: {}",
                row,
                l.back_edge,
                l.head,
                domain.rows()[row]
            );
        }
        domain
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::domains::RowExpr;
    use crate::expr::Symbol;
    use crate::goto::{GotoFunction, Instruction, SymbolTable};
    use crate::solver::tests::ScriptedFactory;

    fn v(name: &str) -> Expr {
        Expr::var(Symbol::int(name))
    }

    #[test]
    fn test_filters_candidates() {
        // while (x > 0) { if (b) x = x - 1; else b = true; }
        let (x, b) = (Symbol::int("x"), Symbol::bool("b"));
        let function = GotoFunction::new(
            vec![x.clone(), b.clone()],
            vec![
                Instruction::goto_if(v("x").le(Expr::int(0)), 6),
                Instruction::goto_if(Expr::var(b.clone()).not(), 4),
                Instruction::assign(x, v("x").sub(Expr::int(1))),
                Instruction::goto(5),
                Instruction::assign(b, Expr::TRUE),
                Instruction::goto(0),
                Instruction::EndFunction,
            ],
        );
        let ssa = LocalSsa::build("f", &function, &SymbolTable::new()).unwrap();
        let generator = RankingGenerator::new(&ssa);

        let objects: Vec<String> = generator.var_specs().iter().map(|s| s.object.to_string()).collect();
        assert_eq!(objects, ["x"]);

        let domain = generator.domain(1, ScriptedFactory::default(), &AnalysisConfig::default());
        assert_eq!(domain.rows().len(), 1);
        match &domain.rows()[0].expr {
            RowExpr::Ranking(vars) => {
                assert_eq!(vars.len(), 1);
                assert_eq!(vars[0].pre, v("x#lb5"));
            }
            other => panic!("unexpected row {:?}", other),
        }
    }

    #[test]
    fn test_loop_without_variables() {
        // while (true) {}
        let function = GotoFunction::new(vec![], vec![Instruction::Skip, Instruction::goto(0), Instruction::EndFunction]);
        let ssa = LocalSsa::build("f", &function, &SymbolTable::new()).unwrap();
        let generator = RankingGenerator::new(&ssa);
        assert!(generator.var_specs().is_empty());
        let domain = generator.domain(0, ScriptedFactory::default(), &AnalysisConfig::default());
        assert_eq!(domain.rows().len(), 1);
        assert_eq!(domain.rows()[0].to_string(), "(LOOP) ($guard#0 && $guard#ls1) && $guard#1 ==> rank()");
    }
}
