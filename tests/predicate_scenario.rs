mod common;

use std::collections::BTreeSet;

use test_log::test;

use common::{v, EnumFactory};
use templ_rs::analysis::{analyze, AnalysisStatus};
use templ_rs::domains::TemplateDomain;
use templ_rs::expr::{Expr, Symbol};
use templ_rs::generators::SummaryGenerator;
use templ_rs::goto::{GotoFunction, Instruction, SymbolTable};
use templ_rs::options::{AnalysisConfig, Options};
use templ_rs::solver::{SolveResult, Solver};
use templ_rs::ssa::SsaStore;

/// `x = 0; while (x < 10) x = x + 1;`
fn count_up() -> GotoFunction {
    let x = Symbol::int("x");
    GotoFunction::new(
        vec![],
        vec![
            Instruction::assign(x.clone(), Expr::int(0)),
            Instruction::goto_if(v("x").ge(Expr::int(10)), 4),
            Instruction::assign(x, v("x").add(Expr::int(1))),
            Instruction::goto(1),
            Instruction::EndFunction,
        ],
    )
}

fn candidates() -> Vec<Expr> {
    vec![
        v("x").ge(Expr::int(0)),
        v("x").le(Expr::int(5)),
        v("x").le(Expr::int(10)),
    ]
}

#[test]
fn test_loop_invariant() {
    let mut store = SsaStore::new(EnumFactory, &Options::new());
    store.ensure("count_up", &count_up(), &SymbolTable::new()).unwrap();
    let generator = SummaryGenerator::new(store.get("count_up"), true);
    assert!(generator.inout_vars().is_empty());
    assert_eq!(generator.loop_vars().len(), 1);

    let mut domain = generator.predicate_domain(0, &candidates(), &AnalysisConfig::default());
    assert_eq!(domain.rows().len(), 3);
    let initial = domain.new_value();
    assert_eq!(domain.project_on_vars(&initial, &BTreeSet::new()), Expr::TRUE);

    let result = analyze(&mut store, "count_up", &mut domain, &BTreeSet::new()).unwrap();
    assert_eq!(result.status, AnalysisStatus::Converged);
    assert_eq!(result.value, vec![true, false, true]);
    assert_eq!(
        result.invariant.to_string(),
        "((($guard#1 && $guard#ls3) => (x#lb3 >= 0)) && (($guard#1 && $guard#ls3) => (x#lb3 <= 10)))"
    );

    // The invariant rules out negative loop-back values.
    let solver = store.get_solver("count_up");
    solver.push();
    solver.assert(&result.invariant);
    solver.assert(&Expr::var(Symbol::bool("$guard#ls3")));
    solver.assert(&v("x#lb3").lt(Expr::int(0)));
    assert_eq!(solver.solve(), Ok(SolveResult::Unsat));
    solver.pop().unwrap();

    // Without it they are possible.
    solver.push();
    solver.assert(&Expr::var(Symbol::bool("$guard#ls3")));
    solver.assert(&v("x#lb3").lt(Expr::int(0)));
    assert_eq!(solver.solve(), Ok(SolveResult::Sat));
    solver.pop().unwrap();
}

#[test]
fn test_projection_onto_other_variables() {
    let mut store = SsaStore::new(EnumFactory, &Options::new());
    store.ensure("count_up", &count_up(), &SymbolTable::new()).unwrap();
    let generator = SummaryGenerator::new(store.get("count_up"), true);
    let mut domain = generator.predicate_domain(0, &candidates(), &AnalysisConfig::default());

    let vars = BTreeSet::from([Symbol::int("y#in")]);
    let result = analyze(&mut store, "count_up", &mut domain, &vars).unwrap();
    assert!(result.is_converged());
    assert_eq!(result.invariant, Expr::TRUE);
}

#[test]
fn test_refinement_activates_next_tier() {
    let config = AnalysisConfig {
        max_refinement: 1,
        ..AnalysisConfig::default()
    };
    let mut store = SsaStore::new(EnumFactory, &Options::new());
    store.ensure("count_up", &count_up(), &SymbolTable::new()).unwrap();
    let generator = SummaryGenerator::new(store.get("count_up"), true);

    let mut domain = generator.predicate_domain(0, &[v("x").le(Expr::int(5))], &config);
    domain.add_candidates(&[v("x").le(Expr::int(10))], generator.var_specs(), 1);
    assert_eq!(domain.rows().len(), 2);

    let result = analyze(&mut store, "count_up", &mut domain, &BTreeSet::new()).unwrap();
    assert!(result.is_converged());
    assert_eq!(result.refinement_level, 1);
    assert_eq!(result.value, vec![false, true]);
}
