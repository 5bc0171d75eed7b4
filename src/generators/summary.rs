//! Summary variables of a function.

use std::collections::BTreeSet;

use log::debug;

use crate::domains::{PredicateDomain, VarKind, VarSpec};
use crate::expr::{Expr, Symbol};
use crate::generators::TemplateGenerator;
use crate::options::AnalysisConfig;
use crate::ssa::LocalSsa;

/// Variables of a function summary: entry values, exit values and the
/// loop-carried values in between.
///
/// Forward, parameters and incoming globals are IN, guarded by the entry
/// guard, and outgoing globals and the return value are OUT, guarded by
/// the exit guard. Backward the two kinds are swapped.
#[derive(Debug, Clone)]
pub struct SummaryGenerator {
    base: TemplateGenerator,
    forward: bool,
}

impl SummaryGenerator {
    /// Classifies the variables of `ssa`, in a forward or backward direction.
    pub fn new(ssa: &LocalSsa, forward: bool) -> Self {
        let mut base = TemplateGenerator::new();
        let entry = Expr::var(ssa.entry_guard());
        let exit = Expr::var(ssa.exit_guard());
        let (in_kind, out_kind) = if forward {
            (VarKind::In, VarKind::Out)
        } else {
            (VarKind::Out, VarKind::In)
        };

        base.add_vars(ssa.params.iter().chain(&ssa.globals_in), &entry, &entry, in_kind);
        base.add_vars(&ssa.globals_out, &exit, &exit, out_kind);
        base.collect_variables_loop(ssa, forward);

        debug!(
            "summary of '{}': {} variables ({})",
            ssa.function(),
            base.var_specs().len(),
            if forward { "forward" } else { "backward" }
        );
        Self { base, forward }
    }

    pub fn is_forward(&self) -> bool {
        self.forward
    }

    pub fn var_specs(&self) -> &[VarSpec] {
        self.base.var_specs()
    }

    /// IN and OUT variables.
    pub fn inout_vars(&self) -> Vec<&VarSpec> {
        self.base.filter(&[VarKind::In, VarKind::Out])
    }

    /// OUT variables only.
    pub fn out_vars(&self) -> Vec<&VarSpec> {
        self.base.filter(&[VarKind::Out])
    }

    /// LOOP variables, in back-edge order.
    pub fn loop_vars(&self) -> Vec<&VarSpec> {
        self.base.filter(&[VarKind::Loop])
    }

    /// Symbols of the IN and OUT variables, for projecting a summary onto
    /// the function interface.
    pub fn interface_symbols(&self) -> BTreeSet<Symbol> {
        self.inout_vars().into_iter().map(|s| s.var.clone()).collect()
    }

    /// Predicate domain over all collected variables, instantiating each
    /// candidate (written over program objects) wherever it fits.
    pub fn predicate_domain(&self, number: usize, candidates: &[Expr], config: &AnalysisConfig) -> PredicateDomain {
        let mut domain = PredicateDomain::new(number, config);
        let rows = domain.add_candidates(candidates, self.var_specs(), 0);
        debug!("predicate domain {}: {} rows", number, rows);
        domain
    }
}
