//! Per-function cache of SSA and solver sessions.

use std::collections::BTreeMap;

use log::debug;

use crate::error::{AnalysisError, SsaError};
use crate::goto::{GotoFunction, SymbolTable};
use crate::options::{Options, REFINE};
use crate::solver::{Solver, SolverFactory};
use crate::ssa::local::LocalSsa;

/// Owns at most one [`LocalSsa`] and one solver session per function.
///
/// SSA is built on demand by [`ensure`][SsaStore::ensure]; a session is
/// allocated the first time it is asked for. Asking for the SSA or session
/// of a function that was never ensured is a contract violation and panics.
pub struct SsaStore<F: SolverFactory> {
    factory: F,
    refine: bool,
    store: BTreeMap<String, LocalSsa>,
    solvers: BTreeMap<String, F::Solver>,
}

impl<F: SolverFactory> SsaStore<F> {
    /// Empty store. `options` decides, once, whether solver sessions are
    /// created with refinement support.
    pub fn new(factory: F, options: &Options) -> Self {
        Self {
            factory,
            refine: options.get_bool(REFINE),
            store: BTreeMap::new(),
            solvers: BTreeMap::new(),
        }
    }

    /// Builds the SSA of `name` unless it already exists. On failure nothing
    /// is stored, so other functions are unaffected.
    pub fn ensure(&mut self, name: &str, function: &GotoFunction, symbols: &SymbolTable) -> Result<&LocalSsa, SsaError> {
        if !self.store.contains_key(name) {
            let ssa = LocalSsa::build(name, function, symbols)?;
            self.store.insert(name.to_string(), ssa);
        }
        Ok(self.get(name))
    }

    /// Whether the SSA of `name` was built.
    pub fn exists(&self, name: &str) -> bool {
        self.store.contains_key(name)
    }

    pub fn try_get(&self, name: &str) -> Option<&LocalSsa> {
        self.store.get(name)
    }

    /// # Panics
    ///
    /// Panics if the SSA of `name` was never built.
    pub fn get(&self, name: &str) -> &LocalSsa {
        match self.store.get(name) {
            Some(ssa) => ssa,
            None => panic!("no SSA for function '{}'", name),
        }
    }

    /// # Panics
    ///
    /// Panics if the SSA of `name` was never built.
    pub fn get_mut(&mut self, name: &str) -> &mut LocalSsa {
        match self.store.get_mut(name) {
            Some(ssa) => ssa,
            None => panic!("no SSA for function '{}'", name),
        }
    }

    /// Solver session of `name`, allocated on first use.
    ///
    /// # Panics
    ///
    /// Panics if the SSA of `name` was never built.
    pub fn get_solver(&mut self, name: &str) -> &mut F::Solver {
        if !self.store.contains_key(name) {
            panic!("no SSA for function '{}'", name);
        }
        let (factory, refine) = (&self.factory, self.refine);
        self.solvers.entry(name.to_string()).or_insert_with(|| {
            debug!("allocating solver for '{}' (refine: {})", name, refine);
            factory.allocate(refine)
        })
    }

    /// Asserts every SSA formula not yet loaded into the session of `name`.
    /// Returns how many formulas were added.
    pub fn load_into_solver(&mut self, name: &str) -> Result<usize, AnalysisError> {
        let ssa = self
            .store
            .get_mut(name)
            .ok_or_else(|| AnalysisError::UnknownFunction(name.to_string()))?;
        let formulas = ssa.take_unmarked_formulas();
        let (factory, refine) = (&self.factory, self.refine);
        let solver = self
            .solvers
            .entry(name.to_string())
            .or_insert_with(|| factory.allocate(refine));
        for f in &formulas {
            solver.assert(f);
        }
        debug!("loaded {} formulas of '{}'", formulas.len(), name);
        Ok(formulas.len())
    }

    /// Names of the functions with SSA, in order.
    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.store.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::expr::{Expr, Symbol};
    use crate::goto::Instruction;
    use crate::solver::tests::ScriptedFactory;

    fn function() -> GotoFunction {
        let x = Symbol::int("x");
        GotoFunction::new(
            vec![x.clone()],
            vec![
                Instruction::assign(x.clone(), Expr::var(x).add(Expr::int(1))),
                Instruction::EndFunction,
            ],
        )
    }

    fn store() -> SsaStore<ScriptedFactory> {
        SsaStore::new(ScriptedFactory::default(), &Options::new())
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let mut store = store();
        let symbols = SymbolTable::new();
        let first: *const LocalSsa = store.ensure("f", &function(), &symbols).unwrap();
        let second: *const LocalSsa = store.ensure("f", &function(), &symbols).unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(store.exists("f"));
        assert_eq!(store.functions().collect::<Vec<_>>(), vec!["f"]);
    }

    #[test]
    fn test_failed_build_stores_nothing() {
        let mut store = store();
        let broken = GotoFunction::new(vec![], vec![Instruction::Other("asm".to_string()), Instruction::EndFunction]);
        assert!(store.ensure("g", &broken, &SymbolTable::new()).is_err());
        assert!(!store.exists("g"));
        assert!(store.try_get("g").is_none());

        // Other functions are unaffected.
        assert!(store.ensure("f", &function(), &SymbolTable::new()).is_ok());
    }

    #[test]
    fn test_solver_is_allocated_once() {
        let mut options = Options::new();
        options.set_bool(REFINE, true);
        let mut store = SsaStore::new(ScriptedFactory::default(), &options);
        store.ensure("f", &function(), &SymbolTable::new()).unwrap();

        store.get_solver("f").calls = 7;
        assert_eq!(store.get_solver("f").calls, 7);
        assert!(store.get_solver("f").refine);
    }

    #[test]
    fn test_load_into_solver_is_incremental() {
        let mut store = store();
        store.ensure("f", &function(), &SymbolTable::new()).unwrap();
        assert_eq!(store.load_into_solver("f"), Ok(3));
        assert_eq!(store.load_into_solver("f"), Ok(0));
        assert_eq!(store.get_solver("f").asserted.len(), 3);
        assert_eq!(
            store.load_into_solver("h"),
            Err(AnalysisError::UnknownFunction("h".to_string()))
        );
    }

    #[test]
    #[should_panic(expected = "no SSA for function 'missing'")]
    fn test_get_missing_panics() {
        store().get("missing");
    }

    #[test]
    #[should_panic(expected = "no SSA for function 'missing'")]
    fn test_get_solver_missing_panics() {
        store().get_solver("missing");
    }
}
