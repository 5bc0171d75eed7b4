//! Analysis driver: fixpoint, refine, retry.

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, info, warn};

use crate::domains::{StrategySolver, TemplateDomain};
use crate::error::AnalysisError;
use crate::expr::{Expr, Symbol};
use crate::solver::SolverFactory;
use crate::ssa::SsaStore;

/// How an analysis run ended.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AnalysisStatus {
    /// The fixpoint was reached and the domain is satisfied with it.
    Converged,
    /// The domain wanted a larger template but its bounds were reached.
    Exhausted,
    /// The solver could not decide some query; the value may be weaker
    /// than the domain could have found.
    Unknown,
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisStatus::Converged => write!(f, "converged"),
            AnalysisStatus::Exhausted => write!(f, "exhausted"),
            AnalysisStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Outcome of one domain on one function.
#[derive(Debug, Clone)]
pub struct AnalysisResult<V> {
    pub function: String,
    pub status: AnalysisStatus,
    pub value: V,
    /// The value as a formula over the requested variables.
    pub invariant: Expr,
    pub refinement_level: u32,
    /// Solver queries over all refinement rounds.
    pub iterations: usize,
}

impl<V> AnalysisResult<V> {
    pub fn is_converged(&self) -> bool {
        self.status == AnalysisStatus::Converged
    }
}

/// Runs `domain` on the function `name` until its value no longer needs
/// refinement or the domain cannot refine any further.
///
/// The SSA of `name` must have been ensured in `store`. Formulas not yet in
/// the function's solver session are loaded first; the session is shared
/// with later analyses of the same function. Every refinement round starts
/// again from bottom.
pub fn analyze<F, D>(
    store: &mut SsaStore<F>,
    name: &str,
    domain: &mut D,
    vars: &BTreeSet<Symbol>,
) -> Result<AnalysisResult<D::Value>, AnalysisError>
where
    F: SolverFactory,
    D: TemplateDomain,
{
    if !store.exists(name) {
        return Err(AnalysisError::UnknownFunction(name.to_string()));
    }
    store.load_into_solver(name)?;
    let solver = store.get_solver(name);

    let mut value = domain.new_value();
    let mut iterations = 0;
    let mut unknown_answers = 0;
    let domain_unknown_before = domain.unknown_answers();
    let status = loop {
        domain.initialize_value(&mut value);
        let mut strategy = StrategySolver::new(&mut *solver, &mut *domain);
        strategy.fixpoint(&mut value)?;
        iterations += strategy.iterations();
        unknown_answers += strategy.unknown_answers();

        if !domain.needs_refinement(&value) {
            break AnalysisStatus::Converged;
        }
        if !domain.refine() {
            warn!(
                "'{}': domain {} exhausted at refinement level {}",
                name,
                domain.domain_number(),
                domain.refinement_level()
            );
            break AnalysisStatus::Exhausted;
        }
        debug!(
            "'{}': retrying domain {} at refinement level {}",
            name,
            domain.domain_number(),
            domain.refinement_level()
        );
    };
    unknown_answers += domain.unknown_answers().saturating_sub(domain_unknown_before);
    let status = if unknown_answers > 0 {
        warn!("'{}': {} undecided solver queries", name, unknown_answers);
        AnalysisStatus::Unknown
    } else {
        status
    };

    let invariant = domain.project_on_vars(&value, vars);
    info!(
        "'{}': domain {} {} after {} iterations: {}",
        name,
        domain.domain_number(),
        status,
        iterations,
        invariant
    );
    Ok(AnalysisResult {
        function: name.to_string(),
        status,
        value,
        invariant,
        refinement_level: domain.refinement_level(),
        iterations,
    })
}
