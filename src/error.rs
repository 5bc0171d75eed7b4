//! Error types.
//!
//! Only construction failures and solver backend failures are errors.
//! Running out of refinement budget is a regular (negative) analysis
//! result, see [`AnalysisStatus`][crate::analysis::AnalysisStatus].

use thiserror::Error;

use crate::goto::Loc;

/// Failure to build SSA for one function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SsaError {
    #[error("function '{function}' has an empty body")]
    EmptyBody { function: String },
    #[error("function '{function}' does not end with END_FUNCTION")]
    MissingEnd { function: String },
    #[error("function '{function}': goto at {location} targets {target}, which is out of range")]
    InvalidTarget {
        function: String,
        location: Loc,
        target: Loc,
    },
    #[error("function '{function}': unsupported instruction at {location}: {instruction}")]
    Unsupported {
        function: String,
        location: Loc,
        instruction: String,
    },
    #[error("function '{function}': location {location} is not a loop head")]
    NotALoopHead { function: String, location: Loc },
}

/// Failure reported by a solver backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("solver backend failed: {0}")]
    Backend(String),
    #[error("pop without matching push")]
    ScopeUnderflow,
}

/// Failure of [`analyze`](crate::analysis::analyze) or of loading a
/// function into its solver session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Ssa(#[from] SsaError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("no SSA for function '{0}'")]
    UnknownFunction(String),
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_messages() {
        let e = SsaError::Unsupported {
            function: "main".to_string(),
            location: 3,
            instruction: "OTHER throw".to_string(),
        };
        assert_eq!(e.to_string(), "function 'main': unsupported instruction at 3: OTHER throw");

        let e: AnalysisError = SolverError::Backend("timeout".to_string()).into();
        assert_eq!(e.to_string(), "solver backend failed: timeout");
    }
}
