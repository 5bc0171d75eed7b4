//! # templ-rs: template-based invariant and ranking function inference
//!
//! **`templ-rs`** is the analysis core of a template-based program verifier.
//! It turns the control-flow graph of a function into static single
//! assignment form and infers loop invariants (predicate abstraction),
//! termination arguments (lexicographic linear ranking functions) and
//! function summaries over it. Satisfiability questions go to an
//! incremental solver behind the [`Solver`][crate::solver::Solver] trait;
//! the crate ships none.
//!
//! ## How it fits together
//!
//! - The [`SsaStore`][crate::ssa::SsaStore] builds the SSA of a function once
//!   and owns one solver session per function.
//! - A generator ([`generators`]) classifies the variables of the SSA as
//!   entry (IN), exit (OUT) or loop-carried (LOOP) and builds the rows of a
//!   template domain.
//! - A domain ([`domains`]) is driven to a fixpoint by the
//!   [`StrategySolver`][crate::domains::StrategySolver]: each step asks the
//!   solver for a transition that violates the current value and
//!   strengthens the rows it violates.
//! - [`analyze`][crate::analysis::analyze] adds the refine-and-retry loop on
//!   top and projects the value back to an expression.
//!
//! Loops are cut at their back edges: a loop head reads free loop-back
//! symbols (`x#lb9`) selected by free loop-select literals (`$guard#ls9`),
//! so the SSA formula is acyclic and the domains relate the loop-back
//! symbols to the values reaching the back edge.
//!
//! ## Basic usage
//!
//! ```rust
//! use templ_rs::expr::{Expr, Symbol};
//! use templ_rs::goto::{GotoFunction, Instruction, SymbolTable};
//! use templ_rs::ssa::LocalSsa;
//!
//! // while (x > 0) x = x - 1;
//! let x = Symbol::int("x");
//! let function = GotoFunction::new(
//!     vec![x.clone()],
//!     vec![
//!         Instruction::goto_if(Expr::var(x.clone()).le(Expr::int(0)), 3),
//!         Instruction::assign(x.clone(), Expr::var(x.clone()).sub(Expr::int(1))),
//!         Instruction::goto(0),
//!         Instruction::EndFunction,
//!     ],
//! );
//! let ssa = LocalSsa::build("countdown", &function, &SymbolTable::new()).unwrap();
//!
//! assert!(ssa.is_loop_head(0));
//! assert_eq!(ssa.read_out("x", 2), Some(Symbol::int("x#1")));
//! // Phi, guard and condition at the head; guard and update in the body;
//! // one guard each for the back edge and the exit.
//! assert_eq!(ssa.formulas().len(), 7);
//! ```
//!
//! ## Core components
//!
//! - **[`ssa`]**: SSA construction, loop unwinding and the per-function store.
//! - **[`domains`]**: the template-domain protocol, predicate abstraction,
//!   ranking functions and the strategy solver.
//! - **[`generators`]**: variable classification.
//! - **[`analysis`]**: the driver.

pub mod analysis;
pub mod domains;
pub mod error;
pub mod expr;
pub mod generators;
pub mod goto;
pub mod naming;
pub mod options;
pub mod solver;
pub mod ssa;
