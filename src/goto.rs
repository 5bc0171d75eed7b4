//! Control-flow-graph input, as delivered by a language front end.
//!
//! A [`GotoFunction`] is a flat list of instructions; the index of an
//! instruction is its location. Control flow is expressed with
//! (conditional) gotos: a goto whose target is not after its own location
//! closes a loop whose head is the target.

use std::collections::BTreeMap;
use std::fmt;

use crate::expr::{Expr, Sort, Symbol};

/// A program location: index into [`GotoFunction::body`].
pub type Loc = usize;

/// One instruction of a goto program. Locations are indices into the
/// function body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Skip,
    /// Declaration: the variable gets an unknown value.
    Decl(Symbol),
    /// End of scope.
    Dead(Symbol),
    Assign(Symbol, Expr),
    Assume(Expr),
    Assert(Expr),
    /// Jump to `target` if `cond` holds, otherwise fall through.
    Goto { cond: Expr, target: Loc },
    FunctionCall {
        lhs: Option<Symbol>,
        function: String,
        args: Vec<Expr>,
    },
    /// Return, optionally with a value; control continues at the final
    /// `EndFunction`.
    Return(Option<Expr>),
    EndFunction,
    /// Anything the analysis does not support (exceptions, inline
    /// assembly, ...). Building SSA for a function containing one fails.
    Other(String),
}

impl Instruction {
    pub fn assign(lhs: Symbol, rhs: Expr) -> Self {
        Instruction::Assign(lhs, rhs)
    }

    /// Unconditional jump.
    pub fn goto(target: Loc) -> Self {
        Instruction::Goto { cond: Expr::TRUE, target }
    }

    /// Jump to `target` when `cond` holds, otherwise fall through.
    pub fn goto_if(cond: Expr, target: Loc) -> Self {
        Instruction::Goto { cond, target }
    }

    /// Symbols read by the instruction.
    pub fn reads(&self) -> Vec<Symbol> {
        let mut out = Vec::new();
        let mut push = |e: &Expr| e.visit_symbols(&mut |s| out.push(s.clone()));
        match self {
            Instruction::Assign(_, rhs) => push(rhs),
            Instruction::Assume(c) | Instruction::Assert(c) => push(c),
            Instruction::Goto { cond, .. } => push(cond),
            Instruction::FunctionCall { args, .. } => args.iter().for_each(push),
            Instruction::Return(Some(e)) => push(e),
            _ => {}
        }
        out
    }

    /// Symbol written by the instruction, if any.
    pub fn writes(&self) -> Option<&Symbol> {
        match self {
            Instruction::Decl(s) | Instruction::Assign(s, _) => Some(s),
            Instruction::FunctionCall { lhs, .. } => lhs.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Skip => write!(f, "SKIP"),
            Instruction::Decl(s) => write!(f, "DECL {}", s),
            Instruction::Dead(s) => write!(f, "DEAD {}", s),
            Instruction::Assign(lhs, rhs) => write!(f, "{} = {}", lhs, rhs),
            Instruction::Assume(c) => write!(f, "ASSUME {}", c),
            Instruction::Assert(c) => write!(f, "ASSERT {}", c),
            Instruction::Goto { cond, target } if cond.is_true() => write!(f, "GOTO {}", target),
            Instruction::Goto { cond, target } => write!(f, "IF {} GOTO {}", cond, target),
            Instruction::FunctionCall { lhs, function, args } => {
                if let Some(lhs) = lhs {
                    write!(f, "{} = ", lhs)?;
                }
                write!(f, "{}(", function)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            Instruction::Return(Some(e)) => write!(f, "RETURN {}", e),
            Instruction::Return(None) => write!(f, "RETURN"),
            Instruction::EndFunction => write!(f, "END_FUNCTION"),
            Instruction::Other(what) => write!(f, "OTHER {}", what),
        }
    }
}

/// One function body.
#[derive(Debug, Clone, Default)]
pub struct GotoFunction {
    pub params: Vec<Symbol>,
    pub body: Vec<Instruction>,
}

impl GotoFunction {
    pub fn new(params: Vec<Symbol>, body: Vec<Instruction>) -> Self {
        Self { params, body }
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

impl fmt::Display for GotoFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (loc, instr) in self.body.iter().enumerate() {
            writeln!(f, "{:>4}: {}", loc, instr)?;
        }
        Ok(())
    }
}

/// What the symbol table knows about one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub sort: Sort,
    /// Globals and function-local statics.
    pub is_static_lifetime: bool,
}

/// Identifiers known to the front end.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: BTreeMap<String, SymbolInfo>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_local(&mut self, symbol: &Symbol) {
        self.insert(symbol, false);
    }

    pub fn add_global(&mut self, symbol: &Symbol) {
        self.insert(symbol, true);
    }

    fn insert(&mut self, symbol: &Symbol, is_static_lifetime: bool) {
        self.symbols.insert(
            symbol.name().to_string(),
            SymbolInfo {
                sort: symbol.sort(),
                is_static_lifetime,
            },
        );
    }

    pub fn lookup(&self, name: &str) -> Option<&SymbolInfo> {
        self.symbols.get(name)
    }

    /// Globals have static lifetime; unknown names do not.
    pub fn has_static_lifetime(&self, name: &str) -> bool {
        self.lookup(name).is_some_and(|info| info.is_static_lifetime)
    }

    /// Identifiers with static lifetime, in name order.
    pub fn globals(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.symbols
            .iter()
            .filter(|(_, info)| info.is_static_lifetime)
            .map(|(name, info)| Symbol::new(name.clone(), info.sort))
    }
}
