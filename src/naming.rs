//! Names of synthesized symbols.
//!
//! Every symbol the SSA builder or a template domain invents is named
//! through [`Name`], so the namespaces cannot collide with each other or
//! with program identifiers (which never contain `#` or start with `$`).
//!
//! | Kind | Rendering |
//! |------|-----------|
//! | input version of `x` | `x#in` |
//! | version of `x` assigned at location 5 | `x#5` |
//! | phi of `x` at location 5 | `x#phi5` |
//! | loop-back value of `x` for the back edge at 9 | `x#lb9` |
//! | loop-select literal for the back edge at 9 | `$guard#ls9` |
//! | guard of location 5 | `$guard#5` |
//! | condition of location 5 | `$cond#5` |
//! | k-th nondet side effect at location 5 | `$nondet#5.k` |
//! | return value object | `$return_value` |
//! | enabling literal of unwinding 2 of the loop at 3 | `$enable#3%2` |
//! | strategy literal of row 1 in domain 0 | `$tpl#0.cond1` |
//! | coefficient of variable 2, component 1, row 0 in domain 0 | `$tpl#0.c0.1.2` |

use std::fmt::{self, Display, Formatter};

use crate::expr::{Sort, Symbol};
use crate::goto::Loc;

const GUARD: &str = "$guard";
const COND: &str = "$cond";
const NONDET: &str = "$nondet";
const ENABLE: &str = "$enable";
const TEMPLATE: &str = "$tpl";

/// Base name of the object holding the function's return value.
pub const RETURN_VALUE: &str = "$return_value";

/// A synthesized name.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Name<'a> {
    Input(&'a str),
    Version(&'a str, Loc),
    Phi(&'a str, Loc),
    LoopBack(&'a str, Loc),
    LoopSelect(Loc),
    Guard(Loc),
    Cond(Loc),
    Nondet(Loc, usize),
    /// Loop head and unwinding suffix (see [`crate::ssa::odometer`]).
    Enable(Loc, &'a str),
    StrategyCond { domain: usize, row: usize },
    Coefficient { domain: usize, row: usize, component: usize, var: usize },
}

impl Display for Name<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Name::Input(base) => write!(f, "{}#in", base),
            Name::Version(base, loc) => write!(f, "{}#{}", base, loc),
            Name::Phi(base, loc) => write!(f, "{}#phi{}", base, loc),
            Name::LoopBack(base, loc) => write!(f, "{}#lb{}", base, loc),
            Name::LoopSelect(loc) => write!(f, "{}#ls{}", GUARD, loc),
            Name::Guard(loc) => write!(f, "{}#{}", GUARD, loc),
            Name::Cond(loc) => write!(f, "{}#{}", COND, loc),
            Name::Nondet(loc, k) => write!(f, "{}#{}.{}", NONDET, loc, k),
            Name::Enable(loc, k) => write!(f, "{}#{}%{}", ENABLE, loc, k),
            Name::StrategyCond { domain, row } => write!(f, "{}#{}.cond{}", TEMPLATE, domain, row),
            Name::Coefficient {
                domain,
                row,
                component,
                var,
            } => write!(f, "{}#{}.c{}.{}.{}", TEMPLATE, domain, row, component, var),
        }
    }
}

impl Name<'_> {
    /// The one place where synthesized symbols are created.
    pub fn symbol(&self, sort: Sort) -> Symbol {
        Symbol::new(self.to_string(), sort)
    }

    pub fn bool(&self) -> Symbol {
        self.symbol(Sort::Bool)
    }

    pub fn int(&self) -> Symbol {
        self.symbol(Sort::Int)
    }
}

/// Program object a versioned symbol belongs to (`x#phi3` -> `x`).
pub fn base_name(symbol: &Symbol) -> &str {
    let name = symbol.name();
    match name.find('#') {
        Some(i) => &name[..i],
        None => name,
    }
}

/// Whether the symbol is an unconstrained input version or nondet value.
pub fn is_input(symbol: &Symbol) -> bool {
    let name = symbol.name();
    name.ends_with("#in") || name.starts_with(NONDET)
}

/// Appends an unwinding suffix (`x#5` -> `x#5%1.0`). Empty suffixes leave
/// the symbol unchanged.
pub fn with_unwinding(symbol: &Symbol, suffix: &str) -> Symbol {
    if suffix.is_empty() {
        symbol.clone()
    } else {
        symbol.renamed(format!("{}%{}", symbol.name(), suffix))
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_rendering() {
        assert_eq!(Name::Input("x").to_string(), "x#in");
        assert_eq!(Name::Version("x", 5).to_string(), "x#5");
        assert_eq!(Name::Phi("x", 5).to_string(), "x#phi5");
        assert_eq!(Name::LoopBack("x", 9).to_string(), "x#lb9");
        assert_eq!(Name::LoopSelect(9).to_string(), "$guard#ls9");
        assert_eq!(Name::Guard(0).to_string(), "$guard#0");
        assert_eq!(Name::Nondet(4, 1).to_string(), "$nondet#4.1");
        assert_eq!(Name::Enable(3, "2").to_string(), "$enable#3%2");
        assert_eq!(Name::Enable(3, "1.2").to_string(), "$enable#3%1.2");
        assert_eq!(Name::StrategyCond { domain: 0, row: 1 }.to_string(), "$tpl#0.cond1");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name(&Name::Phi("counter", 3).int()), "counter");
        assert_eq!(base_name(&Symbol::int("y")), "y");
        assert_eq!(base_name(&Name::Version(RETURN_VALUE, 7).int()), RETURN_VALUE);
    }

    #[test]
    fn test_inputs() {
        assert!(is_input(&Name::Input("x").int()));
        assert!(is_input(&Name::Nondet(2, 0).int()));
        assert!(!is_input(&Name::Version("x", 2).int()));
    }

    #[test]
    fn test_unwinding_suffix() {
        let s = Name::Version("x", 5).int();
        assert_eq!(with_unwinding(&s, "").name(), "x#5");
        assert_eq!(with_unwinding(&s, "1.0").name(), "x#5%1.0");
    }
}
