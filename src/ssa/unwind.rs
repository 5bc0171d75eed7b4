//! Incremental loop unwinding.
//!
//! Each call to [`LoopUnwinder::unwind`] appends one more copy of a loop
//! body to the SSA. Copy `k` is entered only through the back edges of its
//! head; its loop-back symbols take the values reaching the back edges in
//! copy `k - 1`. All formulas of the copy are guarded by a fresh enabling
//! literal, so a solver session can switch the copy on and off through
//! assumptions. Copies are appended unmarked and picked up by the next
//! [`LocalSsa::take_unmarked_formulas`].

use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;

use log::debug;

use crate::error::SsaError;
use crate::expr::{disjunction, Expr, Symbol};
use crate::goto::Loc;
use crate::naming::{with_unwinding, Name};
use crate::ssa::local::LocalSsa;
use crate::ssa::node::{Equality, FunctionApplication, NodeId};
use crate::ssa::odometer::{suffix_of, Odometer};

/// Adds unwinding copies of loops to an SSA, one copy per call to
/// [`unwind`](Self::unwind).
pub struct LoopUnwinder<'a> {
    ssa: &'a mut LocalSsa,
    odometer: Odometer,
    /// Loops entered by the odometer, outermost first.
    heads: Vec<Loc>,
    /// Unwindings per loop head and enclosing levels.
    counts: HashMap<(Loc, Vec<u32>), u32>,
}

/// Renames base symbols into one unwinding copy.
struct Renaming<'s> {
    ssa: &'s LocalSsa,
    extent: RangeInclusive<Loc>,
    levels: Vec<u32>,
}

impl Renaming<'_> {
    fn symbol(&self, s: &Symbol) -> Symbol {
        let Some(loc) = self.ssa.def_location(s) else {
            return s.clone();
        };
        let depth = self.ssa.depth(loc);
        let levels = if self.extent.contains(&loc) {
            &self.levels[..]
        } else {
            // Defined outside the unwound body: only the enclosing levels apply.
            let outer = self.levels.len().saturating_sub(1).min(depth);
            &self.levels[..outer]
        };
        with_unwinding(s, &suffix_of(levels, depth))
    }

    fn expr(&self, e: &Expr) -> Expr {
        e.rename(|s| Some(self.symbol(s)))
    }
}

impl<'a> LoopUnwinder<'a> {
    /// Starts with no loop unwound.
    pub fn new(ssa: &'a mut LocalSsa) -> Self {
        Self {
            ssa,
            odometer: Odometer::new(),
            heads: Vec::new(),
            counts: HashMap::new(),
        }
    }

    /// Counters of the most recent unwinding.
    pub fn odometer(&self) -> &Odometer {
        &self.odometer
    }

    pub fn ssa(&self) -> &LocalSsa {
        &*self.ssa
    }

    /// Loop heads whose body contains `head`, outermost first, ending with
    /// `head` itself.
    fn enclosing(&self, head: Loc) -> Vec<Loc> {
        (0..=head)
            .filter(|&h| self.ssa.loop_extent(h).is_some_and(|e| e.contains(&head)))
            .collect()
    }

    /// Positions the odometer on `head`, entering and leaving loops as
    /// needed.
    fn enter(&mut self, head: Loc) {
        let chain = self.enclosing(head);
        let common = self
            .heads
            .iter()
            .zip(&chain)
            .take_while(|(a, b)| a == b)
            .count();
        while self.heads.len() > common {
            self.heads.pop();
            self.odometer.pop();
        }
        while self.heads.len() < chain.len() {
            let h = chain[self.heads.len()];
            let done = self
                .counts
                .get(&(h, self.odometer.levels().to_vec()))
                .copied()
                .unwrap_or(0);
            self.odometer.push_at(done);
            self.heads.push(h);
        }
    }

    /// Appends the next unwinding of the loop at `head` and returns its
    /// enabling literal.
    pub fn unwind(&mut self, head: Loc) -> Result<Symbol, SsaError> {
        let extent = self
            .ssa
            .loop_extent(head)
            .ok_or_else(|| SsaError::NotALoopHead {
                function: self.ssa.function().to_string(),
                location: head,
            })?;

        self.enter(head);
        self.odometer.increment();
        let levels = self.odometer.levels().to_vec();
        let (innermost, outer) = match levels.split_last() {
            Some((&k, outer)) => (k, outer.to_vec()),
            None => (0, Vec::new()),
        };
        self.counts.insert((head, outer), innermost);

        let mut previous = self.odometer.clone();
        previous.decrement();

        let suffix = suffix_of(&levels, levels.len());
        let enable = Name::Enable(head, &suffix).bool();
        let current = Renaming {
            ssa: &*self.ssa,
            extent: extent.clone(),
            levels,
        };
        let prev = Renaming {
            ssa: &*self.ssa,
            extent: extent.clone(),
            levels: previous.levels().to_vec(),
        };

        let mut copies = Vec::new();
        for loc in extent.clone() {
            let base = self.ssa.node(NodeId::new(loc));
            let mut node = base.clone();
            node.marked = false;
            node.enabling_expr = Expr::var(enable.clone());

            if loc == head {
                // Guard and phis are rebuilt; the head's own effects are kept.
                let rebuilt: HashSet<Symbol> = self
                    .ssa
                    .phi_objects(head)
                    .iter()
                    .map(|o| self.ssa.phi_symbol(o, head))
                    .chain([self.ssa.guard_symbol(head)])
                    .collect();
                node.equalities = self.head_equalities(head, &current, &prev);
                node.equalities.extend(
                    base.equalities
                        .iter()
                        .filter(|e| !rebuilt.contains(&e.lhs))
                        .map(|e| Equality::new(current.symbol(&e.lhs), current.expr(&e.rhs))),
                );
            } else {
                node.equalities = base
                    .equalities
                    .iter()
                    .map(|e| Equality::new(current.symbol(&e.lhs), current.expr(&e.rhs)))
                    .collect();
            }
            node.constraints = base.constraints.iter().map(|c| current.expr(c)).collect();
            node.assertions = base.assertions.iter().map(|a| current.expr(a)).collect();
            node.assertions_after_loop = base.assertions_after_loop.iter().map(|a| current.expr(a)).collect();
            node.function_calls = base
                .function_calls
                .iter()
                .map(|call| FunctionApplication {
                    function: call.function.clone(),
                    args: call.args.iter().map(|a| current.expr(a)).collect(),
                    result: call.result.as_ref().map(|r| current.symbol(r)),
                    globals_in: call.globals_in.iter().map(|g| current.symbol(g)).collect(),
                    globals_out: call.globals_out.iter().map(|g| current.symbol(g)).collect(),
                })
                .collect();
            copies.push(node);
        }

        let mut ids: HashMap<NodeId, NodeId> = HashMap::new();
        let first = NodeId::new(self.ssa.nodes().len());
        for (offset, loc) in extent.clone().enumerate() {
            ids.insert(NodeId::new(loc), NodeId::new(first.index() + offset));
        }
        for mut node in copies {
            node.loophead = node.loophead.map(|h| ids.get(&h).copied().unwrap_or(h));
            self.ssa.push_node(node, &suffix);
        }
        self.ssa.enabling_exprs.push(enable.clone());

        debug!(
            "unwound loop at {} of '{}' to {} ({} nodes)",
            head,
            self.ssa.function(),
            self.odometer,
            extent.count()
        );
        Ok(enable)
    }

    /// Guard, loop-back bindings and phis of the head copy. The copy is
    /// entered through its back edges only.
    fn head_equalities(&self, head: Loc, current: &Renaming<'_>, prev: &Renaming<'_>) -> Vec<Equality> {
        let ssa = &*self.ssa;
        let back_edges = ssa.back_edges(head);
        let objects = ssa.phi_objects(head);
        let mut equalities = Vec::new();

        for &b in back_edges {
            equalities.push(Equality::new(
                current.symbol(&ssa.loop_select(b)),
                prev.expr(&ssa.edge_guard(b, head)),
            ));
            for o in &objects {
                if let Some(post) = ssa.read_out(o.name(), b) {
                    equalities.push(Equality::new(
                        current.symbol(&ssa.loop_back(o, b)),
                        Expr::var(prev.symbol(&post)),
                    ));
                }
            }
        }

        let selects = back_edges.iter().map(|&b| Expr::var(current.symbol(&ssa.loop_select(b))));
        equalities.push(Equality::new(
            current.symbol(&ssa.guard_symbol(head)),
            disjunction(selects),
        ));

        for o in &objects {
            let mut alternatives = back_edges.iter().rev().map(|&b| {
                (
                    Expr::var(current.symbol(&ssa.loop_select(b))),
                    Expr::var(current.symbol(&ssa.loop_back(o, b))),
                )
            });
            if let Some((_, last)) = alternatives.next() {
                let rhs = alternatives.fold(last, |acc, (select, value)| Expr::ite(select, value, acc));
                equalities.push(Equality::new(current.symbol(&ssa.phi_symbol(o, head)), rhs));
            }
        }
        equalities
    }
}
