//! SSA for one function.
//!
//! [`LocalSsa::build`] walks the instructions once, in location order. Only
//! back edges point backwards, so the definitions reaching every forward
//! predecessor are known when a location is visited. A loop head reads the
//! values arriving over its back edges through free loop-back symbols
//! (`x#lb9`), selected by free loop-select literals (`$guard#ls9`). Cutting
//! the back edges this way keeps the formula acyclic; the template domains
//! close the loop by relating loop-back symbols to the values reaching the
//! back edge.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops::RangeInclusive;

use log::{debug, trace};

use crate::error::SsaError;
use crate::expr::{disjunction, Expr, Sort, Symbol};
use crate::goto::{GotoFunction, Instruction, Loc, SymbolTable};
use crate::naming::{with_unwinding, Name, RETURN_VALUE};
use crate::ssa::node::{Equality, FunctionApplication, NodeId, SsaNode};

/// Where the value of an object reaching a location comes from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Def {
    Input,
    Assignment(Loc),
    Phi(Loc),
}

type Defs = BTreeMap<String, Def>;

/// A loop closed by a single back edge.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Loop {
    pub head: Loc,
    pub back_edge: Loc,
}

impl Loop {
    /// Head through back-edge source.
    pub fn body(&self) -> RangeInclusive<Loc> {
        self.head..=self.back_edge
    }

    pub fn contains(&self, loc: Loc) -> bool {
        self.body().contains(&loc)
    }
}

/// SSA of one function: one base node per location, followed by the
/// nodes of any unwinding copies.
///
/// # Invariants
///
/// - Base node `i` belongs to location `i`.
/// - Every symbol read by a base node is an input, a loop-back or
///   loop-select symbol of the node's own head, or defined at an earlier
///   location or earlier in the same node.
#[derive(Debug, Clone)]
pub struct LocalSsa {
    function: String,
    body: Vec<Instruction>,
    nodes: Vec<SsaNode>,
    objects: BTreeMap<String, Sort>,
    globals: BTreeSet<String>,
    defs_in: Vec<Defs>,
    defs_out: Vec<Defs>,
    forward_preds: Vec<Vec<Loc>>,
    back_preds: Vec<Vec<Loc>>,
    loops: Vec<Loop>,
    /// Loop head -> last location of the outermost body with that head.
    extents: BTreeMap<Loc, Loc>,
    depth: Vec<usize>,
    /// Defining location of every symbol the builder introduced.
    def_locations: HashMap<String, Loc>,
    /// Unwinding suffix of every copied node.
    copy_suffixes: HashMap<NodeId, String>,

    pub params: Vec<Symbol>,
    pub globals_in: BTreeSet<Symbol>,
    pub globals_out: BTreeSet<Symbol>,
    pub enabling_exprs: Vec<Symbol>,
}

impl LocalSsa {
    /// Builds the SSA of `function`.
    ///
    /// # Errors
    ///
    /// Returns [`SsaError`] for an empty body, a body not ending in
    /// `EndFunction`, a jump out of range, an unsupported instruction or an
    /// irreducible loop.
    pub fn build(name: &str, function: &GotoFunction, symbols: &SymbolTable) -> Result<Self, SsaError> {
        let body = &function.body;
        validate(name, body)?;
        let n = body.len();

        let mut forward_preds = vec![Vec::new(); n];
        let mut back_preds = vec![Vec::new(); n];
        let mut forward_edges = Vec::new();
        let mut loops = Vec::new();
        for loc in 0..n {
            for succ in successors(body, loc) {
                if succ <= loc {
                    back_preds[succ].push(loc);
                    loops.push(Loop { head: succ, back_edge: loc });
                } else {
                    forward_preds[succ].push(loc);
                    forward_edges.push((loc, succ));
                }
            }
        }

        let mut extents: BTreeMap<Loc, Loc> = BTreeMap::new();
        for l in &loops {
            let end = extents.entry(l.head).or_insert(l.back_edge);
            *end = (*end).max(l.back_edge);
        }
        check_reducible(name, body, &extents, &forward_edges)?;

        let mut depth = vec![0; n];
        for (&head, &end) in &extents {
            for d in &mut depth[head..=end] {
                *d += 1;
            }
        }

        let mut mentioned: Vec<Symbol> = function.params.clone();
        mentioned.extend(symbols.globals());
        for instr in body {
            mentioned.extend(instr.reads());
            mentioned.extend(instr.writes().cloned());
            match instr {
                Instruction::Dead(s) => mentioned.push(s.clone()),
                Instruction::Return(Some(e)) => mentioned.push(Symbol::new(RETURN_VALUE, e.sort())),
                _ => {}
            }
        }
        let mut objects = BTreeMap::new();
        for s in mentioned {
            objects.entry(s.name().to_string()).or_insert(s.sort());
        }
        let globals: BTreeSet<String> = objects
            .keys()
            .filter(|o| symbols.has_static_lifetime(o))
            .cloned()
            .collect();

        let loop_assigned: HashMap<Loc, BTreeSet<String>> = extents
            .iter()
            .map(|(&head, &end)| {
                let assigned = (head..=end)
                    .flat_map(|loc| written_objects(&body[loc], &globals))
                    .collect();
                (head, assigned)
            })
            .collect();

        let mut ssa = LocalSsa {
            function: name.to_string(),
            body: body.clone(),
            nodes: Vec::with_capacity(n),
            objects,
            globals,
            defs_in: Vec::with_capacity(n),
            defs_out: Vec::with_capacity(n),
            forward_preds,
            back_preds,
            loops,
            extents,
            depth,
            def_locations: HashMap::new(),
            copy_suffixes: HashMap::new(),
            params: Vec::new(),
            globals_in: BTreeSet::new(),
            globals_out: BTreeSet::new(),
            enabling_exprs: Vec::new(),
        };
        ssa.build_nodes(&loop_assigned);
        ssa.build_entry_exit(function);
        ssa.hoist_assertions_after_loops();

        debug!(
            "built SSA for '{}': {} nodes, {} loops, {} objects",
            name,
            ssa.nodes.len(),
            ssa.loops.len(),
            ssa.objects.len()
        );
        trace!("SSA of '{}':\n{}", name, ssa);
        Ok(ssa)
    }

    fn build_nodes(&mut self, loop_assigned: &HashMap<Loc, BTreeSet<String>>) {
        let inputs: Defs = self.objects.keys().map(|o| (o.clone(), Def::Input)).collect();
        for loc in 0..self.body.len() {
            let def_in = self.merge_defs(loc, &inputs, loop_assigned.get(&loc));

            let mut node = SsaNode::new(loc);
            let mut nondets = Vec::new();
            self.build_phis(loc, &def_in, &mut node);
            self.build_guard(loc, &mut node);
            self.build_transfer(loc, &def_in, &mut node, &mut nondets);

            let mut def_out = def_in.clone();
            for o in written_objects(&self.body[loc], &self.globals) {
                def_out.insert(o, Def::Assignment(loc));
            }

            let mut defined: Vec<String> = node.equalities.iter().map(|e| e.lhs.name().to_string()).collect();
            defined.extend(nondets.iter().map(|s| s.name().to_string()));
            for call in &node.function_calls {
                defined.extend(call.result.iter().map(|s| s.name().to_string()));
                defined.extend(call.globals_out.iter().map(|s| s.name().to_string()));
            }
            for &b in &self.back_preds[loc] {
                defined.push(self.loop_select(b).name().to_string());
                for (o, def) in &def_in {
                    if *def == Def::Phi(loc) {
                        defined.push(Name::LoopBack(o, b).to_string());
                    }
                }
            }
            for name in defined {
                self.def_locations.insert(name, loc);
            }

            self.defs_in.push(def_in);
            self.defs_out.push(def_out);
            self.nodes.push(node);
        }

        for l in &self.loops {
            self.nodes[l.back_edge].loophead = Some(NodeId::new(l.head));
        }
    }

    fn merge_defs(&self, loc: Loc, inputs: &Defs, loop_assigned: Option<&BTreeSet<String>>) -> Defs {
        let incoming: Vec<&Defs> = if loc == 0 {
            vec![inputs]
        } else {
            self.forward_preds[loc].iter().map(|&p| &self.defs_out[p]).collect()
        };
        if self.back_preds[loc].is_empty() && incoming.len() == 1 {
            return incoming[0].clone();
        }

        self.objects
            .keys()
            .map(|o| {
                let looped = loop_assigned.is_some_and(|a| a.contains(o));
                let mut defs = incoming.iter().map(|d| d[o]);
                let def = match defs.next() {
                    None if !looped => Def::Input,
                    Some(first) if !looped && defs.all(|d| d == first) => first,
                    _ => Def::Phi(loc),
                };
                (o.clone(), def)
            })
            .collect()
    }

    fn build_phis(&self, loc: Loc, def_in: &Defs, node: &mut SsaNode) {
        for (o, def) in def_in {
            if *def != Def::Phi(loc) {
                continue;
            }
            let sort = self.objects[o];
            let mut alternatives: Vec<(Expr, Expr)> = self.back_preds[loc]
                .iter()
                .map(|&b| {
                    (
                        Expr::var(self.loop_select(b)),
                        Expr::var(Name::LoopBack(o, b).symbol(sort)),
                    )
                })
                .collect();
            if loc == 0 {
                alternatives.push((Expr::TRUE, Expr::var(Name::Input(o).symbol(sort))));
            }
            for &p in &self.forward_preds[loc] {
                alternatives.push((self.edge_guard(p, loc), Expr::var(self.version(o, self.defs_out[p][o]))));
            }

            let mut alternatives = alternatives.into_iter().rev();
            if let Some((_, last)) = alternatives.next() {
                let rhs = alternatives.fold(last, |acc, (guard, value)| Expr::ite(guard, value, acc));
                node.equalities.push(Equality::new(Name::Phi(o, loc).symbol(sort), rhs));
            }
        }
    }

    fn build_guard(&self, loc: Loc, node: &mut SsaNode) {
        let forward = if loc == 0 {
            vec![Expr::TRUE]
        } else {
            self.forward_preds[loc].iter().map(|&p| self.edge_guard(p, loc)).collect()
        };
        let back = self.back_preds[loc].iter().map(|&b| Expr::var(self.loop_select(b)));
        let rhs = disjunction(forward.into_iter().chain(back));
        node.equalities.push(Equality::new(self.guard_symbol(loc), rhs));
    }

    fn build_transfer(&self, loc: Loc, def_in: &Defs, node: &mut SsaNode, nondets: &mut Vec<Symbol>) {
        match &self.body[loc] {
            Instruction::Decl(s) => {
                let value = fresh_nondet(loc, s.sort(), nondets);
                node.equalities
                    .push(Equality::new(Name::Version(s.name(), loc).symbol(s.sort()), Expr::var(value)));
            }
            Instruction::Assign(lhs, rhs) => {
                let rhs = self.rename_read(rhs, loc, def_in, nondets);
                node.equalities
                    .push(Equality::new(Name::Version(lhs.name(), loc).symbol(lhs.sort()), rhs));
            }
            Instruction::Goto { cond, .. } | Instruction::Assume(cond) if !is_constant(cond) => {
                let rhs = self.rename_read(cond, loc, def_in, nondets);
                node.equalities.push(Equality::new(self.cond_symbol(loc), rhs));
            }
            Instruction::Assert(cond) => {
                let a = self.rename_read(cond, loc, def_in, nondets);
                node.assertions.push(a);
            }
            Instruction::Return(Some(e)) => {
                let rhs = self.rename_read(e, loc, def_in, nondets);
                let sort = self.objects.get(RETURN_VALUE).copied().unwrap_or(e.sort());
                node.equalities
                    .push(Equality::new(Name::Version(RETURN_VALUE, loc).symbol(sort), rhs));
            }
            Instruction::FunctionCall { lhs, function, args } => {
                let args = args
                    .iter()
                    .map(|a| self.rename_read(a, loc, def_in, nondets))
                    .collect();
                node.function_calls.push(FunctionApplication {
                    function: function.clone(),
                    args,
                    result: lhs.as_ref().map(|s| Name::Version(s.name(), loc).symbol(s.sort())),
                    globals_in: self.globals.iter().map(|g| self.version(g, def_in[g])).collect(),
                    globals_out: self
                        .globals
                        .iter()
                        .map(|g| self.version(g, Def::Assignment(loc)))
                        .collect(),
                });
            }
            _ => {}
        }
    }

    fn build_entry_exit(&mut self, function: &GotoFunction) {
        self.params = function
            .params
            .iter()
            .map(|p| Name::Input(p.name()).symbol(p.sort()))
            .collect();

        let mut read = BTreeSet::new();
        let mut note = |e: &Expr| e.visit_symbols(&mut |s| {
            read.insert(s.clone());
        });
        for node in &self.nodes {
            node.equalities.iter().for_each(|e| note(&e.rhs));
            node.constraints.iter().for_each(&mut note);
            node.assertions.iter().for_each(&mut note);
            for call in &node.function_calls {
                call.args.iter().for_each(&mut note);
                for g in &call.globals_in {
                    note(&Expr::var(g.clone()));
                }
            }
        }
        self.globals_in = self
            .globals
            .iter()
            .map(|g| Name::Input(g).symbol(self.objects[g]))
            .filter(|s| read.contains(s))
            .collect();

        let end = self.body.len() - 1;
        let mut out: Vec<&String> = self.globals.iter().collect();
        let return_value = RETURN_VALUE.to_string();
        if self.objects.contains_key(RETURN_VALUE) {
            out.push(&return_value);
        }
        self.globals_out = out
            .into_iter()
            .map(|o| self.version(o, self.defs_in[end][o]))
            .collect();
    }

    fn hoist_assertions_after_loops(&mut self) {
        let mut after: Vec<Expr> = Vec::new();
        for loc in (0..self.body.len()).rev() {
            if self.nodes[loc].loophead.is_some() {
                self.nodes[loc].assertions_after_loop = after.clone();
            }
            let guard = Expr::var(self.guard_symbol(loc));
            let here = self.nodes[loc].assertions.iter().map(|a| guard.clone().implies(a.clone()));
            after = here.chain(after).collect();
        }
    }

    fn version(&self, object: &str, def: Def) -> Symbol {
        let sort = self.objects.get(object).copied().unwrap_or(Sort::Int);
        match def {
            Def::Input => Name::Input(object).symbol(sort),
            Def::Assignment(loc) => Name::Version(object, loc).symbol(sort),
            Def::Phi(loc) => Name::Phi(object, loc).symbol(sort),
        }
    }

    /// Renames reads to the versions in `defs` and replaces nondet values
    /// by fresh symbols.
    fn rename_read(&self, expr: &Expr, loc: Loc, defs: &Defs, nondets: &mut Vec<Symbol>) -> Expr {
        expr.map_leaves(&mut |e| match e {
            Expr::Var(s) => defs.get(s.name()).map(|&d| Expr::var(self.version(s.name(), d))),
            Expr::Nondet(sort) => Some(Expr::var(fresh_nondet(loc, *sort, nondets))),
            _ => None,
        })
    }

    /// Name the SSA was built under.
    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn body(&self) -> &[Instruction] {
        &self.body
    }

    /// Number of locations; the base nodes have ids `0..location_count()`.
    pub fn location_count(&self) -> usize {
        self.body.len()
    }

    pub fn nodes(&self) -> &[SsaNode] {
        &self.nodes
    }

    /// # Panics
    ///
    /// Panics if `id` is not a node of this SSA.
    pub fn node(&self, id: NodeId) -> &SsaNode {
        &self.nodes[id.index()]
    }

    /// Base node of a location.
    pub fn find_node(&self, loc: Loc) -> Option<NodeId> {
        (loc < self.body.len()).then_some(NodeId::new(loc))
    }

    pub(crate) fn push_node(&mut self, node: SsaNode, suffix: &str) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(node);
        self.copy_suffixes.insert(id, suffix.to_string());
        id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut SsaNode {
        &mut self.nodes[id.index()]
    }

    /// Guard of the base node at `loc` (`$guard#loc`).
    pub fn guard_symbol(&self, loc: Loc) -> Symbol {
        Name::Guard(loc).bool()
    }

    /// Guard of a node, taking unwinding copies into account.
    pub fn node_guard(&self, id: NodeId) -> Symbol {
        let guard = self.guard_symbol(self.node(id).location);
        match self.copy_suffixes.get(&id) {
            Some(suffix) => with_unwinding(&guard, suffix),
            None => guard,
        }
    }

    pub fn entry_guard(&self) -> Symbol {
        self.guard_symbol(0)
    }

    pub fn exit_guard(&self) -> Symbol {
        self.guard_symbol(self.body.len() - 1)
    }

    /// Condition symbol of a goto or assumption (`$cond#loc`).
    pub fn cond_symbol(&self, loc: Loc) -> Symbol {
        Name::Cond(loc).bool()
    }

    /// Branch condition of a goto or assumption at `loc`, as used in edge
    /// guards: a constant when the condition is constant, else its
    /// condition symbol.
    pub fn cond_expr(&self, loc: Loc) -> Expr {
        match &self.body[loc] {
            Instruction::Goto { cond, .. } | Instruction::Assume(cond) if is_constant(cond) => cond.clone(),
            Instruction::Goto { .. } | Instruction::Assume(_) => Expr::var(self.cond_symbol(loc)),
            _ => Expr::TRUE,
        }
    }

    /// Condition under which control flows from `from` to `to`.
    pub fn edge_guard(&self, from: Loc, to: Loc) -> Expr {
        let guard = Expr::var(self.guard_symbol(from));
        match &self.body[from] {
            Instruction::Goto { target, .. } if *target == from + 1 => guard,
            Instruction::Goto { target, .. } => {
                let cond = self.cond_expr(from);
                if to == *target {
                    guard.and(cond)
                } else {
                    guard.and(cond.not())
                }
            }
            Instruction::Assume(_) => guard.and(self.cond_expr(from)),
            _ => guard,
        }
    }

    /// Free literal choosing the back edge from `back_edge` at its loop
    /// head (`$guard#ls<back_edge>`).
    pub fn loop_select(&self, back_edge: Loc) -> Symbol {
        Name::LoopSelect(back_edge).bool()
    }

    /// Free symbol standing for the value of `object` arriving over the
    /// back edge from `back_edge` (`x#lb<back_edge>`).
    pub fn loop_back(&self, object: &Symbol, back_edge: Loc) -> Symbol {
        Name::LoopBack(object.name(), back_edge).symbol(object.sort())
    }

    /// Phi version of `object` at `head` (`x#phi<head>`). The symbol is
    /// only defined if `object` is one of [`phi_objects`](Self::phi_objects).
    pub fn phi_symbol(&self, object: &Symbol, head: Loc) -> Symbol {
        Name::Phi(object.name(), head).symbol(object.sort())
    }

    /// Version of `object` read at `loc`.
    pub fn read_rhs(&self, object: &str, loc: Loc) -> Option<Symbol> {
        let def = *self.defs_in.get(loc)?.get(object)?;
        Some(self.version(object, def))
    }

    /// Version of `object` after the instruction at `loc`.
    pub fn read_out(&self, object: &str, loc: Loc) -> Option<Symbol> {
        let def = *self.defs_out.get(loc)?.get(object)?;
        Some(self.version(object, def))
    }

    /// Program objects, as unversioned symbols.
    pub fn objects(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.objects.iter().map(|(name, &sort)| Symbol::new(name.clone(), sort))
    }

    pub fn is_global(&self, object: &str) -> bool {
        self.globals.contains(object)
    }

    /// One entry per back edge, in location order of the back edges.
    pub fn loops(&self) -> &[Loop] {
        &self.loops
    }

    pub fn is_loop_head(&self, loc: Loc) -> bool {
        self.extents.contains_key(&loc)
    }

    /// Locations of the outermost body with the given head.
    pub fn loop_extent(&self, head: Loc) -> Option<RangeInclusive<Loc>> {
        self.extents.get(&head).map(|&end| head..=end)
    }

    /// Sources of the back edges into `head`; empty for other locations.
    ///
    /// # Panics
    ///
    /// Panics if `head` is not a location of the function.
    pub fn back_edges(&self, head: Loc) -> &[Loc] {
        &self.back_preds[head]
    }

    /// Objects merged by a phi at a loop head.
    pub fn phi_objects(&self, head: Loc) -> Vec<Symbol> {
        match self.defs_in.get(head) {
            Some(defs) => defs
                .iter()
                .filter(|(_, def)| **def == Def::Phi(head))
                .map(|(o, _)| Symbol::new(o.clone(), self.objects[o]))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Loop nesting depth of a location.
    pub fn depth(&self, loc: Loc) -> usize {
        self.depth.get(loc).copied().unwrap_or(0)
    }

    /// Location whose node defines `symbol`; `None` for inputs.
    pub fn def_location(&self, symbol: &Symbol) -> Option<Loc> {
        self.def_locations.get(symbol.name()).copied()
    }

    /// Loop nesting depth at which `symbol` is defined.
    pub fn def_depth(&self, symbol: &Symbol) -> usize {
        self.def_location(symbol).map_or(0, |loc| self.depth(loc))
    }

    /// Whether any node records a function application.
    pub fn has_function_calls(&self) -> bool {
        self.nodes.iter().any(|n| !n.function_calls.is_empty())
    }

    /// All nodes as solver constraints.
    pub fn formulas(&self) -> Vec<Expr> {
        self.nodes.iter().flat_map(SsaNode::formulas).collect()
    }

    /// Formulas of the nodes not handed out yet; marks them.
    pub fn take_unmarked_formulas(&mut self) -> Vec<Expr> {
        let mut formulas = Vec::new();
        for node in self.nodes.iter_mut().filter(|n| !n.marked) {
            formulas.extend(node.formulas());
            node.marked = true;
        }
        formulas
    }

    /// Marks every node as handed out.
    pub fn mark_nodes(&mut self) {
        self.nodes.iter_mut().for_each(|n| n.marked = true);
    }

    /// Makes every node count as not yet handed out, e.g. for a fresh solver
    /// session.
    pub fn unmark_nodes(&mut self) {
        self.nodes.iter_mut().for_each(|n| n.marked = false);
    }

    /// Turns every assertion into the constraint `guard => assertion`.
    pub fn assertions_to_constraints(&mut self) {
        for index in 0..self.nodes.len() {
            let guard = Expr::var(self.node_guard(NodeId::new(index)));
            let node = &mut self.nodes[index];
            for a in std::mem::take(&mut node.assertions) {
                node.constraints.push(guard.clone().implies(a));
            }
        }
    }

    /// Literals activating every unwinding added so far.
    pub fn enabling_literals(&self) -> Vec<Expr> {
        self.enabling_exprs.iter().cloned().map(Expr::var).collect()
    }
}

impl fmt::Display for LocalSsa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

fn is_constant(cond: &Expr) -> bool {
    cond.is_true() || cond.is_false()
}

fn fresh_nondet(loc: Loc, sort: Sort, nondets: &mut Vec<Symbol>) -> Symbol {
    let s = Name::Nondet(loc, nondets.len()).symbol(sort);
    nondets.push(s.clone());
    s
}

/// Objects receiving a new version at an instruction.
fn written_objects(instr: &Instruction, globals: &BTreeSet<String>) -> Vec<String> {
    match instr {
        Instruction::Decl(s) | Instruction::Assign(s, _) => vec![s.name().to_string()],
        Instruction::Return(Some(_)) => vec![RETURN_VALUE.to_string()],
        Instruction::FunctionCall { lhs, .. } => lhs
            .iter()
            .map(|s| s.name().to_string())
            .chain(globals.iter().cloned())
            .collect(),
        _ => Vec::new(),
    }
}

fn successors(body: &[Instruction], loc: Loc) -> Vec<Loc> {
    let end = body.len() - 1;
    match &body[loc] {
        Instruction::Goto { cond, target } if cond.is_true() => vec![*target],
        Instruction::Goto { cond, .. } if cond.is_false() => vec![loc + 1],
        Instruction::Goto { target, .. } if *target == loc + 1 => vec![*target],
        Instruction::Goto { target, .. } => vec![*target, loc + 1],
        Instruction::Return(_) => vec![end],
        Instruction::EndFunction => vec![],
        _ => vec![loc + 1],
    }
}

fn validate(name: &str, body: &[Instruction]) -> Result<(), SsaError> {
    let Some(last) = body.last() else {
        return Err(SsaError::EmptyBody {
            function: name.to_string(),
        });
    };
    if *last != Instruction::EndFunction {
        return Err(SsaError::MissingEnd {
            function: name.to_string(),
        });
    }
    for (loc, instr) in body.iter().enumerate() {
        match instr {
            Instruction::Goto { target, .. } if *target >= body.len() => {
                return Err(SsaError::InvalidTarget {
                    function: name.to_string(),
                    location: loc,
                    target: *target,
                });
            }
            Instruction::Other(_) => {
                return Err(SsaError::Unsupported {
                    function: name.to_string(),
                    location: loc,
                    instruction: instr.to_string(),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// Loop bodies must nest and may only be entered through their head.
fn check_reducible(
    name: &str,
    body: &[Instruction],
    extents: &BTreeMap<Loc, Loc>,
    forward_edges: &[(Loc, Loc)],
) -> Result<(), SsaError> {
    let unsupported = |location: Loc, what: String| SsaError::Unsupported {
        function: name.to_string(),
        location,
        instruction: what,
    };
    for (&h1, &e1) in extents {
        for (&h2, &e2) in extents.range(h1 + 1..) {
            if h2 <= e1 && e2 > e1 {
                return Err(unsupported(h2, format!("loop overlapping the loop at {}", h1)));
            }
        }
    }
    for &(from, to) in forward_edges {
        for (&head, &end) in extents {
            if to > head && to <= end && !(head..=end).contains(&from) {
                return Err(unsupported(from, format!("{} (enters the loop at {})", body[from], head)));
            }
        }
    }
    Ok(())
}
