//! The call-site constraint solver.
//!
//! A call produces one equality constraint per argument/parameter pair. The
//! solver works through them with a worklist, unpacking bundles into
//! capability constraints as it goes, and instantiates abstract locations
//! quantified by the callee's signature against the concrete locations of
//! the caller's typing context.
//!
//! Instantiation is a search: when a quantified location cannot be decided
//! from the constraint at hand, the solver branches over every location the
//! typing context currently holds a capability for, in the context's
//! deterministic order, and backtracks on failure. Two guards bound the
//! search: a stall counter fails a state whose whole queue was requeued
//! without progress, and a global fuel budget bounds the work across all
//! branches.

use std::collections::{HashMap, VecDeque};

use cinder_ast::NodeId;

use crate::symbol::Symbol;
use crate::types::{QualTy, SymbolSubst, TyKind, TypeStore, TypingContext};

/// One side of a constraint.
#[derive(Clone, Copy, Debug)]
pub enum Operand {
    /// A qualified type.
    Type(QualTy),
    /// The type bound to a symbol in the typing context.
    Ref(Symbol),
}

/// An equality constraint between two operands.
#[derive(Clone, Copy, Debug)]
pub struct Constraint {
    pub lhs: Operand,
    pub rhs: Operand,
}

/// A successful instantiation of the callee's signature.
#[derive(Clone, Debug)]
pub struct Solution {
    /// Maps each instantiated quantified location to a concrete one.
    pub substitutions: SymbolSubst,
    /// The assumptions the callee requires, with quantified locations
    /// already substituted. Location-referring keys are consumed by the
    /// call.
    pub assumptions: Vec<(Symbol, QualTy)>,
}

/// One state of the backtracking search.
#[derive(Clone)]
struct SearchState {
    queue: VecDeque<Constraint>,
    subst: SymbolSubst,
    assumptions: Vec<(Symbol, QualTy)>,
    /// Constraints requeued since the last step that made progress.
    stalled: usize,
}

enum StepOutcome {
    Solved,
    Unsolvable,
}

pub struct TypeSolver<'a> {
    store: &'a mut TypeStore,
    /// Declaration names, used to recognize quantified symbols.
    names: &'a HashMap<NodeId, String>,
    context: &'a TypingContext,
    quantified: Vec<String>,
    constraints: Vec<Constraint>,
    fuel: u32,
}

impl<'a> TypeSolver<'a> {
    const FUEL: u32 = 4096;

    pub fn new(
        store: &'a mut TypeStore,
        names: &'a HashMap<NodeId, String>,
        context: &'a TypingContext,
        quantified: Vec<String>,
        constraints: Vec<Constraint>,
    ) -> Self {
        TypeSolver {
            store,
            names,
            context,
            quantified,
            constraints,
            fuel: Self::FUEL,
        }
    }

    /// Runs the search. `None` if no instantiation satisfies the
    /// constraints within the fuel budget.
    pub fn solve(mut self) -> Option<Solution> {
        let initial = SearchState {
            queue: std::mem::take(&mut self.constraints).into(),
            subst: SymbolSubst::new(),
            assumptions: Vec::new(),
            stalled: 0,
        };
        let mut stack = vec![initial];

        while let Some(mut state) = stack.pop() {
            match self.run(&mut state, &mut stack) {
                StepOutcome::Solved => return Some(self.finish(state)),
                StepOutcome::Unsolvable => continue,
            }
        }
        None
    }

    /// Collapses substitution chains and applies the final substitution to
    /// the collected assumptions.
    fn finish(&mut self, state: SearchState) -> Solution {
        let mut subst = state.subst;
        let keys: Vec<Symbol> = subst.keys().copied().collect();
        for key in keys {
            let walked = walk(&subst, key);
            subst.insert(key, walked);
        }
        let assumptions = state
            .assumptions
            .iter()
            .map(|&(key, value)| {
                let key = subst.get(&key).copied().unwrap_or(key);
                (key, self.store.substitute_qual(value, &subst))
            })
            .collect();
        Solution {
            substitutions: subst,
            assumptions,
        }
    }

    /// Works through one state's queue. Branching states are pushed onto
    /// `stack` and the current state reports as unsolvable.
    fn run(&mut self, state: &mut SearchState, stack: &mut Vec<SearchState>) -> StepOutcome {
        loop {
            let Some(constraint) = state.queue.pop_front() else {
                return StepOutcome::Solved;
            };
            if self.fuel == 0 {
                return StepOutcome::Unsolvable;
            }
            self.fuel -= 1;

            let lhs = self.decode(constraint.lhs, &state.subst);
            let rhs = self.decode(constraint.rhs, &state.subst);
            let (Some(mut lhs), Some(mut rhs)) = (lhs, rhs) else {
                if self.branch(constraint, state, stack) {
                    return StepOutcome::Unsolvable;
                }
                // Not decidable yet; push it back and hope a later
                // constraint binds what this one needs.
                state.stalled += 1;
                if state.stalled > state.queue.len() {
                    return StepOutcome::Unsolvable;
                }
                state.queue.push_back(constraint);
                continue;
            };
            state.stalled = 0;

            if lhs == rhs {
                continue;
            }

            // Unpack bundles. Assumptions of the right side are demands of
            // the callee: collect them for the caller to consume, and check
            // each against the typing context.
            if let Some((base, bundle)) = self.store.opened(lhs) {
                lhs = base;
                for (key, value) in bundle.iter() {
                    state.queue.push_back(Constraint {
                        lhs: Operand::Ref(key),
                        rhs: Operand::Type(value),
                    });
                }
            }
            if let Some((base, bundle)) = self.store.opened(rhs) {
                rhs = base;
                for (key, value) in bundle.iter() {
                    state.assumptions.push((key, value));
                    state.queue.push_back(Constraint {
                        lhs: Operand::Ref(key),
                        rhs: Operand::Type(value),
                    });
                }
            }

            if !self.unify(lhs, rhs, state) {
                return StepOutcome::Unsolvable;
            }
        }
    }

    /// Attempts to satisfy one decoded constraint, binding a quantified
    /// location when that makes the sides meet.
    fn unify(&mut self, lhs: QualTy, rhs: QualTy, state: &mut SearchState) -> bool {
        if self.store.is_qual_subtype(lhs, rhs) {
            return true;
        }
        if let (&TyKind::Loc(concrete), &TyKind::Loc(abstract_loc)) =
            (self.store.kind(lhs.ty), self.store.kind(rhs.ty))
        {
            if self.is_quantified(abstract_loc) && !state.subst.contains_key(&abstract_loc) {
                state.subst.insert(abstract_loc, concrete);
                return lhs.quals.is_superset(rhs.quals);
            }
        }
        false
    }

    /// If the constraint stalls on an unbound quantified location, forks one
    /// search state per candidate location of the typing context. Returns
    /// whether it branched.
    fn branch(
        &mut self,
        constraint: Constraint,
        state: &SearchState,
        stack: &mut Vec<SearchState>,
    ) -> bool {
        let unbound = [constraint.lhs, constraint.rhs]
            .into_iter()
            .find_map(|operand| match operand {
                Operand::Ref(symbol) => {
                    let walked = walk(&state.subst, symbol);
                    let stuck = self.context.get(walked).is_none()
                        && self.is_quantified(walked)
                        && !state.subst.contains_key(&walked);
                    stuck.then_some(walked)
                }
                Operand::Type(_) => None,
            });
        let Some(unbound) = unbound else {
            return false;
        };

        let candidates: Vec<Symbol> = self
            .context
            .keys()
            .filter(|symbol| symbol.is_loc_ref())
            .collect();
        // Reversed so the first candidate in context order is tried first.
        for candidate in candidates.into_iter().rev() {
            let mut forked = state.clone();
            forked.subst.insert(unbound, candidate);
            forked.queue.push_front(constraint);
            forked.stalled = 0;
            stack.push(forked);
        }
        true
    }

    /// Resolves an operand to a qualified type through the substitution and
    /// the typing context. `None` if the operand refers to a symbol the
    /// context does not bind.
    fn decode(&mut self, operand: Operand, subst: &SymbolSubst) -> Option<QualTy> {
        match operand {
            Operand::Type(ty) => Some(self.store.substitute_qual(ty, subst)),
            Operand::Ref(symbol) => self.context.get(walk(subst, symbol)),
        }
    }

    /// Whether a symbol names one of the quantified parameters being
    /// instantiated.
    fn is_quantified(&self, symbol: Symbol) -> bool {
        match symbol {
            Symbol::Decl { node, .. } => self
                .names
                .get(&node)
                .is_some_and(|name| self.quantified.iter().any(|q| q == name)),
            Symbol::Synth { .. } => false,
        }
    }
}

/// Follows a substitution chain to its last element.
fn walk(subst: &SymbolSubst, symbol: Symbol) -> Symbol {
    let mut current = symbol;
    while let Some(&next) = subst.get(&current) {
        if next == current {
            break;
        }
        current = next;
    }
    current
}
