//! Simplification of the clause database between search episodes.
//!
//! Three operations run at decision level 0:
//!
//! - *unit closure*: propagate all proven literals, turn their reasons into unit facts and
//!   remove satisfied clauses and false literals ([`prove_units`], [`clean_satisfied`]),
//! - *equivalent literal replacement*: strongly connected components of the binary implication
//!   graph are collapsed onto one representative ([`scc`]),
//! - *subsumption and self-subsuming resolution* over long clauses ([`subsume`]).
//!
//! Every run carries a work budget counted in bogo-props. Passes stop when the budget is
//! exhausted; all rewriting is done clause by clause, so stopping early never leaves the watcher
//! or reason invariants broken.
use log::debug;

use partial_ref::{partial, PartialRef};

use gluesat_formula::Lit;

use crate::clause::{ClauseDb, ClauseRef};
use crate::context::{
    AssignmentP, ClauseAllocP, ClauseDbP, Context, ImplGraphP, ObserverP, SimplifyP,
    SolverConfigP, SolverStateP, TmpDataP, TrailP, VariablesP, WatchlistsP,
};
use crate::prop::{attach_clause, detach_clause, propagate, Reason, Watch};
use crate::state::SatState;

pub mod scc;
pub mod subsume;

/// Work budget and statistics of the simplifier.
#[derive(Default)]
pub struct Simplify {
    /// Remaining work budget for the current run, in bogo-props.
    budget: i64,
    /// Clauses removed because another clause subsumes them.
    pub subsumed: u64,
    /// Literals removed by self-subsuming resolution.
    pub strengthened: u64,
    /// Variables replaced by equivalent literals.
    pub replaced_vars: u64,
}

impl Simplify {
    /// Start a new run with a fresh budget.
    pub fn begin(&mut self, budget: u64) {
        self.budget = budget as i64;
    }

    /// Account for work done. Returns `false` when the budget is used up.
    pub fn charge(&mut self, amount: u64) -> bool {
        self.budget -= amount as i64;
        self.budget >= 0
    }

    /// Whether the budget for the current run is used up.
    pub fn out_of_budget(&self) -> bool {
        self.budget < 0
    }
}

/// Turn all level 0 assignments into unit facts and clear them from the trail.
///
/// The reasons of the proven literals are rewritten to unit facts, so no clause is referenced as
/// a reason afterwards and clause deletion does not have to check level 0 assignments. Each
/// proven literal is reported to the observer once.
///
/// Returns whether any new units were proven.
pub fn prove_units(
    mut ctx: partial!(Context, mut ImplGraphP, mut ObserverP, mut TrailP),
) -> bool {
    let mut new_unit = false;

    if ctx.part(TrailP).current_level() == 0 {
        let (impl_graph, mut ctx) = ctx.split_part_mut(ImplGraphP);
        let (observer, mut ctx) = ctx.split_part_mut(ObserverP);
        let trail = ctx.part_mut(TrailP);

        for &lit in trail.trail() {
            new_unit = true;
            if !impl_graph.reason(lit.var()).is_source() {
                impl_graph.update_reason(lit.var(), Reason::Unit);
            }
            observer.unit(lit);
        }

        trail.clear();
    }

    new_unit
}

/// Remove clauses satisfied at level 0 and strip false literals.
///
/// Requires a fully propagated trail at level 0. Afterwards no attached clause contains an
/// assigned literal, which is the invariant the search and the simplifier passes rely on.
pub fn clean_satisfied(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ObserverP,
        mut WatchlistsP,
        AssignmentP,
        TrailP,
    ),
) {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);
    debug_assert!(ctx.part(TrailP).fully_propagated());

    clean_implicit_clauses(ctx.borrow());
    clean_long_clauses(ctx.borrow());
}

/// The implicit clause part of [`clean_satisfied`].
fn clean_implicit_clauses(
    mut ctx: partial!(
        Context,
        mut ObserverP,
        mut WatchlistsP,
        AssignmentP,
    ),
) {
    let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
    let assignment = ctx.part(AssignmentP);

    // Ternary clauses with one false literal become binary.
    let mut strengthened: Vec<([Lit; 3], bool)> = vec![];
    let mut removed_binaries = 0;
    let mut removed_ternaries = 0;

    for code in 0..watchlists.list_count() {
        let own = !Lit::from_code(code);
        watchlists.by_code_mut(code).retain(|watch| match *watch {
            Watch::Binary { implied, .. } => {
                if assignment.lit_is_true(own) || assignment.lit_is_true(implied) {
                    if own.code() < implied.code() {
                        removed_binaries += 1;
                    }
                    false
                } else {
                    debug_assert!(assignment.lit_is_unk(own));
                    debug_assert!(assignment.lit_is_unk(implied));
                    true
                }
            }
            Watch::Ternary {
                other: [a, b],
                redundant,
            } => {
                if assignment.lit_is_true(own)
                    || assignment.lit_is_true(a)
                    || assignment.lit_is_true(b)
                {
                    let min_code = own.code().min(a.code()).min(b.code());
                    if own.code() == min_code {
                        removed_ternaries += 1;
                    }
                    false
                } else if assignment.lit_is_false(own) {
                    // This copy owns the false literal and is responsible for the shrunk
                    // binary clause.
                    strengthened.push(([own, a, b], redundant));
                    removed_ternaries += 1;
                    false
                } else if assignment.lit_is_false(a) || assignment.lit_is_false(b) {
                    false
                } else {
                    true
                }
            }
            Watch::Long { .. } => true,
        });
    }

    watchlists.sub_counts(removed_binaries, removed_ternaries);

    let (observer, _) = ctx.split_part_mut(ObserverP);
    for &([own, a, b], redundant) in strengthened.iter() {
        observer.added_clause(&[a, b]);
        observer.deleted_clause(&[own, a, b]);
        watchlists.add_binary([a, b], redundant);
    }
}

/// The long clause part of [`clean_satisfied`].
fn clean_long_clauses(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ObserverP,
        mut WatchlistsP,
        AssignmentP,
    ),
) {
    let live: Vec<ClauseRef> = {
        let alloc = ctx.part(ClauseAllocP);
        ctx.part(ClauseDbP)
            .clauses()
            .iter()
            .copied()
            .filter(|&cref| !alloc.header(cref).deleted())
            .collect()
    };

    for cref in live {
        let (satisfied, false_count) = {
            let assignment = ctx.part(AssignmentP);
            let lits = ctx.part(ClauseAllocP).clause(cref).lits();
            let satisfied = lits.iter().any(|&lit| assignment.lit_is_true(lit));
            let false_count = lits
                .iter()
                .filter(|&&lit| assignment.lit_is_false(lit))
                .count();
            (satisfied, false_count)
        };

        if satisfied {
            detach_clause(ctx.borrow(), cref);
            let (observer, mut ctx) = ctx.split_part_mut(ObserverP);
            observer.deleted_clause(ctx.part(ClauseAllocP).clause(cref).lits());
            ClauseDb::delete_clause(ctx.borrow(), cref);
            continue;
        }

        if false_count == 0 {
            continue;
        }

        detach_clause(ctx.borrow(), cref);

        let (old_lits, new_len) = {
            let mut inner: partial!(Context, mut ClauseAllocP, AssignmentP) = ctx.borrow();
            let (alloc, inner) = inner.split_part_mut(ClauseAllocP);
            let assignment = inner.part(AssignmentP);

            let clause = alloc.clause_mut(cref);
            let lits = clause.lits_mut();
            let old_lits = lits.to_vec();

            let mut write = 0;
            for read in 0..lits.len() {
                let lit = lits[read];
                if !assignment.lit_is_false(lit) {
                    lits[write] = lit;
                    write += 1;
                }
            }
            clause.header_mut().set_len(write);
            (old_lits, write)
        };

        ctx.part_mut(ClauseDbP)
            .add_garbage(old_lits.len() - new_len);

        {
            let (observer, mut ctx) = ctx.split_part_mut(ObserverP);
            observer.added_clause(ctx.part(ClauseAllocP).clause(cref).lits());
            observer.deleted_clause(&old_lits);
        }

        match new_len {
            // Cannot occur after full propagation: an empty clause would have been a conflict
            // and a unit clause would have been propagated and removed as satisfied.
            0 | 1 => unreachable!(),
            2 => {
                let redundant = ctx.part(ClauseAllocP).header(cref).redundant();
                let lits = {
                    let lits = ctx.part(ClauseAllocP).clause(cref).lits();
                    [lits[0], lits[1]]
                };
                ctx.part_mut(WatchlistsP).add_binary(lits, redundant);
                ClauseDb::delete_clause(ctx.borrow(), cref);
            }
            3 => {
                let redundant = ctx.part(ClauseAllocP).header(cref).redundant();
                let lits = {
                    let lits = ctx.part(ClauseAllocP).clause(cref).lits();
                    [lits[0], lits[1], lits[2]]
                };
                ctx.part_mut(WatchlistsP).add_ternary(lits, redundant);
                ClauseDb::delete_clause(ctx.borrow(), cref);
            }
            _ => attach_clause(ctx.borrow(), cref),
        }
    }
}

/// Enqueue a literal proven by a simplifier rewrite.
///
/// A literal already false at level 0 makes the formula unsatisfiable.
pub(crate) fn enqueue_proven_unit(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut SolverStateP,
        mut TrailP,
    ),
    lit: Lit,
) {
    match ctx.part(AssignmentP).lit_value(lit) {
        None => {
            crate::prop::enqueue_assignment(ctx.borrow(), lit, Reason::Unit);
        }
        Some(true) => {}
        Some(false) => {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
        }
    }
}

/// Propagate to fixpoint at level 0 and re-establish the level 0 invariants.
///
/// Returns `false` when a conflict proves the formula unsatisfiable.
pub fn unit_closure(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ObserverP,
        mut SolverStateP,
        mut TrailP,
        mut WatchlistsP,
    ),
) -> bool {
    if propagate(ctx.borrow()).is_err() {
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
        return false;
    }

    if prove_units(ctx.borrow()) {
        clean_satisfied(ctx.borrow());
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use crate::context::set_var_count;
    use crate::load::load_clause;

    #[test]
    fn unit_closure_cleans_all_clause_kinds() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 8);
        for clause in cnf![1, 2; -1, 3, 4; -1, 5, 6, 7; 2, 5; 3, 4, 8;].iter() {
            load_clause(ctx.borrow(), clause);
        }
        load_clause(ctx.borrow(), &lits![1]);

        assert!(unit_closure(ctx.borrow()));

        // (1 2) is satisfied, (2 5) survives, (-1 3 4) shrinks to the binary (3 4), (-1 5 6 7)
        // to the ternary (5 6 7) and (3 4 8) is untouched.
        assert_eq!(ctx.part(WatchlistsP).binary_count(), 2);
        assert_eq!(ctx.part(WatchlistsP).ternary_count(), 2);
        assert_eq!(ctx.part(ClauseDbP).irredundant_count(), 0);
        assert!(ctx.part(TrailP).trail().is_empty());
        assert_eq!(ctx.part(TrailP).top_level_assignment_count(), 1);
    }

    #[test]
    fn satisfied_clauses_are_dropped() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 6);
        for clause in cnf![1, 2; 1, 3, 4; 1, 3, 4, 5; -1, 2, 5, 6;].iter() {
            load_clause(ctx.borrow(), clause);
        }
        load_clause(ctx.borrow(), &lits![1]);

        assert!(unit_closure(ctx.borrow()));

        assert_eq!(ctx.part(WatchlistsP).binary_count(), 0);
        assert_eq!(ctx.part(WatchlistsP).ternary_count(), 1);
        assert_eq!(ctx.part(ClauseDbP).irredundant_count(), 0);
    }

    #[test]
    fn simplification_is_idempotent() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 9);
        for clause in cnf![
            -1, 2; -2, 1;
            2, 3, 4, 9;
            2, 3, 4;
            1, 3, 4, 5;
            -3, 5, 6, 7;
            5, 8;
        ]
        .iter()
        {
            load_clause(ctx.borrow(), clause);
        }

        run_simplify(ctx.borrow());
        let after_first = (
            ctx.part(WatchlistsP).binary_count(),
            ctx.part(WatchlistsP).ternary_count(),
            ctx.part(ClauseDbP).irredundant_count(),
            ctx.part(TrailP).top_level_assignment_count(),
        );

        run_simplify(ctx.borrow());
        let after_second = (
            ctx.part(WatchlistsP).binary_count(),
            ctx.part(WatchlistsP).ternary_count(),
            ctx.part(ClauseDbP).irredundant_count(),
            ctx.part(TrailP).top_level_assignment_count(),
        );

        assert_eq!(after_first, after_second);
    }
}

/// Run a full simplification pass.
///
/// Requires decision level 0; the search loop does a full restart before scheduling this.
pub fn run_simplify(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ObserverP,
        mut SimplifyP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let budget = ctx.part(SolverConfigP).simplify_budget;
    ctx.part_mut(SimplifyP).begin(budget);

    if !unit_closure(ctx.borrow()) {
        return;
    }

    if ctx.part(SolverConfigP).enable_scc {
        loop {
            if ctx.part(SimplifyP).out_of_budget()
                || ctx.part(SolverStateP).interrupt_requested()
            {
                break;
            }
            let changed = scc::replace_equivalent(ctx.borrow());
            if ctx.part(SolverStateP).sat_state == SatState::Unsat || !unit_closure(ctx.borrow())
            {
                return;
            }
            if !changed {
                break;
            }
        }
    }

    if ctx.part(SolverConfigP).enable_subsumption {
        loop {
            if ctx.part(SimplifyP).out_of_budget()
                || ctx.part(SolverStateP).interrupt_requested()
            {
                break;
            }
            let changed = subsume::run(ctx.borrow());
            if ctx.part(SolverStateP).sat_state == SatState::Unsat || !unit_closure(ctx.borrow())
            {
                return;
            }
            if !changed {
                break;
            }
        }
    }

    // Rewriting leaves dead regions in the clause allocator.
    crate::clause::gc::collect_garbage(ctx.borrow());

    let simplify = ctx.part(SimplifyP);
    debug!(
        "simplify: {} vars replaced, {} clauses subsumed, {} lits strengthened away, budget left: {}",
        simplify.replaced_vars, simplify.subsumed, simplify.strengthened, simplify.budget.max(0)
    );
}
