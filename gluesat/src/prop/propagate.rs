//! Propagation over the watcher lists.
//!
//! Every assignment on the trail is processed once. Processing the assignment of `lit` scans the
//! watcher list of `lit`, i.e. all watched clauses that contain `!lit` and may have become unit:
//!
//! - a binary watcher decides its clause immediately: the other literal is either satisfied,
//!   propagated or falsified (a conflict),
//! - a ternary watcher likewise inspects the two other literals in place,
//! - a long watcher is skipped when its blocking literal is true; otherwise the clause is loaded
//!   and the watch either moves to a non-false literal of the clause, or the clause is unit or in
//!   conflict.
//!
//! The list is walked with a read and a write cursor: kept watchers are copied through, relocated
//! long watchers are skipped, and on a conflict the unprocessed tail is copied through unchanged
//! before returning. Binary and ternary watchers are always kept, only long watchers ever leave
//! the list.
use std::mem::take;

use partial_ref::{partial, PartialRef};

use gluesat_formula::Lit;

use crate::context::{
    AssignmentP, ClauseAllocP, Context, ImplGraphP, TrailP, WatchlistsP,
};

use super::enqueue_assignment;
use super::{Conflict, Reason, Watch};

/// Propagate all assignments enqueued on the trail.
///
/// Returns the conflicting clause if one is found. The queue is left partially processed in that
/// case; the caller backtracks or reports unsatisfiability, both of which reset the queue.
pub fn propagate(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut TrailP,
        mut WatchlistsP,
    ),
) -> Result<(), Conflict> {
    while let Some(lit) = ctx.part_mut(TrailP).pop_queue() {
        propagate_assignment(ctx.borrow(), lit)?;
    }
    Ok(())
}

/// What to do with a long watcher after inspecting its clause.
enum LongResult {
    /// Keep the watcher, the clause needs no attention.
    Keep(Watch),
    /// The watch moved to the list of the given literal.
    Relocated(Lit, Watch),
    /// The clause is unit, keep the watcher and propagate the literal.
    Propagate(Lit, Watch),
    /// All literals are false, keep the watcher and report the conflict.
    Conflict(Watch),
}

/// Process all watchers of a single assigned literal.
fn propagate_assignment(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut TrailP,
        mut WatchlistsP,
    ),
    lit: Lit,
) -> Result<(), Conflict> {
    let false_lit = !lit;

    // Taking the list out lets us enqueue assignments and relocate watchers to other lists while
    // scanning it. Relocation never targets this list: the new watched literal is non-false
    // while `lit` is true.
    let mut watches = take(ctx.part_mut(WatchlistsP).watched_by_mut(lit));

    let mut read = 0;
    let mut write = 0;
    let mut result = Ok(());

    while read < watches.len() {
        let watch = watches[read];
        read += 1;

        match watch {
            Watch::Binary { implied, .. } => {
                watches[write] = watch;
                write += 1;

                let assignment = ctx.part(AssignmentP);
                if assignment.lit_is_true(implied) {
                    continue;
                } else if assignment.lit_is_unk(implied) {
                    enqueue_assignment(ctx.borrow(), implied, Reason::Binary([false_lit]));
                } else {
                    result = Err(Conflict::Binary([implied, false_lit]));
                    break;
                }
            }
            Watch::Ternary { other: [a, b], .. } => {
                watches[write] = watch;
                write += 1;

                let assignment = ctx.part(AssignmentP);
                if assignment.lit_is_true(a) || assignment.lit_is_true(b) {
                    continue;
                }
                match (assignment.lit_is_false(a), assignment.lit_is_false(b)) {
                    (true, true) => {
                        result = Err(Conflict::Ternary([a, b, false_lit]));
                        break;
                    }
                    (false, true) => {
                        enqueue_assignment(ctx.borrow(), a, Reason::Ternary([b, false_lit]));
                    }
                    (true, false) => {
                        enqueue_assignment(ctx.borrow(), b, Reason::Ternary([a, false_lit]));
                    }
                    // Two non-false literals left, nothing to do.
                    (false, false) => {}
                }
            }
            Watch::Long { cref, blocker } => {
                // If the blocking literal (which is part of the watched clause) is already true,
                // the clause is satisfied and we don't even have to look at it.
                if ctx.part(AssignmentP).lit_is_true(blocker) {
                    watches[write] = watch;
                    write += 1;
                    continue;
                }

                let long_result = {
                    let mut inner: partial!(Context, mut ClauseAllocP, AssignmentP) = ctx.borrow();
                    let (alloc, inner) = inner.split_part_mut(ClauseAllocP);
                    let assignment = inner.part(AssignmentP);

                    let lits = alloc.clause_mut(cref).lits_mut();

                    // Ensure the falsified watched literal is in position 1. This establishes
                    // the literal order for a possible propagation, where the propagated literal
                    // has to end up in position 0.
                    if lits[0] == false_lit {
                        lits.swap(0, 1);
                    }
                    let first = lits[0];

                    // The retained or relocated watch uses the other watched literal as the new
                    // blocking literal.
                    let new_watch = Watch::Long {
                        cref,
                        blocker: first,
                    };

                    if first != blocker && assignment.lit_is_true(first) {
                        LongResult::Keep(new_watch)
                    } else {
                        // Look for a non-false unwatched literal to take over the watch.
                        let mut relocated = None;
                        for pos in 2..lits.len() {
                            let rest_lit = lits[pos];
                            if !assignment.lit_is_false(rest_lit) {
                                lits[1] = rest_lit;
                                lits[pos] = false_lit;
                                relocated = Some(rest_lit);
                                break;
                            }
                        }

                        match relocated {
                            Some(rest_lit) => LongResult::Relocated(!rest_lit, new_watch),
                            None if assignment.lit_is_false(first) => {
                                LongResult::Conflict(new_watch)
                            }
                            None => LongResult::Propagate(first, new_watch),
                        }
                    }
                };

                match long_result {
                    LongResult::Keep(new_watch) => {
                        watches[write] = new_watch;
                        write += 1;
                    }
                    LongResult::Relocated(target, new_watch) => {
                        debug_assert_ne!(target, lit);
                        ctx.part_mut(WatchlistsP).add_watch(target, new_watch);
                    }
                    LongResult::Propagate(first, new_watch) => {
                        watches[write] = new_watch;
                        write += 1;
                        enqueue_assignment(ctx.borrow(), first, Reason::Long(cref));
                    }
                    LongResult::Conflict(new_watch) => {
                        watches[write] = new_watch;
                        write += 1;
                        result = Err(Conflict::Long(cref));
                        break;
                    }
                }
            }
        }
    }

    // On a conflict the unprocessed watchers are preserved unchanged.
    while read < watches.len() {
        watches[write] = watches[read];
        write += 1;
        read += 1;
    }
    watches.truncate(write);
    *ctx.part_mut(WatchlistsP).watched_by_mut(lit) = watches;

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use crate::context::set_var_count;
    use crate::load::load_clause;
    use crate::prop::backtrack;

    fn ctx_with_clauses(var_count: usize, clauses: &[&[Lit]]) -> Box<Context> {
        let mut ctx = Box::new(Context::default());
        {
            let mut ctx_ref = ctx.into_partial_ref_mut();
            set_var_count(ctx_ref.borrow(), var_count);
            for &clause in clauses {
                load_clause(ctx_ref.borrow(), clause);
            }
        }
        ctx
    }

    #[test]
    fn binary_chain_propagates() {
        let mut ctx = ctx_with_clauses(5, &cnf![-1, 2; -2, 3; -3, 4;]);
        let mut ctx = ctx.into_partial_ref_mut();

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(1), Reason::Decision);

        assert!(propagate(ctx.borrow()).is_ok());

        for lit in &lits![1, 2, 3, 4] {
            assert!(ctx.part(AssignmentP).lit_is_true(*lit));
        }
        assert!(ctx.part(AssignmentP).lit_is_unk(lit!(5)));
    }

    #[test]
    fn ternary_propagates_and_conflicts() {
        let mut ctx = ctx_with_clauses(3, &cnf![1, 2, 3;]);
        let mut ctx = ctx.into_partial_ref_mut();

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-1), Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-2), Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());
        assert!(ctx.part(AssignmentP).lit_is_true(lit!(3)));

        assert_eq!(
            ctx.part(ImplGraphP).reason(var!(3)),
            &Reason::Ternary([lit!(1), lit!(2)])
        );

        backtrack(ctx.borrow(), 0);

        // Assigning all three literals false now yields a ternary conflict.
        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-3), Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());
        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-1), Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());
        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-2), Reason::Decision);

        match propagate(ctx.borrow()) {
            Err(Conflict::Ternary(_)) => {}
            other => panic!("expected ternary conflict, got {:?}", other.err()),
        }
    }

    #[test]
    fn long_clause_watch_relocation() {
        let mut ctx = ctx_with_clauses(4, &cnf![1, 2, 3, 4;]);
        let mut ctx = ctx.into_partial_ref_mut();

        // Falsify both watched literals; the watches must move on.
        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-1), Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());
        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-2), Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());
        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-3), Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());

        // Only one non-false literal left, so it was propagated.
        assert!(ctx.part(AssignmentP).lit_is_true(lit!(4)));

        backtrack(ctx.borrow(), 0);

        // After relocation the clause is still propagating in new situations.
        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-4), Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());
        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-2), Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());
        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-3), Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());
        assert!(ctx.part(AssignmentP).lit_is_true(lit!(1)));
    }
}
