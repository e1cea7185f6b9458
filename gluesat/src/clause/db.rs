//! Database for long clauses.
use partial_ref::{partial, PartialRef};

use crate::context::{
    AssignmentP, ClauseAllocP, ClauseDbP, Context, ImplGraphP, ObserverP, WatchlistsP,
};
use crate::prop::{detach_clause, Reason};

use gluesat_formula::Lit;

use super::header::HEADER_LEN;
use super::{ClauseHeader, ClauseRef};

/// Database for long clauses.
///
/// Removal of entries from the `clauses` field can be delayed, so the clause header's deleted
/// flag needs to be checked when iterating over it. The `garbage_size` field tracks the size of
/// the allocator's dead regions and drives the collection heuristic in [`gc`](super::gc).
#[derive(Default)]
pub struct ClauseDb {
    /// May contain deleted clauses, see above.
    clauses: Vec<ClauseRef>,
    /// Number of live redundant clauses.
    redundant_count: usize,
    /// Number of live irredundant clauses.
    irredundant_count: usize,
    /// Size of deleted but not collected clauses.
    garbage_size: usize,
}

impl ClauseDb {
    /// Add a long clause to the database.
    pub fn add_clause(
        mut ctx: partial!(Context, mut ClauseDbP, mut ClauseAllocP),
        header: ClauseHeader,
        lits: &[Lit],
    ) -> ClauseRef {
        let redundant = header.redundant();

        let cref = ctx.part_mut(ClauseAllocP).add_clause(header, lits);

        let db = ctx.part_mut(ClauseDbP);
        db.clauses.push(cref);
        if redundant {
            db.redundant_count += 1;
        } else {
            db.irredundant_count += 1;
        }

        cref
    }

    /// Delete a long clause from the database.
    ///
    /// This only updates the bookkeeping. Removing the clause's watches, notifying the observer
    /// and checking for reason references is up to the caller, see [`try_delete_clause`].
    pub fn delete_clause(
        mut ctx: partial!(Context, mut ClauseDbP, mut ClauseAllocP),
        cref: ClauseRef,
    ) {
        let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
        let db = ctx.part_mut(ClauseDbP);

        let header = alloc.header_mut(cref);

        debug_assert!(!header.deleted(), "delete_clause for already deleted clause");

        header.set_deleted(true);

        if header.redundant() {
            db.redundant_count -= 1;
        } else {
            db.irredundant_count -= 1;
        }

        db.garbage_size += header.len() + HEADER_LEN;
    }

    /// The number of live redundant clauses.
    pub fn redundant_count(&self) -> usize {
        self.redundant_count
    }

    /// The number of live irredundant clauses.
    pub fn irredundant_count(&self) -> usize {
        self.irredundant_count
    }

    /// All clause references ever handed out and not yet collected.
    ///
    /// Contains deleted clauses, check the header when iterating.
    pub fn clauses(&self) -> &[ClauseRef] {
        &self.clauses
    }

    /// Size of the allocator's dead regions in multiples of `LitIdx`.
    pub fn garbage_size(&self) -> usize {
        self.garbage_size
    }

    /// Account for a region that became dead without a clause deletion, e.g. by shrinking a
    /// clause in place.
    pub fn add_garbage(&mut self, size: usize) {
        self.garbage_size += size;
    }

    pub(super) fn clauses_mut(&mut self) -> &mut Vec<ClauseRef> {
        &mut self.clauses
    }

    pub(super) fn set_clauses(&mut self, clauses: Vec<ClauseRef>) {
        self.clauses = clauses;
    }

    pub(super) fn reset_garbage(&mut self) {
        self.garbage_size = 0;
    }
}

/// Delete a clause unless it is required as a reason.
///
/// A clause that is the reason of an assigned variable above level 0 must not be deleted. When
/// the propagated variable is a proven unit, the reason is rewritten to a unit fact and the
/// clause can go.
///
/// Returns whether the clause was deleted. On deletion the watches are removed and the observer
/// is notified.
pub fn try_delete_clause(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ObserverP,
        mut WatchlistsP,
        AssignmentP,
    ),
    cref: ClauseRef,
) -> bool {
    let propagated = ctx.part(ClauseAllocP).clause(cref).lits()[0];

    if ctx.part(AssignmentP).lit_is_true(propagated)
        && ctx.part(ImplGraphP).reason(propagated.var()) == &Reason::Long(cref)
    {
        if ctx.part(ImplGraphP).level(propagated.var()) == 0 {
            ctx.part_mut(ImplGraphP)
                .update_reason(propagated.var(), Reason::Unit);
        } else {
            return false;
        }
    }

    detach_clause(ctx.borrow(), cref);

    let (observer, mut ctx) = ctx.split_part_mut(ObserverP);
    observer.deleted_clause(ctx.part(ClauseAllocP).clause(cref).lits());

    ClauseDb::delete_clause(ctx.borrow(), cref);

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;
    use proptest::*;

    use gluesat_formula::strategy::*;

    proptest! {
        #[test]
        fn count_tracking(
            input_irred in cnf_formula(1..100usize, 0..100usize, 3..30),
            input_red in cnf_formula(1..100usize, 0..100usize, 3..30),
        ) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            let mut crefs = vec![];

            for lits in input_irred.iter() {
                let header = ClauseHeader::new();
                crefs.push(ClauseDb::add_clause(ctx.borrow(), header, lits));
            }

            for lits in input_red.iter() {
                let mut header = ClauseHeader::new();
                header.set_redundant(true);
                crefs.push(ClauseDb::add_clause(ctx.borrow(), header, lits));
            }

            prop_assert_eq!(ctx.part(ClauseDbP).irredundant_count(), input_irred.len());
            prop_assert_eq!(ctx.part(ClauseDbP).redundant_count(), input_red.len());

            for cref in crefs {
                ClauseDb::delete_clause(ctx.borrow(), cref);
            }

            prop_assert_eq!(ctx.part(ClauseDbP).irredundant_count(), 0);
            prop_assert_eq!(ctx.part(ClauseDbP).redundant_count(), 0);
            prop_assert!(ctx.part(ClauseDbP).garbage_size() > 0 || input_irred.len() + input_red.len() == 0);
        }
    }
}
