//! Garbage collection of long clauses.
//!
//! The allocator cannot free individual clauses, so deleted clauses keep occupying buffer space
//! until enough garbage accumulated. Collection copies all live clauses into a fresh allocator
//! and remaps every stored [`ClauseRef`] in one pass: the database's clause list, all long
//! watches and all long reasons of assigned variables. No pre-collection reference may be used
//! after this returns.
use log::debug;

use partial_ref::{partial, PartialRef};

use rustc_hash::FxHashMap;

use crate::context::{ClauseAllocP, ClauseDbP, Context, ImplGraphP, TrailP, WatchlistsP};
use crate::prop::Reason;

use super::{ClauseAlloc, ClauseRef};

/// Perform a garbage collection if enough garbage accumulated.
///
/// Collecting when a fixed fraction of the allocation is garbage amortizes collection costs.
pub fn collect_garbage(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut WatchlistsP,
        TrailP,
    ),
) {
    let alloc = ctx.part(ClauseAllocP);
    let db = ctx.part(ClauseDbP);

    if db.garbage_size() * 2 > alloc.buffer_size() {
        collect_garbage_now(ctx.borrow());
    }
}

/// Unconditionally perform a garbage collection.
pub fn collect_garbage_now(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut WatchlistsP,
        TrailP,
    ),
) {
    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);

    let collected = db.garbage_size();
    let current_size = {
        let alloc = ctx.part(ClauseAllocP);
        assert!(
            collected <= alloc.buffer_size(),
            "Inconsistent garbage tracking in ClauseDb"
        );
        alloc.buffer_size() - collected
    };

    // Allocating just the current size would lead to an immediate growing when new clauses are
    // learned, overallocating here avoids that.
    let mut new_alloc = ClauseAlloc::with_capacity(current_size * 2);

    let mut remap = FxHashMap::<ClauseRef, ClauseRef>::default();
    let mut new_clauses = vec![];

    {
        let alloc = ctx.part(ClauseAllocP);
        for &cref in db.clauses().iter() {
            let clause = alloc.clause(cref);
            let header = clause.header().clone();
            if header.deleted() {
                continue;
            }

            let new_cref = new_alloc.add_clause(header, clause.lits());
            remap.insert(cref, new_cref);
            new_clauses.push(new_cref);
        }
    }

    *ctx.part_mut(ClauseAllocP) = new_alloc;
    db.set_clauses(new_clauses);
    db.reset_garbage();

    ctx.part_mut(WatchlistsP).update_long_refs(|cref| {
        *remap
            .get(&cref)
            .expect("watched clause disappeared during collection")
    });

    let (impl_graph, ctx) = ctx.split_part_mut(ImplGraphP);
    for &lit in ctx.part(TrailP).trail() {
        if let &Reason::Long(cref) = impl_graph.reason(lit.var()) {
            let new_cref = *remap
                .get(&cref)
                .expect("reason clause disappeared during collection");
            impl_graph.update_reason(lit.var(), Reason::Long(new_cref));
        }
    }

    debug!(
        "garbage collection: {} -> {} words",
        current_size + collected,
        current_size
    );
}
