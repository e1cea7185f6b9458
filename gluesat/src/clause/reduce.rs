//! Learned clause reduction.
//!
//! The redundant clause database grows with every conflict and is periodically cut back to half
//! its size. Clauses are kept by quality: low glue first, high activity as tie break. Some
//! clauses are never deleted in a reduction:
//!
//! - clauses with glue <= 2, which are almost as valuable as binary clauses,
//! - clauses that are currently the reason of an assigned variable,
//! - clauses involved in a conflict since the last reduction (their `active` bit is set).
//!
//! The reason check is repeated inside [`try_delete_clause`](super::db::try_delete_clause), which
//! also rewrites level 0 reasons to unit facts before freeing a clause.
use log::debug;

use ordered_float::OrderedFloat;

use partial_ref::{partial, PartialRef};

use crate::context::{
    AssignmentP, ClauseAllocP, ClauseDbP, Context, ImplGraphP, ObserverP, TrailP, WatchlistsP,
};
use crate::prop::Reason;

use super::db::try_delete_clause;
use super::gc::collect_garbage;
use super::ClauseRef;

/// Glue level at or below which a redundant clause is never reduced.
const PINNED_GLUE: usize = 2;

/// Delete roughly half of the redundant long clauses.
pub fn reduce(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ObserverP,
        mut WatchlistsP,
        AssignmentP,
        TrailP,
    ),
) {
    // Mark reason clauses so the candidate scan can skip them.
    mark_reasons(ctx.borrow(), true);

    let mut candidates: Vec<ClauseRef> = vec![];

    {
        let (alloc, ctx) = ctx.split_part_mut(ClauseAllocP);
        for &cref in ctx.part(ClauseDbP).clauses().iter() {
            let header = alloc.header_mut(cref);
            if header.deleted() || !header.redundant() {
                continue;
            }
            if header.mark() || header.glue() <= PINNED_GLUE {
                continue;
            }
            if header.active() {
                // Recently used clauses get one more round.
                header.set_active(false);
                continue;
            }
            candidates.push(cref);
        }
    }

    {
        let alloc = ctx.part(ClauseAllocP);
        candidates.sort_unstable_by_key(|&cref| {
            let header = alloc.header(cref);
            (header.glue(), OrderedFloat(-header.activity()))
        });
    }

    let keep = (candidates.len() + 1) / 2;
    let mut deleted = 0;

    for &cref in &candidates[keep..] {
        if try_delete_clause(ctx.borrow(), cref) {
            deleted += 1;
        }
    }

    mark_reasons(ctx.borrow(), false);

    debug!(
        "reduce: deleted {} of {} candidate clauses, {} redundant remain",
        deleted,
        candidates.len(),
        ctx.part(ClauseDbP).redundant_count()
    );

    collect_garbage(ctx.borrow());
}

/// Set or clear the mark bit on every clause that is currently a reason.
fn mark_reasons(
    mut ctx: partial!(Context, mut ClauseAllocP, ImplGraphP, TrailP),
    mark: bool,
) {
    let (alloc, ctx) = ctx.split_part_mut(ClauseAllocP);
    let impl_graph = ctx.part(ImplGraphP);
    for &lit in ctx.part(TrailP).trail() {
        if let &Reason::Long(cref) = impl_graph.reason(lit.var()) {
            alloc.header_mut(cref).set_mark(mark);
        }
    }
}
