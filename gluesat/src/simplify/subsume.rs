//! Subsumption and self-subsuming resolution over long clauses.
//!
//! A clause `C` subsumes `D` when every literal of `C` occurs in `D`; `D` is then implied by `C`
//! and removed. When `C` and `D` match except for one literal occurring with opposite polarity,
//! resolving on it yields `D` without that literal, so `D` is strengthened in place. Original
//! clauses act as subsumers, both original and learned clauses are candidates for removal and
//! strengthening.
//!
//! Candidates are enumerated through occurrence lists. A 32 bit abstraction per clause, the or
//! over `1 << (var & 31)` of its literals, rejects most non-matches with a single and. All
//! lookups are charged against the simplifier budget.
use partial_ref::{partial, PartialRef};

use rustc_hash::FxHashMap;

use gluesat_formula::Lit;

use crate::clause::{ClauseDb, ClauseRef};
use crate::context::{
    ClauseAllocP, ClauseDbP, Context, ObserverP, SimplifyP, TmpDataP, WatchlistsP,
};
use crate::prop::{attach_clause, detach_clause};

/// Compute the abstraction bitmask of a clause.
fn abstraction(lits: &[Lit]) -> u32 {
    lits.iter()
        .fold(0, |mask, lit| mask | (1 << (lit.index() & 31)))
}

/// Run one subsumption and strengthening pass.
///
/// Returns whether any clause was removed or strengthened.
pub fn run(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ObserverP,
        mut SimplifyP,
        mut TmpDataP,
        mut WatchlistsP,
    ),
) -> bool {
    let live: Vec<ClauseRef> = {
        let alloc = ctx.part(ClauseAllocP);
        ctx.part(ClauseDbP)
            .clauses()
            .iter()
            .copied()
            .filter(|&cref| !alloc.header(cref).deleted())
            .collect()
    };

    // Occurrence lists and abstractions over all live long clauses.
    let mut occurrences: Vec<Vec<ClauseRef>> =
        vec![vec![]; ctx.part(WatchlistsP).list_count()];
    let mut abstractions: FxHashMap<ClauseRef, u32> = FxHashMap::default();

    {
        let alloc = ctx.part(ClauseAllocP);
        let mut work = 0;
        for &cref in live.iter() {
            let lits = alloc.clause(cref).lits();
            for &lit in lits {
                occurrences[lit.code()].push(cref);
            }
            abstractions.insert(cref, abstraction(lits));
            work += lits.len();
        }
        ctx.part_mut(SimplifyP).charge(work as u64);
    }

    let mut changed = false;

    for &subsumer in live.iter() {
        if ctx.part(SimplifyP).out_of_budget() {
            break;
        }

        {
            let header = ctx.part(ClauseAllocP).header(subsumer);
            // Only original clauses may remove or strengthen others.
            if header.deleted() || header.redundant() {
                continue;
            }
        }

        let sub_lits: Vec<Lit> = ctx.part(ClauseAllocP).clause(subsumer).lits().to_vec();
        let sub_abstraction = abstraction(&sub_lits);
        ctx.part_mut(SimplifyP).charge(sub_lits.len() as u64);

        // Full subsumption: look for candidates through the least common literal of C.
        let pivot = *sub_lits
            .iter()
            .min_by_key(|lit| occurrences[lit.code()].len())
            .unwrap();

        for candidate_pos in 0..occurrences[pivot.code()].len() {
            let candidate = occurrences[pivot.code()][candidate_pos];
            if candidate == subsumer {
                continue;
            }
            if !ctx.part_mut(SimplifyP).charge(1) {
                break;
            }

            if subsumes(ctx.borrow(), &sub_lits, sub_abstraction, candidate, &abstractions) {
                detach_clause(ctx.borrow(), candidate);
                {
                    let (observer, mut ctx) = ctx.split_part_mut(ObserverP);
                    observer.deleted_clause(ctx.part(ClauseAllocP).clause(candidate).lits());
                }
                ClauseDb::delete_clause(ctx.borrow(), candidate);
                ctx.part_mut(SimplifyP).subsumed += 1;
                changed = true;
            }
        }

        // Self-subsuming resolution: one literal of C occurs negated in D.
        for &lit in sub_lits.iter() {
            if ctx.part(SimplifyP).out_of_budget() {
                break;
            }

            for candidate_pos in 0..occurrences[(!lit).code()].len() {
                let candidate = occurrences[(!lit).code()][candidate_pos];
                if !ctx.part_mut(SimplifyP).charge(1) {
                    break;
                }

                if strengthens(
                    ctx.borrow(),
                    &sub_lits,
                    lit,
                    sub_abstraction,
                    candidate,
                    &abstractions,
                ) {
                    strengthen_clause(ctx.borrow(), candidate, !lit);
                    // The clause may have migrated to an implicit representation; if it is
                    // still long its abstraction changed.
                    if !ctx.part(ClauseAllocP).header(candidate).deleted() {
                        let new_abstraction =
                            abstraction(ctx.part(ClauseAllocP).clause(candidate).lits());
                        abstractions.insert(candidate, new_abstraction);
                    }
                    ctx.part_mut(SimplifyP).strengthened += 1;
                    changed = true;
                }
            }
        }
    }

    changed
}

/// Check whether `sub_lits` subsumes the candidate clause.
fn subsumes(
    mut ctx: partial!(Context, mut TmpDataP, ClauseAllocP),
    sub_lits: &[Lit],
    sub_abstraction: u32,
    candidate: ClauseRef,
    abstractions: &FxHashMap<ClauseRef, u32>,
) -> bool {
    let header = ctx.part(ClauseAllocP).header(candidate);
    if header.deleted() || header.len() < sub_lits.len() {
        return false;
    }
    if sub_abstraction & !abstractions[&candidate] != 0 {
        return false;
    }

    let (tmp, ctx) = ctx.split_part_mut(TmpDataP);
    let lits = ctx.part(ClauseAllocP).clause(candidate).lits();

    for &lit in lits {
        tmp.flags[lit.code()] = true;
    }
    let subsumed = sub_lits.iter().all(|&lit| tmp.flags[lit.code()]);
    for &lit in lits {
        tmp.flags[lit.code()] = false;
    }

    subsumed
}

/// Check whether resolving the candidate with `sub_lits` on `lit` strengthens the candidate.
///
/// This holds when the candidate contains `!lit` and all other literals of `sub_lits`.
fn strengthens(
    mut ctx: partial!(Context, mut TmpDataP, ClauseAllocP),
    sub_lits: &[Lit],
    lit: Lit,
    sub_abstraction: u32,
    candidate: ClauseRef,
    abstractions: &FxHashMap<ClauseRef, u32>,
) -> bool {
    let header = ctx.part(ClauseAllocP).header(candidate);
    if header.deleted() || header.len() < sub_lits.len() {
        return false;
    }
    // The abstraction is polarity blind, so it is unchanged by flipping `lit`.
    if sub_abstraction & !abstractions[&candidate] != 0 {
        return false;
    }

    let (tmp, ctx) = ctx.split_part_mut(TmpDataP);
    let lits = ctx.part(ClauseAllocP).clause(candidate).lits();

    for &candidate_lit in lits {
        tmp.flags[candidate_lit.code()] = true;
    }
    let strengthens = tmp.flags[(!lit).code()]
        && sub_lits
            .iter()
            .all(|&sub_lit| sub_lit == lit || tmp.flags[sub_lit.code()]);
    for &candidate_lit in lits {
        tmp.flags[candidate_lit.code()] = false;
    }

    strengthens
}


/// Remove a literal from a long clause.
///
/// The shrunk clause is re-dispatched by size like a freshly added clause.
fn strengthen_clause(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ObserverP,
        mut WatchlistsP,
    ),
    cref: ClauseRef,
    remove: Lit,
) {
    detach_clause(ctx.borrow(), cref);

    let old_lits: Vec<Lit> = ctx.part(ClauseAllocP).clause(cref).lits().to_vec();
    let redundant = ctx.part(ClauseAllocP).header(cref).redundant();
    let new_lits: Vec<Lit> = old_lits.iter().copied().filter(|&l| l != remove).collect();
    debug_assert_eq!(new_lits.len() + 1, old_lits.len());

    {
        let observer = ctx.part_mut(ObserverP);
        observer.added_clause(&new_lits);
        observer.deleted_clause(&old_lits);
    }

    match new_lits[..] {
        [] | [_] => unreachable!("strengthened clauses have at least two literals"),
        [lit_0, lit_1] => {
            ctx.part_mut(WatchlistsP).add_binary([lit_0, lit_1], redundant);
            ClauseDb::delete_clause(ctx.borrow(), cref);
        }
        [lit_0, lit_1, lit_2] => {
            ctx.part_mut(WatchlistsP)
                .add_ternary([lit_0, lit_1, lit_2], redundant);
            ClauseDb::delete_clause(ctx.borrow(), cref);
        }
        ref lits => {
            {
                let clause = ctx.part_mut(ClauseAllocP).clause_mut(cref);
                clause.lits_mut()[..lits.len()].copy_from_slice(lits);
                clause.header_mut().set_len(lits.len());
            }
            ctx.part_mut(ClauseDbP).add_garbage(1);
            attach_clause(ctx.borrow(), cref);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use gluesat_formula::Lit;

    use crate::context::{Context, SimplifyP};
    use crate::load::load_clause;

    fn prepare(ctx: &mut Context, clauses: &[&[Lit]]) {
        let mut ctx = ctx.into_partial_ref_mut();
        let var_count = clauses
            .iter()
            .flat_map(|clause| clause.iter())
            .map(|lit| lit.index() + 1)
            .max()
            .unwrap_or(0);
        crate::context::set_var_count(ctx.borrow(), var_count);
        for &clause in clauses {
            load_clause(ctx.borrow(), clause);
        }
        ctx.part_mut(SimplifyP).begin(1_000_000);
    }

    #[test]
    fn removes_subsumed_clauses() {
        let mut ctx = Context::default();
        prepare(
            &mut ctx,
            &cnf![1, 2, 3, 9; 1, 2, 3, 4, 9; 5, 6, 7, 8;],
        );
        let mut ctx = ctx.into_partial_ref_mut();

        assert_eq!(ctx.part(ClauseDbP).irredundant_count(), 3);
        assert!(run(ctx.borrow()));
        assert_eq!(ctx.part(ClauseDbP).irredundant_count(), 2);
        assert_eq!(ctx.part(SimplifyP).subsumed, 1);

        // Idempotent: nothing left to subsume.
        ctx.part_mut(SimplifyP).begin(1_000_000);
        assert!(!run(ctx.borrow()));
    }

    #[test]
    fn strengthens_via_self_subsuming_resolution() {
        let mut ctx = Context::default();
        // Resolving the two clauses on 4 strengthens the second to (1 2 3 9).
        prepare(
            &mut ctx,
            &cnf![1, 2, 3, 4; 1, 2, 3, -4, 9; 5, 6, 7, 8;],
        );
        let mut ctx = ctx.into_partial_ref_mut();

        assert!(run(ctx.borrow()));
        assert!(ctx.part(SimplifyP).strengthened >= 1);

        let expected: Vec<Lit> = lits![1, 2, 3, 9].to_vec();
        let alloc = ctx.part(ClauseAllocP);
        let found = ctx.part(ClauseDbP).clauses().iter().any(|&cref| {
            if alloc.header(cref).deleted() {
                return false;
            }
            let mut lits = alloc.clause(cref).lits().to_vec();
            lits.sort_unstable();
            lits == expected
        });
        assert!(found);
    }

    #[test]
    fn strengthening_to_ternary_leaves_the_arena() {
        let mut ctx = Context::default();
        prepare(&mut ctx, &cnf![1, 2, 3, 4; -1, 2, 3, 4; 5, 6, 7, 8;]);
        let mut ctx = ctx.into_partial_ref_mut();

        let ternaries_before = ctx.part(WatchlistsP).ternary_count();
        assert!(run(ctx.borrow()));
        assert!(ctx.part(WatchlistsP).ternary_count() > ternaries_before);
    }
}
