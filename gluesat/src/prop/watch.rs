//! Watcher lists for detecting clauses that became unit.
//!
//! For every literal there is one list of watchers. The list of `lit` is scanned whenever `lit`
//! becomes true, so it holds one watcher for every watched occurrence of `!lit`:
//!
//! - binary and ternary clauses are not stored anywhere else; every literal of such a clause
//!   watches it, so the clause is fully described by the watcher entries,
//! - long clauses live in the clause allocator and are watched by exactly their first two
//!   literals. A long watcher also carries a blocking literal, some other literal of the clause:
//!   when it is already true the clause is satisfied and does not have to be loaded at all (see
//!   [Niklas Sörensson and Niklas Eén, "MINISAT 2.1 and MINISAT++ 1.0 — SAT Race 2008
//!   Editions"][minisat-2.1]).
//!
//! When a watched literal of a long clause is assigned false, the watch either moves to another
//! non-false literal of the clause (permuting the clause so positions 0 and 1 stay the watched
//! ones) or the clause is unit or in conflict. Binary and ternary watchers never move. There is
//! no need to update any watcher on backtracking.
//!
//! See [Section 4.5.1 of the "Handbook of Satisfiability"][handbook-ch4] for more details and
//! references.
//!
//! [handbook-ch4]: https://www.satassociation.org/articles/FAIA185-0131.pdf
//! [minisat-2.1]: https://www.cril.univ-artois.fr/SAT09/solvers/booklet.pdf
use partial_ref::{partial, PartialRef};

use gluesat_formula::Lit;

use crate::clause::ClauseRef;
use crate::context::{ClauseAllocP, Context, WatchlistsP};

/// A watcher in some literal's watch list.
///
/// The literal owning the list is implicit: an entry in the list of `lit` belongs to a clause
/// containing `!lit`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Watch {
    /// Implicit binary clause `(!owner | implied)`.
    Binary { implied: Lit, redundant: bool },
    /// Implicit ternary clause `(!owner | other[0] | other[1])`.
    Ternary { other: [Lit; 2], redundant: bool },
    /// Long clause which has `!owner` in position 0 or 1.
    Long { cref: ClauseRef, blocker: Lit },
}

/// Watcher lists for all literals.
#[derive(Default)]
pub struct Watchlists {
    /// Indexed by literal code.
    watches: Vec<Vec<Watch>>,
    binary_count: usize,
    ternary_count: usize,
}

impl Watchlists {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.watches.resize(count * 2, vec![]);
    }

    /// Number of watcher lists, i.e. two per variable.
    pub fn list_count(&self) -> usize {
        self.watches.len()
    }

    /// Watchers to process when `lit` becomes true.
    pub fn watched_by(&self, lit: Lit) -> &[Watch] {
        &self.watches[lit.code()]
    }

    /// Mutable watcher list of a literal.
    pub fn watched_by_mut(&mut self, lit: Lit) -> &mut Vec<Watch> {
        &mut self.watches[lit.code()]
    }

    /// Watcher list by literal code.
    pub fn by_code(&self, code: usize) -> &[Watch] {
        &self.watches[code]
    }

    /// Mutable watcher list by literal code.
    pub fn by_code_mut(&mut self, code: usize) -> &mut Vec<Watch> {
        &mut self.watches[code]
    }

    /// Append a watcher to a literal's list.
    pub fn add_watch(&mut self, lit: Lit, watch: Watch) {
        self.watches[lit.code()].push(watch)
    }

    /// Store an implicit binary clause.
    pub fn add_binary(&mut self, lits: [Lit; 2], redundant: bool) {
        debug_assert_ne!(lits[0].var(), lits[1].var());
        for i in 0..2 {
            self.watches[(!lits[i]).code()].push(Watch::Binary {
                implied: lits[i ^ 1],
                redundant,
            });
        }
        self.binary_count += 1;
    }

    /// Remove an implicit binary clause.
    ///
    /// The clause must be present with a matching redundancy flag.
    pub fn remove_binary(&mut self, lits: [Lit; 2], redundant: bool) {
        for i in 0..2 {
            let implied = lits[i ^ 1];
            self.remove_watch(!lits[i], |watch| {
                matches!(
                    watch,
                    Watch::Binary { implied: other, redundant: r }
                        if *other == implied && *r == redundant
                )
            });
        }
        self.binary_count -= 1;
    }

    /// Store an implicit ternary clause.
    pub fn add_ternary(&mut self, lits: [Lit; 3], redundant: bool) {
        for i in 0..3 {
            self.watches[(!lits[i]).code()].push(Watch::Ternary {
                other: [lits[(i + 1) % 3], lits[(i + 2) % 3]],
                redundant,
            });
        }
        self.ternary_count += 1;
    }

    /// Remove an implicit ternary clause.
    ///
    /// `lits` may be any rotation of the order the clause was added with, which is what
    /// reconstructing the clause from one of its watchers yields.
    pub fn remove_ternary(&mut self, lits: [Lit; 3], redundant: bool) {
        for i in 0..3 {
            let other = [lits[(i + 1) % 3], lits[(i + 2) % 3]];
            self.remove_watch(!lits[i], |watch| {
                matches!(
                    watch,
                    Watch::Ternary { other: o, redundant: r }
                        if *o == other && *r == redundant
                )
            });
        }
        self.ternary_count -= 1;
    }

    /// Start watching a long clause.
    ///
    /// `lits` have to be the first two literals of the clause, `blocker` some other literal.
    pub fn watch_long_clause(&mut self, cref: ClauseRef, lits: [Lit; 2], blocker: Lit) {
        for i in 0..2 {
            self.watches[(!lits[i]).code()].push(Watch::Long { cref, blocker });
        }
    }

    /// Stop watching a long clause.
    ///
    /// `lits` have to be the clause's currently watched literals.
    pub fn unwatch_long_clause(&mut self, cref: ClauseRef, lits: [Lit; 2]) {
        for i in 0..2 {
            self.remove_watch(!lits[i], |watch| {
                matches!(watch, Watch::Long { cref: c, .. } if *c == cref)
            });
        }
    }

    /// Number of implicit binary clauses.
    pub fn binary_count(&self) -> usize {
        self.binary_count
    }

    /// Number of implicit ternary clauses.
    pub fn ternary_count(&self) -> usize {
        self.ternary_count
    }

    /// Adjust the implicit clause counts after a sweep removed entries directly.
    pub(crate) fn sub_counts(&mut self, binaries: usize, ternaries: usize) {
        self.binary_count -= binaries;
        self.ternary_count -= ternaries;
    }

    /// Rewrite every long clause reference using the given remapping.
    ///
    /// Used when the clause allocator is compacted.
    pub fn update_long_refs(&mut self, remap: impl Fn(ClauseRef) -> ClauseRef) {
        for list in self.watches.iter_mut() {
            for watch in list.iter_mut() {
                if let Watch::Long { cref, .. } = watch {
                    *cref = remap(*cref);
                }
            }
        }
    }

    fn remove_watch(&mut self, lit: Lit, pred: impl Fn(&Watch) -> bool) {
        let list = &mut self.watches[lit.code()];
        let position = list
            .iter()
            .position(pred)
            .expect("watch entry to remove is missing");
        list.swap_remove(position);
    }
}

/// Start watching a long clause by its first two literals.
pub fn attach_clause(mut ctx: partial!(Context, mut WatchlistsP, ClauseAllocP), cref: ClauseRef) {
    let (watchlists, ctx) = ctx.split_part_mut(WatchlistsP);
    let lits = ctx.part(ClauseAllocP).clause(cref).lits();
    debug_assert!(lits.len() >= 3);
    watchlists.watch_long_clause(cref, [lits[0], lits[1]], lits[2]);
}

/// Stop watching a long clause.
pub fn detach_clause(mut ctx: partial!(Context, mut WatchlistsP, ClauseAllocP), cref: ClauseRef) {
    let (watchlists, ctx) = ctx.split_part_mut(WatchlistsP);
    let lits = ctx.part(ClauseAllocP).clause(cref).lits();
    watchlists.unwatch_long_clause(cref, [lits[0], lits[1]]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_entries(watchlists: &Watchlists, lit: Lit) -> Vec<(Lit, bool)> {
        watchlists
            .watched_by(lit)
            .iter()
            .filter_map(|watch| match watch {
                &Watch::Binary { implied, redundant } => Some((implied, redundant)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn binary_watches_are_symmetric() {
        let mut watchlists = Watchlists::default();
        watchlists.set_var_count(4);

        let a = Lit::from_dimacs(1);
        let b = Lit::from_dimacs(-3);

        watchlists.add_binary([a, b], false);
        watchlists.add_binary([a, b], true);

        assert_eq!(watchlists.binary_count(), 2);
        assert_eq!(binary_entries(&watchlists, !a), vec![(b, false), (b, true)]);
        assert_eq!(binary_entries(&watchlists, !b), vec![(a, false), (a, true)]);

        watchlists.remove_binary([a, b], false);
        assert_eq!(watchlists.binary_count(), 1);
        assert_eq!(binary_entries(&watchlists, !a), vec![(b, true)]);
        assert_eq!(binary_entries(&watchlists, !b), vec![(a, true)]);
    }

    #[test]
    fn long_clauses_are_watched_by_their_first_two_literals() {
        use partial_ref::IntoPartialRefMut;

        use crate::clause::{ClauseDb, ClauseHeader};
        use crate::context::Context;

        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        ctx.part_mut(WatchlistsP).set_var_count(5);

        let lits = lits![1, -2, 3, 4];
        let cref = ClauseDb::add_clause(ctx.borrow(), ClauseHeader::new(), &lits);
        attach_clause(ctx.borrow(), cref);

        // Exactly the negations of the first two literals watch the clause.
        for (index, &lit) in lits.iter().enumerate() {
            let watchers = ctx
                .part(WatchlistsP)
                .watched_by(!lit)
                .iter()
                .filter(|watch| matches!(watch, Watch::Long { cref: c, .. } if *c == cref))
                .count();
            assert_eq!(watchers, (index < 2) as usize);
        }

        detach_clause(ctx.borrow(), cref);
        for &lit in lits.iter() {
            assert!(ctx.part(WatchlistsP).watched_by(!lit).is_empty());
        }
    }

    #[test]
    fn ternary_watches_by_rotation() {
        let mut watchlists = Watchlists::default();
        watchlists.set_var_count(4);

        let a = Lit::from_dimacs(1);
        let b = Lit::from_dimacs(2);
        let c = Lit::from_dimacs(-4);

        watchlists.add_ternary([a, b, c], false);
        assert_eq!(watchlists.ternary_count(), 1);

        // Reconstruct the clause from b's watcher and remove via the rotated order.
        assert_eq!(
            watchlists.watched_by(!b),
            &[Watch::Ternary {
                other: [c, a],
                redundant: false
            }]
        );
        watchlists.remove_ternary([b, c, a], false);

        assert_eq!(watchlists.ternary_count(), 0);
        for lit in &[a, b, c] {
            assert!(watchlists.watched_by(!*lit).is_empty());
        }
    }
}
