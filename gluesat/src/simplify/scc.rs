//! Equivalent literal replacement.
//!
//! Every binary clause `(!a | b)` contributes the implications `a -> b` and `!b -> !a` to the
//! binary implication graph. Literals in the same strongly connected component of that graph are
//! pairwise equivalent and can be collapsed onto a single representative. A component containing
//! a literal together with its negation proves the formula unsatisfiable.
//!
//! The representative of a component is its literal with the smallest code, i.e. the smallest
//! variable index with the positive polarity preferred. After recording the replacements, every
//! clause mentioning a replaced variable is rewritten: tautologies are dropped, duplicate
//! literals merge, and clauses that shrink are dispatched to the smaller implicit
//! representations. Clauses that shrink to a single literal become new top level units.
use partial_ref::{partial, PartialRef};

use gluesat_formula::{Lit, Var};

use crate::clause::{ClauseDb, ClauseRef};
use crate::context::{
    AssignmentP, ClauseAllocP, ClauseDbP, Context, ImplGraphP, ObserverP, SimplifyP,
    SolverStateP, TmpDataP, TrailP, VariablesP, WatchlistsP,
};
use crate::prop::{attach_clause, detach_clause, Watch};
use crate::state::SatState;

use super::enqueue_proven_unit;

/// Collapse equivalent literals onto a representative.
///
/// Returns whether anything changed. Sets the solver state to unsatisfiable when a variable is
/// equivalent to its own negation.
pub fn replace_equivalent(
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
    ),
) -> bool {
    let replacements = match find_equivalences(ctx.borrow()) {
        Some(replacements) => replacements,
        None => {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
            return true;
        }
    };

    if replacements.is_empty() {
        return false;
    }

    {
        let mut borrowed: partial!(Context, mut VariablesP, mut ObserverP, mut SimplifyP) =
            ctx.borrow();
        let (variables, mut borrowed) = borrowed.split_part_mut(VariablesP);
        let (observer, mut borrowed) = borrowed.split_part_mut(ObserverP);
        for &(var, replacement) in replacements.iter() {
            variables.replace(var, replacement);
            observer.replaced_var(var, replacement);
            borrowed.part_mut(SimplifyP).replaced_vars += 1;
        }
    }

    rewrite_binary_clauses(ctx.borrow());
    rewrite_ternary_clauses(ctx.borrow());
    rewrite_long_clauses(ctx.borrow());

    true
}

/// Tarjan's algorithm over the binary implication graph.
///
/// Returns the discovered replacements or `None` when a component contains complementary
/// literals. Only unassigned, active variables take part.
fn find_equivalences(
    mut ctx: partial!(
        Context,
        mut SimplifyP,
        mut TmpDataP,
        AssignmentP,
        VariablesP,
        WatchlistsP,
    ),
) -> Option<Vec<(Var, Lit)>> {
    let lit_count = ctx.part(WatchlistsP).list_count();

    // Literals of assigned or replaced variables do not take part in the graph.
    let mut node_ok = vec![false; lit_count];
    {
        let assignment = ctx.part(AssignmentP);
        let variables = ctx.part(VariablesP);
        for code in 0..lit_count {
            let lit = Lit::from_code(code);
            node_ok[code] =
                assignment.lit_value(lit).is_none() && variables.is_active(lit.var());
        }
    }

    // Iterative Tarjan over the literal nodes.
    let mut index = vec![0u32; lit_count];
    let mut lowlink = vec![0u32; lit_count];
    let mut on_stack = vec![false; lit_count];
    let mut next_index = 1u32;

    let mut stack: Vec<usize> = vec![];
    let mut frames: Vec<(usize, usize)> = vec![];
    let mut component: Vec<usize> = vec![];

    let mut replacements: Vec<(Var, Lit)> = vec![];
    let mut replaced_to: Vec<Option<Lit>> = vec![None; lit_count / 2];

    for root in 0..lit_count {
        if !node_ok[root] || index[root] != 0 {
            continue;
        }
        if !ctx.part_mut(SimplifyP).charge(1) {
            break;
        }

        index[root] = next_index;
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        frames.push((root, 0));

        while let Some(&mut (node, ref mut next_succ)) = frames.last_mut() {
            // Find the next binary implication of `node` to follow.
            let mut successor = None;
            {
                let list = ctx.part(WatchlistsP).by_code(node);
                let mut pos = *next_succ;
                while pos < list.len() {
                    if let Watch::Binary { implied, .. } = list[pos] {
                        pos += 1;
                        if node_ok[implied.code()] {
                            successor = Some(implied.code());
                            break;
                        }
                    } else {
                        pos += 1;
                    }
                }
                ctx.part_mut(SimplifyP).charge((pos - *next_succ) as u64 + 1);
                *next_succ = pos;
            }

            match successor {
                Some(succ) if index[succ] == 0 => {
                    index[succ] = next_index;
                    lowlink[succ] = next_index;
                    next_index += 1;
                    stack.push(succ);
                    on_stack[succ] = true;
                    frames.push((succ, 0));
                }
                Some(succ) => {
                    if on_stack[succ] {
                        lowlink[node] = lowlink[node].min(index[succ]);
                    }
                }
                None => {
                    frames.pop();
                    if let Some(&mut (parent, _)) = frames.last_mut() {
                        lowlink[parent] = lowlink[parent].min(lowlink[node]);
                    }

                    if lowlink[node] == index[node] {
                        component.clear();
                        loop {
                            let member = stack.pop().unwrap();
                            on_stack[member] = false;
                            component.push(member);
                            if member == node {
                                break;
                            }
                        }

                        if component.len() > 1
                            && !record_component(
                                &component,
                                &mut ctx.part_mut(TmpDataP).flags,
                                &mut replaced_to,
                                &mut replacements,
                            )
                        {
                            return None;
                        }
                    }
                }
            }
        }
    }

    Some(replacements)
}

/// Record the replacements of one component.
///
/// Returns `false` when the component contains a literal and its negation.
fn record_component(
    component: &[usize],
    flags: &mut [bool],
    replaced_to: &mut [Option<Lit>],
    replacements: &mut Vec<(Var, Lit)>,
) -> bool {
    let mut contradiction = false;
    for &code in component {
        flags[code] = true;
        if flags[code ^ 1] {
            contradiction = true;
        }
    }
    for &code in component {
        flags[code] = false;
    }
    if contradiction {
        return false;
    }

    let rep_code = *component.iter().min().unwrap();
    let rep = Lit::from_code(rep_code);

    for &code in component {
        if code == rep_code {
            continue;
        }
        let lit = Lit::from_code(code);
        debug_assert_ne!(lit.var(), rep.var());

        // `lit` is equivalent to `rep`, so `var(lit)` maps to `rep` with `lit`'s sign applied.
        let target = rep ^ lit.is_negative();
        match replaced_to[lit.index()] {
            // The mirror component records the same mapping, dedup here.
            Some(previous) => debug_assert_eq!(previous, target),
            None => {
                replaced_to[lit.index()] = Some(target);
                replacements.push((lit.var(), target));
            }
        }
    }

    true
}

/// Rewrite implicit binary clauses mentioning replaced variables.
fn rewrite_binary_clauses(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut ObserverP,
        mut SimplifyP,
        mut SolverStateP,
        mut TrailP,
        mut WatchlistsP,
        VariablesP,
    ),
) {
    let mut touched: Vec<([Lit; 2], bool)> = vec![];

    {
        let watchlists = ctx.part(WatchlistsP);
        let variables = ctx.part(VariablesP);
        for code in 0..watchlists.list_count() {
            let own = !Lit::from_code(code);
            for watch in watchlists.by_code(code) {
                if let &Watch::Binary { implied, redundant } = watch {
                    // Each clause is visited from both sides, take it once.
                    if own.code() < implied.code()
                        && (variables.is_replaced(own.var())
                            || variables.is_replaced(implied.var()))
                    {
                        touched.push(([own, implied], redundant));
                    }
                }
            }
        }
    }

    ctx.part_mut(SimplifyP).charge(touched.len() as u64);

    for &([a, b], redundant) in touched.iter() {
        ctx.part_mut(WatchlistsP).remove_binary([a, b], redundant);

        let variables = ctx.part(VariablesP);
        let new_a = variables.map_lit(a);
        let new_b = variables.map_lit(b);

        if new_a == !new_b {
            // Tautology, drop.
            ctx.part_mut(ObserverP).deleted_clause(&[a, b]);
        } else if new_a == new_b {
            let observer = ctx.part_mut(ObserverP);
            observer.added_clause(&[new_a]);
            observer.deleted_clause(&[a, b]);
            enqueue_proven_unit(ctx.borrow(), new_a);
        } else {
            ctx.part_mut(WatchlistsP).add_binary([new_a, new_b], redundant);
            let observer = ctx.part_mut(ObserverP);
            observer.added_clause(&[new_a, new_b]);
            observer.deleted_clause(&[a, b]);
        }
    }
}

/// Rewrite implicit ternary clauses mentioning replaced variables.
fn rewrite_ternary_clauses(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut ObserverP,
        mut SimplifyP,
        mut SolverStateP,
        mut TrailP,
        mut WatchlistsP,
        VariablesP,
    ),
) {
    let mut touched: Vec<([Lit; 3], bool)> = vec![];

    {
        let watchlists = ctx.part(WatchlistsP);
        let variables = ctx.part(VariablesP);
        for code in 0..watchlists.list_count() {
            let own = !Lit::from_code(code);
            for watch in watchlists.by_code(code) {
                if let &Watch::Ternary {
                    other: [a, b],
                    redundant,
                } = watch
                {
                    // Each clause is visited from all three sides, take the copy owning the
                    // smallest literal.
                    if own.code() < a.code()
                        && own.code() < b.code()
                        && (variables.is_replaced(own.var())
                            || variables.is_replaced(a.var())
                            || variables.is_replaced(b.var()))
                    {
                        touched.push(([own, a, b], redundant));
                    }
                }
            }
        }
    }

    ctx.part_mut(SimplifyP).charge(touched.len() as u64);

    for &(lits, redundant) in touched.iter() {
        ctx.part_mut(WatchlistsP).remove_ternary(lits, redundant);

        let variables = ctx.part(VariablesP);
        let mut new_lits: Vec<Lit> = lits.iter().map(|&lit| variables.map_lit(lit)).collect();
        new_lits.sort_unstable();
        new_lits.dedup();

        if new_lits.windows(2).any(|pair| pair[0] == !pair[1]) {
            // Tautology, drop.
            ctx.part_mut(ObserverP).deleted_clause(&lits);
            continue;
        }

        {
            let observer = ctx.part_mut(ObserverP);
            observer.added_clause(&new_lits);
            observer.deleted_clause(&lits);
        }

        match new_lits[..] {
            [unit] => enqueue_proven_unit(ctx.borrow(), unit),
            [lit_0, lit_1] => {
                ctx.part_mut(WatchlistsP).add_binary([lit_0, lit_1], redundant);
            }
            [lit_0, lit_1, lit_2] => {
                ctx.part_mut(WatchlistsP)
                    .add_ternary([lit_0, lit_1, lit_2], redundant);
            }
            _ => unreachable!(),
        }
    }
}

/// Rewrite long clauses mentioning replaced variables.
fn rewrite_long_clauses(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ObserverP,
        mut SimplifyP,
        mut SolverStateP,
        mut TrailP,
        mut WatchlistsP,
        VariablesP,
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
        let needs_rewrite = {
            let variables = ctx.part(VariablesP);
            ctx.part(ClauseAllocP)
                .clause(cref)
                .lits()
                .iter()
                .any(|&lit| variables.is_replaced(lit.var()))
        };
        if !needs_rewrite {
            continue;
        }

        let old_lits: Vec<Lit> = ctx.part(ClauseAllocP).clause(cref).lits().to_vec();
        let redundant = ctx.part(ClauseAllocP).header(cref).redundant();
        ctx.part_mut(SimplifyP).charge(old_lits.len() as u64);

        detach_clause(ctx.borrow(), cref);

        let mut new_lits: Vec<Lit> = {
            let variables = ctx.part(VariablesP);
            old_lits.iter().map(|&lit| variables.map_lit(lit)).collect()
        };
        new_lits.sort_unstable();
        new_lits.dedup();

        if new_lits.windows(2).any(|pair| pair[0] == !pair[1]) {
            // Tautology, drop entirely.
            ctx.part_mut(ObserverP).deleted_clause(&old_lits);
            ClauseDb::delete_clause(ctx.borrow(), cref);
            continue;
        }

        {
            let observer = ctx.part_mut(ObserverP);
            observer.added_clause(&new_lits);
            observer.deleted_clause(&old_lits);
        }

        match new_lits[..] {
            [] => unreachable!(),
            [unit] => {
                enqueue_proven_unit(ctx.borrow(), unit);
                ClauseDb::delete_clause(ctx.borrow(), cref);
            }
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
                let shrunk_by = old_lits.len() - lits.len();
                {
                    let clause = ctx.part_mut(ClauseAllocP).clause_mut(cref);
                    clause.lits_mut()[..lits.len()].copy_from_slice(lits);
                    clause.header_mut().set_len(lits.len());
                }
                ctx.part_mut(ClauseDbP).add_garbage(shrunk_by);
                attach_clause(ctx.borrow(), cref);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use crate::context::SimplifyP;
    use crate::load::load_clause;
    use crate::simplify::unit_closure;

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
        assert!(unit_closure(ctx.borrow()));
        ctx.part_mut(SimplifyP).begin(1_000_000);
    }

    #[test]
    fn collapses_an_implication_cycle() {
        let mut ctx = Context::default();
        prepare(&mut ctx, &cnf![-1, 2; -2, 3; -3, 1; 1, 4, 5;]);
        let mut ctx = ctx.into_partial_ref_mut();

        assert!(replace_equivalent(ctx.borrow()));
        assert_ne!(ctx.part(SolverStateP).sat_state, SatState::Unsat);

        // 2 and 3 collapse onto 1 and all binary clauses become tautologies.
        let variables = ctx.part(VariablesP);
        assert!(variables.is_replaced(Var::from_dimacs(2)));
        assert!(variables.is_replaced(Var::from_dimacs(3)));
        assert_eq!(variables.map_lit(Lit::from_dimacs(-2)), Lit::from_dimacs(-1));
        assert_eq!(variables.map_lit(Lit::from_dimacs(3)), Lit::from_dimacs(1));
        assert_eq!(ctx.part(WatchlistsP).binary_count(), 0);

        // A second run finds nothing new.
        assert!(!replace_equivalent(ctx.borrow()));
    }

    #[test]
    fn complementary_cycle_is_unsat() {
        let mut ctx = Context::default();
        // The implications form the cycle 1 -> 2 -> -1 -> -2 -> 1, putting both phases of
        // variable 1 into one component.
        prepare(&mut ctx, &cnf![-1, 2; -2, -1; 1, -2; 2, 1; 3, 4, 5;]);
        let mut ctx = ctx.into_partial_ref_mut();

        assert!(replace_equivalent(ctx.borrow()));
        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
    }

    #[test]
    fn rewrites_clauses_of_all_sizes() {
        let mut ctx = Context::default();
        prepare(
            &mut ctx,
            &cnf![-1, 2; -2, 1; 2, 3, 4; 2, 3, 4, 5; -2, 6, 7, 8;],
        );
        let mut ctx = ctx.into_partial_ref_mut();

        assert!(replace_equivalent(ctx.borrow()));
        assert_ne!(ctx.part(SolverStateP).sat_state, SatState::Unsat);

        assert!(ctx.part(VariablesP).is_replaced(Var::from_dimacs(2)));

        // All remaining clauses mention only active variables.
        let variables = ctx.part(VariablesP);
        let watchlists = ctx.part(WatchlistsP);
        for code in 0..watchlists.list_count() {
            let own = !Lit::from_code(code);
            for watch in watchlists.by_code(code) {
                let mut lits = vec![own];
                match *watch {
                    Watch::Binary { implied, .. } => lits.push(implied),
                    Watch::Ternary { other, .. } => lits.extend(other.iter().copied()),
                    Watch::Long { .. } => lits.clear(),
                }
                for lit in lits {
                    assert!(variables.is_active(lit.var()));
                }
            }
        }

        let alloc = ctx.part(ClauseAllocP);
        for &cref in ctx.part(ClauseDbP).clauses() {
            if alloc.header(cref).deleted() {
                continue;
            }
            for &lit in alloc.clause(cref).lits() {
                assert!(variables.is_active(lit.var()));
            }
        }
    }
}
