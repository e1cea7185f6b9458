//! Loading clauses into the solver.
use partial_ref::{partial, PartialRef};

use gluesat_formula::Lit;

use crate::clause::{db, ClauseHeader};
use crate::context::{
    AssignmentP, AssumptionsP, ClauseAllocP, ClauseDbP, Context, ImplGraphP, SolverStateP,
    TmpDataP, TrailP, VariablesP, VsidsP, WatchlistsP,
};
use crate::prop::{attach_clause, full_restart, Reason};
use crate::prop::assignment;
use crate::state::SatState;

/// Adds a clause to the current formula.
///
/// Removes duplicated literals, ignores tautological clauses (eg. x v -x v y), handles empty
/// clauses and dispatches among unit, binary, ternary and long clauses. Literals of replaced
/// variables are rewritten to their representatives first.
///
/// Returns `false` iff the formula is known unsatisfiable after adding the clause.
///
/// Does not adjust the solver's variable count. If necessary that has to be done before calling
/// this.
pub fn load_clause(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut AssumptionsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        VariablesP,
    ),
    lits: &[Lit],
) -> bool {
    match ctx.part(SolverStateP).sat_state {
        SatState::Unsat => return false,
        SatState::Sat | SatState::UnsatUnderAssumptions => {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unknown;
        }
        SatState::Unknown => {}
    }

    // Restart the search when the user adds new clauses.
    full_restart(ctx.borrow());

    let (tmp_data, mut ctx) = ctx.split_part_mut(TmpDataP);

    tmp_data.lits.clear();
    {
        let variables = ctx.part(VariablesP);
        tmp_data
            .lits
            .extend(lits.iter().map(|&lit| variables.map_lit(lit)));
    }
    let lits = &mut tmp_data.lits;

    lits.sort_unstable();
    lits.dedup();

    // Detect tautological clauses
    let mut last = None;

    for &lit in lits.iter() {
        if last == Some(!lit) {
            return true;
        }
        last = Some(lit);
    }

    // Remove false literals and drop satisfied clauses. With no decisions active all assigned
    // literals are proven at level 0.
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let simplified_lits = &mut tmp_data.lits_2;
    simplified_lits.clear();

    for &lit in lits.iter() {
        match ctx.part(AssignmentP).lit_value(lit) {
            Some(true) => return true,
            Some(false) => (),
            None => simplified_lits.push(lit),
        }
    }

    match simplified_lits[..] {
        [] => {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
            return false;
        }
        [lit] => assignment::enqueue_assignment(ctx.borrow(), lit, Reason::Unit),
        [lit_0, lit_1] => {
            ctx.part_mut(WatchlistsP).add_binary([lit_0, lit_1], false);
        }
        [lit_0, lit_1, lit_2] => {
            ctx.part_mut(WatchlistsP)
                .add_ternary([lit_0, lit_1, lit_2], false);
        }
        ref lits => {
            let header = ClauseHeader::new();
            let cref = db::ClauseDb::add_clause(ctx.borrow(), header, lits);
            attach_clause(ctx.borrow(), cref);
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use crate::context::set_var_count;

    #[test]
    fn unsat_on_empty_clause() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        assert!(!load_clause(ctx.borrow(), &[]));

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
    }

    #[test]
    fn unit_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        assert!(load_clause(ctx.borrow(), &lits![1]));
        assert_eq!(ctx.part(TrailP).trail().len(), 1);

        // Tautologies are dropped.
        assert!(load_clause(ctx.borrow(), &lits![3, -3]));
        assert_eq!(ctx.part(TrailP).trail().len(), 1);

        assert!(load_clause(ctx.borrow(), &lits![-2]));
        assert_eq!(ctx.part(TrailP).trail().len(), 2);

        // Duplicate literals collapse to one.
        assert!(load_clause(ctx.borrow(), &lits![1, 1]));
        assert_eq!(ctx.part(TrailP).trail().len(), 2);

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);

        // Contradicting an existing unit is immediately unsat.
        assert!(!load_clause(ctx.borrow(), &lits![2]));
        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
    }

    #[test]
    fn implicit_and_long_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        assert!(load_clause(ctx.borrow(), &lits![1, 2]));
        assert_eq!(ctx.part(WatchlistsP).binary_count(), 1);

        assert!(load_clause(ctx.borrow(), &lits![-1, 3, 3]));
        assert_eq!(ctx.part(WatchlistsP).binary_count(), 2);

        assert!(load_clause(ctx.borrow(), &lits![4, 5, 6]));
        assert_eq!(ctx.part(WatchlistsP).ternary_count(), 1);

        assert!(load_clause(ctx.borrow(), &lits![4, -5, 6, -7]));
        assert_eq!(ctx.part(ClauseDbP).irredundant_count(), 1);

        assert!(load_clause(ctx.borrow(), &lits![4, -4]));
        assert_eq!(ctx.part(WatchlistsP).binary_count(), 2);
        assert_eq!(ctx.part(WatchlistsP).ternary_count(), 1);
        assert_eq!(ctx.part(ClauseDbP).irredundant_count(), 1);

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);
    }
}
