//! Conflict driven clause learning.
use partial_ref::{partial, PartialRef};

use crate::analyze::analyze_conflict;
use crate::assumptions::{enqueue_assumption, EnqueueAssumption};
use crate::clause::{
    bump_clause_activity, db::ClauseDb, decay_clause_activities, ClauseHeader,
};
use crate::context::{
    AnalyzeConflictP, AssignmentP, AssumptionsP, ClauseActivityP, ClauseAllocP, ClauseDbP,
    Context, ImplGraphP, ObserverP, RestartP, RngP, SolverConfigP, SolverStateP, TmpDataP,
    TrailP, VariablesP, VsidsP, WatchlistsP,
};
use crate::decision::make_decision;
use crate::glue::compute_glue;
use crate::prop::{
    attach_clause, backtrack, enqueue_assignment, propagate, Conflict, Reason,
};
use crate::simplify::{clean_satisfied, prove_units};
use crate::state::SatState;

/// Find a conflict, learn a clause and backjump.
///
/// Terminal outcomes are recorded in the solver state: a model when no conflict is left, a
/// failed assumption set, or unsatisfiability when the conflict is independent of any decision.
pub fn conflict_step(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut AssumptionsP,
        mut ClauseActivityP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ObserverP,
        mut RestartP,
        mut RngP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
        VariablesP,
    ),
) {
    let conflict = match find_conflict(ctx.borrow()) {
        Ok(()) => {
            ctx.part_mut(SolverStateP).sat_state = SatState::Sat;
            return;
        }
        Err(FoundConflict::Assumption) => {
            ctx.part_mut(SolverStateP).sat_state = SatState::UnsatUnderAssumptions;
            return;
        }
        Err(FoundConflict::Conflict(conflict)) => conflict,
    };

    let backtrack_to = analyze_conflict(ctx.borrow(), conflict);

    let (analyze, mut ctx) = ctx.split_part(AnalyzeConflictP);

    for &cref in analyze.involved() {
        bump_clause_activity(ctx.borrow(), cref);
    }

    decay_clause_activities(ctx.borrow());

    let clause = analyze.clause();

    if clause.is_empty() {
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
        return;
    }

    // The glue and trail statistics feed the restart policy. Computed before backtracking while
    // all clause literals are still assigned.
    let glue = compute_glue(ctx.borrow(), clause);
    {
        let trail_len = ctx.part(TrailP).trail().len();
        let (restart_control, ctx) = ctx.split_part_mut(RestartP);
        restart_control.on_conflict(glue, trail_len, ctx.part(SolverConfigP));
    }

    backtrack(ctx.borrow(), backtrack_to);

    // Backjumping below the assumption prefix invalidates part of it; the next conflict step
    // re-enqueues the assumptions.
    ctx.part_mut(AssumptionsP).limit_levels(backtrack_to);

    ctx.part_mut(ObserverP).added_clause(clause);

    let reason = match *clause {
        [_] => Reason::Unit,
        [lit_0, lit_1] => {
            ctx.part_mut(WatchlistsP).add_binary([lit_0, lit_1], true);
            Reason::Binary([lit_1])
        }
        _ => {
            let mut header = ClauseHeader::new();
            header.set_redundant(true);
            header.set_glue(glue);
            let cref = ClauseDb::add_clause(ctx.borrow(), header, clause);
            attach_clause(ctx.borrow(), cref);
            Reason::Long(cref)
        }
    };

    enqueue_assignment(ctx.borrow(), clause[0], reason);
}

/// Return type of [`find_conflict`].
///
/// Specifies whether a conflict was found during propagation or while enqueuing assumptions.
enum FoundConflict {
    Conflict(Conflict),
    Assumption,
}

impl From<Conflict> for FoundConflict {
    fn from(conflict: Conflict) -> FoundConflict {
        FoundConflict::Conflict(conflict)
    }
}

/// Find a conflict.
///
/// Returns `Err` if a conflict was found and `Ok` if a satisfying assignment was found instead.
fn find_conflict(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut AssumptionsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ObserverP,
        mut RngP,
        mut TmpDataP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
        VariablesP,
    ),
) -> Result<(), FoundConflict> {
    loop {
        let propagation_result = propagate(ctx.borrow());

        let new_unit = prove_units(ctx.borrow());

        propagation_result?;

        if new_unit {
            clean_satisfied(ctx.borrow());
        }

        match enqueue_assumption(ctx.borrow()) {
            EnqueueAssumption::Enqueued => continue,
            EnqueueAssumption::Conflict => return Err(FoundConflict::Assumption),
            EnqueueAssumption::Done => (),
        }

        if !make_decision(ctx.borrow()) {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use partial_ref::IntoPartialRefMut;

    use gluesat_formula::strategy::{sat_formula, sgen_unsat_formula};

    use crate::context::set_var_count;
    use crate::load::load_clause;

    #[test]
    fn level_0_unsat() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let formula = cnf_formula![
            1, 2, 3;
            -1;
            1, -2;
            2, -3;
        ];

        set_var_count(ctx.borrow(), formula.var_count());

        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }

        while ctx.part(SolverStateP).sat_state == SatState::Unknown {
            conflict_step(ctx.borrow());
        }

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
    }

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..7usize)) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            set_var_count(ctx.borrow(), formula.var_count());

            for clause in formula.iter() {
                load_clause(ctx.borrow(), clause);
            }

            while ctx.part(SolverStateP).sat_state == SatState::Unknown {
                conflict_step(ctx.borrow());
            }

            prop_assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
        }

        #[test]
        fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            set_var_count(ctx.borrow(), formula.var_count());

            for clause in formula.iter() {
                load_clause(ctx.borrow(), clause);
            }

            while ctx.part(SolverStateP).sat_state == SatState::Unknown {
                conflict_step(ctx.borrow());
            }

            prop_assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Sat);

            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|&lit| ctx.part(AssignmentP).lit_is_true(lit)));
            }
        }

        #[test]
        fn trail_reasons_are_sound(
            formula in sat_formula(4..20usize, 30..100usize, 0.05..0.2, 0.5..0.9),
        ) {
            use partial_ref::split_borrow;

            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            set_var_count(ctx.borrow(), formula.var_count());

            for clause in formula.iter() {
                load_clause(ctx.borrow(), clause);
            }

            let mut steps = 0;
            while ctx.part(SolverStateP).sat_state == SatState::Unknown && steps < 500 {
                conflict_step(ctx.borrow());
                steps += 1;

                // Every propagated assignment must be forced: the other literals of its reason
                // are false and were assigned no later than the propagation itself.
                split_borrow!(lit_ctx = &(ClauseAllocP) ctx);
                let impl_graph = ctx.part(ImplGraphP);
                let assignment = ctx.part(AssignmentP);
                for &lit in ctx.part(TrailP).trail() {
                    let level = impl_graph.level(lit.var());
                    prop_assert!(assignment.lit_is_true(lit));
                    for &reason_lit in impl_graph.reason(lit.var()).lits(&lit_ctx) {
                        prop_assert!(assignment.lit_is_false(reason_lit));
                        prop_assert!(impl_graph.level(reason_lit.var()) <= level);
                    }
                }
            }
        }

        #[test]
        fn sgen_unsat_incremental_clauses(formula in sgen_unsat_formula(1..7usize)) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            set_var_count(ctx.borrow(), formula.var_count());

            let mut last_state = SatState::Sat;

            for clause in formula.iter() {
                load_clause(ctx.borrow(), clause);
                while ctx.part(SolverStateP).sat_state == SatState::Unknown {
                    conflict_step(ctx.borrow());
                }

                if ctx.part(SolverStateP).sat_state != last_state {
                    prop_assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
                    prop_assert_eq!(last_state, SatState::Sat);
                    last_state = ctx.part(SolverStateP).sat_state;
                }
            }

            prop_assert_eq!(last_state, SatState::Unsat);
        }
    }
}
