//! Incremental solving under assumptions.
//!
//! Assumptions are unit literals imposed for a single `solve` call. Each assumption gets its own
//! decision level below all real decisions, so a restart returns to the assumption prefix
//! instead of level 0. When an assumption is found falsified, a reverse trail walk computes a
//! subset of the assumptions whose conjunction is already unsatisfiable with the formula.
use partial_ref::{partial, split_borrow, PartialRef};

use gluesat_formula::Lit;

use crate::context::{
    AssignmentP, AssumptionsP, ClauseAllocP, Context, ImplGraphP, SolverStateP, TmpDataP,
    TrailP, VariablesP, VsidsP,
};
use crate::prop::{enqueue_assignment, full_restart, Reason};
use crate::state::SatState;

/// Assumptions and the failed assumption subset.
#[derive(Default)]
pub struct Assumptions {
    /// Assumptions with replaced variables mapped to their representatives.
    ///
    /// Entries already implied by earlier assumptions are removed while enqueuing, so the order
    /// does not match `user_assumptions`.
    assumptions: Vec<Lit>,
    /// Assumptions exactly as passed by the user.
    user_assumptions: Vec<Lit>,
    /// Subset of `user_assumptions` that made the formula unsatisfiable.
    failed_subset: Vec<Lit>,
    /// Number of decision levels used for assumptions.
    assumption_levels: usize,
}

impl Assumptions {
    /// Current number of decision levels used for assumptions.
    pub fn assumption_levels(&self) -> usize {
        self.assumption_levels
    }

    /// Resets assumption_levels to zero on a full restart.
    pub fn full_restart(&mut self) {
        self.assumption_levels = 0;
    }

    /// Forget assumption levels above the given level after a deep backjump.
    pub fn limit_levels(&mut self, level: usize) {
        self.assumption_levels = self.assumption_levels.min(level);
    }

    /// Subset of the passed assumptions that made the formula unsatisfiable.
    pub fn failed_subset(&self) -> &[Lit] {
        &self.failed_subset
    }
}

/// Return type of [`enqueue_assumption`].
pub enum EnqueueAssumption {
    Done,
    Enqueued,
    Conflict,
}

/// Change the currently active assumptions.
///
/// This restarts the search completely. A sticky unsatisfiable state is kept, any other state
/// becomes unknown again.
pub fn set_assumptions(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut AssumptionsP,
        mut SolverStateP,
        mut TrailP,
        mut VsidsP,
        VariablesP,
    ),
    assumptions: &[Lit],
) {
    full_restart(ctx.borrow());

    let state = ctx.part_mut(SolverStateP);

    state.sat_state = match state.sat_state {
        SatState::Unsat => SatState::Unsat,
        SatState::Sat | SatState::UnsatUnderAssumptions | SatState::Unknown => SatState::Unknown,
    };

    let (incremental, ctx) = ctx.split_part_mut(AssumptionsP);
    let variables = ctx.part(VariablesP);

    incremental.user_assumptions.clear();
    incremental.user_assumptions.extend_from_slice(assumptions);

    incremental.assumptions.clear();
    incremental
        .assumptions
        .extend(assumptions.iter().map(|&lit| variables.map_lit(lit)));
}

/// Enqueue another assumption if possible.
///
/// Returns whether an assumption was enqueued, whether no assumptions are left or whether the
/// assumptions result in a conflict.
pub fn enqueue_assumption(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut AssumptionsP,
        mut ImplGraphP,
        mut TmpDataP,
        mut TrailP,
        ClauseAllocP,
        VariablesP,
    ),
) -> EnqueueAssumption {
    while let Some(&assumption) = ctx
        .part(AssumptionsP)
        .assumptions
        .get(ctx.part(TrailP).current_level())
    {
        match ctx.part(AssignmentP).lit_value(assumption) {
            Some(false) => {
                analyze_assumption_conflict(ctx.borrow(), assumption);
                return EnqueueAssumption::Conflict;
            }
            Some(true) => {
                // The next assumption is already implied by other assumptions so we can remove
                // it.
                let level = ctx.part(TrailP).current_level();
                ctx.part_mut(AssumptionsP).assumptions.swap_remove(level);
            }
            None => {
                ctx.part_mut(TrailP).new_decision_level();
                enqueue_assignment(ctx.borrow(), assumption, Reason::Decision);
                let (incremental, ctx) = ctx.split_part_mut(AssumptionsP);
                incremental.assumption_levels = ctx.part(TrailP).current_level();
                return EnqueueAssumption::Enqueued;
            }
        }
    }
    EnqueueAssumption::Done
}

/// Analyze a conflicting set of assumptions.
///
/// Given an assumption falsified under the assumptions enqueued so far, the reasons for its
/// negation are followed backwards through the trail. The sources reached this way are the
/// enqueued assumptions responsible for the conflict. The result, mapped back to the user's
/// literals, is stored as the failed subset.
fn analyze_assumption_conflict(
    mut ctx: partial!(
        Context,
        mut AssumptionsP,
        mut TmpDataP,
        ClauseAllocP,
        ImplGraphP,
        TrailP,
        VariablesP,
    ),
    assumption: Lit,
) {
    let (incremental, mut ctx) = ctx.split_part_mut(AssumptionsP);
    let (tmp, mut ctx) = ctx.split_part_mut(TmpDataP);
    split_borrow!(lit_ctx = &(ClauseAllocP) ctx);

    // Flags are indexed by variable here, the upper half of the buffer stays untouched.
    let flags = &mut tmp.flags;

    // Mapped literals responsible for the conflict, including the failed assumption itself.
    let mut conflict_lits = vec![assumption];

    flags[assumption.index()] = true;
    let mut flag_count = 1;

    for &lit in ctx.part(TrailP).trail().iter().rev() {
        if !flags[lit.index()] {
            continue;
        }
        flags[lit.index()] = false;
        flag_count -= 1;

        let reason = ctx.part(ImplGraphP).reason(lit.var());
        if reason.is_source() {
            if ctx.part(ImplGraphP).level(lit.var()) > 0 {
                conflict_lits.push(lit);
            }
        } else {
            for &reason_lit in reason.lits(&lit_ctx) {
                if !flags[reason_lit.index()] {
                    flags[reason_lit.index()] = true;
                    flag_count += 1;
                }
            }
        }

        if flag_count == 0 {
            break;
        }
    }

    // When the assumption was refuted at level 0 its negation is no longer on the trail and the
    // walk finds nothing; the assumption is inconsistent with the formula all by itself.
    flags[assumption.index()] = false;

    // Translate back to the user's assumptions: every user assumption whose mapped literal
    // occurs in the conflict belongs to the failed subset.
    for &lit in conflict_lits.iter() {
        flags[lit.code()] = true;
    }

    incremental.failed_subset.clear();
    let variables = ctx.part(VariablesP);
    for &user_lit in incremental.user_assumptions.iter() {
        if flags[variables.map_lit(user_lit).code()] {
            incremental.failed_subset.push(user_lit);
        }
    }

    for &lit in conflict_lits.iter() {
        flags[lit.code()] = false;
    }
}
