//! Scheduling of restarts, reductions, simplification and budgets.
//!
//! One schedule step performs one conflict step plus whatever maintenance is due at this clause
//! boundary: executing a pending restart, running the simplifier, reducing the learned clause
//! database and checking the interrupt flag and the per call budgets. Nothing here may fire in
//! the middle of propagation or analysis.
use std::time::Instant;

use log::{debug, info};

use partial_ref::{partial, PartialRef};

use crate::cdcl::conflict_step;
use crate::clause::reduce::reduce;
use crate::config::SolverConfig;
use crate::context::{
    AnalyzeConflictP, AssignmentP, AssumptionsP, ClauseActivityP, ClauseAllocP, ClauseDbP,
    Context, ImplGraphP, ObserverP, RestartP, RngP, ScheduleP, SimplifyP, SolverConfigP,
    SolverStateP, TmpDataP, TrailP, VariablesP, VsidsP, WatchlistsP,
};
use crate::prop::{full_restart, restart};
use crate::simplify::run_simplify;
use crate::state::SatState;

pub mod average;
pub mod restart;

pub use restart::RestartControl;

/// How often the time budget is polled, in conflicts.
const TIME_CHECK_INTERVAL: u64 = 256;

/// How often search progress is logged, in conflicts.
const LOG_INTERVAL: u64 = 5000;

/// Scheduling state.
#[derive(Default)]
pub struct Schedule {
    /// Total number of conflicts over the solver's lifetime.
    conflicts: u64,
    /// Redundant clause count that triggers the next reduction, zero before the first solve.
    reduce_threshold: u64,
    /// Conflict count at which the next simplification is due.
    next_simplify: u64,
    /// Conflicts in the current solve call.
    solve_conflicts: u64,
    /// Conflict limit for the current solve call.
    solve_conflict_limit: Option<u64>,
    /// Wall clock deadline for the current solve call.
    solve_deadline: Option<Instant>,
    deadline_passed: bool,
}

impl Schedule {
    /// Set up the budgets for a new solve call.
    pub fn start_solve(&mut self, config: &SolverConfig) {
        self.solve_conflicts = 0;
        self.solve_conflict_limit = config.max_conflicts;
        self.solve_deadline = config.max_time.map(|limit| Instant::now() + limit);
        self.deadline_passed = false;
        if self.reduce_threshold == 0 {
            self.reduce_threshold = config.learnt_cleaning_first_threshold;
        }
        if self.next_simplify == 0 && !config.simplify_at_startup {
            self.next_simplify = self.conflicts + config.simplify_interval;
        }
    }

    /// Whether the current solve call used up its conflict or time budget.
    fn budget_exhausted(&mut self) -> bool {
        if let Some(limit) = self.solve_conflict_limit {
            if self.solve_conflicts >= limit {
                return true;
            }
        }
        if let Some(deadline) = self.solve_deadline {
            if self.solve_conflicts % TIME_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                self.deadline_passed = true;
            }
        }
        self.deadline_passed
    }
}

/// Perform one step of the schedule.
///
/// Returns `false` when the search is finished or has to stop, i.e. on a final state, an
/// interrupt or an exhausted budget.
pub fn schedule_step(
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
        mut ScheduleP,
        mut SimplifyP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) -> bool {
    if ctx.part(SolverStateP).sat_state != SatState::Unknown {
        return false;
    }

    if ctx.part(SolverStateP).interrupt_requested() {
        debug!("interrupted");
        return false;
    }

    if ctx.part_mut(ScheduleP).budget_exhausted() {
        debug!("conflict or time budget exhausted");
        return false;
    }

    let conflicts = ctx.part(ScheduleP).conflicts;

    if conflicts > 0 && conflicts % LOG_INTERVAL == 0 {
        let db = ctx.part(ClauseDbP);
        let watchlists = ctx.part(WatchlistsP);
        info!(
            "confl: {}k rest: {} (blocked: {}) vars: {} bin: {} tern: {} irred: {} red: {}",
            conflicts / 1000,
            ctx.part(RestartP).restarts(),
            ctx.part(RestartP).blocked(),
            ctx.part(VariablesP).count() - ctx.part(TrailP).top_level_assignment_count(),
            watchlists.binary_count(),
            watchlists.ternary_count(),
            db.irredundant_count(),
            db.redundant_count(),
        );
    }

    let simplify_enabled = {
        let config = ctx.part(SolverConfigP);
        config.enable_scc || config.enable_subsumption
    };

    if simplify_enabled && conflicts >= ctx.part(ScheduleP).next_simplify {
        // The simplifier requires decision level 0, so assumptions are undone as well. They are
        // re-enqueued by the next conflict step.
        full_restart(ctx.borrow());
        run_simplify(ctx.borrow());

        let interval = ctx.part(SolverConfigP).simplify_interval;
        ctx.part_mut(ScheduleP).next_simplify = conflicts + interval;

        if ctx.part(SolverStateP).sat_state != SatState::Unknown {
            return true;
        }
    } else if ctx.part(RestartP).wants_restart() {
        restart(ctx.borrow());
        let (restart_control, ctx) = ctx.split_part_mut(RestartP);
        restart_control.on_restart(ctx.part(SolverConfigP));
    }

    if ctx.part(ClauseDbP).redundant_count() as u64 > ctx.part(ScheduleP).reduce_threshold {
        reduce(ctx.borrow());
        let growth = ctx.part(SolverConfigP).learnt_cleaning_growth;
        let schedule = ctx.part_mut(ScheduleP);
        schedule.reduce_threshold = (schedule.reduce_threshold as f64 * growth) as u64 + 1;
    }

    conflict_step(ctx.borrow());

    let schedule = ctx.part_mut(ScheduleP);
    schedule.conflicts += 1;
    schedule.solve_conflicts += 1;

    true
}
