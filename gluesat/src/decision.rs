//! Decision heuristics.
//!
//! Decisions pick the unassigned eligible variable with the highest activity from the
//! [`Vsids`](vsids::Vsids) heap. A configurable fraction of decisions instead picks a uniformly
//! random eligible variable, which helps on some satisfiable instances. The polarity of a
//! decision is the polarity the variable was last assigned with (initially false).
use partial_ref::{partial, PartialRef};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use gluesat_formula::Var;

use crate::config::SolverConfig;
use crate::context::{
    AssignmentP, Context, ImplGraphP, RngP, SolverConfigP, TrailP, VariablesP, VsidsP,
};
use crate::prop::{enqueue_assignment, Reason};

pub mod vsids;

/// Random number generator for decisions.
pub struct SolverRng {
    pub rng: SmallRng,
}

impl Default for SolverRng {
    fn default() -> SolverRng {
        SolverRng {
            rng: SmallRng::seed_from_u64(SolverConfig::default().random_seed),
        }
    }
}

impl SolverRng {
    /// Reset the generator to a deterministic state.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }
}

/// Reinsert a variable into the decision heap if it is eligible.
///
/// Called when backtracking unassigns a variable.
pub fn make_available(mut ctx: partial!(Context, mut VsidsP, VariablesP), var: Var) {
    if ctx.part(VariablesP).is_decidable(var) {
        ctx.part_mut(VsidsP).make_available(var);
    }
}

/// Make a decision and enqueue it.
///
/// Returns `false` if no decision was made because all eligible variables are assigned, meaning
/// the current assignment is a model.
pub fn make_decision(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut RngP,
        mut TrailP,
        mut VsidsP,
        SolverConfigP,
        VariablesP,
    ),
) -> bool {
    let decision_var = pick_random_var(ctx.borrow()).or_else(|| pick_by_activity(ctx.borrow()));

    match decision_var {
        Some(var) => {
            let polarity = ctx.part(AssignmentP).last_var_value(var);
            let decision = var.lit(polarity);

            ctx.part_mut(TrailP).new_decision_level();
            enqueue_assignment(ctx.borrow(), decision, Reason::Decision);

            true
        }
        None => false,
    }
}

/// With probability `random_var_freq` pick a uniformly random eligible unassigned variable.
fn pick_random_var(
    mut ctx: partial!(Context, mut RngP, AssignmentP, SolverConfigP, VariablesP),
) -> Option<Var> {
    let freq = ctx.part(SolverConfigP).random_var_freq;
    let count = ctx.part(VariablesP).count();
    if freq == 0.0 || count == 0 {
        return None;
    }

    let rng = &mut ctx.part_mut(RngP).rng;
    if !rng.gen_bool(freq) {
        return None;
    }
    let var = Var::from_index(rng.gen_range(0, count));

    if ctx.part(AssignmentP).var_value(var).is_none() && ctx.part(VariablesP).is_decidable(var) {
        Some(var)
    } else {
        // The variable stays in the heap, so nothing is lost by falling back to the activity
        // order for this decision.
        None
    }
}

/// Pop variables from the activity heap until an unassigned eligible one is found.
///
/// Skipped variables are reinserted when they become unassigned during backtracking.
fn pick_by_activity(
    mut ctx: partial!(Context, mut VsidsP, AssignmentP, VariablesP),
) -> Option<Var> {
    loop {
        let var = ctx.part_mut(VsidsP).next()?;
        if ctx.part(AssignmentP).var_value(var).is_none()
            && ctx.part(VariablesP).is_decidable(var)
        {
            return Some(var);
        }
    }
}
