//! Boolean satisfiability solver.
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use partial_ref::{IntoPartialRef, IntoPartialRefMut, PartialRef};

use gluesat_formula::{CnfFormula, Lit, Var};

use crate::assumptions::set_assumptions;
use crate::config::{ConfigError, SolverConfig, SolverConfigUpdate};
use crate::context::{
    config_changed, ensure_var_count, Context, ScheduleP, SolverConfigP, SolverStateP,
    VariablesP, VsidsP,
};
use crate::load::load_clause;
use crate::model::extract_model;
use crate::observer::SolveObserver;
use crate::schedule::schedule_step;
use crate::state::SatState;

/// Outcome of a solve call.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SolverResult {
    /// A satisfying assignment was found.
    Sat,
    /// The formula is unsatisfiable.
    Unsat,
    /// The formula is unsatisfiable together with the passed assumptions, but may be satisfiable
    /// without them.
    UnsatUnderAssumptions,
    /// The search was interrupted or ran out of budget.
    Unknown,
}

/// A boolean satisfiability solver.
#[derive(Default)]
pub struct Solver {
    ctx: Box<Context>,
}

impl Solver {
    /// Create a new solver with the default configuration.
    pub fn new() -> Solver {
        Solver::default()
    }

    /// Create a new solver with the given configuration.
    ///
    /// Rejects invalid configurations before any work is done.
    pub fn with_config(config: SolverConfig) -> Result<Solver, ConfigError> {
        config.validate()?;
        let mut solver = Solver::default();
        solver.ctx.solver_config = config;
        let mut ctx = solver.ctx.into_partial_ref_mut();
        config_changed(
            ctx.borrow(),
            &SolverConfigUpdate { reseed_rng: true },
        );
        drop(ctx);
        Ok(solver)
    }

    /// Change a single configuration option by name.
    ///
    /// Unknown names and invalid values are configuration errors and leave the configuration
    /// unchanged.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let mut new_config = self.ctx.solver_config.clone();
        new_config.set_option(name, value)?;

        let reseed_rng = new_config.random_seed != self.ctx.solver_config.random_seed;
        self.ctx.solver_config = new_config;

        let mut ctx = self.ctx.into_partial_ref_mut();
        config_changed(ctx.borrow(), &SolverConfigUpdate { reseed_rng });
        Ok(())
    }

    /// Allocate `count` additional variables.
    pub fn new_variables(&mut self, count: usize) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let new_count = ctx.part(VariablesP).count() + count;
        ensure_var_count(ctx.borrow(), new_count);
    }

    /// Number of allocated variables.
    pub fn var_count(&self) -> usize {
        self.ctx.variables.count()
    }

    /// Add a clause to the formula.
    ///
    /// Allocates variables as needed. Returns `false` iff the formula is known unsatisfiable
    /// after adding the clause.
    pub fn add_clause(&mut self, lits: &[Lit]) -> bool {
        let mut ctx = self.ctx.into_partial_ref_mut();

        let required = lits.iter().map(|lit| lit.index() + 1).max().unwrap_or(0);
        ensure_var_count(ctx.borrow(), required);

        load_clause(ctx.borrow(), lits)
    }

    /// Add all clauses of a formula.
    pub fn add_formula(&mut self, formula: &CnfFormula) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ensure_var_count(ctx.borrow(), formula.var_count());
        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }
    }

    /// Check the satisfiability of the current formula.
    pub fn solve(&mut self) -> SolverResult {
        self.solve_with_assumptions(&[])
    }

    /// Check the satisfiability of the current formula under the given assumptions.
    pub fn solve_with_assumptions(&mut self, assumptions: &[Lit]) -> SolverResult {
        let mut ctx = self.ctx.into_partial_ref_mut();

        let required = assumptions
            .iter()
            .map(|lit| lit.index() + 1)
            .max()
            .unwrap_or(0);
        ensure_var_count(ctx.borrow(), required);

        set_assumptions(ctx.borrow(), assumptions);

        {
            let (schedule, ctx) = ctx.split_part_mut(ScheduleP);
            schedule.start_solve(ctx.part(SolverConfigP));
        }

        while schedule_step(ctx.borrow()) {}

        match ctx.part(SolverStateP).sat_state {
            SatState::Unknown => SolverResult::Unknown,
            SatState::Sat => SolverResult::Sat,
            SatState::Unsat => SolverResult::Unsat,
            SatState::UnsatUnderAssumptions => SolverResult::UnsatUnderAssumptions,
        }
    }

    /// Satisfying assignment of the last solve call.
    ///
    /// Contains one literal per variable, including variables removed by equivalent literal
    /// replacement. `None` unless the last call returned [`SolverResult::Sat`].
    pub fn model(&self) -> Option<Vec<Lit>> {
        let mut ctx = self.ctx.into_partial_ref();
        if ctx.part(SolverStateP).sat_state == SatState::Sat {
            Some(extract_model(ctx.borrow()))
        } else {
            None
        }
    }

    /// Subset of the passed assumptions that made the formula unsatisfiable.
    ///
    /// `None` unless the last call returned [`SolverResult::UnsatUnderAssumptions`].
    pub fn unsat_assumption_subset(&self) -> Option<&[Lit]> {
        let mut ctx = self.ctx.into_partial_ref();
        if ctx.part(SolverStateP).sat_state == SatState::UnsatUnderAssumptions {
            Some(self.ctx.assumptions.failed_subset())
        } else {
            None
        }
    }

    /// Handle for cooperative cancellation.
    ///
    /// Setting the returned flag to `true` makes the running solve call return
    /// [`SolverResult::Unknown`] at the next safe point. The solver stays usable, but the
    /// embedder has to clear the flag again before further solve calls make progress.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.ctx.solver_state.interrupt_flag()
    }

    /// Install an observer receiving all derived and deleted clauses.
    pub fn set_observer(&mut self, observer: Box<dyn SolveObserver>) {
        self.ctx.observer.set(observer);
    }

    /// Remove the current observer.
    pub fn clear_observer(&mut self) {
        self.ctx.observer.clear();
    }

    /// Exclude or include a variable as a decision variable.
    ///
    /// Non-decision variables are only ever assigned by propagation.
    pub fn set_decision_var(&mut self, var: Var, decidable: bool) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(VariablesP).set_decidable(var, decidable);
        if decidable {
            ctx.part_mut(VsidsP).make_available(var);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use gluesat_formula::strategy::{sat_formula, sgen_unsat_formula};

    fn check_model(model: &[Lit], formula: &CnfFormula) -> bool {
        let model: std::collections::HashSet<Lit> = model.iter().copied().collect();
        formula
            .iter()
            .all(|clause| clause.iter().any(|lit| model.contains(lit)))
    }

    #[test]
    fn empty_formula_is_sat() {
        let mut solver = Solver::new();
        assert_eq!(solver.solve(), SolverResult::Sat);
        assert_eq!(solver.model(), Some(vec![]));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = SolverConfig::default();
        config.var_decay = 0.0;
        assert!(Solver::with_config(config).is_err());
    }

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), SolverResult::Unsat);
        }

        #[test]
        fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), SolverResult::Sat);

            let model = solver.model().unwrap();
            prop_assert!(check_model(&model, &formula));
        }

        #[test]
        fn sat_with_luby_restarts(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut config = SolverConfig::default();
            config.restart = crate::config::RestartStrategy::Luby;
            let mut solver = Solver::with_config(config).unwrap();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), SolverResult::Sat);

            let model = solver.model().unwrap();
            prop_assert!(check_model(&model, &formula));
        }

        #[test]
        fn sat_without_simplification(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut config = SolverConfig::default();
            config.enable_scc = false;
            config.enable_subsumption = false;
            let mut solver = Solver::with_config(config).unwrap();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), SolverResult::Sat);

            let model = solver.model().unwrap();
            prop_assert!(check_model(&model, &formula));
        }
    }
}
