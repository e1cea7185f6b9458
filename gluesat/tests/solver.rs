//! End-to-end tests against the public solver API.
use std::collections::HashSet;
use std::sync::atomic::Ordering;

use proptest::prelude::*;

use gluesat::{Lit, Solver, SolverConfig, SolverResult};
use gluesat_formula::strategy::conditional_pigeon_hole;
use gluesat_formula::{cnf_formula, CnfFormula};

fn clause(lits: &[isize]) -> Vec<Lit> {
    lits.iter().map(|&l| Lit::from_dimacs(l)).collect()
}

fn check_model(model: &[Lit], formula: &CnfFormula) -> bool {
    let model: HashSet<Lit> = model.iter().copied().collect();
    formula
        .iter()
        .all(|clause| clause.iter().any(|lit| model.contains(lit)))
}

#[test]
fn two_clause_sat() {
    let formula = cnf_formula![
        1, 2;
        -1, -2;
    ];
    let mut solver = Solver::new();
    solver.add_formula(&formula);
    assert_eq!(solver.solve(), SolverResult::Sat);
    assert!(check_model(&solver.model().unwrap(), &formula));
}

#[test]
fn contradicting_units_unsat() {
    let mut solver = Solver::new();
    assert!(solver.add_clause(&clause(&[1])));
    assert!(!solver.add_clause(&clause(&[-1])));
    assert_eq!(solver.solve(), SolverResult::Unsat);
    assert_eq!(solver.model(), None);
}

#[test]
fn unsat_under_assumptions_with_subset() {
    let mut solver = Solver::new();
    solver.add_clause(&clause(&[1, 2]));
    solver.add_clause(&clause(&[-1, 2]));
    solver.add_clause(&clause(&[-2, 3]));

    let assumptions = clause(&[-3]);
    assert_eq!(
        solver.solve_with_assumptions(&assumptions),
        SolverResult::UnsatUnderAssumptions
    );
    assert_eq!(solver.unsat_assumption_subset(), Some(&assumptions[..]));

    // The formula itself stays satisfiable.
    assert_eq!(solver.solve(), SolverResult::Sat);
    assert_eq!(solver.unsat_assumption_subset(), None);
}

#[test]
fn chained_implications_sat() {
    let formula = cnf_formula![
        1, 2;
        -1, 3;
        -3, 4;
        -2, -4;
    ];
    let mut solver = Solver::new();
    solver.add_formula(&formula);
    assert_eq!(solver.solve(), SolverResult::Sat);
    assert!(check_model(&solver.model().unwrap(), &formula));
}

/// Standard pigeon hole encoding: `pigeons` pigeons into `holes` holes.
fn pigeon_hole(pigeons: usize, holes: usize) -> CnfFormula {
    let var = |pigeon: usize, hole: usize| (pigeon * holes + hole + 1) as isize;
    let mut formula = CnfFormula::new();

    for pigeon in 0..pigeons {
        let clause: Vec<Lit> = (0..holes)
            .map(|hole| Lit::from_dimacs(var(pigeon, hole)))
            .collect();
        formula.add_clause(clause);
    }

    for hole in 0..holes {
        for pigeon_a in 0..pigeons {
            for pigeon_b in 0..pigeon_a {
                formula.add_clause(clause(&[-var(pigeon_a, hole), -var(pigeon_b, hole)]));
            }
        }
    }

    formula
}

#[test]
fn pigeon_hole_unsat() {
    let mut solver = Solver::new();
    solver.add_formula(&pigeon_hole(4, 3));
    assert_eq!(solver.solve(), SolverResult::Unsat);
}

#[test]
fn pigeon_hole_barely_sat() {
    let formula = pigeon_hole(3, 3);
    let mut solver = Solver::new();
    solver.add_formula(&formula);
    assert_eq!(solver.solve(), SolverResult::Sat);
    assert!(check_model(&solver.model().unwrap(), &formula));
}

/// Deterministic random 3-CNF via xorshift.
fn random_3cnf(vars: usize, clauses: usize, mut state: u64) -> CnfFormula {
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let mut formula = CnfFormula::new();
    formula.set_var_count(vars);

    for _ in 0..clauses {
        let mut lits = vec![];
        while lits.len() < 3 {
            let index = (next() % vars as u64) as usize;
            let lit = Lit::from_index(index, next() & 1 == 0);
            if !lits.iter().any(|&other: &Lit| other.index() == index) {
                lits.push(lit);
            }
        }
        formula.add_clause(lits);
    }

    formula
}

#[test]
fn random_3cnf_at_phase_transition() {
    // 100 variables at clause ratio 4.2. Whatever the verdict, a claimed model must check out.
    for seed in 1..4 {
        let formula = random_3cnf(100, 420, seed);
        let mut solver = Solver::new();
        solver.add_formula(&formula);
        match solver.solve() {
            SolverResult::Sat => {
                assert!(check_model(&solver.model().unwrap(), &formula));
            }
            SolverResult::Unsat => {}
            other => panic!("expected a definite answer, got {:?}", other),
        }
    }
}

#[test]
fn empty_formula_and_single_unit() {
    let mut solver = Solver::new();
    assert_eq!(solver.solve(), SolverResult::Sat);
    assert_eq!(solver.model(), Some(vec![]));

    solver.add_clause(&clause(&[-7]));
    assert_eq!(solver.solve(), SolverResult::Sat);
    let model = solver.model().unwrap();
    assert!(model.contains(&Lit::from_dimacs(-7)));
    assert_eq!(model.len(), 7);
}

#[test]
fn empty_clause_unsat_is_sticky() {
    let mut solver = Solver::new();
    assert!(!solver.add_clause(&[]));
    assert_eq!(solver.solve(), SolverResult::Unsat);
    // Everything after a proven contradiction is a no-op.
    assert!(!solver.add_clause(&clause(&[1, 2])));
    assert_eq!(solver.solve_with_assumptions(&clause(&[1])), SolverResult::Unsat);
}

#[test]
fn interrupt_returns_unknown() {
    let mut solver = Solver::new();
    solver.add_formula(&pigeon_hole(4, 3));

    let flag = solver.interrupt_flag();
    flag.store(true, Ordering::Relaxed);
    assert_eq!(solver.solve(), SolverResult::Unknown);

    flag.store(false, Ordering::Relaxed);
    assert_eq!(solver.solve(), SolverResult::Unsat);
}

#[test]
fn conflict_budget_returns_unknown() {
    let mut config = SolverConfig::default();
    config.max_conflicts = Some(0);
    let mut solver = Solver::with_config(config).unwrap();
    solver.add_formula(&pigeon_hole(5, 4));
    assert_eq!(solver.solve(), SolverResult::Unknown);

    solver.set_option("max_conflicts", "1000000").unwrap();
    assert_eq!(solver.solve(), SolverResult::Unsat);
}

#[test]
fn equivalent_literals_are_restored_in_the_model() {
    // The first three clauses make 1, 2 and 3 pairwise equivalent.
    let formula = cnf_formula![
        -1, 2;
        -2, 3;
        -3, 1;
        -1, -4;
        4, 2;
    ];
    let mut solver = Solver::new();
    solver.add_formula(&formula);
    assert_eq!(solver.solve(), SolverResult::Sat);
    let model = solver.model().unwrap();
    assert_eq!(model.len(), 4);
    assert!(check_model(&model, &formula));
}

#[test]
fn repeated_solving_is_stable() {
    let formula = pigeon_hole(3, 3);
    let mut solver = Solver::new();
    solver.add_formula(&formula);

    for _ in 0..3 {
        assert_eq!(solver.solve(), SolverResult::Sat);
        assert!(check_model(&solver.model().unwrap(), &formula));
    }
}

proptest! {
    #[test]
    fn pigeon_hole_assumption_cores(
        (enable_row, columns, formula) in conditional_pigeon_hole(1..4usize, 1..3usize),
    ) {
        let mut solver = Solver::new();
        solver.add_formula(&formula);

        // Without assumptions all rows can stay disabled.
        prop_assert_eq!(solver.solve(), SolverResult::Sat);

        // Enabling more rows than columns is unsatisfiable and yields a core.
        prop_assert_eq!(
            solver.solve_with_assumptions(&enable_row),
            SolverResult::UnsatUnderAssumptions
        );

        let core = solver.unsat_assumption_subset().unwrap().to_vec();
        prop_assert!(!core.is_empty());
        for lit in core.iter() {
            prop_assert!(enable_row.contains(lit));
        }

        // The reported subset must itself be unsatisfiable with the formula.
        prop_assert_eq!(
            solver.solve_with_assumptions(&core),
            SolverResult::UnsatUnderAssumptions
        );

        // Enabling exactly as many rows as there are columns is fine.
        prop_assert_eq!(
            solver.solve_with_assumptions(&enable_row[..columns]),
            SolverResult::Sat
        );
    }
}
