//! gluesat is a CDCL based SAT solver library.
//!
//! Given a formula in conjunctive normal form, the solver either finds a satisfying assignment,
//! proves the formula unsatisfiable, or, under a set of assumption literals, returns a subset of
//! the assumptions responsible for unsatisfiability. Solving is incremental: clauses can be
//! added and `solve` called repeatedly.
//!
//! The search is conflict driven clause learning with two watched literals (binary and ternary
//! clauses are stored inline in the watcher lists), 1-UIP clause learning with recursive and
//! binary resolution minimization, glue driven restarts with blocking, activity based decisions
//! with saved phases, and periodic reduction of the learned clause database. In between search
//! episodes an inprocessing pass propagates top level units, collapses equivalent literals found
//! as strongly connected components of the binary implication graph, and performs subsumption
//! and self-subsuming resolution.
#[cfg(test)]
#[macro_use]
extern crate gluesat_formula;

mod analyze;
mod assumptions;
mod cdcl;
mod clause;
mod context;
mod decision;
mod glue;
mod load;
mod model;
mod prop;
mod schedule;
mod simplify;
mod state;
mod tmp;
mod variables;

pub mod config;
pub mod observer;
pub mod solver;

pub use crate::config::{ConfigError, RestartStrategy, SolverConfig};
pub use crate::observer::SolveObserver;
pub use crate::solver::{Solver, SolverResult};

pub use gluesat_formula::{CnfFormula, Lit, Var};
