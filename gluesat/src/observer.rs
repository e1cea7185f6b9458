//! Hooks for observing solver derivations.
//!
//! An observer receives every clause the solver derives or discards, together with the units and
//! variable replacements found during simplification. This is enough to drive an external
//! DRAT-style proof writer or a transcript checker. The observer is strictly passive, it cannot
//! influence the search in any way.
use gluesat_formula::{Lit, Var};

/// Callbacks for solver derivations.
///
/// All methods have empty default implementations, implementors only override what they need.
pub trait SolveObserver {
    /// A clause was derived or rewritten.
    ///
    /// This covers learned clauses as well as clauses shrunk by simplification.
    fn added_clause(&mut self, lits: &[Lit]) {
        let _ = lits;
    }

    /// A clause was removed from the formula.
    fn deleted_clause(&mut self, lits: &[Lit]) {
        let _ = lits;
    }

    /// A literal was proven at the top level.
    fn unit(&mut self, lit: Lit) {
        let _ = lit;
    }

    /// A variable was replaced by an equivalent literal.
    fn replaced_var(&mut self, var: Var, replacement: Lit) {
        let _ = (var, replacement);
    }
}

/// Optional observer slot of the solver.
///
/// Forwarding through this avoids `if let` chains at every emission site.
#[derive(Default)]
pub struct ObserverHook {
    observer: Option<Box<dyn SolveObserver>>,
}

impl ObserverHook {
    /// Install an observer, replacing any previous one.
    pub fn set(&mut self, observer: Box<dyn SolveObserver>) {
        self.observer = Some(observer);
    }

    /// Remove the current observer.
    pub fn clear(&mut self) {
        self.observer = None;
    }

    pub fn added_clause(&mut self, lits: &[Lit]) {
        if let Some(observer) = &mut self.observer {
            observer.added_clause(lits);
        }
    }

    pub fn deleted_clause(&mut self, lits: &[Lit]) {
        if let Some(observer) = &mut self.observer {
            observer.deleted_clause(lits);
        }
    }

    pub fn unit(&mut self, lit: Lit) {
        if let Some(observer) = &mut self.observer {
            observer.unit(lit);
        }
    }

    pub fn replaced_var(&mut self, var: Var, replacement: Lit) {
        if let Some(observer) = &mut self.observer {
            observer.replaced_var(var, replacement);
        }
    }
}
