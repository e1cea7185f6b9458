//! Variable metadata.
//!
//! Tracks which variables were replaced by equivalent literals and which variables may be picked
//! as decisions. Replacements are also kept as an ordered log so that a model for the remaining
//! variables can be extended to the replaced ones.
use gluesat_formula::{Lit, Var};

/// Variable metadata.
#[derive(Default)]
pub struct Variables {
    count: usize,
    /// For a replaced variable the equivalent literal it was replaced with.
    ///
    /// The replacement may itself be replaced by a later simplifier run, so users have to follow
    /// the chain. The chain is guaranteed to be acyclic as a replacement always points at a
    /// variable that is not replaced at the time it is recorded.
    replacement: Vec<Option<Lit>>,
    /// All replacements in the order they were recorded.
    replacement_log: Vec<(Var, Lit)>,
    /// Whether the variable may be used as a decision.
    decidable: Vec<bool>,
}

impl Variables {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.count = count;
        self.replacement.resize(count, None);
        self.decidable.resize(count, true);
    }

    /// Number of allocated variables.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether the variable was replaced by an equivalent literal.
    pub fn is_replaced(&self, var: Var) -> bool {
        self.replacement[var.index()].is_some()
    }

    /// Whether the variable takes part in the search.
    pub fn is_active(&self, var: Var) -> bool {
        !self.is_replaced(var)
    }

    /// Whether the variable may be picked as a decision.
    pub fn is_decidable(&self, var: Var) -> bool {
        self.decidable[var.index()] && self.is_active(var)
    }

    /// Allow or forbid picking the variable as a decision.
    pub fn set_decidable(&mut self, var: Var, decidable: bool) {
        self.decidable[var.index()] = decidable;
    }

    /// Record the replacement of `var` by the equivalent literal `replacement`.
    ///
    /// The replacement target must not be a replaced variable itself.
    pub fn replace(&mut self, var: Var, replacement: Lit) {
        debug_assert!(self.replacement[var.index()].is_none());
        debug_assert!(var != replacement.var());
        debug_assert!(self.replacement[replacement.index()].is_none());
        self.replacement[var.index()] = Some(replacement);
        self.replacement_log.push((var, replacement));
    }

    /// All replacements in the order they were recorded.
    pub fn replacement_log(&self) -> &[(Var, Lit)] {
        &self.replacement_log
    }

    /// Map a literal through the recorded replacements.
    ///
    /// Returns the literal itself when its variable is active.
    pub fn map_lit(&self, lit: Lit) -> Lit {
        let mut lit = lit;
        while let Some(replacement) = self.replacement[lit.index()] {
            lit = replacement ^ lit.is_negative();
        }
        lit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacement_chains() {
        let mut variables = Variables::default();
        variables.set_var_count(4);

        let v = |n| Var::from_dimacs(n);
        let l = |n| Lit::from_dimacs(n);

        variables.replace(v(3), l(-2));
        assert_eq!(variables.map_lit(l(3)), l(-2));
        assert_eq!(variables.map_lit(l(-3)), l(2));

        variables.replace(v(2), l(1));
        assert_eq!(variables.map_lit(l(3)), l(-1));
        assert_eq!(variables.map_lit(l(-3)), l(1));
        assert_eq!(variables.map_lit(l(4)), l(4));

        assert!(!variables.is_active(v(2)));
        assert!(variables.is_active(v(1)));
        assert_eq!(variables.replacement_log(), &[(v(3), l(-2)), (v(2), l(1))]);
    }

    #[test]
    fn decidable_flags() {
        let mut variables = Variables::default();
        variables.set_var_count(2);

        let v = Var::from_dimacs(1);
        assert!(variables.is_decidable(v));
        variables.set_decidable(v, false);
        assert!(!variables.is_decidable(v));
        assert!(variables.is_active(v));
    }
}
