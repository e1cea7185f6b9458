//! Model extraction and extension.
use partial_ref::{partial, PartialRef};

use gluesat_formula::{Lit, Var};

use crate::context::{AssignmentP, Context, VariablesP};

/// Extract a full model from a satisfying assignment.
///
/// Variables replaced by equivalent literals are not assigned by the search; their values follow
/// from their representatives. Walking the replacement log backwards guarantees that each
/// representative's value is known before it is used, even when representatives were themselves
/// replaced by a later simplifier run. Unconstrained variables default to their saved polarity.
pub fn extract_model(
    ctx: partial!(Context, AssignmentP, VariablesP),
) -> Vec<Lit> {
    let assignment = ctx.part(AssignmentP);
    let variables = ctx.part(VariablesP);

    let mut values: Vec<bool> = (0..variables.count())
        .map(|index| {
            let var = Var::from_index(index);
            assignment
                .var_value(var)
                .unwrap_or_else(|| assignment.last_var_value(var))
        })
        .collect();

    for &(var, replacement) in variables.replacement_log().iter().rev() {
        values[var.index()] = values[replacement.index()] ^ replacement.is_negative();
    }

    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| Lit::from_index(index, value))
        .collect()
}
