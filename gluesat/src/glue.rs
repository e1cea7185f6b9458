//! Compute glue levels of clauses.
//!
//! The glue level of a clause is the number of distinct decision levels among its (assigned)
//! literals. This is also called the literal block distance (LBD). Low glue clauses connect few
//! decision levels and tend to stay useful, which makes glue the main quality metric for learned
//! clauses and the signal driving restarts.
use partial_ref::{partial, PartialRef};

use gluesat_formula::Lit;

use crate::context::{parts::*, Context};

/// Compute the glue level of a clause whose literals are all assigned.
pub fn compute_glue(mut ctx: partial!(Context, mut TmpDataP, ImplGraphP), lits: &[Lit]) -> usize {
    let (tmp_data, ctx) = ctx.split_part_mut(TmpDataP);
    let impl_graph = ctx.part(ImplGraphP);
    let flags = &mut tmp_data.flags;

    let mut glue = 0;

    for &lit in lits {
        let level = impl_graph.level(lit.var());
        let flag = &mut flags[level];
        if !*flag {
            *flag = true;
            glue += 1
        }
    }

    for &lit in lits {
        let level = impl_graph.level(lit.var());
        flags[level] = false;
    }

    glue
}
