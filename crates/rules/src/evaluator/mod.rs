//! Condition evaluator: checks a compiled rule's conditions against a fact context.
//!
//! A rule matches iff every condition holds (logical AND). Conditions are
//! checked in declared order and evaluation stops at the first false one.
//! An [`EvaluationError`] (unexpected value shape, non-comparable operands)
//! makes that single condition false; it is logged and never propagated.

mod operators;

use tracing::debug;

use crate::context::FactContext;
use crate::schema::{Condition, Operand, Operator};
use crate::value::{Value, ABSENT};

/// A condition could not be evaluated against the values it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    #[error("'{operator}' cannot order {left} against {right}")]
    NotComparable {
        operator: Operator,
        left: &'static str,
        right: &'static str,
    },

    #[error("'{operator}' does not support a {kind} value")]
    UnsupportedShape {
        operator: Operator,
        kind: &'static str,
    },
}

/// Stateless condition evaluator.
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// True iff every condition holds in `ctx`.
    pub fn evaluate(conditions: &[Condition], ctx: &FactContext) -> bool {
        conditions.iter().all(|condition| match Self::check(condition, ctx) {
            Ok(holds) => holds,
            Err(e) => {
                debug!(field = %condition.field, error = %e, "condition evaluation error, treating as false");
                false
            }
        })
    }

    /// Evaluate a single condition, surfacing evaluation errors.
    pub fn check(condition: &Condition, ctx: &FactContext) -> Result<bool, EvaluationError> {
        let field = ctx.resolve(&condition.field);
        let operand = resolve_operand(&condition.operand, ctx);
        operators::apply(condition.operator, field, operand)
    }
}

fn resolve_operand<'a>(operand: &'a Operand, ctx: &'a FactContext) -> &'a Value {
    match operand {
        Operand::None => &ABSENT,
        Operand::Literal(value) => value,
        Operand::Field(path) => ctx.resolve(path),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
