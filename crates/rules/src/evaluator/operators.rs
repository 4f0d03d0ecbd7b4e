//! Per-operator semantics.

use std::cmp::Ordering;

use crate::schema::Operator;
use crate::value::Value;

use super::EvaluationError;

/// Apply `operator` to a resolved field value and operand.
///
/// `operand` is ignored by `exists` / `not_exists`.
pub(super) fn apply(
    operator: Operator,
    field: &Value,
    operand: &Value,
) -> Result<bool, EvaluationError> {
    match operator {
        Operator::Equals => Ok(field.equals(operand)),
        Operator::NotEquals => Ok(!field.equals(operand)),
        Operator::Contains => contains(field, operand),
        Operator::GreaterThan => ordering(operator, field, operand).map(|o| o == Some(Ordering::Greater)),
        Operator::LessThan => ordering(operator, field, operand).map(|o| o == Some(Ordering::Less)),
        Operator::Exists => Ok(field.is_present()),
        Operator::NotExists => Ok(!field.is_present()),
    }
}

/// Membership for sequences, substring match on the rendered value otherwise.
fn contains(field: &Value, needle: &Value) -> Result<bool, EvaluationError> {
    match field {
        Value::Absent | Value::Null => Ok(false),
        Value::Sequence(items) => Ok(items.iter().any(|item| item.equals(needle))),
        Value::Map(_) => Err(EvaluationError::UnsupportedShape {
            operator: Operator::Contains,
            kind: field.kind(),
        }),
        _ => {
            let Some(haystack) = field.render() else {
                return Ok(false);
            };
            match needle {
                Value::Sequence(_) | Value::Map(_) => Err(EvaluationError::UnsupportedShape {
                    operator: Operator::Contains,
                    kind: needle.kind(),
                }),
                _ => Ok(needle.render().is_some_and(|n| haystack.contains(&n))),
            }
        }
    }
}

/// Ordering for `greater_than` / `less_than`; `Ok(None)` when the field is missing.
fn ordering(
    operator: Operator,
    field: &Value,
    operand: &Value,
) -> Result<Option<Ordering>, EvaluationError> {
    if !field.is_present() || !operand.is_present() {
        return Ok(None);
    }
    field
        .compare(operand)
        .map(Some)
        .ok_or(EvaluationError::NotComparable {
            operator,
            left: field.kind(),
            right: operand.kind(),
        })
}
