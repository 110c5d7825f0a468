//! Comparison evaluation shared by CONDITION steps and DECISION rules.

use serde_json::Value;

use flow_core::{resolver, CompareOp, FlowError, Result, RunContext};

/// Resolve both operands and apply the operator.
///
/// `exists` is special-cased: an unresolvable left operand evaluates to
/// `false` instead of failing, which is the whole point of the operator.
/// Forward references stay fatal even there.
pub fn evaluate(
    field: &str,
    operator: CompareOp,
    value: &Value,
    ctx: &RunContext,
    current_order: u32,
) -> Result<bool> {
    if operator == CompareOp::Exists {
        return match resolver::resolve_str(field, ctx, Some(current_order)) {
            Ok(resolved) => Ok(!resolved.is_null()),
            Err(FlowError::Resolution { .. }) => Ok(false),
            Err(e) => Err(e),
        };
    }

    let left = resolver::resolve_str(field, ctx, Some(current_order))?;
    let right = resolver::resolve(value, ctx, Some(current_order))?;
    compare(operator, &left, &right)
}

fn compare(operator: CompareOp, left: &Value, right: &Value) -> Result<bool> {
    match operator {
        CompareOp::Equals => Ok(values_equal(left, right)),
        CompareOp::NotEquals => Ok(!values_equal(left, right)),
        CompareOp::GreaterThan => {
            let (l, r) = numeric_pair(left, right)?;
            Ok(l > r)
        }
        CompareOp::LessThan => {
            let (l, r) = numeric_pair(left, right)?;
            Ok(l < r)
        }
        CompareOp::Contains => match left {
            Value::String(s) => Ok(s.contains(&resolver::stringify(right))),
            Value::Array(items) => Ok(items.iter().any(|item| values_equal(item, right))),
            other => Err(FlowError::validation(format!(
                "'contains' needs a string or array left operand, got {}",
                value_kind(other)
            ))),
        },
        CompareOp::StartsWith => {
            Ok(resolver::stringify(left).starts_with(&resolver::stringify(right)))
        }
        CompareOp::EndsWith => Ok(resolver::stringify(left).ends_with(&resolver::stringify(right))),
        // Handled in `evaluate` before operand resolution.
        CompareOp::Exists => Ok(!left.is_null()),
    }
}

/// Numbers compare numerically even across the integer/float split, and
/// numeric strings (a common product of interpolation) are accepted.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (as_number(left), as_number(right)) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

fn numeric_pair(left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (as_number(left), as_number(right)) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(FlowError::validation(format!(
            "numeric comparison needs numeric operands, got {} and {}",
            value_kind(left),
            value_kind(right)
        ))),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
