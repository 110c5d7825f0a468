//! Binding-token resolution.
//!
//! Tokens have the form `{{scope.path}}` where scope is `workflow` or
//! `step`. `{{workflow.input}}` is the run's top-level input,
//! `{{workflow.<name>}}` a named run variable, and
//! `{{step.<id>.output[.field…]}}` dereferences a field path into a prior
//! step's output.
//!
//! Two resolution modes apply to string values: if the entire string is
//! exactly one token, the resolved value keeps its native type; if tokens are
//! embedded in surrounding text, resolved values are stringified in place.
//! Resolution is pure: the same value and context always resolve to the same
//! result.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::context::RunContext;
use crate::error::{FlowError, Result};

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^{}\s]+)\s*\}\}").expect("token pattern"));

static WHOLE_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{\s*([^{}\s]+)\s*\}\}$").expect("whole-token pattern"));

/// Resolve a config value against the run context.
///
/// Strings are resolved per the two modes above; objects and arrays are
/// walked recursively with only string leaves touched; all other values pass
/// through unchanged. `current_order` is the order of the step being
/// executed; any `step.` token targeting order ≥ `current_order` fails with
/// [`FlowError::ForwardReference`], whether or not that step exists in the
/// store.
pub fn resolve(value: &Value, ctx: &RunContext, current_order: Option<u32>) -> Result<Value> {
    match value {
        Value::String(s) => resolve_str(s, ctx, current_order),
        Value::Array(items) => {
            let mut resolved = Vec::with_capacity(items.len());
            for item in items {
                resolved.push(resolve(item, ctx, current_order)?);
            }
            Ok(Value::Array(resolved))
        }
        Value::Object(map) => {
            let mut resolved = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                resolved.insert(key.clone(), resolve(item, ctx, current_order)?);
            }
            Ok(Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}

/// Resolve a single string value.
pub fn resolve_str(s: &str, ctx: &RunContext, current_order: Option<u32>) -> Result<Value> {
    // Whole-string match: native type preserved.
    if let Some(caps) = WHOLE_TOKEN_RE.captures(s) {
        return lookup(&caps[1], ctx, current_order);
    }

    // Interpolation: stringify each resolved token in place.
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for caps in TOKEN_RE.captures_iter(s) {
        let whole = caps.get(0).expect("capture 0");
        out.push_str(&s[last..whole.start()]);
        let resolved = lookup(&caps[1], ctx, current_order)?;
        out.push_str(&stringify(&resolved));
        last = whole.end();
    }
    out.push_str(&s[last..]);
    Ok(Value::String(out))
}

/// Render a resolved value for interpolation into surrounding text.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn lookup(path: &str, ctx: &RunContext, current_order: Option<u32>) -> Result<Value> {
    let token = path.to_string();
    let segments: Vec<&str> = path.split('.').collect();

    match segments.first().copied() {
        Some("workflow") => {
            let Some(&name) = segments.get(1) else {
                return Err(FlowError::resolution(token, "expected workflow.input or workflow.<variable>"));
            };
            if name == "input" {
                descend(ctx.input(), &segments[2..], &token)
            } else {
                let root = ctx
                    .variable(name)
                    .ok_or_else(|| FlowError::resolution(&token, format!("unknown workflow variable '{}'", name)))?;
                descend(root, &segments[2..], &token)
            }
        }
        Some("step") => {
            let Some(&step_id) = segments.get(1) else {
                return Err(FlowError::resolution(token, "expected step.<id>.output"));
            };
            if segments.get(2).copied() != Some("output") {
                return Err(FlowError::resolution(
                    token,
                    format!("only step.{}.output paths are resolvable", step_id),
                ));
            }

            // Ordering at run time, not existence, is authoritative: a step
            // at order >= the current order is a forward reference even if
            // its output happens to be recorded.
            match (ctx.step_order(step_id), current_order) {
                (Some(target_order), Some(current)) if target_order >= current => {
                    return Err(FlowError::ForwardReference {
                        token,
                        step_id: step_id.to_string(),
                        target_order,
                        current_order: current,
                    });
                }
                (None, _) => {
                    return Err(FlowError::resolution(
                        token,
                        format!("unknown step '{}'", step_id),
                    ));
                }
                _ => {}
            }

            let output = ctx.step_output(step_id).ok_or_else(|| {
                FlowError::resolution(
                    &token,
                    format!("step '{}' has no recorded output", step_id),
                )
            })?;
            descend(output, &segments[3..], &token)
        }
        Some(scope) => Err(FlowError::resolution(
            token.clone(),
            format!("unknown scope '{}'", scope),
        )),
        None => Err(FlowError::resolution(token, "empty token")),
    }
}

fn descend(root: &Value, segments: &[&str], token: &str) -> Result<Value> {
    let mut current = root;
    for seg in segments {
        current = match current {
            Value::Object(map) => map.get(*seg).ok_or_else(|| {
                FlowError::resolution(token, format!("no field '{}'", seg))
            })?,
            Value::Array(items) => {
                let idx: usize = seg.parse().map_err(|_| {
                    FlowError::resolution(token, format!("'{}' is not an array index", seg))
                })?;
                items.get(idx).ok_or_else(|| {
                    FlowError::resolution(token, format!("index {} out of bounds", idx))
                })?
            }
            _ => {
                return Err(FlowError::resolution(
                    token,
                    format!("cannot descend into '{}' through a scalar", seg),
                ));
            }
        };
    }
    Ok(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn context() -> RunContext {
        let mut vars = HashMap::new();
        vars.insert("greeting".to_string(), json!("hello"));
        vars.insert("limits".to_string(), json!({"max": 5}));

        let mut ctx = RunContext::new(json!({"name": "Ada", "count": 3}), vars);
        ctx.register_step("s1", 1);
        ctx.register_step("s2", 2);
        ctx.register_step("s3", 3);
        ctx.record_output("s1", json!({"text": "first output", "score": 0.9}));
        ctx
    }

    #[test]
    fn whole_token_preserves_native_type() {
        let ctx = context();
        let resolved = resolve_str("{{workflow.input.count}}", &ctx, Some(2)).unwrap();
        assert_eq!(resolved, json!(3));

        let resolved = resolve_str("{{workflow.limits}}", &ctx, Some(2)).unwrap();
        assert_eq!(resolved, json!({"max": 5}));
    }

    #[test]
    fn interpolation_stringifies() {
        let ctx = context();
        let resolved =
            resolve_str("Hi {{workflow.input.name}}, count={{workflow.input.count}}", &ctx, Some(2))
                .unwrap();
        assert_eq!(resolved, json!("Hi Ada, count=3"));
    }

    #[test]
    fn step_output_field_path() {
        let ctx = context();
        let resolved = resolve_str("{{step.s1.output.text}}", &ctx, Some(2)).unwrap();
        assert_eq!(resolved, json!("first output"));
    }

    #[test]
    fn unknown_scope_is_a_resolution_error() {
        let ctx = context();
        let err = resolve_str("{{secrets.api_key}}", &ctx, Some(2)).unwrap_err();
        match err {
            FlowError::Resolution { token, .. } => assert_eq!(token, "secrets.api_key"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn unknown_variable_is_a_resolution_error() {
        let ctx = context();
        assert!(matches!(
            resolve_str("{{workflow.nope}}", &ctx, Some(2)),
            Err(FlowError::Resolution { .. })
        ));
    }

    #[test]
    fn same_order_reference_is_forward() {
        let ctx = context();
        let err = resolve_str("{{step.s2.output}}", &ctx, Some(2)).unwrap_err();
        assert!(matches!(err, FlowError::ForwardReference { .. }));
    }

    #[test]
    fn later_order_reference_is_forward_even_with_output() {
        let mut ctx = context();
        // Even a recorded output is not resolvable when the order is later.
        ctx.record_output("s3", json!("should never be visible"));
        let err = resolve_str("{{step.s3.output}}", &ctx, Some(2)).unwrap_err();
        match err {
            FlowError::ForwardReference { step_id, target_order, current_order, .. } => {
                assert_eq!(step_id, "s3");
                assert_eq!(target_order, 3);
                assert_eq!(current_order, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn nonexistent_step_is_a_resolution_error() {
        let ctx = context();
        assert!(matches!(
            resolve_str("{{step.ghost.output}}", &ctx, Some(2)),
            Err(FlowError::Resolution { .. })
        ));
    }

    #[test]
    fn prior_step_without_output_is_a_resolution_error() {
        let mut ctx = context();
        ctx.register_step("skipped", 1);
        let err = resolve_str("{{step.skipped.output}}", &ctx, Some(2)).unwrap_err();
        assert!(matches!(err, FlowError::Resolution { .. }));
    }

    #[test]
    fn deep_walk_only_touches_string_leaves() {
        let ctx = context();
        let config = json!({
            "url": "https://example.com/{{workflow.input.name}}",
            "retries": 3,
            "nested": {"greeting": "{{workflow.greeting}}"},
            "list": ["{{workflow.input.count}}", 7]
        });

        let resolved = resolve(&config, &ctx, Some(2)).unwrap();
        assert_eq!(
            resolved,
            json!({
                "url": "https://example.com/Ada",
                "retries": 3,
                "nested": {"greeting": "hello"},
                "list": [3, 7]
            })
        );
    }

    #[test]
    fn resolution_is_pure() {
        let ctx = context();
        let first = resolve_str("{{workflow.input}}", &ctx, Some(2)).unwrap();
        let second = resolve_str("{{workflow.input}}", &ctx, Some(2)).unwrap();
        assert_eq!(first, second);
    }
}
