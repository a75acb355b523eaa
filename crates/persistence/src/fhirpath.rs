//! A narrow FHIRPath evaluator.
//!
//! The full FHIRPath language is treated as an external collaborator with a
//! single contract: `(resource, expression) -> Vec<Value>`. This module
//! implements exactly that contract for the shapes the catalog's
//! expressions actually use — dotted field navigation with array
//! flattening, plus the two `.where(...)` shapes extraction and inclusion
//! care about by name (`where(url='…')` on extensions, `where(resolve() is
//! T)` on polymorphic references). Any other `.where(...)` predicate is
//! treated as a pass-through.

use serde_json::Value;

/// Evaluates a FHIRPath expression against a resource, returning every
/// matched JSON value (scalars and objects alike; arrays are flattened one
/// level at a time as navigation proceeds).
///
/// The expression's leading segment is conventionally the resource type
/// (`Patient.name.family`) and is skipped without requiring a match, since
/// the catalog is queried by resource type already.
pub fn evaluate(resource: &Value, expression: &str) -> Vec<Value> {
    let segments = split_segments(expression);
    if segments.is_empty() {
        return Vec::new();
    }

    let mut current = vec![resource.clone()];
    for (i, segment) in segments.iter().enumerate() {
        if i == 0 {
            // Leading segment is the resource type name; it names the root,
            // it does not navigate into a field.
            continue;
        }
        current = apply_segment(current, segment);
        if current.is_empty() {
            break;
        }
    }
    current
}

/// Splits a FHIRPath expression on top-level `.` characters, keeping the
/// contents of `where(...)` (and any other parenthesised call) together
/// with the segment it is attached to.
fn split_segments(expr: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in expr.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            '.' if depth == 0 => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Applies one path segment to a working set of values, flattening arrays
/// encountered along the way.
fn apply_segment(current: Vec<Value>, segment: &str) -> Vec<Value> {
    if let Some(field) = segment.strip_prefix("where(").and_then(|s| s.strip_suffix(')')) {
        return apply_where(current, field);
    }

    let mut next = Vec::new();
    for value in current {
        collect_field(&value, segment, &mut next);
    }
    next
}

fn collect_field(value: &Value, field: &str, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_field(item, field, out);
            }
        }
        Value::Object(map) => {
            if let Some(found) = map.get(field) {
                match found {
                    Value::Array(items) => out.extend(items.iter().cloned()),
                    Value::Null => {}
                    other => out.push(other.clone()),
                }
            }
        }
        _ => {}
    }
}

/// Applies a `.where(...)` predicate. Only `url='…'` is evaluated; every
/// other predicate (including `resolve() is T`, which only informs leaf
/// extraction — see [`leaf_and_target_type`]) passes every candidate value
/// through unfiltered.
fn apply_where(current: Vec<Value>, predicate: &str) -> Vec<Value> {
    match extension_url_literal(predicate) {
        Some(url) => current
            .into_iter()
            .filter(|v| {
                v.as_object()
                    .and_then(|o| o.get("url"))
                    .and_then(|u| u.as_str())
                    == Some(url.as_str())
            })
            .collect(),
        None => current,
    }
}

/// Extracts the literal URL out of a `url='…'` or `url="…"` predicate body.
fn extension_url_literal(predicate: &str) -> Option<String> {
    let predicate = predicate.trim();
    let rest = predicate.strip_prefix("url=")?;
    let rest = rest.trim();
    let quote = rest.chars().next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let body = &rest[1..];
    let end = body.find(quote)?;
    Some(body[..end].to_string())
}

/// Splits an expression into its leaf field name (the last segment before
/// a trailing `.where(...)` clause or the end of the path) and, if the
/// expression ends in `.where(resolve() is T)`, the expected target type.
///
/// Used to name a reference edge's `sourceExpression` and to compile
/// `_include`/`_revinclude` directives.
pub fn leaf_and_target_type(expression: &str) -> (String, Option<String>) {
    let (path, target_type) = match expression.find(".where(") {
        Some(idx) => {
            let predicate_start = idx + ".where(".len();
            let predicate_end = expression.rfind(')').unwrap_or(expression.len());
            let predicate = &expression[predicate_start..predicate_end.max(predicate_start)];
            let target = parse_resolve_is(predicate);
            (&expression[..idx], target)
        }
        None => (expression, None),
    };
    let leaf = path.rsplit('.').next().unwrap_or(path).to_string();
    (leaf, target_type)
}

/// Parses `resolve() is TYPE` out of a where-predicate body.
fn parse_resolve_is(predicate: &str) -> Option<String> {
    let predicate = predicate.trim();
    let rest = predicate.strip_prefix("resolve() is ")?;
    let ty = rest.trim();
    if ty.is_empty() {
        None
    } else {
        Some(ty.to_string())
    }
}
