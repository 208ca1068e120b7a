//! Built-in functions
//!
//! Builtins are looked up by name after variables and declared functions, so a
//! module can shadow any of them. Higher-order builtins call back into the
//! evaluator and therefore take it by mutable reference.

use super::operations::compare;
use super::Evaluator;
use crate::error::RuntimeError;
use crate::value::Value;
use crate::{GlyphError, GlyphResult};
use std::cmp::Ordering;

pub const NAMES: &[&str] = &[
    "upper",
    "lower",
    "trim",
    "split",
    "join",
    "contains",
    "replace",
    "substring",
    "startsWith",
    "endsWith",
    "indexOf",
    "length",
    "len",
    "toString",
    "parseInt",
    "parseFloat",
    "abs",
    "min",
    "max",
    "append",
    "keys",
    "values",
    "range",
    "map",
    "filter",
    "reduce",
    "find",
    "some",
    "every",
    "sort",
    "reverse",
    "slice",
    "now",
    "time.now",
    "matches",
];

pub fn exists(name: &str) -> bool {
    NAMES.contains(&name)
}

pub fn call(eval: &mut Evaluator<'_>, name: &str, args: Vec<Value>) -> GlyphResult<Value> {
    let args = Args { name, values: args };
    match name {
        "upper" => {
            args.count(1, 1)?;
            Ok(Value::string(args.string(0)?.to_uppercase()))
        }
        "lower" => {
            args.count(1, 1)?;
            Ok(Value::string(args.string(0)?.to_lowercase()))
        }
        "trim" => {
            args.count(1, 1)?;
            Ok(Value::string(args.string(0)?.trim()))
        }
        "split" => {
            args.count(2, 2)?;
            let (text, separator) = (args.string(0)?, args.string(1)?);
            let parts: Vec<Value> = if separator.is_empty() {
                text.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                text.split(separator).map(Value::string).collect()
            };
            Ok(Value::Array(parts))
        }
        "join" => {
            args.count(1, 2)?;
            let separator = if args.len() > 1 { args.string(1)? } else { "" };
            let parts: Vec<String> = args
                .array(0)?
                .iter()
                .map(Value::to_display_string)
                .collect();
            Ok(Value::String(parts.join(separator)))
        }
        "contains" => {
            args.count(2, 2)?;
            let found = match (&args.values[0], &args.values[1]) {
                (Value::String(text), Value::String(needle)) => text.contains(needle.as_str()),
                (Value::Array(items), needle) => items.contains(needle),
                (Value::Object(fields), Value::String(key)) => fields.contains_key(key),
                (target, _) => return Err(args.mismatch(0, "string, array or object", target)),
            };
            Ok(Value::Bool(found))
        }
        "replace" => {
            args.count(3, 3)?;
            let text = args.string(0)?;
            Ok(Value::String(text.replace(args.string(1)?, args.string(2)?)))
        }
        "substring" => {
            args.count(2, 3)?;
            let chars: Vec<char> = args.string(0)?.chars().collect();
            let (start, end) = args.range_bounds(1, chars.len())?;
            Ok(Value::String(chars[start..end].iter().collect()))
        }
        "startsWith" => {
            args.count(2, 2)?;
            Ok(Value::Bool(args.string(0)?.starts_with(args.string(1)?)))
        }
        "endsWith" => {
            args.count(2, 2)?;
            Ok(Value::Bool(args.string(0)?.ends_with(args.string(1)?)))
        }
        "indexOf" => {
            args.count(2, 2)?;
            let position = match (&args.values[0], &args.values[1]) {
                (Value::String(text), Value::String(needle)) => text
                    .find(needle.as_str())
                    .map(|byte| text[..byte].chars().count()),
                (Value::Array(items), needle) => items.iter().position(|item| item == needle),
                (target, _) => return Err(args.mismatch(0, "string or array", target)),
            };
            Ok(Value::Int(position.map_or(-1, |p| p as i64)))
        }
        "length" | "len" => {
            args.count(1, 1)?;
            let length = match &args.values[0] {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(fields) => fields.len(),
                other => return Err(args.mismatch(0, "string, array or object", other)),
            };
            Ok(Value::Int(length as i64))
        }
        "toString" => {
            args.count(1, 1)?;
            Ok(Value::String(args.values[0].to_display_string()))
        }
        "parseInt" => {
            args.count(1, 1)?;
            Ok(match &args.values[0] {
                Value::Int(i) => Value::Int(*i),
                Value::Float(f) => Value::Int(f.trunc() as i64),
                Value::String(s) => s.trim().parse::<i64>().map_or(Value::Null, Value::Int),
                _ => Value::Null,
            })
        }
        "parseFloat" => {
            args.count(1, 1)?;
            Ok(match &args.values[0] {
                Value::Int(i) => Value::Float(*i as f64),
                Value::Float(f) => Value::Float(*f),
                Value::String(s) => s.trim().parse::<f64>().map_or(Value::Null, Value::Float),
                _ => Value::Null,
            })
        }
        "abs" => {
            args.count(1, 1)?;
            match &args.values[0] {
                Value::Int(i) => i.checked_abs().map(Value::Int).ok_or_else(|| {
                    RuntimeError::UnsupportedOperation("integer overflow in abs".to_string()).into()
                }),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                other => Err(args.mismatch(0, "number", other)),
            }
        }
        "min" | "max" => {
            args.count(1, usize::MAX)?;
            let candidates = match args.values.as_slice() {
                [Value::Array(items)] => items.clone(),
                values => values.to_vec(),
            };
            let wanted = if name == "min" {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let mut best: Option<Value> = None;
            for candidate in candidates {
                if !candidate.is_numeric() {
                    return Err(args.mismatch(0, "numbers", &candidate));
                }
                best = match best {
                    Some(current) if compare(&candidate, &current) != Some(wanted) => Some(current),
                    _ => Some(candidate),
                };
            }
            Ok(best.unwrap_or(Value::Null))
        }
        "append" => {
            args.count(1, usize::MAX)?;
            let mut items = args.array(0)?.to_vec();
            items.extend(args.values[1..].iter().cloned());
            Ok(Value::Array(items))
        }
        "keys" => {
            args.count(1, 1)?;
            let fields = args.object(0)?;
            Ok(Value::Array(fields.keys().cloned().map(Value::String).collect()))
        }
        "values" => {
            args.count(1, 1)?;
            let fields = args.object(0)?;
            Ok(Value::Array(fields.values().cloned().collect()))
        }
        "range" => {
            args.count(1, 3)?;
            let (start, end) = if args.len() == 1 {
                (0, args.int(0)?)
            } else {
                (args.int(0)?, args.int(1)?)
            };
            let step = if args.len() == 3 { args.int(2)? } else { 1 };
            range(eval, start, end, step)
        }
        "map" => {
            args.count(2, 2)?;
            let callback = args.values[1].clone();
            let mut results = Vec::new();
            for item in args.array(0)? {
                results.push(eval.call_value(&callback, vec![item.clone()])?);
            }
            Ok(Value::Array(results))
        }
        "filter" => {
            args.count(2, 2)?;
            let callback = args.values[1].clone();
            let mut kept = Vec::new();
            for item in args.array(0)? {
                if eval.call_value(&callback, vec![item.clone()])?.is_truthy() {
                    kept.push(item.clone());
                }
            }
            Ok(Value::Array(kept))
        }
        "reduce" => {
            args.count(3, 3)?;
            let callback = args.values[1].clone();
            let mut accumulator = args.values[2].clone();
            for item in args.array(0)? {
                accumulator = eval.call_value(&callback, vec![accumulator, item.clone()])?;
            }
            Ok(accumulator)
        }
        "find" => {
            args.count(2, 2)?;
            let callback = args.values[1].clone();
            for item in args.array(0)? {
                if eval.call_value(&callback, vec![item.clone()])?.is_truthy() {
                    return Ok(item.clone());
                }
            }
            Ok(Value::Null)
        }
        "some" | "every" => {
            args.count(2, 2)?;
            let callback = args.values[1].clone();
            let every = name == "every";
            for item in args.array(0)? {
                let hit = eval.call_value(&callback, vec![item.clone()])?.is_truthy();
                if hit != every {
                    return Ok(Value::Bool(hit));
                }
            }
            Ok(Value::Bool(every))
        }
        "sort" => {
            args.count(1, 2)?;
            let mut items = args.array(0)?.to_vec();
            sort(eval, &mut items, args.values.get(1))?;
            Ok(Value::Array(items))
        }
        "reverse" => {
            args.count(1, 1)?;
            match &args.values[0] {
                Value::Array(items) => Ok(Value::Array(items.iter().rev().cloned().collect())),
                Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
                other => Err(args.mismatch(0, "array or string", other)),
            }
        }
        "slice" => {
            args.count(2, 3)?;
            match &args.values[0] {
                Value::Array(items) => {
                    let (start, end) = args.range_bounds(1, items.len())?;
                    Ok(Value::Array(items[start..end].to_vec()))
                }
                Value::String(s) => {
                    let chars: Vec<char> = s.chars().collect();
                    let (start, end) = args.range_bounds(1, chars.len())?;
                    Ok(Value::String(chars[start..end].iter().collect()))
                }
                other => Err(args.mismatch(0, "array or string", other)),
            }
        }
        "now" | "time.now" => {
            args.count(0, 0)?;
            Ok(Value::Int(chrono::Utc::now().timestamp_millis()))
        }
        "matches" => {
            args.count(2, 2)?;
            let pattern = regex::Regex::new(args.string(1)?).map_err(|e| {
                RuntimeError::UnsupportedOperation(format!("invalid pattern: {}", e))
            })?;
            Ok(Value::Bool(pattern.is_match(args.string(0)?)))
        }
        _ => Err(RuntimeError::UndefinedFunction(name.to_string()).into()),
    }
}

fn range(eval: &Evaluator<'_>, start: i64, end: i64, step: i64) -> GlyphResult<Value> {
    if step == 0 {
        return Err(RuntimeError::UnsupportedOperation("range step cannot be zero".to_string()).into());
    }
    let span = if step > 0 { end.saturating_sub(start) } else { start.saturating_sub(end) };
    let count = if span <= 0 { 0 } else { (span - 1) / step.saturating_abs() + 1 };
    let limit = eval.limits().max_loop_iterations;
    if count as u64 > limit {
        return Err(GlyphError::ResourceLimitExceeded {
            limit_name: "max_loop_iterations".to_string(),
            limit_value: limit.to_string(),
            actual_value: count.to_string(),
            suggestion: "Use a smaller range".to_string(),
        });
    }
    Ok(Value::Array(
        (0..count).map(|i| Value::Int(start + i * step)).collect(),
    ))
}

/// Sort in place, by natural order or by a comparator returning a number
/// (negative for "less than") or a bool ("a before b")
fn sort(eval: &mut Evaluator<'_>, items: &mut [Value], comparator: Option<&Value>) -> GlyphResult<()> {
    let mut failure: Option<GlyphError> = None;
    items.sort_by(|a, b| {
        if failure.is_some() {
            return Ordering::Equal;
        }
        let ordering = match comparator {
            None => compare(a, b).ok_or_else(|| {
                RuntimeError::TypeMismatch(format!(
                    "cannot order {} and {}",
                    a.type_name(),
                    b.type_name()
                ))
                .into()
            }),
            Some(callback) => eval
                .call_value(callback, vec![a.clone(), b.clone()])
                .and_then(|result| match result {
                    Value::Bool(true) => Ok(Ordering::Less),
                    Value::Bool(false) => Ok(Ordering::Greater),
                    number => compare(&number, &Value::Int(0)).ok_or_else(|| {
                        RuntimeError::TypeMismatch(format!(
                            "sort comparator returned {}",
                            number.type_name()
                        ))
                        .into()
                    }),
                }),
        };
        ordering.unwrap_or_else(|error| {
            failure = Some(error);
            Ordering::Equal
        })
    });
    match failure {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Positional arguments of one builtin call
struct Args<'n> {
    name: &'n str,
    values: Vec<Value>,
}

impl Args<'_> {
    fn len(&self) -> usize {
        self.values.len()
    }

    fn count(&self, min: usize, max: usize) -> GlyphResult<()> {
        let actual = self.values.len();
        if actual < min || actual > max {
            return Err(RuntimeError::ArityMismatch {
                name: self.name.to_string(),
                expected: if actual < min { min } else { max },
                actual,
            }
            .into());
        }
        Ok(())
    }

    fn mismatch(&self, position: usize, expected: &str, actual: &Value) -> GlyphError {
        RuntimeError::TypeMismatch(format!(
            "argument {} of {} must be {}, got {}",
            position + 1,
            self.name,
            expected,
            actual.type_name()
        ))
        .into()
    }

    fn string(&self, position: usize) -> GlyphResult<&str> {
        match &self.values[position] {
            Value::String(s) => Ok(s),
            other => Err(self.mismatch(position, "a string", other)),
        }
    }

    fn int(&self, position: usize) -> GlyphResult<i64> {
        match &self.values[position] {
            Value::Int(i) => Ok(*i),
            other => Err(self.mismatch(position, "an int", other)),
        }
    }

    fn array(&self, position: usize) -> GlyphResult<&[Value]> {
        match &self.values[position] {
            Value::Array(items) => Ok(items),
            other => Err(self.mismatch(position, "an array", other)),
        }
    }

    fn object(&self, position: usize) -> GlyphResult<&std::collections::BTreeMap<String, Value>> {
        match &self.values[position] {
            Value::Object(fields) => Ok(fields),
            other => Err(self.mismatch(position, "an object", other)),
        }
    }

    /// `start[, end]` arguments from `position` on, clamped to `0..=len`.
    /// Negative values count from the end.
    fn range_bounds(&self, position: usize, len: usize) -> GlyphResult<(usize, usize)> {
        let clamp = |index: i64| -> usize {
            let index = if index < 0 { len as i64 + index } else { index };
            index.clamp(0, len as i64) as usize
        };
        let start = clamp(self.int(position)?);
        let end = match self.values.get(position + 1) {
            Some(_) => clamp(self.int(position + 1)?),
            None => len,
        };
        Ok((start, end.max(start)))
    }
}
