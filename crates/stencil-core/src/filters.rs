//! Value transforms exposed to templates as helpers.
//!
//! Each filter takes the helper's positional arguments and returns a JSON
//! value, so it works both inline (`{{ucfirst name}}`) and as a
//! subexpression (`{{#if (is_numeric id)}}`).

use std::collections::BTreeMap;
use std::fmt;

use handlebars::{
    Context, Handlebars, Helper, HelperDef, RenderContext, RenderError, RenderErrorReason,
    ScopedJson,
};
use serde_json::Value;

use crate::error::{Error, Result};

/// Signature of a filter.
pub type FilterFn = fn(&[Value]) -> std::result::Result<Value, FilterError>;

/// Argument errors raised by filters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("missing argument {0}")]
    MissingArgument(usize),

    #[error("argument {index} must be {expected}")]
    InvalidArgument { index: usize, expected: &'static str },
}

/// Names of the filters every builder starts with.
pub const BUILTIN_FILTERS: &[&str] = &["addslashes", "var_export", "is_numeric", "ucfirst", "substr"];

/// Look up a built-in filter by name.
pub fn builtin(name: &str) -> Option<FilterFn> {
    let filter: FilterFn = match name {
        "addslashes" => addslashes_filter,
        "var_export" => var_export_filter,
        "is_numeric" => is_numeric_filter,
        "ucfirst" => ucfirst_filter,
        "substr" => substr_filter,
        _ => return None,
    };
    Some(filter)
}

/// Named filters to install into a template environment.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: BTreeMap<String, FilterFn>,
}

impl FilterRegistry {
    /// A registry with no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in filter.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for name in BUILTIN_FILTERS {
            if let Some(filter) = builtin(name) {
                registry.register(*name, filter);
            }
        }
        registry
    }

    /// Add or replace a filter, returning the one it replaced.
    pub fn register(&mut self, name: impl Into<String>, filter: FilterFn) -> Option<FilterFn> {
        self.filters.insert(name.into(), filter)
    }

    /// Enable a built-in filter by name.
    pub fn enable(&mut self, name: &str) -> Result<()> {
        let filter = builtin(name).ok_or_else(|| Error::UnknownFilter(name.to_string()))?;
        self.register(name, filter);
        Ok(())
    }

    /// Remove a filter.
    pub fn remove(&mut self, name: &str) -> Result<FilterFn> {
        self.filters
            .remove(name)
            .ok_or_else(|| Error::UnknownFilter(name.to_string()))
    }

    /// Keep only the named filters. Fails without changing anything if a
    /// name is not registered.
    pub fn retain_only<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        if let Some(missing) = names.iter().find(|n| !self.contains(n.as_ref())) {
            return Err(Error::UnknownFilter(missing.as_ref().to_string()));
        }
        self.filters
            .retain(|name, _| names.iter().any(|n| n.as_ref() == name));
        Ok(())
    }

    /// Get a filter by name.
    pub fn get(&self, name: &str) -> Result<FilterFn> {
        self.filters
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownFilter(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Add the entries of `defaults` this registry does not define itself.
    pub fn merge_defaults(&mut self, defaults: &FilterRegistry) {
        for (name, filter) in &defaults.filters {
            self.filters.entry(name.clone()).or_insert(*filter);
        }
    }

    /// Register every filter as a helper.
    pub fn install(&self, hb: &mut Handlebars<'_>) {
        for (name, filter) in &self.filters {
            hb.register_helper(
                name,
                Box::new(FilterHelper {
                    name: name.clone(),
                    filter: *filter,
                }),
            );
        }
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

struct FilterHelper {
    name: String,
    filter: FilterFn,
}

impl HelperDef for FilterHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> std::result::Result<ScopedJson<'rc>, RenderError> {
        let mut args = Vec::with_capacity(h.params().len());
        for param in h.params() {
            if r.strict_mode() && param.is_value_missing() {
                return Err(RenderErrorReason::MissingVariable(
                    param.relative_path().map(|p| p.to_string()),
                )
                .into());
            }
            args.push(param.value().clone());
        }

        (self.filter)(&args)
            .map(ScopedJson::Derived)
            .map_err(|e| RenderErrorReason::Other(format!("{}: {}", self.name, e)).into())
    }
}

fn arg(args: &[Value], index: usize) -> std::result::Result<&Value, FilterError> {
    args.get(index).ok_or(FilterError::MissingArgument(index))
}

fn string_arg(args: &[Value], index: usize) -> std::result::Result<String, FilterError> {
    match arg(args, index)? {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(if *b { "1".to_string() } else { String::new() }),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(FilterError::InvalidArgument {
            index,
            expected: "a scalar",
        }),
    }
}

fn int_arg(args: &[Value], index: usize) -> std::result::Result<Option<i64>, FilterError> {
    let invalid = FilterError::InvalidArgument {
        index,
        expected: "an integer",
    };
    match args.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or(invalid),
        Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| invalid),
        Some(_) => Err(invalid),
    }
}

fn addslashes_filter(args: &[Value]) -> std::result::Result<Value, FilterError> {
    Ok(Value::String(addslashes(&string_arg(args, 0)?)))
}

fn var_export_filter(args: &[Value]) -> std::result::Result<Value, FilterError> {
    Ok(Value::String(var_export(arg(args, 0)?)))
}

fn is_numeric_filter(args: &[Value]) -> std::result::Result<Value, FilterError> {
    Ok(Value::Bool(is_numeric(arg(args, 0)?)))
}

fn ucfirst_filter(args: &[Value]) -> std::result::Result<Value, FilterError> {
    Ok(Value::String(ucfirst(&string_arg(args, 0)?)))
}

fn substr_filter(args: &[Value]) -> std::result::Result<Value, FilterError> {
    let text = string_arg(args, 0)?;
    let start = int_arg(args, 1)?.ok_or(FilterError::MissingArgument(1))?;
    let length = int_arg(args, 2)?;
    Ok(Value::String(substr(&text, start, length)))
}

/// Backslash-escape quotes, backslashes and NUL.
pub fn addslashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\'' | '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a value as a source literal.
pub fn var_export(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let entries: Vec<String> = items
                .iter()
                .enumerate()
                .map(|(i, v)| format!("{} => {}", i, var_export(v)))
                .collect();
            format!("array({})", entries.join(", "))
        }
        Value::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{} => {}", quote(k), var_export(v)))
                .collect();
            format!("array({})", entries.join(", "))
        }
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Numbers, and strings that parse as a finite number.
pub fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(f64::is_finite)
            .unwrap_or(false),
        _ => false,
    }
}

/// Upper-case the first character.
pub fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Character-based substring.
///
/// A negative `start` counts from the end. A negative `length` stops that
/// many characters before the end.
pub fn substr(s: &str, start: i64, length: Option<i64>) -> String {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as i64;

    let begin = if start < 0 { len.saturating_add(start).max(0) } else { start };
    if begin >= len {
        return String::new();
    }

    let end = match length {
        None => len,
        Some(l) if l < 0 => len.saturating_add(l),
        Some(l) => begin.saturating_add(l).min(len),
    };
    if end <= begin {
        return String::new();
    }

    chars[begin as usize..end as usize].iter().collect()
}
