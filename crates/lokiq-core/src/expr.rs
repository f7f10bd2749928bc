//! Query expression helpers.
//!
//! An expression is a label selector optionally followed by a free-text
//! regexp filter: `{job="api", env=~"prod|staging"} timeout`. These
//! functions split and rebuild that shape and inject label matchers into a
//! selector. They are pure; template substitution goes through the
//! [`Interpolate`] trait so callers can plug in their own variable source.

use crate::types::{ParsedSelector, QueryAction, RawQuery};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

fn selector_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\s)\{[^{]*\}").expect("selector pattern is valid"))
}

fn matcher_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_][A-Za-z0-9_]*)\s*(=~|!=|!~|=)\s*("(?:[^"\\]|\\.)*")"#)
            .expect("matcher pattern is valid")
    })
}

fn variable_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("variable pattern is valid")
    })
}

/// Split an expression into its selector and regexp filter.
pub fn parse_query(input: &str) -> ParsedSelector {
    match selector_regex().find(input) {
        Some(m) => ParsedSelector {
            selector: m.as_str().trim().to_string(),
            regexp: selector_regex().replace_all(input, "").trim().to_string(),
        },
        None => ParsedSelector {
            selector: String::new(),
            regexp: input.trim().to_string(),
        },
    }
}

/// Inverse of [`parse_query`].
pub fn format_query(selector: &str, regexp: &str) -> String {
    format!("{selector} {regexp}").trim().to_string()
}

/// Add `key="value"` to a selector, replacing an existing equality matcher
/// on the same key. Matchers are emitted sorted by key.
pub fn add_label_to_selector(selector: &str, key: &str, value: &str) -> String {
    let mut matchers: Vec<(String, String, String)> = matcher_regex()
        .captures_iter(selector)
        .map(|c| (c[1].to_string(), c[2].to_string(), c[3].to_string()))
        .filter(|(k, op, _)| !(k == key && op == "="))
        .collect();
    let quoted = format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""));
    matchers.push((key.to_string(), "=".to_string(), quoted));
    matchers.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let body: Vec<String> = matchers
        .into_iter()
        .map(|(k, op, v)| format!("{k}{op}{v}"))
        .collect();
    format!("{{{}}}", body.join(","))
}

/// Apply a [`QueryAction`] to a whole expression.
pub fn apply_action(expression: &str, action: &QueryAction) -> String {
    match action {
        QueryAction::AddFilter { key, value } => {
            let parsed = parse_query(expression);
            let selector = add_label_to_selector(&parsed.selector, key, value);
            format_query(&selector, &parsed.regexp)
        }
    }
}

/// Return a copy of `query` with `action` applied to its expression.
pub fn modify_query(query: &RawQuery, action: &QueryAction) -> RawQuery {
    RawQuery {
        expression: apply_action(&query.expression, action),
        ..query.clone()
    }
}

/// Template-variable substitution applied before an expression is parsed.
pub trait Interpolate: Send + Sync {
    fn interpolate(&self, expr: &str) -> String;
}

impl<F> Interpolate for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn interpolate(&self, expr: &str) -> String {
        self(expr)
    }
}

/// Substitutes `$name` and `${name}` from a fixed map. Unknown variables are
/// left untouched.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    vars: HashMap<String, String>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl Interpolate for TemplateVars {
    fn interpolate(&self, expr: &str) -> String {
        if self.vars.is_empty() {
            return expr.to_string();
        }
        variable_regex()
            .replace_all(expr, |caps: &Captures| {
                let name = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
                match name.and_then(|n| self.vars.get(n)) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}
