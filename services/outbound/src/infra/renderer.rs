//! `{{ name }}` placeholder rendering.
//!
//! Placeholders hold a dotted path into the render data
//! (`{{ order.total }}`). Strings render verbatim, other JSON values render
//! as their JSON text, and `null` or a missing path renders as an empty
//! string.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::domain::repository::TemplateRenderer;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}")
        .expect("placeholder regex is valid")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct RegexRenderer;

impl TemplateRenderer for RegexRenderer {
    fn render(&self, template: &str, data: &Map<String, Value>) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures<'_>| {
                lookup(data, &caps[1]).map(stringify).unwrap_or_default()
            })
            .into_owned()
    }

    fn extract_variables(&self, template: &str) -> BTreeSet<String> {
        PLACEHOLDER
            .captures_iter(template)
            .map(|caps| caps[1].to_owned())
            .collect()
    }
}

fn lookup<'a>(data: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = data.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
