//! `${name}` substitution engine for templates

use crate::config::{CacheConfig, UnresolvedPolicy};
use crate::error::{TemplateError, TemplateResult};

use super::types::ParamMap;

/// Replaces `${name}` placeholders with values from a [`ParamMap`].
///
/// Substituted values are rescanned for placeholders up to `max_depth`
/// times. A placeholder whose name is already being expanded is inserted
/// without further expansion, so self-referential values terminate.
/// `$${name}` is an escape and renders as the literal `${name}`.
#[derive(Debug, Clone, Copy)]
pub struct Substitutor {
    max_depth: usize,
    unresolved: UnresolvedPolicy,
}

impl Default for Substitutor {
    fn default() -> Self {
        Self::new(2, UnresolvedPolicy::Keep)
    }
}

impl Substitutor {
    pub fn new(max_depth: usize, unresolved: UnresolvedPolicy) -> Self {
        Self {
            max_depth,
            unresolved,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_substitution_depth, config.unresolved)
    }

    /// Substitute every placeholder in `text`
    pub fn substitute(&self, text: &str, params: &ParamMap) -> TemplateResult<String> {
        let mut out = String::with_capacity(text.len());
        let mut active = Vec::new();
        self.expand(text, params, 0, &mut active, &mut out)?;
        Ok(out)
    }

    fn expand<'a>(
        &self,
        text: &'a str,
        params: &'a ParamMap,
        depth: usize,
        active: &mut Vec<&'a str>,
        out: &mut String,
    ) -> TemplateResult<()> {
        let mut rest = text;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if let Some(after) = tail.strip_prefix("$${") {
                out.push_str("${");
                rest = after;
                continue;
            }

            let Some(after) = tail.strip_prefix("${") else {
                out.push('$');
                rest = &tail[1..];
                continue;
            };

            // Unterminated placeholder, copy the remainder as-is
            let Some(end) = after.find('}') else {
                out.push_str(tail);
                return Ok(());
            };

            let name = &after[..end];
            rest = &after[end + 1..];
            self.resolve(name, params, depth, active, out)?;
        }

        out.push_str(rest);
        Ok(())
    }

    fn resolve<'a>(
        &self,
        name: &'a str,
        params: &'a ParamMap,
        depth: usize,
        active: &mut Vec<&'a str>,
        out: &mut String,
    ) -> TemplateResult<()> {
        let Some(value) = params.get(name) else {
            return match self.unresolved {
                UnresolvedPolicy::Keep => {
                    out.push_str("${");
                    out.push_str(name);
                    out.push('}');
                    Ok(())
                }
                UnresolvedPolicy::Empty => Ok(()),
                UnresolvedPolicy::Error => {
                    Err(TemplateError::UnresolvedPlaceholder(name.to_string()))
                }
            };
        };

        if depth >= self.max_depth || active.contains(&name) {
            out.push_str(value);
            return Ok(());
        }

        active.push(name);
        let result = self.expand(value, params, depth + 1, active, out);
        active.pop();
        result
    }
}

/// Flatten a JSON object into a [`ParamMap`].
///
/// Strings are used as-is, numbers and booleans via their text form, null
/// becomes an empty string and arrays/objects their JSON representation.
pub fn params_from_json(variables: &serde_json::Value) -> TemplateResult<ParamMap> {
    let map = match variables {
        serde_json::Value::Object(map) => map,
        _ => {
            return Err(TemplateError::InvalidParams(
                "Variables must be an object".to_string(),
            ))
        }
    };

    Ok(map
        .iter()
        .map(|(key, value)| {
            let replacement = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Null => String::new(),
                _ => value.to_string(),
            };
            (key.clone(), replacement)
        })
        .collect())
}
