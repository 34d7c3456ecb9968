//! Argument scanning and binding for `@use` calls.
//!
//! The argument list of a call like
//! `@use crud_surface_set(entity_name=Task, tags=["a","b"])` is split on
//! top-level commas only: commas nested inside `[]`, `()`, `{}` or quoted
//! strings belong to the value. Values are then parsed into [`ArgValue`]s and
//! bound positionally or by name against the entry's declared parameters.

use crate::vocab::{ParamType, VocabEntry};
use std::collections::HashMap;

/// A bound argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Quoted string content.
    Str(String),
    /// Bare identifier (used for model refs and unquoted string-ish values).
    Ident(String),
    Bool(bool),
    /// Kept as text to preserve the author's exact representation.
    Number(String),
    List(Vec<ArgValue>),
    Dict(Vec<(String, ArgValue)>),
}

impl ArgValue {
    /// Render the value back to DSL text for template interpolation.
    pub fn render(&self) -> String {
        match self {
            ArgValue::Str(s) | ArgValue::Ident(s) => s.clone(),
            ArgValue::Bool(b) => b.to_string(),
            ArgValue::Number(n) => n.clone(),
            ArgValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(ArgValue::render).collect();
                format!("[{}]", rendered.join(", "))
            }
            ArgValue::Dict(pairs) => {
                let rendered: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.render()))
                    .collect();
                format!("{{{}}}", rendered.join(", "))
            }
        }
    }

    /// Does this value satisfy the declared parameter type?
    /// Bare identifiers are acceptable wherever a string is expected, since
    /// DSL authors write `title_field=title` rather than `title_field="title"`.
    pub fn matches(&self, ty: ParamType) -> bool {
        match ty {
            ParamType::String => matches!(self, ArgValue::Str(_) | ArgValue::Ident(_)),
            ParamType::ModelRef => matches!(self, ArgValue::Ident(_) | ArgValue::Str(_)),
            ParamType::Boolean => matches!(self, ArgValue::Bool(_)),
            ParamType::Number => matches!(self, ArgValue::Number(_)),
            ParamType::List => matches!(self, ArgValue::List(_)),
            ParamType::Dict => matches!(self, ArgValue::Dict(_)),
        }
    }

    /// Convert a manifest JSON default into an argument value.
    /// Manifest loading already rejected defaults that contradict their
    /// declared type, so this cannot observe a mismatch.
    pub fn from_json(v: &serde_json::Value) -> ArgValue {
        use serde_json::Value;
        match v {
            Value::String(s) => ArgValue::Str(s.clone()),
            Value::Bool(b) => ArgValue::Bool(*b),
            Value::Number(n) => ArgValue::Number(n.to_string()),
            Value::Array(items) => ArgValue::List(items.iter().map(ArgValue::from_json).collect()),
            Value::Object(map) => ArgValue::Dict(
                map.iter()
                    .map(|(k, v)| (k.clone(), ArgValue::from_json(v)))
                    .collect(),
            ),
            Value::Null => ArgValue::Str(String::new()),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            ArgValue::Bool(b) => *b,
            ArgValue::Str(s) | ArgValue::Ident(s) => !s.is_empty(),
            ArgValue::Number(n) => n != "0",
            ArgValue::List(items) => !items.is_empty(),
            ArgValue::Dict(pairs) => !pairs.is_empty(),
        }
    }
}

/// Split an argument list on top-level commas, respecting nesting and quotes.
pub fn split_top_level(text: &str) -> Result<Vec<String>, String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                current.push(c);
                loop {
                    match chars.next() {
                        Some('\\') => {
                            current.push('\\');
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        }
                        Some('"') => {
                            current.push('"');
                            break;
                        }
                        Some(inner) => current.push(inner),
                        None => return Err("unterminated string in argument list".to_owned()),
                    }
                }
            }
            '[' | '(' | '{' => {
                depth += 1;
                current.push(c);
            }
            ']' | ')' | '}' => {
                depth -= 1;
                if depth < 0 {
                    return Err(format!("unbalanced '{}' in argument list", c));
                }
                current.push(c);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_owned());
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if depth != 0 {
        return Err("unbalanced brackets in argument list".to_owned());
    }
    let last = current.trim();
    if !last.is_empty() {
        parts.push(last.to_owned());
    } else if !parts.is_empty() {
        return Err("trailing comma in argument list".to_owned());
    }
    Ok(parts)
}

/// Parse one argument value.
pub fn parse_value(text: &str) -> Result<ArgValue, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("empty argument value".to_owned());
    }

    if let Some(inner) = text.strip_prefix('"') {
        let inner = inner
            .strip_suffix('"')
            .ok_or_else(|| "unterminated string value".to_owned())?;
        return Ok(ArgValue::Str(unescape(inner)));
    }

    if let Some(body) = text.strip_prefix('[') {
        let body = body
            .strip_suffix(']')
            .ok_or_else(|| "unterminated list value".to_owned())?;
        let mut items = Vec::new();
        for part in split_top_level(body)? {
            items.push(parse_value(&part)?);
        }
        return Ok(ArgValue::List(items));
    }

    if let Some(body) = text.strip_prefix('{') {
        let body = body
            .strip_suffix('}')
            .ok_or_else(|| "unterminated dict value".to_owned())?;
        let mut pairs = Vec::new();
        for part in split_top_level(body)? {
            let (key, value) = part
                .split_once(':')
                .ok_or_else(|| format!("dict item '{}' is missing ':'", part))?;
            pairs.push((key.trim().to_owned(), parse_value(value)?));
        }
        return Ok(ArgValue::Dict(pairs));
    }

    match text {
        "true" => return Ok(ArgValue::Bool(true)),
        "false" => return Ok(ArgValue::Bool(false)),
        _ => {}
    }

    let mut digits = text.chars();
    let first = digits.next().unwrap_or(' ');
    if first.is_ascii_digit() || (first == '-' && text.len() > 1) {
        if text[1..].chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Ok(ArgValue::Number(text.to_owned()));
        }
    }

    if text.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        return Ok(ArgValue::Ident(text.to_owned()));
    }

    Err(format!("malformed argument value '{}'", text))
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Bind an argument list against a vocabulary entry's declared parameters.
///
/// Positional arguments bind in declaration order and must precede named
/// ones. Defaults fill omitted optional parameters. Errors: unknown or
/// duplicate parameter, excess positionals, missing required parameter,
/// value/type mismatch.
pub fn bind_args(entry: &VocabEntry, arg_text: &str) -> Result<HashMap<String, ArgValue>, String> {
    let parts = split_top_level(arg_text)?;
    let mut bound: HashMap<String, ArgValue> = HashMap::new();
    let mut seen_named = false;

    for (i, part) in parts.iter().enumerate() {
        let named = match part.split_once('=') {
            // `=` inside a value (e.g. a quoted string) is not a named arg;
            // only a bare identifier before `=` counts.
            Some((key, value))
                if !key.trim().is_empty()
                    && key.trim().chars().all(|c| c.is_alphanumeric() || c == '_') =>
            {
                Some((key.trim().to_owned(), value.trim().to_owned()))
            }
            _ => None,
        };

        let (name, value_text) = match named {
            Some((key, value)) => {
                seen_named = true;
                (key, value)
            }
            None => {
                if seen_named {
                    return Err(format!(
                        "positional argument '{}' after named arguments",
                        part
                    ));
                }
                let param = entry.parameters.get(i).ok_or_else(|| {
                    format!(
                        "too many positional arguments: '{}' takes {}",
                        entry.id,
                        entry.parameters.len()
                    )
                })?;
                (param.name.clone(), part.clone())
            }
        };

        let param = entry
            .param(&name)
            .ok_or_else(|| format!("unknown parameter '{}' for '{}'", name, entry.id))?;
        if bound.contains_key(&name) {
            return Err(format!("parameter '{}' bound more than once", name));
        }
        let value = parse_value(&value_text)?;
        if !value.matches(param.ty) {
            return Err(format!(
                "parameter '{}' expects {}, got '{}'",
                name,
                param.ty.as_str(),
                value_text
            ));
        }
        bound.insert(name, value);
    }

    for param in &entry.parameters {
        if bound.contains_key(&param.name) {
            continue;
        }
        match &param.default {
            Some(default) => {
                bound.insert(param.name.clone(), ArgValue::from_json(default));
            }
            None => {
                return Err(format!(
                    "missing required parameter '{}' for '{}'",
                    param.name, entry.id
                ));
            }
        }
    }

    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::{VocabExpansion, VocabKind, VocabParam, VocabScope};

    fn entry_with_params(params: Vec<VocabParam>) -> VocabEntry {
        VocabEntry {
            id: "e".to_owned(),
            kind: VocabKind::Macro,
            scope: VocabScope::Misc,
            parameters: params,
            expansion: VocabExpansion {
                template_body: String::new(),
            },
            tags: Vec::new(),
            deprecated: false,
        }
    }

    fn param(name: &str, ty: ParamType) -> VocabParam {
        VocabParam {
            name: name.to_owned(),
            ty,
            default: None,
        }
    }

    #[test]
    fn splits_on_top_level_commas_only() {
        let parts = split_top_level(r#"entity_name=Task, tags=["a","b"], limit=3"#).unwrap();
        assert_eq!(
            parts,
            vec![
                "entity_name=Task".to_owned(),
                r#"tags=["a","b"]"#.to_owned(),
                "limit=3".to_owned()
            ]
        );
    }

    #[test]
    fn comma_inside_quotes_is_preserved() {
        let parts = split_top_level(r#"label="a, b", x=1"#).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], r#"label="a, b""#);
    }

    #[test]
    fn nested_list_value_parses() {
        let v = parse_value(r#"["a", "b"]"#).unwrap();
        assert_eq!(
            v,
            ArgValue::List(vec![
                ArgValue::Str("a".to_owned()),
                ArgValue::Str("b".to_owned())
            ])
        );
    }

    #[test]
    fn binds_positional_and_named() {
        let entry = entry_with_params(vec![
            param("entity_name", ParamType::ModelRef),
            param("title_field", ParamType::String),
        ]);
        let bound = bind_args(&entry, "Task, title_field=title").unwrap();
        assert_eq!(bound["entity_name"], ArgValue::Ident("Task".to_owned()));
        assert_eq!(bound["title_field"], ArgValue::Ident("title".to_owned()));
    }

    #[test]
    fn missing_required_parameter_is_an_error() {
        let entry = entry_with_params(vec![param("entity_name", ParamType::ModelRef)]);
        let err = bind_args(&entry, "").unwrap_err();
        assert!(err.contains("missing required parameter 'entity_name'"));
    }

    #[test]
    fn default_fills_omitted_optional() {
        let mut p = param("field", ParamType::String);
        p.default = Some(serde_json::json!("deleted_at"));
        let entry = entry_with_params(vec![p]);
        let bound = bind_args(&entry, "").unwrap();
        assert_eq!(bound["field"], ArgValue::Str("deleted_at".to_owned()));
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let entry = entry_with_params(vec![param("limit", ParamType::Number)]);
        let err = bind_args(&entry, "limit=high").unwrap_err();
        assert!(err.contains("expects number"));
    }

    #[test]
    fn unknown_parameter_is_an_error() {
        let entry = entry_with_params(vec![param("a", ParamType::String)]);
        let err = bind_args(&entry, "b=1").unwrap_err();
        assert!(err.contains("unknown parameter 'b'"));
    }

    #[test]
    fn unbalanced_brackets_are_an_error() {
        assert!(split_top_level("tags=[\"a\"").is_err());
    }
}
