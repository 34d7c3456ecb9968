//! Minimal template renderer for vocabulary expansion bodies.
//!
//! Supports exactly what pattern-kind entries need to emit multiple
//! declarations from one call:
//!
//! - `{{name}}` -- interpolate a bound parameter
//! - `{{#if name}}...{{/if}}` -- include the body when `name` is truthy
//! - `{{#each name}}...{{/each}}` -- repeat the body per list element,
//!   with `{{item}}` bound to the current element
//!
//! Blocks nest. Anything else inside `{{ }}` is a render error, surfaced by
//! the expander as a `MacroError` at the call site.

use super::args::ArgValue;
use std::collections::HashMap;

pub fn render(template: &str, bindings: &HashMap<String, ArgValue>) -> Result<String, String> {
    let mut cursor = Cursor {
        text: template,
        pos: 0,
    };
    render_until(&mut cursor, bindings, None)
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    /// If positioned at a `{{...}}` tag, return its trimmed body.
    fn peek_tag(&self) -> Option<String> {
        let rest = self.rest();
        let body = rest.strip_prefix("{{")?;
        let end = body.find("}}")?;
        Some(body[..end].trim().to_owned())
    }

    fn consume_tag(&mut self) {
        if let Some(body) = self.rest().strip_prefix("{{") {
            if let Some(end) = body.find("}}") {
                self.pos += 2 + end + 2;
            }
        }
    }
}

/// Render until end of input or until the given close tag is reached
/// (the close tag itself is consumed).
fn render_until(
    cursor: &mut Cursor,
    bindings: &HashMap<String, ArgValue>,
    close: Option<&str>,
) -> Result<String, String> {
    let mut out = String::new();

    loop {
        let rest = cursor.rest();
        if rest.is_empty() {
            if let Some(tag) = close {
                return Err(format!("unterminated block: missing '{{{{{}}}}}'", tag));
            }
            return Ok(out);
        }

        let Some(brace) = rest.find("{{") else {
            out.push_str(rest);
            cursor.pos += rest.len();
            continue;
        };

        out.push_str(&rest[..brace]);
        cursor.pos += brace;

        let tag = cursor
            .peek_tag()
            .ok_or_else(|| "unterminated '{{' in template".to_owned())?;

        if let Some(expected) = close {
            if tag == expected {
                cursor.consume_tag();
                return Ok(out);
            }
        }

        if let Some(var) = tag.strip_prefix("#if ") {
            let var = var.trim();
            cursor.consume_tag();
            // Decide truthiness before touching the body so a dropped branch
            // is never rendered and cannot raise errors of its own.
            if bindings.get(var).is_some_and(ArgValue::is_truthy) {
                out.push_str(&render_until(cursor, bindings, Some("/if"))?);
            } else {
                skip_until(cursor, "/if")?;
                cursor.consume_tag();
            }
            continue;
        }

        if let Some(var) = tag.strip_prefix("#each ") {
            let var = var.trim();
            cursor.consume_tag();
            // The body is rendered once per element with `item` rebound, so
            // capture the raw span and replay it instead of rendering inline.
            let start = cursor.pos;
            skip_until(cursor, "/each")?;
            let body_end = cursor.pos;
            let raw_body = &cursor.text[start..body_end];
            cursor.consume_tag();

            let value = bindings
                .get(var)
                .ok_or_else(|| format!("unknown template variable '{}'", var))?;
            let ArgValue::List(items) = value else {
                return Err(format!("'{}' is not a list; cannot repeat over it", var));
            };
            for item in items {
                let mut inner = bindings.clone();
                inner.insert("item".to_owned(), item.clone());
                let mut body_cursor = Cursor {
                    text: raw_body,
                    pos: 0,
                };
                out.push_str(&render_until(&mut body_cursor, &inner, None)?);
            }
            continue;
        }

        if tag.starts_with('#') || tag.starts_with('/') {
            return Err(format!("unexpected block tag '{}'", tag));
        }

        let value = bindings
            .get(&tag)
            .ok_or_else(|| format!("unknown template variable '{}'", tag))?;
        out.push_str(&value.render());
        cursor.consume_tag();
    }
}

/// Advance the cursor to just before the matching close tag, skipping over
/// nested blocks of the same kind.
fn skip_until(cursor: &mut Cursor, close: &str) -> Result<(), String> {
    let open_prefix = match close {
        "/each" => "#each ",
        "/if" => "#if ",
        _ => "#",
    };
    let mut depth = 0usize;
    loop {
        let rest = cursor.rest();
        let Some(brace) = rest.find("{{") else {
            return Err(format!("unterminated block: missing '{{{{{}}}}}'", close));
        };
        cursor.pos += brace;
        let tag = cursor
            .peek_tag()
            .ok_or_else(|| "unterminated '{{' in template".to_owned())?;
        if tag.starts_with(open_prefix) {
            depth += 1;
        } else if tag == close {
            if depth == 0 {
                return Ok(());
            }
            depth -= 1;
        }
        cursor.consume_tag();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, ArgValue)]) -> HashMap<String, ArgValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn interpolates_variables() {
        let b = bindings(&[("entity_name", ArgValue::Ident("Task".to_owned()))]);
        let out = render("surface {{entity_name}}_list:\n  entity {{entity_name}}\n", &b).unwrap();
        assert_eq!(out, "surface Task_list:\n  entity Task\n");
    }

    #[test]
    fn if_block_included_when_truthy() {
        let b = bindings(&[("searchable", ArgValue::Bool(true))]);
        let out = render("a\n{{#if searchable}}search [title]\n{{/if}}b\n", &b).unwrap();
        assert_eq!(out, "a\nsearch [title]\nb\n");
    }

    #[test]
    fn if_block_dropped_when_falsy() {
        let b = bindings(&[("searchable", ArgValue::Bool(false))]);
        let out = render("a\n{{#if searchable}}search [title]\n{{/if}}b\n", &b).unwrap();
        assert_eq!(out, "a\nb\n");
    }

    #[test]
    fn unbound_if_variable_is_falsy() {
        let out = render("{{#if missing}}x{{/if}}ok", &HashMap::new()).unwrap();
        assert_eq!(out, "ok");
    }

    #[test]
    fn dropped_if_branch_is_never_rendered() {
        let b = bindings(&[("detailed", ArgValue::Bool(false))]);
        let out = render("{{#if detailed}}show {{no_such_var}}\n{{/if}}ok\n", &b).unwrap();
        assert_eq!(out, "ok\n");
    }

    #[test]
    fn dropped_if_branch_skips_nested_blocks() {
        let b = bindings(&[("detailed", ArgValue::Bool(false))]);
        let tpl = "{{#if detailed}}{{#if inner}}x{{/if}}y{{/if}}ok";
        let out = render(tpl, &b).unwrap();
        assert_eq!(out, "ok");
    }

    #[test]
    fn each_repeats_with_item_bound() {
        let b = bindings(&[(
            "tags",
            ArgValue::List(vec![
                ArgValue::Str("a".to_owned()),
                ArgValue::Str("b".to_owned()),
            ]),
        )]);
        let out = render("{{#each tags}}tag {{item}}\n{{/each}}", &b).unwrap();
        assert_eq!(out, "tag a\ntag b\n");
    }

    #[test]
    fn nested_each_blocks() {
        let b = bindings(&[(
            "outer",
            ArgValue::List(vec![ArgValue::List(vec![ArgValue::Number("1".to_owned())])]),
        )]);
        let out = render("{{#each outer}}{{#each item}}v={{item}};{{/each}}{{/each}}", &b).unwrap();
        assert_eq!(out, "v=1;");
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let err = render("{{nope}}", &HashMap::new()).unwrap_err();
        assert!(err.contains("unknown template variable 'nope'"));
    }

    #[test]
    fn unterminated_block_is_an_error() {
        let b = bindings(&[("x", ArgValue::Bool(true))]);
        let err = render("{{#if x}}body", &b).unwrap_err();
        assert!(err.contains("unterminated block"));
    }
}
