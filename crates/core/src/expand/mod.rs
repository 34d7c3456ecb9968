//! Vocabulary expansion: rewrite `@use` directives into DSL text.
//!
//! Runs before lexing. Each `@use entry_id(args)` line is replaced by the
//! entry's rendered template; rendered text is rescanned so entries may
//! invoke other entries. An explicit stack of in-progress entry ids turns
//! self-reference into a named-cycle `MacroError` instead of unbounded
//! recursion, and [`MAX_EXPANSION_DEPTH`] bounds pathological non-cyclic
//! nesting.
//!
//! Every emitted line is recorded in the [`SourceMap`] as originating at the
//! `@use` call site, so diagnostics raised later on generated text point at
//! the line the author wrote.

mod args;
mod template;

pub use args::{bind_args, parse_value, split_top_level, ArgValue};
pub use template::render;

use crate::error::{Diagnostic, DiagnosticCode};
use crate::source::SourceMap;
use crate::vocab::VocabManifest;

/// Hard ceiling on nested expansions. The id stack catches cycles first;
/// this only trips on deeply nested acyclic macro chains.
pub const MAX_EXPANSION_DEPTH: usize = 32;

/// Expanded text plus the line map back to original source.
#[derive(Debug, Clone)]
pub struct Expansion {
    pub text: String,
    pub map: SourceMap,
}

/// Expand all `@use` directives in `source`.
///
/// Always returns usable text: a failed directive is reported as a
/// `MacroError` diagnostic, its line is dropped from the output, and
/// expansion continues with the rest of the file. Without a manifest, any
/// `@use` is an unknown-entry error.
pub fn expand(
    source: &str,
    file: &str,
    manifest: Option<&VocabManifest>,
) -> (Expansion, Vec<Diagnostic>) {
    let mut out = Expansion {
        text: String::new(),
        map: SourceMap::new(),
    };
    let mut diagnostics = Vec::new();
    let mut stack: Vec<String> = Vec::new();

    for (idx, line) in source.lines().enumerate() {
        let origin = idx as u32 + 1;
        let trimmed = line.trim_start();
        let Some(rest) = strip_use_keyword(trimmed) else {
            out.text.push_str(line);
            out.text.push('\n');
            out.map.push(origin);
            continue;
        };

        let indent = &line[..line.len() - trimmed.len()];
        let directive = rest.trim();
        match expand_directive(directive, origin, file, manifest, &mut stack, &mut diagnostics) {
            Ok(rendered) => {
                for rendered_line in rendered.lines() {
                    // Re-indent to the directive's depth so a call inside an
                    // entity body emits correctly nested lines.
                    if rendered_line.trim().is_empty() {
                        out.text.push('\n');
                    } else {
                        out.text.push_str(indent);
                        out.text.push_str(rendered_line);
                        out.text.push('\n');
                    }
                    out.map.push(origin);
                }
            }
            Err(diag) => diagnostics.push(diag),
        }
    }

    (out, diagnostics)
}

/// Strip a leading `@use` keyword, but only at a word boundary so that
/// identifiers like `@useful` stay ordinary text.
fn strip_use_keyword(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix("@use")?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() || c == '(' => Some(rest),
        Some(_) => None,
    }
}

/// Resolve, bind, type-check, and render one directive, then recursively
/// expand the rendered text. Returns the fully expanded replacement text.
fn expand_directive(
    directive: &str,
    origin: u32,
    file: &str,
    manifest: Option<&VocabManifest>,
    stack: &mut Vec<String>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<String, Diagnostic> {
    let (entry_id, arg_text) = match directive.split_once('(') {
        Some((id, rest)) => {
            let rest = rest.trim_end();
            let args = rest.strip_suffix(')').ok_or_else(|| {
                Diagnostic::macro_(file, origin, format!("malformed @use call: '{}'", directive))
            })?;
            (id.trim(), args)
        }
        None => (directive, ""),
    };

    if entry_id.is_empty() || !entry_id.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(Diagnostic::macro_(
            file,
            origin,
            format!("malformed @use call: '{}'", directive),
        ));
    }

    let entry = manifest.and_then(|m| m.get(entry_id)).ok_or_else(|| {
        Diagnostic::macro_(file, origin, format!("unknown vocabulary entry '{}'", entry_id))
    })?;

    if stack.iter().any(|id| id == entry_id) {
        let mut cycle: Vec<&str> = stack.iter().map(String::as_str).collect();
        cycle.push(entry_id);
        return Err(Diagnostic::macro_(
            file,
            origin,
            format!("circular vocabulary expansion: {}", cycle.join(" -> ")),
        ));
    }
    if stack.len() >= MAX_EXPANSION_DEPTH {
        return Err(Diagnostic::macro_(
            file,
            origin,
            format!(
                "vocabulary expansion exceeds maximum depth {} at entry '{}'",
                MAX_EXPANSION_DEPTH, entry_id
            ),
        ));
    }

    if entry.deprecated {
        diagnostics.push(Diagnostic::warning(
            DiagnosticCode::MacroError,
            file,
            origin,
            format!("vocabulary entry '{}' is deprecated", entry_id),
        ));
    }

    let bound = bind_args(entry, arg_text)
        .map_err(|msg| Diagnostic::macro_(file, origin, format!("'{}': {}", entry_id, msg)))?;
    let rendered = render(entry.template(), &bound)
        .map_err(|msg| Diagnostic::macro_(file, origin, format!("'{}': {}", entry_id, msg)))?;

    stack.push(entry_id.to_owned());
    let result = expand_rendered(&rendered, origin, file, manifest, stack, diagnostics);
    stack.pop();
    result
}

/// Rescan rendered template text for further `@use` directives.
fn expand_rendered(
    rendered: &str,
    origin: u32,
    file: &str,
    manifest: Option<&VocabManifest>,
    stack: &mut Vec<String>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<String, Diagnostic> {
    let mut out = String::new();
    for line in rendered.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = strip_use_keyword(trimmed) {
            let indent = &line[..line.len() - trimmed.len()];
            let inner = expand_directive(rest.trim(), origin, file, manifest, stack, diagnostics)?;
            for inner_line in inner.lines() {
                if inner_line.trim().is_empty() {
                    out.push('\n');
                } else {
                    out.push_str(indent);
                    out.push_str(inner_line);
                    out.push('\n');
                }
            }
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;

    fn manifest(json: &str) -> VocabManifest {
        VocabManifest::from_json(json).unwrap()
    }

    fn simple_manifest() -> VocabManifest {
        manifest(
            r#"{"entries": [
                {"id": "audit_fields", "kind": "macro", "scope": "data",
                 "expansion": {"template_body": "created_at: datetime required\nupdated_at: datetime"}},
                {"id": "titled", "kind": "alias", "scope": "data",
                 "parameters": [{"name": "length", "type": "number", "default": 200}],
                 "expansion": {"template_body": "title: str({{length}}) required"}},
                {"id": "timestamped_titled", "kind": "pattern", "scope": "data",
                 "expansion": {"template_body": "@use titled\n@use audit_fields"}},
                {"id": "old_style", "kind": "macro", "scope": "misc", "deprecated": true,
                 "expansion": {"template_body": "legacy: bool"}}
            ]}"#,
        )
    }

    #[test]
    fn plain_lines_pass_through_with_identity_map() {
        let (exp, diags) = expand("entity Task:\n  id: uuid pk\n", "a.spec", None);
        assert!(diags.is_empty());
        assert_eq!(exp.text, "entity Task:\n  id: uuid pk\n");
        assert_eq!(exp.map.resolve(2), 2);
    }

    #[test]
    fn directive_expands_and_maps_to_call_site() {
        let m = simple_manifest();
        let src = "entity Task:\n  @use audit_fields\n";
        let (exp, diags) = expand(src, "a.spec", Some(&m));
        assert!(diags.is_empty());
        assert_eq!(
            exp.text,
            "entity Task:\n  created_at: datetime required\n  updated_at: datetime\n"
        );
        // Both generated lines attribute to the @use on line 2.
        assert_eq!(exp.map.resolve(2), 2);
        assert_eq!(exp.map.resolve(3), 2);
    }

    #[test]
    fn default_applies_when_argument_omitted() {
        let m = simple_manifest();
        let (exp, diags) = expand("@use titled\n", "a.spec", Some(&m));
        assert!(diags.is_empty());
        assert_eq!(exp.text, "title: str(200) required\n");
    }

    #[test]
    fn nested_entries_expand_recursively() {
        let m = simple_manifest();
        let (exp, diags) = expand("@use timestamped_titled\n", "a.spec", Some(&m));
        assert!(diags.is_empty());
        assert_eq!(
            exp.text,
            "title: str(200) required\ncreated_at: datetime required\nupdated_at: datetime\n"
        );
        assert_eq!(exp.map.resolve(3), 1);
    }

    #[test]
    fn unknown_entry_reports_and_continues() {
        let m = simple_manifest();
        let src = "@use nope\nentity Task:\n  id: uuid pk\n";
        let (exp, diags) = expand(src, "a.spec", Some(&m));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, DiagnosticCode::MacroError);
        assert!(diags[0].message.contains("unknown vocabulary entry 'nope'"));
        assert_eq!(diags[0].line, 1);
        // The bad line is dropped; the rest of the file still expands.
        assert_eq!(exp.text, "entity Task:\n  id: uuid pk\n");
        assert_eq!(exp.map.resolve(1), 2);
    }

    #[test]
    fn circular_expansion_names_the_cycle() {
        let m = manifest(
            r#"{"entries": [
                {"id": "a", "kind": "macro", "expansion": {"template_body": "@use b"}},
                {"id": "b", "kind": "macro", "expansion": {"template_body": "@use a"}}
            ]}"#,
        );
        let (_, diags) = expand("@use a\n", "a.spec", Some(&m));
        assert_eq!(diags.len(), 1);
        assert!(diags[0]
            .message
            .contains("circular vocabulary expansion: a -> b -> a"));
    }

    #[test]
    fn deep_acyclic_nesting_hits_the_depth_cap() {
        let mut entries = String::new();
        for i in 0..40 {
            if i > 0 {
                entries.push(',');
            }
            entries.push_str(&format!(
                r#"{{"id": "m{}", "kind": "macro", "expansion": {{"template_body": "@use m{}"}}}}"#,
                i,
                i + 1
            ));
        }
        entries.push_str(&format!(
            r#", {{"id": "m40", "kind": "macro", "expansion": {{"template_body": "done: bool"}}}}"#
        ));
        let m = manifest(&format!(r#"{{"entries": [{}]}}"#, entries));
        let (_, diags) = expand("@use m0\n", "a.spec", Some(&m));
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("maximum depth"));
    }

    #[test]
    fn deprecated_entry_warns_and_still_expands() {
        let m = simple_manifest();
        let (exp, diags) = expand("@use old_style\n", "a.spec", Some(&m));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Warning);
        assert!(diags[0].message.contains("deprecated"));
        assert_eq!(exp.text, "legacy: bool\n");
    }

    #[test]
    fn use_keyword_requires_a_word_boundary() {
        let src = "@useful: str\n";
        let (exp, diags) = expand(src, "a.spec", None);
        assert!(diags.is_empty());
        assert_eq!(exp.text, src);
    }

    #[test]
    fn missing_manifest_makes_any_use_unknown() {
        let (_, diags) = expand("@use anything\n", "a.spec", None);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("unknown vocabulary entry"));
    }

    #[test]
    fn argument_type_mismatch_is_a_macro_error() {
        let m = simple_manifest();
        let (_, diags) = expand("@use titled(length=big)\n", "a.spec", Some(&m));
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("expects number"));
    }
}
