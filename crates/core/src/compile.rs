//! The front-door pipeline: source files in, AppSpec and diagnostics out.
//!
//! Each file runs expansion, lexing, and parsing on its own; the per-file
//! ASTs are then linked into one symbol table and validated together. Every
//! stage keeps going past its own failures, so one compile reports as much
//! as it can find, and the IR is produced only when no stage reported an
//! error.

use crate::error::Diagnostic;
use crate::ir::AppSpec;
use crate::link::{self, FileAst, ModuleGraph};
use crate::vocab::VocabManifest;
use crate::{expand, lexer, parser, validate};

/// How strictly cross-file references are judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompileMode {
    /// The whole project is present; every reference must resolve.
    #[default]
    Full,
    /// A file (or subset) is compiled in isolation, as an editor does on
    /// every keystroke. References into the missing rest of the project
    /// downgrade to warnings.
    Standalone,
}

#[derive(Debug)]
pub struct CompileResult {
    /// True when no stage reported an error. Warnings never clear this.
    pub success: bool,
    /// Present only on success, and only when every reference resolved.
    pub appspec: Option<AppSpec>,
    /// The module graph, kept even on failure for tooling.
    pub modules: ModuleGraph,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

/// Compile a set of `(file name, source text)` pairs.
///
/// The vocabulary manifest is optional; without one, `@use` directives are
/// macro errors. Diagnostics come back partitioned, each carrying positions
/// in the original, pre-expansion sources.
pub fn compile(
    files: &[(String, String)],
    manifest: Option<&VocabManifest>,
    mode: CompileMode,
) -> CompileResult {
    let mut diagnostics = Vec::new();
    let mut asts = Vec::with_capacity(files.len());

    for (file, source) in files {
        let (expansion, expand_diags) = expand::expand(source, file, manifest);
        diagnostics.extend(expand_diags);

        let (tokens, lex_diags) = lexer::lex(&expansion.text, file, Some(&expansion.map));
        diagnostics.extend(lex_diags);

        let (decls, parse_diags) = parser::parse(&tokens, file);
        diagnostics.extend(parse_diags);

        asts.push(FileAst {
            file: file.clone(),
            decls,
        });
    }

    let (table, modules, link_diags) = link::link(asts);
    diagnostics.extend(link_diags);

    let (appspec, validate_diags) = validate::validate(&table, mode);
    diagnostics.extend(validate_diags);

    let (errors, warnings): (Vec<_>, Vec<_>) =
        diagnostics.into_iter().partition(Diagnostic::is_error);
    let success = errors.is_empty();
    CompileResult {
        success,
        appspec: if success { appspec } else { None },
        modules,
        errors,
        warnings,
    }
}
