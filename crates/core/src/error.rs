use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic severity. Errors block IR production; warnings never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Diagnostic category. One variant per failure class in the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCode {
    LexError,
    ParseError,
    LinkError,
    ReferenceError,
    SemanticError,
    MacroError,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::LexError => "LexError",
            DiagnosticCode::ParseError => "ParseError",
            DiagnosticCode::LinkError => "LinkError",
            DiagnosticCode::ReferenceError => "ReferenceError",
            DiagnosticCode::SemanticError => "SemanticError",
            DiagnosticCode::MacroError => "MacroError",
        }
    }
}

/// A compiler diagnostic. All failure modes cross the public boundary as
/// values of this type; no stage throws past `compile()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        code: DiagnosticCode,
        severity: Severity,
        file: &str,
        line: u32,
        column: u32,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            file: file.to_owned(),
            line,
            column,
            severity,
            code,
            message: message.into(),
        }
    }

    pub fn lex(file: &str, line: u32, column: u32, message: impl Into<String>) -> Self {
        Diagnostic::new(DiagnosticCode::LexError, Severity::Error, file, line, column, message)
    }

    pub fn parse(file: &str, line: u32, column: u32, message: impl Into<String>) -> Self {
        Diagnostic::new(DiagnosticCode::ParseError, Severity::Error, file, line, column, message)
    }

    pub fn link(file: &str, line: u32, message: impl Into<String>) -> Self {
        Diagnostic::new(DiagnosticCode::LinkError, Severity::Error, file, line, 1, message)
    }

    pub fn reference(file: &str, line: u32, message: impl Into<String>) -> Self {
        Diagnostic::new(DiagnosticCode::ReferenceError, Severity::Error, file, line, 1, message)
    }

    pub fn semantic(file: &str, line: u32, message: impl Into<String>) -> Self {
        Diagnostic::new(DiagnosticCode::SemanticError, Severity::Error, file, line, 1, message)
    }

    pub fn macro_(file: &str, line: u32, message: impl Into<String>) -> Self {
        Diagnostic::new(DiagnosticCode::MacroError, Severity::Error, file, line, 1, message)
    }

    pub fn warning(code: DiagnosticCode, file: &str, line: u32, message: impl Into<String>) -> Self {
        Diagnostic::new(code, Severity::Warning, file, line, 1, message)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Downgrade an error to a warning, keeping everything else intact.
    /// Used by Standalone mode for cross-file references.
    pub fn downgraded(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    /// Serialize to the JSON shape exposed at the API boundary.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "file":     self.file,
            "line":     self.line,
            "column":   self.column,
            "severity": match self.severity { Severity::Error => "error", Severity::Warning => "warning" },
            "code":     self.code.as_str(),
            "message":  self.message,
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.file,
            self.line,
            self.column,
            self.code.as_str(),
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location_and_code() {
        let d = Diagnostic::parse("app.spec", 4, 7, "unexpected token");
        assert_eq!(d.to_string(), "app.spec:4:7: ParseError: unexpected token");
    }

    #[test]
    fn downgraded_keeps_code_and_message() {
        let d = Diagnostic::reference("app.spec", 2, "unknown entity 'Task'").downgraded();
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.code, DiagnosticCode::ReferenceError);
        assert!(!d.is_error());
    }

    #[test]
    fn json_shape_matches_api_contract() {
        let v = Diagnostic::lex("a.spec", 1, 3, "bad character '~'").to_json_value();
        assert_eq!(v["severity"], "error");
        assert_eq!(v["code"], "LexError");
        assert_eq!(v["line"], 1);
        assert_eq!(v["column"], 3);
    }
}
