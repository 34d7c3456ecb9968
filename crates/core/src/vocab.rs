//! Vocabulary manifest: the macro library consulted by the expander.
//!
//! The manifest is loaded once per compilation from JSON. A malformed
//! manifest (unparsable entry, duplicate id, default value contradicting the
//! declared parameter type) fails fast with [`ManifestError`] before any
//! expansion begins -- unlike source problems, this is caller misconfiguration
//! and is not reported as a per-line diagnostic.

use serde::Deserialize;
use std::collections::HashMap;

/// Errors raised while loading a vocabulary manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The manifest is not valid JSON or an entry is missing required fields.
    #[error("vocabulary manifest is not valid: {0}")]
    Json(#[from] serde_json::Error),

    /// Two entries share an id.
    #[error("duplicate vocabulary entry id '{id}'")]
    DuplicateId { id: String },

    /// A parameter default does not match the parameter's declared type.
    #[error("entry '{entry}': default for parameter '{param}' does not match its declared type")]
    BadDefault { entry: String, param: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VocabKind {
    Macro,
    Alias,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VocabScope {
    Ui,
    Data,
    Workflow,
    Auth,
    Misc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Boolean,
    Number,
    List,
    Dict,
    ModelRef,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Boolean => "boolean",
            ParamType::Number => "number",
            ParamType::List => "list",
            ParamType::Dict => "dict",
            ParamType::ModelRef => "model_ref",
        }
    }

    /// Whether a JSON default value is acceptable for this parameter type.
    fn admits_json(&self, v: &serde_json::Value) -> bool {
        use serde_json::Value;
        match self {
            ParamType::String | ParamType::ModelRef => matches!(v, Value::String(_)),
            ParamType::Boolean => matches!(v, Value::Bool(_)),
            ParamType::Number => matches!(v, Value::Number(_)),
            ParamType::List => matches!(v, Value::Array(_)),
            ParamType::Dict => matches!(v, Value::Object(_)),
        }
    }
}

/// A declared macro parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct VocabParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

impl VocabParam {
    /// A parameter without a default must be supplied at every call site.
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// The template body an entry expands into.
#[derive(Debug, Clone, Deserialize)]
pub struct VocabExpansion {
    pub template_body: String,
}

/// One vocabulary entry: a named, parameterized DSL text template.
#[derive(Debug, Clone, Deserialize)]
pub struct VocabEntry {
    pub id: String,
    pub kind: VocabKind,
    #[serde(default = "default_scope")]
    pub scope: VocabScope,
    #[serde(default)]
    pub parameters: Vec<VocabParam>,
    pub expansion: VocabExpansion,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub deprecated: bool,
}

fn default_scope() -> VocabScope {
    VocabScope::Misc
}

impl VocabEntry {
    pub fn template(&self) -> &str {
        &self.expansion.template_body
    }

    pub fn param(&self, name: &str) -> Option<&VocabParam> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    entries: Vec<VocabEntry>,
}

/// The loaded vocabulary, keyed by entry id. Read-only during expansion.
#[derive(Debug, Clone, Default)]
pub struct VocabManifest {
    entries: HashMap<String, VocabEntry>,
}

impl VocabManifest {
    /// Load a manifest from JSON text of the form `{"entries": [...]}`.
    pub fn from_json(text: &str) -> Result<VocabManifest, ManifestError> {
        let raw: RawManifest = serde_json::from_str(text)?;
        Self::from_entries(raw.entries)
    }

    /// Build a manifest from already-constructed entries, applying the same
    /// duplicate-id and default-type checks as [`from_json`](Self::from_json).
    pub fn from_entries(entries: Vec<VocabEntry>) -> Result<VocabManifest, ManifestError> {
        let mut map = HashMap::with_capacity(entries.len());
        for entry in entries {
            for p in &entry.parameters {
                if let Some(default) = &p.default {
                    if !p.ty.admits_json(default) {
                        return Err(ManifestError::BadDefault {
                            entry: entry.id.clone(),
                            param: p.name.clone(),
                        });
                    }
                }
            }
            if map.contains_key(&entry.id) {
                return Err(ManifestError::DuplicateId { id: entry.id });
            }
            map.insert(entry.id.clone(), entry);
        }
        Ok(VocabManifest { entries: map })
    }

    pub fn get(&self, id: &str) -> Option<&VocabEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
