//! Deserialization from interchange JSON documents into typed structs.
//!
//! The main entry point is [`from_interchange`], which takes a
//! `&serde_json::Value` and produces an [`InterchangeDoc`].

use crate::types::*;
use serde_json::Value;
use std::fmt;

/// Errors during interchange JSON deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterchangeError {
    /// The document is missing a required top-level field.
    MissingField { field: String },
    /// A construct is missing a required field or has a malformed one.
    ConstructError {
        kind: String,
        name: String,
        message: String,
    },
    /// The document structure is invalid.
    InvalidDoc(String),
}

impl fmt::Display for InterchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterchangeError::MissingField { field } => {
                write!(f, "document missing required field: '{}'", field)
            }
            InterchangeError::ConstructError { kind, name, message } => {
                write!(f, "{} '{}': {}", kind, name, message)
            }
            InterchangeError::InvalidDoc(msg) => {
                write!(f, "invalid document: {}", msg)
            }
        }
    }
}

impl std::error::Error for InterchangeError {}

/// Deserialize an interchange JSON document into typed structs.
///
/// Walks the `constructs` array and dispatches on the `kind` field.
/// Unknown construct kinds are silently skipped for forward compatibility.
pub fn from_interchange(doc: &Value) -> Result<InterchangeDoc, InterchangeError> {
    let id = doc
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| InterchangeError::MissingField {
            field: "id".to_string(),
        })?
        .to_string();

    let label = doc.get("label").and_then(Value::as_str).map(str::to_string);

    let appspec_version = doc
        .get("appspec_version")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let raw = doc
        .get("constructs")
        .and_then(Value::as_array)
        .ok_or_else(|| InterchangeError::MissingField {
            field: "constructs".to_string(),
        })?;

    let mut constructs = Vec::with_capacity(raw.len());
    for obj in raw {
        let kind = obj.get("kind").and_then(Value::as_str).unwrap_or("");
        let construct = match kind {
            "Entity" => Some(Construct::Entity(parse_entity(obj)?)),
            "Surface" => Some(Construct::Surface(parse_surface(obj)?)),
            "Workspace" => Some(Construct::Workspace(parse_workspace(obj)?)),
            "Service" => Some(Construct::Service(parse_service(obj)?)),
            "ForeignModel" => Some(Construct::ForeignModel(parse_foreign_model(obj)?)),
            "Integration" => Some(Construct::Integration(parse_integration(obj)?)),
            _ => None, // Skip unknown kinds for forward compatibility
        };
        if let Some(c) = construct {
            constructs.push(c);
        }
    }

    Ok(InterchangeDoc {
        id,
        label,
        appspec_version,
        constructs,
    })
}

// ── Field helpers ───────────────────────────────────────────────────

fn name_of(obj: &Value, kind: &str) -> Result<String, InterchangeError> {
    obj.get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| InterchangeError::ConstructError {
            kind: kind.to_string(),
            name: String::new(),
            message: "missing 'name'".to_string(),
        })
}

fn req_str(obj: &Value, field: &str, kind: &str, name: &str) -> Result<String, InterchangeError> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| InterchangeError::ConstructError {
            kind: kind.to_string(),
            name: name.to_string(),
            message: format!("missing '{}'", field),
        })
}

fn opt_str(obj: &Value, field: &str) -> Option<String> {
    obj.get(field).and_then(Value::as_str).map(str::to_string)
}

fn str_list(obj: &Value, field: &str) -> Vec<String> {
    obj.get(field)
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn value_list(obj: &Value, field: &str) -> Vec<Value> {
    obj.get(field)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn parse_fields(obj: &Value, kind: &str, name: &str) -> Result<Vec<FieldSpec>, InterchangeError> {
    let mut fields = Vec::new();
    for f in value_list(obj, "fields") {
        fields.push(FieldSpec {
            name: req_str(&f, "name", kind, name)?,
            ty: f.get("type").cloned().ok_or_else(|| {
                InterchangeError::ConstructError {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    message: "field missing 'type'".to_string(),
                }
            })?,
            required: f.get("required").and_then(Value::as_bool).unwrap_or(false),
            unique: f.get("unique").and_then(Value::as_bool).unwrap_or(false),
            pk: f.get("pk").and_then(Value::as_bool).unwrap_or(false),
            default: f.get("default").filter(|v| !v.is_null()).cloned(),
        });
    }
    Ok(fields)
}

// ── Constructs ──────────────────────────────────────────────────────

fn parse_entity(obj: &Value) -> Result<EntityConstruct, InterchangeError> {
    let name = name_of(obj, "Entity")?;
    let state_machine = match obj.get("state_machine").filter(|v| !v.is_null()) {
        Some(m) => Some(StateMachineSpec {
            field: req_str(m, "field", "Entity", &name)?,
            states: str_list(m, "states"),
            transitions: value_list(m, "transitions")
                .iter()
                .map(|t| {
                    Ok(TransitionSpec {
                        from: req_str(t, "from", "Entity", &name)?,
                        to: req_str(t, "to", "Entity", &name)?,
                        requires: opt_str(t, "requires"),
                    })
                })
                .collect::<Result<Vec<_>, InterchangeError>>()?,
        }),
        None => None,
    };
    Ok(EntityConstruct {
        fields: parse_fields(obj, "Entity", &name)?,
        label: opt_str(obj, "label"),
        module: opt_str(obj, "module").unwrap_or_default(),
        intent: opt_str(obj, "intent"),
        domain: opt_str(obj, "domain"),
        patterns: str_list(obj, "patterns"),
        invariants: value_list(obj, "invariants"),
        state_machine,
        read_rule: obj.get("read_rule").filter(|v| !v.is_null()).cloned(),
        write_rule: obj.get("write_rule").filter(|v| !v.is_null()).cloned(),
        name,
    })
}

fn parse_surface(obj: &Value) -> Result<SurfaceConstruct, InterchangeError> {
    let name = name_of(obj, "Surface")?;
    let sections = value_list(obj, "sections")
        .iter()
        .map(|s| {
            Ok(SectionSpec {
                name: req_str(s, "name", "Surface", &name)?,
                label: opt_str(s, "label"),
                fields: str_list(s, "fields"),
            })
        })
        .collect::<Result<Vec<_>, InterchangeError>>()?;
    Ok(SurfaceConstruct {
        mode: req_str(obj, "mode", "Surface", &name)?,
        entity: req_str(obj, "entity", "Surface", &name)?,
        label: opt_str(obj, "label"),
        sections,
        ux: obj.get("ux").filter(|v| !v.is_null()).cloned(),
        name,
    })
}

fn parse_workspace(obj: &Value) -> Result<WorkspaceConstruct, InterchangeError> {
    let name = name_of(obj, "Workspace")?;
    let blocks = value_list(obj, "blocks")
        .iter()
        .map(|b| {
            let block_name = req_str(b, "name", "Workspace", &name)?;
            let sort = b.get("sort").filter(|v| !v.is_null()).map(|s| SortSpec {
                field: opt_str(s, "field").unwrap_or_default(),
                descending: s.get("descending").and_then(Value::as_bool).unwrap_or(false),
            });
            let aggregates = value_list(b, "aggregates")
                .iter()
                .map(|a| {
                    Ok(AggregateSpec {
                        func: req_str(a, "func", "Workspace", &name)?,
                        field: opt_str(a, "field"),
                    })
                })
                .collect::<Result<Vec<_>, InterchangeError>>()?;
            Ok(BlockSpec {
                source: req_str(b, "source", "Workspace", &name)?,
                source_kind: opt_str(b, "source_kind").unwrap_or_else(|| "entity".to_string()),
                filter: b.get("filter").filter(|v| !v.is_null()).cloned(),
                sort,
                limit: b
                    .get("limit")
                    .and_then(Value::as_u64)
                    .map(|n| n as u32),
                display: str_list(b, "display"),
                action: opt_str(b, "action"),
                aggregates,
                group_by: opt_str(b, "group_by"),
                name: block_name,
            })
        })
        .collect::<Result<Vec<_>, InterchangeError>>()?;
    Ok(WorkspaceConstruct {
        purpose: opt_str(obj, "purpose"),
        stage: opt_str(obj, "stage"),
        blocks,
        name,
    })
}

fn parse_service(obj: &Value) -> Result<ServiceConstruct, InterchangeError> {
    let name = name_of(obj, "Service")?;
    let operations = value_list(obj, "operations")
        .iter()
        .map(|op| {
            let op_name = req_str(op, "name", "Service", &name)?;
            let params = value_list(op, "params")
                .iter()
                .map(|p| {
                    let pname = req_str(p, "name", "Service", &name)?;
                    let ty = p.get("type").cloned().ok_or_else(|| {
                        InterchangeError::ConstructError {
                            kind: "Service".to_string(),
                            name: name.clone(),
                            message: format!("param '{}' missing 'type'", pname),
                        }
                    })?;
                    Ok((pname, ty))
                })
                .collect::<Result<Vec<_>, InterchangeError>>()?;
            Ok(OperationSpec {
                name: op_name,
                params,
                returns: op.get("returns").filter(|v| !v.is_null()).cloned(),
            })
        })
        .collect::<Result<Vec<_>, InterchangeError>>()?;
    Ok(ServiceConstruct { name, operations })
}

fn parse_foreign_model(obj: &Value) -> Result<ForeignModelConstruct, InterchangeError> {
    let name = name_of(obj, "ForeignModel")?;
    Ok(ForeignModelConstruct {
        system: req_str(obj, "system", "ForeignModel", &name)?,
        fields: parse_fields(obj, "ForeignModel", &name)?,
        name,
    })
}

fn parse_integration(obj: &Value) -> Result<IntegrationConstruct, InterchangeError> {
    let name = name_of(obj, "Integration")?;
    Ok(IntegrationConstruct {
        service: req_str(obj, "service", "Integration", &name)?,
        direction: opt_str(obj, "direction"),
        trigger: opt_str(obj, "trigger"),
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_kinds_are_skipped() {
        let doc = json!({
            "id": "demo",
            "appspec_version": "1.0",
            "constructs": [
                { "kind": "Hologram", "name": "future" },
                { "kind": "Service", "name": "billing", "operations": [] },
            ],
        });
        let parsed = from_interchange(&doc).unwrap();
        assert_eq!(parsed.constructs.len(), 1);
        assert_eq!(parsed.constructs[0].name(), "billing");
    }

    #[test]
    fn missing_constructs_is_an_error() {
        let doc = json!({ "id": "demo" });
        let err = from_interchange(&doc).unwrap_err();
        assert_eq!(
            err,
            InterchangeError::MissingField {
                field: "constructs".to_string()
            }
        );
    }

    #[test]
    fn construct_errors_name_the_offender() {
        let doc = json!({
            "id": "demo",
            "constructs": [
                { "kind": "Surface", "name": "task_view", "entity": "Task" },
            ],
        });
        let err = from_interchange(&doc).unwrap_err();
        assert!(err.to_string().contains("task_view"));
        assert!(err.to_string().contains("missing 'mode'"));
    }
}
