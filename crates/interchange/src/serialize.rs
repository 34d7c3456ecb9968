//! Serialization of a compiled [`AppSpec`] into interchange JSON.
//!
//! The document is self-contained: cross-references come out as names
//! (resolved back through the IR's index tables), construct order follows
//! the IR, and unknown-to-this-version consumers can skip whole constructs
//! by their `kind` tag.

use appspec_core::ast::{Expr, FieldConstraint, FieldDecl, FieldType, Literal, SortKey, Term};
use appspec_core::ir::{AppSpec, SourceRef};
use serde_json::{json, Value};

pub const INTERCHANGE_VERSION: &str = "1.0";

/// Serialize an [`AppSpec`] into an interchange JSON document.
pub fn to_interchange(appspec: &AppSpec) -> Value {
    let mut constructs = Vec::new();

    for entity in &appspec.entities {
        constructs.push(json!({
            "kind": "Entity",
            "name": entity.name,
            "label": entity.label,
            "module": entity.module,
            "fields": fields_json(&entity.fields),
            "intent": entity.intent,
            "domain": entity.domain,
            "patterns": entity.patterns,
            "invariants": entity.invariants.iter().map(expr_json).collect::<Vec<_>>(),
            "state_machine": entity.state_machine.as_ref().map(|m| json!({
                "field": m.field,
                "states": m.states,
                "transitions": m.transitions.iter().map(|t| json!({
                    "from": t.from,
                    "to": t.to,
                    "requires": t.requires,
                })).collect::<Vec<_>>(),
            })),
            "read_rule": entity.access.read.as_ref().map(|(e, _)| expr_json(e)),
            "write_rule": entity.access.write.as_ref().map(|(e, _)| expr_json(e)),
        }));
    }

    for surface in &appspec.surfaces {
        constructs.push(json!({
            "kind": "Surface",
            "name": surface.name,
            "label": surface.label,
            "mode": surface.mode.as_str(),
            "entity": appspec.entities[surface.entity].name,
            "sections": surface.sections.iter().map(|s| json!({
                "name": s.name,
                "label": s.label,
                "fields": s.fields,
            })).collect::<Vec<_>>(),
            "ux": surface.ux.as_ref().map(|ux| json!({
                "personas": ux.personas,
                "attention": ux.attention,
                "sort": ux.sort.as_ref().map(sort_json),
                "filter": ux.filter.as_ref().map(expr_json),
                "search": ux.search,
                "empty": ux.empty,
            })),
        }));
    }

    for workspace in &appspec.workspaces {
        constructs.push(json!({
            "kind": "Workspace",
            "name": workspace.name,
            "purpose": workspace.purpose,
            "stage": workspace.stage,
            "blocks": workspace.blocks.iter().map(|b| {
                let (source, source_kind) = match b.source {
                    SourceRef::Entity(id) => (&appspec.entities[id].name, "entity"),
                    SourceRef::Foreign(id) => (&appspec.foreign_models[id].name, "foreign"),
                };
                json!({
                    "name": b.name,
                    "source": source,
                    "source_kind": source_kind,
                    "filter": b.filter.as_ref().map(expr_json),
                    "sort": b.sort.as_ref().map(sort_json),
                    "limit": b.limit,
                    "display": b.display,
                    "action": b.action.map(|id| appspec.surfaces[id].name.clone()),
                    "aggregates": b.aggregates.iter().map(|a| json!({
                        "func": a.func,
                        "field": a.field,
                    })).collect::<Vec<_>>(),
                    "group_by": b.group_by,
                })
            }).collect::<Vec<_>>(),
        }));
    }

    for service in &appspec.services {
        constructs.push(json!({
            "kind": "Service",
            "name": service.name,
            "operations": service.operations.iter().map(|op| json!({
                "name": op.name,
                "params": op.params.iter().map(|(name, ty)| json!({
                    "name": name,
                    "type": type_json(ty),
                })).collect::<Vec<_>>(),
                "returns": op.returns.as_ref().map(type_json),
            })).collect::<Vec<_>>(),
        }));
    }

    for foreign in &appspec.foreign_models {
        constructs.push(json!({
            "kind": "ForeignModel",
            "name": foreign.name,
            "system": foreign.system,
            "fields": fields_json(&foreign.fields),
        }));
    }

    for integration in &appspec.integrations {
        constructs.push(json!({
            "kind": "Integration",
            "name": integration.name,
            "service": appspec.services[integration.service].name,
            "direction": integration.direction,
            "trigger": integration.trigger,
        }));
    }

    json!({
        "id": appspec.app.as_ref().map_or("appspec", |a| a.name.as_str()),
        "label": appspec.app.as_ref().and_then(|a| a.label.clone()),
        "appspec_version": INTERCHANGE_VERSION,
        "constructs": constructs,
    })
}

fn fields_json(fields: &[FieldDecl]) -> Vec<Value> {
    fields
        .iter()
        .map(|f| {
            json!({
                "name": f.name,
                "type": type_json(&f.ty),
                "required": f.has_constraint(FieldConstraint::Required),
                "unique": f.has_constraint(FieldConstraint::Unique),
                "pk": f.has_constraint(FieldConstraint::Pk),
                "default": f.default.as_ref().map(literal_json),
            })
        })
        .collect()
}

fn type_json(ty: &FieldType) -> Value {
    let mut out = json!({ "name": ty.name() });
    match ty {
        FieldType::Str { length: Some(n) } => out["max_length"] = json!(n),
        FieldType::Decimal {
            precision: Some((p, s)),
        } => {
            out["precision"] = json!(p);
            out["scale"] = json!(s);
        }
        FieldType::Enum { values } => out["values"] = json!(values),
        FieldType::Ref { entity } => out["entity"] = json!(entity),
        _ => {}
    }
    out
}

fn sort_json(sort: &SortKey) -> Value {
    json!({ "field": sort.field, "descending": sort.descending })
}

fn expr_json(expr: &Expr) -> Value {
    match expr {
        Expr::Compare { op, left, right, .. } => json!({
            "compare": { "op": op.as_str(), "left": term_json(left), "right": term_json(right) }
        }),
        Expr::In { term, values, .. } => json!({
            "in": {
                "term": term_json(term),
                "values": values.iter().map(literal_json).collect::<Vec<_>>(),
            }
        }),
        Expr::IsNull { term, negated, .. } => json!({
            "is_null": { "term": term_json(term), "negated": negated }
        }),
        Expr::And(left, right) => json!({ "and": [expr_json(left), expr_json(right)] }),
        Expr::Or(left, right) => json!({ "or": [expr_json(left), expr_json(right)] }),
        Expr::Term(term, _) => json!({ "term": term_json(term) }),
    }
}

fn term_json(term: &Term) -> Value {
    match term {
        Term::Field(name) => json!({ "field": name }),
        Term::Literal(lit) => json!({ "lit": literal_json(lit) }),
        Term::Call { func, args, .. } => json!({
            "call": { "func": func, "args": args.iter().map(term_json).collect::<Vec<_>>() }
        }),
    }
}

fn literal_json(lit: &Literal) -> Value {
    match lit {
        Literal::Str(s) => json!(s),
        Literal::Int(i) => json!(i),
        // Kept as written so no precision is invented or lost.
        Literal::Float(s) => json!({ "float": s }),
        Literal::Bool(b) => json!(b),
        Literal::Null => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appspec_core::{compile, CompileMode};

    fn compiled(src: &str) -> AppSpec {
        let files = vec![("t.spec".to_owned(), src.to_owned())];
        let result = compile(&files, None, CompileMode::Full);
        assert!(result.success, "errors: {:?}", result.errors);
        result.appspec.expect("appspec")
    }

    #[test]
    fn entity_constructs_carry_flattened_fields() {
        let appspec = compiled(
            "archetype timestamped:\n  created_at: datetime\nentity Task:\n  uses timestamped\n  title: str required\n",
        );
        let doc = to_interchange(&appspec);
        let constructs = doc["constructs"].as_array().unwrap();
        assert_eq!(constructs.len(), 1);
        let entity = &constructs[0];
        assert_eq!(entity["kind"], "Entity");
        assert_eq!(entity["fields"][0]["name"], "created_at");
        assert_eq!(entity["fields"][1]["name"], "title");
        assert_eq!(entity["fields"][1]["required"], true);
    }

    #[test]
    fn sort_keys_and_version_have_their_wire_shape() {
        let appspec = compiled(
            "entity Task:\n  title: str\nworkspace board:\n  block recent:\n    source Task\n    sort -title\n",
        );
        let doc = to_interchange(&appspec);
        assert_eq!(doc["appspec_version"], INTERCHANGE_VERSION);
        let sort = &doc["constructs"][1]["blocks"][0]["sort"];
        assert_eq!(sort["field"], "title");
        assert_eq!(sort["descending"], true);
    }

    #[test]
    fn cross_references_serialize_as_names() {
        let appspec = compiled(
            "entity Task:\n  title: str\nsurface task_view:\n  mode view\n  entity Task\nworkspace board:\n  block open:\n    source Task\n    action task_view\n",
        );
        let doc = to_interchange(&appspec);
        let constructs = doc["constructs"].as_array().unwrap();
        let block = &constructs[2]["blocks"][0];
        assert_eq!(block["source"], "Task");
        assert_eq!(block["source_kind"], "entity");
        assert_eq!(block["action"], "task_view");
    }
}
