//! Vocabulary expansion driven through the full pipeline.

use appspec_core::{compile, CompileMode, DiagnosticCode, VocabManifest};

const MANIFEST: &str = r#"{
    "entries": [
        {
            "id": "crud_surface_set",
            "kind": "pattern",
            "scope": "ui",
            "parameters": [
                { "name": "entity", "type": "model_ref" },
                { "name": "prefix", "type": "string" },
                { "name": "title_field", "type": "string", "default": "title" }
            ],
            "expansion": { "template_body": "surface {{prefix}}_list:\n  mode list\n  entity {{entity}}\n  section main:\n    field {{title_field}}\nsurface {{prefix}}_detail:\n  mode view\n  entity {{entity}}\n  section main:\n    field {{title_field}}\nsurface {{prefix}}_create:\n  mode create\n  entity {{entity}}\n  section main:\n    field {{title_field}}\nsurface {{prefix}}_edit:\n  mode edit\n  entity {{entity}}\n  section main:\n    field {{title_field}}" }
        },
        {
            "id": "audit_fields",
            "kind": "macro",
            "scope": "data",
            "parameters": [],
            "expansion": { "template_body": "created_at: datetime required\nupdated_at: datetime" }
        },
        {
            "id": "legacy_flag",
            "kind": "alias",
            "scope": "data",
            "parameters": [],
            "expansion": { "template_body": "archived: bool" },
            "deprecated": true
        }
    ]
}"#;

fn run(src: &str, mode: CompileMode) -> appspec_core::CompileResult {
    let manifest = VocabManifest::from_json(MANIFEST).expect("manifest parses");
    compile(&[("app.spec".to_string(), src.to_string())], Some(&manifest), mode)
}

#[test]
fn crud_pattern_expands_to_four_surfaces() {
    // Named arguments, with title_field falling back to its default.
    let src = "entity Task:\n  title: str required\n\n@use crud_surface_set(entity=Task, prefix=task)\n";
    let result = run(src, CompileMode::Full);
    assert!(result.success, "errors: {:?}", result.errors);
    assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    let appspec = result.appspec.expect("appspec");
    assert_eq!(appspec.surfaces.len(), 4);
    let names: Vec<&str> = appspec.surfaces.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["task_create", "task_detail", "task_edit", "task_list"]);
    for surface in &appspec.surfaces {
        assert_eq!(appspec.entities[surface.entity].name, "Task");
        assert_eq!(surface.sections[0].fields, vec!["title".to_string()]);
    }
}

#[test]
fn macro_emitted_fields_join_the_entity() {
    let src = "entity Task:\n  title: str\n  @use audit_fields()\n";
    let result = run(src, CompileMode::Full);
    assert!(result.success, "errors: {:?}", result.errors);
    let appspec = result.appspec.unwrap();
    let names: Vec<&str> = appspec.entities[0]
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(names, vec!["title", "created_at", "updated_at"]);
}

#[test]
fn errors_in_expanded_text_point_at_the_directive_line() {
    // The pattern emits a surface bound to a missing entity; every resulting
    // diagnostic must carry the @use line of the original file, not a line
    // of the expanded text.
    let src = "entity Task:\n  title: str\n\n@use crud_surface_set(Ghost, ghost)\n";
    let result = run(src, CompileMode::Full);
    assert!(!result.success);
    assert!(!result.errors.is_empty());
    for err in &result.errors {
        assert_eq!(err.line, 4, "diagnostic not mapped: {:?}", err);
    }
}

#[test]
fn unknown_entry_fails_only_its_own_line() {
    let src = "entity Task:\n  title: str\n\n@use no_such_pattern(Task)\n";
    let result = run(src, CompileMode::Full);
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, DiagnosticCode::MacroError);
    assert_eq!(result.errors[0].line, 4);
    // The rest of the file still compiled.
    assert!(result.errors[0].message.contains("no_such_pattern"));
}

#[test]
fn deprecated_entry_warns_but_expands() {
    let src = "entity Task:\n  title: str\n  @use legacy_flag()\n";
    let result = run(src, CompileMode::Full);
    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].message.contains("legacy_flag"));
    let appspec = result.appspec.unwrap();
    assert!(appspec.entities[0].field("archived").is_some());
}

#[test]
fn directives_without_a_manifest_are_macro_errors() {
    let src = "entity Task:\n  title: str\n\n@use crud_surface_set(Task, task)\n";
    let result = compile(
        &[("app.spec".to_string(), src.to_string())],
        None,
        CompileMode::Full,
    );
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, DiagnosticCode::MacroError);
}
