//! Integration tests for modelgen.
//!
//! These tests drive whole generation runs against temporary models
//! directories, including real `rustc` compilations when a compiler is
//! available.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use modelgen::{
    diagnostic::DiagnosticKind,
    emitter::INDEX_FILE_NAME,
    lock::{DirectoryLock, LOCK_FILE_NAME},
    orchestrator::RunState,
    planner::TypeSkip,
    CompileError, FsFileStore, GenerateError, GenerationMode, GenerationStatus, GeneratorSettings,
    JsonSchemaFile, JsonStatusFile, Orchestrator, PropertyModel, Schema, SchemaError,
    SchemaProvider, TypeModel,
};

/// Create a temporary models directory with the given files.
fn create_models_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        fs::write(dir.path().join(name), content).unwrap();
    }
    dir
}

/// Article with an Seo mixin.
fn article_schema() -> Schema {
    Schema::new(vec![
        TypeModel::new("article")
            .with_mixin("seo")
            .with_property(PropertyModel::new("title", "String"))
            .with_property(PropertyModel::new("body", "String")),
        TypeModel::element("seo").with_property(PropertyModel::new("metaTitle", "String")),
    ])
}

fn read_generated(dir: &Path) -> BTreeMap<String, String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.to_string_lossy().ends_with(".generated.rs"))
        .map(|path| {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            (name, fs::read_to_string(&path).unwrap())
        })
        .collect()
}

fn rustc_available() -> bool {
    let rustc = std::env::var_os("RUSTC").unwrap_or_else(|| "rustc".into());
    std::process::Command::new(rustc)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

struct OfflineSchema;

impl SchemaProvider for OfflineSchema {
    fn snapshot(&self) -> Result<Schema, SchemaError> {
        Err(SchemaError::Unavailable("content database offline".into()))
    }
}

// =============================================================================
// End-to-end scenarios
// =============================================================================

#[test]
fn test_article_with_seo_mixin() {
    let dir = TempDir::new().unwrap();

    let report = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"))
        .run(&article_schema())
        .unwrap();

    assert!(report.diagnostics.is_empty());
    let article = fs::read_to_string(dir.path().join("article.generated.rs")).unwrap();
    assert!(article.contains("pub fn title(&self) -> Option<String>"));
    assert!(article.contains("pub fn body(&self) -> Option<String>"));
    assert!(article.contains("pub fn meta_title(&self) -> Option<String>"));
    assert!(article.contains("impl From<Article> for super::Seo"));

    let index = fs::read_to_string(dir.path().join(INDEX_FILE_NAME)).unwrap();
    assert!(index.contains("pub use self::article_generated::Article;"));
    assert!(index.contains("pub use self::seo_generated::Seo;"));
}

#[test]
fn test_hand_declared_member_is_not_generated() {
    let hand = "use super::Article;\n\nimpl Article {\n    pub fn title(&self) -> Option<String> {\n        self.content().value::<String>(\"title\")\n    }\n}\n";
    let dir = create_models_dir(&[("article.rs", hand)]);

    let report = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"))
        .run(&article_schema())
        .unwrap();

    let article = &report.generated[&dir.path().join("article.generated.rs")];
    assert!(!article.contains("fn title("));
    assert!(article.contains("pub fn body(&self)"));
    assert!(article.contains("pub fn meta_title(&self)"));

    // Across the merged file set the accessor exists exactly once.
    let mut merged = report.generated.values().cloned().collect::<Vec<_>>();
    merged.push(fs::read_to_string(dir.path().join("article.rs")).unwrap());
    let occurrences: usize = merged.iter().map(|f| f.matches("fn title(").count()).sum();
    assert_eq!(occurrences, 1);
}

#[test]
fn test_ignored_properties_never_generated() {
    let schema = Schema::new(vec![
        TypeModel::new("article")
            .with_mixin("seo")
            .with_property(PropertyModel::new("title", "String"))
            .with_property(PropertyModel::new("legacyId", "i64").ignored()),
        TypeModel::element("seo")
            .with_property(PropertyModel::new("metaTitle", "String"))
            .with_property(PropertyModel::new("noIndex", "bool").ignored()),
    ]);
    let dir = create_models_dir(&[(
        "article.rs",
        "ignore_property!(Article, \"title\");\n",
    )]);

    Orchestrator::new(GeneratorSettings::new(dir.path(), "site"))
        .run(&schema)
        .unwrap();

    for (name, content) in read_generated(dir.path()) {
        for needle in ["legacyId", "legacy_id", "noIndex", "no_index"] {
            assert!(!content.contains(needle), "{} leaked into {}", needle, name);
        }
    }
    let article = fs::read_to_string(dir.path().join("article.generated.rs")).unwrap();
    assert!(!article.contains("fn title("));
    assert!(article.contains("fn meta_title("));
}

#[test]
fn test_mixin_union_has_common_property_once() {
    let schema = Schema::new(vec![
        TypeModel::new("page").with_mixin("m1").with_mixin("m2"),
        TypeModel::element("m1")
            .with_property(PropertyModel::new("a", "String"))
            .with_property(PropertyModel::new("c", "String")),
        TypeModel::element("m2")
            .with_property(PropertyModel::new("b", "String"))
            .with_property(PropertyModel::new("c", "String")),
    ]);
    let dir = TempDir::new().unwrap();

    let report = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"))
        .run(&schema)
        .unwrap();

    let page = report.plans.iter().find(|p| p.class_name == "Page").unwrap();
    let aliases: Vec<_> = page.properties.iter().map(|p| p.alias.as_str()).collect();
    assert_eq!(aliases, vec!["a", "c", "b"]);

    let code = fs::read_to_string(dir.path().join("page.generated.rs")).unwrap();
    assert_eq!(code.matches("pub fn c(").count(), 1);
}

#[test]
fn test_conflicting_mixins_pick_first_and_warn() {
    let schema = Schema::new(vec![
        TypeModel::new("page").with_mixin("m1").with_mixin("m2"),
        TypeModel::element("m1").with_property(PropertyModel::new("x", "String")),
        TypeModel::element("m2").with_property(PropertyModel::new("x", "Option<String>")),
    ]);
    let dir = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"));

    for _ in 0..3 {
        let report = orchestrator.run(&schema).unwrap();
        let page = report.plans.iter().find(|p| p.class_name == "Page").unwrap();
        assert_eq!(page.properties[0].value_type, "String");
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::MixinConflict && d.subject == "page"));
    }
}

#[test]
fn test_unresolvable_type_does_not_block_siblings() {
    let schema = Schema::new(vec![
        TypeModel::new("page").with_mixin("m1").with_mixin("m2"),
        TypeModel::new("news").with_property(PropertyModel::new("headline", "String")),
        TypeModel::element("m1").with_property(PropertyModel::new("x", "String")),
        TypeModel::element("m2").with_property(PropertyModel::new("x", "u64")),
    ]);
    let dir = TempDir::new().unwrap();
    let status = Arc::new(GenerationStatus::new());

    let report = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"))
        .with_status(status.clone())
        .run(&schema)
        .unwrap();

    assert!(!dir.path().join("page.generated.rs").exists());
    assert!(dir.path().join("news.generated.rs").exists());
    assert_eq!(report.skipped_types[0].reason, TypeSkip::Unresolvable);
    assert_eq!(report.error_count(), 1);
    assert!(status.last_error().unwrap().contains("page"));
}

// =============================================================================
// Run-level behavior
// =============================================================================

#[test]
fn test_generation_is_idempotent() {
    let dir = create_models_dir(&[(
        "article.rs",
        "use std::collections::BTreeMap;\nuse super::Article;\n\nimpl Article {\n    pub fn slug(&self) -> String { String::new() }\n}\n",
    )]);
    let orchestrator = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"));

    let first_report = orchestrator.run(&article_schema()).unwrap();
    let first = read_generated(dir.path());
    let second_report = orchestrator.run(&article_schema()).unwrap();
    let second = read_generated(dir.path());

    assert_eq!(first, second);
    assert_eq!(first_report.generated, second_report.generated);
    assert_eq!(second_report.deleted.len(), first.len());
    assert!(first["article.generated.rs"].contains("use std::collections::BTreeMap;"));
}

#[test]
fn test_schema_unavailable_touches_nothing() {
    let dir = create_models_dir(&[
        ("article.generated.rs", "// from a previous run"),
        ("article.rs", "impl Article {}"),
    ]);
    let status_dir = TempDir::new().unwrap();
    let status = Arc::new(JsonStatusFile::new(status_dir.path().join("status.json")));

    let err = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"))
        .with_status(status.clone())
        .run(&OfflineSchema)
        .unwrap_err();

    assert!(matches!(err, GenerateError::SchemaUnavailable(_)));
    assert_eq!(
        fs::read_to_string(dir.path().join("article.generated.rs")).unwrap(),
        "// from a previous run"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("article.rs")).unwrap(),
        "impl Article {}"
    );
    let state = status.load().unwrap();
    assert!(state.last_error.unwrap().contains("content database offline"));
}

#[test]
fn test_successful_run_clears_last_error() {
    let dir = TempDir::new().unwrap();
    let status = Arc::new(GenerationStatus::new());
    let orchestrator =
        Orchestrator::new(GeneratorSettings::new(dir.path(), "site")).with_status(status.clone());

    assert!(orchestrator.run(&OfflineSchema).is_err());
    assert!(status.last_error().is_some());

    status.mark_out_of_date();
    orchestrator.run(&article_schema()).unwrap();
    assert!(status.last_error().is_none());
    assert!(!status.is_out_of_date());
}

#[test]
fn test_parse_failure_is_not_fatal() {
    let dir = create_models_dir(&[
        ("broken.rs", "impl Article { pub fn body(&self) { }"),
        ("article.rs", "impl Article { pub fn title(&self) -> Option<String> { None } }"),
    ]);

    let report = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"))
        .run(&article_schema())
        .unwrap();

    let failures: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::ParseFailure)
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].subject.ends_with("broken.rs"));

    // The broken file contributes nothing; the valid one still does.
    let article = fs::read_to_string(dir.path().join("article.generated.rs")).unwrap();
    assert!(article.contains("pub fn body(&self)"));
    assert!(!article.contains("fn title("));
}

#[test]
fn test_dry_run_writes_nothing() {
    let dir = create_models_dir(&[("old.generated.rs", "// stale")]);

    let report = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"))
        .with_store(Arc::new(FsFileStore::new(true)))
        .run(&article_schema())
        .unwrap();

    assert!(report.deleted.is_empty());
    assert!(report.written.iter().all(|w| !w.was_written()));
    assert!(report
        .generated
        .contains_key(&dir.path().join("article.generated.rs")));
    let names: Vec<_> = read_generated(dir.path()).into_keys().collect();
    assert_eq!(names, vec!["old.generated.rs"]);
}

#[test]
fn test_concurrent_run_is_rejected() {
    let dir = create_models_dir(&[("article.generated.rs", "// owned by another run")]);
    let status = Arc::new(GenerationStatus::new());
    let _running = DirectoryLock::acquire(dir.path()).unwrap();

    let err = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"))
        .with_status(status.clone())
        .run(&article_schema())
        .unwrap_err();

    assert!(matches!(err, GenerateError::InProgress { .. }));
    assert_eq!(
        fs::read_to_string(dir.path().join("article.generated.rs")).unwrap(),
        "// owned by another run"
    );
    assert!(status.last_error().unwrap().contains("already in progress"));
}

/// Schema whose model names need sanitising or clash on their file stem.
fn awkward_names_schema() -> Schema {
    Schema::new(vec![
        TypeModel::new("htmlPage").with_property(PropertyModel::new("title", "String")),
        TypeModel::new("legacyHtml")
            .with_class_name("HTMLPage")
            .with_property(PropertyModel::new("body", "String")),
        TypeModel::new("landing")
            .with_class_name("Landing Page")
            .with_property(PropertyModel::new("heading", "String")),
        TypeModel::new("self").with_property(PropertyModel::new("label", "String")),
    ])
}

#[test]
fn test_file_stem_clash_skips_only_the_later_type() {
    let dir = create_models_dir(&[]);

    let report = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"))
        .run(&awkward_names_schema())
        .unwrap();

    assert!(report
        .skipped_types
        .iter()
        .any(|t| t.alias == "legacyHtml" && t.reason == TypeSkip::Unresolvable));
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.subject == "legacyHtml" && d.kind == DiagnosticKind::UnresolvableType));

    let html = fs::read_to_string(dir.path().join("html_page.generated.rs")).unwrap();
    assert!(html.contains("pub struct HtmlPage"));
    assert!(!html.contains("HTMLPage"));

    let index = fs::read_to_string(dir.path().join(INDEX_FILE_NAME)).unwrap();
    assert_eq!(index.matches("mod html_page_generated;").count(), 1);
}

#[test]
fn test_model_names_are_valid_identifiers() {
    let dir = create_models_dir(&[]);

    let report = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"))
        .run(&awkward_names_schema())
        .unwrap();

    let classes: Vec<&str> = report.plans.iter().map(|p| p.class_name.as_str()).collect();
    assert_eq!(classes, vec!["HtmlPage", "LandingPage", "Self_"]);
    for (path, content) in &report.generated {
        assert!(
            syn::parse_file(content).is_ok(),
            "{} is not valid Rust:\n{}",
            path.display(),
            content
        );
    }
}

#[test]
fn test_awkward_names_compile_into_artifact() {
    if !rustc_available() {
        println!("Skipping test: rustc not available");
        return;
    }
    let dir = create_models_dir(&[]);
    let artifact_dir = TempDir::new().unwrap();

    let report = Orchestrator::new(
        GeneratorSettings::new(dir.path(), "site")
            .with_mode(GenerationMode::Artifact)
            .with_artifact_dir(artifact_dir.path()),
    )
    .run(&awkward_names_schema())
    .unwrap();

    assert!(report.artifact.unwrap().path.exists());
}

#[test]
fn test_run_locked_by_another_process_is_rejected() {
    let dir = create_models_dir(&[("article.generated.rs", "// owned by another process")]);
    let lock_file = dir.path().join(LOCK_FILE_NAME);
    fs::write(&lock_file, "4242\n").unwrap();

    let err = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"))
        .with_status(Arc::new(GenerationStatus::new()))
        .run(&article_schema())
        .unwrap_err();

    assert!(matches!(err, GenerateError::InProgress { ref path } if *path == lock_file));
    assert_eq!(
        fs::read_to_string(dir.path().join("article.generated.rs")).unwrap(),
        "// owned by another process"
    );
    assert!(lock_file.exists());

    fs::remove_file(&lock_file).unwrap();
    Orchestrator::new(GeneratorSettings::new(dir.path(), "site"))
        .with_status(Arc::new(GenerationStatus::new()))
        .run(&article_schema())
        .unwrap();
    assert!(!lock_file.exists());
}

#[test]
fn test_json_schema_file_provider() {
    let schema_dir = TempDir::new().unwrap();
    let schema_path = schema_dir.path().join("schema.json");
    fs::write(&schema_path, article_schema().to_json().unwrap()).unwrap();
    let dir = TempDir::new().unwrap();

    let report = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"))
        .run(&JsonSchemaFile::new(&schema_path))
        .unwrap();

    assert_eq!(report.plans.len(), 2);
    assert_eq!(report.states.last(), Some(&RunState::Done));
}

#[test]
fn test_ignored_content_type_and_hand_model() {
    let schema = Schema::new(vec![
        TypeModel::new("article").with_property(PropertyModel::new("title", "String")),
        TypeModel::new("legacyNews").with_property(PropertyModel::new("title", "String")),
        TypeModel::new("landing").with_property(PropertyModel::new("hero", "String")),
    ]);
    let dir = create_models_dir(&[
        ("legacy.rs", "ignore_content_type!(\"legacy*\");\n"),
        (
            "landing.rs",
            "use super::runtime::PublishedContent;\n\npub struct Landing {\n    pub content: PublishedContent,\n}\n",
        ),
    ]);

    let report = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"))
        .run(&schema)
        .unwrap();

    let names: Vec<_> = read_generated(dir.path()).into_keys().collect();
    assert_eq!(names, vec!["_models.generated.rs", "article.generated.rs"]);
    let reasons: Vec<_> = report.skipped_types.iter().map(|s| s.reason).collect();
    assert_eq!(reasons, vec![TypeSkip::IgnoredByMarker, TypeSkip::ImplementedByHand]);
}

// =============================================================================
// Compilation (requires rustc)
// =============================================================================

#[test]
fn test_artifact_is_compiled() {
    if !rustc_available() {
        println!("Skipping test: rustc not available");
        return;
    }
    let hand = r#"use super::Article;

ignore_property!(Article, "body");
rename_property!(Article, "metaTitle", seo_title);

impl Article {
    pub fn title(&self) -> Option<String> {
        self.content().value::<String>("title")
    }

    pub fn headline(&self) -> String {
        self.title().unwrap_or_default()
    }
}
"#;
    let dir = create_models_dir(&[("article.rs", hand)]);
    let artifact_dir = TempDir::new().unwrap();

    let report = Orchestrator::new(
        GeneratorSettings::new(dir.path(), "site")
            .with_mode(GenerationMode::Artifact)
            .with_artifact_dir(artifact_dir.path()),
    )
    .run(&article_schema())
    .unwrap();

    let artifact = report.artifact.unwrap();
    assert_eq!(artifact.path, artifact_dir.path().join("libsite.rlib"));
    assert!(artifact.path.exists());
    assert!(report.states.contains(&RunState::Compiling));

    let article = fs::read_to_string(dir.path().join("article.generated.rs")).unwrap();
    assert!(article.contains("pub fn seo_title(&self)"));
    assert!(!article.contains("fn body("));

    // Only the artifact is left behind.
    let leftovers: Vec<PathBuf> = fs::read_dir(artifact_dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(leftovers, vec![artifact.path.clone()]);
}

#[test]
fn test_failed_compilation_keeps_previous_artifact() {
    if !rustc_available() {
        println!("Skipping test: rustc not available");
        return;
    }
    let hand = "use super::Article;\n\nimpl Article {\n    pub fn broken(&self) -> u32 {\n        \"not a number\"\n    }\n}\n";
    let dir = create_models_dir(&[("article.rs", hand)]);
    let artifact_dir = TempDir::new().unwrap();
    let previous = artifact_dir.path().join("libsite.rlib");
    fs::write(&previous, b"previous artifact").unwrap();

    let err = Orchestrator::new(
        GeneratorSettings::new(dir.path(), "site")
            .with_mode(GenerationMode::Artifact)
            .with_artifact_dir(artifact_dir.path()),
    )
    .run(&article_schema())
    .unwrap_err();

    let diagnostics = match err {
        GenerateError::Compilation(CompileError::Failed { diagnostics }) => diagnostics,
        other => panic!("expected a compilation failure, got {:?}", other),
    };
    assert!(diagnostics
        .iter()
        .any(|d| d.file.as_deref() == Some(dir.path().join("article.rs").as_path()) && d.line == 5));
    assert_eq!(fs::read(&previous).unwrap(), b"previous artifact");
    // Sources stay on disk for the next attempt.
    assert!(dir.path().join("article.generated.rs").exists());
}
