//! End-to-end workflow tests against an in-memory store with fake
//! generator and publisher backends.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use specforge_core::generation::GenerationResult;
use specforge_core::publish::PublishResult;
use specforge_core::{
    ClientGenerator, DiffFormat, DiffReport, EventPayload, GenerationError, LifecycleState,
    NpmConfigInput, PackageBundle, PackagePublisher, PublishError, PublishReceipt, PublishStatus,
    SpecforgeError, Store, Workflow, WorkflowOptions,
};
use uuid::Uuid;

const OWNER: &str = "user-1";
const SPEC_V1: &str = r#"{"openapi":"3.0.0","info":{"title":"T","version":"1.0.0"},"paths":{}}"#;
const SPEC_V2: &str =
    r#"{"openapi":"3.0.0","info":{"title":"T","version":"1.0.0"},"paths":{"/pets":{}}}"#;

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeGenerator {
    prompts: Mutex<Vec<String>>,
    fail_with_status: Option<u16>,
}

impl FakeGenerator {
    fn failing(status: u16) -> Self {
        Self {
            fail_with_status: Some(status),
            ..Self::default()
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClientGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> GenerationResult<String> {
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(prompt.to_string());
        if let Some(status) = self.fail_with_status {
            return Err(GenerationError::Status {
                status,
                body: "unavailable".to_string(),
            });
        }
        Ok(format!("// client #{}\nexport function listPets() {{}}\n", prompts.len()))
    }
}

#[derive(Default)]
struct FakePublisher {
    bundles: Mutex<Vec<PackageBundle>>,
    reject: bool,
}

impl FakePublisher {
    fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    fn bundles(&self) -> Vec<PackageBundle> {
        self.bundles.lock().unwrap().clone()
    }
}

#[async_trait]
impl PackagePublisher for FakePublisher {
    fn backend(&self) -> &'static str {
        "fake"
    }

    async fn publish(&self, bundle: &PackageBundle) -> PublishResult<PublishReceipt> {
        self.bundles.lock().unwrap().push(bundle.clone());
        if self.reject {
            return Err(PublishError::UnexpectedDiagnostics {
                stderr: "npm ERR! 403 Forbidden".to_string(),
            });
        }
        Ok(PublishReceipt {
            output: format!("+ {}", bundle.manifest["name"].as_str().unwrap_or_default()),
            notices: Vec::new(),
        })
    }
}

struct Harness {
    workflow: Workflow,
    generator: Arc<FakeGenerator>,
    publisher: Arc<FakePublisher>,
    project_id: Uuid,
}

fn harness_with(
    generator: FakeGenerator,
    publisher: FakePublisher,
    options: WorkflowOptions,
) -> Harness {
    let store = Store::open_in_memory().unwrap();
    let generator = Arc::new(generator);
    let publisher = Arc::new(publisher);
    let workflow = Workflow::new(store, generator.clone(), publisher.clone()).with_options(options);
    let project_id = workflow.create_project(OWNER, "Petstore").unwrap().id;
    Harness {
        workflow,
        generator,
        publisher,
        project_id,
    }
}

fn harness() -> Harness {
    harness_with(
        FakeGenerator::default(),
        FakePublisher::default(),
        WorkflowOptions::default(),
    )
}

fn manual() -> WorkflowOptions {
    WorkflowOptions {
        auto_generate: false,
        auto_publish: false,
    }
}

fn configure_npm(h: &Harness) {
    h.workflow
        .save_npm_config(
            OWNER,
            h.project_id,
            NpmConfigInput {
                package_name: "petstore-client".to_string(),
                description: Some("Pets".to_string()),
                ..NpmConfigInput::default()
            },
        )
        .unwrap();
}

// ============================================================================
// Upload and versioning
// ============================================================================

#[tokio::test]
async fn test_uploads_get_sequential_versions() {
    let h = harness_with(FakeGenerator::default(), FakePublisher::default(), manual());

    let first = h
        .workflow
        .upload_spec(OWNER, h.project_id, SPEC_V1, Some("petstore.json"))
        .await
        .unwrap();
    assert_eq!(first.version.version, "1.0.0");
    assert!(first.warnings.is_empty());
    assert!(first.generation.is_none());
    assert_eq!(first.version.state(), LifecycleState::Uploaded);

    let second = h
        .workflow
        .upload_spec(OWNER, h.project_id, SPEC_V2, None)
        .await
        .unwrap();
    assert_eq!(second.version.version, "1.0.1");
    assert_eq!(second.specification.version.as_deref(), Some("1.0.1"));

    let versions = h.workflow.list_versions(OWNER, h.project_id).unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].version, "1.0.1");
}

#[tokio::test]
async fn test_unparseable_upload_stores_nothing() {
    let h = harness();
    let err = h
        .workflow
        .upload_spec(OWNER, h.project_id, "- just\n- a list\n", Some("spec.yaml"))
        .await
        .unwrap_err();

    assert!(err.is_parse_error());
    assert!(h.workflow.list_versions(OWNER, h.project_id).unwrap().is_empty());
    assert!(h.generator.prompts().is_empty());
}

#[tokio::test]
async fn test_non_openapi_document_is_accepted_with_warning() {
    let h = harness_with(FakeGenerator::default(), FakePublisher::default(), manual());
    let outcome = h
        .workflow
        .upload_spec(OWNER, h.project_id, "title: not a spec\n", Some("x.yml"))
        .await
        .unwrap();
    assert_eq!(outcome.warnings.len(), 1);
}

#[tokio::test]
async fn test_other_users_are_rejected() {
    let h = harness();
    let err = h
        .workflow
        .upload_spec("intruder", h.project_id, SPEC_V1, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SpecforgeError::Authorization { .. }));
    assert_eq!(err.http_status_code(), 403);
}

// ============================================================================
// Generation
// ============================================================================

#[tokio::test]
async fn test_generation_marks_client_ready_and_reports_missing_npm_config() {
    let h = harness();
    let outcome = h
        .workflow
        .upload_spec(OWNER, h.project_id, SPEC_V1, None)
        .await
        .unwrap();

    let generation = outcome.generation.unwrap().unwrap();
    assert!(generation.version.client_ready);
    assert_eq!(generation.client.spec_version_id, outcome.version.id);

    match generation.publish {
        PublishStatus::Failed(e) => assert!(e.is_config_missing()),
        other => panic!("unexpected publish status: {other:?}"),
    }
    assert!(h.publisher.bundles().is_empty());

    let stored = h
        .workflow
        .get_version(OWNER, h.project_id, outcome.version.id)
        .unwrap();
    assert!(stored.client_ready);
    assert!(!stored.is_published);
    assert_eq!(stored.state(), LifecycleState::PublishFailed);
}

#[tokio::test]
async fn test_generation_failure_keeps_version_uploaded() {
    let h = harness_with(
        FakeGenerator::failing(503),
        FakePublisher::default(),
        WorkflowOptions::default(),
    );
    let outcome = h
        .workflow
        .upload_spec(OWNER, h.project_id, SPEC_V1, None)
        .await
        .unwrap();

    let err = outcome.generation.unwrap().unwrap_err();
    assert!(err.is_upstream_error());

    let stored = h
        .workflow
        .get_version(OWNER, h.project_id, outcome.version.id)
        .unwrap();
    assert!(!stored.client_ready);
    assert_eq!(stored.state(), LifecycleState::Uploaded);
    assert!(h.workflow.latest_client(OWNER, h.project_id).unwrap().is_none());
}

#[tokio::test]
async fn test_prompt_includes_previous_client_after_first_generation() {
    let h = harness_with(
        FakeGenerator::default(),
        FakePublisher::default(),
        WorkflowOptions {
            auto_generate: true,
            auto_publish: false,
        },
    );
    h.workflow
        .upload_spec(OWNER, h.project_id, SPEC_V1, None)
        .await
        .unwrap();
    h.workflow
        .upload_spec(OWNER, h.project_id, SPEC_V2, None)
        .await
        .unwrap();

    let prompts = h.generator.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(!prompts[0].contains("previous client code"));
    assert!(prompts[0].contains("\"1.0.0\""));
    assert!(prompts[1].contains("Here's the previous client code:\n// client #1"));
    assert!(prompts[1].contains("\"1.0.1\""));
    assert!(prompts[1].contains("/pets"));
}

#[tokio::test]
async fn test_regeneration_appends_clients() {
    let h = harness_with(FakeGenerator::default(), FakePublisher::default(), manual());
    let upload = h
        .workflow
        .upload_spec(OWNER, h.project_id, SPEC_V1, None)
        .await
        .unwrap();

    h.workflow
        .generate_for_version(OWNER, h.project_id, upload.version.id)
        .await
        .unwrap();
    let second = h
        .workflow
        .generate_for_version(OWNER, h.project_id, upload.version.id)
        .await
        .unwrap();
    assert!(matches!(second.publish, PublishStatus::Skipped));

    let latest = h.workflow.latest_client(OWNER, h.project_id).unwrap().unwrap();
    assert!(latest.client_code.starts_with("// client #2"));

    let diff = h.workflow.diff_clients(OWNER, h.project_id).unwrap();
    match diff.report {
        DiffReport::Compared(text) => {
            assert_eq!(text.format, DiffFormat::Text);
            assert_eq!(text.additions, 1);
            assert_eq!(text.deletions, 1);
        }
        DiffReport::NothingToCompare => panic!("expected a comparison"),
    }
}

// ============================================================================
// Publishing
// ============================================================================

#[tokio::test]
async fn test_publish_after_generation() {
    let h = harness();
    configure_npm(&h);

    let outcome = h
        .workflow
        .upload_spec(OWNER, h.project_id, SPEC_V1, None)
        .await
        .unwrap();
    let generation = outcome.generation.unwrap().unwrap();

    let published = match generation.publish {
        PublishStatus::Published(p) => p,
        other => panic!("unexpected publish status: {other:?}"),
    };
    assert_eq!(published.package.name, "petstore-client");
    assert_eq!(published.package.version, "1.0.0");
    assert!(published.version.is_published);
    assert!(published.version.published_at.is_some());
    assert_eq!(published.version.state(), LifecycleState::Published);

    let bundles = h.publisher.bundles();
    assert_eq!(bundles.len(), 1);
    assert_eq!(bundles[0].manifest["version"], "1.0.0");
    assert_eq!(bundles[0].manifest["description"], "Pets");
    assert_eq!(bundles[0].spec_version_id, Some(outcome.version.id));
    assert_eq!(bundles[0].module_source, generation.client.client_code);
}

#[tokio::test]
async fn test_publish_failure_keeps_client() {
    let h = harness_with(
        FakeGenerator::default(),
        FakePublisher::rejecting(),
        WorkflowOptions::default(),
    );
    configure_npm(&h);

    let outcome = h
        .workflow
        .upload_spec(OWNER, h.project_id, SPEC_V1, None)
        .await
        .unwrap();
    let generation = outcome.generation.unwrap().unwrap();
    match &generation.publish {
        PublishStatus::Failed(e) => assert!(e.is_publish_error()),
        other => panic!("unexpected publish status: {other:?}"),
    }

    let stored = h
        .workflow
        .get_version(OWNER, h.project_id, outcome.version.id)
        .unwrap();
    assert!(stored.client_ready);
    assert!(!stored.is_published);
    assert!(stored.publish_error.unwrap().contains("403"));
    assert!(h.workflow.latest_client(OWNER, h.project_id).unwrap().is_some());
}

#[tokio::test]
async fn test_regeneration_clears_publish_failure() {
    let h = harness_with(FakeGenerator::default(), FakePublisher::rejecting(), manual());
    configure_npm(&h);
    let upload = h
        .workflow
        .upload_spec(OWNER, h.project_id, SPEC_V1, None)
        .await
        .unwrap();
    let version_id = upload.version.id;

    h.workflow
        .generate_for_version(OWNER, h.project_id, version_id)
        .await
        .unwrap();
    h.workflow
        .publish_version(OWNER, h.project_id, version_id)
        .await
        .unwrap_err();
    let failed = h.workflow.get_version(OWNER, h.project_id, version_id).unwrap();
    assert_eq!(failed.state(), LifecycleState::PublishFailed);

    let regenerated = h
        .workflow
        .generate_for_version(OWNER, h.project_id, version_id)
        .await
        .unwrap();
    assert!(matches!(regenerated.publish, PublishStatus::Skipped));
    assert_eq!(regenerated.version.state(), LifecycleState::ClientGenerated);
    let stored = h.workflow.get_version(OWNER, h.project_id, version_id).unwrap();
    assert_eq!(stored.state(), LifecycleState::ClientGenerated);
    assert!(stored.publish_error.is_none());
}

#[tokio::test]
async fn test_explicit_publish_requires_client() {
    let h = harness_with(FakeGenerator::default(), FakePublisher::default(), manual());
    configure_npm(&h);
    let upload = h
        .workflow
        .upload_spec(OWNER, h.project_id, SPEC_V1, None)
        .await
        .unwrap();

    let err = h
        .workflow
        .publish_version(OWNER, h.project_id, upload.version.id)
        .await
        .unwrap_err();
    assert_eq!(err.http_status_code(), 409);

    h.workflow
        .generate_for_version(OWNER, h.project_id, upload.version.id)
        .await
        .unwrap();
    let published = h
        .workflow
        .publish_version(OWNER, h.project_id, upload.version.id)
        .await
        .unwrap();
    assert!(published.version.is_published);
}

#[tokio::test]
async fn test_publish_package_rejects_bad_manifest() {
    let h = harness();
    let err = h
        .workflow
        .publish_package("{not json", "code();")
        .await
        .unwrap_err();
    assert!(matches!(err, SpecforgeError::InvalidInput(_)));

    let err = h.workflow.publish_package("[1]", "code();").await.unwrap_err();
    assert!(matches!(err, SpecforgeError::InvalidInput(_)));

    let receipt = h
        .workflow
        .publish_package(r#"{"name":"raw-pkg","version":"0.1.0"}"#, "code();")
        .await
        .unwrap();
    assert_eq!(receipt.output, "+ raw-pkg");
}

// ============================================================================
// Diffs
// ============================================================================

#[tokio::test]
async fn test_version_diff_defaults_to_previous_and_latest() {
    let h = harness_with(FakeGenerator::default(), FakePublisher::default(), manual());

    let empty = h
        .workflow
        .diff_versions(OWNER, h.project_id, None, None, None)
        .unwrap();
    assert_eq!(empty.report, DiffReport::NothingToCompare);

    h.workflow
        .upload_spec(OWNER, h.project_id, SPEC_V1, None)
        .await
        .unwrap();
    let single = h
        .workflow
        .diff_versions(OWNER, h.project_id, None, None, None)
        .unwrap();
    assert!(single.from.is_none());
    match single.report {
        DiffReport::Compared(text) => {
            assert!(text.old.is_none());
            assert_eq!(text.deletions, 0);
            assert!(text.additions > 0);
        }
        DiffReport::NothingToCompare => panic!("expected a comparison"),
    }

    h.workflow
        .upload_spec(OWNER, h.project_id, SPEC_V2, None)
        .await
        .unwrap();
    let pair = h
        .workflow
        .diff_versions(OWNER, h.project_id, None, None, None)
        .unwrap();
    assert_eq!(pair.format, DiffFormat::Json);
    assert_eq!(pair.from.unwrap().version, "1.0.0");
    assert_eq!(pair.to.unwrap().version, "1.0.1");
    match pair.report {
        DiffReport::Compared(text) => assert!(!text.is_identical()),
        DiffReport::NothingToCompare => panic!("expected a comparison"),
    }
}

#[tokio::test]
async fn test_version_diff_of_same_version_is_identical() {
    let h = harness_with(FakeGenerator::default(), FakePublisher::default(), manual());
    let upload = h
        .workflow
        .upload_spec(OWNER, h.project_id, SPEC_V1, None)
        .await
        .unwrap();
    let id = upload.version.id;

    let diff = h
        .workflow
        .diff_versions(OWNER, h.project_id, Some(id), Some(id), Some(DiffFormat::Yaml))
        .unwrap();
    match diff.report {
        DiffReport::Compared(text) => {
            assert!(text.is_identical());
            assert_eq!(text.old, text.new);
        }
        DiffReport::NothingToCompare => panic!("expected a comparison"),
    }
}

// ============================================================================
// Event functions and npm settings
// ============================================================================

#[tokio::test]
async fn test_generate_event_from_webhook_record() {
    let h = harness_with(FakeGenerator::default(), FakePublisher::default(), manual());
    let upload = h
        .workflow
        .upload_spec(OWNER, h.project_id, SPEC_V1, None)
        .await
        .unwrap();

    let payload = EventPayload::from_json(&json!({
        "type": "INSERT",
        "record": {
            "id": upload.version.id.to_string(),
            "project_id": h.project_id.to_string(),
            "version": "1.0.0",
            "file_content": SPEC_V1,
        }
    }));
    let outcome = h.workflow.handle_generate_event(&payload).await.unwrap();
    assert_eq!(outcome.client.spec_version_id, upload.version.id);
    assert!(outcome.version.client_ready);
    assert!(h.generator.prompts()[0].contains(SPEC_V1));
}

#[tokio::test]
async fn test_generate_event_missing_fields() {
    let h = harness();
    let payload = EventPayload::from_json(&json!({"project_id": h.project_id.to_string()}));
    let err = h.workflow.handle_generate_event(&payload).await.unwrap_err();
    assert_eq!(err.http_status_code(), 400);
    assert!(h.generator.prompts().is_empty());
}

#[tokio::test]
async fn test_publish_event_publishes_ready_version() {
    let h = harness_with(FakeGenerator::default(), FakePublisher::default(), manual());
    configure_npm(&h);
    let upload = h
        .workflow
        .upload_spec(OWNER, h.project_id, SPEC_V1, None)
        .await
        .unwrap();
    h.workflow
        .generate_for_version(OWNER, h.project_id, upload.version.id)
        .await
        .unwrap();

    let payload = EventPayload::from_json(&json!({
        "spec_id": upload.version.id.to_string(),
        "project_id": h.project_id.to_string(),
    }));
    let published = h.workflow.handle_publish_event(&payload).await.unwrap();
    assert_eq!(published.package.version, "1.0.0");
}

#[test]
fn test_npm_config_validation() {
    let h = harness();
    let err = h
        .workflow
        .save_npm_config(
            OWNER,
            h.project_id,
            NpmConfigInput {
                package_name: "Bad Name".to_string(),
                ..NpmConfigInput::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, SpecforgeError::InvalidInput(_)));

    let saved = h
        .workflow
        .save_npm_config(
            OWNER,
            h.project_id,
            NpmConfigInput {
                package_name: "@acme/pets".to_string(),
                version: None,
                description: Some("   ".to_string()),
                author: Some("ACME".to_string()),
            },
        )
        .unwrap();
    assert_eq!(saved.version, "1.0.0");
    assert!(saved.description.is_none());
    assert_eq!(
        h.workflow.npm_config(OWNER, h.project_id).unwrap(),
        Some(saved)
    );
}
