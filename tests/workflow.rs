//! Workflow integration tests for ocr-workbench.
//!
//! Every test drives a [`StageController`] against an in-memory backend that
//! records each call, so "no network call" is checked by counting.
//!
//! Run with:
//!   cargo test --test workflow

use async_trait::async_trait;
use ocr_workbench::backend::{
    EnhanceRequest, EnhanceResponse, OcrRequest, OcrResponse, RenderRequest, RenderResponse,
    UploadPayload, UploadResponse,
};
use ocr_workbench::{
    Backend, BackendError, ClientConfig, ErrorKind, Metadata, NoticeLevel, OcrProgressCallback,
    OutputFormat, ProgressOutcome, ProgressSnapshot, PromptEditor, PromptKind, RegionVisibility,
    Stage, StageController, StatusResponse, UploadFile, WorkflowError, WorkflowObserver,
    DEFAULT_MAX_UPLOAD_BYTES,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

// ── Fake backend ─────────────────────────────────────────────────────────────

/// Scripted failures and delays.
#[derive(Default)]
struct Script {
    upload_error: Option<BackendError>,
    ocr_error: Option<BackendError>,
    ocr_delay: Option<Duration>,
    enhance_error: Option<BackendError>,
}

#[derive(Default)]
struct FakeBackend {
    script: Script,
    calls: Mutex<Vec<&'static str>>,
    uploads: Mutex<Vec<(String, &'static str, usize)>>,
    ocr_requests: Mutex<Vec<OcrRequest>>,
    enhance_requests: Mutex<Vec<EnhanceRequest>>,
    render_requests: Mutex<Vec<RenderRequest>>,
    downloads: Mutex<Vec<(String, OutputFormat, String)>>,
    cleaned: Mutex<Vec<String>>,
}

impl FakeBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn scripted(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            ..Self::default()
        })
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn upload(&self, payload: UploadPayload) -> Result<UploadResponse, BackendError> {
        self.record("upload");
        if let Some(ref e) = self.script.upload_error {
            return Err(e.clone());
        }
        let mut uploads = self.uploads.lock().unwrap();
        let file_id = match uploads.len() {
            0 => "abc123".to_string(),
            n => format!("file-{n}"),
        };
        uploads.push((payload.filename, payload.mime_type, payload.bytes.len()));
        Ok(UploadResponse {
            success: true,
            file_id: Some(file_id),
            detail: None,
        })
    }

    async fn status(&self) -> Result<StatusResponse, BackendError> {
        self.record("status");
        Ok(StatusResponse {
            status: Some("healthy".into()),
            gemini_available: true,
            ..StatusResponse::default()
        })
    }

    async fn process_ocr(&self, request: &OcrRequest) -> Result<OcrResponse, BackendError> {
        self.record("ocr");
        self.ocr_requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.script.ocr_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(ref e) = self.script.ocr_error {
            return Err(e.clone());
        }
        Ok(OcrResponse {
            success: true,
            raw_text: Some("Hello world".into()),
            processing_time: Some(1.25),
            detail: None,
        })
    }

    async fn enhance(&self, request: &EnhanceRequest) -> Result<EnhanceResponse, BackendError> {
        self.record("enhance");
        self.enhance_requests.lock().unwrap().push(request.clone());
        if let Some(ref e) = self.script.enhance_error {
            return Err(e.clone());
        }
        Ok(EnhanceResponse {
            success: true,
            processed_text: Some(format!("# {}", request.text)),
            detail: None,
        })
    }

    async fn generate_markdown(
        &self,
        request: &RenderRequest,
    ) -> Result<RenderResponse, BackendError> {
        self.record("render");
        self.render_requests.lock().unwrap().push(request.clone());
        let mut markdown = String::new();
        if let Some(title) = request.metadata.as_ref().and_then(|m| m.title.as_ref()) {
            markdown.push_str(&format!("---\ntitle: {title}\n---\n\n"));
        }
        markdown.push_str(&request.content);
        markdown.push('\n');
        Ok(RenderResponse {
            success: true,
            markdown_content: Some(markdown),
            txt_content: Some(request.content.clone()),
            detail: None,
        })
    }

    async fn download(
        &self,
        file_id: &str,
        format: OutputFormat,
        filename: &str,
    ) -> Result<Vec<u8>, BackendError> {
        self.record("download");
        self.downloads
            .lock()
            .unwrap()
            .push((file_id.to_string(), format, filename.to_string()));
        Ok(format!("{format} for {file_id}").into_bytes())
    }

    async fn cleanup(&self, file_id: &str) -> Result<(), BackendError> {
        self.record("cleanup");
        self.cleaned.lock().unwrap().push(file_id.to_string());
        Ok(())
    }
}

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Show library logs (liveness probe, timeouts) with `--nocapture`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("ocr_workbench=debug"))
        .with_test_writer()
        .try_init();
}

fn controller(backend: &Arc<FakeBackend>) -> StageController {
    StageController::new(ClientConfig::default(), backend.clone())
}

/// A PDF-looking buffer of exactly `size` bytes.
fn pdf_bytes(size: usize) -> Vec<u8> {
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.resize(size.max(bytes.len()), b' ');
    bytes
}

fn report_pdf() -> UploadFile {
    UploadFile::from_bytes("report.pdf", pdf_bytes(2 * 1024 * 1024))
}

/// Controller already at the review stage with raw text "Hello world".
async fn reviewed(backend: &Arc<FakeBackend>) -> StageController {
    let mut ctl = controller(backend);
    assert_ok!(ctl.submit_upload(&report_pdf()).await);
    assert_ok!(ctl.run_ocr().await);
    ctl
}

#[derive(Default)]
struct Recorder {
    stages: Mutex<Vec<Stage>>,
    notices: Mutex<Vec<(NoticeLevel, String)>>,
    finishes: Mutex<Vec<ProgressOutcome>>,
    ticks: Mutex<usize>,
}

impl WorkflowObserver for Recorder {
    fn on_stage_changed(&self, stage: Stage, regions: RegionVisibility) {
        assert!(regions.is_visible(stage));
        self.stages.lock().unwrap().push(stage);
    }

    fn on_notice(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().unwrap().push((level, message.to_string()));
    }
}

impl OcrProgressCallback for Recorder {
    fn on_tick(&self, snapshot: &ProgressSnapshot) {
        assert!(snapshot.percent <= 90);
        *self.ticks.lock().unwrap() += 1;
    }

    fn on_finish(&self, outcome: ProgressOutcome) {
        self.finishes.lock().unwrap().push(outcome);
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn report_pdf_end_to_end() {
    let backend = FakeBackend::new();
    let mut ctl = controller(&backend);
    let out = tempfile::tempdir().unwrap();

    let file_id = assert_ok!(ctl.submit_upload(&report_pdf()).await);
    assert_eq!(file_id, "abc123");
    assert_eq!(ctl.stage(), Stage::Ocr);
    assert_eq!(backend.calls(), vec!["upload"]);
    assert_eq!(
        backend.uploads.lock().unwrap()[0],
        ("report.pdf".to_string(), "application/pdf", 2 * 1024 * 1024)
    );

    let raw = assert_ok!(ctl.run_ocr_with("en", true).await);
    assert_eq!(raw, "Hello world");
    assert_eq!(ctl.stage(), Stage::Review);
    assert_eq!(ctl.session().ocr_seconds, Some(1.25));
    let ocr = backend.ocr_requests.lock().unwrap()[0].clone();
    assert_eq!(ocr.file_id, "abc123");
    assert_eq!(ocr.language, "en");

    let calls_before_skip = backend.calls().len();
    let processed = assert_ok!(ctl.skip_enhance());
    assert_eq!(processed, "Hello world");
    assert_eq!(ctl.session().processed_text, ctl.session().raw_text);
    assert_eq!(backend.calls().len(), calls_before_skip, "skip is local");

    let rendered = assert_ok!(ctl.render_outputs(None).await);
    assert!(rendered.markdown.contains("Hello world"));
    assert_eq!(ctl.stage(), Stage::Download);
    assert!(!backend.render_requests.lock().unwrap()[0].include_metadata);

    let saved = assert_ok!(ctl.download(OutputFormat::Md, None, out.path()).await);
    assert_eq!(saved.path, out.path().join("report.md"));
    assert_eq!(std::fs::read_to_string(&saved.path).unwrap(), "md for abc123");
    assert_eq!(
        backend.downloads.lock().unwrap()[0],
        ("abc123".to_string(), OutputFormat::Md, "report".to_string())
    );
    assert!(ctl.session().check_invariants().is_ok());
}

#[tokio::test(start_paused = true)]
async fn ocr_timeout_keeps_stage_and_cancels_progress() {
    init_tracing();
    let backend = FakeBackend::scripted(Script {
        ocr_delay: Some(Duration::from_secs(400)),
        ..Script::default()
    });
    let recorder = Arc::new(Recorder::default());
    let mut ctl = controller(&backend).with_progress(recorder.clone());
    assert_ok!(ctl.submit_upload(&report_pdf()).await);

    let err = assert_err!(ctl.run_ocr().await);
    assert!(matches!(err, WorkflowError::OcrTimeout { secs: 300 }), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(ctl.stage(), Stage::Ocr);
    assert!(ctl.session().raw_text.is_none());

    // Liveness probe ran every 30 s while OCR was pending, and only logged.
    assert!(backend.count("status") >= 9, "calls: {:?}", backend.calls());
    assert_eq!(*recorder.finishes.lock().unwrap(), vec![ProgressOutcome::Failed]);
    assert!(*recorder.ticks.lock().unwrap() > 0);

    // Nothing keeps polling once the operation is over.
    let status_calls = backend.count("status");
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(backend.count("status"), status_calls);
}

#[tokio::test(start_paused = true)]
async fn slow_ocr_under_the_cap_succeeds() {
    init_tracing();
    let backend = FakeBackend::scripted(Script {
        ocr_delay: Some(Duration::from_secs(45)),
        ..Script::default()
    });
    let recorder = Arc::new(Recorder::default());
    let mut ctl = controller(&backend).with_progress(recorder.clone());
    assert_ok!(ctl.submit_upload(&report_pdf()).await);

    assert_eq!(assert_ok!(ctl.run_ocr().await), "Hello world");
    assert_eq!(*recorder.finishes.lock().unwrap(), vec![ProgressOutcome::Completed]);
    assert_eq!(backend.count("status"), 1, "one probe at 30 s");
}

#[tokio::test(start_paused = true)]
async fn zero_timer_config_still_ticks_and_probes() {
    init_tracing();
    let backend = FakeBackend::scripted(Script {
        ocr_delay: Some(Duration::from_millis(3_500)),
        ..Script::default()
    });
    let config = ClientConfig {
        probe_interval_secs: 0,
        progress_tick_ms: 0,
        ..ClientConfig::default()
    };
    let recorder = Arc::new(Recorder::default());
    let mut ctl = StageController::new(config, backend.clone()).with_progress(recorder.clone());
    assert_eq!(ctl.config().probe_interval_secs, 1);
    assert_eq!(ctl.config().progress_tick_ms, 1);
    assert_ok!(ctl.submit_upload(&report_pdf()).await);

    assert_eq!(assert_ok!(ctl.run_ocr().await), "Hello world");
    assert_eq!(backend.count("status"), 3, "probes at 1 s, 2 s and 3 s");
    assert!(*recorder.ticks.lock().unwrap() > 0);
    assert_eq!(*recorder.finishes.lock().unwrap(), vec![ProgressOutcome::Completed]);
}

// ── Upload validation ────────────────────────────────────────────────────────

#[tokio::test]
async fn oversized_file_never_reaches_the_network() {
    let backend = FakeBackend::new();
    let mut ctl = controller(&backend);
    let file = UploadFile::from_bytes(
        "big.pdf",
        pdf_bytes(DEFAULT_MAX_UPLOAD_BYTES as usize + 1),
    );

    let err = assert_err!(ctl.submit_upload(&file).await);
    assert!(matches!(err, WorkflowError::FileTooLarge { .. }), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(backend.calls().is_empty());
    assert!(ctl.session().is_pristine());
}

#[tokio::test]
async fn file_at_the_limit_is_accepted() {
    let backend = FakeBackend::new();
    let mut ctl = controller(&backend);
    let file = UploadFile::from_bytes("edge.pdf", pdf_bytes(DEFAULT_MAX_UPLOAD_BYTES as usize));
    assert_ok!(ctl.submit_upload(&file).await);
    assert_eq!(backend.calls(), vec!["upload"]);
}

#[tokio::test]
async fn wrong_type_never_reaches_the_network() {
    let backend = FakeBackend::new();
    let mut ctl = controller(&backend);

    for file in [
        UploadFile::from_bytes("notes.docx", b"PK\x03\x04".to_vec()),
        UploadFile::from_bytes("photo.png", pdf_bytes(64)),
        UploadFile::from_bytes("README", b"hello".to_vec()),
    ] {
        let err = assert_err!(ctl.submit_upload(&file).await);
        assert!(matches!(err, WorkflowError::InvalidFileType { .. }), "got {err:?}");
        assert!(err.is_local());
    }
    assert!(backend.calls().is_empty());
    assert_eq!(ctl.stage(), Stage::Upload);
}

#[tokio::test]
async fn rejected_upload_leaves_session_empty() {
    let backend = FakeBackend::scripted(Script {
        upload_error: Some(BackendError::Rejected {
            status: 400,
            detail: "unsupported file".into(),
        }),
        ..Script::default()
    });
    let recorder = Arc::new(Recorder::default());
    let mut ctl = controller(&backend).with_observer(recorder.clone());

    let err = assert_err!(ctl.submit_upload(&report_pdf()).await);
    assert_eq!(err.kind(), ErrorKind::Backend);
    assert!(err.to_string().contains("unsupported file"));
    assert!(ctl.session().is_pristine());
    assert_eq!(backend.calls(), vec!["upload"]);

    let notices = recorder.notices.lock().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].0, NoticeLevel::Error);
}

#[tokio::test]
async fn reupload_replaces_session_and_releases_old_file() {
    let backend = FakeBackend::new();
    let mut ctl = reviewed(&backend).await;

    let file_id =
        assert_ok!(ctl.submit_upload(&UploadFile::from_bytes("other.pdf", pdf_bytes(128))).await);
    assert_eq!(file_id, "file-1");
    assert_eq!(ctl.stage(), Stage::Ocr);
    assert!(ctl.session().raw_text.is_none());
    assert_eq!(ctl.session().filename.as_deref(), Some("other.pdf"));

    // The old upload is released in the background.
    for _ in 0..10 {
        if backend.count("cleanup") > 0 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(*backend.cleaned.lock().unwrap(), vec!["abc123".to_string()]);
}

// ── OCR ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unreachable_backend_during_ocr() {
    let backend = FakeBackend::scripted(Script {
        ocr_error: Some(BackendError::Unreachable {
            url: "http://localhost:8000".into(),
            reason: "connection refused".into(),
        }),
        ..Script::default()
    });
    let mut ctl = controller(&backend);
    assert_ok!(ctl.submit_upload(&report_pdf()).await);

    let err = assert_err!(ctl.run_ocr().await);
    assert!(matches!(err, WorkflowError::BackendUnreachable { .. }), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::NetworkUnreachable);
    assert_eq!(ctl.stage(), Stage::Ocr);
}

#[tokio::test]
async fn ocr_rejection_carries_detail() {
    let backend = FakeBackend::scripted(Script {
        ocr_error: Some(BackendError::Rejected {
            status: 500,
            detail: "OCR engine crashed".into(),
        }),
        ..Script::default()
    });
    let mut ctl = controller(&backend);
    assert_ok!(ctl.submit_upload(&report_pdf()).await);

    let err = assert_err!(ctl.run_ocr().await);
    assert!(matches!(err, WorkflowError::OcrFailed(_)));
    assert!(err.to_string().contains("OCR engine crashed"));
}

#[tokio::test]
async fn rerunning_ocr_discards_derived_text() {
    let backend = FakeBackend::new();
    let mut ctl = reviewed(&backend).await;
    assert_ok!(ctl.enhance_with_ai(PromptKind::Structure, None).await);
    assert_ok!(ctl.render_outputs(None).await);
    assert_eq!(ctl.stage(), Stage::Download);

    assert_ok!(ctl.run_ocr_with("fr", false).await);
    assert_eq!(ctl.stage(), Stage::Review);
    assert!(ctl.session().processed_text.is_none());
    assert!(ctl.session().rendered_markdown.is_none());
    let last = backend.ocr_requests.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.language, "fr");
    assert!(!last.use_textline_orientation);
    assert!(ctl.session().check_invariants().is_ok());
}

// ── Enhancement ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn custom_prompt_without_text_is_rejected_locally() {
    let backend = FakeBackend::new();
    let mut ctl = reviewed(&backend).await;

    for text in [None, Some(""), Some("   ")] {
        let err = assert_err!(ctl.enhance_with_ai(PromptKind::Custom, text).await);
        assert!(matches!(err, WorkflowError::MissingPrompt), "got {err:?}");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert_eq!(backend.count("enhance"), 0);
    assert!(ctl.session().processed_text.is_none());
}

#[tokio::test]
async fn builtin_prompt_sends_kind_without_override() {
    let backend = FakeBackend::new();
    let mut ctl = reviewed(&backend).await;

    let processed = assert_ok!(ctl.enhance_with_ai(PromptKind::Academic, None).await);
    assert_eq!(processed, "# Hello world");
    assert_eq!(ctl.session().processed_text.as_deref(), Some("# Hello world"));
    assert_eq!(ctl.stage(), Stage::Review);

    let sent = backend.enhance_requests.lock().unwrap()[0].clone();
    assert_eq!(sent.text, "Hello world");
    assert_eq!(sent.prompt_type, "academic");
    assert_eq!(sent.custom_prompt, None);
}

#[tokio::test]
async fn edited_preview_is_sent_as_override() {
    let backend = FakeBackend::new();
    let mut ctl = reviewed(&backend).await;

    let mut editor = PromptEditor::new(PromptKind::Summarize);
    editor.set_allow_edit(true);
    assert_ok!(editor.edit_preview("Summarise in three bullets."));
    assert_ok!(ctl.enhance_with_prompt(&editor.request()).await);

    let sent = backend.enhance_requests.lock().unwrap()[0].clone();
    assert_eq!(sent.prompt_type, "summarize");
    assert_eq!(sent.custom_prompt.as_deref(), Some("Summarise in three bullets."));
}

#[tokio::test]
async fn none_prompt_is_a_skip() {
    let backend = FakeBackend::new();
    let mut ctl = reviewed(&backend).await;

    let processed = assert_ok!(ctl.enhance_with_ai(PromptKind::None, None).await);
    assert_eq!(processed, "Hello world");
    assert_eq!(backend.count("enhance"), 0);
}

#[tokio::test]
async fn failed_enhancement_keeps_previous_state() {
    let backend = FakeBackend::scripted(Script {
        enhance_error: Some(BackendError::Rejected {
            status: 503,
            detail: "Gemini API not configured".into(),
        }),
        ..Script::default()
    });
    let mut ctl = reviewed(&backend).await;

    let err = assert_err!(ctl.enhance_with_ai(PromptKind::Structure, None).await);
    assert!(matches!(err, WorkflowError::EnhanceFailed(_)));
    assert!(err.to_string().contains("Gemini API not configured"));
    assert!(ctl.session().processed_text.is_none());

    // The raw text is still usable.
    assert_ok!(ctl.skip_enhance());
    assert_ok!(ctl.render_outputs(None).await);
}

#[tokio::test]
async fn new_processed_text_invalidates_renders() {
    let backend = FakeBackend::new();
    let mut ctl = reviewed(&backend).await;
    assert_ok!(ctl.skip_enhance());
    assert_ok!(ctl.render_outputs(None).await);
    assert_eq!(ctl.stage(), Stage::Download);

    assert_ok!(ctl.enhance_with_ai(PromptKind::Structure, None).await);
    assert_eq!(ctl.stage(), Stage::Review);
    assert!(ctl.session().rendered_markdown.is_none());
    assert!(ctl.session().check_invariants().is_ok());
}

// ── Rendering and download ───────────────────────────────────────────────────

#[tokio::test]
async fn render_twice_is_identical() {
    let backend = FakeBackend::new();
    let mut ctl = reviewed(&backend).await;
    assert_ok!(ctl.skip_enhance());
    let meta = Metadata::new().title("Report").keywords_csv("a, b");

    let first = assert_ok!(ctl.render_outputs(Some(&meta)).await);
    let second = assert_ok!(ctl.render_outputs(Some(&meta)).await);
    assert_eq!(first, second);
    assert_eq!(ctl.stage(), Stage::Download);

    let requests = backend.render_requests.lock().unwrap();
    assert_eq!(requests[0], requests[1]);
}

#[tokio::test]
async fn metadata_controls_front_matter() {
    let backend = FakeBackend::new();
    let mut ctl = reviewed(&backend).await;
    assert_ok!(ctl.skip_enhance());

    let with = assert_ok!(ctl.render_outputs(Some(&Metadata::new().title("Report"))).await);
    assert!(with.markdown.starts_with("---\ntitle: Report"));

    let empty = assert_ok!(ctl.render_outputs(Some(&Metadata::new())).await);
    assert_eq!(empty.markdown, "Hello world\n");

    let requests = backend.render_requests.lock().unwrap();
    assert!(requests[0].include_metadata);
    assert!(!requests[1].include_metadata);
    assert!(requests[1].metadata.is_none());
}

#[tokio::test]
async fn download_name_is_sanitised() {
    let backend = FakeBackend::new();
    let mut ctl = reviewed(&backend).await;
    let out = tempfile::tempdir().unwrap();

    let saved = assert_ok!(
        ctl.download(OutputFormat::Txt, Some("../escape"), out.path())
            .await
    );
    assert_eq!(saved.path, out.path().join("_escape.txt"));
    assert_eq!(std::fs::read_to_string(&saved.path).unwrap(), "txt for abc123");
}

#[tokio::test]
async fn operations_out_of_order_are_stage_violations() {
    let backend = FakeBackend::new();
    let mut ctl = controller(&backend);
    assert_ok!(ctl.submit_upload(&report_pdf()).await);

    let err = assert_err!(ctl.skip_enhance());
    assert_eq!(err.kind(), ErrorKind::Precondition);
    let err = assert_err!(ctl.enhance_with_ai(PromptKind::Structure, None).await);
    assert_eq!(err.kind(), ErrorKind::Precondition);
    let err = assert_err!(ctl.render_outputs(None).await);
    assert_eq!(err.kind(), ErrorKind::Precondition);

    assert_eq!(backend.calls(), vec!["upload"]);
    assert_eq!(ctl.stage(), Stage::Ocr);
}

#[tokio::test]
async fn explicit_navigation_cannot_skip_stages() {
    let backend = FakeBackend::new();
    let mut ctl = controller(&backend);

    for stage in [Stage::Review, Stage::Download] {
        let err = assert_err!(ctl.advance_to(stage));
        assert!(matches!(err, WorkflowError::StageViolation { .. }));
        assert_eq!(ctl.stage(), Stage::Upload);
    }

    assert_ok!(ctl.submit_upload(&report_pdf()).await);
    assert_err!(ctl.advance_to(Stage::Review));
    assert_err!(ctl.advance_to(Stage::Upload));
    assert_eq!(ctl.stage(), Stage::Ocr);

    assert_ok!(ctl.run_ocr().await);
    assert_ok!(ctl.skip_enhance());
    assert_ok!(ctl.render_outputs(None).await);

    // Renders only live at the download stage.
    let err = assert_err!(ctl.advance_to(Stage::Review));
    assert!(matches!(
        err,
        WorkflowError::StageRegression {
            from: Stage::Download,
            to: Stage::Review,
            ..
        }
    ));
    assert_ok!(ctl.advance_to(Stage::Download));
    assert_eq!(ctl.stage(), Stage::Download);
    assert!(ctl.session().check_invariants().is_ok());
}

// ── Reset ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reset_clears_everything_and_cleans_up() {
    let backend = FakeBackend::new();
    let recorder = Arc::new(Recorder::default());
    let mut ctl = reviewed(&backend).await.with_observer(recorder.clone());
    assert_ok!(ctl.skip_enhance());
    assert_ok!(ctl.render_outputs(None).await);

    let cleanup = ctl.reset().expect("an uploaded file needs cleanup");
    assert!(ctl.session().is_pristine());
    assert_eq!(ctl.stage(), Stage::Upload);

    cleanup.await.unwrap();
    assert_eq!(*backend.cleaned.lock().unwrap(), vec!["abc123".to_string()]);
    assert_eq!(recorder.stages.lock().unwrap().last(), Some(&Stage::Upload));

    // Nothing left to release.
    assert!(ctl.reset().is_none());
}

#[tokio::test]
async fn stage_changes_are_reported_in_order() {
    let backend = FakeBackend::new();
    let recorder = Arc::new(Recorder::default());
    let mut ctl = controller(&backend).with_observer(recorder.clone());
    let out = tempfile::tempdir().unwrap();

    assert_ok!(ctl.submit_upload(&report_pdf()).await);
    assert_ok!(ctl.run_ocr().await);
    assert_ok!(ctl.skip_enhance());
    assert_ok!(ctl.render_outputs(None).await);
    assert_ok!(ctl.download(OutputFormat::Md, None, out.path()).await);

    assert_eq!(
        *recorder.stages.lock().unwrap(),
        vec![Stage::Ocr, Stage::Review, Stage::Download]
    );
    let notices = recorder.notices.lock().unwrap();
    assert!(notices.iter().all(|(level, _)| *level != NoticeLevel::Error));
    assert!(notices
        .iter()
        .any(|(_, msg)| msg.contains("report.md")));
}

#[tokio::test]
async fn status_check_reports_backend_capabilities() {
    let backend = FakeBackend::new();
    let ctl = controller(&backend);
    let status = assert_ok!(ctl.check_status().await);
    assert!(status.gemini_available);
    assert_eq!(status.status.as_deref(), Some("healthy"));
    assert_eq!(backend.calls(), vec!["status"]);
}
