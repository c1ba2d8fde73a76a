#![allow(unused_crate_dependencies)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lsp_types::{Position, Range, TextEdit, Uri};
use parking_lot::Mutex;
use tandem_primitives::{
	DocumentKey, FilePath, HostVersion, LanguageKind, MappingBehavior, ProjectKey, Rope, Span, TextEditKind, uri_from_path,
};
use tandem_sync::coalescer::{
	ConfigChangeKind, ConfigurationReconciler, ProjectConfigurationChangeEvent, Reconciliation,
};
use tandem_sync::mapping::{Segment, SegmentKind, SourceMapping};
use tandem_sync::protocol::{
	LanguageQueryParams, MapToDocumentEditsParams, MapToDocumentRangesParams, MonitorProjectConfigurationFilePathParams,
};
use tandem_sync::{
	DocumentSnapshot, Error, Freshness, GenerationOutput, GenerationPipeline, SnapshotSet, SyncConfig, SyncServer, Versioned,
};
use tokio_util::sync::CancellationToken;

const PROJECT: &str = "/proj/app.csproj";
const PAGE: &str = "/proj/Pages/Index.razor";
const SOURCE: &str = "<h1>Hello</h1>\n<p>@name</p>\n";
const CODE: &str = "class C { void R() { __o = name; } }";
const MARKUP: &str = "<h1>Hello</h1>\n<p>     </p>\n";

fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn output() -> GenerationOutput {
	GenerationOutput {
		code: Rope::from(CODE),
		markup: Rope::from(MARKUP),
		mappings: vec![SourceMapping::new(Span::new(19, 4), Span::new(27, 4))],
		segments: vec![
			Segment::new(Span::new(0, 18), SegmentKind::Markup),
			Segment::new(Span::new(18, 1), SegmentKind::Razor),
			Segment::new(Span::new(19, 4), SegmentKind::Code),
			Segment::new(Span::new(23, 5), SegmentKind::Markup),
		],
	}
}

fn page_uri() -> Uri {
	uri_from_path(&FilePath::new(PAGE)).unwrap()
}

fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
	Range::new(Position::new(sl, sc), Position::new(el, ec))
}

struct Fixture {
	docs: Arc<SnapshotSet>,
	server: SyncServer,
	cancel: CancellationToken,
}

impl Fixture {
	fn new() -> Self {
		Self::with(|builder| builder)
	}

	fn with(configure: impl FnOnce(tandem_sync::SyncServerBuilder) -> tandem_sync::SyncServerBuilder) -> Self {
		init_tracing();
		let docs = Arc::new(SnapshotSet::new());
		let server = configure(SyncServer::builder(Arc::clone(&docs) as _)).build().unwrap();
		Self {
			docs,
			server,
			cancel: CancellationToken::new(),
		}
	}

	/// Opens the page at `version` and records it with the server.
	async fn open(&self, version: i32) -> Arc<DocumentSnapshot> {
		let snapshot = DocumentSnapshot::new(PROJECT, PAGE, HostVersion::new(version), SOURCE);
		self.docs.insert(Arc::clone(&snapshot));
		self.server.document_changed(&snapshot, &self.cancel).await.unwrap();
		snapshot
	}

	async fn generate(&self, snapshot: &Arc<DocumentSnapshot>) {
		let outcomes = self.server.apply_generation(snapshot, output(), &self.cancel).await.unwrap();
		assert!(outcomes.iter().all(|o| o.is_applied()), "{outcomes:?}");
	}

	fn query(&self, line: u32, character: u32) -> LanguageQueryParams {
		LanguageQueryParams {
			uri: page_uri(),
			position: Position::new(line, character),
		}
	}
}

#[tokio::test]
async fn language_query_classifies_and_projects() {
	let fx = Fixture::new();
	let snapshot = fx.open(5).await;
	fx.generate(&snapshot).await;

	let code = fx.server.language_query(fx.query(1, 5), &fx.cancel).await.unwrap();
	assert_eq!(code.kind, LanguageKind::Code);
	assert_eq!(code.position_index, 28);
	assert_eq!(code.position, Position::new(0, 28));
	assert_eq!(code.host_document_version, HostVersion::new(5));
	assert_eq!(code.freshness, Freshness::Current);

	let markup = fx.server.language_query(fx.query(0, 2), &fx.cancel).await.unwrap();
	assert_eq!(markup.kind, LanguageKind::Markup);
	assert_eq!(markup.position, Position::new(0, 2));

	let razor = fx.server.language_query(fx.query(1, 3), &fx.cancel).await.unwrap();
	assert_eq!(razor.kind, LanguageKind::Razor);
	assert_eq!(razor.position_index, 18);
	assert_eq!(razor.position, Position::new(1, 3));
	assert_eq!(razor.host_document_version, HostVersion::new(5));
}

#[tokio::test]
async fn response_version_lets_a_lagging_caller_detect_it_is_behind() {
	let fx = Fixture::new();
	let snapshot = fx.open(5).await;
	fx.generate(&snapshot).await;

	let response = fx.server.language_query(fx.query(1, 5), &fx.cancel).await.unwrap();
	assert_eq!(response.host_document_version(), HostVersion::new(5));
	assert!(response.is_ahead_of(HostVersion::new(4)));
	assert!(!response.is_ahead_of(HostVersion::new(5)));
}

#[tokio::test]
async fn answers_from_an_older_generation_are_marked_stale() {
	let fx = Fixture::new();
	let v5 = fx.open(5).await;
	fx.generate(&v5).await;
	let _v6 = fx.open(6).await;

	let response = fx.server.language_query(fx.query(1, 5), &fx.cancel).await.unwrap();
	assert_eq!(response.host_document_version, HostVersion::new(5));
	assert_eq!(
		response.freshness,
		Freshness::Stale {
			current: HostVersion::new(6)
		}
	);
}

#[tokio::test]
async fn razor_positions_resolve_against_the_generation_source() {
	let fx = Fixture::new();
	let v5 = fx.open(5).await;
	fx.generate(&v5).await;
	let v6 = DocumentSnapshot::new(PROJECT, PAGE, HostVersion::new(6), format!("{SOURCE}@code {{ }}\n"));
	fx.docs.insert(Arc::clone(&v6));
	fx.server.document_changed(&v6, &fx.cancel).await.unwrap();

	let razor = fx.server.language_query(fx.query(1, 3), &fx.cancel).await.unwrap();
	assert_eq!(razor.kind, LanguageKind::Razor);
	assert_eq!(razor.position_index, 18);
	assert_eq!(razor.host_document_version, HostVersion::new(5));
	assert_eq!(
		razor.freshness,
		Freshness::Stale {
			current: HostVersion::new(6)
		}
	);

	// Line 2 is empty in the text the generation was built from.
	let err = fx.server.language_query(fx.query(2, 1), &fx.cancel).await.unwrap_err();
	assert!(matches!(err, Error::PositionOutOfRange(_)), "{err}");
}

#[tokio::test]
async fn older_generation_is_rejected_after_a_newer_one() {
	let fx = Fixture::new();
	let v5 = fx.open(5).await;
	let v6 = fx.open(6).await;
	fx.generate(&v6).await;

	let outcomes = fx.server.apply_generation(&v5, output(), &fx.cancel).await.unwrap();
	assert!(outcomes.iter().all(|o| !o.is_applied()));
	assert_eq!(fx.server.ledger().version_of(v6.key()), Some(HostVersion::new(6)));

	let response = fx.server.language_query(fx.query(1, 5), &fx.cancel).await.unwrap();
	assert_eq!(response.host_document_version, HostVersion::new(6));
}

#[tokio::test]
async fn map_ranges_strict_and_inclusive() {
	let fx = Fixture::new();
	let snapshot = fx.open(5).await;
	fx.generate(&snapshot).await;

	let params = MapToDocumentRangesParams {
		kind: LanguageKind::Code,
		razor_document_uri: page_uri(),
		projected_ranges: vec![range(0, 27, 0, 31), range(0, 0, 0, 5), range(0, 25, 0, 29)],
		mapping_behavior: MappingBehavior::Strict,
	};
	let strict = fx.server.map_to_document_ranges(params.clone(), &fx.cancel).await.unwrap();
	assert_eq!(strict.ranges, vec![Some(range(1, 4, 1, 8)), None, None]);
	assert_eq!(strict.host_document_version, HostVersion::new(5));

	let inclusive = fx
		.server
		.map_to_document_ranges(
			MapToDocumentRangesParams {
				mapping_behavior: MappingBehavior::Inclusive,
				..params
			},
			&fx.cancel,
		)
		.await
		.unwrap();
	assert_eq!(inclusive.ranges, vec![Some(range(1, 4, 1, 8)), None, Some(range(1, 4, 1, 6))]);
}

#[tokio::test]
async fn map_ranges_for_razor_is_identity_at_document_version() {
	let fx = Fixture::new();
	let snapshot = fx.open(7).await;
	fx.generate(&snapshot).await;

	let response = fx
		.server
		.map_to_document_ranges(
			MapToDocumentRangesParams {
				kind: LanguageKind::Razor,
				razor_document_uri: page_uri(),
				projected_ranges: vec![range(1, 3, 1, 8)],
				mapping_behavior: MappingBehavior::Strict,
			},
			&fx.cancel,
		)
		.await
		.unwrap();
	assert_eq!(response.ranges, vec![Some(range(1, 3, 1, 8))]);
	assert_eq!(response.host_document_version, HostVersion::new(7));
}

#[tokio::test]
async fn map_edits_translates_and_drops_unmapped() {
	let fx = Fixture::new();
	let snapshot = fx.open(5).await;
	fx.generate(&snapshot).await;

	let response = fx
		.server
		.map_to_document_edits(
			MapToDocumentEditsParams {
				kind: LanguageKind::Code,
				razor_document_uri: page_uri(),
				projected_edits: vec![
					TextEdit::new(range(0, 27, 0, 31), "user".into()),
					TextEdit::new(range(0, 0, 0, 5), "struct".into()),
				],
				text_edit_kind: TextEditKind::Default,
				formatting_options: None,
			},
			&fx.cancel,
		)
		.await
		.unwrap();
	assert_eq!(response.text_edits, vec![TextEdit::new(range(1, 4, 1, 8), "user".into())]);
	assert_eq!(response.host_document_version, HostVersion::new(5));
}

#[tokio::test]
async fn unknown_document_and_missing_artifact_are_not_found() {
	let fx = Fixture::new();

	let err = fx.server.language_query(fx.query(0, 0), &fx.cancel).await.unwrap_err();
	assert!(matches!(err, Error::DocumentNotFound { .. }), "{err}");

	fx.open(1).await;
	let err = fx.server.language_query(fx.query(0, 0), &fx.cancel).await.unwrap_err();
	assert!(matches!(err, Error::ArtifactNotFound { .. }), "{err}");
	assert!(err.is_not_found());
}

#[tokio::test]
async fn position_past_the_document_is_rejected() {
	let fx = Fixture::new();
	let snapshot = fx.open(1).await;
	fx.generate(&snapshot).await;

	let err = fx.server.language_query(fx.query(9, 0), &fx.cancel).await.unwrap_err();
	assert!(matches!(err, Error::PositionOutOfRange(_)), "{err}");
}

#[tokio::test]
async fn non_file_uri_is_rejected() {
	let fx = Fixture::new();
	let params = LanguageQueryParams {
		uri: "untitled:Untitled-1".parse().unwrap(),
		position: Position::new(0, 0),
	};
	let err = fx.server.language_query(params, &fx.cancel).await.unwrap_err();
	assert!(matches!(err, Error::InvalidUri { .. }), "{err}");
}

#[tokio::test]
async fn cancelled_requests_have_no_effect() {
	let fx = Fixture::new();
	let snapshot = fx.open(1).await;
	fx.generate(&snapshot).await;

	let cancelled = CancellationToken::new();
	cancelled.cancel();
	let err = fx.server.language_query(fx.query(1, 5), &cancelled).await.unwrap_err();
	assert!(err.is_cancelled());

	let v2 = DocumentSnapshot::new(PROJECT, PAGE, HostVersion::new(2), SOURCE);
	let err = fx.server.apply_generation(&v2, output(), &cancelled).await.unwrap_err();
	assert!(err.is_cancelled());
	assert_eq!(fx.server.ledger().version_of(snapshot.key()), Some(HostVersion::new(1)));
	let code = fx.server.language_query(fx.query(1, 5), &fx.cancel).await.unwrap();
	assert_eq!(code.host_document_version, HostVersion::new(1));
}

#[tokio::test]
async fn removal_forgets_every_trace_of_the_document() {
	let fx = Fixture::new();
	let snapshot = fx.open(3).await;
	let mut updates = fx.server.subscribe(snapshot.key());
	fx.generate(&snapshot).await;
	assert!(updates.recv().await.is_some());
	assert!(updates.recv().await.is_some());

	let key = DocumentKey::new(PROJECT, PAGE);
	fx.server.document_removed(&key, &fx.cancel).await.unwrap();
	fx.docs.remove(&key);

	assert!(updates.recv().await.is_none());
	assert_eq!(fx.server.ledger().version_of(&key), None);
	assert!(fx.server.store().is_empty());
	let err = fx.server.language_query(fx.query(1, 5), &fx.cancel).await.unwrap_err();
	assert!(matches!(err, Error::DocumentNotFound { .. }));
}

struct Pipeline(Result<GenerationOutput, String>);

#[async_trait]
impl GenerationPipeline for Pipeline {
	async fn generate(&self, _snapshot: &DocumentSnapshot) -> Result<GenerationOutput, String> {
		self.0.clone()
	}
}

#[tokio::test]
async fn regenerate_publishes_pipeline_output() {
	let fx = Fixture::new();
	let snapshot = fx.open(4).await;

	let outcomes = fx.server.regenerate(&snapshot, &Pipeline(Ok(output())), &fx.cancel).await.unwrap();
	assert!(outcomes.iter().all(|o| o.is_applied()));

	let err = fx
		.server
		.regenerate(&snapshot, &Pipeline(Err("syntax error".into())), &fx.cancel)
		.await
		.unwrap_err();
	assert!(matches!(err, Error::Generation { ref message, .. } if message == "syntax error"), "{err}");
}

#[derive(Default)]
struct Recorder(Mutex<Vec<Reconciliation>>);

#[async_trait]
impl ConfigurationReconciler for Recorder {
	async fn reconcile(&self, change: Reconciliation, _cancel: CancellationToken) -> Result<(), String> {
		self.0.lock().push(change);
		Ok(())
	}
}

#[tokio::test(start_paused = true)]
async fn configuration_burst_reconciles_once() {
	let recorder = Arc::new(Recorder::default());
	let fx = Fixture::with(|builder| {
		builder
			.config(SyncConfig::default().with_debounce(Duration::from_millis(250)))
			.reconciler(Arc::clone(&recorder) as _)
	});

	fx.server.monitor_project_configuration_file_path(MonitorProjectConfigurationFilePathParams {
		project_file_path: "proj.csproj".into(),
		configuration_file_path: Some("proj.razor.json".into()),
	});
	for _ in 0..3 {
		assert!(fx.server.configuration_changed(ProjectConfigurationChangeEvent::new("proj.razor.json", ConfigChangeKind::Changed)));
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	fx.server.coalescer().drained().await;

	let calls = recorder.0.lock().clone();
	assert_eq!(calls.len(), 1, "{calls:?}");
	assert_eq!(calls[0].kind, ConfigChangeKind::Changed);
	assert_eq!(calls[0].project, ProjectKey::new("proj.csproj"));
	assert_eq!(calls[0].configuration_path, FilePath::new("proj.razor.json"));

	fx.server.shutdown();
	assert!(!fx.server.configuration_changed(ProjectConfigurationChangeEvent::new("proj.razor.json", ConfigChangeKind::Changed)));
}

#[test]
fn builder_rejects_invalid_configuration() {
	let result = SyncServer::builder(Arc::new(SnapshotSet::new()))
		.config(SyncConfig::default().with_max_concurrent_requests(0))
		.build();
	assert!(result.is_err());
}
