//! Session-scoped sync context and the protocol operations it answers.
//!
//! [`SyncServer`] owns the ledger, the artifact store, the request queue and the
//! configuration coalescer for one server session. Nothing here is global:
//! two servers in one process share no state.

use std::sync::Arc;

use tandem_primitives::{
	ArtifactKind, DocumentKey, FilePath, HostVersion, LanguageKind, PositionError, ProjectKey, char_to_position, path_from_uri,
	position_to_char,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::coalescer::{
	ConfigurationCoalescer, ConfigurationReconciler, ConfigurationWatcher, NullReconciler, NullWatcher, ProjectConfigurationChangeEvent,
};
use crate::config::{ConfigError, SyncConfig};
use crate::ledger::VersionLedger;
use crate::mapping::{Projection, ProjectionMap};
use crate::protocol::{
	Freshness, LanguageQueryParams, LanguageQueryResponse, MapToDocumentEditsParams, MapToDocumentEditsResponse, MapToDocumentRangesParams,
	MapToDocumentRangesResponse, MonitorProjectConfigurationFilePathParams,
};
use crate::queue::RequestQueue;
use crate::snapshot::{DocumentResolver, DocumentSnapshot, GenerationOutput, GenerationPipeline};
use crate::store::{ArtifactReceiver, ArtifactStore, GeneratedArtifact, PublishOutcome};
use crate::{Error, Result};

/// Builder for [`SyncServer`].
pub struct SyncServerBuilder {
	config: SyncConfig,
	resolver: Arc<dyn DocumentResolver>,
	reconciler: Arc<dyn ConfigurationReconciler>,
	watcher: Arc<dyn ConfigurationWatcher>,
}

impl SyncServerBuilder {
	pub fn config(mut self, config: SyncConfig) -> Self {
		self.config = config;
		self
	}

	pub fn reconciler(mut self, reconciler: Arc<dyn ConfigurationReconciler>) -> Self {
		self.reconciler = reconciler;
		self
	}

	pub fn watcher(mut self, watcher: Arc<dyn ConfigurationWatcher>) -> Self {
		self.watcher = watcher;
		self
	}

	/// Validates the configuration and assembles the server.
	pub fn build(self) -> Result<SyncServer, ConfigError> {
		self.config.validate()?;
		let config = self.config;
		Ok(SyncServer {
			ledger: VersionLedger::new(config.ledger_purge_interval),
			store: ArtifactStore::new(config.subscriber_buffer),
			queue: RequestQueue::new(config.max_concurrent_requests),
			coalescer: ConfigurationCoalescer::new(config.debounce(), self.reconciler, self.watcher),
			resolver: self.resolver,
			config,
		})
	}
}

/// Versioned cross-document sync context for one server session.
pub struct SyncServer {
	config: SyncConfig,
	ledger: VersionLedger,
	store: ArtifactStore,
	queue: RequestQueue,
	coalescer: ConfigurationCoalescer,
	resolver: Arc<dyn DocumentResolver>,
}

impl std::fmt::Debug for SyncServer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SyncServer")
			.field("config", &self.config)
			.field("ledger_entries", &self.ledger.len())
			.field("documents", &self.store.len())
			.field("coalescer", &self.coalescer)
			.finish()
	}
}

impl SyncServer {
	/// Starts a builder resolving documents through `resolver`.
	pub fn builder(resolver: Arc<dyn DocumentResolver>) -> SyncServerBuilder {
		SyncServerBuilder {
			config: SyncConfig::default(),
			resolver,
			reconciler: Arc::new(NullReconciler),
			watcher: Arc::new(NullWatcher),
		}
	}

	pub fn config(&self) -> &SyncConfig {
		&self.config
	}

	pub fn ledger(&self) -> &VersionLedger {
		&self.ledger
	}

	pub fn store(&self) -> &ArtifactStore {
		&self.store
	}

	pub fn coalescer(&self) -> &ConfigurationCoalescer {
		&self.coalescer
	}

	/// Records a new document version. Queries ordered after this observe it.
	pub async fn document_changed(&self, snapshot: &Arc<DocumentSnapshot>, cancel: &CancellationToken) -> Result<()> {
		self.queue.mutate(snapshot.key(), cancel, || self.ledger.track_version(snapshot)).await?;
		debug!(path = %snapshot.path(), version = %snapshot.version(), "sync.document.changed");
		Ok(())
	}

	/// Publishes both artifacts of a finished generation for `snapshot`.
	///
	/// Queries on the document see both artifacts replaced together. Older
	/// generations are rejected per artifact by the store.
	pub async fn apply_generation(
		&self,
		snapshot: &Arc<DocumentSnapshot>,
		output: GenerationOutput,
		cancel: &CancellationToken,
	) -> Result<[PublishOutcome; 2]> {
		let map = Arc::new(ProjectionMap::new(snapshot.text().clone(), output.mappings, output.segments));
		let artifact = |kind, text| {
			Arc::new(GeneratedArtifact {
				project: snapshot.project().clone(),
				path: snapshot.path().clone(),
				kind,
				text,
				host_version: snapshot.version(),
				map: Arc::clone(&map),
			})
		};
		let code = artifact(ArtifactKind::Code, output.code);
		let markup = artifact(ArtifactKind::Markup, output.markup);

		self.queue
			.mutate(snapshot.key(), cancel, || {
				match self.ledger.version_of(snapshot.key()) {
					Some(tracked) if tracked >= snapshot.version() => {}
					_ => self.ledger.track_version(snapshot),
				}
				[self.store.publish(code), self.store.publish(markup)]
			})
			.await
	}

	/// Runs the generation pipeline for `snapshot` and publishes the result.
	///
	/// The pipeline runs outside the document's critical section.
	pub async fn regenerate(
		&self,
		snapshot: &Arc<DocumentSnapshot>,
		pipeline: &dyn GenerationPipeline,
		cancel: &CancellationToken,
	) -> Result<[PublishOutcome; 2]> {
		let output = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(Error::Cancelled),
			output = pipeline.generate(snapshot) => output.map_err(|message| Error::Generation {
				path: snapshot.path().clone(),
				message,
			})?,
		};
		self.apply_generation(snapshot, output, cancel).await
	}

	/// Forgets a document removed from its project.
	pub async fn document_removed(&self, key: &DocumentKey, cancel: &CancellationToken) -> Result<()> {
		self.queue
			.mutate(key, cancel, || {
				self.ledger.remove(key);
				self.store.remove_document(key);
			})
			.await?;
		self.queue.forget(key);
		info!(path = %key.path, project = %key.project, "sync.document.removed");
		Ok(())
	}

	/// Subscribes to artifacts published for a document.
	pub fn subscribe(&self, key: &DocumentKey) -> ArtifactReceiver {
		self.store.subscribe(key)
	}

	/// Classifies a logical position and returns its generated-space coordinates.
	pub async fn language_query(&self, params: LanguageQueryParams, cancel: &CancellationToken) -> Result<LanguageQueryResponse> {
		let snapshot = self.resolve(&params.uri)?;
		self.queue
			.query(snapshot.key(), cancel, || self.answer_language_query(&snapshot, params.position))
			.await?
	}

	fn answer_language_query(&self, snapshot: &Arc<DocumentSnapshot>, position: lsp_types::Position) -> Result<LanguageQueryResponse> {
		let encoding = self.config.offset_encoding;
		let tracked = self.ledger.try_get_version(snapshot);
		let code = self.artifact(snapshot, ArtifactKind::Code)?;
		let map = &code.map;
		let offset = position_to_char(map.source(), position, encoding)?;

		let (kind, index, position, version) = match map.classify(offset) {
			LanguageKind::Code => {
				let index = map.to_generated(LanguageKind::Code, offset).ok_or(PositionError::OffsetOutOfRange {
					offset,
					len: map.source().len_chars(),
				})?;
				(LanguageKind::Code, index, char_to_position(&code.text, index, encoding)?, code.host_version)
			}
			LanguageKind::Markup => {
				let markup = self.artifact(snapshot, ArtifactKind::Markup)?;
				(LanguageKind::Markup, offset, char_to_position(&markup.text, offset, encoding)?, markup.host_version)
			}
			// Identity against the logical text this generation was built from.
			LanguageKind::Razor => (LanguageKind::Razor, offset, position, code.host_version),
		};

		let freshness = Freshness::compare(version, tracked);
		debug!(path = %snapshot.path(), ?kind, %version, ?freshness, "sync.language_query");
		Ok(LanguageQueryResponse {
			kind,
			position_index: index,
			position,
			host_document_version: version,
			freshness,
		})
	}

	/// Translates generated-space ranges back onto the logical document.
	pub async fn map_to_document_ranges(
		&self,
		params: MapToDocumentRangesParams,
		cancel: &CancellationToken,
	) -> Result<MapToDocumentRangesResponse> {
		let snapshot = self.resolve(&params.razor_document_uri)?;
		self.queue
			.query(snapshot.key(), cancel, || {
				let (ranges, version) = self.project(&snapshot, params.kind, |projection| {
					params
						.projected_ranges
						.iter()
						.map(|range| projection.map_range(*range, params.mapping_behavior))
						.collect::<Vec<_>>()
				})?;
				let freshness = Freshness::compare(version, self.ledger.try_get_version(&snapshot));
				debug!(
					path = %snapshot.path(),
					kind = ?params.kind,
					requested = params.projected_ranges.len(),
					unmapped = ranges.iter().filter(|r| r.is_none()).count(),
					%version,
					?freshness,
					"sync.map_ranges"
				);
				Ok(MapToDocumentRangesResponse {
					ranges,
					host_document_version: version,
					freshness,
				})
			})
			.await?
	}

	/// Translates generated-space edits back onto the logical document.
	pub async fn map_to_document_edits(&self, params: MapToDocumentEditsParams, cancel: &CancellationToken) -> Result<MapToDocumentEditsResponse> {
		let snapshot = self.resolve(&params.razor_document_uri)?;
		self.queue
			.query(snapshot.key(), cancel, || {
				let (text_edits, version) = self.project(&snapshot, params.kind, |projection| {
					projection.map_edits(&params.projected_edits, params.text_edit_kind, params.formatting_options.as_ref())
				})?;
				let freshness = Freshness::compare(version, self.ledger.try_get_version(&snapshot));
				debug!(
					path = %snapshot.path(),
					kind = ?params.kind,
					edit_kind = ?params.text_edit_kind,
					requested = params.projected_edits.len(),
					mapped = text_edits.len(),
					%version,
					?freshness,
					"sync.map_edits"
				);
				Ok(MapToDocumentEditsResponse {
					text_edits,
					host_document_version: version,
					freshness,
				})
			})
			.await?
	}

	/// Registers (or clears) the configuration file monitored for a project.
	pub fn monitor_project_configuration_file_path(&self, params: MonitorProjectConfigurationFilePathParams) {
		let project = ProjectKey::new(&params.project_file_path);
		self.coalescer.monitor(project, params.configuration_file_path.map(FilePath::new));
	}

	/// Feeds a configuration file change into the coalescer.
	pub fn configuration_changed(&self, event: ProjectConfigurationChangeEvent) -> bool {
		self.coalescer.notify(event)
	}

	/// Stops configuration monitoring and cancels in-flight reconciliations.
	pub fn shutdown(&self) {
		self.coalescer.shutdown();
	}

	fn resolve(&self, uri: &lsp_types::Uri) -> Result<Arc<DocumentSnapshot>> {
		let path = path_from_uri(uri).ok_or_else(|| Error::InvalidUri {
			uri: uri.as_str().to_string(),
		})?;
		self.resolver.resolve(&path).ok_or(Error::DocumentNotFound { path })
	}

	fn artifact(&self, snapshot: &DocumentSnapshot, kind: ArtifactKind) -> Result<Arc<GeneratedArtifact>> {
		self.store.get(snapshot.key(), kind).ok_or_else(|| Error::ArtifactNotFound {
			path: snapshot.path().clone(),
			kind,
		})
	}

	/// Runs `f` against the projection for `kind` and returns the version it was computed against.
	fn project<T>(&self, snapshot: &DocumentSnapshot, kind: LanguageKind, f: impl FnOnce(&Projection<'_>) -> T) -> Result<(T, HostVersion)> {
		let encoding = self.config.offset_encoding;
		match kind.artifact() {
			None => Ok((f(&Projection::identity(snapshot.text(), encoding)), snapshot.version())),
			Some(kind) => {
				let artifact = self.artifact(snapshot, kind)?;
				Ok((f(&Projection::artifact(&artifact, encoding)), artifact.host_version))
			}
		}
	}
}
