//! Tunables for the sync layer, loadable from TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tandem_primitives::OffsetEncoding;
use thiserror::Error;

/// Error loading or validating a [`SyncConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// TOML syntax or schema error.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// A value is syntactically valid but unusable.
	#[error("invalid configuration: {0}")]
	Invalid(String),
}

/// Sync-layer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SyncConfig {
	/// Debounce window for configuration change bursts, in milliseconds.
	pub debounce_ms: u64,
	/// Requests admitted into the execution queue at once.
	pub max_concurrent_requests: usize,
	/// Notifications buffered per artifact subscriber before it is detached.
	pub subscriber_buffer: usize,
	/// Ledger writes between dead-entry sweeps; 0 disables periodic sweeps.
	pub ledger_purge_interval: usize,
	/// Unit of protocol position columns.
	pub offset_encoding: OffsetEncoding,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			debounce_ms: 250,
			max_concurrent_requests: 16,
			subscriber_buffer: 64,
			ledger_purge_interval: 64,
			offset_encoding: OffsetEncoding::Utf16,
		}
	}
}

impl SyncConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads, parses, and validates a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}

	/// Rejects capacities that would stall the layer.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_concurrent_requests == 0 {
			return Err(ConfigError::Invalid("max-concurrent-requests must be at least 1".into()));
		}
		if self.subscriber_buffer == 0 {
			return Err(ConfigError::Invalid("subscriber-buffer must be at least 1".into()));
		}
		Ok(())
	}

	/// Returns the debounce window.
	pub fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}

	pub fn with_debounce(mut self, debounce: Duration) -> Self {
		self.debounce_ms = debounce.as_millis() as u64;
		self
	}

	pub fn with_max_concurrent_requests(mut self, permits: usize) -> Self {
		self.max_concurrent_requests = permits;
		self
	}

	pub fn with_subscriber_buffer(mut self, capacity: usize) -> Self {
		self.subscriber_buffer = capacity;
		self
	}

	pub fn with_ledger_purge_interval(mut self, writes: usize) -> Self {
		self.ledger_purge_interval = writes;
		self
	}

	pub fn with_offset_encoding(mut self, encoding: OffsetEncoding) -> Self {
		self.offset_encoding = encoding;
		self
	}
}
