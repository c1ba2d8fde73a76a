#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Versioned cross-document sync for templated documents.
//!
//! A logical document (markup interleaved with embedded code) is backed by two
//! generated artifacts: a Code buffer and a Markup buffer. This crate keeps
//! them consistent with the host's document versions and answers the position
//! and edit mapping requests that cross between the three coordinate spaces.
//!
//! * [`ledger`] tracks the host version of each live document snapshot.
//! * [`store`] holds the current artifacts and rejects out-of-order publishes.
//! * [`mapping`] classifies logical positions and maps ranges and edits.
//! * [`queue`] orders queries and mutations per document.
//! * [`coalescer`] debounces configuration file changes per path.
//! * [`server`] ties them into the protocol operations in [`protocol`].

mod config;
mod error;

pub mod coalescer;
pub mod ledger;
pub mod mapping;
pub mod protocol;
pub mod queue;
pub mod server;
pub mod snapshot;
pub mod store;

pub use config::{ConfigError, SyncConfig};
pub use error::{Error, Result};
pub use protocol::{Freshness, Versioned};
pub use server::{SyncServer, SyncServerBuilder};
pub use snapshot::{DocumentResolver, DocumentSnapshot, GenerationOutput, GenerationPipeline, SnapshotSet};
