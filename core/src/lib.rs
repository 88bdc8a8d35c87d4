//! Tether keeps a local, queryable index of documents that live in an external,
//! permission-gated store, and reconciles the two.
//!
//! The crate is organized around two capabilities and one coordinator:
//!
//! *   [`store::DocumentStore`]: reads, writes and lists documents at the provider.
//! *   [`index::Index`]: the local record of linked documents, trees and labels.
//! *   [`engine::Engine`]: links files and directories without creating duplicates,
//!     refreshes the index on sync, and cleans up what disappeared.
//!
//! ```no_run
//! use tether_core::engine::Engine;
//! use tether_core::index::MemoryIndex;
//! use tether_core::store::FsStore;
//! use tether_core::uri::Uri;
//!
//! # async fn example() -> tether_core::Result<()> {
//! let engine = Engine::new(FsStore::new(), MemoryIndex::new());
//! let import = engine.link_tree(&Uri::from_file_path("/home/me/notes")?).await?;
//! println!("{} documents", import.documents.len());
//! let report = engine.sync_all().await?;
//! println!("{} refreshed", report.refreshed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod model;
pub mod notice;
pub mod store;
pub mod uri;

mod persist;

pub use error::{Error, Result};
