//! Tea inventory ledger over markdown notes.
//!
//! Notes live in a SQLite store ([`Database`], [`NoteService`]). The
//! [`tea`] engine reads them as a [`store::NoteMap`] snapshot and writes
//! consumption, reserve and purchase reports back into report notes.

pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod service;
pub mod store;
pub mod tag_query;
pub mod tea;
pub mod title;
pub mod utils;

pub use config::{Config, EngineConfig};
pub use db::Database;
pub use models::{Note, NoteBuilder, NoteKey, Period, TagKind};
pub use service::NoteService;
pub use store::{EventSink, NoteMap, NoteStore, StoreEvent, WriteBatch};
pub use tag_query::TagQuery;
pub use tea::ReportError;
