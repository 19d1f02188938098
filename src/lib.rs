//! # History Digest
//!
//! Daily and weekly digests of local browser history.
//!
//! History Digest reads the history databases of Brave, Chrome, Safari, and
//! Firefox through private snapshot copies, normalizes their timestamps,
//! merges everything into one newest-first timeline, recovers search queries
//! from URLs, and classifies each visit by topic and tags.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────┐   ┌──────────┐   ┌────────────┐
//! │   Sources    │──▶│ Snapshot  │──▶│ Timeline │──▶│ Classifier │
//! │ Brave/Chrome │   │ + Reader  │   │  merge   │   │ + Tagger   │
//! │ Safari/FF    │   └───────────┘   └──────────┘   └─────┬──────┘
//! └──────────────┘                                        ▼
//!                                                   ┌──────────┐
//!                                                   │ Markdown │
//!                                                   │ reports  │
//!                                                   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! hdigest sources               # where each browser's history was found
//! hdigest run                   # write today's daily + weekly digests
//! hdigest classify "" --url "https://docs.rs/tokio"
//! hdigest tagger init work      # scaffold a Lua tagger
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`timestamp`] | Native time encodings and UTC conversion |
//! | [`traits`] | `HistorySource` and `Tagger` extension traits |
//! | [`sources`] | Chromium, Safari, and Firefox source implementations |
//! | [`snapshot`] | Temporary copies of live databases |
//! | [`reader`] | Snapshot, query, and normalize one source |
//! | [`timeline`] | Merge and day / range selection |
//! | [`extract`] | Search query extraction from URLs |
//! | [`classify`] | Topic and tag classification |
//! | [`tagger`] | Lua tagging hook |
//! | [`pipeline`] | End-to-end digest run |
//! | [`report`] | Markdown rendering and output files |
//! | [`service`] | macOS LaunchAgent scheduling |

pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
mod lua_runtime;
pub mod models;
pub mod pipeline;
pub mod reader;
pub mod report;
pub mod service;
pub mod snapshot;
pub mod sources;
pub mod tagger;
pub mod timeline;
pub mod timestamp;
pub mod traits;
