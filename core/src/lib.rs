//! Core record model and storage contract for electerm user data.
//!
//! This crate defines the pieces shared by both storage backends and by the
//! export tooling:
//!
//! - [`Table`]: the fixed set of ten logical collections.
//! - [`Record`]: a schema-less JSON object keyed by its `_id` field.
//! - [`codec`]: the reversible `password`/`passwordEncrypted` obfuscation.
//! - [`AppContext`]: immutable description of where user data lives.
//! - [`RecordStore`]: the uniform operation contract implemented once per
//!   backend (document store and relational store).
//! - [`export_all`]: builds a decoded [`Snapshot`] through any
//!   [`RecordStore`].
//!
//! # Example
//!
//! ```
//! use electerm_data_core::{Table, codec};
//! use serde_json::json;
//!
//! assert_eq!(Table::ALL.len(), 10);
//! assert_eq!("bookmarkGroups".parse::<Table>().unwrap(), Table::BookmarkGroups);
//!
//! let mut record = json!({ "_id": "b1", "password": "secret" })
//!     .as_object()
//!     .cloned()
//!     .unwrap();
//! codec::apply_to_record(&mut record);
//! assert_eq!(record["passwordEncrypted"], json!(true));
//! codec::remove_from_record(&mut record);
//! assert_eq!(record["password"], json!("secret"));
//! ```

pub mod codec;
mod config;
mod context;
mod error;
mod export;
mod query;
mod store;
mod types;

pub use config::{APP_PATH_ENV, ToolConfig, default_app_path};
pub use context::{AppContext, AppType, DEFAULT_USER};
pub use error::{CoreError, Result};
pub use export::{Snapshot, TableCount, export_all, table_counts};
pub use query::{apply_update, matches};
pub use store::{Operation, OperationKind, Outcome, RecordStore, StoreError};
pub use types::*;
