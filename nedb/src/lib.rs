//! NeDB document-store adapter for electerm v1 data.
//!
//! electerm 1.x kept each collection in its own NeDB datafile: an
//! append-only log of JSON documents, one per line, under
//! `<dataRoot>/<namespace>/users/<user>/electerm.<table>.nedb`.
//!
//! This crate reads and writes that format directly:
//!
//! - **`datafile`**: parsing, corruption checks, and line serialization
//! - **`store`**: [`NedbStore`], the
//!   [`RecordStore`](electerm_data_core::RecordStore) implementation
//!
//! # Quick start
//!
//! ```no_run
//! use electerm_data_core::{AppContext, AppType, Record, RecordStore, Table};
//! use electerm_data_nedb::NedbStore;
//!
//! let ctx = AppContext::new(AppType::Desktop, "/home/me/.config");
//! let mut store = NedbStore::new(ctx);
//! let bookmarks = store.find(Table::Bookmarks, &Record::new()).unwrap();
//! println!("{} bookmarks", bookmarks.len());
//! ```
//!
//! Reads never create files or directories; only writes and
//! [`compact`](electerm_data_core::RecordStore::compact) touch the disk.

mod datafile;
mod error;
mod store;

pub use datafile::{CORRUPT_ALERT_THRESHOLD, Datafile, deserialize_dates};
pub use error::{NedbError, Result};
pub use store::{NedbStore, data_files_exist, datafile_path};
