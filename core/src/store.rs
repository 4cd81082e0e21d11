//! The backend-agnostic record store contract.
//!
//! [`RecordStore`] is implemented once per storage engine. Migration and
//! export code depends only on this trait, never on engine types, so the
//! same logic runs against the document store and the relational store.
//!
//! All methods take `&mut self`: an adapter instance serves one operation
//! at a time, and each call returns only after the engine has persisted or
//! produced its result.

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use crate::types::{Backend, Record, Table};

/// Operation named in a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Find,
    FindOne,
    Insert,
    Upsert,
    Update,
    Remove,
    Compact,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Find => "find",
            OperationKind::FindOne => "findOne",
            OperationKind::Insert => "insert",
            OperationKind::Upsert => "upsert",
            OperationKind::Update => "update",
            OperationKind::Remove => "remove",
            OperationKind::Compact => "compact",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single table operation failed.
///
/// Carries enough context (backend, table, operation) for callers to log
/// the failure and decide whether to skip the table or abort.
#[derive(Debug, thiserror::Error)]
#[error("{backend} {operation} on table '{table}' failed: {source}")]
pub struct StoreError {
    pub backend: Backend,
    pub table: Table,
    pub operation: OperationKind,
    #[source]
    pub source: Box<dyn StdError + Send + Sync + 'static>,
}

impl StoreError {
    pub fn new(
        backend: Backend,
        table: Table,
        operation: OperationKind,
        source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            backend,
            table,
            operation,
            source: source.into(),
        }
    }
}

/// A store operation with its arguments, for uniform dispatch through
/// [`RecordStore::execute`].
#[derive(Debug, Clone)]
pub enum Operation {
    Find(Record),
    FindOne(Record),
    Insert(Record),
    Upsert(Record),
    Update {
        query: Record,
        changes: Record,
        multi: bool,
    },
    Remove {
        query: Record,
        multi: bool,
    },
    Compact,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Find(_) => OperationKind::Find,
            Operation::FindOne(_) => OperationKind::FindOne,
            Operation::Insert(_) => OperationKind::Insert,
            Operation::Upsert(_) => OperationKind::Upsert,
            Operation::Update { .. } => OperationKind::Update,
            Operation::Remove { .. } => OperationKind::Remove,
            Operation::Compact => OperationKind::Compact,
        }
    }
}

/// Result of [`RecordStore::execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Records(Vec<Record>),
    Record(Option<Record>),
    Written(Record),
    Count(usize),
    Done,
}

/// Uniform record access over one storage backend.
pub trait RecordStore {
    /// Which engine this adapter talks to.
    fn backend(&self) -> Backend;

    /// On-disk location backing `table`. Deterministic for a given context.
    fn location(&self, table: Table) -> PathBuf;

    /// Returns every record matching `query`, in storage order.
    fn find(&mut self, table: Table, query: &Record) -> Result<Vec<Record>, StoreError>;

    /// Returns the first record matching `query`.
    fn find_one(&mut self, table: Table, query: &Record) -> Result<Option<Record>, StoreError>;

    /// Inserts a new record, generating `_id` when absent.
    ///
    /// Fails when a record with the same `_id` already exists.
    fn insert(&mut self, table: Table, record: Record) -> Result<Record, StoreError>;

    /// Inserts or replaces the record with the same `_id`.
    fn upsert(&mut self, table: Table, record: Record) -> Result<Record, StoreError>;

    /// Applies `changes` to the first matching record, or to all of them
    /// when `multi` is set. Returns the number of records updated.
    fn update(
        &mut self,
        table: Table,
        query: &Record,
        changes: &Record,
        multi: bool,
    ) -> Result<usize, StoreError>;

    /// Removes the first matching record, or all of them when `multi` is
    /// set. Returns the number of records removed.
    fn remove(&mut self, table: Table, query: &Record, multi: bool) -> Result<usize, StoreError>;

    /// Maintenance hint: rewrite storage for `table` compactly.
    /// Not required for correctness.
    fn compact(&mut self, table: Table) -> Result<(), StoreError>;

    /// Runs `operation` against `table`.
    fn execute(&mut self, table: Table, operation: Operation) -> Result<Outcome, StoreError> {
        match operation {
            Operation::Find(query) => self.find(table, &query).map(Outcome::Records),
            Operation::FindOne(query) => self.find_one(table, &query).map(Outcome::Record),
            Operation::Insert(record) => self.insert(table, record).map(Outcome::Written),
            Operation::Upsert(record) => self.upsert(table, record).map(Outcome::Written),
            Operation::Update {
                query,
                changes,
                multi,
            } => self
                .update(table, &query, &changes, multi)
                .map(Outcome::Count),
            Operation::Remove { query, multi } => {
                self.remove(table, &query, multi).map(Outcome::Count)
            }
            Operation::Compact => self.compact(table).map(|()| Outcome::Done),
        }
    }
}
