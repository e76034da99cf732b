//! Transactional document store collaborator for the Moim attendance core.
//!
//! The production app keeps these documents in a hosted document database;
//! this crate provides the same contract as an in-process store so the
//! attendance and settlement layers can be exercised against it directly:
//! document read/write by path, collection queries with field predicates,
//! and optimistic read-modify-write transactions. Every concurrent writer
//! to a shared document (attendance commit, settlement) must go through
//! [`DocumentStore::run_transaction`]; blind overwrites of shared documents
//! are a correctness bug at the call site.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, trace};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

mod error;
mod models;
pub mod paths;
mod query;

pub use error::StoreError;
pub use models::{
    CheckinSession, MeetingAttendanceRecord, PresenceRecord, StudyDocument, UserRewardProfile,
};
pub use query::{FilterOp, QueryBuilder};

/// How many times a transaction body is re-run before giving up.
const MAX_TRANSACTION_ATTEMPTS: u32 = 8;

#[derive(Debug)]
struct VersionedDocument {
    version: u64,
    data: Value,
}

/// Cloneable handle to the shared document store.
///
/// Documents live under slash-separated paths alternating collection and
/// document ids (`studies/S1/members/U1`), so a document path always has an
/// even number of segments and a collection path an odd number.
#[derive(Clone, Default)]
pub struct DocumentStore {
    inner: Arc<RwLock<BTreeMap<String, VersionedDocument>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a document by path. `Ok(None)` if it does not exist.
    pub async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        validate_path(path, PathKind::Document)?;
        Ok(self.read_map().get(path).map(|doc| doc.data.clone()))
    }

    /// Read a document and deserialize it into a typed model.
    pub async fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StoreError> {
        match self.get(path).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Write a document, creating it if absent.
    pub async fn set<T: Serialize>(&self, path: &str, value: &T) -> Result<(), StoreError> {
        validate_path(path, PathKind::Document)?;
        let data = serde_json::to_value(value)?;
        let mut map = self.write_map();
        let entry = map.entry(path.to_string()).or_insert(VersionedDocument {
            version: 0,
            data: Value::Null,
        });
        entry.version += 1;
        entry.data = data;
        trace!("set {} (v{})", path, entry.version);
        Ok(())
    }

    /// Delete a document. Deleting an absent document is a no-op.
    pub async fn delete(&self, path: &str) -> Result<(), StoreError> {
        validate_path(path, PathKind::Document)?;
        self.write_map().remove(path);
        Ok(())
    }

    /// Enumerate the direct child documents of a collection as
    /// `(document id, value)` pairs, in ascending id order.
    ///
    /// Enumeration order is deterministic per run, which the settlement job
    /// relies on for reproducible processing order.
    pub async fn list_collection(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        validate_path(collection, PathKind::Collection)?;
        let prefix = format!("{}/", collection);
        let map = self.read_map();
        Ok(map
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter(|(path, _)| !path[prefix.len()..].contains('/'))
            .map(|(path, doc)| (path[prefix.len()..].to_string(), doc.data.clone()))
            .collect())
    }

    /// Start a filtered query over the direct children of a collection.
    pub fn collection(&self, path: &str) -> QueryBuilder<'_> {
        QueryBuilder::new(self, path)
    }

    /// Run an optimistic read-modify-write transaction.
    ///
    /// The body may run more than once: reads record the version of every
    /// document they observe, writes are buffered, and commit validates the
    /// observed versions under the write lock. On a conflict the body is
    /// re-run against fresh state; after [`MAX_TRANSACTION_ATTEMPTS`] losses
    /// the transaction fails with [`StoreError::Conflict`]. Callers must not
    /// add their own retry on top.
    pub async fn run_transaction<R, F>(&self, mut body: F) -> Result<R, StoreError>
    where
        F: FnMut(&mut Transaction<'_>) -> Result<R, StoreError>,
    {
        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let mut tx = Transaction {
                store: self,
                reads: BTreeMap::new(),
                writes: BTreeMap::new(),
            };
            let output = body(&mut tx)?;

            let mut map = self.write_map();
            let conflicted = tx.reads.iter().any(|(path, observed)| {
                map.get(path).map(|doc| doc.version).unwrap_or(0) != *observed
            });
            if conflicted {
                drop(map);
                debug!("transaction conflict, retrying (attempt {})", attempt);
                continue;
            }
            for (path, write) in tx.writes {
                match write {
                    Some(data) => {
                        let entry = map.entry(path).or_insert(VersionedDocument {
                            version: 0,
                            data: Value::Null,
                        });
                        entry.version += 1;
                        entry.data = data;
                    }
                    None => {
                        map.remove(&path);
                    }
                }
            }
            return Ok(output);
        }
        Err(StoreError::Conflict)
    }

    fn read_map(&self) -> RwLockReadGuard<'_, BTreeMap<String, VersionedDocument>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_map(&self) -> RwLockWriteGuard<'_, BTreeMap<String, VersionedDocument>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// In-flight transaction handle passed to the body of
/// [`DocumentStore::run_transaction`].
pub struct Transaction<'a> {
    store: &'a DocumentStore,
    /// path -> document version observed at read time (0 = absent).
    reads: BTreeMap<String, u64>,
    /// path -> buffered write (`None` = delete).
    writes: BTreeMap<String, Option<Value>>,
}

impl Transaction<'_> {
    /// Read a document inside the transaction. Reads-your-writes within the
    /// same transaction body.
    pub fn get(&mut self, path: &str) -> Result<Option<Value>, StoreError> {
        validate_path(path, PathKind::Document)?;
        if let Some(buffered) = self.writes.get(path) {
            return Ok(buffered.clone());
        }
        let map = self.store.read_map();
        match map.get(path) {
            Some(doc) => {
                self.reads.insert(path.to_string(), doc.version);
                Ok(Some(doc.data.clone()))
            }
            None => {
                self.reads.insert(path.to_string(), 0);
                Ok(None)
            }
        }
    }

    /// Typed read inside the transaction.
    pub fn get_as<T: DeserializeOwned>(&mut self, path: &str) -> Result<Option<T>, StoreError> {
        match self.get(path)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Buffer a write; applied atomically on commit.
    pub fn set<T: Serialize>(&mut self, path: &str, value: &T) -> Result<(), StoreError> {
        validate_path(path, PathKind::Document)?;
        self.writes
            .insert(path.to_string(), Some(serde_json::to_value(value)?));
        Ok(())
    }

    /// Buffer a delete; applied atomically on commit.
    pub fn delete(&mut self, path: &str) -> Result<(), StoreError> {
        validate_path(path, PathKind::Document)?;
        self.writes.insert(path.to_string(), None);
        Ok(())
    }
}

enum PathKind {
    Document,
    Collection,
}

fn validate_path(path: &str, kind: PathKind) -> Result<(), StoreError> {
    if path.is_empty() || path.split('/').any(|segment| segment.is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    let segments = path.split('/').count();
    match kind {
        PathKind::Document if segments % 2 != 0 => {
            Err(StoreError::InvalidPath(format!("{} is not a document path", path)))
        }
        PathKind::Collection if segments % 2 == 0 => {
            Err(StoreError::InvalidPath(format!("{} is not a collection path", path)))
        }
        _ => Ok(()),
    }
}
