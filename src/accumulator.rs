// src/accumulator.rs
//
// Lock-guarded per-item accumulators written by concurrent transfer workers.
//
// Each worker writes exactly one entry, into either a BulkResult (success) or
// a BulkError (failure). Both are shared through `Arc` while workers run and
// are unwrapped out of the `Arc` once the orchestrator has joined them all,
// so reads never overlap writes.

use anyhow::Error as AnyError;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

// A panicking worker must not make the accumulator unreadable for the others.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// -----------------------------------------------------------------------------
// Success side
// -----------------------------------------------------------------------------

/// Downloaded objects keyed by object name.
#[derive(Debug, Default)]
pub struct BulkResult {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl BulkResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful transfer. A repeated name overwrites the earlier entry.
    pub fn add_success(&self, name: impl Into<String>, data: Bytes) {
        lock(&self.objects).insert(name.into(), data);
    }

    // Move the entries out from under the lock, leaving this accumulator empty.
    pub(crate) fn take(&self) -> Self {
        Self {
            objects: Mutex::new(std::mem::take(&mut *lock(&self.objects))),
        }
    }

    /// Consume the accumulator once no worker holds a reference any more.
    pub fn into_map(self) -> HashMap<String, Bytes> {
        self.objects
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, name: &str) -> Option<Bytes> {
        lock(&self.objects).get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.objects).contains_key(name)
    }

    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Object names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.objects).keys().cloned().collect();
        names.sort();
        names
    }

    /// Total payload bytes held.
    pub fn total_bytes(&self) -> u64 {
        lock(&self.objects).values().map(|b| b.len() as u64).sum()
    }
}

impl IntoIterator for BulkResult {
    type Item = (String, Bytes);
    type IntoIter = std::collections::hash_map::IntoIter<String, Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_map().into_iter()
    }
}

// -----------------------------------------------------------------------------
// Failure side
// -----------------------------------------------------------------------------

/// Aggregate of per-item failures from one bulk call.
///
/// Displays as the fixed message followed by a key-sorted, indented JSON
/// object of `name -> reason`. That rendering is the error text callers see.
pub struct BulkError {
    message: String,
    failures: Mutex<BTreeMap<String, AnyError>>,
}

impl BulkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            failures: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record a failed transfer. A repeated name overwrites the earlier reason.
    pub fn add_failure(&self, name: impl Into<String>, reason: AnyError) {
        lock(&self.failures).insert(name.into(), reason);
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn len(&self) -> usize {
        lock(&self.failures).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.failures).contains_key(name)
    }

    /// Names of the failed items, sorted.
    pub fn failed_names(&self) -> Vec<String> {
        lock(&self.failures).keys().cloned().collect()
    }

    /// Rendered reason (full context chain) for one failed item.
    pub fn reason(&self, name: &str) -> Option<String> {
        lock(&self.failures).get(name).map(|e| format!("{e:#}"))
    }

    /// `name -> rendered reason`, sorted by name.
    pub fn reasons(&self) -> BTreeMap<String, String> {
        lock(&self.failures)
            .iter()
            .map(|(name, e)| (name.clone(), format!("{e:#}")))
            .collect()
    }

    pub(crate) fn take(&self) -> Self {
        Self {
            message: self.message.clone(),
            failures: Mutex::new(std::mem::take(&mut *lock(&self.failures))),
        }
    }

    /// Take ownership of the underlying errors.
    pub fn into_failures(self) -> BTreeMap<String, AnyError> {
        self.failures
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Display for BulkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dump = serde_json::to_string_pretty(&self.reasons()).map_err(|_| fmt::Error)?;
        write!(f, "{}\n{}", self.message, dump)
    }
}

impl fmt::Debug for BulkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkError")
            .field("message", &self.message)
            .field("failures", &self.reasons())
            .finish()
    }
}

impl std::error::Error for BulkError {}
