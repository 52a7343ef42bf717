//! In-memory record source for tests and dry runs.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use secrecy::SecretString;

use super::error::{Result, SourceError};
use super::{RecordPage, RecordSource, SourceRecord};

/// Scripted record source serving pages out of a fixed record list.
///
/// Cursors are plain indexes into the list, so pagination behaves like a
/// real source without any I/O. Failures can be injected for queries and
/// for individual archive ids, and call counters let callers assert how
/// far a sweep actually got.
#[derive(Default)]
pub struct MemorySource {
    records: Vec<SourceRecord>,
    query_failure: Mutex<Option<String>>,
    archive_failures: Mutex<HashSet<String>>,
    archived: Mutex<Vec<String>>,
    query_calls: AtomicUsize,
    archive_calls: AtomicUsize,
}

fn lock_or_recover<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("MemorySource {} lock was poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}

impl MemorySource {
    pub fn new(records: Vec<SourceRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    /// Makes every subsequent `query_page` call fail with `message`.
    pub fn fail_queries_with(&self, message: impl Into<String>) {
        *lock_or_recover(&self.query_failure, "query_failure") = Some(message.into());
    }

    /// Makes `archive_record` fail for the given record id.
    pub fn fail_archive_of(&self, record_id: impl Into<String>) {
        lock_or_recover(&self.archive_failures, "archive_failures").insert(record_id.into());
    }

    /// Number of `query_page` calls served so far.
    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    /// Number of `archive_record` calls served so far.
    pub fn archive_calls(&self) -> usize {
        self.archive_calls.load(Ordering::SeqCst)
    }

    /// Ids successfully archived, in completion order.
    pub fn archived(&self) -> Vec<String> {
        lock_or_recover(&self.archived, "archived").clone()
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn query_page(
        &self,
        _credential: &SecretString,
        _source_id: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<RecordPage> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = lock_or_recover(&self.query_failure, "query_failure").clone() {
            return Err(SourceError::Unreachable(message));
        }

        let start = match cursor {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| SourceError::Decode(format!("invalid cursor '{}'", raw)))?,
            None => 0,
        };
        let end = (start + page_size as usize).min(self.records.len());
        let has_more = end < self.records.len();

        Ok(RecordPage {
            records: self.records[start.min(end)..end].to_vec(),
            next_cursor: has_more.then(|| end.to_string()),
            has_more,
        })
    }

    async fn archive_record(&self, _credential: &SecretString, record_id: &str) -> Result<()> {
        self.archive_calls.fetch_add(1, Ordering::SeqCst);

        if lock_or_recover(&self.archive_failures, "archive_failures").contains(record_id) {
            return Err(SourceError::RequestFailed {
                status: 409,
                body: format!("record '{}' cannot be archived", record_id),
            });
        }

        lock_or_recover(&self.archived, "archived").push(record_id.to_string());
        Ok(())
    }
}
