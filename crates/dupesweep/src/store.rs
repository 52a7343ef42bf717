//! Durable checkpoint store for one sweep actor instance.
//!
//! Two logical keys live under the actor's instance scope: `job` (the
//! serialized [`Job`]) and `buffer` (the accumulated scan records). A
//! scan checkpoint writes both in one transaction so the job's cursor
//! and the buffer can never diverge; the buffer is deleted once the job
//! reaches a terminal state.

use crate::db::{state_repo, Database, DatabaseError};
use crate::job::{Job, ScannedRecord};

const JOB_KEY: &str = "job";
const BUFFER_KEY: &str = "buffer";

/// Persistence facade scoped to one actor instance.
#[derive(Clone)]
pub struct SweepStore {
    db: Database,
    instance: String,
}

impl SweepStore {
    pub fn new(db: Database, instance: impl Into<String>) -> Self {
        Self {
            db,
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Loads the persisted job, if one was ever started on this instance.
    pub fn load_job(&self) -> Result<Option<Job>, DatabaseError> {
        match state_repo::get(&self.db, &self.instance, JOB_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Persists the job record, overwriting any previous one.
    pub fn save_job(&self, job: &Job) -> Result<(), DatabaseError> {
        let raw = serde_json::to_string(job)?;
        state_repo::put(&self.db, &self.instance, JOB_KEY, &raw)
    }

    /// Persists the job and its scan buffer in one transaction. A job
    /// whose cursor points past records the buffer does not hold (or the
    /// reverse) can never be observed, whatever happens mid-write.
    pub fn save_checkpoint(
        &self,
        job: &Job,
        buffer: &[ScannedRecord],
    ) -> Result<(), DatabaseError> {
        let job_raw = serde_json::to_string(job)?;
        let buffer_raw = serde_json::to_string(buffer)?;
        state_repo::put_many(
            &self.db,
            &self.instance,
            &[(JOB_KEY, job_raw.as_str()), (BUFFER_KEY, buffer_raw.as_str())],
        )
    }

    /// Loads the scan buffer. An absent buffer reads as empty.
    pub fn load_buffer(&self) -> Result<Vec<ScannedRecord>, DatabaseError> {
        match state_repo::get(&self.db, &self.instance, BUFFER_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Removes the scan buffer from storage.
    pub fn delete_buffer(&self) -> Result<(), DatabaseError> {
        state_repo::delete(&self.db, &self.instance, BUFFER_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::KeepPolicy;
    use secrecy::SecretString;

    fn test_store() -> SweepStore {
        let db = Database::open_in_memory().expect("Failed to create test database");
        SweepStore::new(db, "inst-1")
    }

    fn test_job() -> Job {
        Job::start(
            "col-1".to_string(),
            KeepPolicy::Oldest,
            SecretString::from("secret"),
        )
    }

    #[test]
    fn test_load_job_when_none_started() {
        let store = test_store();
        assert!(store.load_job().unwrap().is_none());
    }

    #[test]
    fn test_job_round_trip() {
        let store = test_store();
        let mut job = test_job();
        job.scanned = 42;
        job.cursor = Some("cur-3".to_string());
        store.save_job(&job).unwrap();

        let loaded = store.load_job().unwrap().unwrap();
        assert_eq!(loaded.id, job.id);
        assert_eq!(loaded.scanned, 42);
        assert_eq!(loaded.cursor.as_deref(), Some("cur-3"));
    }

    #[test]
    fn test_save_job_overwrites() {
        let store = test_store();
        let mut job = test_job();
        store.save_job(&job).unwrap();

        job.scanned = 100;
        store.save_job(&job).unwrap();

        let loaded = store.load_job().unwrap().unwrap();
        assert_eq!(loaded.scanned, 100);
    }

    #[test]
    fn test_checkpoint_saves_job_and_buffer_together() {
        let store = test_store();
        let mut stale = test_job();
        stale.scanned = 1;
        stale.cursor = Some("1".to_string());
        store
            .save_checkpoint(
                &stale,
                &[ScannedRecord {
                    id: "r0".to_string(),
                    normalized_title: "foo".to_string(),
                    created_at: chrono::Utc::now(),
                }],
            )
            .unwrap();

        let mut job = stale.clone();
        job.scanned = 3;
        job.cursor = Some("3".to_string());
        let buffer: Vec<ScannedRecord> = (0..3)
            .map(|i| ScannedRecord {
                id: format!("r{}", i),
                normalized_title: format!("title {}", i),
                created_at: chrono::Utc::now(),
            })
            .collect();
        store.save_checkpoint(&job, &buffer).unwrap();

        // Cursor and buffer always belong to the same checkpoint.
        let loaded_job = store.load_job().unwrap().unwrap();
        let loaded_buffer = store.load_buffer().unwrap();
        assert_eq!(loaded_job.scanned, 3);
        assert_eq!(loaded_job.cursor.as_deref(), Some("3"));
        assert_eq!(loaded_buffer.len() as u64, loaded_job.scanned);
    }

    #[test]
    fn test_buffer_defaults_to_empty() {
        let store = test_store();
        assert!(store.load_buffer().unwrap().is_empty());
    }

    #[test]
    fn test_buffer_round_trip() {
        let store = test_store();
        let buffer = vec![ScannedRecord {
            id: "r1".to_string(),
            normalized_title: "foo".to_string(),
            created_at: chrono::Utc::now(),
        }];
        store.save_checkpoint(&test_job(), &buffer).unwrap();

        let loaded = store.load_buffer().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "r1");
        assert_eq!(loaded[0].normalized_title, "foo");
    }

    #[test]
    fn test_delete_buffer() {
        let store = test_store();
        store
            .save_checkpoint(
                &test_job(),
                &[ScannedRecord {
                    id: "r1".to_string(),
                    normalized_title: "foo".to_string(),
                    created_at: chrono::Utc::now(),
                }],
            )
            .unwrap();

        store.delete_buffer().unwrap();
        assert!(store.load_buffer().unwrap().is_empty());
        // Deleting an absent buffer is a no-op.
        store.delete_buffer().unwrap();
    }

    #[test]
    fn test_stores_are_instance_scoped() {
        let db = Database::open_in_memory().unwrap();
        let store_a = SweepStore::new(db.clone(), "inst-a");
        let store_b = SweepStore::new(db, "inst-b");

        store_a.save_job(&test_job()).unwrap();
        assert!(store_a.load_job().unwrap().is_some());
        assert!(store_b.load_job().unwrap().is_none());
    }
}
