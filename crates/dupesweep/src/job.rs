//! Sweep job model: lifecycle state, progress counters, and the
//! duplicate groups produced by detection.
//!
//! A [`Job`] is owned by exactly one [`SweepActor`](crate::sweep::SweepActor)
//! and persisted as JSON between wake-ups, so every field here is
//! serde-serializable. Snapshots ([`JobSnapshot`]) are the read-only view
//! handed to callers of the status operation.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Error message recorded when a job is cancelled by the caller.
///
/// Cancellation is stored as a regular failure; this fixed message is the
/// only marker that distinguishes it from other failures.
pub const CANCELLED_BY_USER: &str = "Cancelled by user";

/// Which member of a duplicate group survives archiving.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeepPolicy {
    /// Keep the member with the earliest creation timestamp.
    Oldest,
    /// Keep the member with the latest creation timestamp.
    Newest,
}

impl KeepPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeepPolicy::Oldest => "oldest",
            KeepPolicy::Newest => "newest",
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Returns true once the job admits no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// A record buffered during the scan phase.
///
/// Only the fields duplicate detection needs are kept; the full upstream
/// record is discarded as soon as the title is normalized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScannedRecord {
    /// Upstream record id.
    pub id: String,
    /// Display title, lowercased and trimmed. Grouping key for detection.
    pub normalized_title: String,
    /// Upstream creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Records sharing a normalized title, split into one survivor and the
/// members to archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    /// The shared normalized title.
    pub key: String,
    /// Id of the surviving record.
    pub keep_id: String,
    /// Ids to archive, in creation-time order.
    pub remove_ids: Vec<String>,
}

/// One run of the scan-detect-archive pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job identifier, generated at start.
    pub id: String,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// External collection being scanned.
    pub source_id: String,
    /// Which duplicate survives each group.
    pub keep_policy: KeepPolicy,
    /// Bearer token for the external source. Persisted with the job so a
    /// restart can resume scanning; redacted from `Debug` output and never
    /// written to logs.
    #[serde(
        serialize_with = "serialize_credential",
        deserialize_with = "deserialize_credential"
    )]
    pub credential: SecretString,
    /// Records paged in so far. Always equals the buffer length.
    pub scanned: u64,
    /// Total record count, set once when the source reports exhaustion.
    /// `None` while scanning is still in progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Pagination cursor for the external source. `None` means start from
    /// the beginning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    /// Duplicate groups, populated only after scanning completes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicate_groups: Vec<DuplicateGroup>,
    /// Successful archive calls so far.
    pub archived_count: u64,
    /// Failed archive calls so far.
    pub failed_count: u64,
    /// When the job was started.
    pub started_at: DateTime<Utc>,
    /// When the job reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure reason; set only when `status` is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Creates a pending job for `source_id` with a fresh id.
    pub fn start(source_id: String, keep_policy: KeepPolicy, credential: SecretString) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Pending,
            source_id,
            keep_policy,
            credential,
            scanned: 0,
            total: None,
            cursor: None,
            duplicate_groups: Vec::new(),
            archived_count: 0,
            failed_count: 0,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Marks the job completed.
    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Marks the job failed with a human-readable reason.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(message.into());
        self.completed_at = Some(Utc::now());
    }

    /// Percentage of the scan completed, rounded to the nearest integer.
    /// `None` until a non-zero total is known.
    pub fn percentage(&self) -> Option<u8> {
        match self.total {
            Some(total) if total > 0 => {
                Some((self.scanned as f64 / total as f64 * 100.0).round() as u8)
            }
            _ => None,
        }
    }

    /// Builds the caller-facing view of this job. Full results are included
    /// only once the job has completed.
    pub fn snapshot(&self) -> JobSnapshot {
        let results = match self.status {
            JobStatus::Completed => Some(JobResults {
                group_count: self.duplicate_groups.len() as u64,
                archived_count: self.archived_count,
                failed_count: self.failed_count,
                details: self.duplicate_groups.clone(),
            }),
            _ => None,
        };
        JobSnapshot {
            id: self.id.clone(),
            status: self.status,
            progress: JobProgress {
                scanned: self.scanned,
                total: self.total,
                percentage: self.percentage(),
            },
            results,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error: self.error.clone(),
        }
    }
}

/// Scan progress as reported to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub scanned: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u8>,
}

/// Final results, present on a snapshot only for completed jobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobResults {
    /// Number of duplicate groups found.
    pub group_count: u64,
    /// Records successfully archived.
    pub archived_count: u64,
    /// Archive calls that failed.
    pub failed_count: u64,
    /// The duplicate groups themselves.
    pub details: Vec<DuplicateGroup>,
}

/// Read-only view of a job returned by the status operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: String,
    pub status: JobStatus,
    pub progress: JobProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<JobResults>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn serialize_credential<S>(value: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(value.expose_secret())
}

fn deserialize_credential<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_job() -> Job {
        Job::start(
            "col-1".to_string(),
            KeepPolicy::Oldest,
            SecretString::from("token-abc"),
        )
    }

    #[test]
    fn test_start_initializes_pending_job() {
        let job = test_job();
        assert!(!job.id.is_empty());
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.scanned, 0);
        assert!(job.total.is_none());
        assert!(job.cursor.is_none());
        assert!(job.duplicate_groups.is_empty());
        assert_eq!(job.archived_count, 0);
        assert_eq!(job.failed_count, 0);
        assert!(job.completed_at.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_as_str_matches_wire_names() {
        assert_eq!(JobStatus::Pending.as_str(), "pending");
        assert_eq!(JobStatus::Running.as_str(), "running");
        assert_eq!(JobStatus::Completed.as_str(), "completed");
        assert_eq!(JobStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_complete_sets_terminal_state() {
        let mut job = test_job();
        job.complete();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_fail_records_message() {
        let mut job = test_job();
        job.fail("source returned 401");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("source returned 401"));
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_percentage_none_while_scanning() {
        let mut job = test_job();
        job.scanned = 250;
        assert_eq!(job.percentage(), None);
    }

    #[test]
    fn test_percentage_none_for_zero_total() {
        let mut job = test_job();
        job.total = Some(0);
        assert_eq!(job.percentage(), None);
    }

    #[test]
    fn test_percentage_rounds() {
        let mut job = test_job();
        job.scanned = 1;
        job.total = Some(3);
        assert_eq!(job.percentage(), Some(33));
        job.scanned = 2;
        assert_eq!(job.percentage(), Some(67));
        job.scanned = 3;
        assert_eq!(job.percentage(), Some(100));
    }

    #[test]
    fn test_snapshot_hides_results_until_completed() {
        let mut job = test_job();
        job.status = JobStatus::Running;
        job.scanned = 10;
        assert!(job.snapshot().results.is_none());

        job.fail("boom");
        assert!(job.snapshot().results.is_none());
    }

    #[test]
    fn test_snapshot_includes_results_when_completed() {
        let mut job = test_job();
        job.scanned = 4;
        job.total = Some(4);
        job.duplicate_groups = vec![DuplicateGroup {
            key: "foo".to_string(),
            keep_id: "1".to_string(),
            remove_ids: vec!["2".to_string()],
        }];
        job.archived_count = 1;
        job.complete();

        let snapshot = job.snapshot();
        let results = snapshot.results.unwrap();
        assert_eq!(results.group_count, 1);
        assert_eq!(results.archived_count, 1);
        assert_eq!(results.failed_count, 0);
        assert_eq!(results.details.len(), 1);
        assert_eq!(snapshot.progress.percentage, Some(100));
    }

    #[test]
    fn test_job_round_trips_through_json() {
        let mut job = test_job();
        job.status = JobStatus::Running;
        job.scanned = 7;
        job.cursor = Some("page-2".to_string());

        let json = serde_json::to_string(&job).unwrap();
        let restored: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, job.id);
        assert_eq!(restored.status, JobStatus::Running);
        assert_eq!(restored.scanned, 7);
        assert_eq!(restored.cursor.as_deref(), Some("page-2"));
        assert_eq!(
            restored.credential.expose_secret(),
            job.credential.expose_secret()
        );
    }

    #[test]
    fn test_job_serializes_camel_case() {
        let job = test_job();
        let json = serde_json::to_value(&job).unwrap();
        assert!(json.get("sourceId").is_some());
        assert!(json.get("keepPolicy").is_some());
        assert!(json.get("startedAt").is_some());
        assert_eq!(json.get("keepPolicy").unwrap(), "oldest");
        assert_eq!(json.get("status").unwrap(), "pending");
    }

    #[test]
    fn test_credential_absent_from_debug_output() {
        let job = test_job();
        let rendered = format!("{:?}", job);
        assert!(!rendered.contains("token-abc"));
    }
}
