//! The sweep actor loop: command handling, scheduled wake-ups, and the
//! scan/detect/archive phases of a job.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use secrecy::SecretString;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::SweepConfig;
use crate::dedupe;
use crate::error::{Result, SweepError};
use crate::job::{Job, JobSnapshot, JobStatus, KeepPolicy, ScannedRecord, CANCELLED_BY_USER};
use crate::source::RecordSource;
use crate::store::SweepStore;

use super::handle::{SweepCommand, SweepHandle};

/// Command mailbox depth. Callers block briefly if the actor falls this
/// far behind, which keeps command order intact.
const MAILBOX_SIZE: usize = 16;

/// One job-processing actor.
///
/// The actor owns its store scope and processes exactly one thing at a
/// time: either a caller command or a scheduled wake-up. A wake-up runs
/// to completion before the next command is taken, so commands observe
/// only fully committed state.
pub struct SweepActor {
    store: SweepStore,
    source: Arc<dyn RecordSource>,
    config: SweepConfig,
    rx: mpsc::Receiver<SweepCommand>,
    /// Deadline of the next scheduled wake-up, if any. Scheduling a new
    /// wake replaces the previous one; there is never more than one.
    wake_at: Option<Instant>,
}

impl SweepActor {
    /// Validates the config, spawns the actor task, and returns a handle
    /// to it. If a previous process left a non-terminal job behind in the
    /// store, the actor schedules a wake-up and resumes it.
    pub fn spawn(
        store: SweepStore,
        source: Arc<dyn RecordSource>,
        config: SweepConfig,
    ) -> Result<SweepHandle> {
        config.validate()?;
        let (tx, rx) = mpsc::channel(MAILBOX_SIZE);
        let mut actor = SweepActor {
            store,
            source,
            config,
            rx,
            wake_at: None,
        };
        tokio::spawn(async move { actor.run().await });
        Ok(SweepHandle::new(tx))
    }

    async fn run(&mut self) {
        match self.store.load_job() {
            Ok(Some(job)) if !job.is_terminal() => {
                info!(
                    job_id = %job.id,
                    status = job.status.as_str(),
                    instance = %self.store.instance(),
                    "Resuming unfinished job"
                );
                self.schedule_wake();
            }
            Err(e) => error!("Failed to check for an unfinished job: {}", e),
            _ => {}
        }

        // A closed mailbox alone does not stop the actor: a scheduled
        // wake still runs, so an in-flight job finishes before exit.
        let mut handles_open = true;
        loop {
            match (self.wake_at, handles_open) {
                (Some(deadline), true) => {
                    tokio::select! {
                        maybe_cmd = self.rx.recv() => match maybe_cmd {
                            Some(cmd) => self.handle_command(cmd),
                            None => handles_open = false,
                        },
                        _ = time::sleep_until(deadline) => {
                            self.wake_at = None;
                            self.on_wake().await;
                        }
                    }
                }
                (Some(deadline), false) => {
                    time::sleep_until(deadline).await;
                    self.wake_at = None;
                    self.on_wake().await;
                }
                (None, true) => match self.rx.recv().await {
                    Some(cmd) => self.handle_command(cmd),
                    None => handles_open = false,
                },
                (None, false) => break,
            }
        }
        debug!(instance = %self.store.instance(), "Sweep actor stopped");
    }

    fn handle_command(&mut self, cmd: SweepCommand) {
        match cmd {
            SweepCommand::Start {
                source_id,
                keep_policy,
                credential,
                reply,
            } => {
                let _ = reply.send(self.start_job(source_id, keep_policy, credential));
            }
            SweepCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            SweepCommand::Cancel { reply } => {
                let _ = reply.send(self.cancel());
            }
        }
    }

    /// Persists a fresh pending job and schedules its first wake-up.
    /// Any previous job on this instance is overwritten.
    fn start_job(
        &mut self,
        source_id: String,
        keep_policy: KeepPolicy,
        credential: SecretString,
    ) -> Result<String> {
        let job = Job::start(source_id, keep_policy, credential);
        info!(
            job_id = %job.id,
            source_id = %job.source_id,
            keep_policy = job.keep_policy.as_str(),
            "Starting duplicate sweep"
        );
        // Fresh job, fresh buffer, one commit.
        self.store.save_checkpoint(&job, &[])?;
        self.schedule_wake();
        Ok(job.id)
    }

    fn status(&self) -> Result<JobSnapshot> {
        match self.store.load_job()? {
            Some(job) => Ok(job.snapshot()),
            None => Err(SweepError::NotFound),
        }
    }

    /// Forces a non-terminal job to `failed` and drops the pending
    /// wake-up. Terminal jobs are left untouched.
    fn cancel(&mut self) -> Result<()> {
        let mut job = self.store.load_job()?.ok_or(SweepError::NotFound)?;
        if job.is_terminal() {
            return Ok(());
        }
        job.fail(CANCELLED_BY_USER);
        self.store.save_job(&job)?;
        self.store.delete_buffer()?;
        self.wake_at = None;
        info!(job_id = %job.id, "Job cancelled");
        Ok(())
    }

    /// One scheduled wake-up. Every failure in here ends up persisted on
    /// the job; nothing propagates further because a wake-up has no
    /// caller to propagate to.
    async fn on_wake(&mut self) {
        let job = match self.store.load_job() {
            Ok(Some(job)) if !job.is_terminal() => job,
            Ok(_) => {
                // Stale wake-up after cancel or completion.
                debug!("Wake-up with no active job, ignoring");
                return;
            }
            Err(e) => {
                error!("Failed to load job on wake-up: {}", e);
                return;
            }
        };

        // The span is attached to the future rather than entered: the
        // actor future must stay `Send` for `tokio::spawn`.
        let job_id = job.id.clone();
        let span = info_span!("sweep_wake", job_id = %job_id);
        if let Err(e) = self.process_wake(job).instrument(span).await {
            error!(job_id = %job_id, "Sweep job failed: {}", e);
            self.fail_job(e.to_string());
        }
    }

    async fn process_wake(&mut self, mut job: Job) -> Result<()> {
        job.status = JobStatus::Running;

        // A job that already knows its total finished scanning in an
        // earlier life; re-scanning would double up the buffer.
        let buffer = if job.total.is_none() {
            let buffer = self.scan_chunk(&mut job).await?;
            if job.total.is_none() {
                // More pages remain. Progress is committed; come back soon.
                self.schedule_wake();
                return Ok(());
            }
            buffer
        } else {
            self.store.load_buffer()?
        };

        let groups = dedupe::find_duplicates(&buffer, job.keep_policy);
        info!(
            job_id = %job.id,
            records = buffer.len(),
            groups = groups.len(),
            "Duplicate detection complete"
        );
        job.duplicate_groups = groups;
        self.store.save_job(&job)?;

        self.archive_removals(&mut job).await?;

        job.complete();
        self.store.save_job(&job)?;
        self.store.delete_buffer()?;
        info!(
            job_id = %job.id,
            archived = job.archived_count,
            failed = job.failed_count,
            "Sweep completed"
        );
        Ok(())
    }

    /// Pages through the source up to the per-wake budget, appending to
    /// the persisted buffer. Sets `job.total` once the source reports
    /// exhaustion. Buffer and job land in one transaction: a crash can
    /// never leave the cursor ahead of the buffer, which on resume would
    /// re-fetch pages into a buffer that already holds them.
    async fn scan_chunk(&self, job: &mut Job) -> Result<Vec<ScannedRecord>> {
        let mut buffer = self.store.load_buffer()?;

        for iteration in 0..self.config.pages_per_wake {
            let page = self
                .source
                .query_page(
                    &job.credential,
                    &job.source_id,
                    job.cursor.as_deref(),
                    self.config.page_size,
                )
                .await?;

            for record in &page.records {
                let title = record.display_title().unwrap_or_default();
                buffer.push(ScannedRecord {
                    id: record.id.clone(),
                    normalized_title: dedupe::normalize_title(title),
                    created_at: record.created_at,
                });
            }
            job.cursor = page.next_cursor.clone();
            job.scanned = buffer.len() as u64;

            debug!(
                job_id = %job.id,
                scanned = job.scanned,
                has_more = page.has_more,
                "Page scanned"
            );

            if !page.has_more {
                job.total = Some(job.scanned);
                break;
            }
            if iteration + 1 < self.config.pages_per_wake {
                time::sleep(Duration::from_millis(self.config.page_delay_ms)).await;
            }
        }

        self.store.save_checkpoint(job, &buffer)?;
        Ok(buffer)
    }

    /// Archives every removal id in bounded concurrent batches. Archive
    /// failures are tallied per record and never fail the job.
    async fn archive_removals(&self, job: &mut Job) -> Result<()> {
        let remove_ids: Vec<String> = job
            .duplicate_groups
            .iter()
            .flat_map(|group| group.remove_ids.iter().cloned())
            .collect();
        if remove_ids.is_empty() {
            return Ok(());
        }

        info!(
            job_id = %job.id,
            removals = remove_ids.len(),
            batch_size = self.config.archive_batch_size,
            "Archiving duplicates"
        );

        let batch_count = remove_ids.len().div_ceil(self.config.archive_batch_size);
        for (index, batch) in remove_ids
            .chunks(self.config.archive_batch_size)
            .enumerate()
        {
            let credential = &job.credential;
            let results = join_all(batch.iter().map(|record_id| {
                let source = Arc::clone(&self.source);
                async move { source.archive_record(credential, record_id).await }
            }))
            .await;

            for (record_id, result) in batch.iter().zip(results) {
                match result {
                    Ok(()) => job.archived_count += 1,
                    Err(e) => {
                        warn!(
                            job_id = %job.id,
                            record_id = %record_id,
                            "Archive failed: {}", e
                        );
                        job.failed_count += 1;
                    }
                }
            }

            if index + 1 < batch_count {
                time::sleep(Duration::from_millis(self.config.archive_batch_delay_ms)).await;
            }
        }
        Ok(())
    }

    /// Records a wake-up failure on the job. Storage errors here can only
    /// be logged; there is nowhere left to surface them.
    fn fail_job(&mut self, message: String) {
        self.wake_at = None;
        let mut job = match self.store.load_job() {
            Ok(Some(job)) if !job.is_terminal() => job,
            Ok(_) => return,
            Err(e) => {
                error!("Failed to load job to record failure: {}", e);
                return;
            }
        };
        job.fail(message);
        if let Err(e) = self.store.save_job(&job) {
            error!(job_id = %job.id, "Failed to persist job failure: {}", e);
        }
        if let Err(e) = self.store.delete_buffer() {
            warn!(job_id = %job.id, "Failed to delete buffer: {}", e);
        }
    }

    fn schedule_wake(&mut self) {
        self.wake_at = Some(Instant::now() + Duration::from_millis(self.config.wake_delay_ms));
    }
}
