//! Caller-facing handle for a running sweep actor.

use secrecy::SecretString;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Result, SweepError};
use crate::job::{JobSnapshot, KeepPolicy};

/// Commands accepted by the sweep actor.
#[derive(Debug)]
pub(crate) enum SweepCommand {
    Start {
        source_id: String,
        keep_policy: KeepPolicy,
        credential: SecretString,
        reply: oneshot::Sender<Result<String>>,
    },
    Status {
        reply: oneshot::Sender<Result<JobSnapshot>>,
    },
    Cancel {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Cloneable handle for issuing commands to a sweep actor.
///
/// All three operations return once the actor has processed the command;
/// none of them blocks on scan or archive work. When every handle has
/// been dropped the actor finishes any in-flight job and exits.
#[derive(Clone)]
pub struct SweepHandle {
    tx: mpsc::Sender<SweepCommand>,
}

impl SweepHandle {
    pub(crate) fn new(tx: mpsc::Sender<SweepCommand>) -> Self {
        Self { tx }
    }

    /// Starts a new job scanning `source_id`, replacing any previous job
    /// on this instance. Returns the new job's id immediately; processing
    /// happens on scheduled wake-ups.
    pub async fn start(
        &self,
        source_id: impl Into<String>,
        keep_policy: KeepPolicy,
        credential: SecretString,
    ) -> Result<String> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SweepCommand::Start {
                source_id: source_id.into(),
                keep_policy,
                credential,
                reply,
            })
            .await
            .map_err(|_| SweepError::ActorGone)?;
        rx.await.map_err(|_| SweepError::ActorGone)?
    }

    /// Returns a snapshot of the current job. Fails with
    /// [`SweepError::NotFound`] if no job was ever started here.
    pub async fn status(&self) -> Result<JobSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SweepCommand::Status { reply })
            .await
            .map_err(|_| SweepError::ActorGone)?;
        rx.await.map_err(|_| SweepError::ActorGone)?
    }

    /// Cancels the current job, forcing any non-terminal state to
    /// `failed`. Cancelling an already finished job is a no-op; with no
    /// job at all it fails with [`SweepError::NotFound`].
    pub async fn cancel(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SweepCommand::Cancel { reply })
            .await
            .map_err(|_| SweepError::ActorGone)?;
        rx.await.map_err(|_| SweepError::ActorGone)?
    }
}
