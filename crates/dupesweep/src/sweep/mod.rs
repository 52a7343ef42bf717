//! The sweep actor: a single task that owns one job at a time.
//!
//! Callers talk to the actor through a [`SweepHandle`]; the actor
//! serializes commands and scheduled wake-ups onto one loop, so job
//! state is never touched concurrently. Scan progress is checkpointed
//! through [`SweepStore`](crate::store::SweepStore) between wake-ups.

pub mod actor;
pub mod handle;

pub use actor::SweepActor;
pub use handle::SweepHandle;
