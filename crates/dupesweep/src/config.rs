//! Sweep tuning knobs: page sizes, per-wake budgets, and the pacing
//! delays applied against the external source.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for one sweep actor.
///
/// The defaults pace a scan at five pages of a hundred records per
/// wake-up and archive removals three at a time, which keeps well under
/// typical provider rate limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SweepConfig {
    /// Records requested per page from the external source.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Maximum pages fetched in a single wake-up before progress is
    /// persisted and the actor yields.
    #[serde(default = "default_pages_per_wake")]
    pub pages_per_wake: u32,
    /// Sleep between successive page fetches within one wake-up.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// Delay before the next scheduled wake-up while pages remain.
    #[serde(default = "default_wake_delay_ms")]
    pub wake_delay_ms: u64,
    /// Archive calls issued concurrently per batch.
    #[serde(default = "default_archive_batch_size")]
    pub archive_batch_size: usize,
    /// Sleep between archive batches.
    #[serde(default = "default_archive_batch_delay_ms")]
    pub archive_batch_delay_ms: u64,
}

fn default_page_size() -> u32 {
    100
}

fn default_pages_per_wake() -> u32 {
    5
}

fn default_page_delay_ms() -> u64 {
    350
}

fn default_wake_delay_ms() -> u64 {
    50
}

fn default_archive_batch_size() -> usize {
    3
}

fn default_archive_batch_delay_ms() -> u64 {
    350
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            pages_per_wake: default_pages_per_wake(),
            page_delay_ms: default_page_delay_ms(),
            wake_delay_ms: default_wake_delay_ms(),
            archive_batch_size: default_archive_batch_size(),
            archive_batch_delay_ms: default_archive_batch_delay_ms(),
        }
    }
}

impl SweepConfig {
    /// Rejects values that would stall the scan loop or the archiver.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Validation {
                message: "pageSize must be at least 1".to_string(),
            });
        }
        if self.pages_per_wake == 0 {
            return Err(ConfigError::Validation {
                message: "pagesPerWake must be at least 1".to_string(),
            });
        }
        if self.archive_batch_size == 0 {
            return Err(ConfigError::Validation {
                message: "archiveBatchSize must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
