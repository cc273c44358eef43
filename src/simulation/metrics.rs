//! Per-episode metrics and job control
//!
//! The metrics document is uploaded whole after every episode, replacing
//! whatever the sink held before.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

/// One finished episode. Training and evaluation jobs record different fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricRecord {
    Training {
        progress: i64,
        reward_score: i64,
        metric_time: i64,
        start_time: i64,
        elapsed_time_in_milliseconds: i64,
        episode: u64,
    },
    Evaluation {
        completion_percentage: i64,
        metric_time: i64,
        start_time: i64,
        elapsed_time_in_milliseconds: i64,
        trial: u64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsDocument {
    pub metrics: Vec<MetricRecord>,
}

/// Destination of the metrics document
pub trait MetricsSink: Send {
    /// Replace the stored document
    fn upload(&mut self, document: &MetricsDocument) -> Result<()>;

    /// Report the cumulative reward of a finished training episode
    fn report_episode_reward(&mut self, _reward: f64) -> Result<()> {
        Ok(())
    }
}

/// Writes the document as JSON to a file, overwriting it each time
#[derive(Debug, Clone)]
pub struct FileMetricsSink {
    path: PathBuf,
}

impl FileMetricsSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricsSink for FileMetricsSink {
    fn upload(&mut self, document: &MetricsDocument) -> Result<()> {
        let body = serde_json::to_vec(document)?;
        fs::write(&self.path, body)
            .with_context(|| format!("Failed to write metrics to {}", self.path.display()))
    }

    fn report_episode_reward(&mut self, reward: f64) -> Result<()> {
        info!("Episode reward: {:.4}", reward);
        Ok(())
    }
}

/// Out-of-band cancellation of the running job
pub trait JobControl: Send {
    /// Fire-and-forget; ongoing steps are not interrupted
    fn cancel(&mut self, job_id: &str) -> Result<()>;
}

/// Job control that only records the request in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingJobControl;

impl JobControl for LoggingJobControl {
    fn cancel(&mut self, job_id: &str) -> Result<()> {
        info!("Requested cancellation of job {}", job_id);
        Ok(())
    }
}
