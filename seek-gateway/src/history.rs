//! In-memory execution history and aggregate stats.
//!
//! A bounded ring of recent records plus cumulative counters that survive
//! ring eviction. Plugged into the core as its [`RecordSink`].

use async_trait::async_trait;
use seek_common::{ExecutionRecord, Outcome, RecordSink};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

const DEFAULT_CAPACITY: usize = 1000;

/// Aggregate view over everything ever recorded by this process.
#[derive(Debug, Clone, Serialize)]
pub struct StatsData {
    #[serde(rename = "totalExecutions")]
    pub total_executions: u64,
    /// Fraction of executions with a success outcome, 0.0 when none ran.
    #[serde(rename = "successRate")]
    pub success_rate: f64,
    /// Mean wall time across all executions, milliseconds.
    #[serde(rename = "averageExecutionTime")]
    pub average_execution_time: u64,
    #[serde(rename = "byLanguage")]
    pub by_language: HashMap<String, u64>,
    #[serde(rename = "byOutcome")]
    pub by_outcome: HashMap<String, u64>,
}

#[derive(Debug, Default)]
struct HistoryInner {
    ring: VecDeque<ExecutionRecord>,
    total: u64,
    successes: u64,
    total_wall_time_ms: u64,
    by_language: HashMap<String, u64>,
    by_outcome: HashMap<String, u64>,
}

/// Bounded store of recent executions.
#[derive(Debug)]
pub struct HistoryStore {
    capacity: usize,
    inner: Mutex<HistoryInner>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl HistoryStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(HistoryInner::default()),
        }
    }

    pub async fn push(&self, record: ExecutionRecord) {
        let mut inner = self.inner.lock().await;
        inner.total += 1;
        if record.outcome == Outcome::Success {
            inner.successes += 1;
        }
        inner.total_wall_time_ms += record.wall_time_ms;
        *inner.by_language.entry(record.language.clone()).or_insert(0) += 1;
        *inner
            .by_outcome
            .entry(record.outcome.as_str().to_string())
            .or_insert(0) += 1;

        if inner.ring.len() == self.capacity {
            inner.ring.pop_front();
        }
        inner.ring.push_back(record);
    }

    /// Most recent records first, at most `limit`.
    pub async fn recent(&self, limit: usize) -> Vec<ExecutionRecord> {
        let inner = self.inner.lock().await;
        inner.ring.iter().rev().take(limit).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.ring.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> StatsData {
        let inner = self.inner.lock().await;
        let success_rate = if inner.total == 0 {
            0.0
        } else {
            inner.successes as f64 / inner.total as f64
        };
        let average_execution_time = if inner.total == 0 {
            0
        } else {
            inner.total_wall_time_ms / inner.total
        };
        StatsData {
            total_executions: inner.total,
            success_rate,
            average_execution_time,
            by_language: inner.by_language.clone(),
            by_outcome: inner.by_outcome.clone(),
        }
    }
}

#[async_trait]
impl RecordSink for HistoryStore {
    async fn record(&self, record: ExecutionRecord) {
        self.push(record).await;
    }
}
