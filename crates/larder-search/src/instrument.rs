//! Fire-and-forget performance and analytics records
//!
//! The request path hands records to a bounded queue and moves on. A
//! background task drains the queue into an `AnalyticsSink`. Nothing here
//! can fail or slow down a search: a full queue, a closed queue or a failing
//! sink only produce a warning.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BackendKind;
use crate::error::{Result, SearchError};

/// Engine operation a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Search,
    Facets,
    SearchWithFacets,
    Suggest,
    SimilarRecipes,
    Recommend,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Search => "search",
            Operation::Facets => "facets",
            Operation::SearchWithFacets => "search_with_facets",
            Operation::Suggest => "suggest",
            Operation::SimilarRecipes => "similar_recipes",
            Operation::Recommend => "recommend",
        }
    }
}

/// Timing of a single engine call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub query: String,
    pub filters: serde_json::Value,
    pub response_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub successful: bool,
    pub result_count: u64,
    /// Always false; the engine has no result cache
    pub cache_hit: bool,
}

/// What was asked, of which backend, and how it went
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEvent {
    pub operation: Operation,
    pub query: String,
    pub filters: serde_json::Value,
    pub backend: BackendKind,
    pub result_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A record on the analytics queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstrumentRecord {
    Performance(PerformanceRecord),
    Event(SearchEvent),
}

impl InstrumentRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            InstrumentRecord::Performance(_) => "performance",
            InstrumentRecord::Event(_) => "event",
        }
    }
}

/// Destination for drained records
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record(&self, record: &InstrumentRecord) -> Result<()>;
}

/// Writes records to the `larder::analytics` tracing target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl AnalyticsSink for TracingSink {
    async fn record(&self, record: &InstrumentRecord) -> Result<()> {
        match record {
            InstrumentRecord::Performance(p) => info!(
                target: "larder::analytics",
                query = %p.query,
                response_time_ms = p.response_time_ms,
                result_count = p.result_count,
                successful = p.successful,
                "performance"
            ),
            InstrumentRecord::Event(e) => info!(
                target: "larder::analytics",
                operation = e.operation.as_str(),
                backend = %e.backend,
                query = %e.query,
                result_count = e.result_count,
                successful = e.successful,
                error = e.error.as_deref().unwrap_or(""),
                "search event"
            ),
        }
        Ok(())
    }
}

/// Appends one JSON object per record to a file
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<Option<tokio::fs::File>>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AnalyticsSink for JsonLinesSink {
    async fn record(&self, record: &InstrumentRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        if file.is_none() {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let opened = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(|e| SearchError::Analytics(format!("{}: {}", self.path.display(), e)))?;
            *file = Some(opened);
        }

        if let Some(f) = file.as_mut() {
            f.write_all(&line).await?;
            f.flush().await?;
        }
        Ok(())
    }
}

/// Keeps records in memory
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<InstrumentRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<InstrumentRecord> {
        self.records.lock().await.clone()
    }

    pub async fn events(&self) -> Vec<SearchEvent> {
        self.records
            .lock()
            .await
            .iter()
            .filter_map(|r| match r {
                InstrumentRecord::Event(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn performance(&self) -> Vec<PerformanceRecord> {
        self.records
            .lock()
            .await
            .iter()
            .filter_map(|r| match r {
                InstrumentRecord::Performance(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl AnalyticsSink for MemorySink {
    async fn record(&self, record: &InstrumentRecord) -> Result<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}

/// Handle for emitting records; cheap to clone
#[derive(Debug, Clone)]
pub struct Instrumentation {
    tx: mpsc::Sender<InstrumentRecord>,
}

impl Instrumentation {
    /// A handle plus the raw receiving end of its queue
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<InstrumentRecord>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Start a consumer task draining into `sink`.
    ///
    /// The task ends once every handle has been dropped and the queue is
    /// empty; await the returned handle to flush.
    pub fn spawn(sink: Arc<dyn AnalyticsSink>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (instrumentation, mut rx) = Self::channel(capacity);

        let handle = tokio::spawn(async move {
            let mut drained = 0u64;
            while let Some(record) = rx.recv().await {
                if let Err(e) = sink.record(&record).await {
                    warn!("Failed to record {} analytics: {}", record.kind(), e);
                }
                drained += 1;
            }
            debug!("Analytics consumer stopped after {} records", drained);
        });

        (instrumentation, handle)
    }

    /// Queue a record without waiting; drops it when the queue is unavailable
    pub fn emit(&self, record: InstrumentRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                warn!("Analytics queue full, dropping {} record", record.kind());
            }
            Err(TrySendError::Closed(record)) => {
                warn!("Analytics queue closed, dropping {} record", record.kind());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(successful: bool) -> InstrumentRecord {
        InstrumentRecord::Event(SearchEvent {
            operation: Operation::Search,
            query: "soup".into(),
            filters: serde_json::json!({}),
            backend: BackendKind::Aggregation,
            result_count: 3,
            user_id: Some("u1".into()),
            successful,
            error: (!successful).then(|| "boom".to_string()),
            timestamp: Utc::now(),
        })
    }

    struct FailingSink;

    #[async_trait]
    impl AnalyticsSink for FailingSink {
        async fn record(&self, _record: &InstrumentRecord) -> Result<()> {
            Err(SearchError::Analytics("sink offline".into()))
        }
    }

    #[tokio::test]
    async fn test_records_reach_sink() {
        let sink = Arc::new(MemorySink::new());
        let (instrumentation, handle) = Instrumentation::spawn(sink.clone(), 16);

        instrumentation.emit(event(true));
        instrumentation.emit(event(false));
        drop(instrumentation);
        handle.await.unwrap();

        let events = sink.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let (instrumentation, mut rx) = Instrumentation::channel(1);

        instrumentation.emit(event(true));
        instrumentation.emit(event(true));
        instrumentation.emit(event(true));
        drop(instrumentation);

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, 1);
    }

    #[tokio::test]
    async fn test_closed_queue_is_ignored() {
        let (instrumentation, rx) = Instrumentation::channel(4);
        drop(rx);
        instrumentation.emit(event(true));
    }

    #[tokio::test]
    async fn test_failing_sink_is_swallowed() {
        let (instrumentation, handle) = Instrumentation::spawn(Arc::new(FailingSink), 4);
        instrumentation.emit(event(true));
        drop(instrumentation);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_json_lines_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("analytics.jsonl");
        let sink = JsonLinesSink::new(&path);

        sink.record(&event(true)).await.unwrap();
        sink.record(&event(false)).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "event");
        assert_eq!(lines[1]["successful"], false);
        assert_eq!(lines[1]["operation"], "search");
    }
}
