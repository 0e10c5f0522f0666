//! Conversion jobs tracked by id.
//!
//! [`JobManager::create_job`] records a `queued` job and returns at once;
//! a spawned task moves it through `running` to `completed` or `failed`.
//! Terminal jobs are never modified again, so repeated reads of a finished
//! job always agree.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use dochub_markdown::{Block, ConversionResult, blocks_to_markdown, markdown_to_blocks};
use dochub_shared::{ConversionOptions, DocHubError, JobId, Result};

use crate::files::MarkdownFiles;

/// How often [`JobManager::wait`] re-checks a job.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// Job types
// ---------------------------------------------------------------------------

/// Direction of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    MarkdownToBlocks,
    BlocksToMarkdown,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MarkdownToBlocks => write!(f, "markdown-to-blocks"),
            Self::BlocksToMarkdown => write!(f, "blocks-to-markdown"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// What a job converts: inline content or a workspace-relative file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum JobInput {
    Markdown { content: String },
    MarkdownFile { path: PathBuf },
    Blocks { blocks: Vec<Block> },
    /// A JSON array of blocks.
    BlocksFile { path: PathBuf },
}

impl JobInput {
    /// The job kind this input implies.
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Markdown { .. } | Self::MarkdownFile { .. } => JobKind::MarkdownToBlocks,
            Self::Blocks { .. } | Self::BlocksFile { .. } => JobKind::BlocksToMarkdown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobParams {
    pub input: JobInput,
    #[serde(default)]
    pub options: ConversionOptions,
}

impl JobParams {
    pub fn new(input: JobInput) -> Self {
        Self {
            input,
            options: ConversionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }
}

/// Result of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobOutput {
    Blocks(ConversionResult<Vec<Block>>),
    Markdown(ConversionResult<String>),
}

impl JobOutput {
    pub fn summary(&self) -> String {
        match self {
            Self::Blocks(r) => r.summary(),
            Self::Markdown(r) => r.summary(),
        }
    }
}

/// A conversion job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionJob {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConversionJob {
    fn new(kind: JobKind) -> Self {
        Self {
            id: JobId::new(),
            kind,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        if self.status == JobStatus::Queued {
            self.status = JobStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    pub fn mark_completed(&mut self, output: JobOutput) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.result = Some(output);
    }

    pub fn mark_failed(&mut self, error: String) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.created_at)
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct JobStore {
    /// Ids in creation order.
    order: Vec<JobId>,
    jobs: HashMap<JobId, ConversionJob>,
}

/// Owns the job store and runs jobs on the tokio runtime.
///
/// Cloning is cheap; clones share one store.
#[derive(Debug, Clone)]
pub struct JobManager {
    store: Arc<RwLock<JobStore>>,
    files: MarkdownFiles,
}

impl JobManager {
    /// Create a manager resolving file inputs against `files`.
    pub fn new(files: MarkdownFiles) -> Self {
        Self {
            store: Arc::new(RwLock::new(JobStore::default())),
            files,
        }
    }

    /// Record a new job and start processing it in the background.
    ///
    /// Returns the job as queued. Fails only when `kind` does not match the
    /// input or the options are invalid. Must be called within a tokio runtime.
    #[instrument(skip_all, fields(%kind))]
    pub async fn create_job(&self, kind: JobKind, params: JobParams) -> Result<ConversionJob> {
        if params.input.kind() != kind {
            return Err(DocHubError::validation(format!(
                "{kind} job cannot take {} input",
                params.input.kind()
            )));
        }
        params.options.validate()?;

        let job = ConversionJob::new(kind);
        let id = job.id.clone();
        {
            let mut store = self.store.write().await;
            store.order.push(id.clone());
            store.jobs.insert(id.clone(), job.clone());
        }
        info!(job_id = %id, "job queued");

        let manager = self.clone();
        tokio::spawn(async move {
            manager.process(id, params).await;
        });

        Ok(job)
    }

    /// Snapshot of a job, or `None` for an unknown id.
    pub async fn get_job(&self, id: &JobId) -> Option<ConversionJob> {
        self.store.read().await.jobs.get(id).cloned()
    }

    /// Look a job up by its string id.
    pub async fn find_job(&self, id: &str) -> Result<ConversionJob> {
        let not_found = || DocHubError::JobNotFound { id: id.to_string() };
        let parsed: JobId = id.parse().map_err(|_| not_found())?;
        self.get_job(&parsed).await.ok_or_else(not_found)
    }

    /// All jobs in creation order.
    pub async fn list_jobs(&self) -> Vec<ConversionJob> {
        let store = self.store.read().await;
        store
            .order
            .iter()
            .filter_map(|id| store.jobs.get(id).cloned())
            .collect()
    }

    /// Poll until the job reaches a terminal state.
    pub async fn wait(&self, id: &JobId) -> Result<ConversionJob> {
        loop {
            let job = self
                .get_job(id)
                .await
                .ok_or_else(|| DocHubError::JobNotFound { id: id.to_string() })?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    #[instrument(skip_all, fields(job_id = %id))]
    async fn process(&self, id: JobId, params: JobParams) {
        self.update(&id, ConversionJob::mark_running).await;
        info!("job running");

        match self.run(params).await {
            Ok(output) => {
                let summary = output.summary();
                self.update(&id, |job| job.mark_completed(output)).await;
                info!(%summary, "job completed");
            }
            Err(e) => {
                warn!(error = %e, "job failed");
                self.update(&id, |job| job.mark_failed(e.to_string())).await;
            }
        }
    }

    async fn update(&self, id: &JobId, apply: impl FnOnce(&mut ConversionJob)) {
        let mut store = self.store.write().await;
        match store.jobs.get_mut(id) {
            Some(job) => apply(job),
            None => debug!(job_id = %id, "job vanished before update"),
        }
    }

    async fn run(&self, params: JobParams) -> Result<JobOutput> {
        let options = &params.options;
        match params.input {
            JobInput::Markdown { content } => {
                Ok(JobOutput::Blocks(markdown_to_blocks(&content, options)?))
            }
            JobInput::MarkdownFile { path } => {
                let content = self.files.read(&path).await?;
                Ok(JobOutput::Blocks(markdown_to_blocks(&content, options)?))
            }
            JobInput::Blocks { blocks } => {
                Ok(JobOutput::Markdown(blocks_to_markdown(&blocks, options)?))
            }
            JobInput::BlocksFile { path } => {
                let json = self.files.read(&path).await?;
                let blocks: Vec<Block> = serde_json::from_str(&json).map_err(|e| {
                    DocHubError::validation(format!("{} is not a block array: {e}", path.display()))
                })?;
                Ok(JobOutput::Markdown(blocks_to_markdown(&blocks, options)?))
            }
        }
    }
}
