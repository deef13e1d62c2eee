use super::clips::Clip;
use super::planner::PlanResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Progress,
    Success,
    Failure,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failure)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskState::Pending => "PENDING",
            TaskState::Progress => "PROGRESS",
            TaskState::Success => "SUCCESS",
            TaskState::Failure => "FAILURE",
        })
    }
}

/// Opaque handle of a scheduled unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    ProcessVideo,
    SegmentVideo,
    AnalyzeChunk,
    RenderSelected,
    RenderRemaining,
}

/// Status record of one scheduled job.
///
/// Created PENDING when scheduled; terminal on SUCCESS or FAILURE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTask {
    pub id: TaskId,
    pub kind: TaskKind,
    pub source_key: String,
    pub bucket: String,
    pub status: TaskState,
    pub status_detail: String,
    pub duration_seconds: Option<f64>,
    /// Job output once SUCCESS, e.g. the analysis result or rendered key.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl VideoTask {
    pub fn new(id: TaskId, kind: TaskKind, bucket: &str, source_key: &str) -> Self {
        Self {
            id,
            kind,
            source_key: source_key.to_string(),
            bucket: bucket.to_string(),
            status: TaskState::Pending,
            status_detail: "Queued".to_string(),
            duration_seconds: None,
            result: None,
        }
    }

    pub fn pending(job: &Job) -> Self {
        Self::new(job.task_id().clone(), job.kind(), job.bucket(), job.object_key())
    }
}

/// What a caller sees through `getStatus`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    pub detail: String,
}

impl From<&VideoTask> for TaskStatus {
    fn from(task: &VideoTask) -> Self {
        Self {
            state: task.status,
            detail: task.status_detail.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Job {
    ProcessVideo(ProcessVideoJob),
    SegmentVideo(SegmentVideoJob),
    AnalyzeChunk(AnalyzeChunkJob),
    RenderSelected(RenderSelectedJob),
    RenderRemaining(RenderRemainingJob),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessVideoJob {
    pub id: TaskId,
    pub bucket: String,
    pub object_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentVideoJob {
    pub id: TaskId,
    pub bucket: String,
    pub object_key: String,
    pub duration_seconds: f64,
    pub plan: PlanResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeChunkJob {
    pub id: TaskId,
    pub bucket: String,
    pub object_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSelectedJob {
    pub id: TaskId,
    pub bucket: String,
    /// Source of clips that carry no `source_key` of their own.
    pub source_key: String,
    pub clips: Vec<Clip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRemainingJob {
    pub id: TaskId,
    pub bucket: String,
    pub source_key: String,
    pub selected: Vec<Clip>,
}

impl Job {
    pub fn process_video(bucket: impl Into<String>, object_key: impl Into<String>) -> Self {
        Job::ProcessVideo(ProcessVideoJob {
            id: TaskId::new(),
            bucket: bucket.into(),
            object_key: object_key.into(),
        })
    }

    pub fn analyze_chunk(bucket: impl Into<String>, object_key: impl Into<String>) -> Self {
        Job::AnalyzeChunk(AnalyzeChunkJob {
            id: TaskId::new(),
            bucket: bucket.into(),
            object_key: object_key.into(),
        })
    }

    pub fn task_id(&self) -> &TaskId {
        match self {
            Job::ProcessVideo(j) => &j.id,
            Job::SegmentVideo(j) => &j.id,
            Job::AnalyzeChunk(j) => &j.id,
            Job::RenderSelected(j) => &j.id,
            Job::RenderRemaining(j) => &j.id,
        }
    }

    pub fn bucket(&self) -> &str {
        match self {
            Job::ProcessVideo(j) => &j.bucket,
            Job::SegmentVideo(j) => &j.bucket,
            Job::AnalyzeChunk(j) => &j.bucket,
            Job::RenderSelected(j) => &j.bucket,
            Job::RenderRemaining(j) => &j.bucket,
        }
    }

    pub fn object_key(&self) -> &str {
        match self {
            Job::ProcessVideo(j) => &j.object_key,
            Job::SegmentVideo(j) => &j.object_key,
            Job::AnalyzeChunk(j) => &j.object_key,
            Job::RenderSelected(j) => &j.source_key,
            Job::RenderRemaining(j) => &j.source_key,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Job::ProcessVideo(_) => TaskKind::ProcessVideo,
            Job::SegmentVideo(_) => TaskKind::SegmentVideo,
            Job::AnalyzeChunk(_) => TaskKind::AnalyzeChunk,
            Job::RenderSelected(_) => TaskKind::RenderSelected,
            Job::RenderRemaining(_) => TaskKind::RenderRemaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_wire_format_is_tagged() {
        let job = Job::analyze_chunk("videos", "segments/a.mp4/a_000.mp4");
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["type"], "AnalyzeChunk");
        assert_eq!(json["object_key"], "segments/a.mp4/a_000.mp4");

        let back: Job = serde_json::from_value(json).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn test_pending_task_mirrors_job() {
        let job = Job::process_video("videos", "talk.mp4");
        let task = VideoTask::pending(&job);
        assert_eq!(&task.id, job.task_id());
        assert_eq!(task.status, TaskState::Pending);
        assert_eq!(task.kind, TaskKind::ProcessVideo);
        assert!(!task.status.is_terminal());
    }

    #[test]
    fn test_state_wire_names() {
        assert_eq!(serde_json::to_string(&TaskState::Progress).unwrap(), "\"PROGRESS\"");
    }
}
