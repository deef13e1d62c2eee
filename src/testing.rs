//! In-memory adapters shared by the unit tests.

use crate::application::tasks::TaskDispatcher;
use crate::domain::analysis::{Transcript, Word};
use crate::domain::credentials::Clock;
use crate::domain::jobs::{Job, TaskId, VideoTask};
use crate::domain::layout;
use crate::domain::planner::SegmentWindow;
use crate::error::PortError;
use crate::ports::media::{MediaInfo, MediaPort};
use crate::ports::queue::JobQueuePort;
use crate::ports::repository::TaskRepository;
use crate::ports::speech::SpeechPort;
use crate::ports::storage::StoragePort;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

#[derive(Default)]
struct StorageState {
    objects: BTreeMap<(String, String), Bytes>,
    downloads: HashMap<String, usize>,
    unavailable: bool,
    /// Uploads still allowed before every further one fails.
    uploads_left: Option<usize>,
    /// Uploads report success without storing anything.
    drop_uploads: bool,
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<StorageState>>,
}

impl MemoryStorage {
    pub fn insert(&self, bucket: &str, key: &str, body: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert((bucket.into(), key.into()), Bytes::copy_from_slice(body));
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn list(&self, bucket: &str, prefix: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .objects
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn downloads_of(&self, key: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .downloads
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    pub fn fail_uploads_after(&self, successes: usize) {
        self.state.lock().unwrap().uploads_left = Some(successes);
    }

    pub fn drop_uploads(&self) {
        self.state.lock().unwrap().drop_uploads = true;
    }
}

#[async_trait]
impl StoragePort for MemoryStorage {
    async fn check(&self, bucket: &str) -> Result<(), PortError> {
        if self.state.lock().unwrap().unavailable {
            return Err(format!("bucket {} unreachable", bucket).into());
        }
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, PortError> {
        self.object(bucket, key)
            .ok_or_else(|| format!("no such key: {}", key).into())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        _content_type: &str,
    ) -> Result<(), PortError> {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert((bucket.into(), key.into()), body);
        Ok(())
    }

    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), PortError> {
        let body = self.get(bucket, key).await?;
        *self
            .state
            .lock()
            .unwrap()
            .downloads
            .entry(key.to_string())
            .or_default() += 1;
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, &body).await?;
        Ok(())
    }

    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), PortError> {
        {
            let mut state = self.state.lock().unwrap();
            match state.uploads_left.as_mut() {
                Some(0) => return Err("upload refused".into()),
                Some(left) => *left -= 1,
                None => {}
            }
            if state.drop_uploads {
                return Ok(());
            }
        }
        let body = tokio::fs::read(local_path).await?;
        self.put(bucket, key, Bytes::from(body), "application/octet-stream")
            .await
    }

    async fn list_by_prefix(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, PortError> {
        Ok(self.list(bucket, prefix))
    }
}

#[derive(Clone, Default)]
pub struct MemoryQueue {
    jobs: Arc<Mutex<VecDeque<Job>>>,
}

impl MemoryQueue {
    /// Jobs still waiting, oldest first.
    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl JobQueuePort for MemoryQueue {
    async fn enqueue_job(&self, job: Job) -> Result<(), PortError> {
        self.jobs.lock().unwrap().push_back(job);
        Ok(())
    }

    async fn dequeue_job(&self, _timeout_secs: f64) -> Result<Option<Job>, PortError> {
        Ok(self.jobs.lock().unwrap().pop_front())
    }
}

#[derive(Clone, Default)]
pub struct MemoryRepository {
    tasks: Arc<Mutex<HashMap<TaskId, VideoTask>>>,
}

#[async_trait]
impl TaskRepository for MemoryRepository {
    async fn save_task(&self, task: &VideoTask) -> Result<(), PortError> {
        self.tasks
            .lock()
            .unwrap()
            .insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<VideoTask>, PortError> {
        Ok(self.tasks.lock().unwrap().get(id).cloned())
    }
}

/// Storage, queue and repository wired into one dispatcher.
pub struct Harness {
    pub storage: MemoryStorage,
    pub queue: MemoryQueue,
    pub repo: MemoryRepository,
    pub tasks: TaskDispatcher,
}

impl Harness {
    pub fn new() -> Self {
        let queue = MemoryQueue::default();
        let repo = MemoryRepository::default();
        Self {
            storage: MemoryStorage::default(),
            tasks: TaskDispatcher::new(Arc::new(queue.clone()), Arc::new(repo.clone())),
            queue,
            repo,
        }
    }
}

#[derive(Default)]
struct MediaState {
    trims: Vec<(String, f64, f64)>,
    concats: Vec<usize>,
    fail_trim: bool,
    fail_concat: bool,
}

/// Media tool that writes small text files instead of video.
///
/// Trimmed files hold `<source>:<start>-<end>` lines; concatenation joins
/// them, so a rendered object spells out exactly which spans it contains.
#[derive(Clone)]
pub struct FakeMedia {
    duration: f64,
    cuts: Vec<f64>,
    state: Arc<Mutex<MediaState>>,
}

impl FakeMedia {
    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration,
            cuts: Vec::new(),
            state: Arc::default(),
        }
    }

    pub fn with_cuts(mut self, cuts: &[f64]) -> Self {
        self.cuts = cuts.to_vec();
        self
    }

    pub fn fail_trims(&self) {
        self.state.lock().unwrap().fail_trim = true;
    }

    pub fn fail_concats(&self) {
        self.state.lock().unwrap().fail_concat = true;
    }

    pub fn trims(&self) -> Vec<(String, f64, f64)> {
        self.state.lock().unwrap().trims.clone()
    }

    pub fn concat_calls(&self) -> Vec<usize> {
        self.state.lock().unwrap().concats.clone()
    }
}

#[async_trait]
impl MediaPort for FakeMedia {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, PortError> {
        if !path.exists() {
            return Err(format!("{}: no such file", path.display()).into());
        }
        Ok(MediaInfo {
            duration_seconds: self.duration,
        })
    }

    async fn segment(
        &self,
        _input: &Path,
        windows: &[SegmentWindow],
        output_dir: &Path,
        parent_key: &str,
    ) -> Result<Vec<PathBuf>, PortError> {
        let mut produced = Vec::new();
        for window in windows {
            let path = output_dir.join(layout::segment_file_name(parent_key, window.index));
            tokio::fs::write(
                &path,
                format!("{}-{}", window.start_offset_seconds, window.end_seconds()),
            )
            .await?;
            produced.push(path);
        }
        Ok(produced)
    }

    async fn trim(&self, input: &Path, start: f64, end: f64, output: &Path) -> Result<(), PortError> {
        let source = layout::local_file_name(input).unwrap_or_default().to_string();
        {
            let mut state = self.state.lock().unwrap();
            if state.fail_trim {
                return Err("trim exited with status 1".into());
            }
            state.trims.push((source.clone(), start, end));
        }
        tokio::fs::write(output, format!("{}:{}-{}\n", source, start, end)).await?;
        Ok(())
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), PortError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.fail_concat {
                return Err("concat exited with status 1".into());
            }
            state.concats.push(inputs.len());
        }
        let mut joined = Vec::new();
        for input in inputs {
            joined.extend(tokio::fs::read(input).await?);
        }
        tokio::fs::write(output, joined).await?;
        Ok(())
    }

    async fn scene_cuts(&self, _input: &Path) -> Result<Vec<f64>, PortError> {
        Ok(self.cuts.clone())
    }
}

/// Speech recognizer that always hears the same words.
#[derive(Clone)]
pub struct FakeSpeech {
    transcript: Transcript,
}

impl FakeSpeech {
    pub fn saying(words: &[(&str, f64)]) -> Self {
        Self {
            transcript: Transcript {
                text: words.iter().map(|(w, _)| *w).collect::<Vec<_>>().join(" "),
                words: words
                    .iter()
                    .map(|(w, start)| Word {
                        word: w.to_string(),
                        start: *start,
                        end: start + 0.5,
                    })
                    .collect(),
            },
        }
    }
}

#[async_trait]
impl SpeechPort for FakeSpeech {
    async fn transcribe(&self, _path: &Path) -> Result<Transcript, PortError> {
        Ok(self.transcript.clone())
    }
}
