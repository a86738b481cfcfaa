//! 集成测试共用的内存实现
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use deep2d_pipeline::clients::{JobService, JobSpec, MetadataSource};
use deep2d_pipeline::config::Config;
use deep2d_pipeline::error::{ActionError, AppError, AppResult, ServiceError};
use deep2d_pipeline::models::{JobId, JobMetadata, JobStatus, OutputResult};
use deep2d_pipeline::services::FollowUpAction;

/// 按脚本返回状态的作业服务
///
/// - 未编写脚本的作业直接返回 `completed`
/// - 脚本只剩最后一条时重复返回该条
/// - 新作业 ID 从 J100 开始递增
pub struct ScriptedJobService {
    statuses: Mutex<HashMap<String, VecDeque<Result<JobStatus, ServiceError>>>>,
    queries: Mutex<Vec<(String, Instant)>>,
    created: Mutex<Vec<(JobId, JobSpec)>>,
    enqueued: Mutex<Vec<JobId>>,
    reject_classes: Mutex<HashSet<String>>,
    next_id: AtomicU32,
}

impl ScriptedJobService {
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(HashMap::new()),
            queries: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            enqueued: Mutex::new(Vec::new()),
            reject_classes: Mutex::new(HashSet::new()),
            next_id: AtomicU32::new(100),
        }
    }

    pub fn script(&self, job: &str, replies: Vec<Result<JobStatus, ServiceError>>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(job.to_string(), replies.into());
    }

    /// 拒绝创建指定类别的挑选作业
    pub fn reject_class(&self, class_idx: u32) {
        self.reject_classes
            .lock()
            .unwrap()
            .insert(class_idx.to_string());
    }

    pub fn query_count(&self, job: &str) -> usize {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|(queried, _)| queried == job)
            .count()
    }

    pub fn total_queries(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn query_times(&self, job: &str) -> Vec<Instant> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|(queried, _)| queried == job)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn created(&self) -> Vec<(JobId, JobSpec)> {
        self.created.lock().unwrap().clone()
    }

    pub fn created_of_type(&self, job_type: &str) -> Vec<JobSpec> {
        self.created()
            .into_iter()
            .filter(|(_, spec)| spec.job_type == job_type)
            .map(|(_, spec)| spec)
            .collect()
    }

    pub fn enqueued(&self) -> Vec<JobId> {
        self.enqueued.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobService for ScriptedJobService {
    async fn get_status(&self, _project: &str, job: &JobId) -> Result<JobStatus, ServiceError> {
        self.queries
            .lock()
            .unwrap()
            .push((job.to_string(), Instant::now()));

        let mut statuses = self.statuses.lock().unwrap();
        match statuses.get_mut(job.as_str()) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or(Ok(JobStatus::Completed)),
            None => Ok(JobStatus::Completed),
        }
    }

    async fn create_job(&self, spec: &JobSpec) -> Result<JobId, ServiceError> {
        if let Some(class_idx) = spec.params.get("class_idx") {
            if self.reject_classes.lock().unwrap().contains(class_idx) {
                return Err(ServiceError::Rejected {
                    op: "make_job",
                    reason: format!("class {} rejected", class_idx),
                });
            }
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let job = JobId::parse(&format!("J{}", n)).unwrap();
        self.created
            .lock()
            .unwrap()
            .push((job.clone(), spec.clone()));
        Ok(job)
    }

    async fn enqueue(&self, _project: &str, job: &JobId, _lane: &str) -> Result<(), ServiceError> {
        self.enqueued.lock().unwrap().push(job.clone());
        Ok(())
    }
}

/// 内存中的作业元数据
#[derive(Default)]
pub struct InMemoryMetadata {
    jobs: HashMap<String, JobMetadata>,
}

impl InMemoryMetadata {
    pub fn with_particles(job: &str, particles: u64) -> Self {
        let mut jobs = HashMap::new();
        jobs.insert(
            job.to_string(),
            JobMetadata {
                output_results: vec![OutputResult {
                    name: Some("particles_selected".to_string()),
                    num_items: vec![serde_json::json!(particles)],
                }],
                ..Default::default()
            },
        );
        Self { jobs }
    }
}

#[async_trait]
impl MetadataSource for InMemoryMetadata {
    async fn fetch(&self, job: &JobId) -> AppResult<JobMetadata> {
        self.jobs
            .get(job.as_str())
            .cloned()
            .ok_or_else(|| AppError::Metadata {
                path: job.to_string(),
                reason: "not found".to_string(),
            })
    }
}

/// 记录触发情况的后续动作
pub struct RecordingAction {
    triggered: Mutex<Vec<JobId>>,
    delay: Duration,
    fail: bool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingAction {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            triggered: Mutex::new(Vec::new()),
            delay,
            fail: false,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn triggered(&self) -> Vec<JobId> {
        self.triggered.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FollowUpAction for RecordingAction {
    async fn trigger(&self, job: &JobId) -> Result<(), ActionError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.triggered.lock().unwrap().push(job.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return Err(ActionError::NonZeroExit {
                program: "run.sh".to_string(),
                code: Some(1),
            });
        }
        Ok(())
    }
}

/// 日志与失败记录写入临时目录的配置
pub fn test_config(dir: &Path) -> Config {
    Config {
        output_log_file: dir.join("run.txt").display().to_string(),
        failure_log_file: dir.join("failed.txt").display().to_string(),
        ..Config::default()
    }
}
