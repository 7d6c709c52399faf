//! 최적화 체크포인트 저장소.
//!
//! 실행(run) 하나의 완료 키 집합과 작업 결과를 내구성 있게 저장해서
//! 프로세스가 중단되어도 완료된 작업을 다시 실행하지 않고 결과도 잃지 않게 합니다.
//!
//! # 파일 레이아웃 ([`FileCheckpointStore`])
//!
//! ```text
//! <root>/<run_id>/
//!   results.jsonl   # JobRecord 한 줄씩, 추가 전용 (flush마다 fsync)
//!   progress.json   # 완료 키 집합, 임시 파일 + fsync + rename으로 원자적 교체
//!   report.json     # 최종 순위 리포트 (원자적 교체)
//! ```
//!
//! flush는 항상 결과 추가 → fsync → progress 교체 순서입니다. 두 단계 사이에서
//! 중단되면 progress에 없는 결과 줄은 로드 시 버려지고 다시 실행됩니다.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};
use tracing::{debug, warn};
use trader_core::ParameterSet;

use super::OptimizationReport;
use crate::performance::PerformanceSummary;

const RESULTS_FILE: &str = "results.jsonl";
const PROGRESS_FILE: &str = "progress.json";
const REPORT_FILE: &str = "report.json";

/// 체크포인트 오류
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// 파일 I/O 오류
    #[error("체크포인트 I/O 오류 ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 직렬화 오류
    #[error("체크포인트 직렬화 오류: {0}")]
    Serde(#[from] serde_json::Error),

    /// 결과 파일 중간 줄 손상 (마지막 줄이 아님)
    #[error("체크포인트 결과 파일 손상 ({path}:{line}): {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl CheckpointError {
    /// 재시도로 회복될 수 있는 오류인지 여부. 직렬화 오류와 파일 손상은 다시 읽어도 같습니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// 체크포인트 결과 타입
pub type CheckpointResult<T> = Result<T, CheckpointError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CheckpointError + '_ {
    move |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ================================================================================================
// 레코드 타입
// ================================================================================================

/// 작업 하나의 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// 시뮬레이션 + 평가 성공
    Completed { summary: PerformanceSummary },
    /// 작업 실패 (다시 실행하지 않음)
    Failed { error: String },
}

/// 완료된 작업 레코드 (results.jsonl 한 줄)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// ParameterSet 키
    pub key: String,
    pub params: ParameterSet,
    pub outcome: JobOutcome,
}

impl JobRecord {
    pub fn completed(params: ParameterSet, summary: PerformanceSummary) -> Self {
        Self {
            key: params.key(),
            params,
            outcome: JobOutcome::Completed { summary },
        }
    }

    pub fn failed(params: ParameterSet, error: impl Into<String>) -> Self {
        Self {
            key: params.key(),
            params,
            outcome: JobOutcome::Failed {
                error: error.into(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, JobOutcome::Failed { .. })
    }

    /// 성공한 작업의 성과 요약
    pub fn summary(&self) -> Option<&PerformanceSummary> {
        match &self.outcome {
            JobOutcome::Completed { summary } => Some(summary),
            JobOutcome::Failed { .. } => None,
        }
    }
}

/// progress.json 내용
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// 완료된 ParameterSet 키
    pub done_keys: BTreeSet<String>,
    /// 실패로 완료된 작업 수
    pub failed: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

/// 로드된 실행 상태. 완료 표시와 결과가 모두 저장된 레코드만 포함합니다.
#[derive(Debug, Clone, Default)]
pub struct CheckpointState {
    /// 키 → 레코드 (같은 키가 여러 번 저장되었으면 마지막 레코드)
    pub records: BTreeMap<String, JobRecord>,
}

impl CheckpointState {
    pub fn is_done(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ================================================================================================
// 저장소 트레이트
// ================================================================================================

/// 체크포인트 저장소.
///
/// 한 실행에 대한 쓰기는 단일 작성자(최적화 수집기)만 수행합니다.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// 실행 상태를 로드합니다. 기록이 없으면 빈 상태.
    async fn load(&self, run_id: &str) -> CheckpointResult<CheckpointState>;

    /// 레코드를 추가하고 해당 키를 완료로 표시합니다.
    ///
    /// 반환 시점에 레코드와 완료 표시가 모두 내구성 있게 저장되어 있어야 합니다.
    async fn flush(&self, run_id: &str, records: &[JobRecord]) -> CheckpointResult<()>;

    /// 최종 리포트를 저장합니다.
    async fn write_report(&self, run_id: &str, report: &OptimizationReport) -> CheckpointResult<()>;
}

// ================================================================================================
// 파일 저장소
// ================================================================================================

/// 디렉토리 기반 체크포인트 저장소
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 실행별 디렉토리
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    /// 저장된 최종 리포트를 읽습니다.
    pub async fn read_report(&self, run_id: &str) -> CheckpointResult<Option<OptimizationReport>> {
        let path = self.run_dir(run_id).join(REPORT_FILE);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    async fn read_progress(&self, dir: &Path) -> CheckpointResult<Progress> {
        let path = dir.join(PROGRESS_FILE);
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Progress::default()),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    async fn append_records(&self, dir: &Path, records: &[JobRecord]) -> CheckpointResult<()> {
        let mut buf = String::new();
        for record in records {
            buf.push_str(&serde_json::to_string(record)?);
            buf.push('\n');
        }

        let path = dir.join(RESULTS_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_error(&path))?;
        file.write_all(buf.as_bytes())
            .await
            .map_err(io_error(&path))?;
        file.sync_all().await.map_err(io_error(&path))?;
        Ok(())
    }
}

/// 임시 파일에 쓰고 fsync 후 rename으로 교체합니다. 읽는 쪽은 절반만 쓰인 파일을 보지 않습니다.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> CheckpointResult<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp).await.map_err(io_error(&tmp))?;
        file.write_all(bytes).await.map_err(io_error(&tmp))?;
        file.sync_all().await.map_err(io_error(&tmp))?;
    }
    fs::rename(&tmp, path).await.map_err(io_error(path))?;

    // rename 자체의 내구성. 디렉토리 fsync 미지원 플랫폼이 있어 실패는 기록만 함
    if let Err(e) = sync_parent_dir(path).await {
        debug!(path = %path.display(), error = %e, "디렉토리 fsync 실패");
    }
    Ok(())
}

/// 파일이 들어 있는 디렉토리를 fsync합니다. 상위 경로가 없으면 아무것도 하지 않습니다.
async fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => File::open(parent).await?.sync_all().await,
        _ => Ok(()),
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, run_id: &str) -> CheckpointResult<CheckpointState> {
        let dir = self.run_dir(run_id);
        let progress = self.read_progress(&dir).await?;

        let path = dir.join(RESULTS_FILE);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_error(&path)(e)),
        };

        let lines: Vec<&str> = content.lines().collect();
        let mut state = CheckpointState::default();
        let mut dropped = 0usize;

        for (i, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JobRecord>(line) {
                Ok(record) if progress.done_keys.contains(&record.key) => {
                    state.records.insert(record.key.clone(), record);
                }
                Ok(_) => dropped += 1,
                Err(e) if i + 1 == lines.len() => {
                    warn!(run_id, line = i + 1, error = %e, "잘린 마지막 결과 레코드 무시");
                    dropped += 1;
                }
                Err(e) => {
                    return Err(CheckpointError::Corrupt {
                        path,
                        line: i + 1,
                        reason: e.to_string(),
                    })
                }
            }
        }

        // 완료 표시 없는 줄과 잘린 줄을 정리해 다음 추가가 깨진 줄 뒤에 붙지 않게 함
        if dropped > 0 || (!content.is_empty() && !content.ends_with('\n')) {
            let mut buf = String::new();
            for record in state.records.values() {
                buf.push_str(&serde_json::to_string(record)?);
                buf.push('\n');
            }
            write_atomic(&path, buf.as_bytes()).await?;
            debug!(run_id, dropped, kept = state.records.len(), "결과 파일 정리");
        }

        Ok(state)
    }

    async fn flush(&self, run_id: &str, records: &[JobRecord]) -> CheckpointResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let dir = self.run_dir(run_id);
        fs::create_dir_all(&dir).await.map_err(io_error(&dir))?;

        self.append_records(&dir, records).await?;

        let mut progress = self.read_progress(&dir).await?;
        for record in records {
            if progress.done_keys.insert(record.key.clone()) && record.is_failed() {
                progress.failed += 1;
            }
        }
        progress.updated_at = Some(Utc::now());
        write_atomic(&dir.join(PROGRESS_FILE), &serde_json::to_vec_pretty(&progress)?).await
    }

    async fn write_report(&self, run_id: &str, report: &OptimizationReport) -> CheckpointResult<()> {
        let dir = self.run_dir(run_id);
        fs::create_dir_all(&dir).await.map_err(io_error(&dir))?;
        write_atomic(&dir.join(REPORT_FILE), &serde_json::to_vec_pretty(report)?).await
    }
}

// ================================================================================================
// 메모리 저장소
// ================================================================================================

#[derive(Debug, Default)]
struct MemoryRun {
    records: BTreeMap<String, JobRecord>,
    flushes: usize,
    report: Option<OptimizationReport>,
}

/// 프로세스 내 체크포인트 저장소 (테스트, 일회성 실행용)
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    runs: Mutex<HashMap<String, MemoryRun>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 레코드 수
    pub async fn record_count(&self, run_id: &str) -> usize {
        self.runs
            .lock()
            .await
            .get(run_id)
            .map_or(0, |run| run.records.len())
    }

    /// flush 호출 횟수
    pub async fn flush_count(&self, run_id: &str) -> usize {
        self.runs
            .lock()
            .await
            .get(run_id)
            .map_or(0, |run| run.flushes)
    }

    /// 저장된 최종 리포트
    pub async fn report(&self, run_id: &str) -> Option<OptimizationReport> {
        self.runs
            .lock()
            .await
            .get(run_id)
            .and_then(|run| run.report.clone())
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, run_id: &str) -> CheckpointResult<CheckpointState> {
        let runs = self.runs.lock().await;
        Ok(CheckpointState {
            records: runs
                .get(run_id)
                .map(|run| run.records.clone())
                .unwrap_or_default(),
        })
    }

    async fn flush(&self, run_id: &str, records: &[JobRecord]) -> CheckpointResult<()> {
        let mut runs = self.runs.lock().await;
        let run = runs.entry(run_id.to_string()).or_default();
        for record in records {
            run.records.insert(record.key.clone(), record.clone());
        }
        run.flushes += 1;
        Ok(())
    }

    async fn write_report(&self, run_id: &str, report: &OptimizationReport) -> CheckpointResult<()> {
        let mut runs = self.runs.lock().await;
        runs.entry(run_id.to_string()).or_default().report = Some(report.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fast: i64) -> JobRecord {
        let params = ParameterSet::for_strategy("ma_cross").with("fast_period", fast);
        JobRecord::completed(params, PerformanceSummary::default())
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());

        store.flush("run", &[record(1), record(2)]).await.unwrap();
        store.flush("run", &[record(3)]).await.unwrap();

        let state = store.load("run").await.unwrap();
        assert_eq!(state.len(), 3);
        assert!(state.is_done(&record(2).key));
        assert!(store.load("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_record_counted_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let failed = JobRecord::failed(ParameterSet::for_strategy("ma_cross"), "잘못된 파라미터");
        store.flush("run", &[failed.clone(), record(1)]).await.unwrap();

        let bytes = std::fs::read(store.run_dir("run").join(PROGRESS_FILE)).unwrap();
        let progress: Progress = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(progress.failed, 1);
        assert_eq!(progress.done_keys.len(), 2);

        let state = store.load("run").await.unwrap();
        assert!(state.records[&failed.key].is_failed());
    }

    #[tokio::test]
    async fn test_duplicate_key_keeps_last() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let first = record(1);
        let mut second = record(1);
        second.outcome = JobOutcome::Failed {
            error: "두 번째".to_string(),
        };
        store.flush("run", &[first]).await.unwrap();
        store.flush("run", &[second.clone()]).await.unwrap();

        let state = store.load("run").await.unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.records[&second.key], second);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryCheckpointStore::new();
        store.flush("run", &[record(1), record(1), record(2)]).await.unwrap();
        assert_eq!(store.record_count("run").await, 2);
        assert_eq!(store.flush_count("run").await, 1);
        assert_eq!(store.load("run").await.unwrap().len(), 2);
        assert!(store.report("run").await.is_none());
    }

    #[tokio::test]
    async fn test_sync_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sync_parent_dir(&dir.path().join("report.json")).await.is_ok());
        // 상대 경로 파일 이름만 있으면 건너뜀
        assert!(sync_parent_dir(Path::new("report.json")).await.is_ok());
        assert!(sync_parent_dir(&dir.path().join("missing").join("report.json"))
            .await
            .is_err());
    }

    #[test]
    fn test_only_io_errors_are_retryable() {
        let io = CheckpointError::Io {
            path: "results.jsonl".into(),
            source: std::io::Error::new(ErrorKind::Interrupted, "일시적 오류"),
        };
        let corrupt = CheckpointError::Corrupt {
            path: "results.jsonl".into(),
            line: 3,
            reason: "잘못된 JSON".to_string(),
        };
        assert!(io.is_retryable());
        assert!(!corrupt.is_retryable());
    }
}
