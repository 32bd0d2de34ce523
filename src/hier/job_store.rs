//! Durable store for job/session state: plans, pending approvals, and the
//! executed-action dedup set (§6.4).
//!
//! Structurally mirrors the teacher's [`crate::checkpoint::CheckpointStore`]
//! three-tier pattern (Memory/File/Sqlite); field shapes grounded on
//! `state/job_store.py`.

use std::collections::HashMap;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::model::{Job, JobStatus, PendingAction, StrategicPlan};

#[async_trait]
#[cfg_attr(test, automock)]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, job_id: &str) -> Result<Job, String>;
    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, String>;
    async fn update_orchestrator_plan(&self, job_id: &str, plan: StrategicPlan) -> Result<(), String>;
    async fn update_manager_plan(&self, job_id: &str, manager_name: &str, plan: StrategicPlan) -> Result<(), String>;
    async fn save_pending_action(&self, job_id: &str, action: PendingAction) -> Result<(), String>;
    async fn clear_pending_action(&self, job_id: &str) -> Result<(), String>;
    async fn save_approvals(&self, job_id: &str, approvals: HashMap<String, bool>) -> Result<(), String>;
    async fn add_executed_action(&self, job_id: &str, signature: &str) -> Result<(), String>;
    async fn has_executed_action(&self, job_id: &str, signature: &str) -> Result<bool, String>;
    async fn bump_phase(&self, job_id: &str, manager_name: &str) -> Result<usize, String>;
    async fn set_status(&self, job_id: &str, status: JobStatus) -> Result<(), String>;
    async fn list_sessions(&self) -> Result<Vec<String>, String>;
}

/// In-memory store for tests and short-lived runs.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: std::sync::Mutex<HashMap<String, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_job<F, T>(&self, job_id: &str, f: F) -> Result<T, String>
    where
        F: FnOnce(&mut Job) -> T,
    {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(job_id).ok_or_else(|| format!("unknown job: {job_id}"))?;
        let result = f(job);
        job.updated_at = chrono::Utc::now();
        Ok(result)
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(&self, job_id: &str) -> Result<Job, String> {
        let job = Job::new(job_id);
        self.jobs.lock().unwrap().insert(job_id.to_string(), job.clone());
        Ok(job)
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, String> {
        Ok(self.jobs.lock().unwrap().get(job_id).cloned())
    }

    async fn update_orchestrator_plan(&self, job_id: &str, plan: StrategicPlan) -> Result<(), String> {
        self.with_job(job_id, |job| job.orchestrator_plan = Some(plan))
    }

    async fn update_manager_plan(&self, job_id: &str, manager_name: &str, plan: StrategicPlan) -> Result<(), String> {
        self.with_job(job_id, |job| {
            job.manager_plans.insert(manager_name.to_string(), plan);
        })
    }

    async fn save_pending_action(&self, job_id: &str, action: PendingAction) -> Result<(), String> {
        self.with_job(job_id, |job| {
            job.pending_action = Some(action);
            job.status = JobStatus::AwaitingApproval;
        })
    }

    async fn clear_pending_action(&self, job_id: &str) -> Result<(), String> {
        self.with_job(job_id, |job| {
            job.pending_action = None;
            job.status = JobStatus::Running;
        })
    }

    async fn save_approvals(&self, job_id: &str, approvals: HashMap<String, bool>) -> Result<(), String> {
        self.with_job(job_id, |job| job.approvals.extend(approvals))
    }

    async fn add_executed_action(&self, job_id: &str, signature: &str) -> Result<(), String> {
        self.with_job(job_id, |job| {
            if !job.executed_actions.iter().any(|s| s == signature) {
                job.executed_actions.push(signature.to_string());
            }
        })
    }

    async fn has_executed_action(&self, job_id: &str, signature: &str) -> Result<bool, String> {
        self.with_job(job_id, |job| job.executed_actions.iter().any(|s| s == signature))
    }

    async fn bump_phase(&self, job_id: &str, manager_name: &str) -> Result<usize, String> {
        self.with_job(job_id, |job| {
            let entry = job.phase_index_by_manager.entry(manager_name.to_string()).or_insert(0);
            *entry += 1;
            *entry
        })
    }

    async fn set_status(&self, job_id: &str, status: JobStatus) -> Result<(), String> {
        self.with_job(job_id, |job| job.status = status)
    }

    async fn list_sessions(&self) -> Result<Vec<String>, String> {
        Ok(self.jobs.lock().unwrap().keys().cloned().collect())
    }
}

/// One-JSON-file-per-job store, mirroring `FileCheckpointStore`.
pub struct FileJobStore {
    base_path: std::path::PathBuf,
}

impl FileJobStore {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        let path = path.into();
        let _ = std::fs::create_dir_all(&path);
        Self { base_path: path }
    }

    fn job_path(&self, job_id: &str) -> std::path::PathBuf {
        self.base_path.join(format!("{job_id}.json"))
    }

    fn read_job(&self, job_id: &str) -> Result<Option<Job>, String> {
        let path = self.job_path(job_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path).map_err(|e| e.to_string())?;
        serde_json::from_str(&data).map(Some).map_err(|e| e.to_string())
    }

    fn write_job(&self, job: &Job) -> Result<(), String> {
        let data = serde_json::to_string_pretty(job).map_err(|e| e.to_string())?;
        std::fs::write(self.job_path(&job.job_id), data).map_err(|e| e.to_string())
    }

    fn mutate<F, T>(&self, job_id: &str, f: F) -> Result<T, String>
    where
        F: FnOnce(&mut Job) -> T,
    {
        let mut job = self.read_job(job_id)?.ok_or_else(|| format!("unknown job: {job_id}"))?;
        let result = f(&mut job);
        job.updated_at = chrono::Utc::now();
        self.write_job(&job)?;
        Ok(result)
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn create_job(&self, job_id: &str) -> Result<Job, String> {
        let job = Job::new(job_id);
        self.write_job(&job)?;
        Ok(job)
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, String> {
        self.read_job(job_id)
    }

    async fn update_orchestrator_plan(&self, job_id: &str, plan: StrategicPlan) -> Result<(), String> {
        self.mutate(job_id, |job| job.orchestrator_plan = Some(plan))
    }

    async fn update_manager_plan(&self, job_id: &str, manager_name: &str, plan: StrategicPlan) -> Result<(), String> {
        self.mutate(job_id, |job| {
            job.manager_plans.insert(manager_name.to_string(), plan);
        })
    }

    async fn save_pending_action(&self, job_id: &str, action: PendingAction) -> Result<(), String> {
        self.mutate(job_id, |job| {
            job.pending_action = Some(action);
            job.status = JobStatus::AwaitingApproval;
        })
    }

    async fn clear_pending_action(&self, job_id: &str) -> Result<(), String> {
        self.mutate(job_id, |job| {
            job.pending_action = None;
            job.status = JobStatus::Running;
        })
    }

    async fn save_approvals(&self, job_id: &str, approvals: HashMap<String, bool>) -> Result<(), String> {
        self.mutate(job_id, |job| job.approvals.extend(approvals))
    }

    async fn add_executed_action(&self, job_id: &str, signature: &str) -> Result<(), String> {
        self.mutate(job_id, |job| {
            if !job.executed_actions.iter().any(|s| s == signature) {
                job.executed_actions.push(signature.to_string());
            }
        })
    }

    async fn has_executed_action(&self, job_id: &str, signature: &str) -> Result<bool, String> {
        self.mutate(job_id, |job| job.executed_actions.iter().any(|s| s == signature))
    }

    async fn bump_phase(&self, job_id: &str, manager_name: &str) -> Result<usize, String> {
        self.mutate(job_id, |job| {
            let entry = job.phase_index_by_manager.entry(manager_name.to_string()).or_insert(0);
            *entry += 1;
            *entry
        })
    }

    async fn set_status(&self, job_id: &str, status: JobStatus) -> Result<(), String> {
        self.mutate(job_id, |job| job.status = status)
    }

    async fn list_sessions(&self) -> Result<Vec<String>, String> {
        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&self.base_path).map_err(|e| e.to_string())? {
            let entry = entry.map_err(|e| e.to_string())?;
            if let Some(stem) = entry.path().file_stem() {
                sessions.push(stem.to_string_lossy().to_string());
            }
        }
        Ok(sessions)
    }
}

/// SQLite-backed store, mirroring `SqliteCheckpointStore`. The job's mutable
/// fields are kept as a single JSON blob column since all lookups are by
/// exact `job_id`, never a range scan.
pub struct SqliteJobStore {
    path: std::path::PathBuf,
}

impl SqliteJobStore {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Result<Self, String> {
        let path = path.into();
        let conn = rusqlite::Connection::open(&path).map_err(|e| e.to_string())?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS jobs (
                job_id TEXT PRIMARY KEY,
                data   TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| e.to_string())?;
        Ok(Self { path })
    }

    fn get_conn(&self) -> Result<rusqlite::Connection, String> {
        rusqlite::Connection::open(&self.path).map_err(|e| e.to_string())
    }

    fn read_job(&self, job_id: &str) -> Result<Option<Job>, String> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT data FROM jobs WHERE job_id = ?1").map_err(|e| e.to_string())?;
        let mut rows = stmt.query(rusqlite::params![job_id]).map_err(|e| e.to_string())?;
        if let Some(row) = rows.next().map_err(|e| e.to_string())? {
            let data: String = row.get(0).map_err(|e| e.to_string())?;
            serde_json::from_str(&data).map(Some).map_err(|e| e.to_string())
        } else {
            Ok(None)
        }
    }

    fn write_job(&self, job: &Job) -> Result<(), String> {
        let conn = self.get_conn()?;
        let data = serde_json::to_string(job).map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO jobs (job_id, data) VALUES (?1, ?2)
             ON CONFLICT(job_id) DO UPDATE SET data = excluded.data",
            rusqlite::params![job.job_id, data],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    fn mutate<F, T>(&self, job_id: &str, f: F) -> Result<T, String>
    where
        F: FnOnce(&mut Job) -> T,
    {
        let mut job = self.read_job(job_id)?.ok_or_else(|| format!("unknown job: {job_id}"))?;
        let result = f(&mut job);
        job.updated_at = chrono::Utc::now();
        self.write_job(&job)?;
        Ok(result)
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn create_job(&self, job_id: &str) -> Result<Job, String> {
        let job = Job::new(job_id);
        self.write_job(&job)?;
        Ok(job)
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, String> {
        self.read_job(job_id)
    }

    async fn update_orchestrator_plan(&self, job_id: &str, plan: StrategicPlan) -> Result<(), String> {
        self.mutate(job_id, |job| job.orchestrator_plan = Some(plan))
    }

    async fn update_manager_plan(&self, job_id: &str, manager_name: &str, plan: StrategicPlan) -> Result<(), String> {
        self.mutate(job_id, |job| {
            job.manager_plans.insert(manager_name.to_string(), plan);
        })
    }

    async fn save_pending_action(&self, job_id: &str, action: PendingAction) -> Result<(), String> {
        self.mutate(job_id, |job| {
            job.pending_action = Some(action);
            job.status = JobStatus::AwaitingApproval;
        })
    }

    async fn clear_pending_action(&self, job_id: &str) -> Result<(), String> {
        self.mutate(job_id, |job| {
            job.pending_action = None;
            job.status = JobStatus::Running;
        })
    }

    async fn save_approvals(&self, job_id: &str, approvals: HashMap<String, bool>) -> Result<(), String> {
        self.mutate(job_id, |job| job.approvals.extend(approvals))
    }

    async fn add_executed_action(&self, job_id: &str, signature: &str) -> Result<(), String> {
        self.mutate(job_id, |job| {
            if !job.executed_actions.iter().any(|s| s == signature) {
                job.executed_actions.push(signature.to_string());
            }
        })
    }

    async fn has_executed_action(&self, job_id: &str, signature: &str) -> Result<bool, String> {
        self.mutate(job_id, |job| job.executed_actions.iter().any(|s| s == signature))
    }

    async fn bump_phase(&self, job_id: &str, manager_name: &str) -> Result<usize, String> {
        self.mutate(job_id, |job| {
            let entry = job.phase_index_by_manager.entry(manager_name.to_string()).or_insert(0);
            *entry += 1;
            *entry
        })
    }

    async fn set_status(&self, job_id: &str, status: JobStatus) -> Result<(), String> {
        self.mutate(job_id, |job| job.status = status)
    }

    async fn list_sessions(&self) -> Result<Vec<String>, String> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT job_id FROM jobs").map_err(|e| e.to_string())?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0)).map_err(|e| e.to_string())?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row.map_err(|e| e.to_string())?);
        }
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trips_a_job() {
        let store = MemoryJobStore::new();
        store.create_job("j1").await.unwrap();
        store.update_orchestrator_plan("j1", StrategicPlan::default()).await.unwrap();
        let job = store.get_job("j1").await.unwrap().unwrap();
        assert!(job.orchestrator_plan.is_some());
    }

    #[tokio::test]
    async fn executed_actions_are_deduplicated_by_signature() {
        let store = MemoryJobStore::new();
        store.create_job("j1").await.unwrap();
        assert!(!store.has_executed_action("j1", "sig-a").await.unwrap());
        store.add_executed_action("j1", "sig-a").await.unwrap();
        store.add_executed_action("j1", "sig-a").await.unwrap();
        assert!(store.has_executed_action("j1", "sig-a").await.unwrap());
        let job = store.get_job("j1").await.unwrap().unwrap();
        assert_eq!(job.executed_actions.len(), 1);
    }

    #[tokio::test]
    async fn pending_action_round_trip_sets_and_clears_status() {
        let store = MemoryJobStore::new();
        store.create_job("j1").await.unwrap();
        store
            .save_pending_action(
                "j1",
                PendingAction {
                    worker: "w1".to_string(),
                    tool: "delete_row".to_string(),
                    args: Default::default(),
                    manager: None,
                    resume_token: None,
                },
            )
            .await
            .unwrap();
        let job = store.get_job("j1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::AwaitingApproval);
        assert!(job.pending_action.is_some());

        store.clear_pending_action("j1").await.unwrap();
        let job = store.get_job("j1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.pending_action.is_none());
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileJobStore::new(dir.path());
            store.create_job("j1").await.unwrap();
            store.add_executed_action("j1", "sig-a").await.unwrap();
        }
        let store = FileJobStore::new(dir.path());
        assert!(store.has_executed_action("j1", "sig-a").await.unwrap());
        assert_eq!(store.list_sessions().await.unwrap(), vec!["j1".to_string()]);
    }

    #[tokio::test]
    async fn bump_phase_is_tracked_per_manager() {
        let store = MemoryJobStore::new();
        store.create_job("j1").await.unwrap();
        assert_eq!(store.bump_phase("j1", "mgr-a").await.unwrap(), 1);
        assert_eq!(store.bump_phase("j1", "mgr-a").await.unwrap(), 2);
        assert_eq!(store.bump_phase("j1", "mgr-b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn mocked_store_short_circuits_executed_action_checks() {
        let mut mock = MockJobStore::new();
        mock.expect_has_executed_action()
            .withf(|job_id, sig| job_id == "job-9" && sig == "tool:{}")
            .returning(|_, _| Ok(true));
        mock.expect_add_executed_action().returning(|_, _| Ok(()));

        assert!(mock.has_executed_action("job-9", "tool:{}").await.unwrap());
        mock.add_executed_action("job-9", "tool:{}").await.unwrap();
    }
}
