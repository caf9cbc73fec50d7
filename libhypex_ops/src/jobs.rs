use std::collections::{BTreeMap, VecDeque};
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use time::OffsetDateTime;

use super::constants::MAX_JOB_LOG_LINES;
use super::error::JobError;
use super::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Queued,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Status of a named background job
#[derive(Debug, Clone, PartialEq)]
pub struct JobInfo {
    pub status: JobStatus,
    pub started: OffsetDateTime,
    pub result: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct RunnerState {
    jobs: BTreeMap<String, JobInfo>,
    logs: VecDeque<String>,
}

impl RunnerState {
    fn log(&mut self, msg: &str) {
        let stamp = timestamp::clock_stamp(&timestamp::now()).unwrap_or_default();
        self.logs.push_back(format!("[{stamp}] {msg}"));
        while self.logs.len() > MAX_JOB_LOG_LINES {
            self.logs.pop_front();
        }
    }

    fn update(&mut self, name: &str, status: JobStatus) {
        if let Some(info) = self.jobs.get_mut(name) {
            info.status = status;
        }
    }
}

/// JobRunner runs named tasks on their own threads.
///
/// Each job moves through queued -> running -> done | failed. The runner keeps the status
/// of every job by name and a rolling log of the most recent lines, both of which the UI
/// polls.
#[derive(Debug, Default)]
pub struct JobRunner {
    state: Arc<Mutex<RunnerState>>,
    workers: Vec<JoinHandle<()>>,
}

fn lock(state: &Mutex<RunnerState>) -> Result<MutexGuard<'_, RunnerState>, JobError> {
    state.lock().map_err(|_| JobError::Poisoned)
}

impl JobRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a job. Fire and forget; poll `jobs` and `logs` to follow it.
    pub fn start<F, T, E>(&mut self, name: &str, job: F) -> Result<(), JobError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Display,
        E: Display,
    {
        {
            let mut state = lock(&self.state)?;
            if let Some(info) = state.jobs.get(name) {
                if !info.status.is_finished() {
                    return Err(JobError::AlreadyRunning(name.to_string()));
                }
            }
            state.jobs.insert(
                name.to_string(),
                JobInfo {
                    status: JobStatus::Queued,
                    started: timestamp::now(),
                    result: None,
                    error: None,
                },
            );
        }

        let state = self.state.clone();
        let job_name = name.to_string();
        match std::thread::Builder::new()
            .name(format!("job-{name}"))
            .spawn(move || run_job(state, job_name, job))
        {
            Ok(handle) => {
                self.workers.push(handle);
                Ok(())
            }
            Err(e) => {
                let mut state = lock(&self.state)?;
                state.update(name, JobStatus::Failed);
                state.log(&format!("{name}: FAILED → {e}"));
                Err(JobError::IOError(e))
            }
        }
    }

    /// Snapshot of every job started so far
    pub fn jobs(&self) -> Result<BTreeMap<String, JobInfo>, JobError> {
        Ok(lock(&self.state)?.jobs.clone())
    }

    /// Snapshot of the rolling log, oldest line first
    pub fn logs(&self) -> Result<Vec<String>, JobError> {
        Ok(lock(&self.state)?.logs.iter().cloned().collect())
    }

    /// Check if there are any jobs still doing stuff
    pub fn any_alive(&self) -> bool {
        self.workers.iter().any(|w| !w.is_finished())
    }

    /// Join every worker thread that has finished
    pub fn reap(&mut self) {
        let (finished, alive): (Vec<_>, Vec<_>) =
            self.workers.drain(..).partition(|w| w.is_finished());
        self.workers = alive;
        for worker in finished {
            if worker.join().is_err() {
                spdlog::error!("An error occured joining one of the job workers!");
            }
        }
    }

    /// Block until every job has finished
    pub fn wait_all(&mut self) {
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                spdlog::error!("An error occured joining one of the job workers!");
            }
        }
    }
}

fn run_job<F, T, E>(state: Arc<Mutex<RunnerState>>, name: String, job: F)
where
    F: FnOnce() -> Result<T, E>,
    T: Display,
    E: Display,
{
    if let Ok(mut s) = state.lock() {
        s.update(&name, JobStatus::Running);
        s.log(&format!("{name}: started"));
    }
    spdlog::info!("Job {} started", name);

    let outcome = match std::panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(Ok(result)) => Ok(result.to_string()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(String::from("job panicked")),
    };

    let mut s = match state.lock() {
        Ok(s) => s,
        Err(_) => {
            spdlog::error!("Job {} finished but the runner state was poisoned", name);
            return;
        }
    };
    match outcome {
        Ok(result) => {
            if let Some(info) = s.jobs.get_mut(&name) {
                info.status = JobStatus::Done;
                info.result = Some(result);
            }
            s.log(&format!("{name}: finished successfully"));
            spdlog::info!("Job {} finished", name);
        }
        Err(e) => {
            if let Some(info) = s.jobs.get_mut(&name) {
                info.status = JobStatus::Failed;
                info.error = Some(e.clone());
            }
            s.log(&format!("{name}: FAILED → {e}"));
            spdlog::error!("Job {} failed: {}", name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_success() {
        let mut runner = JobRunner::new();
        runner
            .start("sum", || Ok::<_, String>(2 + 2))
            .unwrap();
        runner.wait_all();
        let jobs = runner.jobs().unwrap();
        assert_eq!(jobs["sum"].status, JobStatus::Done);
        assert_eq!(jobs["sum"].result.as_deref(), Some("4"));
        let logs = runner.logs().unwrap();
        assert!(logs[0].ends_with("sum: started"));
        assert!(logs[1].ends_with("sum: finished successfully"));
    }

    #[test]
    fn test_job_failure() {
        let mut runner = JobRunner::new();
        runner
            .start("bad", || Err::<u32, _>("no data"))
            .unwrap();
        runner.start("boom", || -> Result<u32, String> { panic!("oops") }).unwrap();
        runner.wait_all();
        let jobs = runner.jobs().unwrap();
        assert_eq!(jobs["bad"].status, JobStatus::Failed);
        assert_eq!(jobs["bad"].error.as_deref(), Some("no data"));
        assert_eq!(jobs["boom"].status, JobStatus::Failed);
        assert!(runner
            .logs()
            .unwrap()
            .iter()
            .any(|l| l.ends_with("bad: FAILED → no data")));
    }

    #[test]
    fn test_log_is_bounded() {
        let mut state = RunnerState::default();
        for idx in 0..(MAX_JOB_LOG_LINES + 20) {
            state.log(&format!("line {idx}"));
        }
        assert_eq!(state.logs.len(), MAX_JOB_LOG_LINES);
        assert!(state.logs[0].ends_with("line 20"));
    }

    #[test]
    fn test_duplicate_name_rejected_while_running() {
        let mut runner = JobRunner::new();
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        runner
            .start("slow", move || rx.recv().map(|_| "ok"))
            .unwrap();
        assert!(matches!(
            runner.start("slow", || Ok::<_, String>(1)),
            Err(JobError::AlreadyRunning(_))
        ));
        tx.send(()).unwrap();
        runner.wait_all();
        runner.start("slow", || Ok::<_, String>(1)).unwrap();
        runner.wait_all();
        assert_eq!(runner.jobs().unwrap()["slow"].status, JobStatus::Done);
    }
}
