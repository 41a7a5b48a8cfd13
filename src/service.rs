use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info};
use uuid::Uuid;

use crate::{
    config::RunnerConfig,
    datatypes::{JobRecord, SimulationRequest},
    error::SimError,
    runner::JobRunner,
    solver::Solver,
    store::JobStore,
};

/// Entry point for callers: submit jobs and query their status
pub struct JobService {
    store: Arc<dyn JobStore>,
    runner: Arc<JobRunner>,
}

impl JobService {
    pub fn new(store: Arc<dyn JobStore>, solver: Arc<dyn Solver>, config: RunnerConfig) -> JobService {
        let runner = Arc::new(JobRunner::new(Arc::clone(&store), solver, config));
        JobService { store, runner }
    }

    /// Records a new running job and starts it on its own thread
    ///
    /// Returns the initial record straight away.
    pub fn submit(&self, request: SimulationRequest) -> JobRecord {
        let record = JobRecord::running(Uuid::new_v4().to_string());
        self.store.put(record.clone());
        info!(
            "accepted job {} ({}, {})",
            record.id, request.name, request.simulation_type
        );

        let runner = Arc::clone(&self.runner);
        let job_id = record.id.clone();
        let task_request = request.clone();
        let spawned = thread::Builder::new()
            .name(format!("job-{}", &record.id[..8]))
            .spawn(move || runner.run(&job_id, &task_request));

        if let Err(err) = spawned {
            error!(
                "job {}: could not spawn worker thread ({err}), running inline",
                record.id
            );
            self.runner.run(&record.id, &request);
        }

        record
    }

    pub fn status(&self, job_id: &str) -> Result<JobRecord, SimError> {
        self.store
            .get(job_id)
            .ok_or_else(|| SimError::NotFound(job_id.to_owned()))
    }

    /// Polls a job until it completes, handing every observed record to `observe`
    pub fn wait(
        &self,
        job_id: &str,
        poll: Duration,
        mut observe: impl FnMut(&JobRecord),
    ) -> Result<JobRecord, SimError> {
        loop {
            let record = self.status(job_id)?;
            observe(&record);
            if record.is_completed() {
                return Ok(record);
            }
            thread::sleep(poll);
        }
    }
}
