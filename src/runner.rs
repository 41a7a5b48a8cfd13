use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{info, warn};

use crate::{
    config::RunnerConfig,
    datatypes::{
        JobRecord, JobStatus, ResultPayload, ResultSource, SimulationRequest, SolverSummary,
    },
    error::SimError,
    progress::ProgressThrottle,
    solver::Solver,
    store::JobStore,
    synthesizer::{ResultSynthesizer, FALLBACK_SYNTHESIS_START},
};

/// Progress published as soon as a runner picks a job up
pub const PROGRESS_STARTED: u8 = 8;
pub const PROGRESS_COMPLETE: u8 = 100;

/// Drives one job from running to completed
///
/// The solver is tried first; any failure switches to synthetic results. The
/// job always finishes `completed`, with `source` telling the two apart.
pub struct JobRunner {
    store: Arc<dyn JobStore>,
    solver: Arc<dyn Solver>,
    config: RunnerConfig,
}

impl JobRunner {
    pub fn new(store: Arc<dyn JobStore>, solver: Arc<dyn Solver>, config: RunnerConfig) -> JobRunner {
        JobRunner {
            store,
            solver,
            config,
        }
    }

    pub fn run(&self, job_id: &str, request: &SimulationRequest) {
        let store = Arc::clone(&self.store);
        let initial = store
            .get(job_id)
            .map_or(JobRecord::INITIAL_PROGRESS, |r| r.progress);

        let mut throttle = ProgressThrottle::new(initial, self.config.min_tick, |value| {
            store.update(job_id, &mut |record| {
                record.progress = record.progress.max(value);
            });
        });
        throttle.observe(PROGRESS_STARTED);

        let synthesizer = ResultSynthesizer::new(job_id, request);

        let outcome = self.attempt_solve(request, &mut |p| throttle.observe(p));
        let payload = match outcome {
            Ok(summary) => {
                info!("job {job_id}: solver finished, max stress {:.4}", summary.max_stress);
                synthesizer.solver_backed(&summary, &mut |p| throttle.observe(p))
            }
            Err(err) => {
                warn!("job {job_id}: {err}; switching to fallback results");
                throttle.observe(FALLBACK_SYNTHESIS_START);
                synthesizer.fallback(&mut |p| throttle.observe(p))
            }
        };

        self.complete(job_id, payload);
    }

    /// Calls the solver, folding panics and inconsistent output into errors
    fn attempt_solve(
        &self,
        request: &SimulationRequest,
        progress: &mut dyn FnMut(u8),
    ) -> Result<SolverSummary, SimError> {
        let solver = &self.solver;
        let summary = panic::catch_unwind(AssertUnwindSafe(|| solver.solve(request, progress)))
            .map_err(|_| SimError::Solver("solver panicked".to_owned()))??;

        if !summary.is_consistent() {
            return Err(SimError::Solver(format!(
                "solver returned inconsistent summary {summary:?}"
            )));
        }

        Ok(summary)
    }

    /// The single terminal write: results, status and progress change together
    fn complete(&self, job_id: &str, payload: ResultPayload) {
        let source = payload.source;
        let mut payload = Some(payload);

        let updated = self.store.update(job_id, &mut |record| {
            record.results = payload.take();
            record.status = JobStatus::Completed;
            record.progress = PROGRESS_COMPLETE;
            record.error = None;
        });

        if !updated {
            warn!("job {job_id}: record vanished before completion, storing a new one");
            self.store.put(JobRecord {
                id: job_id.to_owned(),
                status: JobStatus::Completed,
                progress: PROGRESS_COMPLETE,
                results: payload.take(),
                error: None,
            });
        }

        match source {
            ResultSource::Solver => info!("job {job_id}: completed with solver results"),
            ResultSource::Fallback => info!("job {job_id}: completed with fallback results"),
        }
    }
}
