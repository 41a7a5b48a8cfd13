use std::sync::{Arc, Mutex};
use std::time::Duration;

use fea_jobs::{
    datatypes::{Material, SolverSummary, StressPoint},
    runner::JobRunner,
    synthesizer::ResultSynthesizer,
    InMemoryJobStore, JobRecord, JobService, JobStatus, JobStore, PlaneStressSolver,
    ResultSource, RunnerConfig, SimError, SimulationRequest, Solver, UnavailableSolver,
};

/// Wraps the in-memory store and remembers every progress value written
#[derive(Default)]
struct RecordingStore {
    inner: InMemoryJobStore,
    progress: Mutex<Vec<u8>>,
}

impl JobStore for RecordingStore {
    fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.inner.get(job_id)
    }

    fn put(&self, record: JobRecord) {
        self.inner.put(record)
    }

    fn update(&self, job_id: &str, apply: &mut dyn FnMut(&mut JobRecord)) -> bool {
        let mut after = None;
        let found = self.inner.update(job_id, &mut |record| {
            apply(record);
            after = Some((record.progress, record.status, record.results.is_some()));
        });
        if let Some((progress, status, has_results)) = after {
            // completion is only visible together with results
            assert!(status == JobStatus::Running || has_results);
            self.progress
                .lock()
                .expect("recording lock")
                .push(progress);
        }
        found
    }
}

fn fast_config() -> RunnerConfig {
    RunnerConfig {
        min_tick: Duration::from_millis(2),
        ..RunnerConfig::default()
    }
}

fn request(curve: Vec<StressPoint>) -> SimulationRequest {
    SimulationRequest {
        name: "bracket".to_owned(),
        material_id: 1,
        simulation_type: "static".to_owned(),
        applied_load: Some(1200.0),
        temperature: Some(40.0),
        duration: Some(10.0),
        frequency: Some(1.0),
        damping_ratio: Some(0.05),
        material: Material {
            id: 1,
            name: "steel".to_owned(),
            youngs_modulus: 200.0,
            poisson_ratio: 0.3,
            stress_strain_curve: curve,
        },
    }
}

fn reference_curve() -> Vec<StressPoint> {
    vec![
        StressPoint {
            strain: 0.0,
            stress: 0.0,
        },
        StressPoint {
            strain: 0.002,
            stress: 350.0,
        },
        StressPoint {
            strain: 0.02,
            stress: 500.0,
        },
    ]
}

#[test]
fn failing_solver_job_completes_with_fallback() {
    let service = JobService::new(
        Arc::new(InMemoryJobStore::new()),
        Arc::new(UnavailableSolver),
        fast_config(),
    );

    let submitted = service.submit(request(reference_curve()));
    assert_eq!(submitted.status, JobStatus::Running);
    assert_eq!(submitted.progress, 5);

    let record = service
        .wait(&submitted.id, Duration::from_millis(5), |_| {})
        .expect("job exists");

    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.progress, 100);
    assert!(record.error.is_none());
    let results = record.results.expect("results populated");
    assert_eq!(results.source, ResultSource::Fallback);
    assert!(results.warning.is_some_and(|w| !w.is_empty()));
    assert!(results.min_stress <= results.avg_stress);
    assert!(results.avg_stress <= results.max_stress);
}

#[test]
fn plane_stress_job_completes_with_solver_results() {
    let config = fast_config();
    let service = JobService::new(
        Arc::new(InMemoryJobStore::new()),
        Arc::new(PlaneStressSolver::new(config.solver)),
        config,
    );

    let submitted = service.submit(request(reference_curve()));
    let record = service
        .wait(&submitted.id, Duration::from_millis(5), |_| {})
        .expect("job exists");

    let results = record.results.expect("results populated");
    assert_eq!(results.source, ResultSource::Solver);
    assert!(results.warning.is_none());
    assert!(results.max_stress > 0.0);
    assert!(results.min_stress <= results.avg_stress);
    assert!(results.avg_stress <= results.max_stress);
    assert!((results.stress_range - (results.max_stress - results.min_stress)).abs() < 1e-9);
    assert!((results.safety_factor - 450.0 / results.max_stress).abs() < 1e-9);
    let hotspots = results.hotspots.expect("solver results carry hotspots");
    assert_eq!(hotspots.len(), 1);
    assert_eq!(hotspots[0].value, results.max_stress);
}

#[test]
fn progress_is_monotonic_and_capped_until_completion() {
    for solver in [
        Arc::new(UnavailableSolver) as Arc<dyn Solver>,
        Arc::new(PlaneStressSolver::default()),
    ] {
        let store = Arc::new(RecordingStore::default());
        store.put(JobRecord::running("job-1".to_owned()));

        JobRunner::new(store.clone(), solver, fast_config())
            .run("job-1", &request(reference_curve()));

        let seen = store.progress.lock().expect("recording lock").clone();
        let (last, running) = seen.split_last().expect("progress was published");
        assert_eq!(*last, 100);
        assert!(running.iter().all(|p| *p <= 99));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(running.first(), Some(&8));
    }
}

#[test]
fn fallback_is_bit_identical_for_the_same_job() {
    let req = request(reference_curve());
    let first = ResultSynthesizer::new("job-42", &req).fallback(&mut |_| {});
    let second = ResultSynthesizer::new("job-42", &req).fallback(&mut |_| {});

    assert_eq!(first.stress_strain_curve, second.stress_strain_curve);
    assert_eq!(first.time_series_data, second.time_series_data);
    for (a, b) in first
        .time_series_data
        .iter()
        .zip(second.time_series_data.iter())
    {
        assert_eq!(a.stress.to_bits(), b.stress.to_bits());
    }
}

#[test]
fn empty_curve_fallback_reports_zero_stress() {
    let req = request(Vec::new());
    let payload = ResultSynthesizer::new("job-0", &req).fallback(&mut |_| {});

    assert_eq!(payload.stress_strain_curve, vec![StressPoint { strain: 0.0, stress: 0.0 }]);
    assert_eq!(payload.max_stress, 0.0);
    assert_eq!(payload.min_stress, 0.0);
    assert_eq!(payload.avg_stress, 0.0);
    assert_eq!(payload.safety_factor, 0.0);
    assert!(payload
        .time_series_data
        .iter()
        .all(|p| p.stress >= 0.0 && p.displacement >= 0.0));
}

#[test]
fn solver_backed_safety_factor_matches_reference() {
    let req = request(vec![
        StressPoint {
            strain: 0.0,
            stress: 0.0,
        },
        StressPoint {
            strain: 0.01,
            stress: 500.0,
        },
    ]);
    let summary = SolverSummary {
        max_stress: 250.0,
        min_stress: 5.0,
        avg_stress: 80.0,
        max_strain: 0.001,
        avg_strain: 0.0004,
        max_deformation: 0.003,
        hotspot_location: [0.1, 0.0],
    };
    let payload = ResultSynthesizer::new("job-9", &req).solver_backed(&summary, &mut |_| {});
    assert!((payload.safety_factor - 1.8).abs() < 1e-12);
}

#[test]
fn unknown_job_lookup_fails() {
    let service = JobService::new(
        Arc::new(InMemoryJobStore::new()),
        Arc::new(UnavailableSolver),
        fast_config(),
    );
    assert!(matches!(
        service.status("missing"),
        Err(SimError::NotFound(id)) if id == "missing"
    ));
}

#[test]
fn completed_record_serializes_with_wire_names() {
    let service = JobService::new(
        Arc::new(InMemoryJobStore::new()),
        Arc::new(UnavailableSolver),
        fast_config(),
    );
    let submitted = service.submit(request(reference_curve()));
    let record = service
        .wait(&submitted.id, Duration::from_millis(5), |_| {})
        .expect("job exists");

    let value = serde_json::to_value(&record).expect("record serializes");
    assert_eq!(value["status"], "completed");
    assert_eq!(value["progress"], 100);
    assert_eq!(value["results"]["source"], "fallback");
    assert!(value["results"]["maxStress"].is_number());
    assert_eq!(
        value["results"]["timeSeriesData"]
            .as_array()
            .map(|a| a.len()),
        Some(40)
    );
    assert!(value["results"].get("hotspots").is_none());
}
