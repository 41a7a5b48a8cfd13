use crate::{
    curve::generate_curve,
    datatypes::{
        Hotspot, ResultPayload, ResultSource, SimulationRequest, SolverSummary, StressPoint,
        TimeSeriesPoint,
    },
    time_series::{generate_time_series, OscillationInputs, ProgressRange},
};

pub const ALLOWABLE_FRACTION_OF_REFERENCE: f64 = 0.9;
/// Margin assumed when the material has no reference curve
pub const SYNTHETIC_ALLOWABLE_MARGIN: f64 = 1.2;
pub const FALLBACK_WARNING: &str = "finite-element solver unavailable, using fallback results";

pub const SOLVER_SYNTHESIS_START: u8 = 80;
pub const FALLBACK_SYNTHESIS_START: u8 = 70;
pub const SYNTHESIS_END: u8 = 95;

/// Allowable stress for a material
///
/// 90% of the reference curve peak when the material has one, otherwise a
/// 1.2x margin over the computed maximum stress.
pub fn estimate_allowable_stress(request: &SimulationRequest, max_stress: f64) -> f64 {
    match request.material.max_reference_stress() {
        Some(ultimate) => ultimate * ALLOWABLE_FRACTION_OF_REFERENCE,
        None => max_stress * SYNTHETIC_ALLOWABLE_MARGIN,
    }
}

pub fn safety_factor(allowable_stress: f64, max_stress: f64) -> f64 {
    if max_stress > 0.0 {
        allowable_stress / max_stress
    } else {
        0.0
    }
}

/// Min, max and mean of a non-empty slice. The mean is kept inside
/// `[min, max]` against rounding.
fn min_max_avg(values: &[f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let min = values.iter().copied().fold(f64::MAX, f64::min);
    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    (min, max, avg.clamp(min, max))
}

/// Assembles complete result payloads for one job
pub struct ResultSynthesizer<'a> {
    job_id: &'a str,
    request: &'a SimulationRequest,
}

impl<'a> ResultSynthesizer<'a> {
    pub fn new(job_id: &'a str, request: &'a SimulationRequest) -> ResultSynthesizer<'a> {
        ResultSynthesizer { job_id, request }
    }

    fn curve(&self, target_max_stress: Option<f64>) -> Vec<StressPoint> {
        generate_curve(
            self.job_id,
            &self.request.material.stress_strain_curve,
            self.request.applied_load,
            self.request.damping_ratio,
            target_max_stress,
        )
    }

    fn time_series(
        &self,
        baseline_stress: f64,
        start: u8,
        progress: &mut dyn FnMut(u8),
    ) -> Vec<TimeSeriesPoint> {
        let inputs = OscillationInputs {
            duration: self.request.duration,
            frequency: self.request.frequency,
            damping_ratio: self.request.damping_ratio,
            baseline_stress: Some(baseline_stress),
        };
        generate_time_series(
            self.job_id,
            &inputs,
            Some(ProgressRange {
                start,
                end: SYNTHESIS_END,
                callback: progress,
            }),
        )
    }

    /// Builds the payload around the scalar output of a successful solve
    pub fn solver_backed(
        &self,
        summary: &SolverSummary,
        progress: &mut dyn FnMut(u8),
    ) -> ResultPayload {
        let max_stress = summary.max_stress;
        let stress_strain_curve = self.curve(Some(max_stress));
        let time_series_data = self.time_series(max_stress, SOLVER_SYNTHESIS_START, progress);
        progress(SYNTHESIS_END);

        let allowable_stress = estimate_allowable_stress(self.request, max_stress);

        ResultPayload {
            max_stress,
            min_stress: summary.min_stress,
            avg_stress: summary.avg_stress.clamp(summary.min_stress, max_stress),
            stress_range: max_stress - summary.min_stress,
            max_deformation: summary.max_deformation,
            max_strain: summary.max_strain,
            avg_strain: summary.avg_strain,
            safety_factor: safety_factor(allowable_stress, max_stress),
            time_series_data,
            stress_strain_curve,
            hotspots: Some(vec![Hotspot {
                kind: "max_stress".to_owned(),
                value: max_stress,
                location: summary.hotspot_location,
            }]),
            source: ResultSource::Solver,
            warning: None,
        }
    }

    /// Derives every figure from the synthetic stress-strain curve
    pub fn fallback(&self, progress: &mut dyn FnMut(u8)) -> ResultPayload {
        let stress_strain_curve = self.curve(None);

        let stresses: Vec<f64> = stress_strain_curve.iter().map(|p| p.stress).collect();
        let strains: Vec<f64> = stress_strain_curve.iter().map(|p| p.strain).collect();
        let (min_stress, max_stress, avg_stress) = min_max_avg(&stresses);
        let (_, max_strain, avg_strain) = min_max_avg(&strains);

        let time_series_data = self.time_series(max_stress, FALLBACK_SYNTHESIS_START, progress);
        progress(SYNTHESIS_END);

        let allowable_stress = estimate_allowable_stress(self.request, max_stress);

        ResultPayload {
            max_stress,
            min_stress,
            avg_stress,
            stress_range: max_stress - min_stress,
            max_deformation: max_strain,
            max_strain,
            avg_strain,
            safety_factor: safety_factor(allowable_stress, max_stress),
            time_series_data,
            stress_strain_curve,
            hotspots: None,
            source: ResultSource::Fallback,
            warning: Some(FALLBACK_WARNING.to_owned()),
        }
    }
}
