use serde::{Deserialize, Serialize};

/// A single point on a material's reference stress-strain curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressPoint {
    pub strain: f64,
    pub stress: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: i64,
    pub name: String,
    pub youngs_modulus: f64,
    pub poisson_ratio: f64,
    #[serde(default)]
    pub stress_strain_curve: Vec<StressPoint>,
}

impl Material {
    /// The largest stress on the reference curve, if the curve has any points
    pub fn max_reference_stress(&self) -> Option<f64> {
        self.stress_strain_curve
            .iter()
            .map(|p| p.stress)
            .reduce(f64::max)
    }
}

/// A simulation job as submitted by a caller. Never mutated after submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    pub name: String,
    pub material_id: i64,
    #[serde(rename = "type")]
    pub simulation_type: String,
    pub applied_load: Option<f64>,
    pub temperature: Option<f64>,
    pub duration: Option<f64>,
    pub frequency: Option<f64>,
    pub damping_ratio: Option<f64>,
    pub material: Material,
}

pub const DEFAULT_APPLIED_LOAD: f64 = 1000.0;
pub const DEFAULT_TEMPERATURE: f64 = 20.0;
pub const DEFAULT_DURATION: f64 = 10.0;
pub const DEFAULT_FREQUENCY: f64 = 1.0;
pub const DEFAULT_DAMPING_RATIO: f64 = 0.05;

/// A finite applied load, or `DEFAULT_APPLIED_LOAD`. Zero is a real load.
pub fn applied_load_or_default(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(DEFAULT_APPLIED_LOAD)
}

/// A strictly positive finite value, or `default`
pub fn positive_or_default(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(default)
}

impl SimulationRequest {
    pub fn applied_load_or_default(&self) -> f64 {
        applied_load_or_default(self.applied_load)
    }

    /// Absent, zero and non-finite temperatures all read as the 20 °C reference
    pub fn temperature_or_default(&self) -> f64 {
        self.temperature
            .filter(|v| v.is_finite() && *v != 0.0)
            .unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn duration_or_default(&self) -> f64 {
        positive_or_default(self.duration, DEFAULT_DURATION)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub results: Option<ResultPayload>,
    pub error: Option<String>,
}

impl JobRecord {
    /// Progress reported for a job that has been accepted but not yet started
    pub const INITIAL_PROGRESS: u8 = 5;

    pub fn running(id: String) -> JobRecord {
        JobRecord {
            id,
            status: JobStatus::Running,
            progress: Self::INITIAL_PROGRESS,
            results: None,
            error: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Solver,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub time: f64,
    pub stress: f64,
    pub displacement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    pub location: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    pub max_stress: f64,
    pub min_stress: f64,
    pub avg_stress: f64,
    pub stress_range: f64,
    pub max_deformation: f64,
    pub max_strain: f64,
    pub avg_strain: f64,
    pub safety_factor: f64,
    pub time_series_data: Vec<TimeSeriesPoint>,
    pub stress_strain_curve: Vec<StressPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotspots: Option<Vec<Hotspot>>,
    pub source: ResultSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Scalar field summaries extracted from a finite-element solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSummary {
    pub max_stress: f64,
    pub min_stress: f64,
    pub avg_stress: f64,
    pub max_strain: f64,
    pub avg_strain: f64,
    pub max_deformation: f64,
    /// Centroid of the element carrying `max_stress`
    pub hotspot_location: [f64; 2],
}

impl SolverSummary {
    /// True when every figure is finite, non-negative and the stresses are ordered
    pub fn is_consistent(&self) -> bool {
        let values = [
            self.max_stress,
            self.min_stress,
            self.avg_stress,
            self.max_strain,
            self.avg_strain,
            self.max_deformation,
        ];
        values.iter().all(|v| v.is_finite() && *v >= 0.0)
            && self.hotspot_location.iter().all(|v| v.is_finite())
            && self.min_stress <= self.max_stress
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub vertex: Vertex,
    pub ux: Option<f64>,
    pub uy: Option<f64>,
    pub fx: Option<f64>,
    pub fy: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub nodes: [usize; 3],
    pub stress: Option<f64>,
    pub strain: Option<f64>,
}

/// Material and loading constants fed to the solver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelMetadata {
    pub youngs_modulus: f64,
    pub poisson_ratio: f64,
    pub part_thickness: f64,
    pub traction: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct BoundaryRegion {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl BoundaryRegion {
    pub fn contains(&self, vertex: &Vertex) -> bool {
        vertex.x > self.x_min
            && vertex.x < self.x_max
            && vertex.y > self.y_min
            && vertex.y < self.y_max
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BoundaryTarget {
    pub ux: Option<f64>,
    pub uy: Option<f64>,
    pub fx: Option<f64>,
    pub fy: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct BoundaryRule {
    pub name: String,
    pub region: BoundaryRegion,
    pub target: BoundaryTarget,
}
