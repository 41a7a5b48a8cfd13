use rand::Rng;

use crate::{
    datatypes::{
        applied_load_or_default, positive_or_default, StressPoint, DEFAULT_DAMPING_RATIO,
    },
    seeding,
};

pub const MIN_LOAD_FACTOR: f64 = 0.6;
pub const MAX_LOAD_FACTOR: f64 = 1.6;
/// Relative stress noise applied to each reference point
pub const CURVE_NOISE: f64 = 0.015;

/// Builds a seeded stress-strain curve from a material's reference curve
///
/// An empty reference curve yields the single point `(0, 0)`.
///
/// # Arguments
/// * `job_id` - Seeds the noise stream
/// * `material_curve` - The material's reference points
/// * `applied_load` - Applied load, defaulting to 1000
/// * `damping_ratio` - Damping ratio, defaulting to 0.05
/// * `target_max_stress` - When set and non-zero, the curve is rescaled so
///   its reference peak lands on this value
pub fn generate_curve(
    job_id: &str,
    material_curve: &[StressPoint],
    applied_load: Option<f64>,
    damping_ratio: Option<f64>,
    target_max_stress: Option<f64>,
) -> Vec<StressPoint> {
    if material_curve.is_empty() {
        return vec![StressPoint {
            strain: 0.0,
            stress: 0.0,
        }];
    }

    let mut rng = seeding::seeded_rng(&seeding::curve_key(job_id));

    let load_factor =
        (applied_load_or_default(applied_load) / 1000.0).clamp(MIN_LOAD_FACTOR, MAX_LOAD_FACTOR);

    let max_curve_stress = material_curve
        .iter()
        .map(|p| p.stress)
        .fold(f64::MIN, f64::max);
    let stress_scale = match target_max_stress {
        Some(target) if target != 0.0 && target.is_finite() && max_curve_stress > 0.0 => {
            target / max_curve_stress
        }
        _ => load_factor,
    };

    let damping_ratio = positive_or_default(damping_ratio, DEFAULT_DAMPING_RATIO);
    let strain_scale = 1.0 + damping_ratio * 0.2;

    material_curve
        .iter()
        .map(|point| {
            let noise = rng.gen_range(-CURVE_NOISE..=CURVE_NOISE) * point.stress;
            StressPoint {
                strain: point.strain * strain_scale,
                stress: f64::max(0.0, point.stress * stress_scale + noise),
            }
        })
        .collect()
}
