use std::f64::consts::PI;

use rand::Rng;

use crate::{
    datatypes::{
        positive_or_default, TimeSeriesPoint, DEFAULT_DAMPING_RATIO, DEFAULT_DURATION,
        DEFAULT_FREQUENCY,
    },
    seeding,
};

pub const TIME_SERIES_POINTS: usize = 40;
pub const DEFAULT_BASELINE_STRESS: f64 = 100.0;
/// Progress is reported on every n-th sample
pub const PROGRESS_STRIDE: usize = 4;

const BASE_FRACTION: f64 = 0.35;
const AMPLITUDE_FRACTION: f64 = 0.65;
const STRESS_NOISE: f64 = 0.03;
const DISPLACEMENT_SLOPE: f64 = 0.2;
const DISPLACEMENT_NOISE: f64 = 0.002;

/// Inputs of a damped oscillation; `None` and out-of-range values use defaults
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OscillationInputs {
    pub duration: Option<f64>,
    pub frequency: Option<f64>,
    pub damping_ratio: Option<f64>,
    pub baseline_stress: Option<f64>,
}

/// Reports linearly interpolated progress across `[start, end]`
pub struct ProgressRange<'a> {
    pub start: u8,
    pub end: u8,
    pub callback: &'a mut dyn FnMut(u8),
}

/// Builds a seeded damped-oscillation time series of stress and displacement
///
/// # Arguments
/// * `job_id` - Seeds the noise stream
/// * `inputs` - Duration, frequency, damping and baseline stress
/// * `progress` - Optional range and callback notified every
///   `PROGRESS_STRIDE` samples
///
/// # Returns
/// `TIME_SERIES_POINTS` samples uniformly spaced over `[0, duration]`
pub fn generate_time_series(
    job_id: &str,
    inputs: &OscillationInputs,
    mut progress: Option<ProgressRange<'_>>,
) -> Vec<TimeSeriesPoint> {
    let duration = positive_or_default(inputs.duration, DEFAULT_DURATION);
    let frequency = positive_or_default(inputs.frequency, DEFAULT_FREQUENCY);
    let damping = positive_or_default(inputs.damping_ratio, DEFAULT_DAMPING_RATIO);
    let baseline = inputs
        .baseline_stress
        .filter(|v| v.is_finite() && *v != 0.0)
        .unwrap_or(DEFAULT_BASELINE_STRESS);

    let mut rng = seeding::seeded_rng(&seeding::time_series_key(job_id));
    let base = baseline * BASE_FRACTION;
    let amplitude = baseline * AMPLITUDE_FRACTION;
    let last_index = (TIME_SERIES_POINTS - 1) as f64;

    let mut time_series: Vec<TimeSeriesPoint> = Vec::with_capacity(TIME_SERIES_POINTS);
    for index in 0..TIME_SERIES_POINTS {
        let fraction = index as f64 / last_index;
        let time = duration * fraction;

        let oscillation = f64::sin(2.0 * PI * frequency * time / duration);
        let decay = f64::exp(-damping * time);
        let noise = rng.gen_range(-STRESS_NOISE..=STRESS_NOISE) * amplitude;
        let stress = base + amplitude * oscillation * decay + noise;

        let displacement = fraction * DISPLACEMENT_SLOPE
            + rng.gen_range(-DISPLACEMENT_NOISE..=DISPLACEMENT_NOISE);

        time_series.push(TimeSeriesPoint {
            time,
            stress: f64::max(stress, 0.0),
            displacement: f64::max(displacement, 0.0),
        });

        if let Some(range) = progress.as_mut() {
            if index % PROGRESS_STRIDE == 0 {
                let span = f64::from(range.end) - f64::from(range.start);
                let value = f64::from(range.start) + span * fraction;
                (range.callback)(value as u8);
            }
        }
    }

    time_series
}
