use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use log::info;

use crate::{
    datatypes::{JobRecord, ResultPayload, ResultSource},
    error::SimError,
};

fn create(path: &Path) -> Result<std::fs::File, SimError> {
    std::fs::File::create(path).map_err(|err| {
        SimError::PostProcessor(format!("Failed to create {}: {err}", path.display()))
    })
}

fn write_err(path: &Path) -> impl Fn(std::io::Error) -> SimError + '_ {
    move |err| SimError::PostProcessor(format!("Failed to write {}: {err}", path.display()))
}

/// Writes job results to two CSV files
///
/// # Arguments
/// * `payload` - The completed job's results
/// * `time_series_output` - The filename of the output time series csv
/// * `curve_output` - The filename of the output stress-strain csv
pub fn csv_output(
    payload: &ResultPayload,
    time_series_output: &Path,
    curve_output: &Path,
) -> Result<(), SimError> {
    let mut time_series_file = create(time_series_output)?;
    let mut curve_file = create(curve_output)?;

    // Write time series
    let mut contents = String::from("time,stress,displacement\n");
    for point in &payload.time_series_data {
        let _ = writeln!(
            contents,
            "{},{},{}",
            point.time, point.stress, point.displacement
        );
    }
    time_series_file
        .write_all(contents.as_bytes())
        .map_err(write_err(time_series_output))?;

    // Write curve
    let mut contents = String::from("strain,stress\n");
    for point in &payload.stress_strain_curve {
        let _ = writeln!(contents, "{},{}", point.strain, point.stress);
    }
    curve_file
        .write_all(contents.as_bytes())
        .map_err(write_err(curve_output))?;

    info!(
        "wrote output to {} and {}",
        time_series_output.display(),
        curve_output.display()
    );

    Ok(())
}

/// Renders a short human-readable report of a job
#[must_use]
pub fn render_summary(record: &JobRecord) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "Job {} ({:?}, {}%)",
        record.id, record.status, record.progress
    );

    let Some(results) = &record.results else {
        output.push_str("No results yet\n");
        return output;
    };

    let source = match results.source {
        ResultSource::Solver => "finite-element solver",
        ResultSource::Fallback => "synthetic fallback",
    };
    let _ = writeln!(output, "Source: {source}");
    if let Some(warning) = &results.warning {
        let _ = writeln!(output, "Warning: {warning}");
    }
    let _ = writeln!(
        output,
        "Stress: max = {:.3}, min = {:.3}, avg = {:.3}, range = {:.3}",
        results.max_stress, results.min_stress, results.avg_stress, results.stress_range
    );
    let _ = writeln!(
        output,
        "Strain: max = {:.3e}, avg = {:.3e}; max deformation = {:.3e}",
        results.max_strain, results.avg_strain, results.max_deformation
    );
    let _ = writeln!(output, "Safety factor: {:.2}", results.safety_factor);
    for hotspot in results.hotspots.iter().flatten() {
        let _ = writeln!(
            output,
            "Hotspot {}: {:.3} at ({:.3}, {:.3})",
            hotspot.kind, hotspot.value, hotspot.location[0], hotspot.location[1]
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{Hotspot, JobStatus, StressPoint, TimeSeriesPoint};

    fn record() -> JobRecord {
        JobRecord {
            id: "job-7".to_owned(),
            status: JobStatus::Completed,
            progress: 100,
            results: Some(ResultPayload {
                max_stress: 250.0,
                min_stress: 10.0,
                avg_stress: 90.0,
                stress_range: 240.0,
                max_deformation: 0.02,
                max_strain: 0.004,
                avg_strain: 0.001,
                safety_factor: 1.8,
                time_series_data: vec![
                    TimeSeriesPoint {
                        time: 0.0,
                        stress: 35.0,
                        displacement: 0.0,
                    },
                    TimeSeriesPoint {
                        time: 10.0,
                        stress: 40.0,
                        displacement: 0.2,
                    },
                ],
                stress_strain_curve: vec![StressPoint {
                    strain: 0.01,
                    stress: 250.0,
                }],
                hotspots: Some(vec![Hotspot {
                    kind: "max_stress".to_owned(),
                    value: 250.0,
                    location: [0.5, 0.0],
                }]),
                source: ResultSource::Solver,
                warning: None,
            }),
            error: None,
        }
    }

    #[test]
    fn summary_mentions_source_and_safety_factor() {
        let report = render_summary(&record());
        assert!(report.contains("Job job-7 (Completed, 100%)"));
        assert!(report.contains("finite-element solver"));
        assert!(report.contains("Safety factor: 1.80"));
        assert!(report.contains("Hotspot max_stress"));
    }

    #[test]
    fn summary_of_running_job_has_no_results() {
        let report = render_summary(&JobRecord::running("job-8".to_owned()));
        assert!(report.contains("No results yet"));
    }

    #[test]
    fn writes_both_csv_files() {
        let dir = std::env::temp_dir().join(format!("fea-jobs-csv-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let series = dir.join("series.csv");
        let curve = dir.join("curve.csv");

        let record = record();
        let payload = record.results.as_ref().expect("results");
        csv_output(payload, &series, &curve).expect("csv written");

        let series_text = std::fs::read_to_string(&series).expect("series readable");
        assert_eq!(series_text.lines().count(), 3);
        assert!(series_text.starts_with("time,stress,displacement"));
        let curve_text = std::fs::read_to_string(&curve).expect("curve readable");
        assert_eq!(curve_text, "strain,stress\n0.01,250\n");

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }
}
