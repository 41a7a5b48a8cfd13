use json::JsonValue;

use crate::{
    datatypes::{Material, SimulationRequest, StressPoint},
    error::SimError,
};

/// Parses the request file into a JsonValue object
///
/// # Arguments
/// * `input_file` - The path to the input file
pub fn load_input_file(input_file: &str) -> Result<JsonValue, SimError> {
    let file_string = match std::fs::read_to_string(input_file) {
        Ok(f) => f,
        Err(err) => {
            return Err(SimError::Input(format!(
                "Unable to open input file {input_file}: {err}"
            )))
        }
    };

    json::parse(&file_string)
        .map_err(|err| SimError::Input(format!("Error in input file json: {err}")))
}

/// Reads an optional number. Absent and `null` are both `None`.
fn optional_f64(value: &JsonValue, field: &str) -> Result<Option<f64>, SimError> {
    let entry = &value[field];
    if entry.is_null() {
        return Ok(None);
    }
    match entry.as_f64() {
        Some(v) => Ok(Some(v)),
        None => Err(SimError::Input(format!(
            "Input json field {field} must be a number"
        ))),
    }
}

fn required_f64(value: &JsonValue, field: &str, section: &str) -> Result<f64, SimError> {
    optional_f64(value, field)?.ok_or_else(|| {
        SimError::Input(format!(
            "Input json missing {field} field in {section} section"
        ))
    })
}

fn required_str(value: &JsonValue, field: &str, section: &str) -> Result<String, SimError> {
    match value[field].as_str() {
        Some(s) => Ok(s.to_owned()),
        None => Err(SimError::Input(format!(
            "Input json missing {field} field in {section} section"
        ))),
    }
}

/// Parses the reference stress-strain points of a material
fn parse_curve(material_json: &JsonValue) -> Result<Vec<StressPoint>, SimError> {
    let curve_json = &material_json["stressStrainCurve"];
    if curve_json.is_null() {
        return Ok(Vec::new());
    }
    if !curve_json.is_array() {
        return Err(SimError::Input(
            "Input json stressStrainCurve must be an array".to_owned(),
        ));
    }

    let mut curve: Vec<StressPoint> = Vec::new();
    for (i, point) in curve_json.members().enumerate() {
        let section = format!("stressStrainCurve[{i}]");
        curve.push(StressPoint {
            strain: required_f64(point, "strain", &section)?,
            stress: required_f64(point, "stress", &section)?,
        });
    }

    Ok(curve)
}

/// Builds a SimulationRequest from its camelCase JSON form
///
/// # Arguments
/// * `input_json`: The input file as a JsonValue object
pub fn parse_request(input_json: &JsonValue) -> Result<SimulationRequest, SimError> {
    if !input_json.has_key("material") {
        return Err(SimError::Input(
            "Input json missing material field".to_string(),
        ));
    }
    let material_json = &input_json["material"];

    let material = Material {
        id: material_json["id"].as_i64().unwrap_or_default(),
        name: material_json["name"]
            .as_str()
            .unwrap_or("unnamed material")
            .to_owned(),
        youngs_modulus: required_f64(material_json, "youngsModulus", "material")?,
        poisson_ratio: required_f64(material_json, "poissonRatio", "material")?,
        stress_strain_curve: parse_curve(material_json)?,
    };

    let curve_is_finite = material
        .stress_strain_curve
        .iter()
        .all(|p| p.strain.is_finite() && p.stress.is_finite());
    if !curve_is_finite {
        return Err(SimError::Input(
            "Input json stressStrainCurve has non-finite values".to_owned(),
        ));
    }

    let material_id = input_json["materialId"].as_i64().unwrap_or(material.id);

    Ok(SimulationRequest {
        name: required_str(input_json, "name", "request")?,
        material_id,
        simulation_type: required_str(input_json, "type", "request")?,
        applied_load: optional_f64(input_json, "appliedLoad")?,
        temperature: optional_f64(input_json, "temperature")?,
        duration: optional_f64(input_json, "duration")?,
        frequency: optional_f64(input_json, "frequency")?,
        damping_ratio: optional_f64(input_json, "dampingRatio")?,
        material,
    })
}

/// Loads and validates a request file
pub fn run(input_file: &str) -> Result<SimulationRequest, SimError> {
    let input_json = load_input_file(input_file)?;
    parse_request(&input_json)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: &str = r#"{
        "name": "bracket",
        "materialId": 4,
        "type": "vibration",
        "appliedLoad": 1500,
        "temperature": null,
        "duration": 8,
        "frequency": 2.5,
        "dampingRatio": 0.1,
        "material": {
            "id": 4,
            "name": "steel",
            "youngsModulus": 200,
            "poissonRatio": 0.3,
            "stressStrainCurve": [
                {"strain": 0, "stress": 0},
                {"strain": 0.002, "stress": 400}
            ]
        }
    }"#;

    #[test]
    fn parses_full_request() {
        let parsed = json::parse(REQUEST).expect("valid json");
        let request = parse_request(&parsed).expect("valid request");

        assert_eq!(request.name, "bracket");
        assert_eq!(request.simulation_type, "vibration");
        assert_eq!(request.material_id, 4);
        assert_eq!(request.applied_load, Some(1500.0));
        assert_eq!(request.temperature, None);
        assert_eq!(request.frequency, Some(2.5));
        assert_eq!(request.material.stress_strain_curve.len(), 2);
        assert_eq!(request.material.max_reference_stress(), Some(400.0));
    }

    #[test]
    fn missing_modulus_is_an_input_error() {
        let parsed = json::parse(
            r#"{"name": "x", "type": "static", "material": {"poissonRatio": 0.3}}"#,
        )
        .expect("valid json");
        let err = parse_request(&parsed).expect_err("modulus is required");
        assert_eq!(
            err,
            SimError::Input("Input json missing youngsModulus field in material section".to_owned())
        );
    }

    #[test]
    fn non_numeric_load_is_rejected() {
        let parsed = json::parse(
            r#"{"name": "x", "type": "static", "appliedLoad": "heavy",
                "material": {"youngsModulus": 1, "poissonRatio": 0.3}}"#,
        )
        .expect("valid json");
        assert!(matches!(parse_request(&parsed), Err(SimError::Input(_))));
    }

    #[test]
    fn missing_file_is_an_input_error() {
        assert!(matches!(
            run("/definitely/not/here.json"),
            Err(SimError::Input(_))
        ));
    }
}
