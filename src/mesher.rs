use log::debug;

use crate::{
    config::MeshBounds,
    datatypes::{
        BoundaryRegion, BoundaryRule, BoundaryTarget, Element, ModelMetadata, Node,
        SimulationRequest, Vertex,
    },
    error::SimError,
};

/// Reference temperature at which the nominal modulus applies
pub const REFERENCE_TEMPERATURE: f64 = 20.0;
pub const MIN_TEMPERATURE_FACTOR: f64 = 0.6;
const TEMPERATURE_SOFTENING: f64 = 0.0002;

/// Picks the mesh resolution for a request
///
/// Heavier loads and longer durations refine the mesh, within `bounds`.
///
/// # Arguments
/// * `request` - The simulation request
/// * `bounds` - The allowed resolution range
///
/// # Returns
/// The number of cells along each side of the block
pub fn mesh_resolution(request: &SimulationRequest, bounds: &MeshBounds) -> usize {
    let applied_load = request.applied_load_or_default();
    let duration = request.duration_or_default();

    let refinement = (applied_load / 1000.0 + duration / 10.0).min(6.0);
    let resolution = if refinement > 0.0 {
        6 + refinement.floor() as usize
    } else {
        6
    };

    resolution.clamp(bounds.min_resolution, bounds.max_resolution)
}

/// Stiffness knock-down for a temperature, floored at `MIN_TEMPERATURE_FACTOR`
pub fn temperature_factor(temperature: f64) -> f64 {
    f64::max(
        MIN_TEMPERATURE_FACTOR,
        1.0 - (temperature - REFERENCE_TEMPERATURE) * TEMPERATURE_SOFTENING,
    )
}

/// Derives solver constants from the request's material and loading
///
/// # Arguments
/// * `request` - The simulation request
///
/// # Returns
/// A ModelMetadata instance
pub fn model_metadata(request: &SimulationRequest) -> Result<ModelMetadata, SimError> {
    let material = &request.material;

    if !material.youngs_modulus.is_finite() || material.youngs_modulus <= 0.0 {
        return Err(SimError::Input(format!(
            "Material {} has non-positive Young's modulus {}",
            material.name, material.youngs_modulus
        )));
    }
    if !material.poisson_ratio.is_finite()
        || material.poisson_ratio <= -1.0
        || material.poisson_ratio >= 0.5
    {
        return Err(SimError::Input(format!(
            "Material {} has Poisson ratio {} outside (-1, 0.5)",
            material.name, material.poisson_ratio
        )));
    }

    let youngs_modulus = material.youngs_modulus
        * 1000.0
        * temperature_factor(request.temperature_or_default());

    Ok(ModelMetadata {
        youngs_modulus,
        poisson_ratio: material.poisson_ratio,
        part_thickness: 1.0,
        traction: request.applied_load_or_default() / 1000.0,
    })
}

/// Meshes the unit block section into right triangles
///
/// # Arguments
/// * `resolution` - Number of cells along each side
///
/// # Returns
/// A tuple with the nodes and the elements, in that order
pub fn build_block(resolution: usize) -> Result<(Vec<Node>, Vec<Element>), SimError> {
    if resolution == 0 {
        return Err(SimError::Mesher(
            "Mesh resolution must be at least 1".to_owned(),
        ));
    }

    let n = resolution;
    let h = 1.0 / n as f64;
    let index = |i: usize, j: usize| j * (n + 1) + i;

    let mut nodes: Vec<Node> = Vec::with_capacity((n + 1) * (n + 1));
    for j in 0..=n {
        for i in 0..=n {
            nodes.push(Node {
                vertex: Vertex {
                    x: i as f64 * h,
                    y: j as f64 * h,
                },
                ux: None,
                uy: None,
                fx: Some(0.0),
                fy: Some(0.0),
            });
        }
    }

    let mut elements: Vec<Element> = Vec::with_capacity(2 * n * n);
    for j in 0..n {
        for i in 0..n {
            let a = index(i, j);
            let b = index(i + 1, j);
            let c = index(i + 1, j + 1);
            let d = index(i, j + 1);

            // both triangles are counter-clockwise
            elements.push(Element {
                nodes: [a, b, c],
                stress: None,
                strain: None,
            });
            elements.push(Element {
                nodes: [a, c, d],
                stress: None,
                strain: None,
            });
        }
    }

    debug!(
        "meshed block with {} nodes and {} elements",
        nodes.len(),
        elements.len()
    );

    Ok((nodes, elements))
}

/// Builds the fixed-base and loaded-top rules for the block
///
/// The top face carries a uniform traction, lumped onto nodes as consistent
/// edge loads; the two top corners take half an edge share.
pub fn block_boundary_rules(resolution: usize, metadata: &ModelMetadata) -> Vec<BoundaryRule> {
    let h = 1.0 / resolution as f64;
    let tol = h / 4.0;
    let edge_load = metadata.traction * h * metadata.part_thickness;

    let top = |x_min: f64, x_max: f64| BoundaryRegion {
        x_min,
        x_max,
        y_min: 1.0 - tol,
        y_max: 1.0 + tol,
    };
    let loaded = |fy: f64| BoundaryTarget {
        ux: None,
        uy: None,
        fx: Some(0.0),
        fy: Some(fy),
    };

    vec![
        BoundaryRule {
            name: "fixed_base".to_owned(),
            region: BoundaryRegion {
                x_min: -tol,
                x_max: 1.0 + tol,
                y_min: -tol,
                y_max: tol,
            },
            target: BoundaryTarget {
                ux: Some(0.0),
                uy: Some(0.0),
                fx: None,
                fy: None,
            },
        },
        BoundaryRule {
            name: "loaded_top".to_owned(),
            region: top(-tol, 1.0 + tol),
            target: loaded(edge_load),
        },
        BoundaryRule {
            name: "loaded_top_left".to_owned(),
            region: top(-tol, tol),
            target: loaded(edge_load / 2.0),
        },
        BoundaryRule {
            name: "loaded_top_right".to_owned(),
            region: top(1.0 - tol, 1.0 + tol),
            target: loaded(edge_load / 2.0),
        },
    ]
}

/// Checks that a rule fully and consistently constrains both axes
fn validate_rule(rule: &BoundaryRule) -> Result<(), SimError> {
    let name = &rule.name;
    let region = &rule.region;
    let target = &rule.target;

    if region.x_min > region.x_max {
        return Err(SimError::Mesher(format!(
            "Boundary '{name}' has x_target_min greater than x_target_max"
        )));
    }
    if region.y_min > region.y_max {
        return Err(SimError::Mesher(format!(
            "Boundary '{name}' has y_target_min greater than y_target_max"
        )));
    }
    if target.fx.is_none() && target.ux.is_none() {
        return Err(SimError::Mesher(format!(
            "Boundary '{name}' is under-constrained in x-axis"
        )));
    }
    if target.fy.is_none() && target.uy.is_none() {
        return Err(SimError::Mesher(format!(
            "Boundary '{name}' is under-constrained in y-axis"
        )));
    }
    if target.fx.is_some() && target.ux.is_some() {
        return Err(SimError::Mesher(format!(
            "Boundary '{name}' is over-constrained in x-axis"
        )));
    }
    if target.fy.is_some() && target.uy.is_some() {
        return Err(SimError::Mesher(format!(
            "Boundary '{name}' is over-constrained in y-axis"
        )));
    }

    Ok(())
}

/// Applies boundary rules to the nodes. Later rules win where regions overlap.
///
/// # Arguments
/// * `rules` - The boundary rules, in priority order
/// * `nodes` - A mutable reference to the vector of nodes
pub fn apply_boundary_conditions(
    rules: &[BoundaryRule],
    nodes: &mut [Node],
) -> Result<(), SimError> {
    for rule in rules {
        validate_rule(rule)?;
    }

    for node in nodes.iter_mut() {
        for rule in rules {
            if rule.region.contains(&node.vertex) {
                node.ux = rule.target.ux;
                node.uy = rule.target.uy;
                node.fx = rule.target.fx;
                node.fy = rule.target.fy;
            }
        }
    }

    if !nodes.iter().any(|n| n.ux.is_some() && n.uy.is_some()) {
        return Err(SimError::Mesher(
            "Boundary rules leave the model unsupported".to_owned(),
        ));
    }

    debug!("applied {} boundary rules", rules.len());

    Ok(())
}

/// Runs the mesher
///
/// # Arguments
/// * `request` - The simulation request
/// * `bounds` - The allowed mesh resolution range
///
/// # Returns
/// The constrained nodes, the elements and the model metadata
pub fn run(
    request: &SimulationRequest,
    bounds: &MeshBounds,
) -> Result<(Vec<Node>, Vec<Element>, ModelMetadata), SimError> {
    let metadata = model_metadata(request)?;
    let resolution = mesh_resolution(request, bounds);

    let (mut nodes, elements) = build_block(resolution)?;
    let rules = block_boundary_rules(resolution, &metadata);
    apply_boundary_conditions(&rules, &mut nodes)?;

    Ok((nodes, elements, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::Material;

    fn request(applied_load: Option<f64>, duration: Option<f64>) -> SimulationRequest {
        SimulationRequest {
            name: "block".to_owned(),
            material_id: 1,
            simulation_type: "static".to_owned(),
            applied_load,
            temperature: None,
            duration,
            frequency: None,
            damping_ratio: None,
            material: Material {
                id: 1,
                name: "steel".to_owned(),
                youngs_modulus: 200.0,
                poisson_ratio: 0.3,
                stress_strain_curve: Vec::new(),
            },
        }
    }

    #[test]
    fn resolution_grows_with_load_and_duration() {
        let bounds = MeshBounds::default();
        assert_eq!(mesh_resolution(&request(None, None), &bounds), 8);
        assert_eq!(mesh_resolution(&request(Some(0.0), Some(5.0)), &bounds), 6);
        assert_eq!(mesh_resolution(&request(Some(3500.0), None), &bounds), 10);
        assert_eq!(mesh_resolution(&request(Some(1e9), Some(1e9)), &bounds), 12);
    }

    #[test]
    fn resolution_respects_bounds() {
        let bounds = MeshBounds {
            min_resolution: 2,
            max_resolution: 7,
        };
        assert_eq!(mesh_resolution(&request(Some(1e9), None), &bounds), 7);

        let bounds = MeshBounds {
            min_resolution: 9,
            max_resolution: 14,
        };
        assert_eq!(mesh_resolution(&request(Some(-5000.0), None), &bounds), 9);
    }

    #[test]
    fn temperature_softens_down_to_floor() {
        assert!((temperature_factor(20.0) - 1.0).abs() < 1e-12);
        assert!((temperature_factor(520.0) - 0.9).abs() < 1e-12);
        assert!(temperature_factor(120.0) < temperature_factor(100.0));
        assert_eq!(temperature_factor(5000.0), MIN_TEMPERATURE_FACTOR);
    }

    #[test]
    fn metadata_scales_modulus_and_load() {
        let mut req = request(Some(2000.0), None);
        req.temperature = Some(520.0);
        let metadata = model_metadata(&req).expect("valid material");
        assert!((metadata.youngs_modulus - 200.0 * 1000.0 * 0.9).abs() < 1e-6);
        assert!((metadata.traction - 2.0).abs() < 1e-12);
    }

    #[test]
    fn zero_temperature_uses_reference_modulus() {
        let mut req = request(None, None);
        req.temperature = Some(0.0);
        assert_eq!(req.temperature_or_default(), 20.0);
        let metadata = model_metadata(&req).expect("valid material");
        assert!((metadata.youngs_modulus - 200.0 * 1000.0).abs() < 1e-9);

        req.temperature = Some(-40.0);
        assert_eq!(req.temperature_or_default(), -40.0);
    }

    #[test]
    fn metadata_rejects_bad_material() {
        let mut req = request(None, None);
        req.material.poisson_ratio = 0.5;
        assert!(matches!(model_metadata(&req), Err(SimError::Input(_))));

        let mut req = request(None, None);
        req.material.youngs_modulus = 0.0;
        assert!(matches!(model_metadata(&req), Err(SimError::Input(_))));
    }

    #[test]
    fn block_has_expected_topology() {
        let (nodes, elements) = build_block(4).expect("mesh builds");
        assert_eq!(nodes.len(), 25);
        assert_eq!(elements.len(), 32);

        for element in &elements {
            let [a, b, c] = element.nodes.map(|i| nodes[i].vertex);
            let area = 0.5 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
            assert!((area - 1.0 / 32.0).abs() < 1e-12);
        }
    }

    #[test]
    fn boundary_rules_fix_base_and_load_top() {
        let req = request(Some(1000.0), None);
        let (nodes, _, metadata) = run(&req, &MeshBounds::default()).expect("mesher runs");

        let fixed = nodes.iter().filter(|n| n.uy == Some(0.0)).count();
        assert_eq!(fixed, 9);
        assert!(nodes
            .iter()
            .filter(|n| n.vertex.y < 1e-9)
            .all(|n| n.fx.is_none() && n.fy.is_none()));

        // The lumped loads add up to the traction over the unit face
        let total: f64 = nodes
            .iter()
            .filter(|n| (n.vertex.y - 1.0).abs() < 1e-9)
            .map(|n| n.fy.unwrap_or(0.0))
            .sum();
        assert!((total - metadata.traction).abs() < 1e-12);
    }

    #[test]
    fn rejects_over_constrained_rule() {
        let rule = BoundaryRule {
            name: "bad".to_owned(),
            region: BoundaryRegion {
                x_min: -1.0,
                x_max: 2.0,
                y_min: -1.0,
                y_max: 2.0,
            },
            target: BoundaryTarget {
                ux: Some(0.0),
                uy: Some(0.0),
                fx: Some(1.0),
                fy: None,
            },
        };
        let (mut nodes, _) = build_block(2).expect("mesh builds");
        let err = apply_boundary_conditions(&[rule], &mut nodes).expect_err("rule rejected");
        assert_eq!(
            err,
            SimError::Mesher("Boundary 'bad' is over-constrained in x-axis".to_owned())
        );
    }
}
