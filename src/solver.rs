use crate::{
    config::SolverSettings,
    datatypes::{Element, ModelMetadata, Node, SimulationRequest, SolverSummary},
    error::SimError,
    mesher,
};
use log::{debug, info};
use nalgebra::{matrix, DVector, SMatrix};
use nalgebra_sparse::{coo::CooMatrix, csr::CsrMatrix};

use argmin::{
    core::{
        observers::{Observe, ObserverMode},
        ArgminFloat, Error, Executor, Operator, State, KV,
    },
    solver::conjugategradient::ConjugateGradient,
};

pub const DOF: usize = 2;

/// Progress checkpoints reported while a solve advances
pub const PROGRESS_MESHED: u8 = 12;
pub const PROGRESS_ASSEMBLED: u8 = 35;
pub const PROGRESS_SOLVED: u8 = 55;
pub const PROGRESS_PROJECTED: u8 = 70;
pub const PROGRESS_SUMMARIZED: u8 = 80;

/// The finite-element collaborator behind a job
///
/// Any `Err` is treated as a full solver failure by the runner.
pub trait Solver: Send + Sync {
    fn solve(
        &self,
        request: &SimulationRequest,
        progress: &mut dyn FnMut(u8),
    ) -> Result<SolverSummary, SimError>;
}

/// A deployment without a finite-element backend. Every solve fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableSolver;

impl Solver for UnavailableSolver {
    fn solve(
        &self,
        _request: &SimulationRequest,
        _progress: &mut dyn FnMut(u8),
    ) -> Result<SolverSummary, SimError> {
        Err(SimError::Solver(
            "no finite-element backend is configured".to_owned(),
        ))
    }
}

/// Linear plane-stress solver over constant-strain triangles
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaneStressSolver {
    settings: SolverSettings,
}

impl PlaneStressSolver {
    pub fn new(settings: SolverSettings) -> PlaneStressSolver {
        PlaneStressSolver { settings }
    }
}

impl Solver for PlaneStressSolver {
    fn solve(
        &self,
        request: &SimulationRequest,
        progress: &mut dyn FnMut(u8),
    ) -> Result<SolverSummary, SimError> {
        let (mut nodes, mut elements, metadata) = mesher::run(request, &self.settings.mesh)?;
        progress(PROGRESS_MESHED);

        run(&mut nodes, &mut elements, &metadata, &self.settings, progress)?;

        let summary = summarize(&nodes, &elements)?;
        progress(PROGRESS_SUMMARIZED);

        Ok(summary)
    }
}

/// Runs multiplication for Conjugate Gradient Solver
struct ConjugateGradientOperator<'a> {
    a: &'a CsrMatrix<f64>,
}

impl<'a> Operator for ConjugateGradientOperator<'a> {
    type Param = Vec<f64>;
    type Output = Vec<f64>;

    fn apply(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        let mut y = vec![0.0; self.a.nrows()];
        for (row, col, value) in self.a.triplet_iter() {
            y[row] += value * x[col];
        }
        Ok(y)
    }
}

/// Logs the residual norm of the argmin solver as it converges
///
/// argmin reports the squared residual norm as the cost.
struct ConjugateGradientObserverLog;

impl ConjugateGradientObserverLog {
    fn argmin_float_to_f64<F: ArgminFloat>(&self, value: F) -> Option<f64> {
        format!("{:?}", value).parse().ok()
    }
}

impl<I> Observe<I> for ConjugateGradientObserverLog
where
    I: State,
{
    fn observe_iter(&mut self, state: &I, _kv: &KV) -> Result<(), Error> {
        if let Some(cost) = self.argmin_float_to_f64(state.get_cost()) {
            debug!(
                "cg iteration {}: residual {:.3e}",
                state.get_iter(),
                cost.sqrt()
            );
        }
        Ok(())
    }
}

/// Solves a system of equations using the conjugate gradient method.
///
/// This function returns an approximation for x in `Ax=b`
///
/// # Arguments
/// * `a` - A square positive definite matrix
/// * `b` - A vector of the solutions to the system
/// * `settings` - Iteration cap and residual tolerance
///
/// # Returns
/// A DVector that represents `x` from the system
fn run_conjugate_gradient(
    a: &CsrMatrix<f64>,
    b: &DVector<f64>,
    settings: &SolverSettings,
) -> Result<DVector<f64>, SimError> {
    let b_norm = b.norm();
    if b_norm == 0.0 {
        return Ok(DVector::zeros(b.nrows()));
    }

    let b_flat: Vec<f64> = b.iter().copied().collect();
    let solver: ConjugateGradient<_, f64> = ConjugateGradient::new(b_flat);
    let initial_guess: Vec<f64> = vec![0.0; b.nrows()];
    // argmin's cost is the squared residual norm
    let target_residual = settings.relative_tolerance * b_norm;
    let target_cost = target_residual * target_residual;

    let operator = ConjugateGradientOperator { a };

    let res = Executor::new(operator, solver)
        .configure(|state| {
            state
                .param(initial_guess)
                .max_iters(settings.max_iters)
                .target_cost(target_cost)
        })
        .add_observer(ConjugateGradientObserverLog, ObserverMode::Every(100))
        .run()
        .map_err(|err| SimError::Solver(format!("Conjugate Gradient error: {err}")))?;

    let state = res.state();
    let best_param = match &state.best_param {
        Some(vec) => DVector::from_vec(vec.clone()),
        None => {
            return Err(SimError::Solver(
                "Conjugate Gradient could not produce best parameter".to_owned(),
            ))
        }
    };

    // Within three orders of the target the stresses are still usable
    let residual = state.best_cost.sqrt();
    if !(residual <= target_residual * 1e3) {
        return Err(SimError::Solver(format!(
            "Conjugate Gradient did not converge: residual {:.3e} after {} iterations",
            residual, state.iter
        )));
    }

    Ok(best_param)
}

/// Calculates the area of the element
///
/// # Arguments
/// * `element` - The Element to target
/// * `nodes` - A reference to the vector of nodes
///
/// # Returns
/// The area of the element
pub fn compute_element_area(element: &Element, nodes: &[Node]) -> f64 {
    let v0 = &nodes[element.nodes[0]].vertex;
    let v1 = &nodes[element.nodes[1]].vertex;
    let v2 = &nodes[element.nodes[2]].vertex;

    0.5 * (v0.x * (v1.y - v2.y) + v1.x * (v2.y - v0.y) + v2.x * (v0.y - v1.y))
}

/// Calculates the strain-displacement matrix of the element
///
/// # Arguments
/// * `element` - The Element to target
/// * `nodes` - A reference to the vector of nodes
/// * `element_area` - The area of the element
///
/// # Returns
/// A 3x6 strain-displacement matrix
pub fn compute_strain_displacement_matrix(
    element: &Element,
    nodes: &[Node],
    element_area: f64,
) -> SMatrix<f64, 3, 6> {
    let v0 = &nodes[element.nodes[0]].vertex;
    let v1 = &nodes[element.nodes[1]].vertex;
    let v2 = &nodes[element.nodes[2]].vertex;

    let beta_1 = v1.y - v2.y;
    let beta_2 = v2.y - v0.y;
    let beta_3 = v0.y - v1.y;

    let gamma_1 = v2.x - v1.x;
    let gamma_2 = v0.x - v2.x;
    let gamma_3 = v1.x - v0.x;

    let mut strain_displacement_mat: SMatrix<f64, 3, 6> = matrix![
        beta_1, 0., beta_2, 0., beta_3, 0.;
        0., gamma_1, 0., gamma_2, 0., gamma_3;
        gamma_1, beta_1, gamma_2, beta_2, gamma_3, beta_3;
    ];

    strain_displacement_mat /= 2.0 * element_area;

    strain_displacement_mat
}

/// Calculates the plane-stress stress-strain matrix
///
/// # Arguments
/// * `poisson_ratio` - The poisson ratio for the model
/// * `youngs_modulus` - The modulus of elasticity of the model
///
/// # Returns
/// A 3x3 stress-strain matrix
pub fn compute_stress_strain_matrix(poisson_ratio: f64, youngs_modulus: f64) -> SMatrix<f64, 3, 3> {
    let mut stress_strain_mat: SMatrix<f64, 3, 3> = matrix![
        1.0, poisson_ratio, 0.0;
        poisson_ratio, 1.0, 0.0;
        0.0, 0.0, (1.0 - poisson_ratio)/2.0;
    ];

    stress_strain_mat *= youngs_modulus / (1.0 - f64::powi(poisson_ratio, 2));

    stress_strain_mat
}

/// Computes the stiffness matrix for a given element
///
/// # Returns
/// A 6x6 stiffness matrix for the element
fn compute_element_stiffness_matrix(
    element: &Element,
    nodes: &[Node],
    metadata: &ModelMetadata,
) -> SMatrix<f64, 6, 6> {
    let element_area = compute_element_area(element, nodes);
    let stress_strain_mat =
        compute_stress_strain_matrix(metadata.poisson_ratio, metadata.youngs_modulus);
    let strain_displacement_mat = compute_strain_displacement_matrix(element, nodes, element_area);

    (strain_displacement_mat.transpose() * stress_strain_mat)
        * strain_displacement_mat
        * element_area
        * metadata.part_thickness
}

/// Compiles element stiffness matrices into a sparse total stiffness matrix
///
/// # Arguments
/// * `nodes` - The mesh nodes
/// * `elements` - The mesh elements
/// * `element_stiffness_matrices` - Element matrices matching `elements`
fn build_total_stiffness_matrix(
    nodes: &[Node],
    elements: &[Element],
    element_stiffness_matrices: &[SMatrix<f64, 6, 6>],
) -> CsrMatrix<f64> {
    let size = DOF * nodes.len();
    let mut total_stiffness_matrix: CooMatrix<f64> = CooMatrix::new(size, size);

    for (stiffness_mat, element) in std::iter::zip(element_stiffness_matrices, elements) {
        for (local_row, node_row) in element.nodes.iter().enumerate() {
            for (local_col, node_col) in element.nodes.iter().enumerate() {
                for a in 0..DOF {
                    for b in 0..DOF {
                        // duplicate entries are summed on conversion
                        total_stiffness_matrix.push(
                            node_row * DOF + a,
                            node_col * DOF + b,
                            stiffness_mat[(local_row * DOF + a, local_col * DOF + b)],
                        );
                    }
                }
            }
        }
    }

    CsrMatrix::from(&total_stiffness_matrix)
}

/// Creates nodal forces and nodal displacement column vectors
///
/// # Returns
/// The nodal forces and nodal displacements column vectors, in that order
fn build_col_vecs(nodes: &[Node]) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let mut nodal_forces: Vec<Option<f64>> = Vec::with_capacity(nodes.len() * DOF);
    let mut nodal_displacements: Vec<Option<f64>> = Vec::with_capacity(nodes.len() * DOF);

    for node in nodes {
        nodal_forces.push(node.fx);
        nodal_forces.push(node.fy);
        nodal_displacements.push(node.ux);
        nodal_displacements.push(node.uy);
    }

    (nodal_forces, nodal_displacements)
}

/// Partitions the total system down to the unknown displacements
///
/// Rows with a known force and columns with an unknown displacement make up
/// the reduced matrix; known displacements move to the right-hand side.
///
/// # Returns
/// The reduced stiffness matrix, its right-hand side, and the global index of
/// each unknown, in that order
fn build_reduced_system(
    nodal_forces: &[Option<f64>],
    nodal_displacements: &[Option<f64>],
    total_stiffness_matrix: &CsrMatrix<f64>,
) -> Result<(CsrMatrix<f64>, DVector<f64>, Vec<usize>), SimError> {
    let mut unknown_index: Vec<Option<usize>> = vec![None; nodal_displacements.len()];
    let mut unknowns: Vec<usize> = Vec::new();

    for (i, (force, displacement)) in std::iter::zip(nodal_forces, nodal_displacements).enumerate()
    {
        match (force, displacement) {
            (Some(_), None) => {
                unknown_index[i] = Some(unknowns.len());
                unknowns.push(i);
            }
            (None, Some(_)) => {}
            _ => {
                return Err(SimError::Solver(format!(
                    "Degree of freedom {i} must have exactly one of force or displacement"
                )))
            }
        }
    }

    if unknowns.is_empty() {
        return Err(SimError::Solver(
            "Model has no free degrees of freedom".to_owned(),
        ));
    }

    let mut rhs: DVector<f64> = DVector::from_iterator(
        unknowns.len(),
        unknowns.iter().map(|&i| nodal_forces[i].unwrap_or(0.0)),
    );
    let mut reduced: CooMatrix<f64> = CooMatrix::new(unknowns.len(), unknowns.len());

    for (row, col, value) in total_stiffness_matrix.triplet_iter() {
        let Some(local_row) = unknown_index[row] else {
            continue;
        };
        match (unknown_index[col], nodal_displacements[col]) {
            (Some(local_col), _) => reduced.push(local_row, local_col, *value),
            (None, Some(known)) => rhs[local_row] -= value * known,
            (None, None) => {}
        }
    }

    Ok((CsrMatrix::from(&reduced), rhs, unknowns))
}

/// Solves for the displacements in the nodes. Loads the results into the node
/// objects
fn solve(
    nodes: &mut [Node],
    total_stiffness_matrix: &CsrMatrix<f64>,
    settings: &SolverSettings,
) -> Result<(), SimError> {
    let (nodal_forces, nodal_displacements) = build_col_vecs(nodes);

    let (unknown_matrix, known_vector, unknowns) =
        build_reduced_system(&nodal_forces, &nodal_displacements, total_stiffness_matrix)?;

    let start = std::time::Instant::now();
    info!("solving {} unknown displacements...", unknowns.len());
    let displacement_solution = run_conjugate_gradient(&unknown_matrix, &known_vector, settings)?;
    info!(
        "solved system in {:.3} seconds",
        start.elapsed().as_secs_f32()
    );

    let mut displacements: Vec<f64> = nodal_displacements
        .iter()
        .map(|u| u.unwrap_or(0.0))
        .collect();
    for (local, global) in unknowns.iter().enumerate() {
        displacements[*global] = displacement_solution[local];
    }

    for (i, node) in nodes.iter_mut().enumerate() {
        node.ux = Some(displacements[DOF * i]);
        node.uy = Some(displacements[DOF * i + 1]);
    }

    Ok(())
}

/// Calculates von Mises stress and equivalent strain in each element
fn compute_stress(
    elements: &mut [Element],
    nodes: &[Node],
    metadata: &ModelMetadata,
) -> Result<(), SimError> {
    let stress_strain_mat =
        compute_stress_strain_matrix(metadata.poisson_ratio, metadata.youngs_modulus);

    for element in elements.iter_mut() {
        let mut nodal_displacements = [0.0; 6];
        for (k, &i) in element.nodes.iter().enumerate() {
            let (Some(ux), Some(uy)) = (nodes[i].ux, nodes[i].uy) else {
                return Err(SimError::Solver(format!(
                    "Node {i} has no displacement after solve"
                )));
            };
            nodal_displacements[DOF * k] = ux;
            nodal_displacements[DOF * k + 1] = uy;
        }

        let displacement_mat: SMatrix<f64, { DOF * 3 }, 1> = SMatrix::from(nodal_displacements);
        let strain = compute_strain_displacement_matrix(
            element,
            nodes,
            compute_element_area(element, nodes),
        ) * displacement_mat;
        let stress = stress_strain_mat * strain;

        let (sx, sy, txy) = (stress[0], stress[1], stress[2]);
        element.stress = Some(f64::sqrt(
            sx * sx - sx * sy + sy * sy + 3.0 * txy * txy,
        ));

        let (ex, ey, gxy) = (strain[0], strain[1], strain[2]);
        element.strain = Some(f64::sqrt(ex * ex + ey * ey + 0.5 * gxy * gxy));
    }

    Ok(())
}

/// Runs the solver. Updates values on nodes and elements vectors
///
/// # Arguments
/// * `nodes` - The constrained mesh nodes
/// * `elements` - The mesh elements
/// * `metadata` - Material and loading constants
/// * `settings` - Conjugate gradient settings
/// * `progress` - Receives a checkpoint after each stage
pub fn run(
    nodes: &mut [Node],
    elements: &mut [Element],
    metadata: &ModelMetadata,
    settings: &SolverSettings,
    progress: &mut dyn FnMut(u8),
) -> Result<(), SimError> {
    debug!("building {} element stiffness matrices...", elements.len());
    let element_stiffness_matrices: Vec<SMatrix<f64, 6, 6>> = elements
        .iter()
        .map(|element| compute_element_stiffness_matrix(element, nodes, metadata))
        .collect();

    let total_stiffness_matrix =
        build_total_stiffness_matrix(nodes, elements, &element_stiffness_matrices);
    info!(
        "assembled total stiffness matrix with {} entries",
        total_stiffness_matrix.nnz()
    );
    progress(PROGRESS_ASSEMBLED);

    solve(nodes, &total_stiffness_matrix, settings)?;
    progress(PROGRESS_SOLVED);

    compute_stress(elements, nodes, metadata)?;
    progress(PROGRESS_PROJECTED);

    Ok(())
}

/// Reduces solved fields to the scalar summary reported for a job
pub fn summarize(nodes: &[Node], elements: &[Element]) -> Result<SolverSummary, SimError> {
    let mut stresses: Vec<f64> = Vec::with_capacity(elements.len());
    let mut strains: Vec<f64> = Vec::with_capacity(elements.len());
    for element in elements {
        match (element.stress, element.strain) {
            (Some(stress), Some(strain)) if stress.is_finite() && strain.is_finite() => {
                stresses.push(stress);
                strains.push(strain);
            }
            _ => {
                return Err(SimError::Solver(
                    "Element stress is missing or not finite".to_owned(),
                ))
            }
        }
    }
    if stresses.is_empty() {
        return Err(SimError::Solver("Model has no elements".to_owned()));
    }

    let (worst, max_stress) = stresses
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::MIN), |best, (i, s)| if s > best.1 { (i, s) } else { best });
    let min_stress = stresses.iter().copied().fold(f64::MAX, f64::min);
    let avg_stress =
        (stresses.iter().sum::<f64>() / stresses.len() as f64).clamp(min_stress, max_stress);
    let max_strain = strains.iter().copied().fold(0.0, f64::max);
    let avg_strain = strains.iter().sum::<f64>() / strains.len() as f64;

    let max_deformation = nodes
        .iter()
        .map(|n| f64::hypot(n.ux.unwrap_or(0.0), n.uy.unwrap_or(0.0)))
        .fold(0.0, f64::max);

    let centroid = elements[worst].nodes.map(|i| nodes[i].vertex);
    let hotspot_location = [
        centroid.iter().map(|v| v.x).sum::<f64>() / 3.0,
        centroid.iter().map(|v| v.y).sum::<f64>() / 3.0,
    ];

    Ok(SolverSummary {
        max_stress,
        min_stress,
        avg_stress,
        max_strain,
        avg_strain,
        max_deformation,
        hotspot_location,
    })
}
