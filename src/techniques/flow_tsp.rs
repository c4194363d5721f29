use serde_json::{Value, json};
use std::{
    fmt::Display,
    time::{Duration, Instant},
};

use crate::{
    flowtsp_objects::distance_matrix::{DistanceMatrix, InstanceError, Vertex},
    optimisation_algorithms::mixed_integer_linear_programming::{
        MipSolver, SolveStatus, SolverError, ThreadHint,
    },
    techniques::{
        flow_formulation::FlowFormulation,
        tour_decoder::{self, DecodeTolerances, Tour, TourError},
    },
};

/// Everything the caller decides about one run.
#[derive(Clone, Debug, PartialEq)]
pub struct SolveParameters {
    /// The vertex flow is measured from. None takes the first vertex of the instance.
    pub root: Option<Vertex>,
    pub time_limit: Duration,
    pub threads: ThreadHint,
    pub tolerances: DecodeTolerances,
}

impl Default for SolveParameters {
    fn default() -> Self {
        Self {
            root: None,
            time_limit: Duration::from_secs(60 * 60),
            threads: ThreadHint::AllAvailable,
            tolerances: DecodeTolerances::default(),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum AtspError {
    Instance(InstanceError),
    Solver(SolverError),
    /// The solver finished without a solution; there is nothing to decode.
    NoTour(SolveStatus),
    Decode(TourError),
}

impl Display for AtspError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtspError::Instance(e) => write!(f, "invalid instance: {}", e),
            AtspError::Solver(e) => write!(f, "{}", e),
            AtspError::NoTour(status) => write!(f, "the solver returned no tour: {}", status),
            AtspError::Decode(e) => write!(f, "inconsistent solution: {}", e),
        }
    }
}

impl std::error::Error for AtspError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AtspError::Instance(e) => Some(e),
            AtspError::Solver(e) => Some(e),
            AtspError::NoTour(_) => None,
            AtspError::Decode(e) => Some(e),
        }
    }
}

impl From<InstanceError> for AtspError {
    fn from(value: InstanceError) -> Self {
        AtspError::Instance(value)
    }
}

impl From<SolverError> for AtspError {
    fn from(value: SolverError) -> Self {
        AtspError::Solver(value)
    }
}

impl From<TourError> for AtspError {
    fn from(value: TourError) -> Self {
        AtspError::Decode(value)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TourReport {
    pub tour: Tour,
    pub is_optimal: bool,
    pub objective: f64,
    pub solver: String,
    pub number_of_variables: usize,
    pub number_of_constraints: usize,
    pub formulation_time: Duration,
    pub optimisation_time: Duration,
}

impl TourReport {
    pub fn to_json(&self) -> Value {
        json!({
            "tour": self.tour.vertices,
            "distance": self.tour.length,
            "optimal": self.is_optimal,
            "objective": self.objective,
            "solver": self.solver,
            "variables": self.number_of_variables,
            "constraints": self.number_of_constraints,
            "formulation_seconds": self.formulation_time.as_secs_f64(),
            "optimisation_seconds": self.optimisation_time.as_secs_f64(),
        })
    }
}

impl Display for TourReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Tour                = {:?}", self.tour.vertices)?;
        writeln!(f, "Sum of distance     = {}", self.tour.length)?;
        writeln!(f, "Optimality          = {}", self.is_optimal)?;
        writeln!(
            f,
            "Time (formulation)  = {:6.1} (s)",
            self.formulation_time.as_secs_f64()
        )?;
        write!(
            f,
            "     (optimisation) = {:6.1} (s)",
            self.optimisation_time.as_secs_f64()
        )
    }
}

pub trait FlowTsp {
    /**
     * Formulates the instance, makes one blocking solver call and decodes the result into a verified tour.
     */
    fn solve_flow_tsp(
        &self,
        solver: &dyn MipSolver,
        parameters: &SolveParameters,
    ) -> Result<TourReport, AtspError>;
}

impl FlowTsp for DistanceMatrix {
    fn solve_flow_tsp(
        &self,
        solver: &dyn MipSolver,
        parameters: &SolveParameters,
    ) -> Result<TourReport, AtspError> {
        let root = parameters.root.unwrap_or_else(|| self.vertex(0));

        let start = Instant::now();
        let formulation = FlowFormulation::build(self, root)?;
        let formulation_time = start.elapsed();

        log::info!(
            "optimise with {}, time limit {:.1}s, threads {}",
            solver.name(),
            parameters.time_limit.as_secs_f64(),
            parameters.threads
        );
        let start = Instant::now();
        let solution = solver.solve(formulation.model(), parameters.time_limit, parameters.threads)?;
        let optimisation_time = start.elapsed();
        log::info!(
            "solver finished as {} after {:.1}s",
            solution.status(),
            optimisation_time.as_secs_f64()
        );

        let (objective, values) = match (solution.status(), solution.objective(), solution.values()) {
            (SolveStatus::Optimal | SolveStatus::Feasible, Some(objective), Some(values)) => {
                (objective, values)
            }
            (SolveStatus::Optimal | SolveStatus::Feasible, _, _) => {
                return Err(TourError::MissingValues.into());
            }
            (status, _, _) => return Err(AtspError::NoTour(status)),
        };

        let tour = tour_decoder::decode(&formulation, self, values, objective, &parameters.tolerances)?;
        log::info!("decoded a tour of length {}", tour.length);

        Ok(TourReport {
            tour,
            is_optimal: solution.is_optimal(),
            objective,
            solver: solver.name().to_string(),
            number_of_variables: formulation.model().number_of_variables(),
            number_of_constraints: formulation.model().number_of_constraints(),
            formulation_time,
            optimisation_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use ntest::timeout;
    use std::{fs, time::Duration};

    use crate::{
        flowtsp_objects::distance_matrix::{DistanceMatrix, InstanceError},
        optimisation_algorithms::{
            microlp_solver::MicrolpSolver,
            mixed_integer_linear_programming::{
                MipModel, MipSolution, MipSolver, SolveStatus, SolverError, ThreadHint,
            },
        },
        techniques::{
            brute_force::BruteForce,
            flow_formulation::FlowFormulation,
            flow_tsp::{AtspError, FlowTsp, SolveParameters},
            tour_decoder::TourError,
        },
    };

    /// Hands back a fixed answer, regardless of the model.
    struct ScriptedSolver(Box<dyn Fn(&MipModel) -> Result<MipSolution, SolverError>>);

    impl ScriptedSolver {
        fn new(answer: impl Fn(&MipModel) -> Result<MipSolution, SolverError> + 'static) -> Self {
            Self(Box::new(answer))
        }
    }

    impl MipSolver for ScriptedSolver {
        fn name(&self) -> &str {
            "scripted"
        }

        fn solve(
            &self,
            model: &MipModel,
            _time_limit: Duration,
            _threads: ThreadHint,
        ) -> Result<MipSolution, SolverError> {
            (self.0)(model)
        }
    }

    fn parameters() -> SolveParameters {
        SolveParameters {
            time_limit: Duration::from_secs(60),
            ..Default::default()
        }
    }

    #[test]
    #[timeout(120000)]
    fn solve_cycle4() {
        let fin = fs::read_to_string("testfiles/cycle4.atsp").unwrap();
        let matrix = fin.parse::<DistanceMatrix>().unwrap();

        let report = matrix.solve_flow_tsp(&MicrolpSolver::new(), &parameters()).unwrap();

        assert_eq!(report.tour.vertices, vec![1, 2, 3, 4, 1]);
        assert_eq!(report.tour.length, 4);
        assert!(report.is_optimal);
        assert_eq!(report.number_of_variables, 12 + 9);
        assert_eq!(report.number_of_constraints, 20);
    }

    #[test]
    #[timeout(120000)]
    fn solve_matches_brute_force() {
        for file in ["testfiles/asym5.atsp", "testfiles/two_cycles4.atsp"] {
            let fin = fs::read_to_string(file).unwrap();
            let matrix = fin.parse::<DistanceMatrix>().unwrap();

            let report = matrix.solve_flow_tsp(&MicrolpSolver::new(), &parameters()).unwrap();
            let (optimum, _) = matrix.brute_force(None, ThreadHint::SolverDefault).unwrap();

            assert!(report.is_optimal);
            assert_eq!(report.tour.length, optimum, "{}", file);
        }
    }

    #[test]
    #[timeout(300000)]
    fn solve_random_instances() {
        for (n, seed) in [(4, 1), (5, 2), (5, 3), (6, 4)] {
            let matrix = DistanceMatrix::random(n, seed, 1..=99).unwrap();
            let root = matrix.vertex(n - 1);
            let parameters = SolveParameters {
                root: Some(root),
                ..parameters()
            };

            let report = matrix.solve_flow_tsp(&MicrolpSolver::new(), &parameters).unwrap();
            let (optimum, _) = matrix.brute_force(Some(root), ThreadHint::AllAvailable).unwrap();
            let tour = &report.tour;

            assert_eq!(tour.vertices.len(), n + 1);
            assert_eq!(tour.vertices[0], root);
            assert_eq!(tour.vertices[n], root);
            let mut interior = tour.vertices[..n].to_vec();
            interior.sort();
            assert_eq!(interior, matrix.vertices());

            assert_eq!(tour.flows[n - 1], None);
            let flows = tour.flows[..n - 1].iter().map(|f| f.unwrap()).collect::<Vec<_>>();
            assert!(flows.windows(2).all(|pair| pair[0] > pair[1]));

            assert!((report.objective - tour.length as f64).abs() < 1.0);
            assert_eq!(tour.length, optimum);
        }
    }

    #[test]
    fn feasible_is_not_optimal() {
        let fin = fs::read_to_string("testfiles/cycle4.atsp").unwrap();
        let matrix = fin.parse::<DistanceMatrix>().unwrap();
        let formulation = FlowFormulation::build(&matrix, 1).unwrap();
        let values = formulation.assignment_of(&[0, 2, 1, 3]);
        let solver = ScriptedSolver::new(move |_: &MipModel| {
            Ok(MipSolution::with_solution(false, 301.0, values.clone()))
        });

        let report = matrix.solve_flow_tsp(&solver, &parameters()).unwrap();
        assert!(!report.is_optimal);
        assert_eq!(report.tour.vertices, vec![1, 3, 2, 4, 1]);
        assert_eq!(report.tour.length, 301);
    }

    #[test]
    fn no_tour_without_solution() {
        let matrix = DistanceMatrix::random(4, 1, 1..=99).unwrap();
        for (solution, status) in [
            (MipSolution::infeasible(), SolveStatus::Infeasible),
            (MipSolution::no_solution_found(), SolveStatus::NoSolutionFound),
        ] {
            let solver = ScriptedSolver::new(move |_: &MipModel| Ok(solution.clone()));
            assert_eq!(
                matrix.solve_flow_tsp(&solver, &parameters()).unwrap_err(),
                AtspError::NoTour(status)
            );
        }
    }

    #[test]
    fn errors_propagate() {
        let matrix = DistanceMatrix::random(4, 1, 1..=99).unwrap();

        let solver = ScriptedSolver::new(|_: &MipModel| Err(SolverError::Unbounded));
        assert_eq!(
            matrix.solve_flow_tsp(&solver, &parameters()).unwrap_err(),
            AtspError::Solver(SolverError::Unbounded)
        );

        let solver = ScriptedSolver::new(|model: &MipModel| {
            Ok(MipSolution::with_solution(true, 0.0, vec![0.0; model.number_of_variables()]))
        });
        assert_eq!(
            matrix.solve_flow_tsp(&solver, &parameters()).unwrap_err(),
            AtspError::Decode(TourError::SelectedArcCount {
                expected: 4,
                found: 0
            })
        );

        let parameters = SolveParameters {
            root: Some(17),
            ..parameters()
        };
        assert_eq!(
            matrix.solve_flow_tsp(&solver, &parameters).unwrap_err(),
            AtspError::Instance(InstanceError::UnknownRoot(17))
        );
    }
}
