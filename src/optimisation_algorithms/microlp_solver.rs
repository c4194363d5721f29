use microlp::{ComparisonOp, Error, LinearExpr, OptimizationDirection, Problem};
use std::{
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::Duration,
};

use crate::optimisation_algorithms::mixed_integer_linear_programming::{
    MipModel, MipSolution, MipSolver, Relation, Sense, SolverError, ThreadHint, VariableKind,
};

/// Solves models with the pure-Rust branch-and-bound of the `microlp` crate.
///
/// microlp reports no incumbent while it searches, so a time-limited run either
/// finishes with a proven optimum or returns [`SolveStatus::NoSolutionFound`](crate::optimisation_algorithms::mixed_integer_linear_programming::SolveStatus).
/// The search itself is single-threaded.
///
/// Each call runs the search on its own worker thread. When the time limit
/// expires, `solve` returns but that thread keeps searching until microlp
/// finishes; its result is discarded. Long-lived callers that hit the limit
/// repeatedly accumulate such threads.
#[derive(Clone, Copy, Debug, Default)]
pub struct MicrolpSolver;

impl MicrolpSolver {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn to_problem(model: &MipModel) -> (Problem, Vec<microlp::Variable>) {
        let direction = match model.sense() {
            Sense::Minimize => OptimizationDirection::Minimize,
            Sense::Maximize => OptimizationDirection::Maximize,
        };
        let mut problem = Problem::new(direction);

        let variables = model
            .variables()
            .iter()
            .zip(model.objective_coefficients())
            .map(|(variable, coeff)| match variable.kind {
                VariableKind::Binary => problem.add_binary_var(coeff),
                VariableKind::Continuous => problem.add_var(coeff, (0.0, f64::INFINITY)),
            })
            .collect::<Vec<_>>();

        for constraint in model.constraints() {
            let mut expr = LinearExpr::empty();
            for (var, coeff) in constraint.expression.normalised() {
                expr.add(variables[var.idx()], coeff);
            }
            let cmp_op = match constraint.relation {
                Relation::Eq => ComparisonOp::Eq,
                Relation::Le => ComparisonOp::Le,
                Relation::Ge => ComparisonOp::Ge,
            };
            problem.add_constraint(expr, cmp_op, constraint.rhs);
        }

        (problem, variables)
    }
}

impl MipSolver for MicrolpSolver {
    fn name(&self) -> &str {
        "microlp"
    }

    fn solve(
        &self,
        model: &MipModel,
        time_limit: Duration,
        threads: ThreadHint,
    ) -> Result<MipSolution, SolverError> {
        if let Some(n) = threads.resolve().filter(|n| *n > 1) {
            log::debug!("microlp searches single-threaded; ignoring the hint of {} threads", n);
        }

        let (problem, variables) = Self::to_problem(model);
        log::debug!("handing {:?} to microlp", problem);

        let (sender, receiver) = mpsc::channel();
        thread::Builder::new()
            .name("microlp".to_string())
            .spawn(move || {
                let result = problem.solve().map(|solution| {
                    let values = variables.iter().map(|var| solution[*var]).collect::<Vec<f64>>();
                    (solution.objective(), values)
                });
                //the receiver is gone if the time limit passed; nobody is interested anymore
                let _ = sender.send(result);
            })
            .map_err(|e| SolverError::Aborted(e.to_string()))?;

        match receiver.recv_timeout(time_limit) {
            Ok(Ok((objective, values))) => Ok(MipSolution::with_solution(true, objective, values)),
            Ok(Err(Error::Infeasible)) => Ok(MipSolution::infeasible()),
            Ok(Err(Error::Unbounded)) => Err(SolverError::Unbounded),
            Ok(Err(Error::InternalError(msg))) => Err(SolverError::InternalError(msg)),
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "microlp did not finish within {:.1}s; leaving it behind without a solution",
                    time_limit.as_secs_f64()
                );
                Ok(MipSolution::no_solution_found())
            }
            Err(RecvTimeoutError::Disconnected) => Err(SolverError::Aborted(
                "the solver thread stopped without reporting".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use ntest::timeout;
    use std::time::Duration;

    use crate::{
        flowtsp_objects::distance_matrix::DistanceMatrix,
        optimisation_algorithms::{
            microlp_solver::MicrolpSolver,
            mixed_integer_linear_programming::{
                MipModel, MipSolver, Relation, Sense, SolveStatus, ThreadHint, VariableKind,
            },
        },
        techniques::flow_formulation::FlowFormulation,
    };

    #[test]
    #[timeout(60000)]
    fn microlp_knapsack() {
        // maximise 3a + 2b + 6c + d + 3e + 8f subject to 2a + b + 3c + 2d + e + 4f <= 10
        let weights = [2.0, 1.0, 3.0, 2.0, 1.0, 4.0];
        let values = [3.0, 2.0, 6.0, 1.0, 3.0, 8.0];
        let mut model = MipModel::new("knapsack");
        let items = (0..weights.len())
            .map(|i| model.build_variable(VariableKind::Binary, format!("x{}", i)))
            .collect::<Vec<_>>();
        model.set_objective(
            items.iter().zip(values).map(|(x, v)| (*x, v)),
            Sense::Maximize,
        );
        model.add_constraint(
            items.iter().zip(weights).map(|(x, w)| (*x, w)),
            Relation::Le,
            10.0,
            "capacity",
        );

        let solution = MicrolpSolver::new()
            .solve(&model, Duration::from_secs(30), ThreadHint::SolverDefault)
            .unwrap();

        assert_eq!(solution.status(), SolveStatus::Optimal);
        assert!((solution.objective().unwrap() - 20.0).abs() < 1e-6);
        assert!(model.violations(solution.values().unwrap(), 1e-6).is_empty());
    }

    #[test]
    #[timeout(60000)]
    fn microlp_infeasible() {
        let mut model = MipModel::new("infeasible");
        let x = model.build_variable(VariableKind::Binary, "x");
        let y = model.build_variable(VariableKind::Continuous, "y");
        model.set_objective([(x, 1.0), (y, 1.0)], Sense::Minimize);
        model.add_constraint([(x, 1.0), (y, 1.0)], Relation::Le, 1.0, "le");
        model.add_constraint([(x, 1.0), (y, 1.0)], Relation::Ge, 2.0, "ge");

        let solution = MicrolpSolver::new()
            .solve(&model, Duration::from_secs(30), ThreadHint::AllAvailable)
            .unwrap();

        assert_eq!(solution.status(), SolveStatus::Infeasible);
        assert_eq!(solution.values(), None);
    }

    #[test]
    #[timeout(60000)]
    fn microlp_time_limit() {
        let matrix = DistanceMatrix::random(9, 5, 1..=99).unwrap();
        let formulation = FlowFormulation::build(&matrix, 1).unwrap();

        let solution = MicrolpSolver::new()
            .solve(formulation.model(), Duration::ZERO, ThreadHint::SolverDefault)
            .unwrap();

        assert_eq!(solution.status(), SolveStatus::NoSolutionFound);
        assert_eq!(solution.values(), None);
        assert_eq!(solution.objective(), None);
    }
}
