use crate::{
    flowtsp_objects::distance_matrix::{ArcIndexer, DistanceMatrix, InstanceError, Vertex},
    optimisation_algorithms::mixed_integer_linear_programming::{
        LinearExpression, MipModel, Relation, Sense, VariableHandle, VariableKind,
    },
};

/**
 * Single-commodity flow formulation of the asymmetric TSP.
 *
 * Every arc gets a binary selection variable x; every arc not entering the root gets a
 * continuous flow variable f, the number of vertices still to visit after traversing it.
 * Flow leaves the root at n - 1 and drops by one at every other vertex, which rules out
 * any cycle that avoids the root.
 */
#[derive(Clone, Debug)]
pub struct FlowFormulation {
    model: MipModel,
    indexer: ArcIndexer,
    root: usize,
    selection: Vec<VariableHandle>,
    flow: Vec<Option<VariableHandle>>,
}

impl FlowFormulation {
    pub fn build(matrix: &DistanceMatrix, root: Vertex) -> Result<Self, InstanceError> {
        let root = matrix
            .position(root)
            .ok_or(InstanceError::UnknownRoot(root))?;
        let indexer = matrix.arc_indexer();
        let n = indexer.number_of_vertices();
        if n < 3 {
            return Err(InstanceError::TooFewVertices(n));
        }
        log::info!(
            "formulate {} vertices, {} arcs, root {}",
            n,
            indexer.number_of_arcs(),
            matrix.vertex(root)
        );

        let mut model = MipModel::new("TSPorHamiltonianPathFF");
        let name = |index: usize| {
            let (tail, head) = indexer.endpoints(index);
            format!("({},{})", matrix.vertex(tail), matrix.vertex(head))
        };

        //variables
        let selection = (0..indexer.number_of_arcs())
            .map(|index| model.build_variable(VariableKind::Binary, format!("x{}", name(index))))
            .collect::<Vec<_>>();
        let flow = (0..indexer.number_of_arcs())
            .map(|index| {
                let (_, head) = indexer.endpoints(index);
                (head != root).then(|| {
                    model.build_variable(VariableKind::Continuous, format!("f{}", name(index)))
                })
            })
            .collect::<Vec<_>>();

        //objective
        model.set_objective(
            indexer.iter().zip(selection.iter()).map(|((tail, head), x)| {
                (*x, matrix.distance_at(tail, head) as f64)
            }),
            Sense::Minimize,
        );

        //degrees
        for v in 0..n {
            model.add_constraint(
                indexer.incoming(v).map(|a| (selection[a], 1.0)),
                Relation::Eq,
                1.0,
                format!("in({})", matrix.vertex(v)),
            );
            model.add_constraint(
                indexer.outgoing(v).map(|a| (selection[a], 1.0)),
                Relation::Eq,
                1.0,
                format!("out({})", matrix.vertex(v)),
            );
        }

        //flow conservation: every non-root vertex consumes one unit
        for v in (0..n).filter(|v| *v != root) {
            let mut expr: LinearExpression = indexer
                .incoming(v)
                .filter_map(|a| flow[a].map(|f| (f, 1.0)))
                .collect();
            expr.extend(indexer.outgoing(v).filter_map(|a| flow[a].map(|f| (f, -1.0))));
            model.add_constraint(expr, Relation::Eq, 1.0, format!("flow({})", matrix.vertex(v)));
        }

        //linking: flow only on selected arcs
        for (index, (tail, head)) in indexer.iter().enumerate() {
            let Some(f) = flow[index] else {
                continue;
            };
            let x = selection[index];
            if tail == root {
                model.add_constraint(
                    [(f, 1.0), (x, -((n - 1) as f64))],
                    Relation::Eq,
                    0.0,
                    format!("link{}", name(index)),
                );
            } else {
                debug_assert!(head != root);
                model.add_constraint(
                    [(f, 1.0), (x, -((n - 2) as f64))],
                    Relation::Le,
                    0.0,
                    format!("link{}", name(index)),
                );
            }
        }

        log::debug!(
            "formulation has {} variables and {} constraints",
            model.number_of_variables(),
            model.number_of_constraints()
        );

        Ok(Self {
            model,
            indexer,
            root,
            selection,
            flow,
        })
    }

    pub fn model(&self) -> &MipModel {
        &self.model
    }

    pub fn arc_indexer(&self) -> ArcIndexer {
        self.indexer
    }

    /// Position of the root vertex.
    pub fn root(&self) -> usize {
        self.root
    }

    pub fn selection(&self, arc: usize) -> VariableHandle {
        self.selection[arc]
    }

    /// The flow variable of an arc; None for the arcs entering the root.
    pub fn flow(&self, arc: usize) -> Option<VariableHandle> {
        self.flow[arc]
    }

    /**
     * The assignment that the formulation intends for a tour given as vertex positions, starting anywhere.
     */
    pub fn assignment_of(&self, tour: &[usize]) -> Vec<f64> {
        let n = self.indexer.number_of_vertices();
        let mut values = vec![0.0; self.model.number_of_variables()];
        let Some(start) = tour.iter().position(|v| *v == self.root) else {
            return values;
        };
        for step in 0..tour.len() {
            let tail = tour[(start + step) % tour.len()];
            let head = tour[(start + step + 1) % tour.len()];
            let arc = self.indexer.index(tail, head);
            values[self.selection[arc].idx()] = 1.0;
            if let Some(f) = self.flow[arc] {
                values[f.idx()] = (n - 1 - step) as f64;
            }
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::{
        flowtsp_objects::distance_matrix::{DistanceMatrix, InstanceError},
        optimisation_algorithms::mixed_integer_linear_programming::VariableKind,
        techniques::flow_formulation::FlowFormulation,
    };

    #[test]
    fn formulation_size() {
        for n in 3..8 {
            let matrix = DistanceMatrix::random(n, 7, 1..=99).unwrap();
            let formulation = FlowFormulation::build(&matrix, 1).unwrap();
            let model = formulation.model();

            assert_eq!(model.number_of_variables_of(VariableKind::Binary), n * (n - 1));
            assert_eq!(model.number_of_variables_of(VariableKind::Continuous), (n - 1) * (n - 1));
            assert_eq!(model.number_of_constraints(), n * n + n);
        }
    }

    #[test]
    fn closing_arcs_have_no_flow() {
        let fin = fs::read_to_string("testfiles/cycle4.atsp").unwrap();
        let matrix = fin.parse::<DistanceMatrix>().unwrap();
        let formulation = FlowFormulation::build(&matrix, 3).unwrap();
        let indexer = formulation.arc_indexer();
        let root = formulation.root();
        assert_eq!(matrix.vertex(root), 3);

        for (index, (_, head)) in indexer.iter().enumerate() {
            assert_eq!(formulation.flow(index).is_none(), head == root);
        }
    }

    #[test]
    fn tour_assignment_is_feasible() {
        let matrix = DistanceMatrix::random(6, 3, 1..=99).unwrap();
        let formulation = FlowFormulation::build(&matrix, 1).unwrap();
        let values = formulation.assignment_of(&[0, 3, 1, 5, 2, 4]);

        assert!(formulation.model().violations(&values, 1e-9).is_empty());
        let length = matrix.tour_length(&[1, 4, 2, 6, 3, 5, 1]).unwrap();
        assert_eq!(formulation.model().objective().evaluate(&values), length as f64);
    }

    #[test]
    fn subtours_are_infeasible() {
        let fin = fs::read_to_string("testfiles/two_cycles4.atsp").unwrap();
        let matrix = fin.parse::<DistanceMatrix>().unwrap();
        let formulation = FlowFormulation::build(&matrix, 1).unwrap();
        let indexer = formulation.arc_indexer();

        // degrees are fine for the two 2-cycles, but no flow values can make them feasible
        let mut values = vec![0.0; formulation.model().number_of_variables()];
        for (tail, head) in [(0, 1), (1, 0), (2, 3), (3, 2)] {
            values[formulation.selection(indexer.index(tail, head)).idx()] = 1.0;
        }
        values[formulation.flow(indexer.index(0, 1)).unwrap().idx()] = 3.0;

        let violations = formulation.model().violations(&values, 1e-9);
        assert!(violations.iter().all(|name| !name.starts_with("in") && !name.starts_with("out")));
        assert!(!violations.is_empty());
    }

    #[test]
    fn unknown_root() {
        let matrix = DistanceMatrix::random(4, 1, 1..=99).unwrap();
        assert_eq!(
            FlowFormulation::build(&matrix, 9).unwrap_err(),
            InstanceError::UnknownRoot(9)
        );
    }
}
