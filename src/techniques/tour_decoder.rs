use bitvec::bitvec;
use std::fmt::Display;

use crate::{
    flowtsp_objects::distance_matrix::{Arc, Distance, DistanceMatrix, Vertex},
    techniques::flow_formulation::FlowFormulation,
};

/// Numerical slack allowed when reading a solver assignment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodeTolerances {
    /// An arc is selected if its x value exceeds 1 - selection.
    pub selection: f64,
    /// Maximum absolute difference between the reported objective and the recomputed tour length.
    pub objective: f64,
}

impl Default for DecodeTolerances {
    fn default() -> Self {
        Self {
            selection: 0.01,
            objective: 1.0,
        }
    }
}

/// A Hamiltonian circuit read back from a solver assignment.
#[derive(Clone, Debug, PartialEq)]
pub struct Tour {
    /// n + 1 vertices; the first and the last are the root.
    pub vertices: Vec<Vertex>,
    pub arcs: Vec<Arc>,
    /// Flow per arc, in tour order. The closing arc has none.
    pub flows: Vec<Option<f64>>,
    pub length: Distance,
}

/// The assignment does not describe a single circuit. Each of these means the formulation or
/// the solver is inconsistent, never that the instance is unusual.
#[derive(Clone, Debug, PartialEq)]
pub enum TourError {
    /// The solution carries no values for the formulation's variables.
    MissingValues,
    SelectedArcCount { expected: usize, found: usize },
    /// Not exactly one selected arc enters the root.
    ClosingArcCountMismatch { found: Vec<Arc> },
    FlowNotDecreasing { earlier: (Arc, f64), later: (Arc, f64) },
    TourDisconnected { from: Arc, to: Arc },
    TourNotClosed { first: Arc, last: Arc },
    DuplicateVertex(Vertex),
    ObjectiveMismatch { reported: f64, recomputed: Distance },
}

impl Display for TourError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TourError::MissingValues => write!(f, "the solution has no values for the formulation"),
            TourError::SelectedArcCount { expected, found } => write!(
                f,
                "{} arcs are selected, but a tour on {} vertices has {}",
                found, expected, expected
            ),
            TourError::ClosingArcCountMismatch { found } => write!(
                f,
                "exactly one selected arc without flow should enter the root, but found {} ({})",
                found.len(),
                found.iter().map(|arc| arc.to_string()).collect::<Vec<_>>().join(", ")
            ),
            TourError::FlowNotDecreasing { earlier, later } => write!(
                f,
                "flow {} on {} does not exceed flow {} on {}",
                earlier.1, earlier.0, later.1, later.0
            ),
            TourError::TourDisconnected { from, to } => {
                write!(f, "{}-{} are not connected", from, to)
            }
            TourError::TourNotClosed { first, last } => {
                write!(f, "{}-{} do not close the tour", last, first)
            }
            TourError::DuplicateVertex(v) => write!(f, "vertex {} is visited more than once", v),
            TourError::ObjectiveMismatch {
                reported,
                recomputed,
            } => write!(
                f,
                "the solver reports objective {} but the tour has length {}",
                reported, recomputed
            ),
        }
    }
}

impl std::error::Error for TourError {}

struct SelectedArc {
    index: usize,
    tail: usize,
    head: usize,
    flow: Option<f64>,
}

/**
 * Reconstructs the tour from the values of the formulation's variables, and verifies that it is a
 * single Hamiltonian circuit whose length matches the objective reported by the solver.
 */
pub fn decode(
    formulation: &FlowFormulation,
    matrix: &DistanceMatrix,
    values: &[f64],
    objective: f64,
    tolerances: &DecodeTolerances,
) -> Result<Tour, TourError> {
    let indexer = formulation.arc_indexer();
    let n = indexer.number_of_vertices();
    if values.len() != formulation.model().number_of_variables() {
        return Err(TourError::MissingValues);
    }
    let arc_of = |selected: &SelectedArc| {
        Arc::new(matrix.vertex(selected.tail), matrix.vertex(selected.head))
    };

    //selection
    let selected = (0..indexer.number_of_arcs())
        .filter(|index| values[formulation.selection(*index).idx()] > 1.0 - tolerances.selection)
        .map(|index| {
            let (tail, head) = indexer.endpoints(index);
            SelectedArc {
                index,
                tail,
                head,
                flow: formulation.flow(index).map(|f| values[f.idx()]),
            }
        })
        .collect::<Vec<_>>();
    if selected.len() != n {
        return Err(TourError::SelectedArcCount {
            expected: n,
            found: selected.len(),
        });
    }
    log::debug!("{} arcs selected", selected.len());

    //closing arc
    let (closing, mut ordered): (Vec<SelectedArc>, Vec<SelectedArc>) =
        selected.into_iter().partition(|arc| arc.flow.is_none());
    let closing = match <[SelectedArc; 1]>::try_from(closing) {
        Ok([closing]) => closing,
        Err(closing) => {
            return Err(TourError::ClosingArcCountMismatch {
                found: closing.iter().map(arc_of).collect(),
            });
        }
    };

    //order by flow, which counts the vertices still to visit
    ordered.sort_by(|a, b| {
        let flow_a = a.flow.unwrap_or(f64::NAN);
        let flow_b = b.flow.unwrap_or(f64::NAN);
        flow_b.total_cmp(&flow_a).then(a.index.cmp(&b.index))
    });
    for pair in ordered.windows(2) {
        let (earlier, later) = (pair[0].flow.unwrap_or(f64::NAN), pair[1].flow.unwrap_or(f64::NAN));
        if !(earlier > later) {
            return Err(TourError::FlowNotDecreasing {
                earlier: (arc_of(&pair[0]), earlier),
                later: (arc_of(&pair[1]), later),
            });
        }
    }
    ordered.push(closing);

    //chain
    for pair in ordered.windows(2) {
        if pair[0].head != pair[1].tail {
            return Err(TourError::TourDisconnected {
                from: arc_of(&pair[0]),
                to: arc_of(&pair[1]),
            });
        }
    }
    let first = &ordered[0];
    let last = &ordered[ordered.len() - 1];
    if last.head != first.tail {
        return Err(TourError::TourNotClosed {
            first: arc_of(first),
            last: arc_of(last),
        });
    }

    //vertices
    let mut positions = ordered.iter().map(|arc| arc.tail).collect::<Vec<_>>();
    positions.push(last.head);
    debug_assert_eq!(positions.len(), n + 1);
    let mut visited = bitvec![0; n];
    for position in &positions[..n] {
        if visited[*position] {
            return Err(TourError::DuplicateVertex(matrix.vertex(*position)));
        }
        visited.set(*position, true);
    }

    //objective
    let length: Distance = ordered
        .iter()
        .map(|arc| matrix.distance_at(arc.tail, arc.head))
        .sum();
    if !((objective - length as f64).abs() < tolerances.objective) {
        return Err(TourError::ObjectiveMismatch {
            reported: objective,
            recomputed: length,
        });
    }

    Ok(Tour {
        vertices: positions.into_iter().map(|p| matrix.vertex(p)).collect(),
        arcs: ordered.iter().map(arc_of).collect(),
        flows: ordered.iter().map(|arc| arc.flow).collect(),
        length,
    })
}
