use anyhow::{Context, Error, Result, anyhow};
use rand::Rng;
use rand_chacha::{ChaCha8Rng, rand_core::SeedableRng};
use rustc_hash::FxHashMap;
use std::{
    fmt::Display,
    io::{self, BufRead},
    ops::RangeInclusive,
    str::FromStr,
};

use crate::line_reader::LineReader;

pub const HEADER: &str = "asymmetric distance matrix";

pub type Vertex = usize;
pub type Distance = u64;

/// A directed arc between two distinct vertices, identified by their labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Arc {
    pub tail: Vertex,
    pub head: Vertex,
}

impl Arc {
    pub fn new(tail: Vertex, head: Vertex) -> Self {
        Self { tail, head }
    }
}

impl Display for Arc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.tail, self.head)
    }
}

/// Dense numbering of the n(n-1) arcs of a complete irreflexive digraph on
/// vertex positions `0..n`. Arcs are numbered tail-major, skipping the diagonal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArcIndexer {
    number_of_vertices: usize,
}

impl ArcIndexer {
    pub fn new(number_of_vertices: usize) -> Self {
        Self { number_of_vertices }
    }

    pub fn number_of_vertices(&self) -> usize {
        self.number_of_vertices
    }

    pub fn number_of_arcs(&self) -> usize {
        self.number_of_vertices * self.number_of_vertices.saturating_sub(1)
    }

    pub fn index(&self, tail: usize, head: usize) -> usize {
        debug_assert!(tail != head);
        debug_assert!(tail < self.number_of_vertices && head < self.number_of_vertices);
        tail * (self.number_of_vertices - 1) + if head > tail { head - 1 } else { head }
    }

    pub fn endpoints(&self, index: usize) -> (usize, usize) {
        debug_assert!(index < self.number_of_arcs());
        let tail = index / (self.number_of_vertices - 1);
        let offset = index % (self.number_of_vertices - 1);
        let head = if offset >= tail { offset + 1 } else { offset };
        (tail, head)
    }

    /// All arcs as position pairs, in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.number_of_arcs()).map(|index| self.endpoints(index))
    }

    /// Indices of the arcs entering `head`.
    pub fn incoming(&self, head: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.number_of_vertices)
            .filter(move |tail| *tail != head)
            .map(move |tail| self.index(tail, head))
    }

    /// Indices of the arcs leaving `tail`.
    pub fn outgoing(&self, tail: usize) -> impl Iterator<Item = usize> + '_ {
        let start = tail * (self.number_of_vertices - 1);
        start..start + self.number_of_vertices - 1
    }
}

/// Reasons an instance is rejected before any model is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstanceError {
    /// A Hamiltonian circuit needs at least three vertices.
    TooFewVertices(usize),
    DuplicateVertex(Vertex),
    /// The distance function does not cover this arc.
    MissingArc(Arc),
    NonPositiveDistance(Arc),
    RowCount { expected: usize, found: usize },
    RaggedRow { vertex: Vertex, expected: usize, found: usize },
    UnknownRoot(Vertex),
}

impl Display for InstanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceError::TooFewVertices(n) => {
                write!(f, "an instance needs at least 3 vertices, but {} were given", n)
            }
            InstanceError::DuplicateVertex(v) => write!(f, "vertex {} appears more than once", v),
            InstanceError::MissingArc(arc) => write!(f, "no distance given for arc {}", arc),
            InstanceError::NonPositiveDistance(arc) => {
                write!(f, "the distance of arc {} is not positive", arc)
            }
            InstanceError::RowCount { expected, found } => {
                write!(f, "expected {} distance rows, but found {}", expected, found)
            }
            InstanceError::RaggedRow {
                vertex,
                expected,
                found,
            } => write!(
                f,
                "the row of vertex {} has {} distances, but {} were expected",
                vertex, found, expected
            ),
            InstanceError::UnknownRoot(v) => write!(f, "root {} is not a vertex of the instance", v),
        }
    }
}

impl std::error::Error for InstanceError {}

/// Arc costs of a complete directed graph. Immutable after construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistanceMatrix {
    vertices: Vec<Vertex>,
    positions: FxHashMap<Vertex, usize>,
    distances: Vec<Distance>,
}

impl DistanceMatrix {
    /**
     * Builds an instance from one row per tail vertex; the diagonal entries are ignored.
     */
    pub fn from_rows(
        vertices: Vec<Vertex>,
        rows: Vec<Vec<Distance>>,
    ) -> Result<Self, InstanceError> {
        if rows.len() != vertices.len() {
            return Err(InstanceError::RowCount {
                expected: vertices.len(),
                found: rows.len(),
            });
        }
        for (vertex, row) in vertices.iter().zip(rows.iter()) {
            if row.len() != vertices.len() {
                return Err(InstanceError::RaggedRow {
                    vertex: *vertex,
                    expected: vertices.len(),
                    found: row.len(),
                });
            }
        }

        let positions = Self::index_vertices(&vertices)?;
        Self::from_fn(vertices, |arc| {
            Some(rows[positions[&arc.tail]][positions[&arc.head]])
        })
    }

    pub fn from_arcs(
        vertices: Vec<Vertex>,
        distances: &FxHashMap<Arc, Distance>,
    ) -> Result<Self, InstanceError> {
        Self::from_fn(vertices, |arc| distances.get(&arc).copied())
    }

    /**
     * Builds an instance by querying the distance function for every arc. Fails on the first arc it does not cover.
     */
    pub fn from_fn(
        vertices: Vec<Vertex>,
        distance: impl Fn(Arc) -> Option<Distance>,
    ) -> Result<Self, InstanceError> {
        let positions = Self::index_vertices(&vertices)?;
        let n = vertices.len();

        let mut distances = vec![0; n * n];
        for (tail_pos, tail) in vertices.iter().enumerate() {
            for (head_pos, head) in vertices.iter().enumerate() {
                if tail_pos == head_pos {
                    continue;
                }
                let arc = Arc::new(*tail, *head);
                match distance(arc) {
                    None => return Err(InstanceError::MissingArc(arc)),
                    Some(0) => return Err(InstanceError::NonPositiveDistance(arc)),
                    Some(d) => distances[tail_pos * n + head_pos] = d,
                }
            }
        }

        Ok(Self {
            vertices,
            positions,
            distances,
        })
    }

    /**
     * Generates a reproducible instance on vertices `1..=n` with uniformly drawn distances.
     */
    pub fn random(
        number_of_vertices: usize,
        seed: u64,
        range: RangeInclusive<Distance>,
    ) -> Result<Self, InstanceError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let vertices: Vec<Vertex> = (1..=number_of_vertices).collect();
        let n = vertices.len();
        let mut rows = vec![vec![0; n]; n];
        for (tail, row) in rows.iter_mut().enumerate() {
            for (head, cell) in row.iter_mut().enumerate() {
                if tail != head {
                    *cell = rng.random_range(range.clone());
                }
            }
        }
        log::debug!(
            "generated {} random distances with seed {}",
            n * n.saturating_sub(1),
            seed
        );
        Self::from_rows(vertices, rows)
    }

    fn index_vertices(vertices: &[Vertex]) -> Result<FxHashMap<Vertex, usize>, InstanceError> {
        if vertices.len() < 3 {
            return Err(InstanceError::TooFewVertices(vertices.len()));
        }
        let mut positions = FxHashMap::default();
        for (position, vertex) in vertices.iter().enumerate() {
            if positions.insert(*vertex, position).is_some() {
                return Err(InstanceError::DuplicateVertex(*vertex));
            }
        }
        Ok(positions)
    }

    pub fn number_of_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex(&self, position: usize) -> Vertex {
        self.vertices[position]
    }

    pub fn position(&self, vertex: Vertex) -> Option<usize> {
        self.positions.get(&vertex).copied()
    }

    pub fn arc_indexer(&self) -> ArcIndexer {
        ArcIndexer::new(self.vertices.len())
    }

    /// All arcs in tail-major order.
    pub fn arcs(&self) -> impl Iterator<Item = Arc> + '_ {
        let indexer = self.arc_indexer();
        (0..indexer.number_of_arcs()).map(move |index| {
            let (tail, head) = indexer.endpoints(index);
            Arc::new(self.vertices[tail], self.vertices[head])
        })
    }

    pub fn distance(&self, tail: Vertex, head: Vertex) -> Option<Distance> {
        if tail == head {
            return None;
        }
        Some(self.distance_at(self.position(tail)?, self.position(head)?))
    }

    pub fn distance_at(&self, tail_pos: usize, head_pos: usize) -> Distance {
        self.distances[tail_pos * self.vertices.len() + head_pos]
    }

    /**
     * Sums the distances along a vertex sequence. Returns None if the sequence uses an unknown vertex or a self-loop.
     */
    pub fn tour_length(&self, tour: &[Vertex]) -> Option<Distance> {
        tour.windows(2)
            .map(|pair| self.distance(pair[0], pair[1]))
            .sum()
    }

    pub fn import(reader: &mut dyn BufRead) -> Result<Self> {
        let mut lreader = LineReader::new(reader);

        let head = lreader
            .next_line_string()
            .with_context(|| format!("failed to read header, which should be `{}`", HEADER))?;
        if head.trim() != HEADER {
            return Err(anyhow!(
                "first line should be exactly `{}`, but found `{}`",
                HEADER,
                head
            ));
        }

        let number_of_vertices = lreader
            .next_line_index()
            .context("failed to read number of vertices")?;

        if number_of_vertices < 3 {
            return Err(InstanceError::TooFewVertices(number_of_vertices).into());
        }

        //the count is unchecked input; rows are only stored once they are read
        let mut vertices = vec![];
        let mut rows = vec![];
        for row_i in 0..number_of_vertices {
            let mut row = lreader.next_line_naturals().with_context(|| {
                format!("failed to read the distance row of vertex {}", row_i)
            })?;
            if row.len().checked_sub(1) != Some(number_of_vertices) {
                return Err(anyhow!(
                    "line {} should contain a vertex followed by {} distances, but found {} values",
                    lreader.get_last_line_number(),
                    number_of_vertices,
                    row.len()
                ));
            }
            let vertex = row.remove(0);
            vertices.push(usize::try_from(vertex).with_context(|| {
                format!(
                    "vertex `{}` at line {} is out of range",
                    vertex,
                    lreader.get_last_line_number()
                )
            })?);
            rows.push(row);
        }

        Ok(Self::from_rows(vertices, rows)?)
    }
}

impl FromStr for DistanceMatrix {
    type Err = Error;

    fn from_str(s: &str) -> std::prelude::v1::Result<Self, Self::Err> {
        let mut reader = io::Cursor::new(s);
        Self::import(&mut reader)
    }
}

impl Display for DistanceMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", HEADER)?;
        writeln!(f, "# number of vertices\n{}", self.vertices.len())?;
        writeln!(
            f,
            "# one row per vertex: the vertex, then its distance to every vertex in this order"
        )?;
        for (tail_pos, tail) in self.vertices.iter().enumerate() {
            write!(f, "{}", tail)?;
            for head_pos in 0..self.vertices.len() {
                write!(f, " {}", self.distance_at(tail_pos, head_pos))?;
            }
            writeln!(f)?;
        }
        write!(f, "")
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rustc_hash::FxHashMap;

    use super::{Arc, ArcIndexer, DistanceMatrix, InstanceError};

    #[test]
    fn arc_indexer_is_dense_and_invertible() {
        let indexer = ArcIndexer::new(5);
        assert_eq!(indexer.number_of_arcs(), 20);

        let mut seen = vec![false; indexer.number_of_arcs()];
        for tail in 0..5 {
            for head in 0..5 {
                if tail == head {
                    continue;
                }
                let index = indexer.index(tail, head);
                assert!(!seen[index]);
                seen[index] = true;
                assert_eq!(indexer.endpoints(index), (tail, head));
            }
        }
        assert!(seen.into_iter().all(|x| x));
    }

    #[test]
    fn arc_indexer_incoming_outgoing() {
        let indexer = ArcIndexer::new(4);
        for v in 0..4 {
            let incoming: Vec<_> = indexer.incoming(v).collect();
            assert_eq!(incoming.len(), 3);
            assert!(incoming.iter().all(|a| indexer.endpoints(*a).1 == v));

            let outgoing: Vec<_> = indexer.outgoing(v).collect();
            assert_eq!(outgoing.len(), 3);
            assert!(outgoing.iter().all(|a| indexer.endpoints(*a).0 == v));
        }
    }

    #[test]
    fn import_cycle4() {
        let fin = fs::read_to_string("testfiles/cycle4.atsp").unwrap();
        let matrix = fin.parse::<DistanceMatrix>().unwrap();

        assert_eq!(matrix.vertices(), &[1, 2, 3, 4]);
        assert_eq!(matrix.distance(1, 2), Some(1));
        assert_eq!(matrix.distance(4, 1), Some(1));
        assert_eq!(matrix.distance(2, 1), Some(100));
        assert_eq!(matrix.distance(3, 3), None);
        assert_eq!(matrix.tour_length(&[1, 2, 3, 4, 1]), Some(4));
        assert_eq!(matrix.arcs().count(), 12);
    }

    #[test]
    fn export_import() {
        let matrix = DistanceMatrix::random(6, 1, 1..=99).unwrap();
        let again = matrix.to_string().parse::<DistanceMatrix>().unwrap();
        assert_eq!(matrix, again);
    }

    #[test]
    fn random_is_reproducible() {
        let a = DistanceMatrix::random(8, 42, 1..=99).unwrap();
        let b = DistanceMatrix::random(8, 42, 1..=99).unwrap();
        let c = DistanceMatrix::random(8, 43, 1..=99).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.arcs().all(|arc| {
            let d = a.distance(arc.tail, arc.head).unwrap();
            (1..=99).contains(&d)
        }));
    }

    #[test]
    fn reject_small_and_duplicate() {
        assert_eq!(
            DistanceMatrix::from_fn(vec![1, 2], |_| Some(1)),
            Err(InstanceError::TooFewVertices(2))
        );
        assert_eq!(
            DistanceMatrix::from_fn(vec![1, 2, 1], |_| Some(1)),
            Err(InstanceError::DuplicateVertex(1))
        );
    }

    #[test]
    fn reject_incomplete_distances() {
        let mut distances = FxHashMap::default();
        for tail in 1..=3 {
            for head in 1..=3 {
                if tail != head && (tail, head) != (3, 2) {
                    distances.insert(Arc::new(tail, head), 5);
                }
            }
        }
        assert_eq!(
            DistanceMatrix::from_arcs(vec![1, 2, 3], &distances),
            Err(InstanceError::MissingArc(Arc::new(3, 2)))
        );

        distances.insert(Arc::new(3, 2), 0);
        assert_eq!(
            DistanceMatrix::from_arcs(vec![1, 2, 3], &distances),
            Err(InstanceError::NonPositiveDistance(Arc::new(3, 2)))
        );
    }

    #[test]
    fn reject_ragged_file() {
        let fin = fs::read_to_string("testfiles/ragged.atsp").unwrap();
        let error = fin.parse::<DistanceMatrix>().unwrap_err();
        assert!(format!("{:#}", error).contains("line"));
    }

    #[test]
    fn reject_vertex_count() {
        let huge = "asymmetric distance matrix\n18446744073709551615\n1 0 1 1\n";
        assert!(huge.parse::<DistanceMatrix>().is_err());

        let small = "asymmetric distance matrix\n2\n1 0 1\n2 1 0\n";
        let error = small.parse::<DistanceMatrix>().unwrap_err();
        assert_eq!(
            error.downcast_ref::<InstanceError>(),
            Some(&InstanceError::TooFewVertices(2))
        );
    }
}
