use anyhow::{Result, anyhow};
use itertools::Itertools;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::{
    flowtsp_framework::flowtsp_command::FlowTspCommand,
    flowtsp_objects::distance_matrix::{Distance, DistanceMatrix, Vertex},
    optimisation_algorithms::mixed_integer_linear_programming::ThreadHint,
};

/// Beyond this, (n - 1)! tours are too many to enumerate.
pub const MAX_VERTICES: usize = 11;

pub trait BruteForce {
    /**
     * Finds a shortest tour by enumerating every tour that starts at the root (the first vertex if None).
     * Returns its length and its vertices, the root first and last.
     */
    fn brute_force(&self, root: Option<Vertex>, threads: ThreadHint) -> Result<(Distance, Vec<Vertex>)>;
}

impl BruteForce for DistanceMatrix {
    fn brute_force(&self, root: Option<Vertex>, threads: ThreadHint) -> Result<(Distance, Vec<Vertex>)> {
        let n = self.number_of_vertices();
        if n > MAX_VERTICES {
            return Err(anyhow!(
                "exhaustive search supports at most {} vertices, but the instance has {}",
                MAX_VERTICES,
                n
            ));
        }
        let root = match root {
            Some(vertex) => self
                .position(vertex)
                .ok_or_else(|| anyhow!("root {} is not a vertex of the instance", vertex))?,
            None => 0,
        };
        let others = (0..n).filter(|v| *v != root).collect::<Vec<_>>();

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = threads.resolve() {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;

        log::info!("enumerate the tours of {} vertices", n);
        let progress_bar = FlowTspCommand::get_progress_bar(others.len());

        let best = pool.install(|| {
            others
                .par_iter()
                .filter_map(|first| {
                    let rest = others.iter().filter(|v| *v != first).copied().collect::<Vec<_>>();
                    let best = rest
                        .iter()
                        .copied()
                        .permutations(rest.len())
                        .map(|order| {
                            let mut tour = Vec::with_capacity(n + 1);
                            tour.push(root);
                            tour.push(*first);
                            tour.extend(order);
                            tour.push(root);
                            let length = tour
                                .windows(2)
                                .map(|pair| self.distance_at(pair[0], pair[1]))
                                .sum::<Distance>();
                            (length, tour)
                        })
                        .min();
                    progress_bar.inc(1);
                    best
                })
                .min()
        });
        progress_bar.finish_and_clear();

        let (length, tour) = best.ok_or_else(|| anyhow!("no tour was enumerated"))?;
        Ok((length, tour.into_iter().map(|p| self.vertex(p)).collect()))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::{
        flowtsp_objects::distance_matrix::DistanceMatrix,
        optimisation_algorithms::mixed_integer_linear_programming::ThreadHint,
        techniques::brute_force::BruteForce,
    };

    #[test]
    fn brute_force_cycle4() {
        let fin = fs::read_to_string("testfiles/cycle4.atsp").unwrap();
        let matrix = fin.parse::<DistanceMatrix>().unwrap();

        let (length, tour) = matrix.brute_force(None, ThreadHint::SolverDefault).unwrap();
        assert_eq!(length, 4);
        assert_eq!(tour, vec![1, 2, 3, 4, 1]);

        let (length, tour) = matrix.brute_force(Some(3), ThreadHint::AllAvailable).unwrap();
        assert_eq!(length, 4);
        assert_eq!(tour, vec![3, 4, 1, 2, 3]);
    }

    #[test]
    fn brute_force_two_cycles() {
        let fin = fs::read_to_string("testfiles/two_cycles4.atsp").unwrap();
        let matrix = fin.parse::<DistanceMatrix>().unwrap();

        let (length, tour) = matrix.brute_force(None, ThreadHint::from_hint(2).unwrap()).unwrap();
        assert_eq!(length, 87);
        assert_eq!(matrix.tour_length(&tour), Some(87));
    }

    #[test]
    fn brute_force_limits() {
        let matrix = DistanceMatrix::random(12, 1, 1..=9).unwrap();
        assert!(matrix.brute_force(None, ThreadHint::SolverDefault).is_err());

        let matrix = DistanceMatrix::random(3, 1, 1..=9).unwrap();
        assert!(matrix.brute_force(Some(4), ThreadHint::SolverDefault).is_err());
    }
}
