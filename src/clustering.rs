//! Grouping of particles into clusters of identical local structure.
//!
//! Two neighbouring particles belong to the same cluster if their neighbour
//! environments have the same size and can be matched by [`register`] within
//! a given RMSD. Clusters are grown by a breadth-first flood fill over the
//! neighbour graph.

use std::collections::VecDeque;

use glam::DVec3;
use log::trace;

use crate::{
    error::{check_capacity, Error, Result},
    registration::{register, RegistrationParams},
    MAX_REGISTRATION_POINTS,
};

/// Scale the vectors so that their mean length is 1.
///
/// Environments with fewer than 3 vectors are left untouched.
pub fn normalize_neighbor_vectors(vectors: &mut [DVec3]) {
    if vectors.len() < 3 {
        return;
    }
    let scale = vectors.iter().map(|v| v.length()).sum::<f64>() / vectors.len() as f64;
    if scale > 0. {
        vectors.iter_mut().for_each(|v| *v /= scale);
    }
}

/// The neighbours of one particle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NeighborEnvironment {
    /// Indices of the neighbouring particles.
    pub neighbors: Vec<usize>,
    /// The vectors from the particle to each of its neighbours, in the same
    /// order as `neighbors`.
    pub vectors: Vec<DVec3>,
}

impl NeighborEnvironment {
    pub fn new(neighbors: Vec<usize>, vectors: Vec<DVec3>) -> Self {
        Self { neighbors, vectors }
    }

    /// Build an environment from the absolute positions of the neighbours,
    /// with vectors normalized by [`normalize_neighbor_vectors`].
    ///
    /// Panics if a neighbour index is out of bounds of `positions`.
    pub fn from_positions(center: DVec3, neighbors: Vec<usize>, positions: &[DVec3]) -> Self {
        let mut vectors = neighbors
            .iter()
            .map(|&idx| positions[idx] - center)
            .collect::<Vec<_>>();
        normalize_neighbor_vectors(&mut vectors);
        Self { neighbors, vectors }
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

/// Cluster assignment of every particle.
#[derive(Clone, Debug, PartialEq)]
pub struct Clustering {
    cluster_ids: Vec<usize>,
    cluster_count: usize,
}

impl Clustering {
    /// The cluster of every particle, numbered from 1.
    pub fn cluster_ids(&self) -> &[usize] {
        &self.cluster_ids
    }

    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    /// Number of particles in every cluster, indexed by cluster id - 1.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.cluster_count];
        for &id in self.cluster_ids.iter() {
            sizes[id - 1] += 1;
        }
        sizes
    }
}

fn check_environments(environments: &[NeighborEnvironment]) -> Result<()> {
    for (idx, environment) in environments.iter().enumerate() {
        check_capacity(environment.len(), MAX_REGISTRATION_POINTS)?;
        if environment.vectors.len() != environment.neighbors.len() {
            return Err(Error::invalid(format!(
                "particle {idx} has {} neighbours but {} vectors",
                environment.neighbors.len(),
                environment.vectors.len()
            )));
        }
        if let Some(&neighbor) = environment
            .neighbors
            .iter()
            .find(|&&neighbor| neighbor >= environments.len())
        {
            return Err(Error::invalid(format!(
                "particle {idx} has neighbour {neighbor}, but there are only {} particles",
                environments.len()
            )));
        }
    }
    Ok(())
}

/// Group the particles into clusters of matching structure.
///
/// Every particle that is not yet part of a cluster seeds a new one. A
/// neighbour of a particle in the cluster joins it if it has the same number
/// of neighbours and its environment matches within `rmsd_threshold`
/// (rotations only, no reflections).
pub fn cluster(environments: &[NeighborEnvironment], rmsd_threshold: f64) -> Result<Clustering> {
    let params = RegistrationParams::default().with_max_rmsd(rmsd_threshold);
    params.validate()?;
    check_environments(environments)?;

    const UNASSIGNED: usize = 0;
    let mut cluster_ids = vec![UNASSIGNED; environments.len()];
    let mut cluster_count = 0;
    let mut frontier = VecDeque::new();
    let mut registrations = 0;

    for seed in 0..environments.len() {
        if cluster_ids[seed] != UNASSIGNED {
            continue;
        }
        cluster_count += 1;
        cluster_ids[seed] = cluster_count;
        frontier.push_back(seed);

        while let Some(current) = frontier.pop_front() {
            let environment = &environments[current];
            for &neighbor in environment.neighbors.iter() {
                if cluster_ids[neighbor] != UNASSIGNED
                    || environments[neighbor].len() != environment.len()
                {
                    continue;
                }
                registrations += 1;
                let registration = register(
                    &environment.vectors,
                    &environments[neighbor].vectors,
                    &params,
                )?;
                if registration.found() {
                    cluster_ids[neighbor] = cluster_count;
                    frontier.push_back(neighbor);
                }
            }
        }
    }
    trace!(
        "Clustered {} particles into {} clusters ({} registrations)",
        environments.len(),
        cluster_count,
        registrations
    );

    Ok(Clustering {
        cluster_ids,
        cluster_count,
    })
}
