//! Permutation-invariant RMSD matching of two small point sets.
//!
//! Given a reference motif `Q` and a candidate structure `P` with the same
//! number of points, [`register`] finds the assignment of the points of `P` to
//! those of `Q` that minimizes the root-mean-square deviation after optimal
//! superposition. The search over all `N!` assignments is a depth-first
//! branch-and-bound search, pruned with a radial lower bound and with the
//! caller's `max_rmsd`.
//!
//! Both sets must already be centered on their respective local origin
//! (typically a central atom). Only rotations about that origin are
//! considered, never translations.

use glam::{DMat3, DQuat, DVec3};
use log::trace;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
    error::{check_capacity, Error, Result},
    geometry::outer,
    MAX_REGISTRATION_POINTS,
};

use search::Search;

mod qcp;
mod search;

/// Parameters of [`register`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegistrationParams {
    /// Largest acceptable RMSD. Assignments above it are not reported.
    pub max_rmsd: f64,
    /// Whether rotoreflections are allowed in addition to rotations.
    pub allow_mirroring: bool,
    /// Whether the superposition of the best assignment is computed.
    pub compute_rotation: bool,
}

impl Default for RegistrationParams {
    fn default() -> Self {
        Self {
            max_rmsd: f64::INFINITY,
            allow_mirroring: false,
            compute_rotation: false,
        }
    }
}

impl RegistrationParams {
    pub fn with_max_rmsd(mut self, max_rmsd: f64) -> Self {
        self.max_rmsd = max_rmsd;
        self
    }

    pub fn with_mirroring(mut self, allow_mirroring: bool) -> Self {
        self.allow_mirroring = allow_mirroring;
        self
    }

    pub fn with_rotation(mut self, compute_rotation: bool) -> Self {
        self.compute_rotation = compute_rotation;
        self
    }

    /// Check that `max_rmsd` is non-negative (it may be infinite).
    pub fn validate(&self) -> Result<()> {
        if !(self.max_rmsd >= 0.) {
            return Err(Error::invalid(format!(
                "max_rmsd must be non-negative, got {}",
                self.max_rmsd
            )));
        }
        Ok(())
    }
}

/// The optimal rigid superposition of `P` onto `Q` for a given assignment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Superposition {
    rotation: DQuat,
    mirrored: bool,
}

impl Superposition {
    /// The rotation, applied after the inversion if [`Superposition::mirrored`].
    pub fn rotation(&self) -> DQuat {
        self.rotation
    }

    /// Whether the points of `P` are inverted (`p -> -p`) before the rotation.
    pub fn mirrored(&self) -> bool {
        self.mirrored
    }

    /// Map a point of `P` into the frame of `Q`.
    pub fn apply(&self, p: DVec3) -> DVec3 {
        if self.mirrored {
            self.rotation * -p
        } else {
            self.rotation * p
        }
    }

    /// The (improper, if mirrored) orthogonal matrix of this superposition.
    pub fn rotation_matrix(&self) -> DMat3 {
        let rotation = DMat3::from_quat(self.rotation);
        if self.mirrored {
            -rotation
        } else {
            rotation
        }
    }
}

/// The best assignment found by [`register`].
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    permutation: [u8; MAX_REGISTRATION_POINTS],
    len: usize,
    rmsd: f64,
    superposition: Option<Superposition>,
}

impl Assignment {
    /// Point `q[i]` is matched with `p[permutation[i]]`.
    pub fn permutation(&self) -> &[u8] {
        &self.permutation[..self.len]
    }

    pub fn rmsd(&self) -> f64 {
        self.rmsd
    }

    /// Only available if requested with [`RegistrationParams::compute_rotation`].
    pub fn superposition(&self) -> Option<Superposition> {
        self.superposition
    }
}

/// Outcome of [`register`].
#[derive(Clone, Debug, PartialEq)]
pub struct Registration {
    nodes_explored: usize,
    best: Option<Assignment>,
}

impl Registration {
    /// Whether an assignment within `max_rmsd` exists.
    pub fn found(&self) -> bool {
        self.best.is_some()
    }

    pub fn best(&self) -> Option<&Assignment> {
        self.best.as_ref()
    }

    pub fn into_best(self) -> Option<Assignment> {
        self.best
    }

    /// RMSD of the best assignment, if any.
    pub fn rmsd(&self) -> Option<f64> {
        self.best.as_ref().map(|best| best.rmsd)
    }

    /// Number of nodes of the search tree that were visited, pruned ones
    /// included.
    pub fn nodes_explored(&self) -> usize {
        self.nodes_explored
    }
}

fn check_point_sets<P: Into<DVec3> + Copy>(p: &[P], q: &[P]) -> Result<(Vec<DVec3>, Vec<DVec3>)> {
    if p.len() != q.len() {
        return Err(Error::invalid(format!(
            "point sets must have the same size, got {} and {}",
            p.len(),
            q.len()
        )));
    }
    check_capacity(p.len(), MAX_REGISTRATION_POINTS)?;
    let p = p.iter().map(|&p| p.into()).collect::<Vec<DVec3>>();
    let q = q.iter().map(|&q| q.into()).collect::<Vec<DVec3>>();
    if !p.iter().chain(q.iter()).all(|v| v.is_finite()) {
        return Err(Error::invalid("coordinates must be finite"));
    }
    Ok((p, q))
}

fn inner_product(p: &[DVec3], q: &[DVec3], permutation: &[u8]) -> (DMat3, f64) {
    let mut a = DMat3::ZERO;
    let mut e0 = 0.;
    for (&i, &q) in permutation.iter().zip(q) {
        let p = p[i as usize];
        a += outer(p, q);
        e0 += 0.5 * (p.length_squared() + q.length_squared());
    }
    (a, e0)
}

/// Find the assignment of the points of `p` to the points of `q` with the
/// lowest RMSD after superposition.
///
/// Returns an error if the sets differ in size, hold more than
/// [`MAX_REGISTRATION_POINTS`] points, contain non-finite coordinates, or if
/// `params` is invalid. Not finding any assignment within
/// `params.max_rmsd` is not an error, see [`Registration::found`].
pub fn register<P: Into<DVec3> + Copy>(
    p: &[P],
    q: &[P],
    params: &RegistrationParams,
) -> Result<Registration> {
    params.validate()?;
    let (p, q) = check_point_sets(p, q)?;
    let n = q.len();

    let mut search = Search::new(&p, &q, params.max_rmsd, params.allow_mirroring);
    let best = search.run().map(|(permutation, cost)| {
        let mut best_permutation = [0; MAX_REGISTRATION_POINTS];
        best_permutation[..n].copy_from_slice(permutation);
        let rmsd = if n > 0 { (cost.max(0.) / n as f64).sqrt() } else { 0. };
        let superposition = params.compute_rotation.then(|| {
            let (a, e0) = inner_product(&p, &q, permutation);
            let (_, rotation, mirrored) = qcp::superposition(&a, e0, params.allow_mirroring);
            Superposition { rotation, mirrored }
        });
        Assignment {
            permutation: best_permutation,
            len: n,
            rmsd,
            superposition,
        }
    });
    let registration = Registration {
        nodes_explored: search.nodes_explored(),
        best,
    };
    trace!(
        "Registered {} points: {} nodes explored, rmsd {:?}",
        n,
        registration.nodes_explored,
        registration.rmsd()
    );

    Ok(registration)
}

/// RMSD and optimal superposition of `p` onto `q` for the given
/// correspondence `p[i] <-> q[i]`.
pub fn superpose<P: Into<DVec3> + Copy>(
    p: &[P],
    q: &[P],
    allow_mirroring: bool,
) -> Result<(f64, Superposition)> {
    let (p, q) = check_point_sets(p, q)?;
    let identity = (0..p.len() as u8).collect::<Vec<_>>();
    let (a, e0) = inner_product(&p, &q, &identity);
    let (deviation, rotation, mirrored) = qcp::superposition(&a, e0, allow_mirroring);
    let rmsd = if p.is_empty() {
        0.
    } else {
        (deviation / p.len() as f64).sqrt()
    };
    Ok((rmsd, Superposition { rotation, mirrored }))
}

/// Register many independent pairs of point sets with the same parameters.
/// This method runs in parallel if the `"rayon"` feature is enabled.
pub fn register_batch<P, E>(
    pairs: &[(E, E)],
    params: &RegistrationParams,
) -> Result<Vec<Registration>>
where
    P: Into<DVec3> + Copy + Sync,
    E: AsRef<[P]> + Sync,
{
    params.validate()?;
    #[cfg(feature = "rayon")]
    let registrations = pairs
        .par_iter()
        .map(|(p, q)| register(p.as_ref(), q.as_ref(), params))
        .collect();
    #[cfg(not(feature = "rayon"))]
    let registrations = pairs
        .iter()
        .map(|(p, q)| register(p.as_ref(), q.as_ref(), params))
        .collect();

    registrations
}
