//! **Analysis of the local structure around atoms in Rust.**
//!
//! This crate bundles two small, self-contained geometric routines that are
//! typically applied to the neighbourhood of every atom of a particle system:
//!
//! - **Coordination analysis** ([`voronoi`]): given a central point and up to
//!   18 candidate neighbours, construct the
//!   [Voronoi cell](https://en.wikipedia.org/wiki/Voronoi_diagram) of the
//!   central point and classify a candidate as coordinating if its face of the
//!   cell subtends more than a given fraction of the full solid angle.
//!
//! - **Permutation-invariant RMSD** ([`registration`]): given two point sets of
//!   up to 16 points each, find the assignment between them that minimizes the
//!   root-mean-square deviation after optimal rotation (optionally also
//!   rotoreflection). The search over all permutations is a depth-first
//!   branch-and-bound search, the superposition of every partial assignment is
//!   computed in closed form with the quaternion characteristic polynomial
//!   method.
//!
//! On top of the matcher, [`clustering`] groups particles into clusters of
//! identical local structure.
//!
//! Like in [`Voro++`](https://math.lbl.gov/voro++/), the Voronoi cell is
//! constructed *meshless*: a large cube is clipped by the bisector plane of
//! every candidate. Near-degenerate decisions (e.g. for the highly symmetric
//! cells of perfect crystal lattices) are resolved with an exact integer
//! predicate, so that the topology of the cell is always consistent.
//!
//! # Example
//!
//! ```
//! use glam::DVec3;
//! use local_motif::{classify, register, RegistrationParams};
//!
//! // An atom with six neighbours on the coordinate axes
//! let points = [
//!     DVec3::ZERO,
//!     DVec3::X,
//!     DVec3::NEG_X,
//!     DVec3::Y,
//!     DVec3::NEG_Y,
//!     DVec3::Z,
//!     DVec3::NEG_Z,
//! ];
//! let coordinating = classify(&points, 0.1).unwrap();
//! assert_eq!(coordinating.iter().filter(|&&c| c).count(), 6);
//!
//! // The same three neighbours, listed in a different order
//! let p = [DVec3::X, DVec3::Y, DVec3::Z];
//! let q = [DVec3::Y, DVec3::Z, DVec3::X];
//! let params = RegistrationParams::default().with_max_rmsd(0.1);
//! let registration = register(&p, &q, &params).unwrap();
//! assert!(registration.rmsd().unwrap() < 1e-6);
//! ```
//!
//! # Cargo Features
#![doc = document_features::document_features!()]

pub mod clustering;
mod error;
pub mod geometry;
pub mod registration;
mod simple_cycle;
pub mod voronoi;

pub use clustering::{cluster, normalize_neighbor_vectors, Clustering, NeighborEnvironment};
pub use error::{Error, Result};
pub use registration::{
    register, register_batch, superpose, Assignment, Registration, RegistrationParams,
    Superposition,
};
pub use voronoi::{
    classify, classify_batch, coordination_number, voronoi_faces, VoronoiFace, VoronoiFaces,
};

/// Maximal number of points (center included) for the coordination analysis.
pub const MAX_VORONOI_POINTS: usize = 19;

/// Maximal number of points per set for the registration.
pub const MAX_REGISTRATION_POINTS: usize = 16;
