//! Coordination analysis based on the Voronoi cell of a central point.
//!
//! The cell of the central point among a set of candidate neighbours is built
//! by cutting a large cube with the perpendicular bisector plane of every
//! candidate. A candidate is a *Voronoi neighbour* if its plane contributes a
//! face to the final cell, and a *coordinating* neighbour if that face also
//! covers more than a given fraction of the full solid angle (4π) as seen from
//! the center.

use std::f64::consts::PI;

use glam::DVec3;
use log::{debug, trace};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
    error::{check_capacity, Error, Result},
    MAX_VORONOI_POINTS,
};

use boundary::BoundingCube;
use convex_cell::ConvexCell;
use integrals::{AreaIntegral, SolidAngleIntegral};

mod boundary;
mod convex_cell;
mod half_space;
mod integrals;

/// A face of the Voronoi cell of the central point.
#[derive(Clone, Debug)]
pub struct VoronoiFace {
    neighbour: Option<usize>,
    solid_angle: f64,
    area: f64,
    vertex_offset: usize,
    vertex_count: usize,
}

impl VoronoiFace {
    /// Get the index of the candidate on the other side of this face.
    /// Returns `None` if this face belongs to the bounding cube, which happens
    /// when the candidates do not enclose the central point.
    pub fn neighbour(&self) -> Option<usize> {
        self.neighbour
    }

    /// Get the solid angle subtended by this face, as seen from the central
    /// point.
    pub fn solid_angle(&self) -> f64 {
        self.solid_angle
    }

    /// Get the area of this face, in the units of the input coordinates.
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Get the number of vertices of this face.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }
}

/// The faces of the Voronoi cell of the central point, and the data needed to
/// classify the candidates.
#[derive(Clone, Debug)]
pub struct VoronoiFaces {
    point_count: usize,
    vertices: Vec<DVec3>,
    faces: Vec<VoronoiFace>,
    face_vertex_connections: Vec<usize>,
}

impl VoronoiFaces {
    /// Construct the Voronoi cell of `points[0]` among `points[1..]` and
    /// compute the solid angle of its faces.
    ///
    /// Fails when more than [`MAX_VORONOI_POINTS`] points are given, when
    /// `points` is empty or when a coordinate is not finite.
    pub fn build<P: Into<DVec3> + Copy>(points: &[P]) -> Result<Self> {
        let points = translated_points(points)?;

        // The cell is scale invariant, work with coordinates of order one so
        // that squared norms can neither overflow nor underflow.
        let max_component = points
            .iter()
            .map(|p| p.abs().max_element())
            .fold(0., f64::max);
        if max_component == 0. {
            // Every candidate sits on top of the center
            return Ok(Self {
                point_count: points.len(),
                vertices: vec![],
                faces: vec![],
                face_vertex_connections: vec![],
            });
        }
        let scale = power_of_two_scale(max_component);
        let points = points.into_iter().map(|p| p / scale).collect::<Vec<_>>();

        let max_norm = points
            .iter()
            .map(|p| p.length_squared())
            .fold(0., f64::max)
            .sqrt();
        let bounding_cube = BoundingCube::new(max_norm);
        let cell = ConvexCell::build(&points, &bounding_cube).with_faces();

        let solid_angles = cell.compute_face_integrals::<SolidAngleIntegral>();
        let areas = cell.compute_face_integrals::<AreaIntegral>();
        let mut face_vertex_connections = vec![];
        let faces = solid_angles
            .into_iter()
            .zip(areas)
            .enumerate()
            .map(|(face_idx, (solid_angle, area))| {
                let vertices = cell.face_vertices(face_idx);
                let face = VoronoiFace {
                    neighbour: cell.neighbour(face_idx),
                    solid_angle: solid_angle.solid_angle,
                    area: area.area * scale * scale,
                    vertex_offset: face_vertex_connections.len(),
                    vertex_count: vertices.len(),
                };
                face_vertex_connections.extend_from_slice(vertices);
                face
            })
            .collect::<Vec<_>>();
        let vertices = (0..cell.vertex_count())
            .map(|i| cell.vertex(i).normalize())
            .collect::<Vec<_>>();

        let unbounded = faces.iter().filter(|f| f.neighbour.is_none()).count();
        if unbounded > 0 {
            debug!(
                "{} faces of the bounding cube remain, the candidates do not enclose the center",
                unbounded
            );
        }
        trace!(
            "Voronoi cell of {} points: {} faces, {} vertices",
            points.len(),
            faces.len(),
            vertices.len()
        );

        Ok(Self {
            point_count: points.len(),
            vertices,
            faces,
            face_vertex_connections,
        })
    }

    /// The faces of the cell, including the surviving faces of the bounding
    /// cube (if any).
    pub fn faces(&self) -> &[VoronoiFace] {
        &self.faces
    }

    /// The vertices of the cell, projected onto the unit sphere around the
    /// central point.
    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    /// The indices (in [`VoronoiFaces::vertices`]) of the vertices of a face,
    /// in cyclic order.
    pub fn face_vertices(&self, face: &VoronoiFace) -> &[usize] {
        &self.face_vertex_connections[face.vertex_offset..face.vertex_offset + face.vertex_count]
    }

    /// Number of points (center included) this cell was built from.
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Sum of the solid angles of all faces. Equals 4π up to rounding errors
    /// for a non-trivial cell.
    pub fn total_solid_angle(&self) -> f64 {
        self.faces.iter().map(|f| f.solid_angle).sum()
    }

    /// The solid angle of the face of every point, zero for points that are
    /// not Voronoi neighbours (and for the center itself).
    pub fn solid_angles(&self) -> Vec<f64> {
        let mut solid_angles = vec![0.; self.point_count];
        for face in self.faces.iter() {
            if let Some(idx) = face.neighbour {
                solid_angles[idx] += face.solid_angle;
            }
        }
        solid_angles
    }

    /// Whether every point contributes a face to the cell.
    pub fn voronoi_neighbours(&self) -> Vec<bool> {
        let mut neighbours = vec![false; self.point_count];
        for idx in self.faces.iter().filter_map(|f| f.neighbour) {
            neighbours[idx] = true;
        }
        neighbours
    }

    /// Classify the points: `true` iff the point is a Voronoi neighbour and
    /// its face subtends more than `threshold × 4π`.
    pub fn classify(&self, threshold: f64) -> Result<Vec<bool>> {
        check_threshold(threshold)?;
        let min_solid_angle = threshold * 4. * PI;
        Ok(self
            .voronoi_neighbours()
            .into_iter()
            .zip(self.solid_angles())
            .map(|(neighbour, solid_angle)| neighbour && solid_angle > min_solid_angle)
            .collect())
    }
}

fn check_threshold(threshold: f64) -> Result<()> {
    if !(0. ..=1.).contains(&threshold) {
        return Err(Error::invalid(format!(
            "threshold must lie in [0, 1], got {threshold}"
        )));
    }
    Ok(())
}

/// Validate the input and translate it so that the center is at the origin.
fn translated_points<P: Into<DVec3> + Copy>(points: &[P]) -> Result<Vec<DVec3>> {
    check_capacity(points.len(), MAX_VORONOI_POINTS)?;
    let Some(&center) = points.first() else {
        return Err(Error::invalid("at least the central point is required"));
    };
    let center: DVec3 = center.into();
    let points = points.iter().map(|&p| p.into()).collect::<Vec<DVec3>>();
    if !points.iter().all(|p| p.is_finite()) {
        return Err(Error::invalid("coordinates must be finite"));
    }
    let points = points.into_iter().map(|p| p - center).collect::<Vec<_>>();
    if !points.iter().all(|p| p.is_finite()) {
        return Err(Error::invalid(
            "coordinates relative to the central point must be finite",
        ));
    }
    Ok(points)
}

/// The power of two closest to `max_component` from below, as far as it is
/// representable as a normal number. Dividing by it is exact.
fn power_of_two_scale(max_component: f64) -> f64 {
    let exponent = (max_component.log2().floor() as i32).clamp(f64::MIN_EXP - 1, f64::MAX_EXP - 1);
    2f64.powi(exponent)
}

/// Construct the Voronoi cell of `points[0]` among `points[1..]`.
///
/// See [`VoronoiFaces::build`].
pub fn voronoi_faces<P: Into<DVec3> + Copy>(points: &[P]) -> Result<VoronoiFaces> {
    VoronoiFaces::build(points)
}

/// Classify the candidates `points[1..]` around the center `points[0]`.
///
/// Entry `i` of the result is `true` iff candidate `i` contributes a face to
/// the Voronoi cell of the center, and that face subtends a solid angle of
/// more than `threshold × 4π`. Entry 0 (the center) is always `false`.
///
/// * `points` - The center followed by at most 18 candidates.
/// * `threshold` - Minimal fraction of the full sphere, in `[0, 1]`.
pub fn classify<P: Into<DVec3> + Copy>(points: &[P], threshold: f64) -> Result<Vec<bool>> {
    check_threshold(threshold)?;
    VoronoiFaces::build(points)?.classify(threshold)
}

/// The number of candidates classified as coordinating neighbours by
/// [`classify`].
pub fn coordination_number<P: Into<DVec3> + Copy>(points: &[P], threshold: f64) -> Result<usize> {
    Ok(classify(points, threshold)?
        .into_iter()
        .filter(|&neighbour| neighbour)
        .count())
}

/// Classify many independent environments with the same threshold. This
/// method runs in parallel if the `"rayon"` feature is enabled.
pub fn classify_batch<P, E>(environments: &[E], threshold: f64) -> Result<Vec<Vec<bool>>>
where
    P: Into<DVec3> + Copy + Sync,
    E: AsRef<[P]> + Sync,
{
    check_threshold(threshold)?;
    #[cfg(feature = "rayon")]
    let classified = environments
        .par_iter()
        .map(|points| classify(points.as_ref(), threshold))
        .collect();
    #[cfg(not(feature = "rayon"))]
    let classified = environments
        .iter()
        .map(|points| classify(points.as_ref(), threshold))
        .collect();

    classified
}
