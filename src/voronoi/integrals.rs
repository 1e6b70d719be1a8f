//! Contains the trait used to define integrals over the faces of a
//! coordination cell, and the integrals needed for the coordination analysis.

use glam::DVec3;

use crate::geometry::{signed_area_tri, solid_angle};

use super::convex_cell::{ConvexCell, WithFaces};

/// Trait to implement integrators for the faces of a coordination cell.
///
/// Every face is decomposed into a fan of triangles `(v0, v[i], v[i + 1])`,
/// which are fed one by one to the face-integrator together with the central
/// point `center` (the top of the corresponding tetrahedron). All triangles of
/// one face share the same orientation as seen from `center`.
pub(crate) trait FaceIntegral: Sized {
    /// Initialize a FaceIntegral for the given face of a cell.
    fn init(cell: &ConvexCell<WithFaces>, face_idx: usize) -> Self;

    /// Update the state of the integrator using one triangle of the face.
    fn collect(&mut self, v0: DVec3, v1: DVec3, v2: DVec3, center: DVec3);

    /// Finalize the calculation and return the result
    fn finalize(self) -> Self;
}

/// Solid angle subtended by a face, as seen from the central point.
///
/// Vertices are projected onto the unit sphere around the center, the face
/// becomes a spherical polygon that is summed triangle by triangle.
#[derive(Default, Clone, Debug)]
pub(crate) struct SolidAngleIntegral {
    pub solid_angle: f64,
}

impl FaceIntegral for SolidAngleIntegral {
    fn init(_cell: &ConvexCell<WithFaces>, _face_idx: usize) -> Self {
        Self::default()
    }

    fn collect(&mut self, v0: DVec3, v1: DVec3, v2: DVec3, center: DVec3) {
        self.solid_angle += solid_angle(
            (v0 - center).normalize(),
            (v1 - center).normalize(),
            (v2 - center).normalize(),
        );
    }

    fn finalize(self) -> Self {
        self
    }
}

/// Area of a face
#[derive(Default, Clone, Debug)]
pub(crate) struct AreaIntegral {
    pub area: f64,
}

impl FaceIntegral for AreaIntegral {
    fn init(_cell: &ConvexCell<WithFaces>, _face_idx: usize) -> Self {
        Self::default()
    }

    fn collect(&mut self, v0: DVec3, v1: DVec3, v2: DVec3, center: DVec3) {
        self.area += signed_area_tri(v0, v1, v2, center);
    }

    fn finalize(mut self) -> Self {
        self.area = self.area.abs();
        self
    }
}
