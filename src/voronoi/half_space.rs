use glam::DVec3;

use crate::geometry::Plane;

/// The half space `{x : 2 x·g <= |g|²}` of points at least as close to the
/// central point (the origin) as to `g`.
#[derive(Clone, Debug)]
pub(super) struct HalfSpace {
    pub plane: Plane,
    /// The point on the far side of the bisector plane.
    pub point: DVec3,
    /// `point` on the integer grid used by the exact predicates.
    pub iloc: [i64; 3],
    norm2: f64,
    /// Index of the candidate that created this half space. `None` for the
    /// faces of the bounding cube.
    pub neighbour: Option<usize>,
}

impl HalfSpace {
    pub fn new(point: DVec3, iloc: [i64; 3], neighbour: Option<usize>) -> Self {
        HalfSpace {
            plane: Plane::bisector(point),
            point,
            iloc,
            norm2: point.length_squared(),
            neighbour,
        }
    }

    /// Negative when `vertex` lies strictly beyond the bisector plane, i.e.
    /// when it is clipped by this half space.
    pub fn clip(&self, vertex: DVec3) -> f64 {
        self.norm2 - 2. * vertex.dot(self.point)
    }

    /// Below this magnitude the sign of [`HalfSpace::clip`] is not trusted.
    pub fn tolerance(&self, vertex: DVec3) -> f64 {
        1e-9 * (2. * vertex.length() * self.point.length() + self.norm2)
    }
}
