use glam::DVec3;

use super::half_space::HalfSpace;

/// The cube every coordination cell starts from, before it is cut by the
/// bisector planes of the candidates.
///
/// Its faces are themselves bisector planes, between the origin and six
/// ghost points at twice the half width along the coordinate axes. The cube
/// also fixes the integer grid on which degenerate clipping decisions are
/// evaluated exactly.
#[derive(Clone, Debug)]
pub(super) struct BoundingCube {
    half_width: f64,
    scale: f64,
}

impl BoundingCube {
    /// A cube large enough to strictly contain the Voronoi cell of the origin
    /// among points at distance at most `max_norm`.
    pub fn new(max_norm: f64) -> Self {
        debug_assert!(max_norm > 0. && max_norm.is_finite());
        let half_width = 1000. * max_norm;
        // The ghost points lie at twice the half width, after scaling all
        // coordinates must fit in the 52 bits of an f64 mantissa.
        let exponent = 51 - (2. * half_width).log2().ceil() as i32;
        Self {
            half_width,
            scale: 2f64.powi(exponent),
        }
    }

    /// The six half spaces bounding the cube, in the order lower/upper x,
    /// lower/upper y, lower/upper z.
    pub fn clipping_planes(&self) -> Vec<HalfSpace> {
        let g = 2. * self.half_width;
        [
            DVec3::new(-g, 0., 0.),
            DVec3::new(g, 0., 0.),
            DVec3::new(0., -g, 0.),
            DVec3::new(0., g, 0.),
            DVec3::new(0., 0., -g),
            DVec3::new(0., 0., g),
        ]
        .into_iter()
        .map(|ghost| HalfSpace::new(ghost, self.iloc(ghost), None))
        .collect()
    }

    /// Map a location (relative to the central point) onto the integer grid.
    /// Scaling by a power of two is exact, so only bits below the grid
    /// resolution are lost.
    pub fn iloc(&self, loc: DVec3) -> [i64; 3] {
        let loc = (loc * self.scale).round();
        [loc.x as i64, loc.y as i64, loc.z as i64]
    }
}
