//! A few general-purpose geometry functions and structs shared by the
//! coordination analysis and the registration kernel.

use glam::{DMat3, DVec3};
use ibig::IBig;
use std::cmp::Ordering;

/// A simple plane struct.
///
/// The normal does not need to be normalized: the plane is the set of points
/// `x` with `n·x = n·p`.
#[derive(Clone, Debug)]
pub struct Plane {
    /// Normal vector
    pub n: DVec3,
    /// Point on the plane
    pub p: DVec3,
}

impl Plane {
    /// Create a plane from a normal vector and a point on the plane.
    pub fn new(n: DVec3, p: DVec3) -> Self {
        Self { n, p }
    }

    /// The perpendicular bisector plane between the origin and `point`.
    /// Its normal points away from the origin.
    pub fn bisector(point: DVec3) -> Self {
        Self::new(point, 0.5 * point)
    }
}

/// Calculate the intersection of 3 planes.
///
/// See <https://mathworld.wolfram.com/Plane-PlaneIntersection.html>.
pub fn intersect_planes(p0: &Plane, p1: &Plane, p2: &Plane) -> DVec3 {
    let det = DMat3::from_cols(p0.n, p1.n, p2.n).determinant();
    assert!(det != 0., "Degenerate 3-plane intersection!");

    (p0.p.dot(p0.n) * p1.n.cross(p2.n)
        + p1.p.dot(p1.n) * p2.n.cross(p0.n)
        + p2.p.dot(p2.n) * p0.n.cross(p1.n))
        / det
}

/// Calculates the signed area of the ground face `v0`, `v1`, `v2` of the
/// tetrahedron with top `t`.
///
/// The area is positive if the the vertices are ordered counterclockwise
/// as seen from t.
pub fn signed_area_tri(v0: DVec3, v1: DVec3, v2: DVec3, t: DVec3) -> f64 {
    // Normal vector with the area of the ground face as length
    let n = 0.5 * (v1 - v0).cross(v2 - v0);
    let sign = (t - v0).dot(n).signum();
    n.length() * sign
}

/// Solid angle subtended at the origin by the spherical triangle with the
/// unit vectors `r1`, `r2` and `r3` as corners.
///
/// Uses the formula of Van Oosterom and Strackee (1983). `atan2` copes with a
/// slightly negative denominator, so no clamping is needed.
pub fn solid_angle(r1: DVec3, r2: DVec3, r3: DVec3) -> f64 {
    let numerator = r1.dot(r2.cross(r3));
    let denominator = 1. + r1.dot(r2) + r2.dot(r3) + r3.dot(r1);
    (2. * numerator.atan2(denominator)).abs()
}

/// The outer product `p ⊗ q`: the entry in row `i` and column `j` is
/// `p[i] * q[j]`.
pub fn outer(p: DVec3, q: DVec3) -> DMat3 {
    DMat3::from_cols(p * q.x, p * q.y, p * q.z)
}

fn lift(x: &[i64; 3]) -> [IBig; 4] {
    let x = [IBig::from(x[0]), IBig::from(x[1]), IBig::from(x[2])];
    let mut norm2 = IBig::from(0);
    norm2 += &x[0] * &x[0];
    norm2 += &x[1] * &x[1];
    norm2 += &x[2] * &x[2];
    let [x0, x1, x2] = x;
    [x0, x1, x2, norm2]
}

fn det2x2(a: &IBig, b: &IBig, c: &IBig, d: &IBig) -> IBig {
    a * d - b * c
}

/// 3×3 determinant of the first three components of the rows `a`, `b`, `c`.
fn det3x3(a: &[IBig; 4], b: &[IBig; 4], c: &[IBig; 4]) -> IBig {
    let mut det = IBig::from(0);
    det += &a[0] * det2x2(&b[1], &b[2], &c[1], &c[2]);
    det -= &a[1] * det2x2(&b[0], &b[2], &c[0], &c[2]);
    det += &a[2] * det2x2(&b[0], &b[1], &c[0], &c[1]);
    det
}

/// Test whether `v` lies inside or outside the sphere through the origin,
/// `b`, `c` and `d`, using exact integer arithmetic.
///
/// Returns [`Ordering::Less`] when `v` lies strictly inside,
/// [`Ordering::Greater`] when it lies strictly outside and
/// [`Ordering::Equal`] when the five points are cospherical. The result does
/// not depend on the orientation of `b`, `c`, `d`, which must not be
/// coplanar with the origin.
pub(crate) fn in_sphere_test_exact(
    b: &[i64; 3],
    c: &[i64; 3],
    d: &[i64; 3],
    v: &[i64; 3],
) -> Ordering {
    let b = lift(b);
    let c = lift(c);
    let d = lift(d);
    let v = lift(v);

    // Develop the 4×4 determinant with rows b, c, d, v over the last column.
    let orientation = det3x3(&b, &c, &d);
    let mut determinant = IBig::from(0);
    determinant -= &b[3] * det3x3(&c, &d, &v);
    determinant += &c[3] * det3x3(&b, &d, &v);
    determinant -= &d[3] * det3x3(&b, &c, &v);
    determinant += &v[3] * &orientation;

    let zero = IBig::from(0);
    debug_assert!(orientation != zero, "Degenerate in-sphere test!");
    // determinant = orientation * (|v|² - 2 v·center)
    if orientation < zero {
        zero.cmp(&determinant)
    } else {
        determinant.cmp(&zero)
    }
}
