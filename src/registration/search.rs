//! Depth-first branch-and-bound search over the assignments of the points of
//! one set to the points of the other.
//!
//! Position `level` of the second set is matched with point
//! `permutation[level]` of the first one. Every node of the search tree fixes
//! one more position, its cost is the optimal squared deviation of the fixed
//! prefix plus a radial lower bound for the free positions.

use glam::{DMat3, DVec2, DVec3};

use super::qcp;
use crate::{geometry::outer, MAX_REGISTRATION_POINTS};

/// Minimal squared deviation of two pairs of points under a rotation.
///
/// Both pairs are placed in the xy-plane with their first point on the x-axis,
/// which reduces the problem to finding the best rotation in 2D.
pub(super) fn two_point_deviation(
    p: [DVec3; 2],
    q: [DVec3; 2],
    p_norms: [f64; 2],
    q_norms: [f64; 2],
) -> f64 {
    let planar = |v: [DVec3; 2], norms: [f64; 2]| {
        let cos = if norms[0] > 0. && norms[1] > 0. {
            v[0].dot(v[1]) / (norms[0] * norms[1])
        } else {
            1.
        };
        let sin = (1. - (cos * cos).min(1.)).sqrt();
        [DVec2::new(norms[0], 0.), norms[1] * DVec2::new(cos, -sin)]
    };
    let p = planar(p, p_norms);
    let q = planar(q, q_norms);

    // The rotation t of the q's maximizing Σ p·(t q)
    let t = DVec2::new(q[0].dot(p[0]) + q[1].dot(p[1]), q[1].perp_dot(p[1]));
    let t = t.try_normalize().unwrap_or(DVec2::X);
    (p[0] - t.rotate(q[0])).length_squared() + (p[1] - t.rotate(q[1])).length_squared()
}

/// Lower bounds for the cost of the positions `level..n`: position `i` of the
/// second set costs at least the smallest squared difference between its norm
/// and the norm of any point of the first set.
fn relaxation(p_norms: &[f64], q_norms: &[f64]) -> [f64; MAX_REGISTRATION_POINTS + 1] {
    let mut relaxation = [0.; MAX_REGISTRATION_POINTS + 1];
    for (i, &q_norm) in q_norms.iter().enumerate() {
        relaxation[i] = p_norms
            .iter()
            .map(|&p_norm| (p_norm - q_norm) * (p_norm - q_norm))
            .fold(f64::INFINITY, f64::min);
    }
    for i in (0..q_norms.len()).rev() {
        relaxation[i] += relaxation[i + 1];
    }
    relaxation
}

pub(super) struct Search<'a> {
    p: &'a [DVec3],
    q: &'a [DVec3],
    p_norms: [f64; MAX_REGISTRATION_POINTS],
    q_norms: [f64; MAX_REGISTRATION_POINTS],
    relaxation: [f64; MAX_REGISTRATION_POINTS + 1],
    permutation: [u8; MAX_REGISTRATION_POINTS],
    best_permutation: [u8; MAX_REGISTRATION_POINTS],
    best_cost: f64,
    /// Largest acceptable sum of squared deviations.
    budget: f64,
    allow_mirroring: bool,
    nodes_explored: usize,
}

impl<'a> Search<'a> {
    /// Prepare the search. `p` and `q` must have the same length, of at most
    /// [`MAX_REGISTRATION_POINTS`].
    pub fn new(p: &'a [DVec3], q: &'a [DVec3], max_rmsd: f64, allow_mirroring: bool) -> Self {
        let n = q.len();
        assert_eq!(p.len(), n, "Point sets must have the same size!");
        assert!(n <= MAX_REGISTRATION_POINTS, "Too many points!");

        let mut p_norms = [0.; MAX_REGISTRATION_POINTS];
        let mut q_norms = [0.; MAX_REGISTRATION_POINTS];
        let mut permutation = [0; MAX_REGISTRATION_POINTS];
        for i in 0..n {
            p_norms[i] = p[i].length();
            q_norms[i] = q[i].length();
            permutation[i] = i as u8;
        }
        let norm2_sum: f64 = p.iter().chain(q).map(|v| v.length_squared()).sum();
        // Rounding errors of the kernel must not reject exact matches
        let slack = 1e-9 * norm2_sum;
        // An infinite budget stays infinite, even for empty sets
        let budget = if max_rmsd.is_finite() {
            max_rmsd * max_rmsd * n as f64 + slack
        } else {
            f64::INFINITY
        };

        Self {
            p,
            q,
            p_norms,
            q_norms,
            relaxation: relaxation(&p_norms[..n], &q_norms[..n]),
            permutation,
            best_permutation: permutation,
            best_cost: f64::INFINITY,
            budget,
            allow_mirroring,
            nodes_explored: 0,
        }
    }

    /// Run the search, returns the best assignment within the budget (if any)
    /// and its sum of squared deviations.
    pub fn run(&mut self) -> Option<(&[u8], f64)> {
        self.recurse(0, &DMat3::ZERO, 0.);
        if self.best_cost.is_finite() {
            Some((&self.best_permutation[..self.q.len()], self.best_cost))
        } else {
            None
        }
    }

    pub fn nodes_explored(&self) -> usize {
        self.nodes_explored
    }

    /// Optimal squared deviation of the first `level` assigned pairs.
    ///
    /// * `a` - Inner-product matrix of those pairs.
    /// * `norm2_sum` - Sum of the squared norms of all their points.
    fn evaluate(&self, level: usize, a: &DMat3, norm2_sum: f64) -> f64 {
        match level {
            0 => 0.,
            1 => {
                let d = self.p_norms[self.permutation[0] as usize] - self.q_norms[0];
                d * d
            }
            2 => {
                let (i, j) = (self.permutation[0] as usize, self.permutation[1] as usize);
                two_point_deviation(
                    [self.p[i], self.p[j]],
                    [self.q[0], self.q[1]],
                    [self.p_norms[i], self.p_norms[j]],
                    [self.q_norms[0], self.q_norms[1]],
                )
            }
            _ => qcp::squared_deviation(a, 0.5 * norm2_sum, self.allow_mirroring),
        }
    }

    fn recurse(&mut self, level: usize, a: &DMat3, norm2_sum: f64) {
        let n = self.q.len();
        let cost = self.evaluate(level, a, norm2_sum) + self.relaxation[level];
        self.nodes_explored += 1;

        if level == n {
            if cost < self.best_cost && cost <= self.budget {
                self.best_cost = cost;
                self.best_permutation = self.permutation;
            }
            return;
        }
        if cost > self.best_cost || cost > self.budget {
            return;
        }

        for i in level..n {
            self.permutation.swap(level, i);

            let p = self.p[self.permutation[level] as usize];
            let q = self.q[level];
            let b = *a + outer(p, q);
            self.recurse(level + 1, &b, norm2_sum + p.length_squared() + q.length_squared());

            self.permutation.swap(level, i);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_3;

    use float_cmp::assert_approx_eq;
    use glam::{DQuat, DVec3};

    use super::*;

    fn deviation(p: [DVec3; 2], q: [DVec3; 2]) -> f64 {
        two_point_deviation(p, q, [p[0].length(), p[1].length()], [q[0].length(), q[1].length()])
    }

    #[test]
    fn test_two_point_rotated() {
        let p = [DVec3::new(1., 0., 0.), DVec3::new(0., 2., 1.)];
        let rotation = DQuat::from_axis_angle(DVec3::new(0.3, -1., 0.2).normalize(), 2.);
        let q = [rotation * p[0], rotation * p[1]];
        assert_approx_eq!(f64, deviation(p, q), 0., epsilon = 1e-12);
    }

    #[test]
    fn test_two_point_angle() {
        // Unit vectors at 90° versus 60°: the best rotation splits the
        // difference, each pair is off by 15°.
        let p = [DVec3::X, DVec3::Y];
        let q = [DVec3::X, DVec3::new(FRAC_PI_3.cos(), FRAC_PI_3.sin(), 0.)];
        let chord = 2. * (7.5f64.to_radians()).sin();
        assert_approx_eq!(f64, deviation(p, q), 2. * chord * chord, epsilon = 1e-12);
        // Degenerate input
        assert_eq!(deviation([DVec3::ZERO; 2], [DVec3::ZERO; 2]), 0.);
    }

    #[test]
    fn test_two_point_matches_kernel() {
        let p = [DVec3::new(0.3, -1., 0.5), DVec3::new(1.2, 0.1, -0.4)];
        let q = [DVec3::new(-0.2, 0.9, 0.7), DVec3::new(0.5, 0.5, 1.5)];
        let a = outer(p[0], q[0]) + outer(p[1], q[1]);
        let e0: f64 = 0.5 * p.iter().chain(q.iter()).map(|v| v.length_squared()).sum::<f64>();
        assert_approx_eq!(
            f64,
            deviation(p, q),
            qcp::squared_deviation(&a, e0, false),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_relaxation() {
        let relaxation = relaxation(&[1., 2., 4.], &[2., 3., 1.5]);
        assert_eq!(&relaxation[..4], &[1.25, 1.25, 0.25, 0.]);
    }

    #[test]
    fn test_identity() {
        let p = [DVec3::X, DVec3::Y, DVec3::Z, DVec3::new(1., 1., 0.)];
        let mut search = Search::new(&p, &p, 0., false);
        let (permutation, cost) = search.run().expect("Exact match");
        assert_eq!(permutation, &[0, 1, 2, 3]);
        assert!(cost < 1e-9);
        assert!(search.nodes_explored() > 4);
    }

    #[test]
    fn test_budget() {
        let p = [DVec3::X, DVec3::Y, DVec3::Z];
        let q = [2. * DVec3::X, 2. * DVec3::Y, 2. * DVec3::Z];
        // Every point is off by at least 1, the root node is already pruned
        let mut search = Search::new(&p, &q, 0.9, false);
        assert!(search.run().is_none());
        assert_eq!(search.nodes_explored(), 1);
        let mut search = Search::new(&p, &q, 1.1, false);
        let (_, cost) = search.run().expect("Within budget");
        assert_approx_eq!(f64, cost, 3., epsilon = 1e-9);
    }

    #[test]
    fn test_empty() {
        for max_rmsd in [0., 1., f64::INFINITY] {
            let mut search = Search::new(&[], &[], max_rmsd, true);
            let (permutation, cost) = search.run().expect("Trivial match");
            assert!(permutation.is_empty());
            assert_eq!(cost, 0.);
            assert_eq!(search.nodes_explored(), 1);
        }
    }

    #[test]
    fn test_unbounded_budget() {
        let p = [DVec3::X, 2. * DVec3::Y];
        let q = [3. * DVec3::Z, DVec3::NEG_X];
        let mut search = Search::new(&p, &q, f64::INFINITY, false);
        assert_eq!(search.budget, f64::INFINITY);
        let (permutation, cost) = search.run().expect("Always within budget");
        assert_eq!(permutation, &[1, 0]);
        assert_approx_eq!(f64, cost, 1., epsilon = 1e-12);
    }
}
