//! Closed-form optimal superposition of two point sets with a known
//! correspondence.
//!
//! The optimal rotation is the eigenvector of the largest eigenvalue of
//! Horn's 4×4 key matrix, built from the inner-product matrix
//! `A = Σ pᵢ ⊗ qᵢ`. The eigenvalue is found with Newton's method on the
//! characteristic polynomial, starting from the upper bound
//! `e0 = (Σ |pᵢ|² + Σ |qᵢ|²) / 2` (the quaternion characteristic polynomial
//! method of Theobald). Multiple largest roots, where the polynomial is
//! ill-conditioned, are resolved with Jacobi rotations on the key matrix
//! instead. The minimal sum of squared deviations is then `2 (e0 - λ_max)`.

use glam::{DMat3, DMat4, DQuat, DVec4};

const MAX_NEWTON_ITERATIONS: usize = 50;
const EIGENVALUE_PRECISION: f64 = 1e-11;
const EIGENVECTOR_PRECISION: f64 = 1e-20;
const MULTIPLE_ROOT_PRECISION: f64 = 1e-6;
const MAX_JACOBI_SWEEPS: usize = 50;
const JACOBI_PRECISION: f64 = 1e-30;

/// Coefficients of `λ⁴ + c2 λ² + c1 λ + c0`, the characteristic polynomial
/// of the (traceless) key matrix.
#[derive(Clone, Copy, Debug)]
struct CharacteristicPolynomial {
    c2: f64,
    c1: f64,
    c0: f64,
}

impl CharacteristicPolynomial {
    fn new(key_matrix: &DMat4) -> Self {
        let square = *key_matrix * *key_matrix;
        let mut trace2 = 0.;
        let mut trace3 = 0.;
        for i in 0..4 {
            trace2 += key_matrix.col(i).length_squared();
            trace3 += square.col(i).dot(key_matrix.col(i));
        }
        Self {
            c2: -0.5 * trace2,
            c1: -trace3 / 3.,
            c0: key_matrix.determinant(),
        }
    }

    /// The polynomial of the key matrix of `-A`.
    fn mirrored(&self) -> Self {
        Self {
            c1: -self.c1,
            ..*self
        }
    }

    /// Largest root, by Newton iteration from an upper bound.
    ///
    /// Returns `None` if the root is (nearly) multiple or the iteration did
    /// not converge. Close to a multiple root Newton's method only converges
    /// linearly, and the polynomial itself determines the root no better
    /// than the square or cube root of the rounding error.
    fn largest_root(&self, upper_bound: f64) -> Option<f64> {
        // Magnitude of the derivative at a well separated root
        let scale = (-self.c2).max(0.).powf(1.5);
        let mut lambda = upper_bound;
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let lambda2 = lambda * lambda;
            let f = ((lambda2 + self.c2) * lambda + self.c1) * lambda + self.c0;
            let df = (4. * lambda2 + 2. * self.c2) * lambda + self.c1;
            if df.abs() <= MULTIPLE_ROOT_PRECISION * scale {
                return None;
            }
            let delta = f / df;
            lambda -= delta;
            if delta.abs() <= EIGENVALUE_PRECISION * lambda.abs() {
                return Some(lambda);
            }
        }
        None
    }
}

/// Largest eigenvalue of a symmetric matrix, by cyclic Jacobi rotations.
fn jacobi_largest_eigenvalue(m: &DMat4) -> f64 {
    let mut a = m.to_cols_array_2d();
    let norm2: f64 = a.iter().flatten().map(|x| x * x).sum();
    for _ in 0..MAX_JACOBI_SWEEPS {
        let mut off = 0.;
        for p in 0..3 {
            for q in p + 1..4 {
                off += a[p][q] * a[p][q];
            }
        }
        if off <= JACOBI_PRECISION * norm2 {
            break;
        }

        for p in 0..3 {
            for q in p + 1..4 {
                let apq = a[p][q];
                if apq == 0. {
                    continue;
                }
                // Rotation in the (p, q) plane that zeroes a[p][q]
                let theta = (a[q][q] - a[p][p]) / (2. * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.).sqrt());
                let c = 1. / (t * t + 1.).sqrt();
                let s = t * c;
                for row in a.iter_mut() {
                    let (akp, akq) = (row[p], row[q]);
                    row[p] = c * akp - s * akq;
                    row[q] = s * akp + c * akq;
                }
                for k in 0..4 {
                    let (apk, aqk) = (a[p][k], a[q][k]);
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
            }
        }
    }

    (0..4).map(|i| a[i][i]).fold(f64::NEG_INFINITY, f64::max)
}

/// Largest eigenvalue of the key matrix with characteristic polynomial
/// `polynomial`. `e0` bounds the eigenvalues from above.
fn largest_eigenvalue(key_matrix: &DMat4, polynomial: &CharacteristicPolynomial, e0: f64) -> f64 {
    polynomial
        .largest_root(e0)
        .unwrap_or_else(|| jacobi_largest_eigenvalue(key_matrix))
}

/// Horn's symmetric key matrix for `A[i][j] = Σ p_i q_j`.
fn key_matrix(a: &DMat3) -> DMat4 {
    let (sxx, syx, szx) = (a.x_axis.x, a.x_axis.y, a.x_axis.z);
    let (sxy, syy, szy) = (a.y_axis.x, a.y_axis.y, a.y_axis.z);
    let (sxz, syz, szz) = (a.z_axis.x, a.z_axis.y, a.z_axis.z);
    DMat4::from_cols(
        DVec4::new(sxx + syy + szz, syz - szy, szx - sxz, sxy - syx),
        DVec4::new(syz - szy, sxx - syy - szz, sxy + syx, szx + sxz),
        DVec4::new(szx - sxz, sxy + syx, -sxx + syy - szz, syz + szy),
        DVec4::new(sxy - syx, szx + sxz, syz + szy, -sxx - syy + szz),
    )
}

fn minor(m: &DMat4, row: usize, col: usize) -> f64 {
    let mut entries = [0.; 9];
    let mut k = 0;
    for c in (0..4).filter(|&c| c != col) {
        let column = m.col(c);
        for r in (0..4).filter(|&r| r != row) {
            entries[k] = column[r];
            k += 1;
        }
    }
    DMat3::from_cols_array(&entries).determinant()
}

/// Eigenvector of the key matrix for the eigenvalue `lambda`, as a rotation.
///
/// For a simple eigenvalue, every column of the adjugate of
/// `N - lambda I` is a multiple of the eigenvector; the largest one is used.
/// Falls back to the identity when the eigenvalue is (nearly) degenerate, in
/// which case the optimal rotation is not unique.
fn eigen_rotation(key_matrix: &DMat4, lambda: f64, e0: f64) -> DQuat {
    let shifted = *key_matrix - DMat4::from_diagonal(DVec4::splat(lambda));
    let mut best = DVec4::ZERO;
    for j in 0..4 {
        let sign = |i: usize| if (i + j) % 2 == 0 { 1. } else { -1. };
        let column = DVec4::new(
            sign(0) * minor(&shifted, j, 0),
            sign(1) * minor(&shifted, j, 1),
            sign(2) * minor(&shifted, j, 2),
            sign(3) * minor(&shifted, j, 3),
        );
        if column.length_squared() > best.length_squared() {
            best = column;
        }
    }

    if best.length_squared() <= EIGENVECTOR_PRECISION * e0.powi(6) {
        return DQuat::IDENTITY;
    }
    DQuat::from_xyzw(best.y, best.z, best.w, best.x).normalize()
}

/// Minimal sum of squared deviations `Σ |R pᵢ - qᵢ|²` over all rotations `R`
/// (and rotoreflections if `allow_mirroring`).
///
/// * `a` - The inner-product matrix `Σ pᵢ ⊗ qᵢ`.
/// * `e0` - Half the sum of the squared norms of all points of both sets.
pub(crate) fn squared_deviation(a: &DMat3, e0: f64, allow_mirroring: bool) -> f64 {
    let proper = key_matrix(a);
    let polynomial = CharacteristicPolynomial::new(&proper);
    let mut lambda = largest_eigenvalue(&proper, &polynomial, e0);
    if allow_mirroring {
        let mirrored = largest_eigenvalue(&proper.mul_scalar(-1.), &polynomial.mirrored(), e0);
        lambda = lambda.max(mirrored);
    }
    (2. * (e0 - lambda)).max(0.)
}

/// Like [`squared_deviation`], but also returns the optimal rotation and
/// whether the points of the first set must be inverted (`p -> -p`) before
/// rotating them.
pub(crate) fn superposition(a: &DMat3, e0: f64, allow_mirroring: bool) -> (f64, DQuat, bool) {
    let proper = key_matrix(a);
    let polynomial = CharacteristicPolynomial::new(&proper);
    let lambda = largest_eigenvalue(&proper, &polynomial, e0);
    if allow_mirroring {
        // The key matrix is linear in `a`
        let mirrored = proper.mul_scalar(-1.);
        let lambda_mirrored = largest_eigenvalue(&mirrored, &polynomial.mirrored(), e0);
        if lambda_mirrored > lambda {
            let rotation = eigen_rotation(&mirrored, lambda_mirrored, e0);
            return ((2. * (e0 - lambda_mirrored)).max(0.), rotation, true);
        }
    }
    let rotation = eigen_rotation(&proper, lambda, e0);
    ((2. * (e0 - lambda)).max(0.), rotation, false)
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;
    use glam::{DMat3, DQuat, DVec3};
    use rand::{distributions::Uniform, prelude::*};

    use super::*;
    use crate::geometry::outer;

    fn inner_product(p: &[DVec3], q: &[DVec3]) -> (DMat3, f64) {
        let mut a = DMat3::ZERO;
        let mut e0 = 0.;
        for (&p, &q) in p.iter().zip(q) {
            a += outer(p, q);
            e0 += 0.5 * (p.length_squared() + q.length_squared());
        }
        (a, e0)
    }

    fn random_points(rng: &mut StdRng, count: usize) -> Vec<DVec3> {
        let distr = Uniform::new(-1., 1.);
        (0..count)
            .map(|_| DVec3::new(rng.sample(distr), rng.sample(distr), rng.sample(distr)))
            .collect()
    }

    #[test]
    fn test_characteristic_polynomial() {
        // The key matrix of the identity has eigenvalues 3, -1, -1, -1
        let proper = key_matrix(&DMat3::IDENTITY);
        let polynomial = CharacteristicPolynomial::new(&proper);
        let root = polynomial.largest_root(3.).expect("Simple root");
        assert_approx_eq!(f64, root, 3., epsilon = 1e-12);
        assert_approx_eq!(
            f64,
            largest_eigenvalue(&proper, &polynomial, 3.),
            3.,
            epsilon = 1e-12
        );

        // The negated matrix has a triple largest root
        let mirrored = proper.mul_scalar(-1.);
        assert_approx_eq!(
            f64,
            largest_eigenvalue(&mirrored, &polynomial.mirrored(), 3.),
            1.,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_jacobi() {
        assert_eq!(jacobi_largest_eigenvalue(&DMat4::ZERO), 0.);
        let diagonal = DMat4::from_diagonal(DVec4::new(1., -2., 5., 0.5));
        assert_eq!(jacobi_largest_eigenvalue(&diagonal), 5.);

        let mut rng = StdRng::seed_from_u64(10);
        for _ in 0..10 {
            let p = random_points(&mut rng, 5);
            let q = random_points(&mut rng, 5);
            let (a, e0) = inner_product(&p, &q);
            let proper = key_matrix(&a);
            let polynomial = CharacteristicPolynomial::new(&proper);
            let root = polynomial.largest_root(e0).expect("Simple root");
            assert_approx_eq!(f64, jacobi_largest_eigenvalue(&proper), root, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_inverted_isotropic_set() {
        // Q = -P for an isotropic P: the best rotation is a half turn, which
        // matches one axis out of three.
        let p = [DVec3::X, DVec3::Y, DVec3::Z];
        let q = p.map(|p| -p);
        let (a, e0) = inner_product(&p, &q);
        assert_approx_eq!(f64, squared_deviation(&a, e0, false), 4., epsilon = 1e-9);
        assert_approx_eq!(f64, squared_deviation(&a, e0, true), 0., epsilon = 1e-9);
        let (deviation, _, mirrored) = superposition(&a, e0, false);
        assert_approx_eq!(f64, deviation, 4., epsilon = 1e-9);
        assert!(!mirrored);
    }

    #[test]
    fn test_rotated_copy() {
        let mut rng = StdRng::seed_from_u64(7);
        let p = random_points(&mut rng, 6);
        let rotation = DQuat::from_axis_angle(DVec3::new(1., 2., -0.5).normalize(), 1.3);
        let q = p.iter().map(|&p| rotation * p).collect::<Vec<_>>();
        let (a, e0) = inner_product(&p, &q);

        assert_approx_eq!(f64, squared_deviation(&a, e0, false), 0., epsilon = 1e-9);
        let (deviation, found, mirrored) = superposition(&a, e0, true);
        assert_approx_eq!(f64, deviation, 0., epsilon = 1e-9);
        assert!(!mirrored);
        for (&p, &q) in p.iter().zip(q.iter()) {
            assert!((found * p).distance(q) < 1e-6);
        }
    }

    #[test]
    fn test_mirrored_copy() {
        let mut rng = StdRng::seed_from_u64(8);
        let p = random_points(&mut rng, 5);
        let rotation = DQuat::from_axis_angle(DVec3::Y, -0.4);
        let q = p
            .iter()
            .map(|&p| rotation * DVec3::new(p.x, p.y, -p.z))
            .collect::<Vec<_>>();
        let (a, e0) = inner_product(&p, &q);

        assert!(squared_deviation(&a, e0, false) > 1e-3);
        assert_approx_eq!(f64, squared_deviation(&a, e0, true), 0., epsilon = 1e-9);
        let (_, found, mirrored) = superposition(&a, e0, true);
        assert!(mirrored);
        for (&p, &q) in p.iter().zip(q.iter()) {
            assert!((found * -p).distance(q) < 1e-6);
        }
    }

    #[test]
    fn test_matches_direct_evaluation() {
        // The deviation returned must be achieved by the returned rotation
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..20 {
            let p = random_points(&mut rng, 7);
            let q = random_points(&mut rng, 7);
            let (a, e0) = inner_product(&p, &q);
            let (deviation, rotation, _) = superposition(&a, e0, false);
            let direct: f64 = p
                .iter()
                .zip(q.iter())
                .map(|(&p, &q)| (rotation * p).distance_squared(q))
                .sum();
            assert_approx_eq!(f64, deviation, direct, epsilon = 1e-8);
            assert_approx_eq!(f64, deviation, squared_deviation(&a, e0, false), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_empty() {
        assert_eq!(squared_deviation(&DMat3::ZERO, 0., true), 0.);
        let (deviation, rotation, mirrored) = superposition(&DMat3::ZERO, 0., true);
        assert_eq!(deviation, 0.);
        assert_eq!(rotation, DQuat::IDENTITY);
        assert!(!mirrored);
    }
}
