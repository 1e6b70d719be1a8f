use std::f64::consts::PI;

use float_cmp::assert_approx_eq;
use glam::DVec3;
use local_motif::{
    classify, classify_batch, coordination_number, voronoi_faces, Error, MAX_VORONOI_POINTS,
};
use rand::{distributions::Uniform, prelude::*};

/// Face-centered cubic environment: 12 nearest and 6 second nearest
/// neighbours, shifted and slightly perturbed.
fn perturbed_fcc(rng: &mut StdRng, center: DVec3, noise: f64) -> Vec<DVec3> {
    let distr = Uniform::new(-noise, noise);
    let mut jitter = || DVec3::new(rng.sample(distr), rng.sample(distr), rng.sample(distr));
    let mut points = vec![center];
    for a in [-0.5, 0.5] {
        for b in [-0.5, 0.5] {
            points.push(center + DVec3::new(a, b, 0.) + jitter());
            points.push(center + DVec3::new(a, 0., b) + jitter());
            points.push(center + DVec3::new(0., a, b) + jitter());
        }
    }
    for axis in [DVec3::X, DVec3::Y, DVec3::Z] {
        points.push(center + axis + jitter());
        points.push(center - axis + jitter());
    }
    points
}

#[test]
fn test_octahedral_environment() {
    let points = [
        [0., 0., 0.],
        [1., 0., 0.],
        [-1., 0., 0.],
        [0., 1., 0.],
        [0., -1., 0.],
        [0., 0., 1.],
        [0., 0., -1.],
    ];
    let classified = classify(&points, 0.1).unwrap();
    assert_eq!(classified, vec![false, true, true, true, true, true, true]);

    let faces = voronoi_faces(&points).unwrap();
    let solid_angles = faces.solid_angles();
    for &solid_angle in solid_angles[1..].iter() {
        assert_approx_eq!(f64, solid_angle, 4. * PI / 6., epsilon = 1e-9);
        assert_approx_eq!(f64, solid_angle, 2.0944, epsilon = 1e-4);
    }
}

#[test]
fn test_fcc_environment() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..10 {
        let center = DVec3::new(rng.gen(), rng.gen(), rng.gen()) * 10.;
        let points = perturbed_fcc(&mut rng, center, 0.02);
        assert_eq!(points.len(), MAX_VORONOI_POINTS);

        let faces = voronoi_faces(&points).unwrap();
        assert_approx_eq!(f64, faces.total_solid_angle(), 4. * PI, epsilon = 1e-9 * 4. * PI);
        // The second shell only cuts off small corners of the rhombic
        // dodecahedron
        let classified = classify(&points, 0.05).unwrap();
        assert!(classified[1..13].iter().all(|&c| c));
        assert!(classified[13..].iter().all(|&c| !c));
        assert_eq!(coordination_number(&points, 0.05).unwrap(), 12);
    }
}

#[test]
fn test_batch() {
    let mut rng = StdRng::seed_from_u64(43);
    let environments = (0..16)
        .map(|_| perturbed_fcc(&mut rng, DVec3::ZERO, 0.05))
        .collect::<Vec<_>>();
    let classified = classify_batch(&environments, 0.05).unwrap();
    for (points, classified) in environments.iter().zip(classified) {
        assert_eq!(classified, classify(points, 0.05).unwrap());
    }
}

#[test]
fn test_errors() {
    let points = vec![DVec3::X; MAX_VORONOI_POINTS + 1];
    assert_eq!(
        classify(&points, 0.1),
        Err(Error::CapacityExceeded {
            count: MAX_VORONOI_POINTS + 1,
            max: MAX_VORONOI_POINTS
        })
    );
    let err = classify(&points[..3], 1.5).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));
}
