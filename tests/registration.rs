use float_cmp::assert_approx_eq;
use glam::{DQuat, DVec3};
use local_motif::{
    cluster, register, superpose, Error, NeighborEnvironment, RegistrationParams,
    MAX_REGISTRATION_POINTS,
};
use rand::{distributions::Uniform, prelude::*};

fn random_points(rng: &mut StdRng, count: usize) -> Vec<DVec3> {
    let distr = Uniform::new(-1., 1.);
    (0..count)
        .map(|_| DVec3::new(rng.sample(distr), rng.sample(distr), rng.sample(distr)))
        .collect()
}

#[test]
fn test_cyclic_example() {
    let p = [[1., 0., 0.], [0., 1., 0.], [0., 0., 1.]];
    let q = [[0., 1., 0.], [0., 0., 1.], [1., 0., 0.]];
    let params = RegistrationParams::default().with_max_rmsd(0.5);
    let registration = register(&p, &q, &params).unwrap();
    assert!(registration.found());
    let best = registration.best().unwrap();
    assert!(best.rmsd() < 1e-6);
    assert!(best.superposition().is_none());

    // Applying the permutation makes the sets superposable
    let permuted = best
        .permutation()
        .iter()
        .map(|&i| p[i as usize])
        .collect::<Vec<_>>();
    let (rmsd, _) = superpose(&permuted, &q, false).unwrap();
    assert!(rmsd < 1e-6);
}

#[test]
fn test_noisy_rotated_motif() {
    let mut rng = StdRng::seed_from_u64(100);
    let noise = Uniform::new(-0.01, 0.01);
    let rotation = DQuat::from_euler(glam::EulerRot::ZYX, 0.4, -1.1, 2.3);
    let p = random_points(&mut rng, 10);
    let mut sigma = (0..p.len()).collect::<Vec<_>>();
    sigma.shuffle(&mut rng);
    let q = sigma
        .iter()
        .map(|&i| {
            rotation * p[i] + DVec3::new(rng.sample(noise), rng.sample(noise), rng.sample(noise))
        })
        .collect::<Vec<_>>();

    let params = RegistrationParams::default()
        .with_max_rmsd(0.05)
        .with_rotation(true);
    let registration = register(&p, &q, &params).unwrap();
    let best = registration.best().expect("Small noise must match");
    assert!(best.rmsd() < 0.02);
    let permutation = best
        .permutation()
        .iter()
        .map(|&i| i as usize)
        .collect::<Vec<_>>();
    assert_eq!(permutation, sigma);

    let superposition = best.superposition().unwrap();
    assert!(superposition.rotation().angle_between(rotation) < 0.05);
}

#[test]
fn test_full_capacity() {
    let mut rng = StdRng::seed_from_u64(101);
    let p = random_points(&mut rng, MAX_REGISTRATION_POINTS);
    let mut q = p.clone();
    q.reverse();
    let params = RegistrationParams::default().with_max_rmsd(0.01);
    let registration = register(&p, &q, &params).unwrap();
    assert_approx_eq!(f64, registration.rmsd().unwrap(), 0., epsilon = 1e-5);

    let mut p = p;
    p.push(DVec3::ONE);
    q.push(DVec3::ONE);
    assert!(matches!(
        register(&p, &q, &params),
        Err(Error::CapacityExceeded { .. })
    ));
}

#[test]
fn test_two_phase_clustering() {
    // A row of particles, the first half octahedrally coordinated, the
    // second half with a squashed environment.
    let octahedron = [
        DVec3::X,
        DVec3::NEG_X,
        DVec3::Y,
        DVec3::NEG_Y,
        DVec3::Z,
        DVec3::NEG_Z,
    ];
    let squashed = octahedron.map(|v| DVec3::new(v.x, v.y, 0.6 * v.z));
    let count = 8;
    let environments = (0..count)
        .map(|i| {
            let mut vectors = if i < count / 2 {
                octahedron.to_vec()
            } else {
                squashed.to_vec()
            };
            local_motif::normalize_neighbor_vectors(&mut vectors);
            let neighbors = (0..6).map(|k| (i + k + 1) % count).collect();
            NeighborEnvironment::new(neighbors, vectors)
        })
        .collect::<Vec<_>>();

    let clustering = cluster(&environments, 0.05).unwrap();
    assert_eq!(clustering.cluster_count(), 2);
    assert_eq!(clustering.cluster_ids(), &[1, 1, 1, 1, 2, 2, 2, 2]);
}
