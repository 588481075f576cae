use smbo::{Error, Kernel, MeanFunction};

fn points(dim: usize, n: usize) -> Vec<Vec<f64>> {
    let mut rng = fastrand::Rng::with_seed(11);
    (0..n).map(|_| (0..dim).map(|_| rng.f64()).collect()).collect()
}

#[test]
fn every_atom_is_deterministic_and_symmetric() {
    let xs = points(3, 2);
    for name in Kernel::names() {
        if name == "kSum" || name == "kProd" {
            continue;
        }
        let k = Kernel::parse(name, 3).unwrap();
        assert_eq!(k.evaluate(&xs[0], &xs[0]), k.evaluate(&xs[0], &xs[0]), "{name}");
        let (a, b) = (k.evaluate(&xs[0], &xs[1]), k.evaluate(&xs[1], &xs[0]));
        assert!((a - b).abs() < 1e-12, "{name}: {a} vs {b}");
    }
}

#[test]
fn stationary_correlation_matrices_are_positive_definite() {
    let xs = points(2, 12);
    for name in ["kSEISO", "kSEARD", "kMaternISO3", "kMaternARD5", "kRQISO", "kSum(kSEISO,kConst)"] {
        let k = Kernel::parse(name, 2).unwrap();
        let m = k.correlation_matrix(&xs);
        assert!((&m - m.transpose()).amax() < 1e-12, "{name} not symmetric");
        let jittered = m + nalgebra::DMatrix::identity(xs.len(), xs.len()) * 1e-8;
        let min = jittered.symmetric_eigen().eigenvalues.min();
        assert!(min > 0.0, "{name}: smallest eigenvalue {min}");
    }
}

#[test]
fn combinator_arity_adds_up() {
    let a = Kernel::parse("kSEARD", 4).unwrap();
    let b = Kernel::parse("kMaternISO3", 4).unwrap();
    let sum = Kernel::parse("kSum(kSEARD,kMaternISO3)", 4).unwrap();
    let prod = Kernel::parse("kProd(kSEARD,kMaternISO3)", 4).unwrap();
    let expected = a.hyperparameter_count() + b.hyperparameter_count();
    assert_eq!(sum.hyperparameter_count(), expected);
    assert_eq!(prod.hyperparameter_count(), expected);
}

#[test]
fn hyperparameters_round_trip_exactly() {
    let mut k = Kernel::parse("kSum(kProd(kSEARD,kConst),kLinearARD)", 2).unwrap();
    let theta: Vec<f64> = (1..=k.hyperparameter_count()).map(|i| 0.1 * i as f64).collect();
    k.set_hyperparameters(&theta).unwrap();
    assert_eq!(k.hyperparameters(), theta);
    assert!(matches!(
        k.set_hyperparameters(&theta[1..]),
        Err(Error::DimensionMismatch { .. })
    ));
}

#[test]
fn single_value_broadcasts_to_ard_lengths() {
    let mut k = Kernel::parse("kSEARD", 5).unwrap();
    k.set_hyperparameters_broadcast(&[0.7]).unwrap();
    assert_eq!(k.hyperparameters(), vec![0.7; 5]);
}

#[test]
fn expressions_print_back_to_their_source() {
    let text = "kSum(kMaternISO3,kProd(kConst,kPoly2))";
    assert_eq!(Kernel::parse(text, 3).unwrap().name(), text);
    assert_eq!(MeanFunction::parse("mSum(mOne,mLinear)", 2).unwrap().name(), "mSum(mOne,mLinear)");
}

#[test]
fn malformed_and_unknown_expressions_are_rejected() {
    assert!(matches!(Kernel::parse("kSum(kSEISO", 1), Err(Error::Parse { .. })));
    assert!(matches!(Kernel::parse("kNope", 1), Err(Error::UnknownName { .. })));
    assert!(matches!(MeanFunction::parse("mNope", 1), Err(Error::UnknownName { .. })));
}
