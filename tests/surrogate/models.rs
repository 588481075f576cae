use smbo::surrogate::{Score, Surrogate, SurrogateConfig, SurrogateKind};
use smbo::{Dataset, Kernel, MeanFunction, Predictive};

fn data_1d(f: impl Fn(f64) -> f64, n: usize) -> Dataset {
    let mut data = Dataset::new(1);
    for i in 0..n {
        let x = i as f64 / (n - 1) as f64;
        data.add_sample(vec![x], f(x)).unwrap();
    }
    data
}

fn model(kind: SurrogateKind, mean: &str) -> Surrogate {
    let config = SurrogateConfig {
        kind,
        ..SurrogateConfig::default()
    };
    let mut kernel = Kernel::parse("kMaternISO5", 1).unwrap();
    kernel.set_hyperparameters(&[0.3]).unwrap();
    Surrogate::new(config, kernel, MeanFunction::parse(mean, 1).unwrap(), None).unwrap()
}

const KINDS: [SurrogateKind; 5] = [
    SurrogateKind::GaussianProcess,
    SurrogateKind::GaussianProcessMl,
    SurrogateKind::GaussianProcessNormal,
    SurrogateKind::StudentTJeffreys,
    SurrogateKind::StudentTNig,
];

#[test]
fn minimum_index_tracks_the_smallest_output() {
    let mut rng = fastrand::Rng::with_seed(4);
    let mut data = Dataset::new(2);
    for _ in 0..40 {
        data.add_sample(vec![rng.f64(), rng.f64()], rng.f64() * 10.0 - 5.0).unwrap();
        let best = data.get_sample(data.min_index().unwrap()).unwrap().y;
        assert!(data.samples().iter().all(|s| best <= s.y));
        let worst = data.get_sample(data.max_index().unwrap()).unwrap().y;
        assert!(data.samples().iter().all(|s| worst >= s.y));
    }
}

#[test]
fn every_family_interpolates_its_data() {
    let data = data_1d(|x| (x - 0.3).powi(2), 7);
    for kind in KINDS {
        let mut m = model(kind, "mConst");
        m.fit(&data).unwrap();
        for s in data.samples() {
            let p = m.predict(&s.x).unwrap();
            assert!((p.mean() - s.y).abs() < 1e-3, "{}: {} vs {}", kind.name(), p.mean(), s.y);
            assert!(p.variance() < 1e-3, "{}: variance {}", kind.name(), p.variance());
        }
    }
}

#[test]
fn student_t_families_predict_student_t() {
    let data = data_1d(f64::sin, 6);
    for kind in [SurrogateKind::StudentTJeffreys, SurrogateKind::StudentTNig] {
        let mut m = model(kind, "mConst");
        m.fit(&data).unwrap();
        assert!(matches!(m.predict(&[0.55]).unwrap(), Predictive::StudentT { .. }));
    }
}

#[test]
fn fitting_twice_gives_identical_predictions() {
    let data = data_1d(|x| (3.0 * x).cos(), 8);
    let mut m = model(SurrogateKind::GaussianProcessNormal, "mLinCte");
    m.fit(&data).unwrap();
    let first = m.predict(&[0.37]).unwrap();
    m.fit(&data).unwrap();
    let second = m.predict(&[0.37]).unwrap();
    assert!((first.mean() - second.mean()).abs() < 1e-12);
    assert!((first.variance() - second.variance()).abs() < 1e-12);
}

#[test]
fn duplicate_inputs_are_rescued_by_jitter() {
    let mut data = Dataset::new(1);
    for _ in 0..4 {
        data.add_sample(vec![0.5], 1.0).unwrap();
    }
    data.add_sample(vec![0.1], 0.0).unwrap();
    let config = SurrogateConfig {
        noise: 0.0,
        ..SurrogateConfig::default()
    };
    let mut m = Surrogate::new(
        config,
        Kernel::parse("kSEISO", 1).unwrap(),
        MeanFunction::parse("mZero", 1).unwrap(),
        None,
    )
    .unwrap();
    m.fit(&data).unwrap();
    let (amount, attempts) = m.applied_jitter().unwrap();
    assert!(amount > 0.0);
    assert!(attempts >= 2);
    assert!(m.predict(&[0.3]).unwrap().mean().is_finite());
}

#[test]
fn scores_are_finite_and_map_adds_the_prior() {
    let data = data_1d(|x| x * x, 6);
    let mut m = model(SurrogateKind::GaussianProcess, "mConst");
    m.fit(&data).unwrap();
    let ml = m.evidence(Score::Ml).unwrap();
    let map = m.evidence(Score::Map).unwrap();
    assert!((map - (ml - m.log_prior())).abs() < 1e-9);
    assert!(m.evidence(Score::Loocv).unwrap().is_finite());
}

#[test]
fn expected_improvement_is_non_negative() {
    let data = data_1d(|x| (x - 0.6).powi(2), 5);
    let mut m = model(SurrogateKind::StudentTNig, "mConst");
    m.fit(&data).unwrap();
    let best = data.best().unwrap().y;
    for i in 0..=20 {
        let p = m.predict(&[f64::from(i) / 20.0]).unwrap();
        assert!(p.expected_improvement(best, 1) >= 0.0);
    }
}
