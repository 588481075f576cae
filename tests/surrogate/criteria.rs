use smbo::criteria::{Context, Criterion, Setup};
use smbo::learning::Ensemble;
use smbo::prelude::*;

fn fitted() -> (Ensemble, Dataset) {
    let mut data = Dataset::new(1);
    for x in [0.0, 0.3, 0.6, 0.9] {
        data.add_sample(vec![x], (x - 0.45_f64).powi(2)).unwrap();
    }
    let mut m = Surrogate::new(
        SurrogateConfig::default(),
        Kernel::parse("kSEISO", 1).unwrap(),
        MeanFunction::parse("mConst", 1).unwrap(),
        None,
    )
    .unwrap();
    m.fit(&data).unwrap();
    (Ensemble::new(vec![m]).unwrap(), data)
}

#[test]
fn expected_improvement_vanishes_without_uncertainty() {
    let p = Predictive::Gaussian { mean: 1.0, std: 0.0 };
    assert_eq!(p.expected_improvement(1.0, 1), 0.0);
    assert_eq!(p.expected_improvement(0.5, 1), 0.0);
    assert!((p.expected_improvement(1.5, 1) - 0.5).abs() < 1e-12);
    let spread = Predictive::Gaussian { mean: 3.0, std: 0.2 };
    assert!(spread.expected_improvement(0.0, 2) >= 0.0);
}

#[test]
fn improvement_criteria_are_never_positive() {
    let (model, data) = fitted();
    let ctx = Context {
        model: &model,
        incumbent: data.best().unwrap().y,
        last: data.last().map(|s| s.x.as_slice()),
    };
    for name in ["cEI", "cBEI", "cPOI", "cEIa"] {
        let mut c = Criterion::parse(name).unwrap();
        c.init(&Setup { iteration: 0, dim: 1 }, &mut fastrand::Rng::with_seed(1));
        for i in 0..=10 {
            let v = c.score(&ctx, &[f64::from(i) / 10.0]).unwrap();
            assert!(v <= 0.0, "{name} scored {v}");
        }
    }
}

#[test]
fn combined_criteria_weight_their_children() {
    let (model, data) = fitted();
    let ctx = Context {
        model: &model,
        incumbent: data.best().unwrap().y,
        last: Some(&[0.0]),
    };
    let x = [0.5];
    let mean = Criterion::parse("cExpReturn").unwrap().score(&ctx, &x).unwrap();
    let mut sum = Criterion::parse("cSum(cExpReturn,cDistance)").unwrap();
    sum.set_weights(&[2.0, 0.5]).unwrap();
    let v = sum.score(&ctx, &x).unwrap();
    assert!((v - (2.0 * mean + 0.5 * 0.5)).abs() < 1e-12);
}

#[test]
fn criterion_parameters_split_across_the_tree() {
    let mut c = Criterion::parse("cSum(cLCB,cPOI)").unwrap();
    assert_eq!(c.parameter_count(), 2);
    c.set_parameters(&[3.0, 0.05]).unwrap();
    assert_eq!(c.parameters(), vec![3.0, 0.05]);
    assert!(matches!(c.set_parameters(&[1.0]), Err(Error::DimensionMismatch { .. })));
}

#[test]
fn hedge_probabilities_stay_normalized_during_a_run() {
    let opt = BayesOpt::builder()
        .space(SearchSpace::unit(1).unwrap())
        .kernel("kSEISO")
        .criterion("cHedge(cEI,cLCB,cPOI,cExpReturn)")
        .learning("fixed")
        .n_init_samples(4)
        .n_iterations(6)
        .seed(21)
        .build()
        .unwrap();
    let f = |x: &[f64]| Ok::<_, Error>((x[0] - 0.7).powi(2));
    opt.initialize(&f).unwrap();
    while !opt.phase().is_finished() {
        opt.step(&f).unwrap();
        let criterion = opt.criterion();
        let hedge = criterion.hedge().unwrap();
        let p = hedge.probabilities();
        assert_eq!(p.len(), 4);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    let mut criterion = opt.criterion();
    let mut reset = criterion.clone();
    reset.reset();
    assert_eq!(reset.hedge().unwrap().probabilities(), vec![0.25; 4]);
    criterion.reset();
    assert_eq!(criterion, reset);
}

#[test]
fn hedge_is_only_allowed_at_the_root() {
    assert!(Criterion::parse("cSum(cHedge(cEI,cLCB),cEI)").is_err());
    assert!(Criterion::parse("cHedge(cEI)").is_err());
}
