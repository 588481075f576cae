use smbo::inner::InnerOptions;
use smbo::learning::{HyperLearner, LearningMode, McmcOptions};
use smbo::prelude::*;

fn setup() -> (Surrogate, Dataset) {
    let mut data = Dataset::new(2);
    let mut rng = fastrand::Rng::with_seed(5);
    for _ in 0..12 {
        let x = vec![rng.f64(), rng.f64()];
        let y = (6.0 * x[0]).sin() + 0.1 * x[1];
        data.add_sample(x, y).unwrap();
    }
    let mut kernel = Kernel::parse("kSEARD", 2).unwrap();
    kernel.set_hyperparameters_broadcast(&[1.0]).unwrap();
    let priors = vec![smbo::Prior::centred_on(1.0, 10.0).unwrap(); 2];
    let template = Surrogate::new(
        SurrogateConfig::default(),
        kernel,
        MeanFunction::parse("mConst", 2).unwrap(),
        Some(priors),
    )
    .unwrap();
    (template, data)
}

fn options() -> InnerOptions {
    InnerOptions {
        max_evaluations: 200,
        ..InnerOptions::default()
    }
}

#[test]
fn fixed_learning_keeps_the_template() {
    let (template, data) = setup();
    let learner = HyperLearner::new(LearningMode::Fixed, (-6.0, 1.0), options()).unwrap();
    let ensemble = learner.learn(&template, &data, &mut fastrand::Rng::with_seed(1)).unwrap();
    assert_eq!(ensemble.len(), 1);
    assert_eq!(ensemble.hyperparameters(), vec![template.kernel_hyperparameters()]);
}

#[test]
fn empirical_bayes_improves_the_score() {
    let (template, data) = setup();
    for score in [Score::Ml, Score::Map, Score::Loocv] {
        let mut start = template.clone();
        start.fit(&data).unwrap();
        let before = start.evidence(score).unwrap();

        let learner =
            HyperLearner::new(LearningMode::Empirical(score), (-6.0, 1.0), options()).unwrap();
        let ensemble = learner.learn(&template, &data, &mut fastrand::Rng::with_seed(2)).unwrap();
        let after = ensemble.members()[0].evidence(score).unwrap();
        assert!(after <= before + 1e-9, "{score:?}: {after} > {before}");
        for theta in &ensemble.hyperparameters()[0] {
            assert!((-6.0..=1.0).contains(&theta.ln()), "{theta} outside the box");
        }
    }
}

#[test]
fn mcmc_yields_an_equal_weight_mixture() {
    let (template, data) = setup();
    let mcmc = McmcOptions {
        burn_in: 10,
        particles: 4,
        width: 2.0,
    };
    let learner = HyperLearner::new(LearningMode::Mcmc(mcmc), (-6.0, 1.0), options()).unwrap();
    let ensemble = learner.learn(&template, &data, &mut fastrand::Rng::with_seed(3)).unwrap();
    assert_eq!(ensemble.len(), 4);
    let Predictive::Mixture(parts) = ensemble.predict(&[0.5, 0.5]).unwrap() else {
        panic!("expected a mixture");
    };
    assert_eq!(parts.len(), 4);
    assert!(parts.iter().all(|(w, _)| (*w - 0.25).abs() < 1e-15));
}

#[test]
fn learning_is_reproducible_for_a_seed() {
    let (template, data) = setup();
    let mcmc = McmcOptions {
        burn_in: 5,
        particles: 3,
        width: 2.0,
    };
    let learner = HyperLearner::new(LearningMode::Mcmc(mcmc), (-6.0, 1.0), options()).unwrap();
    let a = learner.learn(&template, &data, &mut fastrand::Rng::with_seed(9)).unwrap();
    let b = learner.learn(&template, &data, &mut fastrand::Rng::with_seed(9)).unwrap();
    assert_eq!(a.hyperparameters(), b.hyperparameters());
}
