use smbo::prelude::*;

use crate::test_functions::{branin, wiggly_1d};

fn quadratic(x: &[f64]) -> core::result::Result<f64, Error> {
    Ok((x[0] - 0.3).powi(2))
}

fn quadratic_run(seed: u64) -> BayesOpt {
    let opt = BayesOpt::builder()
        .space(SearchSpace::unit(1).unwrap())
        .kernel("kSEISO")
        .criterion("cEI")
        .n_init_samples(5)
        .n_iterations(15)
        .seed(seed)
        .build()
        .unwrap();
    opt.run(&quadratic).unwrap();
    opt
}

#[test]
fn one_dimensional_quadratic_converges() {
    let opt = quadratic_run(42);
    assert_eq!(opt.dataset().len(), 20);
    assert_eq!(opt.phase(), Phase::BudgetExhausted);
    let (x, y) = opt.best().unwrap();
    assert!((x[0] - 0.3).abs() < 0.01, "best input {x:?}");
    assert!(y < 1e-4);
}

#[test]
fn runs_are_bit_reproducible_for_a_seed() {
    let a = quadratic_run(7);
    let b = quadratic_run(7);
    assert_eq!(a.dataset(), b.dataset());
    assert_eq!(a.snapshot(), b.snapshot());

    let c = quadratic_run(8);
    assert_ne!(a.dataset(), c.dataset());
}

#[test]
fn initial_design_is_distinct_before_iterating() {
    let opt = BayesOpt::builder()
        .space(SearchSpace::continuous(&[(-5.0, 10.0), (0.0, 15.0)]).unwrap())
        .n_init_samples(5)
        .n_iterations(3)
        .learning("fixed")
        .seed(3)
        .build()
        .unwrap();
    let f = |x: &[f64]| Ok::<_, Error>(branin(x));
    opt.initialize(&f).unwrap();
    assert_eq!(opt.phase(), Phase::Iterating);
    let data = opt.dataset();
    assert_eq!(data.len(), 5);
    for (i, a) in data.samples().iter().enumerate() {
        assert!((-5.0..=10.0).contains(&a.x[0]) && (0.0..=15.0).contains(&a.x[1]));
        for b in &data.samples()[i + 1..] {
            assert_ne!(a.x, b.x);
        }
    }
}

#[test]
fn step_reports_and_counts_iterations() {
    let opt = BayesOpt::builder()
        .space(SearchSpace::unit(1).unwrap())
        .kernel("kMaternISO3")
        .criterion("cLCB")
        .n_init_samples(4)
        .n_iterations(5)
        .n_iter_relearn(2)
        .seed(1)
        .build()
        .unwrap();
    let f = |x: &[f64]| Ok::<_, Error>(wiggly_1d(x));
    let report = opt.step(&f).unwrap();
    assert_eq!(report.iteration, 0);
    assert_eq!(report.source, "cLCB");
    assert_eq!(report.y, Some(wiggly_1d(&report.x)));
    assert_eq!(opt.iteration(), 1);
    assert_eq!(opt.dataset().len(), 5);
    let p = opt.predict(&report.x).unwrap();
    assert!((p.mean() - wiggly_1d(&report.x)).abs() < 0.05);
}

#[test]
fn every_learning_mode_runs_end_to_end() {
    for (learning, surrogate) in [
        ("fixed", "sGaussianProcessML"),
        ("empirical", "sStudentTProcessJef"),
        ("mcmc", "sStudentTProcessNIG"),
    ] {
        let opt = BayesOpt::builder()
            .space(SearchSpace::continuous(&[(-5.0, 10.0), (0.0, 15.0)]).unwrap())
            .kernel("kMaternARD5")
            .surrogate(surrogate)
            .learning(learning)
            .mcmc(McmcOptions {
                burn_in: 5,
                particles: 3,
                width: 2.0,
            })
            .n_init_samples(6)
            .n_iterations(3)
            .n_inner_iterations(30)
            .seed(5)
            .build()
            .unwrap();
        let (_, y) = opt.run(&|x: &[f64]| Ok::<_, Error>(branin(x))).unwrap();
        assert!(y.is_finite(), "{learning}/{surrogate}");
        assert_eq!(opt.dataset().len(), 9);
        if learning == "mcmc" {
            assert_eq!(opt.hyperparameters().len(), 3);
        }
    }
}

#[test]
fn unknown_names_fail_at_build_time() {
    let space = SearchSpace::unit(1).unwrap();
    for build in [
        BayesOpt::builder().space(space.clone()).kernel("kFoo").build(),
        BayesOpt::builder().space(space.clone()).criterion("cFoo").build(),
        BayesOpt::builder().space(space.clone()).surrogate("sFoo").build(),
        BayesOpt::builder().space(space.clone()).learning("guess").build(),
    ] {
        assert!(matches!(build, Err(Error::UnknownName { .. })));
    }
    assert!(matches!(
        BayesOpt::builder().build(),
        Err(Error::Configuration(_))
    ));
    assert!(matches!(
        BayesOpt::builder().space(space).n_init_samples(0).build(),
        Err(Error::Configuration(_))
    ));
}
